#![allow(clippy::unusual_byte_groupings)]

use std::env;

fn main() {
    // OpenSSL 1.1.1 exposes FIPS mode through FIPS_mode_set, OpenSSL 3 through the fips provider
    println!("cargo:rustc-check-cfg=cfg(fips_module)");
    if let Ok(version) = env::var("DEP_OPENSSL_VERSION_NUMBER") {
        let version = u64::from_str_radix(&version, 16).unwrap();

        if version < 0x3_00_00_00_0 {
            println!("cargo:rustc-cfg=fips_module");
        }
    }
}
