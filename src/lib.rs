//! # rustls-openssl-groups
//!
//! A registry of TLS named groups for key exchange, backed by OpenSSL, that plugs into
//! a [rustls crypto provider](https://docs.rs/rustls/latest/rustls/crypto/struct.CryptoProvider.html).
//!
//! ## Supported Groups
//!
//! In descending order of preference:
//!
//! * secp521r1, secp384r1, secp256r1, secp256k1 (ECDHE)
//! * ffdhe8192, ffdhe6144, ffdhe4096, ffdhe3072, ffdhe2048 (finite field DHE, [RFC 7919](https://www.rfc-editor.org/rfc/rfc7919))
//! * x448, x25519 (XDH)
//!
//! secp256k1 is only available up to TLS 1.2 and is not FIPS-approved.
//!
//! Each group is probed against OpenSSL once, when the [Registry] is initialised.
//! Groups that OpenSSL cannot provide are kept in the registry but reported as unavailable.
//! OpenSSL has no parameter objects for X25519 and X448, so those groups are available
//! when their key agreement works, see [ProbeConfig].
//!
//! ## Usage
//!
//! Add `rustls-openssl-groups` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! rustls = { version = "0.23.0", features = ["tls12", "std"], default-features = false }
//! rustls_openssl_groups = "0.1.0"
//! ```
//!
//! ### Configuration
//!
//! Initialise a [Registry] once and use [Registry::with_kx_groups] to offer its groups from a provider:
//!
//! ```rust
//! use once_cell::sync::Lazy;
//! use rustls::ClientConfig;
//! use rustls_openssl_groups::Registry;
//! use std::sync::Arc;
//!
//! static REGISTRY: Lazy<Registry> = Lazy::new(Registry::initialize);
//!
//! let provider = REGISTRY.with_kx_groups(rustls::crypto::aws_lc_rs::default_provider());
//! let _builder = ClientConfig::builder_with_provider(Arc::new(provider))
//!     .with_safe_default_protocol_versions()
//!     .unwrap();
//! ```
//!
//! # Features
//! - `tls12`: Enables classifying rustls TLS 1.2 cipher suites by key exchange. Enabled by default.
//! - `fips`: Restricts [Registry::kx_groups] to FIPS-approved groups. Disabled by default. See [fips].
#![warn(missing_docs)]
use openssl::rand::rand_priv_bytes;
use rustls::crypto::GetRandomFailed;

mod error;
pub mod kx_group;
mod named_group;
mod negotiation;
mod probe;
mod registry;

pub use error::{Error, ProbeError, Result};
pub use kx_group::{Credentials, HandshakeContext, KeyDerivation, Possession};
pub use named_group::{GroupFamily, GroupParameters, NamedGroup, XCurve};
pub use negotiation::{AlgorithmConstraints, CipherSuiteGroups, CryptoPrimitive};
pub use probe::{AlgorithmProber, OpenSslProber, ProbeConfig};
pub use registry::{display_name, Registry};

/// A struct that implements [rustls::crypto::SecureRandom].
#[derive(Debug)]
pub struct SecureRandom;

impl rustls::crypto::SecureRandom for SecureRandom {
    fn fill(&self, buf: &mut [u8]) -> core::result::Result<(), GetRandomFailed> {
        rand_priv_bytes(buf).map_err(|_| GetRandomFailed)
    }

    fn fips(&self) -> bool {
        fips::enabled()
    }
}

pub mod fips {
    //! # FIPS support
    //!
    //! Build with the `fips` feature so [Registry::kx_groups](crate::Registry::kx_groups)
    //! leaves out groups that are not FIPS-approved (secp256k1), and call [enable()]
    //! before initialising the registry. A group then reports
    //! [fips()](rustls::crypto::SupportedKxGroup::fips) only while OpenSSL is in FIPS mode,
    //! which rustls checks through `ClientConfig::fips()` and `ServerConfig::fips()`.

    /// Returns `true` if OpenSSL is running in FIPS mode.
    #[cfg(fips_module)]
    pub(crate) fn enabled() -> bool {
        openssl::fips::enabled()
    }
    #[cfg(not(fips_module))]
    pub(crate) fn enabled() -> bool {
        unsafe { openssl_sys::EVP_default_properties_is_fips_enabled(std::ptr::null_mut()) == 1 }
    }

    /// Put OpenSSL 1.1.1 into FIPS mode with `FIPS_mode_set`.
    ///
    /// Panics if FIPS mode cannot be entered.
    #[cfg(fips_module)]
    pub fn enable() {
        openssl::fips::enable(true).expect("Failed to enable FIPS mode.");
    }

    /// Load the OpenSSL 3 `fips` provider and make FIPS properties the default.
    ///
    /// Panics if FIPS mode cannot be entered.
    #[cfg(not(fips_module))]
    pub fn enable() {
        use once_cell::sync::OnceCell;
        use openssl::error::ErrorStack;
        use openssl::provider::Provider;

        // Loaded once and kept for the life of the process
        static PROVIDER: OnceCell<Provider> = OnceCell::new();
        PROVIDER.get_or_init(|| {
            let provider = Provider::load(None, "fips").expect("Failed to load FIPS provider.");
            let enabled =
                unsafe { openssl_sys::EVP_default_properties_enable_fips(std::ptr::null_mut(), 1) };
            if enabled <= 0 {
                panic!("Failed to enable FIPS properties: {}", ErrorStack::get());
            }
            provider
        });
    }
}

#[cfg(test)]
mod test {
    use rustls::crypto::{SecureRandom as _, SupportedKxGroup};

    use super::SecureRandom;

    #[test]
    fn secure_random_fills_buffer() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        SecureRandom.fill(&mut a).unwrap();
        SecureRandom.fill(&mut b).unwrap();
        assert_ne!(a, b);
        assert_eq!(SecureRandom.fips(), super::fips::enabled());
    }

    #[test]
    fn group_fips_status_follows_openssl() {
        let registry = crate::kx_group::test::registry();
        for group in registry.groups() {
            assert_eq!(
                SupportedKxGroup::fips(group),
                group.is_fips() && super::fips::enabled(),
                "{group}"
            );
        }
    }

    #[cfg(feature = "fips")]
    #[test]
    fn enable_is_idempotent() {
        super::fips::enable();
        super::fips::enable();
        assert!(super::fips::enabled());
    }
}
