use core::fmt;

use openssl::derive::Deriver;
use openssl::pkey::{PKey, Private, Public};
use rustls::crypto::SecureRandom;
use zeroize::Zeroize;

use super::{
    key_derivation, Credentials, HandshakeContext, KeyDerivation, NamedGroupScheme, Possession,
};
use crate::error::{Error, Result};
use crate::named_group::{GroupFamily, GroupParameters, NamedGroup, XCurve};

/// X25519 and X448 ([RFC 7748](https://www.rfc-editor.org/rfc/rfc7748)).
#[derive(Debug)]
pub(crate) struct XdhScheme;

/// An X25519 or X448 key pair.
pub struct XdhPossession {
    pub(super) group: u16,
    private_key: PKey<Private>,
    pub(super) public_key: Vec<u8>,
}

/// A peer's X25519 or X448 public key.
pub struct XdhCredentials {
    pub(super) group: u16,
    public_key: PKey<Public>,
}

fn x_curve(group: &NamedGroup) -> Result<XCurve> {
    match group.parameters() {
        GroupParameters::XCurve(curve) => Ok(*curve),
        _ => Err(Error::UnsupportedGroup(group.name())),
    }
}

impl XdhPossession {
    /// Build a key pair from a raw private key.
    pub(super) fn from_raw(group: u16, curve: XCurve, private_key: &[u8]) -> Result<Self> {
        let private_key = PKey::private_key_from_raw_bytes(private_key, curve.id())?;
        let public_key = private_key.raw_public_key()?;
        Ok(Self {
            group,
            private_key,
            public_key,
        })
    }
}

impl XdhCredentials {
    pub(super) fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.public_key.raw_public_key()?)
    }
}

pub(super) fn agree(possession: &XdhPossession, credentials: &XdhCredentials) -> Result<Vec<u8>> {
    let mut deriver = Deriver::new(&possession.private_key)?;
    deriver.set_peer(&credentials.public_key)?;
    Ok(deriver.derive_to_vec()?)
}

impl NamedGroupScheme for XdhScheme {
    fn encode_public_key(&self, possession: &Possession) -> Option<Vec<u8>> {
        match possession {
            Possession::Xdh(p) => Some(p.public_key.clone()),
            _ => None,
        }
    }

    fn decode_credentials(
        &self,
        group: &NamedGroup,
        encoded: &[u8],
    ) -> Result<Option<Credentials>> {
        let curve = x_curve(group)?;
        let invalid = |reason| Error::InvalidKeyShare {
            group: group.name(),
            reason,
        };

        if encoded.len() != curve.key_len() {
            return Err(invalid("public key has wrong length"));
        }
        let public_key = PKey::public_key_from_raw_bytes(encoded, curve.id())
            .map_err(|_| invalid("public key rejected"))?;

        Ok(Some(Credentials::Xdh(XdhCredentials {
            group: group.id(),
            public_key,
        })))
    }

    fn create_possession(
        &self,
        group: &NamedGroup,
        random: &dyn SecureRandom,
    ) -> Result<Option<Possession>> {
        let curve = x_curve(group)?;
        let mut bytes = vec![0u8; curve.key_len()];
        random.fill(&mut bytes)?;
        let possession = XdhPossession::from_raw(group.id(), curve, &bytes);
        bytes.zeroize();
        Ok(Some(Possession::Xdh(possession?)))
    }

    fn create_key_derivation<'a>(
        &self,
        context: &'a dyn HandshakeContext,
    ) -> Result<Option<KeyDerivation<'a>>> {
        key_derivation(context, GroupFamily::XCurve, "XDH")
    }
}

impl fmt::Debug for XdhPossession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XdhPossession")
            .field("group", &format_args!("{:#06x}", self.group))
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for XdhCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XdhCredentials")
            .field("group", &format_args!("{:#06x}", self.group))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use rustls::ProtocolVersion;
    use wycheproof::TestResult;

    use super::XdhPossession;
    use crate::error::Error;
    use crate::kx_group::test::registry;
    use crate::kx_group::{KeyDerivation, Possession};
    use crate::named_group::XCurve;

    #[rstest::rstest]
    #[case::x25519(wycheproof::xdh::TestName::X25519, "x25519", XCurve::X25519)]
    #[case::x448(wycheproof::xdh::TestName::X448, "x448", XCurve::X448)]
    fn xdh(
        #[case] test_name: wycheproof::xdh::TestName,
        #[case] name: &str,
        #[case] curve: XCurve,
    ) {
        let test_set = wycheproof::xdh::TestSet::load(test_name).unwrap();
        let registry = registry();
        let group = registry.lookup_by_name(name).unwrap();

        for test_group in &test_set.test_groups {
            for test in &test_group.tests {
                let possession = Possession::Xdh(
                    XdhPossession::from_raw(group.id(), curve, &test.private_key).unwrap(),
                );

                let res = group
                    .decode_credentials(&test.public_key)
                    .and_then(|credentials| {
                        let credentials = credentials.unwrap();
                        KeyDerivation::new(&possession, &credentials, ProtocolVersion::TLSv1_3)
                            .derive()
                    });

                // OpenSSL does not support producing a zero shared secret
                let zero_shared_secret = test
                    .flags
                    .contains(&wycheproof::xdh::TestFlag::ZeroSharedSecret);

                match (&test.result, zero_shared_secret) {
                    (TestResult::Acceptable, false) | (TestResult::Valid, _) => match res {
                        Ok(sharedsecret) => {
                            assert_eq!(
                                sharedsecret.secret_bytes(),
                                &test.shared_secret[..],
                                "Derived incorrect secret: {:?}",
                                test
                            );
                        }
                        Err(e) => {
                            panic!("Test failed: {:?}. Error {:?}", test, e);
                        }
                    },
                    _ => {
                        assert!(res.is_err(), "Expected error: {:?}", test);
                    }
                }
            }
        }
    }

    #[rstest::rstest]
    #[case::x25519("x25519", 32)]
    #[case::x448("x448", 56)]
    fn public_key_is_raw(#[case] name: &str, #[case] len: usize) {
        let registry = registry();
        let group = registry.lookup_by_name(name).unwrap();
        let possession = group
            .create_possession(&crate::SecureRandom)
            .unwrap()
            .unwrap();
        let encoded = group.encode_public_key(&possession).unwrap();
        assert_eq!(encoded.len(), len);

        let credentials = group.decode_credentials(&encoded).unwrap().unwrap();
        assert_eq!(credentials.encode().unwrap(), encoded);
    }

    #[test]
    fn rejects_wrong_length() {
        let registry = registry();
        let x25519 = registry.lookup_by_name("x25519").unwrap();
        let x448 = registry.lookup_by_name("x448").unwrap();

        for len in [0, 31, 33, 56] {
            assert!(matches!(
                x25519.decode_credentials(&vec![9u8; len]),
                Err(Error::InvalidKeyShare {
                    group: "x25519",
                    reason: "public key has wrong length"
                })
            ));
        }
        assert!(matches!(
            x448.decode_credentials(&[9u8; 32]),
            Err(Error::InvalidKeyShare { group: "x448", .. })
        ));
    }
}
