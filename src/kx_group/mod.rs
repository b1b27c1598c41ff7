//! Key exchange operations for named groups.
//!
//! Each [GroupFamily] has one scheme, selected when the [NamedGroup] is
//! created: [ec] for ECDHE, [ffdhe] for finite field DHE and [xdh] for
//! X25519/X448. Placeholder families have no scheme, so their operations
//! return `None`.
use core::fmt;

use rustls::crypto::{SecureRandom, SharedSecret};
use rustls::ProtocolVersion;
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::named_group::{GroupFamily, NamedGroup};

pub(crate) mod ec;
mod exchange;
pub(crate) mod ffdhe;
pub(crate) mod xdh;

pub use ec::{EcCredentials, EcPossession};
pub use ffdhe::{FfdheCredentials, FfdhePossession};
pub use xdh::{XdhCredentials, XdhPossession};

/// Operations every group family provides.
pub(crate) trait NamedGroupScheme: fmt::Debug + Send + Sync {
    fn encode_public_key(&self, possession: &Possession) -> Option<Vec<u8>>;

    fn decode_credentials(&self, group: &NamedGroup, encoded: &[u8])
        -> Result<Option<Credentials>>;

    fn create_possession(
        &self,
        group: &NamedGroup,
        random: &dyn SecureRandom,
    ) -> Result<Option<Possession>>;

    fn create_key_derivation<'a>(
        &self,
        context: &'a dyn HandshakeContext,
    ) -> Result<Option<KeyDerivation<'a>>>;
}

/// Scheme of groups that are not predefined named groups.
#[derive(Debug)]
pub(crate) struct NoScheme;

impl NamedGroupScheme for NoScheme {
    fn encode_public_key(&self, _: &Possession) -> Option<Vec<u8>> {
        None
    }

    fn decode_credentials(&self, _: &NamedGroup, _: &[u8]) -> Result<Option<Credentials>> {
        Ok(None)
    }

    fn create_possession(
        &self,
        _: &NamedGroup,
        _: &dyn SecureRandom,
    ) -> Result<Option<Possession>> {
        Ok(None)
    }

    fn create_key_derivation<'a>(
        &self,
        _: &'a dyn HandshakeContext,
    ) -> Result<Option<KeyDerivation<'a>>> {
        Ok(None)
    }
}

/// The parts of a handshake that key derivation needs.
pub trait HandshakeContext {
    /// The negotiated protocol version.
    fn protocol_version(&self) -> ProtocolVersion;

    /// Key material generated locally for this handshake.
    fn possessions(&self) -> &[Possession];

    /// Public values received from the peer.
    fn credentials(&self) -> &[Credentials];
}

/// Ephemeral key material generated for one handshake.
#[derive(Debug)]
pub enum Possession {
    /// An ECDHE key pair.
    Ec(EcPossession),
    /// A finite field DHE key pair.
    Ffdhe(FfdhePossession),
    /// An X25519 or X448 key pair.
    Xdh(XdhPossession),
}

impl Possession {
    /// Code point of the group the key was generated for.
    pub fn named_group(&self) -> u16 {
        match self {
            Self::Ec(p) => p.group,
            Self::Ffdhe(p) => p.group,
            Self::Xdh(p) => p.group,
        }
    }

    /// Family of the group the key was generated for.
    pub fn family(&self) -> GroupFamily {
        match self {
            Self::Ec(_) => GroupFamily::EllipticCurve,
            Self::Ffdhe(_) => GroupFamily::FiniteField,
            Self::Xdh(_) => GroupFamily::XCurve,
        }
    }

    /// The public value, in the group's wire encoding.
    pub fn public_key(&self) -> &[u8] {
        match self {
            Self::Ec(p) => &p.public_key,
            Self::Ffdhe(p) => &p.public_key,
            Self::Xdh(p) => &p.public_key,
        }
    }
}

/// A peer's public value for a named group.
#[derive(Debug)]
pub enum Credentials {
    /// An ECDHE public point.
    Ec(EcCredentials),
    /// A finite field DHE public value.
    Ffdhe(FfdheCredentials),
    /// An X25519 or X448 public key.
    Xdh(XdhCredentials),
}

impl Credentials {
    /// Code point of the group the value was decoded for.
    pub fn named_group(&self) -> u16 {
        match self {
            Self::Ec(c) => c.group,
            Self::Ffdhe(c) => c.group,
            Self::Xdh(c) => c.group,
        }
    }

    /// Family of the group the value was decoded for.
    pub fn family(&self) -> GroupFamily {
        match self {
            Self::Ec(_) => GroupFamily::EllipticCurve,
            Self::Ffdhe(_) => GroupFamily::FiniteField,
            Self::Xdh(_) => GroupFamily::XCurve,
        }
    }

    /// Encode the value as it appears on the wire.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Ec(c) => c.encode(),
            Self::Ffdhe(c) => c.encode(),
            Self::Xdh(c) => c.encode(),
        }
    }
}

/// Computes the shared secret of a possession and the peer's credentials.
#[derive(Debug)]
pub struct KeyDerivation<'a> {
    possession: &'a Possession,
    credentials: &'a Credentials,
    protocol_version: ProtocolVersion,
}

impl<'a> KeyDerivation<'a> {
    pub(crate) fn new(
        possession: &'a Possession,
        credentials: &'a Credentials,
        protocol_version: ProtocolVersion,
    ) -> Self {
        Self {
            possession,
            credentials,
            protocol_version,
        }
    }

    /// Compute the shared secret.
    ///
    /// Finite field secrets are left-padded to the length of the prime
    /// ([RFC 8446 section 7.4.1](https://www.rfc-editor.org/rfc/rfc8446#section-7.4.1)),
    /// except with TLS 1.2, which strips leading zero bytes
    /// ([RFC 5246 section 8.1.2](https://www.rfc-editor.org/rfc/rfc5246#section-8.1.2)).
    pub fn derive(&self) -> Result<SharedSecret> {
        let possession = self.possession.named_group();
        let credentials = self.credentials.named_group();
        if possession != credentials {
            return Err(Error::GroupMismatch {
                possession,
                credentials,
            });
        }

        let mut secret = match (self.possession, self.credentials) {
            (Possession::Ec(p), Credentials::Ec(c)) => ec::agree(p, c)?,
            (Possession::Ffdhe(p), Credentials::Ffdhe(c)) => {
                let mut secret = ffdhe::agree(p, c)?;
                if self.protocol_version == ProtocolVersion::TLSv1_2 {
                    let zeros = secret.iter().take_while(|&&b| b == 0).count();
                    secret.drain(..zeros);
                }
                secret
            }
            (Possession::Xdh(p), Credentials::Xdh(c)) => xdh::agree(p, c)?,
            _ => {
                return Err(Error::GroupMismatch {
                    possession,
                    credentials,
                })
            }
        };
        let shared = SharedSecret::from(secret.as_slice());
        secret.zeroize();
        Ok(shared)
    }
}

/// Find a possession of `family` and the peer's credentials for the same group.
fn key_derivation<'a>(
    context: &'a dyn HandshakeContext,
    family: GroupFamily,
    label: &'static str,
) -> Result<Option<KeyDerivation<'a>>> {
    context
        .possessions()
        .iter()
        .filter(|possession| possession.family() == family)
        .find_map(|possession| {
            context
                .credentials()
                .iter()
                .find(|credentials| credentials.named_group() == possession.named_group())
                .map(|credentials| {
                    KeyDerivation::new(possession, credentials, context.protocol_version())
                })
        })
        .map(Some)
        .ok_or(Error::MissingKeyMaterial(label))
}

impl NamedGroup {
    /// Encode the public part of `possession` for the wire.
    ///
    /// `None` if the group has no scheme, or the possession belongs to
    /// another family.
    pub fn encode_public_key(&self, possession: &Possession) -> Option<Vec<u8>> {
        self.scheme.encode_public_key(possession)
    }

    /// Decode a peer's public value for this group.
    ///
    /// Fails with [Error::InvalidKeyShare] if the value does not have the
    /// group's encoding.
    pub fn decode_credentials(&self, encoded: &[u8]) -> Result<Option<Credentials>> {
        self.scheme.decode_credentials(self, encoded)
    }

    /// Generate an ephemeral key pair, drawing the private key from `random`.
    pub fn create_possession(&self, random: &dyn SecureRandom) -> Result<Option<Possession>> {
        self.scheme.create_possession(self, random)
    }

    /// Pair the handshake's possession of this group's family with the
    /// peer's credentials.
    pub fn create_key_derivation<'a>(
        &self,
        context: &'a dyn HandshakeContext,
    ) -> Result<Option<KeyDerivation<'a>>> {
        self.scheme.create_key_derivation(context)
    }
}
