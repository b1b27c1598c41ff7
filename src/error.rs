//! Error types for named group operations.
use openssl::error::ErrorStack;
use thiserror::Error;

/// Result type alias for named group operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors raised while creating, decoding or combining key exchange material.
#[derive(Debug, Error)]
pub enum Error {
    /// The peer's public value does not match the group's encoding.
    ///
    /// This is fatal to the handshake and maps to
    /// [rustls::PeerMisbehaved::InvalidKeyShare].
    #[error("invalid key share for {group}: {reason}")]
    InvalidKeyShare {
        /// Canonical name of the group the value was decoded for.
        group: &'static str,
        /// What was wrong with the value.
        reason: &'static str,
    },

    /// The group's parameters cannot be used by this operation.
    #[error("{0} cannot be used for this key exchange")]
    UnsupportedGroup(&'static str),

    /// The handshake has no possession and peer credentials for the family.
    #[error("no sufficient {0} key agreement parameters negotiated")]
    MissingKeyMaterial(&'static str),

    /// Possession and credentials belong to different groups.
    #[error("named group mismatch: possession is {possession:#06x}, credentials are {credentials:#06x}")]
    GroupMismatch {
        /// Code point of the local possession.
        possession: u16,
        /// Code point of the peer credentials.
        credentials: u16,
    },

    /// The supplied random source failed.
    #[error("random source failed")]
    Random,

    /// OpenSSL reported an error.
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),
}

impl From<rustls::crypto::GetRandomFailed> for Error {
    fn from(_: rustls::crypto::GetRandomFailed) -> Self {
        Self::Random
    }
}

impl From<Error> for rustls::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidKeyShare { .. } => {
                rustls::Error::PeerMisbehaved(rustls::PeerMisbehaved::InvalidKeyShare)
            }
            Error::Random => rustls::Error::FailedToGetRandomBytes,
            e => rustls::Error::General(e.to_string()),
        }
    }
}

/// Reasons a group's algorithm could not be initialised by the provider.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The provider has no parameter object for the algorithm.
    #[error("no algorithm parameters for {0}")]
    NoParameters(&'static str),

    /// The provider has no key agreement for the algorithm.
    #[error("no key agreement for {0}")]
    NoKeyAgreement(&'static str),

    /// OpenSSL rejected the parameters.
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),
}
