//! Whether a named group may be negotiated for a set of protocols, cipher
//! suites and an algorithm policy.
use rustls::ProtocolVersion;
use rustls::SupportedCipherSuite;

use crate::named_group::{GroupFamily, GroupParameters, NamedGroup};

/// The use a constrained algorithm is put to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CryptoPrimitive {
    /// Key agreement, as performed by every named group.
    KeyAgreement,
}

/// A policy restricting which algorithms may be used.
pub trait AlgorithmConstraints {
    /// Whether `algorithm`, with optional `parameters`, may be used for `primitive`.
    fn permits(
        &self,
        primitive: CryptoPrimitive,
        algorithm: &str,
        parameters: Option<&GroupParameters>,
    ) -> bool;
}

impl<F> AlgorithmConstraints for F
where
    F: Fn(CryptoPrimitive, &str, Option<&GroupParameters>) -> bool,
{
    fn permits(
        &self,
        primitive: CryptoPrimitive,
        algorithm: &str,
        parameters: Option<&GroupParameters>,
    ) -> bool {
        self(primitive, algorithm, parameters)
    }
}

/// What a cipher suite requires of the key exchange group.
pub trait CipherSuiteGroups {
    /// Protocol versions the suite can be used with.
    fn supported_protocols(&self) -> &[ProtocolVersion];

    /// Families the suite's key exchange accepts, or `None` if any group will do.
    fn group_families(&self) -> Option<&[GroupFamily]>;
}

#[cfg(feature = "tls12")]
const ECDHE_FAMILIES: &[GroupFamily] = &[GroupFamily::EllipticCurve, GroupFamily::XCurve];
#[cfg(feature = "tls12")]
const DHE_FAMILIES: &[GroupFamily] = &[GroupFamily::FiniteField];

impl CipherSuiteGroups for SupportedCipherSuite {
    fn supported_protocols(&self) -> &[ProtocolVersion] {
        match self {
            #[cfg(feature = "tls12")]
            Self::Tls12(_) => &[ProtocolVersion::TLSv1_2],
            Self::Tls13(_) => &[ProtocolVersion::TLSv1_3],
        }
    }

    fn group_families(&self) -> Option<&[GroupFamily]> {
        match self {
            #[cfg(feature = "tls12")]
            Self::Tls12(suite) => match suite.kx {
                rustls::crypto::KeyExchangeAlgorithm::ECDHE => Some(ECDHE_FAMILIES),
                rustls::crypto::KeyExchangeAlgorithm::DHE => Some(DHE_FAMILIES),
                #[allow(unreachable_patterns)]
                _ => Some(&[]),
            },
            // TLS 1.3 suites do not fix the key exchange
            Self::Tls13(_) => None,
        }
    }
}

fn accepts<S: CipherSuiteGroups>(suite: &S, family: GroupFamily) -> bool {
    suite
        .group_families()
        .map_or(true, |families| families.contains(&family))
}

impl GroupFamily {
    /// Whether any of `suites` can use a group of this family.
    pub fn is_supported<S: CipherSuiteGroups>(self, suites: &[S]) -> bool {
        suites.iter().any(|suite| accepts(suite, self))
    }
}

impl NamedGroup {
    /// Whether the group is available and supports any of `protocols`.
    pub fn is_available_for_protocols(&self, protocols: &[ProtocolVersion]) -> bool {
        self.is_available()
            && self
                .supported_protocols()
                .iter()
                .any(|protocol| protocols.contains(protocol))
    }

    /// Whether the group is available and supports `protocol`.
    pub fn is_available_for_protocol(&self, protocol: ProtocolVersion) -> bool {
        self.is_available() && self.supported_protocols().contains(&protocol)
    }

    /// Whether any of `suites` can be negotiated with this group.
    ///
    /// The suite must share a protocol with the group, and its key exchange
    /// must accept the group's family.
    pub fn is_supported<S: CipherSuiteGroups>(&self, suites: &[S]) -> bool {
        suites.iter().any(|suite| {
            self.is_available_for_protocols(suite.supported_protocols())
                && accepts(suite, self.family())
        })
    }

    /// Whether `constraints` permit key agreement with this group, both by
    /// name and by its family's algorithm and parameters.
    pub fn is_permitted(&self, constraints: &dyn AlgorithmConstraints) -> bool {
        constraints.permits(CryptoPrimitive::KeyAgreement, self.name(), None)
            && constraints.permits(
                CryptoPrimitive::KeyAgreement,
                self.family().algorithm(),
                self.algorithm_parameters(),
            )
    }
}
