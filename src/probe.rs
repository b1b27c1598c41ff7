//! Probing which groups the crypto provider supports.
//!
//! Every catalogue entry is probed once, when the [Registry](crate::Registry)
//! is initialised. Failures are never raised: the group is recorded as
//! unavailable and a diagnostic is emitted through `tracing`.
use openssl::bn::BigNum;
use openssl::derive::Deriver;
use openssl::dh::Dh;
use openssl::ec::EcGroup;
use openssl::pkey::PKey;
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::named_group::{GroupFamily, GroupParameters, XCurve};

/// Options for probing the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Treat an X-curve as available when its key agreement works, even
    /// though the provider produced no parameter object for it.
    ///
    /// OpenSSL has no parameter object for X25519 or X448. Disabling this
    /// makes every X-curve unavailable unless the prober can initialise
    /// parameters for it. Only X-curves fall back this way.
    pub xdh_key_agreement_fallback: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            xdh_key_agreement_fallback: true,
        }
    }
}

/// The provider's support for a group, as determined by [probe].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Availability {
    /// Algorithm parameters were initialised.
    Parameters,
    /// No parameters, but the key agreement exists.
    KeyAgreementOnly,
    Unavailable,
}

/// Initialises a provider's support for group algorithms.
pub trait AlgorithmProber {
    /// Initialise the parameters of `algorithm` (see [GroupFamily::algorithm]).
    fn init_parameters(
        &self,
        algorithm: &'static str,
        parameters: &GroupParameters,
    ) -> Result<(), ProbeError>;

    /// Check that a key agreement exists for the group `name`.
    fn key_agreement(&self, name: &'static str, parameters: &GroupParameters)
        -> Result<(), ProbeError>;
}

/// Probes OpenSSL.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenSslProber;

impl AlgorithmProber for OpenSslProber {
    fn init_parameters(
        &self,
        algorithm: &'static str,
        parameters: &GroupParameters,
    ) -> Result<(), ProbeError> {
        match parameters {
            GroupParameters::Curve(nid) => {
                EcGroup::from_curve_name(*nid)?;
            }
            GroupParameters::FiniteField(group) => {
                Dh::from_pqg(BigNum::from_slice(group.p)?, None, BigNum::from_slice(group.g)?)?;
            }
            GroupParameters::XCurve(_) | GroupParameters::None => {
                return Err(ProbeError::NoParameters(algorithm));
            }
        }
        Ok(())
    }

    fn key_agreement(
        &self,
        name: &'static str,
        parameters: &GroupParameters,
    ) -> Result<(), ProbeError> {
        let key = match parameters {
            GroupParameters::XCurve(XCurve::X25519) => PKey::generate_x25519()?,
            GroupParameters::XCurve(XCurve::X448) => PKey::generate_x448()?,
            _ => return Err(ProbeError::NoKeyAgreement(name)),
        };
        Deriver::new(&key)?;
        Ok(())
    }
}

/// Determine whether the provider supports a group.
pub(crate) fn probe(
    name: &'static str,
    family: GroupFamily,
    parameters: &GroupParameters,
    config: &ProbeConfig,
    prober: &dyn AlgorithmProber,
) -> Availability {
    let err = match prober.init_parameters(family.algorithm(), parameters) {
        Ok(()) => return Availability::Parameters,
        Err(e) => e,
    };

    // TODO: drop this fallback once OpenSSL can produce X25519/X448 parameter objects.
    if family == GroupFamily::XCurve && config.xdh_key_agreement_fallback {
        debug!(group = name, error = %err, "no algorithm parameters, checking key agreement");
        return match prober.key_agreement(name, parameters) {
            Ok(()) => Availability::KeyAgreementOnly,
            Err(e) => {
                warn!(group = name, error = %e, "no key agreement, group unavailable");
                Availability::Unavailable
            }
        };
    }

    warn!(group = name, error = %err, "no algorithm parameters, group unavailable");
    Availability::Unavailable
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use openssl::nid::Nid;
    use rustls::ffdhe_groups::FFDHE2048;

    use super::{probe, AlgorithmProber, Availability, OpenSslProber, ProbeConfig};
    use crate::error::ProbeError;
    use crate::named_group::{GroupFamily, GroupParameters, XCurve};

    /// Fails every parameter initialisation, counting key agreement probes.
    #[derive(Default)]
    struct NoParameters {
        key_agreements: Cell<usize>,
    }

    impl AlgorithmProber for NoParameters {
        fn init_parameters(
            &self,
            algorithm: &'static str,
            _: &GroupParameters,
        ) -> Result<(), ProbeError> {
            Err(ProbeError::NoParameters(algorithm))
        }

        fn key_agreement(&self, _: &'static str, _: &GroupParameters) -> Result<(), ProbeError> {
            self.key_agreements.set(self.key_agreements.get() + 1);
            Ok(())
        }
    }

    #[rstest::rstest]
    #[case::secp256r1(GroupFamily::EllipticCurve, GroupParameters::Curve(Nid::X9_62_PRIME256V1))]
    #[case::secp384r1(GroupFamily::EllipticCurve, GroupParameters::Curve(Nid::SECP384R1))]
    #[case::ffdhe2048(GroupFamily::FiniteField, GroupParameters::FiniteField(FFDHE2048))]
    fn openssl_initialises_parameters(
        #[case] family: GroupFamily,
        #[case] parameters: GroupParameters,
    ) {
        let availability = probe(
            "test",
            family,
            &parameters,
            &ProbeConfig::default(),
            &OpenSslProber,
        );
        assert_eq!(availability, Availability::Parameters);
    }

    #[rstest::rstest]
    #[case::x25519("x25519", XCurve::X25519)]
    #[case::x448("x448", XCurve::X448)]
    fn openssl_xcurves_fall_back_to_key_agreement(
        #[case] name: &'static str,
        #[case] curve: XCurve,
    ) {
        let availability = probe(
            name,
            GroupFamily::XCurve,
            &GroupParameters::XCurve(curve),
            &ProbeConfig::default(),
            &OpenSslProber,
        );
        assert_eq!(availability, Availability::KeyAgreementOnly);
    }

    #[test]
    fn fallback_can_be_disabled() {
        let config = ProbeConfig {
            xdh_key_agreement_fallback: false,
        };
        let availability = probe(
            "x25519",
            GroupFamily::XCurve,
            &GroupParameters::XCurve(XCurve::X25519),
            &config,
            &OpenSslProber,
        );
        assert_eq!(availability, Availability::Unavailable);
    }

    #[test]
    fn fallback_is_only_for_xcurves() {
        let prober = NoParameters::default();
        let availability = probe(
            "secp256r1",
            GroupFamily::EllipticCurve,
            &GroupParameters::Curve(Nid::X9_62_PRIME256V1),
            &ProbeConfig::default(),
            &prober,
        );
        assert_eq!(availability, Availability::Unavailable);
        assert_eq!(prober.key_agreements.get(), 0);

        let availability = probe(
            "x448",
            GroupFamily::XCurve,
            &GroupParameters::XCurve(XCurve::X448),
            &ProbeConfig::default(),
            &prober,
        );
        assert_eq!(availability, Availability::KeyAgreementOnly);
        assert_eq!(prober.key_agreements.get(), 1);
    }

    #[test]
    fn no_parameters_is_unavailable() {
        let availability = probe(
            "none",
            GroupFamily::None,
            &GroupParameters::None,
            &ProbeConfig::default(),
            &OpenSslProber,
        );
        assert_eq!(availability, Availability::Unavailable);
    }
}
