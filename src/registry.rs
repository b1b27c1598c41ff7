//! The registry of named groups.
use std::borrow::Cow;

use openssl::bn::BigNumRef;
use openssl::dh::Dh;
use openssl::ec::EcGroupRef;
use openssl::pkey::HasParams;
use rustls::crypto::{CryptoProvider, SupportedKxGroup};
use rustls::ProtocolVersion;
use tracing::trace;

use crate::named_group::{NamedGroup, CATALOGUE};
use crate::negotiation::{AlgorithmConstraints, CipherSuiteGroups};
use crate::probe::{AlgorithmProber, OpenSslProber, ProbeConfig};

/// Every catalogued named group, with its availability determined once at
/// initialisation.
///
/// The registry is immutable. Share it by reference, for example from a
/// `once_cell::sync::Lazy`:
///
/// ```rust
/// use once_cell::sync::Lazy;
/// use rustls_openssl_groups::Registry;
///
/// static REGISTRY: Lazy<Registry> = Lazy::new(Registry::initialize);
///
/// let x25519 = REGISTRY.lookup_by_id(0x001D).unwrap();
/// assert_eq!(x25519.name(), "x25519");
/// ```
#[derive(Debug)]
pub struct Registry {
    groups: Vec<NamedGroup>,
}

impl Registry {
    /// Probe every group against OpenSSL.
    pub fn initialize() -> Self {
        Self::with_prober(&ProbeConfig::default(), &OpenSslProber)
    }

    /// Probe every group with `prober`.
    pub fn with_prober(config: &ProbeConfig, prober: &dyn AlgorithmProber) -> Self {
        let groups = CATALOGUE
            .iter()
            .map(|definition| {
                let group = NamedGroup::probe(definition, config, prober);
                trace!(
                    group = group.name(),
                    id = group.id(),
                    available = group.is_available(),
                    "probed named group"
                );
                group
            })
            .collect();
        Self { groups }
    }

    /// All groups, in descending order of preference.
    pub fn groups(&self) -> &[NamedGroup] {
        &self.groups
    }

    /// The group with code point `id`.
    pub fn lookup_by_id(&self, id: u16) -> Option<&NamedGroup> {
        self.groups.iter().find(|group| group.id() == id)
    }

    /// The group with canonical name `name`.
    pub fn lookup_by_name(&self, name: &str) -> Option<&NamedGroup> {
        self.groups.iter().find(|group| group.name() == name)
    }

    /// The elliptic curve group that `curve` describes, whether it carries a
    /// curve name or explicit parameters.
    pub fn lookup_by_curve(&self, curve: &EcGroupRef) -> Option<&NamedGroup> {
        self.groups
            .iter()
            .find(|group| group.parameters().matches_curve(curve))
    }

    /// The finite field group with modulus `p` and generator `g`.
    pub fn lookup_by_finite_field(&self, p: &BigNumRef, g: &BigNumRef) -> Option<&NamedGroup> {
        self.groups
            .iter()
            .find(|group| group.parameters().matches_finite_field(p, g))
    }

    /// The finite field group of `dh`'s parameters.
    pub fn lookup_by_dh<T: HasParams>(&self, dh: &Dh<T>) -> Option<&NamedGroup> {
        self.lookup_by_finite_field(dh.prime_p(), dh.generator())
    }

    /// Groups that may be negotiated for `protocols` with one of `suites`,
    /// and that `constraints` permit, in descending order of preference.
    pub fn eligible<'a, S: CipherSuiteGroups>(
        &'a self,
        protocols: &'a [ProtocolVersion],
        suites: &'a [S],
        constraints: &'a dyn AlgorithmConstraints,
    ) -> impl Iterator<Item = &'a NamedGroup> + 'a {
        self.groups.iter().filter(move |group| {
            group.is_available_for_protocols(protocols)
                && group.is_supported(suites)
                && group.is_permitted(constraints)
        })
    }

    /// Available groups as rustls key exchange groups, in descending order of preference.
    ///
    /// If the `fips` feature is enabled, only FIPS-approved groups are returned.
    pub fn kx_groups(&'static self) -> Vec<&'static dyn SupportedKxGroup> {
        self.groups
            .iter()
            .filter(|group| group.is_available())
            .filter(|group| !cfg!(feature = "fips") || group.is_fips())
            .map(|group| group as &dyn SupportedKxGroup)
            .collect()
    }

    /// Replace `provider`'s key exchange groups with [Registry::kx_groups].
    ///
    /// ```rust
    /// use once_cell::sync::Lazy;
    /// use rustls_openssl_groups::Registry;
    ///
    /// static REGISTRY: Lazy<Registry> = Lazy::new(Registry::initialize);
    ///
    /// let provider = REGISTRY.with_kx_groups(rustls::crypto::aws_lc_rs::default_provider());
    /// assert_eq!(provider.kx_groups.len(), REGISTRY.kx_groups().len());
    /// ```
    pub fn with_kx_groups(&'static self, provider: CryptoProvider) -> CryptoProvider {
        CryptoProvider {
            kx_groups: self.kx_groups(),
            ..provider
        }
    }
}

/// Canonical name of the group with code point `id`, or
/// `UNDEFINED-NAMED-GROUP(<id>)` if there is none.
pub fn display_name(id: u16) -> Cow<'static, str> {
    match CATALOGUE.iter().find(|definition| definition.id() == id) {
        Some(definition) => Cow::Borrowed(definition.name()),
        None => Cow::Owned(format!("UNDEFINED-NAMED-GROUP({id})")),
    }
}

#[cfg(test)]
mod test {
    use openssl::bn::{BigNum, BigNumContext, BigNumRef};
    use openssl::dh::Dh;
    use openssl::ec::{EcGroup, EcPoint, PointConversionForm};
    use openssl::nid::Nid;
    use rustls::ffdhe_groups::FFDHE2048;
    use rustls::ProtocolVersion;

    use super::{display_name, Registry};
    use crate::error::ProbeError;
    use crate::kx_group::test::registry;
    use crate::named_group::{GroupFamily, GroupParameters, CATALOGUE};
    use crate::negotiation::CryptoPrimitive;
    use crate::probe::{AlgorithmProber, ProbeConfig};

    /// Has no finite field support.
    struct NoFiniteField;

    impl AlgorithmProber for NoFiniteField {
        fn init_parameters(
            &self,
            algorithm: &'static str,
            parameters: &GroupParameters,
        ) -> Result<(), ProbeError> {
            match parameters {
                GroupParameters::FiniteField(_) | GroupParameters::XCurve(_) => {
                    Err(ProbeError::NoParameters(algorithm))
                }
                _ => Ok(()),
            }
        }

        fn key_agreement(&self, _: &'static str, _: &GroupParameters) -> Result<(), ProbeError> {
            Ok(())
        }
    }

    fn permit_all(_: CryptoPrimitive, _: &str, _: Option<&GroupParameters>) -> bool {
        true
    }

    #[test]
    fn registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Registry>();
    }

    #[test]
    fn lookups_invert_the_catalogue() {
        let registry = registry();
        assert_eq!(registry.groups().len(), CATALOGUE.len());
        for group in registry.groups() {
            assert_eq!(registry.lookup_by_id(group.id()).unwrap().name(), group.name());
            assert_eq!(registry.lookup_by_name(group.name()).unwrap().id(), group.id());
            assert_eq!(display_name(group.id()), group.name());
        }
        assert!(registry.lookup_by_id(0x0000).is_none());
        assert!(registry.lookup_by_id(0x11EC).is_none());
        assert!(registry.lookup_by_name("X25519").is_none());
        assert!(registry.lookup_by_name("").is_none());
    }

    #[test]
    fn display_name_of_unknown_id() {
        assert_eq!(display_name(0x1234), "UNDEFINED-NAMED-GROUP(4660)");
        assert_eq!(display_name(0x001D), "x25519");
    }

    #[test]
    fn x25519_is_fips_and_tls13() {
        let registry = registry();
        let x25519 = registry.lookup_by_id(0x001D).unwrap();
        assert_eq!(x25519.name(), "x25519");
        assert_eq!(x25519.family(), GroupFamily::XCurve);
        assert!(x25519.is_fips());
        assert!(x25519.supported_protocols().contains(&ProtocolVersion::TLSv1_3));
        assert!(x25519.is_available_for_protocol(ProtocolVersion::TLSv1_3));
    }

    #[test]
    fn finite_field_lookup_by_value() {
        let registry = registry();
        let p = BigNum::from_slice(FFDHE2048.p).unwrap();
        let g = BigNum::from_slice(FFDHE2048.g).unwrap();
        assert_eq!(registry.lookup_by_finite_field(&p, &g).unwrap().name(), "ffdhe2048");

        // Two independently built parameter objects resolve to the same group
        let a = Dh::from_pqg(
            BigNum::from_slice(FFDHE2048.p).unwrap(),
            None,
            BigNum::from_slice(FFDHE2048.g).unwrap(),
        )
        .unwrap();
        let b = Dh::from_pqg(
            BigNum::from_slice(FFDHE2048.p).unwrap(),
            None,
            BigNum::from_u32(2).unwrap(),
        )
        .unwrap();
        assert_eq!(registry.lookup_by_dh(&a).unwrap().id(), 0x0100);
        assert_eq!(registry.lookup_by_dh(&b).unwrap().id(), 0x0100);

        let g5 = BigNum::from_u32(5).unwrap();
        assert!(registry.lookup_by_finite_field(&p, &g5).is_none());
    }

    #[test]
    fn curve_lookup_by_name_and_components() {
        let registry = registry();
        let named = EcGroup::from_curve_name(Nid::SECP384R1).unwrap();
        assert_eq!(registry.lookup_by_curve(&named).unwrap().name(), "secp384r1");

        let mut ctx = BigNumContext::new().unwrap();
        let (mut p, mut a, mut b, mut order) = (
            BigNum::new().unwrap(),
            BigNum::new().unwrap(),
            BigNum::new().unwrap(),
            BigNum::new().unwrap(),
        );
        named.components_gfp(&mut p, &mut a, &mut b, &mut ctx).unwrap();
        named.order(&mut order, &mut ctx).unwrap();
        let generator = named
            .generator_opt()
            .unwrap()
            .to_bytes(&named, PointConversionForm::UNCOMPRESSED, &mut ctx)
            .unwrap();

        // Without a generator the curve cannot be identified
        let bare = EcGroup::from_components(
            BigNumRef::to_owned(&p).unwrap(),
            BigNumRef::to_owned(&a).unwrap(),
            BigNumRef::to_owned(&b).unwrap(),
            &mut ctx,
        )
        .unwrap();
        assert!(bare.generator_opt().is_none());
        assert!(registry.lookup_by_curve(&bare).is_none());

        let mut explicit = EcGroup::from_components(p, a, b, &mut ctx).unwrap();
        let generator = EcPoint::from_bytes(&explicit, &generator, &mut ctx).unwrap();
        explicit
            .set_generator(generator, order, BigNum::from_u32(1).unwrap())
            .unwrap();
        assert_eq!(registry.lookup_by_curve(&explicit).unwrap().name(), "secp384r1");

        let brainpool = EcGroup::from_curve_name(Nid::BRAINPOOL_P256R1).unwrap();
        assert!(registry.lookup_by_curve(&brainpool).is_none());
    }

    #[test]
    fn unavailable_groups_are_never_available() {
        let registry = Registry::with_prober(
            &ProbeConfig {
                xdh_key_agreement_fallback: false,
            },
            &NoFiniteField,
        );
        let all = [
            ProtocolVersion::TLSv1_3,
            ProtocolVersion::TLSv1_2,
            ProtocolVersion::TLSv1_0,
        ];
        for group in registry.groups() {
            let expected = group.family() == GroupFamily::EllipticCurve;
            assert_eq!(group.is_available(), expected, "{group}");
            assert_eq!(group.is_available_for_protocols(&all), expected, "{group}");
            if !expected {
                assert!(group.algorithm_parameters().is_none());
            }
        }
    }

    #[test]
    fn eligible_groups_keep_catalogue_order() {
        let registry = registry();
        let suites = [rustls::crypto::aws_lc_rs::cipher_suite::TLS13_AES_256_GCM_SHA384];

        let names: Vec<_> = registry
            .eligible(&[ProtocolVersion::TLSv1_3], &suites, &permit_all)
            .map(|group| group.name())
            .collect();
        assert_eq!(
            names,
            [
                "secp521r1",
                "secp384r1",
                "secp256r1",
                "ffdhe8192",
                "ffdhe6144",
                "ffdhe4096",
                "ffdhe3072",
                "ffdhe2048",
                "x448",
                "x25519",
            ]
        );

        let no_dh = |_: CryptoPrimitive, algorithm: &str, _: Option<&GroupParameters>| {
            algorithm != "DiffieHellman" && algorithm != "secp521r1"
        };
        let names: Vec<_> = registry
            .eligible(&[ProtocolVersion::TLSv1_3], &suites, &no_dh)
            .map(|group| group.name())
            .collect();
        assert_eq!(names, ["secp384r1", "secp256r1", "x448", "x25519"]);
    }

    #[cfg(not(feature = "fips"))]
    #[test]
    fn kx_groups_are_the_available_groups() {
        static REGISTRY: once_cell::sync::Lazy<Registry> =
            once_cell::sync::Lazy::new(Registry::initialize);

        let names: Vec<_> = REGISTRY
            .kx_groups()
            .iter()
            .map(|group| group.name())
            .collect();
        let expected: Vec<_> = REGISTRY
            .groups()
            .iter()
            .filter(|group| group.is_available())
            .map(|group| group.named_group())
            .collect();
        assert_eq!(names, expected);
        assert!(names.contains(&rustls::NamedGroup::X25519));
    }
}
