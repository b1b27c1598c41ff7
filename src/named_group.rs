//! Named groups for TLS key exchange, and the catalogue they are built from.
use core::fmt;

use openssl::bn::{BigNum, BigNumContext, BigNumRef};
use openssl::ec::{EcGroup, EcGroupRef, PointConversionForm};
use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::pkey::Id;
use rustls::ffdhe_groups::{self, FfdheGroup};
use rustls::ProtocolVersion;

use crate::kx_group::{self, NamedGroupScheme};
use crate::probe::{self, AlgorithmProber, Availability, ProbeConfig};

/// The kind of key exchange a group belongs to.
///
/// Selects the scheme that implements the group's handshake operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupFamily {
    /// Elliptic curve groups (ECDHE).
    EllipticCurve,
    /// Finite field groups (DHE).
    FiniteField,
    /// Montgomery curve groups (XDH).
    XCurve,
    /// Arbitrary prime and characteristic-2 curves; not a predefined group.
    ArbitraryEc,
    /// Not a predefined named group.
    None,
}

impl GroupFamily {
    /// Key exchange algorithm label, as passed to [AlgorithmConstraints](crate::AlgorithmConstraints).
    pub fn algorithm(self) -> &'static str {
        match self {
            Self::EllipticCurve | Self::ArbitraryEc => "EC",
            Self::FiniteField => "DiffieHellman",
            Self::XCurve => "XDH",
            Self::None => "",
        }
    }

    pub(crate) fn scheme(self) -> &'static dyn NamedGroupScheme {
        match self {
            Self::EllipticCurve => &kx_group::ec::EcdheScheme,
            Self::FiniteField => &kx_group::ffdhe::FfdheScheme,
            Self::XCurve => &kx_group::xdh::XdhScheme,
            Self::ArbitraryEc | Self::None => &kx_group::NoScheme,
        }
    }
}

/// Montgomery curves usable for XDH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XCurve {
    /// Curve25519 ([RFC 7748](https://www.rfc-editor.org/rfc/rfc7748)).
    X25519,
    /// Curve448 ([RFC 7748](https://www.rfc-editor.org/rfc/rfc7748)).
    X448,
}

impl XCurve {
    /// Length of both private and public keys in bytes.
    pub fn key_len(self) -> usize {
        match self {
            Self::X25519 => 32,
            Self::X448 => 56,
        }
    }

    pub(crate) fn id(self) -> Id {
        match self {
            Self::X25519 => Id::X25519,
            Self::X448 => Id::X448,
        }
    }
}

/// Family specific parameters of a named group.
#[derive(Debug, Clone)]
pub enum GroupParameters {
    /// An OpenSSL named curve.
    Curve(Nid),
    /// A finite field group from [RFC 7919](https://www.rfc-editor.org/rfc/rfc7919).
    FiniteField(FfdheGroup<'static>),
    /// A Montgomery curve.
    XCurve(XCurve),
    /// No parameters.
    None,
}

impl GroupParameters {
    /// Whether `candidate` describes this curve, either by curve name or by
    /// having the same field, coefficients, order and generator.
    pub fn matches_curve(&self, candidate: &EcGroupRef) -> bool {
        let Self::Curve(nid) = self else {
            return false;
        };
        if candidate.curve_name() == Some(*nid) {
            return true;
        }
        EcGroup::from_curve_name(*nid)
            .and_then(|known| same_curve(&known, candidate))
            .unwrap_or(false)
    }

    /// Whether the modulus and generator equal this finite field group's.
    pub fn matches_finite_field(&self, p: &BigNumRef, g: &BigNumRef) -> bool {
        let Self::FiniteField(group) = self else {
            return false;
        };
        trim_leading_zeros(group.p) == p.to_vec().as_slice()
            && trim_leading_zeros(group.g) == g.to_vec().as_slice()
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn same_curve(a: &EcGroupRef, b: &EcGroupRef) -> Result<bool, ErrorStack> {
    let mut ctx = BigNumContext::new()?;
    let components = |group: &EcGroupRef, ctx: &mut BigNumContext| {
        let (mut p, mut a, mut b, mut order) =
            (BigNum::new()?, BigNum::new()?, BigNum::new()?, BigNum::new()?);
        group.components_gfp(&mut p, &mut a, &mut b, ctx)?;
        group.order(&mut order, ctx)?;
        let generator = group
            .generator_opt()
            .map(|g| g.to_bytes(group, PointConversionForm::UNCOMPRESSED, ctx))
            .transpose()?;
        Ok::<_, ErrorStack>((p.to_vec(), a.to_vec(), b.to_vec(), order.to_vec(), generator))
    };
    Ok(components(a, &mut ctx)? == components(b, &mut ctx)?)
}

/// Protocols that may negotiate groups defined before TLS 1.3.
const PROTOCOLS_TO_12: &[ProtocolVersion] = &[
    ProtocolVersion::TLSv1_2,
    ProtocolVersion::TLSv1_1,
    ProtocolVersion::TLSv1_0,
    ProtocolVersion::SSLv3,
    ProtocolVersion::DTLSv1_2,
    ProtocolVersion::DTLSv1_0,
];

/// Protocols that may negotiate groups usable with TLS 1.3.
const PROTOCOLS_TO_13: &[ProtocolVersion] = &[
    ProtocolVersion::TLSv1_3,
    ProtocolVersion::TLSv1_2,
    ProtocolVersion::TLSv1_1,
    ProtocolVersion::TLSv1_0,
    ProtocolVersion::SSLv3,
    ProtocolVersion::DTLSv1_2,
    ProtocolVersion::DTLSv1_0,
];

/// A catalogue entry, before its availability is known.
pub(crate) struct GroupDefinition {
    id: u16,
    name: &'static str,
    is_fips: bool,
    family: GroupFamily,
    supported_protocols: &'static [ProtocolVersion],
    parameters: GroupParameters,
}

impl GroupDefinition {
    pub(crate) fn id(&self) -> u16 {
        self.id
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }
}

/// Every supported group, in descending order of preference.
///
/// Code points are those registered with
/// [IANA](https://www.iana.org/assignments/tls-parameters/tls-parameters.xhtml#tls-parameters-8).
pub(crate) const CATALOGUE: &[GroupDefinition] = &[
    // NIST P-521
    GroupDefinition {
        id: 0x0019,
        name: "secp521r1",
        is_fips: true,
        family: GroupFamily::EllipticCurve,
        supported_protocols: PROTOCOLS_TO_13,
        parameters: GroupParameters::Curve(Nid::SECP521R1),
    },
    // NIST P-384
    GroupDefinition {
        id: 0x0018,
        name: "secp384r1",
        is_fips: true,
        family: GroupFamily::EllipticCurve,
        supported_protocols: PROTOCOLS_TO_13,
        parameters: GroupParameters::Curve(Nid::SECP384R1),
    },
    // NIST P-256
    GroupDefinition {
        id: 0x0017,
        name: "secp256r1",
        is_fips: true,
        family: GroupFamily::EllipticCurve,
        supported_protocols: PROTOCOLS_TO_13,
        parameters: GroupParameters::Curve(Nid::X9_62_PRIME256V1),
    },
    GroupDefinition {
        id: 0x0016,
        name: "secp256k1",
        is_fips: false,
        family: GroupFamily::EllipticCurve,
        supported_protocols: PROTOCOLS_TO_12,
        parameters: GroupParameters::Curve(Nid::SECP256K1),
    },
    GroupDefinition {
        id: 0x0104,
        name: "ffdhe8192",
        is_fips: true,
        family: GroupFamily::FiniteField,
        supported_protocols: PROTOCOLS_TO_13,
        parameters: GroupParameters::FiniteField(ffdhe_groups::FFDHE8192),
    },
    GroupDefinition {
        id: 0x0103,
        name: "ffdhe6144",
        is_fips: true,
        family: GroupFamily::FiniteField,
        supported_protocols: PROTOCOLS_TO_13,
        parameters: GroupParameters::FiniteField(ffdhe_groups::FFDHE6144),
    },
    GroupDefinition {
        id: 0x0102,
        name: "ffdhe4096",
        is_fips: true,
        family: GroupFamily::FiniteField,
        supported_protocols: PROTOCOLS_TO_13,
        parameters: GroupParameters::FiniteField(ffdhe_groups::FFDHE4096),
    },
    GroupDefinition {
        id: 0x0101,
        name: "ffdhe3072",
        is_fips: true,
        family: GroupFamily::FiniteField,
        supported_protocols: PROTOCOLS_TO_13,
        parameters: GroupParameters::FiniteField(ffdhe_groups::FFDHE3072),
    },
    GroupDefinition {
        id: 0x0100,
        name: "ffdhe2048",
        is_fips: true,
        family: GroupFamily::FiniteField,
        supported_protocols: PROTOCOLS_TO_13,
        parameters: GroupParameters::FiniteField(ffdhe_groups::FFDHE2048),
    },
    GroupDefinition {
        id: 0x001E,
        name: "x448",
        is_fips: true,
        family: GroupFamily::XCurve,
        supported_protocols: PROTOCOLS_TO_13,
        parameters: GroupParameters::XCurve(XCurve::X448),
    },
    GroupDefinition {
        id: 0x001D,
        name: "x25519",
        is_fips: true,
        family: GroupFamily::XCurve,
        supported_protocols: PROTOCOLS_TO_13,
        parameters: GroupParameters::XCurve(XCurve::X25519),
    },
];

/// A TLS named group, with the provider's support for it.
///
/// Instances are created once by [Registry](crate::Registry) and are immutable.
#[derive(Clone)]
pub struct NamedGroup {
    id: u16,
    name: &'static str,
    is_fips: bool,
    family: GroupFamily,
    supported_protocols: &'static [ProtocolVersion],
    parameters: GroupParameters,
    availability: Availability,
    pub(crate) scheme: &'static dyn NamedGroupScheme,
}

impl NamedGroup {
    pub(crate) fn probe(
        definition: &GroupDefinition,
        config: &ProbeConfig,
        prober: &dyn AlgorithmProber,
    ) -> Self {
        let availability = probe::probe(
            definition.name,
            definition.family,
            &definition.parameters,
            config,
            prober,
        );
        Self {
            id: definition.id,
            name: definition.name,
            is_fips: definition.is_fips,
            family: definition.family,
            supported_protocols: definition.supported_protocols,
            parameters: definition.parameters.clone(),
            availability,
            scheme: definition.family.scheme(),
        }
    }

    /// The 16-bit code point used on the wire.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// The code point as a rustls [NamedGroup](rustls::NamedGroup).
    pub fn named_group(&self) -> rustls::NamedGroup {
        rustls::NamedGroup::from(self.id)
    }

    /// Canonical name, e.g. `x25519`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the group may be used in FIPS mode.
    pub fn is_fips(&self) -> bool {
        self.is_fips
    }

    /// The family, which selects the key exchange scheme.
    pub fn family(&self) -> GroupFamily {
        self.family
    }

    /// Protocol versions for which the group may be negotiated.
    pub fn supported_protocols(&self) -> &'static [ProtocolVersion] {
        self.supported_protocols
    }

    /// The catalogue's parameter descriptor, whether or not it is available.
    pub fn parameters(&self) -> &GroupParameters {
        &self.parameters
    }

    /// Whether the provider could initialise the group's algorithm.
    pub fn is_available(&self) -> bool {
        self.availability != Availability::Unavailable
    }

    /// The parameters the provider initialised, if it produced any.
    ///
    /// `None` for unavailable groups and for X-curves, which are only known
    /// to be available through their key agreement.
    pub fn algorithm_parameters(&self) -> Option<&GroupParameters> {
        (self.availability == Availability::Parameters).then_some(&self.parameters)
    }
}

impl fmt::Debug for NamedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedGroup")
            .field("id", &format_args!("{:#06x}", self.id))
            .field("name", &self.name)
            .field("is_fips", &self.is_fips)
            .field("family", &self.family)
            .field("availability", &self.availability)
            .finish()
    }
}

impl fmt::Display for NamedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
