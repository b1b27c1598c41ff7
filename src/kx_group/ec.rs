use core::cmp::Ordering;
use core::fmt;

use openssl::bn::{BigNum, BigNumContext, BigNumRef};
use openssl::derive::Deriver;
use openssl::ec::{EcGroup, EcGroupRef, EcKey, EcPoint, PointConversionForm};
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Private, Public};
use rustls::crypto::SecureRandom;
use zeroize::Zeroize;

use super::{
    key_derivation, Credentials, HandshakeContext, KeyDerivation, NamedGroupScheme, Possession,
};
use crate::error::{Error, Result};
use crate::named_group::{GroupFamily, GroupParameters, NamedGroup};

/// Attempts at drawing a scalar below the group order before giving up.
const MAX_SCALAR_ATTEMPTS: usize = 64;

/// ECDHE over OpenSSL named curves, with uncompressed point encoding.
#[derive(Debug)]
pub(crate) struct EcdheScheme;

/// An ECDHE key pair.
pub struct EcPossession {
    pub(super) group: u16,
    priv_key: PKey<Private>,
    pub(super) public_key: Vec<u8>,
}

/// A peer's ECDHE public point.
pub struct EcCredentials {
    pub(super) group: u16,
    pub_key: EcKey<Public>,
}

fn curve(group: &NamedGroup) -> Result<EcGroup> {
    match group.parameters() {
        GroupParameters::Curve(nid) => Ok(EcGroup::from_curve_name(*nid)?),
        _ => Err(Error::UnsupportedGroup(group.name())),
    }
}

impl EcPossession {
    /// Build a key pair from a private scalar.
    pub(super) fn from_scalar(
        group: u16,
        curve: &EcGroupRef,
        scalar: &BigNumRef,
    ) -> core::result::Result<Self, ErrorStack> {
        let mut ctx = BigNumContext::new()?;
        let mut point = EcPoint::new(curve)?;
        point.mul_generator(curve, scalar, &ctx)?;
        let public_key = point.to_bytes(curve, PointConversionForm::UNCOMPRESSED, &mut ctx)?;
        let priv_key = EcKey::from_private_components(curve, scalar, &point)?;
        Ok(Self {
            group,
            priv_key: PKey::from_ec_key(priv_key)?,
            public_key,
        })
    }
}

/// Draw a scalar in `[1, order)`.
fn random_scalar(order: &BigNumRef, random: &dyn SecureRandom) -> Result<BigNum> {
    let bits = order.num_bits() as usize;
    let mut bytes = vec![0u8; bits.div_ceil(8)];
    let excess = bytes.len() * 8 - bits;

    for _ in 0..MAX_SCALAR_ATTEMPTS {
        random.fill(&mut bytes)?;
        bytes[0] &= 0xff >> excess;
        let scalar = BigNum::from_slice(&bytes)?;
        if scalar.num_bits() > 0 && scalar.ucmp(order) == Ordering::Less {
            bytes.zeroize();
            return Ok(scalar);
        }
    }
    bytes.zeroize();
    Err(Error::Random)
}

impl EcCredentials {
    pub(super) fn encode(&self) -> Result<Vec<u8>> {
        let mut ctx = BigNumContext::new()?;
        Ok(self.pub_key.public_key().to_bytes(
            self.pub_key.group(),
            PointConversionForm::UNCOMPRESSED,
            &mut ctx,
        )?)
    }
}

/// Decode an uncompressed point and check it is on the curve.
fn load_peer_key(
    curve: &EcGroupRef,
    encoded: &[u8],
) -> core::result::Result<EcKey<Public>, ErrorStack> {
    let mut ctx = BigNumContext::new()?;
    let point = EcPoint::from_bytes(curve, encoded, &mut ctx)?;
    let peer_key = EcKey::from_public_key(curve, &point)?;
    peer_key.check_key()?;
    Ok(peer_key)
}

pub(super) fn agree(possession: &EcPossession, credentials: &EcCredentials) -> Result<Vec<u8>> {
    let peer_key = PKey::from_ec_key(credentials.pub_key.clone())?;
    let mut deriver = Deriver::new(&possession.priv_key)?;
    deriver.set_peer(&peer_key)?;
    Ok(deriver.derive_to_vec()?)
}

impl NamedGroupScheme for EcdheScheme {
    fn encode_public_key(&self, possession: &Possession) -> Option<Vec<u8>> {
        match possession {
            Possession::Ec(p) => Some(p.public_key.clone()),
            _ => None,
        }
    }

    fn decode_credentials(
        &self,
        group: &NamedGroup,
        encoded: &[u8],
    ) -> Result<Option<Credentials>> {
        let curve = curve(group)?;
        let invalid = |reason| Error::InvalidKeyShare {
            group: group.name(),
            reason,
        };

        // Only the uncompressed form is accepted, see https://www.rfc-editor.org/rfc/rfc8446#section-4.2.8.2
        if encoded.first() != Some(&0x04) {
            return Err(invalid("point is not uncompressed"));
        }
        let field_len = (curve.degree() as usize).div_ceil(8);
        if encoded.len() != 1 + 2 * field_len {
            return Err(invalid("wrong point length"));
        }

        let pub_key =
            load_peer_key(&curve, encoded).map_err(|_| invalid("point is not on the curve"))?;
        Ok(Some(Credentials::Ec(EcCredentials {
            group: group.id(),
            pub_key,
        })))
    }

    fn create_possession(
        &self,
        group: &NamedGroup,
        random: &dyn SecureRandom,
    ) -> Result<Option<Possession>> {
        let curve = curve(group)?;
        let mut ctx = BigNumContext::new()?;
        let mut order = BigNum::new()?;
        curve.order(&mut order, &mut ctx)?;

        let scalar = random_scalar(&order, random)?;
        let possession = EcPossession::from_scalar(group.id(), &curve, &scalar)?;
        Ok(Some(Possession::Ec(possession)))
    }

    fn create_key_derivation<'a>(
        &self,
        context: &'a dyn HandshakeContext,
    ) -> Result<Option<KeyDerivation<'a>>> {
        key_derivation(context, GroupFamily::EllipticCurve, "ECDHE")
    }
}

impl fmt::Debug for EcPossession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcPossession")
            .field("group", &format_args!("{:#06x}", self.group))
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for EcCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcCredentials")
            .field("group", &format_args!("{:#06x}", self.group))
            .finish_non_exhaustive()
    }
}
