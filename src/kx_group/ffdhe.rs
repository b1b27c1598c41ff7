use core::cmp::Ordering;
use core::fmt;

use openssl::bn::{BigNum, BigNumRef};
use openssl::derive::Deriver;
use openssl::dh::Dh;
use openssl::pkey::{PKey, Private, Public};
use rustls::crypto::SecureRandom;
use rustls::ffdhe_groups::FfdheGroup;
use zeroize::Zeroize;

use super::{
    key_derivation, Credentials, HandshakeContext, KeyDerivation, NamedGroupScheme, Possession,
};
use crate::error::{Error, Result};
use crate::named_group::{GroupFamily, GroupParameters, NamedGroup};

/// Finite field DHE over the [RFC 7919](https://www.rfc-editor.org/rfc/rfc7919) groups.
///
/// Public values are big-endian integers left-padded to the length of the prime.
/// Shorter peer values are accepted.
#[derive(Debug)]
pub(crate) struct FfdheScheme;

/// A finite field DHE key pair.
pub struct FfdhePossession {
    pub(super) group: u16,
    key: PKey<Private>,
    prime_len: usize,
    pub(super) public_key: Vec<u8>,
}

/// A peer's finite field DHE public value.
pub struct FfdheCredentials {
    pub(super) group: u16,
    value: BigNum,
    prime_len: usize,
}

fn parameters(group: &NamedGroup) -> Result<&FfdheGroup<'static>> {
    match group.parameters() {
        GroupParameters::FiniteField(params) => Ok(params),
        _ => Err(Error::UnsupportedGroup(group.name())),
    }
}

/// Private exponent size, at least twice the group's security strength
/// ([RFC 7919 section 5.2](https://www.rfc-editor.org/rfc/rfc7919#section-5.2)).
fn exponent_bits(prime_bits: i32) -> usize {
    match prime_bits {
        ..=2048 => 256,
        ..=3072 => 320,
        ..=4096 => 384,
        ..=6144 => 448,
        _ => 512,
    }
}

impl FfdhePossession {
    /// Build a key pair from a private exponent.
    pub(super) fn from_exponent(
        group: u16,
        params: &FfdheGroup<'static>,
        exponent: BigNum,
    ) -> Result<Self> {
        let p = BigNum::from_slice(params.p)?;
        let prime_len = p.num_bytes() as usize;
        let key = Dh::from_pqg(p, None, BigNum::from_slice(params.g)?)?.set_private_key(exponent)?;
        let public_key = key.public_key().to_vec_padded(prime_len as i32)?;
        Ok(Self {
            group,
            key: PKey::from_dh(key)?,
            prime_len,
            public_key,
        })
    }
}

impl FfdheCredentials {
    pub(super) fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.value.to_vec_padded(self.prime_len as i32)?)
    }
}

fn peer_key(possession: &FfdhePossession, value: &BigNumRef) -> Result<PKey<Public>> {
    let dh = possession.key.dh()?;
    let params = Dh::from_pqg(
        BigNumRef::to_owned(dh.prime_p())?,
        None,
        BigNumRef::to_owned(dh.generator())?,
    )?;
    Ok(PKey::from_dh(params.set_public_key(BigNumRef::to_owned(value)?)?)?)
}

/// The shared secret `y^x mod p`, left-padded to the length of the prime.
pub(super) fn agree(
    possession: &FfdhePossession,
    credentials: &FfdheCredentials,
) -> Result<Vec<u8>> {
    let peer = peer_key(possession, &credentials.value)?;
    let mut deriver = Deriver::new(&possession.key)?;
    deriver.set_peer(&peer)?;
    let mut secret = deriver.derive_to_vec()?;
    if secret.len() < possession.prime_len {
        let mut padded = vec![0u8; possession.prime_len - secret.len()];
        padded.extend_from_slice(&secret);
        secret.zeroize();
        secret = padded;
    }
    Ok(secret)
}

impl NamedGroupScheme for FfdheScheme {
    fn encode_public_key(&self, possession: &Possession) -> Option<Vec<u8>> {
        match possession {
            Possession::Ffdhe(p) => Some(p.public_key.clone()),
            _ => None,
        }
    }

    fn decode_credentials(
        &self,
        group: &NamedGroup,
        encoded: &[u8],
    ) -> Result<Option<Credentials>> {
        let params = parameters(group)?;
        let invalid = |reason| Error::InvalidKeyShare {
            group: group.name(),
            reason,
        };

        let p = BigNum::from_slice(params.p)?;
        let prime_len = p.num_bytes() as usize;
        if encoded.is_empty() || encoded.len() > prime_len {
            return Err(invalid("public value has wrong length"));
        }

        // 1 < y < p - 1
        let value = BigNum::from_slice(encoded)?;
        let mut upper = p;
        upper.sub_word(1)?;
        if value.num_bits() <= 1 || value.ucmp(&upper) != Ordering::Less {
            return Err(invalid("public value out of range"));
        }

        Ok(Some(Credentials::Ffdhe(FfdheCredentials {
            group: group.id(),
            value,
            prime_len,
        })))
    }

    fn create_possession(
        &self,
        group: &NamedGroup,
        random: &dyn SecureRandom,
    ) -> Result<Option<Possession>> {
        let params = parameters(group)?;
        let prime_bits = BigNum::from_slice(params.p)?.num_bits();
        let mut bytes = vec![0u8; exponent_bits(prime_bits) / 8];
        random.fill(&mut bytes)?;
        // Fix the top bit so the exponent has its full size and is never zero
        bytes[0] |= 0x80;
        let exponent = BigNum::from_slice(&bytes);
        bytes.zeroize();

        let possession = FfdhePossession::from_exponent(group.id(), params, exponent?)?;
        Ok(Some(Possession::Ffdhe(possession)))
    }

    fn create_key_derivation<'a>(
        &self,
        context: &'a dyn HandshakeContext,
    ) -> Result<Option<KeyDerivation<'a>>> {
        key_derivation(context, GroupFamily::FiniteField, "DHE")
    }
}

impl fmt::Debug for FfdhePossession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FfdhePossession")
            .field("group", &format_args!("{:#06x}", self.group))
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for FfdheCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FfdheCredentials")
            .field("group", &format_args!("{:#06x}", self.group))
            .finish_non_exhaustive()
    }
}
