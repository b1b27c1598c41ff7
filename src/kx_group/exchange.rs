use rustls::crypto::{ActiveKeyExchange, SharedSecret, SupportedKxGroup};
use rustls::ffdhe_groups::FfdheGroup;
use rustls::{ProtocolVersion, SupportedProtocolVersion};

use super::{KeyDerivation, Possession};
use crate::error::Error;
use crate::named_group::{GroupParameters, NamedGroup};

/// An ephemeral exchange started through [SupportedKxGroup::start].
#[derive(Debug)]
struct KeyExchange {
    group: NamedGroup,
    possession: Possession,
}

impl KeyExchange {
    fn complete_for(
        &self,
        peer_pub_key: &[u8],
        version: ProtocolVersion,
    ) -> Result<SharedSecret, Error> {
        let credentials = self
            .group
            .decode_credentials(peer_pub_key)?
            .ok_or(Error::UnsupportedGroup(self.group.name()))?;
        KeyDerivation::new(&self.possession, &credentials, version).derive()
    }
}

impl SupportedKxGroup for NamedGroup {
    fn start(&self) -> Result<Box<dyn ActiveKeyExchange>, rustls::Error> {
        let possession = self
            .create_possession(&crate::SecureRandom)?
            .ok_or(Error::UnsupportedGroup(self.name()))?;
        Ok(Box::new(KeyExchange {
            group: self.clone(),
            possession,
        }))
    }

    fn ffdhe_group(&self) -> Option<FfdheGroup<'static>> {
        match self.parameters() {
            GroupParameters::FiniteField(group) => Some(*group),
            _ => None,
        }
    }

    fn name(&self) -> rustls::NamedGroup {
        self.named_group()
    }

    fn fips(&self) -> bool {
        self.is_fips() && crate::fips::enabled()
    }

    fn usable_for_version(&self, version: ProtocolVersion) -> bool {
        self.is_available_for_protocol(version)
    }
}

impl ActiveKeyExchange for KeyExchange {
    fn complete(self: Box<Self>, peer_pub_key: &[u8]) -> Result<SharedSecret, rustls::Error> {
        Ok(self.complete_for(peer_pub_key, ProtocolVersion::TLSv1_3)?)
    }

    fn complete_for_tls_version(
        self: Box<Self>,
        peer_pub_key: &[u8],
        tls_version: &SupportedProtocolVersion,
    ) -> Result<SharedSecret, rustls::Error> {
        Ok(self.complete_for(peer_pub_key, tls_version.version)?)
    }

    fn pub_key(&self) -> &[u8] {
        self.possession.public_key()
    }

    fn group(&self) -> rustls::NamedGroup {
        self.group.named_group()
    }
}
