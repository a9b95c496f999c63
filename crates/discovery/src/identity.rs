use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::InfoHashError;
use crate::types::{InfoHash, INFO_HASH_LEN};

/// Full description of the content item being shared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub info_hash: InfoHash,
    pub length: u64,
    #[serde(default)]
    pub announce: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Anything `set_identity` can be called with
#[derive(Debug, Clone)]
pub enum IdentityInput {
    Hex(String),
    Bytes(Vec<u8>),
    Descriptor(ContentDescriptor),
}

impl From<&str> for IdentityInput {
    fn from(hex: &str) -> Self {
        Self::Hex(hex.to_string())
    }
}

impl From<String> for IdentityInput {
    fn from(hex: String) -> Self {
        Self::Hex(hex)
    }
}

impl From<&[u8]> for IdentityInput {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for IdentityInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<[u8; INFO_HASH_LEN]> for IdentityInput {
    fn from(bytes: [u8; INFO_HASH_LEN]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<InfoHash> for IdentityInput {
    fn from(hash: InfoHash) -> Self {
        Self::Bytes(hash.as_bytes().to_vec())
    }
}

impl From<ContentDescriptor> for IdentityInput {
    fn from(descriptor: ContentDescriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

/// What we know about the content we are discovering peers for.
///
/// The first bare hash or descriptor wins. A descriptor may still follow a
/// bare hash as long as it names the same hash; the hash itself never
/// changes once set.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    info_hash: Option<InfoHash>,
    descriptor: Option<ContentDescriptor>,
}

impl Identity {
    /// Returns whether the input was accepted
    pub fn resolve(&mut self, input: IdentityInput) -> bool {
        match input {
            IdentityInput::Hex(hex) => self.accept_hash(hex.parse()),
            IdentityInput::Bytes(bytes) => self.accept_hash(InfoHash::from_bytes(&bytes)),
            IdentityInput::Descriptor(descriptor) => self.accept_descriptor(descriptor),
        }
    }

    fn accept_hash(&mut self, parsed: Result<InfoHash, InfoHashError>) -> bool {
        if self.info_hash.is_some() {
            tracing::debug!("info hash already set, ignoring");
            return false;
        }
        match parsed {
            Ok(hash) => {
                self.info_hash = Some(hash);
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed info hash");
                false
            }
        }
    }

    fn accept_descriptor(&mut self, descriptor: ContentDescriptor) -> bool {
        if self.descriptor.is_some() {
            tracing::debug!("descriptor already set, ignoring");
            return false;
        }
        if let Some(hash) = self.info_hash {
            if hash != descriptor.info_hash {
                tracing::debug!(
                    current = %hash,
                    offered = %descriptor.info_hash,
                    "ignoring descriptor for a different info hash"
                );
                return false;
            }
        }
        self.info_hash = Some(descriptor.info_hash);
        self.descriptor = Some(descriptor);
        true
    }

    pub fn info_hash(&self) -> Option<InfoHash> {
        self.info_hash
    }

    pub fn descriptor(&self) -> Option<&ContentDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn length(&self) -> Option<u64> {
        self.descriptor.as_ref().map(|d| d.length)
    }

    /// Tracker URLs from the descriptor followed by `extra`. Unparseable and
    /// repeated URLs are dropped.
    pub fn announce_list(&self, extra: &[String]) -> Vec<Url> {
        let carried = self
            .descriptor
            .iter()
            .flat_map(|d| d.announce.iter());

        let mut urls: Vec<Url> = Vec::new();
        for raw in carried.chain(extra.iter()) {
            match Url::parse(raw) {
                Ok(url) if !urls.contains(&url) => urls.push(url),
                Ok(_) => {}
                Err(e) => tracing::warn!(url = %raw, error = %e, "skipping invalid announce url"),
            }
        }
        urls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn descriptor(hash: &str, announce: &[&str]) -> ContentDescriptor {
        ContentDescriptor {
            info_hash: hash.parse().unwrap(),
            length: 1024,
            announce: announce.iter().map(|s| s.to_string()).collect(),
            name: None,
        }
    }

    #[test]
    fn first_hash_wins() {
        let mut identity = Identity::default();
        assert!(identity.resolve(A.into()));
        assert!(!identity.resolve(B.into()));
        assert!(!identity.resolve(vec![0xbbu8; 20].into()));
        assert_eq!(identity.info_hash(), Some(A.parse().unwrap()));
    }

    #[test]
    fn malformed_input_is_ignored() {
        let mut identity = Identity::default();
        assert!(!identity.resolve("not a hash".into()));
        assert!(!identity.resolve(vec![1u8, 2, 3].into()));
        assert_eq!(identity.info_hash(), None);
        assert!(identity.resolve([0xaau8; 20].into()));
        assert_eq!(identity.info_hash(), Some(A.parse().unwrap()));
    }

    #[test]
    fn descriptor_may_enrich_a_matching_hash() {
        let mut identity = Identity::default();
        assert!(identity.resolve(A.into()));
        assert!(!identity.resolve(descriptor(B, &[]).into()));
        assert_eq!(identity.length(), None);

        assert!(identity.resolve(descriptor(A, &[]).into()));
        assert_eq!(identity.length(), Some(1024));
        assert!(!identity.resolve(descriptor(A, &[]).into()));
    }

    #[test]
    fn descriptor_blocks_later_bare_hashes() {
        let mut identity = Identity::default();
        assert!(identity.resolve(descriptor(A, &[]).into()));
        assert!(!identity.resolve(B.into()));
        assert_eq!(identity.info_hash(), Some(A.parse().unwrap()));
    }

    #[test]
    fn announce_list_merges_in_order() {
        let mut identity = Identity::default();
        identity.resolve(
            descriptor(
                A,
                &["udp://tracker.one:6969/announce", "wss://tracker.two"],
            )
            .into(),
        );
        let extra = vec![
            "wss://tracker.two".to_string(),
            "::not a url::".to_string(),
            "http://tracker.three/announce".to_string(),
        ];
        let urls: Vec<String> = identity
            .announce_list(&extra)
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            urls,
            vec![
                "udp://tracker.one:6969/announce",
                "wss://tracker.two/",
                "http://tracker.three/announce",
            ]
        );
    }
}
