use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{AccessKey, FiscalUrl};
use crate::common::{ScanError, ScanResult};

// A run of exactly 44 digits bounded by non-word characters. A longer digit run never matches
// since there is no word boundary between two digits.
static STANDALONE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9]{44}\b").expect("Invalid access key regex"));

// Policy
//------------------------------------------------------------------------------

/// Which payloads the matcher is willing to take a key from.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub enum KeyPolicy {
    /// Any 44-digit run anywhere in the payload.
    #[default]
    Permissive,
    /// Only payloads starting with one of these prefixes (ASCII case-insensitive), e.g.
    /// `https://www.sefaz.rs.gov.br/`. Everything else is rejected.
    Authorities(Vec<String>),
}

// Key matcher
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct KeyMatcher {
    policy: KeyPolicy,
}

impl KeyMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: KeyPolicy) -> Self {
        Self { policy }
    }

    /// Restricts acceptance to payloads starting with one of `prefixes`.
    pub fn authorities<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_policy(KeyPolicy::Authorities(prefixes.into_iter().map(Into::into).collect()))
    }

    pub fn policy(&self) -> &KeyPolicy {
        &self.policy
    }

    /// Fails with [`ScanError::UnknownAuthority`] when the policy restricts prefixes and none
    /// matches.
    pub fn check_authority(&self, payload: &str) -> ScanResult<()> {
        let KeyPolicy::Authorities(prefixes) = &self.policy else {
            return Ok(());
        };

        let known = prefixes.iter().any(|p| {
            payload.len() >= p.len()
                && payload.is_char_boundary(p.len())
                && payload[..p.len()].eq_ignore_ascii_case(p)
        });
        if known {
            return Ok(());
        }

        let prefix = payload.split_once('?').map_or(payload, |(head, _)| head);
        Err(ScanError::UnknownAuthority(prefix.to_owned()))
    }

    /// Query string parse of `payload` subject to the policy.
    pub fn parse_url(&self, payload: &str) -> ScanResult<FiscalUrl> {
        self.check_authority(payload)?;
        FiscalUrl::parse(payload)
    }

    /// Key carried by a `p` or `chNFe` query parameter.
    pub fn extract_from_url(&self, payload: &str) -> Option<AccessKey> {
        match self.parse_url(payload) {
            Ok(url) => Some(url.key),
            Err(e) => {
                debug!(reason = %e, "No key in url parameters");
                None
            }
        }
    }

    /// First standalone run of exactly 44 digits.
    pub fn extract_any(&self, payload: &str) -> Option<AccessKey> {
        STANDALONE_KEY.find_iter(payload).find_map(|m| AccessKey::new(m.as_str()))
    }

    /// Every distinct standalone 44-digit run, in order of first appearance.
    pub fn find_all(&self, payload: &str) -> Vec<AccessKey> {
        let mut keys: Vec<AccessKey> = Vec::new();
        for key in STANDALONE_KEY.find_iter(payload).filter_map(|m| AccessKey::new(m.as_str())) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Policy check, then url parameters, then any standalone run.
    pub fn extract(&self, payload: &str) -> ScanResult<AccessKey> {
        if payload.is_empty() {
            return Err(ScanError::NoKeyFound);
        }
        self.check_authority(payload)?;

        let url_err = match FiscalUrl::parse(payload) {
            Ok(url) => return Ok(url.key),
            Err(e) => e,
        };

        match self.extract_any(payload) {
            Some(key) => Ok(key),
            None => {
                debug!(reason = %url_err, "No access key in payload");
                Err(url_err)
            }
        }
    }
}
