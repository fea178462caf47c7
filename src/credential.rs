//! # Credential Map
//!
//! Backs the authenticator stage (§4.2): an immutable mapping from
//! client-facing keys to the upstream keys Nexus actually presents to the
//! configured origin. The real upstream secrets live only here and in the
//! rewritten `Authorization` header the forwarder sends onward.
//!
//! ## Configured vs. pass-through mode
//!
//! ```text
//! api_keys non-empty in config.yaml  →  configured mode
//!   only mapped client-keys are accepted; everything else is 401
//!
//! api_keys absent / empty            →  pass-through mode
//!   any non-blank credential is accepted and forwarded unchanged
//! ```

use std::collections::HashMap;

/// Outcome of resolving an inbound credential against the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The credential resolved to this upstream key; use it as the outbound
    /// `Authorization` value.
    Upstream(String),
    /// Pass-through mode: no mapping exists, the inbound key is reused
    /// verbatim as the outbound value.
    PassThrough,
    /// Configured mode, but the key has no entry.
    Unknown,
    /// Configured mode, the key maps to an empty upstream value.
    EmptyMapping,
}

/// Immutable client-key → upstream-key mapping, built once at startup from
/// the `api_keys` configuration section and never mutated afterward.
#[derive(Debug, Clone, Default)]
pub struct CredentialMap {
    keys: HashMap<String, String>,
    configured: bool,
}

impl CredentialMap {
    /// Builds the map from the configuration's `api_keys` table. An empty
    /// table means pass-through mode.
    pub fn new(keys: HashMap<String, String>) -> Self {
        let configured = !keys.is_empty();
        Self { keys, configured }
    }

    /// Whether at least one client→upstream mapping is defined.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Resolves a trimmed, non-empty client key to the value that should go
    /// out on the wire. Blank keys must be rejected by the caller before
    /// calling this (see [`Resolution`] variants for the remaining cases).
    pub fn resolve(&self, client_key: &str) -> Resolution {
        if !self.configured {
            return Resolution::PassThrough;
        }

        match self.keys.get(client_key) {
            None => Resolution::Unknown,
            Some(upstream) if upstream.trim().is_empty() => Resolution::EmptyMapping,
            Some(upstream) => Resolution::Upstream(upstream.clone()),
        }
    }
}

/// Masks a credential for logging: first 4 and last 4 characters for keys
/// longer than 8, full asterisks otherwise. Raw keys must never reach logs.
pub fn mask_credential(key: &str) -> String {
    let len = key.chars().count();
    if len <= 8 {
        return "*".repeat(len.max(1));
    }

    let chars: Vec<char> = key.chars().collect();
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[len - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured_map() -> CredentialMap {
        let mut keys = HashMap::new();
        keys.insert("nexus-demo".to_string(), "sk-upstream".to_string());
        keys.insert("nexus-empty".to_string(), "".to_string());
        CredentialMap::new(keys)
    }

    #[test]
    fn empty_map_is_pass_through() {
        let map = CredentialMap::new(HashMap::new());
        assert!(!map.is_configured());
        assert_eq!(map.resolve("anything"), Resolution::PassThrough);
    }

    #[test]
    fn configured_map_resolves_known_key() {
        let map = configured_map();
        assert!(map.is_configured());
        assert_eq!(
            map.resolve("nexus-demo"),
            Resolution::Upstream("sk-upstream".to_string())
        );
    }

    #[test]
    fn configured_map_rejects_unknown_key() {
        let map = configured_map();
        assert_eq!(map.resolve("other"), Resolution::Unknown);
    }

    #[test]
    fn configured_map_flags_empty_mapping() {
        let map = configured_map();
        assert_eq!(map.resolve("nexus-empty"), Resolution::EmptyMapping);
    }

    #[test]
    fn mask_short_key_is_all_asterisks() {
        assert_eq!(mask_credential("sk-123"), "*******");
    }

    #[test]
    fn mask_long_key_keeps_head_and_tail() {
        assert_eq!(mask_credential("sk-abcdefghijklmnop"), "sk-a...mnop");
    }
}
