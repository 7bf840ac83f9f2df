//! Scheme registry primitives shared by the client, resource-server, and
//! facilitator roles.
//!
//! A "scheme" is a named payment mechanism (e.g. `"exact"`) composed with a
//! network pattern to pick a handler. This module provides the
//! network/scheme-keyed dispatch table; the handler *contracts* themselves
//! (what a client/resource-server/facilitator handler must implement) live in
//! `x402-scheme`, which depends on this crate rather than the reverse.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

use crate::chain::{ChainId, ChainIdPattern};

/// Identifies a registered scheme handler slot: the network pattern it was
/// registered under, the protocol version, and the scheme name.
///
/// This is also used on the wire side (see [`crate::proto::VerifyRequest::scheme_handler_slug`])
/// to pick a concrete facilitator-role handler out of a built registry, so it
/// carries a concrete [`ChainId`] rather than a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemeHandlerSlug {
    pub chain_id: ChainId,
    pub x402_version: u8,
    pub name: String,
}

impl SchemeHandlerSlug {
    pub fn new(chain_id: ChainId, x402_version: u8, name: impl Into<String>) -> Self {
        Self {
            chain_id,
            x402_version,
            name: name.into(),
        }
    }
}

impl Display for SchemeHandlerSlug {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:v{}:{}",
            self.chain_id, self.x402_version, self.name
        )
    }
}

/// Per-route/per-chain configuration entry enabling a scheme.
///
/// Deserialized straight from the facilitator's (or a demo resource server's)
/// JSON configuration file: a list of these says which `(scheme, network)`
/// pairs should have handlers built for them.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemeConfig {
    /// Network pattern this entry applies to (concrete, wildcard, or set).
    pub network: ChainIdPattern,
    /// Scheme name, e.g. `"exact"`.
    pub scheme: String,
    /// Protocol version this entry is registered under.
    #[serde(default = "default_x402_version")]
    pub x402_version: u8,
    /// Whether this entry is active. Disabled entries are skipped at build time.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_x402_version() -> u8 {
    2
}

fn default_enabled() -> bool {
    true
}

/// A registry mapping `(networkPattern, scheme)` to a handler of type `H`.
///
/// Resolution order is fixed and testable (see the crate's test module):
/// an exact/set pattern match is tried before a family wildcard match, and a
/// registry with no match at all resolves to `None`. This mirrors the
/// ordered-list model recommended for scheme registries: wildcard resolution
/// must be an explicit, observable step, not an accident of hashing.
#[derive(Debug, Default)]
pub struct SchemeRegistry<H> {
    entries: Vec<(ChainIdPattern, String, u8, H)>,
}

impl<H> SchemeRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers a handler for `(pattern, scheme, x402_version)`.
    ///
    /// A duplicate concrete `(pattern, scheme, x402_version)` triple replaces
    /// the previously registered handler rather than shadowing it.
    pub fn register(&mut self, pattern: ChainIdPattern, scheme: impl Into<String>, x402_version: u8, handler: H) {
        let scheme = scheme.into();
        if let Some(slot) = self.entries.iter_mut().find(|(p, s, v, _)| {
            *p == pattern && *s == scheme && *v == x402_version
        }) {
            slot.3 = handler;
        } else {
            self.entries.push((pattern, scheme, x402_version, handler));
        }
    }

    /// Resolves a handler for the given chain, scheme name, and protocol
    /// version.
    ///
    /// Resolution order: (a) an exact or set pattern matching `chain_id`,
    /// (b) a family wildcard pattern matching `chain_id`'s namespace,
    /// (c) `None`. Registration order among patterns of the same precedence
    /// is insertion order (first registered wins).
    pub fn resolve(&self, chain_id: &ChainId, scheme: &str, x402_version: u8) -> Option<&H> {
        let candidates = || {
            self.entries
                .iter()
                .filter(|(pattern, s, v, _)| {
                    s == scheme && *v == x402_version && pattern.matches(chain_id)
                })
        };
        candidates()
            .find(|(pattern, ..)| !matches!(pattern, ChainIdPattern::Wildcard { .. }))
            .or_else(|| candidates().find(|(pattern, ..)| matches!(pattern, ChainIdPattern::Wildcard { .. })))
            .map(|(_, _, _, handler)| handler)
    }

    /// Enumerates `(pattern, scheme, x402_version)` triples for every
    /// registered handler, for building a `/supported` response. Wildcard
    /// entries are reported as-is (not expanded to concrete chains).
    pub fn entries(&self) -> impl Iterator<Item = (&ChainIdPattern, &str, u8)> {
        self.entries
            .iter()
            .map(|(pattern, scheme, version, _)| (pattern, scheme.as_str(), *version))
    }

    pub fn iter_handlers(&self) -> impl Iterator<Item = &H> {
        self.entries.iter().map(|(_, _, _, handler)| handler)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_beats_wildcard_regardless_of_registration_order() {
        let mut registry: SchemeRegistry<&'static str> = SchemeRegistry::new();
        registry.register(ChainIdPattern::wildcard("eip155"), "exact", 2, "wild");
        registry.register(ChainIdPattern::exact("eip155", "8453"), "exact", 2, "base");

        let base = ChainId::new("eip155", "8453");
        assert_eq!(registry.resolve(&base, "exact", 2), Some(&"base"));

        let other = ChainId::new("eip155", "1"); // not registered concretely
        assert_eq!(registry.resolve(&other, "exact", 2), Some(&"wild"));
    }

    #[test]
    fn unregistered_network_resolves_to_none() {
        let mut registry: SchemeRegistry<&'static str> = SchemeRegistry::new();
        registry.register(ChainIdPattern::exact("eip155", "8453"), "exact", 2, "base");
        let solana = ChainId::new("solana", "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp");
        assert_eq!(registry.resolve(&solana, "exact", 2), None);
    }

    #[test]
    fn duplicate_concrete_registration_replaces() {
        let mut registry: SchemeRegistry<&'static str> = SchemeRegistry::new();
        let pattern = ChainIdPattern::exact("eip155", "8453");
        registry.register(pattern.clone(), "exact", 2, "first");
        registry.register(pattern, "exact", 2, "second");
        assert_eq!(registry.len(), 1);
        let base = ChainId::new("eip155", "8453");
        assert_eq!(registry.resolve(&base, "exact", 2), Some(&"second"));
    }
}
