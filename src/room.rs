// src/room.rs

use serde::Serialize;

/// How a join request scopes its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomMode {
    /// Room keyed by the full (customer, vendor, enquiry) triple.
    Scoped,
    /// Room keyed by (customer, vendor) only; aggregates every enquiry
    /// between the pair. Replay-only scope: sends are always scoped.
    Broad,
}

impl RoomMode {
    /// The wire contract: the literal string `"all"` selects broad mode,
    /// anything else (including absence) is scoped.
    pub fn from_request(mode: Option<&str>) -> Self {
        if mode == Some("all") {
            RoomMode::Broad
        } else {
            RoomMode::Scoped
        }
    }
}

/// A derived room identifier. Equal triples always derive equal keys; no
/// validation happens here, so degenerate identifiers produce a degenerate
/// key (upstream validation is the caller's job).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RoomKey(String);

impl RoomKey {
    /// Key for a single enquiry thread: `customer_vendor_enquiry`.
    pub fn scoped(customer_id: &str, vendor_id: &str, enquiry_id: &str) -> Self {
        RoomKey(format!("{customer_id}_{vendor_id}_{enquiry_id}"))
    }

    /// Key aggregating every enquiry between a pair: `customer_vendor`.
    pub fn broad(customer_id: &str, vendor_id: &str) -> Self {
        RoomKey(format!("{customer_id}_{vendor_id}"))
    }

    /// Resolve the key for a join request according to its mode.
    pub fn resolve(
        customer_id: &str,
        vendor_id: &str,
        enquiry_id: &str,
        mode: RoomMode,
    ) -> Self {
        match mode {
            RoomMode::Scoped => RoomKey::scoped(customer_id, vendor_id, enquiry_id),
            RoomMode::Broad => RoomKey::broad(customer_id, vendor_id),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_key_is_deterministic() {
        let a = RoomKey::scoped("C1", "V1", "E1");
        let b = RoomKey::scoped("C1", "V1", "E1");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_triples_derive_distinct_keys() {
        let triples = [
            ("C1", "V1", "E1"),
            ("C1", "V1", "E2"),
            ("C1", "V2", "E1"),
            ("C2", "V1", "E1"),
            ("C2", "V2", "E2"),
        ];
        let keys: Vec<_> = triples
            .iter()
            .map(|(c, v, e)| RoomKey::scoped(c, v, e))
            .collect();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn broad_key_differs_from_scoped_key() {
        let scoped = RoomKey::scoped("C1", "V1", "E1");
        let broad = RoomKey::broad("C1", "V1");
        assert_ne!(scoped, broad);
    }

    #[test]
    fn mode_only_all_selects_broad() {
        assert_eq!(RoomMode::from_request(Some("all")), RoomMode::Broad);
        assert_eq!(RoomMode::from_request(Some("single")), RoomMode::Scoped);
        assert_eq!(RoomMode::from_request(Some("")), RoomMode::Scoped);
        assert_eq!(RoomMode::from_request(None), RoomMode::Scoped);
    }

    #[test]
    fn resolve_matches_mode() {
        assert_eq!(
            RoomKey::resolve("C1", "V1", "E1", RoomMode::Scoped),
            RoomKey::scoped("C1", "V1", "E1")
        );
        assert_eq!(
            RoomKey::resolve("C1", "V1", "E1", RoomMode::Broad),
            RoomKey::broad("C1", "V1")
        );
    }

    #[test]
    fn empty_identifiers_still_derive_a_key() {
        // Degenerate but never an error; upstream validation rejects these.
        let key = RoomKey::scoped("", "", "");
        assert_eq!(key.as_str(), "__");
    }
}
