//! Prefixed ID generation.
//!
//! Entity IDs use a `prefix_` followed by a UUIDv7 (time-ordered). This
//! makes IDs globally unique, sortable by creation time, and instantly
//! identifiable by type when reading logs or database rows.

use uuid::Uuid;

fn prefixed_id(prefix: &str) -> String {
    let id = Uuid::now_v7();
    format!("{}_{}", prefix, id.as_simple())
}

/// Generate a streamer ID: `str_<uuid7>`
pub fn streamer_id() -> String {
    prefixed_id("str")
}

/// Unambiguous character set used for credential tokens: digits 2-9,
/// letters A-Z minus I and O.
const CHARSET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

fn random_token(len: usize) -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// Generate a write-scoped credential: presented by the field agent to
/// authenticate its uplink. Stored and looked up verbatim (§6 needs an
/// O(1) reverse lookup by credential value, which rules out hashing it).
pub fn write_credential() -> String {
    format!("wr_{}", random_token(32))
}

/// Generate a read-scoped credential: presented by overlay clients to
/// pull a streamer's public telemetry.
pub fn read_credential() -> String {
    format!("rd_{}", random_token(32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streamer_ids_have_prefix() {
        assert!(streamer_id().starts_with("str_"));
    }

    #[test]
    fn streamer_ids_are_unique() {
        assert_ne!(streamer_id(), streamer_id());
    }

    #[test]
    fn streamer_ids_are_sortable_by_time() {
        let a = streamer_id();
        let b = streamer_id();
        assert!(b > a, "expected {b} > {a}");
    }

    #[test]
    fn credentials_have_distinct_prefixes_and_length() {
        let w = write_credential();
        let r = read_credential();
        assert!(w.starts_with("wr_"));
        assert!(r.starts_with("rd_"));
        assert_eq!(w.len(), 35);
        assert_eq!(r.len(), 35);
    }

    #[test]
    fn credentials_are_unique() {
        assert_ne!(write_credential(), write_credential());
        assert_ne!(read_credential(), read_credential());
    }

    #[test]
    fn credentials_use_unambiguous_charset() {
        let token = write_credential();
        for c in token.trim_start_matches("wr_").chars() {
            assert!(CHARSET.contains(&(c as u8)), "unexpected char: {c}");
        }
    }
}
