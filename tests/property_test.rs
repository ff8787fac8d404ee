// tests/property_test.rs

//! Property-based tests for invariants that should hold for arbitrary input.

use ftpbridge::config::{ConnectionPolicy, ServerPreset};
use ftpbridge::connection::ConnectionKey;
use ftpbridge::core::mime::mime_type;
use proptest::prelude::*;
use std::str::FromStr;

proptest! {
    /// A connection id printed from a key parses back to the same key, even
    /// when the user name itself contains '@'.
    #[test]
    fn connection_key_roundtrips(
        host in "[a-z0-9][a-z0-9.-]{0,30}",
        port in any::<u16>(),
        user in "[a-z0-9._-]{1,12}(@[a-z0-9.-]{1,8})?",
    ) {
        let key = ConnectionKey::new(host, port, user);
        let parsed = ConnectionKey::from_str(&key.to_string()).unwrap();
        prop_assert_eq!(parsed, key);
    }

    /// Content-type inference is total, deterministic and shaped like a MIME
    /// type for any path, printable or not.
    #[test]
    fn mime_type_is_total(path in ".*") {
        let mime = mime_type(&path);
        prop_assert!(!mime.is_empty());
        prop_assert!(mime.contains('/'));
        prop_assert_eq!(mime, mime_type(&path));
    }

    /// Case of the extension never changes the inferred type.
    #[test]
    fn mime_type_ignores_extension_case(path in "[/a-zA-Z0-9._-]{0,40}") {
        prop_assert_eq!(mime_type(&path), mime_type(&path.to_uppercase()));
    }

    /// Arbitrary serialized policies keep their duration fields coherent.
    #[test]
    fn policy_toml_roundtrips(
        keepalive in 1u64..=7200,
        idle in 1u64..=86_400,
        retries in 0u32..=16,
    ) {
        let policy = ConnectionPolicy {
            keepalive_interval_secs: keepalive,
            idle_timeout_secs: idle,
            max_retries: retries,
            ..ServerPreset::GenericLegacy.policy()
        };
        let encoded = toml::to_string(&policy).unwrap();
        let decoded: ConnectionPolicy = toml::from_str(&encoded).unwrap();
        prop_assert_eq!(decoded, policy);
    }
}
