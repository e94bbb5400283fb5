// Configuration loading and custom variant tests

use fxa_broker::broker::capabilities::SIGNUP;
use fxa_broker::broker::{Behavior, Hook, VariantOverrides};
use fxa_broker::channel::ChannelKind;
use fxa_broker::{BrokerConfig, BrokerError};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broker.toml");

    let mut config = BrokerConfig::default();
    config.context = "fx-desktop-v1".to_string();
    config.response_timeout_ms = 750;
    config.variants.push(
        VariantOverrides::new("fx-desktop-v1-no-signup", "fx-desktop-v1").capability(SIGNUP, false),
    );
    config.save_to_file(&path).unwrap();

    let loaded = BrokerConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(
        loaded.channel_options().response_timeout,
        Duration::from_millis(750)
    );
}

#[test]
fn test_custom_variants_from_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broker.toml");
    std::fs::write(
        &path,
        r#"
context = "partner-sync"

[[variants]]
type = "partner-sync"
parent = "fx-sync"

[variants.capabilities]
signup = false

[variants.behaviors.afterSignIn]
kind = "navigate"
route = "connect_another_device"

[variants.channel]
kind = "web-channel"
id = "partner_updates"

[variants.commands]
login = "partner:login"

[variants.side_effects]
afterSignIn = ["notify_login"]
"#,
    )
    .unwrap();

    let config = BrokerConfig::load_from_file(&path).unwrap();
    assert!(config.validate().is_ok());

    let registry = config.build_registry().unwrap();
    let variant = registry.get("partner-sync").unwrap();
    assert_eq!(variant.parent(), Some("fx-sync"));
    assert!(!variant.has_capability(SIGNUP));
    assert_eq!(
        *variant.behavior(Hook::AfterSignIn),
        Behavior::navigate("connect_another_device")
    );
    assert_eq!(
        variant.channel(),
        &ChannelKind::WebChannel {
            id: "partner_updates".to_string()
        }
    );
    // Untouched hooks come from the parent chain.
    assert_eq!(
        variant.behavior(Hook::AfterSignUp),
        registry.get("fx-sync").unwrap().behavior(Hook::AfterSignUp)
    );
}

#[test]
fn test_json_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broker.json");
    std::fs::write(
        &path,
        r#"{"context": "oauth", "variants": [{"type": "oauth-halt-less", "parent": "oauth",
            "behaviors": {"afterSignIn": {"kind": "null"}}}]}"#,
    )
    .unwrap();

    let config = BrokerConfig::load_from_json(&path).unwrap();
    assert_eq!(config.response_timeout_ms, 5000);
    let registry = config.build_registry().unwrap();
    assert_eq!(
        *registry.get("oauth-halt-less").unwrap().behavior(Hook::AfterSignIn),
        Behavior::Null
    );
}

#[test]
fn test_unknown_parent_is_reported() {
    let mut config = BrokerConfig::default();
    config
        .variants
        .push(VariantOverrides::new("orphan", "fx-ios-v9"));

    assert!(matches!(
        config.build_registry(),
        Err(BrokerError::UnknownParent { .. })
    ));
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
}

#[test]
fn test_cyclic_variants_are_rejected() {
    let mut config = BrokerConfig::default();
    config.variants.push(VariantOverrides::new("a", "b"));
    config.variants.push(VariantOverrides::new("b", "a"));

    assert!(matches!(
        config.build_registry(),
        Err(BrokerError::InheritanceCycle(_))
    ));
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    assert!(BrokerConfig::load_from_file(dir.path().join("absent.toml")).is_err());
}
