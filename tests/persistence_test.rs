// ABOUTME: Integration tests for INI and JSON persistence
// ABOUTME: Covers load-over-defaults, unknown-key retention, rewrites, and error cases
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use sdconfig::{Config, FileFormat, Kind, PropFlags, Property, Value};
use std::fs;
use tempfile::tempdir;

fn agent_props() -> Vec<Property> {
    vec![
        Property::new("interval", Kind::Int).with_default("30"),
        Property::new("name", Kind::String).with_default("agent1"),
        Property::new("secret", Kind::String).with_flags(PropFlags::NOSAVE),
    ]
}

#[test]
fn test_json_missing_file_keeps_defaults() {
    let dir = tempdir().unwrap();
    let mut cfg = Config::new("agent", agent_props(), vec![]);
    cfg.set_filename(dir.path().join("agent.json"), FileFormat::Auto);
    cfg.read().unwrap();
    assert_eq!(
        cfg.get_property("agent", "interval").unwrap().value(),
        Some(Value::Int(30))
    );
}

#[test]
fn test_ini_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let mut cfg = Config::new("agent", agent_props(), vec![]);
    cfg.set_filename(dir.path().join("agent.conf"), FileFormat::Auto);
    assert!(cfg.read().is_err());
    assert!(!cfg.errmsg().is_empty());
}

#[test]
fn test_json_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.json");

    let mut cfg = Config::new("agent", agent_props(), vec![]);
    cfg.set_filename(&path, FileFormat::Auto);
    cfg.set_property("agent", "interval", Value::Int(60)).unwrap();
    cfg.set_property("agent", "secret", Value::String("hush".into()))
        .unwrap();
    cfg.write().unwrap();

    let mut cfg2 = Config::new("agent", agent_props(), vec![]);
    cfg2.set_filename(&path, FileFormat::Auto);
    cfg2.read().unwrap();

    let p = cfg2.get_property("agent", "interval").unwrap();
    assert_eq!(p.value(), Some(Value::Int(60)));
    assert!(!p.is_dirty());
    assert!(p.flags().contains(PropFlags::FILE));
    // NOSAVE never reaches the file
    assert_eq!(
        cfg2.get_property("agent", "secret").unwrap().value(),
        None
    );
}

#[test]
fn test_json_rewrite_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.json");

    let mut cfg = Config::new("agent", agent_props(), vec![]);
    cfg.set_filename(&path, FileFormat::Auto);
    cfg.set_property("agent", "interval", Value::Int(60)).unwrap();
    cfg.write().unwrap();
    let first = fs::read_to_string(&path).unwrap();
    cfg.write().unwrap();
    let second = fs::read_to_string(&path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_json_mixed_document_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.json");
    fs::write(&path, r#"{"agent": {"interval": 5}, "stray": 1}"#).unwrap();

    let mut cfg = Config::new("agent", agent_props(), vec![]);
    cfg.set_filename(&path, FileFormat::Auto);
    let err = cfg.read().unwrap_err();
    assert!(err.to_string().contains("mixes sections"));
}

#[test]
fn test_json_flat_document_resolves_by_name() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.json");
    fs::write(&path, r#"{"interval": 45, "orphan": "x"}"#).unwrap();

    let mut cfg = Config::new("agent", agent_props(), vec![]);
    cfg.set_filename(&path, FileFormat::Auto);
    cfg.read().unwrap();

    assert_eq!(
        cfg.get_property("agent", "interval").unwrap().value(),
        Some(Value::Int(45))
    );
    // unknown keys land in the default section as file-only strings
    let orphan = cfg.get_property("", "orphan").unwrap();
    assert!(orphan.flags().contains(PropFlags::FILEONLY));
    assert_eq!(orphan.value(), Some(Value::String("x".into())));
}

#[test]
fn test_ini_round_trip_preserves_unknown_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.conf");
    fs::write(
        &path,
        "; provisioned by installer\ntopkey=topvalue\n[agent]\ninterval=45\nvendor_flag=7\n",
    )
    .unwrap();

    let mut cfg = Config::new("agent", agent_props(), vec![]);
    cfg.set_filename(&path, FileFormat::Auto);
    cfg.read().unwrap();

    assert_eq!(
        cfg.get_property("agent", "interval").unwrap().value(),
        Some(Value::Int(45))
    );
    let vendor = cfg.get_property("agent", "vendor_flag").unwrap();
    assert!(vendor.flags().contains(PropFlags::FILEONLY));

    cfg.set_property("agent", "interval", Value::Int(90)).unwrap();
    cfg.write().unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("interval=90"));
    assert!(text.contains("vendor_flag=7"));
    assert!(text.contains("topkey=topvalue"));
    // default-section entries precede the first header
    assert!(text.find("topkey").unwrap() < text.find("[agent]").unwrap());
}

#[test]
fn test_ini_skipped_empty_value_stays_dirty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.conf");
    fs::write(&path, "[agent]\ninterval=45\n").unwrap();

    let mut props = agent_props();
    props.push(Property::new("note", Kind::String));
    let mut cfg = Config::new("agent", props, vec![]);
    cfg.set_filename(&path, FileFormat::Auto);
    cfg.read().unwrap();

    cfg.set_property("agent", "note", Value::String(String::new()))
        .unwrap();
    cfg.write().unwrap();

    // empty strings never reach the file and must keep their dirty mark
    let text = fs::read_to_string(&path).unwrap();
    assert!(!text.contains("note="));
    let note = cfg.get_property("agent", "note").unwrap();
    assert!(note.is_dirty());
    assert!(!note.flags().contains(PropFlags::FILE));

    cfg.set_property("agent", "note", Value::String("remember".into()))
        .unwrap();
    cfg.write().unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("note=remember"));
    assert!(!cfg.get_property("agent", "note").unwrap().is_dirty());
}

#[test]
fn test_ini_loaded_values_are_clean() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.conf");
    fs::write(&path, "[agent]\ninterval=45\n").unwrap();

    let mut cfg = Config::new("agent", agent_props(), vec![]);
    cfg.set_filename(&path, FileFormat::Auto);
    cfg.read().unwrap();

    let p = cfg.get_property("agent", "interval").unwrap();
    assert!(!p.is_dirty());
    assert!(p.flags().contains(PropFlags::FILE));
}

#[test]
fn test_load_json_applies_and_rebuilds_ids() {
    let mut cfg = Config::new("agent", agent_props(), vec![]);
    cfg.load_json(r#"{"agent": {"interval": 42}}"#).unwrap();
    assert_eq!(
        cfg.get_property("agent", "interval").unwrap().value(),
        Some(Value::Int(42))
    );
    assert!(cfg.load_json("not json").is_err());
}
