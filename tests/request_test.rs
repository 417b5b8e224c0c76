// ABOUTME: Integration tests for JSON request dispatch
// ABOUTME: Covers builtins, custom functions, arity validation, and failure atomicity
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use sdconfig::{Config, Function, Kind, PropFlags, Property, Value};
use serde_json::json;

fn registry() -> Config {
    let props = vec![
        Property::new("interval", Kind::Int).with_default("30"),
        Property::new("name", Kind::String).with_default("agent1"),
        Property::new("serial", Kind::String).with_flags(PropFlags::READONLY),
    ];
    Config::new("agent", props, vec![])
}

#[test]
fn test_get_builtin_returns_values() {
    let mut cfg = registry();
    let r = cfg.process_request(r#"{"get": ["interval", "name"]}"#);
    assert_eq!(r.status, 0);
    assert_eq!(r.message, "success");
    assert_eq!(r.results.get("interval"), Some(&json!(30)));
    assert_eq!(r.results.get("name"), Some(&json!("agent1")));
}

#[test]
fn test_set_builtin_writes_pairs() {
    let mut cfg = registry();
    let r = cfg.process_request(r#"{"set": [["interval", "60", "name", "agent2"]]}"#);
    assert_eq!(r.status, 0, "{}", r.message);
    assert_eq!(
        cfg.get_property("agent", "interval").unwrap().value(),
        Some(Value::Int(60))
    );
    assert_eq!(
        cfg.get_property("agent", "name").unwrap().value(),
        Some(Value::String("agent2".into()))
    );
}

#[test]
fn test_set_default_keyword_restores_default() {
    let mut cfg = registry();
    cfg.set_property("agent", "interval", Value::Int(99)).unwrap();
    let r = cfg.process_request(r#"{"set": [["interval", "default"]]}"#);
    assert_eq!(r.status, 0, "{}", r.message);
    assert_eq!(
        cfg.get_property("agent", "interval").unwrap().value(),
        Some(Value::Int(30))
    );
}

#[test]
fn test_set_rejects_readonly() {
    let mut cfg = registry();
    let r = cfg.process_request(r#"{"set": [["serial", "SN-1"]]}"#);
    assert_eq!(r.status, 1);
    assert!(r.message.contains("readonly"));
    assert_eq!(cfg.get_property("agent", "serial").unwrap().value(), None);
    assert_eq!(cfg.errmsg(), r.message);
}

#[test]
fn test_bad_arity_has_no_side_effects() {
    let mut cfg = registry();
    // 3 is not a multiple of 2; nothing may be written
    let r = cfg.process_request(r#"{"set": [["interval", "60", "name"]]}"#);
    assert_eq!(r.status, 1);
    assert!(r.message.contains("takes 2 arguments but 3 passed"));
    assert_eq!(
        cfg.get_property("agent", "interval").unwrap().value(),
        Some(Value::Int(30))
    );
}

#[test]
fn test_single_arg_function_rejects_nested_arrays() {
    let mut cfg = registry();
    let r = cfg.process_request(r#"{"get": [["interval"]]}"#);
    assert_eq!(r.status, 1);
    assert!(r.message.contains("must be strings"));
}

#[test]
fn test_unknown_function_rejected() {
    let mut cfg = registry();
    let r = cfg.process_request(r#"{"reboot": ["now"]}"#);
    assert_eq!(r.status, 1);
    assert!(r.message.contains("invalid function: reboot"));
}

#[test]
fn test_unparseable_request_rejected() {
    let mut cfg = registry();
    let r = cfg.process_request("not json at all");
    assert_eq!(r.status, 1);
    assert!(r.message.contains("error parsing request"));
}

#[test]
fn test_clear_builtin_restores_default() {
    let mut cfg = registry();
    cfg.set_property("agent", "interval", Value::Int(99)).unwrap();
    let r = cfg.process_request(r#"{"clear": ["interval"]}"#);
    assert_eq!(r.status, 0, "{}", r.message);
    let p = cfg.get_property("agent", "interval").unwrap();
    assert_eq!(p.value(), Some(Value::Int(30)));
    assert!(!p.is_dirty());
}

#[test]
fn test_load_builtin_applies_document() {
    let mut cfg = registry();
    let r = cfg.process_request(r#"{"load": ["{\"agent\": {\"interval\": 42}}"]}"#);
    assert_eq!(r.status, 0, "{}", r.message);
    assert_eq!(
        cfg.get_property("agent", "interval").unwrap().value(),
        Some(Value::Int(42))
    );
}

#[test]
fn test_custom_function_receives_tuples() {
    let func = Function::new("echo", 2, |tuples, results| {
        for t in tuples {
            results.insert(t[0].clone(), json!(t[1]));
        }
        Ok(())
    });
    let mut cfg = Config::new("agent", vec![], vec![func]);

    let r = cfg.process_request(r#"{"echo": [["a", "1", "b", "2"]]}"#);
    assert_eq!(r.status, 0, "{}", r.message);
    assert_eq!(r.results.get("a"), Some(&json!("1")));
    assert_eq!(r.results.get("b"), Some(&json!("2")));
}

#[test]
fn test_custom_function_error_propagates() {
    let func = Function::new("failing", 1, |_tuples, _results| {
        Err("backend offline".to_string())
    });
    let mut cfg = Config::new("agent", vec![], vec![func]);

    let r = cfg.process_request(r#"{"failing": ["x"]}"#);
    assert_eq!(r.status, 1);
    assert_eq!(r.message, "backend offline");
}

#[test]
fn test_registered_function_shadows_builtin() {
    let func = Function::new("get", 1, |tuples, results| {
        results.insert("custom".to_string(), json!(tuples.len()));
        Ok(())
    });
    let mut cfg = Config::new("agent", vec![], vec![func]);

    let r = cfg.process_request(r#"{"get": ["x"]}"#);
    assert_eq!(r.status, 0, "{}", r.message);
    assert_eq!(r.results.get("custom"), Some(&json!(1)));
}
