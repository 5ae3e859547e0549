//! Capability merge.
//!
//! Folding rule, applied recursively per key:
//! - mapping + mapping: merge keys recursively;
//! - sequence + sequence: concatenate, dropping values already present
//!   (first-seen order is kept);
//! - anything else: the incoming value replaces the existing one.
//!
//! The router folds adapters in registration order, so for conflicting
//! scalars the adapter registered last wins.

use mux_protocol::Capabilities;
use serde_json::{Value, json};

/// The router's own capabilities, present before any adapter is folded in.
pub fn default_capabilities() -> Capabilities {
    let defaults = json!({
        "textDocumentSync": {
            "openClose": true,
            "change": 2
        },
        "executeCommandProvider": {
            "commands": []
        }
    });
    match defaults {
        Value::Object(map) => map,
        _ => Capabilities::new(),
    }
}

/// Fold `incoming` into `target`.
pub fn merge_capabilities(target: &mut Capabilities, incoming: &Capabilities) {
    for (key, value) in incoming {
        match target.get_mut(key) {
            Some(existing) => merge_value(existing, value),
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn merge_value(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => merge_capabilities(existing, incoming),
        (Value::Array(existing), Value::Array(incoming)) => {
            for item in incoming {
                if !existing.contains(item) {
                    existing.push(item.clone());
                }
            }
        }
        (slot, incoming) => *slot = incoming.clone(),
    }
}
