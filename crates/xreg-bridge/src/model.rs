//! Pure model/capability merge logic (spec §4.9.3): forms the union of every
//! adapter's declared group-type into one composite model and capabilities
//! document, refusing a duplicate group-type. No I/O here; `handshake.rs`
//! does the fetching and calls into this module.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};

use crate::error::BridgeError;

/// One adapter's raw handshake response, keyed by the descriptor's base URL.
#[derive(Debug, Clone)]
pub struct AdapterHandshake {
    pub url: String,
    pub model: Value,
    pub capabilities: Value,
}

/// The result of merging every adapter's handshake: the composite documents
/// the Bridge serves at `/model`/`/capabilities`, plus the group-type →
/// adapter-url routing map (spec §4.9.4).
#[derive(Debug, Clone)]
pub struct MergedModel {
    pub model: Value,
    pub capabilities: Value,
    pub routes: BTreeMap<String, String>,
}

/// Extract the group-type keys an adapter's `/model` document declares.
/// Per spec §4.4, an adapter must declare exactly one group-type; a
/// malformed or empty `groups` map degrades to zero routes for that adapter
/// rather than panicking, since the shape is adapter-owned, not ours.
fn group_types(model: &Value) -> Vec<String> {
    model
        .get("groups")
        .and_then(Value::as_object)
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default()
}

pub fn merge(handshakes: &[AdapterHandshake]) -> Result<MergedModel, BridgeError> {
    let mut routes = BTreeMap::new();
    let mut groups = serde_json::Map::new();
    let mut apis: BTreeSet<String> = BTreeSet::new();
    let mut specversions: BTreeSet<String> = BTreeSet::new();
    let mut pagination = true;
    let mut filtering = true;
    let mut sort = true;
    let mut inline = true;
    let mut per_adapter_flags = serde_json::Map::new();

    for handshake in handshakes {
        for group_type in group_types(&handshake.model) {
            if let Some(existing) = routes.get(&group_type) {
                return Err(BridgeError::DuplicateGroupType {
                    group_type,
                    first: existing.clone(),
                    second: handshake.url.clone(),
                });
            }
            routes.insert(group_type.clone(), handshake.url.clone());
            if let Some(entry) = handshake.model.get("groups").and_then(|g| g.get(&group_type)) {
                groups.insert(group_type, entry.clone());
            }
        }

        let caps = &handshake.capabilities;
        pagination &= caps.get("pagination").and_then(Value::as_bool).unwrap_or(true);
        filtering &= caps.get("filtering").and_then(Value::as_bool).unwrap_or(true);
        sort &= caps.get("sort").and_then(Value::as_bool).unwrap_or(true);
        inline &= caps.get("inline").and_then(Value::as_bool).unwrap_or(true);

        if let Some(list) = caps.get("apis").and_then(Value::as_array) {
            apis.extend(list.iter().filter_map(Value::as_str).map(String::from));
        }
        if let Some(list) = caps.get("specversions").and_then(Value::as_array) {
            specversions.extend(list.iter().filter_map(Value::as_str).map(String::from));
        }
        if let Some(flags) = caps.get("flags") {
            per_adapter_flags.insert(handshake.url.clone(), flags.clone());
        }
    }

    Ok(MergedModel {
        model: json!({ "groups": Value::Object(groups) }),
        capabilities: json!({
            "pagination": pagination,
            "filtering": filtering,
            "sort": sort,
            "inline": inline,
            "apis": apis,
            "specversions": specversions,
            "flags": { "per_adapter": per_adapter_flags },
        }),
        routes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake(url: &str, group_type: &str) -> AdapterHandshake {
        AdapterHandshake {
            url: url.to_string(),
            model: json!({
                "groups": {
                    group_type: { "plural": group_type, "singular": group_type.trim_end_matches('s') }
                }
            }),
            capabilities: json!({
                "pagination": true,
                "filtering": true,
                "sort": true,
                "inline": true,
                "specversions": ["1.0-rc2"],
                "apis": ["/", "/model"],
            }),
        }
    }

    #[test]
    fn merges_two_distinct_group_types() {
        let handshakes = vec![
            handshake("http://node:8081", "noderegistries"),
            handshake("http://python:8082", "pythonregistries"),
        ];
        let merged = merge(&handshakes).unwrap();
        assert!(merged.model["groups"]["noderegistries"].is_object());
        assert!(merged.model["groups"]["pythonregistries"].is_object());
        assert_eq!(merged.routes["noderegistries"], "http://node:8081");
        assert_eq!(merged.routes["pythonregistries"], "http://python:8082");
        assert_eq!(merged.capabilities["pagination"], true);
    }

    #[test]
    fn s6_duplicate_group_type_is_rejected() {
        let handshakes = vec![
            handshake("http://node-a:8081", "noderegistries"),
            handshake("http://node-b:8082", "noderegistries"),
        ];
        let err = merge(&handshakes).unwrap_err();
        match err {
            BridgeError::DuplicateGroupType { group_type, first, second } => {
                assert_eq!(group_type, "noderegistries");
                assert_eq!(first, "http://node-a:8081");
                assert_eq!(second, "http://node-b:8082");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn pagination_flag_is_and_across_adapters() {
        let mut restrictive = handshake("http://maven:8083", "javaregistries");
        restrictive.capabilities["pagination"] = json!(false);
        let handshakes = vec![handshake("http://node:8081", "noderegistries"), restrictive];
        let merged = merge(&handshakes).unwrap();
        assert_eq!(merged.capabilities["pagination"], false);
    }
}
