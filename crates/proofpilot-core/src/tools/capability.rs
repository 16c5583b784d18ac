//! The capability table: one adapter per discovered tool.
//!
//! The table is built once per proof session from `tools/list` and never
//! changes afterwards. Each [`ToolAdapter`] knows which session fields its
//! schema requires and injects them on every call, so models never see or
//! supply `coqSessionId` / `proofVersionHash` themselves.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::debug;

use super::{PROOF_HASH_ARG, SESSION_ID_ARG, ToolDescriptor, ToolReply, ToolTransport};
use crate::model::ToolSpec;
use crate::state::ProofVersion;

/// Key some callers use to pass arguments positionally or nested.
const NESTED_ARGS_KEY: &str = "args";

/// A single callable tool bound to the current proof session.
pub struct ToolAdapter {
    name: String,
    description: String,
    /// Parameter names the model may supply, in schema order.
    arg_names: Vec<String>,
    /// Parameters declared as `"type": "string"`.
    string_args: HashSet<String>,
    /// Schema shown to models, with the session fields removed.
    parameters: Value,
    requires_session_id: bool,
    requires_hash: bool,
    session_id: String,
    hash: watch::Receiver<String>,
    transport: Arc<dyn ToolTransport>,
}

impl ToolAdapter {
    pub fn new(
        descriptor: &ToolDescriptor,
        session_id: &str,
        hash: watch::Receiver<String>,
        transport: Arc<dyn ToolTransport>,
    ) -> Self {
        let schema = &descriptor.input_schema;
        let properties = schema
            .get("properties")
            .and_then(|p| p.as_object())
            .cloned()
            .unwrap_or_default();
        let required: Vec<String> = schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| {
                r.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let is_session_field = |name: &str| name == SESSION_ID_ARG || name == PROOF_HASH_ARG;

        let arg_names: Vec<String> = properties
            .keys()
            .filter(|k| !is_session_field(k))
            .cloned()
            .collect();

        let string_args = properties
            .iter()
            .filter(|(k, v)| {
                !is_session_field(k) && v.get("type").and_then(|t| t.as_str()) == Some("string")
            })
            .map(|(k, _)| k.clone())
            .collect();

        let visible_properties: Map<String, Value> = properties
            .iter()
            .filter(|(k, _)| !is_session_field(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let visible_required: Vec<Value> = required
            .iter()
            .filter(|r| !is_session_field(r))
            .map(|r| Value::String(r.clone()))
            .collect();
        let parameters = serde_json::json!({
            "type": "object",
            "properties": visible_properties,
            "required": visible_required,
        });

        let mut description = descriptor.description.clone();
        let param_lines: Vec<String> = properties
            .iter()
            .filter(|(k, _)| !is_session_field(k))
            .filter_map(|(k, v)| {
                let desc = v.get("description")?.as_str()?;
                let suffix = if required.iter().any(|r| r == k) {
                    " This field is required."
                } else {
                    ""
                };
                Some(format!("+ {k}: {desc}.{suffix}"))
            })
            .collect();
        if !param_lines.is_empty() {
            description.push_str(&format!(
                "\n\n# Parameters for the tool {}:\n{}",
                descriptor.name,
                param_lines.join("\n")
            ));
        }

        Self {
            name: descriptor.name.clone(),
            description,
            arg_names,
            string_args,
            parameters,
            requires_session_id: required.iter().any(|r| r == SESSION_ID_ARG),
            requires_hash: required.iter().any(|r| r == PROOF_HASH_ARG),
            session_id: session_id.to_string(),
            hash,
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn requires_session_id(&self) -> bool {
        self.requires_session_id
    }

    pub fn requires_hash(&self) -> bool {
        self.requires_hash
    }

    /// The proof-version hash this adapter would inject right now.
    pub fn current_hash(&self) -> String {
        self.hash.borrow().clone()
    }

    /// Schema offered to models.
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }

    /// Normalize model-supplied arguments and inject session fields.
    ///
    /// - A nested `args` list is mapped positionally onto the schema's
    ///   parameter names; a nested `args` object is merged.
    /// - Object or array values for string parameters are JSON-encoded.
    /// - Any caller-supplied session fields are overwritten.
    pub fn prepare_arguments(&self, mut args: Map<String, Value>) -> Map<String, Value> {
        if !self.arg_names.iter().any(|n| n == NESTED_ARGS_KEY) {
            match args.remove(NESTED_ARGS_KEY) {
                Some(Value::Array(items)) => {
                    for (name, item) in self.arg_names.iter().zip(items) {
                        args.insert(name.clone(), item);
                    }
                }
                Some(Value::Object(map)) => args.extend(map),
                Some(other) => {
                    args.insert(NESTED_ARGS_KEY.to_string(), other);
                }
                None => {}
            }
        }

        for (key, value) in args.iter_mut() {
            if self.string_args.contains(key) && (value.is_object() || value.is_array()) {
                *value = Value::String(value.to_string());
            }
        }

        args.remove(SESSION_ID_ARG);
        args.remove(PROOF_HASH_ARG);
        if self.requires_session_id {
            args.insert(
                SESSION_ID_ARG.to_string(),
                Value::String(self.session_id.clone()),
            );
        }
        if self.requires_hash {
            args.insert(PROOF_HASH_ARG.to_string(), Value::String(self.current_hash()));
        }
        args
    }

    /// Call the tool with the latest proof-version hash.
    pub async fn invoke(&self, args: Map<String, Value>) -> Result<ToolReply> {
        let prepared = self.prepare_arguments(args);
        debug!(tool = %self.name, "invoking tool");
        self.transport.call_tool(&self.name, prepared).await
    }
}

impl std::fmt::Debug for ToolAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolAdapter")
            .field("name", &self.name)
            .field("requires_session_id", &self.requires_session_id)
            .field("requires_hash", &self.requires_hash)
            .finish()
    }
}

/// Immutable map from tool name to its adapter.
#[derive(Debug, Default)]
pub struct CapabilityTable {
    adapters: BTreeMap<String, ToolAdapter>,
}

impl CapabilityTable {
    /// Discover the server's tools and bind them to `session_id`.
    pub async fn discover(
        transport: Arc<dyn ToolTransport>,
        session_id: &str,
        version: &ProofVersion,
    ) -> Result<Self> {
        let descriptors = transport.list_tools().await?;
        Ok(Self::from_descriptors(
            &descriptors,
            session_id,
            version,
            transport,
        ))
    }

    pub fn from_descriptors(
        descriptors: &[ToolDescriptor],
        session_id: &str,
        version: &ProofVersion,
        transport: Arc<dyn ToolTransport>,
    ) -> Self {
        let adapters = descriptors
            .iter()
            .map(|d| {
                (
                    d.name.clone(),
                    ToolAdapter::new(d, session_id, version.subscribe(), Arc::clone(&transport)),
                )
            })
            .collect();
        Self { adapters }
    }

    pub fn get(&self, name: &str) -> Option<&ToolAdapter> {
        self.adapters.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Schemas for every tool, for models that may call them.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.adapters.values().map(ToolAdapter::spec).collect()
    }

    /// One `- name: description` line per tool, for prompts.
    pub fn summary(&self) -> String {
        self.adapters
            .values()
            .map(|a| format!("- {}: {}", a.name, a.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct NullTransport;

    #[async_trait]
    impl ToolTransport for NullTransport {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            Ok(Vec::new())
        }

        async fn call_tool(&self, _name: &str, _arguments: Map<String, Value>) -> Result<ToolReply> {
            Ok(ToolReply {
                text: String::new(),
                hash: None,
            })
        }
    }

    fn check_proof_descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "check_proof".to_string(),
            description: "Check a proof".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "proof": {"type": "string", "description": "Proof script"},
                    "coqSessionId": {"type": "string"},
                    "proofVersionHash": {"type": "string"}
                },
                "required": ["proof", "coqSessionId", "proofVersionHash"]
            }),
        }
    }

    fn search_descriptor() -> ToolDescriptor {
        ToolDescriptor {
            name: "get_similar_proofs".to_string(),
            description: "Find similar proofs".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "goal": {"type": "string", "description": "Goal"},
                    "limit": {"type": "integer"},
                    "coqSessionId": {"type": "string"}
                },
                "required": ["goal", "coqSessionId"]
            }),
        }
    }

    fn table(version: &ProofVersion) -> CapabilityTable {
        CapabilityTable::from_descriptors(
            &[check_proof_descriptor(), search_descriptor()],
            "sess-1",
            version,
            Arc::new(NullTransport),
        )
    }

    #[test]
    fn required_session_fields_are_detected() {
        let version = ProofVersion::new("h0");
        let table = table(&version);
        let check = table.get("check_proof").unwrap();
        assert!(check.requires_session_id());
        assert!(check.requires_hash());
        let search = table.get("get_similar_proofs").unwrap();
        assert!(search.requires_session_id());
        assert!(!search.requires_hash());
    }

    #[test]
    fn session_fields_are_hidden_from_models() {
        let version = ProofVersion::new("h0");
        let spec = table(&version).get("check_proof").unwrap().spec();
        let props = spec.parameters["properties"].as_object().unwrap();
        assert!(props.contains_key("proof"));
        assert!(!props.contains_key(SESSION_ID_ARG));
        assert!(!props.contains_key(PROOF_HASH_ARG));
        assert_eq!(spec.parameters["required"], json!(["proof"]));
        assert!(spec.description.contains("+ proof: Proof script. This field is required."));
    }

    #[test]
    fn injection_overrides_caller_values() {
        let version = ProofVersion::new("h0");
        let table = table(&version);
        let mut args = Map::new();
        args.insert("proof".to_string(), json!("auto."));
        args.insert(SESSION_ID_ARG.to_string(), json!("forged"));

        let prepared = table.get("check_proof").unwrap().prepare_arguments(args);
        assert_eq!(prepared[SESSION_ID_ARG], "sess-1");
        assert_eq!(prepared[PROOF_HASH_ARG], "h0");
        assert_eq!(prepared["proof"], "auto.");
    }

    #[test]
    fn hash_is_not_injected_unless_required() {
        let version = ProofVersion::new("h0");
        let table = table(&version);
        let prepared = table
            .get("get_similar_proofs")
            .unwrap()
            .prepare_arguments(Map::new());
        assert!(!prepared.contains_key(PROOF_HASH_ARG));
        assert_eq!(prepared[SESSION_ID_ARG], "sess-1");
    }

    #[test]
    fn object_goal_is_encoded_for_string_parameter() {
        let version = ProofVersion::new("h0");
        let table = table(&version);
        let mut args = Map::new();
        args.insert("goal".to_string(), json!({"ty": "True"}));
        args.insert("limit".to_string(), json!({"n": 3}));

        let prepared = table
            .get("get_similar_proofs")
            .unwrap()
            .prepare_arguments(args);
        assert_eq!(prepared["goal"], json!("{\"ty\":\"True\"}"));
        assert_eq!(prepared["limit"], json!({"n": 3}));
    }

    #[test]
    fn nested_positional_args_map_to_schema_order() {
        let version = ProofVersion::new("h0");
        let table = table(&version);
        let mut args = Map::new();
        args.insert("args".to_string(), json!(["intros. auto."]));

        let prepared = table.get("check_proof").unwrap().prepare_arguments(args);
        assert_eq!(prepared["proof"], "intros. auto.");
        assert!(!prepared.contains_key("args"));
    }

    #[test]
    fn every_adapter_sees_the_latest_hash() {
        let version = ProofVersion::new("h0");
        let table = table(&version);

        for next in ["h1", "h2", "h3"] {
            version.advance(next);
            for name in table.names() {
                let adapter = table.get(name).unwrap();
                assert_eq!(adapter.current_hash(), next, "adapter {name}");
            }
        }
    }

    #[test]
    fn summary_lists_every_tool() {
        let version = ProofVersion::new("h0");
        let summary = table(&version).summary();
        assert!(summary.contains("- check_proof: Check a proof"));
        assert!(summary.contains("- get_similar_proofs: Find similar proofs"));
    }
}
