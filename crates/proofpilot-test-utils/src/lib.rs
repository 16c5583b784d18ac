//! Shared test doubles for proofpilot integration tests.
//!
//! - [`ScriptedModel`]: a chat model that replays queued replies and
//!   records every call.
//! - [`FnModel`]: a chat model backed by a closure, for role-aware fakes.
//! - [`FakeProofService`]: in-memory project/checker service.
//! - [`FakeToolTransport`]: in-memory tool server with scripted replies.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

use proofpilot_core::message::{Message, ToolCall};
use proofpilot_core::model::{ChatModel, ModelRoles, ToolSpec};
use proofpilot_core::service::{
    CheckProofResponse, Premises, ProofService, SessionStart, SessionTheorem, TheoremSource,
};
use proofpilot_core::tools::{ToolDescriptor, ToolReply, ToolTransport};

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// Arguments of one recorded model call.
#[derive(Debug, Clone)]
pub struct ModelCall {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

impl ModelCall {
    /// Content of the last message sent.
    pub fn last_content(&self) -> &str {
        self.messages.last().map(Message::content).unwrap_or_default()
    }
}

/// Replays queued replies in order. Once the queue is empty every call
/// returns the fallback reply.
pub struct ScriptedModel {
    name: String,
    replies: Mutex<VecDeque<Result<Message, String>>>,
    fallback: Message,
    calls: Mutex<Vec<ModelCall>>,
}

impl ScriptedModel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replies: Mutex::new(VecDeque::new()),
            fallback: Message::ai(""),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, fallback: Message) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn reply(self, message: Message) -> Self {
        self.replies.lock().unwrap().push_back(Ok(message));
        self
    }

    pub fn reply_text(self, text: &str) -> Self {
        self.reply(Message::ai(text))
    }

    pub fn reply_tool_call(self, id: &str, tool: &str, args: Value) -> Self {
        self.reply(tool_call_message(id, tool, args))
    }

    pub fn reply_error(self, error: &str) -> Self {
        self.replies.lock().unwrap().push_back(Err(error.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn into_arc(self) -> Arc<dyn ChatModel> {
        Arc::new(self)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
        self.calls.lock().unwrap().push(ModelCall {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(message)) => Ok(message),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Ok(self.fallback.clone()),
        }
    }
}

type Responder = dyn Fn(&[Message], &[ToolSpec]) -> Result<Message> + Send + Sync;

/// A model whose replies are computed by a closure.
pub struct FnModel {
    name: String,
    respond: Box<Responder>,
    calls: Mutex<Vec<ModelCall>>,
}

impl FnModel {
    pub fn new<F>(name: &str, respond: F) -> Self
    where
        F: Fn(&[Message], &[ToolSpec]) -> Result<Message> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for FnModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
        self.calls.lock().unwrap().push(ModelCall {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });
        (self.respond)(messages, tools)
    }
}

/// An AI message carrying one tool call.
pub fn tool_call_message(id: &str, tool: &str, args: Value) -> Message {
    let args = match args {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Message::ai_with_calls("", vec![ToolCall::new(id, tool, args)])
}

/// Roles where every role uses `model`.
pub fn uniform_roles(model: Arc<dyn ChatModel>) -> ModelRoles {
    ModelRoles::uniform(model)
}

// ---------------------------------------------------------------------------
// Proof service
// ---------------------------------------------------------------------------

/// In-memory [`ProofService`].
///
/// `check_proof` replays queued responses; once empty it reports a single
/// open goal `"goal"`.
pub struct FakeProofService {
    pub session_id: String,
    pub initial_hash: String,
    pub theorem_statement: String,
    premises: HashMap<String, Vec<String>>,
    theorems: HashMap<String, TheoremSource>,
    checks: Mutex<VecDeque<CheckProofResponse>>,
    fail_premises: bool,
    log: Mutex<Vec<String>>,
}

impl Default for FakeProofService {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProofService {
    pub fn new() -> Self {
        Self {
            session_id: "session-1".to_string(),
            initial_hash: "hash-0".to_string(),
            theorem_statement: "Lemma add_zero : forall n, n + 0 = n.".to_string(),
            premises: HashMap::new(),
            theorems: HashMap::new(),
            checks: Mutex::new(VecDeque::new()),
            fail_premises: false,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Related theorem names for a JSON-encoded goal.
    pub fn with_premises(mut self, goal: &str, names: &[&str]) -> Self {
        self.premises
            .insert(goal.to_string(), names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_theorem(mut self, name: &str, statement: &str, proof: &str) -> Self {
        self.theorems.insert(
            name.to_string(),
            TheoremSource {
                theorem_statement: statement.to_string(),
                theorem_proof: proof.to_string(),
            },
        );
        self
    }

    pub fn with_check(self, response: CheckProofResponse) -> Self {
        self.checks.lock().unwrap().push_back(response);
        self
    }

    pub fn failing_premises(mut self) -> Self {
        self.fail_premises = true;
        self
    }

    /// Calls made so far, as `"method arg..."` strings.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl ProofService for FakeProofService {
    async fn start_session(&self, file_path: &str, theorem_name: &str) -> Result<SessionStart> {
        self.record(format!("start_session {file_path} {theorem_name}"));
        Ok(SessionStart {
            session_id: self.session_id.clone(),
            proof_version_hash: self.initial_hash.clone(),
        })
    }

    async fn get_session_theorem(
        &self,
        session_id: &str,
        proof_version_hash: &str,
    ) -> Result<SessionTheorem> {
        self.record(format!("get_session_theorem {session_id} {proof_version_hash}"));
        Ok(SessionTheorem {
            theorem_statement: self.theorem_statement.clone(),
            extra: Map::new(),
        })
    }

    async fn check_proof(
        &self,
        proof: &str,
        session_id: &str,
        proof_version_hash: &str,
    ) -> Result<CheckProofResponse> {
        self.record(format!("check_proof {proof:?} {session_id} {proof_version_hash}"));
        let next = self.checks.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| CheckProofResponse {
            success: true,
            goals: Some(vec![json!("goal")]),
            message: "Proof is incomplete but valid so far".to_string(),
            proof: Some(proof.to_string()),
            ..Default::default()
        }))
    }

    async fn get_premises(
        &self,
        goal: &str,
        file_path: &str,
        session_id: &str,
    ) -> Result<Premises> {
        self.record(format!("get_premises {goal} {file_path} {session_id}"));
        if self.fail_premises {
            bail!("premise index unavailable");
        }
        Ok(Premises {
            premises: self.premises.get(goal).cloned().unwrap_or_default(),
        })
    }

    async fn get_theorem(
        &self,
        file_path: &str,
        theorem_name: &str,
        session_id: &str,
        proof_version_hash: &str,
    ) -> Result<TheoremSource> {
        self.record(format!(
            "get_theorem {file_path} {theorem_name} {session_id} {proof_version_hash}"
        ));
        self.theorems
            .get(theorem_name)
            .cloned()
            .ok_or_else(|| anyhow!("no theorem named {theorem_name}"))
    }

    async fn finish_session(&self, session_id: &str) -> Result<()> {
        self.record(format!("finish_session {session_id}"));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tool transport
// ---------------------------------------------------------------------------

/// One recorded `tools/call`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// In-memory [`ToolTransport`].
///
/// Each tool replays its queued replies; a tool with an empty queue
/// answers with its fallback, or `"ok"` if none was set.
pub struct FakeToolTransport {
    tools: Vec<ToolDescriptor>,
    replies: Mutex<HashMap<String, VecDeque<Result<ToolReply, String>>>>,
    fallbacks: HashMap<String, ToolReply>,
    calls: Mutex<Vec<RecordedToolCall>>,
}

impl FakeToolTransport {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            replies: Mutex::new(HashMap::new()),
            fallbacks: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// The usual tool set: `check_proof` plus `get_theorem`.
    pub fn standard() -> Self {
        Self::new(vec![check_proof_descriptor(), get_theorem_descriptor()])
    }

    pub fn reply(self, tool: &str, text: &str, hash: Option<&str>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(tool.to_string())
            .or_default()
            .push_back(Ok(ToolReply {
                text: text.to_string(),
                hash: hash.map(str::to_string),
            }));
        self
    }

    pub fn reply_error(self, tool: &str, error: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(tool.to_string())
            .or_default()
            .push_back(Err(error.to_string()));
        self
    }

    pub fn fallback(mut self, tool: &str, text: &str) -> Self {
        self.fallbacks.insert(
            tool.to_string(),
            ToolReply {
                text: text.to_string(),
                hash: None,
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<RecordedToolCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolTransport for FakeToolTransport {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolReply> {
        self.calls.lock().unwrap().push(RecordedToolCall {
            name: name.to_string(),
            arguments,
        });
        if !self.tools.iter().any(|t| t.name == name) {
            bail!("unknown tool {name}");
        }
        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Ok(self.fallbacks.get(name).cloned().unwrap_or(ToolReply {
                text: "ok".to_string(),
                hash: None,
            })),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn check_proof_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: "check_proof".to_string(),
        description: "Check a proof of the current theorem".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "proof": {"type": "string", "description": "Full proof script"},
                "coqSessionId": {"type": "string"},
                "proofVersionHash": {"type": "string"}
            },
            "required": ["proof", "coqSessionId", "proofVersionHash"]
        }),
    }
}

pub fn get_theorem_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: "get_theorem".to_string(),
        description: "Fetch a theorem with its proof".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "theoremName": {"type": "string", "description": "Name of the theorem"},
                "coqSessionId": {"type": "string"}
            },
            "required": ["theoremName", "coqSessionId"]
        }),
    }
}

/// Checker JSON for a failed proof.
pub fn invalid_proof_json(attempted: &str, hash: Option<&str>) -> String {
    let mut v = json!({
        "success": false,
        "goals": ["n + 0 = n"],
        "message": "Unable to unify",
        "attemptedProof": attempted,
        "validPrefix": "intros n."
    });
    if let Some(h) = hash {
        v["hash"] = json!(h);
    }
    v.to_string()
}

/// Checker JSON for a checker-side failure.
pub fn transport_error_json(error: &str) -> String {
    json!({"success": false, "error": error, "message": ""}).to_string()
}

/// Checker JSON for a finished proof.
pub fn complete_json(proof: &str, hash: Option<&str>) -> String {
    let mut v = json!({
        "success": true,
        "goals": [],
        "message": "Proof complete and valid",
        "proof": proof
    });
    if let Some(h) = hash {
        v["hash"] = json!(h);
    }
    v.to_string()
}

/// Checker JSON for a valid but unfinished proof.
pub fn partial_json(proof: &str, goals: Value) -> String {
    json!({
        "success": true,
        "goals": goals,
        "message": "Proof is incomplete but valid so far",
        "proof": proof
    })
    .to_string()
}
