//! Proof state shared by one run: the proof-version hash, the goal set and
//! the consecutive-failure streak.
//!
//! The hash lives in a `tokio::sync::watch` channel. [`ProofStateTracker`]
//! is the only writer; every tool adapter holds a receiver and reads the
//! latest value when it builds a request, so an update is visible to all
//! adapters before the next tool call.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;

use crate::checker::{CheckOutcome, CheckVerdict};

/// Identity of the theorem under proof and its checker session.
///
/// The proof-version hash is not stored here; it changes during the run
/// and lives in [`ProofVersion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofSession {
    pub session_id: String,
    pub theorem_name: String,
    pub theorem_statement: String,
    pub file_path: String,
}

/// Handle to the session's proof-version hash.
///
/// Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct ProofVersion {
    tx: Arc<watch::Sender<String>>,
}

impl ProofVersion {
    pub fn new(initial: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(initial.into());
        Self { tx: Arc::new(tx) }
    }

    /// The current hash.
    pub fn current(&self) -> String {
        self.tx.borrow().clone()
    }

    /// A receiver that always observes the latest hash.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }

    /// Replace the hash. Returns `true` if the value changed.
    pub(crate) fn advance(&self, new_hash: &str) -> bool {
        self.tx.send_if_modified(|current| {
            if current == new_hash {
                false
            } else {
                *current = new_hash.to_string();
                true
            }
        })
    }
}

/// Mutable proof state of a run or of one plan attempt.
///
/// `Clone` deep-copies the goals, the streak and the completion state while
/// sharing the [`ProofVersion`]: a plan attempt starts from a snapshot of
/// the run state but keeps writing the one hash every adapter reads.
#[derive(Debug, Clone)]
pub struct ProofStateTracker {
    version: ProofVersion,
    goals: Vec<Value>,
    failure_streak: u32,
    finished_proof: Option<String>,
}

impl ProofStateTracker {
    pub fn new(version: ProofVersion) -> Self {
        Self {
            version,
            goals: Vec::new(),
            failure_streak: 0,
            finished_proof: None,
        }
    }

    pub fn hash(&self) -> String {
        self.version.current()
    }

    pub fn goals(&self) -> &[Value] {
        &self.goals
    }

    /// Replace the goal set wholesale.
    pub fn set_goals(&mut self, goals: Vec<Value>) {
        self.goals = goals;
    }

    pub fn failure_streak(&self) -> u32 {
        self.failure_streak
    }

    pub fn reset_failure_streak(&mut self) {
        self.failure_streak = 0;
    }

    pub fn is_finished(&self) -> bool {
        self.finished_proof.is_some()
    }

    pub fn finished_proof(&self) -> Option<&str> {
        self.finished_proof.as_deref()
    }

    /// Record a hash reported by a tool result. Returns `true` if it changed.
    pub fn observe_hash(&mut self, hash: Option<&str>) -> bool {
        match hash {
            Some(h) if !h.is_empty() => {
                let changed = self.version.advance(h);
                if changed {
                    tracing::debug!(hash = %h, "proof version advanced");
                }
                changed
            }
            _ => false,
        }
    }

    /// Fold a classified checker result into the state.
    pub fn apply(&mut self, verdict: &CheckVerdict) {
        match verdict.outcome {
            CheckOutcome::InvalidProof => self.failure_streak += 1,
            CheckOutcome::TransportError => {}
            CheckOutcome::Partial { .. } | CheckOutcome::Complete | CheckOutcome::Unrecognized => {
                self.failure_streak = 0;
            }
        }

        if verdict.outcome != CheckOutcome::TransportError {
            if let Some(goals) = &verdict.goals {
                self.goals = goals.clone();
            }
        }

        if let Some(proof) = &verdict.finished_proof {
            tracing::info!("proof completed");
            self.finished_proof = Some(proof.clone());
        }

        self.observe_hash(verdict.hash.as_deref());
    }
}
