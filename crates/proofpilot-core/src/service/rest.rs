//! HTTP client for the project/checker REST service.
//!
//! Every endpoint is a `GET` with query parameters returning JSON.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    CheckProofResponse, DEFAULT_MAX_PREMISES, Premises, ProofService, SessionStart,
    SessionTheorem, TheoremSource,
};

/// [`ProofService`] over the REST document API
/// (e.g. `http://localhost:8000/rest/document`).
#[derive(Debug, Clone)]
pub struct RestProofService {
    base_url: String,
    client: reqwest::Client,
    max_premises: u32,
}

impl RestProofService {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, None)
    }

    /// Build a client whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: builder.build().context("failed to build HTTP client")?,
            max_premises: DEFAULT_MAX_PREMISES,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");
        let resp = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("{url} returned an error status"))?;
        resp.json::<T>()
            .await
            .with_context(|| format!("invalid JSON from {url}"))
    }
}

#[async_trait]
impl ProofService for RestProofService {
    async fn start_session(&self, file_path: &str, theorem_name: &str) -> Result<SessionStart> {
        self.get(
            "/start-session",
            &[("filePath", file_path), ("theoremName", theorem_name)],
        )
        .await
    }

    async fn get_session_theorem(
        &self,
        session_id: &str,
        proof_version_hash: &str,
    ) -> Result<SessionTheorem> {
        self.get(
            "/session-theorem",
            &[
                ("coqSessionId", session_id),
                ("proofVersionHash", proof_version_hash),
            ],
        )
        .await
    }

    async fn check_proof(
        &self,
        proof: &str,
        session_id: &str,
        proof_version_hash: &str,
    ) -> Result<CheckProofResponse> {
        self.get(
            "/check-proof",
            &[
                ("proof", proof),
                ("coqSessionId", session_id),
                ("proofVersionHash", proof_version_hash),
            ],
        )
        .await
    }

    async fn get_premises(
        &self,
        goal: &str,
        file_path: &str,
        session_id: &str,
    ) -> Result<Premises> {
        let max = self.max_premises.to_string();
        self.get(
            "/get-premises",
            &[
                ("goal", goal),
                ("filePath", file_path),
                ("coqSessionId", session_id),
                ("maxNumberOfPremises", max.as_str()),
            ],
        )
        .await
    }

    async fn get_theorem(
        &self,
        file_path: &str,
        theorem_name: &str,
        session_id: &str,
        proof_version_hash: &str,
    ) -> Result<TheoremSource> {
        self.get(
            "/theorem",
            &[
                ("filePath", file_path),
                ("theoremName", theorem_name),
                ("coqSessionId", session_id),
                ("proofVersionHash", proof_version_hash),
            ],
        )
        .await
    }

    async fn finish_session(&self, session_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .get("/finish-session", &[("coqSessionId", session_id)])
            .await?;
        Ok(())
    }
}
