//! Plan generation by adversarial debate.
//!
//! Debater A proposes, debater B critiques and refines, for a fixed number
//! of rounds. A judge then reads the whole transcript and answers with
//! `{"winner": "A"|"B", "plan": "..."}`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::verdict::parse_json;
use crate::message::Message;
use crate::model::{ChatModel, ToolSpec};
use crate::prompts;

/// The side the judge picked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    #[default]
    A,
    B,
}

/// The judge's decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JudgeVerdict {
    pub winner: Winner,
    pub plan: String,
}

#[derive(Deserialize)]
struct RawVerdict {
    winner: String,
    plan: String,
}

impl JudgeVerdict {
    /// Parse the judge's reply. Anything unparseable yields the default
    /// verdict: winner A with an empty plan.
    pub fn parse(raw: &str) -> Self {
        match parse_json::<RawVerdict>(raw) {
            Some(v) => Self {
                winner: if v.winner.trim().eq_ignore_ascii_case("b") {
                    Winner::B
                } else {
                    Winner::A
                },
                plan: v.plan,
            },
            None => {
                tracing::warn!("judge reply is not a valid verdict, defaulting to A");
                Self::default()
            }
        }
    }
}

/// Models taking part in one debate.
#[derive(Clone, Copy)]
pub struct Debaters<'a> {
    pub a: &'a dyn ChatModel,
    pub b: &'a dyn ChatModel,
    pub judge: &'a dyn ChatModel,
}

/// Everything a debate produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DebateOutcome {
    /// Message contents in order, starting with the two seed lines.
    pub transcript: Vec<String>,
    pub verdict: JudgeVerdict,
}

/// Run one full debate about `theorem`.
pub async fn run_debate(
    debaters: Debaters<'_>,
    theorem: &str,
    tools: &[ToolSpec],
    rounds: usize,
) -> Result<DebateOutcome> {
    let summary = prompts::tool_summary(tools);
    let mut transcript = vec![
        Message::system(prompts::debate_opening(theorem)),
        Message::ai(prompts::debate_tools(&summary)),
    ];

    for round in 0..rounds {
        let prompt = framed(
            [
                prompts::debate_tools_header(&summary),
                prompts::DEBATER_A_ROLE.to_string(),
            ],
            &transcript,
            prompts::debater_a_turn(theorem),
        );
        let reply = debaters
            .a
            .invoke(&prompt, &[])
            .await
            .with_context(|| format!("debater A failed in round {round}"))?;
        transcript.push(Message::ai(reply.content()));

        let prompt = framed(
            [
                prompts::debate_tools_header(&summary),
                prompts::DEBATER_B_ROLE.to_string(),
            ],
            &transcript,
            prompts::debater_b_turn(theorem),
        );
        let reply = debaters
            .b
            .invoke(&prompt, &[])
            .await
            .with_context(|| format!("debater B failed in round {round}"))?;
        transcript.push(Message::ai(reply.content()));

        tracing::debug!(round, "debate round finished");
    }

    let prompt = framed(
        [
            prompts::judge_tools_header(&summary),
            prompts::JUDGE_ROLE.to_string(),
        ],
        &transcript,
        prompts::JUDGE_TURN.to_string(),
    );
    let reply = debaters
        .judge
        .invoke(&prompt, &[])
        .await
        .context("judge failed")?;
    let verdict = JudgeVerdict::parse(reply.content());
    if verdict.plan.trim().is_empty() {
        tracing::warn!(winner = ?verdict.winner, "judge returned an empty plan");
    }

    Ok(DebateOutcome {
        transcript: transcript.iter().map(|m| m.content().to_string()).collect(),
        verdict,
    })
}

/// System lines, then the transcript, then the turn instruction.
fn framed(system: [String; 2], transcript: &[Message], turn: String) -> Vec<Message> {
    let mut prompt: Vec<Message> = system.into_iter().map(Message::system).collect();
    prompt.extend_from_slice(transcript);
    prompt.push(Message::human(turn));
    prompt
}
