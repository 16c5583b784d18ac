//! Prompt text sent to the models.

use crate::model::ToolSpec;

/// Proof script used to read the initial goal set.
pub const PROBE_PROOF: &str = "Proof.\nQed.";

pub const PROOF_COMPLETED: &str = "Proof completed successfully!";
pub const MAX_ITERATIONS_REACHED: &str = "Agent stopped due to max iterations.";

pub fn execution_system(theorem_name: &str, file_path: &str) -> String {
    format!(
        "You are an expert Coq prover. Your mission is to produce a **correct**, **complete**, \
         and **checkable** proof of the theorem `{theorem_name}` in file `{file_path}`.\n\
         \n\
         • **Follow the agreed plan** step by step.\n\
         • **Never** use `admit` or unsound shortcuts.\n\
         • **Always** emit valid JSON when calling a tool.\n\
         • After each proof step, invoke the `check_proof` tool and validate its JSON response.\n\
         \u{20}\u{20}– On error: parse the error message, adjust your call, and retry.\n\
         • Avoid unnecessary goal-focusing; prefer high-level tactics first.\n\
         • Keep your proof scripts concise, clear, and directly type-checkable by Coq.\n\
         \n\
         Begin now."
    )
}

pub fn theorem_to_prove(statement: &str, file_path: &str) -> String {
    format!("Theorem to prove: {statement} in file {file_path}")
}

/// Carries the previous attempts' failure summary into a new attempt.
pub fn previous_failures(summary: &str) -> String {
    format!("Summary:\n{summary}\nContinue theorem proving.")
}

pub fn follow_plan(plan: &str, similar_theorems: &[String]) -> String {
    format!(
        "You should prove the theorem. Here is the plan you should follow. Plan:\n{plan}.\n\
         Here are the theorems whose proofs can be similar to the target proof:\n{}",
        similar_theorems.join("\n\n")
    )
}

pub fn conversation_summary(summary: &str) -> String {
    format!("Conversation summary so far:\n{summary}")
}

pub fn critique(plan: &str, tool_summary: &str) -> String {
    format!(
        "Critique the last actions under overall plan:\n{plan}\n\
         Highlight deviations and suggest improvements. Think about what context should be \
         gathered to prove the theorem. Remember you have access to other files and theorems. \
         If you propose to use specific tool write its name as `tool_name`. Propose to continue \
         by applying tactic by tactic when you think it is useful.\
         Here is the description of the tools:\n\
         {tool_summary}\
         Do NOT CALL TOOLS."
    )
}

pub fn replan(plan: &str, tool_summary: &str) -> String {
    format!(
        "Refine the proof plan:\n{plan}\n using the critique above and similar-proof insights. \
         Pay attention to what tools are proposed to be called. Here is the description of the \
         tools:\n{tool_summary} Output **only** the updated plan in clear natural language."
    )
}

pub fn refined_plan(new_plan: &str) -> String {
    format!(
        "I have refined the plan based on the current proof progress: {new_plan}\n\
         Now continue with following this plan and calling tools"
    )
}

pub fn summarize_progress(transcript: &str) -> String {
    format!(
        "Please produce a concise bullet-point summary of the proof progress so far \
         (4-5) bullet points:\n\n{transcript}DO NOT CALL TOOLS."
    )
}

/// `similar_theorems` is expected most relevant first; it is shown reversed
/// so the most relevant material sits closest to the question.
pub fn borrow_from_similar(theorem_state: &str, similar_theorems: &[String]) -> String {
    let reversed: Vec<&str> = similar_theorems.iter().rev().map(String::as_str).collect();
    format!(
        "The current theorem state is {theorem_state}\n\
         List tactics, ideas, theorems and proof parts you can borrow to advance our proof.\
         (Do not call any tools.)\
         Here are some similar proofs to the goal of after valid proof prefix:\n\n{}\n\n",
        reversed.join("\n\n")
    )
}

pub const FAILURE_SUMMARY_REQUEST: &str =
    "Summarize **why** the proof attempt failed, in 6-8 concise bullet points.";

pub fn demoted_system(content: &str) -> String {
    format!("System message: {content}")
}

// Planning

pub const SIMPLE_PLAN_SYSTEM: &str = "You are a Coq expert assistant. First review the list of \
     available proof-assistant tools, then outline a clear, stepwise proof strategy. When you \
     reference a tool in your plan, wrap its name in backticks, e.g. `check_proof`.";

pub fn simple_plan_request(tools: &[ToolSpec], theorem: &str) -> String {
    let summary = tools
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "**Available tools:**\n{summary}\n\n\
         **Theorem to prove:**\n{theorem}\n\n\
         Please output a numbered plan of tactics and tool calls."
    )
}

pub fn tool_summary(tools: &[ToolSpec]) -> String {
    tools
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn debate_opening(theorem: &str) -> String {
    format!("Proof debate on: {theorem}")
}

pub fn debate_tools(tool_summary: &str) -> String {
    format!("Tools available for planning:\n{tool_summary}")
}

pub fn debate_tools_header(tool_summary: &str) -> String {
    format!("Available tools for proof planning:\n{tool_summary}")
}

pub fn judge_tools_header(tool_summary: &str) -> String {
    format!("Available tools for proof evaluation:\n{tool_summary}")
}

pub const DEBATER_A_ROLE: &str = "You are Debater A, a Coq expert. Use only natural language. \
     Build on the tools above where helpful.";

pub const DEBATER_B_ROLE: &str =
    "You are Debater B, a critical Coq theorist. Use natural language and tool references.";

pub const JUDGE_ROLE: &str = "You are the Judge: a neutral expert. Use natural language. \
     RESPOND ONLY IN JSON FORMAT {\"winner\": \"A\", \"plan\": \"...\"}. DO NOT SENT ANYTHING ELSE.";

pub fn debater_a_turn(theorem: &str) -> String {
    format!(
        "Theorem to prove:\n{theorem}\n\n\
         Outline your proof strategy this round, referencing tools if relevant."
    )
}

pub fn debater_b_turn(theorem: &str) -> String {
    format!(
        "Theorem to prove:\n{theorem}\n\n\
         Critique and refine Debater A's approach, suggesting tool-based improvements."
    )
}

pub const JUDGE_TURN: &str = "After reading all rounds, decide which plan is stronger ('A' or \
     'B') and provide a final consolidated proof plan.\n\n\
     Respond only as JSON: {\"winner\": \"A\", \"plan\": \"...\"}.";

pub const RANKER_SYSTEM: &str = "You are a plan evaluator for Coq proof strategies. You will get \
     a theorem and one candidate plan. Rate its chance of success from 1 (low) to 10 (high). \
     Output **only** valid JSON: {\"reason\":\"...\", \"score\":<integer>}";

pub fn ranker_request(theorem: &str, plan: &str) -> String {
    format!(
        "Theorem: {theorem}\nPlan: {plan}\n\n\
         Respond with exactly: {{\"reason\":\"...\", \"score\":<1-10>}}"
    )
}
