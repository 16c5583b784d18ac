//! Plan-driven proof orchestration.
//!
//! A run generates candidate proof plans, ranks them, and tries them one
//! at a time. Each attempt is a conversation between an executor model and
//! a remote proof checker reached through a tool server, with critique,
//! replanning and summarization steps along the way.

pub mod checker;
pub mod config;
pub mod context;
pub mod executor;
pub mod message;
pub mod model;
pub mod orchestrator;
pub mod planning;
pub mod prompts;
pub mod service;
pub mod state;
pub mod tools;
