//! Shared test utilities for controlmap integration tests.
//!
//! This module provides:
//! - `TestHarness`, a service wired to temp directories and a scripted agent
//! - Builders for configure requests and agent replies

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{AgentCall, Reply, ScriptedAgent, TestHarness};
