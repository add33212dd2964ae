//! Integration tests for keeper-bot.
//!
//! These tests drive the full cycle against in-memory collaborators:
//! - Oracle price to candidate classification
//! - Dispatch, skip verification and failure containment
//! - Anti-overlap between consecutive triggers

pub mod common;
