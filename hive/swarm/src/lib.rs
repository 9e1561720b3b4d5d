// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `aegis-hive-swarm` — Swarm Consensus Engine (BC-7, AGENTS.md §BC-7)
//!
//! Runs parallel fork explorations, scores their outputs, selects and fuses a
//! winning subset, and commits the result to the lineage ledger.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `ForkResult`, Pareto selection, fusion |
//! | [`application`] | Application | Planner, round engine, round driver |
//!
//! ## Key Concepts
//!
//! - **Fork**: one isolated exploratory execution within a round. Forks never
//!   share mutable state with each other.
//! - **Round**: one pass of the `PLAN → DISPATCH → COLLECT → SELECT → FUSE →
//!   COMMIT` state machine. Rounds are strictly sequential, never pipelined.
//! - **Consensus**: Pareto frontier over fork metrics, refined by a majority
//!   vote across independent selector heuristics, with a deterministic
//!   tie-break (highest novelty, then lowest fork index).
//!
//! ## Failure Posture
//!
//! Per-fork failures are isolated and recorded as metrics; one failing fork
//! never aborts its round. A round with zero survivors still commits an
//! empty-round artifact so lineage depth accounting stays consistent.

pub mod domain;
pub mod application;

pub use domain::*;
