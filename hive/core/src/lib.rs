// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `aegis-hive-core` — Lineage & Coordination Core (BC-7)
//!
//! Ground-truth primitives for the AEGIS hive engine:
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | Lineage ledger, routing graph, homeostatic modes, config |
//! | [`application`] | Application | Ledger service, routing pruner background task |
//! | [`infrastructure`] | Infrastructure | Event bus, artifact store, telemetry init |
//!
//! The swarm consensus engine lives in the sibling `aegis-hive-swarm` crate and
//! builds exclusively on the types exported here.
//!
//! See AGENTS.md §BC-7 Generative Lineage Context.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
