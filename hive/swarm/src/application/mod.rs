// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Application Layer
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`planner`] | Mode-biased fork parameter generation (PLAN) |
//! | [`engine`] | Round state machine (DISPATCH → COMMIT), `ForkExecutor` port |
//! | [`driver`] | Sequential round loop threading the homeostatic controller |

pub mod driver;
pub mod engine;
pub mod planner;

pub use driver::{KpiSource, LedgerKpiSource, RoundDriver};
pub use engine::{ForkExecutor, ForkOutput, SwarmEngine};
pub use planner::Planner;
