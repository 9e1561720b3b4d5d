// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Layer (BC-7)
//!
//! Pure domain types for swarm rounds. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`fork`] | `ForkId`, `ForkParameters`, `ForkMetrics`, `ForkResult` |
//! | [`round`] | `RoundId`, `RoundPhase`, `RoundOutcome`, `SwarmError` |
//! | [`select`] | `Selection`, Pareto frontier, heuristic voting |
//! | [`fuse`] | Deterministic payload fusion |

pub mod fork;
pub mod fuse;
pub mod round;
pub mod select;

pub use fork::*;
pub use fuse::*;
pub use round::*;
pub use select::*;
