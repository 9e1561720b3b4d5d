// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Hive Application Layer
//!
//! Use-case services coordinating domain aggregates with infrastructure:
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`ledger_service`] | Durable insert pipeline (persist → commit → publish) |
//! | [`routing_pruner`] | Periodic routing-graph prune background task |

pub mod ledger_service;
pub mod routing_pruner;

pub use ledger_service::{LedgerService, LedgerServiceError};
pub use routing_pruner::{RoutingPruner, RoutingPrunerConfig};
