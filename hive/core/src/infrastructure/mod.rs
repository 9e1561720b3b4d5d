// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Hive Infrastructure Layer
//!
//! In-process adapters the domain stays ignorant of: the event bus, the
//! artifact store, and telemetry initialization.

pub mod event_bus;
pub mod storage;
pub mod telemetry;
