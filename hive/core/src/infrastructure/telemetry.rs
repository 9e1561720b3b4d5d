// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tracing bootstrap shared by binaries and integration harnesses.

use tracing::Level;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the provided default level applies.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_level: Level) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level.to_string()))
        .unwrap_or_default();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
