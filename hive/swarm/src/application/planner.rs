// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Round Planner (ADR-120)
//!
//! PLAN generates `n` distinct fork parameter sets, biased by the round's
//! [`SystemMode`]: exploration widens the entropy band, exploitation narrows
//! it toward the best previously observed entropy, throttling shrinks the
//! round width, and recovery plans a reduced-width diagnostic probe.
//!
//! Generation is deterministic in `(round, mode, hint)` so a round can be
//! replayed exactly.

use crate::domain::fork::ForkParameters;
use hive_core::domain::config::SwarmConfig;
use hive_core::domain::mode::SystemMode;
use tracing::debug;

pub struct Planner {
    config: SwarmConfig,
}

impl Planner {
    pub fn new(config: SwarmConfig) -> Self {
        Self { config }
    }

    /// Generate the parameter sets for one round.
    ///
    /// `entropy_hint` is the best entropy observed in prior rounds; only
    /// EXPLOIT narrows toward it.
    pub fn plan(
        &self,
        round: u64,
        mode: SystemMode,
        entropy_hint: Option<f64>,
    ) -> Vec<ForkParameters> {
        let width = self.width_for(mode);
        let (lo, hi) = self.entropy_band(mode, entropy_hint);

        let parameters: Vec<ForkParameters> = (0..width)
            .map(|i| {
                let t = if width == 1 {
                    0.5
                } else {
                    i as f64 / (width - 1) as f64
                };
                ForkParameters {
                    index: i as u32,
                    mode,
                    entropy: lo + (hi - lo) * t,
                    seed: round.wrapping_mul(1_000).wrapping_add(i as u64),
                }
            })
            .collect();

        debug!(
            round,
            mode = mode.label(),
            width,
            entropy_lo = lo,
            entropy_hi = hi,
            "Round planned"
        );
        parameters
    }

    fn width_for(&self, mode: SystemMode) -> usize {
        match mode {
            SystemMode::Explore | SystemMode::Synthesize | SystemMode::Exploit => {
                self.config.fork_count
            }
            SystemMode::Throttle => {
                (self.config.fork_count / self.config.throttle_divisor.max(1)).max(1)
            }
            SystemMode::Recover => self.config.diagnostic_width.max(1),
        }
    }

    fn entropy_band(&self, mode: SystemMode, hint: Option<f64>) -> (f64, f64) {
        let floor = self.config.entropy_floor;
        let ceiling = self.config.entropy_ceiling;
        let range = ceiling - floor;

        match mode {
            // Full width of the configured band.
            SystemMode::Explore => (floor, ceiling),
            // Middle half.
            SystemMode::Synthesize => (floor + range * 0.25, ceiling - range * 0.25),
            // Tight band around the hint; center of the band if no prior
            // rounds produced one.
            SystemMode::Exploit => {
                let center = hint.unwrap_or(floor + range * 0.5);
                let spread = range * 0.1;
                (
                    (center - spread).max(floor),
                    (center + spread).min(ceiling),
                )
            }
            // Conservative lower half.
            SystemMode::Throttle => (floor, floor + range * 0.5),
            // Minimal-entropy probes.
            SystemMode::Recover => (floor, floor + range * 0.2),
        }
    }
}
