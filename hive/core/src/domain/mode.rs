// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Homeostatic Mode Machine (ADR-121)
//!
//! A small state machine that regulates system behavior from aggregate KPI
//! samples. Downstream, the swarm planner widens or narrows its parameter
//! space according to the current [`SystemMode`]; the mode is always passed
//! explicitly into planning calls, never read from a process-wide global, so
//! rounds stay independently testable.
//!
//! Transitions are hysteretic: a candidate mode must hold for a configured
//! number of consecutive samples before the switch is applied, which keeps a
//! single-sample blip from flapping the system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-wide operating mode.
///
/// `Recover` is reachable from any state and exits only to `Explore`, once
/// health is restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemMode {
    Explore,
    Synthesize,
    Exploit,
    Throttle,
    Recover,
}

impl SystemMode {
    /// Stable label used in logs and routing endpoint names.
    pub fn label(&self) -> &'static str {
        match self {
            SystemMode::Explore => "explore",
            SystemMode::Synthesize => "synthesize",
            SystemMode::Exploit => "exploit",
            SystemMode::Throttle => "throttle",
            SystemMode::Recover => "recover",
        }
    }

    fn ordinal(&self) -> u8 {
        match self {
            SystemMode::Explore => 0,
            SystemMode::Synthesize => 1,
            SystemMode::Exploit => 2,
            SystemMode::Throttle => 3,
            SystemMode::Recover => 4,
        }
    }
}

/// One aggregate KPI observation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KpiSample {
    /// Expected number of child artifacts spawned per committed artifact.
    pub cascade_probability: f64,
    /// Fraction of recent forks preserving continuity with their seeds.
    pub continuity_ratio: f64,
    /// Fraction of recent forks passing the regression suite.
    pub regression_pass_rate: f64,
    pub sampled_at: DateTime<Utc>,
}

impl KpiSample {
    pub fn now(cascade_probability: f64, continuity_ratio: f64, regression_pass_rate: f64) -> Self {
        Self {
            cascade_probability,
            continuity_ratio,
            regression_pass_rate,
            sampled_at: Utc::now(),
        }
    }
}

/// Mode thresholds. All externally supplied; defaults are overridable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeostatConfig {
    /// Cascade probability at which exploration gives way to synthesis.
    pub synthesize_at: f64,
    /// Cascade probability at which synthesis gives way to exploitation.
    pub exploit_at: f64,
    /// Cascade probability at which the system throttles.
    pub throttle_at: f64,
    /// Continuity floor; below it the system recovers.
    pub min_continuity: f64,
    /// Regression pass-rate floor; below it the system recovers.
    pub min_regression_pass: f64,
    /// Consecutive samples a candidate mode must hold before switching.
    pub hysteresis_samples: u32,
}

impl Default for HomeostatConfig {
    fn default() -> Self {
        Self {
            synthesize_at: 2.0,
            exploit_at: 3.0,
            throttle_at: 3.5,
            min_continuity: 0.9,
            min_regression_pass: 0.9,
            hysteresis_samples: 2,
        }
    }
}

/// Result of feeding one sample to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeDecision {
    /// Mode in effect after this sample.
    pub mode: SystemMode,
    /// Whether this sample completed a transition.
    pub changed: bool,
    /// What the classifier wanted, before hysteresis.
    pub candidate: SystemMode,
}

/// Homeostatic controller: KPI samples in, [`SystemMode`] out.
///
/// The classification itself is a pure function of one sample and the
/// thresholds ([`Homeostat::classify`]); the struct only carries the
/// hysteresis bookkeeping between samples.
#[derive(Debug, Clone)]
pub struct Homeostat {
    config: HomeostatConfig,
    current: SystemMode,
    /// Candidate mode and how many consecutive samples supported it.
    pending: Option<(SystemMode, u32)>,
}

impl Homeostat {
    pub fn new(config: HomeostatConfig) -> Self {
        Self {
            config,
            current: SystemMode::Explore,
            pending: None,
        }
    }

    pub fn current(&self) -> SystemMode {
        self.current
    }

    /// Pure threshold classification of a single sample.
    ///
    /// The health floors override the cascade bands entirely.
    pub fn classify(config: &HomeostatConfig, sample: &KpiSample) -> SystemMode {
        if sample.continuity_ratio < config.min_continuity
            || sample.regression_pass_rate < config.min_regression_pass
        {
            return SystemMode::Recover;
        }
        if sample.cascade_probability >= config.throttle_at {
            SystemMode::Throttle
        } else if sample.cascade_probability >= config.exploit_at {
            SystemMode::Exploit
        } else if sample.cascade_probability >= config.synthesize_at {
            SystemMode::Synthesize
        } else {
            SystemMode::Explore
        }
    }

    /// Feed one sample and apply hysteretic transition rules.
    pub fn observe(&mut self, sample: &KpiSample) -> ModeDecision {
        let mut candidate = Self::classify(&self.config, sample);

        // Recovery has a single exit: back to exploration, and only once the
        // health floors are met again.
        if self.current == SystemMode::Recover && candidate != SystemMode::Recover {
            candidate = SystemMode::Explore;
        }

        if candidate == self.current {
            self.pending = None;
            return ModeDecision {
                mode: self.current,
                changed: false,
                candidate,
            };
        }

        let supported = match self.pending {
            Some((mode, count)) if mode == candidate => count + 1,
            _ => 1,
        };

        if supported >= self.config.hysteresis_samples {
            let previous = self.current;
            self.current = candidate;
            self.pending = None;
            metrics::gauge!("hive_mode").set(f64::from(candidate.ordinal()));
            tracing::info!(
                from = previous.label(),
                to = candidate.label(),
                cascade = sample.cascade_probability,
                "Mode transition"
            );
            ModeDecision {
                mode: candidate,
                changed: true,
                candidate,
            }
        } else {
            self.pending = Some((candidate, supported));
            ModeDecision {
                mode: self.current,
                changed: false,
                candidate,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy(cascade: f64) -> KpiSample {
        KpiSample::now(cascade, 1.0, 1.0)
    }

    #[test]
    fn test_classification_bands() {
        let config = HomeostatConfig::default();
        assert_eq!(
            Homeostat::classify(&config, &healthy(1.0)),
            SystemMode::Explore
        );
        assert_eq!(
            Homeostat::classify(&config, &healthy(2.5)),
            SystemMode::Synthesize
        );
        assert_eq!(
            Homeostat::classify(&config, &healthy(3.2)),
            SystemMode::Exploit
        );
        assert_eq!(
            Homeostat::classify(&config, &healthy(3.9)),
            SystemMode::Throttle
        );
    }

    #[test]
    fn test_health_floor_overrides_cascade_bands() {
        let config = HomeostatConfig::default();
        let sample = KpiSample::now(1.0, 0.5, 1.0);
        assert_eq!(Homeostat::classify(&config, &sample), SystemMode::Recover);

        let sample = KpiSample::now(3.9, 1.0, 0.8);
        assert_eq!(Homeostat::classify(&config, &sample), SystemMode::Recover);
    }

    #[test]
    fn test_monotonic_cascade_ramp_walks_every_mode_in_order() {
        let mut homeostat = Homeostat::new(HomeostatConfig::default());
        let mut transitions = Vec::new();

        // 1.0 → 4.0 over 10 samples.
        for i in 0..10 {
            let cascade = 1.0 + 3.0 * (i as f64) / 9.0;
            let decision = homeostat.observe(&healthy(cascade));
            if decision.changed {
                transitions.push(decision.mode);
            }
        }

        assert_eq!(
            transitions,
            vec![
                SystemMode::Synthesize,
                SystemMode::Exploit,
                SystemMode::Throttle
            ]
        );
    }

    #[test]
    fn test_single_sample_blip_does_not_transition() {
        let mut homeostat = Homeostat::new(HomeostatConfig::default());
        homeostat.observe(&healthy(1.0));
        let blip = homeostat.observe(&healthy(2.5));
        assert!(!blip.changed);
        assert_eq!(blip.mode, SystemMode::Explore);

        // Back under the threshold: the pending candidate is discarded.
        let after = homeostat.observe(&healthy(1.0));
        assert!(!after.changed);
        assert_eq!(after.mode, SystemMode::Explore);

        // A fresh excursion starts counting from one again.
        let again = homeostat.observe(&healthy(2.5));
        assert!(!again.changed);
        assert_eq!(again.mode, SystemMode::Explore);
    }

    #[test]
    fn test_recover_entered_and_exits_only_to_explore() {
        let mut homeostat = Homeostat::new(HomeostatConfig::default());

        // Drive to EXPLOIT first.
        for _ in 0..3 {
            homeostat.observe(&healthy(3.2));
        }
        assert_eq!(homeostat.current(), SystemMode::Exploit);

        // Health collapses.
        let sick = KpiSample::now(3.2, 0.5, 1.0);
        homeostat.observe(&sick);
        let decision = homeostat.observe(&sick);
        assert!(decision.changed);
        assert_eq!(decision.mode, SystemMode::Recover);

        // Health restored while cascade is still in the EXPLOIT band: the
        // exit is EXPLORE regardless.
        homeostat.observe(&healthy(3.2));
        let decision = homeostat.observe(&healthy(3.2));
        assert!(decision.changed);
        assert_eq!(decision.mode, SystemMode::Explore);
    }

    #[test]
    fn test_hysteresis_window_is_configurable() {
        let config = HomeostatConfig {
            hysteresis_samples: 3,
            ..Default::default()
        };
        let mut homeostat = Homeostat::new(config);

        homeostat.observe(&healthy(2.5));
        homeostat.observe(&healthy(2.5));
        assert_eq!(homeostat.current(), SystemMode::Explore);
        let decision = homeostat.observe(&healthy(2.5));
        assert!(decision.changed);
        assert_eq!(decision.mode, SystemMode::Synthesize);
    }
}
