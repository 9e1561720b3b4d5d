// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Payload Fusion (ADR-120)
//!
//! FUSE merges the selected forks' payloads into one synthesized payload. It
//! is a pure function of the selected payload set: inputs are normalized by
//! fork index before merging, so the output is identical regardless of fork
//! completion order, and nothing here reads the clock.

use crate::domain::fork::{ForkMetrics, ForkResult};
use crate::domain::select::Selection;
use hive_core::domain::artifact::{ArtifactPayload, ArtifactScore};
use hive_core::domain::mode::SystemMode;
use serde_json::{Map, Value};

/// Fused payload plus the aggregate score attached to the committed artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Fusion {
    pub payload: ArtifactPayload,
    pub score: ArtifactScore,
}

/// Merge the top-k selected forks into one payload.
///
/// `top_k = None` fuses every frontier member. In RECOVER mode the output is
/// a `Diagnostic` payload; otherwise a `Synthesis`.
pub fn fuse(
    mode: SystemMode,
    selection: &Selection,
    forks: &[ForkResult],
    top_k: Option<usize>,
) -> Fusion {
    // Normalize: frontier order is ascending fork index already; truncate to
    // top-k with the champion always retained.
    let mut chosen: Vec<u32> = selection.frontier.clone();
    if let Some(k) = top_k {
        let k = k.max(1);
        if chosen.len() > k {
            chosen.truncate(k);
            if !chosen.contains(&selection.champion) {
                // Keep the champion at the expense of the last slot.
                let last = chosen.len() - 1;
                chosen[last] = selection.champion;
                chosen.sort_unstable();
            }
        }
    }

    let members: Vec<&ForkResult> = chosen
        .iter()
        .filter_map(|idx| forks.iter().find(|f| f.index == *idx))
        .collect();

    let content = merge_payloads(&members);
    let score = aggregate_score(&members);

    let payload = match mode {
        SystemMode::Recover => ArtifactPayload::Diagnostic {
            probe_count: members.len() as u32,
            content,
        },
        _ => ArtifactPayload::Synthesis {
            contributors: chosen,
            champion: selection.champion,
            content,
        },
    };

    Fusion { payload, score }
}

/// Key-union merge for object payloads (later contributors override, in
/// ascending index order); anything else is carried as an index-ordered list.
fn merge_payloads(members: &[&ForkResult]) -> Value {
    let payloads: Vec<&Value> = members.iter().filter_map(|f| f.payload.as_ref()).collect();

    let all_objects = !payloads.is_empty() && payloads.iter().all(|p| p.is_object());
    if all_objects {
        let mut merged = Map::new();
        for payload in payloads {
            if let Value::Object(map) = payload {
                for (key, value) in map {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        Value::Object(merged)
    } else {
        Value::Array(payloads.into_iter().cloned().collect())
    }
}

/// Aggregate score: per-axis mean over the fused members.
fn aggregate_score(members: &[&ForkResult]) -> ArtifactScore {
    let metrics: Vec<&ForkMetrics> = members.iter().filter_map(|f| f.metrics.as_ref()).collect();
    if metrics.is_empty() {
        return ArtifactScore::new(0.0, 0.0, 0.0);
    }
    let n = metrics.len() as f64;
    ArtifactScore::new(
        metrics.iter().map(|m| m.continuity).sum::<f64>() / n,
        metrics.iter().map(|m| m.novelty).sum::<f64>() / n,
        metrics.iter().map(|m| m.regression_pass_rate).sum::<f64>() / n,
    )
}
