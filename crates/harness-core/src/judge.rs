//! Deterministic judge.
//!
//! The per-code weight table and the penalty clamp are a stored-baseline
//! contract: changing either invalidates every recorded regression baseline.

use crate::domain::{codes, Finding, JudgeScore, ScenarioResult};

/// Upper bound on the accumulated penalty.
pub const MAX_PENALTY: f64 = 2.0;

/// Penalty for a code outside the weight table.
pub const DEFAULT_PENALTY: f64 = 0.1;

/// Effect of one finding on the score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FindingWeight {
    pub penalty: f64,
    pub hard_failure: bool,
    pub counter_intuitive: bool,
}

impl FindingWeight {
    const fn hard(penalty: f64) -> Self {
        Self {
            penalty,
            hard_failure: true,
            counter_intuitive: false,
        }
    }

    const fn counter_intuitive(penalty: f64) -> Self {
        Self {
            penalty,
            hard_failure: false,
            counter_intuitive: true,
        }
    }
}

/// Weight for `code`.
pub fn finding_weight(code: &str) -> FindingWeight {
    match code {
        codes::STEP_FAILED | codes::GENERATED_GO_NOT_FORMATTED => FindingWeight::hard(0.7),
        codes::ONBOARDING_INSTALL_MISSING => FindingWeight::hard(2.5),
        codes::ONBOARDING_INSTALL_VERIFY_MISSING => FindingWeight::counter_intuitive(1.2),
        codes::COUNTER_INTUITIVE_ABORT => FindingWeight::counter_intuitive(0.3),
        _ => FindingWeight {
            penalty: DEFAULT_PENALTY,
            hard_failure: false,
            counter_intuitive: false,
        },
    }
}

/// Score a scenario outcome and its findings against `threshold`.
pub fn judge(result: &ScenarioResult, findings: &[Finding], threshold: f64) -> JudgeScore {
    let pass_rate = if result.ok { 1.0 } else { 0.0 };
    let ux = 5.0 * pass_rate;
    let quality = 5.0 * pass_rate;

    let mut penalty = 0.0;
    let mut hard_failures = 0;
    let mut counter_intuitive = 0;
    for finding in findings {
        let weight = finding_weight(&finding.code);
        penalty += weight.penalty;
        if weight.hard_failure {
            hard_failures += 1;
        }
        if weight.counter_intuitive {
            counter_intuitive += 1;
        }
    }
    let penalty = penalty.min(MAX_PENALTY);
    let score = (ux + quality - penalty).max(0.0);

    JudgeScore {
        score,
        threshold,
        pass: score >= threshold,
        ux_score: ux,
        quality_score: quality,
        penalty_score: penalty,
        scenario_pass_rate: pass_rate,
        counter_intuitive,
        hard_failures,
        ..Default::default()
    }
}
