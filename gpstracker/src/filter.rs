//! Raw fix filtering.
//!
//! Three independent thresholds, checked in order; the first one that
//! fails decides the verdict:
//!
//! 1. accuracy - `horizontal_accuracy_m > desired_accuracy_m` is too imprecise
//! 2. interval - less than `min_interval` of wall time since the previous
//!    accepted fix (or a timestamp before it) is too soon
//! 3. distance - less than `min_distance_m` of great-circle distance from
//!    the previous accepted fix is too close
//!
//! The first fix of a session only has to pass the accuracy check.

use std::fmt;

use crate::config::TrackingConfig;
use crate::fix::LocationFix;

/// Outcome of evaluating one candidate fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    TooImprecise,
    TooSoon,
    TooClose,
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        self == Verdict::Accepted
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::TooImprecise => "too_imprecise",
            Verdict::TooSoon => "too_soon",
            Verdict::TooClose => "too_close",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold filter bound to one session's configuration.
#[derive(Debug, Clone)]
pub struct FixFilter {
    config: TrackingConfig,
}

impl FixFilter {
    pub fn new(config: TrackingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Classify `candidate` against the previously accepted fix.
    pub fn evaluate(&self, previous: Option<&LocationFix>, candidate: &LocationFix) -> Verdict {
        evaluate(previous, candidate, &self.config)
    }

    pub fn accept(&self, previous: Option<&LocationFix>, candidate: &LocationFix) -> bool {
        self.evaluate(previous, candidate).is_accepted()
    }
}

/// Classify `candidate` against `previous` under `config`.
pub fn evaluate(
    previous: Option<&LocationFix>,
    candidate: &LocationFix,
    config: &TrackingConfig,
) -> Verdict {
    if candidate.horizontal_accuracy_m() > config.desired_accuracy_m {
        return Verdict::TooImprecise;
    }

    let Some(previous) = previous else {
        return Verdict::Accepted;
    };

    match candidate
        .timestamp()
        .wall_elapsed_since(&previous.timestamp())
    {
        Some(elapsed) if elapsed >= config.min_interval => {}
        _ => return Verdict::TooSoon,
    }

    if previous.distance_to(candidate) < config.min_distance_m {
        return Verdict::TooClose;
    }

    Verdict::Accepted
}

/// `true` when `candidate` passes every threshold.
pub fn accept(
    previous: Option<&LocationFix>,
    candidate: &LocationFix,
    config: &TrackingConfig,
) -> bool {
    evaluate(previous, candidate, config).is_accepted()
}
