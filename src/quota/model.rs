//! Quota state entity: per-key capacity tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete summary of remaining capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityState {
    Abundant,
    Constrained,
    Critical,
    Exhausted,
    Recovering,
}

/// Unit the quota is tracked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityUnit {
    Requests,
    Tokens,
    Mixed,
}

/// Rolling window the quota resets on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Hourly,
    Daily,
    Monthly,
    Custom,
}

impl TimeWindow {
    pub fn duration(&self) -> chrono::Duration {
        match self {
            TimeWindow::Hourly => chrono::Duration::hours(1),
            TimeWindow::Daily => chrono::Duration::days(1),
            TimeWindow::Monthly => chrono::Duration::days(30),
            TimeWindow::Custom => chrono::Duration::hours(1),
        }
    }
}

/// Confidence bucket for a predicted-exhaustion instant (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionConfidence {
    Low,
    Medium,
    High,
    Unknown,
}

/// How the remaining-capacity value was estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    ProviderReported,
    Heuristic,
    Unknown,
}

/// A remaining-capacity value that may be exact, a bounded range, a
/// one-sided bound, or entirely unknown — each carrying a confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CapacityEstimate {
    Exact {
        value: u64,
        confidence: f64,
        method: EstimationMethod,
        last_verified: Option<DateTime<Utc>>,
    },
    Range {
        min: u64,
        max: u64,
        confidence: f64,
        method: EstimationMethod,
        last_verified: Option<DateTime<Utc>>,
    },
    Bound {
        at_least: Option<u64>,
        at_most: Option<u64>,
        confidence: f64,
        method: EstimationMethod,
        last_verified: Option<DateTime<Utc>>,
    },
    Unknown {
        confidence: f64,
        method: EstimationMethod,
    },
}

impl CapacityEstimate {
    /// Best-effort numeric reading used for threshold arithmetic. Exact and
    /// Range return a definite number; Bound falls back to `at_least` or
    /// `at_most`; Unknown returns `None`.
    pub fn numeric(&self) -> Option<u64> {
        match self {
            CapacityEstimate::Exact { value, .. } => Some(*value),
            CapacityEstimate::Range { min, max, .. } => Some((*min + *max) / 2),
            CapacityEstimate::Bound {
                at_least, at_most, ..
            } => at_least.or(*at_most),
            CapacityEstimate::Unknown { .. } => None,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            CapacityEstimate::Exact { confidence, .. }
            | CapacityEstimate::Range { confidence, .. }
            | CapacityEstimate::Bound { confidence, .. }
            | CapacityEstimate::Unknown { confidence, .. } => *confidence,
        }
    }

    pub fn unknown() -> Self {
        CapacityEstimate::Unknown {
            confidence: 0.0,
            method: EstimationMethod::Unknown,
        }
    }

    pub fn exact(value: u64) -> Self {
        CapacityEstimate::Exact {
            value,
            confidence: 1.0,
            method: EstimationMethod::ProviderReported,
            last_verified: None,
        }
    }
}

/// Per-unit capacity bookkeeping (used directly for `Requests`/`Tokens`
/// units, and twice over — once per field set — when `unit == Mixed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityTrack {
    pub remaining: CapacityEstimate,
    pub total: Option<u64>,
    pub used: u64,
}

impl CapacityTrack {
    pub fn new_unknown() -> Self {
        Self {
            remaining: CapacityEstimate::unknown(),
            total: None,
            used: 0,
        }
    }

    /// Fraction of capacity remaining in [0, 1], or `None` if total is
    /// unknown (can't derive a capacity state from raw thresholds then).
    pub fn fraction_remaining(&self) -> Option<f64> {
        let total = self.total?;
        if total == 0 {
            return Some(0.0);
        }
        let remaining = self.remaining.numeric().unwrap_or(total.saturating_sub(self.used));
        Some((remaining as f64 / total as f64).clamp(0.0, 1.0))
    }
}

/// Per-key capacity state, lazily created on first reference (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaState {
    pub id: String,
    pub key_id: String,
    pub capacity_state: CapacityState,
    pub unit: CapacityUnit,
    pub requests: CapacityTrack,
    /// Only populated (and meaningful) when `unit == Mixed` or `Tokens`.
    pub tokens: Option<CapacityTrack>,
    pub window: TimeWindow,
    pub reset_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuotaState {
    pub fn new_default(
        id: String,
        key_id: String,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            key_id,
            capacity_state: CapacityState::Abundant,
            unit: CapacityUnit::Requests,
            requests: CapacityTrack::new_unknown(),
            tokens: None,
            window,
            reset_at: now + window.duration(),
            updated_at: now,
        }
    }

    /// Derive capacity state from remaining/total thresholds (spec §3):
    /// >=80% Abundant, >=50% Constrained, >=20% Critical, else Exhausted.
    /// Falls back to the current state when total capacity is unknown
    /// (there is nothing to threshold against).
    pub fn derive_capacity_state(&self) -> CapacityState {
        let fraction = match self.unit {
            CapacityUnit::Requests => self.requests.fraction_remaining(),
            CapacityUnit::Tokens => self
                .tokens
                .as_ref()
                .and_then(CapacityTrack::fraction_remaining),
            CapacityUnit::Mixed => {
                let r = self.requests.fraction_remaining();
                let t = self.tokens.as_ref().and_then(CapacityTrack::fraction_remaining);
                match (r, t) {
                    (Some(r), Some(t)) => Some(r.min(t)),
                    (Some(r), None) => Some(r),
                    (None, Some(t)) => Some(t),
                    (None, None) => None,
                }
            }
        };

        match fraction {
            Some(f) if f >= 0.80 => CapacityState::Abundant,
            Some(f) if f >= 0.50 => CapacityState::Constrained,
            Some(f) if f >= 0.20 => CapacityState::Critical,
            Some(_) => CapacityState::Exhausted,
            None => self.capacity_state,
        }
    }
}
