//! Routing objective: the preference order used by the Routing Engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    Cost,
    Reliability,
    Fairness,
    Quality,
    Latency,
    Speed,
}

impl std::str::FromStr for Objective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cost" => Ok(Objective::Cost),
            "reliability" => Ok(Objective::Reliability),
            "fairness" => Ok(Objective::Fairness),
            "quality" => Ok(Objective::Quality),
            "latency" => Ok(Objective::Latency),
            "speed" => Ok(Objective::Speed),
            other => Err(format!("unknown routing objective: {other}")),
        }
    }
}

/// A primary tag plus optional secondary tags and weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingObjective {
    pub primary: Objective,
    #[serde(default)]
    pub secondary: Vec<Objective>,
    #[serde(default)]
    pub weights: Option<HashMap<Objective, f64>>,
    #[serde(default)]
    pub constraints: Option<HashMap<String, String>>,
}

impl RoutingObjective {
    pub fn primary_only(primary: Objective) -> Self {
        Self {
            primary,
            secondary: Vec::new(),
            weights: None,
            constraints: None,
        }
    }

    pub fn default_fairness() -> Self {
        Self::primary_only(Objective::Fairness)
    }

    /// All objectives this routing request cares about: primary + secondary,
    /// de-duplicated, primary first.
    pub fn all_objectives(&self) -> Vec<Objective> {
        let mut objectives = vec![self.primary];
        for o in &self.secondary {
            if !objectives.contains(o) {
                objectives.push(*o);
            }
        }
        objectives
    }

    /// Effective weight map: explicit weights when present, else an equal
    /// split across `all_objectives()`.
    pub fn effective_weights(&self) -> HashMap<Objective, f64> {
        if let Some(weights) = &self.weights {
            return weights.clone();
        }
        let objectives = self.all_objectives();
        let share = 1.0 / objectives.len() as f64;
        objectives.into_iter().map(|o| (o, share)).collect()
    }

    pub fn is_multi_objective(&self) -> bool {
        self.weights.is_some() || !self.secondary.is_empty()
    }
}

impl From<&str> for RoutingObjective {
    fn from(s: &str) -> Self {
        match s.parse::<Objective>() {
            Ok(o) => Self::primary_only(o),
            Err(_) => Self::default_fairness(),
        }
    }
}
