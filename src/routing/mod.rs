//! Routing Engine and Strategies (spec §4.5/§4.6): scores eligible keys
//! against an objective and selects one, after policy and quota filtering.

pub mod decision;
pub mod engine;
pub mod error;
pub mod objective;
pub mod scoring;
pub mod strategies;

pub use decision::{Alternative, RoutingDecision};
pub use engine::RoutingEngine;
pub use error::RoutingError;
pub use objective::{Objective, RoutingObjective};
pub use strategies::{strategy_for, RoutingStrategy};
