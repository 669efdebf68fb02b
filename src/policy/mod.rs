pub mod engine;
pub mod error;
pub mod model;

pub use engine::PolicyEngine;
pub use error::PolicyError;
pub use model::{
    Policy, PolicyCandidate, PolicyConstraints, PolicyContext, PolicyResult, PolicyRules,
    PolicyScope, PolicyType,
};
