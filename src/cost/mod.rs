pub mod controller;
pub mod error;
pub mod model;

pub use controller::{CostController, SharedCostController};
pub use error::CostError;
pub use model::{
    Budget, BudgetCheckResult, BudgetScope, CostEstimate, CostEstimationMethod,
    CostReconciliation, EnforcementMode,
};
