//! Errors surfaced by the Cost Controller.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::store::StateStoreError;

#[derive(Debug, Error)]
pub enum CostError {
    #[error("budget not found: {0}")]
    BudgetNotFound(String),

    #[error("invalid budget: {0}")]
    InvalidBudget(String),

    #[error(
        "budget exceeded: remaining {remaining} {currency}, violated budgets {violated:?}, \
         cost {cost} {currency}, limit {limit} {currency}"
    )]
    BudgetExceeded {
        remaining: Decimal,
        violated: Vec<String>,
        cost: Decimal,
        limit: Decimal,
        currency: String,
    },

    #[error(transparent)]
    Store(#[from] StateStoreError),
}
