use thiserror::Error;

use crate::domain::LoanId;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid term: {0}")]
    InvalidTerm(String),

    #[error("Loan not found: #{0}")]
    LoanNotFound(LoanId),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
