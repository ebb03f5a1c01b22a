use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{annuity_payment, Amount};

/// City-wide financial status summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub as_of: DateTime<Utc>,
    pub credit_score: i32,
    pub total_debt: Amount,
    pub monthly_payments: Amount,
    pub active_loans: usize,
    pub completed_loans: usize,
    pub treasury_balance: Amount,
    pub monthly_income: Amount,
    /// Annual rate a new loan would carry at the current credit score.
    pub effective_interest_rate: f64,
}

/// One row of a projected amortization schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub month: u32,
    pub payment: Amount,
    pub principal_portion: Amount,
    pub interest_portion: Amount,
    pub balance_after: Amount,
}

/// Full projected schedule for a hypothetical loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub principal: Amount,
    pub annual_interest_rate: f64,
    pub term_months: u32,
    pub monthly_payment: Amount,
    pub total_interest: Amount,
    pub rows: Vec<ScheduleRow>,
}

impl AmortizationSchedule {
    /// Project the fixed-payment schedule month by month. The sum of the
    /// principal portions reproduces the principal up to floating-point
    /// rounding.
    pub fn build(principal: Amount, annual_interest_rate: f64, term_months: u32) -> Self {
        let monthly_payment = annuity_payment(principal, annual_interest_rate, term_months);
        let monthly_rate = annual_interest_rate / 12.0;

        let mut rows = Vec::with_capacity(term_months as usize);
        let mut balance = principal;
        let mut total_interest = 0.0;

        for month in 1..=term_months {
            let interest = balance * monthly_rate;
            let principal_portion = monthly_payment - interest;
            balance -= principal_portion;
            total_interest += interest;

            rows.push(ScheduleRow {
                month,
                payment: monthly_payment,
                principal_portion,
                interest_portion: interest,
                balance_after: balance,
            });
        }

        Self {
            principal,
            annual_interest_rate,
            term_months,
            monthly_payment,
            total_interest,
            rows,
        }
    }
}
