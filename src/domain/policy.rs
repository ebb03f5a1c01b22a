use serde::{Deserialize, Serialize};

use super::Amount;

/// Lending policy for the city ledger. Every knob the evaluation and the
/// settlement pass depend on lives here, with explicit defaults, so nothing
/// falls back on a silent magic number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanPolicy {
    /// Annual base rate before the credit-score multiplier (0.05 = 5%).
    pub base_interest_rate: f64,
    /// Loan cap: monthly income times this multiplier.
    pub max_loan_multiplier: f64,
    /// Reject when projected monthly obligations / income exceed this.
    pub max_debt_to_income_ratio: f64,
    /// Income assumed when the treasury cannot report one.
    pub fallback_monthly_income: Amount,
    pub min_credit_score: i32,
    pub max_credit_score: i32,
    /// Score deduction for a missed payment.
    pub late_payment_penalty: i32,
    /// Score bonus when a loan is fully repaid.
    pub payoff_bonus: i32,
    /// Balances at or below this count as paid off.
    pub payoff_epsilon: Amount,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            base_interest_rate: 0.05,
            max_loan_multiplier: 5.0,
            max_debt_to_income_ratio: 3.0,
            fallback_monthly_income: 1000.0,
            min_credit_score: 300,
            max_credit_score: 850,
            late_payment_penalty: 10,
            payoff_bonus: 20,
            payoff_epsilon: 0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = LoanPolicy::default();
        assert_eq!(policy.base_interest_rate, 0.05);
        assert_eq!(policy.max_loan_multiplier, 5.0);
        assert_eq!(policy.max_debt_to_income_ratio, 3.0);
        assert_eq!(policy.fallback_monthly_income, 1000.0);
        assert_eq!(policy.min_credit_score, 300);
        assert_eq!(policy.max_credit_score, 850);
        assert_eq!(policy.payoff_epsilon, 0.01);
    }
}
