use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, LoanId, LoanPolicy};

/// What a ledger event records in the informational log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventKind {
    LoanOpened,
    PaymentMade,
    PaymentLate,
    LoanCompleted,
}

impl LedgerEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEventKind::LoanOpened => "loan_opened",
            LedgerEventKind::PaymentMade => "payment_made",
            LedgerEventKind::PaymentLate => "payment_late",
            LedgerEventKind::LoanCompleted => "loan_completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "loan_opened" => Some(LedgerEventKind::LoanOpened),
            "payment_made" => Some(LedgerEventKind::PaymentMade),
            "payment_late" => Some(LedgerEventKind::PaymentLate),
            "loan_completed" => Some(LedgerEventKind::LoanCompleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for LedgerEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Informational log entry. Not part of any invariant, kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub date: DateTime<Utc>,
    pub loan_id: LoanId,
    pub amount: Amount,
    pub kind: LedgerEventKind,
}

/// Aggregate financial health of the city, owned by the ledger.
///
/// Invariants (checked by the integrity report):
/// - `credit_score` stays within the policy's score bounds
/// - `total_debt` equals the sum of remaining balances over active loans
/// - `monthly_payments` equals the sum of payments over active loans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityFinancialHealth {
    pub credit_score: i32,
    pub total_debt: Amount,
    pub monthly_payments: Amount,
    pub payment_history: Vec<LedgerEvent>,
}

impl Default for CityFinancialHealth {
    fn default() -> Self {
        Self {
            credit_score: 600,
            total_debt: 0.0,
            monthly_payments: 0.0,
            payment_history: Vec::new(),
        }
    }
}

impl CityFinancialHealth {
    /// Lower the credit score by `penalty`, floored at the policy minimum.
    pub fn penalize(&mut self, penalty: i32, policy: &LoanPolicy) {
        self.credit_score = (self.credit_score - penalty).max(policy.min_credit_score);
    }

    /// Raise the credit score by `bonus`, capped at the policy maximum.
    pub fn reward(&mut self, bonus: i32, policy: &LoanPolicy) {
        self.credit_score = (self.credit_score + bonus).min(policy.max_credit_score);
    }

    pub fn log(&mut self, date: DateTime<Utc>, loan_id: LoanId, amount: Amount, kind: LedgerEventKind) {
        self.payment_history.push(LedgerEvent {
            date,
            loan_id,
            amount,
            kind,
        });
    }
}

/// Interest-rate multiplier for a credit score. Better scores borrow cheaper.
pub fn rate_multiplier(credit_score: i32) -> f64 {
    if credit_score >= 750 {
        0.8
    } else if credit_score >= 650 {
        1.0
    } else if credit_score >= 550 {
        1.3
    } else {
        1.6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_health() {
        let health = CityFinancialHealth::default();
        assert_eq!(health.credit_score, 600);
        assert_eq!(health.total_debt, 0.0);
        assert_eq!(health.monthly_payments, 0.0);
        assert!(health.payment_history.is_empty());
    }

    #[test]
    fn test_rate_multiplier_tiers() {
        assert_eq!(rate_multiplier(850), 0.8);
        assert_eq!(rate_multiplier(750), 0.8);
        assert_eq!(rate_multiplier(749), 1.0);
        assert_eq!(rate_multiplier(650), 1.0);
        assert_eq!(rate_multiplier(649), 1.3);
        assert_eq!(rate_multiplier(550), 1.3);
        assert_eq!(rate_multiplier(549), 1.6);
        assert_eq!(rate_multiplier(300), 1.6);
    }

    #[test]
    fn test_penalize_floors_at_minimum() {
        let policy = LoanPolicy::default();
        let mut health = CityFinancialHealth {
            credit_score: 305,
            ..Default::default()
        };

        health.penalize(10, &policy);
        assert_eq!(health.credit_score, 300);

        health.penalize(10, &policy);
        assert_eq!(health.credit_score, 300);
    }

    #[test]
    fn test_reward_caps_at_maximum() {
        let policy = LoanPolicy::default();
        let mut health = CityFinancialHealth {
            credit_score: 840,
            ..Default::default()
        };

        health.reward(20, &policy);
        assert_eq!(health.credit_score, 850);
    }

    #[test]
    fn test_event_kind_roundtrip() {
        for kind in [
            LedgerEventKind::LoanOpened,
            LedgerEventKind::PaymentMade,
            LedgerEventKind::PaymentLate,
            LedgerEventKind::LoanCompleted,
        ] {
            let parsed = LedgerEventKind::from_str(kind.as_str()).unwrap();
            assert_eq!(kind, parsed);
        }
    }
}
