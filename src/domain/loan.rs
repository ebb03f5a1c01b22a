use chrono::{DateTime, Datelike, Months, Utc};
use serde::{Deserialize, Serialize};

use super::Amount;

pub type LoanId = u64;

/// Lifecycle state of a loan. `Completed` is terminal: a completed loan is
/// excluded from every future settlement pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Completed,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(LoanStatus::Active),
            "completed" => Some(LoanStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One settlement record. Append-only: history is never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub date: DateTime<Utc>,
    pub amount: Amount,
    pub principal_portion: Amount,
    pub interest_portion: Amount,
    pub balance_after: Amount,
}

/// A fixed-payment amortized loan held by the city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub principal: Amount,
    pub remaining_balance: Amount,
    pub term_months: u32,
    pub remaining_months: u32,
    /// Annual rate, fixed at origination (e.g. 0.05 = 5%).
    pub annual_interest_rate: f64,
    pub monthly_payment: Amount,
    pub next_payment_date: DateTime<Utc>,
    pub status: LoanStatus,
    pub payment_history: Vec<PaymentRecord>,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// Create a new loan with an amortized monthly payment. The first due
    /// date is the first day of the month after origination.
    pub fn new(
        id: LoanId,
        principal: Amount,
        annual_interest_rate: f64,
        term_months: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            principal,
            remaining_balance: principal,
            term_months,
            remaining_months: term_months,
            annual_interest_rate,
            monthly_payment: annuity_payment(principal, annual_interest_rate, term_months),
            next_payment_date: first_of_next_month(now),
            status: LoanStatus::Active,
            payment_history: Vec::new(),
            created_at: now,
        }
    }

    pub fn monthly_rate(&self) -> f64 {
        self.annual_interest_rate / 12.0
    }

    /// A loan is due when active and its next payment date has passed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Active && self.next_payment_date <= now
    }

    /// Split the fixed payment into interest on the outstanding balance and
    /// the principal remainder. The two portions always sum to the payment.
    pub fn payment_split(&self) -> (Amount, Amount) {
        let interest = self.remaining_balance * self.monthly_rate();
        let principal = self.monthly_payment - interest;
        (interest, principal)
    }

    /// True once the balance has dropped below the payoff epsilon or the
    /// scheduled term has run out.
    pub fn is_paid_off(&self, epsilon: Amount) -> bool {
        self.remaining_balance <= epsilon || self.remaining_months == 0
    }
}

/// Standard annuity payment for a fixed-rate loan.
/// Zero-rate loans fall back to straight-line amortization.
pub fn annuity_payment(principal: Amount, annual_rate: f64, term_months: u32) -> Amount {
    let monthly_rate = annual_rate / 12.0;
    if monthly_rate == 0.0 {
        principal / term_months as f64
    } else {
        let growth = (1.0 + monthly_rate).powi(term_months as i32);
        principal * monthly_rate * growth / (growth - 1.0)
    }
}

/// Midnight UTC on the first day of the calendar month after `date`.
/// Billing stays on calendar months, so effective intervals run 28-31 days.
pub fn first_of_next_month(date: DateTime<Utc>) -> DateTime<Utc> {
    date.date_naive()
        .with_day(1)
        .unwrap()
        .checked_add_months(Months::new(1))
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}
