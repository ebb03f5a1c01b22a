use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    annuity_payment, first_of_next_month, format_amount, rate_multiplier, Amount,
    CityFinancialHealth, LedgerEventKind, Loan, LoanId, LoanPolicy, LoanStatus, Notifier,
    NotifyLevel, PaymentRecord, Treasury,
};

/// Tolerance used when cross-checking recorded aggregates against sums
/// recomputed from the loan book.
const AGGREGATE_TOLERANCE: f64 = 1e-6;

/// A loan request with a non-positive amount or term. Rejected before any
/// state change; policy rejections are returned as data, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    NonPositiveAmount,
    NonPositiveTerm,
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::NonPositiveAmount => write!(f, "loan amount must be positive"),
            RequestError::NonPositiveTerm => write!(f, "loan term must be at least one month"),
        }
    }
}

impl std::error::Error for RequestError {}

/// Outcome of a loan evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoanDecision {
    Approved {
        loan: Loan,
        annual_interest_rate: f64,
    },
    Rejected {
        reason: String,
    },
}

impl LoanDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, LoanDecision::Approved { .. })
    }
}

/// Aggregate result of one monthly settlement pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub total_disbursed: Amount,
    pub payments_made: usize,
    pub late_payments: usize,
    pub completed_loans: Vec<LoanId>,
}

/// Plain persistence form of the ledger: the loan book as (id, loan) pairs,
/// the id counter, and the financial-health aggregate, verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub loans: Vec<(LoanId, Loan)>,
    pub loan_counter: u64,
    pub financial_health: CityFinancialHealth,
}

/// Consistency report over the loan book and the health aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub loan_count: usize,
    pub active_count: usize,
    pub completed_count: usize,
    pub total_debt_recorded: Amount,
    pub total_debt_computed: Amount,
    pub monthly_payments_recorded: Amount,
    pub monthly_payments_computed: Amount,
    pub credit_score: i32,
    pub credit_score_in_bounds: bool,
    pub completed_with_balance: usize,
    pub is_consistent: bool,
}

/// The city's loan book. Accepts loan requests, evaluates creditworthiness,
/// amortizes active loans through monthly settlement passes, and owns the
/// financial-health aggregate.
///
/// Single-owner and synchronous: the simulation clock drives it one call at
/// a time, so no internal locking. Loans are keyed by sequentially assigned
/// ids in a BTreeMap, which makes settlement order deterministic (insertion
/// order, since ids only grow).
#[derive(Debug, Clone)]
pub struct LoanLedger {
    loans: BTreeMap<LoanId, Loan>,
    loan_counter: u64,
    health: CityFinancialHealth,
    policy: LoanPolicy,
}

impl LoanLedger {
    pub fn new(policy: LoanPolicy) -> Self {
        Self {
            loans: BTreeMap::new(),
            loan_counter: 0,
            health: CityFinancialHealth::default(),
            policy,
        }
    }

    /// Rebuild a ledger from its persisted snapshot. The health aggregate is
    /// restored verbatim, never recomputed.
    pub fn from_snapshot(snapshot: LedgerSnapshot, policy: LoanPolicy) -> Self {
        Self {
            loans: snapshot.loans.into_iter().collect(),
            loan_counter: snapshot.loan_counter,
            health: snapshot.financial_health,
            policy,
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            loans: self.loans.iter().map(|(id, loan)| (*id, loan.clone())).collect(),
            loan_counter: self.loan_counter,
            financial_health: self.health.clone(),
        }
    }

    pub fn health(&self) -> &CityFinancialHealth {
        &self.health
    }

    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    pub fn get_loan(&self, id: LoanId) -> Option<&Loan> {
        self.loans.get(&id)
    }

    /// All loans in id order.
    pub fn loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans.values()
    }

    pub fn active_loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans
            .values()
            .filter(|loan| loan.status == LoanStatus::Active)
    }

    /// The effective annual rate a request made right now would carry.
    pub fn current_interest_rate(&self) -> f64 {
        self.policy.base_interest_rate * rate_multiplier(self.health.credit_score)
    }

    /// Evaluate a loan request and, on approval, open the loan and disburse
    /// the principal to the treasury. Rejections leave every piece of state
    /// untouched and carry a human-readable reason.
    pub fn request_loan(
        &mut self,
        amount: Amount,
        term_months: u32,
        now: DateTime<Utc>,
        treasury: &mut dyn Treasury,
        notifier: &mut dyn Notifier,
    ) -> Result<LoanDecision, RequestError> {
        if !(amount > 0.0) {
            return Err(RequestError::NonPositiveAmount);
        }
        if term_months == 0 {
            return Err(RequestError::NonPositiveTerm);
        }

        let monthly_income = treasury
            .monthly_income()
            .unwrap_or(self.policy.fallback_monthly_income);

        let max_loan = monthly_income * self.policy.max_loan_multiplier;
        if amount > max_loan {
            let reason = format!(
                "requested {} exceeds the maximum loan of {} ({} monthly income x {})",
                format_amount(amount),
                format_amount(max_loan),
                format_amount(monthly_income),
                self.policy.max_loan_multiplier,
            );
            notifier.notify(format!("Loan rejected: {}", reason), NotifyLevel::Warning);
            return Ok(LoanDecision::Rejected { reason });
        }

        // The affordability check uses the base rate: the applicant's tier is
        // not known to be final until approval.
        let hypothetical_payment =
            annuity_payment(amount, self.policy.base_interest_rate, term_months);
        let projected_ratio = (self.health.monthly_payments + hypothetical_payment) / monthly_income;
        if projected_ratio > self.policy.max_debt_to_income_ratio {
            let reason = format!(
                "projected debt-to-income ratio {:.2} exceeds the limit of {:.1}",
                projected_ratio, self.policy.max_debt_to_income_ratio,
            );
            notifier.notify(format!("Loan rejected: {}", reason), NotifyLevel::Warning);
            return Ok(LoanDecision::Rejected { reason });
        }

        let annual_interest_rate = self.current_interest_rate();

        self.loan_counter += 1;
        let loan = Loan::new(self.loan_counter, amount, annual_interest_rate, term_months, now);

        treasury.credit(amount);
        self.health.total_debt += amount;
        self.health.monthly_payments += loan.monthly_payment;
        self.health
            .log(now, loan.id, amount, LedgerEventKind::LoanOpened);

        notifier.notify(
            format!(
                "Loan #{} approved: {} over {} months at {:.2}% annual",
                loan.id,
                format_amount(amount),
                term_months,
                annual_interest_rate * 100.0,
            ),
            NotifyLevel::Success,
        );

        self.loans.insert(loan.id, loan.clone());
        Ok(LoanDecision::Approved {
            loan,
            annual_interest_rate,
        })
    }

    /// One settlement pass over the loan book: every active loan whose due
    /// date has passed pays once. An insufficient treasury balance defers the
    /// payment (due date untouched, retried next pass) and costs credit score.
    pub fn process_monthly_payments(
        &mut self,
        now: DateTime<Utc>,
        treasury: &mut dyn Treasury,
        notifier: &mut dyn Notifier,
    ) -> SettlementSummary {
        let mut summary = SettlementSummary::default();

        for loan in self.loans.values_mut() {
            if !loan.is_due(now) {
                continue;
            }

            if treasury.balance() < loan.monthly_payment {
                // Late payment: the loan itself is not advanced this cycle.
                self.health
                    .penalize(self.policy.late_payment_penalty, &self.policy);
                self.health
                    .log(now, loan.id, loan.monthly_payment, LedgerEventKind::PaymentLate);
                notifier.notify(
                    format!(
                        "Payment of {} on loan #{} deferred: insufficient treasury funds (credit score now {})",
                        format_amount(loan.monthly_payment),
                        loan.id,
                        self.health.credit_score,
                    ),
                    NotifyLevel::Warning,
                );
                summary.late_payments += 1;
                continue;
            }

            let (interest, principal) = loan.payment_split();
            treasury.debit(loan.monthly_payment);
            loan.remaining_balance -= principal;
            loan.remaining_months = loan.remaining_months.saturating_sub(1);
            loan.payment_history.push(PaymentRecord {
                date: now,
                amount: loan.monthly_payment,
                principal_portion: principal,
                interest_portion: interest,
                balance_after: loan.remaining_balance,
            });
            loan.next_payment_date = first_of_next_month(loan.next_payment_date);

            self.health.total_debt -= principal;
            self.health
                .log(now, loan.id, loan.monthly_payment, LedgerEventKind::PaymentMade);
            summary.total_disbursed += loan.monthly_payment;
            summary.payments_made += 1;

            if loan.is_paid_off(self.policy.payoff_epsilon) {
                // Clamp the residual to zero and keep total_debt in sync
                // with the sum of active balances.
                let residual = loan.remaining_balance;
                self.health.total_debt -= residual;
                loan.remaining_balance = 0.0;
                loan.status = LoanStatus::Completed;

                self.health.monthly_payments -= loan.monthly_payment;
                self.health.reward(self.policy.payoff_bonus, &self.policy);
                self.health
                    .log(now, loan.id, loan.principal, LedgerEventKind::LoanCompleted);
                notifier.notify(
                    format!(
                        "Loan #{} fully repaid (credit score now {})",
                        loan.id, self.health.credit_score,
                    ),
                    NotifyLevel::Success,
                );
                summary.completed_loans.push(loan.id);
            }
        }

        summary
    }
}

/// Cross-check the recorded aggregates against sums recomputed from the loan
/// book.
pub fn build_integrity_report(ledger: &LoanLedger) -> IntegrityReport {
    let health = ledger.health();
    let policy = ledger.policy();

    let loan_count = ledger.loans().count();
    let active_count = ledger.active_loans().count();
    let completed_count = loan_count - active_count;

    let total_debt_computed: Amount = ledger.active_loans().map(|l| l.remaining_balance).sum();
    let monthly_payments_computed: Amount = ledger.active_loans().map(|l| l.monthly_payment).sum();

    let credit_score_in_bounds = health.credit_score >= policy.min_credit_score
        && health.credit_score <= policy.max_credit_score;

    let completed_with_balance = ledger
        .loans()
        .filter(|l| l.status == LoanStatus::Completed && l.remaining_balance != 0.0)
        .count();

    let is_consistent = (health.total_debt - total_debt_computed).abs() < AGGREGATE_TOLERANCE
        && (health.monthly_payments - monthly_payments_computed).abs() < AGGREGATE_TOLERANCE
        && credit_score_in_bounds
        && completed_with_balance == 0;

    IntegrityReport {
        loan_count,
        active_count,
        completed_count,
        total_debt_recorded: health.total_debt,
        total_debt_computed,
        monthly_payments_recorded: health.monthly_payments,
        monthly_payments_computed,
        credit_score: health.credit_score,
        credit_score_in_bounds,
        completed_with_balance,
        is_consistent,
    }
}
