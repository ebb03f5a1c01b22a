use chrono::{DateTime, Utc};

use crate::domain::{
    build_integrity_report, Amount, IntegrityReport, LedgerSnapshot, Loan, LoanDecision, LoanId,
    LoanLedger, LoanPolicy, LoanStatus, Notification, RequestError, Treasury, TreasuryState,
    VecNotifier,
};
use crate::storage::Repository;

use super::{AmortizationSchedule, AppError, StatusReport};

/// Application service providing high-level operations for the loan ledger.
/// This is the primary interface for any client (CLI, simulation loop, TUI).
///
/// Every mutating operation loads the persisted snapshot, runs the
/// synchronous domain operation to completion, and writes the result back.
/// The ledger has a single owner per database, so there is no locking here.
pub struct LedgerService {
    repo: Repository,
    policy: LoanPolicy,
}

/// Result of a loan request.
#[derive(Debug)]
pub struct RequestOutcome {
    pub decision: LoanDecision,
    pub notifications: Vec<Notification>,
}

/// Result of a settlement pass.
pub struct SettlementOutcome {
    pub total_disbursed: Amount,
    pub payments_made: usize,
    pub late_payments: usize,
    pub completed_loans: Vec<LoanId>,
    pub notifications: Vec<Notification>,
}

impl LedgerService {
    /// Create a new ledger service with the given repository and the default
    /// lending policy.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            policy: LoanPolicy::default(),
        }
    }

    pub fn with_policy(repo: Repository, policy: LoanPolicy) -> Self {
        Self { repo, policy }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    async fn load_ledger(&self) -> Result<LoanLedger, AppError> {
        let snapshot = self.repo.load_snapshot().await?;
        Ok(LoanLedger::from_snapshot(snapshot, self.policy.clone()))
    }

    async fn persist(
        &self,
        ledger: &LoanLedger,
        treasury: &TreasuryState,
    ) -> Result<(), AppError> {
        self.repo.save_snapshot(&ledger.snapshot()).await?;
        self.repo.save_treasury(treasury).await?;
        Ok(())
    }

    // ========================
    // Loan operations
    // ========================

    /// Evaluate a loan request. Approvals disburse the principal to the
    /// treasury and are persisted; rejections leave the database untouched.
    pub async fn request_loan(
        &self,
        amount: Amount,
        term_months: u32,
        now: DateTime<Utc>,
    ) -> Result<RequestOutcome, AppError> {
        let mut ledger = self.load_ledger().await?;
        let mut treasury = self.repo.load_treasury().await?;
        let mut notifier = VecNotifier::new();

        let decision = ledger
            .request_loan(amount, term_months, now, &mut treasury, &mut notifier)
            .map_err(|err| match err {
                RequestError::NonPositiveAmount => {
                    AppError::InvalidAmount("loan amount must be positive".to_string())
                }
                RequestError::NonPositiveTerm => {
                    AppError::InvalidTerm("loan term must be at least one month".to_string())
                }
            })?;

        if decision.is_approved() {
            self.persist(&ledger, &treasury).await?;
        }

        Ok(RequestOutcome {
            decision,
            notifications: notifier.into_inner(),
        })
    }

    /// Run one monthly settlement pass as of `now` and persist the result.
    /// Late payments also persist: they cost credit score.
    pub async fn settle(&self, now: DateTime<Utc>) -> Result<SettlementOutcome, AppError> {
        let mut ledger = self.load_ledger().await?;
        let mut treasury = self.repo.load_treasury().await?;
        let mut notifier = VecNotifier::new();

        let summary = ledger.process_monthly_payments(now, &mut treasury, &mut notifier);
        self.persist(&ledger, &treasury).await?;

        Ok(SettlementOutcome {
            total_disbursed: summary.total_disbursed,
            payments_made: summary.payments_made,
            late_payments: summary.late_payments,
            completed_loans: summary.completed_loans,
            notifications: notifier.into_inner(),
        })
    }

    /// List loans in id order, optionally including completed ones.
    pub async fn list_loans(&self, include_completed: bool) -> Result<Vec<Loan>, AppError> {
        let ledger = self.load_ledger().await?;
        Ok(ledger
            .loans()
            .filter(|loan| include_completed || loan.status == LoanStatus::Active)
            .cloned()
            .collect())
    }

    /// Get a single loan with its full payment history.
    pub async fn get_loan(&self, id: LoanId) -> Result<Loan, AppError> {
        let ledger = self.load_ledger().await?;
        ledger
            .get_loan(id)
            .cloned()
            .ok_or(AppError::LoanNotFound(id))
    }

    /// Project the amortization schedule a request for `amount` over
    /// `term_months` would carry right now. Read-only: nothing is persisted.
    /// `rate_override` bypasses the credit-score tiering.
    pub async fn amortization_schedule(
        &self,
        amount: Amount,
        term_months: u32,
        rate_override: Option<f64>,
    ) -> Result<AmortizationSchedule, AppError> {
        if !(amount > 0.0) {
            return Err(AppError::InvalidAmount(
                "loan amount must be positive".to_string(),
            ));
        }
        if term_months == 0 {
            return Err(AppError::InvalidTerm(
                "loan term must be at least one month".to_string(),
            ));
        }

        let ledger = self.load_ledger().await?;
        let rate = rate_override.unwrap_or_else(|| ledger.current_interest_rate());
        Ok(AmortizationSchedule::build(amount, rate, term_months))
    }

    // ========================
    // Status & integrity
    // ========================

    pub async fn status(&self, now: DateTime<Utc>) -> Result<StatusReport, AppError> {
        let ledger = self.load_ledger().await?;
        let treasury = self.repo.load_treasury().await?;
        let health = ledger.health();

        let active_loans = ledger.active_loans().count();
        let completed_loans = ledger.loans().count() - active_loans;

        Ok(StatusReport {
            as_of: now,
            credit_score: health.credit_score,
            total_debt: health.total_debt,
            monthly_payments: health.monthly_payments,
            active_loans,
            completed_loans,
            treasury_balance: treasury.balance(),
            monthly_income: treasury.monthly_income,
            effective_interest_rate: ledger.current_interest_rate(),
        })
    }

    /// Cross-check the stored aggregates against the loan book.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let ledger = self.load_ledger().await?;
        Ok(build_integrity_report(&ledger))
    }

    // ========================
    // Treasury operations
    // ========================

    pub async fn treasury(&self) -> Result<TreasuryState, AppError> {
        Ok(self.repo.load_treasury().await?)
    }

    pub async fn set_monthly_income(&self, income: Amount) -> Result<TreasuryState, AppError> {
        if income < 0.0 || !income.is_finite() {
            return Err(AppError::InvalidAmount(
                "monthly income cannot be negative".to_string(),
            ));
        }
        let mut treasury = self.repo.load_treasury().await?;
        treasury.monthly_income = income;
        self.repo.save_treasury(&treasury).await?;
        Ok(treasury)
    }

    pub async fn deposit(&self, amount: Amount) -> Result<TreasuryState, AppError> {
        if !(amount > 0.0) {
            return Err(AppError::InvalidAmount(
                "deposit amount must be positive".to_string(),
            ));
        }
        let mut treasury = self.repo.load_treasury().await?;
        treasury.credit(amount);
        self.repo.save_treasury(&treasury).await?;
        Ok(treasury)
    }

    // ========================
    // Snapshot (export/import)
    // ========================

    pub async fn snapshot(&self) -> Result<LedgerSnapshot, AppError> {
        Ok(self.repo.load_snapshot().await?)
    }

    /// Replace the persisted state with an imported snapshot.
    pub async fn restore(
        &self,
        snapshot: LedgerSnapshot,
        treasury: TreasuryState,
    ) -> Result<(), AppError> {
        self.repo.save_snapshot(&snapshot).await?;
        self.repo.save_treasury(&treasury).await?;
        Ok(())
    }
}
