use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::{
    CityFinancialHealth, LedgerEvent, LedgerEventKind, LedgerSnapshot, Loan, LoanId, LoanStatus,
    PaymentRecord, TreasuryState,
};

use super::MIGRATION_001_INITIAL;

/// Repository for persisting and reloading the loan ledger and treasury.
/// The ledger is written as a whole snapshot inside one transaction; loads
/// on a fresh database return the default initial state.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Ledger snapshot
    // ========================

    /// Persist the full ledger snapshot, replacing whatever was stored.
    pub async fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM loan_payments")
            .execute(&mut *tx)
            .await
            .context("Failed to clear payment history")?;
        sqlx::query("DELETE FROM loans")
            .execute(&mut *tx)
            .await
            .context("Failed to clear loans")?;
        sqlx::query("DELETE FROM ledger_events")
            .execute(&mut *tx)
            .await
            .context("Failed to clear ledger events")?;

        for (id, loan) in &snapshot.loans {
            sqlx::query(
                r#"
                INSERT INTO loans (id, principal, remaining_balance, term_months, remaining_months,
                                   annual_interest_rate, monthly_payment, next_payment_date, status, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(*id as i64)
            .bind(loan.principal)
            .bind(loan.remaining_balance)
            .bind(loan.term_months as i64)
            .bind(loan.remaining_months as i64)
            .bind(loan.annual_interest_rate)
            .bind(loan.monthly_payment)
            .bind(loan.next_payment_date.to_rfc3339())
            .bind(loan.status.as_str())
            .bind(loan.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .context("Failed to save loan")?;

            for (seq, record) in loan.payment_history.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO loan_payments (loan_id, seq, date, amount, principal_portion, interest_portion, balance_after)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(*id as i64)
                .bind(seq as i64)
                .bind(record.date.to_rfc3339())
                .bind(record.amount)
                .bind(record.principal_portion)
                .bind(record.interest_portion)
                .bind(record.balance_after)
                .execute(&mut *tx)
                .await
                .context("Failed to save payment record")?;
            }
        }

        let health = &snapshot.financial_health;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO financial_health (id, credit_score, total_debt, monthly_payments)
            VALUES (1, ?, ?, ?)
            "#,
        )
        .bind(health.credit_score)
        .bind(health.total_debt)
        .bind(health.monthly_payments)
        .execute(&mut *tx)
        .await
        .context("Failed to save financial health")?;

        for (seq, event) in health.payment_history.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO ledger_events (seq, date, loan_id, amount, kind)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(seq as i64)
            .bind(event.date.to_rfc3339())
            .bind(event.loan_id as i64)
            .bind(event.amount)
            .bind(event.kind.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to save ledger event")?;
        }

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO counters (name, value)
            VALUES ('loan_counter', ?)
            "#,
        )
        .bind(snapshot.loan_counter as i64)
        .execute(&mut *tx)
        .await
        .context("Failed to save loan counter")?;

        tx.commit().await.context("Failed to commit snapshot")?;
        Ok(())
    }

    /// Load the ledger snapshot. A fresh database yields the default state
    /// (no loans, credit score 600, zero debt).
    pub async fn load_snapshot(&self) -> Result<LedgerSnapshot> {
        let loan_rows = sqlx::query(
            r#"
            SELECT id, principal, remaining_balance, term_months, remaining_months,
                   annual_interest_rate, monthly_payment, next_payment_date, status, created_at
            FROM loans
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load loans")?;

        let mut loans: Vec<(LoanId, Loan)> = Vec::with_capacity(loan_rows.len());
        for row in &loan_rows {
            let mut loan = Self::row_to_loan(row)?;
            loan.payment_history = self.load_payment_history(loan.id).await?;
            loans.push((loan.id, loan));
        }

        let health_row = sqlx::query(
            "SELECT credit_score, total_debt, monthly_payments FROM financial_health WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load financial health")?;

        let financial_health = match health_row {
            Some(row) => CityFinancialHealth {
                credit_score: row.get("credit_score"),
                total_debt: row.get("total_debt"),
                monthly_payments: row.get("monthly_payments"),
                payment_history: self.load_ledger_events().await?,
            },
            None => CityFinancialHealth::default(),
        };

        let counter_row = sqlx::query("SELECT value FROM counters WHERE name = 'loan_counter'")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load loan counter")?;
        let loan_counter = counter_row
            .map(|row| row.get::<i64, _>("value") as u64)
            .unwrap_or(0);

        Ok(LedgerSnapshot {
            loans,
            loan_counter,
            financial_health,
        })
    }

    async fn load_payment_history(&self, loan_id: LoanId) -> Result<Vec<PaymentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT date, amount, principal_portion, interest_portion, balance_after
            FROM loan_payments
            WHERE loan_id = ?
            ORDER BY seq
            "#,
        )
        .bind(loan_id as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load payment history")?;

        rows.iter()
            .map(|row| {
                Ok(PaymentRecord {
                    date: Self::parse_timestamp(row.get("date"))?,
                    amount: row.get("amount"),
                    principal_portion: row.get("principal_portion"),
                    interest_portion: row.get("interest_portion"),
                    balance_after: row.get("balance_after"),
                })
            })
            .collect()
    }

    async fn load_ledger_events(&self) -> Result<Vec<LedgerEvent>> {
        let rows = sqlx::query("SELECT date, loan_id, amount, kind FROM ledger_events ORDER BY seq")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load ledger events")?;

        rows.iter()
            .map(|row| {
                let kind_str: String = row.get("kind");
                Ok(LedgerEvent {
                    date: Self::parse_timestamp(row.get("date"))?,
                    loan_id: row.get::<i64, _>("loan_id") as LoanId,
                    amount: row.get("amount"),
                    kind: LedgerEventKind::from_str(&kind_str)
                        .ok_or_else(|| anyhow::anyhow!("Invalid event kind: {}", kind_str))?,
                })
            })
            .collect()
    }

    fn row_to_loan(row: &sqlx::sqlite::SqliteRow) -> Result<Loan> {
        let status_str: String = row.get("status");

        Ok(Loan {
            id: row.get::<i64, _>("id") as LoanId,
            principal: row.get("principal"),
            remaining_balance: row.get("remaining_balance"),
            term_months: row.get::<i64, _>("term_months") as u32,
            remaining_months: row.get::<i64, _>("remaining_months") as u32,
            annual_interest_rate: row.get("annual_interest_rate"),
            monthly_payment: row.get("monthly_payment"),
            next_payment_date: Self::parse_timestamp(row.get("next_payment_date"))?,
            status: LoanStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid loan status: {}", status_str))?,
            payment_history: Vec::new(),
            created_at: Self::parse_timestamp(row.get("created_at"))?,
        })
    }

    fn parse_timestamp(value: String) -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(&value)
            .context("Invalid timestamp")?
            .with_timezone(&Utc))
    }

    // ========================
    // Treasury
    // ========================

    /// Load the treasury row, or the default (empty) treasury when missing.
    pub async fn load_treasury(&self) -> Result<TreasuryState> {
        let row = sqlx::query("SELECT balance, monthly_income FROM treasury WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load treasury")?;

        Ok(match row {
            Some(row) => TreasuryState {
                balance: row.get("balance"),
                monthly_income: row.get("monthly_income"),
            },
            None => TreasuryState::default(),
        })
    }

    pub async fn save_treasury(&self, treasury: &TreasuryState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO treasury (id, balance, monthly_income)
            VALUES (1, ?, ?)
            "#,
        )
        .bind(treasury.balance)
        .bind(treasury.monthly_income)
        .execute(&self.pool)
        .await
        .context("Failed to save treasury")?;
        Ok(())
    }
}
