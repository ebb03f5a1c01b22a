use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{LedgerSnapshot, TreasuryState};

/// Full ledger snapshot for export/import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerExport {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub ledger: LedgerSnapshot,
    pub treasury: TreasuryState,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export the loan book to CSV format
    pub async fn export_loans_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let loans = self.service.list_loans(true).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "status",
            "principal",
            "remaining_balance",
            "term_months",
            "remaining_months",
            "annual_interest_rate",
            "monthly_payment",
            "next_payment_date",
            "created_at",
        ])?;

        let mut count = 0;
        for loan in &loans {
            csv_writer.write_record([
                loan.id.to_string(),
                loan.status.as_str().to_string(),
                loan.principal.to_string(),
                loan.remaining_balance.to_string(),
                loan.term_months.to_string(),
                loan.remaining_months.to_string(),
                loan.annual_interest_rate.to_string(),
                loan.monthly_payment.to_string(),
                loan.next_payment_date.to_rfc3339(),
                loan.created_at.to_rfc3339(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export every payment record across all loans to CSV format
    pub async fn export_payments_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let loans = self.service.list_loans(true).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "loan_id",
            "date",
            "amount",
            "principal_portion",
            "interest_portion",
            "balance_after",
        ])?;

        let mut count = 0;
        for loan in &loans {
            for record in &loan.payment_history {
                csv_writer.write_record([
                    loan.id.to_string(),
                    record.date.to_rfc3339(),
                    record.amount.to_string(),
                    record.principal_portion.to_string(),
                    record.interest_portion.to_string(),
                    record.balance_after.to_string(),
                ])?;
                count += 1;
            }
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the full ledger and treasury as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerExport> {
        let ledger = self.service.snapshot().await?;
        let treasury = self.service.treasury().await?;

        let export = LedgerExport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            ledger,
            treasury,
        };

        let json = serde_json::to_string_pretty(&export)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(export)
    }
}
