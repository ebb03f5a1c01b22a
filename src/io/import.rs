use anyhow::{Context, Result};
use std::io::Read;

use crate::application::LedgerService;

use super::LedgerExport;

/// Options controlling import behavior
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Preview without writing anything
    pub dry_run: bool,
}

/// Summary of an import run
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub loans: usize,
    pub events: usize,
    pub treasury_balance: f64,
    pub dry_run: bool,
}

/// Importer for restoring a ledger from a JSON snapshot
pub struct Importer<'a> {
    service: &'a LedgerService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Import a full JSON snapshot, replacing the persisted ledger and
    /// treasury. With `dry_run` the snapshot is only parsed and summarized.
    pub async fn import_full_json<R: Read>(
        &self,
        mut reader: R,
        options: ImportOptions,
    ) -> Result<ImportSummary> {
        let mut contents = String::new();
        reader
            .read_to_string(&mut contents)
            .context("Failed to read import data")?;

        let export: LedgerExport =
            serde_json::from_str(&contents).context("Failed to parse JSON snapshot")?;

        let summary = ImportSummary {
            loans: export.ledger.loans.len(),
            events: export.ledger.financial_health.payment_history.len(),
            treasury_balance: export.treasury.balance,
            dry_run: options.dry_run,
        };

        if !options.dry_run {
            self.service
                .restore(export.ledger, export.treasury)
                .await?;
        }

        Ok(summary)
    }
}
