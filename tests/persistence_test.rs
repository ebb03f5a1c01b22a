mod common;

use anyhow::Result;
use tempfile::TempDir;

use mutuo::application::LedgerService;
use mutuo::io::{Exporter, ImportOptions, Importer, LedgerExport};

use common::{date, funded_service};

#[tokio::test]
async fn test_fresh_database_defaults() -> Result<()> {
    let (service, _dir) = common::test_service().await?;

    let status = service.status(date("2026-03-01")).await?;
    assert_eq!(status.credit_score, 600);
    assert_eq!(status.total_debt, 0.0);
    assert_eq!(status.monthly_payments, 0.0);
    assert_eq!(status.active_loans, 0);

    let treasury = service.treasury().await?;
    assert_eq!(treasury.balance, 0.0);
    assert_eq!(treasury.monthly_income, 0.0);

    assert!(service.list_loans(true).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_state_survives_reconnect() -> Result<()> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("test.db");
    let db_str = db_path.to_str().unwrap();

    {
        let service = LedgerService::init(db_str).await?;
        service.set_monthly_income(2000.0).await?;
        service.request_loan(10_000.0, 12, date("2026-03-01")).await?;
        service.settle(date("2026-04-01")).await?;
    }

    let service = LedgerService::connect(db_str).await?;

    let loan = service.get_loan(1).await?;
    assert_eq!(loan.principal, 10_000.0);
    assert_eq!(loan.remaining_months, 11);
    assert_eq!(loan.payment_history.len(), 1);
    assert_eq!(loan.next_payment_date, date("2026-05-01"));

    let status = service.status(date("2026-04-02")).await?;
    assert_eq!(status.active_loans, 1);
    assert!((status.total_debt - loan.remaining_balance).abs() < 1e-9);

    // event log came back too: opened + one payment
    let snapshot = service.snapshot().await?;
    assert_eq!(snapshot.loan_counter, 1);
    assert_eq!(snapshot.financial_health.payment_history.len(), 2);

    let report = service.check_integrity().await?;
    assert!(report.is_consistent);

    Ok(())
}

#[tokio::test]
async fn test_export_loans_csv() -> Result<()> {
    let (service, _dir) = funded_service(2000.0).await?;
    service.request_loan(10_000.0, 12, date("2026-03-01")).await?;

    let exporter = Exporter::new(&service);
    let mut buffer = Vec::new();
    let count = exporter.export_loans_csv(&mut buffer).await?;
    assert_eq!(count, 1);

    let csv = String::from_utf8(buffer)?;
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("id,status,principal"));
    let row = lines.next().unwrap();
    assert!(row.starts_with("1,active,10000"));

    Ok(())
}

#[tokio::test]
async fn test_export_payments_csv() -> Result<()> {
    let (service, _dir) = funded_service(2000.0).await?;
    service.request_loan(10_000.0, 12, date("2026-03-01")).await?;
    service.settle(date("2026-04-01")).await?;
    service.settle(date("2026-05-01")).await?;

    let exporter = Exporter::new(&service);
    let mut buffer = Vec::new();
    let count = exporter.export_payments_csv(&mut buffer).await?;
    assert_eq!(count, 2);

    let csv = String::from_utf8(buffer)?;
    assert_eq!(csv.lines().count(), 3);

    Ok(())
}

#[tokio::test]
async fn test_full_json_roundtrip_into_another_database() -> Result<()> {
    let (source, _src_dir) = funded_service(2000.0).await?;
    source.request_loan(10_000.0, 12, date("2026-03-01")).await?;
    source.request_loan(4000.0, 6, date("2026-03-10")).await?;
    source.settle(date("2026-04-01")).await?;

    let exporter = Exporter::new(&source);
    let mut buffer = Vec::new();
    exporter.export_full_json(&mut buffer).await?;

    let (target, _dst_dir) = common::test_service().await?;
    let importer = Importer::new(&target);
    let summary = importer
        .import_full_json(buffer.as_slice(), ImportOptions::default())
        .await?;
    assert_eq!(summary.loans, 2);
    assert!(!summary.dry_run);

    let source_status = source.status(date("2026-04-02")).await?;
    let target_status = target.status(date("2026-04-02")).await?;
    assert_eq!(source_status.credit_score, target_status.credit_score);
    assert_eq!(source_status.total_debt, target_status.total_debt);
    assert_eq!(source_status.active_loans, target_status.active_loans);

    let source_loan = source.get_loan(1).await?;
    let target_loan = target.get_loan(1).await?;
    assert_eq!(source_loan.remaining_balance, target_loan.remaining_balance);
    assert_eq!(source_loan.payment_history.len(), target_loan.payment_history.len());

    let source_treasury = source.treasury().await?;
    let target_treasury = target.treasury().await?;
    assert_eq!(source_treasury.balance, target_treasury.balance);
    assert_eq!(source_treasury.monthly_income, target_treasury.monthly_income);

    let report = target.check_integrity().await?;
    assert!(report.is_consistent);

    Ok(())
}

#[tokio::test]
async fn test_dry_run_import_leaves_database_untouched() -> Result<()> {
    let (source, _src_dir) = funded_service(2000.0).await?;
    source.request_loan(10_000.0, 12, date("2026-03-01")).await?;

    let exporter = Exporter::new(&source);
    let mut buffer = Vec::new();
    exporter.export_full_json(&mut buffer).await?;

    let (target, _dst_dir) = common::test_service().await?;
    let importer = Importer::new(&target);
    let summary = importer
        .import_full_json(
            buffer.as_slice(),
            ImportOptions { dry_run: true },
        )
        .await?;
    assert_eq!(summary.loans, 1);
    assert!(summary.dry_run);

    assert!(target.list_loans(true).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_export_json_parses_back() -> Result<()> {
    let (service, _dir) = funded_service(2000.0).await?;
    service.request_loan(10_000.0, 12, date("2026-03-01")).await?;

    let exporter = Exporter::new(&service);
    let mut buffer = Vec::new();
    exporter.export_full_json(&mut buffer).await?;

    let parsed: LedgerExport = serde_json::from_slice(&buffer)?;
    assert_eq!(parsed.ledger.loans.len(), 1);
    assert_eq!(parsed.ledger.loan_counter, 1);
    assert_eq!(parsed.treasury.balance, 10_000.0);

    Ok(())
}
