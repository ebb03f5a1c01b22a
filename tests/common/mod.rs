use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use tempfile::TempDir;

use mutuo::application::LedgerService;

/// Creates a test service with a temporary database.
/// The TempDir must be kept alive for the duration of the test.
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, dir))
}

/// Test service with a monthly income already set, so that reasonable
/// loan requests pass the policy checks.
#[allow(dead_code)]
pub async fn funded_service(monthly_income: f64) -> Result<(LedgerService, TempDir)> {
    let (service, dir) = test_service().await?;
    service.set_monthly_income(monthly_income).await?;
    Ok((service, dir))
}

/// Parse a YYYY-MM-DD string into midnight UTC.
#[allow(dead_code)]
pub fn date(s: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}
