mod common;

use anyhow::Result;
use mutuo::domain::{LoanLedger, LoanPolicy, LoanStatus, TreasuryState, VecNotifier};

use common::{date, funded_service};

#[tokio::test]
async fn test_settle_before_due_date_is_a_no_op() -> Result<()> {
    let (service, _dir) = funded_service(2000.0).await?;
    service.request_loan(10_000.0, 12, date("2026-03-01")).await?;

    let outcome = service.settle(date("2026-03-15")).await?;
    assert_eq!(outcome.payments_made, 0);
    assert_eq!(outcome.late_payments, 0);

    let loan = service.get_loan(1).await?;
    assert_eq!(loan.remaining_balance, 10_000.0);
    assert!(loan.payment_history.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_settle_on_due_date_makes_one_payment() -> Result<()> {
    let (service, _dir) = funded_service(2000.0).await?;
    service.request_loan(10_000.0, 12, date("2026-03-01")).await?;

    let outcome = service.settle(date("2026-04-01")).await?;
    assert_eq!(outcome.payments_made, 1);
    assert_eq!(outcome.late_payments, 0);

    let loan = service.get_loan(1).await?;
    assert!(loan.remaining_balance < 10_000.0);
    assert_eq!(loan.remaining_months, 11);
    assert_eq!(loan.next_payment_date, date("2026-05-01"));
    assert_eq!(loan.payment_history.len(), 1);

    let record = &loan.payment_history[0];
    assert!((record.principal_portion + record.interest_portion - record.amount).abs() < 1e-9);
    assert!((record.balance_after - loan.remaining_balance).abs() < 1e-9);

    // disbursement minus one payment
    let treasury = service.treasury().await?;
    assert!((treasury.balance - (10_000.0 - loan.monthly_payment)).abs() < 1e-9);

    // the due date has advanced: settling again on the same day pays nothing
    let outcome = service.settle(date("2026-04-01")).await?;
    assert_eq!(outcome.payments_made, 0);

    Ok(())
}

#[tokio::test]
async fn test_catch_up_pays_one_cycle_per_pass() -> Result<()> {
    let (service, _dir) = funded_service(2000.0).await?;
    service.request_loan(10_000.0, 12, date("2026-03-01")).await?;

    // three months behind: each pass settles a single cycle
    let outcome = service.settle(date("2026-07-10")).await?;
    assert_eq!(outcome.payments_made, 1);
    let loan = service.get_loan(1).await?;
    assert_eq!(loan.next_payment_date, date("2026-05-01"));

    let outcome = service.settle(date("2026-07-10")).await?;
    assert_eq!(outcome.payments_made, 1);

    let outcome = service.settle(date("2026-07-10")).await?;
    assert_eq!(outcome.payments_made, 1);

    let loan = service.get_loan(1).await?;
    assert_eq!(loan.next_payment_date, date("2026-08-01"));
    assert_eq!(loan.payment_history.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_insufficient_funds_defers_payment_and_costs_credit() -> Result<()> {
    let (service, _dir) = funded_service(2000.0).await?;

    // open the loan in memory, then restore it with a drained treasury
    let mut ledger = LoanLedger::new(LoanPolicy::default());
    let mut scratch = TreasuryState {
        balance: 0.0,
        monthly_income: 2000.0,
    };
    let mut notifier = VecNotifier::new();
    ledger
        .request_loan(10_000.0, 12, date("2026-03-01"), &mut scratch, &mut notifier)
        .unwrap();
    service
        .restore(
            ledger.snapshot(),
            TreasuryState {
                balance: 0.0,
                monthly_income: 2000.0,
            },
        )
        .await?;

    let outcome = service.settle(date("2026-04-01")).await?;
    assert_eq!(outcome.payments_made, 0);
    assert_eq!(outcome.late_payments, 1);

    // the loan itself is untouched, only the credit score suffers
    let loan = service.get_loan(1).await?;
    assert_eq!(loan.remaining_balance, 10_000.0);
    assert_eq!(loan.next_payment_date, date("2026-04-01"));
    assert!(loan.payment_history.is_empty());

    let status = service.status(date("2026-04-01")).await?;
    assert_eq!(status.credit_score, 590);

    // once funded, the same cycle settles normally
    service.deposit(1000.0).await?;
    let outcome = service.settle(date("2026-04-02")).await?;
    assert_eq!(outcome.payments_made, 1);
    assert_eq!(outcome.late_payments, 0);

    Ok(())
}

#[tokio::test]
async fn test_full_payoff_over_twelve_months() -> Result<()> {
    let (service, _dir) = funded_service(2000.0).await?;
    service.request_loan(10_000.0, 12, date("2026-01-01")).await?;
    // the disbursed principal alone does not cover twelve months of interest
    service.deposit(1000.0).await?;

    let dates = [
        "2026-02-01", "2026-03-01", "2026-04-01", "2026-05-01", "2026-06-01", "2026-07-01",
        "2026-08-01", "2026-09-01", "2026-10-01", "2026-11-01", "2026-12-01", "2027-01-01",
    ];

    let mut completed = Vec::new();
    for d in dates {
        let outcome = service.settle(date(d)).await?;
        assert_eq!(outcome.payments_made, 1, "no payment on {}", d);
        completed.extend(outcome.completed_loans);
    }
    assert_eq!(completed, vec![1]);

    let loan = service.get_loan(1).await?;
    assert_eq!(loan.status, LoanStatus::Completed);
    assert_eq!(loan.remaining_balance, 0.0);
    assert_eq!(loan.remaining_months, 0);
    assert_eq!(loan.payment_history.len(), 12);

    let status = service.status(date("2027-01-01")).await?;
    assert_eq!(status.credit_score, 620);
    assert_eq!(status.total_debt, 0.0);
    assert_eq!(status.monthly_payments, 0.0);
    assert_eq!(status.active_loans, 0);
    assert_eq!(status.completed_loans, 1);

    // a completed loan never pays again
    let outcome = service.settle(date("2027-02-01")).await?;
    assert_eq!(outcome.payments_made, 0);

    let report = service.check_integrity().await?;
    assert!(report.is_consistent);

    Ok(())
}

#[tokio::test]
async fn test_settlement_handles_multiple_loans_in_id_order() -> Result<()> {
    let (service, _dir) = funded_service(5000.0).await?;
    service.request_loan(6000.0, 12, date("2026-03-01")).await?;
    service.request_loan(3000.0, 6, date("2026-03-10")).await?;

    let outcome = service.settle(date("2026-04-01")).await?;
    assert_eq!(outcome.payments_made, 2);

    let first = service.get_loan(1).await?;
    let second = service.get_loan(2).await?;
    assert_eq!(first.payment_history.len(), 1);
    assert_eq!(second.payment_history.len(), 1);
    assert!(
        (outcome.total_disbursed - (first.monthly_payment + second.monthly_payment)).abs() < 1e-9
    );

    let report = service.check_integrity().await?;
    assert!(report.is_consistent);

    Ok(())
}
