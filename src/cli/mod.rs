use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::application::LedgerService;
use crate::domain::{format_amount, parse_amount, LoanDecision, LoanId, Notification};

/// Mutuo - Municipal Loan Ledger
#[derive(Parser)]
#[command(name = "mutuo")]
#[command(about = "A local-first municipal loan ledger for turn-based city simulations")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "mutuo.db")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Request a loan for the city
    Request {
        /// Amount to borrow (e.g., "10000" or "10000.00")
        amount: String,

        /// Term in months
        #[arg(short, long)]
        term: u32,

        /// Date of the request (ISO 8601 format: YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Run a monthly settlement pass over all active loans
    Settle {
        /// Settlement date (ISO 8601 format: YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Show city financial status
    Status,

    /// Loan management commands
    #[command(subcommand)]
    Loan(LoanCommands),

    /// Preview the amortization schedule for a hypothetical loan
    Schedule {
        /// Amount to borrow (e.g., "10000" or "10000.00")
        amount: String,

        /// Term in months
        #[arg(short, long)]
        term: u32,

        /// Annual interest rate override (e.g., "0.05"; defaults to the
        /// rate the current credit score would carry)
        #[arg(long)]
        rate: Option<f64>,
    },

    /// Treasury management commands
    #[command(subcommand)]
    Treasury(TreasuryCommands),

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: loans, payments, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import a full JSON snapshot
    Import {
        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum LoanCommands {
    /// List loans
    List {
        /// Include completed loans
        #[arg(long)]
        all: bool,
    },

    /// Show detailed loan information with payment history
    Show {
        /// Loan id
        id: LoanId,
    },
}

#[derive(Subcommand)]
pub enum TreasuryCommands {
    /// Show treasury balance and income
    Show,

    /// Set the monthly income the ledger evaluates requests against
    SetIncome {
        /// Monthly income (e.g., "2000" or "2000.00")
        amount: String,
    },

    /// Deposit funds into the treasury
    Deposit {
        /// Amount to deposit
        amount: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                LedgerService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Request { amount, term, date } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount = parse_amount(&amount)
                    .context("Invalid amount format. Use '10000' or '10000.00'")?;
                let now = parse_date_or_now(date.as_deref())?;

                let outcome = service.request_loan(amount, term, now).await?;
                print_notifications(&outcome.notifications);

                match outcome.decision {
                    LoanDecision::Approved {
                        loan,
                        annual_interest_rate,
                    } => {
                        println!(
                            "Approved loan #{}: {} over {} months at {:.2}% annual",
                            loan.id,
                            format_amount(loan.principal),
                            loan.term_months,
                            annual_interest_rate * 100.0
                        );
                        println!(
                            "Monthly payment: {} (first due {})",
                            format_amount(loan.monthly_payment),
                            loan.next_payment_date.format("%Y-%m-%d")
                        );
                    }
                    LoanDecision::Rejected { reason } => {
                        println!("Rejected: {}", reason);
                    }
                }
            }

            Commands::Settle { date } => {
                let service = LedgerService::connect(&self.database).await?;
                let now = parse_date_or_now(date.as_deref())?;

                let outcome = service.settle(now).await?;
                print_notifications(&outcome.notifications);

                println!(
                    "Settlement: {} payment(s) totaling {}, {} deferred",
                    outcome.payments_made,
                    format_amount(outcome.total_disbursed),
                    outcome.late_payments
                );
                if !outcome.completed_loans.is_empty() {
                    let ids: Vec<String> = outcome
                        .completed_loans
                        .iter()
                        .map(|id| format!("#{}", id))
                        .collect();
                    println!("Completed loans: {}", ids.join(", "));
                }
            }

            Commands::Status => {
                let service = LedgerService::connect(&self.database).await?;
                let status = service.status(Utc::now()).await?;

                println!("City financial status");
                println!("  Credit score:     {}", status.credit_score);
                println!("  Total debt:       {}", format_amount(status.total_debt));
                println!(
                    "  Monthly payments: {}",
                    format_amount(status.monthly_payments)
                );
                println!(
                    "  Loans:            {} active, {} completed",
                    status.active_loans, status.completed_loans
                );
                println!(
                    "  Treasury:         {} (income {}/month)",
                    format_amount(status.treasury_balance),
                    format_amount(status.monthly_income)
                );
                println!(
                    "  Current rate:     {:.2}% annual",
                    status.effective_interest_rate * 100.0
                );
            }

            Commands::Loan(loan_cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_loan_command(&service, loan_cmd).await?;
            }

            Commands::Schedule { amount, term, rate } => {
                let service = LedgerService::connect(&self.database).await?;
                let amount = parse_amount(&amount)
                    .context("Invalid amount format. Use '10000' or '10000.00'")?;

                let schedule = service.amortization_schedule(amount, term, rate).await?;

                println!(
                    "Schedule for {} over {} months at {:.2}% annual",
                    format_amount(schedule.principal),
                    schedule.term_months,
                    schedule.annual_interest_rate * 100.0
                );
                println!(
                    "Monthly payment {} | total interest {}",
                    format_amount(schedule.monthly_payment),
                    format_amount(schedule.total_interest)
                );
                println!(
                    "{:<6} {:>12} {:>12} {:>12} {:>12}",
                    "MONTH", "PAYMENT", "PRINCIPAL", "INTEREST", "BALANCE"
                );
                println!("{}", "-".repeat(58));
                for row in &schedule.rows {
                    println!(
                        "{:<6} {:>12} {:>12} {:>12} {:>12}",
                        row.month,
                        format_amount(row.payment),
                        format_amount(row.principal_portion),
                        format_amount(row.interest_portion),
                        format_amount(row.balance_after)
                    );
                }
            }

            Commands::Treasury(treasury_cmd) => {
                let service = LedgerService::connect(&self.database).await?;
                run_treasury_command(&service, treasury_cmd).await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&self.database).await?;
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = LedgerService::connect(&self.database).await?;
                run_export_command(&service, &export_type, output.as_deref()).await?;
            }

            Commands::Import { input, dry_run } => {
                let service = LedgerService::connect(&self.database).await?;
                run_import_command(&service, input.as_deref(), dry_run).await?;
            }
        }

        Ok(())
    }
}

async fn run_loan_command(service: &LedgerService, cmd: LoanCommands) -> Result<()> {
    match cmd {
        LoanCommands::List { all } => {
            let loans = service.list_loans(all).await?;
            if loans.is_empty() {
                println!("No loans found.");
            } else {
                println!(
                    "{:<6} {:<11} {:>12} {:>12} {:>10} {:<12}",
                    "ID", "STATUS", "PRINCIPAL", "BALANCE", "PAYMENT", "NEXT DUE"
                );
                println!("{}", "-".repeat(68));
                for loan in loans {
                    println!(
                        "{:<6} {:<11} {:>12} {:>12} {:>10} {:<12}",
                        loan.id,
                        loan.status.as_str(),
                        format_amount(loan.principal),
                        format_amount(loan.remaining_balance),
                        format_amount(loan.monthly_payment),
                        loan.next_payment_date.format("%Y-%m-%d")
                    );
                }
            }
        }

        LoanCommands::Show { id } => {
            let loan = service.get_loan(id).await?;

            println!("Loan #{}", loan.id);
            println!("  Status:          {}", loan.status);
            println!("  Principal:       {}", format_amount(loan.principal));
            println!(
                "  Balance:         {}",
                format_amount(loan.remaining_balance)
            );
            println!(
                "  Term:            {} months ({} remaining)",
                loan.term_months, loan.remaining_months
            );
            println!(
                "  Rate:            {:.2}% annual",
                loan.annual_interest_rate * 100.0
            );
            println!(
                "  Monthly payment: {}",
                format_amount(loan.monthly_payment)
            );
            println!(
                "  Next due:        {}",
                loan.next_payment_date.format("%Y-%m-%d")
            );
            println!(
                "  Created:         {}",
                loan.created_at.format("%Y-%m-%d %H:%M:%S")
            );

            if !loan.payment_history.is_empty() {
                println!();
                println!(
                    "{:<12} {:>10} {:>10} {:>10} {:>12}",
                    "DATE", "PAYMENT", "PRINCIPAL", "INTEREST", "BALANCE"
                );
                println!("{}", "-".repeat(58));
                for record in &loan.payment_history {
                    println!(
                        "{:<12} {:>10} {:>10} {:>10} {:>12}",
                        record.date.format("%Y-%m-%d"),
                        format_amount(record.amount),
                        format_amount(record.principal_portion),
                        format_amount(record.interest_portion),
                        format_amount(record.balance_after)
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_treasury_command(service: &LedgerService, cmd: TreasuryCommands) -> Result<()> {
    match cmd {
        TreasuryCommands::Show => {
            let treasury = service.treasury().await?;
            println!("Treasury");
            println!("  Balance:        {}", format_amount(treasury.balance));
            println!(
                "  Monthly income: {}",
                format_amount(treasury.monthly_income)
            );
        }

        TreasuryCommands::SetIncome { amount } => {
            let income = parse_amount(&amount)
                .context("Invalid amount format. Use '2000' or '2000.00'")?;
            let treasury = service.set_monthly_income(income).await?;
            println!(
                "Monthly income set to {}",
                format_amount(treasury.monthly_income)
            );
        }

        TreasuryCommands::Deposit { amount } => {
            let amount =
                parse_amount(&amount).context("Invalid amount format. Use '500' or '500.00'")?;
            let treasury = service.deposit(amount).await?;
            println!(
                "Deposited {}; treasury balance is now {}",
                format_amount(amount),
                format_amount(treasury.balance)
            );
        }
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    let report = service.check_integrity().await?;

    println!("Ledger integrity report");
    println!(
        "  Loans:            {} ({} active, {} completed)",
        report.loan_count, report.active_count, report.completed_count
    );
    println!(
        "  Total debt:       recorded {} / computed {}",
        format_amount(report.total_debt_recorded),
        format_amount(report.total_debt_computed)
    );
    println!(
        "  Monthly payments: recorded {} / computed {}",
        format_amount(report.monthly_payments_recorded),
        format_amount(report.monthly_payments_computed)
    );
    println!(
        "  Credit score:     {} ({})",
        report.credit_score,
        if report.credit_score_in_bounds {
            "in bounds"
        } else {
            "OUT OF BOUNDS"
        }
    );
    if report.completed_with_balance > 0 {
        println!(
            "  Completed loans with non-zero balance: {}",
            report.completed_with_balance
        );
    }
    println!();
    if report.is_consistent {
        println!("OK: ledger is consistent");
    } else {
        println!("FAILED: ledger aggregates have drifted");
    }
    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "loans" => {
            let count = exporter.export_loans_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} loans", count);
            }
        }
        "payments" => {
            let count = exporter.export_payments_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} payment records", count);
            }
        }
        "full" => {
            let export = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full ledger: {} loans, {} events",
                    export.ledger.loans.len(),
                    export.ledger.financial_health.payment_history.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: loans, payments, full",
                export_type
            );
        }
    }

    Ok(())
}

async fn run_import_command(
    service: &LedgerService,
    input: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    use crate::io::{ImportOptions, Importer};
    use std::fs::File;
    use std::io::{stdin, Read};

    let importer = Importer::new(service);

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let summary = importer
        .import_full_json(reader, ImportOptions { dry_run })
        .await?;

    if summary.dry_run {
        println!(
            "Dry run: snapshot holds {} loans, {} events, treasury balance {}",
            summary.loans,
            summary.events,
            format_amount(summary.treasury_balance)
        );
    } else {
        println!(
            "Imported {} loans, {} events; treasury balance {}",
            summary.loans,
            summary.events,
            format_amount(summary.treasury_balance)
        );
    }

    Ok(())
}

fn print_notifications(notifications: &[Notification]) {
    for notification in notifications {
        println!("[{}] {}", notification.level, notification.message);
    }
}

/// Parse a YYYY-MM-DD date into midnight UTC, or fall back to now.
fn parse_date_or_now(date: Option<&str>) -> Result<DateTime<Utc>> {
    match date {
        Some(date_str) => {
            let naive = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))?;
            Ok(naive
                .and_hms_opt(0, 0, 0)
                .context("Invalid time of day")?
                .and_utc())
        }
        None => Ok(Utc::now()),
    }
}
