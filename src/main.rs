use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use loan_book::config::Config;
use loan_book::core::report::{aggregate_by_customer, aggregate_by_month, monthly_rollup};
use loan_book::core::{DebtorView, EntryDelta, LoanBook, Money, NewLoan, YearMonth};
use loan_book::export;
use loan_book::store::{CachingStore, DocumentStore, FileStore};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loan-book", about = "Manage a loan book and its debtor ledgers")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a loan and open its debtor ledger
    AddLoan {
        #[arg(long)]
        customer: String,
        #[arg(long, default_value = "personal")]
        loan_type: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "0")]
        interest: Decimal,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        months: u32,
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long)]
        loan_id: Option<String>,
    },
    /// Record a payment or advance against a debtor
    Entry {
        #[arg(long)]
        debtor: String,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "0")]
        advanced: Decimal,
        #[arg(long, default_value = "0")]
        paid: Decimal,
        #[arg(long, default_value = "0")]
        interest_charged: Decimal,
        #[arg(long, default_value = "0")]
        interest_paid: Decimal,
    },
    /// Remove a debtor's latest ledger entry
    Rollback {
        #[arg(long)]
        debtor: String,
    },
    /// Move a loan's due date later
    Extend {
        #[arg(long)]
        debtor: String,
        #[arg(long)]
        due: NaiveDate,
        #[arg(long, default_value = "cli")]
        user: String,
    },
    /// List all debtors with their classification
    List,
    /// List overdue debtors
    Overdue {
        /// Only show bad debt
        #[arg(long)]
        bad_only: bool,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// List active loans close to their due date
    DueSoon,
    /// Portfolio totals for one month
    ReportMonth {
        #[arg(long)]
        month: YearMonth,
    },
    /// Month-by-month portfolio totals
    ReportMonths {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Lifetime totals per customer
    ReportCustomers {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Headline figures for the whole book
    Summary,
    /// Register an investor
    AddInvestor {
        #[arg(long)]
        name: String,
        #[arg(long)]
        company: Option<String>,
    },
    /// Record a capital contribution
    Contribute {
        #[arg(long)]
        investor: String,
        #[arg(long)]
        month: YearMonth,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "cli")]
        user: String,
    },
    /// Show contributions per investor and per month
    Capital,
    /// Show the audit trail
    Logs,
}

fn print_views(views: &[DebtorView]) {
    for v in views {
        let balances = v.debtor.current_balances();
        let (status, days) = match &v.classification {
            Some(c) => (c.status.to_string(), c.days_overdue),
            None => (format!("{} (no loan)", v.debtor.status), 0),
        };
        println!(
            "{} | {} | {} | principal {} | interest {} | {} days overdue | {}",
            v.debtor.id,
            v.debtor.customer_name,
            v.debtor.loan_id,
            balances.principal,
            balances.interest,
            days,
            status
        );
    }
}

fn run<S: DocumentStore>(book: LoanBook<S>, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let now = Utc::now();
    let today = now.date_naive();
    match command {
        Commands::AddLoan {
            customer,
            loan_type,
            amount,
            interest,
            start,
            months,
            due,
            loan_id,
        } => {
            let (loan, debtor) = book.create_loan(
                NewLoan {
                    loan_id,
                    customer_name: customer,
                    loan_type,
                    amount,
                    interest_amount: interest,
                    start_date: start.unwrap_or(today),
                    duration_months: months,
                    due_date: due,
                },
                now,
            )?;
            println!("Loan {} registered, debtor {}", loan.loan_id, debtor.id);
        }
        Commands::Entry {
            debtor,
            date,
            advanced,
            paid,
            interest_charged,
            interest_paid,
        } => {
            let mut d = book.debtor(&debtor)?;
            book.record_entry(
                &mut d,
                date.unwrap_or(today),
                EntryDelta {
                    principal_advanced: advanced,
                    principal_paid: paid,
                    interest_charged,
                    interest_paid,
                },
                now,
            )?;
            let b = d.current_balances();
            println!(
                "Outstanding principal {} interest {} ({})",
                b.principal, b.interest, d.status
            );
        }
        Commands::Rollback { debtor } => {
            let mut d = book.debtor(&debtor)?;
            book.rollback_last(&mut d, now)?;
            println!("Rolled back; outstanding principal {}", d.current_opening_principal);
        }
        Commands::Extend { debtor, due, user } => {
            let mut d = book.debtor(&debtor)?;
            let loan = book.extend_due_date(&user, &mut d, due, now)?;
            println!("Loan {} now due {}", loan.loan_id, loan.due_date);
        }
        Commands::List => print_views(&book.classified(today)?),
        Commands::Overdue { bad_only, csv } => {
            let views = if bad_only {
                book.bad_debtors(today)?
            } else {
                book.overdue(today)?
            };
            match csv {
                Some(path) => export::to_file(&path, |w| export::csv::write_debtor_views(w, &views))?,
                None => print_views(&views),
            }
        }
        Commands::DueSoon => print_views(&book.about_to_overdue(today)?),
        Commands::ReportMonth { month } => {
            let totals = aggregate_by_month(&book.debtors()?, month);
            export::json::write(std::io::stdout(), &totals)?;
            println!();
        }
        Commands::ReportMonths { csv } => {
            let rollup = monthly_rollup(&book.debtors()?);
            match csv {
                Some(path) => export::to_file(&path, |w| export::csv::write_monthly_report(w, &rollup))?,
                None => export::csv::write_monthly_report(std::io::stdout(), &rollup)?,
            }
        }
        Commands::ReportCustomers { csv, json } => {
            let rows = aggregate_by_customer(&book.debtors()?);
            if let Some(path) = &csv {
                export::to_file(path, |w| export::csv::write_customer_report(w, &rows))?;
            }
            if let Some(path) = &json {
                export::to_file(path, |w| export::json::write(w, &rows))?;
            }
            if csv.is_none() && json.is_none() {
                export::csv::write_customer_report(std::io::stdout(), &rows)?;
            }
        }
        Commands::Summary => {
            export::json::write(std::io::stdout(), &book.summary(today)?)?;
            println!();
        }
        Commands::AddInvestor { name, company } => {
            let investor = book.add_investor(&name, company)?;
            println!("Investor {} registered as {}", investor.name, investor.id);
        }
        Commands::Contribute {
            investor,
            month,
            amount,
            user,
        } => {
            let c = book.add_contribution(&user, &investor, month, amount, now)?;
            println!("Contribution {} recorded", c.id);
        }
        Commands::Capital => {
            let capital = book.capital()?;
            for (investor, total) in capital.investor_totals() {
                println!("{} | {} | {}", investor.id, investor.name, total);
            }
            let overall: Money = capital.monthly_totals().values().copied().sum();
            for (month, total) in capital.monthly_totals() {
                println!("{month} | {total}");
            }
            println!("total | {overall}");
        }
        Commands::Logs => {
            for log in book.transaction_logs()? {
                println!("{} | {} | {:?} | {}", log.timestamp, log.user, log.kind, log.content);
            }
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let cfg = Config::load_or_default(&cli.config)?;
    let settings = cfg.book_settings();
    let store = FileStore::new(&cfg.store.data_dir);
    if cfg.store.cache {
        run(LoanBook::with_settings(CachingStore::new(store), settings), cli.command)
    } else {
        run(LoanBook::with_settings(store, settings), cli.command)
    }
}
