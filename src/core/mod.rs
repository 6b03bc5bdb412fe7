//! Core loan-book logic: the debtor ledger, its classification rules,
//! reporting, and the capital and earnings ledgers.

use std::fmt;

use chrono::NaiveDate;

use crate::store::StoreError;

pub mod audit;
pub mod capital;
pub mod classify;
pub mod debtor;
pub mod loan;
pub mod record;
pub mod report;
pub mod service;
pub mod transaction;

pub use audit::{LogKind, TransactionLog};
pub use capital::{
    CapitalLedger, Contribution, EarningsBook, Investor, RetainedEarningsMonth,
    RetainedEarningsPolicy,
};
pub use classify::{Classification, DueIn, Thresholds};
pub use debtor::Debtor;
pub use loan::{Loan, LoanStatus, NewLoan, join_loan};
pub use record::{Balances, EntryDelta, LedgerField, Money, MonthlyRecord, YearMonth};
pub use report::{CustomerTotals, PortfolioSummary, Totals};
pub use service::{BookSettings, DebtorView, LoanBook};
pub use transaction::{EditMode, RecordEdit};

/// Input rejected before any state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// None of the entry's movements is set.
    EmptyEntry,
    /// The entry is dated after today.
    FutureDated(NaiveDate),
    /// An amount that must be positive is zero or negative.
    NonPositiveAmount,
    /// Loan data is inconsistent.
    InvalidLoan(String),
    /// A supplied retained-earnings figure disagrees with its derivation.
    RetainedMismatch { expected: Money, actual: Money },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyEntry => write!(f, "at least one amount must be non-zero"),
            ValidationError::FutureDated(d) => write!(f, "entry date {d} is in the future"),
            ValidationError::NonPositiveAmount => write!(f, "amount must be positive"),
            ValidationError::InvalidLoan(msg) => write!(f, "invalid loan: {msg}"),
            ValidationError::RetainedMismatch { expected, actual } => write!(
                f,
                "retained earnings {actual} do not match earnings plus distributions ({expected})"
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors surfaced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    Validation(ValidationError),
    /// The operation had nothing to act on.
    NoOp(&'static str),
    /// A referenced loan, debtor, record, investor or contribution is absent.
    NotFound(String),
    /// Reading or writing the backing store failed.
    Persistence(StoreError),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Validation(e) => write!(f, "validation failed: {e}"),
            LedgerError::NoOp(msg) => write!(f, "{msg}"),
            LedgerError::NotFound(what) => write!(f, "{what} not found"),
            LedgerError::Persistence(e) => write!(f, "persistence failed: {e}"),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::Validation(e) => Some(e),
            LedgerError::Persistence(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for LedgerError {
    fn from(e: ValidationError) -> Self {
        LedgerError::Validation(e)
    }
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        LedgerError::Persistence(e)
    }
}
