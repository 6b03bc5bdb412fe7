use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::classify::{Thresholds, classify};
use super::debtor::Debtor;
use super::loan::{Loan, LoanStatus, join_loan};
use super::record::{LedgerField, Money, MonthlyRecord, YearMonth};

/// Sums of the eight ledger columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub opening_principal: Money,
    pub principal_advanced: Money,
    pub principal_paid: Money,
    pub outstanding_principal: Money,
    pub opening_interest: Money,
    pub interest_charged: Money,
    pub interest_paid: Money,
    pub outstanding_interest: Money,
}

impl Totals {
    /// Adds every column of `record`.
    pub fn add_record(&mut self, record: &MonthlyRecord) {
        self.opening_principal += record.opening_principal;
        self.principal_advanced += record.principal_advanced;
        self.principal_paid += record.principal_paid;
        self.outstanding_principal += record.outstanding_principal;
        self.opening_interest += record.opening_interest;
        self.interest_charged += record.interest_charged;
        self.interest_paid += record.interest_paid;
        self.outstanding_interest += record.outstanding_interest;
    }

    pub fn merge(&mut self, other: &Totals) {
        self.opening_principal += other.opening_principal;
        self.principal_advanced += other.principal_advanced;
        self.principal_paid += other.principal_paid;
        self.outstanding_principal += other.outstanding_principal;
        self.opening_interest += other.opening_interest;
        self.interest_charged += other.interest_charged;
        self.interest_paid += other.interest_paid;
        self.outstanding_interest += other.outstanding_interest;
    }

    pub fn get(&self, field: LedgerField) -> Money {
        match field {
            LedgerField::OpeningPrincipal => self.opening_principal,
            LedgerField::PrincipalAdvanced => self.principal_advanced,
            LedgerField::PrincipalPaid => self.principal_paid,
            LedgerField::OutstandingPrincipal => self.outstanding_principal,
            LedgerField::OpeningInterest => self.opening_interest,
            LedgerField::InterestCharged => self.interest_charged,
            LedgerField::InterestPaid => self.interest_paid,
            LedgerField::OutstandingInterest => self.outstanding_interest,
        }
    }

    /// Rolls a run of chronological records up into one period row: openings
    /// from the first, outstanding figures from the last, movements summed.
    fn period<'a>(records: impl IntoIterator<Item = &'a MonthlyRecord>) -> Option<Totals> {
        let mut iter = records.into_iter();
        let first = iter.next()?;
        let mut totals = Totals::default();
        totals.add_record(first);
        for r in iter {
            totals.principal_advanced += r.principal_advanced;
            totals.principal_paid += r.principal_paid;
            totals.interest_charged += r.interest_charged;
            totals.interest_paid += r.interest_paid;
            totals.outstanding_principal = r.outstanding_principal;
            totals.outstanding_interest = r.outstanding_interest;
        }
        Some(totals)
    }
}

/// Portfolio totals for one month. Debtors without a record in `month` add nothing.
pub fn aggregate_by_month(debtors: &[Debtor], month: YearMonth) -> Totals {
    let mut totals = Totals::default();
    for debtor in debtors {
        if let Some(row) = Totals::period(debtor.records_in(month)) {
            totals.merge(&row);
        }
    }
    totals
}

/// Month-by-month portfolio totals for every month any debtor has a record in.
pub fn monthly_rollup(debtors: &[Debtor]) -> BTreeMap<YearMonth, Totals> {
    let mut months: Vec<YearMonth> = debtors
        .iter()
        .flat_map(|d| d.history().map(|r| r.month))
        .collect();
    months.sort();
    months.dedup();
    months
        .into_iter()
        .map(|m| (m, aggregate_by_month(debtors, m)))
        .collect()
}

/// Lifetime column sums for one debtor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerTotals {
    pub debtor_id: String,
    pub loan_id: String,
    pub customer_name: String,
    pub totals: Totals,
}

/// Per-debtor sums over every record, sorted by customer name.
pub fn aggregate_by_customer(debtors: &[Debtor]) -> Vec<CustomerTotals> {
    let mut rows: Vec<CustomerTotals> = debtors
        .iter()
        .map(|d| {
            let mut totals = Totals::default();
            d.history().for_each(|r| totals.add_record(r));
            CustomerTotals {
                debtor_id: d.id.clone(),
                loan_id: d.loan_id.clone(),
                customer_name: d.customer_name.clone(),
                totals,
            }
        })
        .collect();
    rows.sort_by(|a, b| compare_customer_names(&a.customer_name, &b.customer_name));
    rows
}

/// Sum of `field` over every record of every debtor.
pub fn overall_total(field: LedgerField, debtors: &[Debtor]) -> Money {
    debtors
        .iter()
        .flat_map(|d| d.history())
        .map(|r| r.field(field))
        .sum()
}

/// Splits a name into alternating runs of digits and non-digits.
fn runs(name: &str) -> impl Iterator<Item = &str> {
    let mut rest = name;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map_or(rest.len(), |(i, _)| i);
        let (run, tail) = rest.split_at(end);
        rest = tail;
        Some(run)
    })
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_runs(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| s.starts_with(|c: char| c.is_ascii_digit());
    if numeric(a) && numeric(b) {
        compare_digits(a, b)
    } else {
        a.cmp(b)
    }
}

/// Orders names like `Customer2` before `Customer10`.
///
/// Names are compared run by run: digit runs numerically, text runs as plain
/// text. Names equal under that order fall back to plain text, so the result
/// is a total order even for mixed names like `Customer1x`.
pub fn compare_customer_names(a: &str, b: &str) -> Ordering {
    let mut left = runs(a);
    let mut right = runs(b);
    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => match compare_runs(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
        }
    }
}

/// Headline figures for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortfolioSummary {
    pub debtors: usize,
    pub active: usize,
    pub overdue: usize,
    pub bad_debt: usize,
    pub about_to_overdue: usize,
    pub completed: usize,
    pub extended: usize,
    /// Debtors whose loan could not be found.
    pub unlinked: usize,
    pub principal_advanced: Money,
    pub outstanding_principal: Money,
    pub outstanding_interest: Money,
    /// Interest collected, reported as revenue.
    pub revenue: Money,
}

impl PortfolioSummary {
    pub fn compute(debtors: &[Debtor], loans: &[Loan], today: NaiveDate, thresholds: &Thresholds) -> Self {
        let mut summary = PortfolioSummary {
            debtors: debtors.len(),
            principal_advanced: overall_total(LedgerField::PrincipalAdvanced, debtors),
            revenue: overall_total(LedgerField::InterestPaid, debtors),
            ..PortfolioSummary::default()
        };
        for debtor in debtors {
            let balances = debtor.current_balances();
            summary.outstanding_principal += balances.principal;
            summary.outstanding_interest += balances.interest;
            let Some(loan) = join_loan(debtor, loans) else {
                summary.unlinked += 1;
                continue;
            };
            let c = classify(debtor, loan, today, thresholds);
            match c.status {
                LoanStatus::Active => summary.active += 1,
                LoanStatus::Overdue => summary.overdue += 1,
                LoanStatus::Completed => summary.completed += 1,
                LoanStatus::Extended => summary.extended += 1,
            }
            if c.bad_debt {
                summary.bad_debt += 1;
            }
            if c.about_to_overdue {
                summary.about_to_overdue += 1;
            }
        }
        summary
    }
}
