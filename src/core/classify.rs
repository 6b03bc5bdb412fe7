//! Receivable classification rules.
//!
//! Every function here is pure and evaluated against an explicit `today`, so
//! callers decide which clock a report is computed against.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::debtor::Debtor;
use super::loan::{Loan, LoanStatus};

/// Business thresholds used by the classification rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Days past due at which an overdue receivable becomes bad debt (inclusive).
    pub bad_debt_days: i64,
    /// Coarse months remaining at or below which an active loan is about to overdue.
    pub about_to_overdue_months: i64,
    /// Length of the coarse month used for the months/days split.
    pub days_per_month: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            bad_debt_days: 90,
            about_to_overdue_months: 2,
            days_per_month: 30,
        }
    }
}

/// Time remaining until a due date, split into coarse months and leftover days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueIn {
    pub total_days: i64,
    pub months: i64,
    pub days: i64,
}

/// Splits the days until `due_date` into `floor(days / n)` months and `days mod n`.
pub fn time_until_due(due_date: NaiveDate, today: NaiveDate, thresholds: &Thresholds) -> DueIn {
    let total_days = (due_date - today).num_days();
    let per_month = thresholds.days_per_month.max(1);
    DueIn {
        total_days,
        months: total_days.div_euclid(per_month),
        days: total_days.rem_euclid(per_month),
    }
}

/// Days elapsed since the due date; zero while not yet due.
pub fn days_overdue(loan: &Loan, today: NaiveDate) -> i64 {
    (today - loan.due_date).num_days().max(0)
}

pub fn is_completed(debtor: &Debtor) -> bool {
    debtor.current_balances().is_settled()
}

pub fn is_overdue(debtor: &Debtor, loan: &Loan, today: NaiveDate) -> bool {
    today > loan.due_date && debtor.current_balances().has_outstanding()
}

pub fn is_bad_debt(debtor: &Debtor, loan: &Loan, today: NaiveDate, thresholds: &Thresholds) -> bool {
    is_overdue(debtor, loan, today) && days_overdue(loan, today) >= thresholds.bad_debt_days
}

/// An active loan not yet past due whose coarse months remaining are within threshold.
pub fn is_about_to_overdue(
    debtor: &Debtor,
    loan: &Loan,
    today: NaiveDate,
    thresholds: &Thresholds,
) -> bool {
    if debtor.status != LoanStatus::Active {
        return false;
    }
    let due = time_until_due(loan.due_date, today, thresholds);
    due.total_days >= 0 && due.months <= thresholds.about_to_overdue_months
}

/// Status to persist after a mutation.
///
/// Completed wins over overdue, which wins over the prior status. A debtor
/// that is neither completed nor overdue any more falls back to active, so an
/// overpaid debtor past due is active.
pub fn derive_status(prior: LoanStatus, debtor: &Debtor, due_date: NaiveDate, today: NaiveDate) -> LoanStatus {
    if is_completed(debtor) {
        LoanStatus::Completed
    } else if today > due_date && debtor.current_balances().has_outstanding() {
        LoanStatus::Overdue
    } else if matches!(prior, LoanStatus::Completed | LoanStatus::Overdue) {
        LoanStatus::Active
    } else {
        prior
    }
}

/// Snapshot of every rule for one debtor, computed on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub status: LoanStatus,
    pub completed: bool,
    pub overdue: bool,
    pub bad_debt: bool,
    pub about_to_overdue: bool,
    pub days_overdue: i64,
    pub due_in: DueIn,
}

pub fn classify(debtor: &Debtor, loan: &Loan, today: NaiveDate, thresholds: &Thresholds) -> Classification {
    let overdue = is_overdue(debtor, loan, today);
    Classification {
        status: derive_status(debtor.status, debtor, loan.due_date, today),
        completed: is_completed(debtor),
        overdue,
        bad_debt: overdue && days_overdue(loan, today) >= thresholds.bad_debt_days,
        about_to_overdue: is_about_to_overdue(debtor, loan, today, thresholds),
        days_overdue: if overdue { days_overdue(loan, today) } else { 0 },
        due_in: time_until_due(loan.due_date, today, thresholds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::EntryDelta;
    use crate::core::transaction::{EditMode, apply_entry};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn loan(due: NaiveDate) -> Loan {
        Loan {
            id: String::new(),
            loan_id: "L-1".into(),
            customer_name: "Customer1".into(),
            loan_type: "personal".into(),
            amount: dec!(1000),
            interest_amount: dec!(100),
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            due_date: due,
            duration_months: 6,
            status: LoanStatus::Active,
        }
    }

    fn debtor(loan: &Loan) -> Debtor {
        Debtor::create(loan, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn bad_debt_threshold_is_inclusive() {
        let due = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let l = loan(due);
        let d = debtor(&l);
        let th = Thresholds::default();
        assert!(!is_bad_debt(&d, &l, due + Duration::days(89), &th));
        assert!(is_bad_debt(&d, &l, due + Duration::days(90), &th));
    }

    #[test]
    fn settled_debtor_is_never_bad_debt() {
        let due = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let l = loan(due);
        let mut d = debtor(&l);
        let now = Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap();
        apply_entry(
            &mut d,
            now.date_naive(),
            EntryDelta {
                principal_paid: dec!(1000),
                interest_paid: dec!(100),
                ..EntryDelta::default()
            },
            l.due_date,
            now,
            EditMode::Propagate,
        )
        .unwrap();
        let th = Thresholds::default();
        for days in [1, 89, 90, 500] {
            let today = due + Duration::days(days);
            assert!(!is_overdue(&d, &l, today));
            assert!(!is_bad_debt(&d, &l, today, &th));
        }
    }

    #[test]
    fn hundred_days_past_due_is_overdue_and_bad() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let l = loan(today - Duration::days(100));
        let d = debtor(&l);
        let c = classify(&d, &l, today, &Thresholds::default());
        assert!(c.overdue);
        assert!(c.bad_debt);
        assert_eq!(c.status, LoanStatus::Overdue);
        assert_eq!(c.days_overdue, 100);
    }

    #[test]
    fn due_split_uses_thirty_day_months() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let due = today + Duration::days(75);
        let split = time_until_due(due, today, &Thresholds::default());
        assert_eq!((split.months, split.days), (2, 15));
    }

    #[test]
    fn about_to_overdue_boundary() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let th = Thresholds::default();
        let near = loan(today + Duration::days(89));
        assert!(is_about_to_overdue(&debtor(&near), &near, today, &th));
        let far = loan(today + Duration::days(90));
        assert!(!is_about_to_overdue(&debtor(&far), &far, today, &th));
        let past = loan(today - Duration::days(1));
        assert!(!is_about_to_overdue(&debtor(&past), &past, today, &th));
    }

    #[test]
    fn extended_status_survives_when_not_overdue() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let l = loan(today + Duration::days(30));
        let mut d = debtor(&l);
        d.status = LoanStatus::Extended;
        assert_eq!(
            derive_status(d.status, &d, l.due_date, today),
            LoanStatus::Extended
        );
        assert!(!is_about_to_overdue(&d, &l, today, &Thresholds::default()));
    }

    #[test]
    fn overpaid_debtor_past_due_is_not_overdue() {
        let due = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let l = loan(due);
        let mut d = debtor(&l);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        d.status = LoanStatus::Overdue;
        apply_entry(
            &mut d,
            now.date_naive(),
            EntryDelta {
                principal_paid: dec!(1100),
                interest_paid: dec!(100),
                ..EntryDelta::default()
            },
            l.due_date,
            now,
            EditMode::Propagate,
        )
        .unwrap();
        assert_eq!(d.current_balances().principal, dec!(-100));
        assert_eq!(d.status, LoanStatus::Active);
        let c = classify(&d, &l, now.date_naive(), &Thresholds::default());
        assert!(!c.overdue);
        assert_eq!(c.status, LoanStatus::Active);
    }
}
