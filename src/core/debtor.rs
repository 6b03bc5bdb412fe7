use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::loan::{Loan, LoanStatus};
use super::record::{Balances, EntryDelta, Money, MonthlyRecord, YearMonth};

/// Receivable-tracking aggregate for one loan.
///
/// `monthly_records` is never empty and is kept in ascending date order; the
/// last record is authoritative for the current balances, which are also
/// copied into `current_opening_principal` / `current_opening_interest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debtor {
    /// Storage document id; assigned by the store, not persisted in the body.
    #[serde(default, skip_serializing)]
    pub id: String,
    /// Store version this copy was read at; guards conditional writes.
    #[serde(skip)]
    pub version: u64,
    pub loan_id: String,
    pub customer_name: String,
    pub(crate) monthly_records: Vec<MonthlyRecord>,
    pub current_opening_principal: Money,
    pub current_opening_interest: Money,
    pub status: LoanStatus,
    pub last_updated: DateTime<Utc>,
}

impl Debtor {
    /// Opens the ledger for a freshly registered loan with a single seed record.
    pub fn create(loan: &Loan, now: DateTime<Utc>) -> Self {
        let seed = MonthlyRecord::new(
            now.date_naive(),
            Balances::default(),
            &EntryDelta {
                principal_advanced: loan.amount,
                interest_charged: loan.interest_amount,
                ..EntryDelta::default()
            },
        );
        let mut debtor = Self {
            id: String::new(),
            version: 0,
            loan_id: loan.loan_id.clone(),
            customer_name: loan.customer_name.clone(),
            monthly_records: vec![seed],
            current_opening_principal: Money::ZERO,
            current_opening_interest: Money::ZERO,
            status: LoanStatus::Active,
            last_updated: now,
        };
        debtor.refresh_balances();
        debtor
    }

    /// Outstanding principal and interest carried by the last record.
    pub fn current_balances(&self) -> Balances {
        Balances {
            principal: self.current_opening_principal,
            interest: self.current_opening_interest,
        }
    }

    /// Records in chronological order. Call again to restart.
    pub fn history(&self) -> impl Iterator<Item = &MonthlyRecord> {
        self.monthly_records.iter()
    }

    pub fn records(&self) -> &[MonthlyRecord] {
        &self.monthly_records
    }

    pub fn last_record(&self) -> Option<&MonthlyRecord> {
        self.monthly_records.last()
    }

    pub fn record(&self, id: uuid::Uuid) -> Option<&MonthlyRecord> {
        self.monthly_records.iter().find(|r| r.id == id)
    }

    /// Records falling in the given calendar month.
    pub fn records_in(&self, month: YearMonth) -> impl Iterator<Item = &MonthlyRecord> {
        self.monthly_records.iter().filter(move |r| r.month == month)
    }

    /// Latest record dated strictly before `date`, falling back to the last
    /// record when the new date would be the earliest in the ledger.
    pub(crate) fn reference_for(&self, date: NaiveDate) -> Option<&MonthlyRecord> {
        self.monthly_records
            .iter()
            .filter(|r| r.date < date)
            .max_by_key(|r| r.date)
            .or_else(|| self.monthly_records.last())
    }

    /// Sequence number for the next applied entry.
    pub(crate) fn next_sequence(&self) -> u64 {
        self.monthly_records
            .iter()
            .map(|r| r.sequence)
            .max()
            .map_or(0, |s| s + 1)
    }

    /// Index of the most recently applied record. Records without a sequence
    /// tie at zero and resolve to the last by date.
    pub(crate) fn latest_applied(&self) -> Option<usize> {
        self.monthly_records
            .iter()
            .enumerate()
            .max_by_key(|(_, r)| r.sequence)
            .map(|(i, _)| i)
    }

    /// Copies the last record's outstanding figures into the denormalized fields.
    pub(crate) fn refresh_balances(&mut self) {
        if let Some(last) = self.monthly_records.last() {
            self.current_opening_principal = last.outstanding_principal;
            self.current_opening_interest = last.outstanding_interest;
        }
    }

    pub(crate) fn sort_records(&mut self) {
        // stable, so same-day entries keep their insertion order
        self.monthly_records.sort_by_key(|r| r.date);
    }

    /// Checks the structural invariants a stored document must satisfy.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.monthly_records.is_empty() {
            return Err(format!("debtor {} has no monthly records", self.id));
        }
        if self
            .monthly_records
            .windows(2)
            .any(|w| w[0].date > w[1].date)
        {
            return Err(format!("debtor {} records are out of order", self.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn loan() -> Loan {
        Loan {
            id: String::new(),
            loan_id: "L-1".into(),
            customer_name: "Customer1".into(),
            loan_type: "personal".into(),
            amount: dec!(1000000),
            interest_amount: dec!(50000),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            duration_months: 6,
            status: LoanStatus::Active,
        }
    }

    #[test]
    fn create_seeds_single_record() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let debtor = Debtor::create(&loan(), now);
        assert_eq!(debtor.records().len(), 1);
        let seed = &debtor.records()[0];
        assert_eq!(seed.month.to_string(), "2024-01");
        assert_eq!(seed.opening_principal, dec!(0));
        assert_eq!(seed.principal_advanced, dec!(1000000));
        assert_eq!(seed.outstanding_principal, dec!(1000000));
        assert_eq!(seed.interest_charged, dec!(50000));
        assert_eq!(seed.outstanding_interest, dec!(50000));
        assert_eq!(debtor.status, LoanStatus::Active);
        assert_eq!(
            debtor.current_balances(),
            Balances {
                principal: dec!(1000000),
                interest: dec!(50000)
            }
        );
    }

    #[test]
    fn history_is_restartable() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let debtor = Debtor::create(&loan(), now);
        assert_eq!(debtor.history().count(), 1);
        assert_eq!(debtor.history().count(), 1);
    }

    #[test]
    fn reference_falls_back_to_last_record() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let debtor = Debtor::create(&loan(), now);
        let earlier = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        let reference = debtor.reference_for(earlier).unwrap();
        assert_eq!(reference.id, debtor.records()[0].id);
    }

    #[test]
    fn empty_ledger_fails_invariants() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let mut debtor = Debtor::create(&loan(), now);
        debtor.monthly_records.clear();
        assert!(debtor.check_invariants().is_err());
    }
}
