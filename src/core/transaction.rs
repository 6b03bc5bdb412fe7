//! Ledger mutations on a [`Debtor`]: new entries, rollback and edits.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::classify::derive_status;
use super::debtor::Debtor;
use super::loan::LoanStatus;
use super::record::{EntryDelta, Money, MonthlyRecord};
use super::{LedgerError, ValidationError};

/// How a change in the middle of the ledger affects the records after it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// Later records are re-opened from their predecessor's outstanding figures.
    #[default]
    Propagate,
    /// Only the touched record changes; later openings are left as stored.
    InPlace,
}

/// Replacement movements for an existing record. `None` keeps the stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordEdit {
    pub principal_advanced: Option<Money>,
    pub principal_paid: Option<Money>,
    pub interest_charged: Option<Money>,
    pub interest_paid: Option<Money>,
}

impl RecordEdit {
    pub fn is_empty(&self) -> bool {
        self.principal_advanced.is_none()
            && self.principal_paid.is_none()
            && self.interest_charged.is_none()
            && self.interest_paid.is_none()
    }

    fn apply_to(&self, current: EntryDelta) -> EntryDelta {
        EntryDelta {
            principal_advanced: self.principal_advanced.unwrap_or(current.principal_advanced),
            principal_paid: self.principal_paid.unwrap_or(current.principal_paid),
            interest_charged: self.interest_charged.unwrap_or(current.interest_charged),
            interest_paid: self.interest_paid.unwrap_or(current.interest_paid),
        }
    }
}

/// Appends a new entry dated `date` and returns its id.
///
/// The entry opens from the latest record dated before it (or the last record
/// when none is earlier). Records are re-sorted by date afterwards and the
/// denormalized balances and status are refreshed.
pub fn apply_entry(
    debtor: &mut Debtor,
    date: NaiveDate,
    delta: EntryDelta,
    due_date: NaiveDate,
    now: DateTime<Utc>,
    mode: EditMode,
) -> Result<Uuid, LedgerError> {
    if date > now.date_naive() {
        return Err(ValidationError::FutureDated(date).into());
    }
    if delta.is_empty() {
        return Err(ValidationError::EmptyEntry.into());
    }
    let opening = debtor
        .reference_for(date)
        .map(MonthlyRecord::outstanding)
        .unwrap_or_default();
    let mut record = MonthlyRecord::new(date, opening, &delta);
    record.sequence = debtor.next_sequence();
    let id = record.id;
    debtor.monthly_records.push(record);
    debtor.sort_records();
    if mode == EditMode::Propagate {
        if let Some(idx) = position(debtor, id) {
            recompute_from(debtor, idx);
        }
    }
    finish_mutation(debtor, due_date, now);
    Ok(id)
}

/// Removes the most recently applied record, which for a backdated entry may
/// sit in the middle of the ledger. The seed record is never removed.
///
/// With [`EditMode::Propagate`] the records after it are re-opened, undoing
/// the propagation the entry caused.
pub fn rollback_last(
    debtor: &mut Debtor,
    due_date: NaiveDate,
    now: DateTime<Utc>,
    mode: EditMode,
) -> Result<MonthlyRecord, LedgerError> {
    if debtor.monthly_records.len() <= 1 {
        return Err(LedgerError::NoOp("nothing to roll back"));
    }
    let idx = debtor
        .latest_applied()
        .filter(|&i| i > 0)
        .ok_or(LedgerError::NoOp("nothing to roll back"))?;
    let removed = debtor.monthly_records.remove(idx);
    if mode == EditMode::Propagate {
        recompute_from(debtor, idx);
    }
    finish_mutation(debtor, due_date, now);
    Ok(removed)
}

/// Replaces the movements of the record with `record_id`.
///
/// The edited record keeps its opening figures. With [`EditMode::Propagate`]
/// every later record is re-opened from its predecessor.
pub fn edit_record(
    debtor: &mut Debtor,
    record_id: Uuid,
    edit: RecordEdit,
    due_date: NaiveDate,
    now: DateTime<Utc>,
    mode: EditMode,
) -> Result<(), LedgerError> {
    if edit.is_empty() {
        return Err(ValidationError::EmptyEntry.into());
    }
    let idx = position(debtor, record_id)
        .ok_or_else(|| LedgerError::NotFound(format!("record {record_id}")))?;
    let record = &mut debtor.monthly_records[idx];
    let delta = edit.apply_to(record.delta());
    record.set_delta(&delta);
    if mode == EditMode::Propagate {
        recompute_from(debtor, idx + 1);
    }
    finish_mutation(debtor, due_date, now);
    Ok(())
}

/// Re-opens every record from `index` onwards from its predecessor's
/// outstanding figures. Index zero keeps its own opening.
pub fn recompute_from(debtor: &mut Debtor, index: usize) {
    let records = &mut debtor.monthly_records;
    for i in index.max(1)..records.len() {
        let opening = records[i - 1].outstanding();
        records[i].reopen(opening);
    }
    debtor.refresh_balances();
}

/// Removes a just-applied entry after its write failed and restores `prior_status`.
pub fn discard_entry(
    debtor: &mut Debtor,
    record_id: Uuid,
    prior_status: LoanStatus,
    mode: EditMode,
) -> Option<MonthlyRecord> {
    let idx = position(debtor, record_id)?;
    if debtor.monthly_records.len() <= 1 {
        return None;
    }
    let removed = debtor.monthly_records.remove(idx);
    if mode == EditMode::Propagate {
        recompute_from(debtor, idx);
    }
    debtor.refresh_balances();
    debtor.status = prior_status;
    Some(removed)
}

fn position(debtor: &Debtor, record_id: Uuid) -> Option<usize> {
    debtor.monthly_records.iter().position(|r| r.id == record_id)
}

fn finish_mutation(debtor: &mut Debtor, due_date: NaiveDate, now: DateTime<Utc>) {
    debtor.refresh_balances();
    debtor.last_updated = now;
    debtor.status = derive_status(debtor.status, debtor, due_date, now.date_naive());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loan::Loan;
    use crate::core::record::Balances;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn setup() -> (Debtor, NaiveDate, DateTime<Utc>) {
        let created = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let loan = Loan {
            id: String::new(),
            loan_id: "L-1".into(),
            customer_name: "Customer1".into(),
            loan_type: "personal".into(),
            amount: dec!(1000),
            interest_amount: dec!(100),
            start_date: created.date_naive(),
            due_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            duration_months: 11,
            status: LoanStatus::Active,
        };
        let due = loan.due_date;
        (Debtor::create(&loan, created), due, created)
    }

    fn paid(principal: Money, interest: Money) -> EntryDelta {
        EntryDelta {
            principal_paid: principal,
            interest_paid: interest,
            ..EntryDelta::default()
        }
    }

    #[test]
    fn entry_carries_reference_balances() {
        let (mut d, due, created) = setup();
        let now = created + Duration::days(30);
        apply_entry(&mut d, now.date_naive(), paid(dec!(200), dec!(20)), due, now, EditMode::Propagate).unwrap();
        let last = d.last_record().unwrap();
        assert_eq!(last.opening_principal, dec!(1000));
        assert_eq!(last.outstanding_principal, dec!(800));
        assert_eq!(last.outstanding_interest, dec!(80));
        assert_eq!(d.current_balances(), Balances { principal: dec!(800), interest: dec!(80) });
        assert_eq!(d.last_updated, now);
    }

    #[test]
    fn rejects_future_and_empty_entries() {
        let (mut d, due, created) = setup();
        let err = apply_entry(
            &mut d,
            created.date_naive() + Duration::days(1),
            paid(dec!(1), dec!(0)),
            due,
            created,
            EditMode::Propagate,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ValidationError::FutureDated(_))));
        let err = apply_entry(&mut d, created.date_naive(), EntryDelta::default(), due, created, EditMode::Propagate)
            .unwrap_err();
        assert_eq!(err, LedgerError::Validation(ValidationError::EmptyEntry));
        assert_eq!(d.records().len(), 1);
    }

    #[test]
    fn backdated_entry_is_sorted_and_propagated() {
        let (mut d, due, created) = setup();
        let now = created + Duration::days(60);
        apply_entry(&mut d, now.date_naive(), paid(dec!(100), dec!(0)), due, now, EditMode::Propagate).unwrap();
        let backdated = created.date_naive() + Duration::days(20);
        apply_entry(&mut d, backdated, paid(dec!(300), dec!(0)), due, now, EditMode::Propagate).unwrap();

        let dates: Vec<_> = d.history().map(|r| r.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
        assert_eq!(d.records()[1].outstanding_principal, dec!(700));
        assert_eq!(d.records()[2].opening_principal, dec!(700));
        assert_eq!(d.current_balances().principal, dec!(600));
        assert!(d.history().all(MonthlyRecord::balances_hold));
    }

    #[test]
    fn backdated_entry_in_place_leaves_later_records() {
        let (mut d, due, created) = setup();
        let now = created + Duration::days(60);
        apply_entry(&mut d, now.date_naive(), paid(dec!(100), dec!(0)), due, now, EditMode::InPlace).unwrap();
        let backdated = created.date_naive() + Duration::days(20);
        apply_entry(&mut d, backdated, paid(dec!(300), dec!(0)), due, now, EditMode::InPlace).unwrap();
        assert_eq!(d.records()[2].opening_principal, dec!(1000));
        assert_eq!(d.current_balances().principal, dec!(900));
    }

    #[test]
    fn paying_everything_completes_even_when_past_due() {
        let (mut d, _, created) = setup();
        let past_due = created.date_naive() - Duration::days(5);
        apply_entry(&mut d, created.date_naive(), paid(dec!(1000), dec!(100)), past_due, created, EditMode::Propagate)
            .unwrap();
        assert_eq!(d.status, LoanStatus::Completed);
    }

    #[test]
    fn rollback_restores_previous_state() {
        let (mut d, due, created) = setup();
        let before = d.clone();
        let now = created + Duration::days(3);
        apply_entry(&mut d, now.date_naive(), paid(dec!(250), dec!(5)), due, now, EditMode::Propagate).unwrap();
        rollback_last(&mut d, due, now, EditMode::Propagate).unwrap();
        assert_eq!(d.records(), before.records());
        assert_eq!(d.current_balances(), before.current_balances());
    }

    #[test]
    fn rollback_undoes_backdated_entry() {
        let (mut d, due, created) = setup();
        let now = created + Duration::days(60);
        apply_entry(&mut d, now.date_naive(), paid(dec!(100), dec!(0)), due, now, EditMode::Propagate).unwrap();
        let before = d.clone();
        let backdated = created.date_naive() + Duration::days(20);
        let id = apply_entry(&mut d, backdated, paid(dec!(50), dec!(0)), due, now, EditMode::Propagate).unwrap();
        assert_eq!(d.records()[1].id, id);

        let removed = rollback_last(&mut d, due, now, EditMode::Propagate).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(d.records(), before.records());
        assert_eq!(d.current_balances().principal, dec!(900));
    }

    #[test]
    fn rollback_in_place_keeps_later_openings() {
        let (mut d, due, created) = setup();
        let now = created + Duration::days(60);
        apply_entry(&mut d, now.date_naive(), paid(dec!(100), dec!(0)), due, now, EditMode::InPlace).unwrap();
        let before = d.clone();
        let backdated = created.date_naive() + Duration::days(20);
        apply_entry(&mut d, backdated, paid(dec!(50), dec!(0)), due, now, EditMode::InPlace).unwrap();
        rollback_last(&mut d, due, now, EditMode::InPlace).unwrap();
        assert_eq!(d.records(), before.records());
    }

    #[test]
    fn seed_record_cannot_be_rolled_back() {
        let (mut d, due, created) = setup();
        let err = rollback_last(&mut d, due, created, EditMode::Propagate).unwrap_err();
        assert!(matches!(err, LedgerError::NoOp(_)));
    }

    #[test]
    fn rollback_reopens_completed_debtor() {
        let (mut d, due, created) = setup();
        apply_entry(&mut d, created.date_naive(), paid(dec!(1000), dec!(100)), due, created, EditMode::Propagate)
            .unwrap();
        assert_eq!(d.status, LoanStatus::Completed);
        rollback_last(&mut d, due, created, EditMode::Propagate).unwrap();
        assert_eq!(d.status, LoanStatus::Active);
    }

    #[test]
    fn editing_middle_record_propagates() {
        let (mut d, due, created) = setup();
        let first = created + Duration::days(10);
        let second = created + Duration::days(40);
        let mid = apply_entry(&mut d, first.date_naive(), paid(dec!(100), dec!(0)), due, first, EditMode::Propagate)
            .unwrap();
        apply_entry(&mut d, second.date_naive(), paid(dec!(100), dec!(0)), due, second, EditMode::Propagate).unwrap();
        let edit = RecordEdit {
            principal_paid: Some(dec!(400)),
            ..RecordEdit::default()
        };
        edit_record(&mut d, mid, edit, due, second, EditMode::Propagate).unwrap();
        assert_eq!(d.records()[1].outstanding_principal, dec!(600));
        assert_eq!(d.records()[2].opening_principal, dec!(600));
        assert_eq!(d.current_balances().principal, dec!(500));
    }

    #[test]
    fn editing_middle_record_in_place_does_not_propagate() {
        let (mut d, due, created) = setup();
        let first = created + Duration::days(10);
        let second = created + Duration::days(40);
        let mid = apply_entry(&mut d, first.date_naive(), paid(dec!(100), dec!(0)), due, first, EditMode::InPlace)
            .unwrap();
        apply_entry(&mut d, second.date_naive(), paid(dec!(100), dec!(0)), due, second, EditMode::InPlace).unwrap();
        let edit = RecordEdit {
            principal_paid: Some(dec!(400)),
            ..RecordEdit::default()
        };
        edit_record(&mut d, mid, edit, due, second, EditMode::InPlace).unwrap();
        assert_eq!(d.records()[1].outstanding_principal, dec!(600));
        assert_eq!(d.records()[2].opening_principal, dec!(900));
        assert_eq!(d.current_balances().principal, dec!(800));
    }

    #[test]
    fn editing_unknown_record_fails() {
        let (mut d, due, created) = setup();
        let edit = RecordEdit {
            interest_paid: Some(dec!(1)),
            ..RecordEdit::default()
        };
        let err = edit_record(&mut d, Uuid::new_v4(), edit, due, created, EditMode::Propagate).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn discard_entry_undoes_apply() {
        let (mut d, due, created) = setup();
        let before = d.clone();
        let id = apply_entry(&mut d, created.date_naive(), paid(dec!(1000), dec!(100)), due, created, EditMode::Propagate)
            .unwrap();
        assert!(discard_entry(&mut d, id, before.status, EditMode::Propagate).is_some());
        assert_eq!(d.records(), before.records());
        assert_eq!(d.status, LoanStatus::Active);
        assert_eq!(d.current_balances(), before.current_balances());
    }
}
