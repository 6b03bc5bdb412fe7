use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::{Collection, Document, DocumentStore, StoreError};

use super::audit::{LogKind, TransactionLog};
use super::capital::{
    CapitalLedger, Contribution, EarningsBook, Investor, RetainedEarningsMonth,
    RetainedEarningsPolicy,
};
use super::classify::{Classification, Thresholds, classify, is_completed};
use super::debtor::Debtor;
use super::loan::{Loan, LoanStatus, NewLoan, join_loan};
use super::record::{EntryDelta, Money, YearMonth};
use super::report::{PortfolioSummary, compare_customer_names};
use super::transaction::{
    EditMode, RecordEdit, apply_entry, discard_entry, edit_record, rollback_last,
};
use super::{LedgerError, ValidationError};

/// Tunable behaviour of a [`LoanBook`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookSettings {
    pub thresholds: Thresholds,
    pub edit_mode: EditMode,
    pub retained_earnings: RetainedEarningsPolicy,
}

/// A debtor joined with its loan and the rules evaluated for a given day.
#[derive(Debug, Clone, Serialize)]
pub struct DebtorView {
    pub debtor: Debtor,
    pub loan: Option<Loan>,
    pub classification: Option<Classification>,
}

impl DebtorView {
    fn matches(&self, pred: impl Fn(&Classification) -> bool) -> bool {
        self.classification.as_ref().is_some_and(pred)
    }
}

/// Loan book backed by a document store.
///
/// Every mutation reads the aggregate, applies the change in memory and writes
/// the whole document back conditioned on the version it was read at. When
/// that write fails the in-memory change is undone before the error returns.
pub struct LoanBook<S: DocumentStore> {
    store: Mutex<S>,
    settings: BookSettings,
}

fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Permanent(e.to_string()))
}

fn warn_on_failed_undo<T>(result: Result<T, StoreError>, what: &str) {
    if let Err(e) = result {
        warn!(error = %e, what, "Could not undo write");
    }
}

fn decode_all<T: DeserializeOwned>(
    docs: Vec<Document>,
    mut attach: impl FnMut(&mut T, &Document),
) -> Result<Vec<T>, StoreError> {
    docs.into_iter()
        .map(|doc| {
            let mut value: T = doc.decode()?;
            attach(&mut value, &doc);
            Ok(value)
        })
        .collect()
}

impl<S: DocumentStore> LoanBook<S> {
    pub fn new(store: S) -> Self {
        Self::with_settings(store, BookSettings::default())
    }

    pub fn with_settings(store: S, settings: BookSettings) -> Self {
        Self {
            store: Mutex::new(store),
            settings,
        }
    }

    pub fn settings(&self) -> &BookSettings {
        &self.settings
    }

    pub fn into_store(self) -> S {
        self.store.into_inner().expect("store mutex poisoned")
    }

    fn store(&self) -> MutexGuard<'_, S> {
        self.store.lock().expect("store mutex poisoned")
    }

    fn load_loans(store: &S) -> Result<Vec<Loan>, StoreError> {
        decode_all(store.get_collection(Collection::Loans)?, |l: &mut Loan, d| {
            l.id = d.id.clone()
        })
    }

    fn load_debtors(store: &S) -> Result<Vec<Debtor>, StoreError> {
        let debtors = decode_all(store.get_collection(Collection::Debtors)?, |x: &mut Debtor, d| {
            x.id = d.id.clone();
            x.version = d.version;
        })?;
        for d in &debtors {
            d.check_invariants().map_err(StoreError::Permanent)?;
        }
        Ok(debtors)
    }

    fn load_debtor(store: &S, id: &str) -> Result<Debtor, LedgerError> {
        let doc = store
            .get_document(Collection::Debtors, id)
            .map_err(|e| match e {
                StoreError::NotFound => LedgerError::NotFound(format!("debtor {id}")),
                other => LedgerError::Persistence(other),
            })?;
        let mut debtor: Debtor = doc.decode()?;
        debtor.id = doc.id;
        debtor.version = doc.version;
        debtor.check_invariants().map_err(StoreError::Permanent)?;
        Ok(debtor)
    }

    fn loan_for(store: &S, debtor: &Debtor) -> Result<Loan, LedgerError> {
        let loans = Self::load_loans(store)?;
        join_loan(debtor, &loans)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("loan {}", debtor.loan_id)))
    }

    fn write_debtor(store: &mut S, debtor: &mut Debtor) -> Result<(), StoreError> {
        let version =
            store.update_document_if(Collection::Debtors, &debtor.id, debtor.version, encode(&*debtor)?)?;
        debtor.version = version;
        Ok(())
    }

    fn append_log(store: &mut S, log: &TransactionLog) -> Result<(), StoreError> {
        store.add_document(Collection::TransactionLogs, encode(log)?)?;
        Ok(())
    }

    /// Registers a loan and opens its debtor ledger.
    pub fn create_loan(&self, new_loan: NewLoan, now: DateTime<Utc>) -> Result<(Loan, Debtor), LedgerError> {
        let mut loan = new_loan.into_loan()?;
        let mut store = self.store();
        if Self::load_loans(&store)?
            .iter()
            .any(|l| l.loan_id == loan.loan_id)
        {
            return Err(ValidationError::InvalidLoan(format!("duplicate loan id {}", loan.loan_id)).into());
        }
        let mut debtor = Debtor::create(&loan, now);
        let debtor_doc = encode(&debtor)?;
        loan.id = store.add_document(Collection::Loans, encode(&loan)?)?;
        debtor.id = match store.add_document(Collection::Debtors, debtor_doc) {
            Ok(id) => id,
            Err(e) => {
                warn!(loan_id = %loan.loan_id, error = %e, "Debtor not saved, removing loan");
                warn_on_failed_undo(store.delete_document(Collection::Loans, &loan.id), "loan");
                return Err(e.into());
            }
        };
        debtor.version = 1;
        info!(
            loan_id = %loan.loan_id,
            customer = %loan.customer_name,
            amount = %loan.amount,
            "Registered loan"
        );
        Ok((loan, debtor))
    }

    pub fn loans(&self) -> Result<Vec<Loan>, LedgerError> {
        Ok(Self::load_loans(&self.store())?)
    }

    pub fn debtors(&self) -> Result<Vec<Debtor>, LedgerError> {
        Ok(Self::load_debtors(&self.store())?)
    }

    pub fn debtor(&self, id: &str) -> Result<Debtor, LedgerError> {
        Self::load_debtor(&self.store(), id)
    }

    pub fn loan(&self, debtor: &Debtor) -> Result<Loan, LedgerError> {
        Self::loan_for(&self.store(), debtor)
    }

    /// Applies a payment or advance to `debtor` and persists it.
    ///
    /// On a failed write the new record is removed again and the error is
    /// returned as [`LedgerError::Persistence`].
    pub fn record_entry(
        &self,
        debtor: &mut Debtor,
        date: NaiveDate,
        delta: EntryDelta,
        now: DateTime<Utc>,
    ) -> Result<Uuid, LedgerError> {
        let mut store = self.store();
        let loan = Self::loan_for(&store, debtor)?;
        let prior = debtor.status;
        let record_id = apply_entry(debtor, date, delta, loan.due_date, now, self.settings.edit_mode)?;
        if let Err(e) = Self::write_debtor(&mut store, debtor) {
            warn!(debtor_id = %debtor.id, error = %e, "Entry not saved, discarding");
            discard_entry(debtor, record_id, prior, self.settings.edit_mode);
            return Err(e.into());
        }
        info!(
            debtor_id = %debtor.id,
            %record_id,
            outstanding_principal = %debtor.current_opening_principal,
            outstanding_interest = %debtor.current_opening_interest,
            status = %debtor.status,
            "Recorded entry"
        );
        Ok(record_id)
    }

    /// Removes the debtor's latest record and persists the result.
    pub fn rollback_last(&self, debtor: &mut Debtor, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let mut store = self.store();
        let loan = Self::loan_for(&store, debtor)?;
        let snapshot = debtor.clone();
        let removed = rollback_last(debtor, loan.due_date, now, self.settings.edit_mode)?;
        if let Err(e) = Self::write_debtor(&mut store, debtor) {
            warn!(debtor_id = %debtor.id, error = %e, "Rollback not saved, restoring");
            *debtor = snapshot;
            return Err(e.into());
        }
        info!(debtor_id = %debtor.id, record_id = %removed.id, "Rolled back entry");
        Ok(())
    }

    /// Edits one record's movements and persists the result.
    pub fn edit_record(
        &self,
        debtor: &mut Debtor,
        record_id: Uuid,
        edit: RecordEdit,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut store = self.store();
        let loan = Self::loan_for(&store, debtor)?;
        let snapshot = debtor.clone();
        edit_record(debtor, record_id, edit, loan.due_date, now, self.settings.edit_mode)?;
        if let Err(e) = Self::write_debtor(&mut store, debtor) {
            warn!(debtor_id = %debtor.id, error = %e, "Edit not saved, restoring");
            *debtor = snapshot;
            return Err(e.into());
        }
        info!(debtor_id = %debtor.id, %record_id, "Edited record");
        Ok(())
    }

    /// Moves the loan's due date later and marks the debtor as extended.
    pub fn extend_due_date(
        &self,
        user: &str,
        debtor: &mut Debtor,
        new_due_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Loan, LedgerError> {
        let mut store = self.store();
        let mut loan = Self::loan_for(&store, debtor)?;
        if is_completed(debtor) {
            return Err(ValidationError::InvalidLoan(format!(
                "loan {} is already repaid",
                loan.loan_id
            ))
            .into());
        }
        if new_due_date <= loan.due_date {
            return Err(ValidationError::InvalidLoan(format!(
                "new due date {new_due_date} is not after {}",
                loan.due_date
            ))
            .into());
        }
        let old_due_date = loan.due_date;
        let old_status = loan.status;
        store.update_document(
            Collection::Loans,
            &loan.id,
            json!({ "dueDate": new_due_date, "status": LoanStatus::Extended }),
        )?;
        let snapshot = debtor.clone();
        debtor.status = LoanStatus::Extended;
        debtor.last_updated = now;
        if let Err(e) = Self::write_debtor(&mut store, debtor) {
            warn!(debtor_id = %debtor.id, error = %e, "Extension not saved, restoring loan");
            *debtor = snapshot;
            warn_on_failed_undo(
                store.update_document(
                    Collection::Loans,
                    &loan.id,
                    json!({ "dueDate": old_due_date, "status": old_status }),
                ),
                "loan",
            );
            return Err(e.into());
        }
        let log = TransactionLog::new(
            user,
            LogKind::DueDateExtended,
            format!(
                "{} ({}): due date {old_due_date} -> {new_due_date}",
                debtor.customer_name, loan.loan_id
            ),
            now,
        );
        if let Err(e) = Self::append_log(&mut store, &log) {
            warn!(loan_id = %loan.loan_id, error = %e, "Extension not logged, reverting");
            let mut restored = snapshot;
            restored.version = debtor.version;
            let undone = Self::write_debtor(&mut store, &mut restored);
            if undone.is_ok() {
                *debtor = restored;
            }
            warn_on_failed_undo(undone, "debtor");
            warn_on_failed_undo(
                store.update_document(
                    Collection::Loans,
                    &loan.id,
                    json!({ "dueDate": old_due_date, "status": old_status }),
                ),
                "loan",
            );
            return Err(e.into());
        }
        loan.due_date = new_due_date;
        loan.status = LoanStatus::Extended;
        info!(loan_id = %loan.loan_id, %old_due_date, %new_due_date, "Extended due date");
        Ok(loan)
    }

    /// Every debtor joined with its loan and classified, sorted by customer name.
    pub fn classified(&self, today: NaiveDate) -> Result<Vec<DebtorView>, LedgerError> {
        let store = self.store();
        let loans = Self::load_loans(&store)?;
        let debtors = Self::load_debtors(&store)?;
        drop(store);
        let mut views: Vec<DebtorView> = debtors
            .into_iter()
            .map(|debtor| {
                let loan = join_loan(&debtor, &loans).cloned();
                let classification = loan
                    .as_ref()
                    .map(|l| classify(&debtor, l, today, &self.settings.thresholds));
                DebtorView {
                    debtor,
                    loan,
                    classification,
                }
            })
            .collect();
        views.sort_by(|a, b| compare_customer_names(&a.debtor.customer_name, &b.debtor.customer_name));
        Ok(views)
    }

    pub fn overdue(&self, today: NaiveDate) -> Result<Vec<DebtorView>, LedgerError> {
        Ok(self
            .classified(today)?
            .into_iter()
            .filter(|v| v.matches(|c| c.overdue))
            .collect())
    }

    pub fn bad_debtors(&self, today: NaiveDate) -> Result<Vec<DebtorView>, LedgerError> {
        Ok(self
            .classified(today)?
            .into_iter()
            .filter(|v| v.matches(|c| c.bad_debt))
            .collect())
    }

    pub fn about_to_overdue(&self, today: NaiveDate) -> Result<Vec<DebtorView>, LedgerError> {
        Ok(self
            .classified(today)?
            .into_iter()
            .filter(|v| v.matches(|c| c.about_to_overdue))
            .collect())
    }

    pub fn summary(&self, today: NaiveDate) -> Result<PortfolioSummary, LedgerError> {
        let store = self.store();
        let loans = Self::load_loans(&store)?;
        let debtors = Self::load_debtors(&store)?;
        Ok(PortfolioSummary::compute(
            &debtors,
            &loans,
            today,
            &self.settings.thresholds,
        ))
    }

    pub fn add_investor(&self, name: &str, company: Option<String>) -> Result<Investor, LedgerError> {
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidLoan("investor name must not be empty".into()).into());
        }
        let mut investor = Investor {
            id: String::new(),
            name: name.to_string(),
            company,
        };
        investor.id = self
            .store()
            .add_document(Collection::Investors, encode(&investor)?)?;
        info!(investor_id = %investor.id, investor = name, "Registered investor");
        Ok(investor)
    }

    fn load_capital(store: &S) -> Result<CapitalLedger, StoreError> {
        let investors = decode_all(store.get_collection(Collection::Investors)?, |i: &mut Investor, d| {
            i.id = d.id.clone()
        })?;
        let contributions = decode_all(
            store.get_collection(Collection::Contributions)?,
            |c: &mut Contribution, d| c.id = d.id.clone(),
        )?;
        Ok(CapitalLedger::new(investors, contributions))
    }

    pub fn capital(&self) -> Result<CapitalLedger, LedgerError> {
        Ok(Self::load_capital(&self.store())?)
    }

    /// Records a capital contribution and logs it under `user`.
    pub fn add_contribution(
        &self,
        user: &str,
        investor_id: &str,
        month: YearMonth,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<Contribution, LedgerError> {
        let mut store = self.store();
        let mut capital = Self::load_capital(&store)?;
        let mut contribution = Contribution {
            id: String::new(),
            investor_id: investor_id.to_string(),
            month,
            amount,
        };
        capital.add_contribution(contribution.clone())?;
        contribution.id = store.add_document(Collection::Contributions, encode(&contribution)?)?;
        let log = TransactionLog::new(
            user,
            LogKind::ContributionAdded,
            format!("investor {investor_id} contributed {amount} for {month}"),
            now,
        );
        if let Err(e) = Self::append_log(&mut store, &log) {
            warn!(investor_id, error = %e, "Contribution not logged, removing it");
            warn_on_failed_undo(
                store.delete_document(Collection::Contributions, &contribution.id),
                "contribution",
            );
            return Err(e.into());
        }
        info!(investor_id, %month, %amount, "Recorded contribution");
        Ok(contribution)
    }

    /// Changes a contribution's amount and logs the before and after values.
    pub fn edit_contribution(
        &self,
        user: &str,
        contribution_id: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<Contribution, LedgerError> {
        let mut store = self.store();
        let mut capital = Self::load_capital(&store)?;
        let previous = capital.edit_contribution(contribution_id, amount)?;
        store.update_document(
            Collection::Contributions,
            contribution_id,
            json!({ "amount": amount }),
        )?;
        let log = TransactionLog::new(
            user,
            LogKind::ContributionEdited,
            format!("contribution {contribution_id}: {previous} -> {amount}"),
            now,
        );
        if let Err(e) = Self::append_log(&mut store, &log) {
            warn!(contribution_id, error = %e, "Edit not logged, restoring amount");
            warn_on_failed_undo(
                store.update_document(
                    Collection::Contributions,
                    contribution_id,
                    json!({ "amount": previous }),
                ),
                "contribution",
            );
            return Err(e.into());
        }
        info!(contribution_id, %previous, %amount, "Edited contribution");
        capital
            .contributions()
            .iter()
            .find(|c| c.id == contribution_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("contribution {contribution_id}")))
    }

    fn load_earnings(&self, store: &S) -> Result<(EarningsBook, Vec<(String, YearMonth)>), StoreError> {
        let docs = store.get_collection(Collection::RetainedEarnings)?;
        let ids = docs
            .iter()
            .map(|d| Ok((d.id.clone(), d.decode::<RetainedEarningsMonth>()?.month)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        let months = decode_all(docs, |_: &mut RetainedEarningsMonth, _| {})?;
        Ok((
            EarningsBook::with_months(self.settings.retained_earnings, months),
            ids,
        ))
    }

    pub fn earnings(&self) -> Result<EarningsBook, LedgerError> {
        Ok(self.load_earnings(&self.store())?.0)
    }

    /// Sets the earnings and distributions for a month, creating or replacing it.
    pub fn record_earnings(
        &self,
        month: YearMonth,
        earnings: Money,
        distributions: BTreeMap<String, Money>,
        retained: Option<Money>,
    ) -> Result<RetainedEarningsMonth, LedgerError> {
        let mut store = self.store();
        let (mut book, ids) = self.load_earnings(&store)?;
        let entry = book.record(month, earnings, distributions, retained)?.clone();
        match ids.iter().find(|(_, m)| *m == month) {
            Some((id, _)) => {
                store.update_document(Collection::RetainedEarnings, id, encode(&entry)?)?;
            }
            None => {
                store.add_document(Collection::RetainedEarnings, encode(&entry)?)?;
            }
        }
        info!(%month, retained = %entry.retained_earnings, "Recorded earnings");
        Ok(entry)
    }

    /// Audit entries, oldest first.
    pub fn transaction_logs(&self) -> Result<Vec<TransactionLog>, LedgerError> {
        let mut logs = decode_all(
            self.store().get_collection(Collection::TransactionLogs)?,
            |_: &mut TransactionLog, _| {},
        )?;
        logs.sort_by_key(|l| l.timestamp);
        Ok(logs)
    }
}
