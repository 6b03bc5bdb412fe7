use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use loan_book::core::{EntryDelta, LoanBook, NewLoan};
use loan_book::store::{CachingStore, Collection, DocumentStore, FileStore};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("loan_book_it_{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
}

fn new_loan() -> NewLoan {
    NewLoan {
        loan_id: Some("L-7".into()),
        customer_name: "Customer7".into(),
        loan_type: "personal".into(),
        amount: dec!(5000),
        interest_amount: dec!(250),
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        duration_months: 3,
        due_date: None,
    }
}

#[test]
fn ledger_survives_reopening_file_store() {
    let dir = temp_dir();
    let debtor_id = {
        let book = LoanBook::new(FileStore::new(dir.clone()));
        let (_, mut debtor) = book.create_loan(new_loan(), at(2024, 1, 5)).unwrap();
        book.record_entry(
            &mut debtor,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            EntryDelta {
                principal_paid: dec!(1250.50),
                ..EntryDelta::default()
            },
            at(2024, 2, 1),
        )
        .unwrap();
        debtor.id
    };

    let book = LoanBook::new(FileStore::new(dir.clone()));
    let debtor = book.debtor(&debtor_id).unwrap();
    assert_eq!(debtor.records().len(), 2);
    assert_eq!(debtor.current_balances().principal, dec!(3749.50));
    assert_eq!(book.loan(&debtor).unwrap().loan_id, "L-7");
    std::fs::remove_dir_all(dir).unwrap();
}

#[test]
fn cache_serves_reads_until_write() {
    let dir = temp_dir();
    let book = LoanBook::new(CachingStore::new(FileStore::new(dir.clone())));
    let (_, mut debtor) = book.create_loan(new_loan(), at(2024, 1, 5)).unwrap();
    book.debtors().unwrap();
    book.debtors().unwrap();
    book.record_entry(
        &mut debtor,
        NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
        EntryDelta {
            interest_paid: dec!(50),
            ..EntryDelta::default()
        },
        at(2024, 1, 20),
    )
    .unwrap();
    let reread = book.debtor(&debtor.id).unwrap();
    assert_eq!(reread.current_balances().interest, dec!(200));

    let store = book.into_store();
    let misses = store.misses();
    store.get_collection(Collection::Debtors).unwrap();
    assert_eq!(store.misses(), misses);
    store.invalidate(Collection::Debtors);
    store.get_collection(Collection::Debtors).unwrap();
    assert_eq!(store.misses(), misses + 1);
    std::fs::remove_dir_all(dir).unwrap();
}
