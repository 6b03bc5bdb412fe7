//! Loan Book
//!
//! This crate tracks loans, their debtors' monthly repayment ledgers and the
//! investor capital behind them, on top of a pluggable document store.

pub mod config;
pub mod core;
pub mod export;
pub mod store;
