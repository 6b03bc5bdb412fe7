use std::fmt;
use std::str::FromStr;

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ValidationError;
use super::debtor::Debtor;
use super::record::Money;

/// Lifecycle state shared by loans and their debtors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    #[default]
    Active,
    Overdue,
    Completed,
    Extended,
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Completed => "completed",
            LoanStatus::Extended => "extended",
        };
        f.write_str(s)
    }
}

impl FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(LoanStatus::Active),
            "overdue" => Ok(LoanStatus::Overdue),
            "completed" => Ok(LoanStatus::Completed),
            "extended" => Ok(LoanStatus::Extended),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// A registered loan. Linked to exactly one [`Debtor`] through `loan_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    /// Storage document id; assigned by the store, not persisted in the body.
    #[serde(default, skip_serializing)]
    pub id: String,
    pub loan_id: String,
    pub customer_name: String,
    pub loan_type: String,
    pub amount: Money,
    pub interest_amount: Money,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub duration_months: u32,
    #[serde(default)]
    pub status: LoanStatus,
}

/// Input for registering a loan.
#[derive(Debug, Clone)]
pub struct NewLoan {
    /// Business key; generated when absent.
    pub loan_id: Option<String>,
    pub customer_name: String,
    pub loan_type: String,
    pub amount: Money,
    pub interest_amount: Money,
    pub start_date: NaiveDate,
    pub duration_months: u32,
    /// Defaults to `start_date` plus `duration_months`.
    pub due_date: Option<NaiveDate>,
}

impl NewLoan {
    /// Validates the input and produces an unsaved [`Loan`].
    pub fn into_loan(self) -> Result<Loan, ValidationError> {
        if self.customer_name.trim().is_empty() {
            return Err(ValidationError::InvalidLoan(
                "customer name must not be empty".into(),
            ));
        }
        if self.amount <= Money::ZERO {
            return Err(ValidationError::NonPositiveAmount);
        }
        if self.interest_amount < Money::ZERO {
            return Err(ValidationError::InvalidLoan(
                "interest amount must not be negative".into(),
            ));
        }
        let due_date = match self.due_date {
            Some(d) => d,
            None => self
                .start_date
                .checked_add_months(Months::new(self.duration_months))
                .ok_or_else(|| ValidationError::InvalidLoan("due date out of range".into()))?,
        };
        if due_date < self.start_date {
            return Err(ValidationError::InvalidLoan(
                "due date precedes start date".into(),
            ));
        }
        Ok(Loan {
            id: String::new(),
            loan_id: self
                .loan_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            customer_name: self.customer_name,
            loan_type: self.loan_type,
            amount: self.amount,
            interest_amount: self.interest_amount,
            start_date: self.start_date,
            due_date,
            duration_months: self.duration_months,
            status: LoanStatus::Active,
        })
    }
}

/// Finds the loan a debtor refers to.
pub fn join_loan<'a>(debtor: &Debtor, loans: &'a [Loan]) -> Option<&'a Loan> {
    loans.iter().find(|l| l.loan_id == debtor.loan_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input() -> NewLoan {
        NewLoan {
            loan_id: Some("L-1".into()),
            customer_name: "Customer1".into(),
            loan_type: "business".into(),
            amount: dec!(1000),
            interest_amount: dec!(50),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            duration_months: 1,
            due_date: None,
        }
    }

    #[test]
    fn due_date_defaults_to_duration() {
        let loan = input().into_loan().unwrap();
        assert_eq!(loan.due_date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(loan.status, LoanStatus::Active);
    }

    #[test]
    fn rejects_non_positive_amount() {
        let mut i = input();
        i.amount = dec!(0);
        assert_eq!(i.into_loan().unwrap_err(), ValidationError::NonPositiveAmount);
    }

    #[test]
    fn rejects_due_before_start() {
        let mut i = input();
        i.due_date = NaiveDate::from_ymd_opt(2023, 12, 1);
        assert!(matches!(
            i.into_loan().unwrap_err(),
            ValidationError::InvalidLoan(_)
        ));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Extended".parse::<LoanStatus>().unwrap(), LoanStatus::Extended);
        assert!("lost".parse::<LoanStatus>().is_err());
    }
}
