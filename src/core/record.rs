use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as DeError};
use uuid::Uuid;

/// Currency amount in fixed-point decimal.
pub type Money = Decimal;

/// Calendar month key rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Returns `None` when `month` is outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Month containing the given date.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearMonthError(String);

impl fmt::Display for YearMonthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid month key: {}", self.0)
    }
}

impl std::error::Error for YearMonthError {}

impl FromStr for YearMonth {
    type Err = YearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| YearMonthError(s.into()))?;
        let year = y.parse::<i32>().map_err(|_| YearMonthError(s.into()))?;
        let month = m.parse::<u32>().map_err(|_| YearMonthError(s.into()))?;
        YearMonth::new(year, month).ok_or_else(|| YearMonthError(s.into()))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        YearMonth::from_str(&s).map_err(DeError::custom)
    }
}

/// The eight numeric columns of a [`MonthlyRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerField {
    OpeningPrincipal,
    PrincipalAdvanced,
    PrincipalPaid,
    OutstandingPrincipal,
    OpeningInterest,
    InterestCharged,
    InterestPaid,
    OutstandingInterest,
}

impl LedgerField {
    pub const ALL: [LedgerField; 8] = [
        LedgerField::OpeningPrincipal,
        LedgerField::PrincipalAdvanced,
        LedgerField::PrincipalPaid,
        LedgerField::OutstandingPrincipal,
        LedgerField::OpeningInterest,
        LedgerField::InterestCharged,
        LedgerField::InterestPaid,
        LedgerField::OutstandingInterest,
    ];

    /// Column label used by report exports.
    pub fn label(&self) -> &'static str {
        match self {
            LedgerField::OpeningPrincipal => "opening_principal",
            LedgerField::PrincipalAdvanced => "principal_advanced",
            LedgerField::PrincipalPaid => "principal_paid",
            LedgerField::OutstandingPrincipal => "outstanding_principal",
            LedgerField::OpeningInterest => "opening_interest",
            LedgerField::InterestCharged => "interest_charged",
            LedgerField::InterestPaid => "interest_paid",
            LedgerField::OutstandingInterest => "outstanding_interest",
        }
    }
}

/// Movements applied by a single ledger entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDelta {
    pub principal_advanced: Money,
    pub principal_paid: Money,
    pub interest_charged: Money,
    pub interest_paid: Money,
}

impl EntryDelta {
    /// True when every movement is zero.
    pub fn is_empty(&self) -> bool {
        self.principal_advanced.is_zero()
            && self.principal_paid.is_zero()
            && self.interest_charged.is_zero()
            && self.interest_paid.is_zero()
    }
}

/// Outstanding principal and interest at a point in the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub principal: Money,
    pub interest: Money,
}

impl Balances {
    pub fn is_settled(&self) -> bool {
        self.principal.is_zero() && self.interest.is_zero()
    }

    pub fn has_outstanding(&self) -> bool {
        self.principal > Money::ZERO || self.interest > Money::ZERO
    }
}

/// One entry of a debtor's running ledger.
///
/// Outstanding figures are always derived from the opening figures and the
/// movements; nothing outside this type writes them directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRecord {
    pub id: Uuid,
    pub date: NaiveDate,
    pub month: YearMonth,
    pub opening_principal: Money,
    pub principal_advanced: Money,
    pub principal_paid: Money,
    pub outstanding_principal: Money,
    pub opening_interest: Money,
    pub interest_charged: Money,
    pub interest_paid: Money,
    pub outstanding_interest: Money,
    /// Order in which the entry was applied; the seed record is zero.
    #[serde(default)]
    pub sequence: u64,
}

impl MonthlyRecord {
    /// Builds a record carrying `opening` forward through `delta`.
    pub fn new(date: NaiveDate, opening: Balances, delta: &EntryDelta) -> Self {
        let mut record = Self {
            id: Uuid::new_v4(),
            date,
            month: YearMonth::of(date),
            opening_principal: opening.principal,
            principal_advanced: delta.principal_advanced,
            principal_paid: delta.principal_paid,
            outstanding_principal: Money::ZERO,
            opening_interest: opening.interest,
            interest_charged: delta.interest_charged,
            interest_paid: delta.interest_paid,
            outstanding_interest: Money::ZERO,
            sequence: 0,
        };
        record.recompute();
        record
    }

    pub fn opening(&self) -> Balances {
        Balances {
            principal: self.opening_principal,
            interest: self.opening_interest,
        }
    }

    pub fn outstanding(&self) -> Balances {
        Balances {
            principal: self.outstanding_principal,
            interest: self.outstanding_interest,
        }
    }

    pub fn delta(&self) -> EntryDelta {
        EntryDelta {
            principal_advanced: self.principal_advanced,
            principal_paid: self.principal_paid,
            interest_charged: self.interest_charged,
            interest_paid: self.interest_paid,
        }
    }

    pub fn field(&self, field: LedgerField) -> Money {
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

    /// Replaces the opening figures and re-derives the outstanding ones.
    pub fn reopen(&mut self, opening: Balances) {
        self.opening_principal = opening.principal;
        self.opening_interest = opening.interest;
        self.recompute();
    }

    /// Replaces the movements and re-derives the outstanding figures.
    pub fn set_delta(&mut self, delta: &EntryDelta) {
        self.principal_advanced = delta.principal_advanced;
        self.principal_paid = delta.principal_paid;
        self.interest_charged = delta.interest_charged;
        self.interest_paid = delta.interest_paid;
        self.recompute();
    }

    /// Checks the opening + advanced - paid identity on both legs.
    pub fn balances_hold(&self) -> bool {
        self.outstanding_principal
            == self.opening_principal + self.principal_advanced - self.principal_paid
            && self.outstanding_interest
                == self.opening_interest + self.interest_charged - self.interest_paid
    }

    fn recompute(&mut self) {
        self.outstanding_principal =
            self.opening_principal + self.principal_advanced - self.principal_paid;
        self.outstanding_interest =
            self.opening_interest + self.interest_charged - self.interest_paid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn month_key_roundtrips_through_text() {
        let m: YearMonth = "2024-03".parse().unwrap();
        assert_eq!(m, YearMonth::new(2024, 3).unwrap());
        assert_eq!(m.to_string(), "2024-03");
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("March".parse::<YearMonth>().is_err());
    }

    #[test]
    fn month_keys_order_chronologically() {
        let a: YearMonth = "2023-12".parse().unwrap();
        let b: YearMonth = "2024-01".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn new_record_derives_outstanding() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let rec = MonthlyRecord::new(
            date,
            Balances {
                principal: dec!(1000),
                interest: dec!(50),
            },
            &EntryDelta {
                principal_advanced: dec!(200),
                principal_paid: dec!(300),
                interest_charged: dec!(10.5),
                interest_paid: dec!(50),
            },
        );
        assert_eq!(rec.month.to_string(), "2024-02");
        assert_eq!(rec.outstanding_principal, dec!(900));
        assert_eq!(rec.outstanding_interest, dec!(10.5));
        assert!(rec.balances_hold());
    }

    #[test]
    fn reopen_keeps_identity() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let mut rec = MonthlyRecord::new(
            date,
            Balances::default(),
            &EntryDelta {
                principal_paid: dec!(100),
                ..EntryDelta::default()
            },
        );
        rec.reopen(Balances {
            principal: dec!(400),
            interest: dec!(0),
        });
        assert_eq!(rec.outstanding_principal, dec!(300));
        assert!(rec.balances_hold());
    }

    #[test]
    fn record_serializes_with_camel_case_keys() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let rec = MonthlyRecord::new(date, Balances::default(), &EntryDelta::default());
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["month"], "2024-02");
        assert!(value.get("outstandingPrincipal").is_some());
    }
}
