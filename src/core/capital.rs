//! Investor capital contributions and retained earnings.
//!
//! Both ledgers are month-keyed and independent of the debtor ledger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::record::{Money, YearMonth};
use super::{LedgerError, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investor {
    /// Storage document id, also used as the investor id.
    #[serde(default, skip_serializing)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
}

/// One capital inflow. An investor may contribute several times in a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub investor_id: String,
    pub month: YearMonth,
    pub amount: Money,
}

#[derive(Debug, Default, Clone)]
pub struct CapitalLedger {
    investors: Vec<Investor>,
    contributions: Vec<Contribution>,
}

impl CapitalLedger {
    pub fn new(investors: Vec<Investor>, contributions: Vec<Contribution>) -> Self {
        Self {
            investors,
            contributions,
        }
    }

    pub fn investors(&self) -> &[Investor] {
        &self.investors
    }

    pub fn contributions(&self) -> &[Contribution] {
        &self.contributions
    }

    pub fn add_investor(&mut self, investor: Investor) {
        self.investors.push(investor);
    }

    /// Records a contribution. Repeated contributions for the same month add up.
    pub fn add_contribution(&mut self, contribution: Contribution) -> Result<(), LedgerError> {
        if contribution.amount <= Money::ZERO {
            return Err(ValidationError::NonPositiveAmount.into());
        }
        if !self.investors.iter().any(|i| i.id == contribution.investor_id) {
            return Err(LedgerError::NotFound(format!(
                "investor {}",
                contribution.investor_id
            )));
        }
        self.contributions.push(contribution);
        Ok(())
    }

    /// Replaces a contribution's amount and returns the previous one.
    pub fn edit_contribution(&mut self, id: &str, amount: Money) -> Result<Money, LedgerError> {
        if amount <= Money::ZERO {
            return Err(ValidationError::NonPositiveAmount.into());
        }
        let c = self
            .contributions
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("contribution {id}")))?;
        Ok(std::mem::replace(&mut c.amount, amount))
    }

    pub fn lifetime_total(&self, investor_id: &str) -> Money {
        self.contributions
            .iter()
            .filter(|c| c.investor_id == investor_id)
            .map(|c| c.amount)
            .sum()
    }

    pub fn month_total(&self, month: YearMonth) -> Money {
        self.contributions
            .iter()
            .filter(|c| c.month == month)
            .map(|c| c.amount)
            .sum()
    }

    pub fn monthly_totals(&self) -> BTreeMap<YearMonth, Money> {
        let mut totals = BTreeMap::new();
        for c in &self.contributions {
            *totals.entry(c.month).or_insert(Money::ZERO) += c.amount;
        }
        totals
    }

    /// Lifetime total per investor, in registration order.
    pub fn investor_totals(&self) -> Vec<(&Investor, Money)> {
        self.investors
            .iter()
            .map(|i| (i, self.lifetime_total(&i.id)))
            .collect()
    }
}

/// Whether retained earnings are computed or taken as entered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetainedEarningsPolicy {
    /// `retained = earnings + sum(distributions)`, enforced on every write.
    #[default]
    Derived,
    /// Retained earnings are stored as supplied.
    Stored,
}

/// Earnings for one month. Distributions are signed movements keyed by
/// investor id; payouts to investors are negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetainedEarningsMonth {
    pub month: YearMonth,
    pub earnings: Money,
    #[serde(default)]
    pub distributions: BTreeMap<String, Money>,
    pub retained_earnings: Money,
}

impl RetainedEarningsMonth {
    pub fn derived_retained(&self) -> Money {
        self.earnings + self.distributions.values().copied().sum::<Money>()
    }
}

#[derive(Debug, Default, Clone)]
pub struct EarningsBook {
    policy: RetainedEarningsPolicy,
    months: BTreeMap<YearMonth, RetainedEarningsMonth>,
}

impl EarningsBook {
    pub fn new(policy: RetainedEarningsPolicy) -> Self {
        Self {
            policy,
            months: BTreeMap::new(),
        }
    }

    /// Loads stored months, overwriting earlier entries for the same month.
    pub fn with_months(policy: RetainedEarningsPolicy, months: Vec<RetainedEarningsMonth>) -> Self {
        Self {
            policy,
            months: months.into_iter().map(|m| (m.month, m)).collect(),
        }
    }

    /// Sets the figures for `month`.
    ///
    /// Under [`RetainedEarningsPolicy::Derived`] a supplied `retained` value must
    /// match the derivation. Under `Stored` a missing value falls back to it.
    pub fn record(
        &mut self,
        month: YearMonth,
        earnings: Money,
        distributions: BTreeMap<String, Money>,
        retained: Option<Money>,
    ) -> Result<&RetainedEarningsMonth, ValidationError> {
        let mut entry = RetainedEarningsMonth {
            month,
            earnings,
            distributions,
            retained_earnings: Money::ZERO,
        };
        let derived = entry.derived_retained();
        entry.retained_earnings = match (self.policy, retained) {
            (RetainedEarningsPolicy::Derived, Some(given)) if given != derived => {
                return Err(ValidationError::RetainedMismatch {
                    expected: derived,
                    actual: given,
                });
            }
            (RetainedEarningsPolicy::Stored, Some(given)) => given,
            _ => derived,
        };
        self.months.insert(month, entry);
        Ok(&self.months[&month])
    }

    pub fn get(&self, month: YearMonth) -> Option<&RetainedEarningsMonth> {
        self.months.get(&month)
    }

    pub fn months(&self) -> impl Iterator<Item = &RetainedEarningsMonth> {
        self.months.values()
    }

    /// Cumulative retained earnings at the end of each month.
    pub fn running_retained(&self) -> BTreeMap<YearMonth, Money> {
        let mut balance = Money::ZERO;
        self.months
            .iter()
            .map(|(m, e)| {
                balance += e.retained_earnings;
                (*m, balance)
            })
            .collect()
    }
}
