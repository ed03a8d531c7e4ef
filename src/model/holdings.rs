use crate::model::Account;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The next scheduled withdrawal of a card-like account, as shown on its detail page.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WithdrawalEntry {
    /// `None` when nothing is scheduled.
    amount: Option<i64>,
    /// `None` when nothing is scheduled.
    due_date: Option<NaiveDate>,
    /// The day the site last refreshed this account.
    as_of: NaiveDate,
}

impl WithdrawalEntry {
    pub fn new(amount: Option<i64>, due_date: Option<NaiveDate>, as_of: NaiveDate) -> Self {
        Self {
            amount,
            due_date,
            as_of,
        }
    }

    pub fn amount(&self) -> Option<i64> {
        self.amount
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }
}

/// The total balance of a deposit-like account, as shown on its detail page.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BalanceEntry {
    amount: i64,
    as_of: NaiveDate,
}

impl BalanceEntry {
    pub fn new(amount: i64, as_of: NaiveDate) -> Self {
        Self { amount, as_of }
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// The day the site last refreshed this account.
    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }
}

pub type Withdrawals = BTreeMap<Account, WithdrawalEntry>;
pub type Balances = BTreeMap<Account, BalanceEntry>;
