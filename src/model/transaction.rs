use crate::model::{Account, CategoryName};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Where a transaction's money goes. A normal transaction touches one account and carries a
/// category. A transfer moves money between two of the user's own accounts and has no category.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posting {
    Normal {
        account: Account,
        category: CategoryName,
    },
    Transfer {
        from: Account,
        to: Account,
    },
}

/// Represents a single row of the household ledger.
///
/// `amount` is in yen. For a normal transaction its sign tells income (positive) from expense
/// (negative or zero). For a transfer it is the non-negative amount moved from `from` to `to`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    id: i64,
    date: NaiveDate,
    amount: i64,
    posting: Posting,
    description: String,
    memo: String,
}

impl Transaction {
    /// Creates a normal, uncategorized transaction. The id is zero until the site assigns one; use
    /// `with_id` for transactions that already exist on the site.
    pub fn new(date: NaiveDate, amount: i64, account: Account) -> Self {
        Self {
            id: 0,
            date,
            amount,
            posting: Posting::Normal {
                account,
                category: CategoryName::default(),
            },
            description: String::new(),
            memo: String::new(),
        }
    }

    /// Creates a transfer of `amount` from `from` to `to`. The amount is stored as its absolute
    /// value.
    pub fn new_transfer(date: NaiveDate, amount: i64, from: Account, to: Account) -> Self {
        Self {
            id: 0,
            date,
            amount: amount.abs(),
            posting: Posting::Transfer { from, to },
            description: String::new(),
            memo: String::new(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Sets the category. Has no effect on a transfer, which never carries one.
    pub fn with_category(mut self, name: CategoryName) -> Self {
        if let Posting::Normal { category, .. } = &mut self.posting {
            *category = name;
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn posting(&self) -> &Posting {
        &self.posting
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self.posting, Posting::Transfer { .. })
    }

    /// The single account of a normal transaction, `None` for a transfer.
    pub fn account(&self) -> Option<&Account> {
        match &self.posting {
            Posting::Normal { account, .. } => Some(account),
            Posting::Transfer { .. } => None,
        }
    }

    /// The category of a normal transaction, `None` for a transfer.
    pub fn category(&self) -> Option<&CategoryName> {
        match &self.posting {
            Posting::Normal { category, .. } => Some(category),
            Posting::Transfer { .. } => None,
        }
    }

    /// The `(from, to)` accounts of a transfer, `None` for a normal transaction.
    pub fn transfer_accounts(&self) -> Option<(&Account, &Account)> {
        match &self.posting {
            Posting::Transfer { from, to } => Some((from, to)),
            Posting::Normal { .. } => None,
        }
    }

    /// The order in which the ledger is presented: newest date first, and for the same date the
    /// highest id first. Ids are unique, so this is a strict total order over a ledger.
    pub fn ledger_order(a: &Transaction, b: &Transaction) -> Ordering {
        b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_ledger_order() {
        let mut list = vec![
            Transaction::new(date(2024, 3, 1), -100, Account::new("A")).with_id(5),
            Transaction::new(date(2024, 3, 2), -100, Account::new("A")).with_id(1),
            Transaction::new(date(2024, 3, 1), -100, Account::new("A")).with_id(9),
        ];
        list.sort_by(Transaction::ledger_order);
        let ids: Vec<i64> = list.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![1, 9, 5]);
    }

    #[test]
    fn test_transfer_has_no_category() {
        let t = Transaction::new_transfer(
            date(2024, 1, 5),
            -3000,
            Account::new("A"),
            Account::new("B"),
        )
        .with_category(CategoryName::new("Food", "Lunch"));
        assert!(t.is_transfer());
        assert_eq!(t.amount(), 3000);
        assert!(t.category().is_none());
        assert!(t.account().is_none());
        let (from, to) = t.transfer_accounts().unwrap();
        assert_eq!(from.name(), "A");
        assert_eq!(to.name(), "B");
    }

    #[test]
    fn test_normal_keeps_sign_and_category() {
        let t = Transaction::new(date(2024, 1, 5), -3000, Account::new("A"))
            .with_category(CategoryName::new("Food", "Lunch"));
        assert!(!t.is_transfer());
        assert_eq!(t.amount(), -3000);
        assert_eq!(t.category().unwrap().minor(), "Lunch");
        assert!(t.transfer_accounts().is_none());
    }
}
