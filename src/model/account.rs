use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Separates the top-level account name from the sub-account name in the string form.
const SEPARATOR: char = ':';

/// Identifies an account the way the site labels it: a top-level account (e.g. a bank) and,
/// optionally, one of its sub-accounts (e.g. a specific card or deposit).
///
/// The string form is `Top` or `Top:Sub`, which is also how it is serialized.
///
/// ```
/// # use mf_sync::model::Account;
/// let a: Account = "Bank:Savings".parse().unwrap();
/// assert_eq!(a.name(), "Bank");
/// assert_eq!(a.sub_account(), Some("Savings"));
/// assert_eq!(a.to_string(), "Bank:Savings");
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Account {
    name: String,
    sub_account: Option<String>,
}

impl Account {
    /// A top-level account without a sub-account.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sub_account: None,
        }
    }

    /// A sub-account of the top-level account `name`.
    pub fn with_sub_account(name: impl Into<String>, sub_account: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sub_account: Some(sub_account.into()),
        }
    }

    /// Builds an account from a label pair as scraped from a page, where an empty sub-account
    /// label means there is no sub-account.
    pub(crate) fn from_labels(name: impl Into<String>, sub_account: impl Into<String>) -> Self {
        let sub_account = sub_account.into();
        if sub_account.is_empty() {
            Self::new(name)
        } else {
            Self::with_sub_account(name, sub_account)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sub_account(&self) -> Option<&str> {
        self.sub_account.as_deref()
    }
}

impl Display for Account {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.sub_account {
            Some(sub) => write!(f, "{}{SEPARATOR}{sub}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl FromStr for Account {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once(SEPARATOR) {
            Some((name, sub)) => Self::with_sub_account(name, sub),
            None => Self::new(s),
        })
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Account {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        // Infallible
        Ok(Account::from_str(&s).unwrap_or_else(|never| match never {}))
    }
}

/// The opaque server-side identifiers that an `Account` resolves to.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountInfo {
    account_id: String,
    sub_account_id: String,
}

impl AccountInfo {
    pub fn new(account_id: impl Into<String>, sub_account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            sub_account_id: sub_account_id.into(),
        }
    }

    /// The identifier of the top-level account, shared by all of its sub-accounts.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn sub_account_id(&self) -> &str {
        &self.sub_account_id
    }
}

/// Every enabled account of the logged-in user, keyed by its label.
pub type AccountMap = BTreeMap<Account, AccountInfo>;
