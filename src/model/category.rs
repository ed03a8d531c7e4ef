use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// The name the site gives to both category levels of an uncategorized transaction.
pub const UNCATEGORIZED: &str = "未分類";

/// Which side of the ledger a category belongs to. The site keeps separate category trees for
/// income and expenses, and the same names can appear in both.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Income,
    Expense,
}

serde_plain::derive_display_from_serialize!(Bucket);
serde_plain::derive_fromstr_from_deserialize!(Bucket);

impl Bucket {
    /// Positive amounts are income. Zero and negative amounts are expenses.
    pub fn from_amount(amount: i64) -> Self {
        if amount > 0 {
            Bucket::Income
        } else {
            Bucket::Expense
        }
    }

    pub fn is_income(self) -> bool {
        matches!(self, Bucket::Income)
    }
}

/// The major and minor category names of a transaction.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CategoryName {
    major: String,
    minor: String,
}

impl CategoryName {
    pub fn new(major: impl Into<String>, minor: impl Into<String>) -> Self {
        Self {
            major: major.into(),
            minor: minor.into(),
        }
    }

    pub fn major(&self) -> &str {
        &self.major
    }

    pub fn minor(&self) -> &str {
        &self.minor
    }
}

impl Default for CategoryName {
    fn default() -> Self {
        Self::new(UNCATEGORIZED, UNCATEGORIZED)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.major, self.minor)
    }
}

/// Identifies a category in one of the two category trees.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CategoryKey {
    bucket: Bucket,
    name: CategoryName,
}

impl CategoryKey {
    pub fn new(bucket: Bucket, name: CategoryName) -> Self {
        Self { bucket, name }
    }

    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    pub fn name(&self) -> &CategoryName {
        &self.name
    }
}

impl Display for CategoryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.bucket, self.name)
    }
}

/// The opaque server-side identifiers that a `CategoryKey` resolves to.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CategoryInfo {
    major_id: i64,
    minor_id: i64,
}

impl CategoryInfo {
    pub fn new(major_id: i64, minor_id: i64) -> Self {
        Self { major_id, minor_id }
    }

    pub fn major_id(&self) -> i64 {
        self.major_id
    }

    pub fn minor_id(&self) -> i64 {
        self.minor_id
    }
}

/// Every category of both trees, keyed by bucket and names.
pub type CategoryMap = BTreeMap<CategoryKey, CategoryInfo>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_bucket_from_amount() {
        assert_eq!(Bucket::from_amount(1), Bucket::Income);
        assert_eq!(Bucket::from_amount(0), Bucket::Expense);
        assert_eq!(Bucket::from_amount(-500), Bucket::Expense);
    }

    #[test]
    fn test_bucket_plain_strings() {
        assert_eq!(Bucket::Income.to_string(), "income");
        assert_eq!(Bucket::from_str("expense").unwrap(), Bucket::Expense);
        assert!(Bucket::from_str("plus").is_err());
    }

    #[test]
    fn test_same_names_in_both_buckets_are_distinct() {
        let name = CategoryName::new("Other", "Misc");
        let mut map = CategoryMap::new();
        map.insert(
            CategoryKey::new(Bucket::Income, name.clone()),
            CategoryInfo::new(1, 10),
        );
        map.insert(
            CategoryKey::new(Bucket::Expense, name.clone()),
            CategoryInfo::new(2, 20),
        );
        assert_eq!(map.len(), 2);
        let expense = map.get(&CategoryKey::new(Bucket::Expense, name)).unwrap();
        assert_eq!(expense.minor_id(), 20);
    }

    #[test]
    fn test_default_is_uncategorized() {
        let name = CategoryName::default();
        assert_eq!(name.major(), UNCATEGORIZED);
        assert_eq!(name.minor(), UNCATEGORIZED);
    }
}
