//! Types that represent the core data model, such as `Transaction`, `Account` and the category
//! tree keys.

mod account;
mod category;
mod holdings;
mod transaction;
mod yen;

pub use account::{Account, AccountInfo, AccountMap};
pub use category::{Bucket, CategoryInfo, CategoryKey, CategoryMap, CategoryName, UNCATEGORIZED};
pub use holdings::{BalanceEntry, Balances, WithdrawalEntry, Withdrawals};
pub use transaction::{Posting, Transaction};
pub use yen::Yen;
