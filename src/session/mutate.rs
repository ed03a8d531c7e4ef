//! Creates, edits and deletes ledger transactions.

use super::{Session, CF_CREATE, CF_ITEM, CF_UPDATE, CF_UPDATE_JS};
use crate::api::Params;
use crate::error::{Error, Result};
use crate::model::{Account, Bucket, Posting, Transaction};
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y/%m/%d";
const SAVE_COMMIT: &str = "保存する";
const TRANSFER_COMMIT: &str = "設定を保存";

/// The other side of a transfer set up with `Session::transfer`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TransferPartner {
    /// Money moved to or from `Account` with no matching entry on the other side.
    Account(Account),
    /// Money moved to or from another existing transaction, which is linked as the counterpart.
    Transaction { id: i64, account: Account },
}

impl TransferPartner {
    pub fn account(&self) -> &Account {
        match self {
            TransferPartner::Account(account) => account,
            TransferPartner::Transaction { account, .. } => account,
        }
    }

    pub fn transaction_id(&self) -> Option<i64> {
        match self {
            TransferPartner::Account(_) => None,
            TransferPartner::Transaction { id, .. } => Some(*id),
        }
    }
}

impl TryFrom<&Transaction> for TransferPartner {
    type Error = Error;

    /// Only normal transactions can be the counterpart of a transfer.
    fn try_from(partner: &Transaction) -> Result<Self> {
        match partner.posting() {
            Posting::Normal { account, .. } => Ok(TransferPartner::Transaction {
                id: partner.id(),
                account: account.clone(),
            }),
            Posting::Transfer { .. } => Err(Error::InvalidArgument(format!(
                "Transaction {} is already a transfer and cannot be a transfer partner",
                partner.id()
            ))),
        }
    }
}

impl Session {
    /// Creates `transaction` on the site. Its id is ignored; the site assigns a new one.
    pub async fn save(&self, transaction: &Transaction) -> Result<()> {
        let mut form = Params::new()
            .with(
                "user_asset_act[updated_at]",
                transaction.date().format(DATE_FORMAT),
            )
            .with("user_asset_act[recurring_flag]", 0)
            .with("user_asset_act[amount]", transaction.amount().abs())
            .with("user_asset_act[content]", transaction.description())
            .with("commit", SAVE_COMMIT);
        match transaction.posting() {
            Posting::Transfer { from, to } => {
                let from = self.account_info(from).await?;
                let to = self.account_info(to).await?;
                form.push("user_asset_act[is_transfer]", 1);
                form.push("user_asset_act[sub_account_id_hash_from]", from.sub_account_id());
                form.push("user_asset_act[sub_account_id_hash_to]", to.sub_account_id());
            }
            Posting::Normal { account, category } => {
                let account = self.account_info(account).await?;
                let bucket = Bucket::from_amount(transaction.amount());
                let category = self.category_info(bucket, category).await?;
                form.push("user_asset_act[is_transfer]", 0);
                form.push("user_asset_act[is_income]", u8::from(bucket.is_income()));
                form.push("user_asset_act[sub_account_id_hash]", account.sub_account_id());
                form.push("user_asset_act[large_category_id]", category.major_id());
                form.push("user_asset_act[middle_category_id]", category.minor_id());
            }
        }
        self.http_post(CF_CREATE, &form).await?;
        info!("Saved a transaction of {} on {}", transaction.amount(), transaction.date());
        Ok(())
    }

    /// Overwrites the transaction with `transaction.id()` with the fields of `transaction`.
    /// Transfers cannot be edited this way; use `transfer` or `disable_transfer`.
    pub async fn update(&self, transaction: &Transaction) -> Result<()> {
        let Posting::Normal { account, category } = transaction.posting() else {
            return Err(Error::InvalidArgument(format!(
                "Transaction {} is a transfer and cannot be updated",
                transaction.id()
            )));
        };
        let account = self.account_info(account).await?;
        let bucket = Bucket::from_amount(transaction.amount());
        let category = self.category_info(bucket, category).await?;
        let params = Params::new()
            .with("user_asset_act[id]", transaction.id())
            .with("user_asset_act[table_name]", "user_asset_act")
            .with(
                "user_asset_act[updated_at]",
                transaction.date().format(DATE_FORMAT),
            )
            .with("user_asset_act[amount]", transaction.amount())
            .with("user_asset_act[content]", transaction.description())
            .with("user_asset_act[memo]", transaction.memo())
            .with("user_asset_act[is_income]", u8::from(bucket.is_income()))
            .with("user_asset_act[large_category_id]", category.major_id())
            .with("user_asset_act[middle_category_id]", category.minor_id())
            .with("user_asset_act[sub_account_id_hash]", account.sub_account_id());
        self.http_put(CF_UPDATE, &params).await?;
        info!("Updated transaction {}", transaction.id());
        Ok(())
    }

    /// Turns the transaction `id` into a transfer with `partner` on the other side.
    pub async fn transfer(&self, id: i64, partner: &TransferPartner) -> Result<()> {
        let info = self.account_info(partner.account()).await?;
        let mut form = Params::new()
            .with("_method", "put")
            .with("user_asset_act[id]", id)
            .with("user_asset_act[partner_account_id_hash]", info.account_id())
            .with(
                "user_asset_act[partner_sub_account_id_hash]",
                info.sub_account_id(),
            )
            .with("commit", TRANSFER_COMMIT);
        if let Some(partner_id) = partner.transaction_id() {
            form.push("user_asset_act[partner_act_id]", partner_id);
        }
        self.enable_transfer(id).await?;
        self.http_post(CF_UPDATE, &form).await?;
        info!("Transaction {id} is now a transfer with {}", partner.account());
        Ok(())
    }

    /// Marks the transaction `id` as a transfer.
    pub async fn enable_transfer(&self, id: i64) -> Result<()> {
        debug!("Enabling transfer on transaction {id}");
        self.change_type(id, "enable_transfer").await
    }

    /// Makes the transaction `id` a normal income or expense again.
    pub async fn disable_transfer(&self, id: i64) -> Result<()> {
        debug!("Disabling transfer on transaction {id}");
        self.change_type(id, "disable_transfer").await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.http_delete(&format!("{CF_ITEM}{id}")).await?;
        info!("Deleted transaction {id}");
        Ok(())
    }

    async fn change_type(&self, id: i64, change_type: &str) -> Result<()> {
        let params = Params::new()
            .with("change_type", change_type)
            .with("id", id);
        self.http_put(CF_UPDATE_JS, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TestTransport;
    use crate::model::CategoryName;
    use crate::session::tests::logged_in;
    use chrono::NaiveDate;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn bank() -> Account {
        Account::with_sub_account("Bank", "Savings Account")
    }

    fn groceries() -> Transaction {
        Transaction::new(date(3, 5), -1280, bank())
            .with_id(101)
            .with_category(CategoryName::new("食費", "食料品"))
            .with_description("スーパー")
            .with_memo("weekly")
    }

    #[tokio::test]
    async fn test_save_expense() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        session.save(&groceries()).await.unwrap();

        let form = site.last("POST", CF_CREATE).unwrap().params;
        assert_eq!(form.get("user_asset_act[updated_at]"), Some("2024/03/05"));
        assert_eq!(form.get("user_asset_act[recurring_flag]"), Some("0"));
        assert_eq!(form.get("user_asset_act[amount]"), Some("1280"));
        assert_eq!(form.get("user_asset_act[content]"), Some("スーパー"));
        assert_eq!(form.get("user_asset_act[is_transfer]"), Some("0"));
        assert_eq!(form.get("user_asset_act[is_income]"), Some("0"));
        assert_eq!(form.get("user_asset_act[sub_account_id_hash]"), Some("sa-1a"));
        assert_eq!(form.get("user_asset_act[large_category_id]"), Some("11"));
        assert_eq!(form.get("user_asset_act[middle_category_id]"), Some("41"));
        assert_eq!(form.get("commit"), Some("保存する"));
    }

    #[tokio::test]
    async fn test_save_income() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        let salary = Transaction::new(date(3, 25), 250_000, bank())
            .with_category(CategoryName::new("収入", "給与"));
        session.save(&salary).await.unwrap();

        let form = site.last("POST", CF_CREATE).unwrap().params;
        assert_eq!(form.get("user_asset_act[amount]"), Some("250000"));
        assert_eq!(form.get("user_asset_act[is_income]"), Some("1"));
        assert_eq!(form.get("user_asset_act[large_category_id]"), Some("1"));
        assert_eq!(form.get("user_asset_act[middle_category_id]"), Some("1"));
    }

    #[tokio::test]
    async fn test_save_transfer() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        let transfer = Transaction::new_transfer(
            date(3, 10),
            -50_000,
            bank(),
            Account::with_sub_account("Card", "Gold"),
        );
        session.save(&transfer).await.unwrap();

        let form = site.last("POST", CF_CREATE).unwrap().params;
        assert_eq!(form.get("user_asset_act[amount]"), Some("50000"));
        assert_eq!(form.get("user_asset_act[is_transfer]"), Some("1"));
        assert_eq!(form.get("user_asset_act[sub_account_id_hash_from]"), Some("sa-1a"));
        assert_eq!(form.get("user_asset_act[sub_account_id_hash_to]"), Some("sa-2a"));
        assert_eq!(form.get("user_asset_act[large_category_id]"), None);
        // Transfers never need the category list.
        assert_eq!(site.count("GET", "/cf"), 0);
    }

    #[tokio::test]
    async fn test_save_with_category_of_other_bucket() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        // An expense filed under an income category.
        let tx = Transaction::new(date(3, 5), -100, bank())
            .with_category(CategoryName::new("収入", "給与"));
        let err = session.save(&tx).await.unwrap_err();
        assert!(matches!(err, Error::UnknownCategory(_)));
        assert_eq!(site.count("POST", CF_CREATE), 0);
    }

    #[tokio::test]
    async fn test_save_unknown_account() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        let tx = Transaction::new(date(3, 5), -100, Account::new("Hidden"))
            .with_category(CategoryName::new("食費", "外食"));
        let err = session.save(&tx).await.unwrap_err();
        assert!(matches!(err, Error::UnknownAccount(a) if a == Account::new("Hidden")));
        assert_eq!(site.count("POST", CF_CREATE), 0);
    }

    #[tokio::test]
    async fn test_save_checks_account_before_category() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        let tx = Transaction::new(date(3, 5), -100, Account::new("Hidden"))
            .with_category(CategoryName::new("趣味", "本"));
        let err = session.save(&tx).await.unwrap_err();
        assert!(matches!(err, Error::UnknownAccount(_)));
        assert_eq!(site.count("GET", "/cf"), 0);
    }

    #[tokio::test]
    async fn test_update() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        session.update(&groceries()).await.unwrap();

        let params = site.last("PUT", CF_UPDATE).unwrap().params;
        assert_eq!(params.get("user_asset_act[id]"), Some("101"));
        assert_eq!(params.get("user_asset_act[table_name]"), Some("user_asset_act"));
        assert_eq!(params.get("user_asset_act[amount]"), Some("-1280"));
        assert_eq!(params.get("user_asset_act[memo]"), Some("weekly"));
        assert_eq!(params.get("user_asset_act[is_income]"), Some("0"));
        assert_eq!(params.get("user_asset_act[sub_account_id_hash]"), Some("sa-1a"));
    }

    #[tokio::test]
    async fn test_update_transfer_is_rejected_before_any_request() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        let before = site.requests().len();
        let transfer =
            Transaction::new_transfer(date(3, 10), 1, bank(), Account::new("Wallet")).with_id(7);
        let err = session.update(&transfer).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(site.requests().len(), before);
    }

    #[tokio::test]
    async fn test_transfer_to_transaction() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        let partner = Transaction::new(date(3, 10), 50_000, Account::new("Wallet")).with_id(105);
        let partner = TransferPartner::try_from(&partner).unwrap();
        session.transfer(103, &partner).await.unwrap();

        let requests = site.requests();
        let enable = requests
            .iter()
            .position(|r| r.method == "PUT" && r.url.path() == CF_UPDATE_JS)
            .unwrap();
        let link = requests
            .iter()
            .position(|r| r.method == "POST" && r.url.path() == CF_UPDATE)
            .unwrap();
        assert!(enable < link);
        assert_eq!(requests[enable].params.get("change_type"), Some("enable_transfer"));
        assert_eq!(requests[enable].params.get("id"), Some("103"));

        let form = &requests[link].params;
        assert_eq!(form.get("_method"), Some("put"));
        assert_eq!(form.get("user_asset_act[id]"), Some("103"));
        assert_eq!(form.get("user_asset_act[partner_account_id_hash]"), Some("acc3"));
        assert_eq!(
            form.get("user_asset_act[partner_sub_account_id_hash]"),
            Some("sa-acc3")
        );
        assert_eq!(form.get("user_asset_act[partner_act_id]"), Some("105"));
        assert_eq!(form.get("commit"), Some("設定を保存"));
    }

    #[tokio::test]
    async fn test_transfer_to_account() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        let partner = TransferPartner::Account(Account::with_sub_account("Card", "Gold"));
        session.transfer(103, &partner).await.unwrap();

        let form = site.last("POST", CF_UPDATE).unwrap().params;
        assert_eq!(form.get("user_asset_act[partner_account_id_hash]"), Some("acc2"));
        assert_eq!(form.get("user_asset_act[partner_act_id]"), None);
    }

    #[test]
    fn test_transfer_cannot_partner_a_transfer() {
        let transfer = Transaction::new_transfer(date(3, 10), 1, bank(), Account::new("Wallet"));
        assert!(matches!(
            TransferPartner::try_from(&transfer),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_disable_transfer() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        session.disable_transfer(103).await.unwrap();
        let params = site.last("PUT", CF_UPDATE_JS).unwrap().params;
        assert_eq!(params.get("change_type"), Some("disable_transfer"));
        assert_eq!(params.get("id"), Some("103"));
    }

    #[tokio::test]
    async fn test_delete() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        session.delete(101).await.unwrap();
        assert_eq!(site.count("DELETE", "/cf/101"), 1);
    }
}
