//! Read-only views. Each returns flat rows so that they can be written as JSON or CSV.

use crate::commands::{plural, Out};
use crate::model::{Account, Bucket, Posting, Transaction, Yen};
use crate::{Error, Session};
use chrono::NaiveDate;
use serde::Serialize;

/// One ledger entry. For a transfer, `account` is the source and `to_account` the destination.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct TransactionRow {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: i64,
    pub account: Account,
    pub to_account: Option<Account>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: String,
    pub memo: String,
}

impl From<&Transaction> for TransactionRow {
    fn from(t: &Transaction) -> Self {
        let (account, to_account, category) = match t.posting() {
            Posting::Normal { account, category } => (account.clone(), None, Some(category)),
            Posting::Transfer { from, to } => (from.clone(), Some(to.clone()), None),
        };
        Self {
            id: t.id(),
            date: t.date(),
            amount: t.amount(),
            account,
            to_account,
            category: category.map(|c| c.major().to_string()),
            subcategory: category.map(|c| c.minor().to_string()),
            description: t.description().to_string(),
            memo: t.memo().to_string(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct AccountRow {
    pub account: Account,
    pub account_id: String,
    pub sub_account_id: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CategoryRow {
    pub bucket: Bucket,
    pub category: String,
    pub subcategory: String,
    pub category_id: i64,
    pub subcategory_id: i64,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct BalanceRow {
    pub account: Account,
    pub amount: i64,
    pub as_of: NaiveDate,
}

/// `amount` and `due_date` are empty when nothing is scheduled.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct WithdrawalRow {
    pub account: Account,
    pub amount: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub as_of: NaiveDate,
}

/// Lists the transactions of `year`/`month`, newest first. An empty month is not an error.
pub async fn list(
    session: &Session,
    year: i32,
    month: u32,
) -> anyhow::Result<Out<Vec<TransactionRow>>> {
    let transactions = match session.transactions(year, month).await {
        Ok(transactions) => transactions,
        Err(Error::DataDoesNotExist) => {
            return Ok(Out::new(
                format!("There are no transactions in {year}/{month:02}"),
                Vec::new(),
            ))
        }
        Err(e) => return Err(e.into()),
    };
    let rows: Vec<TransactionRow> = transactions.iter().map(TransactionRow::from).collect();
    let net: i64 = transactions
        .iter()
        .filter(|t| !t.is_transfer())
        .map(Transaction::amount)
        .sum();
    let message = format!(
        "Found {} in {year}/{month:02}, net {}",
        plural(rows.len(), "transaction", "transactions"),
        Yen::new(net)
    );
    Ok(Out::new(message, rows))
}

pub async fn accounts(session: &Session) -> anyhow::Result<Out<Vec<AccountRow>>> {
    let rows: Vec<AccountRow> = session
        .accounts()
        .await?
        .iter()
        .map(|(account, info)| AccountRow {
            account: account.clone(),
            account_id: info.account_id().to_string(),
            sub_account_id: info.sub_account_id().to_string(),
        })
        .collect();
    let message = format!("Found {}", plural(rows.len(), "account", "accounts"));
    Ok(Out::new(message, rows))
}

pub async fn categories(session: &Session) -> anyhow::Result<Out<Vec<CategoryRow>>> {
    let rows: Vec<CategoryRow> = session
        .categories()
        .await?
        .iter()
        .map(|(key, info)| CategoryRow {
            bucket: key.bucket(),
            category: key.name().major().to_string(),
            subcategory: key.name().minor().to_string(),
            category_id: info.major_id(),
            subcategory_id: info.minor_id(),
        })
        .collect();
    let message = format!("Found {}", plural(rows.len(), "category", "categories"));
    Ok(Out::new(message, rows))
}

pub async fn balance(session: &Session) -> anyhow::Result<Out<Vec<BalanceRow>>> {
    let rows: Vec<BalanceRow> = session
        .balances()
        .await?
        .into_iter()
        .map(|(account, entry)| BalanceRow {
            account,
            amount: entry.amount(),
            as_of: entry.as_of(),
        })
        .collect();
    let total: i64 = rows.iter().map(|row| row.amount).sum();
    let message = format!(
        "Found {}, {} in total",
        plural(rows.len(), "balance", "balances"),
        Yen::new(total)
    );
    Ok(Out::new(message, rows))
}

pub async fn withdrawal(session: &Session) -> anyhow::Result<Out<Vec<WithdrawalRow>>> {
    let rows: Vec<WithdrawalRow> = session
        .withdrawals()
        .await?
        .into_iter()
        .map(|(account, entry)| WithdrawalRow {
            account,
            amount: entry.amount(),
            due_date: entry.due_date(),
            as_of: entry.as_of(),
        })
        .collect();
    let scheduled: i64 = rows.iter().filter_map(|row| row.amount).sum();
    let message = format!(
        "Found {}, {} scheduled",
        plural(rows.len(), "card", "cards"),
        Yen::new(scheduled)
    );
    Ok(Out::new(message, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Reply;
    use crate::args::Format;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_list() {
        let env = TestEnv::new().await;
        let session = env.logged_in().await;
        let out = list(&session, 2024, 3).await.unwrap();
        let rows = out.structure().unwrap();
        assert_eq!(rows.len(), 4);
        assert!(out.message().starts_with("Found 4 transactions in 2024/03"));

        let transfer = rows.iter().find(|r| r.id == 103).unwrap();
        assert_eq!(transfer.to_account, Some(Account::with_sub_account("Card", "Gold")));
        assert_eq!(transfer.category, None);

        let groceries = rows.iter().find(|r| r.id == 101).unwrap();
        assert_eq!(groceries.category.as_deref(), Some("食費"));
        assert_eq!(groceries.subcategory.as_deref(), Some("食料品"));
    }

    #[tokio::test]
    async fn test_list_csv() {
        let env = TestEnv::new().await;
        let session = env.logged_in().await;
        let out = list(&session, 2024, 3).await.unwrap();
        let mut csv = Vec::new();
        out.write(&mut csv, Format::Csv).unwrap();
        let csv = String::from_utf8(csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("id,date,amount,account,to_account,category,subcategory,description,memo")
        );
        assert_eq!(lines.count(), 4);
        assert!(csv.contains("101,2024-03-05,-1280,Bank:Savings Account,,食費,食料品,スーパー,"));
    }

    #[tokio::test]
    async fn test_list_empty_month() {
        let env = TestEnv::new().await;
        env.site()
            .route("POST", "/cf/fetch", Reply::ok(r#"$(".list_body").empty();"#));
        let session = env.logged_in().await;
        let out = list(&session, 2024, 4).await.unwrap();
        assert_eq!(out.structure(), Some(&Vec::new()));
        assert_eq!(out.message(), "There are no transactions in 2024/04");
    }

    #[tokio::test]
    async fn test_list_bad_month() {
        let env = TestEnv::new().await;
        let session = env.logged_in().await;
        let err = list(&session, 2024, 13).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_accounts_and_categories() {
        let env = TestEnv::new().await;
        let session = env.logged_in().await;

        let out = accounts(&session).await.unwrap();
        assert_eq!(out.message(), "Found 3 accounts");
        let wallet = out
            .structure()
            .unwrap()
            .iter()
            .find(|r| r.account == Account::new("Wallet"))
            .unwrap();
        assert_eq!(wallet.sub_account_id, "sa-acc3");

        let out = categories(&session).await.unwrap();
        assert_eq!(out.message(), "Found 6 categories");
        let salary = &out.structure().unwrap()[0];
        assert_eq!(salary.bucket, Bucket::Income);
        assert_eq!(salary.category_id, 1);
    }

    #[tokio::test]
    async fn test_balance_and_withdrawal() {
        let env = TestEnv::new().await;
        let session = env.logged_in().await;

        let out = balance(&session).await.unwrap();
        assert_eq!(out.message(), "Found 2 balances, ¥1,512,345 in total");

        let out = withdrawal(&session).await.unwrap();
        assert_eq!(out.message(), "Found 2 cards, ¥45,600 scheduled");
        let etc = out
            .structure()
            .unwrap()
            .iter()
            .find(|r| r.account == Account::with_sub_account("Card", "ETC"))
            .unwrap();
        assert_eq!(etc.amount, None);
        assert_eq!(etc.due_date, None);
    }
}
