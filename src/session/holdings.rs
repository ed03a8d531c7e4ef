//! Scheduled card withdrawals and account balances, read from each account's detail page.

use super::{Session, ACCOUNT_DETAIL, ROOT};
use crate::error::{Error, Result};
use crate::html::{clean, Document, ElementExt};
use crate::model::{Account, BalanceEntry, Balances, WithdrawalEntry, Withdrawals};
use crate::utils::{jst_today, resolve_month_day};
use chrono::NaiveDate;
use futures::future::try_join_all;
use regex::Regex;
use scraper::ElementRef;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tracing::{debug, warn};

const DETAIL_TABLE: &str = ".table-bordered";
const DETAIL_TITLE: &str = ".show-title";
const HEADERS: &str = "thead tr th";
const ROWS: &str = "tbody tr";
const AMOUNT_COLUMN: usize = 3;
const WITHDRAWAL_HEADER: &str = "引き落とし予定額";
const BALANCE_HEADER: &str = "残高";
const OUTSIDE_GROUP: &str = "outside-group";
const UPDATED_MARKER: &str = "div.date";
const HIDDEN_UPDATED_MARKER: &str = "div.date-not-display-none";
const UPDATED_PREFIX: &str = "取得日時(";
const NO_VALUE: &str = "-";

/// The dashboard together with the detail page of every enabled account, keyed by account id.
struct DetailPages {
    dashboard: String,
    pages: Vec<(String, String)>,
}

impl Session {
    /// The upcoming withdrawal of every card that shows one, keyed by card and sub-card.
    pub async fn withdrawals(&self) -> Result<Withdrawals> {
        let pages = self.detail_pages().await?;
        parse_withdrawals(&pages, jst_today())
    }

    /// The total balance of every account that shows one, keyed by account name.
    pub async fn balances(&self) -> Result<Balances> {
        let pages = self.detail_pages().await?;
        parse_balances(&pages, jst_today())
    }

    async fn detail_pages(&self) -> Result<DetailPages> {
        let ids: BTreeSet<String> = self
            .accounts()
            .await?
            .values()
            .map(|info| info.account_id().to_string())
            .collect();
        let dashboard = self.http_get(ROOT).await?;
        debug!("Fetching {} account detail pages", ids.len());
        let pages = try_join_all(ids.into_iter().map(|id| async move {
            let body = self.http_get(&format!("{ACCOUNT_DETAIL}{id}")).await?;
            Ok::<_, Error>((id, body))
        }))
        .await?;
        Ok(DetailPages { dashboard, pages })
    }
}

fn parse_withdrawals(detail: &DetailPages, today: NaiveDate) -> Result<Withdrawals> {
    let dashboard = Document::parse(&detail.dashboard);
    let mut withdrawals = Withdrawals::new();
    for (id, body) in &detail.pages {
        let marker = match updated_marker(&dashboard, UPDATED_MARKER, id)? {
            Some(marker) => Some(marker),
            None => updated_marker(&dashboard, HIDDEN_UPDATED_MARKER, id)?,
        };
        let doc = Document::parse(body);
        let parts = detail_parts(&doc, id, marker, WITHDRAWAL_HEADER)?;
        let Some((table, title, marker)) = parts else {
            continue;
        };
        let as_of = parse_as_of(&marker, today)?;
        for row in table.select_all(ROWS)? {
            let cells = row_cells(&row)?;
            let sub_account = format!("{} {}", cells[1], cells[2]);
            let (amount, due_date) = parse_withdrawal(&cells[AMOUNT_COLUMN])?;
            withdrawals.insert(
                Account::with_sub_account(&title, sub_account.trim()),
                WithdrawalEntry::new(amount, due_date, as_of),
            );
        }
    }
    Ok(withdrawals)
}

/// A parenthesised suffix such as `(1234)` in an account title.
fn parenthesized_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^()]*\)").expect("hardcoded regex should be valid"))
}

fn parse_balances(detail: &DetailPages, today: NaiveDate) -> Result<Balances> {
    let dashboard = Document::parse(&detail.dashboard);
    let re = parenthesized_re();
    let mut balances = Balances::new();
    for (id, body) in &detail.pages {
        let marker = updated_marker(&dashboard, UPDATED_MARKER, id)?;
        let doc = Document::parse(body);
        let parts = detail_parts(&doc, id, marker, BALANCE_HEADER)?;
        let Some((table, title, marker)) = parts else {
            continue;
        };
        let as_of = parse_as_of(&marker, today)?;
        let mut total = 0;
        for row in table.select_all(ROWS)? {
            if row.has_class(OUTSIDE_GROUP) {
                continue;
            }
            let cells = row_cells(&row)?;
            if cells[AMOUNT_COLUMN] != NO_VALUE {
                total += parse_yen(&cells[AMOUNT_COLUMN])?;
            }
        }
        let name = re.replace_all(&title, "");
        balances.insert(Account::new(name.trim()), BalanceEntry::new(total, as_of));
    }
    Ok(balances)
}

/// The text of the "updated at" marker of account `id` on the dashboard.
fn updated_marker(dashboard: &Document, css: &str, id: &str) -> Result<Option<String>> {
    Ok(dashboard
        .select_with_class(css, id)?
        .first()
        .map(|e| clean(&e.text_content())))
}

/// The amount table and title of a detail page, along with the marker, when the page has all of
/// them and the amount column is headed `header`.
fn detail_parts<'a>(
    doc: &'a Document,
    id: &str,
    marker: Option<String>,
    header: &str,
) -> Result<Option<(ElementRef<'a>, String, String)>> {
    let (Some(table), Some(title), Some(marker)) = (
        doc.select_one(DETAIL_TABLE)?,
        doc.select_one(DETAIL_TITLE)?,
        marker,
    ) else {
        warn!("Skipping account {id}: no amount table, title or update marker");
        return Ok(None);
    };
    let headers = table.select_all(HEADERS)?;
    let column = headers
        .get(AMOUNT_COLUMN)
        .ok_or_else(|| Error::scrape("The account table has too few columns"))?;
    if clean(&column.text_content()) != header {
        debug!("Skipping account {id}: its table does not show {header}");
        return Ok(None);
    }
    Ok(Some((table, clean(&title.text_content()), marker)))
}

/// The cleaned text of the cells of a table row, which must have an amount column.
fn row_cells(row: &ElementRef<'_>) -> Result<Vec<String>> {
    let cells: Vec<String> = row
        .select_all("td")?
        .iter()
        .map(|td| clean(&td.text_content()))
        .collect();
    if cells.len() <= AMOUNT_COLUMN {
        return Err(Error::scrape("An account table row has too few cells"));
    }
    Ok(cells)
}

/// Reads the date of a marker like `取得日時(03/15 10:00)`.
fn parse_as_of(marker: &str, today: NaiveDate) -> Result<NaiveDate> {
    let unexpected = || Error::scrape(format!("Unexpected update marker '{marker}'"));
    let stripped = marker.replace(UPDATED_PREFIX, "");
    let date = stripped.split(' ').next().unwrap_or_default();
    let (month, day) = date.split_once('/').ok_or_else(unexpected)?;
    let month = month.parse().map_err(|_| unexpected())?;
    let day = day.parse().map_err(|_| unexpected())?;
    resolve_month_day(month, day, today).ok_or_else(unexpected)
}

/// Reads a withdrawal cell like `45,600円(2024/04/27)`. A lone `-` means nothing is scheduled.
fn parse_withdrawal(text: &str) -> Result<(Option<i64>, Option<NaiveDate>)> {
    if text == NO_VALUE {
        return Ok((None, None));
    }
    let unexpected = || Error::scrape(format!("Unexpected withdrawal '{text}'"));
    let (amount, due_date) = text.split_once('(').ok_or_else(unexpected)?;
    let due_date = NaiveDate::parse_from_str(due_date.trim_end_matches(')'), "%Y/%m/%d")
        .map_err(|_| unexpected())?;
    Ok((Some(parse_yen(amount)?), Some(due_date)))
}

/// Reads an amount like `1,200,000円`.
fn parse_yen(text: &str) -> Result<i64> {
    text.replace([',', '円'], "")
        .trim()
        .parse()
        .map_err(|_| Error::scrape(format!("Unexpected amount '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Reply, TestTransport};
    use crate::session::tests::logged_in;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn seed_pages(site: &TestTransport) -> DetailPages {
        logged_in(site).await.detail_pages().await.unwrap()
    }

    #[tokio::test]
    async fn test_detail_pages_fetches_each_account_once() {
        let site = TestTransport::default();
        let pages = seed_pages(&site).await;
        let ids: Vec<&str> = pages.pages.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["acc1", "acc2", "acc3"]);
        assert_eq!(site.count("GET", "/accounts/show/acc1"), 1);
        assert_eq!(site.count("GET", "/accounts/show/acc4"), 0);
    }

    #[tokio::test]
    async fn test_withdrawals() {
        let site = TestTransport::default();
        let pages = seed_pages(&site).await;
        let withdrawals = parse_withdrawals(&pages, date(2024, 3, 20)).unwrap();
        assert_eq!(withdrawals.len(), 2);

        // The card's marker is only in the hidden form on the dashboard.
        let gold = &withdrawals[&Account::with_sub_account("Card", "Gold ****1234")];
        assert_eq!(gold.amount(), Some(45_600));
        assert_eq!(gold.due_date(), Some(date(2024, 4, 27)));
        assert_eq!(gold.as_of(), date(2024, 3, 14));

        let etc = &withdrawals[&Account::with_sub_account("Card", "ETC")];
        assert_eq!(etc.amount(), None);
        assert_eq!(etc.due_date(), None);
    }

    #[tokio::test]
    async fn test_balances() {
        let site = TestTransport::default();
        let pages = seed_pages(&site).await;
        let balances = parse_balances(&pages, date(2024, 3, 20)).unwrap();
        // The card has no visible marker and no balance table.
        assert_eq!(balances.len(), 2);

        // Rows outside the group and rows without a value are left out of the total.
        let bank = &balances[&Account::new("Bank")];
        assert_eq!(bank.amount(), 1_500_000);
        assert_eq!(bank.as_of(), date(2024, 3, 15));

        // A marker later in the year than today belongs to last year.
        let wallet = &balances[&Account::new("Wallet")];
        assert_eq!(wallet.amount(), 12_345);
        assert_eq!(wallet.as_of(), date(2023, 12, 31));
    }

    #[tokio::test]
    async fn test_balances_through_session() {
        let site = TestTransport::default();
        let session = logged_in(&site).await;
        let balances = session.balances().await.unwrap();
        assert_eq!(balances[&Account::new("Bank")].amount(), 1_500_000);
    }

    #[tokio::test]
    async fn test_detail_page_failure_fails_the_whole_view() {
        let site = TestTransport::default();
        site.route("GET", "/accounts/show/acc2", Reply::status(500));
        let session = logged_in(&site).await;
        assert!(matches!(
            session.withdrawals().await,
            Err(Error::Connection(_))
        ));
    }

    #[test]
    fn test_parse_withdrawal() {
        assert_eq!(
            parse_withdrawal("45,600円(2024/04/27)").unwrap(),
            (Some(45_600), Some(date(2024, 4, 27)))
        );
        assert_eq!(parse_withdrawal("-").unwrap(), (None, None));
        assert!(parse_withdrawal("45,600円").is_err());
    }

    #[test]
    fn test_parse_as_of() {
        let today = date(2024, 1, 5);
        assert_eq!(
            parse_as_of("取得日時(01/05 09:00)", today).unwrap(),
            date(2024, 1, 5)
        );
        assert_eq!(
            parse_as_of("取得日時(12/30 09:00)", today).unwrap(),
            date(2023, 12, 30)
        );
        assert!(parse_as_of("取得日時()", today).is_err());
    }
}
