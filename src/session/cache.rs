//! The account and category lists. Each is fetched at most once per session: concurrent callers
//! share one fetch, and a failed fetch is not remembered so the next caller tries again.

use super::{Session, CF, GROUPS};
use crate::error::{Error, Result};
use crate::html::{clean, squash, Document, ElementExt};
use crate::model::{
    Account, AccountInfo, AccountMap, Bucket, CategoryInfo, CategoryKey, CategoryMap, CategoryName,
};
use scraper::ElementRef;
use tracing::debug;

const GROUP_EDIT_LINK: &str = ".edit > a";
const GROUP_PARENT: &str = ".js-sub-account-group-parent";
const GROUP_ID_PREFIX: &str = "js-sub_account_split_";
const INCOME_MENU: &str = "ul.dropdown-menu.main_menu.plus";
const EXPENSE_MENU: &str = "ul.dropdown-menu.main_menu.minus";
const MAJOR_ITEM: &str = "li.dropdown-submenu";
const MAJOR_LINK: &str = "a.l_c_name";
const MINOR_LINK: &str = "a.m_c_name";

impl Session {
    /// The accounts enabled in the user's account group, keyed by display name.
    pub async fn accounts(&self) -> Result<&AccountMap> {
        self.accounts
            .get_or_try_init(|| self.fetch_accounts())
            .await
    }

    /// Every category, keyed by bucket and name.
    pub async fn categories(&self) -> Result<&CategoryMap> {
        self.categories
            .get_or_try_init(|| self.fetch_categories())
            .await
    }

    /// Looks up the site's identifiers of `account`.
    pub(super) async fn account_info(&self, account: &Account) -> Result<&AccountInfo> {
        self.accounts()
            .await?
            .get(account)
            .ok_or_else(|| Error::UnknownAccount(account.clone()))
    }

    /// Looks up the site's identifiers of the category `name` in `bucket`.
    pub(super) async fn category_info(
        &self,
        bucket: Bucket,
        name: &CategoryName,
    ) -> Result<CategoryInfo> {
        let key = CategoryKey::new(bucket, name.clone());
        self.categories()
            .await?
            .get(&key)
            .copied()
            .ok_or(Error::UnknownCategory(key))
    }

    async fn fetch_accounts(&self) -> Result<AccountMap> {
        debug!("Fetching the account list");
        let groups = self.http_get(GROUPS).await?;
        let edit = group_edit_link(&groups)?;
        let page = self.http_get(&edit).await?;
        let accounts = parse_accounts(&page)?;
        debug!("Found {} enabled accounts", accounts.len());
        Ok(accounts)
    }

    async fn fetch_categories(&self) -> Result<CategoryMap> {
        debug!("Fetching the category list");
        let page = self.http_get(CF).await?;
        let categories = parse_categories(&page)?;
        debug!("Found {} categories", categories.len());
        Ok(categories)
    }
}

fn group_edit_link(body: &str) -> Result<String> {
    let doc = Document::parse(body);
    Ok(doc.require(GROUP_EDIT_LINK)?.require_attr("href")?.to_string())
}

/// Reads the account group edit page. An account with sub-accounts contributes one entry per
/// checked sub-account. An account without any contributes itself if it is checked.
pub(crate) fn parse_accounts(body: &str) -> Result<AccountMap> {
    let doc = Document::parse(body);
    let mut accounts = AccountMap::new();
    for group in doc.select_all(GROUP_PARENT)? {
        let element_id = group.require_attr("id")?;
        let account_id = element_id
            .strip_prefix(GROUP_ID_PREFIX)
            .unwrap_or(element_id);
        let name = clean(&group.next_sibling_text());
        let subs = doc.select_with_class("*", account_id)?;
        if subs.is_empty() {
            if group.has_attr("checked") {
                let sub_account_id = group.require_attr("value")?;
                accounts.insert(
                    Account::new(&name),
                    AccountInfo::new(account_id, sub_account_id),
                );
            }
            continue;
        }
        for sub in subs.iter().filter(|s| s.has_attr("checked")) {
            accounts.insert(
                Account::with_sub_account(&name, squash(&sub.next_sibling_text())),
                AccountInfo::new(account_id, sub.require_attr("value")?),
            );
        }
    }
    Ok(accounts)
}

/// Reads the income and expense category menus of the ledger page.
pub(crate) fn parse_categories(body: &str) -> Result<CategoryMap> {
    let doc = Document::parse(body);
    let mut categories = CategoryMap::new();
    for (css, bucket) in [(INCOME_MENU, Bucket::Income), (EXPENSE_MENU, Bucket::Expense)] {
        let menu = doc.require(css)?;
        for major in menu.select_all(MAJOR_ITEM)? {
            let major_link = major.require(MAJOR_LINK)?;
            let major_name = clean(&major_link.text_content());
            let major_id = category_id(&major_link)?;
            for minor in major.select_all(MINOR_LINK)? {
                categories.insert(
                    CategoryKey::new(
                        bucket,
                        CategoryName::new(&major_name, clean(&minor.text_content())),
                    ),
                    CategoryInfo::new(major_id, category_id(&minor)?),
                );
            }
        }
    }
    Ok(categories)
}

fn category_id(link: &ElementRef<'_>) -> Result<i64> {
    let id = link.require_attr("id")?;
    id.parse()
        .map_err(|_| Error::scrape(format!("Category id '{id}' is not a number")))
}
