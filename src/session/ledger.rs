//! Lists a month of the household ledger.
//!
//! The ledger endpoint answers with a script that replaces the rows of the ledger table. The rows
//! are a JavaScript string literal inside that script, so they are decoded before being parsed as
//! HTML.

use super::{Session, CF_FETCH};
use crate::api::Params;
use crate::error::{Error, Result};
use crate::html::{clean, selector, Document, ElementExt};
use crate::model::{Account, CategoryName, Posting, Transaction};
use chrono::NaiveDate;
use regex::Regex;
use scraper::ElementRef;
use std::sync::OnceLock;
use tracing::debug;

const ROW_ID_PREFIX: &str = "js-transaction-";
const VOIDED_MARKER: &str = "icon-ban-circle";
const TRANSFER_MARKER: &str = "振替";
const TRANSFER_FROM: &str = "から";
const TRANSFER_TO: &str = "への振替";
const ACCOUNT_CELL: &str = "td.calc[style]";
const TRANSFER_DESTINATION: &str = "div.transfer_account_box";

impl Session {
    /// The transactions of `month` in `year`, newest first. Transactions on the same day are
    /// ordered by descending id. Fails with `Error::DataDoesNotExist` when the site has nothing
    /// for the month.
    pub async fn transactions(&self, year: i32, month: u32) -> Result<Vec<Transaction>> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidArgument(format!(
                "Month must be between 1 and 12, got {month}"
            )));
        }
        let form = Params::new()
            .with("from", format!("{year}/{month}/1"))
            .with("service_id", "")
            .with("account_id_hash", "");
        let script = self.http_post(CF_FETCH, &form).await?;
        let transactions = parse_ledger(&script, year)?;
        debug!(
            "Read {} transactions for {year}-{month:02}",
            transactions.len()
        );
        Ok(transactions)
    }
}

fn append_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\$\("\.list_body"\)\.append\((.*?)\);"#)
            .expect("hardcoded regex should be valid")
    })
}

/// Parses the script returned by the ledger endpoint. Dates on the page have no year, so `year` is
/// used for all of them.
pub(crate) fn parse_ledger(script: &str, year: i32) -> Result<Vec<Transaction>> {
    let literal = append_re()
        .captures(script)
        .and_then(|c| c.get(1))
        .ok_or(Error::DataDoesNotExist)?
        .as_str();
    // Backslashes left after decoding are noise from the site's own escaping.
    let markup = decode_js_string(literal)?.replace('\\', "");

    let doc = Document::parse_rows(&markup);
    let mut transactions = Vec::new();
    for row in doc.select_all("tr")? {
        if row.html().contains(VOIDED_MARKER) {
            continue;
        }
        transactions.push(parse_row(&row, year)?);
    }
    transactions.sort_by(Transaction::ledger_order);
    Ok(transactions)
}

fn parse_row(row: &ElementRef<'_>, year: i32) -> Result<Transaction> {
    let row_id = row.require_attr("id")?;
    let id = row_id
        .strip_prefix(ROW_ID_PREFIX)
        .unwrap_or(row_id)
        .parse::<i64>()
        .map_err(|_| Error::scrape(format!("Unexpected transaction row id '{row_id}'")))?;
    let cell_text = |css: &str| -> Result<String> {
        Ok(clean(&row.require(css)?.text_content()))
    };

    let date = parse_date(&cell_text("td.date")?, year)?;
    let amount_text = cell_text("td.amount")?;
    let amount = parse_amount(&amount_text)?;
    let major = cell_text("td.lctg")?;
    let minor = cell_text("td.mctg")?;
    let description = cell_text("td.content")?;
    let memo = cell_text("td.memo")?;

    let cell = row.require(ACCOUNT_CELL)?;
    let title = cell.require_attr("title")?;
    let select = selector("select")?;

    let transaction = if amount_text.contains(TRANSFER_MARKER) {
        let (from_label, to_label) = cell.split_off(TRANSFER_DESTINATION, &[&select])?;
        let (from_label, to_label) = (clean(&from_label), clean(&to_label));
        let (from_title, to_title) = title.split_once(TRANSFER_FROM).ok_or_else(|| {
            Error::scrape(format!("Unexpected transfer description '{title}'"))
        })?;
        let from_sub = from_title.replacen(&from_label, "", 1);
        let to_sub = to_title.replacen(&to_label, "", 1).replace(TRANSFER_TO, "");
        Transaction::new_transfer(
            date,
            amount,
            Account::from_labels(from_label, from_sub.trim()),
            Account::from_labels(to_label, to_sub.trim()),
        )
    } else {
        let label = clean(&cell.text_without(&[&select]));
        let sub = title.replacen(&label, "", 1);
        Transaction::new(date, amount, Account::from_labels(label, sub.trim()))
            .with_category(CategoryName::new(major, minor))
    };
    Ok(transaction
        .with_id(id)
        .with_description(description)
        .with_memo(memo))
}

/// Reads the leading `MM/DD` of a date cell like `03/05(火)`.
fn parse_date(text: &str, year: i32) -> Result<NaiveDate> {
    let unexpected = || Error::scrape(format!("Unexpected transaction date '{text}'"));
    let month = text.get(0..2).and_then(|s| s.parse().ok()).ok_or_else(unexpected)?;
    let day = text.get(3..5).and_then(|s| s.parse().ok()).ok_or_else(unexpected)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(unexpected)
}

/// Reads an amount like `-1,280`, ignoring everything but digits and the minus sign.
fn parse_amount(text: &str) -> Result<i64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    digits
        .parse()
        .map_err(|_| Error::scrape(format!("Unexpected transaction amount '{text}'")))
}

/// Decodes a single or double quoted JavaScript string literal.
fn decode_js_string(literal: &str) -> Result<String> {
    let literal = literal.trim();
    let invalid = || Error::scrape("The ledger rows are not a string literal");
    let quote = literal.chars().next().ok_or_else(invalid)?;
    if !matches!(quote, '"' | '\'') || literal.len() < 2 || !literal.ends_with(quote) {
        return Err(invalid());
    }
    let body = &literal[1..literal.len() - 1];

    let mut out = String::with_capacity(body.len());
    // UTF-16 code units from `\u` escapes, held until a surrogate pair is complete.
    let mut units: Vec<u16> = Vec::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            flush_units(&mut units, &mut out);
            out.push(c);
            continue;
        }
        let escaped = chars.next().ok_or_else(invalid)?;
        if escaped == 'u' {
            let hex: String = chars.by_ref().take(4).collect();
            if hex.len() != 4 {
                return Err(invalid());
            }
            let unit = u16::from_str_radix(&hex, 16).map_err(|_| invalid())?;
            units.push(unit);
            continue;
        }
        flush_units(&mut units, &mut out);
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                let byte = u8::from_str_radix(&hex, 16).map_err(|_| invalid())?;
                out.push(char::from(byte));
            }
            // `\"`, `\'`, `\\`, `\/` and any other escaped character stand for themselves.
            other => out.push(other),
        }
    }
    flush_units(&mut units, &mut out);
    Ok(out)
}

fn flush_units(units: &mut Vec<u16>, out: &mut String) {
    out.extend(
        char::decode_utf16(units.drain(..)).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
    );
}
