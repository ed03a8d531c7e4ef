//! These structs provide the CLI interface for the mf CLI.

use crate::model::{Account, Yen};
use crate::RefreshOptions;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// mf: A command-line client for the Money Forward ME household ledger.
///
/// This program logs in to your Money Forward ME account, asks your linked banks and cards to
/// re-sync, and lets you list, add, edit and delete ledger entries from the command line. It can
/// also show account balances and scheduled card withdrawals.
///
/// Your password is never stored. Provide it with MF_PASSWORD or --password. If the site emails
/// you a one-time passcode, pass it with --otp or type it when prompted.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration file.
    ///
    /// This is the first command you should run. Decide what directory you want to store the
    /// configuration in and pass it as --mf-home. By default it will be $HOME/mf.
    Init(InitArgs),
    /// Ask every linked institution that has not synced recently to re-sync, and wait for the
    /// site to finish.
    Refresh(RefreshArgs),
    /// List the transactions of one month, newest first.
    List(ListArgs),
    /// Show the enabled accounts and sub-accounts.
    Accounts(ViewArgs),
    /// Show the income and expense categories.
    Categories(ViewArgs),
    /// Show the total balance of each account.
    Balance(ViewArgs),
    /// Show the scheduled withdrawal of each card.
    Withdrawal(ViewArgs),
    /// Add a transaction, or a transfer when --to is given.
    Add(Box<AddArgs>),
    /// Change fields of an existing transaction.
    Update(Box<UpdateArgs>),
    /// Delete a transaction.
    Delete(IdArgs),
    /// Turn a transaction into a transfer with another account or transaction.
    Transfer(TransferArgs),
    /// Mark a transaction as a transfer.
    EnableTransfer(IdArgs),
    /// Make a transfer a normal income or expense again.
    DisableTransfer(IdArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the mf configuration is held. Defaults to ~/mf
    #[arg(long, env = "MF_HOME", default_value_t = default_mf_home())]
    mf_home: DisplayPath,

    #[clap(flatten)]
    login: LoginArgs,
}

impl Common {
    pub fn new(log_level: LevelFilter, mf_home: PathBuf, login: LoginArgs) -> Self {
        Self {
            log_level,
            mf_home: mf_home.into(),
            login,
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn mf_home(&self) -> &DisplayPath {
        &self.mf_home
    }

    pub fn login(&self) -> &LoginArgs {
        &self.login
    }
}

/// What is needed to log in, besides the email stored in the configuration.
#[derive(Debug, Default, Parser, Clone)]
pub struct LoginArgs {
    /// The Money Forward ME password.
    #[arg(long, global = true, env = "MF_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// The one-time passcode from the login email. You are prompted for it when the site asks
    /// for one and this is not given.
    #[arg(long, global = true)]
    otp: Option<String>,
}

impl LoginArgs {
    pub fn new(password: Option<String>, otp: Option<String>) -> Self {
        Self { password, otp }
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn otp(&self) -> Option<&str> {
        self.otp.as_deref()
    }
}

/// (Not shown): Args for the `mf init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The email address you log in to Money Forward ME with.
    #[arg(long)]
    email: String,
}

impl InitArgs {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

/// (Not shown): Args for the `mf refresh` command. Anything not given comes from the config file.
#[derive(Debug, Default, Parser, Clone)]
pub struct RefreshArgs {
    /// Seconds between two checks of whether the site is still syncing.
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Give up after waiting this many seconds.
    #[arg(long)]
    max_wait: Option<u64>,

    /// Only re-sync institutions last synced more than this many seconds ago.
    #[arg(long)]
    staleness: Option<u64>,
}

impl RefreshArgs {
    pub fn new(poll_interval: Option<u64>, max_wait: Option<u64>, staleness: Option<u64>) -> Self {
        Self {
            poll_interval,
            max_wait,
            staleness,
        }
    }

    /// `configured` with the values given on the command line applied over it.
    pub fn options(&self, configured: RefreshOptions) -> RefreshOptions {
        RefreshOptions {
            poll_interval: self
                .poll_interval
                .map_or(configured.poll_interval, Duration::from_secs),
            max_wait: self
                .max_wait
                .map_or(configured.max_wait, Duration::from_secs),
            staleness: self
                .staleness
                .map_or(configured.staleness, Duration::from_secs),
        }
    }
}

/// How views are written to stdout.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    #[default]
    Json,
    Csv,
}

serde_plain::derive_display_from_serialize!(Format);
serde_plain::derive_fromstr_from_deserialize!(Format);

/// (Not shown): Args for the read-only views.
#[derive(Debug, Default, Parser, Clone)]
pub struct ViewArgs {
    /// The output format: "json" or "csv".
    #[arg(long, default_value_t = Format::Json)]
    format: Format,
}

impl ViewArgs {
    pub fn new(format: Format) -> Self {
        Self { format }
    }

    pub fn format(&self) -> Format {
        self.format
    }
}

/// (Not shown): Args for the `mf list` command.
#[derive(Debug, Parser, Clone)]
pub struct ListArgs {
    #[arg(long)]
    year: i32,

    /// 1 to 12.
    #[arg(long)]
    month: u32,

    #[clap(flatten)]
    view: ViewArgs,
}

impl ListArgs {
    pub fn new(year: i32, month: u32, format: Format) -> Self {
        Self {
            year,
            month,
            view: ViewArgs::new(format),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn format(&self) -> Format {
        self.view.format()
    }
}

/// (Not shown): Args for the `mf add` command.
#[derive(Debug, Parser, Clone)]
pub struct AddArgs {
    /// The date, e.g. 2024-03-05.
    #[arg(long)]
    date: NaiveDate,

    /// The amount in yen. Negative for an expense, positive for income. For a transfer, the
    /// amount moved.
    #[arg(long, allow_hyphen_values = true)]
    amount: Yen,

    /// The account, written `Account` or `Account:Sub-account`.
    #[arg(long)]
    account: Account,

    /// Makes this a transfer from --account to this account.
    #[arg(long, conflicts_with_all = ["category", "subcategory"])]
    to: Option<Account>,

    /// The major category. Defaults to 未分類.
    #[arg(long, requires = "subcategory")]
    category: Option<String>,

    /// The minor category.
    #[arg(long, requires = "category")]
    subcategory: Option<String>,

    #[arg(long, default_value = "")]
    description: String,
}

impl AddArgs {
    pub fn new(date: NaiveDate, amount: Yen, account: Account) -> Self {
        Self {
            date,
            amount,
            account,
            to: None,
            category: None,
            subcategory: None,
            description: String::new(),
        }
    }

    pub fn with_to(mut self, to: Account) -> Self {
        self.to = Some(to);
        self
    }

    pub fn with_category(mut self, major: impl Into<String>, minor: impl Into<String>) -> Self {
        self.category = Some(major.into());
        self.subcategory = Some(minor.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn amount(&self) -> Yen {
        self.amount
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn to(&self) -> Option<&Account> {
        self.to.as_ref()
    }

    /// The `(major, minor)` category, when given.
    pub fn category(&self) -> Option<(&str, &str)> {
        self.category.as_deref().zip(self.subcategory.as_deref())
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// (Not shown): Args for the `mf update` command. The transaction is looked up in the ledger of
/// --year/--month, and every field not given keeps its current value.
#[derive(Debug, Parser, Clone)]
pub struct UpdateArgs {
    /// The id of the transaction.
    #[arg(long)]
    id: i64,

    /// The year of the ledger month holding the transaction.
    #[arg(long)]
    year: i32,

    /// The ledger month holding the transaction.
    #[arg(long)]
    month: u32,

    #[arg(long)]
    date: Option<NaiveDate>,

    #[arg(long, allow_hyphen_values = true)]
    amount: Option<Yen>,

    /// Written `Account` or `Account:Sub-account`.
    #[arg(long)]
    account: Option<Account>,

    #[arg(long, requires = "subcategory")]
    category: Option<String>,

    #[arg(long, requires = "category")]
    subcategory: Option<String>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    memo: Option<String>,
}

impl UpdateArgs {
    pub fn new(id: i64, year: i32, month: u32) -> Self {
        Self {
            id,
            year,
            month,
            date: None,
            amount: None,
            account: None,
            category: None,
            subcategory: None,
            description: None,
            memo: None,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_amount(mut self, amount: Yen) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    pub fn with_category(mut self, major: impl Into<String>, minor: impl Into<String>) -> Self {
        self.category = Some(major.into());
        self.subcategory = Some(minor.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn amount(&self) -> Option<Yen> {
        self.amount
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn category(&self) -> Option<(&str, &str)> {
        self.category.as_deref().zip(self.subcategory.as_deref())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }
}

/// (Not shown): Args for commands that act on a single transaction.
#[derive(Debug, Parser, Clone)]
pub struct IdArgs {
    /// The id of the transaction.
    #[arg(long)]
    id: i64,
}

impl IdArgs {
    pub fn new(id: i64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> i64 {
        self.id
    }
}

/// (Not shown): Args for the `mf transfer` command. Exactly one of --partner-id and
/// --partner-account is needed.
#[derive(Debug, Parser, Clone)]
pub struct TransferArgs {
    /// The id of the transaction to turn into a transfer.
    #[arg(long)]
    id: i64,

    /// The id of the transaction on the other side. It is looked up in the ledger of
    /// --year/--month.
    #[arg(
        long,
        conflicts_with = "partner_account",
        required_unless_present = "partner_account",
        requires_all = ["year", "month"]
    )]
    partner_id: Option<i64>,

    /// The account on the other side, written `Account` or `Account:Sub-account`.
    #[arg(long)]
    partner_account: Option<Account>,

    #[arg(long)]
    year: Option<i32>,

    #[arg(long)]
    month: Option<u32>,
}

impl TransferArgs {
    /// A transfer to `account` with no counterpart transaction.
    pub fn to_account(id: i64, account: Account) -> Self {
        Self {
            id,
            partner_id: None,
            partner_account: Some(account),
            year: None,
            month: None,
        }
    }

    /// A transfer linked to the transaction `partner_id` in the ledger of `year`/`month`.
    pub fn to_transaction(id: i64, partner_id: i64, year: i32, month: u32) -> Self {
        Self {
            id,
            partner_id: Some(partner_id),
            partner_account: None,
            year: Some(year),
            month: Some(month),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn partner_id(&self) -> Option<i64> {
        self.partner_id
    }

    pub fn partner_account(&self) -> Option<&Account> {
        self.partner_account.as_ref()
    }

    /// The ledger month to look the partner transaction up in.
    pub fn month(&self) -> Option<(i32, u32)> {
        self.year.zip(self.month)
    }
}

fn default_mf_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("mf"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --mf-home or MF_HOME instead of relying on the default mf home \
                directory. If you continue using the program right now, you may have problems!",
            );
            PathBuf::from("mf")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
