//! Command handlers for the mf CLI.
//!
//! Every handler except `init` works on a logged-in `Session`, which `connect` provides.

mod init;
mod mutate;
mod refresh;
mod view;

use crate::api::Mode;
use crate::args::{Format, LoginArgs};
use crate::model::Transaction;
use crate::{Config, Error, Session};
use anyhow::{anyhow, Context};
use serde::Serialize;
use std::fmt::Debug;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

pub use init::init;
pub use mutate::{add, delete, disable_transfer, enable_transfer, transfer, update};
pub use refresh::refresh;
pub use view::{
    accounts, balance, categories, list, withdrawal, AccountRow, BalanceRow, CategoryRow,
    TransactionRow, WithdrawalRow,
};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

impl<R> Out<Vec<R>>
where
    R: Serialize + Clone + Debug,
{
    /// Writes the rows of a view to `w` as a JSON array or as CSV with a header line.
    pub fn write<W: Write>(&self, mut w: W, format: Format) -> anyhow::Result<()> {
        let rows = self.structure().map(Vec::as_slice).unwrap_or_default();
        match format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut w, rows).context("Unable to write JSON")?;
                writeln!(w)?;
            }
            Format::Csv => {
                let mut writer = csv::Writer::from_writer(w);
                for row in rows {
                    writer.serialize(row).context("Unable to write CSV")?;
                }
                writer.flush()?;
            }
        }
        Ok(())
    }
}

/// Opens a session for `config` and logs in. When the site asks for a one-time passcode, the one
/// in `login` is used, or the user is prompted for it on stdin.
pub async fn connect(config: &Config, mode: Mode, login: &LoginArgs) -> anyhow::Result<Session> {
    let password = login
        .password()
        .context("No password was given. Set MF_PASSWORD or pass --password")?;
    let mut session = Session::open(config, mode, password)?;
    log_in(&mut session, login).await?;
    Ok(session)
}

async fn log_in(session: &mut Session, login: &LoginArgs) -> anyhow::Result<()> {
    match session.login().await {
        Ok(()) => Ok(()),
        Err(Error::NeedOtp) => {
            let code = match login.otp() {
                Some(code) => code.to_string(),
                None => prompt_otp().await?,
            };
            session
                .submit_otp(&code)
                .await
                .context("The one-time passcode was not accepted")
        }
        Err(e) => Err(anyhow!(e).context("Unable to log in")),
    }
}

async fn prompt_otp() -> anyhow::Result<String> {
    eprint!("Enter the one-time passcode sent to your email: ");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Unable to read the one-time passcode")?;
    Ok(line.trim().to_string())
}

/// Finds transaction `id` in the ledger of `year`/`month`.
async fn find_transaction(
    session: &Session,
    year: i32,
    month: u32,
    id: i64,
) -> anyhow::Result<Transaction> {
    let ledger = match session.transactions(year, month).await {
        Ok(ledger) => ledger,
        Err(Error::DataDoesNotExist) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    ledger
        .into_iter()
        .find(|t| t.id() == id)
        .with_context(|| format!("There is no transaction {id} in {year}/{month:02}"))
}

/// "1 category", "2 categories".
fn plural(count: usize, one: &str, many: &str) -> String {
    format!("{count} {}", if count == 1 { one } else { many })
}
