use anyhow::Result;
use clap::Parser;
use mf_sync::args::{Args, Command, Common, Format};
use mf_sync::commands::{self, Out};
use mf_sync::{Config, Mode, Session};
use serde::Serialize;
use std::fmt::Debug;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let common = args.common();

    // This allows for running the program without hitting the real site. When
    // MF_SYNC_IN_TEST_MODE is set and non-empty, then the mode will be Mode::Test, otherwise it
    // will be Mode::Live.
    let mode = Mode::from_env();

    // Route to appropriate command handler
    match args.command() {
        Command::Init(init_args) => {
            commands::init(common.mf_home().path(), init_args.email())
                .await?
                .print();
        }

        Command::Refresh(refresh_args) => {
            let (config, session) = open(common, mode).await?;
            let options = refresh_args.options(config.refresh_options());
            commands::refresh(&session, options).await?.print();
        }

        Command::List(list_args) => {
            let (_, session) = open(common, mode).await?;
            let out = commands::list(&session, list_args.year(), list_args.month()).await?;
            emit(out, list_args.format())?;
        }

        Command::Accounts(view) => {
            let (_, session) = open(common, mode).await?;
            emit(commands::accounts(&session).await?, view.format())?;
        }

        Command::Categories(view) => {
            let (_, session) = open(common, mode).await?;
            emit(commands::categories(&session).await?, view.format())?;
        }

        Command::Balance(view) => {
            let (_, session) = open(common, mode).await?;
            emit(commands::balance(&session).await?, view.format())?;
        }

        Command::Withdrawal(view) => {
            let (_, session) = open(common, mode).await?;
            emit(commands::withdrawal(&session).await?, view.format())?;
        }

        Command::Add(add_args) => {
            let (_, session) = open(common, mode).await?;
            commands::add(&session, add_args).await?.print();
        }

        Command::Update(update_args) => {
            let (_, session) = open(common, mode).await?;
            commands::update(&session, update_args).await?.print();
        }

        Command::Delete(id_args) => {
            let (_, session) = open(common, mode).await?;
            commands::delete(&session, id_args.id()).await?.print();
        }

        Command::Transfer(transfer_args) => {
            let (_, session) = open(common, mode).await?;
            commands::transfer(&session, transfer_args).await?.print();
        }

        Command::EnableTransfer(id_args) => {
            let (_, session) = open(common, mode).await?;
            commands::enable_transfer(&session, id_args.id())
                .await?
                .print();
        }

        Command::DisableTransfer(id_args) => {
            let (_, session) = open(common, mode).await?;
            commands::disable_transfer(&session, id_args.id())
                .await?
                .print();
        }
    }
    Ok(())
}

/// Loads the config from `--mf-home` and logs in.
async fn open(common: &Common, mode: Mode) -> Result<(Config, Session)> {
    let config = Config::load(common.mf_home().path()).await?;
    let session = commands::connect(&config, mode, common.login()).await?;
    Ok((config, session))
}

/// Prints the outcome of a view and writes its rows to stdout.
fn emit<R>(out: Out<Vec<R>>, format: Format) -> Result<()>
where
    R: Serialize + Clone + Debug,
{
    out.print();
    out.write(std::io::stdout().lock(), format)
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for the binary and library only.
            EnvFilter::new(format!(
                "{}={level},mf_sync={level}",
                env!("CARGO_CRATE_NAME")
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
