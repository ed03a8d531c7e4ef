//! Commands that change the ledger.

use crate::args::{AddArgs, TransferArgs, UpdateArgs};
use crate::commands::{find_transaction, Out};
use crate::model::{CategoryName, Transaction, Yen};
use crate::{Session, TransferPartner};
use anyhow::bail;

/// Adds a transaction, or a transfer when `args` names a destination account.
pub async fn add(session: &Session, args: &AddArgs) -> anyhow::Result<Out<Transaction>> {
    let amount = args.amount().value();
    let account = args.account().clone();
    let transaction = match (args.to(), args.category()) {
        (Some(to), _) => Transaction::new_transfer(args.date(), amount, account, to.clone()),
        (None, Some((major, minor))) => Transaction::new(args.date(), amount, account)
            .with_category(CategoryName::new(major, minor)),
        (None, None) => Transaction::new(args.date(), amount, account),
    }
    .with_description(args.description());

    session.save(&transaction).await?;
    let message = format!("Added {} on {}", Yen::new(amount), args.date());
    Ok(Out::new(message, transaction))
}

/// Applies the fields given in `args` to an existing transaction and keeps the rest.
pub async fn update(session: &Session, args: &UpdateArgs) -> anyhow::Result<Out<Transaction>> {
    let current = find_transaction(session, args.year(), args.month(), args.id()).await?;
    let (Some(account), Some(category)) = (current.account(), current.category()) else {
        bail!(
            "Transaction {} is a transfer. Run disable-transfer before editing it",
            current.id()
        )
    };
    let category = match args.category() {
        Some((major, minor)) => CategoryName::new(major, minor),
        None => category.clone(),
    };
    let updated = Transaction::new(
        args.date().unwrap_or(current.date()),
        args.amount().map_or(current.amount(), |amount| amount.value()),
        args.account().unwrap_or(account).clone(),
    )
    .with_id(current.id())
    .with_category(category)
    .with_description(args.description().unwrap_or(current.description()))
    .with_memo(args.memo().unwrap_or(current.memo()));

    session.update(&updated).await?;
    Ok(Out::new(
        format!("Updated transaction {}", updated.id()),
        updated,
    ))
}

pub async fn delete(session: &Session, id: i64) -> anyhow::Result<Out<()>> {
    session.delete(id).await?;
    Ok(format!("Deleted transaction {id}").into())
}

/// Links a transaction to a partner account, or to a partner transaction looked up by id.
pub async fn transfer(session: &Session, args: &TransferArgs) -> anyhow::Result<Out<()>> {
    let partner = match (args.partner_account(), args.partner_id(), args.month()) {
        (Some(account), _, _) => TransferPartner::Account(account.clone()),
        (None, Some(partner_id), Some((year, month))) => {
            let partner = find_transaction(session, year, month, partner_id).await?;
            TransferPartner::try_from(&partner)?
        }
        _ => bail!("Give either a partner account, or a partner id with its year and month"),
    };
    session.transfer(args.id(), &partner).await?;
    Ok(format!(
        "Transaction {} is now a transfer with {}",
        args.id(),
        partner.account()
    )
    .into())
}

pub async fn enable_transfer(session: &Session, id: i64) -> anyhow::Result<Out<()>> {
    session.enable_transfer(id).await?;
    Ok(format!("Transaction {id} is now a transfer").into())
}

pub async fn disable_transfer(session: &Session, id: i64) -> anyhow::Result<Out<()>> {
    session.disable_transfer(id).await?;
    Ok(format!("Transaction {id} is no longer a transfer").into())
}
