//! Batch business logic - one growing cycle per accepted transaction.
//!
//! A batch is created `Planting` inside the transaction-acceptance write and
//! leaves that state exactly once: `Cancel` by the farmer, or `Harvest` when its
//! harvest is approved.

use crate::{
    core::{commodity, proposal, sequence, transaction},
    entities::{
        Batch, BatchStatus, TransactionStatus, batch, commodity as commodity_entity,
        proposal as proposal_entity, transaction as transaction_entity,
    },
    errors::{Error, Result, conflict_on_unique},
    services::Clock,
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, Value, prelude::*, sea_query::Expr};
use tracing::{info, instrument};

/// The records above a batch, resolved by ID including superseded versions,
/// since the batch keeps pointing at the versions it was created from.
#[derive(Debug, Clone)]
pub struct BatchLineage {
    pub transaction: transaction_entity::Model,
    pub proposal: proposal_entity::Model,
    pub commodity: commodity_entity::Model,
}

impl BatchLineage {
    /// The farmer who owns the batch.
    #[must_use]
    pub fn farmer_id(&self) -> Uuid {
        self.commodity.farmer_id
    }

    /// Fails with `Forbidden` unless `farmer_id` owns the batch.
    pub fn ensure_owner(&self, farmer_id: Uuid) -> Result<()> {
        if self.farmer_id() == farmer_id {
            Ok(())
        } else {
            Err(Error::forbidden("Batch belongs to another farmer"))
        }
    }
}

pub async fn get_batch_by_id<C>(db: &C, batch_id: Uuid) -> Result<Option<batch::Model>>
where
    C: ConnectionTrait,
{
    Batch::find_by_id(batch_id).one(db).await.map_err(Into::into)
}

pub async fn get_batch_by_transaction_id<C>(
    db: &C,
    transaction_id: Uuid,
) -> Result<Option<batch::Model>>
where
    C: ConnectionTrait,
{
    Batch::find()
        .filter(batch::Column::TransactionId.eq(transaction_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists the batches of a transaction, oldest first.
pub async fn list_batches_by_transaction(
    db: &DatabaseConnection,
    transaction_id: Uuid,
) -> Result<Vec<batch::Model>> {
    Batch::find()
        .filter(batch::Column::TransactionId.eq(transaction_id))
        .order_by_asc(batch::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Resolves transaction, proposal and commodity of a batch.
pub async fn load_lineage<C>(db: &C, batch: &batch::Model) -> Result<BatchLineage>
where
    C: ConnectionTrait,
{
    let transaction = transaction::get_transaction_by_id(db, batch.transaction_id)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", batch.transaction_id))?;
    let proposal = proposal::get_proposal_any_version(db, transaction.proposal_id)
        .await?
        .ok_or_else(|| Error::not_found("Proposal", transaction.proposal_id))?;
    let commodity = commodity::get_commodity_any_version(db, proposal.commodity_id)
        .await?
        .ok_or_else(|| Error::not_found("Commodity", proposal.commodity_id))?;

    Ok(BatchLineage {
        transaction,
        proposal,
        commodity,
    })
}

/// Number of batches already named `"<proposal_name> - <n>"`, ignoring case.
///
/// The prefix is compared literally, so `%` or `_` in a proposal name match
/// only themselves.
async fn count_batches_named<C>(db: &C, proposal_name: &str) -> Result<u64>
where
    C: ConnectionTrait,
{
    let prefix = format!("{} - ", proposal_name.trim());
    let prefix_len = prefix.chars().count();

    let names: Vec<String> = Batch::find()
        .select_only()
        .column(batch::Column::Name)
        .filter(Expr::cust_with_values(
            "lower(substr(name, 1, ?)) = lower(?)",
            [Value::from(prefix_len as i64), Value::from(prefix)],
        ))
        .into_tuple()
        .all(db)
        .await?;

    let count = names
        .iter()
        .map(|name| name.chars().skip(prefix_len).collect::<String>())
        .filter(|suffix| !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()))
        .count();
    Ok(count as u64)
}

/// Creates the batch for an accepted transaction on an existing connection or
/// database transaction.
///
/// The name is `"<proposal name> - <n>"` where `n` comes from a counter scoped to
/// the lowercased proposal name, seeded from the number of batches already
/// carrying that name. The estimated harvest date is `now` plus the commodity's
/// planting period.
///
/// # Errors
/// - `NotFound` if the transaction, its proposal or its commodity is missing
/// - `BadRequest` if the transaction is not accepted
/// - `Conflict` if the transaction already has a batch
pub async fn create_batch_in<C>(
    db: &C,
    clock: &dyn Clock,
    transaction_id: Uuid,
) -> Result<batch::Model>
where
    C: ConnectionTrait,
{
    let transaction = transaction::get_transaction_by_id(db, transaction_id)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))?;

    if transaction.status != TransactionStatus::Accepted {
        return Err(Error::bad_request(format!(
            "Transaction must be accepted before planting, it is {:?}",
            transaction.status
        )));
    }

    if get_batch_by_transaction_id(db, transaction_id).await?.is_some() {
        return Err(Error::conflict("Transaction already has a batch"));
    }

    let proposal = proposal::get_proposal_any_version(db, transaction.proposal_id)
        .await?
        .ok_or_else(|| Error::not_found("Proposal", transaction.proposal_id))?;
    let commodity = commodity::get_commodity_any_version(db, proposal.commodity_id)
        .await?
        .ok_or_else(|| Error::not_found("Commodity", proposal.commodity_id))?;

    let now = clock.now();
    let existing = count_batches_named(db, &proposal.name).await?;
    let sequence = sequence::reserve_next(
        db,
        &sequence::batch_name_scope(&proposal.name),
        existing,
        now,
    )
    .await?;

    let created = batch::ActiveModel {
        id: Set(Uuid::new_v4()),
        transaction_id: Set(transaction_id),
        name: Set(format!("{} - {sequence}", proposal.name)),
        estimated_harvest_date: Set(now + Duration::days(commodity.planting_period)),
        status: Set(BatchStatus::Planting),
        cancel_reason: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(|e| conflict_on_unique(e, "Transaction already has a batch"))?;

    info!(batch_id = %created.id, name = %created.name, %transaction_id, "batch created");
    Ok(created)
}

/// Creates the batch for an accepted transaction in its own database
/// transaction. See [`create_batch_in`].
pub async fn create_batch(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    transaction_id: Uuid,
) -> Result<batch::Model> {
    let txn = db.begin().await?;
    let created = create_batch_in(&txn, clock, transaction_id).await?;
    txn.commit().await?;
    Ok(created)
}

/// Cancels a planting batch on behalf of its farmer.
///
/// # Errors
/// - `BadRequest` for an empty reason or a batch that is no longer planting
/// - `NotFound` if the batch does not exist
/// - `Forbidden` if the batch belongs to another farmer
#[instrument(skip(db, clock, reason))]
pub async fn cancel_batch(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    batch_id: Uuid,
    farmer_id: Uuid,
    reason: &str,
) -> Result<batch::Model> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::bad_request("A cancel reason is required"));
    }

    let existing = get_batch_by_id(db, batch_id)
        .await?
        .ok_or_else(|| Error::not_found("Batch", batch_id))?;
    load_lineage(db, &existing).await?.ensure_owner(farmer_id)?;

    if existing.status != BatchStatus::Planting {
        return Err(Error::bad_request(format!(
            "Only planting batches can be cancelled, this one is {:?}",
            existing.status
        )));
    }

    let result = Batch::update_many()
        .col_expr(batch::Column::Status, Expr::value(BatchStatus::Cancel))
        .col_expr(batch::Column::CancelReason, Expr::value(Some(reason.to_string())))
        .col_expr(batch::Column::UpdatedAt, Expr::value(clock.now()))
        .filter(batch::Column::Id.eq(batch_id))
        .filter(batch::Column::Status.eq(BatchStatus::Planting))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::bad_request("Batch is no longer planting"));
    }

    info!(%batch_id, "batch cancelled");
    get_batch_by_id(db, batch_id)
        .await?
        .ok_or_else(|| Error::not_found("Batch", batch_id))
}

/// Moves a planting batch to `Harvest`. Runs inside the harvest approval write.
pub async fn mark_harvested<C>(db: &C, batch_id: Uuid, now: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Batch::update_many()
        .col_expr(batch::Column::Status, Expr::value(BatchStatus::Harvest))
        .col_expr(batch::Column::UpdatedAt, Expr::value(now))
        .filter(batch::Column::Id.eq(batch_id))
        .filter(batch::Column::Status.eq(BatchStatus::Planting))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::conflict(format!(
            "Batch {batch_id} is not planting and cannot be harvested"
        )));
    }
    Ok(())
}
