//! Transaction business logic - buyer purchase requests and farmer decisions.
//!
//! Accepting a transaction is the one multi-entity write in the marketplace: in
//! a single database transaction the request flips to `Accepted`, every other
//! pending request for the same proposal is rejected, the proposal is closed to
//! new buyers and the batch for the accepted request is created.

use crate::{
    core::{batch, commodity, proposal, region},
    entities::{ProposalStatus, Transaction, TransactionStatus, batch as batch_entity, transaction},
    errors::{Error, Result, conflict_on_unique},
    services::Clock,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Buyer-supplied fields of a purchase request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub proposal_id: Uuid,
    pub region_id: Uuid,
    pub address: String,
}

/// Result of a farmer's decision.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub transaction: transaction::Model,
    /// Created when the transaction was accepted
    pub batch: Option<batch_entity::Model>,
    /// Other pending requests rejected by the acceptance
    pub rejected_siblings: u64,
}

/// Optional filters for [`list_transactions`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub buyer_id: Option<Uuid>,
    pub proposal_id: Option<Uuid>,
    pub status: Option<TransactionStatus>,
}

/// One page of transactions
#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub items: Vec<transaction::Model>,
    pub total_items: u64,
    /// 1-based
    pub page: u64,
    pub per_page: u64,
}

pub async fn get_transaction_by_id<C>(
    db: &C,
    transaction_id: Uuid,
) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists transactions matching `filter`, newest first. `page` is 1-based.
pub async fn list_transactions(
    db: &DatabaseConnection,
    filter: TransactionFilter,
    page: u64,
    per_page: u64,
) -> Result<TransactionPage> {
    if per_page == 0 {
        return Err(Error::bad_request("per_page must be at least 1"));
    }
    let page = page.max(1);

    let condition = Condition::all()
        .add_option(filter.buyer_id.map(|id| transaction::Column::BuyerId.eq(id)))
        .add_option(
            filter
                .proposal_id
                .map(|id| transaction::Column::ProposalId.eq(id)),
        )
        .add_option(filter.status.map(|s| transaction::Column::Status.eq(s)));

    let paginator = Transaction::find()
        .filter(condition)
        .order_by_desc(transaction::Column::CreatedAt)
        .order_by_asc(transaction::Column::Id)
        .paginate(db, per_page);

    let total_items = paginator.num_items().await?;
    let items = paginator.fetch_page(page - 1).await?;

    Ok(TransactionPage {
        items,
        total_items,
        page,
        per_page,
    })
}

/// Places a purchase request against an approved, available proposal.
///
/// The total price is fixed here as `price_per_kg * estimated_total_harvest`
/// and never recomputed.
///
/// # Errors
/// - `BadRequest` for an empty address
/// - `NotFound` if the proposal is missing or not approved, or the commodity
///   or region is missing
/// - `Conflict` if the proposal is no longer available
#[instrument(skip(db, clock, input), fields(proposal_id = %input.proposal_id))]
pub async fn create_transaction(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    buyer_id: Uuid,
    input: TransactionInput,
) -> Result<transaction::Model> {
    if input.address.trim().is_empty() {
        return Err(Error::bad_request("Delivery address cannot be empty"));
    }

    let proposal = proposal::get_proposal_by_id(db, input.proposal_id)
        .await?
        .filter(|p| p.status == ProposalStatus::Approved)
        .ok_or_else(|| Error::not_found("Approved proposal", input.proposal_id))?;

    let commodity = commodity::get_commodity_by_id(db, proposal.commodity_id)
        .await?
        .ok_or_else(|| Error::not_found("Commodity", proposal.commodity_id))?;

    if !proposal.is_available {
        return Err(Error::conflict(format!(
            "Proposal '{}' is no longer available",
            proposal.name
        )));
    }

    region::get_region_by_id(db, input.region_id)
        .await?
        .ok_or_else(|| Error::not_found("Region", input.region_id))?;

    let total_price = commodity.price_per_kg * proposal.estimated_total_harvest;
    let now = clock.now();

    let created = transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        buyer_id: Set(buyer_id),
        proposal_id: Set(proposal.id),
        region_id: Set(input.region_id),
        address: Set(input.address.trim().to_string()),
        status: Set(TransactionStatus::Pending),
        total_price: Set(total_price),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    info!(transaction_id = %created.id, %buyer_id, total_price, "transaction requested");
    Ok(created)
}

/// Rejects every pending transaction of `proposal_id` except `except_id`.
/// Returns the number rejected.
pub async fn reject_pending_by_proposal_id<C>(
    db: &C,
    proposal_id: Uuid,
    except_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = Transaction::update_many()
        .col_expr(
            transaction::Column::Status,
            Expr::value(TransactionStatus::Rejected),
        )
        .col_expr(transaction::Column::UpdatedAt, Expr::value(now))
        .filter(transaction::Column::ProposalId.eq(proposal_id))
        .filter(transaction::Column::Id.ne(except_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Moves a pending transaction to `target`. Fails with `Conflict` when another
/// writer got there first.
async fn transition_from_pending<C>(
    db: &C,
    transaction_id: Uuid,
    target: TransactionStatus,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Transaction::update_many()
        .col_expr(transaction::Column::Status, Expr::value(target))
        .col_expr(transaction::Column::UpdatedAt, Expr::value(now))
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
        .exec(db)
        .await
        .map_err(|e| conflict_on_unique(e, "Proposal already has an accepted transaction"))?;

    if result.rows_affected == 0 {
        return Err(Error::conflict("Transaction has already been decided"));
    }
    Ok(())
}

/// The farmer accepts or rejects a pending transaction on one of their
/// commodities.
///
/// # Errors
/// - `BadRequest` if `decision` is neither `Accepted` nor `Rejected`
/// - `NotFound` if the transaction or the records above it are missing
/// - `Forbidden` if the commodity belongs to another farmer
/// - `Conflict` if the transaction was already decided, or on acceptance when
///   the proposal was superseded or already has an accepted transaction
#[instrument(skip(db, clock))]
pub async fn make_decision(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    transaction_id: Uuid,
    farmer_id: Uuid,
    decision: TransactionStatus,
) -> Result<DecisionOutcome> {
    if !matches!(
        decision,
        TransactionStatus::Accepted | TransactionStatus::Rejected
    ) {
        return Err(Error::bad_request(
            "A transaction can only be accepted or rejected",
        ));
    }

    let existing = get_transaction_by_id(db, transaction_id)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))?;
    let proposal = proposal::get_proposal_any_version(db, existing.proposal_id)
        .await?
        .ok_or_else(|| Error::not_found("Proposal", existing.proposal_id))?;
    let commodity = commodity::get_commodity_any_version(db, proposal.commodity_id)
        .await?
        .ok_or_else(|| Error::not_found("Commodity", proposal.commodity_id))?;

    if commodity.farmer_id != farmer_id {
        return Err(Error::forbidden("Transaction is for another farmer's commodity"));
    }
    if existing.status != TransactionStatus::Pending {
        return Err(Error::conflict(format!(
            "Transaction has already been {:?}",
            existing.status
        )));
    }

    let now = clock.now();

    if decision == TransactionStatus::Rejected {
        transition_from_pending(db, transaction_id, decision, now).await?;
        info!(%transaction_id, "transaction rejected");
        let transaction = get_transaction_by_id(db, transaction_id)
            .await?
            .ok_or_else(|| Error::not_found("Transaction", transaction_id))?;
        return Ok(DecisionOutcome {
            transaction,
            batch: None,
            rejected_siblings: 0,
        });
    }

    if proposal.deleted_at.is_some() {
        return Err(Error::conflict(
            "Proposal was changed after this transaction was placed",
        ));
    }
    if !proposal.is_available {
        return Err(Error::conflict(format!(
            "Proposal '{}' is no longer available",
            proposal.name
        )));
    }

    let txn = db.begin().await?;

    transition_from_pending(&txn, transaction_id, decision, now).await?;
    let rejected_siblings =
        reject_pending_by_proposal_id(&txn, proposal.id, transaction_id, now).await?;
    proposal::mark_unavailable(&txn, proposal.id, now).await?;
    let batch = batch::create_batch_in(&txn, clock, transaction_id).await?;
    let transaction = get_transaction_by_id(&txn, transaction_id)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))?;

    txn.commit().await?;

    debug!(rejected_siblings, "sibling requests rejected");
    info!(%transaction_id, batch_id = %batch.id, "transaction accepted");
    Ok(DecisionOutcome {
        transaction,
        batch: Some(batch),
        rejected_siblings,
    })
}

/// The buyer withdraws their own pending request.
///
/// # Errors
/// - `NotFound` if the transaction does not exist
/// - `Forbidden` if it belongs to another buyer
/// - `Conflict` if it is no longer pending
#[instrument(skip(db, clock))]
pub async fn cancel_transaction(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    transaction_id: Uuid,
    buyer_id: Uuid,
) -> Result<transaction::Model> {
    let existing = get_transaction_by_id(db, transaction_id)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))?;

    if existing.buyer_id != buyer_id {
        return Err(Error::forbidden("Transaction belongs to another buyer"));
    }

    transition_from_pending(db, transaction_id, TransactionStatus::Cancelled, clock.now())
        .await?;
    info!(%transaction_id, "transaction cancelled");

    get_transaction_by_id(db, transaction_id)
        .await?
        .ok_or_else(|| Error::not_found("Transaction", transaction_id))
}
