//! Proposal business logic - planting plans and their validation.
//!
//! A proposal starts `Pending` and unavailable. A validator approves it (which
//! opens it to buyers) or rejects it with a reason. Editing an approved proposal
//! does not touch the approved row: it is superseded by a new pending version,
//! because buyers may already hold references to it.

use crate::{
    core::commodity,
    entities::{Proposal, ProposalStatus, proposal},
    errors::{Error, Result, conflict_on_unique},
    services::Clock,
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Farmer-supplied proposal fields, used for both create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalInput {
    pub name: String,
    pub description: String,
    /// Expected yield in kilograms
    pub estimated_total_harvest: f64,
    /// Planted area in square meters
    pub planting_area: f64,
    pub address: String,
}

impl ProposalInput {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::bad_request("Proposal name cannot be empty"));
        }
        if !self.estimated_total_harvest.is_finite() || self.estimated_total_harvest <= 0.0 {
            return Err(Error::bad_request(format!(
                "Invalid estimated total harvest: {}",
                self.estimated_total_harvest
            )));
        }
        if !self.planting_area.is_finite() || self.planting_area <= 0.0 {
            return Err(Error::bad_request(format!(
                "Invalid planting area: {}",
                self.planting_area
            )));
        }
        if self.address.trim().is_empty() {
            return Err(Error::bad_request("Proposal address cannot be empty"));
        }
        Ok(())
    }
}

/// Finds a live proposal by ID.
pub async fn get_proposal_by_id<C>(db: &C, proposal_id: Uuid) -> Result<Option<proposal::Model>>
where
    C: ConnectionTrait,
{
    Proposal::find_by_id(proposal_id)
        .filter(proposal::Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a proposal by ID including superseded and deleted versions.
pub async fn get_proposal_any_version<C>(
    db: &C,
    proposal_id: Uuid,
) -> Result<Option<proposal::Model>>
where
    C: ConnectionTrait,
{
    Proposal::find_by_id(proposal_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists the live proposals of a commodity, newest first.
pub async fn list_proposals_by_commodity(
    db: &DatabaseConnection,
    commodity_id: Uuid,
) -> Result<Vec<proposal::Model>> {
    Proposal::find()
        .filter(proposal::Column::CommodityId.eq(commodity_id))
        .filter(proposal::Column::DeletedAt.is_null())
        .order_by_desc(proposal::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists the proposals buyers can currently transact against.
pub async fn list_available_proposals(db: &DatabaseConnection) -> Result<Vec<proposal::Model>> {
    Proposal::find()
        .filter(proposal::Column::Status.eq(ProposalStatus::Approved))
        .filter(proposal::Column::IsAvailable.eq(true))
        .filter(proposal::Column::DeletedAt.is_null())
        .order_by_asc(proposal::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn name_taken<C>(db: &C, commodity_id: Uuid, name: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let existing = Proposal::find()
        .filter(proposal::Column::CommodityId.eq(commodity_id))
        .filter(proposal::Column::Name.eq(name))
        .filter(proposal::Column::DeletedAt.is_null())
        .one(db)
        .await?;
    Ok(existing.is_some())
}

fn duplicate_name(name: &str) -> String {
    format!("Proposal '{name}' already exists for this commodity")
}

/// Submits a new proposal for one of the farmer's commodities.
///
/// # Errors
/// - `BadRequest` for invalid fields
/// - `NotFound` if the farmer has no live commodity with this ID
/// - `Conflict` if the commodity already has a live proposal with this name
#[instrument(skip(db, clock, input), fields(name = %input.name))]
pub async fn create_proposal(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    farmer_id: Uuid,
    commodity_id: Uuid,
    input: ProposalInput,
) -> Result<proposal::Model> {
    input.validate()?;

    commodity::get_commodity_for_farmer(db, commodity_id, farmer_id)
        .await?
        .ok_or_else(|| Error::not_found("Commodity", commodity_id))?;

    let name = input.name.trim().to_string();
    if name_taken(db, commodity_id, &name).await? {
        return Err(Error::conflict(duplicate_name(&name)));
    }

    let now = clock.now();
    let created = proposal::ActiveModel {
        id: Set(Uuid::new_v4()),
        previous_version_id: Set(None),
        validator_id: Set(None),
        commodity_id: Set(commodity_id),
        name: Set(name.clone()),
        description: Set(input.description),
        status: Set(ProposalStatus::Pending),
        reject_reason: Set(None),
        estimated_total_harvest: Set(input.estimated_total_harvest),
        planting_area: Set(input.planting_area),
        address: Set(input.address),
        is_available: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
    }
    .insert(db)
    .await
    .map_err(|e| conflict_on_unique(e, duplicate_name(&name)))?;

    info!(proposal_id = %created.id, %commodity_id, "proposal submitted");
    Ok(created)
}

/// Edits a proposal.
///
/// An approved proposal is superseded: the approved row is soft-deleted and a
/// new pending, unavailable version is created with the same commodity and
/// creation time and `previous_version_id` set. Any other proposal is edited in
/// place and goes back to `Pending`, so a rejected proposal can be resubmitted.
///
/// # Errors
/// - `BadRequest` for invalid fields
/// - `NotFound` if the proposal or the farmer's commodity does not exist
/// - `Conflict` if the new name is already used under the commodity, or the
///   proposal was validated or superseded while being edited
#[instrument(skip(db, clock, input))]
pub async fn update_proposal(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    proposal_id: Uuid,
    farmer_id: Uuid,
    input: ProposalInput,
) -> Result<proposal::Model> {
    input.validate()?;

    let existing = get_proposal_by_id(db, proposal_id)
        .await?
        .ok_or_else(|| Error::not_found("Proposal", proposal_id))?;

    commodity::get_commodity_for_farmer(db, existing.commodity_id, farmer_id)
        .await?
        .ok_or_else(|| Error::not_found("Commodity", existing.commodity_id))?;

    let name = input.name.trim().to_string();
    if name != existing.name && name_taken(db, existing.commodity_id, &name).await? {
        return Err(Error::conflict(duplicate_name(&name)));
    }

    let now = clock.now();

    if !existing.is_accepted() {
        return edit_in_place(db, &existing, name, input, now).await;
    }

    let txn = db.begin().await?;

    let superseded = Proposal::update_many()
        .col_expr(proposal::Column::DeletedAt, Expr::value(Some(now)))
        .col_expr(proposal::Column::IsAvailable, Expr::value(false))
        .col_expr(proposal::Column::UpdatedAt, Expr::value(now))
        .filter(proposal::Column::Id.eq(existing.id))
        .filter(proposal::Column::DeletedAt.is_null())
        .exec(&txn)
        .await?;
    if superseded.rows_affected == 0 {
        return Err(Error::conflict("Proposal has already been superseded"));
    }

    let replacement = proposal::ActiveModel {
        id: Set(Uuid::new_v4()),
        previous_version_id: Set(Some(existing.id)),
        validator_id: Set(None),
        commodity_id: Set(existing.commodity_id),
        name: Set(name.clone()),
        description: Set(input.description),
        status: Set(ProposalStatus::Pending),
        reject_reason: Set(None),
        estimated_total_harvest: Set(input.estimated_total_harvest),
        planting_area: Set(input.planting_area),
        address: Set(input.address),
        is_available: Set(false),
        created_at: Set(existing.created_at),
        updated_at: Set(now),
        deleted_at: Set(None),
    }
    .insert(&txn)
    .await
    .map_err(|e| conflict_on_unique(e, duplicate_name(&name)))?;

    txn.commit().await?;
    info!(
        old_id = %existing.id,
        new_id = %replacement.id,
        "approved proposal superseded by new version"
    );
    Ok(replacement)
}

/// Rewrites a pending or rejected proposal, provided it still has the status
/// it was read with. A validator deciding in between wins and the edit is a
/// `Conflict`.
async fn edit_in_place<C>(
    db: &C,
    existing: &proposal::Model,
    name: String,
    input: ProposalInput,
    now: DateTime<Utc>,
) -> Result<proposal::Model>
where
    C: ConnectionTrait,
{
    let result = Proposal::update_many()
        .col_expr(proposal::Column::Name, Expr::value(name.clone()))
        .col_expr(proposal::Column::Description, Expr::value(input.description))
        .col_expr(
            proposal::Column::EstimatedTotalHarvest,
            Expr::value(input.estimated_total_harvest),
        )
        .col_expr(proposal::Column::PlantingArea, Expr::value(input.planting_area))
        .col_expr(proposal::Column::Address, Expr::value(input.address))
        .col_expr(proposal::Column::Status, Expr::value(ProposalStatus::Pending))
        .col_expr(proposal::Column::RejectReason, Expr::value(None::<String>))
        .col_expr(proposal::Column::UpdatedAt, Expr::value(now))
        .filter(proposal::Column::Id.eq(existing.id))
        .filter(proposal::Column::Status.eq(existing.status))
        .filter(proposal::Column::DeletedAt.is_null())
        .exec(db)
        .await
        .map_err(|e| conflict_on_unique(e, duplicate_name(&name)))?;

    if result.rows_affected == 0 {
        return Err(Error::conflict(
            "Proposal changed while being edited, reload it and try again",
        ));
    }

    get_proposal_by_id(db, existing.id)
        .await?
        .ok_or_else(|| Error::not_found("Proposal", existing.id))
}

/// Records a validator's decision on a pending proposal.
///
/// `target` must be `Approved` or `Rejected`; a rejection needs a reason.
/// Approval makes the proposal available to buyers. A proposal can be decided
/// exactly once: deciding it again is a `Conflict` and leaves the stored
/// validator untouched.
///
/// # Errors
/// - `BadRequest` for a `Pending` target or a rejection without reason
/// - `NotFound` if the proposal does not exist
/// - `Conflict` if the proposal was already approved or rejected
#[instrument(skip(db, clock, reject_reason))]
pub async fn validate_proposal(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    proposal_id: Uuid,
    validator_id: Uuid,
    target: ProposalStatus,
    reject_reason: Option<String>,
) -> Result<proposal::Model> {
    let reject_reason = match target {
        ProposalStatus::Pending => {
            return Err(Error::bad_request(
                "A proposal can only be validated as approved or rejected",
            ));
        }
        ProposalStatus::Approved => None,
        ProposalStatus::Rejected => match reject_reason {
            Some(reason) if !reason.trim().is_empty() => Some(reason.trim().to_string()),
            _ => return Err(Error::bad_request("A rejection needs a reason")),
        },
    };

    let existing = get_proposal_by_id(db, proposal_id)
        .await?
        .ok_or_else(|| Error::not_found("Proposal", proposal_id))?;

    if existing.status != ProposalStatus::Pending {
        return Err(Error::conflict(format!(
            "Proposal has already been validated as {:?}",
            existing.status
        )));
    }

    // Conditional on the row still being pending, so two validators cannot both win.
    let result = Proposal::update_many()
        .col_expr(proposal::Column::Status, Expr::value(target))
        .col_expr(proposal::Column::ValidatorId, Expr::value(Some(validator_id)))
        .col_expr(proposal::Column::RejectReason, Expr::value(reject_reason))
        .col_expr(
            proposal::Column::IsAvailable,
            Expr::value(target == ProposalStatus::Approved),
        )
        .col_expr(proposal::Column::UpdatedAt, Expr::value(clock.now()))
        .filter(proposal::Column::Id.eq(proposal_id))
        .filter(proposal::Column::Status.eq(ProposalStatus::Pending))
        .filter(proposal::Column::DeletedAt.is_null())
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::conflict("Proposal has already been validated"));
    }

    info!(%proposal_id, %validator_id, status = ?target, "proposal validated");
    get_proposal_by_id(db, proposal_id)
        .await?
        .ok_or_else(|| Error::not_found("Proposal", proposal_id))
}

/// Closes a proposal to further buyers once a transaction for it is accepted.
pub async fn mark_unavailable<C>(db: &C, proposal_id: Uuid, now: DateTime<Utc>) -> Result<()>
where
    C: ConnectionTrait,
{
    Proposal::update_many()
        .col_expr(proposal::Column::IsAvailable, Expr::value(false))
        .col_expr(proposal::Column::UpdatedAt, Expr::value(now))
        .filter(proposal::Column::Id.eq(proposal_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Moves every live proposal of `old_commodity_id` to `new_commodity_id`.
/// Returns the number of proposals moved.
pub async fn update_commodity_id<C>(
    db: &C,
    old_commodity_id: Uuid,
    new_commodity_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = Proposal::update_many()
        .col_expr(proposal::Column::CommodityId, Expr::value(new_commodity_id))
        .col_expr(proposal::Column::UpdatedAt, Expr::value(now))
        .filter(proposal::Column::CommodityId.eq(old_commodity_id))
        .filter(proposal::Column::DeletedAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Soft-deletes every live proposal of a commodity. Returns the number deleted.
pub async fn delete_by_commodity_id<C>(
    db: &C,
    commodity_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = Proposal::update_many()
        .col_expr(proposal::Column::DeletedAt, Expr::value(Some(now)))
        .col_expr(proposal::Column::IsAvailable, Expr::value(false))
        .col_expr(proposal::Column::UpdatedAt, Expr::value(now))
        .filter(proposal::Column::CommodityId.eq(commodity_id))
        .filter(proposal::Column::DeletedAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
