//! Treatment record business logic - numbered care requests within a batch.
//!
//! Records of a batch form a strict sequence. A new record can only be
//! requested once the newest one is approved, its date must come after the
//! batch was created and after the newest record, and it cannot lie in the
//! future. Numbers come from a per-batch counter.

use crate::{
    core::{batch, sequence},
    entities::{
        BatchStatus, TreatmentRecord, TreatmentStatus,
        treatment_record::{self, TreatmentEntries, TreatmentEntry},
    },
    errors::{Error, Result, conflict_on_unique},
    services::Clock,
};
use chrono::{DateTime, Utc};
use sea_orm::{PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// A validator's request for the next treatment of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentRequest {
    pub batch_id: Uuid,
    pub date: DateTime<Utc>,
}

/// The farmer's answer to a requested record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentReport {
    pub description: String,
    pub treatments: Vec<TreatmentEntry>,
}

/// Validator decision on a pending record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreatmentDecision {
    Approve { warning_note: Option<String> },
    Revise { revision_note: String },
}

pub async fn get_treatment_record_by_id<C>(
    db: &C,
    record_id: Uuid,
) -> Result<Option<treatment_record::Model>>
where
    C: ConnectionTrait,
{
    TreatmentRecord::find_by_id(record_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// The highest-numbered record of a batch.
pub async fn get_newest_treatment_record<C>(
    db: &C,
    batch_id: Uuid,
) -> Result<Option<treatment_record::Model>>
where
    C: ConnectionTrait,
{
    TreatmentRecord::find()
        .filter(treatment_record::Column::BatchId.eq(batch_id))
        .order_by_desc(treatment_record::Column::Number)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists the records of a batch in number order.
pub async fn list_treatment_records(
    db: &DatabaseConnection,
    batch_id: Uuid,
) -> Result<Vec<treatment_record::Model>> {
    TreatmentRecord::find()
        .filter(treatment_record::Column::BatchId.eq(batch_id))
        .order_by_asc(treatment_record::Column::Number)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Requests the next treatment record of a planting batch.
///
/// # Errors
/// - `NotFound` if the batch does not exist
/// - `BadRequest` if the batch is not planting, the newest record is not yet
///   approved, or the date is not after both the batch creation and the newest
///   record, or is in the future
#[instrument(skip(db, clock, request), fields(batch_id = %request.batch_id))]
pub async fn request_to_farmer(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    requester_id: Uuid,
    request: TreatmentRequest,
) -> Result<treatment_record::Model> {
    let batch_id = request.batch_id;
    let batch = batch::get_batch_by_id(db, batch_id)
        .await?
        .ok_or_else(|| Error::not_found("Batch", batch_id))?;

    if batch.status != BatchStatus::Planting {
        return Err(Error::bad_request(format!(
            "Treatments can only be requested for planting batches, this one is {:?}",
            batch.status
        )));
    }
    if request.date <= batch.created_at {
        return Err(Error::bad_request("Treatment date must be after the batch was created"));
    }

    let now = clock.now();
    if request.date > now {
        return Err(Error::bad_request("Treatment date cannot be in the future"));
    }

    let txn = db.begin().await?;

    if let Some(newest) = get_newest_treatment_record(&txn, batch_id).await? {
        if newest.status != TreatmentStatus::Approved {
            return Err(Error::bad_request(format!(
                "Treatment record #{} has not been approved yet",
                newest.number
            )));
        }
        if request.date <= newest.date {
            return Err(Error::bad_request(format!(
                "Treatment date must be after record #{}",
                newest.number
            )));
        }
    }

    let existing = TreatmentRecord::find()
        .filter(treatment_record::Column::BatchId.eq(batch_id))
        .count(&txn)
        .await?;
    let number =
        sequence::reserve_next(&txn, &sequence::treatment_scope(batch_id), existing, now).await?;

    let created = treatment_record::ActiveModel {
        id: Set(Uuid::new_v4()),
        requester_id: Set(requester_id),
        accepter_id: Set(None),
        batch_id: Set(batch_id),
        number: Set(number),
        date: Set(request.date),
        status: Set(TreatmentStatus::WaitingResponse),
        description: Set(String::new()),
        treatments: Set(TreatmentEntries::default()),
        revision_note: Set(None),
        warning_note: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await
    .map_err(|e| conflict_on_unique(e, "Another treatment record is already in progress"))?;

    txn.commit().await?;
    info!(record_id = %created.id, number, "treatment record requested");
    Ok(created)
}

/// The farmer answers a requested (or sent back) record, moving it to `Pending`.
///
/// # Errors
/// - `BadRequest` for an empty description, no entries or an invalid entry, or
///   a record that is not waiting for the farmer
/// - `NotFound` if the record does not exist
/// - `Forbidden` if the batch belongs to another farmer
#[instrument(skip(db, clock, report))]
pub async fn fill_treatment_record(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    record_id: Uuid,
    farmer_id: Uuid,
    report: TreatmentReport,
) -> Result<treatment_record::Model> {
    if report.description.trim().is_empty() {
        return Err(Error::bad_request("Treatment description cannot be empty"));
    }
    if report.treatments.is_empty() {
        return Err(Error::bad_request("At least one treatment entry is required"));
    }
    if let Some(entry) = report
        .treatments
        .iter()
        .find(|e| e.name.trim().is_empty() || !e.dose.is_finite() || e.dose <= 0.0)
    {
        return Err(Error::bad_request(format!(
            "Invalid treatment entry '{}' with dose {}",
            entry.name, entry.dose
        )));
    }

    let existing = get_treatment_record_by_id(db, record_id)
        .await?
        .ok_or_else(|| Error::not_found("Treatment record", record_id))?;
    let batch = batch::get_batch_by_id(db, existing.batch_id)
        .await?
        .ok_or_else(|| Error::not_found("Batch", existing.batch_id))?;
    batch::load_lineage(db, &batch).await?.ensure_owner(farmer_id)?;

    if !matches!(
        existing.status,
        TreatmentStatus::WaitingResponse | TreatmentStatus::Revision
    ) {
        return Err(Error::bad_request(format!(
            "Treatment record is {:?} and cannot be filled",
            existing.status
        )));
    }

    let updated = answer_request(db, record_id, report, clock.now()).await?;
    info!(%record_id, "treatment record filled");
    Ok(updated)
}

/// Stores the farmer's report if the record is still waiting for one. The
/// revision note is cleared along the way.
async fn answer_request<C>(
    db: &C,
    record_id: Uuid,
    report: TreatmentReport,
    now: DateTime<Utc>,
) -> Result<treatment_record::Model>
where
    C: ConnectionTrait,
{
    let result = TreatmentRecord::update_many()
        .col_expr(
            treatment_record::Column::Description,
            Expr::value(report.description.trim().to_string()),
        )
        .col_expr(
            treatment_record::Column::Treatments,
            Expr::value(TreatmentEntries(report.treatments)),
        )
        .col_expr(
            treatment_record::Column::Status,
            Expr::value(TreatmentStatus::Pending),
        )
        .col_expr(treatment_record::Column::RevisionNote, Expr::value(None::<String>))
        .col_expr(treatment_record::Column::UpdatedAt, Expr::value(now))
        .filter(treatment_record::Column::Id.eq(record_id))
        .filter(treatment_record::Column::Status.is_in([
            TreatmentStatus::WaitingResponse,
            TreatmentStatus::Revision,
        ]))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::bad_request(
            "Treatment record has already been filled and is being verified",
        ));
    }

    get_treatment_record_by_id(db, record_id)
        .await?
        .ok_or_else(|| Error::not_found("Treatment record", record_id))
}

/// Approves or sends back a pending record.
///
/// # Errors
/// - `BadRequest` for a revision without a note
/// - `NotFound` if the record does not exist
/// - `Conflict` if the record is not pending
#[instrument(skip(db, clock, decision))]
pub async fn validate_treatment_record(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    record_id: Uuid,
    validator_id: Uuid,
    decision: TreatmentDecision,
) -> Result<treatment_record::Model> {
    let update = TreatmentRecord::update_many();
    let update = match decision {
        TreatmentDecision::Approve { warning_note } => update
            .col_expr(
                treatment_record::Column::Status,
                Expr::value(TreatmentStatus::Approved),
            )
            .col_expr(
                treatment_record::Column::AccepterId,
                Expr::value(Some(validator_id)),
            )
            .col_expr(
                treatment_record::Column::WarningNote,
                Expr::value(warning_note.filter(|n| !n.trim().is_empty())),
            ),
        TreatmentDecision::Revise { revision_note } => {
            if revision_note.trim().is_empty() {
                return Err(Error::bad_request("A revision needs a note"));
            }
            update
                .col_expr(
                    treatment_record::Column::Status,
                    Expr::value(TreatmentStatus::Revision),
                )
                .col_expr(
                    treatment_record::Column::RevisionNote,
                    Expr::value(Some(revision_note.trim().to_string())),
                )
        }
    };

    let existing = get_treatment_record_by_id(db, record_id)
        .await?
        .ok_or_else(|| Error::not_found("Treatment record", record_id))?;
    if existing.status != TreatmentStatus::Pending {
        return Err(Error::conflict(format!(
            "Treatment record is {:?}, only pending records can be validated",
            existing.status
        )));
    }

    let result = update
        .col_expr(treatment_record::Column::UpdatedAt, Expr::value(clock.now()))
        .filter(treatment_record::Column::Id.eq(record_id))
        .filter(treatment_record::Column::Status.eq(TreatmentStatus::Pending))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::conflict("Treatment record has already been validated"));
    }

    info!(%record_id, %validator_id, "treatment record validated");
    get_treatment_record_by_id(db, record_id)
        .await?
        .ok_or_else(|| Error::not_found("Treatment record", record_id))
}
