//! Harvest business logic - the farmer's harvest claim and its validation.
//!
//! A batch has at most one harvest row. A harvest sent back for revision is
//! resubmitted through the same path as a first submission and the row is
//! overwritten with the new evidence; the validator's note is cleared.
//! Approval moves the batch to `Harvest` in the same database transaction.

use crate::{
    core::{batch, treatment_record},
    entities::{
        BatchStatus, Harvest, HarvestStatus, TreatmentStatus,
        harvest::{self, EvidenceItem, HarvestEvidence},
    },
    errors::{Error, Result, conflict_on_unique},
    services::{Clock, FileStore, UploadFile},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, instrument, warn};

/// Everything the farmer sends when reporting a harvest.
#[derive(Debug, Clone)]
pub struct HarvestSubmission {
    pub batch_id: Uuid,
    pub date: DateTime<Utc>,
    /// Kilograms
    pub total_harvest: f64,
    pub condition: String,
    /// Evidence images, paired by position with `notes`
    pub images: Vec<UploadFile>,
    pub notes: Vec<String>,
}

pub async fn get_harvest_by_id<C>(db: &C, harvest_id: Uuid) -> Result<Option<harvest::Model>>
where
    C: ConnectionTrait,
{
    Harvest::find_by_id(harvest_id)
        .one(db)
        .await
        .map_err(Into::into)
}

pub async fn get_harvest_by_batch_id<C>(db: &C, batch_id: Uuid) -> Result<Option<harvest::Model>>
where
    C: ConnectionTrait,
{
    Harvest::find()
        .filter(harvest::Column::BatchId.eq(batch_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Submits (or resubmits after revision) the harvest of a planting batch.
///
/// Images are uploaded to `folder` through `file_store` and paired with the
/// notes as evidence.
///
/// # Errors
/// - `NotFound` if the batch does not exist
/// - `BadRequest` if the newest treatment record is missing or not approved,
///   the date precedes it or is in the future, a harvest is already pending or
///   approved, the batch is not planting, or images and notes do not pair up
/// - `Forbidden` if the batch belongs to another farmer
/// - `InternalError` if the upload fails or times out
#[instrument(skip(db, clock, file_store, submission), fields(batch_id = %submission.batch_id))]
pub async fn submit_harvest(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    file_store: &dyn FileStore,
    folder: &str,
    farmer_id: Uuid,
    submission: HarvestSubmission,
) -> Result<harvest::Model> {
    if !submission.total_harvest.is_finite() || submission.total_harvest < 0.0 {
        return Err(Error::bad_request(format!(
            "Invalid total harvest: {}",
            submission.total_harvest
        )));
    }
    if submission.condition.trim().is_empty() {
        return Err(Error::bad_request("Harvest condition cannot be empty"));
    }

    let batch_id = submission.batch_id;
    let batch = batch::get_batch_by_id(db, batch_id)
        .await?
        .ok_or_else(|| Error::not_found("Batch", batch_id))?;

    let newest = treatment_record::get_newest_treatment_record(db, batch_id)
        .await?
        .filter(|r| r.status == TreatmentStatus::Approved)
        .ok_or_else(|| {
            Error::bad_request("The newest treatment record must be approved before harvesting")
        })?;

    let now = clock.now();
    if submission.date < newest.date {
        return Err(Error::bad_request(format!(
            "Harvest date cannot precede treatment record #{}",
            newest.number
        )));
    }
    if submission.date > now {
        return Err(Error::bad_request("Harvest date cannot be in the future"));
    }

    batch::load_lineage(db, &batch).await?.ensure_owner(farmer_id)?;

    let previous = get_harvest_by_batch_id(db, batch_id).await?;
    match previous.as_ref().map(|h| h.status) {
        Some(HarvestStatus::Pending) => {
            return Err(Error::bad_request("Harvest is already being verified"));
        }
        Some(HarvestStatus::Approved) => {
            return Err(Error::bad_request("Harvest has already been accepted"));
        }
        Some(HarvestStatus::Revision) | None => {}
    }

    // Checked after the harvest row so an approved harvest reports itself.
    if batch.status != BatchStatus::Planting {
        return Err(Error::bad_request(format!(
            "Only planting batches can be harvested, this one is {:?}",
            batch.status
        )));
    }

    if submission.images.is_empty() || submission.images.len() != submission.notes.len() {
        return Err(Error::bad_request(format!(
            "Every evidence image needs a note: got {} images and {} notes",
            submission.images.len(),
            submission.notes.len()
        )));
    }

    let urls = file_store.upload_many(folder, submission.images).await?;
    let evidence = HarvestEvidence(
        urls.into_iter()
            .zip(submission.notes)
            .map(|(image_url, note)| EvidenceItem { image_url, note })
            .collect(),
    );

    let claim = HarvestClaim {
        date: submission.date,
        total_harvest: submission.total_harvest,
        condition: submission.condition.trim().to_string(),
        evidence,
    };

    let saved = match previous {
        Some(revision) => resubmit_revision(db, revision.id, claim, now).await,
        None => insert_harvest(db, batch_id, claim, now).await,
    }
    .inspect_err(|e| warn!(error = %e, "harvest not saved, uploaded evidence is orphaned"))?;

    info!(harvest_id = %saved.id, "harvest submitted");
    Ok(saved)
}

/// The stored part of a submission, after upload.
struct HarvestClaim {
    date: DateTime<Utc>,
    total_harvest: f64,
    condition: String,
    evidence: HarvestEvidence,
}

async fn insert_harvest<C>(
    db: &C,
    batch_id: Uuid,
    claim: HarvestClaim,
    now: DateTime<Utc>,
) -> Result<harvest::Model>
where
    C: ConnectionTrait,
{
    harvest::ActiveModel {
        id: Set(Uuid::new_v4()),
        accepter_id: Set(None),
        batch_id: Set(batch_id),
        date: Set(claim.date),
        status: Set(HarvestStatus::Pending),
        total_harvest: Set(claim.total_harvest),
        condition: Set(claim.condition),
        evidence: Set(claim.evidence),
        revision_note: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(|e| conflict_on_unique(e, "Batch already has a harvest"))
}

/// Overwrites a harvest sent back for revision and returns it to `Pending`.
/// Only one resubmission can move the row out of `Revision`; any other
/// finds it already being verified.
async fn resubmit_revision<C>(
    db: &C,
    harvest_id: Uuid,
    claim: HarvestClaim,
    now: DateTime<Utc>,
) -> Result<harvest::Model>
where
    C: ConnectionTrait,
{
    let result = Harvest::update_many()
        .col_expr(harvest::Column::Date, Expr::value(claim.date))
        .col_expr(harvest::Column::TotalHarvest, Expr::value(claim.total_harvest))
        .col_expr(harvest::Column::Condition, Expr::value(claim.condition))
        .col_expr(harvest::Column::Evidence, Expr::value(claim.evidence))
        .col_expr(harvest::Column::Status, Expr::value(HarvestStatus::Pending))
        .col_expr(harvest::Column::RevisionNote, Expr::value(None::<String>))
        .col_expr(harvest::Column::UpdatedAt, Expr::value(now))
        .filter(harvest::Column::Id.eq(harvest_id))
        .filter(harvest::Column::Status.eq(HarvestStatus::Revision))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::bad_request("Harvest is already being verified"));
    }

    get_harvest_by_id(db, harvest_id)
        .await?
        .ok_or_else(|| Error::not_found("Harvest", harvest_id))
}

/// Records a validator's decision on a pending harvest.
///
/// `target` must be `Approved` or `Revision`; a revision needs a note.
/// Approval sets the accepter and moves the batch to `Harvest` atomically.
///
/// # Errors
/// - `BadRequest` for a `Pending` target or a revision without note
/// - `NotFound` if the harvest does not exist
/// - `Conflict` if the harvest is not pending or its batch is no longer planting
#[instrument(skip(db, clock, revision_note))]
pub async fn validate_harvest(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    harvest_id: Uuid,
    validator_id: Uuid,
    target: HarvestStatus,
    revision_note: Option<String>,
) -> Result<harvest::Model> {
    let revision_note = match target {
        HarvestStatus::Pending => {
            return Err(Error::bad_request(
                "A harvest can only be validated as approved or revision",
            ));
        }
        HarvestStatus::Approved => None,
        HarvestStatus::Revision => match revision_note {
            Some(note) if !note.trim().is_empty() => Some(note.trim().to_string()),
            _ => return Err(Error::bad_request("A revision needs a note")),
        },
    };

    let existing = get_harvest_by_id(db, harvest_id)
        .await?
        .ok_or_else(|| Error::not_found("Harvest", harvest_id))?;
    if existing.status != HarvestStatus::Pending {
        return Err(Error::conflict(format!(
            "Harvest is {:?}, only pending harvests can be validated",
            existing.status
        )));
    }

    let now = clock.now();
    let mut update = Harvest::update_many()
        .col_expr(harvest::Column::Status, Expr::value(target))
        .col_expr(harvest::Column::UpdatedAt, Expr::value(now));
    update = if target == HarvestStatus::Approved {
        update.col_expr(harvest::Column::AccepterId, Expr::value(Some(validator_id)))
    } else {
        update.col_expr(harvest::Column::RevisionNote, Expr::value(revision_note))
    };

    let txn = db.begin().await?;

    let result = update
        .filter(harvest::Column::Id.eq(harvest_id))
        .filter(harvest::Column::Status.eq(HarvestStatus::Pending))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::conflict("Harvest has already been validated"));
    }
    if target == HarvestStatus::Approved {
        batch::mark_harvested(&txn, existing.batch_id, now).await?;
    }

    let validated = get_harvest_by_id(&txn, harvest_id)
        .await?
        .ok_or_else(|| Error::not_found("Harvest", harvest_id))?;
    txn.commit().await?;

    info!(%harvest_id, %validator_id, status = ?target, "harvest validated");
    Ok(validated)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::config::StorageConfig;
    use crate::errors::ErrorKind;
    use crate::services::LocalFileStore;
    use crate::test_utils::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and refuses every upload.
    #[derive(Default)]
    struct BrokenFileStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FileStore for BrokenFileStore {
        async fn upload_many(&self, _folder: &str, _files: Vec<UploadFile>) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Internal {
                message: "storage offline".to_string(),
            })
        }
    }

    fn local_store(dir: &std::path::Path) -> LocalFileStore {
        LocalFileStore::new(&StorageConfig {
            root_dir: dir.to_path_buf(),
            ..StorageConfig::default()
        })
    }

    fn submission(batch_id: Uuid, date: DateTime<Utc>, images: usize) -> HarvestSubmission {
        HarvestSubmission {
            batch_id,
            date,
            total_harvest: 48.0,
            condition: "Dry, good quality".to_string(),
            images: (0..images)
                .map(|i| UploadFile::new(format!("sack{i}.jpg"), vec![1, 2, 3]))
                .collect(),
            notes: (0..images).map(|i| format!("sack {i}")).collect(),
        }
    }

    /// A planting batch whose only treatment record was approved 5 days ago.
    async fn ready_batch(db: &DatabaseConnection, clock: &FixedClock) -> Result<TestBatch> {
        let planted = create_planting_batch(db, clock, "Corn", "Corn A").await?;
        clock.advance(Duration::days(30));
        approve_treatment(db, clock, &planted, clock.now() - Duration::days(5)).await?;
        Ok(planted)
    }

    #[tokio::test]
    async fn test_submit_and_approve_harvest() -> Result<()> {
        let (db, clock) = setup().await?;
        let dir = tempfile::tempdir()?;
        let store = local_store(dir.path());
        let planted = ready_batch(&db, &clock).await?;

        let harvest = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            planted.farmer,
            submission(planted.batch.id, clock.now(), 2),
        )
        .await?;

        assert_eq!(harvest.status, HarvestStatus::Pending);
        assert_eq!(harvest.total_harvest, 48.0);
        assert_eq!(harvest.evidence.0.len(), 2);
        assert_eq!(harvest.evidence.0[1].note, "sack 1");
        assert!(harvest.evidence.0[0].image_url.contains("/harvests/"));

        let validator = Uuid::new_v4();
        let approved = validate_harvest(
            &db,
            &clock,
            harvest.id,
            validator,
            HarvestStatus::Approved,
            None,
        )
        .await?;
        assert_eq!(approved.status, HarvestStatus::Approved);
        assert_eq!(approved.accepter_id, Some(validator));

        let batch = batch::get_batch_by_id(&db, planted.batch.id).await?.unwrap();
        assert_eq!(batch.status, BatchStatus::Harvest);

        Ok(())
    }

    #[tokio::test]
    async fn test_resubmission_branches() -> Result<()> {
        let (db, clock) = setup().await?;
        let dir = tempfile::tempdir()?;
        let store = local_store(dir.path());
        let planted = ready_batch(&db, &clock).await?;

        let first = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            planted.farmer,
            submission(planted.batch.id, clock.now(), 1),
        )
        .await?;

        // pending: still being verified
        let pending = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            planted.farmer,
            submission(planted.batch.id, clock.now(), 1),
        )
        .await
        .unwrap_err();
        assert_eq!(pending.kind(), ErrorKind::BadRequest);
        assert!(pending.to_string().contains("being verified"));

        validate_harvest(
            &db,
            &clock,
            first.id,
            Uuid::new_v4(),
            HarvestStatus::Revision,
            Some("Photos are blurry".to_string()),
        )
        .await?;

        // revision: resubmission goes through and reuses the row
        let resubmitted = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            planted.farmer,
            submission(planted.batch.id, clock.now(), 3),
        )
        .await?;
        assert_eq!(resubmitted.id, first.id);
        assert_eq!(resubmitted.status, HarvestStatus::Pending);
        assert_eq!(resubmitted.evidence.0.len(), 3);
        assert!(resubmitted.revision_note.is_none());

        validate_harvest(
            &db,
            &clock,
            first.id,
            Uuid::new_v4(),
            HarvestStatus::Approved,
            None,
        )
        .await?;

        // approved: rejected with its own message
        let approved = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            planted.farmer,
            submission(planted.batch.id, clock.now(), 1),
        )
        .await
        .unwrap_err();
        assert_eq!(approved.kind(), ErrorKind::BadRequest);
        assert!(approved.to_string().contains("already been accepted"));

        Ok(())
    }

    /// Submits a harvest and sends it back for revision.
    async fn harvest_in_revision(
        db: &DatabaseConnection,
        clock: &FixedClock,
        store: &LocalFileStore,
        planted: &TestBatch,
    ) -> Result<harvest::Model> {
        let first = submit_harvest(
            db,
            clock,
            store,
            "harvests",
            planted.farmer,
            submission(planted.batch.id, clock.now(), 1),
        )
        .await?;
        validate_harvest(
            db,
            clock,
            first.id,
            Uuid::new_v4(),
            HarvestStatus::Revision,
            Some("Photos are blurry".to_string()),
        )
        .await
    }

    fn claim(condition: &str) -> HarvestClaim {
        HarvestClaim {
            date: test_now(),
            total_harvest: 40.0,
            condition: condition.to_string(),
            evidence: HarvestEvidence(vec![EvidenceItem {
                image_url: format!("http://cdn/{condition}.jpg"),
                note: condition.to_string(),
            }]),
        }
    }

    #[tokio::test]
    async fn test_second_resubmission_of_same_revision_is_refused() -> Result<()> {
        let (db, clock) = setup().await?;
        let dir = tempfile::tempdir()?;
        let store = local_store(dir.path());
        let planted = ready_batch(&db, &clock).await?;
        let revision = harvest_in_revision(&db, &clock, &store, &planted).await?;

        // both callers saw the row in revision before either wrote
        let first = resubmit_revision(&db, revision.id, claim("first"), clock.now()).await?;
        assert_eq!(first.status, HarvestStatus::Pending);

        let second = resubmit_revision(&db, revision.id, claim("second"), clock.now())
            .await
            .unwrap_err();
        assert_eq!(second.kind(), ErrorKind::BadRequest);
        assert!(second.to_string().contains("being verified"));

        let stored = get_harvest_by_id(&db, revision.id).await?.unwrap();
        assert_eq!(stored.condition, "first");
        assert_eq!(stored.evidence.0[0].note, "first");

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_resubmissions_accept_exactly_one() -> Result<()> {
        let (db, clock) = setup().await?;
        let dir = tempfile::tempdir()?;
        let store = local_store(dir.path());
        let planted = ready_batch(&db, &clock).await?;
        let revision = harvest_in_revision(&db, &clock, &store, &planted).await?;

        let mut a = submission(planted.batch.id, clock.now(), 1);
        a.condition = "A".to_string();
        let mut b = submission(planted.batch.id, clock.now(), 1);
        b.condition = "B".to_string();

        let (a, b) = tokio::join!(
            submit_harvest(&db, &clock, &store, "harvests", planted.farmer, a),
            submit_harvest(&db, &clock, &store, "harvests", planted.farmer, b),
        );
        assert_ne!(a.is_ok(), b.is_ok(), "exactly one resubmission wins");
        let (winner, loser) = if a.is_ok() {
            (a?, b.unwrap_err())
        } else {
            (b?, a.unwrap_err())
        };
        assert_eq!(loser.kind(), ErrorKind::BadRequest);

        let stored = get_harvest_by_id(&db, revision.id).await?.unwrap();
        assert_eq!(stored.status, HarvestStatus::Pending);
        assert_eq!(stored.condition, winner.condition);

        Ok(())
    }

    #[tokio::test]
    async fn test_harvest_date_bounds() -> Result<()> {
        let (db, clock) = setup().await?;
        let store = BrokenFileStore::default();
        let planted = ready_batch(&db, &clock).await?;

        let before_treatment = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            planted.farmer,
            submission(planted.batch.id, clock.now() - Duration::days(6), 1),
        )
        .await;
        assert_eq!(before_treatment.unwrap_err().kind(), ErrorKind::BadRequest);

        let future = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            planted.farmer,
            submission(planted.batch.id, clock.now() + Duration::minutes(1), 1),
        )
        .await;
        assert_eq!(future.unwrap_err().kind(), ErrorKind::BadRequest);

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_harvest_requires_approved_treatment() -> Result<()> {
        let (db, clock) = setup().await?;
        let store = BrokenFileStore::default();
        let planted = create_planting_batch(&db, &clock, "Corn", "Corn A").await?;
        clock.advance(Duration::days(30));

        let none_yet = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            planted.farmer,
            submission(planted.batch.id, clock.now(), 1),
        )
        .await;
        assert_eq!(none_yet.unwrap_err().kind(), ErrorKind::BadRequest);

        let missing = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            planted.farmer,
            submission(Uuid::new_v4(), clock.now(), 1),
        )
        .await;
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::NotFound);

        Ok(())
    }

    #[tokio::test]
    async fn test_harvest_ownership_and_evidence_pairing() -> Result<()> {
        let (db, clock) = setup().await?;
        let store = BrokenFileStore::default();
        let planted = ready_batch(&db, &clock).await?;

        let stranger = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            Uuid::new_v4(),
            submission(planted.batch.id, clock.now(), 1),
        )
        .await;
        assert_eq!(stranger.unwrap_err().kind(), ErrorKind::Forbidden);

        let mut unpaired = submission(planted.batch.id, clock.now(), 2);
        unpaired.notes.pop();
        let result =
            submit_harvest(&db, &clock, &store, "harvests", planted.farmer, unpaired).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::BadRequest);

        let empty = submission(planted.batch.id, clock.now(), 0);
        let result = submit_harvest(&db, &clock, &store, "harvests", planted.farmer, empty).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::BadRequest);

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_failure_saves_nothing() -> Result<()> {
        let (db, clock) = setup().await?;
        let store = BrokenFileStore::default();
        let planted = ready_batch(&db, &clock).await?;

        let result = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            planted.farmer,
            submission(planted.batch.id, clock.now(), 1),
        )
        .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InternalError);
        assert!(get_harvest_by_batch_id(&db, planted.batch.id).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_validate_harvest_rules() -> Result<()> {
        let (db, clock) = setup().await?;
        let dir = tempfile::tempdir()?;
        let store = local_store(dir.path());
        let planted = ready_batch(&db, &clock).await?;
        let harvest = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            planted.farmer,
            submission(planted.batch.id, clock.now(), 1),
        )
        .await?;

        let pending_target = validate_harvest(
            &db,
            &clock,
            harvest.id,
            Uuid::new_v4(),
            HarvestStatus::Pending,
            None,
        )
        .await;
        assert_eq!(pending_target.unwrap_err().kind(), ErrorKind::BadRequest);

        let no_note = validate_harvest(
            &db,
            &clock,
            harvest.id,
            Uuid::new_v4(),
            HarvestStatus::Revision,
            None,
        )
        .await;
        assert_eq!(no_note.unwrap_err().kind(), ErrorKind::BadRequest);

        validate_harvest(
            &db,
            &clock,
            harvest.id,
            Uuid::new_v4(),
            HarvestStatus::Revision,
            Some("Need a photo of the scale".to_string()),
        )
        .await?;

        let again = validate_harvest(
            &db,
            &clock,
            harvest.id,
            Uuid::new_v4(),
            HarvestStatus::Approved,
            None,
        )
        .await;
        assert_eq!(again.unwrap_err().kind(), ErrorKind::Conflict);

        // a revision leaves the batch planting
        let batch = batch::get_batch_by_id(&db, planted.batch.id).await?.unwrap();
        assert_eq!(batch.status, BatchStatus::Planting);

        Ok(())
    }

    #[tokio::test]
    async fn test_approval_rolls_back_when_batch_cancelled() -> Result<()> {
        let (db, clock) = setup().await?;
        let dir = tempfile::tempdir()?;
        let store = local_store(dir.path());
        let planted = ready_batch(&db, &clock).await?;
        let harvest = submit_harvest(
            &db,
            &clock,
            &store,
            "harvests",
            planted.farmer,
            submission(planted.batch.id, clock.now(), 1),
        )
        .await?;
        batch::cancel_batch(&db, &clock, planted.batch.id, planted.farmer, "hail").await?;

        let result = validate_harvest(
            &db,
            &clock,
            harvest.id,
            Uuid::new_v4(),
            HarvestStatus::Approved,
            None,
        )
        .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Conflict);

        let unchanged = get_harvest_by_id(&db, harvest.id).await?.unwrap();
        assert_eq!(unchanged.status, HarvestStatus::Pending);
        assert!(unchanged.accepter_id.is_none());

        Ok(())
    }
}
