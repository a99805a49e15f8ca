//! Atomic per-parent counters.
//!
//! A counter row is created on first use, seeded from the number of rows that
//! already exist for the parent, and incremented in the same statement
//! (`INSERT ... ON CONFLICT DO UPDATE SET value = value + 1`). Two concurrent
//! reservations for the same scope therefore never hand out the same value.

use crate::{
    entities::{SequenceCounter, sequence_counter},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    Set,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use tracing::debug;

/// Counter scope for batch names derived from a proposal name.
#[must_use]
pub fn batch_name_scope(proposal_name: &str) -> String {
    format!("batch:{}", proposal_name.trim().to_lowercase())
}

/// Counter scope for treatment record numbers within a batch.
#[must_use]
pub fn treatment_scope(batch_id: Uuid) -> String {
    format!("treatment:{batch_id}")
}

/// Reserves the next value for `scope`.
///
/// `existing` is the number of rows already numbered under this scope; it only
/// matters the first time a scope is used, when the counter starts at
/// `existing + 1`.
pub async fn reserve_next<C>(db: &C, scope: &str, existing: u64, now: DateTime<Utc>) -> Result<i64>
where
    C: ConnectionTrait,
{
    let seed = i64::try_from(existing).map_err(|_| Error::Internal {
        message: format!("Counter seed out of range for {scope}"),
    })? + 1;

    let counter = sequence_counter::ActiveModel {
        scope: Set(scope.to_string()),
        value: Set(seed),
        updated_at: Set(now),
    };

    SequenceCounter::insert(counter)
        .on_conflict(
            OnConflict::column(sequence_counter::Column::Scope)
                .value(
                    sequence_counter::Column::Value,
                    Expr::col((SequenceCounter, sequence_counter::Column::Value)).add(1),
                )
                .update_column(sequence_counter::Column::UpdatedAt)
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let value = SequenceCounter::find_by_id(scope.to_string())
        .one(db)
        .await?
        .map(|c| c.value)
        .ok_or_else(|| Error::Internal {
            message: format!("Counter {scope} vanished after reservation"),
        })?;

    debug!(scope, value, "reserved sequence value");
    Ok(value)
}
