//! Sequence counter entity - Per-parent monotonic counters.
//!
//! Used for batch name sequence numbers (scoped by proposal name) and treatment
//! record numbers (scoped by batch). Same shape as a key-value state row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sequence_counters")]
pub struct Model {
    /// Counter key, e.g. `"batch:corn a"` or `"treatment:<batch id>"`
    #[sea_orm(primary_key, auto_increment = false)]
    pub scope: String,
    /// Last value handed out
    pub value: i64,
    pub updated_at: DateTimeUtc,
}

/// `SequenceCounter` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
