//! Treatment record entity - A numbered care request inside a batch.
//!
//! A validator requests a record (`WaitingResponse`), the farmer answers it
//! (`Pending`), and the validator either approves it or sends it back for
//! `Revision`. Only one record per batch may be short of `Approved` at a time.

use sea_orm::{FromJsonQueryResult, entity::prelude::*};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "camelCase")]
pub enum TreatmentStatus {
    #[sea_orm(string_value = "waitingResponse")]
    WaitingResponse,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "revision")]
    Revision,
}

/// One applied treatment (fertilizer, pesticide, ...) reported by the farmer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreatmentEntry {
    pub name: String,
    pub dose: f64,
    pub unit: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct TreatmentEntries(pub Vec<TreatmentEntry>);

/// Treatment record database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "treatment_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Validator who asked for the record
    pub requester_id: Uuid,
    /// Validator who approved the record
    pub accepter_id: Option<Uuid>,
    pub batch_id: Uuid,
    /// 1-based position within the batch
    pub number: i64,
    pub date: DateTimeUtc,
    pub status: TreatmentStatus,
    pub description: String,
    #[sea_orm(column_type = "Json")]
    pub treatments: TreatmentEntries,
    pub revision_note: Option<String>,
    pub warning_note: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::batch::Entity",
        from = "Column::BatchId",
        to = "super::batch::Column::Id"
    )]
    Batch,
}

impl Related<super::batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
