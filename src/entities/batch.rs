//! Batch entity - One growing cycle created from an accepted transaction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a batch. `Harvest` and `Cancel` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "camelCase")]
pub enum BatchStatus {
    #[sea_orm(string_value = "planting")]
    Planting,
    #[sea_orm(string_value = "harvest")]
    Harvest,
    #[sea_orm(string_value = "cancel")]
    Cancel,
}

/// Batch database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// The accepted transaction this batch fulfils (one batch per transaction)
    pub transaction_id: Uuid,
    /// `"<proposal name> - <sequence>"`
    pub name: String,
    pub estimated_harvest_date: DateTimeUtc,
    pub status: BatchStatus,
    pub cancel_reason: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::TransactionId",
        to = "super::transaction::Column::Id"
    )]
    Transaction,
    #[sea_orm(has_many = "super::treatment_record::Entity")]
    TreatmentRecords,
    #[sea_orm(has_many = "super::harvest::Entity")]
    Harvests,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl Related<super::treatment_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TreatmentRecords.def()
    }
}

impl Related<super::harvest::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Harvests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
