//! Proposal entity - A farmer's planting plan for one of their commodities.
//!
//! A proposal must be approved by a validator before buyers can transact
//! against it. `is_available` is the buyer-facing gate: it opens on approval and
//! closes once a transaction for the proposal is accepted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Validation state of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "camelCase")]
pub enum ProposalStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Proposal database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "proposals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// The accepted version this row superseded, if any
    pub previous_version_id: Option<Uuid>,
    /// Validator who approved or rejected the proposal
    pub validator_id: Option<Uuid>,
    pub commodity_id: Uuid,
    /// Unique within the commodity among live proposals
    pub name: String,
    pub description: String,
    pub status: ProposalStatus,
    pub reject_reason: Option<String>,
    /// Expected yield in kilograms
    pub estimated_total_harvest: f64,
    /// Planted area in square meters
    pub planting_area: f64,
    pub address: String,
    pub is_available: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

impl Model {
    /// Whether a validator has approved this proposal.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status == ProposalStatus::Approved
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each proposal belongs to one commodity
    #[sea_orm(
        belongs_to = "super::commodity::Entity",
        from = "Column::CommodityId",
        to = "super::commodity::Column::Id"
    )]
    Commodity,
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
}

impl Related<super::commodity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commodity.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
