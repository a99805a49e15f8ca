//! Commodity entity - A farmer's catalog entry for something they can grow.
//!
//! Commodities are soft-deleted through `deleted_at`. An update never mutates a
//! row in place: the old row is retired and a new row points back to it through
//! `previous_version_id`, so proposals and transactions keep a stable history.

use sea_orm::{FromJsonQueryResult, entity::prelude::*};
use serde::{Deserialize, Serialize};

/// Public URLs of the commodity's images, stored as a JSON array
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ImageUrls(pub Vec<String>);

/// Commodity database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "commodities")]
pub struct Model {
    /// Unique identifier for this version of the commodity
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// The version this row replaced, if it was created by an update
    pub previous_version_id: Option<Uuid>,
    /// Farmer who owns the commodity
    pub farmer_id: Uuid,
    /// Display name, unique per farmer among live commodities
    pub name: String,
    pub description: String,
    /// Seed variety planted for this commodity
    pub seed: String,
    /// Days from planting until harvest
    pub planting_period: i64,
    #[sea_orm(column_type = "Json")]
    pub image_urls: ImageUrls,
    pub price_per_kg: f64,
    pub is_available: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    /// Soft delete marker - set when the commodity is deleted or superseded
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One commodity has many proposals
    #[sea_orm(has_many = "super::proposal::Entity")]
    Proposals,
}

impl Related<super::proposal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Proposals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
