//! Entity module - SeaORM definitions for the marketplace tables.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod batch;
pub mod commodity;
pub mod harvest;
pub mod password_reset_token;
pub mod proposal;
pub mod region;
pub mod sequence_counter;
pub mod transaction;
pub mod treatment_record;

// Re-export specific types to avoid conflicts
pub use batch::{BatchStatus, Column as BatchColumn, Entity as Batch, Model as BatchModel};
pub use commodity::{Column as CommodityColumn, Entity as Commodity, Model as CommodityModel};
pub use harvest::{
    Column as HarvestColumn, Entity as Harvest, HarvestStatus, Model as HarvestModel,
};
pub use password_reset_token::{
    Column as PasswordResetTokenColumn, Entity as PasswordResetToken,
    Model as PasswordResetTokenModel,
};
pub use proposal::{
    Column as ProposalColumn, Entity as Proposal, Model as ProposalModel, ProposalStatus,
};
pub use region::{Column as RegionColumn, Entity as Region, Model as RegionModel};
pub use sequence_counter::{
    Column as SequenceCounterColumn, Entity as SequenceCounter, Model as SequenceCounterModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionStatus,
};
pub use treatment_record::{
    Column as TreatmentRecordColumn, Entity as TreatmentRecord, Model as TreatmentRecordModel,
    TreatmentStatus,
};
