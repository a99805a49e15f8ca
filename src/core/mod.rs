//! Core business logic - framework-agnostic marketplace workflows.
//!
//! Each module owns one entity's lifecycle. Workflows read the entities below
//! them to check preconditions and only write their own, except where a
//! cascade is spelled out (commodity → proposals, transaction acceptance →
//! batch, harvest approval → batch).

/// Batch lifecycle - creation from accepted transactions, cancel, harvest
pub mod batch;
/// Commodity registry - versioned, soft-deletable catalog entries
pub mod commodity;
/// Harvest submission and validation
pub mod harvest;
/// Forgot-password tokens with compensating cleanup
pub mod password_reset;
/// Proposal workflow - planting plans and their validation
pub mod proposal;
/// Delivery regions
pub mod region;
/// Yearly transaction statistics
pub mod report;
/// Per-parent monotonic counters
pub mod sequence;
/// Transaction workflow - purchase requests and the farmer's decision
pub mod transaction;
/// Treatment record sequencing within a batch
pub mod treatment_record;
