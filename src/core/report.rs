//! Report generation business logic.
//!
//! Yearly transaction statistics: per-month counts by status and the revenue of
//! accepted transactions, optionally narrowed to one farmer's commodities. The
//! rows are loaded once and aggregated here, so the result is plain data the
//! outer layer can format however it likes.

use crate::{
    entities::{Transaction, TransactionStatus, commodity, proposal, transaction},
    errors::{Error, Result},
};
use chrono::{Datelike, TimeZone, Utc};
use sea_orm::{JoinType, QuerySelect, RelationTrait, prelude::*};
use serde::Serialize;

/// Statistics for one calendar month.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlyStats {
    /// 1 = January
    pub month: u32,
    pub pending: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub cancelled: u64,
    /// Sum of `total_price` over accepted transactions
    pub revenue: f64,
}

impl MonthlyStats {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.pending + self.accepted + self.rejected + self.cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyTransactionReport {
    pub year: i32,
    pub farmer_id: Option<Uuid>,
    /// Always twelve entries, January first
    pub months: Vec<MonthlyStats>,
    pub total_revenue: f64,
}

impl YearlyTransactionReport {
    /// Accepted share of all decided transactions in the year, as a percentage.
    #[must_use]
    pub fn acceptance_rate(&self) -> f64 {
        let (accepted, decided) = self.months.iter().fold((0, 0), |(a, d), m| {
            (a + m.accepted, d + m.accepted + m.rejected)
        });
        calculate_rate(accepted, decided)
    }
}

/// `part / whole` as a percentage, 0 when `whole` is 0.
#[must_use]
pub fn calculate_rate(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    // Cast safety: counts stay far below 2^52.
    #[allow(clippy::cast_precision_loss)]
    let rate = (part as f64 / whole as f64) * 100.0;
    rate
}

/// Builds the transaction report for `year`, restricted to `farmer_id`'s
/// commodities when given.
///
/// # Errors
/// `BadRequest` for a year chrono cannot represent.
pub async fn generate_yearly_report(
    db: &DatabaseConnection,
    year: i32,
    farmer_id: Option<Uuid>,
) -> Result<YearlyTransactionReport> {
    let start = Utc
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| Error::bad_request(format!("Invalid report year: {year}")))?;
    let end = Utc
        .with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| Error::bad_request(format!("Invalid report year: {year}")))?;

    let mut query = Transaction::find()
        .filter(transaction::Column::CreatedAt.gte(start))
        .filter(transaction::Column::CreatedAt.lt(end));

    if let Some(farmer_id) = farmer_id {
        query = query
            .join(JoinType::InnerJoin, transaction::Relation::Proposal.def())
            .join(JoinType::InnerJoin, proposal::Relation::Commodity.def())
            .filter(commodity::Column::FarmerId.eq(farmer_id));
    }

    let rows = query.all(db).await?;

    let mut months: Vec<MonthlyStats> = (1..=12)
        .map(|month| MonthlyStats {
            month,
            ..MonthlyStats::default()
        })
        .collect();

    for row in &rows {
        let Some(stats) = months.get_mut(row.created_at.month0() as usize) else {
            continue;
        };
        match row.status {
            TransactionStatus::Pending => stats.pending += 1,
            TransactionStatus::Accepted => {
                stats.accepted += 1;
                stats.revenue += row.total_price;
            }
            TransactionStatus::Rejected => stats.rejected += 1,
            TransactionStatus::Cancelled => stats.cancelled += 1,
        }
    }

    let total_revenue = months.iter().map(|m| m.revenue).sum();
    tracing::debug!(year, rows = rows.len(), "yearly transaction report built");

    Ok(YearlyTransactionReport {
        year,
        farmer_id,
        months,
        total_revenue,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::transaction as transaction_core;
    use crate::test_utils::*;
    use chrono::Duration;

    #[test]
    fn test_calculate_rate() {
        assert_eq!(calculate_rate(1, 4), 25.0);
        assert_eq!(calculate_rate(0, 0), 0.0);
    }

    #[tokio::test]
    async fn test_yearly_report_counts_by_month() -> Result<()> {
        // test clock starts on 1 March 2024
        let (db, clock) = setup().await?;
        let planted = create_planting_batch(&db, &clock, "Corn", "Corn A").await?;

        let farmer = Uuid::new_v4();
        let commodity = create_test_commodity(&db, &clock, farmer, "Rice").await?;
        let proposal = create_approved_proposal(&db, &clock, farmer, commodity.id, "Rice A").await?;
        clock.advance(Duration::days(31));
        let pending = create_pending_transaction(&db, &clock, Uuid::new_v4(), proposal.id).await?;
        let withdrawn = create_pending_transaction(&db, &clock, Uuid::new_v4(), proposal.id).await?;
        transaction_core::cancel_transaction(&db, &clock, withdrawn.id, withdrawn.buyer_id).await?;

        let report = generate_yearly_report(&db, 2024, None).await?;
        assert_eq!(report.months.len(), 12);

        let march = &report.months[2];
        assert_eq!(march.month, 3);
        assert_eq!(march.accepted, 1);
        assert_eq!(march.revenue, planted.transaction.total_price);

        let april = &report.months[3];
        assert_eq!(april.pending, 1);
        assert_eq!(april.cancelled, 1);
        assert_eq!(april.total(), 2);

        assert_eq!(report.total_revenue, 50500.0);
        assert_eq!(report.acceptance_rate(), 100.0);
        assert_eq!(pending.status, TransactionStatus::Pending);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["months"][2]["accepted"], 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_yearly_report_farmer_filter_and_range() -> Result<()> {
        let (db, clock) = setup().await?;
        let planted = create_planting_batch(&db, &clock, "Corn", "Corn A").await?;
        create_planting_batch(&db, &clock, "Rice", "Rice A").await?;

        let mine = generate_yearly_report(&db, 2024, Some(planted.farmer)).await?;
        assert_eq!(mine.months[2].accepted, 1);

        let nobody = generate_yearly_report(&db, 2024, Some(Uuid::new_v4())).await?;
        assert_eq!(nobody.total_revenue, 0.0);

        let other_year = generate_yearly_report(&db, 2023, None).await?;
        assert!(other_year.months.iter().all(|m| m.total() == 0));

        Ok(())
    }
}
