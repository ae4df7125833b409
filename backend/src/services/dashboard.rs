//! Dashboard metrics
//! Catalog counts, low stock alerts and net cash flow per reporting period

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::AppResult;
use crate::models::{Ingredient, Movement};
use crate::store::{start_of_day, InventoryStore};

/// Number of movements listed on the dashboard
pub const RECENT_MOVEMENTS: i64 = 5;

/// Dashboard metrics
#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub total_movements: i64,
    pub total_products: i64,
    pub total_categories: i64,
    pub low_stock_count: usize,
    pub low_stock_alerts: Vec<Ingredient>,
    pub recent_movements: Vec<Movement>,
    /// Outflow value minus inflow value since the start of today
    pub daily_net: Decimal,
    /// Same, since the Monday of the current week
    pub weekly_net: Decimal,
    /// Same, since the first of the current month
    pub monthly_net: Decimal,
}

/// First day of each reporting period containing a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriods {
    pub day: NaiveDate,
    pub week: NaiveDate,
    pub month: NaiveDate,
}

impl ReportingPeriods {
    pub fn starting(today: NaiveDate) -> Self {
        let week = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        let month = today - Duration::days(i64::from(today.day0()));
        Self {
            day: today,
            week,
            month,
        }
    }
}

/// Dashboard service
#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn InventoryStore>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Build the dashboard as seen on `today`
    pub async fn summary(&self, today: NaiveDate) -> AppResult<DashboardSummary> {
        let periods = ReportingPeriods::starting(today);

        let counts = self.store.catalog_counts().await?;
        let low_stock_alerts = self.store.low_stock_ingredients().await?;
        let recent_movements = self.store.recent_movements(RECENT_MOVEMENTS).await?;

        let daily = self.store.movement_totals_since(start_of_day(periods.day)).await?;
        let weekly = self.store.movement_totals_since(start_of_day(periods.week)).await?;
        let monthly = self.store.movement_totals_since(start_of_day(periods.month)).await?;

        Ok(DashboardSummary {
            total_movements: counts.movements,
            total_products: counts.products,
            total_categories: counts.categories,
            low_stock_count: low_stock_alerts.len(),
            low_stock_alerts,
            recent_movements,
            daily_net: daily.net(),
            weekly_net: weekly.net(),
            monthly_net: monthly.net(),
        })
    }
}
