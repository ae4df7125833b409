//! Persistence for the catalog and the movement ledger
//!
//! Every posting runs through exactly one [`StockTransaction`]: stock is read,
//! staged and written back inside it, and nothing is visible to other
//! postings until [`StockTransaction::commit`]. Dropping a transaction without
//! committing discards all of its writes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    Ingredient, MeasureUnit, Movement, MovementRecord, MovementType, ProductWithRecipe,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Half-open timestamp window `[from, until)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    /// Window covering whole calendar days, `first` and `last` included.
    /// `None` when `last` is the final representable date.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Option<Self> {
        Some(Self {
            from: start_of_day(first),
            until: start_of_day(last.succ_opt()?),
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at < self.until
    }
}

/// Midnight UTC at the start of `date`
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Ingredient received, as recorded on the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInflowLine {
    pub name: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub measure: MeasureUnit,
}

/// Product sold, as recorded on the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutflowLine {
    pub name: String,
    pub quantity: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewMovementLines {
    Inflow(Vec<NewInflowLine>),
    Outflow(Vec<NewOutflowLine>),
}

impl NewMovementLines {
    pub fn movement_type(&self) -> MovementType {
        match self {
            NewMovementLines::Inflow(_) => MovementType::Inflow,
            NewMovementLines::Outflow(_) => MovementType::Outflow,
        }
    }
}

/// Movement to append to the ledger; id and timestamp are assigned on insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub user: String,
    pub value: Decimal,
    pub commentary: Option<String>,
    pub lines: NewMovementLines,
}

/// Money in and out of the business over a period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementTotals {
    pub inflow: Decimal,
    pub outflow: Decimal,
}

impl MovementTotals {
    /// Sales minus purchases
    pub fn net(&self) -> Decimal {
        self.outflow - self.inflow
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub movements: i64,
    pub products: i64,
    pub categories: i64,
}

/// Unit of work for a single posting.
///
/// Implementations hold a lock on every ingredient returned by
/// [`get_ingredient`](StockTransaction::get_ingredient) until the transaction
/// ends, so concurrent postings touching the same ingredient serialize.
#[async_trait]
pub trait StockTransaction: Send {
    /// Fetch an ingredient and lock it for the rest of the transaction
    async fn get_ingredient(&mut self, id: Uuid) -> AppResult<Option<Ingredient>>;

    async fn get_product_with_recipe(&mut self, id: Uuid) -> AppResult<Option<ProductWithRecipe>>;

    /// Overwrite stock levels with already computed quantities
    async fn bulk_update_ingredient_quantities(&mut self, updates: &[(Uuid, Decimal)]) -> AppResult<()>;

    /// Append a movement and its lines
    async fn insert_movement(&mut self, movement: NewMovement) -> AppResult<MovementRecord>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Catalog and ledger storage
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Start the transaction a posting runs in
    async fn begin(&self) -> AppResult<Box<dyn StockTransaction>>;

    /// Movements newest first, optionally restricted to a time window
    async fn list_movements(&self, window: Option<TimeWindow>) -> AppResult<Vec<Movement>>;

    async fn recent_movements(&self, limit: i64) -> AppResult<Vec<Movement>>;

    async fn get_movement(&self, id: Uuid) -> AppResult<Option<MovementRecord>>;

    /// Delete a movement with its lines; returns whether it existed.
    /// Stock levels are left as they are.
    async fn delete_movement(&self, id: Uuid) -> AppResult<bool>;

    /// Inflow and outflow value of movements dated at or after `since`
    async fn movement_totals_since(&self, since: DateTime<Utc>) -> AppResult<MovementTotals>;

    /// Ingredients whose stock is below their minimum, by name
    async fn low_stock_ingredients(&self) -> AppResult<Vec<Ingredient>>;

    async fn catalog_counts(&self) -> AppResult<CatalogCounts>;

    /// Check that the backing store is reachable
    async fn ping(&self) -> AppResult<()>;
}
