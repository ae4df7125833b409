//! PostgreSQL store
//!
//! Stock is locked with `SELECT ... FOR UPDATE` inside the posting's
//! transaction, so a concurrent posting touching the same ingredient waits
//! for the first one to commit and then re-reads the updated quantity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{
    CatalogCounts, InventoryStore, MovementTotals, NewMovement, NewMovementLines,
    StockTransaction, TimeWindow,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    Ingredient, Movement, MovementInflowLine, MovementLines, MovementOutflowLine, MovementRecord,
    MovementType, Product, ProductWithRecipe, RecipeLine,
};

/// Store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Row for ingredient queries
#[derive(Debug, FromRow)]
struct IngredientRow {
    id: Uuid,
    name: String,
    category_id: Option<Uuid>,
    quantity: Decimal,
    min_quantity: Decimal,
    unit: String,
}

impl TryFrom<IngredientRow> for Ingredient {
    type Error = AppError;

    fn try_from(row: IngredientRow) -> Result<Self, Self::Error> {
        Ok(Ingredient {
            id: row.id,
            name: row.name,
            category_id: row.category_id,
            quantity: row.quantity,
            min_quantity: row.min_quantity,
            unit: row.unit.parse().map_err(corrupt)?,
        })
    }
}

/// Row for movement header queries
#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    user_name: String,
    value: Decimal,
    movement_type: String,
    created_at: DateTime<Utc>,
    commentary: Option<String>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(Movement {
            id: row.id,
            user: row.user_name,
            value: row.value,
            movement_type: row.movement_type.parse().map_err(corrupt)?,
            date: row.created_at,
            commentary: row.commentary,
        })
    }
}

#[derive(Debug, FromRow)]
struct InflowLineRow {
    id: Uuid,
    movement_id: Uuid,
    name: String,
    quantity: Decimal,
    price: Decimal,
    measure: String,
}

impl TryFrom<InflowLineRow> for MovementInflowLine {
    type Error = AppError;

    fn try_from(row: InflowLineRow) -> Result<Self, Self::Error> {
        Ok(MovementInflowLine {
            id: row.id,
            movement_id: row.movement_id,
            name: row.name,
            quantity: row.quantity,
            price: row.price,
            measure: row.measure.parse().map_err(corrupt)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct OutflowLineRow {
    id: Uuid,
    movement_id: Uuid,
    name: String,
    quantity: Decimal,
    price: Decimal,
}

impl From<OutflowLineRow> for MovementOutflowLine {
    fn from(row: OutflowLineRow) -> Self {
        MovementOutflowLine {
            id: row.id,
            movement_id: row.movement_id,
            name: row.name,
            quantity: row.quantity,
            price: row.price,
        }
    }
}

#[derive(Debug, FromRow)]
struct RecipeRow {
    ingredient_id: Uuid,
    ingredient_name: String,
    quantity: Decimal,
}

fn corrupt(err: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("Corrupt row: {}", err))
}

const MOVEMENT_COLUMNS: &str = "id, user_name, value, movement_type, created_at, commentary";

async fn load_lines(conn: &mut PgConnection, movement: &Movement) -> AppResult<MovementLines> {
    let lines = match movement.movement_type {
        MovementType::Inflow => {
            let rows = sqlx::query_as::<_, InflowLineRow>(
                r#"
                SELECT id, movement_id, name, quantity, price, measure
                FROM movement_inflows
                WHERE movement_id = $1
                ORDER BY position
                "#,
            )
            .bind(movement.id)
            .fetch_all(&mut *conn)
            .await?;

            MovementLines::Inflow(
                rows.into_iter()
                    .map(MovementInflowLine::try_from)
                    .collect::<AppResult<_>>()?,
            )
        }
        MovementType::Outflow => {
            let rows = sqlx::query_as::<_, OutflowLineRow>(
                r#"
                SELECT id, movement_id, name, quantity, price
                FROM movement_outflows
                WHERE movement_id = $1
                ORDER BY position
                "#,
            )
            .bind(movement.id)
            .fetch_all(&mut *conn)
            .await?;

            MovementLines::Outflow(rows.into_iter().map(MovementOutflowLine::from).collect())
        }
    };
    Ok(lines)
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn StockTransaction>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgStockTransaction { tx }))
    }

    async fn list_movements(&self, window: Option<TimeWindow>) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            SELECT {MOVEMENT_COLUMNS}
            FROM movements
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at < $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(window.map(|w| w.from))
        .bind(window.map(|w| w.until))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Movement::try_from).collect()
    }

    async fn recent_movements(&self, limit: i64) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movements ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Movement::try_from).collect()
    }

    async fn get_movement(&self, id: Uuid) -> AppResult<Option<MovementRecord>> {
        let mut conn = self.db.acquire().await?;

        let row = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let movement = Movement::try_from(row)?;
        let lines = load_lines(&mut conn, &movement).await?;

        Ok(Some(MovementRecord { movement, lines }))
    }

    async fn delete_movement(&self, id: Uuid) -> AppResult<bool> {
        // Lines go with the header through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM movements WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn movement_totals_since(&self, since: DateTime<Utc>) -> AppResult<MovementTotals> {
        let (inflow, outflow) = sqlx::query_as::<_, (Decimal, Decimal)>(
            r#"
            SELECT COALESCE(SUM(value) FILTER (WHERE movement_type = 'in'), 0),
                   COALESCE(SUM(value) FILTER (WHERE movement_type = 'out'), 0)
            FROM movements
            WHERE created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_one(&self.db)
        .await?;

        Ok(MovementTotals { inflow, outflow })
    }

    async fn low_stock_ingredients(&self) -> AppResult<Vec<Ingredient>> {
        let rows = sqlx::query_as::<_, IngredientRow>(
            r#"
            SELECT id, name, category_id, quantity, min_quantity, unit
            FROM ingredients
            WHERE quantity < min_quantity
            ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Ingredient::try_from).collect()
    }

    async fn catalog_counts(&self) -> AppResult<CatalogCounts> {
        let (movements, products, categories) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT (SELECT COUNT(*) FROM movements),
                   (SELECT COUNT(*) FROM products),
                   (SELECT COUNT(*) FROM categories)
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(CatalogCounts {
            movements,
            products,
            categories,
        })
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

/// One posting's database transaction; rolled back when dropped uncommitted
struct PgStockTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StockTransaction for PgStockTransaction {
    async fn get_ingredient(&mut self, id: Uuid) -> AppResult<Option<Ingredient>> {
        let row = sqlx::query_as::<_, IngredientRow>(
            r#"
            SELECT id, name, category_id, quantity, min_quantity, unit
            FROM ingredients
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Ingredient::try_from).transpose()
    }

    async fn get_product_with_recipe(&mut self, id: Uuid) -> AppResult<Option<ProductWithRecipe>> {
        let product = sqlx::query_as::<_, (Uuid, String, Decimal)>(
            "SELECT id, name, price FROM products WHERE id = $1 FOR SHARE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some((id, name, price)) = product else {
            return Ok(None);
        };

        let recipe = sqlx::query_as::<_, RecipeRow>(
            r#"
            SELECT pi.ingredient_id, i.name AS ingredient_name, pi.quantity
            FROM product_ingredients pi
            JOIN ingredients i ON i.id = pi.ingredient_id
            WHERE pi.product_id = $1
            ORDER BY i.name
            "#,
        )
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Some(ProductWithRecipe {
            product: Product { id, name, price },
            recipe: recipe
                .into_iter()
                .map(|row| RecipeLine {
                    ingredient_id: row.ingredient_id,
                    ingredient_name: row.ingredient_name,
                    quantity: row.quantity,
                })
                .collect(),
        }))
    }

    async fn bulk_update_ingredient_quantities(&mut self, updates: &[(Uuid, Decimal)]) -> AppResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let (ids, quantities): (Vec<Uuid>, Vec<Decimal>) = updates.iter().copied().unzip();
        let result = sqlx::query(
            r#"
            UPDATE ingredients AS i
            SET quantity = u.quantity
            FROM UNNEST($1::uuid[], $2::numeric[]) AS u(id, quantity)
            WHERE i.id = u.id
            "#,
        )
        .bind(&ids)
        .bind(&quantities)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != updates.len() as u64 {
            return Err(AppError::Internal(format!(
                "Expected to update {} ingredients, updated {}",
                updates.len(),
                result.rows_affected()
            )));
        }
        Ok(())
    }

    async fn insert_movement(&mut self, movement: NewMovement) -> AppResult<MovementRecord> {
        let movement_type = movement.lines.movement_type();
        let row = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            INSERT INTO movements (user_name, value, movement_type, commentary)
            VALUES ($1, $2, $3, $4)
            RETURNING {MOVEMENT_COLUMNS}
            "#
        ))
        .bind(&movement.user)
        .bind(movement.value)
        .bind(movement_type.as_str())
        .bind(&movement.commentary)
        .fetch_one(&mut *self.tx)
        .await?;
        let header = Movement::try_from(row)?;

        let lines = match movement.lines {
            NewMovementLines::Inflow(lines) => {
                let mut stored = Vec::with_capacity(lines.len());
                for (position, line) in lines.into_iter().enumerate() {
                    let row = sqlx::query_as::<_, InflowLineRow>(
                        r#"
                        INSERT INTO movement_inflows (movement_id, position, name, quantity, price, measure)
                        VALUES ($1, $2, $3, $4, $5, $6)
                        RETURNING id, movement_id, name, quantity, price, measure
                        "#,
                    )
                    .bind(header.id)
                    .bind(position as i32)
                    .bind(&line.name)
                    .bind(line.quantity)
                    .bind(line.price)
                    .bind(line.measure.code())
                    .fetch_one(&mut *self.tx)
                    .await?;
                    stored.push(MovementInflowLine::try_from(row)?);
                }
                MovementLines::Inflow(stored)
            }
            NewMovementLines::Outflow(lines) => {
                let mut stored = Vec::with_capacity(lines.len());
                for (position, line) in lines.into_iter().enumerate() {
                    let row = sqlx::query_as::<_, OutflowLineRow>(
                        r#"
                        INSERT INTO movement_outflows (movement_id, position, name, quantity, price)
                        VALUES ($1, $2, $3, $4, $5)
                        RETURNING id, movement_id, name, quantity, price
                        "#,
                    )
                    .bind(header.id)
                    .bind(position as i32)
                    .bind(&line.name)
                    .bind(line.quantity)
                    .bind(line.price)
                    .fetch_one(&mut *self.tx)
                    .await?;
                    stored.push(MovementOutflowLine::from(row));
                }
                MovementLines::Outflow(stored)
            }
        };

        Ok(MovementRecord {
            movement: header,
            lines,
        })
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
