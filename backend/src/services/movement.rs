//! Stock movement posting and ledger queries
//!
//! A posting runs in two phases inside one store transaction. First every
//! line is validated against locked stock and the resulting quantities are
//! staged in memory, collecting every problem instead of stopping at the
//! first. Only when no line was rejected are the staged quantities written in
//! one bulk update and the movement appended. A rejected posting changes
//! nothing.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    convert, parse_localized_decimal, ConversionError, Ingredient, MeasureUnit, Movement,
    MovementRecord, MovementType, ProductWithRecipe, QuantityError,
};
use crate::store::{
    InventoryStore, NewInflowLine, NewMovement, NewMovementLines, NewOutflowLine,
    StockTransaction, TimeWindow,
};

/// Form field a numeric entry was typed into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Quantity,
    Price,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Quantity => write!(f, "quantity"),
            Field::Price => write!(f, "price"),
        }
    }
}

/// What a posting selects lines from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Ingredient,
    Product,
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::Ingredient => write!(f, "ingredient"),
            Selection::Product => write!(f, "product"),
        }
    }
}

/// Reason a posting was rejected.
///
/// `EmptySelection` and the two not-found variants abort a posting on their
/// own; the others are collected across all lines and reported together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostingIssue {
    #[error("Select at least 1 {0}")]
    EmptySelection(Selection),

    #[error("Ingredient {0} not found")]
    IngredientNotFound(Uuid),

    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error("Enter a valid {field} for {subject}")]
    InvalidQuantity { field: Field, subject: String },

    #[error("Enter a {field} greater than 0 for {subject}")]
    NonPositiveQuantity { field: Field, subject: String },

    #[error("Unknown unit of measure '{unit}' for {subject}")]
    UnknownUnit { subject: String, unit: String },

    #[error("Cannot convert {from} to {to} for {subject}")]
    UnsupportedConversion {
        subject: String,
        from: MeasureUnit,
        to: MeasureUnit,
    },

    #[error("Quantity too large for {subject}")]
    QuantityTooLarge { subject: String },

    #[error("Insufficient stock for ingredient {ingredient} ({product} needs {required}, {available} available)")]
    InsufficientStock {
        ingredient: String,
        product: String,
        required: Decimal,
        available: Decimal,
    },
}

impl PostingIssue {
    fn from_quantity(err: QuantityError, field: Field, subject: &str) -> Self {
        let subject = subject.to_string();
        match err {
            QuantityError::InvalidQuantity => PostingIssue::InvalidQuantity { field, subject },
            QuantityError::NonPositiveQuantity => PostingIssue::NonPositiveQuantity { field, subject },
        }
    }
}

/// Ingredient receipt as entered in the movement form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InflowLineInput {
    pub ingredient_id: Uuid,
    pub quantity_text: String,
    pub unit_price_text: String,
    /// Unit the quantity was entered in (`g`, `kg` or `unit`)
    pub unit: String,
}

/// Product sale as entered in the movement form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutflowLineInput {
    pub product_id: Uuid,
    pub quantity_text: String,
}

/// Optional date filter for the movement list; applied only when both ends are set
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl MovementFilter {
    pub fn window(&self) -> AppResult<Option<TimeWindow>> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if start > end => Err(AppError::ValidationError(
                "Start date must not be after end date".to_string(),
            )),
            (Some(start), Some(end)) => TimeWindow::days(start, end).map(Some).ok_or_else(|| {
                AppError::ValidationError("End date is out of range".to_string())
            }),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct StagedInflow {
    /// New stock level per touched ingredient
    quantities: Vec<(Uuid, Decimal)>,
    value: Decimal,
    lines: Vec<NewInflowLine>,
}

#[derive(Debug, Clone, PartialEq)]
struct StagedOutflow {
    quantities: Vec<(Uuid, Decimal)>,
    value: Decimal,
    lines: Vec<NewOutflowLine>,
}

/// Validate inflow lines against the locked ingredients and stage new stock.
///
/// The movement value is the sum of the unit prices entered (the amount
/// paid), not price times quantity.
fn stage_inflow(
    lines: &[InflowLineInput],
    ingredients: &HashMap<Uuid, Ingredient>,
) -> Result<StagedInflow, Vec<PostingIssue>> {
    let mut issues = Vec::new();
    let mut quantities: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    let mut value = Decimal::ZERO;
    let mut staged_lines = Vec::with_capacity(lines.len());

    for line in lines {
        let Some(ingredient) = ingredients.get(&line.ingredient_id) else {
            issues.push(PostingIssue::IngredientNotFound(line.ingredient_id));
            continue;
        };
        let subject = ingredient.name.as_str();

        let quantity = parse_localized_decimal(&line.quantity_text)
            .map_err(|e| PostingIssue::from_quantity(e, Field::Quantity, subject));
        let price = parse_localized_decimal(&line.unit_price_text)
            .map_err(|e| PostingIssue::from_quantity(e, Field::Price, subject));
        let unit = line
            .unit
            .parse::<MeasureUnit>()
            .map_err(|e| PostingIssue::UnknownUnit {
                subject: subject.to_string(),
                unit: e.0,
            });

        let (quantity, price, unit) = match (quantity, price, unit) {
            (Ok(quantity), Ok(price), Ok(unit)) => (quantity, price, unit),
            (quantity, price, unit) => {
                issues.extend([quantity.err(), price.err(), unit.err()].into_iter().flatten());
                continue;
            }
        };

        let converted = match convert(quantity, unit, ingredient.unit) {
            Ok(converted) => converted,
            Err(ConversionError::UnsupportedConversion { from, to }) => {
                issues.push(PostingIssue::UnsupportedConversion {
                    subject: subject.to_string(),
                    from,
                    to,
                });
                continue;
            }
            Err(ConversionError::Overflow { .. }) => {
                issues.push(too_large(subject));
                continue;
            }
        };

        let staged = quantities.entry(ingredient.id).or_insert(ingredient.quantity);
        let (Some(new_quantity), Some(new_value)) =
            (staged.checked_add(converted), value.checked_add(price))
        else {
            issues.push(too_large(subject));
            continue;
        };
        *staged = new_quantity;
        value = new_value;
        staged_lines.push(NewInflowLine {
            name: ingredient.name.clone(),
            quantity,
            price,
            measure: unit,
        });
    }

    if !issues.is_empty() {
        return Err(issues);
    }
    Ok(StagedInflow {
        quantities: quantities.into_iter().collect(),
        value,
        lines: staged_lines,
    })
}

/// Validate outflow lines and stage the recipe-driven stock decrements.
///
/// A product line is staged only if every ingredient of its recipe can cover
/// it; later lines see the stock left by earlier accepted ones.
fn stage_outflow(
    lines: &[OutflowLineInput],
    products: &HashMap<Uuid, ProductWithRecipe>,
    ingredients: &HashMap<Uuid, Ingredient>,
) -> Result<StagedOutflow, Vec<PostingIssue>> {
    let mut issues = Vec::new();
    let mut remaining: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    let mut value = Decimal::ZERO;
    let mut staged_lines = Vec::with_capacity(lines.len());

    for line in lines {
        let Some(entry) = products.get(&line.product_id) else {
            issues.push(PostingIssue::ProductNotFound(line.product_id));
            continue;
        };
        let product = &entry.product;

        let sold = match parse_localized_decimal(&line.quantity_text) {
            Ok(sold) => sold,
            Err(e) => {
                issues.push(PostingIssue::from_quantity(e, Field::Quantity, &product.name));
                continue;
            }
        };

        let mut decrements = Vec::with_capacity(entry.recipe.len());
        let mut short = false;
        for item in &entry.recipe {
            let Some(ingredient) = ingredients.get(&item.ingredient_id) else {
                issues.push(PostingIssue::IngredientNotFound(item.ingredient_id));
                short = true;
                continue;
            };

            let available = remaining
                .get(&ingredient.id)
                .copied()
                .unwrap_or(ingredient.quantity);
            let Some(required) = item.required_for(sold) else {
                issues.push(too_large(&product.name));
                short = true;
                break;
            };
            let left = available - required;

            if left < Decimal::ZERO {
                issues.push(PostingIssue::InsufficientStock {
                    ingredient: ingredient.name.clone(),
                    product: product.name.clone(),
                    required,
                    available,
                });
                short = true;
            } else {
                decrements.push((ingredient.id, left));
            }
        }
        if short {
            continue;
        }

        let line_value = product.price.checked_mul(sold);
        let Some((line_value, new_value)) =
            line_value.and_then(|line| Some((line, value.checked_add(line)?)))
        else {
            issues.push(too_large(&product.name));
            continue;
        };

        remaining.extend(decrements);
        value = new_value;
        staged_lines.push(NewOutflowLine {
            name: product.name.clone(),
            quantity: sold,
            price: line_value,
        });
    }

    if !issues.is_empty() {
        return Err(issues);
    }
    Ok(StagedOutflow {
        quantities: remaining.into_iter().collect(),
        value,
        lines: staged_lines,
    })
}

fn too_large(subject: &str) -> PostingIssue {
    PostingIssue::QuantityTooLarge {
        subject: subject.to_string(),
    }
}

/// Lock ingredients in ascending id order so concurrent postings cannot deadlock
async fn lock_ingredients(
    tx: &mut dyn StockTransaction,
    ids: BTreeSet<Uuid>,
) -> AppResult<HashMap<Uuid, Ingredient>> {
    let mut locked = HashMap::with_capacity(ids.len());
    for id in ids {
        if let Some(ingredient) = tx.get_ingredient(id).await? {
            locked.insert(id, ingredient);
        }
    }
    Ok(locked)
}

fn normalize_commentary(commentary: Option<String>) -> Option<String> {
    commentary
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn reject(movement_type: MovementType, issues: Vec<PostingIssue>) -> AppError {
    warn!(
        movement_type = movement_type.as_str(),
        issues = issues.len(),
        "Movement rejected"
    );
    AppError::Validation(issues)
}

/// Service posting movements and reading the ledger
#[derive(Clone)]
pub struct MovementService {
    store: Arc<dyn InventoryStore>,
}

impl MovementService {
    /// Create a new MovementService instance
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Receive ingredients into stock.
    ///
    /// Quantities are converted from the unit entered into each ingredient's
    /// native unit before being added; the ledger keeps the quantity and unit
    /// as entered.
    #[tracing::instrument(skip(self, lines, commentary), fields(lines = lines.len()))]
    pub async fn post_inflow(
        &self,
        lines: Vec<InflowLineInput>,
        commentary: Option<String>,
        actor: &str,
    ) -> AppResult<MovementRecord> {
        if lines.is_empty() {
            return Err(PostingIssue::EmptySelection(Selection::Ingredient).into());
        }

        let mut tx = self.store.begin().await?;

        let ids = lines.iter().map(|line| line.ingredient_id).collect();
        let ingredients = lock_ingredients(tx.as_mut(), ids).await?;
        if let Some(missing) = lines
            .iter()
            .find(|line| !ingredients.contains_key(&line.ingredient_id))
        {
            return Err(PostingIssue::IngredientNotFound(missing.ingredient_id).into());
        }

        let staged = stage_inflow(&lines, &ingredients)
            .map_err(|issues| reject(MovementType::Inflow, issues))?;

        tx.bulk_update_ingredient_quantities(&staged.quantities)
            .await?;
        let record = tx
            .insert_movement(NewMovement {
                user: actor.to_string(),
                value: staged.value,
                commentary: normalize_commentary(commentary),
                lines: NewMovementLines::Inflow(staged.lines),
            })
            .await?;
        tx.commit().await?;

        info!(
            movement_id = %record.movement.id,
            value = %record.movement.value,
            lines = record.lines.len(),
            "Inflow registered"
        );
        Ok(record)
    }

    /// Sell products, consuming their recipes' ingredients from stock
    #[tracing::instrument(skip(self, lines, commentary), fields(lines = lines.len()))]
    pub async fn post_outflow(
        &self,
        lines: Vec<OutflowLineInput>,
        commentary: Option<String>,
        actor: &str,
    ) -> AppResult<MovementRecord> {
        if lines.is_empty() {
            return Err(PostingIssue::EmptySelection(Selection::Product).into());
        }

        let mut tx = self.store.begin().await?;

        let mut products = HashMap::new();
        for line in &lines {
            if products.contains_key(&line.product_id) {
                continue;
            }
            let product = tx
                .get_product_with_recipe(line.product_id)
                .await?
                .ok_or(PostingIssue::ProductNotFound(line.product_id))?;
            products.insert(line.product_id, product);
        }

        let ids: BTreeSet<Uuid> = products
            .values()
            .flat_map(|product| product.recipe.iter().map(|item| item.ingredient_id))
            .collect();
        let ingredients = lock_ingredients(tx.as_mut(), ids.clone()).await?;
        if let Some(missing) = ids.iter().find(|id| !ingredients.contains_key(id)) {
            return Err(PostingIssue::IngredientNotFound(*missing).into());
        }

        let staged = stage_outflow(&lines, &products, &ingredients)
            .map_err(|issues| reject(MovementType::Outflow, issues))?;

        tx.bulk_update_ingredient_quantities(&staged.quantities)
            .await?;
        let record = tx
            .insert_movement(NewMovement {
                user: actor.to_string(),
                value: staged.value,
                commentary: normalize_commentary(commentary),
                lines: NewMovementLines::Outflow(staged.lines),
            })
            .await?;
        tx.commit().await?;

        info!(
            movement_id = %record.movement.id,
            value = %record.movement.value,
            lines = record.lines.len(),
            "Outflow registered"
        );
        Ok(record)
    }

    /// List movements newest first, optionally within a date range
    pub async fn list_movements(&self, filter: &MovementFilter) -> AppResult<Vec<Movement>> {
        let window = filter.window()?;
        self.store.list_movements(window).await
    }

    /// Get a movement with its lines
    pub async fn get_movement(&self, id: Uuid) -> AppResult<MovementRecord> {
        self.store
            .get_movement(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Movement".to_string()))
    }

    /// Delete a movement and its lines; stock levels are not reverted
    pub async fn delete_movement(&self, id: Uuid) -> AppResult<()> {
        if !self.store.delete_movement(id).await? {
            return Err(AppError::NotFound("Movement".to_string()));
        }
        info!(movement_id = %id, "Movement deleted");
        Ok(())
    }
}
