//! In-memory store
//!
//! Serves `memory://` deployments and the test suite. A transaction holds the
//! store mutex from `begin` until it is committed or dropped and works on a
//! private copy of the state, so postings are fully serialized and a dropped
//! transaction leaves no trace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    CatalogCounts, InventoryStore, MovementTotals, NewMovement, NewMovementLines,
    StockTransaction, TimeWindow,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    Category, Ingredient, MeasureUnit, Movement, MovementInflowLine, MovementLines,
    MovementOutflowLine, MovementRecord, MovementType, Product, ProductWithRecipe, RecipeLine,
};

/// Input for adding an ingredient to the catalog
#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub category_id: Option<Uuid>,
    pub quantity: Decimal,
    pub min_quantity: Decimal,
    pub unit: MeasureUnit,
}

impl NewIngredient {
    pub fn new(name: impl Into<String>, quantity: Decimal, unit: MeasureUnit) -> Self {
        Self {
            name: name.into(),
            category_id: None,
            quantity,
            min_quantity: Decimal::ZERO,
            unit,
        }
    }

    pub fn with_min_quantity(mut self, min_quantity: Decimal) -> Self {
        self.min_quantity = min_quantity;
        self
    }

    pub fn in_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    categories: HashMap<Uuid, Category>,
    ingredients: HashMap<Uuid, Ingredient>,
    products: HashMap<Uuid, Product>,
    recipes: HashMap<Uuid, Vec<(Uuid, Decimal)>>,
    /// Ledger in posting order
    movements: Vec<MovementRecord>,
}

impl MemoryState {
    fn product_with_recipe(&self, id: Uuid) -> Option<ProductWithRecipe> {
        let product = self.products.get(&id)?.clone();
        let mut recipe: Vec<RecipeLine> = self
            .recipes
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|(ingredient_id, quantity)| {
                self.ingredients.get(ingredient_id).map(|ingredient| RecipeLine {
                    ingredient_id: *ingredient_id,
                    ingredient_name: ingredient.name.clone(),
                    quantity: *quantity,
                })
            })
            .collect();
        recipe.sort_by(|a, b| a.ingredient_name.cmp(&b.ingredient_name));

        Some(ProductWithRecipe { product, recipe })
    }
}

/// Store keeping the catalog and the ledger in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a category; names are unique regardless of case
    pub async fn add_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> AppResult<Category> {
        let mut state = self.state.lock().await;
        if state
            .categories
            .values()
            .any(|c| c.name.eq_ignore_ascii_case(name))
        {
            return Err(AppError::ValidationError(format!(
                "A category named {} already exists",
                name
            )));
        }

        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.map(str::to_string),
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    /// Add an ingredient; names are unique regardless of case
    pub async fn add_ingredient(&self, input: NewIngredient) -> AppResult<Ingredient> {
        let mut state = self.state.lock().await;
        if state
            .ingredients
            .values()
            .any(|i| i.name.eq_ignore_ascii_case(&input.name))
        {
            return Err(AppError::ValidationError(format!(
                "An ingredient named {} already exists",
                input.name
            )));
        }
        if input.quantity < Decimal::ZERO {
            return Err(AppError::ValidationError(
                "Ingredient quantity cannot be negative".to_string(),
            ));
        }
        if let Some(category_id) = input.category_id {
            if !state.categories.contains_key(&category_id) {
                return Err(AppError::NotFound("Category".to_string()));
            }
        }

        let ingredient = Ingredient {
            id: Uuid::new_v4(),
            name: input.name,
            category_id: input.category_id,
            quantity: input.quantity,
            min_quantity: input.min_quantity,
            unit: input.unit,
        };
        state.ingredients.insert(ingredient.id, ingredient.clone());
        Ok(ingredient)
    }

    /// Add a product with its recipe of `(ingredient_id, quantity per unit)`
    pub async fn add_product(
        &self,
        name: &str,
        price: Decimal,
        recipe: &[(Uuid, Decimal)],
    ) -> AppResult<ProductWithRecipe> {
        let mut state = self.state.lock().await;
        if state
            .products
            .values()
            .any(|p| p.name.eq_ignore_ascii_case(name))
        {
            return Err(AppError::ValidationError(format!(
                "A product named {} already exists",
                name
            )));
        }
        if price < Decimal::ZERO {
            return Err(AppError::ValidationError(
                "Product price cannot be negative".to_string(),
            ));
        }
        for (position, (ingredient_id, quantity)) in recipe.iter().enumerate() {
            if !state.ingredients.contains_key(ingredient_id) {
                return Err(AppError::NotFound("Ingredient".to_string()));
            }
            if *quantity <= Decimal::ZERO {
                return Err(AppError::ValidationError(
                    "Recipe quantities must be greater than 0".to_string(),
                ));
            }
            if recipe[..position].iter().any(|(id, _)| id == ingredient_id) {
                return Err(AppError::ValidationError(
                    "An ingredient can appear only once in a recipe".to_string(),
                ));
            }
        }

        let product = Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price,
        };
        state.products.insert(product.id, product.clone());
        state.recipes.insert(product.id, recipe.to_vec());

        state
            .product_with_recipe(product.id)
            .ok_or_else(|| AppError::Internal("Product vanished after insert".to_string()))
    }

    /// Current snapshot of an ingredient
    pub async fn ingredient(&self, id: Uuid) -> Option<Ingredient> {
        self.state.lock().await.ingredients.get(&id).cloned()
    }

    pub async fn movement_count(&self) -> usize {
        self.state.lock().await.movements.len()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn StockTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    async fn list_movements(&self, window: Option<TimeWindow>) -> AppResult<Vec<Movement>> {
        let state = self.state.lock().await;
        let mut movements: Vec<Movement> = state
            .movements
            .iter()
            .rev()
            .filter(|record| window.map_or(true, |w| w.contains(record.movement.date)))
            .map(|record| record.movement.clone())
            .collect();
        movements.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(movements)
    }

    async fn recent_movements(&self, limit: i64) -> AppResult<Vec<Movement>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut movements = self.list_movements(None).await?;
        movements.truncate(limit);
        Ok(movements)
    }

    async fn get_movement(&self, id: Uuid) -> AppResult<Option<MovementRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .movements
            .iter()
            .find(|record| record.movement.id == id)
            .cloned())
    }

    async fn delete_movement(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.movements.len();
        state.movements.retain(|record| record.movement.id != id);
        Ok(state.movements.len() != before)
    }

    async fn movement_totals_since(&self, since: DateTime<Utc>) -> AppResult<MovementTotals> {
        let state = self.state.lock().await;
        let totals = state
            .movements
            .iter()
            .map(|record| &record.movement)
            .filter(|movement| movement.date >= since)
            .fold(MovementTotals::default(), |mut totals, movement| {
                match movement.movement_type {
                    MovementType::Inflow => totals.inflow += movement.value,
                    MovementType::Outflow => totals.outflow += movement.value,
                }
                totals
            });
        Ok(totals)
    }

    async fn low_stock_ingredients(&self) -> AppResult<Vec<Ingredient>> {
        let state = self.state.lock().await;
        let mut low: Vec<Ingredient> = state
            .ingredients
            .values()
            .filter(|ingredient| ingredient.is_low_stock())
            .cloned()
            .collect();
        low.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(low)
    }

    async fn catalog_counts(&self) -> AppResult<CatalogCounts> {
        let state = self.state.lock().await;
        Ok(CatalogCounts {
            movements: state.movements.len() as i64,
            products: state.products.len() as i64,
            categories: state.categories.len() as i64,
        })
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StockTransaction for MemoryTransaction {
    async fn get_ingredient(&mut self, id: Uuid) -> AppResult<Option<Ingredient>> {
        Ok(self.working.ingredients.get(&id).cloned())
    }

    async fn get_product_with_recipe(&mut self, id: Uuid) -> AppResult<Option<ProductWithRecipe>> {
        Ok(self.working.product_with_recipe(id))
    }

    async fn bulk_update_ingredient_quantities(&mut self, updates: &[(Uuid, Decimal)]) -> AppResult<()> {
        for (id, quantity) in updates {
            if *quantity < Decimal::ZERO {
                return Err(AppError::Internal(format!(
                    "Refusing negative stock for ingredient {}",
                    id
                )));
            }
            let ingredient = self
                .working
                .ingredients
                .get_mut(id)
                .ok_or_else(|| AppError::Internal(format!("Ingredient {} disappeared", id)))?;
            ingredient.quantity = *quantity;
        }
        Ok(())
    }

    async fn insert_movement(&mut self, movement: NewMovement) -> AppResult<MovementRecord> {
        let header = Movement {
            id: Uuid::new_v4(),
            user: movement.user,
            value: movement.value,
            movement_type: movement.lines.movement_type(),
            date: Utc::now(),
            commentary: movement.commentary,
        };

        let lines = match movement.lines {
            NewMovementLines::Inflow(lines) => MovementLines::Inflow(
                lines
                    .into_iter()
                    .map(|line| MovementInflowLine {
                        id: Uuid::new_v4(),
                        movement_id: header.id,
                        name: line.name,
                        quantity: line.quantity,
                        price: line.price,
                        measure: line.measure,
                    })
                    .collect(),
            ),
            NewMovementLines::Outflow(lines) => MovementLines::Outflow(
                lines
                    .into_iter()
                    .map(|line| MovementOutflowLine {
                        id: Uuid::new_v4(),
                        movement_id: header.id,
                        name: line.name,
                        quantity: line.quantity,
                        price: line.price,
                    })
                    .collect(),
            ),
        };

        let record = MovementRecord {
            movement: header,
            lines,
        };
        self.working.movements.push(record.clone());
        Ok(record)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
