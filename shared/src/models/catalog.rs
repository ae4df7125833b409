//! Catalog models: categories, ingredients and products with their recipes

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::units::MeasureUnit;

/// Grouping for ingredients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// A stocked raw ingredient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub category_id: Option<Uuid>,
    /// Current stock, expressed in `unit`
    pub quantity: Decimal,
    /// Safety stock below which the ingredient is reported as low
    pub min_quantity: Decimal,
    /// Native unit in which stock is stored and compared
    pub unit: MeasureUnit,
}

impl Ingredient {
    pub fn is_low_stock(&self) -> bool {
        self.quantity < self.min_quantity
    }
}

/// A product offered for sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
}

/// Quantity of one ingredient needed to make a single unit of a product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeLine {
    pub ingredient_id: Uuid,
    pub ingredient_name: String,
    /// Expressed in the ingredient's native unit
    pub quantity: Decimal,
}

impl RecipeLine {
    /// Ingredient quantity consumed when `sold` units of the product are sold,
    /// or `None` if it does not fit in a `Decimal`
    pub fn required_for(&self, sold: Decimal) -> Option<Decimal> {
        self.quantity.checked_mul(sold)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductWithRecipe {
    #[serde(flatten)]
    pub product: Product,
    pub recipe: Vec<RecipeLine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(quantity: i64, min_quantity: i64) -> Ingredient {
        Ingredient {
            id: Uuid::new_v4(),
            name: "Flour".to_string(),
            category_id: None,
            quantity: Decimal::from(quantity),
            min_quantity: Decimal::from(min_quantity),
            unit: MeasureUnit::Grams,
        }
    }

    #[test]
    fn test_low_stock_is_strictly_below_minimum() {
        assert!(ingredient(99, 100).is_low_stock());
        assert!(!ingredient(100, 100).is_low_stock());
        assert!(!ingredient(500, 100).is_low_stock());
    }

    #[test]
    fn test_recipe_scales_linearly() {
        let line = RecipeLine {
            ingredient_id: Uuid::new_v4(),
            ingredient_name: "Flour".to_string(),
            quantity: Decimal::from(200),
        };
        assert_eq!(line.required_for(Decimal::from(3)), Some(Decimal::from(600)));
        assert_eq!(line.required_for(Decimal::new(5, 1)), Some(Decimal::from(100)));
        assert_eq!(line.required_for(Decimal::MAX), None);
    }
}
