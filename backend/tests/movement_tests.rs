//! Movement posting tests
//!
//! Runs the posting workflow end to end against the in-memory store:
//! - purchases raise stock after unit conversion
//! - sales consume stock through recipes
//! - a rejected posting leaves stock and the ledger untouched
//! - concurrent sales never oversell

use std::str::FromStr;
use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use kitchen_inventory::models::{MeasureUnit, MovementType};
use kitchen_inventory::services::{
    InflowLineInput, MovementFilter, MovementService, OutflowLineInput, PostingIssue, Selection,
};
use kitchen_inventory::store::memory::NewIngredient;
use kitchen_inventory::store::MemoryStore;
use kitchen_inventory::AppError;

// ============================================================================
// Helpers
// ============================================================================

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn service(store: &MemoryStore) -> MovementService {
    MovementService::new(Arc::new(store.clone()))
}

fn purchase(ingredient_id: Uuid, quantity: &str, price: &str, unit: &str) -> InflowLineInput {
    InflowLineInput {
        ingredient_id,
        quantity_text: quantity.to_string(),
        unit_price_text: price.to_string(),
        unit: unit.to_string(),
    }
}

fn sale(product_id: Uuid, quantity: &str) -> OutflowLineInput {
    OutflowLineInput {
        product_id,
        quantity_text: quantity.to_string(),
    }
}

async fn ingredient(store: &MemoryStore, name: &str, quantity: &str, unit: MeasureUnit) -> Uuid {
    store
        .add_ingredient(NewIngredient::new(name, dec(quantity), unit))
        .await
        .unwrap()
        .id
}

async fn stock(store: &MemoryStore, id: Uuid) -> Decimal {
    store.ingredient(id).await.unwrap().quantity
}

// ============================================================================
// Inflow
// ============================================================================

#[tokio::test]
async fn test_purchase_in_kilograms_raises_gram_stock() {
    let store = MemoryStore::new();
    let flour = ingredient(&store, "Flour", "1000", MeasureUnit::Grams).await;

    let record = service(&store)
        .post_inflow(
            vec![purchase(flour, "1,5", "12,50", "kg")],
            Some("  weekly order ".to_string()),
            "Ana",
        )
        .await
        .unwrap();

    assert_eq!(stock(&store, flour).await, dec("2500"));
    assert_eq!(record.movement.movement_type, MovementType::Inflow);
    assert_eq!(record.movement.user, "Ana");
    assert_eq!(record.movement.value, dec("12.50"));
    assert_eq!(record.movement.commentary.as_deref(), Some("weekly order"));

    let lines = record.inflow_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].name, "Flour");
    assert_eq!(lines[0].quantity, dec("1.5"));
    assert_eq!(lines[0].measure, MeasureUnit::Kilograms);
    assert_eq!(store.movement_count().await, 1);
}

#[tokio::test]
async fn test_flour_purchase() {
    let store = MemoryStore::new();
    let flour = ingredient(&store, "Flour", "500", MeasureUnit::Grams).await;

    let record = service(&store)
        .post_inflow(vec![purchase(flour, "2", "10,00", "kg")], None, "Ana")
        .await
        .unwrap();

    assert_eq!(stock(&store, flour).await, dec("2500"));
    assert_eq!(record.movement.value, dec("10.00"));
    let lines = record.inflow_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, dec("2"));
    assert_eq!(lines[0].price, dec("10.00"));
}

#[tokio::test]
async fn test_purchase_with_thousands_separator() {
    let store = MemoryStore::new();
    let sugar = ingredient(&store, "Sugar", "0", MeasureUnit::Grams).await;

    service(&store)
        .post_inflow(vec![purchase(sugar, "1.250,5", "3", "g")], None, "Ana")
        .await
        .unwrap();

    assert_eq!(stock(&store, sugar).await, dec("1250.5"));
}

#[tokio::test]
async fn test_empty_purchase_rejected() {
    let store = MemoryStore::new();

    let err = service(&store)
        .post_inflow(Vec::new(), None, "Ana")
        .await
        .unwrap_err();

    assert_eq!(
        err.issues(),
        &[PostingIssue::EmptySelection(Selection::Ingredient)]
    );
    assert_eq!(err.messages(), vec!["Select at least 1 ingredient".to_string()]);
}

#[tokio::test]
async fn test_invalid_purchase_changes_nothing() {
    let store = MemoryStore::new();
    let flour = ingredient(&store, "Flour", "1000", MeasureUnit::Grams).await;
    let eggs = ingredient(&store, "Eggs", "12", MeasureUnit::Count).await;

    let err = service(&store)
        .post_inflow(
            vec![
                purchase(flour, "2", "10", "kg"),
                purchase(eggs, "0", "4", "unit"),
            ],
            None,
            "Ana",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(err.issues().len(), 1);
    assert_eq!(stock(&store, flour).await, dec("1000"));
    assert_eq!(stock(&store, eggs).await, dec("12"));
    assert_eq!(store.movement_count().await, 0);
}

#[tokio::test]
async fn test_purchase_of_unknown_ingredient() {
    let store = MemoryStore::new();
    let ghost = Uuid::new_v4();

    let err = service(&store)
        .post_inflow(vec![purchase(ghost, "1", "1", "g")], None, "Ana")
        .await
        .unwrap_err();

    assert_eq!(err.issues(), &[PostingIssue::IngredientNotFound(ghost)]);
}

// ============================================================================
// Outflow
// ============================================================================

#[tokio::test]
async fn test_sale_consumes_recipe() {
    let store = MemoryStore::new();
    let flour = ingredient(&store, "Flour", "1000", MeasureUnit::Grams).await;
    let burger = store
        .add_product("Burger", dec("25"), &[(flour, dec("200"))])
        .await
        .unwrap();

    let record = service(&store)
        .post_outflow(vec![sale(burger.product.id, "3")], None, "Bruno")
        .await
        .unwrap();

    assert_eq!(stock(&store, flour).await, dec("400"));
    assert_eq!(record.movement.movement_type, MovementType::Outflow);
    assert_eq!(record.movement.value, dec("75"));
    assert_eq!(record.movement.commentary, None);

    let lines = record.outflow_lines();
    assert_eq!(lines[0].name, "Burger");
    assert_eq!(lines[0].quantity, dec("3"));
}

#[tokio::test]
async fn test_burger_shortage() {
    let store = MemoryStore::new();
    let flour = ingredient(&store, "Flour", "150", MeasureUnit::Grams).await;
    let burger = store
        .add_product("Burger", dec("25"), &[(flour, dec("200"))])
        .await
        .unwrap();

    let err = service(&store)
        .post_outflow(vec![sale(burger.product.id, "1")], None, "Bruno")
        .await
        .unwrap_err();

    assert_eq!(
        err.issues(),
        &[PostingIssue::InsufficientStock {
            ingredient: "Flour".to_string(),
            product: "Burger".to_string(),
            required: dec("200"),
            available: dec("150"),
        }]
    );
    assert_eq!(stock(&store, flour).await, dec("150"));
    assert_eq!(store.movement_count().await, 0);
}

#[tokio::test]
async fn test_shortage_rolls_back_whole_sale() {
    let store = MemoryStore::new();
    let flour = ingredient(&store, "Flour", "100", MeasureUnit::Grams).await;
    let cheese = ingredient(&store, "Cheese", "0", MeasureUnit::Count).await;
    let water = ingredient(&store, "Water", "5000", MeasureUnit::Grams).await;
    let burger = store
        .add_product(
            "Burger",
            dec("25"),
            &[(flour, dec("200")), (cheese, dec("1")), (water, dec("50"))],
        )
        .await
        .unwrap();

    let err = service(&store)
        .post_outflow(vec![sale(burger.product.id, "1")], None, "Bruno")
        .await
        .unwrap_err();

    let short: Vec<&str> = err
        .issues()
        .iter()
        .map(|issue| match issue {
            PostingIssue::InsufficientStock { ingredient, .. } => ingredient.as_str(),
            other => panic!("unexpected issue {other:?}"),
        })
        .collect();
    assert_eq!(short, vec!["Cheese", "Flour"]);

    assert_eq!(stock(&store, flour).await, dec("100"));
    assert_eq!(stock(&store, cheese).await, dec("0"));
    assert_eq!(stock(&store, water).await, dec("5000"));
    assert_eq!(store.movement_count().await, 0);
}

#[tokio::test]
async fn test_sale_exactly_empties_stock() {
    let store = MemoryStore::new();
    let buns = ingredient(&store, "Buns", "2", MeasureUnit::Count).await;
    let burger = store
        .add_product("Burger", dec("25"), &[(buns, dec("1"))])
        .await
        .unwrap();

    service(&store)
        .post_outflow(vec![sale(burger.product.id, "2")], None, "Bruno")
        .await
        .unwrap();

    assert_eq!(stock(&store, buns).await, Decimal::ZERO);
}

#[tokio::test]
async fn test_sale_of_unknown_product() {
    let store = MemoryStore::new();
    let ghost = Uuid::new_v4();

    let err = service(&store)
        .post_outflow(vec![sale(ghost, "1")], None, "Bruno")
        .await
        .unwrap_err();

    assert_eq!(err.issues(), &[PostingIssue::ProductNotFound(ghost)]);
    assert_eq!(store.movement_count().await, 0);
}

#[tokio::test]
async fn test_empty_sale_rejected() {
    let store = MemoryStore::new();

    let err = service(&store)
        .post_outflow(Vec::new(), None, "Bruno")
        .await
        .unwrap_err();

    assert_eq!(err.issues(), &[PostingIssue::EmptySelection(Selection::Product)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_sales_never_oversell() {
    let store = MemoryStore::new();
    let flour = ingredient(&store, "Flour", "300", MeasureUnit::Grams).await;
    let burger = store
        .add_product("Burger", dec("25"), &[(flour, dec("200"))])
        .await
        .unwrap();
    let product_id = burger.product.id;

    let handles: Vec<_> = ["Ana", "Bruno"]
        .into_iter()
        .map(|actor| {
            let service = service(&store);
            tokio::spawn(async move {
                service
                    .post_outflow(vec![sale(product_id, "1")], None, actor)
                    .await
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(stock(&store, flour).await, dec("100"));
    assert_eq!(store.movement_count().await, 1);
}

// ============================================================================
// Out-of-range quantities
// ============================================================================

const HUGE_QUANTITY: &str = "79.228.162.514.264.337.593.543.950";

#[tokio::test]
async fn test_oversized_purchase_is_rejected_not_fatal() {
    let store = MemoryStore::new();
    let flour = ingredient(&store, "Flour", "1000", MeasureUnit::Grams).await;

    let err = service(&store)
        .post_inflow(vec![purchase(flour, HUGE_QUANTITY, "1", "kg")], None, "Ana")
        .await
        .unwrap_err();

    assert_eq!(
        err.issues(),
        &[PostingIssue::QuantityTooLarge { subject: "Flour".to_string() }]
    );
    assert_eq!(stock(&store, flour).await, dec("1000"));
    assert_eq!(store.movement_count().await, 0);
}

#[tokio::test]
async fn test_oversized_sale_is_rejected_not_fatal() {
    let store = MemoryStore::new();
    let salt = ingredient(&store, "Salt", "100000", MeasureUnit::Grams).await;
    let caviar = store
        .add_product("Caviar", dec("100000"), &[(salt, dec("0.000000000000000000001"))])
        .await
        .unwrap();

    let err = service(&store)
        .post_outflow(vec![sale(caviar.product.id, HUGE_QUANTITY)], None, "Bruno")
        .await
        .unwrap_err();

    assert_eq!(
        err.issues(),
        &[PostingIssue::QuantityTooLarge { subject: "Caviar".to_string() }]
    );
    assert_eq!(stock(&store, salt).await, dec("100000"));
    assert_eq!(store.movement_count().await, 0);
}

// ============================================================================
// Ledger queries
// ============================================================================

#[tokio::test]
async fn test_list_get_and_delete() {
    let store = MemoryStore::new();
    let flour = ingredient(&store, "Flour", "0", MeasureUnit::Grams).await;
    let service = service(&store);

    let first = service
        .post_inflow(vec![purchase(flour, "1", "2", "kg")], None, "Ana")
        .await
        .unwrap();
    let second = service
        .post_inflow(vec![purchase(flour, "500", "1", "g")], None, "Ana")
        .await
        .unwrap();

    let listed = service
        .list_movements(&MovementFilter::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].date >= listed[1].date);

    let today = chrono::Utc::now().date_naive();
    let filter = MovementFilter {
        start_date: Some(today),
        end_date: Some(today),
    };
    assert_eq!(service.list_movements(&filter).await.unwrap().len(), 2);

    let fetched = service.get_movement(first.movement.id).await.unwrap();
    assert_eq!(fetched.movement, first.movement);

    service.delete_movement(second.movement.id).await.unwrap();
    assert_eq!(store.movement_count().await, 1);
    // Deleting a movement does not revert stock
    assert_eq!(stock(&store, flour).await, dec("1500"));

    assert!(matches!(
        service.get_movement(second.movement.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        service.delete_movement(second.movement.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_inverted_date_range_rejected() {
    let store = MemoryStore::new();
    let filter = MovementFilter {
        start_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 10),
        end_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 1),
    };

    let result = service(&store).list_movements(&filter).await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

#[tokio::test]
async fn test_end_date_at_calendar_limit_rejected() {
    let store = MemoryStore::new();
    let filter = MovementFilter {
        start_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 1),
        end_date: Some(chrono::NaiveDate::MAX),
    };

    let result = service(&store).list_movements(&filter).await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

// ============================================================================
// Properties
// ============================================================================

fn run<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A sale either fully succeeds or leaves stock exactly as it was
    #[test]
    fn prop_sale_is_all_or_nothing(sold in 1u32..=20, per_unit in 1u32..=150) {
        let (result_ok, remaining, movements) = run(async {
            let store = MemoryStore::new();
            let flour = ingredient(&store, "Flour", "1000", MeasureUnit::Grams).await;
            let product = store
                .add_product("Bread", dec("3"), &[(flour, Decimal::from(per_unit))])
                .await
                .unwrap();
            let result = service(&store)
                .post_outflow(vec![sale(product.product.id, &sold.to_string())], None, "Ana")
                .await;
            (result.is_ok(), stock(&store, flour).await, store.movement_count().await)
        });

        let required = Decimal::from(sold * per_unit);
        if required <= dec("1000") {
            prop_assert!(result_ok);
            prop_assert_eq!(remaining, dec("1000") - required);
            prop_assert_eq!(movements, 1);
        } else {
            prop_assert!(!result_ok);
            prop_assert_eq!(remaining, dec("1000"));
            prop_assert_eq!(movements, 0);
        }
        prop_assert!(remaining >= Decimal::ZERO);
    }

    /// Purchases only ever raise stock by the converted amount
    #[test]
    fn prop_purchase_adds_converted_quantity(kilos in 1u32..=50) {
        let remaining = run(async {
            let store = MemoryStore::new();
            let flour = ingredient(&store, "Flour", "250", MeasureUnit::Grams).await;
            service(&store)
                .post_inflow(vec![purchase(flour, &kilos.to_string(), "1", "kg")], None, "Ana")
                .await
                .unwrap();
            stock(&store, flour).await
        });

        prop_assert_eq!(remaining, dec("250") + Decimal::from(kilos * 1000));
    }
}
