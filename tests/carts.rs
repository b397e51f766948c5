mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{spawn_app, TestApp};

async fn product(app: &TestApp, price: &str) -> i64 {
    let token = app.staff_token("admin").await;
    let collection = app.create_collection(&token, "Groceries").await;
    app.create_product(&token, collection, "Bread", price).await
}

#[tokio::test]
async fn new_cart_is_empty() {
    let app = spawn_app().await;

    let response = app.post("/api/carts").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert!(body["id"].as_str().unwrap().len() == 36);
    assert_eq!(body["items"], json!([]));
    assert_eq!(body["total_price"], "0.00");
}

#[tokio::test]
async fn adding_the_same_product_twice_sums_quantity() {
    let app = spawn_app().await;
    let product = product(&app, "2.50").await;
    let cart = app.create_cart().await;

    let first = app.add_to_cart(&cart, product, 2).await;
    let second = app.add_to_cart(&cart, product, 3).await;
    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["quantity"], 5);

    let body: Value = app
        .get(&format!("/api/carts/{cart}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 5);
    assert_eq!(items[0]["product"]["unit_price"], "2.50");
    assert_eq!(items[0]["total_price"], "12.50");
    assert_eq!(body["total_price"], "12.50");
}

#[tokio::test]
async fn unknown_product_is_a_field_error() {
    let app = spawn_app().await;
    let cart = app.create_cart().await;

    let response = app
        .post(&format!("/api/carts/{cart}/items"))
        .json(&json!({ "product_id": 999, "quantity": 1 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["product_id"].is_array());
}

#[tokio::test]
async fn quantity_must_be_positive() {
    let app = spawn_app().await;
    let product = product(&app, "2.50").await;
    let cart = app.create_cart().await;

    let response = app
        .post(&format!("/api/carts/{cart}/items"))
        .json(&json!({ "product_id": product, "quantity": 0 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repeated_adds_cannot_pass_the_quantity_limit() {
    let app = spawn_app().await;
    let product = product(&app, "1.00").await;
    let cart = app.create_cart().await;
    app.add_to_cart(&cart, product, 32767).await;

    let response = app
        .post(&format!("/api/carts/{cart}/items"))
        .json(&json!({ "product_id": product, "quantity": 32767 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["quantity"].is_array());

    let detail: Value = app
        .get(&format!("/api/carts/{cart}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["items"][0]["quantity"], 32767);
}

#[tokio::test]
async fn items_can_be_updated_and_removed() {
    let app = spawn_app().await;
    let product = product(&app, "4.00").await;
    let cart = app.create_cart().await;
    let item = app.add_to_cart(&cart, product, 1).await;
    let item_path = format!("/api/carts/{cart}/items/{}", item["id"]);

    let response = app
        .patch(&item_path)
        .json(&json!({ "quantity": 7 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let detail: Value = app.get(&item_path).send().await.unwrap().json().await.unwrap();
    assert_eq!(detail["quantity"], 7);
    assert_eq!(detail["total_price"], "28.00");

    let response = app.delete(&item_path).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let items: Value = app
        .get(&format!("/api/carts/{cart}/items"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(items, json!([]));
}

#[tokio::test]
async fn deleted_cart_is_gone() {
    let app = spawn_app().await;
    let product = product(&app, "4.00").await;
    let cart = app.create_cart().await;
    app.add_to_cart(&cart, product, 1).await;

    let response = app.delete(&format!("/api/carts/{cart}")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get(&format!("/api/carts/{cart}")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
