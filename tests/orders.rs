mod common;

use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{spawn_app, TestApp};

struct Shop {
    staff: String,
    product: i64,
}

async fn shop(app: &TestApp) -> Shop {
    let staff = app.staff_token("admin").await;
    let collection = app.create_collection(&staff, "Groceries").await;
    let product = app.create_product(&staff, collection, "Bread", "20.00").await;
    Shop { staff, product }
}

#[tokio::test]
async fn anonymous_users_cannot_order() {
    let app = spawn_app().await;
    let cart = app.create_cart().await;

    let response = app
        .post("/api/orders")
        .json(&json!({ "cart_id": cart }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn order_snapshots_prices_and_deletes_the_cart() {
    let app = spawn_app().await;
    let shop = shop(&app).await;
    let buyer = app.customer_token("buyer").await;
    let cart = app.create_cart().await;
    app.add_to_cart(&cart, shop.product, 3).await;

    let order = app.place_order(&buyer, &cart).await;
    assert_eq!(order["payment_status"], "P");
    assert_eq!(order["items"][0]["quantity"], 3);
    assert_eq!(order["items"][0]["unit_price"], "20.00");

    let response = app.get(&format!("/api/carts/{cart}")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .patch(&format!("/api/products/{}", shop.product))
        .bearer_auth(&shop.staff)
        .json(&json!({ "unit_price": "99.00" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored: Value = app
        .get(&format!("/api/orders/{}", order["id"]))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["items"][0]["unit_price"], "20.00");
    assert_eq!(stored["items"][0]["product"]["unit_price"], "99.00");
}

#[tokio::test]
async fn unknown_cart_is_a_field_error() {
    let app = spawn_app().await;
    let buyer = app.customer_token("buyer").await;

    let response = app
        .post("/api/orders")
        .bearer_auth(&buyer)
        .json(&json!({ "cart_id": "3f1c1a52-5f2e-4b59-9d54-5d6cfa1a2b3c" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["cart_id"][0], "No cart with the given ID was found.");
}

#[tokio::test]
async fn empty_cart_becomes_an_empty_order() {
    let app = spawn_app().await;
    let buyer = app.customer_token("buyer").await;
    let cart = app.create_cart().await;

    let order = app.place_order(&buyer, &cart).await;

    assert_eq!(order["items"], json!([]));
}

#[tokio::test]
async fn customers_only_see_their_own_orders() {
    let app = spawn_app().await;
    let shop = shop(&app).await;
    let jane = app.customer_token("jane").await;
    let john = app.customer_token("john").await;

    let cart = app.create_cart().await;
    app.add_to_cart(&cart, shop.product, 1).await;
    let janes = app.place_order(&jane, &cart).await;

    let list: Value = app
        .get("/api/orders")
        .bearer_auth(&john)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list, json!([]));

    let response = app
        .get(&format!("/api/orders/{}", janes["id"]))
        .bearer_auth(&john)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let all: Value = app
        .get("/api/orders")
        .bearer_auth(&shop.staff)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn only_staff_update_payment_status_and_nobody_deletes() {
    let app = spawn_app().await;
    let shop = shop(&app).await;
    let buyer = app.customer_token("buyer").await;
    let cart = app.create_cart().await;
    let order = app.place_order(&buyer, &cart).await;
    let path = format!("/api/orders/{}", order["id"]);

    let response = app
        .patch(&path)
        .bearer_auth(&buyer)
        .json(&json!({ "payment_status": "C" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .patch(&path)
        .bearer_auth(&shop.staff)
        .json(&json!({ "payment_status": "C" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["payment_status"], "C");

    let response = app.delete(&path).bearer_auth(&shop.staff).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
