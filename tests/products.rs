mod common;

use reqwest::{multipart, StatusCode};
use serde_json::{json, Value};

use common::{spawn_app, TestApp};

async fn catalog(app: &TestApp) -> (String, i64) {
    let token = app.staff_token("admin").await;
    let collection = app.create_collection(&token, "Groceries").await;
    (token, collection)
}

#[tokio::test]
async fn product_carries_price_with_tax() {
    let app = spawn_app().await;
    let (token, collection) = catalog(&app).await;
    let id = app.create_product(&token, collection, "Bread", "20").await;

    let body: Value = app
        .get(&format!("/api/products/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["unit_price"], "20.00");
    assert_eq!(body["price_with_tax"], "22.00");
    assert_eq!(body["collection"], collection);
    assert_eq!(body["promotions"], json!([]));
    assert_eq!(body["images"], json!([]));
}

#[tokio::test]
async fn invalid_fields_are_reported_per_field() {
    let app = spawn_app().await;
    let (token, collection) = catalog(&app).await;

    let response = app
        .post("/api/products")
        .bearer_auth(&token)
        .json(&json!({
            "title": "Bread",
            "slug": "not a slug",
            "inventory": 0,
            "unit_price": "-5",
            "collection": collection,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["slug"].is_array());
    assert!(body["inventory"].is_array());
    assert!(body["unit_price"].is_array());
}

#[tokio::test]
async fn unknown_collection_is_rejected() {
    let app = spawn_app().await;
    let (token, _) = catalog(&app).await;

    let response = app
        .post("/api/products")
        .bearer_auth(&token)
        .json(&json!({
            "title": "Bread",
            "slug": "bread",
            "inventory": 5,
            "unit_price": "2.00",
            "collection": 999,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["collection"].is_array());
}

#[tokio::test]
async fn list_is_paginated_filtered_and_ordered() {
    let app = spawn_app().await;
    let (token, groceries) = catalog(&app).await;
    let toys = app.create_collection(&token, "Toys").await;
    for n in 1..=11 {
        app.create_product(&token, groceries, &format!("Item {n:02}"), &format!("{n}.00"))
            .await;
    }
    app.create_product(&token, toys, "Kite", "30.00").await;

    let first: Value = app.get("/api/products").send().await.unwrap().json().await.unwrap();
    assert_eq!(first["count"], 12);
    assert_eq!(first["next"], 2);
    assert_eq!(first["previous"], Value::Null);
    assert_eq!(first["results"].as_array().unwrap().len(), 10);
    assert_eq!(first["results"][0]["title"], "Item 01");

    let second: Value = app
        .get("/api/products?page=2")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["results"].as_array().unwrap().len(), 2);
    assert_eq!(second["previous"], 1);

    let toys_only: Value = app
        .get(&format!("/api/products?collection_id={toys}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(toys_only["count"], 1);

    let pricey: Value = app
        .get("/api/products?unit_price__gt=9&unit_price__lt=31&ordering=-unit_price")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pricey["count"], 3);
    assert_eq!(pricey["results"][0]["title"], "Kite");

    let searched: Value = app
        .get("/api/products?search=Kite")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(searched["count"], 1);

    let response = app.get("/api/products?page=9").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_can_clear_the_description() {
    let app = spawn_app().await;
    let (token, collection) = catalog(&app).await;
    let id = app.create_product(&token, collection, "Soap", "3.00").await;
    let path = format!("/api/products/{id}");

    let response = app
        .patch(&path)
        .bearer_auth(&token)
        .json(&json!({ "inventory": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["description"], "All about Soap");
    assert_eq!(body["inventory"], 5);

    let response = app
        .patch(&path)
        .bearer_auth(&token)
        .json(&json!({ "description": null }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["description"], Value::Null);
}

#[tokio::test]
async fn malformed_page_and_ids_get_json_errors() {
    let app = spawn_app().await;

    let response = app.get("/api/products?page=abc").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid page.");

    let response = app.get("/api/products?page=0").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/api/products/abc").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());

    let response = app.get("/api/products?collection_id=abc").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());

    let response = app.get("/api/carts/not-a-uuid").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn ordered_product_cannot_be_deleted() {
    let app = spawn_app().await;
    let (token, collection) = catalog(&app).await;
    let ordered = app.create_product(&token, collection, "Bread", "2.00").await;
    let unordered = app.create_product(&token, collection, "Milk", "1.50").await;

    let cart = app.create_cart().await;
    app.add_to_cart(&cart, ordered, 1).await;
    app.place_order(&token, &cart).await;

    let response = app
        .delete(&format!("/api/products/{ordered}"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = app
        .delete(&format!("/api/products/{unordered}"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn anyone_can_review_a_product() {
    let app = spawn_app().await;
    let (token, collection) = catalog(&app).await;
    let product = app.create_product(&token, collection, "Bread", "2.00").await;

    let response = app
        .post(&format!("/api/products/{product}/reviews"))
        .json(&json!({ "name": "Sam", "description": "Fresh and crusty." }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let review: Value = response.json().await.unwrap();
    assert_eq!(review["name"], "Sam");
    assert!(review["date"].is_string());

    let reviews: Value = app
        .get(&format!("/api/products/{product}/reviews"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reviews.as_array().unwrap().len(), 1);

    let response = app
        .get("/api/products/999/reviews")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// Smallest valid PNG: 1x1 transparent pixel.
const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

fn image_form(bytes: Vec<u8>, mime: &str) -> multipart::Form {
    let part = multipart::Part::bytes(bytes)
        .file_name("pixel.png")
        .mime_str(mime)
        .unwrap();
    multipart::Form::new().part("image", part)
}

#[tokio::test]
async fn uploaded_image_is_served_back() {
    let app = spawn_app().await;
    let (token, collection) = catalog(&app).await;
    let product = app.create_product(&token, collection, "Bread", "2.00").await;

    let response = app
        .post(&format!("/api/products/{product}/images"))
        .bearer_auth(&token)
        .multipart(image_form(PIXEL_PNG.to_vec(), "image/png"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let image: Value = response.json().await.unwrap();
    let url = image["image"].as_str().unwrap().to_owned();

    let served = app.get(&url).send().await.unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.headers()["content-type"], "image/png");
    assert_eq!(served.bytes().await.unwrap().as_ref(), PIXEL_PNG);

    let detail: Value = app
        .get(&format!("/api/products/{product}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["images"][0]["image"], url.as_str());
}

#[tokio::test]
async fn image_upload_checks_type_size_and_permission() {
    let app = spawn_app().await;
    let (token, collection) = catalog(&app).await;
    let product = app.create_product(&token, collection, "Bread", "2.00").await;
    let path = format!("/api/products/{product}/images");

    let response = app
        .post(&path)
        .multipart(image_form(PIXEL_PNG.to_vec(), "image/png"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .post(&path)
        .bearer_auth(&token)
        .multipart(image_form(PIXEL_PNG.to_vec(), "image/gif"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let too_big = vec![0u8; app.config.file_size_limit + 1];
    let response = app
        .post(&path)
        .bearer_auth(&token)
        .multipart(image_form(too_big, "image/png"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
