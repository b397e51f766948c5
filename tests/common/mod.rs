#![allow(dead_code)]

use reqwest::{Client, RequestBuilder, StatusCode};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, Set};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

use storefront::config::Config;
use storefront::create_api_router;
use storefront::entities::{setup_schema, user};
use storefront::tasks::{email::Mailer, TaskQueue};

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<Config>,
    _dir: TempDir,
}

/// Starts the full router on an ephemeral port against a fresh SQLite file.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let database_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());

    let mut config = Config {
        database_url,
        bind_addr: "127.0.0.1:0".to_owned(),
        secret: "test-secret".to_owned(),
        token_ttl_hours: 1,
        media_root: dir.path().join("media"),
        file_size_limit: 64 * 1024,
        mail_from: "from@storefront.com".to_owned(),
        smtp: None,
        admin: None,
    };
    customize(&mut config);

    let db = Database::connect(config.database_url.as_str())
        .await
        .expect("Failed to connect to test database");
    setup_schema(&db).await.expect("Failed to create schema");
    let db = Arc::new(db);

    let mailer = Mailer::log_only(&config.mail_from).expect("Invalid sender");
    let (tasks, _worker) = TaskQueue::spawn(db.clone(), mailer);

    let config = Arc::new(config);
    let app = create_api_router(db.clone(), config.clone(), tasks);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let address = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    TestApp {
        address,
        client: Client::new(),
        db,
        config,
        _dir: dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path))
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.client.patch(self.url(path))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }

    /// Registers a user and returns its id.
    pub async fn register(&self, username: &str) -> i64 {
        let response = self
            .post("/api/auth/users")
            .json(&json!({
                "username": username,
                "password": PASSWORD,
                "email": format!("{username}@example.com"),
                "first_name": username,
                "last_name": "Tester",
            }))
            .send()
            .await
            .expect("Failed to register");
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().expect("Registered user has no id")
    }

    pub async fn login(&self, username: &str) -> String {
        let response = self
            .post("/api/auth/jwt/create")
            .json(&json!({ "username": username, "password": PASSWORD }))
            .send()
            .await
            .expect("Failed to log in");
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        body["token"].as_str().expect("No token").to_owned()
    }

    pub async fn set_flags(&self, user_id: i64, is_staff: bool, can_view_history: bool) {
        let model = user::Entity::find_by_id(user_id as i32)
            .one(&*self.db)
            .await
            .unwrap()
            .expect("No such user");
        let mut model: user::ActiveModel = model.into();
        model.is_staff = Set(is_staff);
        model.can_view_history = Set(can_view_history);
        model.update(&*self.db).await.unwrap();
    }

    /// Token for a fresh non-staff user.
    pub async fn customer_token(&self, username: &str) -> String {
        self.register(username).await;
        self.login(username).await
    }

    /// Token for a fresh staff user.
    pub async fn staff_token(&self, username: &str) -> String {
        let id = self.register(username).await;
        self.set_flags(id, true, false).await;
        self.login(username).await
    }

    pub async fn create_collection(&self, token: &str, title: &str) -> i64 {
        let response = self
            .post("/api/collections")
            .bearer_auth(token)
            .json(&json!({ "title": title }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn create_product(&self, token: &str, collection_id: i64, title: &str, price: &str) -> i64 {
        let response = self
            .post("/api/products")
            .bearer_auth(token)
            .json(&json!({
                "title": title,
                "slug": title.to_lowercase().replace(' ', "-"),
                "description": format!("All about {title}"),
                "inventory": 20,
                "unit_price": price,
                "collection": collection_id,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn create_cart(&self) -> String {
        let response = self.post("/api/carts").send().await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_owned()
    }

    pub async fn add_to_cart(&self, cart_id: &str, product_id: i64, quantity: i64) -> Value {
        let response = self
            .post(&format!("/api/carts/{cart_id}/items"))
            .json(&json!({ "product_id": product_id, "quantity": quantity }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }

    pub async fn place_order(&self, token: &str, cart_id: &str) -> Value {
        let response = self
            .post("/api/orders")
            .bearer_auth(token)
            .json(&json!({ "cart_id": cart_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }
}
