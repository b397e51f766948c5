use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use storefront::config::Config;
use storefront::create_api_router;
use storefront::entities::{seed_admin, setup_schema};
use storefront::tasks::{email::Mailer, TaskQueue};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storefront=debug,tower_http=info")),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let db: DatabaseConnection = Database::connect(config.database_url.as_str())
        .await
        .expect("Failed to connect to the database");
    setup_schema(&db).await.expect("Failed to create the schema");

    if let Some(seed) = &config.admin {
        seed_admin(&db, seed).await.expect("Failed to seed the staff account");
    }

    let shared_db = Arc::new(db);

    let mailer = Mailer::from_config(&config).expect("Invalid mail configuration");
    let (tasks, _worker) = TaskQueue::spawn(shared_db.clone(), mailer);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind the listener");
    info!(addr = %config.bind_addr, "Storefront listening");

    let app = create_api_router(shared_db, Arc::new(config), tasks);
    axum::serve(listener, app).await.expect("Server error");
}
