//! Storefront operations that span several tables. Handlers stay thin and call in here.

pub mod cart;
pub mod catalog;
pub mod customer;
pub mod order;
pub mod pricing;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
    use std::str::FromStr;

    use crate::entities::{collection, product, setup_schema, user};

    pub async fn test_db() -> DatabaseConnection {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        setup_schema(&db).await.unwrap();
        db
    }

    pub async fn seed_product(db: &DatabaseConnection, price: &str) -> product::Model {
        let collection = collection::ActiveModel {
            title: Set("Beauty".to_owned()),
            featured_product_id: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        product::ActiveModel {
            title: Set(format!("Product at {price}")),
            slug: Set("product".to_owned()),
            description: Set(None),
            unit_price: Set(Decimal::from_str(price).unwrap()),
            inventory: Set(10),
            last_update: Set(Utc::now()),
            collection_id: Set(collection.id),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn seed_user(db: &DatabaseConnection, username: &str, is_staff: bool) -> user::Model {
        user::ActiveModel {
            username: Set(username.to_owned()),
            email: Set(format!("{username}@example.com")),
            first_name: Set("Test".to_owned()),
            last_name: Set("User".to_owned()),
            password: Set("not-a-hash".to_owned()),
            is_staff: Set(is_staff),
            can_view_history: Set(false),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }
}
