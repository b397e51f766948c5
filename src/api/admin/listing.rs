use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

use crate::api::pagination::{paginate, PageQuery};
use crate::entities::{
    collection,
    customer::{self, Membership},
    order, product, user,
};
use crate::error::ApiError;
use crate::extract::Query;
use crate::services::{catalog::products_counts, pricing::money};

const LOW_INVENTORY: i32 = 10;

pub fn admin_listing_router() -> Router {
    Router::new()
        .route("/products", get(list_products))
        .route("/customers", get(list_customers))
        .route("/collections", get(list_collections))
        .route("/orders", get(list_orders))
}

async fn list_products(
    Query(page): Query<PageQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let select = product::Entity::find()
        .find_also_related(collection::Entity)
        .order_by_asc(product::Column::Title)
        .order_by_asc(product::Column::Id);

    let page = paginate(&*db, select, page).await?;

    Ok(Json(page.map(|(product, collection)| AdminProduct {
        inventory_status: inventory_status(product.inventory),
        title: product.title,
        unit_price: money(product.unit_price),
        collection_title: collection.map(|collection| collection.title).unwrap_or_default(),
    })))
}

async fn list_customers(
    Query(search): Query<SearchQuery>,
    Query(page): Query<PageQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut select = customer::Entity::find().find_also_related(user::Entity);

    if let Some(term) = search.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        // SQLite LIKE is case-insensitive for ASCII.
        select = select.filter(
            Condition::any()
                .add(user::Column::FirstName.starts_with(term))
                .add(user::Column::LastName.starts_with(term)),
        );
    }

    let select = select
        .order_by_asc(user::Column::FirstName)
        .order_by_asc(user::Column::LastName)
        .order_by_asc(customer::Column::Id);

    let page = paginate(&*db, select, page).await?;

    let ids: Vec<i32> = page.results.iter().map(|(customer, _)| customer.id).collect();
    let counts: HashMap<i32, i64> = order::Entity::find()
        .select_only()
        .column(order::Column::CustomerId)
        .column_as(order::Column::Id.count(), "orders_count")
        .filter(order::Column::CustomerId.is_in(ids))
        .group_by(order::Column::CustomerId)
        .into_tuple::<(i32, i64)>()
        .all(&*db)
        .await?
        .into_iter()
        .collect();

    Ok(Json(page.map(|(customer, user)| {
        let (first_name, last_name) = user
            .map(|user| (user.first_name, user.last_name))
            .unwrap_or_default();
        AdminCustomer {
            id: customer.id,
            first_name,
            last_name,
            membership: customer.membership,
            orders_count: counts.get(&customer.id).copied().unwrap_or_default(),
        }
    })))
}

async fn list_collections(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let collections = collection::Entity::find()
        .order_by_asc(collection::Column::Title)
        .all(&*db)
        .await?;
    let counts = products_counts(&*db).await?;

    let response: Vec<AdminCollection> = collections
        .into_iter()
        .map(|collection| AdminCollection {
            products_count: counts.get(&collection.id).copied().unwrap_or_default(),
            id: collection.id,
            title: collection.title,
        })
        .collect();

    Ok(Json(response))
}

async fn list_orders(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = order::Entity::find()
        .find_also_related(customer::Entity)
        .order_by_desc(order::Column::PlacedAt)
        .order_by_desc(order::Column::Id)
        .all(&*db)
        .await?;

    let user_ids: Vec<i32> = orders
        .iter()
        .filter_map(|(_, customer)| customer.as_ref().map(|customer| customer.user_id))
        .collect();
    let names: HashMap<i32, String> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(&*db)
        .await?
        .into_iter()
        .map(|user| (user.id, user.full_name()))
        .collect();

    let response: Vec<AdminOrder> = orders
        .into_iter()
        .map(|(order, customer)| AdminOrder {
            id: order.id,
            placed_at: order.placed_at,
            customer: customer
                .and_then(|customer| names.get(&customer.user_id).cloned())
                .unwrap_or_default(),
        })
        .collect();

    Ok(Json(response))
}

fn inventory_status(inventory: i32) -> &'static str {
    if inventory < LOW_INVENTORY {
        "Low"
    } else {
        "OK"
    }
}

#[derive(Deserialize, Debug, Default)]
struct SearchQuery {
    search: Option<String>,
}

#[derive(Serialize)]
struct AdminProduct {
    title: String,
    unit_price: Decimal,
    inventory_status: &'static str,
    collection_title: String,
}

#[derive(Serialize)]
struct AdminCustomer {
    id: i32,
    first_name: String,
    last_name: String,
    membership: Membership,
    orders_count: i64,
}

#[derive(Serialize)]
struct AdminCollection {
    id: i32,
    title: String,
    products_count: i64,
}

#[derive(Serialize)]
struct AdminOrder {
    id: i32,
    placed_at: DateTime<Utc>,
    customer: String,
}
