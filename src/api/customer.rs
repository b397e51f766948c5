use axum::{
    extract::Extension,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::entities::{
    customer::{self, Membership},
    order, user,
};
use crate::error::ApiError;
use crate::extract::{Path, ValidatedJson};
use crate::middleware::auth::AuthUser;
use crate::middleware::permissions::{permission_middleware, Permission};
use crate::services::{customer::get_or_create, order::order_details};

//ROUTERS
pub fn customer_router(db: Arc<DatabaseConnection>) -> Router {
    let admin = Router::new()
        .route("/customers", get(get_customers).post(create_customer))
        .route(
            "/customers/:customer_id",
            get(get_customer)
                .put(update_customer)
                .delete(delete_customer),
        )
        .route_layer(from_fn_with_state(Permission::Admin, permission_middleware));

    let me = Router::new()
        .route("/customers/me", get(get_me).put(update_me))
        .route_layer(from_fn_with_state(
            Permission::Authenticated,
            permission_middleware,
        ));

    let history = Router::new()
        .route("/customers/:customer_id/history", get(get_history))
        .route_layer(from_fn_with_state(
            Permission::ViewCustomerHistory,
            permission_middleware,
        ));

    Router::new()
        .merge(admin)
        .merge(me)
        .merge(history)
        .layer(Extension(db))
}

//ROUTES
async fn get_customers(
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let customers = customer::Entity::find()
        .order_by_asc(customer::Column::Id)
        .all(&*db)
        .await?;

    Ok(Json(customers))
}

async fn create_customer(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<CreateCustomer>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;

    if user::Entity::find_by_id(payload.user_id).one(&txn).await?.is_none() {
        return Err(ApiError::field(
            "user_id",
            format!("Invalid pk \"{}\" - object does not exist.", payload.user_id),
        ));
    }
    let taken = customer::Entity::find()
        .filter(customer::Column::UserId.eq(payload.user_id))
        .count(&txn)
        .await?;
    if taken > 0 {
        return Err(ApiError::field(
            "user_id",
            "customer with this user already exists.",
        ));
    }

    let model = customer::ActiveModel {
        user_id: Set(payload.user_id),
        phone: Set(payload.phone),
        birth_date: Set(payload.birth_date),
        membership: Set(payload.membership.unwrap_or_default()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(customer_id = model.id, user_id = model.user_id, "Created customer");
    Ok((StatusCode::CREATED, Json(model)))
}

async fn get_customer(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(find_customer(&*db, id).await?))
}

async fn update_customer(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<CustomerProfile>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let model = find_customer(&txn, id).await?;
    let model = apply_profile(&txn, model, payload).await?;
    txn.commit().await?;

    Ok(Json(model))
}

async fn delete_customer(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let model = find_customer(&txn, id).await?;

    let orders = model.find_related(order::Entity).count(&txn).await?;
    if orders > 0 {
        return Err(ApiError::MethodNotAllowed(
            "Customer cannot be deleted because it has orders.".to_owned(),
        ));
    }

    model.delete(&txn).await?;
    txn.commit().await?;

    info!(customer_id = id, "Deleted customer");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_me(
    auth: AuthUser,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(get_or_create(&*db, auth.id).await?))
}

async fn update_me(
    auth: AuthUser,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<CustomerProfile>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let model = get_or_create(&txn, auth.id).await?;
    let model = apply_profile(&txn, model, payload).await?;
    txn.commit().await?;

    Ok(Json(model))
}

async fn get_history(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let model = find_customer(&*db, id).await?;
    let orders = model
        .find_related(order::Entity)
        .order_by_asc(order::Column::Id)
        .all(&*db)
        .await?;

    Ok(Json(order_details(&*db, orders).await?))
}

async fn find_customer<C>(conn: &C, id: i32) -> Result<customer::Model, ApiError>
where
    C: ConnectionTrait,
{
    customer::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(ApiError::not_found)
}

async fn apply_profile<C>(
    conn: &C,
    model: customer::Model,
    profile: CustomerProfile,
) -> Result<customer::Model, ApiError>
where
    C: ConnectionTrait,
{
    let mut model: customer::ActiveModel = model.into();
    model.phone = Set(profile.phone);
    model.birth_date = Set(profile.birth_date);
    if let Some(membership) = profile.membership {
        model.membership = Set(membership);
    }
    Ok(model.update(conn).await?)
}

//Structs
#[derive(Deserialize, Validate, Debug)]
struct CustomerProfile {
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    #[serde(default)]
    phone: String,
    #[serde(default)]
    birth_date: Option<NaiveDate>,
    #[serde(default)]
    membership: Option<Membership>,
}

#[derive(Deserialize, Validate, Debug)]
struct CreateCustomer {
    user_id: i32,
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    #[serde(default)]
    phone: String,
    #[serde(default)]
    birth_date: Option<NaiveDate>,
    #[serde(default)]
    membership: Option<Membership>,
}
