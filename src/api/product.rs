use axum::{
    extract::Extension,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use crate::api::pagination::{paginate, Page, PageQuery};
use crate::api::product_image::ImageResponse;
use crate::config::Config;
use crate::entities::{collection, product, product_image, product_promotion, promotion};
use crate::error::ApiError;
use crate::extract::{double_option, Path, Query, ValidatedJson};
use crate::middleware::permissions::{permission_middleware, Permission};
use crate::services::{
    catalog::ensure_product_deletable,
    pricing::{money, with_tax},
};

static SLUG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());

//ROUTERS
pub fn product_router(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/products", get(get_products).post(create_product))
        .route(
            "/products/:product_id",
            get(get_product)
                .put(update_product)
                .patch(patch_product)
                .delete(delete_product),
        )
        .route_layer(from_fn_with_state(
            Permission::AdminOrReadOnly,
            permission_middleware,
        ))
        .layer(Extension(db))
}

//ROUTES
async fn get_products(
    Query(filter): Query<ProductFilter>,
    Query(page): Query<PageQuery>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let mut condition = Condition::all();

    //Filter zone
    if let Some(collection_id) = filter.collection_id {
        condition = condition.add(product::Column::CollectionId.eq(collection_id));
    }
    if let Some(price) = filter.unit_price_gt {
        condition = condition.add(product::Column::UnitPrice.gt(price));
    }
    if let Some(price) = filter.unit_price_lt {
        condition = condition.add(product::Column::UnitPrice.lt(price));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        condition = condition.add(
            Condition::any()
                .add(product::Column::Title.contains(search))
                .add(product::Column::Description.contains(search)),
        );
    }

    //Sorting zone
    let (sort_column, order) = match filter.ordering.as_deref() {
        Some("unit_price") => (product::Column::UnitPrice, sea_orm::Order::Asc),
        Some("-unit_price") => (product::Column::UnitPrice, sea_orm::Order::Desc),
        Some("last_update") => (product::Column::LastUpdate, sea_orm::Order::Asc),
        Some("-last_update") => (product::Column::LastUpdate, sea_orm::Order::Desc),
        _ => (product::Column::Title, sea_orm::Order::Asc),
    };

    let select = product::Entity::find()
        .filter(condition)
        .order_by(sort_column, order)
        .order_by_asc(product::Column::Id);

    let page = paginate(&*db, select, page).await?;
    let results = product_responses(&*db, page.results).await?;

    Ok(Json(Page {
        count: page.count,
        next: page.next,
        previous: page.previous,
        results,
    }))
}

async fn create_product(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<ProductPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;

    check_collection(&txn, payload.collection).await?;
    check_promotions(&txn, &payload.promotions).await?;

    let model = product::ActiveModel {
        title: Set(payload.title),
        slug: Set(payload.slug),
        description: Set(payload.description),
        unit_price: Set(money(payload.unit_price)),
        inventory: Set(payload.inventory),
        last_update: Set(Utc::now()),
        collection_id: Set(payload.collection),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    set_promotions(&txn, model.id, &payload.promotions).await?;
    let response = product_response(&txn, model).await?;
    txn.commit().await?;

    info!(product_id = response.id, "Created product");
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
) -> Result<impl IntoResponse, ApiError> {
    let model = find_product(&*db, id).await?;
    Ok(Json(product_response(&*db, model).await?))
}

async fn update_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<ProductPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let model = find_product(&txn, id).await?;

    check_collection(&txn, payload.collection).await?;
    check_promotions(&txn, &payload.promotions).await?;

    let mut model: product::ActiveModel = model.into();
    model.title = Set(payload.title);
    model.slug = Set(payload.slug);
    model.description = Set(payload.description);
    model.unit_price = Set(money(payload.unit_price));
    model.inventory = Set(payload.inventory);
    model.collection_id = Set(payload.collection);
    model.last_update = Set(Utc::now());
    let model = model.update(&txn).await?;

    set_promotions(&txn, model.id, &payload.promotions).await?;
    let response = product_response(&txn, model).await?;
    txn.commit().await?;

    Ok(Json(response))
}

async fn patch_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    ValidatedJson(payload): ValidatedJson<PatchProduct>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let model = find_product(&txn, id).await?;
    let mut model: product::ActiveModel = model.into();

    if let Some(title) = payload.title {
        model.title = Set(title);
    }
    if let Some(slug) = payload.slug {
        model.slug = Set(slug);
    }
    if let Some(description) = payload.description {
        model.description = Set(description);
    }
    if let Some(unit_price) = payload.unit_price {
        model.unit_price = Set(money(unit_price));
    }
    if let Some(inventory) = payload.inventory {
        model.inventory = Set(inventory);
    }
    if let Some(collection_id) = payload.collection {
        check_collection(&txn, collection_id).await?;
        model.collection_id = Set(collection_id);
    }
    model.last_update = Set(Utc::now());
    let model = model.update(&txn).await?;

    if let Some(promotions) = payload.promotions {
        check_promotions(&txn, &promotions).await?;
        set_promotions(&txn, model.id, &promotions).await?;
    }

    let response = product_response(&txn, model).await?;
    txn.commit().await?;

    Ok(Json(response))
}

async fn delete_product(
    Path(id): Path<i32>,
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
) -> Result<impl IntoResponse, ApiError> {
    let txn = db.begin().await?;
    let model = find_product(&txn, id).await?;

    ensure_product_deletable(&txn, model.id).await?;

    let images = model.find_related(product_image::Entity).all(&txn).await?;
    model.delete(&txn).await?;
    txn.commit().await?;

    for image in images {
        let path = config.media_root.join(image.relative_path());
        if let Err(err) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %err, "Failed to remove image file");
        }
    }

    info!(product_id = id, "Deleted product");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn find_product<C>(conn: &C, id: i32) -> Result<product::Model, ApiError>
where
    C: ConnectionTrait,
{
    product::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(ApiError::not_found)
}

async fn check_collection<C>(conn: &C, collection_id: i32) -> Result<(), ApiError>
where
    C: ConnectionTrait,
{
    match collection::Entity::find_by_id(collection_id).one(conn).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::field(
            "collection",
            format!("Invalid pk \"{collection_id}\" - object does not exist."),
        )),
    }
}

async fn check_promotions<C>(conn: &C, ids: &[i32]) -> Result<(), ApiError>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(());
    }

    let found: Vec<i32> = promotion::Entity::find()
        .filter(promotion::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await?
        .into_iter()
        .map(|promotion| promotion.id)
        .collect();

    match ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(ApiError::field(
            "promotions",
            format!("Invalid pk \"{missing}\" - object does not exist."),
        )),
        None => Ok(()),
    }
}

async fn set_promotions<C>(conn: &C, product_id: i32, ids: &[i32]) -> Result<(), ApiError>
where
    C: ConnectionTrait,
{
    product_promotion::Entity::delete_many()
        .filter(product_promotion::Column::ProductId.eq(product_id))
        .exec(conn)
        .await?;

    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    if ids.is_empty() {
        return Ok(());
    }

    product_promotion::Entity::insert_many(ids.into_iter().map(|promotion_id| {
        product_promotion::ActiveModel {
            product_id: Set(product_id),
            promotion_id: Set(promotion_id),
        }
    }))
    .exec_without_returning(conn)
    .await?;

    Ok(())
}

async fn product_response<C>(conn: &C, model: product::Model) -> Result<ProductResponse, ApiError>
where
    C: ConnectionTrait,
{
    let mut responses = product_responses(conn, vec![model]).await?;
    responses.pop().ok_or_else(ApiError::not_found)
}

/// Attaches promotions and images to a batch of products with two extra queries.
async fn product_responses<C>(
    conn: &C,
    products: Vec<product::Model>,
) -> Result<Vec<ProductResponse>, ApiError>
where
    C: ConnectionTrait,
{
    let ids: Vec<i32> = products.iter().map(|product| product.id).collect();

    let mut promotions: HashMap<i32, Vec<i32>> = HashMap::new();
    for link in product_promotion::Entity::find()
        .filter(product_promotion::Column::ProductId.is_in(ids.clone()))
        .order_by_asc(product_promotion::Column::PromotionId)
        .all(conn)
        .await?
    {
        promotions.entry(link.product_id).or_default().push(link.promotion_id);
    }

    let mut images: HashMap<i32, Vec<ImageResponse>> = HashMap::new();
    for image in product_image::Entity::find()
        .filter(product_image::Column::ProductId.is_in(ids))
        .order_by_asc(product_image::Column::Id)
        .all(conn)
        .await?
    {
        images
            .entry(image.product_id)
            .or_default()
            .push(ImageResponse::from(image));
    }

    Ok(products
        .into_iter()
        .map(|model| ProductResponse {
            promotions: promotions.remove(&model.id).unwrap_or_default(),
            images: images.remove(&model.id).unwrap_or_default(),
            id: model.id,
            title: model.title,
            slug: model.slug,
            description: model.description,
            inventory: model.inventory,
            unit_price: money(model.unit_price),
            price_with_tax: with_tax(model.unit_price),
            collection: model.collection_id,
        })
        .collect())
}

fn validate_unit_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::ONE {
        return Err(ValidationError::new("min_value")
            .with_message("Ensure this value is greater than or equal to 1.".into()));
    }
    if *price > Decimal::new(999_999, 2) {
        return Err(ValidationError::new("max_value")
            .with_message("Ensure that there are no more than 6 digits in total.".into()));
    }
    if price.normalize().scale() > 2 {
        return Err(ValidationError::new("decimal_places")
            .with_message("Ensure that there are no more than 2 decimal places.".into()));
    }
    Ok(())
}

//Structs
#[derive(Deserialize, Debug, Default)]
struct ProductFilter {
    collection_id: Option<i32>,
    #[serde(rename = "unit_price__gt")]
    unit_price_gt: Option<Decimal>,
    #[serde(rename = "unit_price__lt")]
    unit_price_lt: Option<Decimal>,
    search: Option<String>,
    ordering: Option<String>,
}

#[derive(Deserialize, Validate, Debug)]
struct ProductPayload {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    title: String,
    #[validate(regex(path = *SLUG_REGEX, message = "Enter a valid slug consisting of letters, numbers, underscores or hyphens."))]
    slug: String,
    #[serde(default)]
    description: Option<String>,
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    inventory: i32,
    #[validate(custom(function = "validate_unit_price"))]
    unit_price: Decimal,
    collection: i32,
    #[serde(default)]
    promotions: Vec<i32>,
}

#[derive(Deserialize, Validate, Debug)]
struct PatchProduct {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has between 1 and 255 characters."))]
    title: Option<String>,
    #[validate(regex(path = *SLUG_REGEX, message = "Enter a valid slug consisting of letters, numbers, underscores or hyphens."))]
    slug: Option<String>,
    // `Some(None)` clears the description.
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    inventory: Option<i32>,
    #[validate(custom(function = "validate_unit_price"))]
    unit_price: Option<Decimal>,
    collection: Option<i32>,
    promotions: Option<Vec<i32>>,
}

#[derive(Serialize, Debug)]
struct ProductResponse {
    id: i32,
    title: String,
    slug: String,
    description: Option<String>,
    inventory: i32,
    unit_price: Decimal,
    price_with_tax: Decimal,
    collection: i32,
    promotions: Vec<i32>,
    images: Vec<ImageResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn unit_price_bounds() {
        let price = |s: &str| Decimal::from_str(s).unwrap();

        assert!(validate_unit_price(&price("1")).is_ok());
        assert!(validate_unit_price(&price("9999.99")).is_ok());
        assert!(validate_unit_price(&price("0.99")).is_err());
        assert!(validate_unit_price(&price("-5")).is_err());
        assert!(validate_unit_price(&price("10000")).is_err());
        assert!(validate_unit_price(&price("1.005")).is_err());
    }

    #[test]
    fn slugs_allow_only_url_safe_characters() {
        assert!(SLUG_REGEX.is_match("summer-sale_2024"));
        assert!(!SLUG_REGEX.is_match("summer sale"));
        assert!(!SLUG_REGEX.is_match(""));
    }
}
