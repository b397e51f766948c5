use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::{cart, cart_item, product};
use crate::error::ApiError;
use crate::services::pricing::{line_total, money};

/// Largest quantity a single cart line may hold.
pub const MAX_QUANTITY: i32 = 32767;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProductSummary {
    pub id: i32,
    pub title: String,
    pub unit_price: Decimal,
}

impl From<&product::Model> for ProductSummary {
    fn from(value: &product::Model) -> Self {
        ProductSummary {
            id: value.id,
            title: value.title.clone(),
            unit_price: money(value.unit_price),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CartItemDetail {
    pub id: i32,
    pub product: ProductSummary,
    pub quantity: i32,
    pub total_price: Decimal,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CartDetail {
    pub id: Uuid,
    pub items: Vec<CartItemDetail>,
    pub total_price: Decimal,
}

pub async fn create_cart<C>(conn: &C) -> Result<cart::Model, DbErr>
where
    C: ConnectionTrait,
{
    cart::ActiveModel {
        id: Set(Uuid::new_v4()),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
}

pub async fn find_cart<C>(conn: &C, cart_id: Uuid) -> Result<cart::Model, ApiError>
where
    C: ConnectionTrait,
{
    cart::Entity::find_by_id(cart_id)
        .one(conn)
        .await?
        .ok_or_else(ApiError::not_found)
}

pub async fn cart_detail<C>(conn: &C, cart: &cart::Model) -> Result<CartDetail, DbErr>
where
    C: ConnectionTrait,
{
    let items = cart_items(conn, cart.id).await?;
    let total_price = money(items.iter().map(|item| item.total_price).sum());

    Ok(CartDetail {
        id: cart.id,
        items,
        total_price,
    })
}

pub async fn cart_items<C>(conn: &C, cart_id: Uuid) -> Result<Vec<CartItemDetail>, DbErr>
where
    C: ConnectionTrait,
{
    let rows = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::Id)
        .find_also_related(product::Entity)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(item, product)| product.map(|product| item_detail(item, &product)))
        .collect())
}

fn item_detail(item: cart_item::Model, product: &product::Model) -> CartItemDetail {
    CartItemDetail {
        id: item.id,
        total_price: line_total(product.unit_price, item.quantity),
        product: ProductSummary::from(product),
        quantity: item.quantity,
    }
}

pub async fn find_item_detail<C>(
    conn: &C,
    cart_id: Uuid,
    item_id: i32,
) -> Result<CartItemDetail, ApiError>
where
    C: ConnectionTrait,
{
    let (item, product) = cart_item::Entity::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart_id))
        .find_also_related(product::Entity)
        .one(conn)
        .await?
        .ok_or_else(ApiError::not_found)?;
    let product = product.ok_or_else(ApiError::not_found)?;

    Ok(item_detail(item, &product))
}

/// Adds `quantity` of a product to the cart.
///
/// A product already in the cart has its quantity increased instead of getting a
/// second line.
pub async fn add_item<C>(
    conn: &C,
    cart_id: Uuid,
    product_id: i32,
    quantity: i32,
) -> Result<cart_item::Model, ApiError>
where
    C: ConnectionTrait,
{
    find_cart(conn, cart_id).await?;

    if product::Entity::find_by_id(product_id).one(conn).await?.is_none() {
        return Err(ApiError::field(
            "product_id",
            "No product with the given ID was found.",
        ));
    }

    let existing = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .one(conn)
        .await?;

    let item = match existing {
        Some(entry) => {
            let summed = entry
                .quantity
                .checked_add(quantity)
                .filter(|summed| *summed <= MAX_QUANTITY)
                .ok_or_else(|| {
                    ApiError::field(
                        "quantity",
                        format!("Ensure this value is less than or equal to {MAX_QUANTITY}."),
                    )
                })?;
            let mut entry: cart_item::ActiveModel = entry.into();
            entry.quantity = Set(summed);
            entry.update(conn).await?
        }
        None => {
            cart_item::ActiveModel {
                cart_id: Set(cart_id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                ..Default::default()
            }
            .insert(conn)
            .await?
        }
    };

    Ok(item)
}

pub async fn update_item_quantity<C>(
    conn: &C,
    cart_id: Uuid,
    item_id: i32,
    quantity: i32,
) -> Result<cart_item::Model, ApiError>
where
    C: ConnectionTrait,
{
    let entry = find_item(conn, cart_id, item_id).await?;
    let mut entry: cart_item::ActiveModel = entry.into();
    entry.quantity = Set(quantity);
    Ok(entry.update(conn).await?)
}

pub async fn remove_item<C>(conn: &C, cart_id: Uuid, item_id: i32) -> Result<(), ApiError>
where
    C: ConnectionTrait,
{
    find_item(conn, cart_id, item_id).await?.delete(conn).await?;
    Ok(())
}

/// Deletes the cart together with its items.
pub async fn delete_cart<C>(conn: &C, cart_id: Uuid) -> Result<(), ApiError>
where
    C: ConnectionTrait,
{
    let cart = find_cart(conn, cart_id).await?;
    cart_item::Entity::delete_many()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .exec(conn)
        .await?;
    cart.delete(conn).await?;
    Ok(())
}

async fn find_item<C>(conn: &C, cart_id: Uuid, item_id: i32) -> Result<cart_item::Model, ApiError>
where
    C: ConnectionTrait,
{
    cart_item::Entity::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart_id))
        .one(conn)
        .await?
        .ok_or_else(ApiError::not_found)
}
