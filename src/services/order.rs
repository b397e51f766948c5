use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::entities::{
    cart, cart_item,
    order::{self, PaymentStatus},
    order_item, product,
};
use crate::error::ApiError;
use crate::services::{cart::ProductSummary, customer, pricing::money};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OrderItemDetail {
    pub id: i32,
    pub product: ProductSummary,
    pub unit_price: Decimal,
    pub quantity: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OrderDetail {
    pub id: i32,
    pub customer: i32,
    pub placed_at: DateTime<Utc>,
    pub payment_status: PaymentStatus,
    pub items: Vec<OrderItemDetail>,
}

/// Turns a cart into an order for the given user.
///
/// Runs in one transaction: the customer row is looked up (or created), each cart
/// line becomes an order line carrying the product's current price, and the cart is
/// deleted. Any failure rolls the whole conversion back.
pub async fn place_order<D>(db: &D, cart_id: Uuid, user_id: i32) -> Result<order::Model, ApiError>
where
    D: TransactionTrait,
{
    let txn = db.begin().await?;

    let cart = match cart::Entity::find_by_id(cart_id).one(&txn).await? {
        Some(cart) => cart,
        None => {
            txn.rollback().await?;
            return Err(ApiError::field(
                "cart_id",
                "No cart with the given ID was found.",
            ));
        }
    };

    let customer = customer::get_or_create(&txn, user_id).await?;

    let order = order::ActiveModel {
        placed_at: Set(Utc::now()),
        payment_status: Set(PaymentStatus::Pending),
        customer_id: Set(customer.id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let lines = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .find_also_related(product::Entity)
        .all(&txn)
        .await?;

    for (item, product) in &lines {
        let product = product.as_ref().ok_or_else(|| {
            ApiError::BadRequest(format!("Product {} no longer exists", item.product_id))
        })?;

        order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(product.id),
            quantity: Set(item.quantity),
            unit_price: Set(product.unit_price),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    cart_item::Entity::delete_many()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    cart.delete(&txn).await?;

    txn.commit().await?;

    info!(order_id = order.id, customer_id = customer.id, lines = lines.len(), "Placed order");
    Ok(order)
}

pub async fn order_detail<C>(conn: &C, order: order::Model) -> Result<OrderDetail, ApiError>
where
    C: ConnectionTrait,
{
    let mut details = order_details(conn, vec![order]).await?;
    details.pop().ok_or_else(ApiError::not_found)
}

/// Loads the lines of every order with two queries, keeping the input order.
pub async fn order_details<C>(
    conn: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderDetail>, ApiError>
where
    C: ConnectionTrait,
{
    let ids: Vec<i32> = orders.iter().map(|order| order.id).collect();

    let rows = order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(ids))
        .order_by_asc(order_item::Column::Id)
        .find_also_related(product::Entity)
        .all(conn)
        .await?;

    let mut lines: HashMap<i32, Vec<OrderItemDetail>> = HashMap::new();
    for (item, product) in rows {
        if let Some(product) = product {
            lines.entry(item.order_id).or_default().push(OrderItemDetail {
                id: item.id,
                product: ProductSummary::from(&product),
                unit_price: money(item.unit_price),
                quantity: item.quantity,
            });
        }
    }

    Ok(orders
        .into_iter()
        .map(|order| OrderDetail {
            items: lines.remove(&order.id).unwrap_or_default(),
            id: order.id,
            customer: order.customer_id,
            placed_at: order.placed_at,
            payment_status: order.payment_status,
        })
        .collect())
}
