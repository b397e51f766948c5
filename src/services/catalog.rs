use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};
use std::collections::HashMap;

use crate::entities::{order_item, product};
use crate::error::ApiError;

/// Number of products per collection. Collections without products are absent.
pub async fn products_counts<C>(conn: &C) -> Result<HashMap<i32, i64>, DbErr>
where
    C: ConnectionTrait,
{
    let rows: Vec<(i32, i64)> = product::Entity::find()
        .select_only()
        .column(product::Column::CollectionId)
        .column_as(product::Column::Id.count(), "products_count")
        .group_by(product::Column::CollectionId)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(rows.into_iter().collect())
}

pub async fn products_count<C>(conn: &C, collection_id: i32) -> Result<i64, DbErr>
where
    C: ConnectionTrait,
{
    let count = product::Entity::find()
        .filter(product::Column::CollectionId.eq(collection_id))
        .count(conn)
        .await?;
    Ok(count as i64)
}

/// Refuses to delete a collection that still groups products.
pub async fn ensure_collection_deletable<C>(conn: &C, collection_id: i32) -> Result<(), ApiError>
where
    C: ConnectionTrait,
{
    if products_count(conn, collection_id).await? > 0 {
        return Err(ApiError::MethodNotAllowed(
            "Collection cannot be deleted because it includes one or more products.".to_owned(),
        ));
    }
    Ok(())
}

/// Refuses to delete a product that was ever ordered.
pub async fn ensure_product_deletable<C>(conn: &C, product_id: i32) -> Result<(), ApiError>
where
    C: ConnectionTrait,
{
    let ordered = order_item::Entity::find()
        .filter(order_item::Column::ProductId.eq(product_id))
        .count(conn)
        .await?;

    if ordered > 0 {
        return Err(ApiError::MethodNotAllowed(
            "Product cannot be deleted because it is associated with an order item.".to_owned(),
        ));
    }
    Ok(())
}
