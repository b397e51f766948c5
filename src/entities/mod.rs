pub mod address;
pub mod cart;
pub mod cart_item;
pub mod collection;
pub mod customer;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_image;
pub mod product_promotion;
pub mod promotion;
pub mod review;
pub mod user;

use sea_orm::{
    sea_query::Index, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, Schema, Set, TransactionTrait,
};
use tracing::info;

use crate::config::AdminSeed;

/// Creates every table (and its indexes) that does not exist yet.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, user::Entity).await?;
    create_table(db, customer::Entity).await?;
    create_table(db, address::Entity).await?;
    create_table(db, promotion::Entity).await?;
    create_table(db, collection::Entity).await?;
    create_table(db, product::Entity).await?;
    create_table(db, product_promotion::Entity).await?;
    create_table(db, product_image::Entity).await?;
    create_table(db, review::Entity).await?;
    create_table(db, cart::Entity).await?;
    create_table(db, cart_item::Entity).await?;
    create_table(db, order::Entity).await?;
    create_table(db, order_item::Entity).await?;

    let backend = db.get_database_backend();
    let unique_cart_product = Index::create()
        .name("idx-cart_item-cart_id-product_id")
        .table(cart_item::Entity)
        .col(cart_item::Column::CartId)
        .col(cart_item::Column::ProductId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&unique_cart_product)).await?;

    Ok(())
}

async fn create_table<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait + Copy,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }

    Ok(())
}

/// Makes sure the configured staff account exists.
pub async fn seed_admin(db: &DatabaseConnection, seed: &AdminSeed) -> Result<(), DbErr> {
    let txn = db.begin().await?;

    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(seed.username.as_str()))
        .one(&txn)
        .await?;
    if existing.is_some() {
        txn.rollback().await?;
        return Ok(());
    }

    let password = user::hash_password(&seed.password)
        .map_err(|err| DbErr::Custom(format!("Failed to hash admin password: {err}")))?;

    user::ActiveModel {
        username: Set(seed.username.clone()),
        email: Set(seed.email.clone()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password: Set(password),
        is_staff: Set(true),
        can_view_history: Set(true),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!(username = %seed.username, "Seeded staff account");
    Ok(())
}
