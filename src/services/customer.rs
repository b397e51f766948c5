use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};

use crate::entities::customer::{self, Membership};

/// Returns the customer row for `user_id`, creating an empty one on first use.
pub async fn get_or_create<C>(conn: &C, user_id: i32) -> Result<customer::Model, DbErr>
where
    C: ConnectionTrait,
{
    if let Some(existing) = find_by_user(conn, user_id).await? {
        return Ok(existing);
    }

    customer::ActiveModel {
        phone: Set(String::new()),
        birth_date: Set(None),
        membership: Set(Membership::default()),
        user_id: Set(user_id),
        ..Default::default()
    }
    .insert(conn)
    .await
}

pub async fn find_by_user<C>(conn: &C, user_id: i32) -> Result<Option<customer::Model>, DbErr>
where
    C: ConnectionTrait,
{
    customer::Entity::find()
        .filter(customer::Column::UserId.eq(user_id))
        .one(conn)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::address;
    use crate::services::test_support::{seed_user, test_db};
    use sea_orm::{ModelTrait, PaginatorTrait};

    #[tokio::test]
    async fn second_lookup_reuses_the_row() {
        let db = test_db().await;
        let user = seed_user(&db, "jane", false).await;

        let first = get_or_create(&db, user.id).await.unwrap();
        let second = get_or_create(&db, user.id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.membership, Membership::Bronze);
    }

    #[tokio::test]
    async fn addresses_go_with_their_customer() {
        let db = test_db().await;
        let user = seed_user(&db, "jane", false).await;
        let customer = get_or_create(&db, user.id).await.unwrap();

        address::ActiveModel {
            street: Set("1 Main St".to_owned()),
            city: Set("Springfield".to_owned()),
            customer_id: Set(customer.id),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        customer.delete(&db).await.unwrap();

        assert_eq!(address::Entity::find().count(&db).await.unwrap(), 0);
    }
}
