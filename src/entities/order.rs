use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub placed_at: DateTimeUtc,
    pub payment_status: PaymentStatus,
    #[sea_orm(indexed)]
    pub customer_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_update = "Cascade",
        on_delete = "Restrict"
    )]
    Customer,
    #[sea_orm(has_many = "super::order_item::Entity")]
    Item,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(
    enum_name = "payment_status_enum",
    db_type = "String(StringLen::N(1))",
    rs_type = "String"
)]
pub enum PaymentStatus {
    #[default]
    #[sea_orm(string_value = "P")]
    #[serde(rename = "P")]
    Pending,
    #[sea_orm(string_value = "C")]
    #[serde(rename = "C")]
    Completed,
    #[sea_orm(string_value = "F")]
    #[serde(rename = "F")]
    Failed,
}
