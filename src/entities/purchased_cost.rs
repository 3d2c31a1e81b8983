use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A purchase of `quantity` units at the price recorded by a price item.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchased_costs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub price_item_id: i64,
    pub quantity: i32,
    pub date_of_purchase: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::price_item::Entity",
        from = "Column::PriceItemId",
        to = "super::price_item::Column::Id"
    )]
    PriceItem,
}

impl Related<super::price_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PriceItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
