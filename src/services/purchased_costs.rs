use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{info, instrument, warn};
use validator::Validate;

use super::db_error;
use crate::{
    db::DbPool,
    dto::accountancy::{PurchasedCostQuery, PurchasedCostRequest, PurchasedCostResponse},
    entities::price_item::Entity as PriceItemEntity,
    entities::purchased_cost::{self, Entity as PurchasedCostEntity},
    errors::ServiceError,
};

/// Records of goods bought per price item
#[derive(Clone)]
pub struct PurchasedCostService {
    db_pool: Arc<DbPool>,
}

impl PurchasedCostService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(price_item_id = request.price_item_id))]
    pub async fn create(
        &self,
        request: PurchasedCostRequest,
    ) -> Result<PurchasedCostResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let exists = PriceItemEntity::find_by_id(request.price_item_id)
            .one(db)
            .await
            .map_err(db_error("Failed to fetch price item"))?
            .is_some();
        if !exists {
            warn!(price_item_id = request.price_item_id, "Price item not found");
            return Err(ServiceError::NotFound(format!(
                "Price Item with id {} was not found",
                request.price_item_id
            )));
        }

        let model = purchased_cost::ActiveModel {
            price_item_id: Set(request.price_item_id),
            quantity: Set(request.quantity),
            date_of_purchase: Set(request.date_of_purchase.unwrap_or_else(Utc::now)),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(db_error("Failed to insert purchased cost"))?;

        info!(purchased_cost_id = model.id, "Purchased cost recorded");
        Ok(model.into())
    }

    /// Purchases before `date_to`, after `date_from`, or between both
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        query: PurchasedCostQuery,
    ) -> Result<Vec<PurchasedCostResponse>, ServiceError> {
        let db = &*self.db_pool;

        let mut select = PurchasedCostEntity::find();
        select = match (query.date_from, query.date_to) {
            (Some(from), Some(to)) => {
                select.filter(purchased_cost::Column::DateOfPurchase.between(from, to))
            }
            (Some(from), None) => select.filter(purchased_cost::Column::DateOfPurchase.gt(from)),
            (None, Some(to)) => select.filter(purchased_cost::Column::DateOfPurchase.lt(to)),
            (None, None) => select,
        };

        let costs = select
            .order_by_asc(purchased_cost::Column::DateOfPurchase)
            .order_by_asc(purchased_cost::Column::Id)
            .all(db)
            .await
            .map_err(db_error("Failed to fetch purchased costs"))?;

        Ok(costs.into_iter().map(Into::into).collect())
    }
}
