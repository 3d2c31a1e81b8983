use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use super::{db_error, pricing};
use crate::{
    db::DbPool,
    dto::accountancy::{
        MarkupRequest, MarkupResponse, MarkupUpdateResponse, PriceItemRequest, PriceItemResponse,
    },
    entities::price_item::{self, Entity as PriceItemEntity},
    errors::ServiceError,
};

/// Service for price items and their markups
#[derive(Clone)]
pub struct PriceItemService {
    db_pool: Arc<DbPool>,
}

impl PriceItemService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(product_id = request.product_id))]
    pub async fn create(&self, request: PriceItemRequest) -> Result<PriceItemResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let model = price_item::ActiveModel {
            product_id: Set(request.product_id),
            price: Set(pricing::round_money(request.price)),
            markup: Set(request.markup),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(db_error("Failed to insert price item"))?;

        info!(price_item_id = model.id, "Price item created");
        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, price_item_id: i64) -> Result<PriceItemResponse, ServiceError> {
        let db = &*self.db_pool;
        find_price_item(db, price_item_id).await.map(Into::into)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        price_item_id: i64,
        request: PriceItemRequest,
    ) -> Result<PriceItemResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let existing = find_price_item(db, price_item_id).await?;

        let mut active: price_item::ActiveModel = existing.into();
        active.product_id = Set(request.product_id);
        active.price = Set(pricing::round_money(request.price));
        active.markup = Set(request.markup);
        let updated = active
            .update(db)
            .await
            .map_err(db_error("Failed to update price item"))?;

        info!(price_item_id, "Price item updated");
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn by_product_ids(
        &self,
        product_ids: Vec<i64>,
    ) -> Result<Vec<PriceItemResponse>, ServiceError> {
        let db = &*self.db_pool;
        let items = PriceItemEntity::find()
            .filter(price_item::Column::ProductId.is_in(product_ids))
            .order_by_asc(price_item::Column::Id)
            .all(db)
            .await
            .map_err(db_error("Failed to fetch price items by product"))?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    /// Price items by id; with `markup` the returned price is the sale price
    #[instrument(skip(self))]
    pub async fn by_ids(
        &self,
        ids: Vec<i64>,
        markup: bool,
    ) -> Result<Vec<PriceItemResponse>, ServiceError> {
        let db = &*self.db_pool;
        let items = PriceItemEntity::find()
            .filter(price_item::Column::Id.is_in(ids))
            .order_by_asc(price_item::Column::Id)
            .all(db)
            .await
            .map_err(db_error("Failed to fetch price items"))?;

        Ok(items
            .into_iter()
            .map(|item| {
                let sale_price = item.sale_price();
                let mut response = PriceItemResponse::from(item);
                if markup {
                    response.price = sale_price;
                }
                response
            })
            .collect())
    }

    /// Sale price of the newest price item of each product that has one
    #[instrument(skip(self))]
    pub async fn sale_prices(
        &self,
        product_ids: Vec<i64>,
    ) -> Result<HashMap<i64, Decimal>, ServiceError> {
        let db = &*self.db_pool;
        let latest = latest_for_products(db, &product_ids).await?;
        Ok(latest
            .into_iter()
            .map(|(product_id, item)| (product_id, item.sale_price()))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn markups(&self, ids: Vec<i64>) -> Result<Vec<MarkupResponse>, ServiceError> {
        let db = &*self.db_pool;
        let items = PriceItemEntity::find()
            .filter(price_item::Column::Id.is_in(ids))
            .order_by_asc(price_item::Column::Id)
            .all(db)
            .await
            .map_err(db_error("Failed to fetch markups"))?;

        Ok(items
            .into_iter()
            .map(|item| MarkupResponse {
                price_item_id: item.id,
                markup: item.markup.normalize(),
            })
            .collect())
    }

    /// Sets the markup of several price items in one transaction
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn update_markups(
        &self,
        requests: Vec<MarkupRequest>,
    ) -> Result<Vec<MarkupUpdateResponse>, ServiceError> {
        for request in &requests {
            request.validate()?;
        }

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for markup update");
            ServiceError::DatabaseError(e)
        })?;

        let mut updated = Vec::with_capacity(requests.len());
        for request in requests {
            let existing = find_price_item(&txn, request.price_item_id).await?;
            let mut active: price_item::ActiveModel = existing.into();
            active.markup = Set(request.markup);
            let item = active
                .update(&txn)
                .await
                .map_err(db_error("Failed to update markup"))?;

            updated.push(MarkupUpdateResponse {
                price_item_id: item.id,
                product_id: item.product_id,
                price: pricing::round_money(item.price),
                markup: item.markup.normalize(),
            });
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit markup update");
            ServiceError::DatabaseError(e)
        })?;

        info!(count = updated.len(), "Markups updated");
        Ok(updated)
    }
}

pub(crate) async fn find_price_item<C: ConnectionTrait>(
    db: &C,
    price_item_id: i64,
) -> Result<price_item::Model, ServiceError> {
    PriceItemEntity::find_by_id(price_item_id)
        .one(db)
        .await
        .map_err(db_error("Failed to fetch price item"))?
        .ok_or_else(|| {
            warn!(price_item_id, "Price item not found");
            ServiceError::NotFound(format!(
                "This price item with id: {} doesn't exist!",
                price_item_id
            ))
        })
}

/// Newest price item (highest id) of every product in `product_ids`.
pub(crate) async fn latest_for_products<C: ConnectionTrait>(
    db: &C,
    product_ids: &[i64],
) -> Result<HashMap<i64, price_item::Model>, ServiceError> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let items = PriceItemEntity::find()
        .filter(price_item::Column::ProductId.is_in(product_ids.iter().copied()))
        .order_by_desc(price_item::Column::Id)
        .all(db)
        .await
        .map_err(db_error("Failed to fetch latest price items"))?;

    let mut latest = HashMap::new();
    for item in items {
        latest.entry(item.product_id).or_insert(item);
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::setup_db;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn request(product_id: i64, price: Decimal, markup: Decimal) -> PriceItemRequest {
        PriceItemRequest {
            product_id,
            price,
            markup,
        }
    }

    #[tokio::test]
    async fn created_price_item_reads_back_identically() {
        let service = PriceItemService::new(setup_db().await);
        let created = service.create(request(4, dec!(25.50), dec!(0.20))).await.unwrap();

        let fetched = service.get(created.id).await.unwrap();
        assert_eq!(fetched.product_id, 4);
        assert_eq!(fetched.price, dec!(25.50));
        assert_eq!(fetched.markup, dec!(0.2));
    }

    #[tokio::test]
    async fn update_of_unknown_item_uses_domain_message() {
        let service = PriceItemService::new(setup_db().await);
        let err = service
            .update(17, request(1, dec!(1.00), dec!(0.1)))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
        assert_eq!(err.to_string(), "This price item with id: 17 doesn't exist!");
    }

    #[tokio::test]
    async fn by_ids_applies_markup_on_request() {
        let service = PriceItemService::new(setup_db().await);
        let item = service.create(request(1, dec!(35.50), dec!(0.30))).await.unwrap();

        let plain = service.by_ids(vec![item.id], false).await.unwrap();
        assert_eq!(plain[0].price, dec!(35.50));

        let marked_up = service.by_ids(vec![item.id], true).await.unwrap();
        assert_eq!(marked_up[0].price, dec!(46.15));
    }

    #[tokio::test]
    async fn sale_prices_use_newest_price_item() {
        let service = PriceItemService::new(setup_db().await);
        service.create(request(1, dec!(10.00), dec!(0.10))).await.unwrap();
        service.create(request(1, dec!(45.50), dec!(0.20))).await.unwrap();
        service.create(request(2, dec!(25.50), dec!(0.20))).await.unwrap();

        let prices = service.sale_prices(vec![1, 2, 3]).await.unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[&1], dec!(54.60));
        assert_eq!(prices[&2], dec!(30.60));
    }

    #[tokio::test]
    async fn markup_update_reports_price_and_product() {
        let service = PriceItemService::new(setup_db().await);
        let item = service.create(request(8, dec!(25.50), dec!(0.20))).await.unwrap();

        let updated = service
            .update_markups(vec![MarkupRequest {
                price_item_id: item.id,
                markup: dec!(0.35),
            }])
            .await
            .unwrap();
        assert_eq!(
            updated,
            vec![MarkupUpdateResponse {
                price_item_id: item.id,
                product_id: 8,
                price: dec!(25.50),
                markup: dec!(0.35),
            }]
        );

        let markups = service.markups(vec![item.id]).await.unwrap();
        assert_eq!(markups[0].markup, dec!(0.35));
    }

    #[tokio::test]
    async fn markup_update_is_all_or_nothing() {
        let service = PriceItemService::new(setup_db().await);
        let item = service.create(request(8, dec!(25.50), dec!(0.20))).await.unwrap();

        let err = service
            .update_markups(vec![
                MarkupRequest {
                    price_item_id: item.id,
                    markup: dec!(0.50),
                },
                MarkupRequest {
                    price_item_id: 999,
                    markup: dec!(0.50),
                },
            ])
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));

        let markups = service.markups(vec![item.id]).await.unwrap();
        assert_eq!(markups[0].markup, dec!(0.2));
    }
}
