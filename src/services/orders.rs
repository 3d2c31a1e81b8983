use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, Iterable, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use super::{db_error, pricing};
use crate::{
    clients::{DynAccountancyClient, DynProductClient},
    db::DbPool,
    dto::accountancy::{CreateOutcomeInvoiceRequest, OrderedProduct},
    dto::order::{
        ConfirmOrderResponse, OrderDetailsResponse, OrderItemDetails, OrderItemRequest,
        OrderRequest, OrderResponse,
    },
    entities::order::{self, Entity as OrderEntity, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity},
    errors::ServiceError,
    metrics,
    Page, PageQuery,
};

/// Service for managing orders and their items
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    accountancy: DynAccountancyClient,
    product: DynProductClient,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        accountancy: DynAccountancyClient,
        product: DynProductClient,
    ) -> Self {
        Self {
            db_pool,
            accountancy,
            product,
        }
    }

    /// Creates an order in status `CREATED`
    #[instrument(skip(self, request), fields(items = request.order_items.len()))]
    pub async fn create_order(&self, request: OrderRequest) -> Result<OrderResponse, ServiceError> {
        check_items(&request)?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order = order::ActiveModel {
            order_status: Set(OrderStatus::Created),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_error("Failed to insert order"))?;

        let items = insert_items(&txn, order.id, &request.order_items).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = order.id, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = order.id, "Order created successfully");
        Ok(OrderResponse::from_parts(order, items))
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i64) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = find_order(db, order_id).await?;
        let items = load_items(db, order_id).await?;
        Ok(OrderResponse::from_parts(order, items))
    }

    /// Lists orders by ascending id
    #[instrument(skip(self))]
    pub async fn list_orders(&self, query: PageQuery) -> Result<Page<OrderResponse>, ServiceError> {
        let db = &*self.db_pool;

        let paginator = OrderEntity::find()
            .order_by_asc(order::Column::Id)
            .paginate(db, query.size());

        let total = paginator
            .num_items()
            .await
            .map_err(db_error("Failed to count orders"))?;
        let orders = paginator.fetch_page(query.page).await.map_err(|e| {
            error!(error = %e, page = query.page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        let content = self.with_items(orders).await?;
        Ok(Page::new(content, &query, total))
    }

    /// Replaces the items of an order and marks it `UPDATED`
    #[instrument(skip(self, request), fields(items = request.order_items.len()))]
    pub async fn update_order(
        &self,
        order_id: i64,
        request: OrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        check_items(&request)?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to start transaction for order update");
            ServiceError::DatabaseError(e)
        })?;

        let existing = find_order(&txn, order_id).await?;

        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await
            .map_err(db_error("Failed to remove previous order items"))?;
        let items = insert_items(&txn, order_id, &request.order_items).await?;

        let mut active: order::ActiveModel = existing.into();
        active.order_status = Set(OrderStatus::Updated);
        let order = active
            .update(&txn)
            .await
            .map_err(db_error("Failed to update order"))?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit order update");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id, "Order updated successfully");
        Ok(OrderResponse::from_parts(order, items))
    }

    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: i64) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(db_error("Failed to start transaction"))?;

        find_order(&txn, order_id).await?;
        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        OrderEntity::delete_by_id(order_id)
            .exec(&txn)
            .await
            .map_err(db_error("Failed to delete order"))?;

        txn.commit().await?;
        info!(order_id, "Order deleted");
        Ok(())
    }

    /// Sets the status of an order, as requested by accountancy and store
    #[instrument(skip(self), fields(status = %status))]
    pub async fn change_status(
        &self,
        order_id: i64,
        status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = self.set_status(order_id, status).await?;
        let items = load_items(db, order_id).await?;
        Ok(OrderResponse::from_parts(order, items))
    }

    /// Items with product names and sale prices, plus the order total
    #[instrument(skip(self))]
    pub async fn order_details(&self, order_id: i64) -> Result<OrderDetailsResponse, ServiceError> {
        let db = &*self.db_pool;
        find_order(db, order_id).await?;
        let items = load_items(db, order_id).await?;

        let product_ids = distinct_product_ids(&items);
        let names: HashMap<i64, String> = self
            .product
            .details(product_ids.clone())
            .await?
            .into_iter()
            .map(|details| (details.id, details.name))
            .collect();
        let prices = self.accountancy.sale_prices(product_ids).await?;

        let mut details = Vec::with_capacity(items.len());
        for item in items {
            let name = names.get(&item.product_id).cloned().ok_or_else(|| {
                ServiceError::NotFound(format!("Product with id {} was not found", item.product_id))
            })?;
            let price = prices.get(&item.product_id).copied().ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Price item for product with id {} was not found",
                    item.product_id
                ))
            })?;
            details.push(OrderItemDetails {
                product_id: item.product_id,
                name,
                price: pricing::round_money(price),
                quantity: item.quantity,
            });
        }

        let total = pricing::total_of(details.iter().map(|d| (d.price, d.quantity)))?;
        Ok(OrderDetailsResponse {
            order_item_details: details,
            total,
        })
    }

    #[instrument(skip(self), fields(status = %status))]
    pub async fn orders_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let db = &*self.db_pool;
        let orders = OrderEntity::find()
            .filter(order::Column::OrderStatus.eq(status))
            .order_by_asc(order::Column::Id)
            .all(db)
            .await
            .map_err(db_error("Failed to fetch orders by status"))?;
        self.with_items(orders).await
    }

    /// Bought quantity per product over orders that were not cancelled or refunded
    #[instrument(skip(self))]
    pub async fn total_buys(&self) -> Result<HashMap<i64, i32>, ServiceError> {
        let db = &*self.db_pool;
        let void: Vec<OrderStatus> = OrderStatus::iter().filter(|s| s.is_void()).collect();

        let items = OrderItemEntity::find()
            .inner_join(OrderEntity)
            .filter(order::Column::OrderStatus.is_not_in(void))
            .all(db)
            .await
            .map_err(db_error("Failed to aggregate order items"))?;

        let mut buys: HashMap<i64, i32> = HashMap::new();
        for item in items {
            let bought = buys.entry(item.product_id).or_default();
            // Saturates: only used for ranking
            *bought = bought.saturating_add(item.quantity);
        }
        Ok(buys)
    }

    /// Issues the outcome invoice of an order and marks it `CONFIRMED`
    #[instrument(skip(self))]
    pub async fn confirm_order(&self, order_id: i64) -> Result<ConfirmOrderResponse, ServiceError> {
        let db = &*self.db_pool;
        find_order(db, order_id).await?;
        let items = load_items(db, order_id).await?;
        if items.is_empty() {
            warn!(order_id, "Refusing to confirm an order without items");
            return Err(ServiceError::InsufficientOrderItems);
        }

        let invoice = self
            .accountancy
            .create_outcome_invoice(CreateOutcomeInvoiceRequest {
                order_id,
                items: items
                    .iter()
                    .map(|item| OrderedProduct {
                        product_id: item.product_id,
                        quantity: item.quantity,
                    })
                    .collect(),
            })
            .await?;

        self.set_status(order_id, OrderStatus::Confirmed).await?;

        metrics::increment_counter("drugstore_orders_confirmed_total");
        info!(order_id, invoice_id = invoice.id, total = %invoice.total, "Order confirmed");
        Ok(ConfirmOrderResponse {
            order_id,
            amount: invoice.total,
        })
    }

    async fn set_status(
        &self,
        order_id: i64,
        status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db_pool;
        let existing = find_order(db, order_id).await?;
        let previous = existing.order_status;

        let mut active: order::ActiveModel = existing.into();
        active.order_status = Set(status);
        let order = active.update(db).await.map_err(|e| {
            error!(error = %e, order_id, "Failed to update order status");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id, from = %previous, to = %status, "Order status changed");
        Ok(order)
    }

    async fn with_items(
        &self,
        orders: Vec<order::Model>,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let db = &*self.db_pool;
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();

        let mut grouped: HashMap<i64, Vec<order_item::Model>> = HashMap::new();
        if !ids.is_empty() {
            let items = OrderItemEntity::find()
                .filter(order_item::Column::OrderId.is_in(ids))
                .order_by_asc(order_item::Column::Id)
                .all(db)
                .await
                .map_err(db_error("Failed to fetch order items"))?;
            for item in items {
                grouped.entry(item.order_id).or_default().push(item);
            }
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = grouped.remove(&order.id).unwrap_or_default();
                OrderResponse::from_parts(order, items)
            })
            .collect())
    }
}

fn check_items(request: &OrderRequest) -> Result<(), ServiceError> {
    if request.order_items.is_empty() {
        return Err(ServiceError::InsufficientOrderItems);
    }
    request.validate()?;
    Ok(())
}

async fn find_order<C: ConnectionTrait>(db: &C, order_id: i64) -> Result<order::Model, ServiceError> {
    OrderEntity::find_by_id(order_id)
        .one(db)
        .await
        .map_err(db_error("Failed to fetch order"))?
        .ok_or_else(|| {
            warn!(order_id, "Order not found");
            ServiceError::OrderNotFound(order_id)
        })
}

async fn load_items<C: ConnectionTrait>(
    db: &C,
    order_id: i64,
) -> Result<Vec<order_item::Model>, ServiceError> {
    OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await
        .map_err(db_error("Failed to fetch order items"))
}

async fn insert_items<C: ConnectionTrait>(
    db: &C,
    order_id: i64,
    items: &[OrderItemRequest],
) -> Result<Vec<order_item::Model>, ServiceError> {
    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let model = order_item::ActiveModel {
            order_id: Set(order_id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(db_error("Failed to insert order item"))?;
        inserted.push(model);
    }
    Ok(inserted)
}

fn distinct_product_ids(items: &[order_item::Model]) -> Vec<i64> {
    let mut ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
