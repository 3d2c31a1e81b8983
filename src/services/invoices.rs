use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use super::{add_quantity, db_error, price_items, pricing};
use crate::{
    clients::{DynOrderClient, DynProductClient, DynStoreClient},
    db::DbPool,
    dto::accountancy::{CreateIncomeInvoiceRequest, CreateOutcomeInvoiceRequest, InvoiceResponse},
    dto::product::CreateProductRequest,
    dto::store::StoreQuantityRequest,
    entities::invoice::{self, Entity as InvoiceEntity, InvoiceStatus, InvoiceType},
    entities::invoice_item::{self, Entity as InvoiceItemEntity},
    entities::order::OrderStatus,
    entities::{price_item, purchased_cost},
    errors::ServiceError,
    metrics,
    proto::{InvoiceDetails, InvoiceDetailsItem},
};

/// Service for invoices and their payment lifecycle
#[derive(Clone)]
pub struct InvoiceService {
    db_pool: Arc<DbPool>,
    product: DynProductClient,
    store: DynStoreClient,
    order: DynOrderClient,
}

impl InvoiceService {
    pub fn new(
        db_pool: Arc<DbPool>,
        product: DynProductClient,
        store: DynStoreClient,
        order: DynOrderClient,
    ) -> Self {
        Self {
            db_pool,
            product,
            store,
            order,
        }
    }

    /// Issues the `OUTCOME` invoice of an order, reserving its items in the store
    #[instrument(skip(self, request), fields(order_id = request.order_id, items = request.items.len()))]
    pub async fn create_outcome_invoice(
        &self,
        request: CreateOutcomeInvoiceRequest,
    ) -> Result<InvoiceResponse, ServiceError> {
        let db = &*self.db_pool;
        let order_id = request.order_id;

        if live_invoice_for_order(db, order_id).await?.is_some() {
            warn!(order_id, "Order already has an invoice");
            return Err(ServiceError::Conflict(
                "This order already have some invoice".to_string(),
            ));
        }
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Should not be empty request list".to_string(),
            ));
        }
        request.validate()?;

        // Quantities per product, in first-seen order
        let mut lines: Vec<(i64, i32)> = Vec::new();
        for item in &request.items {
            match lines.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, quantity)) => *quantity = add_quantity(*quantity, item.quantity)?,
                None => lines.push((item.product_id, item.quantity)),
            }
        }
        let product_ids: Vec<i64> = lines.iter().map(|(id, _)| *id).collect();

        let latest = price_items::latest_for_products(db, &product_ids).await?;
        let mut priced = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            let item = latest.get(&product_id).cloned().ok_or_else(|| {
                warn!(product_id, "No price item for product");
                ServiceError::NotFound(format!(
                    "Price item for product with id {} was not found",
                    product_id
                ))
            })?;
            priced.push((item, quantity));
        }

        let total = pricing::total_of(
            priced
                .iter()
                .map(|(item, quantity)| (item.sale_price(), *quantity)),
        )?;

        let names: HashMap<i64, String> = self
            .product
            .details(product_ids)
            .await?
            .into_iter()
            .map(|details| (details.id, details.name))
            .collect();

        self.store
            .reduce(
                priced
                    .iter()
                    .map(|(item, quantity)| StoreQuantityRequest {
                        price_item_id: item.id,
                        quantity: *quantity,
                    })
                    .collect(),
            )
            .await?;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to start transaction for outcome invoice");
            ServiceError::DatabaseError(e)
        })?;

        let invoice = invoice::ActiveModel {
            order_id: Set(Some(order_id)),
            invoice_type: Set(InvoiceType::Outcome),
            status: Set(InvoiceStatus::Created),
            total: Set(total),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_error("Failed to insert outcome invoice"))?;

        let mut items = Vec::with_capacity(priced.len());
        for (item, quantity) in priced {
            let name = names.get(&item.product_id).cloned().unwrap_or_default();
            items.push(
                insert_item(&txn, invoice.id, &item, name, item.sale_price(), quantity).await?,
            );
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit outcome invoice");
            ServiceError::DatabaseError(e)
        })?;

        metrics::increment_counter("drugstore_invoices_created_total");
        info!(invoice_id = invoice.id, order_id, total = %total, "Outcome invoice created");
        Ok(InvoiceResponse::from_parts(invoice, items))
    }

    /// Books purchased goods: products, price items, purchased costs and a paid `INCOME` invoice
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn create_income_invoice(
        &self,
        request: CreateIncomeInvoiceRequest,
    ) -> Result<InvoiceResponse, ServiceError> {
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Should not be empty request list".to_string(),
            ));
        }
        request.validate()?;

        let products = self
            .product
            .create_products(
                request
                    .items
                    .iter()
                    .map(|item| CreateProductRequest {
                        name: item.name.clone(),
                        price: item.price,
                        quantity: item.quantity,
                    })
                    .collect(),
            )
            .await?;
        if products.len() != request.items.len() {
            return Err(ServiceError::InternalError(format!(
                "Product service created {} of {} products",
                products.len(),
                request.items.len()
            )));
        }

        let total = pricing::total_of(
            request
                .items
                .iter()
                .map(|item| (pricing::round_money(item.price), item.quantity)),
        )?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for income invoice");
            ServiceError::DatabaseError(e)
        })?;

        let invoice = invoice::ActiveModel {
            order_id: Set(None),
            invoice_type: Set(InvoiceType::Income),
            status: Set(InvoiceStatus::Paid),
            total: Set(total),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_error("Failed to insert income invoice"))?;

        let now = Utc::now();
        let mut items = Vec::with_capacity(products.len());
        for (line, product) in request.items.into_iter().zip(products) {
            let item = price_item::ActiveModel {
                product_id: Set(product.id),
                price: Set(pricing::round_money(line.price)),
                markup: Set(line.markup),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(db_error("Failed to insert price item"))?;

            purchased_cost::ActiveModel {
                price_item_id: Set(item.id),
                quantity: Set(line.quantity),
                date_of_purchase: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(db_error("Failed to insert purchased cost"))?;

            let price = item.price;
            items.push(insert_item(&txn, invoice.id, &item, line.name, price, line.quantity).await?);
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit income invoice");
            ServiceError::DatabaseError(e)
        })?;

        info!(invoice_id = invoice.id, total = %total, "Income invoice created");
        Ok(InvoiceResponse::from_parts(invoice, items))
    }

    #[instrument(skip(self))]
    pub async fn get_invoice(&self, invoice_id: i64) -> Result<InvoiceResponse, ServiceError> {
        let db = &*self.db_pool;
        let invoice = find_invoice(db, invoice_id).await?;
        let items = load_items(db, invoice_id).await?;
        Ok(InvoiceResponse::from_parts(invoice, items))
    }

    /// Latest invoice of an order that was not cancelled
    #[instrument(skip(self))]
    pub async fn invoice_by_order(&self, order_id: i64) -> Result<InvoiceResponse, ServiceError> {
        let db = &*self.db_pool;
        let invoice = find_by_order(db, order_id).await?;
        let items = load_items(db, invoice.id).await?;
        Ok(InvoiceResponse::from_parts(invoice, items))
    }

    #[instrument(skip(self))]
    pub async fn invoice_details(&self, invoice_id: i64) -> Result<InvoiceDetails, ServiceError> {
        let db = &*self.db_pool;
        let invoice = find_invoice(db, invoice_id).await?;
        let items = load_items(db, invoice_id).await?;
        Ok(to_details(&invoice, &items))
    }

    #[instrument(skip(self))]
    pub async fn invoice_details_by_order(
        &self,
        order_id: i64,
    ) -> Result<InvoiceDetails, ServiceError> {
        let db = &*self.db_pool;
        let invoice = find_by_order(db, order_id).await?;
        let items = load_items(db, invoice.id).await?;
        Ok(to_details(&invoice, &items))
    }

    /// Pays a `CREATED` invoice; `money`, when given, must cover the total
    #[instrument(skip(self))]
    pub async fn pay(
        &self,
        invoice_id: i64,
        money: Option<Decimal>,
    ) -> Result<InvoiceResponse, ServiceError> {
        let db = &*self.db_pool;
        let invoice = find_invoice(db, invoice_id).await?;

        if invoice.status != InvoiceStatus::Created {
            return Err(invalid_status(&invoice));
        }
        if let Some(money) = money {
            if money < invoice.total {
                warn!(invoice_id, money = %money, total = %invoice.total, "Payment does not cover invoice");
                metrics::increment_counter("drugstore_invoice_payments_failed_total");
                return Err(ServiceError::PaymentFailed(format!(
                    "Not enough money to pay the invoice with id = {}",
                    invoice_id
                )));
            }
        }

        let paid = transition(db, &invoice, InvoiceStatus::Paid).await?;
        if let Some(order_id) = paid.order_id {
            self.notify_order(order_id, OrderStatus::Paid).await;
        }

        metrics::increment_counter("drugstore_invoices_paid_total");
        info!(invoice_id, "Invoice paid");
        let items = load_items(db, invoice_id).await?;
        Ok(InvoiceResponse::from_parts(paid, items))
    }

    /// Refunds a paid outcome invoice whose goods have not left the store
    #[instrument(skip(self))]
    pub async fn refund(&self, invoice_id: i64) -> Result<InvoiceResponse, ServiceError> {
        let db = &*self.db_pool;
        let invoice = find_invoice(db, invoice_id).await?;

        if invoice.status != InvoiceStatus::Paid {
            return Err(ServiceError::InvalidStatus(format!(
                "The invoice with id = {} is not paid",
                invoice_id
            )));
        }
        if invoice.invoice_type == InvoiceType::Income {
            return Err(ServiceError::BadRequest(format!(
                "Income invoice with id = {} can not be refunded",
                invoice_id
            )));
        }

        let items = load_items(db, invoice_id).await?;
        if let Some(order_id) = invoice.order_id {
            self.store.check_transfer(order_id).await?;
        }

        let refunded = transition(db, &invoice, InvoiceStatus::Refund).await?;
        self.return_or_revert(&refunded, invoice.status, &items).await?;
        if let Some(order_id) = refunded.order_id {
            self.notify_order(order_id, OrderStatus::Refund).await;
        }

        metrics::increment_counter("drugstore_invoices_refunded_total");
        info!(invoice_id, "Invoice refunded");
        Ok(InvoiceResponse::from_parts(refunded, items))
    }

    /// Cancels an unpaid invoice and gives its items back to the store
    #[instrument(skip(self))]
    pub async fn cancel(&self, invoice_id: i64) -> Result<InvoiceResponse, ServiceError> {
        let db = &*self.db_pool;
        let invoice = find_invoice(db, invoice_id).await?;

        match invoice.status {
            InvoiceStatus::Created => {}
            InvoiceStatus::Paid => {
                return Err(ServiceError::InvalidStatus(
                    "This order is already paid. Please, first do refund!".to_string(),
                ))
            }
            _ => return Err(invalid_status(&invoice)),
        }

        let items = load_items(db, invoice_id).await?;
        let cancelled = transition(db, &invoice, InvoiceStatus::Cancelled).await?;
        if invoice.invoice_type == InvoiceType::Outcome {
            self.return_or_revert(&cancelled, invoice.status, &items).await?;
        }
        if let Some(order_id) = cancelled.order_id {
            self.notify_order(order_id, OrderStatus::Cancelled).await;
        }

        metrics::increment_counter("drugstore_invoices_cancelled_total");
        info!(invoice_id, "Invoice cancelled");
        Ok(InvoiceResponse::from_parts(cancelled, items))
    }

    /// Cancels every `CREATED` invoice older than `ttl`; returns how many were cancelled
    #[instrument(skip(self))]
    pub async fn cancel_expired(&self, ttl: Duration) -> Result<usize, ServiceError> {
        let db = &*self.db_pool;
        let cutoff = Utc::now() - ttl;

        let expired = InvoiceEntity::find()
            .filter(invoice::Column::Status.eq(InvoiceStatus::Created))
            .filter(invoice::Column::CreatedAt.lt(cutoff))
            .order_by_asc(invoice::Column::Id)
            .all(db)
            .await
            .map_err(db_error("Failed to fetch expired invoices"))?;

        let mut cancelled = 0;
        for invoice in expired {
            match self.cancel(invoice.id).await {
                Ok(_) => cancelled += 1,
                Err(e) => warn!(invoice_id = invoice.id, error = %e, "Failed to cancel expired invoice"),
            }
        }

        if cancelled > 0 {
            info!(cancelled, "Expired invoices cancelled");
        }
        Ok(cancelled)
    }

    /// Gives the items of a claimed invoice back to the store. When the store refuses, the
    /// invoice goes back to `previous` so the operation can be retried.
    async fn return_or_revert(
        &self,
        claimed: &invoice::Model,
        previous: InvoiceStatus,
        items: &[invoice_item::Model],
    ) -> Result<(), ServiceError> {
        if items.is_empty() {
            return Ok(());
        }
        let returned = match store_quantities(items) {
            Ok(quantities) => self.store.increase(quantities).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = returned {
            warn!(invoice_id = claimed.id, error = %e, "Store refused returned items");
            if let Err(revert) = transition(&*self.db_pool, claimed, previous).await {
                error!(invoice_id = claimed.id, error = %revert, "Failed to restore invoice status");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn notify_order(&self, order_id: i64, status: OrderStatus) {
        if let Err(e) = self.order.change_status(order_id, status).await {
            warn!(error = %e, order_id, status = %status, "Failed to notify order service");
        }
    }
}

fn invalid_status(invoice: &invoice::Model) -> ServiceError {
    ServiceError::InvalidStatus(format!(
        "Invalid status of invoice with id = {}: {}",
        invoice.id, invoice.status
    ))
}

/// Moves `invoice` to `next`, provided nobody changed its status in the meantime. The
/// caller that wins owns the side effects of the transition.
async fn transition<C: ConnectionTrait>(
    db: &C,
    invoice: &invoice::Model,
    next: InvoiceStatus,
) -> Result<invoice::Model, ServiceError> {
    let result = InvoiceEntity::update_many()
        .col_expr(invoice::Column::Status, Expr::value(next))
        .col_expr(invoice::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(invoice::Column::Id.eq(invoice.id))
        .filter(invoice::Column::Status.eq(invoice.status))
        .exec(db)
        .await
        .map_err(db_error("Failed to update invoice status"))?;

    if result.rows_affected == 0 {
        warn!(invoice_id = invoice.id, "Invoice status changed concurrently");
        return Err(ServiceError::Conflict(format!(
            "The invoice with id = {} was modified concurrently",
            invoice.id
        )));
    }

    find_invoice(db, invoice.id).await
}

async fn insert_item<C: ConnectionTrait>(
    db: &C,
    invoice_id: i64,
    item: &price_item::Model,
    name: String,
    price: Decimal,
    quantity: i32,
) -> Result<invoice_item::Model, ServiceError> {
    invoice_item::ActiveModel {
        invoice_id: Set(invoice_id),
        price_item_id: Set(item.id),
        product_id: Set(item.product_id),
        name: Set(name),
        price: Set(price),
        quantity: Set(quantity),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(db_error("Failed to insert invoice item"))
}

async fn find_invoice<C: ConnectionTrait>(
    db: &C,
    invoice_id: i64,
) -> Result<invoice::Model, ServiceError> {
    InvoiceEntity::find_by_id(invoice_id)
        .one(db)
        .await
        .map_err(db_error("Failed to fetch invoice"))?
        .ok_or_else(|| {
            warn!(invoice_id, "Invoice not found");
            ServiceError::NotFound(format!("The invoice with id: {} doesn't exist!", invoice_id))
        })
}

async fn live_invoice_for_order<C: ConnectionTrait>(
    db: &C,
    order_id: i64,
) -> Result<Option<invoice::Model>, ServiceError> {
    InvoiceEntity::find()
        .filter(invoice::Column::OrderId.eq(order_id))
        .filter(invoice::Column::Status.ne(InvoiceStatus::Cancelled))
        .order_by_desc(invoice::Column::Id)
        .one(db)
        .await
        .map_err(db_error("Failed to fetch invoice by order"))
}

async fn find_by_order<C: ConnectionTrait>(
    db: &C,
    order_id: i64,
) -> Result<invoice::Model, ServiceError> {
    live_invoice_for_order(db, order_id).await?.ok_or_else(|| {
        warn!(order_id, "Invoice for order not found");
        ServiceError::NotFound(format!(
            "The invoice with order id: {} doesn't exist!",
            order_id
        ))
    })
}

async fn load_items<C: ConnectionTrait>(
    db: &C,
    invoice_id: i64,
) -> Result<Vec<invoice_item::Model>, ServiceError> {
    InvoiceItemEntity::find()
        .filter(invoice_item::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(invoice_item::Column::Id)
        .all(db)
        .await
        .map_err(db_error("Failed to fetch invoice items"))
}

fn store_quantities(
    items: &[invoice_item::Model],
) -> Result<Vec<StoreQuantityRequest>, ServiceError> {
    let mut quantities: Vec<StoreQuantityRequest> = Vec::new();
    for item in items {
        match quantities
            .iter_mut()
            .find(|q| q.price_item_id == item.price_item_id)
        {
            Some(existing) => existing.quantity = add_quantity(existing.quantity, item.quantity)?,
            None => quantities.push(StoreQuantityRequest {
                price_item_id: item.price_item_id,
                quantity: item.quantity,
            }),
        }
    }
    Ok(quantities)
}

fn to_details(invoice: &invoice::Model, items: &[invoice_item::Model]) -> InvoiceDetails {
    InvoiceDetails {
        invoice_id: invoice.id,
        order_id: invoice.order_id,
        status: invoice.status.to_string(),
        invoice_type: invoice.invoice_type.to_string(),
        items: items
            .iter()
            .map(|item| InvoiceDetailsItem {
                price_item_id: item.price_item_id,
                product_id: item.product_id,
                name: item.name.clone(),
                quantity: item.quantity,
                price: pricing::round_money(item.price).to_string(),
            })
            .collect(),
        total: pricing::round_money(invoice.total).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::order::MockOrderClient;
    use crate::clients::product::MockProductClient;
    use crate::clients::store::MockStoreClient;
    use crate::dto::accountancy::{IncomeItemRequest, OrderedProduct, PriceItemRequest};
    use crate::dto::product::{ProductDetails, ProductResponse};
    use crate::dto::store::{CheckTransferResponse, StoreResponse};
    use crate::entities::product::ProductStatus;
    use crate::services::price_items::PriceItemService;
    use crate::services::test_support::setup_db;
    use assert_matches::assert_matches;
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Mocks {
        product: MockProductClient,
        store: MockStoreClient,
        order: MockOrderClient,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                product: MockProductClient::new(),
                store: MockStoreClient::new(),
                order: MockOrderClient::new(),
            }
        }

        fn with_product_names(mut self) -> Self {
            self.product.expect_details().returning(|ids| {
                Ok(ids
                    .into_iter()
                    .map(|id| ProductDetails {
                        id,
                        name: format!("Product {}", id),
                        price: dec!(1.00),
                        quantity: 100,
                        status: ProductStatus::Received,
                    })
                    .collect())
            });
            self
        }

        fn with_store_reduce(mut self) -> Self {
            self.store.expect_reduce().returning(|items| {
                Ok(items
                    .into_iter()
                    .map(|item| StoreResponse {
                        id: item.price_item_id,
                        price_item_id: item.price_item_id,
                        quantity: 0,
                    })
                    .collect())
            });
            self
        }
    }

    async fn setup(mocks: Mocks) -> (InvoiceService, Arc<DbPool>) {
        let db = setup_db().await;
        let prices = PriceItemService::new(db.clone());
        for (product_id, price, markup) in [
            (1, dec!(25.50), dec!(0.20)),
            (2, dec!(35.50), dec!(0.30)),
        ] {
            prices
                .create(PriceItemRequest {
                    product_id,
                    price,
                    markup,
                })
                .await
                .unwrap();
        }
        let service = InvoiceService::new(
            db.clone(),
            Arc::new(mocks.product),
            Arc::new(mocks.store),
            Arc::new(mocks.order),
        );
        (service, db)
    }

    fn outcome(order_id: i64, items: &[(i64, i32)]) -> CreateOutcomeInvoiceRequest {
        CreateOutcomeInvoiceRequest {
            order_id,
            items: items
                .iter()
                .map(|&(product_id, quantity)| OrderedProduct {
                    product_id,
                    quantity,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn outcome_invoice_uses_sale_prices() {
        let (service, _) = setup(Mocks::new().with_product_names().with_store_reduce()).await;

        let invoice = service
            .create_outcome_invoice(outcome(10, &[(1, 2), (2, 1)]))
            .await
            .unwrap();

        assert_eq!(invoice.invoice_type, InvoiceType::Outcome);
        assert_eq!(invoice.status, InvoiceStatus::Created);
        assert_eq!(invoice.items[0].price, dec!(30.60));
        assert_eq!(invoice.items[1].price, dec!(46.15));
        assert_eq!(invoice.items[1].name, "Product 2");
        assert_eq!(invoice.total, dec!(107.35));
    }

    #[tokio::test]
    async fn second_invoice_for_order_conflicts() {
        let (service, _) = setup(Mocks::new().with_product_names().with_store_reduce()).await;
        service
            .create_outcome_invoice(outcome(10, &[(1, 1)]))
            .await
            .unwrap();

        let err = service
            .create_outcome_invoice(outcome(10, &[(1, 1)]))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::Conflict(msg) if msg == "This order already have some invoice");
    }

    #[tokio::test]
    async fn product_without_price_item_is_not_found() {
        let (service, _) = setup(Mocks::new()).await;
        let err = service
            .create_outcome_invoice(outcome(10, &[(7, 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Price item for product with id 7 was not found");
    }

    #[tokio::test]
    async fn insufficient_store_leaves_no_invoice() {
        let mut mocks = Mocks::new().with_product_names();
        mocks
            .store
            .expect_reduce()
            .returning(|_| Err(ServiceError::InsufficientStock("Insufficient amount of store with price item id = 1".into())));
        let (service, _) = setup(mocks).await;

        let err = service
            .create_outcome_invoice(outcome(10, &[(1, 50)]))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InsufficientStock(_));
        assert_matches!(
            service.invoice_by_order(10).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn pay_moves_to_paid_and_notifies_order() {
        let mut mocks = Mocks::new().with_product_names().with_store_reduce();
        mocks
            .order
            .expect_change_status()
            .with(eq(10), eq(OrderStatus::Paid))
            .times(1)
            .returning(|_, _| Ok(()));
        let (service, _) = setup(mocks).await;
        let invoice = service
            .create_outcome_invoice(outcome(10, &[(1, 2)]))
            .await
            .unwrap();

        let paid = service.pay(invoice.id, None).await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);

        let err = service.pay(invoice.id, None).await.unwrap_err();
        assert_matches!(err, ServiceError::InvalidStatus(_));
    }

    #[tokio::test]
    async fn underpayment_is_refused() {
        let (service, _) = setup(Mocks::new().with_product_names().with_store_reduce()).await;
        let invoice = service
            .create_outcome_invoice(outcome(10, &[(1, 2)]))
            .await
            .unwrap();

        let err = service.pay(invoice.id, Some(dec!(61.19))).await.unwrap_err();
        assert_matches!(err, ServiceError::PaymentFailed(_));
        assert_eq!(
            service.get_invoice(invoice.id).await.unwrap().status,
            InvoiceStatus::Created
        );
    }

    #[tokio::test]
    async fn failed_order_notification_does_not_undo_payment() {
        let mut mocks = Mocks::new().with_product_names().with_store_reduce();
        mocks
            .order
            .expect_change_status()
            .returning(|_, _| Err(ServiceError::GatewayTimeout("order service timed out".into())));
        let (service, _) = setup(mocks).await;
        let invoice = service
            .create_outcome_invoice(outcome(10, &[(1, 1)]))
            .await
            .unwrap();

        let paid = service.pay(invoice.id, Some(dec!(100))).await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn cancel_rules() {
        let mut mocks = Mocks::new().with_product_names().with_store_reduce();
        mocks
            .store
            .expect_increase()
            .withf(|items| items.len() == 1 && items[0].quantity == 2)
            .times(1)
            .returning(|_| Ok(vec![]));
        mocks.order.expect_change_status().returning(|_, _| Ok(()));
        let (service, _) = setup(mocks).await;

        let paid = service
            .create_outcome_invoice(outcome(10, &[(1, 1)]))
            .await
            .unwrap();
        service.pay(paid.id, None).await.unwrap();
        let err = service.cancel(paid.id).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "This order is already paid. Please, first do refund!"
        );

        let open = service
            .create_outcome_invoice(outcome(11, &[(2, 2)]))
            .await
            .unwrap();
        let cancelled = service.cancel(open.id).await.unwrap();
        assert_eq!(cancelled.status, InvoiceStatus::Cancelled);

        assert_matches!(
            service.cancel(open.id).await,
            Err(ServiceError::InvalidStatus(_))
        );
    }

    #[tokio::test]
    async fn concurrent_cancels_return_stock_once() {
        let returned = Arc::new(AtomicUsize::new(0));
        let mut mocks = Mocks::new().with_product_names().with_store_reduce();
        let counter = returned.clone();
        mocks.store.expect_increase().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        });
        mocks.order.expect_change_status().returning(|_, _| Ok(()));
        let (service, _) = setup(mocks).await;
        let invoice = service
            .create_outcome_invoice(outcome(10, &[(1, 2)]))
            .await
            .unwrap();

        let (first, second) = tokio::join!(service.cancel(invoice.id), service.cancel(invoice.id));

        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let loser = if first.is_ok() { second } else { first };
        assert_matches!(
            loser,
            Err(ServiceError::Conflict(_)) | Err(ServiceError::InvalidStatus(_))
        );
        assert_eq!(returned.load(Ordering::SeqCst), 1);
        assert_eq!(
            service.get_invoice(invoice.id).await.unwrap().status,
            InvoiceStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn refused_return_keeps_invoice_open() {
        let mut mocks = Mocks::new().with_product_names().with_store_reduce();
        let mut calls = 0;
        mocks.store.expect_increase().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(ServiceError::GatewayTimeout("store service timed out".into()))
            } else {
                Ok(vec![])
            }
        });
        mocks
            .order
            .expect_change_status()
            .with(eq(10), eq(OrderStatus::Cancelled))
            .times(1)
            .returning(|_, _| Ok(()));
        let (service, _) = setup(mocks).await;
        let invoice = service
            .create_outcome_invoice(outcome(10, &[(1, 1)]))
            .await
            .unwrap();

        assert_matches!(
            service.cancel(invoice.id).await,
            Err(ServiceError::GatewayTimeout(_))
        );
        assert_eq!(
            service.get_invoice(invoice.id).await.unwrap().status,
            InvoiceStatus::Created
        );

        let cancelled = service.cancel(invoice.id).await.unwrap();
        assert_eq!(cancelled.status, InvoiceStatus::Cancelled);
    }

    #[tokio::test]
    async fn repeated_lines_beyond_quantity_range_are_rejected() {
        let (service, _) = setup(Mocks::new()).await;

        let err = service
            .create_outcome_invoice(outcome(10, &vec![(1, 1_000_000); 2148]))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn refund_requires_paid_and_undelivered() {
        let mut mocks = Mocks::new().with_product_names().with_store_reduce();
        mocks.order.expect_change_status().returning(|_, _| Ok(()));
        mocks
            .store
            .expect_check_transfer()
            .with(eq(10))
            .returning(|order_id| {
                Ok(CheckTransferResponse {
                    order_id,
                    comment: "Not delivered".into(),
                })
            });
        mocks
            .store
            .expect_check_transfer()
            .with(eq(11))
            .returning(|order_id| {
                Err(ServiceError::Conflict(format!(
                    "Order with id = {} was already delivered",
                    order_id
                )))
            });
        mocks.store.expect_increase().times(1).returning(|_| Ok(vec![]));
        let (service, _) = setup(mocks).await;

        let invoice = service
            .create_outcome_invoice(outcome(10, &[(1, 1)]))
            .await
            .unwrap();
        let err = service.refund(invoice.id).await.unwrap_err();
        assert_eq!(err.to_string(), format!("The invoice with id = {} is not paid", invoice.id));

        service.pay(invoice.id, None).await.unwrap();
        let refunded = service.refund(invoice.id).await.unwrap();
        assert_eq!(refunded.status, InvoiceStatus::Refund);

        let delivered = service
            .create_outcome_invoice(outcome(11, &[(1, 1)]))
            .await
            .unwrap();
        service.pay(delivered.id, None).await.unwrap();
        assert_matches!(
            service.refund(delivered.id).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn income_invoice_books_products_prices_and_costs() {
        let mut mocks = Mocks::new();
        mocks.product.expect_create_products().returning(|requests| {
            Ok(requests
                .into_iter()
                .enumerate()
                .map(|(i, r)| ProductResponse {
                    id: 100 + i as i64,
                    name: r.name,
                    price: r.price,
                    quantity: r.quantity,
                    status: ProductStatus::Created,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .collect())
        });
        let (service, db) = setup(mocks).await;

        let invoice = service
            .create_income_invoice(CreateIncomeInvoiceRequest {
                items: vec![
                    IncomeItemRequest {
                        name: "Aspirin".into(),
                        price: dec!(25.50),
                        quantity: 10,
                        markup: dec!(0.20),
                    },
                    IncomeItemRequest {
                        name: "Ibuprofen".into(),
                        price: dec!(35.50),
                        quantity: 2,
                        markup: dec!(0.30),
                    },
                ],
            })
            .await
            .unwrap();

        assert_eq!(invoice.invoice_type, InvoiceType::Income);
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.order_id, None);
        assert_eq!(invoice.total, dec!(326.00));
        assert_eq!(invoice.items[1].product_id, 101);

        let prices = PriceItemService::new(db.clone())
            .sale_prices(vec![100, 101])
            .await
            .unwrap();
        assert_eq!(prices[&100], dec!(30.60));

        let costs = purchased_cost::Entity::find().all(&*db).await.unwrap();
        assert_eq!(costs.len(), 2);
    }

    #[tokio::test]
    async fn details_carry_status_and_items() {
        let (service, _) = setup(Mocks::new().with_product_names().with_store_reduce()).await;
        let invoice = service
            .create_outcome_invoice(outcome(10, &[(1, 3)]))
            .await
            .unwrap();

        let details = service.invoice_details_by_order(10).await.unwrap();
        assert_eq!(details.invoice_id, invoice.id);
        assert_eq!(details.order_id, Some(10));
        assert_eq!(details.status, "CREATED");
        assert_eq!(details.invoice_type, "OUTCOME");
        assert_eq!(details.items[0].quantity, 3);
        assert_eq!(details.total, "91.80");
    }

    #[tokio::test]
    async fn expired_invoices_are_cancelled() {
        let mut mocks = Mocks::new().with_product_names().with_store_reduce();
        mocks.store.expect_increase().returning(|_| Ok(vec![]));
        mocks.order.expect_change_status().returning(|_, _| Ok(()));
        let (service, db) = setup(mocks).await;

        let old = service
            .create_outcome_invoice(outcome(10, &[(1, 1)]))
            .await
            .unwrap();
        let fresh = service
            .create_outcome_invoice(outcome(11, &[(1, 1)]))
            .await
            .unwrap();
        InvoiceEntity::update_many()
            .col_expr(
                invoice::Column::CreatedAt,
                Expr::value(Utc::now() - Duration::days(5)),
            )
            .filter(invoice::Column::Id.eq(old.id))
            .exec(&*db)
            .await
            .unwrap();

        let cancelled = service.cancel_expired(Duration::days(3)).await.unwrap();
        assert_eq!(cancelled, 1);
        assert_eq!(
            service.get_invoice(old.id).await.unwrap().status,
            InvoiceStatus::Cancelled
        );
        assert_eq!(
            service.get_invoice(fresh.id).await.unwrap().status,
            InvoiceStatus::Created
        );
    }
}
