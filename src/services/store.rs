use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use super::{add_quantity, db_error};
use crate::{
    clients::{DynAccountancyClient, DynOrderClient, DynProductClient},
    db::DbPool,
    dto::product::ProductQuantity,
    dto::store::{
        CheckTransferResponse, CreateStoreRequest, StoreQuantityRequest, StoreResponse,
        TransferCertificateResponse,
    },
    entities::invoice::{InvoiceStatus, InvoiceType},
    entities::order::OrderStatus,
    entities::store_item::{self, Entity as StoreEntity},
    entities::transfer_certificate::{self, Entity as CertificateEntity, TransferStatus},
    errors::ServiceError,
    metrics,
    proto::InvoiceDetails,
    Page, PageQuery,
};

/// Inventory counters per price item and the transfers that move them
#[derive(Clone)]
pub struct StoreService {
    db_pool: Arc<DbPool>,
    accountancy: DynAccountancyClient,
    product: DynProductClient,
    order: DynOrderClient,
}

impl StoreService {
    pub fn new(
        db_pool: Arc<DbPool>,
        accountancy: DynAccountancyClient,
        product: DynProductClient,
        order: DynOrderClient,
    ) -> Self {
        Self {
            db_pool,
            accountancy,
            product,
            order,
        }
    }

    #[instrument(skip(self, request), fields(price_item_id = request.price_item_id))]
    pub async fn create(&self, request: CreateStoreRequest) -> Result<StoreResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        if find_counter(db, request.price_item_id).await?.is_some() {
            warn!(price_item_id = request.price_item_id, "Store item already exists");
            return Err(ServiceError::StoreItemAlreadyExists(request.price_item_id));
        }

        let model = store_item::ActiveModel {
            price_item_id: Set(request.price_item_id),
            quantity: Set(request.quantity),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(db_error("Failed to insert store item"))?;

        info!(store_id = model.id, "Store item created");
        Ok(model.into())
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<StoreResponse>, ServiceError> {
        let db = &*self.db_pool;
        let items = StoreEntity::find()
            .order_by_asc(store_item::Column::Id)
            .all(db)
            .await
            .map_err(db_error("Failed to fetch store items"))?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn by_price_items(
        &self,
        price_item_ids: Vec<i64>,
    ) -> Result<Vec<StoreResponse>, ServiceError> {
        let db = &*self.db_pool;
        let items = StoreEntity::find()
            .filter(store_item::Column::PriceItemId.is_in(price_item_ids))
            .order_by_asc(store_item::Column::Id)
            .all(db)
            .await
            .map_err(db_error("Failed to fetch store items by price item"))?;
        Ok(items.into_iter().map(Into::into).collect())
    }

    /// Adds quantities, creating missing counters
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn increase(
        &self,
        items: Vec<StoreQuantityRequest>,
    ) -> Result<Vec<StoreResponse>, ServiceError> {
        let totals = aggregate(&items)?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for store increase");
            ServiceError::DatabaseError(e)
        })?;
        let updated = increase_counters(&txn, &totals).await?;
        txn.commit().await.map_err(db_error("Failed to commit store increase"))?;

        info!(count = updated.len(), "Store counters increased");
        Ok(updated.into_iter().map(Into::into).collect())
    }

    /// Takes quantities off the counters; all or nothing
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn reduce(
        &self,
        items: Vec<StoreQuantityRequest>,
    ) -> Result<Vec<StoreResponse>, ServiceError> {
        let totals = aggregate(&items)?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for store reduction");
            ServiceError::DatabaseError(e)
        })?;

        let mut updated = Vec::with_capacity(totals.len());
        for (price_item_id, quantity) in totals {
            // Guarded decrement: the row only changes while it still covers `quantity`
            let result = StoreEntity::update_many()
                .col_expr(
                    store_item::Column::Quantity,
                    Expr::col(store_item::Column::Quantity).sub(quantity),
                )
                .filter(store_item::Column::PriceItemId.eq(price_item_id))
                .filter(store_item::Column::Quantity.gte(quantity))
                .exec(&txn)
                .await
                .map_err(db_error("Failed to reduce store item"))?;

            let counter = find_counter(&txn, price_item_id).await?;
            match counter {
                Some(counter) if result.rows_affected > 0 => updated.push(counter),
                counter => {
                    return Err(insufficient(
                        price_item_id,
                        counter.map(|c| c.quantity),
                        quantity,
                    ))
                }
            }
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit store reduction");
            ServiceError::DatabaseError(e)
        })?;

        info!(count = updated.len(), "Store counters reduced");
        Ok(updated.into_iter().map(Into::into).collect())
    }

    /// Checks that every counter covers the requested quantity without changing it
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn availability(
        &self,
        items: Vec<StoreQuantityRequest>,
    ) -> Result<Vec<StoreResponse>, ServiceError> {
        let totals = aggregate(&items)?;
        let db = &*self.db_pool;

        let mut counters = Vec::with_capacity(totals.len());
        for (price_item_id, quantity) in totals {
            counters.push(available_counter(db, price_item_id, quantity).await?.into());
        }
        Ok(counters)
    }

    /// Ships the goods of a paid order
    #[instrument(skip(self))]
    pub async fn deliver(&self, order_id: i64) -> Result<TransferCertificateResponse, ServiceError> {
        let details = self.accountancy.invoice_details_by_order(order_id).await?;
        if invoice_status(&details)? != InvoiceStatus::Paid {
            warn!(order_id, invoice_id = details.invoice_id, "Invoice not paid");
            return Err(not_paid(details.invoice_id));
        }

        let db = &*self.db_pool;
        if find_certificate(db, CertificateKey::Order(order_id), TransferStatus::Delivered)
            .await?
            .is_some()
        {
            return Err(already_delivered(order_id));
        }

        let mut quantities: BTreeMap<i64, i32> = BTreeMap::new();
        for item in &details.items {
            let total = quantities.entry(item.product_id).or_default();
            *total = add_quantity(*total, item.quantity)?;
        }
        self.product
            .deliver(
                quantities
                    .into_iter()
                    .map(|(id, quantity)| ProductQuantity { id, quantity })
                    .collect(),
            )
            .await?;
        self.order
            .change_status(order_id, OrderStatus::Delivered)
            .await?;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to start transaction for delivery");
            ServiceError::DatabaseError(e)
        })?;
        let certificate = transfer_certificate::ActiveModel {
            order_id: Set(Some(order_id)),
            invoice_id: Set(details.invoice_id),
            status: Set(TransferStatus::Delivered),
            comment: Set(Some(format!("Delivered order with id = {}", order_id))),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_error("Failed to insert transfer certificate"))?;
        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit delivery");
            ServiceError::DatabaseError(e)
        })?;

        metrics::increment_counter("drugstore_orders_delivered_total");
        info!(order_id, certificate = %certificate.certificate_number, "Order delivered");
        Ok(certificate.into())
    }

    /// Takes the goods of a paid income invoice into the store
    #[instrument(skip(self))]
    pub async fn receive(
        &self,
        invoice_id: i64,
    ) -> Result<TransferCertificateResponse, ServiceError> {
        let details = self.accountancy.invoice_details(invoice_id).await?;

        let invoice_type = InvoiceType::from_str(&details.invoice_type).map_err(|_| {
            ServiceError::SerializationError(format!(
                "Unknown invoice type {}",
                details.invoice_type
            ))
        })?;
        if invoice_type != InvoiceType::Income {
            return Err(ServiceError::BadRequest(format!(
                "Invoice with id = {} is not an income invoice",
                invoice_id
            )));
        }
        if invoice_status(&details)? != InvoiceStatus::Paid {
            return Err(not_paid(invoice_id));
        }

        let db = &*self.db_pool;
        if find_certificate(db, CertificateKey::Invoice(invoice_id), TransferStatus::Received)
            .await?
            .is_some()
        {
            warn!(invoice_id, "Invoice already received");
            return Err(ServiceError::Conflict(format!(
                "Invoice with id = {} was already received",
                invoice_id
            )));
        }

        let mut product_ids: Vec<i64> = details.items.iter().map(|i| i.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        self.product.receive(product_ids).await?;

        let mut totals: BTreeMap<i64, i32> = BTreeMap::new();
        for item in &details.items {
            let total = totals.entry(item.price_item_id).or_default();
            *total = add_quantity(*total, item.quantity)?;
        }

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, invoice_id, "Failed to start transaction for receipt");
            ServiceError::DatabaseError(e)
        })?;
        increase_counters(&txn, &totals).await?;
        let certificate = transfer_certificate::ActiveModel {
            order_id: Set(None),
            invoice_id: Set(invoice_id),
            status: Set(TransferStatus::Received),
            comment: Set(Some(format!("Received invoice with id = {}", invoice_id))),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_error("Failed to insert transfer certificate"))?;
        txn.commit().await.map_err(|e| {
            error!(error = %e, invoice_id, "Failed to commit receipt");
            ServiceError::DatabaseError(e)
        })?;

        metrics::increment_counter("drugstore_invoices_received_total");
        info!(invoice_id, certificate = %certificate.certificate_number, "Invoice received");
        Ok(certificate.into())
    }

    /// Conflict once the order was delivered
    #[instrument(skip(self))]
    pub async fn check_transfer(&self, order_id: i64) -> Result<CheckTransferResponse, ServiceError> {
        let db = &*self.db_pool;
        if find_certificate(db, CertificateKey::Order(order_id), TransferStatus::Delivered)
            .await?
            .is_some()
        {
            return Err(already_delivered(order_id));
        }
        Ok(CheckTransferResponse {
            order_id,
            comment: "Not delivered".to_string(),
        })
    }

    #[instrument(skip(self))]
    pub async fn certificates(
        &self,
        query: PageQuery,
    ) -> Result<Page<TransferCertificateResponse>, ServiceError> {
        let db = &*self.db_pool;
        let paginator = CertificateEntity::find()
            .order_by_asc(transfer_certificate::Column::Id)
            .paginate(db, query.size());
        let total = paginator
            .num_items()
            .await
            .map_err(db_error("Failed to count transfer certificates"))?;
        let certificates = paginator
            .fetch_page(query.page)
            .await
            .map_err(db_error("Failed to fetch transfer certificates"))?;
        Ok(Page::new(
            certificates.into_iter().map(Into::into).collect(),
            &query,
            total,
        ))
    }

    #[instrument(skip(self))]
    pub async fn certificates_by_order(
        &self,
        order_id: i64,
    ) -> Result<Vec<TransferCertificateResponse>, ServiceError> {
        let db = &*self.db_pool;
        let certificates = CertificateEntity::find()
            .filter(transfer_certificate::Column::OrderId.eq(order_id))
            .order_by_asc(transfer_certificate::Column::Id)
            .all(db)
            .await
            .map_err(db_error("Failed to fetch transfer certificates by order"))?;
        Ok(certificates.into_iter().map(Into::into).collect())
    }
}

enum CertificateKey {
    Order(i64),
    Invoice(i64),
}

fn aggregate(items: &[StoreQuantityRequest]) -> Result<BTreeMap<i64, i32>, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError(
            "Should not be empty request list".to_string(),
        ));
    }
    let mut totals = BTreeMap::new();
    for item in items {
        item.validate()?;
        let total = totals.entry(item.price_item_id).or_default();
        *total = add_quantity(*total, item.quantity)?;
    }
    Ok(totals)
}

fn invoice_status(details: &InvoiceDetails) -> Result<InvoiceStatus, ServiceError> {
    InvoiceStatus::from_str(&details.status).map_err(|_| {
        ServiceError::SerializationError(format!("Unknown invoice status {}", details.status))
    })
}

fn not_paid(invoice_id: i64) -> ServiceError {
    ServiceError::InvalidStatus(format!("Invoice with id = {} not paid !", invoice_id))
}

fn already_delivered(order_id: i64) -> ServiceError {
    warn!(order_id, "Order already delivered");
    ServiceError::Conflict(format!("Order with id = {} was already delivered", order_id))
}

async fn find_counter<C: ConnectionTrait>(
    db: &C,
    price_item_id: i64,
) -> Result<Option<store_item::Model>, ServiceError> {
    StoreEntity::find()
        .filter(store_item::Column::PriceItemId.eq(price_item_id))
        .one(db)
        .await
        .map_err(db_error("Failed to fetch store item"))
}

async fn available_counter<C: ConnectionTrait>(
    db: &C,
    price_item_id: i64,
    quantity: i32,
) -> Result<store_item::Model, ServiceError> {
    match find_counter(db, price_item_id).await? {
        Some(counter) if counter.quantity >= quantity => Ok(counter),
        counter => Err(insufficient(
            price_item_id,
            counter.map(|c| c.quantity),
            quantity,
        )),
    }
}

fn insufficient(price_item_id: i64, available: Option<i32>, requested: i32) -> ServiceError {
    warn!(
        price_item_id,
        available = available.unwrap_or_default(),
        requested,
        "Insufficient store quantity"
    );
    ServiceError::InsufficientStoreItem(price_item_id)
}

async fn increase_counters<C: ConnectionTrait>(
    db: &C,
    totals: &BTreeMap<i64, i32>,
) -> Result<Vec<store_item::Model>, ServiceError> {
    let mut updated = Vec::with_capacity(totals.len());
    for (&price_item_id, &quantity) in totals {
        let model = match find_counter(db, price_item_id).await? {
            Some(counter) => {
                let new_quantity = add_quantity(counter.quantity, quantity)?;
                let mut active: store_item::ActiveModel = counter.into();
                active.quantity = Set(new_quantity);
                active.update(db).await
            }
            None => {
                store_item::ActiveModel {
                    price_item_id: Set(price_item_id),
                    quantity: Set(quantity),
                    ..Default::default()
                }
                .insert(db)
                .await
            }
        }
        .map_err(db_error("Failed to increase store item"))?;
        updated.push(model);
    }
    Ok(updated)
}

async fn find_certificate<C: ConnectionTrait>(
    db: &C,
    key: CertificateKey,
    status: TransferStatus,
) -> Result<Option<transfer_certificate::Model>, ServiceError> {
    let select = CertificateEntity::find().filter(transfer_certificate::Column::Status.eq(status));
    let select = match key {
        CertificateKey::Order(order_id) => {
            select.filter(transfer_certificate::Column::OrderId.eq(order_id))
        }
        CertificateKey::Invoice(invoice_id) => {
            select.filter(transfer_certificate::Column::InvoiceId.eq(invoice_id))
        }
    };
    select
        .one(db)
        .await
        .map_err(db_error("Failed to fetch transfer certificate"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::accountancy::MockAccountancyClient;
    use crate::clients::order::MockOrderClient;
    use crate::clients::product::MockProductClient;
    use crate::proto::InvoiceDetailsItem;
    use crate::services::test_support::setup_db;
    use assert_matches::assert_matches;
    use mockall::predicate::eq;

    fn quantity(price_item_id: i64, quantity: i32) -> StoreQuantityRequest {
        StoreQuantityRequest {
            price_item_id,
            quantity,
        }
    }

    fn details(invoice_id: i64, order_id: Option<i64>, status: &str, kind: &str) -> InvoiceDetails {
        InvoiceDetails {
            invoice_id,
            order_id,
            status: status.to_string(),
            invoice_type: kind.to_string(),
            items: vec![
                InvoiceDetailsItem {
                    price_item_id: 11,
                    product_id: 1,
                    name: "Aspirin".into(),
                    quantity: 2,
                    price: "30.60".into(),
                },
                InvoiceDetailsItem {
                    price_item_id: 12,
                    product_id: 2,
                    name: "Ibuprofen".into(),
                    quantity: 1,
                    price: "46.15".into(),
                },
            ],
            total: "107.35".into(),
        }
    }

    async fn service_with(
        accountancy: MockAccountancyClient,
        product: MockProductClient,
        order: MockOrderClient,
    ) -> StoreService {
        StoreService::new(
            setup_db().await,
            Arc::new(accountancy),
            Arc::new(product),
            Arc::new(order),
        )
    }

    async fn service() -> StoreService {
        service_with(
            MockAccountancyClient::new(),
            MockProductClient::new(),
            MockOrderClient::new(),
        )
        .await
    }

    #[tokio::test]
    async fn increase_and_reduce_counters() {
        let service = service().await;
        service
            .create(CreateStoreRequest {
                price_item_id: 1,
                quantity: 10,
            })
            .await
            .unwrap();

        let increased = service.increase(vec![quantity(1, 3)]).await.unwrap();
        assert_eq!(increased[0].quantity, 13);

        let reduced = service.reduce(vec![quantity(1, 6)]).await.unwrap();
        assert_eq!(reduced[0].quantity, 7);
    }

    #[tokio::test]
    async fn reduce_below_zero_is_refused() {
        let service = service().await;
        service
            .create(CreateStoreRequest {
                price_item_id: 1,
                quantity: 10,
            })
            .await
            .unwrap();
        service
            .create(CreateStoreRequest {
                price_item_id: 2,
                quantity: 1,
            })
            .await
            .unwrap();

        let err = service
            .reduce(vec![quantity(1, 3), quantity(2, 2)])
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InsufficientStoreItem(2));
        assert_eq!(
            err.to_string(),
            "Insufficient amount of store with price item id = 2"
        );

        let counters = service.by_price_items(vec![1]).await.unwrap();
        assert_eq!(counters[0].quantity, 10);
    }

    #[tokio::test]
    async fn increase_past_quantity_range_is_refused() {
        let service = service().await;
        service
            .create(CreateStoreRequest {
                price_item_id: 1,
                quantity: 10,
            })
            .await
            .unwrap();

        assert_matches!(
            service.increase(vec![quantity(1, i32::MAX)]).await,
            Err(ServiceError::ValidationError(_))
        );

        StoreEntity::update_many()
            .col_expr(store_item::Column::Quantity, Expr::value(i32::MAX - 5))
            .filter(store_item::Column::PriceItemId.eq(1))
            .exec(&*service.db_pool)
            .await
            .unwrap();
        let err = service.increase(vec![quantity(1, 10)]).await.unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg == "Quantity is out of range");

        let counters = service.by_price_items(vec![1]).await.unwrap();
        assert_eq!(counters[0].quantity, i32::MAX - 5);
    }

    #[tokio::test]
    async fn concurrent_reductions_never_overdraw() {
        let service = service().await;
        service
            .create(CreateStoreRequest {
                price_item_id: 1,
                quantity: 5,
            })
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            service.reduce(vec![quantity(1, 3)]),
            service.reduce(vec![quantity(1, 3)])
        );

        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
        let counters = service.by_price_items(vec![1]).await.unwrap();
        assert_eq!(counters[0].quantity, 2);
    }

    #[tokio::test]
    async fn availability_does_not_mutate() {
        let service = service().await;
        service
            .create(CreateStoreRequest {
                price_item_id: 4,
                quantity: 5,
            })
            .await
            .unwrap();

        let available = service.availability(vec![quantity(4, 5)]).await.unwrap();
        assert_eq!(available[0].quantity, 5);
        assert_matches!(
            service.availability(vec![quantity(4, 6)]).await,
            Err(ServiceError::InsufficientStoreItem(4))
        );
        assert_matches!(
            service.availability(vec![quantity(9, 1)]).await,
            Err(ServiceError::InsufficientStoreItem(9))
        );
    }

    #[tokio::test]
    async fn duplicate_counter_is_rejected() {
        let service = service().await;
        let request = CreateStoreRequest {
            price_item_id: 3,
            quantity: 1,
        };
        service.create(request.clone()).await.unwrap();
        assert_matches!(
            service.create(request).await,
            Err(ServiceError::StoreItemAlreadyExists(3))
        );
    }

    #[tokio::test]
    async fn deliver_refuses_unpaid_invoice() {
        let mut accountancy = MockAccountancyClient::new();
        accountancy
            .expect_invoice_details_by_order()
            .returning(|order_id| Ok(details(5, Some(order_id), "CREATED", "OUTCOME")));

        let service =
            service_with(accountancy, MockProductClient::new(), MockOrderClient::new()).await;
        let err = service.deliver(3).await.unwrap_err();
        assert_eq!(err.to_string(), "Invoice with id = 5 not paid !");
    }

    #[tokio::test]
    async fn deliver_paid_order_once() {
        let mut accountancy = MockAccountancyClient::new();
        accountancy
            .expect_invoice_details_by_order()
            .returning(|order_id| Ok(details(5, Some(order_id), "PAID", "OUTCOME")));
        let mut product = MockProductClient::new();
        product
            .expect_deliver()
            .withf(|items| {
                items
                    == &vec![
                        ProductQuantity { id: 1, quantity: 2 },
                        ProductQuantity { id: 2, quantity: 1 },
                    ]
            })
            .times(1)
            .returning(|_| Ok(()));
        let mut order = MockOrderClient::new();
        order
            .expect_change_status()
            .with(eq(3), eq(OrderStatus::Delivered))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service_with(accountancy, product, order).await;
        let certificate = service.deliver(3).await.unwrap();
        assert_eq!(certificate.status, TransferStatus::Delivered);
        assert_eq!(certificate.order_id, Some(3));
        assert_eq!(certificate.invoice_id, 5);
        assert!(!certificate.certificate_number.is_empty());

        assert_matches!(service.deliver(3).await, Err(ServiceError::Conflict(_)));
        assert_matches!(
            service.check_transfer(3).await,
            Err(ServiceError::Conflict(_))
        );
        assert_eq!(
            service.check_transfer(4).await.unwrap().comment,
            "Not delivered"
        );
        assert_eq!(service.certificates_by_order(3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_product_delivery_writes_no_certificate() {
        let mut accountancy = MockAccountancyClient::new();
        accountancy
            .expect_invoice_details_by_order()
            .returning(|order_id| Ok(details(5, Some(order_id), "PAID", "OUTCOME")));
        let mut product = MockProductClient::new();
        product.expect_deliver().returning(|_| {
            Err(ServiceError::InsufficientStock(
                "Not enough quantity of product with id 1".into(),
            ))
        });

        let service = service_with(accountancy, product, MockOrderClient::new()).await;
        assert_matches!(
            service.deliver(3).await,
            Err(ServiceError::InsufficientStock(_))
        );
        assert!(service.certificates_by_order(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn receive_income_invoice_creates_counters_once() {
        let mut accountancy = MockAccountancyClient::new();
        accountancy
            .expect_invoice_details()
            .returning(|invoice_id| Ok(details(invoice_id, None, "PAID", "INCOME")));
        let mut product = MockProductClient::new();
        product
            .expect_receive()
            .with(eq(vec![1, 2]))
            .times(1)
            .returning(|_| Ok(()));

        let service = service_with(accountancy, product, MockOrderClient::new()).await;
        service
            .create(CreateStoreRequest {
                price_item_id: 11,
                quantity: 10,
            })
            .await
            .unwrap();

        let certificate = service.receive(8).await.unwrap();
        assert_eq!(certificate.status, TransferStatus::Received);
        assert_eq!(certificate.order_id, None);

        let counters = service.list().await.unwrap();
        let by_price_item: Vec<(i64, i32)> = counters
            .iter()
            .map(|c| (c.price_item_id, c.quantity))
            .collect();
        assert_eq!(by_price_item, vec![(11, 12), (12, 1)]);

        assert_matches!(service.receive(8).await, Err(ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn receive_rejects_outcome_invoices() {
        let mut accountancy = MockAccountancyClient::new();
        accountancy
            .expect_invoice_details()
            .returning(|invoice_id| Ok(details(invoice_id, Some(1), "PAID", "OUTCOME")));

        let service =
            service_with(accountancy, MockProductClient::new(), MockOrderClient::new()).await;
        assert_matches!(service.receive(8).await, Err(ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn certificates_page() {
        let mut accountancy = MockAccountancyClient::new();
        accountancy
            .expect_invoice_details()
            .returning(|invoice_id| Ok(details(invoice_id, None, "PAID", "INCOME")));
        let mut product = MockProductClient::new();
        product.expect_receive().returning(|_| Ok(()));

        let service = service_with(accountancy, product, MockOrderClient::new()).await;
        for invoice_id in 1..=3 {
            service.receive(invoice_id).await.unwrap();
        }

        let page = service
            .certificates(PageQuery { page: 0, size: 2 })
            .await
            .unwrap();
        assert_eq!(page.content.len(), 2);
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 2);
    }
}
