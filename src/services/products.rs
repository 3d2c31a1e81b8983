use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, Select, Set, TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use validator::Validate;

use super::{add_quantity, db_error};
use crate::{
    clients::DynOrderClient,
    db::DbPool,
    dto::product::{
        CreateProductRequest, ProductDetails, ProductQuantity, ProductResponse,
        ProductSearchQuery, ProductSortField, SortDirection, UpdateProductRequest,
    },
    entities::product::{self, Entity as ProductEntity, ProductStatus},
    errors::ServiceError,
    Page, PageQuery,
};

/// Service for the product catalog
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    order: DynOrderClient,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, order: DynOrderClient) -> Self {
        Self { db_pool, order }
    }

    /// Creates a batch of products in status `CREATED`
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn create_products(
        &self,
        requests: Vec<CreateProductRequest>,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        if requests.is_empty() {
            return Err(ServiceError::ValidationError(
                "Should not be empty request list".to_string(),
            ));
        }
        for request in &requests {
            request.validate()?;
        }

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for product creation");
            ServiceError::DatabaseError(e)
        })?;

        let mut created = Vec::with_capacity(requests.len());
        for request in requests {
            let model = product::ActiveModel {
                name: Set(request.name),
                price: Set(request.price),
                quantity: Set(request.quantity),
                status: Set(ProductStatus::Created),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(db_error("Failed to insert product"))?;
            created.push(model);
        }

        txn.commit()
            .await
            .map_err(db_error("Failed to commit product creation"))?;

        info!(count = created.len(), "Products created successfully");
        Ok(created.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: i64) -> Result<ProductResponse, ServiceError> {
        let db = &*self.db_pool;
        find_product(db, product_id).await.map(Into::into)
    }

    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        product_id: i64,
        request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db_pool;
        let existing = find_product(db, product_id).await?;

        let mut active: product::ActiveModel = existing.into();
        active.name = Set(request.name);
        active.price = Set(request.price);
        active.quantity = Set(request.quantity);
        let updated = active
            .update(db)
            .await
            .map_err(db_error("Failed to update product"))?;

        info!(product_id, "Product updated successfully");
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: i64) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        find_product(db, product_id).await?;
        ProductEntity::delete_by_id(product_id)
            .exec(db)
            .await
            .map_err(db_error("Failed to delete product"))?;
        info!(product_id, "Product deleted");
        Ok(())
    }

    /// Name search with sorting; popularity comes from the Order service
    #[instrument(skip(self, query), fields(search = ?query.search, sort = ?query.sort_field))]
    pub async fn search(
        &self,
        query: ProductSearchQuery,
    ) -> Result<Page<ProductResponse>, ServiceError> {
        let db = &*self.db_pool;
        let page = PageQuery {
            page: query.page,
            size: query.size,
        };

        let mut select = ProductEntity::find();
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(product::Column::Name)))
                    .like(format!("%{}%", search.to_lowercase())),
            );
        }

        let order = match query.sort_direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        let column = match query.sort_field {
            ProductSortField::Name => product::Column::Name,
            ProductSortField::Price => product::Column::Price,
            ProductSortField::Quantity => product::Column::Quantity,
            ProductSortField::CreatedAt => product::Column::CreatedAt,
            ProductSortField::Popularity => {
                // Order statistics are only a ranking hint here
                let buys = match self.order.total_buys().await {
                    Ok(buys) => buys,
                    Err(e) => {
                        warn!(error = %e, "Popularity unavailable, falling back to id order");
                        HashMap::new()
                    }
                };
                return self.rank_by_buys(select, &buys, order, &page).await;
            }
        };

        let paginator = select
            .order_by(column, order)
            .order_by_asc(product::Column::Id)
            .paginate(db, page.size());
        let total = paginator
            .num_items()
            .await
            .map_err(db_error("Failed to count products"))?;
        let products = paginator
            .fetch_page(page.page)
            .await
            .map_err(db_error("Failed to fetch products page"))?;

        Ok(Page::new(
            products.into_iter().map(Into::into).collect(),
            &page,
            total,
        ))
    }

    /// Products ordered by bought quantity, most popular first
    #[instrument(skip(self))]
    pub async fn popular(&self, page: PageQuery) -> Result<Page<ProductResponse>, ServiceError> {
        let buys = self.order.total_buys().await?;
        self.rank_by_buys(ProductEntity::find(), &buys, Order::Desc, &page)
            .await
    }

    #[instrument(skip(self))]
    pub async fn details(&self, ids: Vec<i64>) -> Result<Vec<ProductDetails>, ServiceError> {
        let db = &*self.db_pool;
        let found = find_many(db, &ids).await?;
        ids.iter()
            .map(|id| {
                found
                    .get(id)
                    .cloned()
                    .map(ProductDetails::from)
                    .ok_or_else(|| not_found(*id))
            })
            .collect()
    }

    /// Catalog price of each product
    #[instrument(skip(self))]
    pub async fn prices(&self, ids: Vec<i64>) -> Result<HashMap<i64, Decimal>, ServiceError> {
        let db = &*self.db_pool;
        let found = find_many(db, &ids).await?;
        ids.iter()
            .map(|id| {
                found
                    .get(id)
                    .map(|p| (*id, super::pricing::round_money(p.price)))
                    .ok_or_else(|| not_found(*id))
            })
            .collect()
    }

    /// Marks products as received into the store
    #[instrument(skip(self))]
    pub async fn receive(&self, ids: Vec<i64>) -> Result<Vec<ProductResponse>, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(db_error("Failed to start transaction"))?;

        let mut received = Vec::with_capacity(ids.len());
        for id in ids {
            let existing = find_product(&txn, id).await?;
            let mut active: product::ActiveModel = existing.into();
            active.status = Set(ProductStatus::Received);
            received.push(
                active
                    .update(&txn)
                    .await
                    .map_err(db_error("Failed to mark product received"))?,
            );
        }

        txn.commit().await?;
        info!(count = received.len(), "Products received");
        Ok(received.into_iter().map(Into::into).collect())
    }

    /// Takes delivered quantities off received products
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn deliver(
        &self,
        items: Vec<ProductQuantity>,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        self.adjust_quantities(items, Adjustment::Deliver).await
    }

    /// Same contract as [`ProductService::deliver`] without the status requirement
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn reduce_quantity(
        &self,
        items: Vec<ProductQuantity>,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        self.adjust_quantities(items, Adjustment::Reduce).await
    }

    /// Puts returned quantities back on the products
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn return_products(
        &self,
        items: Vec<ProductQuantity>,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        self.adjust_quantities(items, Adjustment::Return).await
    }

    async fn adjust_quantities(
        &self,
        items: Vec<ProductQuantity>,
        adjustment: Adjustment,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Should not be empty request list".to_string(),
            ));
        }
        let mut totals: BTreeMap<i64, i32> = BTreeMap::new();
        for item in &items {
            item.validate()?;
            let total = totals.entry(item.id).or_default();
            *total = add_quantity(*total, item.quantity)?;
        }

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for quantity change");
            ServiceError::DatabaseError(e)
        })?;

        let mut updated = Vec::with_capacity(totals.len());
        for (id, quantity) in totals {
            let existing = find_product(&txn, id).await?;

            if adjustment == Adjustment::Deliver && existing.status != ProductStatus::Received {
                warn!(product_id = id, status = %existing.status, "Product not received yet");
                return Err(ServiceError::InvalidStatus(format!(
                    "Product with id {} is not received",
                    id
                )));
            }

            let new_quantity = match adjustment {
                Adjustment::Return => add_quantity(existing.quantity, quantity)?,
                Adjustment::Deliver | Adjustment::Reduce => {
                    if existing.quantity < quantity {
                        warn!(
                            product_id = id,
                            available = existing.quantity,
                            requested = quantity,
                            "Not enough product quantity"
                        );
                        return Err(ServiceError::InsufficientStock(format!(
                            "Not enough quantity of product with id {}",
                            id
                        )));
                    }
                    existing.quantity - quantity
                }
            };

            let mut active: product::ActiveModel = existing.into();
            active.quantity = Set(new_quantity);
            updated.push(
                active
                    .update(&txn)
                    .await
                    .map_err(db_error("Failed to update product quantity"))?,
            );
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit quantity change");
            ServiceError::DatabaseError(e)
        })?;

        info!(?adjustment, count = updated.len(), "Product quantities changed");
        Ok(updated.into_iter().map(Into::into).collect())
    }

    async fn rank_by_buys(
        &self,
        select: Select<ProductEntity>,
        buys: &HashMap<i64, i32>,
        order: Order,
        page: &PageQuery,
    ) -> Result<Page<ProductResponse>, ServiceError> {
        let db = &*self.db_pool;
        let mut products = select
            .order_by_asc(product::Column::Id)
            .all(db)
            .await
            .map_err(db_error("Failed to fetch products"))?;

        products.sort_by(|a, b| {
            let by_buys = popularity(buys, a).cmp(&popularity(buys, b));
            let by_buys = match order {
                Order::Asc => by_buys,
                _ => by_buys.reverse(),
            };
            match by_buys {
                Ordering::Equal => a.id.cmp(&b.id),
                other => other,
            }
        });

        Ok(Page::from_sorted(products, page).map(Into::into))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Adjustment {
    Deliver,
    Reduce,
    Return,
}

fn popularity(buys: &HashMap<i64, i32>, product: &product::Model) -> i32 {
    buys.get(&product.id).copied().unwrap_or_default()
}

fn not_found(product_id: i64) -> ServiceError {
    warn!(product_id, "Product not found");
    ServiceError::NotFound(format!("Product with id {} was not found", product_id))
}

async fn find_product<C: ConnectionTrait>(
    db: &C,
    product_id: i64,
) -> Result<product::Model, ServiceError> {
    ProductEntity::find_by_id(product_id)
        .one(db)
        .await
        .map_err(db_error("Failed to fetch product"))?
        .ok_or_else(|| not_found(product_id))
}

async fn find_many<C: ConnectionTrait>(
    db: &C,
    ids: &[i64],
) -> Result<HashMap<i64, product::Model>, ServiceError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let products = ProductEntity::find()
        .filter(product::Column::Id.is_in(ids.iter().copied()))
        .all(db)
        .await
        .map_err(db_error("Failed to fetch products"))?;
    Ok(products.into_iter().map(|p| (p.id, p)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::order::MockOrderClient;
    use crate::services::test_support::setup_db;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    async fn service_with(order: MockOrderClient) -> ProductService {
        ProductService::new(setup_db().await, Arc::new(order))
    }

    fn product(name: &str, price: Decimal, quantity: i32) -> CreateProductRequest {
        CreateProductRequest {
            name: name.to_string(),
            price,
            quantity,
        }
    }

    async fn seeded(order: MockOrderClient) -> (ProductService, Vec<ProductResponse>) {
        let service = service_with(order).await;
        let created = service
            .create_products(vec![
                product("Aspirin", dec!(25.50), 10),
                product("Ibuprofen", dec!(35.50), 4),
                product("Paracetamol", dec!(12.00), 7),
            ])
            .await
            .unwrap();
        (service, created)
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let service = service_with(MockOrderClient::new()).await;
        let err = service.create_products(vec![]).await.unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg == "Should not be empty request list");
    }

    #[tokio::test]
    async fn created_products_start_in_created_status() {
        let (service, created) = seeded(MockOrderClient::new()).await;
        assert!(created.iter().all(|p| p.status == ProductStatus::Created));

        let fetched = service.get_product(created[1].id).await.unwrap();
        assert_eq!(fetched.name, "Ibuprofen");
        assert_eq!(fetched.price, dec!(35.50));
    }

    #[tokio::test]
    async fn unknown_product_message() {
        let service = service_with(MockOrderClient::new()).await;
        let err = service.get_product(99).await.unwrap_err();
        assert_eq!(err.to_string(), "Product with id 99 was not found");
    }

    #[tokio::test]
    async fn deliver_requires_received_status() {
        let (service, created) = seeded(MockOrderClient::new()).await;
        let aspirin = created[0].id;

        let err = service
            .deliver(vec![ProductQuantity { id: aspirin, quantity: 1 }])
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InvalidStatus(_));

        service.receive(vec![aspirin]).await.unwrap();
        let delivered = service
            .deliver(vec![ProductQuantity { id: aspirin, quantity: 3 }])
            .await
            .unwrap();
        assert_eq!(delivered[0].quantity, 7);
    }

    #[tokio::test]
    async fn reducing_below_zero_fails_and_keeps_quantities() {
        let (service, created) = seeded(MockOrderClient::new()).await;
        let err = service
            .reduce_quantity(vec![
                ProductQuantity { id: created[0].id, quantity: 2 },
                ProductQuantity { id: created[1].id, quantity: 5 },
            ])
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::InsufficientStock(_));

        let first = service.get_product(created[0].id).await.unwrap();
        assert_eq!(first.quantity, 10);
    }

    #[tokio::test]
    async fn return_adds_quantity_back() {
        let (service, created) = seeded(MockOrderClient::new()).await;
        let returned = service
            .return_products(vec![ProductQuantity { id: created[1].id, quantity: 3 }])
            .await
            .unwrap();
        assert_eq!(returned[0].quantity, 7);
    }

    #[tokio::test]
    async fn return_past_quantity_range_is_refused() {
        let (service, created) = seeded(MockOrderClient::new()).await;
        let id = created[0].id;
        product::Entity::update_many()
            .col_expr(product::Column::Quantity, Expr::value(i32::MAX - 1))
            .filter(product::Column::Id.eq(id))
            .exec(&*service.db_pool)
            .await
            .unwrap();

        let err = service
            .return_products(vec![ProductQuantity { id, quantity: 2 }])
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg == "Quantity is out of range");
        assert_eq!(service.get_product(id).await.unwrap().quantity, i32::MAX - 1);

        // Repeated lines are summed before they reach the counter
        let lines = vec![ProductQuantity { id: created[1].id, quantity: 1_000_000 }; 2148];
        assert_matches!(
            service.return_products(lines).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn prices_map_ids_to_catalog_price() {
        let (service, created) = seeded(MockOrderClient::new()).await;
        let prices = service
            .prices(vec![created[0].id, created[2].id])
            .await
            .unwrap();
        assert_eq!(prices[&created[0].id], dec!(25.50));
        assert_eq!(prices[&created[2].id], dec!(12.00));
    }

    #[tokio::test]
    async fn search_filters_by_name_and_sorts_by_price() {
        let (service, _) = seeded(MockOrderClient::new()).await;
        let page = service
            .search(ProductSearchQuery {
                page: 0,
                size: 5,
                search: Some("PROFEN".into()),
                sort_field: ProductSortField::Price,
                sort_direction: SortDirection::Asc,
            })
            .await
            .unwrap();
        assert_eq!(page.total_elements, 1);
        assert_eq!(page.content[0].name, "Ibuprofen");

        let by_price = service
            .search(ProductSearchQuery {
                page: 0,
                size: 5,
                search: None,
                sort_field: ProductSortField::Price,
                sort_direction: SortDirection::Asc,
            })
            .await
            .unwrap();
        let names: Vec<&str> = by_price.content.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Paracetamol", "Aspirin", "Ibuprofen"]);
    }

    #[tokio::test]
    async fn popular_orders_by_total_buys() {
        let mut order = MockOrderClient::new();
        order
            .expect_total_buys()
            .returning(|| Ok([(2, 9), (3, 4)].into_iter().collect()));

        let (service, created) = seeded(order).await;
        let page = service.popular(PageQuery::default()).await.unwrap();

        let ids: Vec<i64> = page.content.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![created[1].id, created[2].id, created[0].id]);
    }

    #[tokio::test]
    async fn search_survives_missing_order_statistics() {
        let mut order = MockOrderClient::new();
        order
            .expect_total_buys()
            .returning(|| Err(ServiceError::GatewayTimeout("order service timed out".into())));

        let (service, _) = seeded(order).await;
        let page = service
            .search(ProductSearchQuery {
                size: 5,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total_elements, 3);
    }
}
