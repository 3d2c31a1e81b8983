use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Drugstore API",
        version = "1.0.0",
        description = r#"
# Drugstore API

Order, product, accountancy and store services of a drugstore backend.

## Services

- **Orders**: customer orders, their status and confirmation into an invoice
- **Products**: the catalog, search by name and popularity, received and delivered quantities
- **Accountancy**: invoices, price items with markups, purchased costs
- **Store**: stock counters per price item and transfer certificates

Each process hosts one or more services and talks to the others over HTTP.

## Pagination

List endpoints take a zero-based `page` and a `size` (default 5).

## Error Handling

Errors share one body:

```json
{
  "error": "Not Found",
  "message": "Order with 7 was not found",
  "request_id": "req-abc123xyz",
  "timestamp": "2024-12-09T10:30:00.000Z"
}
```

`InvoiceDetails` and `ProductQuantityMap` responses are protobuf (`application/x-protobuf`).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Order endpoints"),
        (name = "products", description = "Product endpoints"),
        (name = "accountancy", description = "Invoice, price item and purchased cost endpoints"),
        (name = "store", description = "Store counter and transfer endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::change_status,
        crate::handlers::orders::order_details,
        crate::handlers::orders::orders_by_status,
        crate::handlers::orders::total_buys,
        crate::handlers::orders::confirm_order,

        // Products
        crate::handlers::products::create_products,
        crate::handlers::products::get_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::search_products,
        crate::handlers::products::popular_products,
        crate::handlers::products::product_details,
        crate::handlers::products::product_prices,
        crate::handlers::products::receive_products,
        crate::handlers::products::deliver_products,
        crate::handlers::products::reduce_quantity,
        crate::handlers::products::return_products,

        // Accountancy
        crate::handlers::accountancy::create_outcome_invoice,
        crate::handlers::accountancy::create_income_invoice,
        crate::handlers::accountancy::get_invoice,
        crate::handlers::accountancy::invoice_by_order,
        crate::handlers::accountancy::invoice_details,
        crate::handlers::accountancy::invoice_details_by_order,
        crate::handlers::accountancy::pay_invoice,
        crate::handlers::accountancy::refund_invoice,
        crate::handlers::accountancy::cancel_invoice,
        crate::handlers::accountancy::create_price_item,
        crate::handlers::accountancy::get_price_item,
        crate::handlers::accountancy::update_price_item,
        crate::handlers::accountancy::price_items_by_product_ids,
        crate::handlers::accountancy::price_items_by_ids,
        crate::handlers::accountancy::sale_prices,
        crate::handlers::accountancy::get_markups,
        crate::handlers::accountancy::update_markups,
        crate::handlers::accountancy::create_purchased_cost,
        crate::handlers::accountancy::list_purchased_costs,

        // Store
        crate::handlers::store::create_store,
        crate::handlers::store::list_store,
        crate::handlers::store::store_by_price_items,
        crate::handlers::store::increase,
        crate::handlers::store::reduce,
        crate::handlers::store::availability,
        crate::handlers::store::deliver,
        crate::handlers::store::receive,
        crate::handlers::store::check_transfer,
        crate::handlers::store::certificates,
        crate::handlers::store::certificates_by_order,
    ),
    components(
        schemas(
            crate::entities::order::OrderStatus,
            crate::entities::product::ProductStatus,
            crate::entities::invoice::InvoiceStatus,
            crate::entities::invoice::InvoiceType,
            crate::entities::transfer_certificate::TransferStatus,
            crate::dto::product::ProductSortField,
            crate::dto::product::SortDirection,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
