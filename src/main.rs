//! Furnicart storefront service
//!
//! HTTP shell over the storefront engine: catalog reads, admin stock
//! writes, session carts, delivery checks and order submission. All
//! invariants live in the `furnicart` library; handlers here load
//! state, call the domain, and persist what it produced.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use validator::Validate;

use furnicart::domain::aggregates::cart::{Cart, CartLine, LineKey};
use furnicart::domain::aggregates::order::{self, Order, PaymentMethod, Pricing};
use furnicart::domain::aggregates::product::{
    ColorVariant, Product, StockStatus, DEFAULT_LEAD_TIME_DAYS,
};
use furnicart::domain::delivery::Serviceability;
use furnicart::domain::events::DomainEvent;
use furnicart::domain::fulfillment::{self, DeliveryEstimate, FulfillmentMode, FulfillmentType};
use furnicart::domain::value_objects::{Money, Pincode};
use furnicart::store::{KeyValuePort, PgKv, SessionStore};
use furnicart::EngineError;

#[derive(Clone)]
struct AppState {
    db: PgPool,
    kv: Arc<dyn KeyValuePort>,
    nats: Option<async_nats::Client>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&std::env::var("DATABASE_URL")?)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match std::env::var("NATS_URL") {
        Ok(url) => async_nats::connect(&url).await.ok(),
        Err(_) => None,
    };
    let state = AppState {
        kv: Arc::new(PgKv::new(db.clone())),
        db,
        nats,
    };

    let app = Router::new()
        .route("/health", get(|| async {
            Json(serde_json::json!({"status": "healthy", "service": "furnicart"}))
        }))
        .route("/api/v1/products", get(list_products).post(create_product))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/products/:id/stock", patch(patch_stock))
        .route("/api/v1/products/:id/resolve", get(resolve_fulfillment))
        .route("/api/v1/delivery/:pincode", get(check_pincode))
        .route("/api/v1/delivery", post(upsert_serviceable_area))
        .route(
            "/api/v1/cart/:session",
            get(get_cart).post(add_to_cart).delete(clear_cart),
        )
        .route("/api/v1/cart/:session/quantity", put(update_quantity))
        .route("/api/v1/cart/:session/line", delete(remove_line))
        .route("/api/v1/wishlist/:session", get(get_wishlist).post(toggle_wishlist))
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/orders/:session", post(place_order))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8083".to_string());
    tracing::info!("furnicart listening on 0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("received shutdown signal");
}

// =============================================================================
// Error mapping
// =============================================================================

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{what} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(serde_json::json!({"error": self.message}))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let status = match &e {
            EngineError::InvalidStock(_)
            | EngineError::InvalidPincode
            | EngineError::EmptyOrder => StatusCode::BAD_REQUEST,
            EngineError::UnknownVariant(_) => StatusCode::NOT_FOUND,
            EngineError::NotAddable(_) => StatusCode::CONFLICT,
            EngineError::PaymentMethodNotAllowed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Unreachable(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.to_string())
    }
}

fn db_error(e: sqlx::Error) -> ApiError {
    tracing::error!(error = %e, "database query failed");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "database query failed")
}

fn validation_error(e: validator::ValidationErrors) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, e.to_string())
}

// =============================================================================
// Event publishing
// =============================================================================

/// Best-effort publish. A broker failure is logged and swallowed; it
/// must never roll back state that is already persisted.
async fn publish_events(state: &AppState, events: Vec<DomainEvent>) {
    for event in events {
        let Ok(payload) = serde_json::to_vec(&event) else {
            continue;
        };
        match &state.nats {
            Some(nats) => {
                if let Err(e) = nats.publish(event.subject().to_string(), payload.into()).await {
                    tracing::warn!(subject = event.subject(), error = %e, "event publish failed");
                }
            }
            None => tracing::debug!(subject = event.subject(), "event (no broker configured)"),
        }
    }
}

// =============================================================================
// Product loading & DTOs
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    category: String,
    price: Decimal,
    list_price: Option<Decimal>,
    stock: i32,
    fulfillment_type: String,
    lead_time_days: i32,
    min_stock: i32,
    images: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    product_id: Uuid,
    name: String,
    hex: String,
    stock: i32,
    images: Vec<String>,
}

fn assemble_product(row: ProductRow, variants: Vec<VariantRow>) -> Product {
    let colors = variants
        .into_iter()
        .map(|v| {
            let mut variant = ColorVariant::new(v.name, v.hex, v.stock);
            variant.images = v.images;
            variant
        })
        .collect();
    Product::hydrate(
        row.id,
        row.name,
        row.category,
        Money::inr(row.price),
        row.list_price.map(Money::inr),
        row.stock,
        row.fulfillment_type.parse().unwrap_or(FulfillmentType::Instock),
        row.lead_time_days.max(0) as u32,
        row.min_stock,
        colors,
        row.images,
        row.created_at,
        row.updated_at,
    )
}

async fn load_product(db: &PgPool, id: Uuid) -> Result<Option<Product>, ApiError> {
    let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .map_err(db_error)?;
    let Some(row) = row else { return Ok(None) };
    let variants = sqlx::query_as::<_, VariantRow>(
        "SELECT product_id, name, hex, stock, images FROM color_variants WHERE product_id = $1 ORDER BY name",
    )
    .bind(id)
    .fetch_all(db)
    .await
    .map_err(db_error)?;
    Ok(Some(assemble_product(row, variants)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ColorResponse {
    name: String,
    hex: String,
    stock: i32,
    status: StockStatus,
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductResponse {
    id: Uuid,
    name: String,
    category: String,
    price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    list_price: Option<Decimal>,
    stock: i32,
    stock_status: StockStatus,
    fulfillment_type: FulfillmentType,
    lead_time_days: u32,
    images: Vec<String>,
    colors: Vec<ColorResponse>,
}

impl From<&Product> for ProductResponse {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id(),
            name: p.name().to_string(),
            category: p.category().to_string(),
            price: p.price().amount(),
            list_price: p.list_price().map(Money::amount),
            stock: p.stock(),
            stock_status: p.stock_status(),
            fulfillment_type: p.fulfillment_type(),
            lead_time_days: p.lead_time_days(),
            images: p.gallery_for(None).to_vec(),
            colors: p
                .colors()
                .iter()
                .map(|c| ColorResponse {
                    name: c.name.clone(),
                    hex: c.hex.clone(),
                    stock: c.stock(),
                    status: c.status(),
                    images: c.images.clone(),
                })
                .collect(),
        }
    }
}

// =============================================================================
// Catalog handlers
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<u32>,
    per_page: Option<u32>,
    category: Option<String>,
}

#[derive(Debug, Serialize)]
struct PaginatedResponse<T> {
    data: Vec<T>,
    total: i64,
    page: u32,
}

async fn list_products(
    State(s): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<PaginatedResponse<ProductResponse>>, ApiError> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).min(100);
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT * FROM products WHERE ($1::text IS NULL OR category = $1) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(&p.category)
    .bind(per_page as i64)
    .bind(((page - 1) * per_page) as i64)
    .fetch_all(&s.db)
    .await
    .map_err(db_error)?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let variants = sqlx::query_as::<_, VariantRow>(
        "SELECT product_id, name, hex, stock, images FROM color_variants WHERE product_id = ANY($1) ORDER BY name",
    )
    .bind(&ids)
    .fetch_all(&s.db)
    .await
    .map_err(db_error)?;
    let mut grouped: HashMap<Uuid, Vec<VariantRow>> = HashMap::new();
    for v in variants {
        grouped.entry(v.product_id).or_default().push(v);
    }

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM products WHERE ($1::text IS NULL OR category = $1)")
            .bind(&p.category)
            .fetch_one(&s.db)
            .await
            .map_err(db_error)?;

    let data = rows
        .into_iter()
        .map(|row| {
            let variants = grouped.remove(&row.id).unwrap_or_default();
            ProductResponse::from(&assemble_product(row, variants))
        })
        .collect();
    Ok(Json(PaginatedResponse { data, total: total.0, page }))
}

async fn get_product(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = load_product(&s.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("product"))?;
    Ok(Json(ProductResponse::from(&product)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateColorVariantRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(length(min = 4, max = 7))]
    hex: String,
    #[serde(default)]
    stock: i32,
    #[serde(default)]
    images: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    name: String,
    #[validate(length(min = 1, max = 100))]
    category: String,
    price: Decimal,
    list_price: Option<Decimal>,
    fulfillment_type: FulfillmentType,
    #[validate(range(min = 1, max = 365))]
    lead_time_days: Option<u32>,
    stock: Option<i32>,
    #[validate]
    #[serde(default)]
    colors: Vec<CreateColorVariantRequest>,
    #[serde(default)]
    images: Vec<String>,
}

async fn create_product(
    State(s): State<AppState>,
    Json(r): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    r.validate().map_err(validation_error)?;
    if r.price < Decimal::ZERO {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "price cannot be negative"));
    }

    let mut product = Product::create(
        r.name,
        r.category,
        Money::inr(r.price),
        r.fulfillment_type,
    );
    product.set_list_price(r.list_price.map(Money::inr));
    product.set_lead_time_days(r.lead_time_days.unwrap_or(DEFAULT_LEAD_TIME_DAYS));
    if let Some(stock) = r.stock {
        product.set_stock(stock)?;
    }
    for c in r.colors {
        let mut variant = ColorVariant::new(c.name, c.hex, c.stock);
        variant.images = c.images;
        product.add_color_variant(variant)?;
    }

    let mut tx = s.db.begin().await.map_err(db_error)?;
    sqlx::query(
        "INSERT INTO products (id, name, category, price, list_price, stock, stock_status, \
         fulfillment_type, lead_time_days, min_stock, images, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())",
    )
    .bind(product.id())
    .bind(product.name())
    .bind(product.category())
    .bind(product.price().amount())
    .bind(product.list_price().map(Money::amount))
    .bind(product.stock())
    .bind(product.stock_status().as_str())
    .bind(product.fulfillment_type().as_str())
    .bind(product.lead_time_days() as i32)
    .bind(product.min_stock())
    .bind(product.gallery_for(None).to_vec())
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;
    for c in product.colors() {
        sqlx::query(
            "INSERT INTO color_variants (id, product_id, name, hex, stock, status, images) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::now_v7())
        .bind(product.id())
        .bind(&c.name)
        .bind(&c.hex)
        .bind(c.stock())
        .bind(c.status().as_str())
        .bind(&c.images)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    }
    tx.commit().await.map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(ProductResponse::from(&product))))
}

// =============================================================================
// Admin stock writes
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct VariantStockPatch {
    #[validate(length(min = 1, max = 100))]
    name: String,
    stock: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct StockPatchRequest {
    stock: Option<i32>,
    #[validate]
    #[serde(default)]
    variants: Vec<VariantStockPatch>,
}

/// Admin stock edit. Variant writes and the recomputed aggregate are
/// persisted in one transaction so downstream badge reads can never see
/// a half-applied edit.
async fn patch_stock(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<StockPatchRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    r.validate().map_err(validation_error)?;
    let mut product = load_product(&s.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("product"))?;

    if let Some(stock) = r.stock {
        product.set_stock(stock)?;
    }
    for v in &r.variants {
        product.set_variant_stock(&v.name, v.stock)?;
    }

    let mut tx = s.db.begin().await.map_err(db_error)?;
    sqlx::query("UPDATE products SET stock = $2, stock_status = $3, updated_at = NOW() WHERE id = $1")
        .bind(product.id())
        .bind(product.stock())
        .bind(product.stock_status().as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    for c in product.colors() {
        sqlx::query(
            "UPDATE color_variants SET stock = $3, status = $4 WHERE product_id = $1 AND name = $2",
        )
        .bind(product.id())
        .bind(&c.name)
        .bind(c.stock())
        .bind(c.status().as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    }
    tx.commit().await.map_err(db_error)?;

    publish_events(&s, product.take_events()).await;
    Ok(Json(ProductResponse::from(&product)))
}

// =============================================================================
// Fulfillment resolution
// =============================================================================

#[derive(Debug, Deserialize)]
struct ResolveParams {
    color: Option<String>,
    mode: Option<FulfillmentMode>,
}

async fn resolve_fulfillment(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    Query(p): Query<ResolveParams>,
) -> Result<Json<fulfillment::Resolution>, ApiError> {
    let product = load_product(&s.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("product"))?;
    let resolution = fulfillment::resolve_for(&product, p.color.as_deref(), p.mode)?;
    Ok(Json(resolution))
}

// =============================================================================
// Delivery serviceability
// =============================================================================

#[derive(Debug, Deserialize)]
struct DeliveryParams {
    session: Option<String>,
}

async fn check_pincode(
    State(s): State<AppState>,
    Path(code): Path<String>,
    Query(p): Query<DeliveryParams>,
) -> Result<Json<Serviceability>, ApiError> {
    // Format check first; a malformed code never reaches the database.
    let pin = Pincode::parse(code)?;
    let row: Option<(String, String)> = sqlx::query_as(
        "SELECT city, state FROM serviceable_areas WHERE pincode = $1 AND is_active",
    )
    .bind(pin.as_str())
    .fetch_optional(&s.db)
    .await
    .map_err(db_error)?;
    let result = row
        .map(|(city, state)| Serviceability::available(city, state))
        .unwrap_or_else(Serviceability::unavailable);

    if let Some(session) = p.session {
        SessionStore::new(Arc::clone(&s.kv), session)
            .remember_pincode(&pin, &result)
            .await?;
    }
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceableAreaRequest {
    pincode: String,
    city: String,
    state: String,
    #[serde(default = "default_true")]
    is_active: bool,
}

fn default_true() -> bool {
    true
}

async fn upsert_serviceable_area(
    State(s): State<AppState>,
    Json(r): Json<ServiceableAreaRequest>,
) -> Result<StatusCode, ApiError> {
    let pin = Pincode::parse(r.pincode)?;
    sqlx::query(
        "INSERT INTO serviceable_areas (pincode, city, state, is_active) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (pincode) DO UPDATE SET city = $2, state = $3, is_active = $4",
    )
    .bind(pin.as_str())
    .bind(&r.city)
    .bind(&r.state)
    .bind(r.is_active)
    .execute(&s.db)
    .await
    .map_err(db_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Cart handlers
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartLineResponse {
    product_id: Uuid,
    color: Option<String>,
    mode: FulfillmentMode,
    quantity: u32,
    name: String,
    unit_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    list_price: Option<Decimal>,
    lead_time_days: u32,
    line_total: Decimal,
    estimate: DeliveryEstimate,
}

impl From<&CartLine> for CartLineResponse {
    fn from(l: &CartLine) -> Self {
        Self {
            product_id: l.product_id,
            color: l.color.clone(),
            mode: l.mode,
            quantity: l.quantity.value(),
            name: l.name.clone(),
            unit_price: l.unit_price.amount(),
            list_price: l.list_price.as_ref().map(Money::amount),
            lead_time_days: l.lead_time_days,
            line_total: l.line_total().amount(),
            estimate: DeliveryEstimate::for_mode(l.mode, l.lead_time_days),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartResponse {
    lines: Vec<CartLineResponse>,
    pricing: Pricing,
    cod_allowed: bool,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        Self {
            lines: cart.lines().iter().map(CartLineResponse::from).collect(),
            pricing: order::price(cart),
            cod_allowed: order::cod_allowed(cart),
        }
    }
}

fn session_store(s: &AppState, session: String) -> SessionStore {
    SessionStore::new(Arc::clone(&s.kv), session)
}

async fn get_cart(
    State(s): State<AppState>,
    Path(session): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = session_store(&s, session).load_cart().await?;
    Ok(Json(CartResponse::from(&cart)))
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddToCartRequest {
    product_id: Uuid,
    #[serde(default = "default_quantity")]
    quantity: u32,
    color: Option<String>,
    mode: Option<FulfillmentMode>,
}

async fn add_to_cart(
    State(s): State<AppState>,
    Path(session): Path<String>,
    Json(r): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartResponse>), ApiError> {
    let product = load_product(&s.db, r.product_id)
        .await?
        .ok_or_else(|| ApiError::not_found("product"))?;
    let store = session_store(&s, session);
    let mut cart = store.load_cart().await?;
    cart.add_line(&product, r.quantity, r.color.as_deref(), r.mode)?;
    store.save_cart(&cart).await?;
    Ok((StatusCode::CREATED, Json(CartResponse::from(&cart))))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineKeyRequest {
    product_id: Uuid,
    color: Option<String>,
    mode: FulfillmentMode,
}

impl LineKeyRequest {
    fn into_key(self) -> LineKey {
        LineKey {
            product_id: self.product_id,
            color: self.color,
            mode: self.mode,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateQuantityRequest {
    #[serde(flatten)]
    key: LineKeyRequest,
    delta: i32,
}

async fn update_quantity(
    State(s): State<AppState>,
    Path(session): Path<String>,
    Json(r): Json<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let store = session_store(&s, session);
    let mut cart = store.load_cart().await?;
    if !cart.update_quantity(&r.key.into_key(), r.delta) {
        return Err(ApiError::not_found("cart line"));
    }
    store.save_cart(&cart).await?;
    Ok(Json(CartResponse::from(&cart)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveLineRequest {
    #[serde(flatten)]
    key: LineKeyRequest,
}

async fn remove_line(
    State(s): State<AppState>,
    Path(session): Path<String>,
    Json(r): Json<RemoveLineRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let store = session_store(&s, session);
    let mut cart = store.load_cart().await?;
    if !cart.remove_line(&r.key.into_key()) {
        return Err(ApiError::not_found("cart line"));
    }
    store.save_cart(&cart).await?;
    Ok(Json(CartResponse::from(&cart)))
}

async fn clear_cart(
    State(s): State<AppState>,
    Path(session): Path<String>,
) -> Result<StatusCode, ApiError> {
    session_store(&s, session).clear_cart().await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Wishlist handlers
// =============================================================================

async fn get_wishlist(
    State(s): State<AppState>,
    Path(session): Path<String>,
) -> Result<Json<Vec<Uuid>>, ApiError> {
    Ok(Json(session_store(&s, session).wishlist().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WishlistToggleRequest {
    product_id: Uuid,
}

async fn toggle_wishlist(
    State(s): State<AppState>,
    Path(session): Path<String>,
    Json(r): Json<WishlistToggleRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let present = session_store(&s, session)
        .toggle_wishlist(r.product_id)
        .await?;
    Ok(Json(serde_json::json!({"productId": r.product_id, "wishlisted": present})))
}

// =============================================================================
// Order handlers
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderRequest {
    method: PaymentMethod,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: Uuid,
    order_number: String,
    pricing: Pricing,
    payment_method: PaymentMethod,
    payment_status: String,
}

/// Prices the stored cart server-side and runs the payment gate before
/// anything is written; the cart is cleared only after the order row is
/// committed, so a failed submission never loses the shopper's cart.
async fn place_order(
    State(s): State<AppState>,
    Path(session): Path<String>,
    Json(r): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let store = session_store(&s, session.clone());
    let cart = store.load_cart().await?;

    let order_number = format!("ORD-{:08}", rand::random::<u32>() % 100_000_000);
    let mut order = Order::place(order_number, session, &cart, r.method)?;

    let submission = order.submission();
    let items = serde_json::to_value(&submission.items)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    sqlx::query(
        "INSERT INTO orders (id, order_number, session_id, items, subtotal, gst, shipping, total, \
         payment_method, payment_status, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())",
    )
    .bind(order.id())
    .bind(order.order_number())
    .bind(order.session_id())
    .bind(&items)
    .bind(submission.pricing.subtotal)
    .bind(submission.pricing.gst)
    .bind(submission.pricing.shipping_charges)
    .bind(submission.pricing.total)
    .bind(submission.payment.method.as_str())
    .bind(&submission.payment.status)
    .execute(&s.db)
    .await
    .map_err(db_error)?;

    store.clear_cart().await?;
    let response = OrderResponse {
        order_id: order.id(),
        order_number: order.order_number().to_string(),
        pricing: order.submission().pricing.clone(),
        payment_method: order.submission().payment.method,
        payment_status: order.submission().payment.status.clone(),
    };
    publish_events(&s, order.take_events()).await;
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct OrderListRow {
    id: Uuid,
    order_number: String,
    session_id: String,
    subtotal: Decimal,
    gst: Decimal,
    shipping: Decimal,
    total: Decimal,
    payment_method: String,
    payment_status: String,
    created_at: DateTime<Utc>,
}

async fn list_orders(
    State(s): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<PaginatedResponse<OrderListRow>>, ApiError> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).min(100);
    let orders = sqlx::query_as::<_, OrderListRow>(
        "SELECT id, order_number, session_id, subtotal, gst, shipping, total, payment_method, \
         payment_status, created_at FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(per_page as i64)
    .bind(((page - 1) * per_page) as i64)
    .fetch_all(&s.db)
    .await
    .map_err(db_error)?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
        .fetch_one(&s.db)
        .await
        .map_err(db_error)?;
    Ok(Json(PaginatedResponse { data: orders, total: total.0, page }))
}
