use axum::{
    extract::{Extension, Path, Query, State},
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{self, Claims, TokenIssuer};
use crate::error::MarketError;
use crate::handlers::{AccountStore, Catalog, DbPool, OrderEngine, ProfileManager};
use crate::models::{FarmerProfile, Order, Product, ProfileUpdate, Role};

/// Request decimals are normalized to fixed scales on entry; all later
/// arithmetic is exact.
const QUANTITY_SCALE: i64 = 3;
const PRICE_SCALE: i64 = 2;

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub delete_products_at_zero: bool,
    pub enforce_product_ownership: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountStore,
    pub profiles: ProfileManager,
    pub catalog: Catalog,
    pub orders: OrderEngine,
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(pool: DbPool, config: &MarketConfig) -> Self {
        Self {
            accounts: AccountStore::new(pool.clone()),
            profiles: ProfileManager::new(pool.clone()),
            catalog: Catalog::new(pool.clone(), config.enforce_product_ownership),
            orders: OrderEngine::new(pool, config.delete_products_at_zero),
            tokens: TokenIssuer::new(&config.jwt_secret, config.token_ttl_minutes),
        }
    }
}

/// Request fields are optional so that absent values surface as the 400
/// "All fields are required!" check instead of a framework rejection.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub identifier: Option<String>,
    pub secret: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub identifier: String,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub display_name: Option<String>,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub product_summary: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub identifier: String,
    pub display_name: Option<String>,
    pub location: Option<String>,
    pub contact: Option<String>,
    pub product_summary: Option<String>,
}

impl From<FarmerProfile> for ProfileResponse {
    fn from(profile: FarmerProfile) -> Self {
        Self {
            identifier: profile.identifier,
            display_name: profile.display_name,
            location: profile.location,
            contact: profile.contact,
            product_summary: profile.product_summary,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub farmer_identifier: String,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            quantity: product.quantity,
            unit_price: product.unit_price,
            farmer_identifier: product.farmer_identifier,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub product_id: Option<String>,
    pub client_identifier: Option<String>,
    pub quantity: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub client_identifier: String,
    pub quantity: BigDecimal,
    pub total_price: BigDecimal,
    pub farmer_identifier: String,
    pub status: String,
    pub product_name: Option<String>,
}

impl OrderResponse {
    fn from_row((order, product_name): (Order, Option<String>)) -> Self {
        Self {
            id: order.id,
            product_id: order.product_id,
            client_identifier: order.client_identifier,
            quantity: order.quantity,
            total_price: order.total_price,
            farmer_identifier: order.farmer_identifier,
            status: order.status,
            product_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FarmerProductsQuery {
    pub farmer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOrdersQuery {
    pub client_identifier: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/reset-password", post(reset_password))
        .route("/farmer-profile/:identifier", get(get_farmer_profile))
        .route("/products", get(list_products))
        .route("/farmer-products", get(list_farmer_products))
        .route("/orders", get(list_client_orders))
        .route("/health", get(health_check));

    // Every mutating route passes through the same token gate.
    let gated = Router::new()
        .route("/farmer-profile/:identifier", put(update_farmer_profile))
        .route("/product", post(add_product))
        .route("/product/:id", put(update_product).delete(delete_product))
        .route("/order", post(place_order))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    public
        .merge(gated)
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

fn parse_role(role: &str) -> Result<Role, MarketError> {
    role.parse()
        .map_err(|_| MarketError::InvalidInput("Invalid role!".to_string()))
}

fn require_present(value: Option<String>) -> Result<String, MarketError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(MarketError::InvalidInput(
            "All fields are required!".to_string(),
        )),
    }
}

fn require_number(value: Option<f64>) -> Result<f64, MarketError> {
    value.ok_or_else(|| MarketError::InvalidInput("All fields are required!".to_string()))
}

fn parse_product_id(id: &str) -> Result<Uuid, MarketError> {
    Uuid::parse_str(id).map_err(|_| MarketError::InvalidInput("Invalid product id!".to_string()))
}

fn decimal_from_input(value: f64, scale: i64) -> Result<BigDecimal, MarketError> {
    BigDecimal::try_from(value)
        .map(|decimal| decimal.with_scale_round(scale, bigdecimal::RoundingMode::HalfUp))
        .map_err(|_| MarketError::InvalidInput("Invalid quantity or price!".to_string()))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<Value>, MarketError> {
    let identifier = require_present(body.identifier)?;
    let secret = require_present(body.secret)?;
    let role = parse_role(&require_present(body.role)?)?;
    state.accounts.register(&identifier, &secret, role).await?;
    Ok(Json(json!({ "message": "User registered successfully!" })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>, MarketError> {
    let identifier = require_present(body.identifier)?;
    let secret = require_present(body.secret)?;
    let role = parse_role(&require_present(body.role)?)?;
    let user = state
        .accounts
        .authenticate(&identifier, &secret, role)
        .await?;
    let token = state.tokens.issue(&user.identifier, role)?;
    Ok(Json(LoginResponse {
        message: "Login successful!".to_string(),
        identifier: user.identifier,
        role,
        token,
    }))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<Value>, MarketError> {
    let identifier = require_present(body.identifier)?;
    let secret = require_present(body.secret)?;
    let role = parse_role(&require_present(body.role)?)?;
    state
        .accounts
        .reset_secret(&identifier, role, &secret)
        .await?;
    Ok(Json(json!({ "message": "Password reset successfully!" })))
}

pub async fn get_farmer_profile(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<ProfileResponse>, MarketError> {
    let profile = state.profiles.get(&identifier).await?;
    Ok(Json(profile.into()))
}

pub async fn update_farmer_profile(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<ProfileRequest>,
) -> Result<Json<Value>, MarketError> {
    claims.require_role(Role::Farmer, "Only farmers can update profiles!")?;
    if claims.sub != identifier {
        return Err(MarketError::Forbidden(
            "Not authorized to update this profile!".to_string(),
        ));
    }

    let update = ProfileUpdate {
        display_name: body.display_name,
        location: body.location,
        contact: body.contact,
        product_summary: body.product_summary,
    };
    state.profiles.update(&identifier, update).await?;
    Ok(Json(json!({ "message": "Profile updated successfully!" })))
}

pub async fn add_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<ProductRequest>,
) -> Result<Json<Value>, MarketError> {
    claims.require_role(Role::Farmer, "Only farmers can manage products!")?;
    let name = require_present(body.name)?;
    let quantity = decimal_from_input(require_number(body.quantity)?, QUANTITY_SCALE)?;
    let unit_price = decimal_from_input(require_number(body.unit_price)?, PRICE_SCALE)?;
    let product = state
        .catalog
        .add_product(&name, quantity, unit_price, &claims.sub)
        .await?;
    Ok(Json(json!({
        "message": "Product added successfully!",
        "productId": product.id,
    })))
}

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, MarketError> {
    let products = state.catalog.list_all().await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

pub async fn list_farmer_products(
    State(state): State<AppState>,
    Query(query): Query<FarmerProductsQuery>,
) -> Result<Json<Vec<ProductResponse>>, MarketError> {
    let farmer = query.farmer.ok_or_else(|| {
        MarketError::InvalidInput("Farmer identifier is required!".to_string())
    })?;
    let products = state.catalog.list_by_farmer(&farmer).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(body): Json<ProductRequest>,
) -> Result<Json<Value>, MarketError> {
    claims.require_role(Role::Farmer, "Only farmers can manage products!")?;
    let id = parse_product_id(&id)?;
    let name = require_present(body.name)?;
    let quantity = decimal_from_input(require_number(body.quantity)?, QUANTITY_SCALE)?;
    let unit_price = decimal_from_input(require_number(body.unit_price)?, PRICE_SCALE)?;
    state
        .catalog
        .update_product(id, &name, quantity, unit_price, &claims.sub)
        .await?;
    Ok(Json(json!({ "message": "Product updated successfully!" })))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<Value>, MarketError> {
    claims.require_role(Role::Farmer, "Only farmers can manage products!")?;
    let id = parse_product_id(&id)?;
    state.catalog.delete_product(id, &claims.sub).await?;
    Ok(Json(json!({ "message": "Product deleted successfully!" })))
}

pub async fn place_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<PlaceOrderRequest>,
) -> Result<Json<Value>, MarketError> {
    claims.require_role(Role::Client, "Only clients can place orders!")?;
    let product_id = require_present(body.product_id)?;
    let client_identifier = require_present(body.client_identifier)?;
    if client_identifier != claims.sub {
        return Err(MarketError::Forbidden(
            "Token does not match client identifier!".to_string(),
        ));
    }

    let product_id = parse_product_id(&product_id)?;
    let quantity = decimal_from_input(require_number(body.quantity)?, QUANTITY_SCALE)?;
    let order = state
        .orders
        .place_order(product_id, &claims.sub, quantity)
        .await?;
    Ok(Json(json!({
        "message": "Order placed successfully!",
        "orderId": order.id,
    })))
}

pub async fn list_client_orders(
    State(state): State<AppState>,
    Query(query): Query<ClientOrdersQuery>,
) -> Result<Json<Vec<OrderResponse>>, MarketError> {
    let client = query.client_identifier.ok_or_else(|| {
        MarketError::InvalidInput("Client identifier is required!".to_string())
    })?;
    let rows = state.orders.list_for_client(&client).await?;
    Ok(Json(rows.into_iter().map(OrderResponse::from_row).collect()))
}

pub async fn health_check() -> &'static str {
    "OK"
}
