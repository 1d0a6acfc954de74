//! HTTP surface: a thin axum layer over the services.
//!
//! Authentication is an upstream concern; the gateway forwards the verified
//! principal as `x-user-id` and `x-user-role` headers, which the
//! [`Principal`] extractor picks up. Admin-only routes wrap it in
//! [`RequireAdmin`].

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use validator::Validate;

use crate::domain::{Gender, NotificationStatus, Product, ProductFilter, Role};
use crate::error::Error;
use crate::service::{CartService, NewVoucher, UserService, VoucherService, VoucherUpdate, WishlistService};
use crate::store::{Store, VoucherQuery};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub users: UserService,
    pub vouchers: VoucherService,
    pub cart: CartService,
    pub wishlist: WishlistService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            users: UserService::new(store.clone()),
            vouchers: VoucherService::new(store.clone()),
            cart: CartService::new(store.clone()),
            wishlist: WishlistService::new(store.clone()),
            store,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Inactive(_)
            | Error::Invalid(_)
            | Error::InsufficientStock { .. }
            | Error::BelowMinimumPurchase { .. } => StatusCode::BAD_REQUEST,
            Error::Conflict { .. } | Error::AlreadyClaimed | Error::LimitReached => StatusCode::CONFLICT,
            Error::CodeGeneration | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "success": false, "message": self.to_string() }))).into_response()
    }
}

/// Verified caller identity forwarded by the gateway.
#[derive(Clone, Copy, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let unauthorized = |msg: &str| (StatusCode::UNAUTHORIZED, msg.to_string());

        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("missing x-user-id header"))?
            .parse::<Uuid>()
            .map_err(|_| unauthorized("x-user-id is not a valid id"))?;
        let role = match parts.headers.get("x-user-role").and_then(|v| v.to_str().ok()) {
            Some("admin") => Role::Admin,
            Some("user") => Role::User,
            _ => return Err(unauthorized("missing or unknown x-user-role header")),
        };
        Ok(Self { user_id, role })
    }
}

/// Principal that must carry the admin role.
#[derive(Clone, Copy, Debug)]
pub struct RequireAdmin(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        if principal.role != Role::Admin {
            return Err((StatusCode::FORBIDDEN, "admin role required".to_string()));
        }
        Ok(Self(principal))
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListParams {
    /// Page defaults to 1, limit to 10, capped at 100. The offset is
    /// widened to u64 so an absurd page number yields an empty page
    /// instead of overflowing.
    fn normalize(&self) -> (u32, u32, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(10).clamp(1, 100);
        (page, limit, u64::from(page - 1) * u64::from(limit))
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    fn new(data: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        Self {
            data,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit as u64),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/users/register", post(register))
        .route("/api/v1/users/contact", patch(update_contact))
        .route("/api/v1/users/notifications", get(list_notifications))
        .route("/api/v1/users/notifications/read-all", patch(read_all_notifications))
        .route("/api/v1/users/notifications/:id/read", patch(read_notification))
        .route("/api/v1/products", post(create_product).get(list_products))
        .route("/api/v1/products/:id", get(get_product).put(update_product).delete(delete_product))
        .route("/api/v1/products/:id/toggle", patch(toggle_product_status))
        .route("/api/v1/products/:id/add-stock", patch(add_stock))
        .route("/api/v1/products/:id/reduce-stock", patch(reduce_stock))
        .route("/api/v1/products/:id/discount", patch(set_discount).delete(disable_discount))
        .route("/api/v1/vouchers", post(create_voucher).get(list_vouchers))
        .route("/api/v1/vouchers/claimed", get(claimed_vouchers))
        .route("/api/v1/vouchers/:id", get(get_voucher).put(edit_voucher).delete(delete_voucher))
        .route("/api/v1/vouchers/:id/toggle", patch(toggle_voucher))
        .route("/api/v1/vouchers/:id/claim", post(claim_voucher))
        .route("/api/v1/cart/items", post(add_to_cart))
        .route("/api/v1/cart", get(get_cart))
        .route("/api/v1/cart/count", get(count_cart))
        .route("/api/v1/cart/items/:product_id", delete(remove_from_cart))
        .route("/api/v1/cart/items/:product_id/increase", patch(increase_quantity))
        .route("/api/v1/cart/items/:product_id/decrease", patch(decrease_quantity))
        .route("/api/v1/wishlist/:product_id/toggle", patch(toggle_wishlist))
        .route("/api/v1/wishlist", get(get_wishlist))
        .route("/api/v1/wishlist/count", get(count_wishlist))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "gearup-commerce" }))
}

// --- users ---

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 20))]
    pub phone: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), Error> {
    req.validate().map_err(|e| Error::invalid(e.to_string()))?;
    let (user, voucher) = state.users.register(&req.name, &req.email, &req.phone).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": user, "voucher": voucher })),
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateContactRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,
}

async fn update_contact(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<UpdateContactRequest>,
) -> Result<Json<crate::domain::User>, Error> {
    req.validate().map_err(|e| Error::invalid(e.to_string()))?;
    let user = state.users.update_contact(principal.user_id, req.email, req.phone).await?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub status: Option<NotificationStatus>,
}

async fn list_notifications(
    State(state): State<AppState>,
    principal: Principal,
    Query(q): Query<NotificationQuery>,
) -> Result<Json<serde_json::Value>, Error> {
    let notifications = state.users.notifications(principal.user_id, q.status).await?;
    Ok(Json(json!({ "count": notifications.len(), "notifications": notifications })))
}

async fn read_notification(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<crate::domain::Notification>, Error> {
    Ok(Json(state.users.mark_notification_read(principal.user_id, id).await?))
}

async fn read_all_notifications(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<serde_json::Value>, Error> {
    let updated = state.users.mark_all_notifications_read(principal.user_id).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

// --- products ---

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub brand: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub price: i64,
    pub discount_price: Option<i64>,
    pub stock: u32,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub gender: Option<Gender>,
    pub is_active: Option<bool>,
}

async fn create_product(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>), Error> {
    req.validate().map_err(|e| Error::invalid(e.to_string()))?;
    let mut product = Product::new(req.name, req.brand, req.category, req.price, req.stock);
    product.description = req.description;
    product.discount_price = req.discount_price;
    product.image_urls = req.image_urls;
    product.tags = req.tags;
    product.gender = req.gender;
    product.is_active = req.is_active.unwrap_or(true);
    product.validate()?;
    state.store.insert_product(product.clone()).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Paginated<Product>>, Error> {
    let (page, limit, offset) = params.normalize();
    let (data, total) = state.store.list_products(limit, offset).await?;
    Ok(Json(Paginated::new(data, total, page, limit)))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Product>, Error> {
    state
        .store
        .product(id)
        .await?
        .map(Json)
        .ok_or(Error::NotFound("product"))
}

/// Product update payload. Stock is deliberately absent: after creation it
/// only moves through the add-stock and reduce-stock operations, so a stale
/// editor form can never clobber concurrent stock movements.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub brand: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub price: i64,
    pub discount_price: Option<i64>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub gender: Option<Gender>,
    pub is_active: Option<bool>,
}

async fn update_product(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, Error> {
    req.validate().map_err(|e| Error::invalid(e.to_string()))?;
    let mut product = state.store.product(id).await?.ok_or(Error::NotFound("product"))?;
    product.name = req.name;
    product.brand = req.brand;
    product.category = req.category;
    product.description = req.description;
    product.price = req.price;
    product.discount_price = req.discount_price;
    product.image_urls = req.image_urls;
    product.tags = req.tags;
    product.gender = req.gender;
    if let Some(active) = req.is_active {
        product.is_active = active;
    }
    product.validate()?;
    product.touch();
    state.store.put_product(product.clone()).await?;
    Ok(Json(product))
}

async fn toggle_product_status(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, Error> {
    let mut product = state.store.product(id).await?.ok_or(Error::NotFound("product"))?;
    product.is_active = !product.is_active;
    product.touch();
    state.store.put_product(product.clone()).await?;
    Ok(Json(product))
}

#[derive(Debug, Deserialize, Validate)]
pub struct StockAdjustRequest {
    #[validate(range(min = 1))]
    pub amount: u32,
}

async fn add_stock(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(req): Json<StockAdjustRequest>,
) -> Result<Json<Product>, Error> {
    req.validate().map_err(|e| Error::invalid(e.to_string()))?;
    let product = state.store.adjust_stock(id, i64::from(req.amount)).await?;
    Ok(Json(product))
}

async fn reduce_stock(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(req): Json<StockAdjustRequest>,
) -> Result<Json<Product>, Error> {
    req.validate().map_err(|e| Error::invalid(e.to_string()))?;
    let product = state.store.adjust_stock(id, -i64::from(req.amount)).await?;
    Ok(Json(product))
}

#[derive(Debug, Deserialize, Validate)]
pub struct DiscountPriceRequest {
    #[validate(range(min = 1))]
    pub discount_price: i64,
}

async fn set_discount(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(req): Json<DiscountPriceRequest>,
) -> Result<Json<Product>, Error> {
    req.validate().map_err(|e| Error::invalid(e.to_string()))?;
    let mut product = state.store.product(id).await?.ok_or(Error::NotFound("product"))?;
    product.discount_price = Some(req.discount_price);
    product.validate()?;
    product.touch();
    state.store.put_product(product.clone()).await?;
    Ok(Json(product))
}

async fn disable_discount(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, Error> {
    let mut product = state.store.product(id).await?.ok_or(Error::NotFound("product"))?;
    if product.discount_price.is_none() {
        return Err(Error::invalid("product has no active discount"));
    }
    product.discount_price = None;
    product.touch();
    state.store.put_product(product.clone()).await?;
    Ok(Json(product))
}

async fn delete_product(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Error> {
    if !state.store.delete_product(id).await? {
        return Err(Error::NotFound("product"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- vouchers ---

async fn create_voucher(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(req): Json<NewVoucher>,
) -> Result<(StatusCode, Json<crate::domain::Voucher>), Error> {
    let voucher = state.vouchers.create(req).await?;
    Ok((StatusCode::CREATED, Json(voucher)))
}

#[derive(Debug, Deserialize)]
pub struct VoucherListParams {
    pub title: Option<String>,
    pub discount_type: Option<crate::domain::DiscountType>,
    pub kind: Option<crate::domain::VoucherKind>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn list_vouchers(
    State(state): State<AppState>,
    Query(params): Query<VoucherListParams>,
) -> Result<Json<Paginated<crate::domain::Voucher>>, Error> {
    let (page, limit, offset) = ListParams { page: params.page, limit: params.limit }.normalize();
    let query = VoucherQuery {
        title: params.title,
        discount_type: params.discount_type,
        kind: params.kind,
    };
    let (data, total) = state.vouchers.list(&query, limit, offset).await?;
    Ok(Json(Paginated::new(data, total, page, limit)))
}

async fn get_voucher(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<crate::domain::Voucher>, Error> {
    Ok(Json(state.vouchers.get(id).await?))
}

async fn edit_voucher(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(req): Json<VoucherUpdate>,
) -> Result<Json<crate::domain::Voucher>, Error> {
    Ok(Json(state.vouchers.edit(id, req).await?))
}

async fn delete_voucher(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, Error> {
    let users_touched = state.vouchers.delete(id).await?;
    Ok(Json(json!({ "success": true, "users_touched": users_touched })))
}

async fn toggle_voucher(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<crate::domain::Voucher>, Error> {
    Ok(Json(state.vouchers.toggle_active(id).await?))
}

async fn claim_voucher(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<crate::domain::Voucher>, Error> {
    Ok(Json(state.vouchers.claim(principal.user_id, id).await?))
}

async fn claimed_vouchers(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<crate::service::ClaimedVoucher>>, Error> {
    Ok(Json(state.vouchers.claimed_vouchers(principal.user_id).await?))
}

// --- cart ---

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: Option<u32>,
}

async fn add_to_cart(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<AddToCartRequest>,
) -> Result<Json<Vec<crate::service::CartEntry>>, Error> {
    Ok(Json(state.cart.add(principal.user_id, req.product_id, req.quantity).await?))
}

async fn get_cart(
    State(state): State<AppState>,
    principal: Principal,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<crate::service::CartEntry>>, Error> {
    Ok(Json(state.cart.get(principal.user_id, &filter).await?))
}

async fn remove_from_cart(
    State(state): State<AppState>,
    principal: Principal,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<crate::service::CartEntry>>, Error> {
    Ok(Json(state.cart.remove(principal.user_id, product_id).await?))
}

async fn increase_quantity(
    State(state): State<AppState>,
    principal: Principal,
    Path(product_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, Error> {
    let quantity = state.cart.increase(principal.user_id, product_id).await?;
    Ok(Json(json!({ "product_id": product_id, "quantity": quantity })))
}

async fn decrease_quantity(
    State(state): State<AppState>,
    principal: Principal,
    Path(product_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, Error> {
    let quantity = state.cart.decrease(principal.user_id, product_id).await?;
    Ok(Json(json!({ "product_id": product_id, "quantity": quantity })))
}

async fn count_cart(State(state): State<AppState>, principal: Principal) -> Result<Json<serde_json::Value>, Error> {
    let total = state.cart.count_unique_items(principal.user_id).await?;
    Ok(Json(json!({ "total_products": total })))
}

// --- wishlist ---

async fn toggle_wishlist(
    State(state): State<AppState>,
    principal: Principal,
    Path(product_id): Path<Uuid>,
) -> Result<Json<crate::service::WishlistToggle>, Error> {
    Ok(Json(state.wishlist.toggle(principal.user_id, product_id).await?))
}

async fn get_wishlist(
    State(state): State<AppState>,
    principal: Principal,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>, Error> {
    Ok(Json(state.wishlist.get(principal.user_id, &filter).await?))
}

async fn count_wishlist(State(state): State<AppState>, principal: Principal) -> Result<Json<serde_json::Value>, Error> {
    let total = state.wishlist.count(principal.user_id).await?;
    Ok(Json(json!({ "total_wishlist_items": total })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_caps() {
        let (page, limit, offset) = ListParams { page: None, limit: None }.normalize();
        assert_eq!((page, limit, offset), (1, 10, 0));

        let (_, limit, _) = ListParams { page: Some(1), limit: Some(5000) }.normalize();
        assert_eq!(limit, 100);

        let (page, _, offset) = ListParams { page: Some(0), limit: Some(10) }.normalize();
        assert_eq!((page, offset), (1, 0));
    }

    #[test]
    fn pagination_offset_survives_the_page_type_limit() {
        let (page, limit, offset) = ListParams { page: Some(u32::MAX), limit: Some(100) }.normalize();
        assert_eq!(page, u32::MAX);
        assert_eq!(offset, u64::from(u32::MAX - 1) * u64::from(limit));
    }
}
