//! Cart reconciliation: quantity vs. stock invariants and lazy repair of
//! references to deleted products.
//!
//! A line's quantity is checked against the product's stock at the time of
//! the mutating call only; stock dropping later does not cascade into
//! existing carts.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Product, ProductFilter, User};
use crate::error::{Error, Result};
use crate::store::Store;

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

/// A cart line expanded with its product details.
#[derive(Clone, Debug, Serialize)]
pub struct CartEntry {
    pub product: Product,
    pub quantity: u32,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Loads the user's cart, expanding each line with product details and
    /// pruning lines whose product no longer exists. A pruned cart is
    /// persisted before anything is returned.
    async fn load(&self, user_id: Uuid) -> Result<(User, Vec<CartEntry>)> {
        let mut user = self.store.user(user_id).await?.ok_or(Error::NotFound("user"))?;
        let mut entries = Vec::with_capacity(user.cart.len());
        let mut kept = Vec::with_capacity(user.cart.len());
        for line in &user.cart {
            match self.store.product(line.product_id).await? {
                Some(product) => {
                    entries.push(CartEntry { product, quantity: line.quantity });
                    kept.push(line.clone());
                }
                None => {
                    tracing::debug!(user_id = %user_id, product_id = %line.product_id, "pruning dangling cart line");
                }
            }
        }
        if kept.len() != user.cart.len() {
            user.cart = kept;
            user.touch();
            self.store.put_user(user.clone()).await?;
        }
        Ok((user, entries))
    }

    /// Adds `quantity` of the product, merging into an existing line. Fails
    /// without touching the cart when the product is missing, inactive, out
    /// of stock, or the resulting line would exceed the current stock.
    pub async fn add(&self, user_id: Uuid, product_id: Uuid, quantity: Option<u32>) -> Result<Vec<CartEntry>> {
        let quantity = quantity.unwrap_or(1);
        if quantity == 0 {
            return Err(Error::invalid("quantity must be at least 1"));
        }
        let product = self
            .store
            .product(product_id)
            .await?
            .ok_or(Error::NotFound("product"))?;
        if !product.is_active {
            return Err(Error::Inactive("product"));
        }
        if product.stock == 0 {
            return Err(Error::InsufficientStock { available: 0 });
        }

        let mut user = self.store.user(user_id).await?.ok_or(Error::NotFound("user"))?;
        let existing = user.cart_line(product_id).map(|l| l.quantity).unwrap_or(0);
        // checked_add: a request near u32::MAX must read as over-stock, not wrap
        match existing.checked_add(quantity) {
            Some(total) if total <= product.stock => {}
            _ => return Err(Error::InsufficientStock { available: product.stock }),
        }
        user.merge_cart_line(product_id, quantity);
        user.touch();
        self.store.put_user(user).await?;

        let (_, entries) = self.load(user_id).await?;
        Ok(entries)
    }

    /// Returns the cart, optionally narrowed by the filter set. A filter
    /// that matches nothing yields an empty list, not an error.
    pub async fn get(&self, user_id: Uuid, filter: &ProductFilter) -> Result<Vec<CartEntry>> {
        let (_, entries) = self.load(user_id).await?;
        if filter.is_empty() {
            return Ok(entries);
        }
        Ok(entries
            .into_iter()
            .filter(|e| filter.matches(&e.product))
            .collect())
    }

    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<Vec<CartEntry>> {
        let mut user = self.store.user(user_id).await?.ok_or(Error::NotFound("user"))?;
        if !user.remove_cart_line(product_id) {
            return Err(Error::NotFound("cart item"));
        }
        user.touch();
        self.store.put_user(user).await?;
        let (_, entries) = self.load(user_id).await?;
        Ok(entries)
    }

    /// Bumps the line's quantity by one, bounded by the current stock.
    pub async fn increase(&self, user_id: Uuid, product_id: Uuid) -> Result<u32> {
        let mut user = self.store.user(user_id).await?.ok_or(Error::NotFound("user"))?;
        let quantity = user
            .cart_line(product_id)
            .map(|l| l.quantity)
            .ok_or(Error::NotFound("cart item"))?;
        let product = self
            .store
            .product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(Error::NotFound("product"))?;
        if quantity >= product.stock {
            return Err(Error::InsufficientStock { available: product.stock });
        }
        let line = user.cart_line_mut(product_id).ok_or(Error::NotFound("cart item"))?;
        line.quantity += 1;
        let new_quantity = line.quantity;
        user.touch();
        self.store.put_user(user).await?;
        Ok(new_quantity)
    }

    /// Drops the line's quantity by one; a line at quantity 1 is removed
    /// entirely rather than stored at 0. Returns the remaining quantity.
    pub async fn decrease(&self, user_id: Uuid, product_id: Uuid) -> Result<u32> {
        let mut user = self.store.user(user_id).await?.ok_or(Error::NotFound("user"))?;
        let line = user.cart_line_mut(product_id).ok_or(Error::NotFound("cart item"))?;
        let new_quantity = if line.quantity > 1 {
            line.quantity -= 1;
            line.quantity
        } else {
            user.remove_cart_line(product_id);
            0
        };
        user.touch();
        self.store.put_user(user).await?;
        Ok(new_quantity)
    }

    /// Number of distinct product lines (not the quantity sum), after
    /// pruning dangling references.
    pub async fn count_unique_items(&self, user_id: Uuid) -> Result<usize> {
        let (_, entries) = self.load(user_id).await?;
        Ok(entries.len())
    }
}
