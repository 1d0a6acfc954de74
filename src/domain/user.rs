//! User document: identity plus the cart, wishlist, claim and notification
//! collections that live on it.
//!
//! Cart and wishlist entries reference products by id only. Those are weak
//! references; the product may be deleted later, and the stale entry is
//! pruned lazily on the next read (see the cart and wishlist services).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub status: UserStatus,
    pub cart: Vec<CartLine>,
    pub wishlist: Vec<Uuid>,
    pub vouchers: Vec<VoucherClaim>,
    pub notifications: Vec<Notification>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Banned,
}

/// One cart line per product; `quantity` is always at least 1. A line whose
/// quantity would drop to 0 is removed instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoucherClaim {
    pub voucher_id: Uuid,
    pub is_used: bool,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub status: NotificationStatus,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Unread,
    Read,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            role: Role::User,
            status: UserStatus::Active,
            cart: vec![],
            wishlist: vec![],
            vouchers: vec![],
            notifications: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn cart_line(&self, product_id: Uuid) -> Option<&CartLine> {
        self.cart.iter().find(|l| l.product_id == product_id)
    }

    pub fn cart_line_mut(&mut self, product_id: Uuid) -> Option<&mut CartLine> {
        self.cart.iter_mut().find(|l| l.product_id == product_id)
    }

    /// Merges `quantity` into an existing line or inserts a new one.
    /// Returns the resulting line quantity. Stock checks happen in the
    /// cart service before this is called.
    pub fn merge_cart_line(&mut self, product_id: Uuid, quantity: u32) -> u32 {
        if let Some(line) = self.cart_line_mut(product_id) {
            line.quantity = line.quantity.saturating_add(quantity);
            line.quantity
        } else {
            self.cart.push(CartLine { product_id, quantity });
            quantity
        }
    }

    /// Removes the line for `product_id`; returns false if there was none.
    pub fn remove_cart_line(&mut self, product_id: Uuid) -> bool {
        let before = self.cart.len();
        self.cart.retain(|l| l.product_id != product_id);
        self.cart.len() != before
    }

    /// Adds the product to the wishlist if absent, removes it if present.
    /// Returns true when the product was added.
    pub fn toggle_wishlist(&mut self, product_id: Uuid) -> bool {
        if let Some(pos) = self.wishlist.iter().position(|id| *id == product_id) {
            self.wishlist.remove(pos);
            false
        } else {
            self.wishlist.push(product_id);
            true
        }
    }

    pub fn has_claimed(&self, voucher_id: Uuid) -> bool {
        self.vouchers.iter().any(|c| c.voucher_id == voucher_id)
    }

    pub fn notify(&mut self, title: impl Into<String>, description: impl Into<String>) {
        self.notifications.push(Notification {
            id: Uuid::new_v4(),
            title: title.into(),
            status: NotificationStatus::Unread,
            description: description.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merging_cart_lines_keeps_one_line_per_product() {
        let mut user = User::new("Dina", "dina@example.com", "0811");
        let product = Uuid::now_v7();
        assert_eq!(user.merge_cart_line(product, 2), 2);
        assert_eq!(user.merge_cart_line(product, 3), 5);
        assert_eq!(user.cart.len(), 1);
    }

    #[test]
    fn merging_cart_lines_saturates_at_the_type_limit() {
        let mut user = User::new("Dina", "dina@example.com", "0811");
        let product = Uuid::now_v7();
        user.merge_cart_line(product, u32::MAX - 1);
        assert_eq!(user.merge_cart_line(product, 5), u32::MAX);
    }

    #[test]
    fn wishlist_toggle_round_trips() {
        let mut user = User::new("Dina", "dina@example.com", "0811");
        let product = Uuid::now_v7();
        assert!(user.toggle_wishlist(product));
        assert_eq!(user.wishlist, vec![product]);
        assert!(!user.toggle_wishlist(product));
        assert!(user.wishlist.is_empty());
    }

    #[test]
    fn remove_cart_line_reports_missing_lines() {
        let mut user = User::new("Dina", "dina@example.com", "0811");
        assert!(!user.remove_cart_line(Uuid::now_v7()));
    }
}
