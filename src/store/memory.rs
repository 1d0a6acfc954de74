//! In-process document store.
//!
//! Every trait method takes the write or read lock once and releases it
//! before returning, so each call is atomic with respect to the documents it
//! touches, matching the single-document atomicity the services rely on.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::user::VoucherClaim;
use crate::domain::{Product, User, Voucher};
use crate::error::{Error, Result};

use super::{ClaimOutcome, CodeIndex, Store, VoucherQuery};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
    vouchers: HashMap<Uuid, Voucher>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_user_unique(inner: &Inner, user: &User) -> Result<()> {
    for other in inner.users.values() {
        if other.id == user.id {
            continue;
        }
        if other.email.eq_ignore_ascii_case(&user.email) {
            return Err(Error::conflict("email", &user.email));
        }
        if other.phone == user.phone {
            return Err(Error::conflict("phone", &user.phone));
        }
    }
    Ok(())
}

fn check_code_unique(inner: &Inner, voucher: &Voucher) -> Result<()> {
    for other in inner.vouchers.values() {
        if other.id != voucher.id && other.code.eq_ignore_ascii_case(&voucher.code) {
            return Err(Error::conflict("code", &voucher.code));
        }
    }
    Ok(())
}

#[async_trait]
impl CodeIndex for MemoryStore {
    async fn code_taken(&self, code: &str) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner.vouchers.values().any(|v| v.code.eq_ignore_ascii_case(code)))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<()> {
        let mut inner = self.inner.write().await;
        check_user_unique(&inner, &user)?;
        inner.users.insert(user.id, user);
        Ok(())
    }

    async fn user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn put_user(&self, user: User) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user.id) {
            return Err(Error::NotFound("user"));
        }
        check_user_unique(&inner, &user)?;
        inner.users.insert(user.id, user);
        Ok(())
    }

    async fn push_claim(&self, user_id: Uuid, voucher_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        let user = inner.users.get_mut(&user_id).ok_or(Error::NotFound("user"))?;
        if user.has_claimed(voucher_id) {
            return Err(Error::AlreadyClaimed);
        }
        user.vouchers.push(VoucherClaim {
            voucher_id,
            is_used: false,
            claimed_at: Utc::now(),
        });
        user.touch();
        Ok(())
    }

    async fn pull_claim(&self, user_id: Uuid, voucher_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.vouchers.retain(|c| c.voucher_id != voucher_id);
            user.touch();
        }
        Ok(())
    }

    async fn pull_claim_from_all(&self, voucher_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut touched = 0;
        for user in inner.users.values_mut() {
            let before = user.vouchers.len();
            user.vouchers.retain(|c| c.voucher_id != voucher_id);
            if user.vouchers.len() != before {
                user.touch();
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn insert_product(&self, product: Product) -> Result<()> {
        self.inner.write().await.products.insert(product.id, product);
        Ok(())
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn put_product(&self, product: Product) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.products.contains_key(&product.id) {
            return Err(Error::NotFound("product"));
        }
        inner.products.insert(product.id, product);
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner.write().await.products.remove(&id).is_some())
    }

    async fn adjust_stock(&self, id: Uuid, delta: i64) -> Result<Product> {
        let mut inner = self.inner.write().await;
        let product = inner.products.get_mut(&id).ok_or(Error::NotFound("product"))?;
        let adjusted = i64::from(product.stock) + delta;
        if adjusted < 0 {
            return Err(Error::InsufficientStock { available: product.stock });
        }
        product.stock = u32::try_from(adjusted)
            .map_err(|_| Error::invalid("stock adjustment out of range"))?;
        product.touch();
        Ok(product.clone())
    }

    async fn list_products(&self, limit: u32, offset: u64) -> Result<(Vec<Product>, u64)> {
        let inner = self.inner.read().await;
        let mut all: Vec<Product> = inner.products.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = all.len() as u64;
        let page = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn insert_voucher(&self, voucher: Voucher) -> Result<()> {
        let mut inner = self.inner.write().await;
        check_code_unique(&inner, &voucher)?;
        inner.vouchers.insert(voucher.id, voucher);
        Ok(())
    }

    async fn voucher(&self, id: Uuid) -> Result<Option<Voucher>> {
        Ok(self.inner.read().await.vouchers.get(&id).cloned())
    }

    async fn voucher_by_code(&self, code: &str) -> Result<Option<Voucher>> {
        let inner = self.inner.read().await;
        Ok(inner
            .vouchers
            .values()
            .find(|v| v.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn put_voucher(&self, voucher: Voucher) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.vouchers.contains_key(&voucher.id) {
            return Err(Error::NotFound("voucher"));
        }
        check_code_unique(&inner, &voucher)?;
        inner.vouchers.insert(voucher.id, voucher);
        Ok(())
    }

    async fn delete_voucher(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner.write().await.vouchers.remove(&id).is_some())
    }

    async fn list_vouchers(&self, query: &VoucherQuery, limit: u32, offset: u64) -> Result<(Vec<Voucher>, u64)> {
        let inner = self.inner.read().await;
        let title = query.title.as_deref().map(str::to_lowercase);
        let mut matched: Vec<Voucher> = inner
            .vouchers
            .values()
            .filter(|v| {
                title
                    .as_deref()
                    .map_or(true, |t| v.title.to_lowercase().contains(t))
                    && query.discount_type.map_or(true, |dt| v.discount_type == dt)
                    && query.kind.map_or(true, |k| v.kind == k)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn try_claim(&self, id: Uuid) -> Result<ClaimOutcome> {
        let mut inner = self.inner.write().await;
        let Some(voucher) = inner.vouchers.get_mut(&id) else {
            return Ok(ClaimOutcome::NotFound);
        };
        if !voucher.is_active {
            return Ok(ClaimOutcome::Inactive);
        }
        if voucher.claimed_count >= voucher.max_use {
            return Ok(ClaimOutcome::LimitReached);
        }
        voucher.claimed_count += 1;
        voucher.touch();
        Ok(ClaimOutcome::Claimed(voucher.clone()))
    }
}
