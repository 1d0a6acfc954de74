//! Wishlist: a toggle-based membership set of products per user, with the
//! same dangling-reference repair as the cart.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Product, ProductFilter, User};
use crate::error::{Error, Result};
use crate::store::Store;

#[derive(Clone)]
pub struct WishlistService {
    store: Arc<dyn Store>,
}

#[derive(Clone, Debug, Serialize)]
pub struct WishlistToggle {
    /// True when the toggle added the product, false when it removed it.
    pub added: bool,
    pub wishlist: Vec<Product>,
}

impl WishlistService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Expands the wishlist to product details, pruning entries whose
    /// product no longer exists and persisting the pruned set.
    async fn load(&self, user_id: Uuid) -> Result<(User, Vec<Product>)> {
        let mut user = self.store.user(user_id).await?.ok_or(Error::NotFound("user"))?;
        let mut products = Vec::with_capacity(user.wishlist.len());
        for product_id in &user.wishlist {
            if let Some(product) = self.store.product(*product_id).await? {
                products.push(product);
            } else {
                tracing::debug!(user_id = %user_id, product_id = %product_id, "pruning dangling wishlist entry");
            }
        }
        if products.len() != user.wishlist.len() {
            user.wishlist = products.iter().map(|p| p.id).collect();
            user.touch();
            self.store.put_user(user.clone()).await?;
        }
        Ok((user, products))
    }

    /// Adds the product when absent, removes it when present. Two toggles
    /// in a row return the wishlist to its original state.
    pub async fn toggle(&self, user_id: Uuid, product_id: Uuid) -> Result<WishlistToggle> {
        if self.store.product(product_id).await?.is_none() {
            return Err(Error::NotFound("product"));
        }
        let mut user = self.store.user(user_id).await?.ok_or(Error::NotFound("user"))?;
        let added = user.toggle_wishlist(product_id);
        user.touch();
        self.store.put_user(user).await?;

        let (_, wishlist) = self.load(user_id).await?;
        Ok(WishlistToggle { added, wishlist })
    }

    pub async fn get(&self, user_id: Uuid, filter: &ProductFilter) -> Result<Vec<Product>> {
        let (_, products) = self.load(user_id).await?;
        if filter.is_empty() {
            return Ok(products);
        }
        Ok(products.into_iter().filter(|p| filter.matches(p)).collect())
    }

    /// Wishlist size after pruning dangling references, mirroring the cart
    /// count's self-heal policy.
    pub async fn count(&self, user_id: Uuid) -> Result<usize> {
        let (_, products) = self.load(user_id).await?;
        Ok(products.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn setup() -> (WishlistService, Arc<MemoryStore>, Uuid, Product) {
        let store = Arc::new(MemoryStore::new());
        let svc = WishlistService::new(store.clone());
        let user = User::new("Dina", "dina@example.com", "0811");
        let user_id = user.id;
        store.insert_user(user).await.unwrap();
        let product = Product::new("Air Runner", "Velox", "shoes", 250_000, 5);
        store.insert_product(product.clone()).await.unwrap();
        (svc, store, user_id, product)
    }

    #[tokio::test]
    async fn double_toggle_restores_the_original_state() {
        let (svc, _, user, product) = setup().await;
        let first = svc.toggle(user, product.id).await.unwrap();
        assert!(first.added);
        assert_eq!(first.wishlist.len(), 1);

        let second = svc.toggle(user, product.id).await.unwrap();
        assert!(!second.added);
        assert!(second.wishlist.is_empty());
    }

    #[tokio::test]
    async fn toggle_requires_an_existing_product() {
        let (svc, _, user, _) = setup().await;
        assert!(matches!(
            svc.toggle(user, Uuid::now_v7()).await,
            Err(Error::NotFound("product"))
        ));
    }

    #[tokio::test]
    async fn count_prunes_dangling_entries_and_persists() {
        let (svc, store, user, product) = setup().await;
        let other = Product::new("Trail Cap", "Summit", "hats", 90_000, 3);
        store.insert_product(other.clone()).await.unwrap();
        svc.toggle(user, product.id).await.unwrap();
        svc.toggle(user, other.id).await.unwrap();

        store.delete_product(product.id).await.unwrap();

        assert_eq!(svc.count(user).await.unwrap(), 1);
        let stored = store.user(user).await.unwrap().unwrap();
        assert_eq!(stored.wishlist, vec![other.id]);
    }

    #[tokio::test]
    async fn filters_apply_to_the_expanded_wishlist() {
        let (svc, store, user, product) = setup().await;
        let other = Product::new("Trail Cap", "Summit", "hats", 90_000, 3);
        store.insert_product(other.clone()).await.unwrap();
        svc.toggle(user, product.id).await.unwrap();
        svc.toggle(user, other.id).await.unwrap();

        let filter = ProductFilter { name: Some("cap".into()), ..Default::default() };
        let hits = svc.get(user, &filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, other.id);
    }
}
