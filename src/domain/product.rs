//! Catalog item and the filter set shared by cart and wishlist reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub description: Option<String>,
    /// Price in minor currency units.
    pub price: i64,
    /// Promotional price; when present it must be strictly below `price`.
    pub discount_price: Option<i64>,
    pub stock: u32,
    pub image_urls: Vec<String>,
    pub tags: Vec<String>,
    pub gender: Option<Gender>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Men,
    Women,
    Kids,
    Unisex,
}

impl Product {
    pub fn new(name: impl Into<String>, brand: impl Into<String>, category: impl Into<String>, price: i64, stock: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            brand: brand.into(),
            category: category.into(),
            description: None,
            price,
            discount_price: None,
            stock,
            image_urls: vec![],
            tags: vec![],
            gender: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Checks the pricing invariants: positive price, and a promotional
    /// price that is positive and strictly below the regular price.
    pub fn validate(&self) -> Result<()> {
        if self.price <= 0 {
            return Err(Error::invalid("price must be greater than 0"));
        }
        if let Some(dp) = self.discount_price {
            if dp <= 0 {
                return Err(Error::invalid("discount price must be greater than 0"));
            }
            if dp >= self.price {
                return Err(Error::invalid("discount price must be below the regular price"));
            }
        }
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Optional filter set applied to expanded cart and wishlist reads.
/// Name, brand and category match as case-insensitive substrings; gender
/// matches exactly.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub gender: Option<Gender>,
}

impl ProductFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.brand.is_none() && self.category.is_none() && self.gender.is_none()
    }

    pub fn matches(&self, product: &Product) -> bool {
        fn contains_ci(haystack: &str, needle: &str) -> bool {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        }

        if let Some(name) = &self.name {
            if !contains_ci(&product.name, name) {
                return false;
            }
        }
        if let Some(brand) = &self.brand {
            if !contains_ci(&product.brand, brand) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !contains_ci(&product.category, category) {
                return false;
            }
        }
        if let Some(gender) = self.gender {
            if product.gender != Some(gender) {
                return false;
            }
        }
        true
    }
}
