// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Merchant product repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ApprovalStatus, Page, Paged};
use crate::storage::database::{require, StoreRead, StoreResult, WriteTxn, MERCHANTS, PRODUCTS};

/// Image attached to a product.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ProductImage {
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// Product row. Images are embedded in the row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StoredProduct {
    pub id: u64,
    pub merchant_id: u64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub qty: u32,
    pub status: ApprovalStatus,
    pub is_active: bool,
    pub images: Vec<ProductImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product fields supplied on create and update.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub merchant_id: u64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub qty: u32,
    pub images: Vec<String>,
}

fn images_from(urls: Vec<String>, now: DateTime<Utc>) -> Vec<ProductImage> {
    urls.into_iter()
        .map(|image_url| ProductImage {
            image_url,
            created_at: now,
        })
        .collect()
}

/// Repository for product operations.
pub struct ProductRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: StoreRead> ProductRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    /// Get a product by ID.
    pub fn get(&self, id: u64) -> StoreResult<StoredProduct> {
        require(self.txn.get_json(PRODUCTS, id)?, format!("Product {id}"))
    }

    /// Every product of a merchant, newest first.
    pub fn all_for_merchant(&self, merchant_id: u64) -> StoreResult<Vec<StoredProduct>> {
        let mut products: Vec<StoredProduct> = self.txn.scan_json(PRODUCTS)?;
        products.retain(|p| p.merchant_id == merchant_id);
        Ok(products)
    }

    /// Paginated listing, optionally restricted to one merchant.
    pub fn list(&self, merchant_id: Option<u64>, page: Page) -> StoreResult<Paged<StoredProduct>> {
        let mut products: Vec<StoredProduct> = self.txn.scan_json(PRODUCTS)?;
        if let Some(merchant_id) = merchant_id {
            products.retain(|p| p.merchant_id == merchant_id);
        }
        Ok(page.slice(products))
    }

    fn ensure_merchant(&self, merchant_id: u64) -> StoreResult<()> {
        let merchant: Option<serde_json::Value> = self.txn.get_json(MERCHANTS, merchant_id)?;
        require(merchant, format!("Merchant {merchant_id}")).map(|_| ())
    }
}

impl ProductRepository<'_, WriteTxn> {
    /// Create a product for an existing merchant.
    pub fn insert(&self, input: ProductInput) -> StoreResult<StoredProduct> {
        self.ensure_merchant(input.merchant_id)?;

        let now = Utc::now();
        let product = StoredProduct {
            id: self.txn.next_id(PRODUCTS)?,
            merchant_id: input.merchant_id,
            name: input.name,
            description: input.description,
            price: input.price,
            qty: input.qty,
            status: ApprovalStatus::Waiting,
            is_active: false,
            images: images_from(input.images, now),
            created_at: now,
            updated_at: now,
        };
        self.txn.put_json(PRODUCTS, product.id, &product)?;
        Ok(product)
    }

    /// Replace the product's fields. Images are replaced only when new ones are given.
    pub fn update(&self, id: u64, input: ProductInput) -> StoreResult<StoredProduct> {
        let mut product = self.get(id)?;
        if input.merchant_id != product.merchant_id {
            self.ensure_merchant(input.merchant_id)?;
        }

        let now = Utc::now();
        product.merchant_id = input.merchant_id;
        product.name = input.name;
        product.description = input.description;
        product.price = input.price;
        product.qty = input.qty;
        if !input.images.is_empty() {
            product.images = images_from(input.images, now);
        }
        product.updated_at = now;

        self.txn.put_json(PRODUCTS, id, &product)?;
        Ok(product)
    }
}

#[cfg(test)]
pub(crate) fn product_input(merchant_id: u64, name: &str, images: &[&str]) -> ProductInput {
    ProductInput {
        merchant_id,
        name: name.into(),
        description: "Rice box".into(),
        price: 25_000.0,
        qty: 10,
        images: images.iter().map(|s| s.to_string()).collect(),
    }
}
