// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Campaign repository.
//!
//! A campaign belongs to a detonator and is created together with one order
//! per requested merchant product, all in the caller's write transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::detonators::{DetonatorDetails, DetonatorRepository};
use super::products::ProductRepository;
use super::{ApprovalStatus, Page, Paged};
use crate::storage::database::{require, StoreRead, StoreResult, WriteTxn, CAMPAIGNS, ORDERS};

/// Campaign row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StoredCampaign {
    pub id: u64,
    pub detonator_id: u64,
    pub event_name: String,
    pub event_type: String,
    pub event_date: String,
    pub event_time: String,
    pub description: String,
    pub donation_target: f64,
    pub province: String,
    pub city: String,
    pub sub_district: String,
    pub postal_code: String,
    pub address: String,
    pub latitude: String,
    pub longitude: String,
    pub image_url: String,
    pub status: ApprovalStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order placed for a product on behalf of a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StoredOrder {
    pub id: u64,
    pub campaign_id: u64,
    pub merchant_product_id: u64,
    pub order_status: ApprovalStatus,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Campaign with its detonator (and the detonator's credential) and orders.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CampaignDetails {
    #[serde(flatten)]
    pub campaign: StoredCampaign,
    pub detonator: Option<DetonatorDetails>,
    pub orders: Vec<StoredOrder>,
}

/// Campaign fields supplied on create and update.
#[derive(Debug, Clone, Default)]
pub struct CampaignInput {
    pub detonator_id: u64,
    pub event_name: String,
    pub event_type: String,
    pub event_date: String,
    pub event_time: String,
    pub description: String,
    pub donation_target: f64,
    pub province: String,
    pub city: String,
    pub sub_district: String,
    pub postal_code: String,
    pub address: String,
    pub latitude: String,
    pub longitude: String,
    pub image_url: String,
}

/// Repository for campaign operations.
pub struct CampaignRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: StoreRead> CampaignRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    /// Get a campaign by ID.
    pub fn get(&self, id: u64) -> StoreResult<StoredCampaign> {
        require(self.txn.get_json(CAMPAIGNS, id)?, format!("Campaign {id}"))
    }

    /// Orders of a campaign, oldest first.
    pub fn orders_for(&self, campaign_id: u64) -> StoreResult<Vec<StoredOrder>> {
        let mut orders: Vec<StoredOrder> = self.txn.scan_json(ORDERS)?;
        orders.retain(|o| o.campaign_id == campaign_id);
        orders.reverse();
        Ok(orders)
    }

    fn expand(&self, campaign: StoredCampaign) -> StoreResult<CampaignDetails> {
        let detonators = DetonatorRepository::new(self.txn);
        let detonator = match detonators.find(campaign.detonator_id)? {
            Some(d) => Some(detonators.expand(d)?),
            None => None,
        };
        let orders = self.orders_for(campaign.id)?;
        Ok(CampaignDetails {
            campaign,
            detonator,
            orders,
        })
    }

    /// Fetch a campaign with its relations.
    pub fn details(&self, id: u64) -> StoreResult<CampaignDetails> {
        self.expand(self.get(id)?)
    }

    /// Paginated listing, optionally restricted to one detonator, newest first.
    pub fn list(
        &self,
        detonator_id: Option<u64>,
        page: Page,
    ) -> StoreResult<Paged<CampaignDetails>> {
        let mut campaigns: Vec<StoredCampaign> = self.txn.scan_json(CAMPAIGNS)?;
        if let Some(detonator_id) = detonator_id {
            campaigns.retain(|c| c.detonator_id == detonator_id);
        }
        let paged = page.slice(campaigns);
        let items = paged
            .items
            .into_iter()
            .map(|c| self.expand(c))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Paged {
            items,
            total: paged.total,
        })
    }
}

impl CampaignRepository<'_, WriteTxn> {
    /// Create a campaign and one waiting order per product.
    ///
    /// Fails with `NotFound` if the detonator or any product is missing; the
    /// caller's transaction then holds partial writes and must not commit.
    pub fn insert(
        &self,
        input: CampaignInput,
        product_ids: &[u64],
    ) -> StoreResult<(StoredCampaign, Vec<StoredOrder>)> {
        DetonatorRepository::new(self.txn).get(input.detonator_id)?;

        let now = Utc::now();
        let campaign = StoredCampaign {
            id: self.txn.next_id(CAMPAIGNS)?,
            detonator_id: input.detonator_id,
            event_name: input.event_name,
            event_type: input.event_type,
            event_date: input.event_date,
            event_time: input.event_time,
            description: input.description,
            donation_target: input.donation_target,
            province: input.province,
            city: input.city,
            sub_district: input.sub_district,
            postal_code: input.postal_code,
            address: input.address,
            latitude: input.latitude,
            longitude: input.longitude,
            image_url: input.image_url,
            status: ApprovalStatus::Waiting,
            is_active: false,
            created_at: now,
            updated_at: now,
        };
        self.txn.put_json(CAMPAIGNS, campaign.id, &campaign)?;

        let products = ProductRepository::new(self.txn);
        let mut orders = Vec::with_capacity(product_ids.len());
        for product_id in product_ids {
            products.get(*product_id)?;
            let order = StoredOrder {
                id: self.txn.next_id(ORDERS)?,
                campaign_id: campaign.id,
                merchant_product_id: *product_id,
                order_status: ApprovalStatus::Waiting,
                note: String::new(),
                created_at: now,
                updated_at: now,
            };
            self.txn.put_json(ORDERS, order.id, &order)?;
            orders.push(order);
        }

        Ok((campaign, orders))
    }

    /// Replace the campaign's descriptive fields. Status and activity are kept.
    pub fn update(&self, id: u64, input: CampaignInput) -> StoreResult<StoredCampaign> {
        let mut campaign = self.get(id)?;
        if input.detonator_id != campaign.detonator_id {
            DetonatorRepository::new(self.txn).get(input.detonator_id)?;
        }

        campaign.detonator_id = input.detonator_id;
        campaign.event_name = input.event_name;
        campaign.event_type = input.event_type;
        campaign.event_date = input.event_date;
        campaign.event_time = input.event_time;
        campaign.description = input.description;
        campaign.donation_target = input.donation_target;
        campaign.province = input.province;
        campaign.city = input.city;
        campaign.sub_district = input.sub_district;
        campaign.postal_code = input.postal_code;
        campaign.address = input.address;
        campaign.latitude = input.latitude;
        campaign.longitude = input.longitude;
        if !input.image_url.trim().is_empty() {
            campaign.image_url = input.image_url;
        }
        campaign.updated_at = Utc::now();

        self.txn.put_json(CAMPAIGNS, id, &campaign)?;
        Ok(campaign)
    }
}
