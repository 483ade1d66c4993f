// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state of the platform:
//!
//! - [`database`]: embedded redb database holding credentials, passcodes and
//!   every platform resource, with all-or-nothing write transactions
//! - [`repository`]: typed access per entity, over a read or write transaction
//! - [`media`]: uploaded identity documents and images on the filesystem
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   platform.redb     # All structured data
//! {MEDIA_DIR}/
//!   campaign/ merchant/ detonator/ product/
//! ```

pub mod database;
pub mod media;
pub mod repository;

pub use database::{Database, ReadTxn, StoreError, StoreRead, StoreResult, WriteTxn};
pub use media::{MediaDestination, MediaError, MediaStore};
pub use repository::{ApprovalStatus, Page, Paged};
