// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Foodia Server - donation and marketplace platform backend
//!
//! Detonators organize food donation campaigns, merchants supply the
//! products those campaigns order, and superadmins approve both.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers and router (Axum)
//! - `auth` - Session tokens, OTP login and role-based access control
//! - `mail` - Outbound mail queue and transports
//! - `storage` - Embedded database (redb) and uploaded media

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod mail;
pub mod models;
pub mod state;
pub mod storage;
