// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{AuthService, TokenCodec};
use crate::config::AppConfig;
use crate::mail::MailDispatcher;
use crate::storage::{Database, MediaStore};

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<Database>,
    pub codec: Arc<TokenCodec>,
    pub auth: AuthService,
    pub media: MediaStore,
    pub mail: MailDispatcher,
}

impl AppState {
    pub fn new(config: AppConfig, db: Database, media: MediaStore, mail: MailDispatcher) -> Self {
        let db = Arc::new(db);
        let codec = Arc::new(TokenCodec::new(
            config.jwt_secret.as_bytes(),
            config.session_ttl,
            config.refresh_window,
        ));
        let auth = AuthService::new(
            db.clone(),
            codec.clone(),
            mail.clone(),
            config.otp_ttl,
            config.bcrypt_cost,
        );

        Self {
            config: Arc::new(config),
            db,
            codec,
            auth,
            media,
            mail,
        }
    }
}
