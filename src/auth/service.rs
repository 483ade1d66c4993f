// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication service: password login, passcode issuance and passcode login.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ring::rand::SystemRandom;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::AuthError;
use super::otp::{codes_match, generate_code};
use super::password::{hash_password_blocking, verify_password_blocking};
use super::roles::{Role, RoleProfile};
use super::token::TokenCodec;
use crate::mail::{templates::otp_mail, MailDispatcher};
use crate::storage::repository::{
    CredentialRepository, DetonatorRepository, MerchantRepository, NewCredential,
    OtpRepository, StoredCredential, StoredOtp,
};
use crate::storage::{ApprovalStatus, Database, WriteTxn};

/// Wrong codes accepted against one passcode before it stops verifying.
pub const MAX_OTP_ATTEMPTS: u32 = 5;

/// Role-specific extension summary returned with a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleExtension {
    /// Merchant or detonator ID
    pub id: u64,
    pub status: ApprovalStatus,
    pub note: String,
}

/// Result of a successful login or passcode verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub fullname: String,
    pub phone: String,
    pub email: String,
    pub role: Role,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Merchant or detonator record; absent for administrators
    pub user: Option<RoleExtension>,
}

/// Verifies credentials and passcodes and opens sessions.
#[derive(Clone)]
pub struct AuthService {
    db: Arc<Database>,
    codec: Arc<TokenCodec>,
    mail: MailDispatcher,
    rng: SystemRandom,
    otp_ttl: Duration,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(
        db: Arc<Database>,
        codec: Arc<TokenCodec>,
        mail: MailDispatcher,
        otp_ttl: Duration,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            db,
            codec,
            mail,
            rng: SystemRandom::new(),
            otp_ttl,
            bcrypt_cost,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Hash a password with the configured cost.
    pub async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        hash_password_blocking(password.to_string(), self.bcrypt_cost).await
    }

    fn credential_by_email(&self, email: &str) -> Result<StoredCredential, AuthError> {
        let read = self.db.begin_read()?;
        CredentialRepository::new(&read)
            .find_by_email(email)?
            .ok_or_else(|| AuthError::NotFound("Credential".into()))
    }

    /// Log in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let credential = self.credential_by_email(email)?;

        let matches =
            verify_password_blocking(password.to_string(), credential.password_hash.clone())
                .await?;
        if !matches {
            tracing::info!(credential_id = credential.id, "Login rejected: bad password");
            return Err(AuthError::BadCredentials);
        }

        self.open_session(credential)
    }

    /// Generate and store a passcode inside the caller's write transaction.
    ///
    /// The mail is not sent here; call [`AuthService::dispatch_otp`] once the
    /// transaction has committed.
    pub fn stage_otp(&self, txn: &WriteTxn, email: &str) -> Result<StoredOtp, AuthError> {
        let code = generate_code(&self.rng)?;
        let expires_at = Utc::now() + self.otp_ttl;
        Ok(OtpRepository::new(txn).issue(email, &code, expires_at)?)
    }

    /// Queue the passcode mail. Delivery failures are logged and counted by
    /// the dispatcher and never reach the caller.
    pub fn dispatch_otp(&self, otp: &StoredOtp) {
        self.mail
            .enqueue(otp_mail(&otp.email, &otp.code, self.otp_ttl.num_minutes()));
    }

    /// Issue a fresh passcode for a registered email.
    pub fn issue_otp(&self, email: &str) -> Result<(), AuthError> {
        let txn = self.db.begin_write()?;
        if CredentialRepository::new(&txn).find_by_email(email)?.is_none() {
            return Err(AuthError::NotFound("Credential".into()));
        }
        let otp = self.stage_otp(&txn, email)?;
        txn.commit()?;

        tracing::info!(otp_id = otp.id, "Issued verification code");
        self.dispatch_otp(&otp);
        Ok(())
    }

    /// Log in with the most recent passcode for an email.
    pub fn verify_otp(&self, email: &str, code: &str) -> Result<AuthResponse, AuthError> {
        let (credential, otp) = {
            let read = self.db.begin_read()?;
            let credential = CredentialRepository::new(&read)
                .find_by_email(email)?
                .ok_or_else(|| AuthError::NotFound("Credential".into()))?;
            let otp = OtpRepository::new(&read)
                .latest_for(email)?
                .ok_or_else(|| AuthError::NotFound("Verification code".into()))?;
            (credential, otp)
        };

        if otp.is_exhausted(MAX_OTP_ATTEMPTS) {
            return Err(AuthError::TooManyAttempts);
        }
        if !codes_match(&otp.code, code.trim()) {
            self.record_failed_attempt(otp.id)?;
            return Err(AuthError::CodeMismatch);
        }
        if otp.is_expired_at(Utc::now()) {
            return Err(AuthError::CodeExpired);
        }

        self.open_session(credential)
    }

    fn record_failed_attempt(&self, otp_id: u64) -> Result<(), AuthError> {
        let txn = self.db.begin_write()?;
        let attempts = OtpRepository::new(&txn).record_failed_attempt(otp_id)?;
        txn.commit()?;

        if attempts == Some(MAX_OTP_ATTEMPTS) {
            tracing::warn!(otp_id, "Verification code locked after repeated wrong attempts");
        }
        Ok(())
    }

    /// Create the bootstrap superadmin if no credential uses its email yet.
    ///
    /// Returns `true` when a credential was created.
    pub async fn ensure_superadmin(&self, email: &str, password: &str) -> Result<bool, AuthError> {
        if self.credential_by_email(email).is_ok() {
            return Ok(false);
        }
        let password_hash = self.hash_password(password).await?;

        let txn = self.db.begin_write()?;
        let repo = CredentialRepository::new(&txn);
        if repo.find_by_email(email)?.is_some() {
            return Ok(false);
        }
        repo.insert(NewCredential {
            fullname: "Super Admin".into(),
            email: email.to_string(),
            phone: String::new(),
            password_hash,
            role: Role::SuperAdmin,
        })?;
        txn.commit()?;
        Ok(true)
    }

    fn open_session(&self, credential: StoredCredential) -> Result<AuthResponse, AuthError> {
        let user = self.role_extension(&credential)?;
        let issued = self.codec.issue_for_role(credential.id, credential.role)?;

        tracing::info!(
            credential_id = credential.id,
            role = %credential.role,
            "Session issued"
        );

        Ok(AuthResponse {
            fullname: credential.fullname,
            phone: credential.phone,
            email: credential.email,
            role: credential.role,
            token: issued.token,
            expires_at: issued.expires_at,
            user,
        })
    }

    fn role_extension(
        &self,
        credential: &StoredCredential,
    ) -> Result<Option<RoleExtension>, AuthError> {
        let read = self.db.begin_read()?;
        let extension = match credential.role.profile() {
            RoleProfile::Merchant => MerchantRepository::new(&read)
                .find_by_credential(credential.id)?
                .map(|m| RoleExtension {
                    id: m.id,
                    status: m.status,
                    note: m.note,
                }),
            RoleProfile::Detonator => DetonatorRepository::new(&read)
                .find_by_credential(credential.id)?
                .map(|d| RoleExtension {
                    id: d.id,
                    status: d.status,
                    note: d.note,
                }),
            RoleProfile::None => None,
        };
        Ok(extension)
    }
}
