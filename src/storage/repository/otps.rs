// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-time passcode repository.
//!
//! Each email keeps at most one code row: issuing a new code deletes the one
//! `latest_otp` pointed at before. Failed verifications are counted on the row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::credentials::normalize_email;
use crate::storage::database::{StoreRead, StoreResult, WriteTxn, LATEST_OTP, OTPS};

/// Passcode row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredOtp {
    pub id: u64,
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Wrong codes presented against this row
    #[serde(default)]
    pub attempts: u32,
}

impl StoredOtp {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether `limit` wrong guesses have used this code up.
    pub fn is_exhausted(&self, limit: u32) -> bool {
        self.attempts >= limit
    }
}

/// Repository for passcode operations.
pub struct OtpRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: StoreRead> OtpRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    /// Most recent code issued for `email`, if any.
    pub fn latest_for(&self, email: &str) -> StoreResult<Option<StoredOtp>> {
        match self.txn.index_get(LATEST_OTP, &normalize_email(email))? {
            Some(id) => self.txn.get_json(OTPS, id),
            None => Ok(None),
        }
    }
}

impl OtpRepository<'_, WriteTxn> {
    /// Store a code and make it the one that verifies for `email`,
    /// replacing any earlier code.
    pub fn issue(
        &self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<StoredOtp> {
        let email = normalize_email(email);
        if let Some(previous) = self.txn.index_get(LATEST_OTP, &email)? {
            self.txn.remove_json(OTPS, previous)?;
        }

        let otp = StoredOtp {
            id: self.txn.next_id(OTPS)?,
            email,
            code: code.to_string(),
            expires_at,
            created_at: Utc::now(),
            attempts: 0,
        };
        self.txn.put_json(OTPS, otp.id, &otp)?;
        self.txn.index_put(LATEST_OTP, &otp.email, otp.id)?;
        Ok(otp)
    }

    /// Count one wrong guess against code `id` and return the new total.
    ///
    /// Returns `None` when the row is gone, e.g. replaced by a newer code.
    pub fn record_failed_attempt(&self, id: u64) -> StoreResult<Option<u32>> {
        let Some(mut otp) = self.txn.get_json::<StoredOtp>(OTPS, id)? else {
            return Ok(None);
        };
        otp.attempts = otp.attempts.saturating_add(1);
        self.txn.put_json(OTPS, otp.id, &otp)?;
        Ok(Some(otp.attempts))
    }
}
