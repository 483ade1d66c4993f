// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Outbound Mail
//!
//! OTP emails are handed to a [`MailDispatcher`] after the passcode is
//! committed. A background worker delivers them through a [`MailTransport`]:
//!
//! - `Http`: transactional mail JSON API (`api-key` header)
//! - `Log`: writes the mail to the log instead of sending it
//! - `Memory`: keeps mails in memory, for tests and local runs
//!
//! Delivery failures never reach the request that produced the mail.

pub mod dispatcher;
pub mod http;
pub mod templates;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

pub use dispatcher::{DispatchOptions, MailDispatcher};
pub use http::HttpMailer;

/// A rendered email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("mail API rejected message (status={status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("simulated delivery failure")]
    Simulated,
}

/// In-memory outbox. Can be told to fail a number of attempts first.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutbox {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
    failures_remaining: Arc<AtomicU32>,
    attempts: Arc<AtomicU32>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outbox whose next `failures` delivery attempts fail.
    pub fn failing(failures: u32) -> Self {
        let outbox = Self::default();
        outbox.failures_remaining.store(failures, Ordering::SeqCst);
        outbox
    }

    /// Mails delivered so far.
    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }

    /// Delivery attempts so far, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(MailError::Simulated);
        }
        self.sent.lock().await.push(mail.clone());
        Ok(())
    }
}

/// Where outgoing mail goes.
#[derive(Debug, Clone)]
pub enum MailTransport {
    Http(HttpMailer),
    Log,
    Memory(MemoryOutbox),
}

impl MailTransport {
    pub fn name(&self) -> &'static str {
        match self {
            MailTransport::Http(_) => "http",
            MailTransport::Log => "log",
            MailTransport::Memory(_) => "memory",
        }
    }

    pub async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        match self {
            MailTransport::Http(mailer) => mailer.send(mail).await,
            MailTransport::Log => {
                tracing::info!(
                    to = %mail.to,
                    subject = %mail.subject,
                    "Mail transport not configured, mail not sent"
                );
                tracing::debug!(to = %mail.to, body = %mail.text, "Unsent mail body");
                Ok(())
            }
            MailTransport::Memory(outbox) => outbox.deliver(mail).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> OutgoingMail {
        OutgoingMail {
            to: "a@x.com".into(),
            subject: "s".into(),
            html: "<p>h</p>".into(),
            text: "h".into(),
        }
    }

    #[tokio::test]
    async fn memory_outbox_records_mail() {
        let outbox = MemoryOutbox::new();
        let transport = MailTransport::Memory(outbox.clone());
        transport.send(&mail()).await.unwrap();
        assert_eq!(outbox.sent().await, vec![mail()]);
        assert_eq!(outbox.attempts(), 1);
    }

    #[tokio::test]
    async fn failing_outbox_recovers_after_budget() {
        let outbox = MemoryOutbox::failing(2);
        let transport = MailTransport::Memory(outbox.clone());
        assert!(transport.send(&mail()).await.is_err());
        assert!(transport.send(&mail()).await.is_err());
        assert!(transport.send(&mail()).await.is_ok());
        assert_eq!(outbox.attempts(), 3);
        assert_eq!(outbox.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn log_transport_always_succeeds() {
        assert!(MailTransport::Log.send(&mail()).await.is_ok());
        assert_eq!(MailTransport::Log.name(), "log");
    }
    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn log_transport_keeps_codes_out_of_info_output() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mail = templates::otp_mail("a@x.com", "482913", 5);
        MailTransport::Log.send(&mail).await.unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("mail not sent"));
        assert!(!output.contains("482913"));
    }
}
