// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Mail Dispatcher
//!
//! Bounded queue plus a background worker that delivers queued mail.
//!
//! ## Strategy
//!
//! - `enqueue` never blocks: when the queue is full the mail is dropped,
//!   logged and counted as failed.
//! - Each mail gets up to `max_attempts` delivery attempts, sleeping
//!   `retry_backoff * attempt` between them.
//! - A mail that exhausts its attempts is logged and counted as failed.
//!
//! ## Shutdown
//!
//! The worker stops on its `CancellationToken`; mail still queued at that
//! point is discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{MailTransport, OutgoingMail};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default number of delivery attempts per mail.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Queue and retry tuning.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    pub capacity: usize,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

#[derive(Debug, Default)]
struct MailStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Handle for queueing mail. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MailDispatcher {
    tx: mpsc::Sender<OutgoingMail>,
    stats: Arc<MailStats>,
}

impl MailDispatcher {
    /// Start the delivery worker and return the queue handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        transport: MailTransport,
        options: DispatchOptions,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(options.capacity.max(1));
        let stats = Arc::new(MailStats::default());

        let worker = MailWorker {
            rx,
            transport,
            options,
            stats: stats.clone(),
        };
        let handle = tokio::spawn(worker.run(shutdown));

        (Self { tx, stats }, handle)
    }

    /// Queue a mail for delivery without waiting.
    pub fn enqueue(&self, mail: OutgoingMail) {
        if let Err(e) = self.tx.try_send(mail) {
            let (reason, mail) = match e {
                mpsc::error::TrySendError::Full(mail) => ("queue full", mail),
                mpsc::error::TrySendError::Closed(mail) => ("worker stopped", mail),
            };
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            warn!(to = %mail.to, subject = %mail.subject, reason, "Dropping outgoing mail");
        }
    }

    /// Mails that were dropped or exhausted their attempts.
    pub fn failed_count(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }

    /// Mails the transport accepted.
    pub fn delivered_count(&self) -> u64 {
        self.stats.delivered.load(Ordering::Relaxed)
    }
}

struct MailWorker {
    rx: mpsc::Receiver<OutgoingMail>,
    transport: MailTransport,
    options: DispatchOptions,
    stats: Arc<MailStats>,
}

impl MailWorker {
    async fn run(mut self, shutdown: CancellationToken) {
        info!(
            transport = self.transport.name(),
            capacity = self.options.capacity,
            max_attempts = self.options.max_attempts,
            "Mail dispatcher starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(
                        delivered = self.stats.delivered.load(Ordering::Relaxed),
                        failed = self.stats.failed.load(Ordering::Relaxed),
                        "Mail dispatcher shutting down"
                    );
                    return;
                }
                next = self.rx.recv() => match next {
                    Some(mail) => self.deliver(mail, &shutdown).await,
                    None => {
                        info!(
                            delivered = self.stats.delivered.load(Ordering::Relaxed),
                            failed = self.stats.failed.load(Ordering::Relaxed),
                            "Mail queue closed, dispatcher exiting"
                        );
                        return;
                    }
                }
            }
        }
    }

    async fn deliver(&self, mail: OutgoingMail, shutdown: &CancellationToken) {
        let max_attempts = self.options.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.transport.send(&mail).await {
                Ok(()) => {
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                    info!(to = %mail.to, attempt, "Mail delivered");
                    return;
                }
                Err(e) => {
                    warn!(to = %mail.to, attempt, max_attempts, error = %e, "Mail delivery failed");
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    _ = tokio::time::sleep(self.options.retry_backoff * attempt) => {},
                    _ = shutdown.cancelled() => break,
                }
            }
        }

        self.stats.failed.fetch_add(1, Ordering::Relaxed);
        warn!(to = %mail.to, subject = %mail.subject, "Giving up on mail");
    }
}
