// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use foodia_server::{
    api::router,
    config::{AppConfig, LOG_FORMAT_ENV},
    logging::init_logging,
    mail::{DispatchOptions, HttpMailer, MailDispatcher, MailTransport},
    state::AppState,
    storage::{Database, MediaStore},
};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server terminated");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    if config.ephemeral_secret {
        tracing::warn!("JWT_SECRET is not set; using a random secret, sessions will not survive a restart");
    }

    let db = Database::open(&config.database_path())?;
    tracing::info!(path = %config.database_path().display(), "Database opened");

    let media = MediaStore::new(&config.media_dir);
    media.initialize().await?;

    let transport = match config.mail.clone() {
        Some(mail_config) => MailTransport::Http(HttpMailer::new(mail_config)?),
        None => {
            tracing::warn!("Mail API not configured; verification codes will only be logged");
            MailTransport::Log
        }
    };
    let shutdown = CancellationToken::new();
    let (mail, mail_worker) =
        MailDispatcher::spawn(transport, DispatchOptions::default(), shutdown.clone());

    let seed_admin = config.seed_admin.clone();
    let bind_addr = config.bind_addr();
    let state = AppState::new(config, db, media, mail);

    if let Some(seed) = seed_admin {
        if state.auth.ensure_superadmin(&seed.email, &seed.password).await? {
            tracing::info!(email = %seed.email, "Seeded superadmin account");
        }
    }

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "Foodia server listening (docs at /docs)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = mail_worker.await {
        tracing::warn!(error = %e, "Mail worker did not stop cleanly");
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
