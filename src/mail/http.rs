// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transactional mail over an HTTP JSON API.

use serde::Serialize;

use super::{MailError, OutgoingMail};
use crate::config::MailApiConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody<'a> {
    sender: EmailAddress<'a>,
    to: Vec<EmailAddress<'a>>,
    subject: &'a str,
    html_content: &'a str,
    text_content: &'a str,
}

/// Client for the mail API.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailApiConfig,
}

impl HttpMailer {
    pub fn new(config: MailApiConfig) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent(concat!("foodia-server/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    pub async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let body = SendEmailBody {
            sender: EmailAddress {
                email: &self.config.sender_email,
                name: self.config.sender_name.as_deref(),
            },
            to: vec![EmailAddress {
                email: &mail.to,
                name: None,
            }],
            subject: &mail.subject,
            html_content: &mail.html,
            text_content: &mail.text,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
