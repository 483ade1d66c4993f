// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Multipart form reading for registration, profile update and media upload.

use std::collections::HashMap;

use axum::{body::Bytes, extract::Multipart};
use validator::ValidateEmail;

use crate::{
    error::ApiError,
    state::AppState,
    storage::{repository::ProfileChanges, MediaDestination},
};

/// A file part of a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Text fields and files of a multipart body, keyed by field name.
#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl Form {
    /// Drain the multipart stream. File parts with no content are dropped.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Form::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await?;
                    if !bytes.is_empty() {
                        form.files.insert(name, UploadedFile { file_name, bytes });
                    }
                }
                None => {
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// Trimmed text field, empty when absent.
    pub fn text(&mut self, name: &str) -> String {
        self.fields
            .remove(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    /// Trimmed text field, `None` when absent or blank.
    pub fn optional(&mut self, name: &str) -> Option<String> {
        Some(self.text(name)).filter(|v| !v.is_empty())
    }

    pub fn file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    pub fn require_file(&mut self, name: &str) -> Result<UploadedFile, ApiError> {
        self.file(name)
            .ok_or_else(|| ApiError::bad_request(format!("{name} is required")))
    }
}

/// Save an uploaded photo, removing `already_saved` files on failure.
pub async fn save_photo(
    state: &AppState,
    destination: MediaDestination,
    file: &UploadedFile,
    already_saved: &[String],
) -> Result<String, ApiError> {
    match state
        .media
        .save(destination, &file.file_name, &file.bytes)
        .await
    {
        Ok(path) => Ok(path),
        Err(e) => {
            discard_media(state, already_saved).await;
            Err(e.into())
        }
    }
}

pub async fn discard_media(state: &AppState, paths: &[String]) {
    for path in paths {
        state.media.remove(path).await;
    }
}

/// Credential fields shared by the merchant and detonator update forms.
pub async fn profile_changes(
    state: &AppState,
    form: &mut Form,
) -> Result<ProfileChanges, ApiError> {
    let email = form.optional("email");
    if let Some(email) = &email {
        if !email.validate_email() {
            return Err(ApiError::bad_request("email is not a valid address"));
        }
    }
    let password_hash = match form.optional("password") {
        Some(password) => Some(state.auth.hash_password(&password).await?),
        None => None,
    };
    Ok(ProfileChanges {
        fullname: form.optional("fullname"),
        email,
        phone: form.optional("phone"),
        password_hash,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::{body::Body, extract::FromRequest, http::Request};

    async fn form_of(body: Vec<u8>) -> Form {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", content_type())
            .body(Body::from(body))
            .unwrap();
        let multipart = Multipart::from_request(request, &()).await.unwrap();
        Form::read(multipart).await.unwrap()
    }

    #[tokio::test]
    async fn reads_fields_and_files() {
        let body = multipart_body(
            &[("fullname", "  Ayu  "), ("city", "")],
            &[("self_photo", "me.png", &b"png"[..]), ("ktp_photo", "empty.png", &b""[..])],
        );
        let mut form = form_of(body).await;

        assert_eq!(form.text("fullname"), "Ayu");
        assert_eq!(form.optional("city"), None);
        assert_eq!(form.text("missing"), "");

        let photo = form.require_file("self_photo").unwrap();
        assert_eq!(photo.file_name, "me.png");
        assert_eq!(&photo.bytes[..], &b"png"[..]);

        // empty file parts count as absent
        assert!(form.require_file("ktp_photo").is_err());
    }
}
