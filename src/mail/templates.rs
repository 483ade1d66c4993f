// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mail bodies.

use super::OutgoingMail;

/// Verification code email.
pub fn otp_mail(to: &str, code: &str, valid_minutes: i64) -> OutgoingMail {
    let html = format!(
        "<html><body>\
         <p>Use the code below to verify your account:</p>\
         <h2 style=\"letter-spacing:4px\">{code}</h2>\
         <p>The code expires in {valid_minutes} minutes. If you did not request it, ignore this email.</p>\
         </body></html>"
    );
    let text = format!(
        "Your verification code is {code}. It expires in {valid_minutes} minutes."
    );
    OutgoingMail {
        to: to.to_string(),
        subject: "Your verification code".to_string(),
        html,
        text,
    }
}
