// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

/// Authentication error type.
///
/// `AuthBootstrapFailed` and `SessionExpired` are fatal to the submit attempt
/// that triggered them; nothing in this crate retries them automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Guest connect failed while a protected action needed a session
    #[error("Could not start a guest session: {0}")]
    AuthBootstrapFailed(String),

    /// A signed-in session expired; it is never swapped for a guest one
    #[error("Your session has expired, please sign in again")]
    SessionExpired,

    /// Transport or HTTP status failure talking to the identity service
    #[error("Identity request failed: {0}")]
    Request(String),

    /// Identity service answered with something unusable
    #[error("Identity response was invalid: {0}")]
    InvalidResponse(String),
}
