// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session handling for the swap flow.
//!
//! ## Auth Flow
//!
//! 1. A protected action (swap creation) calls
//!    [`AuthSessionBootstrapper::ensure_session`]
//! 2. A live session in [`SessionState`] is returned as is
//! 3. Otherwise a guest session is requested from the identity service
//!    (`POST /connect/token`, `grant_type=credentialless`) and stored
//! 4. The session's access token is sent as a bearer credential on backend
//!    calls
//!
//! Signed-in sessions are never downgraded: when one expires the caller gets
//! [`AuthError::SessionExpired`] instead of a guest token.

pub mod bootstrap;
pub mod error;
pub mod identity;
pub mod session;

pub use bootstrap::AuthSessionBootstrapper;
pub use error::AuthError;
pub use identity::{AuthService, IdentityClient};
pub use session::{AuthSession, SessionKind, SessionState};
