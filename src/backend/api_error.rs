// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error object returned by the swap backend.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownErrorCode {
    InvalidCredentials,
    InsufficientFunds,
    FundsOnHold,
    AuthorizationLimitExceeded,
    InvalidSecondFactor,
    ActiveSwapLimitExceeded,
    NetworkAccountAlreadyExists,
    BlacklistedAddress,
    InvalidAddress,
    UnactivatedAddress,
}

impl KnownErrorCode {
    pub const ALL: [KnownErrorCode; 10] = [
        KnownErrorCode::InvalidCredentials,
        KnownErrorCode::InsufficientFunds,
        KnownErrorCode::FundsOnHold,
        KnownErrorCode::AuthorizationLimitExceeded,
        KnownErrorCode::InvalidSecondFactor,
        KnownErrorCode::ActiveSwapLimitExceeded,
        KnownErrorCode::NetworkAccountAlreadyExists,
        KnownErrorCode::BlacklistedAddress,
        KnownErrorCode::InvalidAddress,
        KnownErrorCode::UnactivatedAddress,
    ];

    /// Wire value.
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            KnownErrorCode::InsufficientFunds => "INSUFFICIENT_FUNDS",
            KnownErrorCode::FundsOnHold => "FUNDS_ON_HOLD_ERROR",
            KnownErrorCode::AuthorizationLimitExceeded => "COINBASE_AUTHORIZATION_LIMIT_EXCEEDED",
            KnownErrorCode::InvalidSecondFactor => "COINBASE_INVALID_2FA",
            KnownErrorCode::ActiveSwapLimitExceeded => "ACTIVE_SWAP_LIMIT_EXCEEDED",
            KnownErrorCode::NetworkAccountAlreadyExists => "NETWORK_ACCOUNT_ALREADY_EXISTS",
            KnownErrorCode::BlacklistedAddress => "BLACKLISTED_ADDRESS",
            KnownErrorCode::InvalidAddress => "INVALID_ADDRESS_ERROR",
            KnownErrorCode::UnactivatedAddress => "UNACTIVATED_ADDRESS_ERROR",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|known| known.as_str() == code)
    }
}

/// Either a recognised code or the raw string the server sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    Known(KnownErrorCode),
    Unrecognized(String),
}

impl ErrorCode {
    pub fn known(&self) -> Option<KnownErrorCode> {
        match self {
            ErrorCode::Known(code) => Some(*code),
            ErrorCode::Unrecognized(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::Known(code) => code.as_str(),
            ErrorCode::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for ErrorCode {
    fn from(raw: String) -> Self {
        match KnownErrorCode::parse(&raw) {
            Some(code) => ErrorCode::Known(code),
            None => ErrorCode::Unrecognized(raw),
        }
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

impl From<KnownErrorCode> for ErrorCode {
    fn from(code: KnownErrorCode) -> Self {
        ErrorCode::Known(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is(&self, code: KnownErrorCode) -> bool {
        self.code.known() == Some(code)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_parse_from_wire_values() {
        for code in KnownErrorCode::ALL {
            assert_eq!(KnownErrorCode::parse(code.as_str()), Some(code));
        }
        assert_eq!(KnownErrorCode::parse("FUNDS_ON_HOLD"), None);
    }

    #[test]
    fn unrecognized_codes_pass_through() {
        let err: ApiError =
            serde_json::from_str(r#"{"code":"SOMETHING_NEW","message":"try later"}"#).unwrap();
        assert_eq!(err.code, ErrorCode::Unrecognized("SOMETHING_NEW".to_string()));
        assert_eq!(err.code.known(), None);
        assert_eq!(
            serde_json::to_value(&err).unwrap()["code"],
            serde_json::json!("SOMETHING_NEW")
        );
    }

    #[test]
    fn unactivated_address_carries_app_url() {
        let err: ApiError = serde_json::from_str(
            r#"{"code":"UNACTIVATED_ADDRESS_ERROR","message":"https://example/connect"}"#,
        )
        .unwrap();
        assert!(err.is(KnownErrorCode::UnactivatedAddress));
        assert_eq!(err.message, "https://example/connect");
        assert_eq!(
            err.to_string(),
            "UNACTIVATED_ADDRESS_ERROR: https://example/connect"
        );
    }
}
