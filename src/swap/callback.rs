// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Marker identifying a return from an external OAuth redirect.

use url::Url;

pub const REDIRECT_MARKER: &str = "oauth_redirect";

/// A return URL carrying the redirect marker. Its other query parameters
/// prefill the form when no fresh snapshot is waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectCallback {
    url: Url,
}

impl RedirectCallback {
    /// Recognise a return URL carrying `oauth_redirect=true`.
    pub fn from_url(url: &Url) -> Option<Self> {
        url.query_pairs()
            .any(|(key, value)| key == REDIRECT_MARKER && value.eq_ignore_ascii_case("true"))
            .then(|| RedirectCallback { url: url.clone() })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL the external provider should send the user back to.
    pub fn return_url(base: &Url) -> Url {
        let mut url = base.clone();
        url.query_pairs_mut().append_pair(REDIRECT_MARKER, "true");
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_is_detected() {
        let url = Url::parse("https://app.example/swap?oauth_redirect=true&code=x").unwrap();
        let callback = RedirectCallback::from_url(&url).unwrap();
        assert_eq!(callback.url(), &url);

        let plain = Url::parse("https://app.example/swap?code=x").unwrap();
        assert_eq!(RedirectCallback::from_url(&plain), None);

        let off = Url::parse("https://app.example/swap?oauth_redirect=false").unwrap();
        assert_eq!(RedirectCallback::from_url(&off), None);
    }

    #[test]
    fn return_url_round_trips() {
        let base = Url::parse("https://app.example/swap?from=ETHEREUM_SEPOLIA").unwrap();
        let url = RedirectCallback::return_url(&base);
        assert_eq!(
            url.as_str(),
            "https://app.example/swap?from=ETHEREUM_SEPOLIA&oauth_redirect=true"
        );
        assert!(RedirectCallback::from_url(&url).is_some());
    }
}
