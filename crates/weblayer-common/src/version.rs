//! Remote client version gate
//!
//! The client declares its major version once during setup. Every call site
//! that has an old and a new wire shape reads the cached value and branches;
//! there is no per-call negotiation.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::LifecycleError;
use crate::Result;

/// Major version of this implementation.
pub const IMPLEMENTATION_MAJOR_VERSION: u32 = 95;
/// Oldest client major version accepted at all.
pub const MIN_CLIENT_MAJOR_VERSION: u32 = 87;
/// How far a client may lag behind the implementation.
pub const MAX_VERSION_SKEW: u32 = 4;

/// Skew window, decided by the implementation side. Newer clients are always
/// accepted; older ones only within `max_skew`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPolicy {
    pub implementation_major: u32,
    pub min_client_major: u32,
    pub max_skew: u32,
}

impl VersionPolicy {
    pub fn is_supported(&self, client_major: u32) -> bool {
        client_major >= self.min_client_major
            && client_major.saturating_add(self.max_skew) >= self.implementation_major
    }
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self {
            implementation_major: IMPLEMENTATION_MAJOR_VERSION,
            min_client_major: MIN_CLIENT_MAJOR_VERSION,
            max_skew: MAX_VERSION_SKEW,
        }
    }
}

/// Client-visible behaviours introduced after the minimum client version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientFeature {
    /// Media stream stop from the client.
    MediaStreamControls,
    /// `on_external_intent_in_incognito`; older clients are always denied.
    IncognitoExternalIntent,
    /// `get_error_page_content` on the error page client.
    ErrorPageContent,
    /// `on_page_destroyed` on the navigation client.
    PageDestroyedNotification,
    /// `NewTabType::NewWindow`; older clients see it as a popup.
    NewWindowTabType,
    /// `NavigationFailure::Timeout`; older clients see `Other`.
    NavigationTimeoutError,
    /// `CookieChangeCause::ExpiredOverwrite`; older clients see `Overwrite`.
    ExpiredOverwriteCookieCause,
    /// `on_access_token_identified_as_invalid` on the access token client.
    InvalidAccessTokenNotification,
}

impl ClientFeature {
    pub fn min_client_major(&self) -> u32 {
        match self {
            ClientFeature::MediaStreamControls => 88,
            ClientFeature::ErrorPageContent => 89,
            ClientFeature::IncognitoExternalIntent => 89,
            ClientFeature::PageDestroyedNotification => 90,
            ClientFeature::NewWindowTabType => 90,
            ClientFeature::NavigationTimeoutError => 91,
            ClientFeature::ExpiredOverwriteCookieCause => 92,
            ClientFeature::InvalidAccessTokenNotification => 93,
        }
    }
}

#[derive(Debug, Default)]
pub struct VersionGate {
    policy: VersionPolicy,
    client_major: OnceLock<u32>,
}

impl VersionGate {
    pub fn new(policy: VersionPolicy) -> Self {
        Self {
            policy,
            client_major: OnceLock::new(),
        }
    }

    pub fn policy(&self) -> VersionPolicy {
        self.policy
    }

    /// Records the client's major version. Only the first call is accepted.
    pub fn set_client_major_version(&self, major: u32) -> Result<()> {
        self.client_major
            .set(major)
            .map_err(|_| LifecycleError::AlreadyInitialized("client major version"))?;
        tracing::info!(
            client_major = major,
            implementation_major = self.policy.implementation_major,
            "client version declared"
        );
        Ok(())
    }

    pub fn client_major_version(&self) -> Result<u32> {
        self.client_major
            .get()
            .copied()
            .ok_or(LifecycleError::NotInitialized("client major version"))
    }

    pub fn is_client_supported(&self) -> Result<bool> {
        Ok(self.policy.is_supported(self.client_major_version()?))
    }

    /// Whether the client understands `feature`. When it does not, callers
    /// skip the call or fall back to the old shape; that is never an error.
    pub fn supports(&self, feature: ClientFeature) -> Result<bool> {
        Ok(self.client_major_version()? >= feature.min_client_major())
    }

    /// Convenience for construction in tests and embedders that already know
    /// the client version.
    pub fn with_client(policy: VersionPolicy, client_major: u32) -> Self {
        let gate = Self::new(policy);
        // A fresh gate has nothing set yet.
        let _ = gate.client_major.set(client_major);
        gate
    }
}
