//! WebLayer Session
//!
//! The session tree: `Profile → Browser → Tab → NavigationController`.
//! - [`ProfileManager`]: one profile per (name, incognito) pair
//! - [`Profile`]: cookie manager, prerender controller, per-profile
//!   download and access token proxies, data deletion
//! - [`Browser`]: shares a profile, owns tabs and the active tab
//! - [`Tab`]: process-unique id, navigation controller, feature proxies
//!
//! Teardown always runs children first, then the registry broadcast (object
//! still readable), then the native delete.

mod browser;
mod context;
mod cookie_manager;
mod error;
mod prerender;
mod profile;
mod profile_manager;
mod proxy_slot;
mod tab;

#[cfg(test)]
mod testing;

pub use browser::{Browser, BrowserClient, BrowserOptions};
pub use context::{BrowserList, SessionContext};
pub use cookie_manager::{CookieChangeCause, CookieChangeListener, CookieManager, ListenerId};
pub use error::SessionError;
pub use prerender::PrerenderController;
pub use profile::{BrowsingDataType, Profile, ProfileKey};
pub use profile_manager::ProfileManager;
pub use tab::{Tab, TabClient};

pub type Result<T> = std::result::Result<T, SessionError>;
