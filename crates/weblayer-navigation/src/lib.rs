//! WebLayer Navigation
//!
//! Per tab:
//! - [`NavigationController`]: back/forward commands, the navigation id map
//!   and the page dedup map
//! - [`Navigation`]: one load attempt, retired by the engine
//! - [`Page`]: one committed document, shared by every navigation that
//!   references the same native page
//!
//! Navigation states: `Started → Redirected* → ReadyToCommit → Completed | Failed`

mod controller;
mod error;
mod headers;
mod navigation;
mod page;

pub use controller::{
    ExternalIntentHandler, NavigateParams, NavigationClient, NavigationController,
};
pub use error::NavigationError;
pub use headers::{validate_header_name, validate_header_value};
pub use navigation::{InterceptDecision, Navigation, NavigationFailure, NavigationState};
pub use page::Page;

pub type Result<T> = std::result::Result<T, NavigationError>;
