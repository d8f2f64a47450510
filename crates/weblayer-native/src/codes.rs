//! Integer codes used by the engine for values that cross the boundary.
//!
//! The managed side translates these with explicit tables; a value outside a
//! table is an engine/embedder mismatch, not something to guess at.

pub mod new_tab {
    pub const FOREGROUND_TAB: i32 = 0;
    pub const BACKGROUND_TAB: i32 = 1;
    pub const NEW_POPUP: i32 = 2;
    pub const NEW_WINDOW: i32 = 3;
}

pub mod google_account_service {
    pub const SIGNOUT: i32 = 0;
    pub const ADD_SESSION: i32 = 1;
    pub const DEFAULT: i32 = 2;
}

pub mod navigation_error {
    pub const CONNECTIVITY: i32 = 1;
    pub const SSL: i32 = 2;
    pub const HTTP: i32 = 3;
    pub const TIMEOUT: i32 = 4;
    pub const OTHER: i32 = 5;
}

pub mod cookie_change_cause {
    pub const INSERTED: i32 = 0;
    pub const EXPLICIT: i32 = 1;
    pub const UNKNOWN_DELETION: i32 = 2;
    pub const OVERWRITE: i32 = 3;
    pub const EXPIRED: i32 = 4;
    pub const EVICTED: i32 = 5;
    pub const EXPIRED_OVERWRITE: i32 = 6;
}

pub mod external_intent_decision {
    pub const ALLOW: i32 = 0;
    pub const DENY: i32 = 1;
}

pub mod download_state {
    pub const IN_PROGRESS: i32 = 0;
    pub const COMPLETE: i32 = 1;
    pub const FAILED: i32 = 2;
    pub const CANCELLED: i32 = 3;
    pub const PAUSED: i32 = 4;
}

pub mod download_error {
    pub const NONE: i32 = 0;
    pub const SERVER_ERROR: i32 = 1;
    pub const SSL_ERROR: i32 = 2;
    pub const CONNECTIVITY_ERROR: i32 = 3;
    pub const NO_SPACE: i32 = 4;
    pub const FILE_ERROR: i32 = 5;
    pub const CANCELLED: i32 = 6;
    pub const OTHER: i32 = 7;
}

pub mod browsing_data {
    pub const COOKIES_AND_SITE_DATA: i32 = 0;
    pub const CACHE: i32 = 1;
    pub const SITE_SETTINGS: i32 = 2;
}
