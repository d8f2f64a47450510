//! WebLayer Native Surface
//!
//! The engine is only ever seen through opaque handles. Every object the
//! managed side asks the engine to create is paired with exactly one delete;
//! objects the engine creates on its own (navigations, pages, downloads,
//! popup tabs) are announced by handle and retired by the engine.

pub mod codes;
mod engine;
mod handle;
mod recording;

pub use engine::{NativeEngine, NativeNavigateParams};
pub use handle::{NativeHandle, NativeKind};
pub use recording::{NativeCall, RecordingEngine};
