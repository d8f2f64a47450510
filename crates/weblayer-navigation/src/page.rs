//! Committed documents

use url::Url;

use weblayer_common::{DestroyDiscipline, HandleCell, Result};
use weblayer_native::{NativeHandle, NativeKind};

/// A committed document. Created by the controller when a navigation commits
/// and retired when the engine says the page is gone; never deleted from
/// this side.
#[derive(Debug)]
pub struct Page {
    handle: HandleCell,
    url: Url,
}

impl Page {
    pub(crate) fn new(handle: NativeHandle, url: Url) -> Self {
        Self {
            handle: HandleCell::new(
                NativeKind::Page.as_str(),
                handle,
                DestroyDiscipline::EngineOwned,
            ),
            url,
        }
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.handle.get()
    }

    /// The URL the page committed with.
    pub fn url(&self) -> Result<Url> {
        self.handle.get()?;
        Ok(self.url.clone())
    }

    pub fn is_destroyed(&self) -> bool {
        self.handle.is_destroyed()
    }

    pub(crate) fn on_engine_destroyed(&self) -> bool {
        self.handle.on_engine_destroyed()
    }
}
