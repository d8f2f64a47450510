//! Per-profile prerender scheduling

use std::sync::Arc;

use weblayer_common::{DestroyDiscipline, HandleCell};
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

use crate::error::parse_url;
use crate::Result;

pub struct PrerenderController {
    handle: HandleCell,
    engine: Arc<dyn NativeEngine>,
}

impl PrerenderController {
    pub(crate) fn new(engine: Arc<dyn NativeEngine>, profile: NativeHandle) -> Self {
        let handle = engine.create(NativeKind::PrerenderController, Some(profile));
        Self {
            handle: HandleCell::new(
                NativeKind::PrerenderController.as_str(),
                handle,
                DestroyDiscipline::Idempotent,
            ),
            engine,
        }
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        Ok(self.handle.get()?)
    }

    pub fn schedule_prerender(&self, url: &str) -> Result<()> {
        let handle = self.handle.get()?;
        let url = parse_url(url)?;
        tracing::debug!(url = %url, "prerender scheduled");
        self.engine.schedule_prerender(handle, url.as_str());
        Ok(())
    }

    pub fn destroy(&self) -> bool {
        match self.handle.release() {
            Ok(Some(handle)) => {
                self.engine.delete(NativeKind::PrerenderController, handle);
                true
            }
            Ok(None) | Err(_) => false,
        }
    }
}

impl std::fmt::Debug for PrerenderController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrerenderController")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
