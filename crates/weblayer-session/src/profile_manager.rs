//! Profile directory
//!
//! Same (name, incognito) pair, same profile object, until it is destroyed.

use std::sync::Arc;

use weblayer_common::{ObserverId, RegistryObserver};

use crate::context::SessionContext;
use crate::profile::{Profile, ProfileKey};
use crate::Result;

pub struct ProfileManager {
    ctx: Arc<SessionContext>,
}

impl ProfileManager {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    pub fn get_or_create_profile(&self, name: &str, is_incognito: bool) -> Result<Arc<Profile>> {
        let key = ProfileKey::new(name, is_incognito)?;
        if let Some(profile) = self.ctx.profiles.get(&key) {
            return Ok(profile);
        }

        let profile = Profile::new(Arc::clone(&self.ctx), key.clone());
        self.ctx.profiles.insert(key, Arc::clone(&profile))?;
        Ok(profile)
    }

    pub fn get_profile(&self, name: &str, is_incognito: bool) -> Result<Option<Arc<Profile>>> {
        let key = ProfileKey::new(name, is_incognito)?;
        Ok(self.ctx.profiles.get(&key))
    }

    /// Live profiles in creation order.
    pub fn profiles(&self) -> Vec<Arc<Profile>> {
        self.ctx.profiles.values()
    }

    pub fn add_observer(&self, observer: Arc<dyn RegistryObserver<Profile>>) -> ObserverId {
        self.ctx.profiles.add_observer(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.ctx.profiles.remove_observer(id)
    }
}
