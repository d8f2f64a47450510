//! Google account sign-in header handling

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use weblayer_common::{CallbackProxy, ProxyState, RemoteResult, Result};
use weblayer_native::codes::google_account_service;
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoogleAccountServiceType {
    Signout,
    AddSession,
    Default,
}

impl GoogleAccountServiceType {
    /// Unknown codes land in `Default`; newer engines add service types
    /// that older clients treat as a plain account action.
    pub fn from_native(code: i32) -> Self {
        match code {
            google_account_service::SIGNOUT => GoogleAccountServiceType::Signout,
            google_account_service::ADD_SESSION => GoogleAccountServiceType::AddSession,
            google_account_service::DEFAULT => GoogleAccountServiceType::Default,
            other => {
                tracing::warn!(code = other, "unknown google account service type");
                GoogleAccountServiceType::Default
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleAccountsParams {
    pub service_type: GoogleAccountServiceType,
    pub email: String,
    pub continue_url: Option<Url>,
    pub is_same_tab: bool,
}

pub trait GoogleAccountsClient: Send + Sync {
    fn on_google_accounts_action(&self, params: GoogleAccountsParams) -> RemoteResult;
    fn gaia_id(&self) -> RemoteResult<String>;
}

pub struct GoogleAccountsCallbackProxy {
    proxy: CallbackProxy<dyn GoogleAccountsClient>,
}

impl GoogleAccountsCallbackProxy {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        tab: NativeHandle,
        client: Arc<dyn GoogleAccountsClient>,
    ) -> Self {
        Self {
            proxy: CallbackProxy::new(
                engine,
                NativeKind::GoogleAccountsCallbackProxy,
                Some(tab),
                client,
            ),
        }
    }

    pub fn state(&self) -> ProxyState {
        self.proxy.state()
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.proxy.handle()
    }

    pub fn set_client(&self, client: Arc<dyn GoogleAccountsClient>) -> Result<()> {
        self.proxy.set_client(client)
    }

    pub fn on_native_accounts_action(
        &self,
        service_type: i32,
        email: &str,
        continue_url: &str,
        is_same_tab: bool,
    ) {
        let continue_url = if continue_url.is_empty() {
            None
        } else {
            match Url::parse(continue_url) {
                Ok(url) => Some(url),
                Err(err) => {
                    tracing::warn!(error = %err, "dropping malformed continue url");
                    None
                }
            }
        };

        let params = GoogleAccountsParams {
            service_type: GoogleAccountServiceType::from_native(service_type),
            email: email.to_string(),
            continue_url,
            is_same_tab,
        };
        self.proxy
            .notify("on_google_accounts_action", move |c| c.on_google_accounts_action(params));
    }

    /// The signed-in account id, or empty when unknown.
    pub fn on_native_gaia_id(&self) -> String {
        match self.proxy.query("gaia_id", |c| c.gaia_id()) {
            Some(Ok(id)) => id,
            Some(Err(_)) | None => String::new(),
        }
    }

    pub fn destroy(&self) -> bool {
        self.proxy.destroy()
    }
}
