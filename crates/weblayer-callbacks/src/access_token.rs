//! OAuth access token requests, per profile
//!
//! The engine asks for a token with a request id; the client answers through
//! a one-shot responder. A request is answered at most once, and requests
//! still pending at destroy are dropped.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

use weblayer_common::{
    CallbackProxy, ClientFeature, ProxyState, RemoteResult, Result, VersionGate,
};
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

pub trait AccessTokenClient: Send + Sync {
    fn fetch_access_token(
        &self,
        scopes: Vec<String>,
        responder: AccessTokenResponder,
    ) -> RemoteResult;

    fn on_access_token_identified_as_invalid(
        &self,
        scopes: Vec<String>,
        token: String,
    ) -> RemoteResult;
}

struct Inner {
    proxy: CallbackProxy<dyn AccessTokenClient>,
    version: Arc<VersionGate>,
    pending: Mutex<HashSet<u64>>,
}

impl Inner {
    fn respond(&self, request_id: u64, token: &str) -> bool {
        if !self.pending.lock().remove(&request_id) {
            tracing::debug!(request_id, "access token response for unknown request");
            return false;
        }
        let handle = match self.proxy.handle() {
            Ok(handle) => handle,
            Err(_) => return false,
        };
        self.proxy
            .engine()
            .access_token_fetched(handle, request_id, token);
        true
    }
}

pub struct AccessTokenResponder {
    inner: Weak<Inner>,
    request_id: u64,
}

impl AccessTokenResponder {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Delivers the token (empty for "no token"). Returns false when the
    /// fetcher is gone or the request was already answered.
    pub fn respond(self, token: impl AsRef<str>) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.respond(self.request_id, token.as_ref()),
            None => false,
        }
    }
}

pub struct AccessTokenFetcherProxy {
    inner: Arc<Inner>,
}

impl AccessTokenFetcherProxy {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        version: Arc<VersionGate>,
        profile: NativeHandle,
        client: Arc<dyn AccessTokenClient>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                proxy: CallbackProxy::new(
                    engine,
                    NativeKind::AccessTokenFetcherProxy,
                    Some(profile),
                    client,
                ),
                version,
                pending: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn state(&self) -> ProxyState {
        self.inner.proxy.state()
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.inner.proxy.handle()
    }

    pub fn set_client(&self, client: Arc<dyn AccessTokenClient>) -> Result<()> {
        self.inner.proxy.set_client(client)
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn on_native_fetch_access_token(&self, request_id: u64, scopes: Vec<String>) {
        if !self.inner.proxy.is_active() {
            return;
        }
        self.inner.pending.lock().insert(request_id);

        let responder = AccessTokenResponder {
            inner: Arc::downgrade(&self.inner),
            request_id,
        };
        let sent = self.inner.proxy.query("fetch_access_token", move |c| {
            c.fetch_access_token(scopes, responder)
        });
        if let Some(Err(_)) = sent {
            // Nobody will answer; unblock the engine with an empty token.
            self.inner.respond(request_id, "");
        }
    }

    pub fn on_native_access_token_invalid(&self, scopes: Vec<String>, token: String) {
        if !self
            .inner
            .version
            .supports(ClientFeature::InvalidAccessTokenNotification)
            .unwrap_or(false)
        {
            return;
        }
        self.inner
            .proxy
            .notify("on_access_token_identified_as_invalid", move |c| {
                c.on_access_token_identified_as_invalid(scopes, token)
            });
    }

    pub fn destroy(&self) -> bool {
        self.inner.pending.lock().clear();
        self.inner.proxy.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weblayer_common::{RemoteError, VersionPolicy};
    use weblayer_native::{NativeCall, RecordingEngine};

    #[derive(Default)]
    struct Client {
        responders: Mutex<Vec<AccessTokenResponder>>,
        invalid: Mutex<Vec<String>>,
        offline: bool,
    }

    impl AccessTokenClient for Client {
        fn fetch_access_token(
            &self,
            _scopes: Vec<String>,
            responder: AccessTokenResponder,
        ) -> RemoteResult {
            if self.offline {
                return Err(RemoteError::Disconnected);
            }
            self.responders.lock().push(responder);
            Ok(())
        }

        fn on_access_token_identified_as_invalid(
            &self,
            _scopes: Vec<String>,
            token: String,
        ) -> RemoteResult {
            self.invalid.lock().push(token);
            Ok(())
        }
    }

    fn setup(
        client: Arc<Client>,
        client_major: u32,
    ) -> (Arc<RecordingEngine>, AccessTokenFetcherProxy) {
        let engine = Arc::new(RecordingEngine::new());
        let profile = engine.create(NativeKind::Profile, None);
        let version = Arc::new(VersionGate::with_client(VersionPolicy::default(), client_major));
        let proxy = AccessTokenFetcherProxy::new(engine.clone(), version, profile, client);
        (engine, proxy)
    }

    fn fetched(engine: &RecordingEngine) -> Vec<(u64, String)> {
        engine
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                NativeCall::AccessTokenFetched {
                    request_id, token, ..
                } => Some((request_id, token)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_response_is_delivered_once() {
        let client = Arc::new(Client::default());
        let (engine, proxy) = setup(client.clone(), 95);

        proxy.on_native_fetch_access_token(11, vec!["email".to_string()]);
        assert_eq!(proxy.pending_requests(), 1);

        let responder = client.responders.lock().pop().unwrap();
        assert!(responder.respond("token"));
        assert_eq!(fetched(&engine), vec![(11, "token".to_string())]);
        assert_eq!(proxy.pending_requests(), 0);
    }

    #[test]
    fn test_unreachable_client_gets_empty_token() {
        let client = Arc::new(Client {
            offline: true,
            ..Default::default()
        });
        let (engine, proxy) = setup(client, 95);
        proxy.on_native_fetch_access_token(3, vec![]);
        assert_eq!(fetched(&engine), vec![(3, String::new())]);
    }

    #[test]
    fn test_destroy_drops_pending() {
        let client = Arc::new(Client::default());
        let (engine, proxy) = setup(client.clone(), 95);
        proxy.on_native_fetch_access_token(5, vec![]);
        proxy.destroy();

        let responder = client.responders.lock().pop().unwrap();
        assert!(!responder.respond("late"));
        assert!(fetched(&engine).is_empty());
    }

    #[test]
    fn test_invalid_token_is_version_gated() {
        let client = Arc::new(Client::default());
        let (_, old) = setup(client.clone(), 92);
        old.on_native_access_token_invalid(vec![], "t1".to_string());
        let (_, current) = setup(client.clone(), 93);
        current.on_native_access_token_invalid(vec![], "t2".to_string());
        assert_eq!(*client.invalid.lock(), vec!["t2".to_string()]);
    }
}
