//! Confirmation before leaving an incognito tab for another app

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

use weblayer_common::{
    CallbackProxy, ClientFeature, ProxyState, RemoteResult, RequestCounter, Result, VersionGate,
};
use weblayer_native::codes::external_intent_decision;
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentDecision {
    Allow,
    Deny,
}

impl IntentDecision {
    pub fn to_native(self) -> i32 {
        match self {
            IntentDecision::Allow => external_intent_decision::ALLOW,
            IntentDecision::Deny => external_intent_decision::DENY,
        }
    }
}

pub trait ExternalIntentInIncognitoClient: Send + Sync {
    fn on_external_intent_in_incognito(&self, responder: IntentDecisionResponder) -> RemoteResult;
}

struct Inner {
    proxy: CallbackProxy<dyn ExternalIntentInIncognitoClient>,
    version: Arc<VersionGate>,
    requests: RequestCounter,
}

impl Inner {
    fn decide(&self, request_id: u64, decision: IntentDecision) -> bool {
        // Only the latest prompt is still on screen.
        if !self.requests.is_current(request_id) {
            tracing::debug!(request_id, "stale external intent decision ignored");
            return false;
        }
        let handle = match self.proxy.handle() {
            Ok(handle) if self.proxy.is_active() => handle,
            _ => return false,
        };
        self.requests.invalidate();
        self.proxy
            .engine()
            .external_intent_decision(handle, request_id, decision.to_native());
        true
    }
}

pub struct IntentDecisionResponder {
    inner: Weak<Inner>,
    request_id: u64,
}

impl IntentDecisionResponder {
    pub fn respond(self, decision: IntentDecision) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.decide(self.request_id, decision),
            None => false,
        }
    }
}

pub struct ExternalIntentInIncognitoCallbackProxy {
    inner: Arc<Inner>,
}

impl ExternalIntentInIncognitoCallbackProxy {
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        version: Arc<VersionGate>,
        tab: NativeHandle,
        client: Arc<dyn ExternalIntentInIncognitoClient>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                proxy: CallbackProxy::new(
                    engine,
                    NativeKind::ExternalIntentInIncognitoCallbackProxy,
                    Some(tab),
                    client,
                ),
                version,
                requests: RequestCounter::new(),
            }),
        }
    }

    pub fn state(&self) -> ProxyState {
        self.inner.proxy.state()
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.inner.proxy.handle()
    }

    pub fn set_client(&self, client: Arc<dyn ExternalIntentInIncognitoClient>) -> Result<()> {
        self.inner.proxy.set_client(client)
    }

    /// Asks the client whether to leave incognito for an external app. Old
    /// or unreachable clients get an immediate deny.
    pub fn on_native_external_intent(&self) {
        if !self.inner.proxy.is_active() {
            return;
        }
        let request_id = self.inner.requests.next();

        let supported = self
            .inner
            .version
            .supports(ClientFeature::IncognitoExternalIntent)
            .unwrap_or(false);
        if !supported {
            self.inner.decide(request_id, IntentDecision::Deny);
            return;
        }

        let responder = IntentDecisionResponder {
            inner: Arc::downgrade(&self.inner),
            request_id,
        };
        let sent = self
            .inner
            .proxy
            .query("on_external_intent_in_incognito", move |c| {
                c.on_external_intent_in_incognito(responder)
            });
        if let Some(Err(_)) = sent {
            self.inner.decide(request_id, IntentDecision::Deny);
        }
    }

    pub fn destroy(&self) -> bool {
        self.inner.requests.invalidate();
        self.inner.proxy.destroy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use weblayer_common::VersionPolicy;
    use weblayer_native::{NativeCall, RecordingEngine};

    #[derive(Default)]
    struct Client(Mutex<Vec<IntentDecisionResponder>>);

    impl ExternalIntentInIncognitoClient for Client {
        fn on_external_intent_in_incognito(
            &self,
            responder: IntentDecisionResponder,
        ) -> RemoteResult {
            self.0.lock().push(responder);
            Ok(())
        }
    }

    fn decisions(engine: &RecordingEngine) -> Vec<i32> {
        engine
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                NativeCall::ExternalIntentDecision { decision, .. } => Some(decision),
                _ => None,
            })
            .collect()
    }

    fn setup(
        client_major: u32,
    ) -> (
        Arc<RecordingEngine>,
        ExternalIntentInIncognitoCallbackProxy,
        Arc<Client>,
    ) {
        let engine = Arc::new(RecordingEngine::new());
        let tab = engine.create(NativeKind::Tab, None);
        let version = Arc::new(VersionGate::with_client(VersionPolicy::default(), client_major));
        let client = Arc::new(Client::default());
        let proxy = ExternalIntentInIncognitoCallbackProxy::new(
            engine.clone(),
            version,
            tab,
            client.clone(),
        );
        (engine, proxy, client)
    }

    #[test]
    fn test_client_decides() {
        let (engine, proxy, client) = setup(95);
        proxy.on_native_external_intent();
        let responder = client.0.lock().pop().unwrap();
        assert!(responder.respond(IntentDecision::Allow));
        assert_eq!(decisions(&engine), vec![external_intent_decision::ALLOW]);
    }

    #[test]
    fn test_superseded_prompt_is_ignored() {
        let (engine, proxy, client) = setup(95);
        proxy.on_native_external_intent();
        proxy.on_native_external_intent();
        let newer = client.0.lock().pop().unwrap();
        let older = client.0.lock().pop().unwrap();
        assert!(!older.respond(IntentDecision::Allow));
        assert!(newer.respond(IntentDecision::Deny));
        assert_eq!(decisions(&engine), vec![external_intent_decision::DENY]);
    }

    #[test]
    fn test_old_client_is_denied() {
        let (engine, proxy, client) = setup(88);
        proxy.on_native_external_intent();
        assert!(client.0.lock().is_empty());
        assert_eq!(decisions(&engine), vec![external_intent_decision::DENY]);

        let (engine, proxy, client) = setup(89);
        proxy.on_native_external_intent();
        assert_eq!(client.0.lock().len(), 1);
        assert!(decisions(&engine).is_empty());
    }
}
