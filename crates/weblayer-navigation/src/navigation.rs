//! One load attempt

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

use weblayer_common::{
    ClientFeature, DestroyDiscipline, HandleCell, LifecycleError, VersionGate,
};
use weblayer_native::codes::navigation_error;
use weblayer_native::{NativeEngine, NativeHandle, NativeKind};

use crate::error::NavigationError;
use crate::headers::{validate_header_name, validate_header_value};
use crate::page::Page;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationState {
    Started,
    Redirected,
    ReadyToCommit,
    Completed,
    Failed,
}

impl NavigationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationState::Started => "started",
            NavigationState::Redirected => "redirected",
            NavigationState::ReadyToCommit => "ready_to_commit",
            NavigationState::Completed => "completed",
            NavigationState::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, NavigationState::Completed | NavigationState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationFailure {
    Connectivity,
    Ssl,
    Http,
    Timeout,
    Other,
}

impl NavigationFailure {
    pub fn from_native(code: i32) -> std::result::Result<Self, LifecycleError> {
        match code {
            navigation_error::CONNECTIVITY => Ok(NavigationFailure::Connectivity),
            navigation_error::SSL => Ok(NavigationFailure::Ssl),
            navigation_error::HTTP => Ok(NavigationFailure::Http),
            navigation_error::TIMEOUT => Ok(NavigationFailure::Timeout),
            navigation_error::OTHER => Ok(NavigationFailure::Other),
            value => Err(LifecycleError::UnmappedValue {
                kind: "navigation error",
                value,
            }),
        }
    }

    /// Older clients have no `Timeout` and get `Other`.
    pub fn for_client(self, version: &VersionGate) -> std::result::Result<Self, LifecycleError> {
        if self == NavigationFailure::Timeout
            && !version.supports(ClientFeature::NavigationTimeoutError)?
        {
            return Ok(NavigationFailure::Other);
        }
        Ok(self)
    }
}

/// Outcome of external intent interception for one navigation start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterceptDecision {
    NoDecision,
    IntentLaunched,
    UserDecidingIntentLaunch,
    Inert,
}

#[derive(Debug)]
struct NavigationInner {
    state: NavigationState,
    url: Url,
    redirect_chain: Vec<Url>,
    http_status_code: Option<i32>,
    failure: Option<NavigationFailure>,
    is_error_page: bool,
    decision: InterceptDecision,
    page: Option<Arc<Page>>,
}

pub struct Navigation {
    id: i64,
    handle: HandleCell,
    engine: Arc<dyn NativeEngine>,
    has_user_gesture: bool,
    is_same_document: bool,
    started_at: DateTime<Utc>,
    inner: Mutex<NavigationInner>,
}

impl Navigation {
    pub(crate) fn new(
        engine: Arc<dyn NativeEngine>,
        id: i64,
        handle: NativeHandle,
        url: Url,
        has_user_gesture: bool,
        is_same_document: bool,
    ) -> Self {
        Self {
            id,
            handle: HandleCell::new(
                NativeKind::Navigation.as_str(),
                handle,
                DestroyDiscipline::EngineOwned,
            ),
            engine,
            has_user_gesture,
            is_same_document,
            started_at: Utc::now(),
            inner: Mutex::new(NavigationInner {
                state: NavigationState::Started,
                redirect_chain: vec![url.clone()],
                url,
                http_status_code: None,
                failure: None,
                is_error_page: false,
                decision: InterceptDecision::NoDecision,
                page: None,
            }),
        }
    }

    fn check(&self) -> Result<NativeHandle> {
        Ok(self.handle.get()?)
    }

    pub fn id(&self) -> Result<i64> {
        self.check()?;
        Ok(self.id)
    }

    pub fn handle(&self) -> Result<NativeHandle> {
        self.check()
    }

    pub fn state(&self) -> Result<NavigationState> {
        self.check()?;
        Ok(self.inner.lock().state)
    }

    pub fn url(&self) -> Result<Url> {
        self.check()?;
        Ok(self.inner.lock().url.clone())
    }

    pub fn redirect_chain(&self) -> Result<Vec<Url>> {
        self.check()?;
        Ok(self.inner.lock().redirect_chain.clone())
    }

    pub fn http_status_code(&self) -> Result<Option<i32>> {
        self.check()?;
        Ok(self.inner.lock().http_status_code)
    }

    pub fn failure(&self) -> Result<Option<NavigationFailure>> {
        self.check()?;
        Ok(self.inner.lock().failure)
    }

    pub fn is_error_page(&self) -> Result<bool> {
        self.check()?;
        Ok(self.inner.lock().is_error_page)
    }

    pub fn has_user_gesture(&self) -> Result<bool> {
        self.check()?;
        Ok(self.has_user_gesture)
    }

    pub fn is_same_document(&self) -> Result<bool> {
        self.check()?;
        Ok(self.is_same_document)
    }

    pub fn started_at(&self) -> Result<DateTime<Utc>> {
        self.check()?;
        Ok(self.started_at)
    }

    pub fn intercept_decision(&self) -> Result<InterceptDecision> {
        self.check()?;
        Ok(self.inner.lock().decision)
    }

    pub fn was_intent_launched(&self) -> Result<bool> {
        Ok(self.intercept_decision()? == InterceptDecision::IntentLaunched)
    }

    pub fn is_user_deciding_intent_launch(&self) -> Result<bool> {
        Ok(self.intercept_decision()? == InterceptDecision::UserDecidingIntentLaunch)
    }

    /// The committed page. `None` until the navigation completes, and for
    /// failures that did not show an error page.
    pub fn page(&self) -> Result<Option<Arc<Page>>> {
        self.check()?;
        Ok(self.inner.lock().page.clone())
    }

    /// Records the interception outcome. Only one decision is recorded per
    /// navigation so later queries stay stable.
    pub fn record_intercept_decision(&self, decision: InterceptDecision) -> Result<()> {
        self.check()?;
        if decision == InterceptDecision::NoDecision {
            return Err(LifecycleError::InvalidArgument(
                "NoDecision cannot be recorded".to_string(),
            )
            .into());
        }

        let mut inner = self.inner.lock();
        if inner.decision != InterceptDecision::NoDecision {
            return Err(LifecycleError::InvalidState(format!(
                "navigation {} already has intercept decision {:?}",
                self.id, inner.decision
            ))
            .into());
        }
        inner.decision = decision;
        tracing::debug!(
            navigation_id = self.id,
            decision = ?decision,
            "intercept decision recorded"
        );
        Ok(())
    }

    /// Adds a request header. Only before the request leaves, i.e. while
    /// started or redirected.
    pub fn set_request_header(&self, name: &str, value: &str) -> Result<()> {
        let handle = self.check()?;
        validate_header_name(name)?;
        validate_header_value(value)?;

        let state = self.inner.lock().state;
        if !matches!(state, NavigationState::Started | NavigationState::Redirected) {
            return Err(NavigationError::WrongState {
                operation: "set_request_header",
                state: state.as_str(),
            });
        }
        self.engine.set_request_header(handle, name, value);
        Ok(())
    }

    /// Overrides the user agent. Only from the start notification.
    pub fn set_user_agent_string(&self, value: &str) -> Result<()> {
        let handle = self.check()?;
        validate_header_value(value)?;

        let state = self.inner.lock().state;
        if state != NavigationState::Started {
            return Err(NavigationError::WrongState {
                operation: "set_user_agent_string",
                state: state.as_str(),
            });
        }
        self.engine.set_user_agent_string(handle, value);
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.handle.is_destroyed()
    }

    pub(crate) fn raw_id(&self) -> i64 {
        self.id
    }

    pub(crate) fn redirect(&self, url: Url) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            NavigationState::Started | NavigationState::Redirected => {
                inner.state = NavigationState::Redirected;
                inner.redirect_chain.push(url.clone());
                inner.url = url;
                Ok(())
            }
            other => Err(self.out_of_order("redirect", other)),
        }
    }

    pub(crate) fn ready_to_commit(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            NavigationState::Started | NavigationState::Redirected => {
                inner.state = NavigationState::ReadyToCommit;
                Ok(())
            }
            other => Err(self.out_of_order("ready_to_commit", other)),
        }
    }

    pub(crate) fn complete(&self, page: Arc<Page>, http_status_code: Option<i32>) -> Result<()> {
        let mut inner = self.inner.lock();
        let allowed = match inner.state {
            NavigationState::ReadyToCommit => true,
            // Same-document navigations commit without a ready-to-commit step.
            NavigationState::Started => self.is_same_document,
            _ => false,
        };
        if !allowed {
            return Err(self.out_of_order("complete", inner.state));
        }
        inner.state = NavigationState::Completed;
        inner.page = Some(page);
        inner.http_status_code = http_status_code;
        Ok(())
    }

    pub(crate) fn fail(
        &self,
        failure: NavigationFailure,
        http_status_code: Option<i32>,
        error_page: Option<Arc<Page>>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state.is_finished() {
            return Err(self.out_of_order("fail", inner.state));
        }
        inner.state = NavigationState::Failed;
        inner.failure = Some(failure);
        inner.http_status_code = http_status_code;
        inner.is_error_page = error_page.is_some();
        inner.page = error_page;
        Ok(())
    }

    pub(crate) fn on_engine_destroyed(&self) -> bool {
        self.handle.on_engine_destroyed()
    }

    fn out_of_order(&self, event: &'static str, state: NavigationState) -> NavigationError {
        tracing::error!(
            navigation_id = self.id,
            event,
            state = state.as_str(),
            "out of order navigation event"
        );
        NavigationError::WrongState {
            operation: event,
            state: state.as_str(),
        }
    }
}

impl std::fmt::Debug for Navigation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigation")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weblayer_common::VersionPolicy;
    use weblayer_native::{NativeCall, RecordingEngine};

    fn navigation(same_document: bool) -> (Arc<RecordingEngine>, Navigation) {
        let engine = Arc::new(RecordingEngine::new());
        let handle = engine.mint(NativeKind::Navigation);
        let nav = Navigation::new(
            engine.clone(),
            1,
            handle,
            Url::parse("https://example.com/").unwrap(),
            true,
            same_document,
        );
        (engine, nav)
    }

    fn page(engine: &RecordingEngine) -> Arc<Page> {
        Arc::new(Page::new(
            engine.mint(NativeKind::Page),
            Url::parse("https://example.com/").unwrap(),
        ))
    }

    #[test]
    fn test_state_machine() {
        let (engine, nav) = navigation(false);
        nav.redirect(Url::parse("https://example.com/a").unwrap()).unwrap();
        nav.redirect(Url::parse("https://example.com/b").unwrap()).unwrap();
        assert_eq!(nav.redirect_chain().unwrap().len(), 3);

        // Cannot complete before ready to commit.
        assert!(nav.complete(page(&engine), Some(200)).is_err());
        nav.ready_to_commit().unwrap();
        nav.complete(page(&engine), Some(200)).unwrap();
        assert_eq!(nav.state().unwrap(), NavigationState::Completed);
        assert!(nav.fail(NavigationFailure::Other, None, None).is_err());
        assert!(nav.redirect(Url::parse("https://x.test/").unwrap()).is_err());
    }

    #[test]
    fn test_same_document_commits_directly() {
        let (engine, nav) = navigation(true);
        nav.complete(page(&engine), None).unwrap();
        assert!(nav.page().unwrap().is_some());
    }

    #[test]
    fn test_header_rules() {
        let (engine, nav) = navigation(false);
        nav.set_user_agent_string("Custom/1.0").unwrap();
        nav.set_request_header("X-Test", "1").unwrap();
        assert!(matches!(
            nav.set_request_header("bad name", "1"),
            Err(NavigationError::InvalidHeader(_))
        ));

        nav.redirect(Url::parse("https://example.com/r").unwrap()).unwrap();
        assert!(matches!(
            nav.set_user_agent_string("Late/1.0"),
            Err(NavigationError::WrongState { .. })
        ));
        nav.set_request_header("X-Test", "2").unwrap();

        nav.ready_to_commit().unwrap();
        assert!(nav.set_request_header("X-Test", "3").is_err());
        assert_eq!(
            engine.count(|c| matches!(c, NativeCall::SetRequestHeader { .. })),
            2
        );
    }

    #[test]
    fn test_intercept_decision_recorded_once() {
        let (_, nav) = navigation(false);
        assert!(!nav.was_intent_launched().unwrap());
        nav.record_intercept_decision(InterceptDecision::UserDecidingIntentLaunch)
            .unwrap();
        assert!(nav.is_user_deciding_intent_launch().unwrap());
        assert!(nav
            .record_intercept_decision(InterceptDecision::IntentLaunched)
            .is_err());
        assert!(nav.is_user_deciding_intent_launch().unwrap());
    }

    #[test]
    fn test_every_accessor_fails_after_engine_destroy() {
        let (_, nav) = navigation(false);
        assert!(nav.on_engine_destroyed());

        assert!(nav.id().unwrap_err().is_use_after_destroy());
        assert!(nav.handle().unwrap_err().is_use_after_destroy());
        assert!(nav.state().unwrap_err().is_use_after_destroy());
        assert!(nav.url().unwrap_err().is_use_after_destroy());
        assert!(nav.redirect_chain().unwrap_err().is_use_after_destroy());
        assert!(nav.http_status_code().unwrap_err().is_use_after_destroy());
        assert!(nav.failure().unwrap_err().is_use_after_destroy());
        assert!(nav.is_error_page().unwrap_err().is_use_after_destroy());
        assert!(nav.has_user_gesture().unwrap_err().is_use_after_destroy());
        assert!(nav.is_same_document().unwrap_err().is_use_after_destroy());
        assert!(nav.started_at().unwrap_err().is_use_after_destroy());
        assert!(nav.intercept_decision().unwrap_err().is_use_after_destroy());
        assert!(nav.was_intent_launched().unwrap_err().is_use_after_destroy());
        assert!(nav
            .is_user_deciding_intent_launch()
            .unwrap_err()
            .is_use_after_destroy());
        assert!(nav.page().unwrap_err().is_use_after_destroy());
        assert!(nav
            .record_intercept_decision(InterceptDecision::Inert)
            .unwrap_err()
            .is_use_after_destroy());
        assert!(nav
            .set_request_header("a", "b")
            .unwrap_err()
            .is_use_after_destroy());
        assert!(nav
            .set_user_agent_string("ua")
            .unwrap_err()
            .is_use_after_destroy());
    }

    #[test]
    fn test_failure_translation() {
        assert_eq!(
            NavigationFailure::from_native(navigation_error::SSL).unwrap(),
            NavigationFailure::Ssl
        );
        assert!(NavigationFailure::from_native(0).is_err());

        let old = VersionGate::with_client(VersionPolicy::default(), 90);
        let new = VersionGate::with_client(VersionPolicy::default(), 91);
        assert_eq!(
            NavigationFailure::Timeout.for_client(&old).unwrap(),
            NavigationFailure::Other
        );
        assert_eq!(
            NavigationFailure::Timeout.for_client(&new).unwrap(),
            NavigationFailure::Timeout
        );
    }
}
