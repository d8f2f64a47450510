//! Root object
//!
//! Owns the runtime behind blocking work, the UI task queue, the engine and
//! every process-wide service. Construct it on the thread that will act as
//! the UI sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use weblayer_common::{TaskRunner, VersionGate};
use weblayer_download::DownloadRegistry;
use weblayer_native::NativeEngine;
use weblayer_session::{Browser, BrowserOptions, Profile, ProfileManager, SessionContext};
use weblayer_storage::Database;

use crate::config::Config;
use crate::crash_reporter::CrashReporterController;
use crate::engine::EngineRegistry;
use crate::error::CoreError;
use crate::Result;

pub struct WebLayer {
    config: Config,
    engine: Arc<dyn NativeEngine>,
    version: Arc<VersionGate>,
    tasks: Arc<TaskRunner>,
    downloads: Arc<DownloadRegistry>,
    profiles: ProfileManager,
    crash_reporter: CrashReporterController,
    shut_down: AtomicBool,
    // Must stay the last field.
    runtime: tokio::runtime::Runtime,
}

impl WebLayer {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_engine_registry(config, &EngineRegistry::default())
    }

    pub fn with_engine_registry(config: Config, engines: &EngineRegistry) -> Result<Self> {
        config.validate()?;

        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.crash_dump_dir)?;
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("weblayer-worker")
            .enable_all()
            .build()?;

        let engine = engines.create(&config)?;
        let version = Arc::new(VersionGate::new(config.version_policy));
        let tasks = Arc::new(TaskRunner::new(runtime.handle().clone()));
        let downloads = Arc::new(DownloadRegistry::new(Database::open(&config.database_path)?)?);
        let ctx = SessionContext::new(
            Arc::clone(&engine),
            Arc::clone(&version),
            Arc::clone(&tasks),
            Arc::clone(&downloads),
        );
        let crash_reporter = CrashReporterController::new(
            config.crash_dump_dir.clone(),
            Arc::clone(&engine),
            Arc::clone(&tasks),
        );

        tracing::info!(
            data_dir = %config.data_dir.display(),
            engine = %config.engine,
            "WebLayer created"
        );

        Ok(Self {
            config,
            engine,
            version,
            tasks,
            downloads,
            profiles: ProfileManager::new(ctx),
            crash_reporter,
            shut_down: AtomicBool::new(false),
            runtime,
        })
    }

    /// Accepts the client's major version. An unsupported client is
    /// rejected without recording anything, so it may retry with another
    /// version.
    pub fn initialize(&self, client_major: u32) -> Result<()> {
        self.ensure_running()?;
        let policy = self.version.policy();
        if !policy.is_supported(client_major) {
            tracing::error!(
                client_major,
                implementation_major = policy.implementation_major,
                "unsupported client version"
            );
            return Err(CoreError::UnsupportedClient {
                client_major,
                implementation_major: policy.implementation_major,
            });
        }

        self.version.set_client_major_version(client_major)?;
        tracing::info!(client_major, "WebLayer initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.version.client_major_version().is_ok()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(CoreError::ShutDown);
        }
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        self.ensure_running()?;
        if !self.is_initialized() {
            return Err(CoreError::NotInitialized);
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    pub fn version(&self) -> &Arc<VersionGate> {
        &self.version
    }

    pub fn tasks(&self) -> &Arc<TaskRunner> {
        &self.tasks
    }

    pub fn runtime(&self) -> &tokio::runtime::Handle {
        self.runtime.handle()
    }

    pub fn downloads(&self) -> &Arc<DownloadRegistry> {
        &self.downloads
    }

    pub fn profile_manager(&self) -> Result<&ProfileManager> {
        self.ensure_ready()?;
        Ok(&self.profiles)
    }

    pub fn crash_reporter(&self) -> Result<&CrashReporterController> {
        self.ensure_ready()?;
        Ok(&self.crash_reporter)
    }

    pub fn get_or_create_profile(&self, name: &str, is_incognito: bool) -> Result<Arc<Profile>> {
        self.ensure_ready()?;
        Ok(self.profiles.get_or_create_profile(name, is_incognito)?)
    }

    pub fn create_browser(
        &self,
        profile_name: &str,
        is_incognito: bool,
        options: BrowserOptions,
    ) -> Result<Arc<Browser>> {
        let profile = self.get_or_create_profile(profile_name, is_incognito)?;
        Ok(Browser::create(&profile, options)?)
    }

    /// Live browsers in creation order.
    pub fn browsers(&self) -> Vec<Arc<Browser>> {
        self.profiles.context().browser_list().values()
    }

    /// Runs queued UI tasks, including replies from finished workers.
    pub fn run_until_idle(&self) -> usize {
        self.tasks.run_until_idle()
    }

    /// Destroys every browser, then every profile. Later calls are no-ops.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        for browser in self.browsers() {
            if let Err(err) = browser.destroy() {
                tracing::error!(error = %err, "browser destroy failed during shutdown");
            }
        }
        for profile in self.profiles.profiles() {
            let Ok(name) = profile.name() else {
                continue;
            };
            if let Err(err) = profile.destroy() {
                tracing::error!(
                    profile = %name,
                    error = %err,
                    "profile destroy failed during shutdown"
                );
            }
        }
        self.crash_reporter.shutdown();
        tracing::info!("WebLayer shut down");
        Ok(())
    }
}

impl Drop for WebLayer {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::error!(error = %err, "shutdown on drop failed");
        }
    }
}
