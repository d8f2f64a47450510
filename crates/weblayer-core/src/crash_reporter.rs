//! Crash reports left behind by the engine
//!
//! Each crash is a `<local_id>.dmp` minidump in the crash dump directory,
//! optionally next to a `<local_id>.json` object of string crash keys. All
//! file access and uploads run on blocking workers; results come back on the
//! UI sequence.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use weblayer_common::{
    AsyncFailure, AsyncResult, ClientSlot, LifecycleError, RemoteResult, TaskRunner,
};
use weblayer_native::NativeEngine;

use crate::Result;

const DUMP_EXTENSION: &str = "dmp";
const KEYS_EXTENSION: &str = "json";

pub trait CrashReporterClient: Send + Sync {
    fn on_crash_upload_succeeded(&self, local_id: String, report_id: String) -> RemoteResult;
    fn on_crash_upload_failed(&self, local_id: String, reason: String) -> RemoteResult;
    fn on_crash_deleted(&self, local_id: String) -> RemoteResult;
}

pub struct CrashReporterController {
    dump_dir: PathBuf,
    engine: Arc<dyn NativeEngine>,
    tasks: Arc<TaskRunner>,
    client: Arc<ClientSlot<dyn CrashReporterClient>>,
}

fn validate_local_id(local_id: &str) -> Result<()> {
    let valid = !local_id.is_empty()
        && local_id != "."
        && local_id != ".."
        && !local_id.contains(['/', '\\']);
    if !valid {
        return Err(LifecycleError::InvalidArgument(format!(
            "invalid crash id {:?}",
            local_id
        ))
        .into());
    }
    Ok(())
}

fn dump_path(dir: &Path, local_id: &str) -> PathBuf {
    dir.join(format!("{}.{}", local_id, DUMP_EXTENSION))
}

fn keys_path(dir: &Path, local_id: &str) -> PathBuf {
    dir.join(format!("{}.{}", local_id, KEYS_EXTENSION))
}

fn list_dumps(dir: &Path) -> std::io::Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut ids = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(DUMP_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            ids.push(stem.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}

fn read_keys(dir: &Path, local_id: &str) -> AsyncResult<BTreeMap<String, String>> {
    if !dump_path(dir, local_id).exists() {
        return Err(AsyncFailure::new("crash keys", format!("no crash {}", local_id)));
    }
    match std::fs::read_to_string(keys_path(dir, local_id)) {
        Ok(raw) => serde_json::from_str(&raw)
            .map_err(|e| AsyncFailure::new("crash keys", e.to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(AsyncFailure::new("crash keys", e.to_string())),
    }
}

/// Removes the dump and its keys. Returns whether a dump was there.
fn remove_crash(dir: &Path, local_id: &str) -> std::io::Result<bool> {
    let removed = match std::fs::remove_file(dump_path(dir, local_id)) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };
    match std::fs::remove_file(keys_path(dir, local_id)) {
        Ok(()) => Ok(removed),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(removed),
        Err(e) => Err(e),
    }
}

impl CrashReporterController {
    pub fn new(dump_dir: PathBuf, engine: Arc<dyn NativeEngine>, tasks: Arc<TaskRunner>) -> Self {
        Self {
            dump_dir,
            engine,
            tasks,
            client: Arc::new(ClientSlot::shell("crash_reporter_controller")),
        }
    }

    pub fn dump_dir(&self) -> &Path {
        &self.dump_dir
    }

    pub fn set_client(&self, client: Arc<dyn CrashReporterClient>) -> Result<()> {
        Ok(self.client.set_client(client)?)
    }

    /// Ids of crashes still on disk, sorted.
    pub fn pending_crashes<F>(&self, callback: F)
    where
        F: FnOnce(AsyncResult<Vec<String>>) + Send + 'static,
    {
        let dir = self.dump_dir.clone();
        self.tasks.post_blocking(
            move || {
                list_dumps(&dir).map_err(|e| AsyncFailure::new("pending crashes", e.to_string()))
            },
            callback,
        );
    }

    pub fn crash_keys<F>(&self, local_id: &str, callback: F) -> Result<()>
    where
        F: FnOnce(AsyncResult<BTreeMap<String, String>>) + Send + 'static,
    {
        validate_local_id(local_id)?;
        let dir = self.dump_dir.clone();
        let local_id = local_id.to_string();
        self.tasks
            .post_blocking(move || read_keys(&dir, &local_id), callback);
        Ok(())
    }

    /// Deletes a crash without uploading it. The callback gets whether
    /// anything was removed; the client hears about it only in that case.
    pub fn delete_crash<F>(&self, local_id: &str, callback: F) -> Result<()>
    where
        F: FnOnce(AsyncResult<bool>) + Send + 'static,
    {
        validate_local_id(local_id)?;
        let dir = self.dump_dir.clone();
        let id = local_id.to_string();
        let client = Arc::clone(&self.client);
        self.tasks.post_blocking(
            {
                let id = id.clone();
                move || remove_crash(&dir, &id)
            },
            move |removed| match removed {
                Ok(removed) => {
                    if removed {
                        tracing::info!(local_id = %id, "crash deleted");
                        client.notify("on_crash_deleted", move |c| c.on_crash_deleted(id));
                    }
                    callback(Ok(removed));
                }
                Err(e) => {
                    tracing::warn!(local_id = %id, error = %e, "crash delete failed");
                    callback(Err(AsyncFailure::new("delete crash", e.to_string())));
                }
            },
        );
        Ok(())
    }

    /// Uploads the dump through the engine. An uploaded crash is removed
    /// from disk; a failed one stays for a later attempt.
    pub fn upload_crash(&self, local_id: &str) -> Result<()> {
        validate_local_id(local_id)?;
        let dir = self.dump_dir.clone();
        let engine = Arc::clone(&self.engine);
        let id = local_id.to_string();
        let client = Arc::clone(&self.client);

        self.tasks.post_blocking(
            {
                let id = id.clone();
                move || -> std::result::Result<String, String> {
                    let dump = std::fs::read(dump_path(&dir, &id)).map_err(|e| e.to_string())?;
                    let report_id = engine.upload_crash(&id, &dump)?;
                    if let Err(e) = remove_crash(&dir, &id) {
                        tracing::warn!(local_id = %id, error = %e, "uploaded crash not removed");
                    }
                    Ok(report_id)
                }
            },
            move |uploaded| match uploaded {
                Ok(report_id) => {
                    tracing::info!(local_id = %id, report_id = %report_id, "crash uploaded");
                    client.notify("on_crash_upload_succeeded", move |c| {
                        c.on_crash_upload_succeeded(id, report_id)
                    });
                }
                Err(reason) => {
                    tracing::warn!(local_id = %id, reason = %reason, "crash upload failed");
                    client.notify("on_crash_upload_failed", move |c| {
                        c.on_crash_upload_failed(id, reason)
                    });
                }
            },
        );
        Ok(())
    }

    pub fn shutdown(&self) {
        self.client.detach();
    }
}
