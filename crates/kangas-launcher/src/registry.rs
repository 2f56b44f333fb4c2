//! Lease and launch records per (host, port).
//!
//! A lease is an exclusive advisory lock on `<dir>/<host>-<port>.lock`. The
//! supervisor holds it from the "is it running" scan until the launch has
//! finished, so concurrent launchers for the same endpoint serialize instead
//! of racing. The last launch is described in `<dir>/<host>-<port>.json`.

use fs2::FileExt;
use kangas_launcher_core::{LauncherError, ServiceEndpoint};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

const LEASE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What the last successful spawn for an endpoint looked like
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub host: String,
    pub frontend_port: u16,
    pub backend_port: u16,
    /// Pid of the spawned entry point
    pub pid: Option<u32>,
    /// Pid of the process that launched it
    pub launcher_pid: u32,
    pub started_at: SystemTime,
    pub version: String,
}

impl ServiceRecord {
    pub fn new(endpoint: &ServiceEndpoint, pid: Option<u32>) -> Self {
        Self {
            host: endpoint.host().to_string(),
            frontend_port: endpoint.frontend_port(),
            backend_port: endpoint.backend_port(),
            pid,
            launcher_pid: std::process::id(),
            started_at: SystemTime::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn endpoint(&self) -> Result<ServiceEndpoint, LauncherError> {
        ServiceEndpoint::new(self.host.clone(), self.frontend_port)
    }
}

/// Directory of lease and record files
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    dir: PathBuf,
}

impl ServiceRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<cache dir>/kangas`, falling back to the temp dir
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("kangas")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock_path(&self, endpoint: &ServiceEndpoint) -> PathBuf {
        self.dir.join(format!("{}.lock", Self::key(endpoint)))
    }

    pub fn record_path(&self, endpoint: &ServiceEndpoint) -> PathBuf {
        self.dir.join(format!("{}.json", Self::key(endpoint)))
    }

    fn key(endpoint: &ServiceEndpoint) -> String {
        let host: String = endpoint
            .host()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        format!("{}-{}", host, endpoint.frontend_port())
    }

    /// Take the exclusive lease for `endpoint`, polling until `timeout`
    pub async fn lease(
        &self,
        endpoint: &ServiceEndpoint,
        timeout: Duration,
    ) -> Result<ServiceLease, LauncherError> {
        fs::create_dir_all(&self.dir)?;
        let lock_path = self.lock_path(endpoint);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %lock_path.display(), "Acquired service lease");
                    return Ok(ServiceLease {
                        file,
                        lock_path,
                        record_path: self.record_path(endpoint),
                    });
                }
                Err(e) if is_contended(&e) => {
                    if tokio::time::Instant::now() >= deadline {
                        warn!(
                            path = %lock_path.display(),
                            "Service lease still held by another launcher"
                        );
                        return Err(LauncherError::LeaseTimeout(timeout));
                    }
                    tokio::time::sleep(LEASE_POLL_INTERVAL).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn read_record(&self, endpoint: &ServiceEndpoint) -> Option<ServiceRecord> {
        fs::read_to_string(self.record_path(endpoint))
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
    }

    /// Remove every launch record; used after terminating all service processes
    pub fn clear_records(&self) -> Result<(), LauncherError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match fs::remove_file(&path) {
                    Ok(()) => debug!(path = %path.display(), "Removed service record"),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Exclusive right to launch one endpoint; released on drop
#[derive(Debug)]
pub struct ServiceLease {
    file: File,
    lock_path: PathBuf,
    record_path: PathBuf,
}

impl ServiceLease {
    /// Write the record atomically (temp file + rename)
    pub fn write_record(&self, record: &ServiceRecord) -> Result<(), LauncherError> {
        let json = serde_json::to_string_pretty(record).map_err(io::Error::other)?;
        let tmp = self.record_path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.record_path)?;
        info!(path = %self.record_path.display(), "Wrote service record");
        Ok(())
    }
}

impl Drop for ServiceLease {
    fn drop(&mut self) {
        // The lock file itself stays; unlinking it would let a waiter lock a stale inode
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.lock_path.display(), "Released service lease");
    }
}
