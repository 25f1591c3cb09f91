//! Shared session resources
//!
//! Members of a session can attach uploaded files or links. Files go to an
//! [`ObjectStorage`] backend under `study_sessions/{session_id}/{upload_id}/`;
//! the returned URL is recorded on the session next to the uploader and time.

use crate::error::{Result, StudySyncError};
use crate::storage::{Resource, SessionStore};
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use ulid::Ulid;
use url::Url;

/// Stores uploaded bytes and returns a public URL
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at the relative `path`
    ///
    /// # Errors
    ///
    /// Returns `Upload` when the bytes could not be stored or an object
    /// already exists at `path`.
    fn upload(&self, bytes: &[u8], path: &str) -> Result<Url>;

    /// Delete the object at the relative `path`
    ///
    /// # Errors
    ///
    /// Returns `Upload` when the object could not be removed.
    fn remove(&self, path: &str) -> Result<()>;
}

/// Object storage on the local filesystem
///
/// Files are written below `root` and addressed with `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
}

impl LocalObjectStorage {
    /// Create a backend writing below `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Base directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StudySyncError::Upload(format!("unsafe object path '{}'", path)).into());
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStorage for LocalObjectStorage {
    fn upload(&self, bytes: &[u8], path: &str) -> Result<Url> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StudySyncError::Upload(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        // Objects are immutable once written
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|e| {
                StudySyncError::Upload(format!("failed to create {}: {}", target.display(), e))
            })?;
        file.write_all(bytes).map_err(|e| {
            StudySyncError::Upload(format!("failed to write {}: {}", target.display(), e))
        })?;

        let absolute = std::fs::canonicalize(&target).map_err(|e| {
            StudySyncError::Upload(format!("failed to resolve {}: {}", target.display(), e))
        })?;
        let url = Url::from_file_path(&absolute).map_err(|_| {
            StudySyncError::Upload(format!("cannot build URL for {}", absolute.display()))
        })?;

        tracing::debug!(path = %path, url = %url, "Object stored");
        Ok(url)
    }

    fn remove(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        std::fs::remove_file(&target).map_err(|e| {
            StudySyncError::Upload(format!("failed to remove {}: {}", target.display(), e))
        })?;
        tracing::debug!(path = %path, "Object removed");
        Ok(())
    }
}

/// Shares files and links within a session
pub struct ResourceService<S: ObjectStorage> {
    store: SessionStore,
    objects: S,
    allowed_extensions: Vec<String>,
}

impl<S: ObjectStorage> ResourceService<S> {
    /// Create a service
    ///
    /// `allowed_extensions` are compared case-insensitively, without dot.
    pub fn new(store: SessionStore, objects: S, allowed_extensions: Vec<String>) -> Self {
        Self {
            store,
            objects,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Upload a file and attach it to the session
    ///
    /// # Errors
    ///
    /// - `InvalidResource` for an empty name or a disallowed extension.
    /// - `SessionNotFound` / `Forbidden` when the session is unknown or the
    ///   uploader is not a member; nothing is uploaded in either case.
    /// - `Upload` when the storage backend fails.
    pub fn share_file(
        &self,
        session_id: &str,
        uploader: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Resource> {
        let filename = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StudySyncError::InvalidResource("missing file name".to_string()))?
            .to_string();

        let extension = Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if !self.allowed_extensions.contains(&extension) {
            return Err(StudySyncError::InvalidResource(format!(
                "file type of '{}' is not allowed (allowed: {})",
                filename,
                self.allowed_extensions.join(", ")
            ))
            .into());
        }

        self.check_member(session_id, uploader)?;

        // One folder per upload so equal file names never collide
        let object_path = format!("study_sessions/{}/{}/{}", session_id, Ulid::new(), filename);
        let url = self.objects.upload(bytes, &object_path)?;

        let resource = Resource {
            uploader: uploader.to_string(),
            timestamp: Utc::now(),
            file_url: Some(url.to_string()),
            filename: Some(filename),
            link: None,
        };

        match self.attach(session_id, uploader, resource) {
            Ok(resource) => Ok(resource),
            Err(err) => {
                if let Err(cleanup) = self.objects.remove(&object_path) {
                    tracing::warn!(
                        path = %object_path,
                        error = %cleanup,
                        "Failed to remove object after attach failure"
                    );
                }
                Err(err)
            }
        }
    }

    /// Attach a link to the session
    ///
    /// # Errors
    ///
    /// - `InvalidResource` when `link` is not an absolute URL.
    /// - `SessionNotFound` / `Forbidden` as for [`ResourceService::share_file`].
    pub fn share_link(&self, session_id: &str, uploader: &str, link: &str) -> Result<Resource> {
        let parsed = Url::parse(link.trim()).map_err(|e| {
            StudySyncError::InvalidResource(format!("'{}' is not a valid URL: {}", link, e))
        })?;

        let resource = Resource {
            uploader: uploader.to_string(),
            timestamp: Utc::now(),
            file_url: None,
            filename: None,
            link: Some(parsed.to_string()),
        };
        self.attach(session_id, uploader, resource)
    }

    /// Resources of a session, newest first
    pub fn list(&self, session_id: &str) -> Result<Vec<Resource>> {
        let mut resources = self.store.get_session_by_id(session_id)?.resources;
        // Later insertions first on equal timestamps
        resources.reverse();
        resources.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(resources)
    }

    fn check_member(&self, session_id: &str, user: &str) -> Result<()> {
        let session = self.store.get_session_by_id(session_id)?;
        if !session.is_member(user) {
            return Err(StudySyncError::Forbidden(format!(
                "{} is not a member of session {}",
                user, session_id
            ))
            .into());
        }
        Ok(())
    }

    fn attach(&self, session_id: &str, uploader: &str, resource: Resource) -> Result<Resource> {
        self.store.update(session_id, |session| {
            if !session.is_member(uploader) {
                return Err(StudySyncError::Forbidden(format!(
                    "{} is not a member of session {}",
                    uploader, session.id
                ))
                .into());
            }
            session.resources.push(resource.clone());
            Ok(())
        })?;

        tracing::info!(session_id = %session_id, uploader = %uploader, "Resource shared");
        Ok(resource)
    }
}
