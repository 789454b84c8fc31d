//! File storage for patient photos and medical-record attachments.
//!
//! Files live under the media root at `<kind>/<patient_id>/<upload_id>/<file>`.
//! Every upload gets its own folder, so a stored path belongs to exactly one
//! row and never collides with another upload of the same name. The stored
//! path is relative to the root so the media directory can move.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("File too large. Maximum {max_bytes} bytes.")]
    TooLarge { max_bytes: u64 },
    #[error("No file provided.")]
    Empty,
    #[error("Only image files can be used as a photo.")]
    NotAnImage,
    #[error("Invalid stored path: {0}")]
    InvalidPath(String),
    #[error("No file attached.")]
    Missing,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Folder under the media root for each attachment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    PatientPhoto,
    MedicalRecord,
}

impl AttachmentKind {
    pub fn folder(self) -> &'static str {
        match self {
            AttachmentKind::PatientPhoto => "patients",
            AttachmentKind::MedicalRecord => "medical_records",
        }
    }
}

/// A stored file read back for download.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
    max_bytes: u64,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` atomically into a fresh upload folder and return the
    /// path relative to the root.
    pub fn save(
        &self,
        kind: AttachmentKind,
        patient_id: &Uuid,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, AttachmentError> {
        if bytes.is_empty() {
            return Err(AttachmentError::Empty);
        }
        if bytes.len() as u64 > self.max_bytes {
            return Err(AttachmentError::TooLarge {
                max_bytes: self.max_bytes,
            });
        }
        let safe_name = sanitize_filename(file_name);
        if kind == AttachmentKind::PatientPhoto && !guess_mime(&safe_name).starts_with("image/") {
            return Err(AttachmentError::NotAnImage);
        }

        let upload_id = Uuid::new_v4();
        let relative = format!("{}/{}/{}/{}", kind.folder(), patient_id, upload_id, safe_name);
        let dir = self
            .root
            .join(kind.folder())
            .join(patient_id.to_string())
            .join(upload_id.to_string());
        fs::create_dir_all(&dir)?;

        let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
        staged.write_all(bytes)?;
        staged.as_file().sync_all()?;
        staged
            .persist(dir.join(&safe_name))
            .map_err(|e| AttachmentError::Io(e.error))?;

        tracing::info!(path = %relative, size = bytes.len(), "Attachment stored");
        Ok(relative)
    }

    pub fn load(&self, relative: &str) -> Result<StoredFile, AttachmentError> {
        let path = self.resolve(relative)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AttachmentError::Missing)
            }
            Err(e) => return Err(e.into()),
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(StoredFile {
            content_type: guess_mime(&file_name),
            file_name,
            bytes,
        })
    }

    /// Remove a previously stored file; a missing file is not an error.
    pub fn remove(&self, relative: &str) -> Result<(), AttachmentError> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        // the upload folder only ever held this file
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir(dir);
        }
        Ok(())
    }

    /// Join a stored relative path onto the root, refusing anything that
    /// could escape it.
    fn resolve(&self, relative: &str) -> Result<PathBuf, AttachmentError> {
        let path = Path::new(relative);
        let plain = path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !plain || relative.is_empty() {
            return Err(AttachmentError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(path))
    }
}

/// Drop a file whose row never made it to the database.
pub fn discard_upload(store: &AttachmentStore, relative: &str) {
    if let Err(e) = store.remove(relative) {
        tracing::warn!(error = %e, path = %relative, "Failed to remove orphaned upload");
    }
}

fn guess_mime(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Reduce an uploaded name to a single safe path component.
pub fn sanitize_filename(name: &str) -> String {
    // keep only the last path segment a client may have sent
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let sanitized: String = base
        .chars()
        .filter(|&c| c != '\0')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.replace("..", "");
    let sanitized = sanitized.trim_start_matches('.');
    let sanitized: String = sanitized.chars().take(100).collect();

    if sanitized.is_empty() {
        "attachment".into()
    } else {
        sanitized
    }
}
