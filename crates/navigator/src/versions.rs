//! Current-version resolution and the version lifecycle of one document.
//!
//! The current version is always derived: the highest `version_number` among
//! versions that are not soft-deleted. The server's `aktuelleVersionId` is only
//! compared against it for diagnostics.

use crate::error::{NavError, Result};
use dms_protocol::{
    CreatedVersion, DeletedVersionEntry, DocumentDto, DocumentResponse, DocumentStatus,
    Permissions, VersionDto,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionState {
    Active,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentVersion {
    pub id: i64,
    pub document_id: i64,
    pub version_number: u32,
    pub filename: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    pub state: VersionState,
}

impl DocumentVersion {
    pub fn from_dto(dto: VersionDto) -> Self {
        let state = if dto.is_deleted() {
            VersionState::Deleted
        } else {
            VersionState::Active
        };
        Self {
            id: dto.id,
            document_id: dto.document_id,
            version_number: dto.version_number,
            filename: dto.filename,
            size_bytes: dto.size_bytes,
            mime_type: dto.mime_type,
            content_hash: dto.content_hash,
            comment: dto.comment,
            created_at: dto.created_at,
            deleted_at: dto.deleted_at,
            state,
        }
    }

    /// Builds the local record of a version the server just created.
    pub fn created(document_id: i64, created: CreatedVersion, file: &FileDescriptor, comment: &str) -> Self {
        Self {
            id: created.id,
            document_id,
            version_number: created.version_number,
            filename: file.filename.clone(),
            size_bytes: file.size_bytes,
            mime_type: file.mime_type.clone(),
            content_hash: file.content_hash.clone(),
            comment: Some(comment.to_string()),
            created_at: None,
            deleted_at: None,
            state: VersionState::Active,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.state == VersionState::Deleted
    }
}

/// The max-number rule over non-deleted versions.
pub fn resolve_current(versions: &[DocumentVersion]) -> Option<&DocumentVersion> {
    versions
        .iter()
        .filter(|version| !version.is_deleted())
        .max_by_key(|version| version.version_number)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: i64,
    pub dossier_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DocumentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    pub deleted: bool,
}

impl Document {
    pub fn from_dto(dto: DocumentDto) -> Self {
        let deleted = dto.is_deleted();
        Self {
            id: dto.id,
            dossier_id: dto.dossier_id,
            title: dto.title,
            status: dto.status.as_deref().and_then(DocumentStatus::from_wire),
            current_version_id: dto.current_version_id.filter(|id| *id > 0),
            deleted_at: dto.deleted_at,
            deleted,
        }
    }
}

/// Metadata of an uploaded file; `content_hash` proves the upload finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub filename: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub content_hash: String,
}

/// Checks the inputs of a version upload and returns the trimmed comment.
pub fn validate_new_version(file: &FileDescriptor, comment: &str) -> Result<String> {
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(NavError::Validation("a comment is required for a new version".into()));
    }
    if file.filename.trim().is_empty() {
        return Err(NavError::Validation("a file must be selected".into()));
    }
    if file.content_hash.trim().is_empty() {
        return Err(NavError::Validation(format!(
            "{} has not finished uploading",
            file.filename
        )));
    }
    Ok(comment.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePolicy {
    /// Permit deleting the last active version.
    pub allow_last: bool,
    /// Refuse deleting the current version while other active versions exist.
    pub protect_current: bool,
}

/// Effect of a lifecycle step on the current-version pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionChange {
    pub document_id: i64,
    pub version_id: i64,
    pub previous_current: Option<i64>,
    pub current: Option<i64>,
}

impl VersionChange {
    pub fn current_changed(&self) -> bool {
        self.previous_current != self.current
    }
}

/// What "download current" resolves to at request time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadTarget {
    pub document_id: i64,
    pub version_id: i64,
    pub version_number: u32,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub content_hash: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionLedger {
    document: Document,
    versions: Vec<DocumentVersion>,
    permissions: Permissions,
}

impl VersionLedger {
    pub fn new(document: Document, versions: Vec<DocumentVersion>, permissions: Permissions) -> Self {
        let mut ledger = Self {
            document,
            versions,
            permissions,
        };
        ledger.versions.sort_by_key(|version| version.version_number);
        let advertised = ledger.document.current_version_id;
        ledger.recompute();
        if advertised.is_some() && advertised != ledger.document.current_version_id {
            debug!(
                "Document {} advertises current version {:?}, resolved {:?}",
                ledger.document.id, advertised, ledger.document.current_version_id
            );
        }
        ledger
    }

    pub fn from_response(resp: DocumentResponse) -> Self {
        let DocumentResponse {
            document,
            versions,
            permissions,
        } = resp;
        Self::new(
            Document::from_dto(document),
            versions.into_iter().map(DocumentVersion::from_dto).collect(),
            permissions,
        )
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn versions(&self) -> &[DocumentVersion] {
        &self.versions
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    pub fn version(&self, version_id: i64) -> Option<&DocumentVersion> {
        self.versions.iter().find(|version| version.id == version_id)
    }

    pub fn current(&self) -> Option<&DocumentVersion> {
        resolve_current(&self.versions)
    }

    pub fn active_count(&self) -> usize {
        self.versions.iter().filter(|v| !v.is_deleted()).count()
    }

    fn recompute(&mut self) -> Option<i64> {
        let current = resolve_current(&self.versions).map(|version| version.id);
        self.document.current_version_id = current;
        current
    }

    fn version_mut(&mut self, version_id: i64) -> Result<&mut DocumentVersion> {
        let document_id = self.document.id;
        self.versions
            .iter_mut()
            .find(|version| version.id == version_id)
            .ok_or_else(|| {
                NavError::NotFound(format!("version {version_id} of document {document_id}"))
            })
    }

    /// Adds deleted versions reported by the deleted-items listing.
    pub fn merge_deleted(&mut self, entries: impl IntoIterator<Item = DeletedVersionEntry>) -> usize {
        let mut added = 0;
        for entry in entries {
            if entry.version.document_id != self.document.id || self.version(entry.version.id).is_some() {
                continue;
            }
            let mut version = DocumentVersion::from_dto(entry.version);
            version.state = VersionState::Deleted;
            self.versions.push(version);
            added += 1;
        }
        if added > 0 {
            self.versions.sort_by_key(|version| version.version_number);
            self.recompute();
        }
        added
    }

    pub fn check_delete(&self, version_id: i64, policy: DeletePolicy) -> Result<()> {
        let version = self.version(version_id).ok_or_else(|| {
            NavError::NotFound(format!("version {version_id} of document {}", self.document.id))
        })?;
        if version.is_deleted() {
            return Err(NavError::StaleReference(format!(
                "version {} of document {} is already deleted",
                version.version_number, self.document.id
            )));
        }
        let active = self.active_count();
        if active == 1 && !policy.allow_last {
            return Err(NavError::Validation(format!(
                "version {} is the only remaining version of document {}",
                version.version_number, self.document.id
            )));
        }
        if policy.protect_current && active > 1 && self.document.current_version_id == Some(version_id) {
            return Err(NavError::Validation(format!(
                "version {} is the current version; upload a newer version before deleting it",
                version.version_number
            )));
        }
        Ok(())
    }

    pub fn soft_delete(
        &mut self,
        version_id: i64,
        deleted_at: Option<String>,
        policy: DeletePolicy,
    ) -> Result<VersionChange> {
        self.check_delete(version_id, policy)?;
        let previous_current = self.document.current_version_id;
        let version = self.version_mut(version_id)?;
        version.state = VersionState::Deleted;
        version.deleted_at = deleted_at;
        let current = self.recompute();
        debug!(
            "Deleted version {version_id} of document {}: current {previous_current:?} -> {current:?}",
            self.document.id
        );
        Ok(self.change(version_id, previous_current, current))
    }

    pub fn restore(&mut self, version_id: i64) -> Result<VersionChange> {
        let document_id = self.document.id;
        let previous_current = self.document.current_version_id;
        let version = self.version_mut(version_id)?;
        if !version.is_deleted() {
            return Err(NavError::StaleReference(format!(
                "version {} of document {document_id} is not deleted",
                version.version_number
            )));
        }
        version.state = VersionState::Active;
        version.deleted_at = None;
        let current = self.recompute();
        debug!(
            "Restored version {version_id} of document {document_id}: current {previous_current:?} -> {current:?}"
        );
        Ok(self.change(version_id, previous_current, current))
    }

    /// Records a server-created version. Numbers are never reused, so one at
    /// or below the known maximum means this ledger is out of date.
    pub fn apply_created(&mut self, version: DocumentVersion) -> Result<VersionChange> {
        if version.document_id != self.document.id {
            return Err(NavError::Validation(format!(
                "version {} belongs to document {}, not {}",
                version.id, version.document_id, self.document.id
            )));
        }
        let highest = self.versions.iter().map(|v| v.version_number).max();
        if highest.is_some_and(|max| version.version_number <= max) {
            warn!(
                "Version number {} of document {} is not above the known maximum {:?}",
                version.version_number, self.document.id, highest
            );
            return Err(NavError::StaleReference(format!(
                "version number {} of document {} was already assigned",
                version.version_number, self.document.id
            )));
        }
        let previous_current = self.document.current_version_id;
        let version_id = version.id;
        self.versions.push(version);
        let current = self.recompute();
        Ok(self.change(version_id, previous_current, current))
    }

    pub fn download_target(&self) -> Option<DownloadTarget> {
        self.current().map(|version| DownloadTarget {
            document_id: self.document.id,
            version_id: version.id,
            version_number: version.version_number,
            filename: version.filename.clone(),
            mime_type: version.mime_type.clone(),
            size_bytes: version.size_bytes,
            content_hash: version.content_hash.clone(),
            path: format!("/dms/file/{}", version.content_hash),
        })
    }

    fn change(&self, version_id: i64, previous_current: Option<i64>, current: Option<i64>) -> VersionChange {
        VersionChange {
            document_id: self.document.id,
            version_id,
            previous_current,
            current,
        }
    }
}
