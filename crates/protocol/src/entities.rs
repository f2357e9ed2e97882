use crate::Permissions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Status value the store uses for soft-deleted entities and versions.
pub const DELETED_STATUS: &str = "Gelöscht";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    InProgress,
    ForApproval,
    Approved,
    Archived,
}

impl DocumentStatus {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Entwurf" => Some(DocumentStatus::Draft),
            "In Bearbeitung" => Some(DocumentStatus::InProgress),
            "Zur Freigabe" => Some(DocumentStatus::ForApproval),
            "Freigegeben" => Some(DocumentStatus::Approved),
            "Archiviert" => Some(DocumentStatus::Archived),
            _ => None,
        }
    }

    pub const fn as_wire(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "Entwurf",
            DocumentStatus::InProgress => "In Bearbeitung",
            DocumentStatus::ForApproval => "Zur Freigabe",
            DocumentStatus::Approved => "Freigegeben",
            DocumentStatus::Archived => "Archiviert",
        }
    }
}

fn is_deleted_status(status: Option<&str>) -> bool {
    status.is_some_and(|s| s.trim() == DELETED_STATUS)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub id: i64,
    #[serde(default, rename = "registraturPlanId")]
    pub plan_id: Option<i64>,
    #[serde(default, rename = "positionNummer")]
    pub position_number: Option<i64>,
    pub name: String,
    #[serde(default, rename = "beschreibung")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DossierDto {
    pub id: i64,
    #[serde(default, rename = "registraturPositionId")]
    pub position_id: Option<i64>,
    #[serde(default)]
    pub parent_dossier_id: Option<i64>,
    pub name: String,
    #[serde(default, rename = "laufnummer")]
    pub running_number: Option<String>,
    #[serde(default, rename = "positionNummer")]
    pub position_number: Option<i64>,
    #[serde(default, rename = "eindeutigeLaufnummer")]
    pub unique_running_number: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "isPublicAnonymousShared")]
    pub publicly_shared: bool,
    #[serde(default, rename = "erstellungsdatum")]
    pub created_at: Option<String>,
    #[serde(default, rename = "beschreibung")]
    pub description: Option<String>,
}

impl DossierDto {
    pub fn is_deleted(&self) -> bool {
        is_deleted_status(self.status.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDto {
    pub id: i64,
    pub dossier_id: i64,
    #[serde(rename = "titel")]
    pub title: String,
    #[serde(default, rename = "aktuelleVersionId")]
    pub current_version_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "erstellungsdatum")]
    pub created_at: Option<String>,
    #[serde(default, rename = "beschreibung")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

impl DocumentDto {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some() || is_deleted_status(self.status.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionDto {
    pub id: i64,
    pub document_id: i64,
    #[serde(rename = "versionsnummer")]
    pub version_number: u32,
    #[serde(rename = "dateiname")]
    pub filename: String,
    #[serde(default, rename = "dateigroesse")]
    pub size_bytes: u64,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, rename = "hashWert")]
    pub content_hash: String,
    #[serde(default, rename = "kommentar")]
    pub comment: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "erstellungsdatum")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

impl VersionDto {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some() || is_deleted_status(self.status.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    #[serde(rename = "registraturposition")]
    pub position: PositionDto,
    #[serde(default)]
    pub dossiers: Vec<DossierDto>,
    #[serde(default)]
    pub permissions: Permissions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DossierResponse {
    pub dossier: DossierDto,
    #[serde(default)]
    pub child_dossiers: Vec<DossierDto>,
    #[serde(default)]
    pub documents: Vec<DocumentDto>,
    #[serde(default)]
    pub permissions: Permissions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub document: DocumentDto,
    #[serde(default)]
    pub versions: Vec<VersionDto>,
    #[serde(default)]
    pub permissions: Permissions,
}

/// Response of the node-by-id endpoints; the variant follows the requested kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum NodeResponse {
    Position(PositionResponse),
    Dossier(DossierResponse),
    Document(DocumentResponse),
}

impl NodeResponse {
    pub fn permissions(&self) -> Permissions {
        match self {
            NodeResponse::Position(resp) => resp.permissions,
            NodeResponse::Dossier(resp) => resp.permissions,
            NodeResponse::Document(resp) => resp.permissions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVersionRequest {
    pub document_id: i64,
    #[serde(rename = "dateiname")]
    pub filename: String,
    pub mime_type: String,
    #[serde(rename = "hashWert")]
    pub content_hash: String,
    #[serde(rename = "dateigroesse")]
    pub size_bytes: u64,
    #[serde(rename = "kommentar")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CreatedVersion {
    pub id: i64,
    #[serde(rename = "versionsnummer")]
    pub version_number: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDossierRequest {
    #[serde(rename = "registraturPositionId")]
    pub position_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_dossier_id: Option<i64>,
    pub name: String,
    #[serde(default, rename = "beschreibung", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    pub dossier_id: i64,
    #[serde(rename = "titel")]
    pub title: String,
    #[serde(default, rename = "beschreibung", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CreatedEntity {
    pub id: i64,
    #[serde(default, rename = "laufnummer", skip_serializing_if = "Option::is_none")]
    pub running_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeletedVersionEntry {
    pub version: VersionDto,
    #[serde(default)]
    pub document_title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeletedItems {
    #[serde(default)]
    pub documents: Vec<DocumentDto>,
    #[serde(default)]
    pub dossiers: Vec<DossierDto>,
    #[serde(default)]
    pub document_versions: Vec<DeletedVersionEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn version_decodes_store_field_names() {
        let raw = r#"{
            "id": 31, "documentId": 7, "versionsnummer": 3, "dateiname": "plan.pdf",
            "dateigroesse": 2048, "mimeType": "application/pdf", "hashWert": "abc",
            "kommentar": "third", "status": "Gelöscht", "userId": 1, "groupId": 2,
            "erstellungsdatum": "2024-02-01T10:00:00"
        }"#;
        let version: VersionDto = serde_json::from_str(raw).unwrap();
        assert_eq!(version.version_number, 3);
        assert_eq!(version.content_hash, "abc");
        assert!(version.is_deleted());
    }

    #[test]
    fn document_status_round_trips_wire_names() {
        for status in [
            DocumentStatus::Draft,
            DocumentStatus::InProgress,
            DocumentStatus::ForApproval,
            DocumentStatus::Approved,
            DocumentStatus::Archived,
        ] {
            assert_eq!(DocumentStatus::from_wire(status.as_wire()), Some(status));
        }
        assert_eq!(DocumentStatus::from_wire(DELETED_STATUS), None);
    }

    #[test]
    fn create_version_request_uses_store_field_names() {
        let request = CreateVersionRequest {
            document_id: 7,
            filename: "a.txt".into(),
            mime_type: "text/plain".into(),
            content_hash: "h".into(),
            size_bytes: 3,
            comment: Some("fix".into()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["hashWert"], "h");
        assert_eq!(value["kommentar"], "fix");
        assert_eq!(value["documentId"], 7);
    }
}
