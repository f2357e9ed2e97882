use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod billing;
pub mod entities;
pub mod search;
pub mod tree;

pub use billing::BalanceCheck;
pub use entities::{
    CreateDocumentRequest, CreateDossierRequest, CreateVersionRequest, CreatedEntity,
    CreatedVersion, DeletedItems, DeletedVersionEntry, DocumentDto, DocumentResponse,
    DocumentStatus, DossierDto, DossierResponse, MessageResponse, NodeResponse, PositionDto,
    PositionResponse, VersionDto, DELETED_STATUS,
};
pub use search::{DocumentHit, SearchQuery, SearchResults, SearchScope};
pub use tree::{ChildrenResponse, PlanDto, PlanEntry, PlansResponse, SinglePlanResponse, TreeNodeDto};

pub const COMMAND_API_VERSION: u32 = 1;

/// Kind of a registry entry as it appears on the wire (`type` field and URL segments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum NodeKind {
    #[serde(rename = "registraturplan", alias = "plan")]
    Plan,
    #[serde(rename = "registraturposition", alias = "position")]
    Position,
    #[serde(rename = "dossier")]
    Dossier,
    #[serde(rename = "document")]
    Document,
}

impl NodeKind {
    pub const fn as_path_segment(self) -> &'static str {
        match self {
            NodeKind::Plan => "registraturplan",
            NodeKind::Position => "registraturposition",
            NodeKind::Dossier => "dossier",
            NodeKind::Document => "document",
        }
    }

    /// Depth of the kind in the filing hierarchy (plan is 0).
    pub const fn rank(self) -> u8 {
        match self {
            NodeKind::Plan => 0,
            NodeKind::Position => 1,
            NodeKind::Dossier => 2,
            NodeKind::Document => 3,
        }
    }

    /// Whether an entry of this kind may directly contain an entry of `child` kind.
    pub const fn can_contain(self, child: NodeKind) -> bool {
        matches!(
            (self, child),
            (NodeKind::Plan, NodeKind::Position)
                | (NodeKind::Position, NodeKind::Dossier)
                | (NodeKind::Dossier, NodeKind::Dossier)
                | (NodeKind::Dossier, NodeKind::Document)
        )
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_path_segment())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "registraturplan" | "plan" => Ok(NodeKind::Plan),
            "registraturposition" | "position" => Ok(NodeKind::Position),
            "dossier" => Ok(NodeKind::Dossier),
            "document" => Ok(NodeKind::Document),
            other => Err(format!("unknown node kind: {other}")),
        }
    }
}

/// Single capability a user may hold on the current subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Read,
    Write,
    Delete,
    CreateDossier,
    CreateDocument,
    ManageVersions,
}

/// Capability set returned by the server next to every plan or node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    #[serde(default)]
    pub can_read: bool,
    #[serde(default)]
    pub can_write: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub can_create_dossier: bool,
    #[serde(default)]
    pub can_create_document: bool,
    #[serde(default)]
    pub can_manage_versions: bool,
}

impl Permissions {
    pub const fn all() -> Self {
        Self {
            can_read: true,
            can_write: true,
            can_delete: true,
            can_create_dossier: true,
            can_create_document: true,
            can_manage_versions: true,
        }
    }

    pub const fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Read => self.can_read,
            Capability::Write => self.can_write,
            Capability::Delete => self.can_delete,
            Capability::CreateDossier => self.can_create_dossier,
            Capability::CreateDocument => self.can_create_document,
            Capability::ManageVersions => self.can_manage_versions,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Error body the document store sends with non-2xx responses.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct ServerErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn node_kind_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&NodeKind::Position).unwrap(),
            "\"registraturposition\""
        );
        let kind: NodeKind = serde_json::from_str("\"registraturplan\"").unwrap();
        assert_eq!(kind, NodeKind::Plan);
        assert_eq!("Dossier".parse::<NodeKind>().unwrap(), NodeKind::Dossier);
        assert!("folder".parse::<NodeKind>().is_err());
    }

    #[test]
    fn containment_follows_filing_hierarchy() {
        assert!(NodeKind::Plan.can_contain(NodeKind::Position));
        assert!(NodeKind::Dossier.can_contain(NodeKind::Dossier));
        assert!(!NodeKind::Position.can_contain(NodeKind::Document));
        assert!(!NodeKind::Document.can_contain(NodeKind::Document));
    }

    #[test]
    fn permissions_default_missing_fields_to_false() {
        let perms: Permissions =
            serde_json::from_str(r#"{"canRead":true,"canCreateDocument":true}"#).unwrap();
        assert!(perms.allows(Capability::Read));
        assert!(perms.allows(Capability::CreateDocument));
        assert!(!perms.allows(Capability::Delete));
        assert!(!perms.allows(Capability::ManageVersions));
    }
}
