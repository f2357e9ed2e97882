use dms_protocol::{
    DocumentDto, DocumentResponse, DocumentStatus, DossierDto, DossierResponse, NodeKind,
    NodeResponse, Permissions, PositionResponse, TreeNodeDto, DELETED_STATUS,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a registry entry. Raw ids collide across kinds, so every lookup
/// compares the pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub id: i64,
    pub kind: NodeKind,
}

impl NodeKey {
    pub const fn new(id: i64, kind: NodeKind) -> Self {
        Self { id, kind }
    }

    /// Key of the synthetic plan breadcrumb prepended to detached paths.
    pub const fn synthetic_root() -> Self {
        Self::new(0, NodeKind::Plan)
    }

    pub const fn is_synthetic_root(&self) -> bool {
        self.id == 0 && matches!(self.kind, NodeKind::Plan)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// Children (possibly none) arrived with the node itself.
    Eager,
    LazyUnloaded,
    LazyLoading,
    LazyLoaded,
}

impl LoadState {
    pub const fn children_known(self) -> bool {
        matches!(self, LoadState::Eager | LoadState::LazyLoaded)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DossierMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_dossier_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_dossier_count: Option<i64>,
    #[serde(default)]
    pub publicly_shared: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DocumentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

/// Kind-specific fields of a registry entry. The node kind is derived from the
/// variant, so the two cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeMeta {
    Plan(PlanMeta),
    Position(PositionMeta),
    Dossier(DossierMeta),
    Document(DocumentMeta),
}

impl NodeMeta {
    pub fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Plan => NodeMeta::Plan(PlanMeta::default()),
            NodeKind::Position => NodeMeta::Position(PositionMeta::default()),
            NodeKind::Dossier => NodeMeta::Dossier(DossierMeta::default()),
            NodeKind::Document => NodeMeta::Document(DocumentMeta::default()),
        }
    }

    pub const fn kind(&self) -> NodeKind {
        match self {
            NodeMeta::Plan(_) => NodeKind::Plan,
            NodeMeta::Position(_) => NodeKind::Position,
            NodeMeta::Dossier(_) => NodeKind::Dossier,
            NodeMeta::Document(_) => NodeKind::Document,
        }
    }

    fn from_tree_dto(dto: &TreeNodeDto) -> Self {
        let description = dto.metadata_text("beschreibung");
        match dto.kind {
            NodeKind::Plan => NodeMeta::Plan(PlanMeta {
                description,
                status: dto.metadata_text("status"),
            }),
            NodeKind::Position => NodeMeta::Position(PositionMeta {
                position_number: dto.metadata_int("positionNummer"),
                description,
            }),
            NodeKind::Dossier => NodeMeta::Dossier(DossierMeta {
                running_number: dto.metadata_text("laufnummer"),
                status: dto.metadata_text("status"),
                description,
                position_id: dto.metadata_int("registraturPositionId"),
                parent_dossier_id: dto.metadata_int("parentDossierId"),
                document_count: dto.metadata_int("documentCount"),
                child_dossier_count: dto.metadata_int("childDossierCount"),
                publicly_shared: dto.metadata_flag("isPublicAnonymousShared").unwrap_or(false),
            }),
            NodeKind::Document => {
                let raw_status = dto.metadata_text("status");
                NodeMeta::Document(DocumentMeta {
                    status: raw_status.as_deref().and_then(DocumentStatus::from_wire),
                    // the store sends 0 for "no version yet"
                    current_version_id: dto.metadata_int("aktuelleVersionId").filter(|id| *id > 0),
                    version_count: dto.metadata_int("versionCount"),
                    description,
                    deleted: raw_status.as_deref() == Some(DELETED_STATUS),
                })
            }
        }
    }
}

/// Shallow breadcrumb entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crumb {
    pub key: NodeKey,
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

impl Crumb {
    pub fn synthetic_root(label: &str) -> Self {
        Self {
            key: NodeKey::synthetic_root(),
            name: label.to_string(),
            synthetic: true,
        }
    }
}

/// One entry of the client-side mirror of the filing structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryNode {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RegistryNode>,
    pub load_state: LoadState,
    pub meta: NodeMeta,
}

impl RegistryNode {
    pub fn new(id: i64, name: impl Into<String>, meta: NodeMeta) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: None,
            children: Vec::new(),
            load_state: LoadState::Eager,
            meta,
        }
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_children(mut self, children: Vec<RegistryNode>) -> Self {
        let key = self.key();
        self.children = children
            .into_iter()
            .map(|mut child| {
                child.adopt_parent(key);
                child
            })
            .collect();
        self
    }

    /// Marks the children as declared but not fetched.
    pub fn lazy(mut self) -> Self {
        self.load_state = LoadState::LazyUnloaded;
        self
    }

    pub const fn kind(&self) -> NodeKind {
        self.meta.kind()
    }

    pub const fn key(&self) -> NodeKey {
        NodeKey::new(self.id, self.kind())
    }

    pub fn is(&self, key: NodeKey) -> bool {
        self.id == key.id && self.kind() == key.kind
    }

    pub fn crumb(&self) -> Crumb {
        Crumb {
            key: self.key(),
            name: self.name.clone(),
            synthetic: false,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match &self.meta {
            NodeMeta::Dossier(meta) => meta.status.as_deref() == Some(DELETED_STATUS),
            NodeMeta::Document(meta) => meta.deleted,
            _ => false,
        }
    }

    /// Children that should be rendered; soft-deleted entries stay in the mirror.
    pub fn visible_children(&self) -> impl Iterator<Item = &RegistryNode> {
        self.children.iter().filter(|child| !child.is_deleted())
    }

    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// Keys the `parent_id` may refer to, most specific first.
    pub fn parent_candidates(&self) -> Vec<NodeKey> {
        let Some(parent_id) = self.parent_id else {
            return Vec::new();
        };
        match &self.meta {
            NodeMeta::Plan(_) => Vec::new(),
            NodeMeta::Position(_) => vec![NodeKey::new(parent_id, NodeKind::Plan)],
            NodeMeta::Document(_) => vec![NodeKey::new(parent_id, NodeKind::Dossier)],
            NodeMeta::Dossier(meta) => {
                if meta.parent_dossier_id == Some(parent_id) {
                    vec![NodeKey::new(parent_id, NodeKind::Dossier)]
                } else if meta.position_id == Some(parent_id) {
                    vec![NodeKey::new(parent_id, NodeKind::Position)]
                } else {
                    vec![
                        NodeKey::new(parent_id, NodeKind::Dossier),
                        NodeKey::new(parent_id, NodeKind::Position),
                    ]
                }
            }
        }
    }

    /// Records `parent` as the container this node was fetched under.
    pub(crate) fn adopt_parent(&mut self, parent: NodeKey) {
        if self.parent_id.is_some_and(|id| id != parent.id) {
            return;
        }
        self.parent_id = Some(parent.id);
        if let NodeMeta::Dossier(meta) = &mut self.meta {
            match parent.kind {
                NodeKind::Dossier if meta.parent_dossier_id.is_none() => {
                    meta.parent_dossier_id = Some(parent.id)
                }
                NodeKind::Position if meta.position_id.is_none() => {
                    meta.position_id = Some(parent.id)
                }
                _ => {}
            }
        }
    }

    pub fn from_tree_dto(dto: TreeNodeDto) -> Self {
        let meta = NodeMeta::from_tree_dto(&dto);
        let load_state = if !dto.children.is_empty() || dto.kind == NodeKind::Document {
            LoadState::Eager
        } else if dto.metadata_flag("lazy") == Some(true)
            && dto.metadata_flag("hasChildren") != Some(false)
        {
            LoadState::LazyUnloaded
        } else {
            LoadState::Eager
        };
        let key = NodeKey::new(dto.id, dto.kind);
        let children = dto
            .children
            .into_iter()
            .map(|child| {
                let mut node = Self::from_tree_dto(child);
                node.adopt_parent(key);
                node
            })
            .collect();
        Self {
            id: dto.id,
            name: dto.name,
            parent_id: dto.parent_id,
            children,
            load_state,
            meta,
        }
    }

    pub fn from_dossier_dto(dto: DossierDto) -> Self {
        let parent_id = dto.parent_dossier_id.or(dto.position_id);
        Self {
            id: dto.id,
            name: dto.name,
            parent_id,
            children: Vec::new(),
            load_state: LoadState::LazyUnloaded,
            meta: NodeMeta::Dossier(DossierMeta {
                running_number: dto.running_number,
                status: dto.status,
                description: dto.description,
                position_id: dto.position_id,
                parent_dossier_id: dto.parent_dossier_id,
                document_count: None,
                child_dossier_count: None,
                publicly_shared: dto.publicly_shared,
            }),
        }
    }

    pub fn from_document_dto(dto: DocumentDto) -> Self {
        let deleted = dto.is_deleted();
        Self {
            id: dto.id,
            name: dto.title,
            parent_id: Some(dto.dossier_id),
            children: Vec::new(),
            load_state: LoadState::Eager,
            meta: NodeMeta::Document(DocumentMeta {
                status: dto.status.as_deref().and_then(DocumentStatus::from_wire),
                current_version_id: dto.current_version_id.filter(|id| *id > 0),
                version_count: None,
                description: dto.description,
                deleted,
            }),
        }
    }

    pub fn from_position_response(resp: PositionResponse) -> Self {
        let PositionResponse {
            position, dossiers, ..
        } = resp;
        let node = Self {
            id: position.id,
            name: position.name,
            parent_id: position.plan_id,
            children: Vec::new(),
            load_state: LoadState::LazyLoaded,
            meta: NodeMeta::Position(PositionMeta {
                position_number: position.position_number,
                description: position.description,
            }),
        };
        // sub-dossiers belong to their parent dossier, not the position
        let top_level = dossiers
            .into_iter()
            .filter(|dossier| dossier.parent_dossier_id.is_none())
            .map(Self::from_dossier_dto)
            .collect();
        node.with_children(top_level)
    }

    pub fn from_dossier_response(resp: DossierResponse) -> Self {
        let DossierResponse {
            dossier,
            child_dossiers,
            documents,
            ..
        } = resp;
        let mut node = Self::from_dossier_dto(dossier);
        node.load_state = LoadState::LazyLoaded;
        if let NodeMeta::Dossier(meta) = &mut node.meta {
            meta.child_dossier_count = Some(child_dossiers.len() as i64);
            meta.document_count = Some(documents.len() as i64);
        }
        let children = child_dossiers
            .into_iter()
            .map(Self::from_dossier_dto)
            .chain(documents.into_iter().map(Self::from_document_dto))
            .collect();
        node.with_children(children)
    }

    pub fn from_document_response(resp: DocumentResponse) -> Self {
        let version_count = resp.versions.len() as i64;
        let mut node = Self::from_document_dto(resp.document);
        if let NodeMeta::Document(meta) = &mut node.meta {
            meta.version_count = Some(version_count);
        }
        node
    }

    pub fn from_node_response(resp: NodeResponse) -> (Self, Permissions) {
        let permissions = resp.permissions();
        let node = match resp {
            NodeResponse::Position(resp) => Self::from_position_response(resp),
            NodeResponse::Dossier(resp) => Self::from_dossier_response(resp),
            NodeResponse::Document(resp) => Self::from_document_response(resp),
        };
        (node, permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tree_dto(raw: &str) -> TreeNodeDto {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn lazy_flags_decide_load_state() {
        let lazy = RegistryNode::from_tree_dto(tree_dto(
            r#"{"id":10,"name":"P","type":"registraturposition","metadata":{"lazy":"true"}}"#,
        ));
        assert_eq!(lazy.load_state, LoadState::LazyUnloaded);

        let leaf = RegistryNode::from_tree_dto(tree_dto(
            r#"{"id":11,"name":"P","type":"registraturposition","metadata":{"lazy":"true","hasChildren":"false"}}"#,
        ));
        assert_eq!(leaf.load_state, LoadState::Eager);

        let document = RegistryNode::from_tree_dto(tree_dto(
            r#"{"id":5,"name":"D","type":"document","metadata":{"lazy":"true","status":"Entwurf","aktuelleVersionId":"0"}}"#,
        ));
        assert_eq!(document.load_state, LoadState::Eager);
        assert_eq!(
            document.meta,
            NodeMeta::Document(DocumentMeta {
                status: Some(DocumentStatus::Draft),
                ..DocumentMeta::default()
            })
        );
    }

    #[test]
    fn eager_children_inherit_parent_and_kind() {
        let plan = RegistryNode::from_tree_dto(tree_dto(
            r#"{"id":1,"name":"Plan","type":"registraturplan","children":[
                {"id":1,"name":"Pos","type":"registraturposition","metadata":{"lazy":"true"}}
            ]}"#,
        ));
        assert_eq!(plan.load_state, LoadState::Eager);
        let position = &plan.children[0];
        // same raw id, different identity
        assert_ne!(position.key(), plan.key());
        assert_eq!(position.parent_id, Some(1));
        assert_eq!(
            position.parent_candidates(),
            vec![NodeKey::new(1, NodeKind::Plan)]
        );
    }

    #[test]
    fn dossier_parent_candidates_follow_metadata() {
        let nested = RegistryNode::new(
            101,
            "Sub",
            NodeMeta::Dossier(DossierMeta {
                parent_dossier_id: Some(100),
                position_id: Some(10),
                ..DossierMeta::default()
            }),
        )
        .with_parent(100);
        assert_eq!(
            nested.parent_candidates(),
            vec![NodeKey::new(100, NodeKind::Dossier)]
        );

        let unknown = RegistryNode::new(102, "Loose", NodeMeta::empty(NodeKind::Dossier)).with_parent(7);
        assert_eq!(
            unknown.parent_candidates(),
            vec![
                NodeKey::new(7, NodeKind::Dossier),
                NodeKey::new(7, NodeKind::Position)
            ]
        );

        let orphan = RegistryNode::new(103, "Orphan", NodeMeta::empty(NodeKind::Dossier));
        assert!(orphan.parent_candidates().is_empty());
    }

    #[test]
    fn dossier_response_builds_lazy_children() {
        let resp: DossierResponse = serde_json::from_str(
            r#"{
                "dossier": {"id": 100, "registraturPositionId": 10, "name": "Contracts", "laufnummer": "1.1"},
                "childDossiers": [{"id": 101, "registraturPositionId": 10, "parentDossierId": 100, "name": "2024"},
                                  {"id": 102, "registraturPositionId": 10, "parentDossierId": 100, "name": "Old", "status": "Gelöscht"}],
                "documents": [{"id": 7, "dossierId": 100, "titel": "Offer", "status": "Freigegeben"}],
                "permissions": {"canRead": true}
            }"#,
        )
        .unwrap();
        let node = RegistryNode::from_dossier_response(resp);
        assert_eq!(node.load_state, LoadState::LazyLoaded);
        assert_eq!(node.parent_id, Some(10));
        assert_eq!(
            node.parent_candidates(),
            vec![NodeKey::new(10, NodeKind::Position)]
        );
        let keys: Vec<NodeKey> = node.children.iter().map(RegistryNode::key).collect();
        assert_eq!(
            keys,
            vec![
                NodeKey::new(101, NodeKind::Dossier),
                NodeKey::new(102, NodeKind::Dossier),
                NodeKey::new(7, NodeKind::Document)
            ]
        );
        assert_eq!(node.children[0].load_state, LoadState::LazyUnloaded);
        assert_eq!(node.visible_children().count(), 2);
        assert_eq!(node.descendant_count(), 3);
    }
}
