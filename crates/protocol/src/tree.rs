use crate::{NodeKind, Permissions};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Registry entry as served by the tree endpoints.
///
/// `metadata` is a loosely typed bag; the server mostly sends strings but the
/// node-by-id endpoints embed whole entity objects, so values are kept as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TreeNodeDto {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub children: Vec<TreeNodeDto>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl TreeNodeDto {
    pub fn metadata_text(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn metadata_int(&self, key: &str) -> Option<i64> {
        match self.metadata.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn metadata_flag(&self, key: &str) -> Option<bool> {
        match self.metadata.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanDto {
    pub id: i64,
    pub name: String,
    #[serde(default, rename = "beschreibung", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// One accessible filing plan together with its lightweight tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub plan: PlanDto,
    pub tree: TreeNodeDto,
    #[serde(default)]
    pub is_personal: bool,
    #[serde(default)]
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlansResponse {
    #[serde(default)]
    pub plans: Vec<PlanEntry>,
}

/// Legacy single-plan response: either `{tree, permissions}` or a bare tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SinglePlanResponse {
    WithPermissions {
        tree: TreeNodeDto,
        permissions: Permissions,
    },
    Bare(TreeNodeDto),
}

impl SinglePlanResponse {
    pub fn into_parts(self) -> (TreeNodeDto, Option<Permissions>) {
        match self {
            SinglePlanResponse::WithPermissions { tree, permissions } => (tree, Some(permissions)),
            SinglePlanResponse::Bare(tree) => (tree, None),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChildrenResponse {
    #[serde(default)]
    pub children: Vec<TreeNodeDto>,
}
