use crate::versions::DeletePolicy;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ROOT_LABEL: &str = "Filing plan";
pub const DEFAULT_MAX_PATH_DEPTH: usize = 64;
pub const DOSSIER_CREATE_TAG: &str = "DOSSIER_CREATE";
pub const DOCUMENT_CREATE_TAG: &str = "DOCUMENT_CREATE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Label of the synthetic plan breadcrumb.
    pub root_label: String,
    /// Proceed with a gated create when the billing service itself fails.
    pub billing_fail_open: bool,
    pub protect_current_version: bool,
    pub max_path_depth: usize,
    pub dossier_create_tag: String,
    pub document_create_tag: String,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            root_label: DEFAULT_ROOT_LABEL.to_string(),
            billing_fail_open: true,
            protect_current_version: true,
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
            dossier_create_tag: DOSSIER_CREATE_TAG.to_string(),
            document_create_tag: DOCUMENT_CREATE_TAG.to_string(),
        }
    }
}

impl NavigatorConfig {
    pub fn delete_policy(&self, allow_last: bool) -> DeletePolicy {
        DeletePolicy {
            allow_last,
            protect_current: self.protect_current_version,
        }
    }
}
