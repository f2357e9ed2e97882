//! Single command entry point registered once around the controller.
//!
//! Requests are `{"action": "...", "payload": {...}}`; every response carries
//! the render signals the command produced.

use crate::controller::NavigationController;
use crate::error::{NavError, Result};
use crate::model::NodeKey;
use crate::ports::{RecordingSink, RenderSignal};
use crate::versions::FileDescriptor;
use dms_protocol::{
    CreateDocumentRequest, CreateDossierRequest, ErrorEnvelope, NodeKind, SearchQuery,
    SearchScope, COMMAND_API_VERSION,
};
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub action: CommandAction,
    #[serde(default = "empty_payload")]
    pub payload: Value,
}

fn empty_payload() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    LoadForest,
    SelectTree,
    NavigateToId,
    Expand,
    CreateDossier,
    CreateDocument,
    CreateVersion,
    DeleteVersion,
    RestoreVersion,
    DeleteEntity,
    RestoreEntity,
    DeletedItems,
    DocumentDetails,
    DownloadCurrent,
    Search,
    Reload,
    State,
}

impl CommandAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            CommandAction::LoadForest => "load_forest",
            CommandAction::SelectTree => "select_tree",
            CommandAction::NavigateToId => "navigate_to_id",
            CommandAction::Expand => "expand",
            CommandAction::CreateDossier => "create_dossier",
            CommandAction::CreateDocument => "create_document",
            CommandAction::CreateVersion => "create_version",
            CommandAction::DeleteVersion => "delete_version",
            CommandAction::RestoreVersion => "restore_version",
            CommandAction::DeleteEntity => "delete_entity",
            CommandAction::RestoreEntity => "restore_entity",
            CommandAction::DeletedItems => "deleted_items",
            CommandAction::DocumentDetails => "document_details",
            CommandAction::DownloadCurrent => "download_current",
            CommandAction::Search => "search",
            CommandAction::Reload => "reload",
            CommandAction::State => "state",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectTreePayload {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct NodePayload {
    pub id: i64,
    pub kind: NodeKind,
}

impl NodePayload {
    fn key(&self) -> NodeKey {
        NodeKey::new(self.id, self.kind)
    }
}

#[derive(Debug, Deserialize)]
pub struct DocumentPayload {
    pub document_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateVersionPayload {
    pub document_id: i64,
    pub file: FileDescriptor,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct VersionPayload {
    pub document_id: i64,
    pub version_id: i64,
    #[serde(default)]
    pub allow_last: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchPayload {
    pub query: String,
    #[serde(default)]
    pub scope: SearchScope,
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl From<SearchPayload> for SearchQuery {
    fn from(payload: SearchPayload) -> Self {
        SearchQuery {
            text: payload.query,
            scope: payload.scope,
            date_from: payload.date_from,
            date_to: payload.date_to,
            mime_type: payload.mime_type,
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Clone)]
pub struct CommandResponse {
    pub version: u32,
    pub action: CommandAction,
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<RenderSignal>,
}

impl CommandResponse {
    pub fn is_error(&self) -> bool {
        matches!(self.status, CommandStatus::Error)
    }
}

pub struct CommandDispatcher {
    controller: Arc<NavigationController>,
    signals: Option<Arc<RecordingSink>>,
}

impl CommandDispatcher {
    pub fn new(controller: Arc<NavigationController>) -> Self {
        Self {
            controller,
            signals: None,
        }
    }

    /// Attaches the sink the controller emits into, so responses carry signals.
    pub fn with_signals(mut self, sink: Arc<RecordingSink>) -> Self {
        self.signals = Some(sink);
        self
    }

    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    pub async fn dispatch(&self, request: CommandRequest) -> CommandResponse {
        let CommandRequest { action, payload } = request;
        debug!("Dispatching {}", action.as_str());
        let outcome = self.route(action, payload).await;
        let signals = self
            .signals
            .as_ref()
            .map(|sink| sink.drain())
            .unwrap_or_default();
        match outcome {
            Ok(result) => CommandResponse {
                version: COMMAND_API_VERSION,
                action,
                status: CommandStatus::Ok,
                result: Some(result),
                error: None,
                signals,
            },
            Err(err) => CommandResponse {
                version: COMMAND_API_VERSION,
                action,
                status: CommandStatus::Error,
                result: None,
                error: Some(err.envelope()),
                signals,
            },
        }
    }

    async fn route(&self, action: CommandAction, payload: Value) -> Result<Value> {
        let controller = &self.controller;
        match action {
            CommandAction::LoadForest => to_value(controller.load_forest().await?),
            CommandAction::Reload => to_value(controller.reload().await?),
            CommandAction::SelectTree => {
                let payload: SelectTreePayload = parse_payload(payload)?;
                to_value(controller.select_tree(payload.index)?)
            }
            CommandAction::NavigateToId => {
                let payload: NodePayload = parse_payload(payload)?;
                to_value(controller.navigate_to_id(payload.id, payload.kind).await?)
            }
            CommandAction::Expand => {
                let payload: NodePayload = parse_payload(payload)?;
                to_value(controller.expand(payload.key()).await?)
            }
            CommandAction::CreateDossier => {
                let request: CreateDossierRequest = parse_payload(payload)?;
                to_value(controller.create_dossier(request).await?)
            }
            CommandAction::CreateDocument => {
                let request: CreateDocumentRequest = parse_payload(payload)?;
                to_value(controller.create_document(request).await?)
            }
            CommandAction::CreateVersion => {
                let payload: CreateVersionPayload = parse_payload(payload)?;
                to_value(
                    controller
                        .create_version(payload.document_id, payload.file, &payload.comment)
                        .await?,
                )
            }
            CommandAction::DeleteVersion => {
                let payload: VersionPayload = parse_payload(payload)?;
                to_value(
                    controller
                        .delete_version(payload.document_id, payload.version_id, payload.allow_last)
                        .await?,
                )
            }
            CommandAction::RestoreVersion => {
                let payload: VersionPayload = parse_payload(payload)?;
                to_value(
                    controller
                        .restore_version(payload.document_id, payload.version_id)
                        .await?,
                )
            }
            CommandAction::DeleteEntity => {
                let payload: NodePayload = parse_payload(payload)?;
                controller.delete_entity(payload.key()).await?;
                Ok(serde_json::json!({ "deleted": payload.key() }))
            }
            CommandAction::RestoreEntity => {
                let payload: NodePayload = parse_payload(payload)?;
                controller.restore_entity(payload.key()).await?;
                Ok(serde_json::json!({ "restored": payload.key() }))
            }
            CommandAction::DeletedItems => to_value(controller.deleted_items().await?),
            CommandAction::DocumentDetails => {
                let payload: DocumentPayload = parse_payload(payload)?;
                to_value(controller.document_details(payload.document_id).await?)
            }
            CommandAction::DownloadCurrent => {
                let payload: DocumentPayload = parse_payload(payload)?;
                to_value(controller.download_current(payload.document_id).await?)
            }
            CommandAction::Search => {
                let payload: SearchPayload = parse_payload(payload)?;
                to_value(controller.search(payload.into()).await?)
            }
            CommandAction::State => to_value(controller.state()),
        }
    }
}

fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|err| NavError::Validation(format!("invalid payload: {err}")))
}

fn to_value<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|err| NavError::Internal(format!("encode result: {err}")))
}
