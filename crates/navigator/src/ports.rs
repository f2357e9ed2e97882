//! Collaborator interfaces. The navigator performs no I/O of its own; every
//! remote call goes through one of these traits.

use crate::error::FetchResult;
use crate::model::{Crumb, NodeKey};
use async_trait::async_trait;
use dms_protocol::{
    BalanceCheck, CreateDocumentRequest, CreateDossierRequest, CreateVersionRequest,
    CreatedEntity, CreatedVersion, DeletedItems, DocumentResponse, NodeResponse, Permissions,
    PlanEntry, SearchQuery, SearchResults, SinglePlanResponse, TreeNodeDto,
};
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Bearer token attached to every collaborator call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank tokens.
    pub fn bearer(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

pub trait CredentialSource: Send + Sync {
    fn credential(&self) -> Option<Credential>;
}

/// Fixed credential, used by tests and by the binary when `--token` is given.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(Option<Credential>);

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Credential::bearer(token))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialSource for StaticCredentials {
    fn credential(&self) -> Option<Credential> {
        self.0.clone()
    }
}

#[async_trait]
pub trait RegistryFetch: Send + Sync {
    async fn plans(&self, credential: &Credential) -> FetchResult<Vec<PlanEntry>>;

    /// Legacy endpoint used when the plan listing is empty or unavailable.
    async fn single_plan(&self, credential: &Credential) -> FetchResult<SinglePlanResponse>;

    async fn tree_children(
        &self,
        credential: &Credential,
        key: NodeKey,
    ) -> FetchResult<Vec<TreeNodeDto>>;

    async fn node(&self, credential: &Credential, key: NodeKey) -> FetchResult<NodeResponse>;

    async fn document(
        &self,
        credential: &Credential,
        document_id: i64,
    ) -> FetchResult<DocumentResponse>;

    async fn create_version(
        &self,
        credential: &Credential,
        request: &CreateVersionRequest,
    ) -> FetchResult<CreatedVersion>;

    async fn delete_version(
        &self,
        credential: &Credential,
        document_id: i64,
        version_id: i64,
    ) -> FetchResult<()>;

    async fn restore_version(
        &self,
        credential: &Credential,
        document_id: i64,
        version_id: i64,
    ) -> FetchResult<()>;

    async fn create_dossier(
        &self,
        credential: &Credential,
        request: &CreateDossierRequest,
    ) -> FetchResult<CreatedEntity>;

    async fn create_document(
        &self,
        credential: &Credential,
        request: &CreateDocumentRequest,
    ) -> FetchResult<CreatedEntity>;

    async fn delete_entity(&self, credential: &Credential, key: NodeKey) -> FetchResult<()>;

    async fn restore_entity(&self, credential: &Credential, key: NodeKey) -> FetchResult<()>;

    async fn deleted_items(&self, credential: &Credential) -> FetchResult<DeletedItems>;

    /// Full-text search; the store charges per call and answers 402 on low balance.
    async fn search(
        &self,
        credential: &Credential,
        query: &SearchQuery,
    ) -> FetchResult<SearchResults>;
}

#[async_trait]
pub trait BillingGate: Send + Sync {
    async fn check_balance(
        &self,
        credential: &Credential,
        operation: &str,
        extra_cost: f64,
    ) -> FetchResult<BalanceCheck>;
}

/// Billing gate for deployments without a billing service.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBilling;

#[async_trait]
impl BillingGate for NoBilling {
    async fn check_balance(
        &self,
        _credential: &Credential,
        _operation: &str,
        extra_cost: f64,
    ) -> FetchResult<BalanceCheck> {
        Ok(BalanceCheck::affordable(f64::INFINITY, extra_cost))
    }
}

/// Entry of the plan chooser shown when several plans are accessible.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub index: usize,
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_personal: bool,
    pub dossier_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "signal", content = "data", rename_all = "snake_case")]
pub enum RenderSignal {
    BreadcrumbChanged(Vec<Crumb>),
    ContentChanged(NodeKey),
    ToolbarChanged(Permissions),
    SidebarChanged {
        can_create_dossier: bool,
        can_create_document: bool,
    },
    TreeChanged(NodeKey),
    PlanSelection(Vec<PlanSummary>),
}

pub trait RenderSink: Send + Sync {
    fn emit(&self, signal: RenderSignal);
}

/// Collects emitted signals until drained.
#[derive(Debug, Default)]
pub struct RecordingSink {
    signals: Mutex<Vec<RenderSignal>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<RenderSignal> {
        std::mem::take(&mut *self.signals.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn snapshot(&self) -> Vec<RenderSignal> {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RenderSink for RecordingSink {
    fn emit(&self, signal: RenderSignal) {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(signal);
    }
}
