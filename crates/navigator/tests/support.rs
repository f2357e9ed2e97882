#![allow(dead_code)]

use async_trait::async_trait;
use dms_navigator::{
    BillingGate, Collaborators, Credential, CredentialSource, FetchError, FetchResult,
    NavigationController, NavigatorConfig, NodeKey, RecordingSink, RegistryFetch,
};
use dms_protocol::{
    BalanceCheck, CreateDocumentRequest, CreateDossierRequest, CreateVersionRequest,
    CreatedEntity, CreatedVersion, DeletedItems, DeletedVersionEntry, DocumentDto,
    DocumentHit, DocumentResponse, DossierDto, DossierResponse, NodeKind, NodeResponse,
    Permissions, PlanDto, PlanEntry, SearchQuery, SearchResults, SearchScope, SinglePlanResponse,
    TreeNodeDto, VersionDto,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn tree_node(id: i64, kind: NodeKind, name: &str, lazy: bool, children: Vec<TreeNodeDto>) -> TreeNodeDto {
    let mut metadata = BTreeMap::new();
    if lazy {
        metadata.insert("lazy".to_string(), Value::String("true".into()));
        metadata.insert("hasChildren".to_string(), Value::String("true".into()));
    }
    TreeNodeDto {
        id,
        name: name.to_string(),
        kind,
        parent_id: None,
        children,
        metadata,
    }
}

pub fn plan_entry(id: i64, name: &str, tree: TreeNodeDto) -> PlanEntry {
    PlanEntry {
        plan: PlanDto {
            id,
            name: name.to_string(),
            description: None,
            status: None,
        },
        tree,
        is_personal: false,
        permissions: Permissions::all(),
    }
}

/// Plan(1) eager → Position(10) lazy, Position(11) eager with Dossier(200).
pub fn standard_plan() -> PlanEntry {
    plan_entry(
        1,
        "Main plan",
        tree_node(
            1,
            NodeKind::Plan,
            "Main plan",
            false,
            vec![
                tree_node(10, NodeKind::Position, "Finance", true, vec![]),
                tree_node(
                    11,
                    NodeKind::Position,
                    "Staff",
                    false,
                    vec![tree_node(200, NodeKind::Dossier, "Contracts", true, vec![])],
                ),
            ],
        ),
    )
}

pub fn version_dto(id: i64, document_id: i64, number: u32, deleted: bool) -> VersionDto {
    VersionDto {
        id,
        document_id,
        version_number: number,
        filename: format!("v{number}.pdf"),
        size_bytes: 100 * u64::from(number),
        mime_type: "application/pdf".into(),
        content_hash: format!("hash-{id}"),
        comment: Some(format!("version {number}")),
        status: deleted.then(|| "Gelöscht".to_string()),
        created_at: None,
        deleted_at: None,
    }
}

pub fn document_dto(id: i64, dossier_id: i64, title: &str) -> DocumentDto {
    DocumentDto {
        id,
        dossier_id,
        title: title.to_string(),
        current_version_id: None,
        status: Some("Entwurf".into()),
        created_at: None,
        description: None,
        deleted_at: None,
    }
}

pub fn dossier_dto(id: i64, position_id: i64, parent: Option<i64>, name: &str) -> DossierDto {
    DossierDto {
        id,
        position_id: Some(position_id),
        parent_dossier_id: parent,
        name: name.to_string(),
        running_number: None,
        position_number: None,
        unique_running_number: None,
        status: None,
        publicly_shared: false,
        created_at: None,
        description: None,
    }
}

/// In-memory document store. Records every call; versions live in a flat
/// list and the document endpoint only returns active ones, like the server.
#[derive(Default)]
pub struct FakeStore {
    pub plans: Mutex<Vec<PlanEntry>>,
    pub single_plan: Mutex<Option<SinglePlanResponse>>,
    pub children: Mutex<HashMap<NodeKey, Vec<TreeNodeDto>>>,
    pub nodes: Mutex<HashMap<NodeKey, NodeResponse>>,
    pub documents: Mutex<HashMap<i64, DocumentDto>>,
    pub versions: Mutex<Vec<VersionDto>>,
    pub fail_children: Mutex<HashSet<NodeKey>>,
    pub calls: Mutex<Vec<String>>,
    /// Answer searches with 402, as the store does on a low balance.
    pub search_unpaid: AtomicBool,
    children_gate: Mutex<Option<Arc<Notify>>>,
    pub children_started: Notify,
    next_id: AtomicI64,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            ..Self::default()
        }
    }

    pub fn with_plans(plans: Vec<PlanEntry>) -> Self {
        let store = Self::new();
        *store.plans.lock().unwrap() = plans;
        store
    }

    pub fn set_children(&self, key: NodeKey, children: Vec<TreeNodeDto>) {
        self.children.lock().unwrap().insert(key, children);
    }

    pub fn set_node(&self, key: NodeKey, response: NodeResponse) {
        self.nodes.lock().unwrap().insert(key, response);
    }

    pub fn add_document(&self, document: DocumentDto, versions: Vec<VersionDto>) {
        let key = NodeKey::new(document.id, NodeKind::Document);
        self.set_node(
            key,
            NodeResponse::Document(DocumentResponse {
                document: document.clone(),
                versions: Vec::new(),
                permissions: Permissions::all(),
            }),
        );
        self.documents.lock().unwrap().insert(document.id, document);
        self.versions.lock().unwrap().extend(versions);
    }

    pub fn add_dossier(&self, dossier: DossierDto, documents: Vec<DocumentDto>) {
        let key = NodeKey::new(dossier.id, NodeKind::Dossier);
        self.set_node(
            key,
            NodeResponse::Dossier(DossierResponse {
                dossier,
                child_dossiers: Vec::new(),
                documents,
                permissions: Permissions::all(),
            }),
        );
    }

    /// Holds every children fetch until the returned handle is notified.
    pub fn hold_children(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.children_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|call| call.starts_with(prefix)).count()
    }

    pub fn write_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                call.starts_with("POST") || call.starts_with("PUT") || call.starts_with("DELETE")
            })
            .count()
    }

    fn version_status(&self, document_id: i64, version_id: i64, deleted: bool) -> FetchResult<()> {
        let mut versions = self.versions.lock().unwrap();
        let version = versions
            .iter_mut()
            .find(|v| v.id == version_id && v.document_id == document_id)
            .ok_or_else(|| not_found("Version nicht gefunden"))?;
        version.status = deleted.then(|| "Gelöscht".to_string());
        Ok(())
    }
}

fn not_found(message: &str) -> FetchError {
    FetchError::Status {
        status: 404,
        message: message.to_string(),
    }
}

#[async_trait]
impl RegistryFetch for FakeStore {
    async fn plans(&self, _credential: &Credential) -> FetchResult<Vec<PlanEntry>> {
        self.record("GET plans".into());
        Ok(self.plans.lock().unwrap().clone())
    }

    async fn single_plan(&self, _credential: &Credential) -> FetchResult<SinglePlanResponse> {
        self.record("GET plan".into());
        self.single_plan
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| not_found("Kein Registraturplan"))
    }

    async fn tree_children(&self, _credential: &Credential, key: NodeKey) -> FetchResult<Vec<TreeNodeDto>> {
        self.record(format!("GET children {key}"));
        self.children_started.notify_one();
        let gate = self.children_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_children.lock().unwrap().remove(&key) {
            return Err(FetchError::Status {
                status: 500,
                message: "Fehler beim Laden".into(),
            });
        }
        Ok(self.children.lock().unwrap().get(&key).cloned().unwrap_or_default())
    }

    async fn node(&self, _credential: &Credential, key: NodeKey) -> FetchResult<NodeResponse> {
        self.record(format!("GET node {key}"));
        self.nodes
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found("nicht gefunden"))
    }

    async fn document(&self, _credential: &Credential, document_id: i64) -> FetchResult<DocumentResponse> {
        self.record(format!("GET document {document_id}"));
        let document = self
            .documents
            .lock()
            .unwrap()
            .get(&document_id)
            .cloned()
            .ok_or_else(|| not_found("Dokument nicht gefunden"))?;
        let versions = self
            .versions
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.document_id == document_id && !v.is_deleted())
            .cloned()
            .collect();
        Ok(DocumentResponse {
            document,
            versions,
            permissions: Permissions::all(),
        })
    }

    async fn create_version(
        &self,
        _credential: &Credential,
        request: &CreateVersionRequest,
    ) -> FetchResult<CreatedVersion> {
        self.record(format!("POST version {}", request.document_id));
        let mut versions = self.versions.lock().unwrap();
        let next = versions
            .iter()
            .filter(|v| v.document_id == request.document_id)
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        versions.push(VersionDto {
            id,
            document_id: request.document_id,
            version_number: next,
            filename: request.filename.clone(),
            size_bytes: request.size_bytes,
            mime_type: request.mime_type.clone(),
            content_hash: request.content_hash.clone(),
            comment: request.comment.clone(),
            status: None,
            created_at: None,
            deleted_at: None,
        });
        Ok(CreatedVersion {
            id,
            version_number: next,
        })
    }

    async fn delete_version(&self, _credential: &Credential, document_id: i64, version_id: i64) -> FetchResult<()> {
        self.record(format!("DELETE version {document_id}/{version_id}"));
        self.version_status(document_id, version_id, true)
    }

    async fn restore_version(&self, _credential: &Credential, document_id: i64, version_id: i64) -> FetchResult<()> {
        self.record(format!("PUT version {document_id}/{version_id}"));
        self.version_status(document_id, version_id, false)
    }

    async fn create_dossier(&self, _credential: &Credential, request: &CreateDossierRequest) -> FetchResult<CreatedEntity> {
        self.record(format!("POST dossier {}", request.name));
        Ok(CreatedEntity {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            running_number: Some("1.1".into()),
        })
    }

    async fn create_document(&self, _credential: &Credential, request: &CreateDocumentRequest) -> FetchResult<CreatedEntity> {
        self.record(format!("POST document {}", request.title));
        Ok(CreatedEntity {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            running_number: None,
        })
    }

    async fn delete_entity(&self, _credential: &Credential, key: NodeKey) -> FetchResult<()> {
        self.record(format!("DELETE entity {key}"));
        Ok(())
    }

    async fn restore_entity(&self, _credential: &Credential, key: NodeKey) -> FetchResult<()> {
        self.record(format!("PUT entity {key}"));
        Ok(())
    }

    async fn deleted_items(&self, _credential: &Credential) -> FetchResult<DeletedItems> {
        self.record("GET deleted-items".into());
        let document_versions = self
            .versions
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.is_deleted())
            .map(|v| DeletedVersionEntry {
                version: v.clone(),
                document_title: String::new(),
            })
            .collect();
        Ok(DeletedItems {
            documents: Vec::new(),
            dossiers: Vec::new(),
            document_versions,
        })
    }

    async fn search(&self, _credential: &Credential, query: &SearchQuery) -> FetchResult<SearchResults> {
        self.record(format!("GET search {}", query.text));
        if self.search_unpaid.load(Ordering::SeqCst) {
            return Err(FetchError::Status {
                status: 402,
                message: "Insufficient CardCoin balance".into(),
            });
        }
        let needle = query.text.to_lowercase();
        let mut results = SearchResults::default();
        if query.scope != SearchScope::Dossier {
            let mut documents: Vec<DocumentDto> = self
                .documents
                .lock()
                .unwrap()
                .values()
                .filter(|document| document.title.to_lowercase().contains(&needle))
                .cloned()
                .collect();
            documents.sort_by_key(|document| document.id);
            results.documents = documents
                .into_iter()
                .map(|document| DocumentHit {
                    document,
                    matched_version: None,
                    match_type: "document_title".into(),
                    match_preview: None,
                })
                .collect();
        }
        if query.scope != SearchScope::Document {
            let mut dossiers: Vec<DossierDto> = self
                .nodes
                .lock()
                .unwrap()
                .values()
                .filter_map(|node| match node {
                    NodeResponse::Dossier(resp) => Some(resp.dossier.clone()),
                    _ => None,
                })
                .filter(|dossier| dossier.name.to_lowercase().contains(&needle))
                .collect();
            dossiers.sort_by_key(|dossier| dossier.id);
            results.dossiers = dossiers;
        }
        results.total_count = results.documents.len() + results.dossiers.len();
        Ok(results)
    }
}

pub struct FakeBilling {
    answer: Mutex<FetchResult<BalanceCheck>>,
    pub checks: AtomicUsize,
}

impl FakeBilling {
    pub fn affordable() -> Self {
        Self::answering(Ok(BalanceCheck::affordable(50.0, 1.0)))
    }

    pub fn answering(answer: FetchResult<BalanceCheck>) -> Self {
        Self {
            answer: Mutex::new(answer),
            checks: AtomicUsize::new(0),
        }
    }

    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BillingGate for FakeBilling {
    async fn check_balance(&self, _credential: &Credential, _operation: &str, _extra_cost: f64) -> FetchResult<BalanceCheck> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.answer.lock().unwrap().clone()
    }
}

/// Token source that can be revoked mid-session, like an expired login.
pub struct SessionCredentials {
    token: Mutex<Option<Credential>>,
}

impl SessionCredentials {
    pub fn new(token: &str) -> Self {
        Self {
            token: Mutex::new(Credential::bearer(token)),
        }
    }

    pub fn revoke(&self) {
        *self.token.lock().unwrap() = None;
    }
}

impl CredentialSource for SessionCredentials {
    fn credential(&self) -> Option<Credential> {
        self.token.lock().unwrap().clone()
    }
}

pub struct Harness {
    pub controller: Arc<NavigationController>,
    pub store: Arc<FakeStore>,
    pub billing: Arc<FakeBilling>,
    pub sink: Arc<RecordingSink>,
    pub credentials: Arc<SessionCredentials>,
}

pub fn harness_with(store: FakeStore, billing: FakeBilling, config: NavigatorConfig) -> Harness {
    let store = Arc::new(store);
    let billing = Arc::new(billing);
    let sink = Arc::new(RecordingSink::new());
    let credentials = Arc::new(SessionCredentials::new("test-token"));
    let controller = Arc::new(NavigationController::new(
        config,
        Collaborators {
            fetch: store.clone(),
            billing: billing.clone(),
            credentials: credentials.clone(),
            sink: sink.clone(),
        },
    ));
    Harness {
        controller,
        store,
        billing,
        sink,
        credentials,
    }
}

pub fn harness(store: FakeStore) -> Harness {
    harness_with(store, FakeBilling::affordable(), NavigatorConfig::default())
}
