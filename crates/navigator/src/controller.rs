use crate::cache::{Forest, LoadOutcome, PlanTree, TreeCache};
use crate::config::NavigatorConfig;
use crate::error::{FetchError, NavError, Result};
use crate::inflight::{InFlight, WriteOp};
use crate::model::{Crumb, LoadState, NodeKey, RegistryNode};
use crate::path::{PathResolver, ResolvedPath};
use crate::ports::{
    BillingGate, Credential, CredentialSource, PlanSummary, RegistryFetch, RenderSignal,
    RenderSink,
};
use crate::search::{hits_from_results, normalize_query, SearchHit};
use crate::versions::{
    validate_new_version, DocumentVersion, DownloadTarget, FileDescriptor, VersionChange,
    VersionLedger,
};
use dms_protocol::{
    BalanceCheck, Capability, CreateDocumentRequest, CreateDossierRequest, CreateVersionRequest,
    CreatedEntity, CreatedVersion, DeletedItems, NodeKind, Permissions, SearchQuery,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// External collaborators the controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub fetch: Arc<dyn RegistryFetch>,
    pub billing: Arc<dyn BillingGate>,
    pub credentials: Arc<dyn CredentialSource>,
    pub sink: Arc<dyn RenderSink>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NavigationState {
    pub active_tree: Option<usize>,
    pub current_node: Option<RegistryNode>,
    /// Root to current node, synthetic plan crumb included when present.
    pub current_path: Vec<Crumb>,
    pub permissions: Permissions,
    /// Presentational expand flags.
    pub expanded: BTreeSet<NodeKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedPlan {
    pub plan: PlanSummary,
    pub path: ResolvedPath,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ForestOutcome {
    Selected(SelectedPlan),
    SelectionRequired { plans: Vec<PlanSummary> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavigationOutcome {
    Navigated { path: ResolvedPath },
    Reloaded { forest: ForestOutcome },
}

impl NavigationOutcome {
    pub fn path(&self) -> Option<&ResolvedPath> {
        match self {
            NavigationOutcome::Navigated { path } => Some(path),
            NavigationOutcome::Reloaded {
                forest: ForestOutcome::Selected(selected),
            } => Some(&selected.path),
            NavigationOutcome::Reloaded { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExpandOutcome {
    Loaded { children: usize },
    AlreadyLoading,
    Toggled { expanded: bool },
}

/// Result of a billing-gated operation. A declined check is not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum Gated<T> {
    Completed(T),
    Declined(BalanceCheck),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionCreated {
    pub created: CreatedVersion,
    pub current: Option<i64>,
    pub ledger: VersionLedger,
}

pub struct NavigationController {
    config: NavigatorConfig,
    cache: TreeCache,
    fetch: Arc<dyn RegistryFetch>,
    billing: Arc<dyn BillingGate>,
    credentials: Arc<dyn CredentialSource>,
    sink: Arc<dyn RenderSink>,
    state: Mutex<NavigationState>,
    in_flight: InFlight,
}

impl NavigationController {
    pub fn new(config: NavigatorConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            fetch,
            billing,
            credentials,
            sink,
        } = collaborators;
        Self {
            config,
            cache: TreeCache::new(),
            fetch,
            billing,
            credentials,
            sink,
            state: Mutex::new(NavigationState::default()),
            in_flight: InFlight::new(),
        }
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &TreeCache {
        &self.cache
    }

    pub fn state(&self) -> NavigationState {
        self.lock_state().clone()
    }

    // Lock order: state before forest. Neither is held across an await.
    fn lock_state(&self) -> MutexGuard<'_, NavigationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn credential(&self) -> Result<Credential> {
        self.credentials
            .credential()
            .ok_or(NavError::MissingCredential)
    }

    fn emit(&self, signal: RenderSignal) {
        self.sink.emit(signal);
    }

    fn require(&self, capability: Capability) -> Result<()> {
        if self.lock_state().permissions.allows(capability) {
            Ok(())
        } else {
            Err(NavError::Permission(format!(
                "{capability:?} is not granted here"
            )))
        }
    }

    /// Fetches every accessible plan and selects it when there is only one.
    pub async fn load_forest(&self) -> Result<ForestOutcome> {
        self.load_forest_preferring(None).await
    }

    /// Full reload that keeps the previously active plan selected.
    pub async fn reload(&self) -> Result<ForestOutcome> {
        let previous = self.cache.active_index();
        self.load_forest_preferring(previous).await
    }

    async fn load_forest_preferring(&self, preferred: Option<usize>) -> Result<ForestOutcome> {
        let credential = self.credential()?;
        let trees = match self.fetch.plans(&credential).await {
            Ok(entries) if !entries.is_empty() => {
                entries.into_iter().map(PlanTree::from_entry).collect()
            }
            Ok(_) => {
                info!("No plans listed; using the single-plan endpoint");
                self.single_plan(&credential).await?
            }
            Err(FetchError::MissingCredential) => return Err(NavError::MissingCredential),
            Err(err) => {
                warn!("Listing plans failed ({err}); using the single-plan endpoint");
                self.single_plan(&credential).await?
            }
        };
        self.install_forest(Forest::new(trees), preferred)
    }

    async fn single_plan(&self, credential: &Credential) -> Result<Vec<PlanTree>> {
        let (tree, permissions) = self
            .fetch
            .single_plan(credential)
            .await
            .map_err(|err| NavError::from_fetch(err, "filing plan"))?
            .into_parts();
        Ok(vec![PlanTree::new(
            RegistryNode::from_tree_dto(tree),
            permissions.unwrap_or_default(),
        )])
    }

    fn install_forest(&self, mut forest: Forest, preferred: Option<usize>) -> Result<ForestOutcome> {
        if forest.active_index().is_none() {
            if let Some(index) = preferred.filter(|idx| *idx < forest.len()) {
                forest.select(index)?;
            }
        }
        let active = forest.active_index();
        let plans = forest.summaries();
        *self.lock_state() = NavigationState::default();
        self.cache.replace_forest(forest);
        match active {
            Some(index) => self.select_tree(index).map(ForestOutcome::Selected),
            None => {
                self.emit(RenderSignal::PlanSelection(plans.clone()));
                Ok(ForestOutcome::SelectionRequired { plans })
            }
        }
    }

    /// Makes plan `index` active, resets the path and shows its root.
    pub fn select_tree(&self, index: usize) -> Result<SelectedPlan> {
        let selected = self.cache.select_tree(index)?;
        {
            let mut state = self.lock_state();
            state.active_tree = Some(index);
            state.current_node = None;
            state.current_path.clear();
            state.expanded.clear();
            state.permissions = selected.permissions;
        }
        let path = self.navigate_to(selected.root);
        Ok(SelectedPlan {
            plan: selected.summary,
            path,
        })
    }

    /// Makes `node` current, recomputes the breadcrumb and signals re-render.
    pub fn navigate_to(&self, node: RegistryNode) -> ResolvedPath {
        let key = node.key();
        let (resolved, permissions) = {
            let mut state = self.lock_state();
            let resolved = self.cache.with_active_root(|root| {
                PathResolver::new(
                    root,
                    &state.current_path,
                    &self.config.root_label,
                    self.config.max_path_depth,
                )
                .resolve(&node)
            });
            state.current_path = resolved.crumbs.clone();
            state.current_node = Some(node);
            (resolved, state.permissions)
        };
        self.emit(RenderSignal::BreadcrumbChanged(resolved.crumbs.clone()));
        self.emit(RenderSignal::ContentChanged(key));
        self.emit(RenderSignal::ToolbarChanged(permissions));
        self.emit(RenderSignal::SidebarChanged {
            can_create_dossier: permissions.can_create_dossier
                && matches!(key.kind, NodeKind::Position | NodeKind::Dossier),
            can_create_document: permissions.can_create_document
                && key.kind == NodeKind::Dossier,
        });
        resolved
    }

    /// Breadcrumb clicks and deep links. The cache is consulted first; `(0, Plan)`
    /// is the synthetic root and reloads the forest.
    pub async fn navigate_to_id(&self, id: i64, kind: NodeKind) -> Result<NavigationOutcome> {
        let key = NodeKey::new(id, kind);
        if key.is_synthetic_root() {
            let forest = self.reload().await?;
            return Ok(NavigationOutcome::Reloaded { forest });
        }
        if let Some(node) = self.cache.lookup(key) {
            debug!("{key} served from the tree cache");
            return Ok(NavigationOutcome::Navigated {
                path: self.navigate_to(node),
            });
        }
        if kind == NodeKind::Plan {
            // plans are only reachable through the forest
            if let Some(index) = self.cache.plan_index(id) {
                let selected = self.select_tree(index)?;
                return Ok(NavigationOutcome::Navigated {
                    path: selected.path,
                });
            }
            let forest = self.reload().await?;
            return Ok(NavigationOutcome::Reloaded { forest });
        }
        let node = self.fetch_node(key).await?;
        Ok(NavigationOutcome::Navigated {
            path: self.navigate_to(node),
        })
    }

    async fn fetch_node(&self, key: NodeKey) -> Result<RegistryNode> {
        let credential = self.credential()?;
        let response = self
            .fetch
            .node(&credential, key)
            .await
            .map_err(|err| NavError::from_fetch(err, key))?;
        let (node, permissions) = RegistryNode::from_node_response(response);
        if !node.is(key) {
            return Err(NavError::Load(format!(
                "requested {key}, the server returned {}",
                node.key()
            )));
        }
        self.lock_state().permissions = permissions;
        Ok(node)
    }

    /// Re-fetches the current node (or the whole forest when at a plan root).
    pub async fn refresh_current(&self) -> Result<NavigationOutcome> {
        let current = self.lock_state().current_node.as_ref().map(RegistryNode::key);
        match current {
            Some(key) if key.kind != NodeKind::Plan => {
                let node = self.fetch_node(key).await?;
                Ok(NavigationOutcome::Navigated {
                    path: self.navigate_to(node),
                })
            }
            _ => {
                let forest = self.reload().await?;
                Ok(NavigationOutcome::Reloaded { forest })
            }
        }
    }

    async fn refresh_after_write(&self) {
        if let Err(err) = self.refresh_current().await {
            warn!("Refreshing the current view failed: {err}");
        }
    }

    async fn refresh_if_showing(&self, key: NodeKey) {
        let showing = self
            .lock_state()
            .current_node
            .as_ref()
            .is_some_and(|node| node.is(key));
        if showing {
            self.refresh_after_write().await;
        }
    }

    pub async fn expand(&self, key: NodeKey) -> Result<ExpandOutcome> {
        let load_state = self
            .cache
            .load_state(key)
            .ok_or_else(|| NavError::NotFound(format!("{key} is not in the active plan")))?;
        match load_state {
            LoadState::LazyUnloaded => {
                let credential = self.credential()?;
                match self
                    .cache
                    .load_children(self.fetch.as_ref(), &credential, key)
                    .await?
                {
                    LoadOutcome::Loaded(children) => {
                        // the plan may have been switched during the fetch
                        if self.cache.load_state(key).is_some() {
                            self.lock_state().expanded.insert(key);
                            self.emit(RenderSignal::TreeChanged(key));
                        }
                        Ok(ExpandOutcome::Loaded {
                            children: children.len(),
                        })
                    }
                    LoadOutcome::AlreadyLoading => Ok(ExpandOutcome::AlreadyLoading),
                }
            }
            LoadState::LazyLoading => Ok(ExpandOutcome::AlreadyLoading),
            LoadState::Eager | LoadState::LazyLoaded => {
                let expanded = {
                    let mut state = self.lock_state();
                    if state.expanded.remove(&key) {
                        false
                    } else {
                        state.expanded.insert(key);
                        true
                    }
                };
                self.emit(RenderSignal::TreeChanged(key));
                Ok(ExpandOutcome::Toggled { expanded })
            }
        }
    }

    /// Returns the declining answer, or `None` when the operation may proceed.
    async fn balance_declined(
        &self,
        credential: &Credential,
        operation: &str,
    ) -> Result<Option<BalanceCheck>> {
        match self.billing.check_balance(credential, operation, 0.0).await {
            Ok(check) if check.can_afford => {
                debug!("Billing approved {operation}");
                Ok(None)
            }
            Ok(check) => {
                info!(
                    "Billing declined {operation}: balance {} below required {}",
                    check.current_balance, check.required_amount
                );
                Ok(Some(check))
            }
            Err(err) if self.config.billing_fail_open => {
                warn!("Billing check for {operation} failed, proceeding: {err}");
                Ok(None)
            }
            Err(err) => Err(NavError::from_fetch(
                err,
                format!("billing check for {operation}"),
            )),
        }
    }

    pub async fn create_dossier(
        &self,
        request: CreateDossierRequest,
    ) -> Result<Gated<CreatedEntity>> {
        self.require(Capability::CreateDossier)?;
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(NavError::Validation("a dossier name is required".into()));
        }
        if request.position_id <= 0 {
            return Err(NavError::Validation(
                "a dossier needs a registry position".into(),
            ));
        }
        let request = CreateDossierRequest {
            name,
            description: trimmed(request.description),
            ..request
        };
        let target = match request.parent_dossier_id {
            Some(id) => NodeKey::new(id, NodeKind::Dossier),
            None => NodeKey::new(request.position_id, NodeKind::Position),
        };
        let credential = self.credential()?;
        let _token = self.in_flight.acquire(WriteOp::CreateDossier, target)?;
        if let Some(check) = self
            .balance_declined(&credential, &self.config.dossier_create_tag)
            .await?
        {
            return Ok(Gated::Declined(check));
        }
        let created = self
            .fetch
            .create_dossier(&credential, &request)
            .await
            .map_err(|err| NavError::from_fetch(err, format!("create dossier under {target}")))?;
        info!("Created dossier {} under {target}", created.id);
        self.refresh_after_write().await;
        Ok(Gated::Completed(created))
    }

    pub async fn create_document(
        &self,
        request: CreateDocumentRequest,
    ) -> Result<Gated<CreatedEntity>> {
        self.require(Capability::CreateDocument)?;
        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(NavError::Validation("a document title is required".into()));
        }
        if request.dossier_id <= 0 {
            return Err(NavError::Validation("a document needs a dossier".into()));
        }
        let request = CreateDocumentRequest {
            title,
            description: trimmed(request.description),
            ..request
        };
        let target = NodeKey::new(request.dossier_id, NodeKind::Dossier);
        let credential = self.credential()?;
        let _token = self.in_flight.acquire(WriteOp::CreateDocument, target)?;
        if let Some(check) = self
            .balance_declined(&credential, &self.config.document_create_tag)
            .await?
        {
            return Ok(Gated::Declined(check));
        }
        let created = self
            .fetch
            .create_document(&credential, &request)
            .await
            .map_err(|err| NavError::from_fetch(err, format!("create document in {target}")))?;
        info!("Created document {} in {target}", created.id);
        self.refresh_after_write().await;
        Ok(Gated::Completed(created))
    }

    /// Fresh ledger of a document, straight from the server.
    pub async fn document_details(&self, document_id: i64) -> Result<VersionLedger> {
        let credential = self.credential()?;
        let response = self
            .fetch
            .document(&credential, document_id)
            .await
            .map_err(|err| {
                NavError::from_fetch(err, NodeKey::new(document_id, NodeKind::Document))
            })?;
        Ok(VersionLedger::from_response(response))
    }

    pub async fn deleted_items(&self) -> Result<DeletedItems> {
        let credential = self.credential()?;
        self.fetch
            .deleted_items(&credential)
            .await
            .map_err(|err| NavError::from_fetch(err, "deleted items"))
    }

    /// Full-text search. The store charges each search itself, so there is no
    /// balance pre-check; its 402 answer becomes `Gated::Declined`.
    pub async fn search(&self, query: SearchQuery) -> Result<Gated<Vec<SearchHit>>> {
        let query = normalize_query(query)?;
        let credential = self.credential()?;
        match self.fetch.search(&credential, &query).await {
            Ok(results) => {
                let hits = hits_from_results(results);
                info!("Search for {:?} found {} hit(s)", query.text, hits.len());
                Ok(Gated::Completed(hits))
            }
            Err(FetchError::Status {
                status: 402,
                message,
            }) => {
                info!("Search for {:?} declined by billing: {message}", query.text);
                Ok(Gated::Declined(BalanceCheck::insufficient(0.0, 0.0)))
            }
            Err(err) => Err(NavError::from_fetch(
                err,
                format!("search for {:?}", query.text),
            )),
        }
    }

    /// The document endpoint lists active versions only; deleted ones are
    /// merged in from the deleted-items listing when `version_id` is missing.
    async fn ledger_with_version(&self, document_id: i64, version_id: i64) -> Result<VersionLedger> {
        let mut ledger = self.document_details(document_id).await?;
        if ledger.version(version_id).is_none() {
            let items = self.deleted_items().await?;
            let merged = ledger.merge_deleted(items.document_versions);
            debug!("Merged {merged} deleted version(s) into document {document_id}");
        }
        Ok(ledger)
    }

    pub async fn create_version(
        &self,
        document_id: i64,
        file: FileDescriptor,
        comment: &str,
    ) -> Result<VersionCreated> {
        self.require(Capability::ManageVersions)?;
        let comment = validate_new_version(&file, comment)?;
        let target = NodeKey::new(document_id, NodeKind::Document);
        let credential = self.credential()?;
        let _token = self.in_flight.acquire(WriteOp::CreateVersion, target)?;
        let request = CreateVersionRequest {
            document_id,
            filename: file.filename.clone(),
            mime_type: file.mime_type.clone(),
            content_hash: file.content_hash.clone(),
            size_bytes: file.size_bytes,
            comment: Some(comment.clone()),
        };
        let created = self
            .fetch
            .create_version(&credential, &request)
            .await
            .map_err(|err| NavError::from_fetch(err, format!("new version of {target}")))?;
        info!(
            "Created version {} (#{}) of document {document_id}",
            created.id, created.version_number
        );

        let mut ledger = self.document_details(document_id).await?;
        if ledger.version(created.id).is_none() {
            let local = DocumentVersion::created(document_id, created, &file, &comment);
            if let Err(err) = ledger.apply_created(local) {
                warn!("Could not record version {} locally: {err}", created.id);
            }
        }
        let current = ledger.current().map(|version| version.id);
        if current != Some(created.id) {
            warn!(
                "Version {} of document {document_id} was created but {current:?} resolves as current",
                created.id
            );
        }
        self.refresh_if_showing(target).await;
        Ok(VersionCreated {
            created,
            current,
            ledger,
        })
    }

    /// Soft-deletes a version. The ledger is re-derived from the server first,
    /// so a version that is already deleted yields `StaleReference`.
    pub async fn delete_version(
        &self,
        document_id: i64,
        version_id: i64,
        allow_last: bool,
    ) -> Result<VersionChange> {
        self.require(Capability::ManageVersions)?;
        let target = NodeKey::new(document_id, NodeKind::Document);
        let credential = self.credential()?;
        let _token = self.in_flight.acquire(WriteOp::DeleteVersion, target)?;
        let mut ledger = self.ledger_with_version(document_id, version_id).await?;
        let change = ledger.soft_delete(version_id, None, self.config.delete_policy(allow_last))?;
        self.fetch
            .delete_version(&credential, document_id, version_id)
            .await
            .map_err(|err| {
                NavError::from_fetch(err, format!("delete version {version_id} of {target}"))
            })?;
        info!(
            "Deleted version {version_id} of document {document_id}, current now {:?}",
            change.current
        );
        self.refresh_if_showing(target).await;
        Ok(change)
    }

    pub async fn restore_version(&self, document_id: i64, version_id: i64) -> Result<VersionChange> {
        self.require(Capability::ManageVersions)?;
        let target = NodeKey::new(document_id, NodeKind::Document);
        let credential = self.credential()?;
        let _token = self.in_flight.acquire(WriteOp::RestoreVersion, target)?;
        let mut ledger = self.ledger_with_version(document_id, version_id).await?;
        let change = ledger.restore(version_id)?;
        self.fetch
            .restore_version(&credential, document_id, version_id)
            .await
            .map_err(|err| {
                NavError::from_fetch(err, format!("restore version {version_id} of {target}"))
            })?;
        info!(
            "Restored version {version_id} of document {document_id}, current now {:?}",
            change.current
        );
        self.refresh_if_showing(target).await;
        Ok(change)
    }

    /// "Download current" always resolves against a fresh ledger.
    pub async fn download_current(&self, document_id: i64) -> Result<DownloadTarget> {
        self.document_details(document_id)
            .await?
            .download_target()
            .ok_or_else(|| {
                NavError::NotFound(format!("document {document_id} has no active version"))
            })
    }

    pub async fn delete_entity(&self, key: NodeKey) -> Result<()> {
        ensure_entity(key)?;
        self.require(Capability::Delete)?;
        let credential = self.credential()?;
        let _token = self.in_flight.acquire(WriteOp::DeleteEntity, key)?;
        self.fetch
            .delete_entity(&credential, key)
            .await
            .map_err(|err| NavError::from_fetch(err, format!("delete {key}")))?;
        info!("Soft-deleted {key}");
        self.refresh_after_removal(key).await;
        Ok(())
    }

    pub async fn restore_entity(&self, key: NodeKey) -> Result<()> {
        ensure_entity(key)?;
        self.require(Capability::Delete)?;
        let credential = self.credential()?;
        let _token = self.in_flight.acquire(WriteOp::RestoreEntity, key)?;
        self.fetch
            .restore_entity(&credential, key)
            .await
            .map_err(|err| NavError::from_fetch(err, format!("restore {key}")))?;
        info!("Restored {key}");
        self.refresh_after_write().await;
        Ok(())
    }

    /// After deleting the node on screen, move to a freshly fetched container
    /// instead of re-fetching something that is gone. The cached copy of the
    /// container may still list the deleted entry, so it is not used.
    async fn refresh_after_removal(&self, key: NodeKey) {
        let parent = {
            let state = self.lock_state();
            state
                .current_node
                .as_ref()
                .filter(|node| node.is(key))
                .and_then(|node| node.parent_candidates().first().copied())
        };
        let Some(parent) = parent.filter(|parent| parent.kind != NodeKind::Plan) else {
            self.refresh_after_write().await;
            return;
        };
        match self.fetch_node(parent).await {
            Ok(node) => {
                self.navigate_to(node);
            }
            Err(err) => {
                warn!("Fetching {parent} after deleting {key} failed ({err}); reloading");
                if let Err(err) = self.reload().await {
                    warn!("Reload after deleting {key} failed: {err}");
                }
            }
        }
    }
}

fn ensure_entity(key: NodeKey) -> Result<()> {
    match key.kind {
        NodeKind::Document | NodeKind::Dossier => Ok(()),
        kind => Err(NavError::Validation(format!(
            "only documents and dossiers can be deleted or restored, not {kind}"
        ))),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
