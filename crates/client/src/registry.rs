use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::HttpCore;
use async_trait::async_trait;
use dms_navigator::{Credential, FetchError, FetchResult, NodeKey, RegistryFetch};
use dms_protocol::{
    ChildrenResponse, CreateDocumentRequest, CreateDossierRequest, CreateVersionRequest,
    CreatedEntity, CreatedVersion, DeletedItems, DocumentResponse, DossierResponse, NodeKind,
    NodeResponse, PlanEntry, PlansResponse, PositionResponse, SearchQuery, SearchResults,
    SinglePlanResponse, TreeNodeDto,
};
use log::debug;
use reqwest::Method;

/// [`RegistryFetch`] over the document store's REST API.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    core: HttpCore,
}

impl HttpRegistryClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            core: HttpCore::new(config)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.core.base_url()
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, credential: &Credential, path: &str) -> FetchResult<T> {
        self.core
            .json(self.core.request(Method::GET, path, credential))
            .await
    }
}

fn entity_path(key: NodeKey) -> FetchResult<String> {
    match key.kind {
        NodeKind::Document | NodeKind::Dossier => {
            Ok(format!("/dms/{}/{}", key.kind.as_path_segment(), key.id))
        }
        kind => Err(FetchError::Status {
            status: 405,
            message: format!("{kind} entries cannot be deleted or restored"),
        }),
    }
}

#[async_trait]
impl RegistryFetch for HttpRegistryClient {
    async fn plans(&self, credential: &Credential) -> FetchResult<Vec<PlanEntry>> {
        let response: PlansResponse = self.get(credential, "/dms/registraturplan/all").await?;
        debug!("Server listed {} plan(s)", response.plans.len());
        Ok(response.plans)
    }

    async fn single_plan(&self, credential: &Credential) -> FetchResult<SinglePlanResponse> {
        self.get(credential, "/dms/registraturplan").await
    }

    async fn tree_children(&self, credential: &Credential, key: NodeKey) -> FetchResult<Vec<TreeNodeDto>> {
        let path = format!("/dms/tree/{}/{}/children", key.kind.as_path_segment(), key.id);
        let response: ChildrenResponse = self.get(credential, &path).await?;
        Ok(response.children)
    }

    async fn node(&self, credential: &Credential, key: NodeKey) -> FetchResult<NodeResponse> {
        let path = format!("/dms/{}/{}", key.kind.as_path_segment(), key.id);
        // decode by the requested kind; the untagged enum alone is ambiguous
        match key.kind {
            NodeKind::Position => self
                .get::<PositionResponse>(credential, &path)
                .await
                .map(NodeResponse::Position),
            NodeKind::Dossier => self
                .get::<DossierResponse>(credential, &path)
                .await
                .map(NodeResponse::Dossier),
            NodeKind::Document => self
                .get::<DocumentResponse>(credential, &path)
                .await
                .map(NodeResponse::Document),
            NodeKind::Plan => Err(FetchError::Decode(format!(
                "{key} has no by-id endpoint; plans come from the plan listing"
            ))),
        }
    }

    async fn document(&self, credential: &Credential, document_id: i64) -> FetchResult<DocumentResponse> {
        self.get(credential, &format!("/dms/document/{document_id}"))
            .await
    }

    async fn create_version(
        &self,
        credential: &Credential,
        request: &CreateVersionRequest,
    ) -> FetchResult<CreatedVersion> {
        let path = format!("/dms/document/{}/version", request.document_id);
        self.core
            .json(self.core.request(Method::POST, &path, credential).json(request))
            .await
    }

    async fn delete_version(&self, credential: &Credential, document_id: i64, version_id: i64) -> FetchResult<()> {
        let path = format!("/dms/document/{document_id}/version/{version_id}");
        self.core
            .unit(self.core.request(Method::DELETE, &path, credential))
            .await
    }

    async fn restore_version(&self, credential: &Credential, document_id: i64, version_id: i64) -> FetchResult<()> {
        let path = format!("/dms/document/{document_id}/version/{version_id}/restore");
        self.core
            .unit(self.core.request(Method::PUT, &path, credential))
            .await
    }

    async fn create_dossier(
        &self,
        credential: &Credential,
        request: &CreateDossierRequest,
    ) -> FetchResult<CreatedEntity> {
        self.core
            .json(self.core.request(Method::POST, "/dms/dossier", credential).json(request))
            .await
    }

    async fn create_document(
        &self,
        credential: &Credential,
        request: &CreateDocumentRequest,
    ) -> FetchResult<CreatedEntity> {
        self.core
            .json(self.core.request(Method::POST, "/dms/document", credential).json(request))
            .await
    }

    async fn delete_entity(&self, credential: &Credential, key: NodeKey) -> FetchResult<()> {
        let path = entity_path(key)?;
        self.core
            .unit(self.core.request(Method::DELETE, &path, credential))
            .await
    }

    async fn restore_entity(&self, credential: &Credential, key: NodeKey) -> FetchResult<()> {
        let path = format!("{}/restore", entity_path(key)?);
        self.core
            .unit(self.core.request(Method::PUT, &path, credential))
            .await
    }

    async fn deleted_items(&self, credential: &Credential) -> FetchResult<DeletedItems> {
        self.get(credential, "/dms/deleted-items").await
    }

    async fn search(&self, credential: &Credential, query: &SearchQuery) -> FetchResult<SearchResults> {
        let request = self
            .core
            .request(Method::GET, "/dms/search", credential)
            .query(&query.to_pairs());
        let results: SearchResults = self.core.json(request).await?;
        debug!(
            "Search for {:?} returned {} document(s) and {} dossier(s)",
            query.text,
            results.documents.len(),
            results.dossiers.len()
        );
        Ok(results)
    }
}
