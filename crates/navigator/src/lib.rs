//! # DMS Navigator
//!
//! Client-side mirror of a document store's filing structure, with breadcrumb
//! reconstruction and document version resolution.
//!
//! ## Architecture
//!
//! ```text
//! CommandRequest
//!     │
//!     └──> CommandDispatcher
//!            │
//!            └──> NavigationController (owns NavigationState)
//!                   ├─ TreeCache      forest of plans, lazy children, single-flight
//!                   ├─ PathResolver   cache DFS → parent stitching → current path
//!                   ├─ VersionLedger  max non-deleted version number is current
//!                   └─ ports          RegistryFetch / BillingGate / RenderSink
//! ```
//!
//! The crate performs no I/O. Every remote call goes through the traits in
//! [`ports`]; `dms-client` provides the HTTP implementations.

pub mod cache;
pub mod config;
pub mod controller;
pub mod dispatch;
mod error;
pub mod inflight;
pub mod model;
pub mod path;
pub mod ports;
pub mod search;
pub mod versions;

pub use cache::{lookup, Forest, LoadOutcome, PlanTree, TreeCache};
pub use config::NavigatorConfig;
pub use controller::{
    Collaborators, ExpandOutcome, ForestOutcome, Gated, NavigationController, NavigationOutcome,
    NavigationState, SelectedPlan, VersionCreated,
};
pub use dispatch::{CommandAction, CommandDispatcher, CommandRequest, CommandResponse, CommandStatus};
pub use error::{FetchError, FetchResult, NavError, Result};
pub use model::{Crumb, LoadState, NodeKey, NodeMeta, RegistryNode};
pub use path::{path_to, PathResolver, PathSource, ResolvedPath};
pub use ports::{
    BillingGate, Credential, CredentialSource, NoBilling, PlanSummary, RecordingSink,
    RegistryFetch, RenderSignal, RenderSink, StaticCredentials,
};
pub use search::SearchHit;
pub use versions::{
    resolve_current, DeletePolicy, Document, DocumentVersion, DownloadTarget, FileDescriptor,
    VersionChange, VersionLedger, VersionState,
};
