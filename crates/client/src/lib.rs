//! HTTP collaborators for `dms-navigator`.
//!
//! ```text
//! NavigationController
//!     ├─ RegistryFetch ──> HttpRegistryClient ──> /dms/...
//!     ├─ BillingGate   ──> HttpBillingClient  ──> /billing/check
//!     └─ CredentialSource ──> EnvCredentials (DMS_AUTH_TOKEN)
//! ```

pub mod billing;
pub mod config;
pub mod credentials;
mod error;
mod http;
pub mod registry;

pub use billing::HttpBillingClient;
pub use config::ClientConfig;
pub use credentials::{EnvCredentials, AUTH_TOKEN_ENV};
pub use error::{ClientError, Result};
pub use registry::HttpRegistryClient;
