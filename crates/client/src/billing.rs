use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::HttpCore;
use async_trait::async_trait;
use dms_navigator::{BillingGate, Credential, FetchResult};
use dms_protocol::BalanceCheck;
use reqwest::Method;

/// [`BillingGate`] backed by `POST /billing/check`.
#[derive(Debug, Clone)]
pub struct HttpBillingClient {
    core: HttpCore,
}

impl HttpBillingClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            core: HttpCore::new(config)?,
        })
    }
}

#[async_trait]
impl BillingGate for HttpBillingClient {
    async fn check_balance(
        &self,
        credential: &Credential,
        operation: &str,
        extra_cost: f64,
    ) -> FetchResult<BalanceCheck> {
        let request = self
            .core
            .request(Method::POST, "/billing/check", credential)
            .query(&[
                ("operation", operation.to_string()),
                ("additionalCost", extra_cost.to_string()),
            ]);
        self.core.json(request).await
    }
}
