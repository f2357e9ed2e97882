use crate::config::FileConfig;
use anyhow::{Context as AnyhowContext, Result};
use dms_client::{EnvCredentials, HttpBillingClient, HttpRegistryClient};
use dms_navigator::{
    Collaborators, CommandDispatcher, CommandRequest, CredentialSource, NavigationController,
    RecordingSink, StaticCredentials,
};
use std::sync::Arc;

/// Wires the HTTP collaborators into a controller and wraps it in a dispatcher.
pub fn build_dispatcher(config: &FileConfig, token: Option<&str>) -> Result<CommandDispatcher> {
    let fetch = HttpRegistryClient::new(&config.client).context("Failed to build registry client")?;
    let billing = HttpBillingClient::new(&config.client).context("Failed to build billing client")?;
    let credentials: Arc<dyn CredentialSource> = match token {
        Some(token) => Arc::new(StaticCredentials::new(token)),
        None => Arc::new(EnvCredentials::new()),
    };
    let sink = Arc::new(RecordingSink::new());
    let controller = NavigationController::new(
        config.navigator.clone(),
        Collaborators {
            fetch: Arc::new(fetch),
            billing: Arc::new(billing),
            credentials,
            sink: sink.clone(),
        },
    );
    Ok(CommandDispatcher::new(Arc::new(controller)).with_signals(sink))
}

/// Accepts one request object, a JSON array of requests, or JSON lines.
pub fn parse_requests(raw: &str) -> Result<Vec<CommandRequest>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("Invalid JSON array of command requests");
    }
    if let Ok(request) = serde_json::from_str::<CommandRequest>(trimmed) {
        return Ok(vec![request]);
    }
    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Invalid command request on line {}", idx + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms_navigator::CommandAction;
    use pretty_assertions::assert_eq;

    fn actions(raw: &str) -> Vec<CommandAction> {
        parse_requests(raw)
            .unwrap()
            .into_iter()
            .map(|request| request.action)
            .collect()
    }

    #[test]
    fn accepts_object_array_and_lines() {
        assert_eq!(actions(r#"{"action":"state"}"#), vec![CommandAction::State]);
        assert_eq!(
            actions(r#"[{"action":"load_forest"},{"action":"state"}]"#),
            vec![CommandAction::LoadForest, CommandAction::State]
        );
        assert_eq!(
            actions("{\"action\":\"load_forest\"}\n\n{\"action\":\"expand\",\"payload\":{\"id\":10,\"kind\":\"position\"}}\n"),
            vec![CommandAction::LoadForest, CommandAction::Expand]
        );
        assert!(actions("  \n").is_empty());
    }

    #[test]
    fn reports_the_offending_line() {
        let err = parse_requests("{\"action\":\"state\"}\n{\"action\":\"teleport\"}").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"), "{err:#}");
    }
}
