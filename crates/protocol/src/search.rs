use crate::entities::{DocumentDto, DossierDto, VersionDto};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which entity kinds a full-text search covers; `type=` on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    #[default]
    All,
    Document,
    Dossier,
}

impl SearchScope {
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Document => "document",
            Self::Dossier => "dossier",
        }
    }
}

/// Parameters of `GET /dms/search`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(rename = "q")]
    pub text: String,
    #[serde(default, rename = "type")]
    pub scope: SearchScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Query-string pairs in wire order; unset filters are omitted.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("q", self.text.clone())];
        if self.scope != SearchScope::All {
            pairs.push(("type", self.scope.as_wire().to_string()));
        }
        let optional = [
            ("dateFrom", &self.date_from),
            ("dateTo", &self.date_to),
            ("mimeType", &self.mime_type),
        ];
        for (name, value) in optional {
            if let Some(value) = value.as_deref().filter(|value| !value.trim().is_empty()) {
                pairs.push((name, value.to_string()));
            }
        }
        pairs
    }
}

/// A document hit; `match_type` says which field matched (`document_title`,
/// `version_content`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHit {
    pub document: DocumentDto,
    #[serde(default)]
    pub matched_version: Option<VersionDto>,
    #[serde(default)]
    pub match_type: String,
    #[serde(default)]
    pub match_preview: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    #[serde(default)]
    pub documents: Vec<DocumentHit>,
    #[serde(default)]
    pub dossiers: Vec<DossierDto>,
    #[serde(default)]
    pub total_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn query_pairs_skip_unset_filters() {
        let query = SearchQuery {
            text: "offer".into(),
            scope: SearchScope::Document,
            date_from: Some("2024-01-01".into()),
            date_to: Some(" ".into()),
            mime_type: None,
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("q", "offer".to_string()),
                ("type", "document".to_string()),
                ("dateFrom", "2024-01-01".to_string()),
            ]
        );
        assert_eq!(SearchQuery::text("x").to_pairs(), vec![("q", "x".to_string())]);
    }

    #[test]
    fn results_decode_store_shape() {
        let raw = r#"{
            "documents": [{
                "document": {"id": 7, "dossierId": 200, "titel": "Offer"},
                "matchedVersion": null,
                "matchType": "document_title",
                "matchPreview": null
            }],
            "dossiers": [{"id": 200, "registraturPositionId": 11, "name": "Contracts"}],
            "totalCount": 2
        }"#;
        let results: SearchResults = serde_json::from_str(raw).unwrap();
        assert_eq!(results.documents[0].document.dossier_id, 200);
        assert_eq!(results.documents[0].match_type, "document_title");
        assert_eq!(results.dossiers[0].position_id, Some(11));
        assert_eq!(results.total_count, 2);
    }
}
