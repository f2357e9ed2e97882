//! Full-text search hits as navigable registry nodes.

use crate::error::{NavError, Result};
use crate::model::{NodeKey, RegistryNode};
use dms_protocol::{SearchQuery, SearchResults};
use serde::Serialize;
use std::collections::HashSet;

/// One search hit. `node.parent_id` is set, so navigating to it stitches a
/// breadcrumb through the cached parent when there is one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub node: RegistryNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl SearchHit {
    pub fn key(&self) -> NodeKey {
        self.node.key()
    }
}

/// Trims the query and its filters; rejects a blank term and an inverted date range.
pub fn normalize_query(query: SearchQuery) -> Result<SearchQuery> {
    let text = query.text.trim().to_string();
    if text.is_empty() {
        return Err(NavError::Validation("a search term is required".into()));
    }
    let date_from = non_blank(query.date_from);
    let date_to = non_blank(query.date_to);
    // ISO dates order lexicographically
    if let (Some(from), Some(to)) = (&date_from, &date_to) {
        if from > to {
            return Err(NavError::Validation(format!(
                "date range starts after it ends ({from} > {to})"
            )));
        }
    }
    Ok(SearchQuery {
        text,
        scope: query.scope,
        date_from,
        date_to,
        mime_type: non_blank(query.mime_type),
    })
}

/// Documents first, then dossiers. Soft-deleted entries and repeats are dropped.
pub fn hits_from_results(results: SearchResults) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    let documents = results.documents.into_iter().map(|hit| SearchHit {
        node: RegistryNode::from_document_dto(hit.document),
        match_type: Some(hit.match_type).filter(|kind| !kind.is_empty()),
        preview: hit.match_preview,
    });
    let dossiers = results.dossiers.into_iter().map(|dossier| SearchHit {
        node: RegistryNode::from_dossier_dto(dossier),
        match_type: None,
        preview: None,
    });
    documents
        .chain(dossiers)
        .filter(|hit| !hit.node.is_deleted())
        .filter(|hit| seen.insert(hit.key()))
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms_protocol::{DocumentDto, DocumentHit, DossierDto, NodeKind, SearchScope};
    use pretty_assertions::assert_eq;

    fn document(id: i64, dossier_id: i64, status: Option<&str>) -> DocumentDto {
        DocumentDto {
            id,
            dossier_id,
            title: format!("Doc {id}"),
            current_version_id: None,
            status: status.map(str::to_string),
            created_at: None,
            description: None,
            deleted_at: None,
        }
    }

    fn dossier(id: i64, position_id: i64) -> DossierDto {
        DossierDto {
            id,
            position_id: Some(position_id),
            parent_dossier_id: None,
            name: format!("Dossier {id}"),
            running_number: None,
            position_number: None,
            unique_running_number: None,
            status: None,
            publicly_shared: false,
            created_at: None,
            description: None,
        }
    }

    fn hit(document: DocumentDto, match_type: &str) -> DocumentHit {
        DocumentHit {
            document,
            matched_version: None,
            match_type: match_type.into(),
            match_preview: Some("...offer...".into()),
        }
    }

    #[test]
    fn blank_term_is_rejected() {
        let err = normalize_query(SearchQuery::text("   ")).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn filters_are_trimmed_and_range_checked() {
        let query = normalize_query(SearchQuery {
            text: " offer ".into(),
            scope: SearchScope::Document,
            date_from: Some(" ".into()),
            date_to: Some("2024-12-31".into()),
            mime_type: Some(" application/pdf ".into()),
        })
        .unwrap();
        assert_eq!(query.text, "offer");
        assert_eq!(query.date_from, None);
        assert_eq!(query.mime_type.as_deref(), Some("application/pdf"));

        let inverted = normalize_query(SearchQuery {
            date_from: Some("2024-05-01".into()),
            date_to: Some("2024-01-01".into()),
            ..SearchQuery::text("offer")
        });
        assert!(matches!(inverted, Err(NavError::Validation(_))));
    }

    #[test]
    fn hits_carry_parents_and_skip_deleted() {
        let results = SearchResults {
            documents: vec![
                hit(document(7, 200, None), "document_title"),
                hit(document(8, 200, Some("Gelöscht")), "document_title"),
                hit(document(7, 200, None), "version_content"),
            ],
            dossiers: vec![dossier(200, 11)],
            total_count: 4,
        };
        let hits = hits_from_results(results);
        let keys: Vec<NodeKey> = hits.iter().map(SearchHit::key).collect();
        assert_eq!(
            keys,
            vec![
                NodeKey::new(7, NodeKind::Document),
                NodeKey::new(200, NodeKind::Dossier)
            ]
        );
        assert_eq!(hits[0].node.parent_id, Some(200));
        assert_eq!(hits[0].match_type.as_deref(), Some("document_title"));
        assert_eq!(hits[1].node.parent_id, Some(11));
    }
}
