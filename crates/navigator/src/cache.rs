use crate::error::{NavError, Result};
use crate::model::{LoadState, NodeKey, NodeMeta, RegistryNode};
use crate::ports::{Credential, PlanSummary, RegistryFetch};
use dms_protocol::{NodeKind, Permissions, PlanEntry};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One accessible filing plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanTree {
    pub root: RegistryNode,
    pub permissions: Permissions,
    pub is_personal: bool,
}

impl PlanTree {
    pub fn new(root: RegistryNode, permissions: Permissions) -> Self {
        Self {
            root,
            permissions,
            is_personal: false,
        }
    }

    pub fn from_entry(entry: PlanEntry) -> Self {
        let PlanEntry {
            plan,
            tree,
            is_personal,
            permissions,
        } = entry;
        let mut root = RegistryNode::from_tree_dto(tree);
        // the plan record is authoritative for the display fields of the root
        root.name = plan.name;
        if let NodeMeta::Plan(meta) = &mut root.meta {
            meta.description = plan.description.or(meta.description.take());
            meta.status = plan.status.or(meta.status.take());
        }
        Self {
            root,
            permissions,
            is_personal,
        }
    }

    pub fn summary(&self, index: usize) -> PlanSummary {
        let description = match &self.root.meta {
            NodeMeta::Plan(meta) => meta.description.clone(),
            _ => None,
        };
        PlanSummary {
            index,
            id: self.root.id,
            name: self.root.name.clone(),
            description,
            is_personal: self.is_personal,
            dossier_count: count_kind(&self.root, NodeKind::Dossier),
        }
    }
}

fn count_kind(node: &RegistryNode, kind: NodeKind) -> usize {
    node.children
        .iter()
        .map(|child| usize::from(child.kind() == kind) + count_kind(child, kind))
        .sum()
}

/// Zero or more independently rooted plan trees, at most one of them active.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    trees: Vec<PlanTree>,
    active: Option<usize>,
    /// Bumped by `TreeCache::replace_forest`; tells in-flight loads the nodes they started on are gone.
    epoch: u64,
}

impl Forest {
    /// A single tree is selected immediately; several wait for `select`.
    pub fn new(trees: Vec<PlanTree>) -> Self {
        let active = (trees.len() == 1).then_some(0);
        Self {
            trees,
            active,
            epoch: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn trees(&self) -> &[PlanTree] {
        &self.trees
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&PlanTree> {
        self.active.and_then(|idx| self.trees.get(idx))
    }

    pub fn active_root(&self) -> Option<&RegistryNode> {
        self.active().map(|tree| &tree.root)
    }

    fn root_mut(&mut self, idx: usize) -> Option<&mut RegistryNode> {
        self.trees.get_mut(idx).map(|tree| &mut tree.root)
    }

    pub fn select(&mut self, index: usize) -> Result<&PlanTree> {
        if index >= self.trees.len() {
            return Err(NavError::NotFound(format!(
                "plan index {index} (forest has {} plans)",
                self.trees.len()
            )));
        }
        self.active = Some(index);
        Ok(&self.trees[index])
    }

    pub fn summaries(&self) -> Vec<PlanSummary> {
        self.trees
            .iter()
            .enumerate()
            .map(|(idx, tree)| tree.summary(idx))
            .collect()
    }
}

/// Depth-first search comparing `(id, kind)`; first match wins.
pub fn lookup(root: &RegistryNode, key: NodeKey) -> Option<&RegistryNode> {
    if root.is(key) {
        return Some(root);
    }
    root.children.iter().find_map(|child| lookup(child, key))
}

fn lookup_mut(root: &mut RegistryNode, key: NodeKey) -> Option<&mut RegistryNode> {
    if root.is(key) {
        return Some(root);
    }
    root.children
        .iter_mut()
        .find_map(|child| lookup_mut(child, key))
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(Vec<RegistryNode>),
    /// Another caller holds the fetch for this node; nothing was issued.
    AlreadyLoading,
}

/// Result of switching the active plan.
#[derive(Debug, Clone)]
pub struct SelectedTree {
    pub root: RegistryNode,
    pub permissions: Permissions,
    pub summary: PlanSummary,
}

/// Holds the forest behind a mutex that is never held across an await.
/// The per-node `LoadState` is the only single-flight guard.
#[derive(Debug, Default)]
pub struct TreeCache {
    forest: Mutex<Forest>,
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forest(forest: Forest) -> Self {
        Self {
            forest: Mutex::new(forest),
        }
    }

    fn forest(&self) -> MutexGuard<'_, Forest> {
        self.forest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn replace_forest(&self, mut forest: Forest) {
        info!(
            "Tree cache holds {} plan(s), active: {:?}",
            forest.len(),
            forest.active_index()
        );
        let mut current = self.forest();
        forest.epoch = current.epoch.wrapping_add(1);
        *current = forest;
    }

    pub fn plan_count(&self) -> usize {
        self.forest().len()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.forest().active_index()
    }

    pub fn summaries(&self) -> Vec<PlanSummary> {
        self.forest().summaries()
    }

    /// Index of the plan whose root has `plan_id`.
    pub fn plan_index(&self, plan_id: i64) -> Option<usize> {
        self.forest()
            .trees()
            .iter()
            .position(|tree| tree.root.id == plan_id)
    }

    pub fn select_tree(&self, index: usize) -> Result<SelectedTree> {
        let mut forest = self.forest();
        let tree = forest.select(index)?;
        debug!("Selected plan {} ({})", tree.root.id, tree.root.name);
        Ok(SelectedTree {
            root: tree.root.clone(),
            permissions: tree.permissions,
            summary: tree.summary(index),
        })
    }

    /// Runs `f` against the active root without cloning it.
    pub fn with_active_root<R>(&self, f: impl FnOnce(Option<&RegistryNode>) -> R) -> R {
        let forest = self.forest();
        f(forest.active_root())
    }

    pub fn lookup(&self, key: NodeKey) -> Option<RegistryNode> {
        self.with_active_root(|root| root.and_then(|root| lookup(root, key)).cloned())
    }

    pub fn load_state(&self, key: NodeKey) -> Option<LoadState> {
        self.with_active_root(|root| root.and_then(|root| lookup(root, key)).map(|n| n.load_state))
    }

    pub fn children(&self, key: NodeKey) -> Option<Vec<RegistryNode>> {
        self.with_active_root(|root| {
            root.and_then(|root| lookup(root, key))
                .map(|node| node.children.clone())
        })
    }

    /// Fetches the declared children of a lazy node exactly once.
    ///
    /// Fails unless the node is `LazyUnloaded`; a node already `LazyLoading`
    /// reports `AlreadyLoading` without issuing a fetch. A failed fetch puts
    /// the node back to `LazyUnloaded` so the caller can retry.
    pub async fn load_children(
        &self,
        fetch: &dyn RegistryFetch,
        credential: &Credential,
        key: NodeKey,
    ) -> Result<LoadOutcome> {
        // bound to the plan it started in; selecting another plan meanwhile does not move it
        let (epoch, plan) = {
            let mut forest = self.forest();
            let epoch = forest.epoch;
            let plan = forest
                .active_index()
                .ok_or_else(|| NavError::NotFound(format!("{key} is not in the active plan")))?;
            let node = forest
                .root_mut(plan)
                .and_then(|root| lookup_mut(root, key))
                .ok_or_else(|| NavError::NotFound(format!("{key} is not in the active plan")))?;
            match node.load_state {
                LoadState::LazyUnloaded => node.load_state = LoadState::LazyLoading,
                LoadState::LazyLoading => {
                    debug!("Children of {key} are already loading");
                    return Ok(LoadOutcome::AlreadyLoading);
                }
                state => {
                    return Err(NavError::Validation(format!(
                        "{key} has no pending children (state {state:?})"
                    )))
                }
            }
            (epoch, plan)
        };

        debug!("Loading children of {key} in plan #{plan}");
        let fetched = fetch.tree_children(credential, key).await;

        let mut forest = self.forest();
        if forest.epoch != epoch {
            warn!("Dropping children of {key}: the forest was reloaded while they were loading");
            return Err(NavError::StaleReference(format!(
                "the plans were reloaded while the children of {key} were loading"
            )));
        }
        let Some(node) = forest
            .root_mut(plan)
            .and_then(|root| lookup_mut(root, key))
            .filter(|node| node.load_state == LoadState::LazyLoading)
        else {
            return Err(NavError::Internal(format!(
                "{key} lost its pending load in plan #{plan}"
            )));
        };

        match fetched {
            Ok(dtos) => {
                let children: Vec<RegistryNode> = dtos
                    .into_iter()
                    .map(|dto| {
                        let mut child = RegistryNode::from_tree_dto(dto);
                        child.adopt_parent(key);
                        child
                    })
                    .collect();
                node.children.extend(children.iter().cloned());
                node.load_state = LoadState::LazyLoaded;
                debug!("Loaded {} children of {key}", children.len());
                Ok(LoadOutcome::Loaded(children))
            }
            Err(err) => {
                node.load_state = LoadState::LazyUnloaded;
                warn!("Loading children of {key} failed: {err}");
                Err(NavError::Load(format!("children of {key}: {err}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeMeta, PlanMeta};
    use pretty_assertions::assert_eq;

    fn sample_root() -> RegistryNode {
        RegistryNode::new(1, "Plan", NodeMeta::Plan(PlanMeta::default())).with_children(vec![
            RegistryNode::new(1, "Finance", NodeMeta::empty(NodeKind::Position)).with_children(
                vec![RegistryNode::new(1, "Budget", NodeMeta::empty(NodeKind::Dossier)).lazy()],
            ),
            RegistryNode::new(2, "Staff", NodeMeta::empty(NodeKind::Position)).lazy(),
        ])
    }

    #[test]
    fn lookup_distinguishes_kinds() {
        let root = sample_root();
        let dossier = lookup(&root, NodeKey::new(1, NodeKind::Dossier)).unwrap();
        assert_eq!(dossier.name, "Budget");
        let position = lookup(&root, NodeKey::new(1, NodeKind::Position)).unwrap();
        assert_eq!(position.name, "Finance");
        assert!(lookup(&root, NodeKey::new(1, NodeKind::Document)).is_none());
    }

    #[test]
    fn lookup_is_idempotent() {
        let cache = TreeCache::with_forest(Forest::new(vec![PlanTree::new(
            sample_root(),
            Permissions::all(),
        )]));
        let key = NodeKey::new(1, NodeKind::Dossier);
        assert_eq!(cache.lookup(key), cache.lookup(key));
        assert!(cache.lookup(key).is_some());
    }

    #[test]
    fn forest_with_several_plans_starts_unselected() {
        let mut forest = Forest::new(vec![
            PlanTree::new(sample_root(), Permissions::default()),
            PlanTree::new(
                RegistryNode::new(2, "Personal", NodeMeta::empty(NodeKind::Plan)),
                Permissions::all(),
            ),
        ]);
        assert_eq!(forest.active_index(), None);
        assert!(forest.active_root().is_none());
        assert!(forest.select(5).is_err());
        assert_eq!(forest.select(1).unwrap().root.name, "Personal");
        assert_eq!(forest.active_index(), Some(1));

        let summaries = forest.summaries();
        assert_eq!(summaries[0].dossier_count, 1);
        assert_eq!(summaries[1].name, "Personal");
    }

    #[test]
    fn plan_record_overrides_tree_label() {
        let entry: PlanEntry = serde_json::from_str(
            r#"{"plan":{"id":1,"name":"Main","beschreibung":"All records"},
                "tree":{"id":1,"name":"Registraturplan","type":"registraturplan"},
                "isPersonal":true,"permissions":{"canRead":true}}"#,
        )
        .unwrap();
        let tree = PlanTree::from_entry(entry);
        assert_eq!(tree.root.name, "Main");
        let summary = tree.summary(0);
        assert_eq!(summary.description.as_deref(), Some("All records"));
        assert!(summary.is_personal);
    }
}
