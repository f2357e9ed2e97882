//! Breadcrumb reconstruction.
//!
//! Resolution order:
//! 1. DFS over the active plan, push on visit and pop on backtrack.
//! 2. Parent stitching for nodes reached by id: resolve a cached parent, then
//!    append the node.
//! 3. Extension of the current path when the node plausibly continues it.
//! 4. A single-element path.
//!
//! Paths that do not start at a plan get a synthetic plan crumb (id 0).

use crate::cache::lookup;
use crate::model::{Crumb, NodeKey, RegistryNode};
use dms_protocol::NodeKind;
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSource {
    Cache,
    ParentStitched,
    ExtendedCurrent,
    Detached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPath {
    pub crumbs: Vec<Crumb>,
    pub source: PathSource,
}

impl ResolvedPath {
    pub fn last(&self) -> Option<&Crumb> {
        self.crumbs.last()
    }

    pub fn len(&self) -> usize {
        self.crumbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crumbs.is_empty()
    }

    pub fn has_synthetic_root(&self) -> bool {
        self.crumbs.first().is_some_and(|crumb| crumb.synthetic)
    }

    pub fn keys(&self) -> Vec<NodeKey> {
        self.crumbs.iter().map(|crumb| crumb.key).collect()
    }
}

/// Root-to-node chain inside `root`, or `None` when the key is absent.
pub fn path_to(root: &RegistryNode, key: NodeKey) -> Option<Vec<Crumb>> {
    fn walk<'a>(node: &'a RegistryNode, key: NodeKey, stack: &mut Vec<&'a RegistryNode>) -> bool {
        stack.push(node);
        if node.is(key) {
            return true;
        }
        for child in &node.children {
            if walk(child, key, stack) {
                return true;
            }
        }
        stack.pop();
        false
    }

    let mut stack = Vec::new();
    walk(root, key, &mut stack).then(|| stack.into_iter().map(RegistryNode::crumb).collect())
}

pub struct PathResolver<'a> {
    root: Option<&'a RegistryNode>,
    current_path: &'a [Crumb],
    root_label: &'a str,
    max_depth: usize,
}

impl<'a> PathResolver<'a> {
    pub fn new(
        root: Option<&'a RegistryNode>,
        current_path: &'a [Crumb],
        root_label: &'a str,
        max_depth: usize,
    ) -> Self {
        Self {
            root,
            current_path,
            root_label,
            max_depth,
        }
    }

    pub fn resolve(&self, target: &RegistryNode) -> ResolvedPath {
        let (mut crumbs, source) = self.resolve_chain(target, 0);
        if crumbs.first().map(|crumb| crumb.key.kind) != Some(NodeKind::Plan) {
            crumbs.insert(0, Crumb::synthetic_root(self.root_label));
        }
        debug!("Resolved path to {} via {source:?} ({} crumbs)", target.key(), crumbs.len());
        ResolvedPath { crumbs, source }
    }

    fn resolve_chain(&self, target: &RegistryNode, depth: usize) -> (Vec<Crumb>, PathSource) {
        if let Some(crumbs) = self.root.and_then(|root| path_to(root, target.key())) {
            return (crumbs, PathSource::Cache);
        }
        if let Some(crumbs) = self.stitch_from_parent(target, depth) {
            return (crumbs, PathSource::ParentStitched);
        }
        if let Some(crumbs) = self.extend_current(target) {
            return (crumbs, PathSource::ExtendedCurrent);
        }
        (vec![target.crumb()], PathSource::Detached)
    }

    fn stitch_from_parent(&self, target: &RegistryNode, depth: usize) -> Option<Vec<Crumb>> {
        if depth >= self.max_depth {
            debug!("Parent stitching for {} stopped at depth {depth}", target.key());
            return None;
        }
        let root = self.root?;
        let parent = target
            .parent_candidates()
            .into_iter()
            .find_map(|candidate| lookup(root, candidate))?;
        let (mut crumbs, _) = self.resolve_chain(parent, depth + 1);
        crumbs.push(target.crumb());
        Some(crumbs)
    }

    fn extend_current(&self, target: &RegistryNode) -> Option<Vec<Crumb>> {
        let key = target.key();
        // an ancestor already on the path: cut back to it
        if let Some(pos) = self.current_path.iter().position(|crumb| crumb.key == key) {
            return Some(self.current_path[..=pos].to_vec());
        }
        let last = self.current_path.last()?;
        let plausible = if target.parent_id.is_some() {
            target.parent_candidates().contains(&last.key)
        } else {
            !last.synthetic && last.key.kind.can_contain(target.kind())
        };
        plausible.then(|| {
            let mut crumbs = self.current_path.to_vec();
            crumbs.push(target.crumb());
            crumbs
        })
    }
}
