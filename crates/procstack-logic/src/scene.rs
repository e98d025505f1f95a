//! Owned spatial-node tree.
//!
//! The host's scene graph is garbage-collected and out of reach; the
//! slot instead owns an explicit arena of spatial-node records —
//! strictly parent → children, no cycles — and mirrors it out through
//! collaborators. Each node carries a local transform and an optional
//! mesh reference. Asset geometry enters the tree through the
//! [`ModelSource`] collaborator, which clones a named external model
//! into new nodes.

use glam::{Quat, Vec3};

use crate::definition::{MergeGroup, SubModelSpec};
use crate::diag::{self, ModelError};

/// Handle into a [`NodeTree`]. Stale handles (after `remove_subtree`
/// or `clear`) simply resolve to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

/// One spatial node: local transform, optional mesh, tree links.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Mesh reference; `None` for pure grouping nodes.
    pub mesh: Option<String>,
}

impl SceneNode {
    fn new(name: &str, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            mesh: None,
        }
    }
}

/// Arena of spatial nodes with unique ownership, parent → children only.
#[derive(Debug, Default)]
pub struct NodeTree {
    nodes: Vec<Option<SceneNode>>,
    roots: Vec<NodeId>,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every node. All outstanding handles become stale.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a node. With no parent it becomes a root.
    pub fn add_node(&mut self, name: &str, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(SceneNode::new(name, parent)));
        match parent {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.children.push(id);
                }
            }
            None => self.roots.push(id),
        }
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0).and_then(|n| n.as_ref())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_mut())
    }

    /// Detach a node from its parent and remove it together with all
    /// of its descendants.
    pub fn remove_subtree(&mut self, id: NodeId) {
        let parent = self.node(id).and_then(|n| n.parent);
        match parent {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.children.retain(|&c| c != id);
                }
            }
            None => self.roots.retain(|&r| r != id),
        }
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(next.0).and_then(Option::take) {
                pending.extend(node.children);
            }
        }
    }

    /// Move a node (with its subtree) under a new parent.
    pub fn reparent(&mut self, id: NodeId, new_parent: NodeId) {
        if id == new_parent || self.node(new_parent).is_none() {
            return;
        }
        let old_parent = self.node(id).and_then(|n| n.parent);
        match old_parent {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.children.retain(|&c| c != id);
                }
            }
            None => self.roots.retain(|&r| r != id),
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = Some(new_parent);
        }
        if let Some(node) = self.node_mut(new_parent) {
            node.children.push(id);
        }
    }

    /// Depth-first walk of a subtree, the given node included.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.node(next) {
                out.push(next);
                pending.extend(node.children.iter().rev());
            }
        }
        out
    }

    /// First node with the given name, searching all roots depth-first.
    pub fn find_named(&self, name: &str) -> Option<NodeId> {
        self.roots
            .iter()
            .flat_map(|&r| self.descendants(r))
            .find(|&id| self.node(id).is_some_and(|n| n.name == name))
    }

    /// First node under `root` whose mesh reference equals `mesh`.
    pub fn find_mesh_under(&self, root: NodeId, mesh: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|&id| self.node(id).is_some_and(|n| n.mesh.as_deref() == Some(mesh)))
    }
}

/// Scene collaborator: clones a named external model asset into new
/// nodes under a parent.
pub trait ModelSource {
    /// Returns the root of the cloned subtree, or a geometry error when
    /// the asset cannot be cloned.
    fn clone_model(
        &mut self,
        asset: &str,
        tree: &mut NodeTree,
        parent: NodeId,
    ) -> Result<NodeId, ModelError>;
}

/// A [`ModelSource`] backed by registered flat templates: each asset is
/// a node with one mesh child per registered mesh name. Enough for
/// headless hosts and tests; a rendering host supplies its own source.
#[derive(Debug, Default)]
pub struct TemplateSource {
    assets: Vec<(String, Vec<String>)>,
}

impl TemplateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, asset: &str, meshes: &[&str]) {
        self.assets.push((
            asset.to_string(),
            meshes.iter().map(|m| m.to_string()).collect(),
        ));
    }
}

impl ModelSource for TemplateSource {
    fn clone_model(
        &mut self,
        asset: &str,
        tree: &mut NodeTree,
        parent: NodeId,
    ) -> Result<NodeId, ModelError> {
        let meshes = self
            .assets
            .iter()
            .find(|(name, _)| name == asset)
            .map(|(_, meshes)| meshes.clone())
            .ok_or_else(|| ModelError::Geometry(format!("asset '{asset}' not found")))?;
        let root = tree.add_node(asset, Some(parent));
        for mesh in &meshes {
            let child = tree.add_node(mesh, Some(root));
            if let Some(node) = tree.node_mut(child) {
                node.mesh = Some(mesh.clone());
            }
        }
        Ok(root)
    }
}

/// Clone one sub-model under `parent` and apply its transform and mesh
/// rules. A clone failure is a geometry error: logged, `None` returned,
/// the caller simply moves on to the next sub-model.
pub fn build_sub_model(
    tree: &mut NodeTree,
    parent: NodeId,
    spec: &SubModelSpec,
    source: &mut dyn ModelSource,
) -> Option<NodeId> {
    let cloned = match source.clone_model(&spec.asset, tree, parent) {
        Ok(id) => id,
        Err(err) => {
            diag::report(&err);
            return None;
        }
    };

    if let Some(node) = tree.node_mut(cloned) {
        node.position = spec.position;
        node.rotation = spec.rotation;
        node.scale = spec.scale;
    }

    // Mesh filtering runs over the clone's descendants, root excluded.
    let meshes: Vec<NodeId> = tree
        .descendants(cloned)
        .into_iter()
        .skip(1)
        .filter(|&id| tree.node(id).is_some_and(|n| n.mesh.is_some()))
        .collect();
    for id in meshes {
        let mesh_name = match tree.node(id).and_then(|n| n.mesh.clone()) {
            Some(name) => name,
            None => continue,
        };
        if spec.exclude_meshes.contains(&mesh_name)
            || (!spec.include_meshes.is_empty() && !spec.include_meshes.contains(&mesh_name))
        {
            tree.remove_subtree(id);
            continue;
        }
        if let Some(rename) = spec.renames.iter().find(|r| r.from == mesh_name) {
            if let Some(node) = tree.node_mut(id) {
                node.name = rename.to.clone();
                node.mesh = Some(rename.to.clone());
            }
        }
    }

    if let Some(target) = &spec.reparent_to {
        if let Some(new_parent) = tree.find_named(target) {
            tree.reparent(cloned, new_parent);
        }
    }

    Some(cloned)
}

/// Collapse a merge group: the listed meshes are removed and replaced
/// by a single node under the named parent (the instance root when the
/// parent name does not resolve).
pub fn apply_merge_group(tree: &mut NodeTree, instance_root: NodeId, group: &MergeGroup) {
    let mut found_any = false;
    for mesh in &group.meshes {
        while let Some(id) = tree.find_mesh_under(instance_root, mesh) {
            tree.remove_subtree(id);
            found_any = true;
        }
    }
    if !found_any {
        return;
    }
    let parent = tree
        .find_named(&group.parent)
        .unwrap_or(instance_root);
    let merged = tree.add_node(&group.name, Some(parent));
    if let Some(node) = tree.node_mut(merged) {
        node.mesh = Some(group.name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::MeshRename;

    fn spec(asset: &str) -> SubModelSpec {
        SubModelSpec {
            asset: asset.to_string(),
            position: Vec3::new(0.0, 1.0, 0.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            include_meshes: Vec::new(),
            exclude_meshes: Vec::new(),
            renames: Vec::new(),
            reparent_to: None,
        }
    }

    fn source() -> TemplateSource {
        let mut s = TemplateSource::new();
        s.register("tank", &["hull", "cap", "greeble"]);
        s
    }

    #[test]
    fn add_remove_reparent() {
        let mut tree = NodeTree::new();
        let root = tree.add_node("root", None);
        let a = tree.add_node("a", Some(root));
        let b = tree.add_node("b", Some(root));
        let leaf = tree.add_node("leaf", Some(a));
        assert_eq!(tree.len(), 4);

        tree.reparent(leaf, b);
        assert_eq!(tree.node(leaf).unwrap().parent, Some(b));
        assert!(tree.node(a).unwrap().children.is_empty());

        tree.remove_subtree(b);
        assert!(tree.node(b).is_none());
        assert!(tree.node(leaf).is_none());
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn build_clones_asset_and_applies_transform() {
        let mut tree = NodeTree::new();
        let root = tree.add_node("instance0", None);
        let id = build_sub_model(&mut tree, root, &spec("tank"), &mut source()).unwrap();
        assert_eq!(tree.node(id).unwrap().position, Vec3::new(0.0, 1.0, 0.0));
        // root + asset node + 3 mesh children
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn missing_asset_is_skipped_not_fatal() {
        let mut tree = NodeTree::new();
        let root = tree.add_node("instance0", None);
        assert!(build_sub_model(&mut tree, root, &spec("ghost"), &mut source()).is_none());
        // the tree still only holds the instance root
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn exclude_and_include_rules() {
        let mut tree = NodeTree::new();
        let root = tree.add_node("instance0", None);
        let mut s = spec("tank");
        s.exclude_meshes = vec!["greeble".to_string()];
        build_sub_model(&mut tree, root, &s, &mut source()).unwrap();
        assert!(tree.find_mesh_under(root, "greeble").is_none());
        assert!(tree.find_mesh_under(root, "hull").is_some());

        let mut tree = NodeTree::new();
        let root = tree.add_node("instance0", None);
        let mut s = spec("tank");
        s.include_meshes = vec!["cap".to_string()];
        build_sub_model(&mut tree, root, &s, &mut source()).unwrap();
        assert!(tree.find_mesh_under(root, "hull").is_none());
        assert!(tree.find_mesh_under(root, "cap").is_some());
    }

    #[test]
    fn rename_rules() {
        let mut tree = NodeTree::new();
        let root = tree.add_node("instance0", None);
        let mut s = spec("tank");
        s.renames = vec![MeshRename {
            from: "hull".to_string(),
            to: "shell".to_string(),
        }];
        build_sub_model(&mut tree, root, &s, &mut source()).unwrap();
        assert!(tree.find_mesh_under(root, "hull").is_none());
        assert!(tree.find_mesh_under(root, "shell").is_some());
    }

    #[test]
    fn merge_group_collapses_meshes() {
        let mut tree = NodeTree::new();
        let root = tree.add_node("instance0", None);
        build_sub_model(&mut tree, root, &spec("tank"), &mut source()).unwrap();
        let group = MergeGroup {
            name: "body".to_string(),
            parent: "instance0".to_string(),
            meshes: vec!["hull".to_string(), "cap".to_string()],
        };
        apply_merge_group(&mut tree, root, &group);
        assert!(tree.find_mesh_under(root, "hull").is_none());
        assert!(tree.find_mesh_under(root, "cap").is_none());
        let merged = tree.find_mesh_under(root, "body").unwrap();
        assert_eq!(tree.node(merged).unwrap().parent, Some(root));
    }
}
