use std::collections::HashSet;

use tracing::{debug, warn};

use crate::bsp::tree::{CLIP_EPSILON, Node, NodeId, Tree};
use crate::geometry::winding::HUGE_EXTENT;
use crate::geometry::{Bounds, Plane, Winding};

/// Padding between the tree bounds and the head portal box.
pub const HEAD_PADDING: f64 = 8.0;

/// Tolerance used when clipping and splitting portal windings.
pub const WIND_EPSILON: f64 = 0.001;

/// Index of a portal in [`Tree`]'s portal arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortalId(pub usize);

/// Shared boundary between two nodes.
///
/// `nodes[0]` lies in front of the winding's plane, `nodes[1]` behind it.
#[derive(Debug, Clone)]
pub struct Portal {
    pub nodes: [Option<NodeId>; 2],
    pub winding: Winding,
    /// Node whose splitter created the portal; `None` for head portals.
    pub onnode: Option<NodeId>,
}

impl Portal {
    fn new(winding: Winding, onnode: Option<NodeId>) -> Self {
        Self {
            nodes: [None, None],
            winding,
            onnode,
        }
    }

    pub fn plane(&self) -> &Plane {
        self.winding.plane()
    }

    pub fn is_attached(&self) -> bool {
        self.nodes[0].is_some() && self.nodes[1].is_some()
    }

    /// The neighbour across the portal as seen from `node`.
    pub fn other_node(&self, node: NodeId) -> Option<NodeId> {
        if self.nodes[0] == Some(node) {
            self.nodes[1]
        } else if self.nodes[1] == Some(node) {
            self.nodes[0]
        } else {
            None
        }
    }
}

impl Tree {
    fn push_portal(&mut self, portal: Portal) -> PortalId {
        self.portals.push(portal);
        PortalId(self.portals.len() - 1)
    }

    fn add_to_nodes(&mut self, id: PortalId, front: NodeId, back: NodeId) {
        debug_assert!(
            self.portals[id.0].nodes == [None, None],
            "portal {} is already attached",
            id.0
        );
        self.portals[id.0].nodes = [Some(front), Some(back)];
        self.nodes[front.0].portals.push(id);
        self.nodes[back.0].portals.push(id);
    }

    /// Attach `id` between `child` and `other`, keeping `child` on `side`.
    fn attach_on_side(&mut self, id: PortalId, side: usize, child: NodeId, other: NodeId) {
        if side == 0 {
            self.add_to_nodes(id, child, other);
        } else {
            self.add_to_nodes(id, other, child);
        }
    }

    fn remove_from_node(&mut self, id: PortalId, node: NodeId) {
        self.nodes[node.0].portals.retain(|p| *p != id);
        let portal = &mut self.portals[id.0];
        for slot in &mut portal.nodes {
            if *slot == Some(node) {
                *slot = None;
            }
        }
    }
}

/// Generate portals for the whole tree, starting from a padded box around it.
pub fn make_tree_portals(tree: &mut Tree) {
    make_head_portals(tree);
    let head = tree.head();
    make_tree_portals_recursive(tree, head);
    debug!(portals = tree.portal_count(), "portals generated");
}

/// Create the outside node and six inward-facing portals joining it to the head.
///
/// Nothing beyond the outside node is created when the head is a leaf.
pub fn make_head_portals(tree: &mut Tree) {
    let outside = tree.push_node(Node::default());
    tree.outside = Some(outside);

    let head = tree.head();
    if tree.node(head).is_leaf() {
        return;
    }

    let padded = tree.bounds().padded(HEAD_PADDING);
    let mut planes = Vec::with_capacity(6);
    for j in 0..2 {
        for axis in 0..3 {
            let mut abcd = [0.0; 4];
            if j == 0 {
                abcd[axis] = 1.0;
                abcd[3] = -padded.mins[axis];
            } else {
                abcd[axis] = -1.0;
                abcd[3] = padded.maxs[axis];
            }
            planes.push(Plane::from_abcd(abcd));
        }
    }

    for (i, plane) in planes.iter().enumerate() {
        let mut winding = Winding::from_plane(*plane);
        for (j, other) in planes.iter().enumerate() {
            if i != j {
                winding = winding.clip(other, CLIP_EPSILON);
            }
        }
        let id = tree.push_portal(Portal::new(winding, None));
        tree.add_to_nodes(id, head, outside);
    }
}

fn make_tree_portals_recursive(tree: &mut Tree, node: NodeId) {
    calculate_node_bounds(tree, node);
    let bounds = tree.node(node).bounds;
    if !bounds.is_empty()
        && (bounds.mins.min_element() <= -HUGE_EXTENT || bounds.maxs.max_element() >= HUGE_EXTENT)
    {
        warn!(node = node.0, ?bounds, "node has unbounded portal extents");
    }

    let Some(children) = tree.node(node).children else {
        return;
    };
    make_node_portal(tree, node);
    split_node_portals(tree, node);
    for child in children {
        make_tree_portals_recursive(tree, child);
    }
}

/// Reset a node's bounds to the extent of its portal windings.
pub fn calculate_node_bounds(tree: &mut Tree, node: NodeId) {
    let mut bounds = Bounds::empty();
    let mut visited = HashSet::new();
    for id in &tree.node(node).portals {
        if !visited.insert(*id) {
            continue;
        }
        for p in tree.portal(*id).winding.points() {
            bounds.include_point(*p);
        }
    }
    tree.nodes[node.0].bounds = bounds;
}

/// A winding covering the node's splitter, cut down to the node's region by
/// every ancestor splitter. `None` for leaves.
pub fn base_winding_for_node(tree: &Tree, node: NodeId) -> Option<Winding> {
    let plane = tree.node(node).plane?;
    let mut winding = Winding::from_plane(plane);
    let mut child = node;
    while let Some(parent) = tree.node(child).parent {
        let parent_node = tree.node(parent);
        let (Some(split), Some([front, _])) = (parent_node.plane, parent_node.children) else {
            break;
        };
        winding = if front == child {
            winding.clip(&split, WIND_EPSILON)
        } else {
            winding.clip(&split.reversed(), WIND_EPSILON)
        };
        child = parent;
    }
    Some(winding)
}

/// Create the portal between the two children of `node`.
pub fn make_node_portal(tree: &mut Tree, node: NodeId) {
    let Some([front, back]) = tree.node(node).children else {
        return;
    };
    let Some(mut winding) = base_winding_for_node(tree, node) else {
        return;
    };

    let mut visited = HashSet::new();
    for id in tree.node(node).portals.clone() {
        if !visited.insert(id) {
            continue;
        }
        let portal = tree.portal(id);
        let plane = if portal.nodes[0] == Some(node) {
            *portal.plane()
        } else {
            portal.plane().reversed()
        };
        winding = winding.clip(&plane, CLIP_EPSILON);
    }

    if winding.is_very_small() {
        debug!(node = node.0, "node portal too small");
        return;
    }
    let id = tree.push_portal(Portal::new(winding, Some(node)));
    tree.add_to_nodes(id, front, back);
}

/// Move the portals of `node` down to its children, cutting them along the
/// node's splitter.
pub fn split_node_portals(tree: &mut Tree, node: NodeId) {
    let (Some(split), Some([front_child, back_child])) =
        (tree.node(node).plane, tree.node(node).children)
    else {
        return;
    };

    for id in tree.node(node).portals.clone() {
        let portal = tree.portal(id);
        let side = if portal.nodes[0] == Some(node) { 0 } else { 1 };
        let Some(other) = portal.nodes[1 - side] else {
            continue;
        };
        let (front, back) = portal.winding.split(&split, WIND_EPSILON);
        let front = front.filter(|w| !w.is_very_small());
        let back = back.filter(|w| !w.is_very_small());
        let onnode = portal.onnode;

        tree.remove_from_node(id, node);
        tree.remove_from_node(id, other);

        match (front, back) {
            (None, None) => {}
            (Some(front), None) => {
                tree.portals[id.0].winding = front;
                tree.attach_on_side(id, side, front_child, other);
            }
            (None, Some(back)) => {
                tree.portals[id.0].winding = back;
                tree.attach_on_side(id, side, back_child, other);
            }
            (Some(front), Some(back)) => {
                tree.portals[id.0].winding = front;
                tree.attach_on_side(id, side, front_child, other);
                let new_id = tree.push_portal(Portal::new(back, onnode));
                tree.attach_on_side(new_id, side, back_child, other);
            }
        }
    }
    tree.nodes[node.0].portals.clear();
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::DVec3;

    use super::*;
    use crate::bsp::tree::{BspFace, FaceSource, face_bsp};
    use crate::geometry::Brush;

    /// One 32x32 face at y=32: the head splits into two leaves.
    fn single_split_tree() -> Tree {
        let plane = Plane::new(DVec3::new(32.0, 32.0, 32.0), DVec3::Y);
        let winding = Winding::from_points(
            plane,
            vec![
                DVec3::new(16.0, 32.0, 16.0),
                DVec3::new(48.0, 32.0, 16.0),
                DVec3::new(48.0, 32.0, 48.0),
                DVec3::new(16.0, 32.0, 48.0),
            ],
        );
        face_bsp(vec![BspFace::new(winding, FaceSource { brush: 0, side: 0 })])
    }

    fn cube_brush() -> Brush {
        Brush::new(vec![
            Plane::new(DVec3::splat(48.0), DVec3::X),
            Plane::new(DVec3::splat(16.0), -DVec3::X),
            Plane::new(DVec3::splat(48.0), DVec3::Y),
            Plane::new(DVec3::splat(16.0), -DVec3::Y),
            Plane::new(DVec3::splat(48.0), DVec3::Z),
            Plane::new(DVec3::splat(16.0), -DVec3::Z),
        ])
    }

    fn check_links(tree: &Tree) {
        for (i, portal) in tree.portals.iter().enumerate() {
            if !portal.is_attached() {
                continue;
            }
            let [a, b] = portal.nodes.map(|n| n.unwrap());
            assert_ne!(a, b);
            assert!(tree.node(a).portals.contains(&PortalId(i)));
            assert!(tree.node(b).portals.contains(&PortalId(i)));
            assert!(!portal.winding.is_very_small());
            for p in portal.winding.points() {
                assert!(portal.plane().point_distance(*p).abs() < 1e-6);
            }
        }
        for node in tree.nodes() {
            for id in &node.portals {
                assert!(tree.portal(*id).is_attached());
            }
        }
    }

    #[test]
    fn head_portals_form_padded_box() {
        let mut tree = single_split_tree();
        make_head_portals(&mut tree);
        let outside = tree.outside_node().unwrap();
        assert_eq!(tree.node(tree.head()).portals.len(), 6);
        assert_eq!(tree.node(outside).portals.len(), 6);
        for id in &tree.node(tree.head()).portals {
            let portal = tree.portal(*id);
            assert_eq!(portal.nodes, [Some(tree.head()), Some(outside)]);
            assert_eq!(portal.winding.len(), 4);
            // padded bounds: 8..56 on x and z, 24..40 on y
            let n = portal.plane().normal;
            let expected = if n.y.abs() > 0.5 { 48.0 * 48.0 } else { 48.0 * 16.0 };
            assert_relative_eq!(portal.winding.area(), expected, max_relative = 1e-6);
            // normals point into the box
            let center = DVec3::new(32.0, 32.0, 32.0);
            assert!(portal.plane().point_distance(center) > 0.0);
        }
    }

    #[test]
    fn single_split_portals() {
        let mut tree = single_split_tree();
        make_tree_portals(&mut tree);
        check_links(&tree);

        let head = tree.head();
        let outside = tree.outside_node().unwrap();
        let [front, back] = tree.node(head).children.unwrap();
        assert!(tree.node(head).portals.is_empty());
        assert_eq!(tree.node(front).portals.len(), 6);
        assert_eq!(tree.node(back).portals.len(), 6);
        assert_eq!(tree.node(outside).portals.len(), 10);
        assert_eq!(tree.portal_count(), 11);

        let between: Vec<_> = tree
            .node(front)
            .portals
            .iter()
            .filter(|id| tree.portal(**id).other_node(front) == Some(back))
            .collect();
        assert_eq!(between.len(), 1);
        let node_portal = tree.portal(*between[0]);
        assert_eq!(node_portal.onnode, Some(head));
        assert_eq!(node_portal.nodes, [Some(front), Some(back)]);
        assert_relative_eq!(node_portal.winding.area(), 48.0 * 48.0, max_relative = 1e-6);

        let bounds = tree.node(front).bounds;
        assert_relative_eq!(bounds.mins.y, 32.0);
        assert_relative_eq!(bounds.maxs.y, 40.0);
        assert_relative_eq!(bounds.mins.x, 8.0);
        assert_relative_eq!(bounds.maxs.z, 56.0);
    }

    #[test]
    fn base_winding_is_clipped_by_ancestors() {
        let tree = face_bsp(BspFace::from_brushes(&[cube_brush()]));
        // splitters in order: x=48 (+x), then x=16 (-x) behind it, then y=48
        let [front, back] = tree.node(tree.head()).children.unwrap();
        let [_, inner] = tree.node(back).children.unwrap();
        assert_eq!(tree.node(inner).plane.unwrap().normal, DVec3::Y);
        assert!(base_winding_for_node(&tree, front).is_none());

        let winding = base_winding_for_node(&tree, inner).unwrap();
        assert_eq!(winding.len(), 4);
        for p in winding.points() {
            assert!((p.x - 16.0).abs() < 1e-6 || (p.x - 48.0).abs() < 1e-6, "{p:?}");
            assert_relative_eq!(p.y, 48.0);
        }
    }

    #[test]
    fn cube_portals_stay_consistent() {
        let mut tree = face_bsp(BspFace::from_brushes(&[cube_brush()]));
        make_tree_portals(&mut tree);
        check_links(&tree);
        assert!(tree.portal_count() >= 6);
        for node in tree.nodes().iter().filter(|n| !n.is_leaf()) {
            assert!(node.portals.is_empty());
        }
    }
}
