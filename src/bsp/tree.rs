use tracing::debug;

use crate::bsp::portal::{Portal, PortalId};
use crate::geometry::{Bounds, Brush, Plane, PlaneSide, Winding};

/// Grid spacing of the forced axial splits.
pub const BLOCK_SIZE: f64 = 1024.0;

/// Classification tolerance for faces against a splitter. Faces are cut with
/// twice this value.
pub const CLIP_EPSILON: f64 = 0.1;

/// Score every candidate must beat to be chosen as a splitter.
const SPLIT_SCORE_SENTINEL: i64 = -999_999;

/// Index of a node in [`Tree`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Brush side a BSP face (or fragment of one) was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceSource {
    pub brush: usize,
    pub side: usize,
}

/// Polygon fed to, and distributed by, the face BSP.
#[derive(Debug, Clone)]
pub struct BspFace {
    pub winding: Winding,
    pub source: FaceSource,
}

impl BspFace {
    pub fn new(winding: Winding, source: FaceSource) -> Self {
        Self { winding, source }
    }

    pub fn plane(&self) -> &Plane {
        self.winding.plane()
    }

    /// Structural face list: every non-empty side of every brush.
    pub fn from_brushes(brushes: &[Brush]) -> Vec<BspFace> {
        brushes
            .iter()
            .enumerate()
            .flat_map(|(b, brush)| {
                brush
                    .sides()
                    .iter()
                    .enumerate()
                    .filter(|(_, side)| !side.winding.is_empty())
                    .map(move |(s, side)| {
                        BspFace::new(side.winding.clone(), FaceSource { brush: b, side: s })
                    })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    /// Splitter; `None` on leaves.
    pub plane: Option<Plane>,
    /// `[front, back]`; `None` on leaves.
    pub children: Option<[NodeId; 2]>,
    pub parent: Option<NodeId>,
    pub bounds: Bounds,
    pub portals: Vec<PortalId>,
    /// Faces consumed by this node's splitter (or left on a leaf).
    pub faces: Vec<BspFace>,
    /// Brushes contributing to `faces`, ascending.
    pub brushes: Vec<usize>,
}

impl Node {
    fn new(parent: Option<NodeId>, bounds: Bounds) -> Self {
        Self {
            parent,
            bounds,
            ..Default::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// Face BSP over an arena of nodes, plus the portals between them.
#[derive(Debug, Clone)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) portals: Vec<Portal>,
    pub(crate) head: NodeId,
    pub(crate) outside: Option<NodeId>,
    pub(crate) bounds: Bounds,
}

impl Tree {
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// Synthetic node outside the level, present once portals were generated.
    pub fn outside_node(&self) -> Option<NodeId> {
        self.outside
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn portal(&self, id: PortalId) -> &Portal {
        &self.portals[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Portals currently connecting two nodes.
    pub fn portal_count(&self) -> usize {
        self.portals.iter().filter(|p| p.is_attached()).count()
    }

    /// Every face fragment held by the tree, depth first from the head.
    pub fn faces(&self) -> Vec<&BspFace> {
        let mut out = Vec::new();
        let mut stack = vec![self.head];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            out.extend(node.faces.iter());
            if let Some([front, back]) = node.children {
                stack.push(back);
                stack.push(front);
            }
        }
        out
    }

    pub(crate) fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn build_tree(&mut self, id: NodeId, faces: Vec<BspFace>) {
        let Some(split) = select_split_plane(&self.nodes[id.0].bounds, &faces) else {
            debug!(node = id.0, faces = faces.len(), "leaf");
            self.nodes[id.0].faces = faces;
            return;
        };

        let mut consumed = Vec::new();
        let mut children: [Vec<BspFace>; 2] = Default::default();
        for face in faces {
            if *face.plane() == split {
                consumed.push(face);
                continue;
            }
            match split.side(&face.winding, CLIP_EPSILON) {
                PlaneSide::Front => children[0].push(face),
                PlaneSide::Back => children[1].push(face),
                PlaneSide::On => {
                    let child = if face.plane().normal.dot(split.normal) > 0.0 { 0 } else { 1 };
                    children[child].push(face);
                }
                PlaneSide::Cross => {
                    let (front, back) = face.winding.split(&split, CLIP_EPSILON * 2.0);
                    if let Some(w) = front {
                        children[0].push(BspFace::new(w, face.source));
                    }
                    if let Some(w) = back {
                        children[1].push(BspFace::new(w, face.source));
                    }
                }
            }
        }

        let mut brushes: Vec<usize> = consumed.iter().map(|f| f.source.brush).collect();
        brushes.sort_unstable();
        brushes.dedup();

        let parent_bounds = self.nodes[id.0].bounds;
        let mut child_bounds = [parent_bounds, parent_bounds];
        for axis in 0..3 {
            if (split.normal[axis] - 1.0).abs() < 0.001 {
                child_bounds[0].mins[axis] = split.dist();
                child_bounds[1].maxs[axis] = split.dist();
                break;
            }
        }

        let front = self.push_node(Node::new(Some(id), child_bounds[0]));
        let back = self.push_node(Node::new(Some(id), child_bounds[1]));
        let node = &mut self.nodes[id.0];
        node.plane = Some(split);
        node.children = Some([front, back]);
        node.faces = consumed;
        node.brushes = brushes;

        let [front_faces, back_faces] = children;
        self.build_tree(front, front_faces);
        self.build_tree(back, back_faces);
    }
}

/// Pick the plane that partitions a node.
///
/// A block-grid plane strictly inside the bounds (with a one unit margin) wins
/// outright. Otherwise each distinct face plane is scored by how many faces
/// lie on it and how many it would cut, with a bonus for axial planes.
/// Returns `None` when the node should be a leaf.
pub fn select_split_plane(bounds: &Bounds, faces: &[BspFace]) -> Option<Plane> {
    if faces.is_empty() {
        return None;
    }

    let half = bounds.half_size();
    for axis in 0..3 {
        let cells = if half[axis] > BLOCK_SIZE {
            ((bounds.mins[axis] + half[axis]) / BLOCK_SIZE).floor()
        } else {
            (bounds.mins[axis] / BLOCK_SIZE).floor()
        };
        let dist = BLOCK_SIZE * (cells + 1.0);
        if dist > bounds.mins[axis] + 1.0 && dist < bounds.maxs[axis] - 1.0 {
            return Some(Plane::axial(axis, dist));
        }
    }

    let mut checked = vec![false; faces.len()];
    let mut best_score = SPLIT_SCORE_SENTINEL;
    let mut best = None;
    for (i, candidate) in faces.iter().enumerate() {
        if checked[i] {
            continue;
        }
        let plane = candidate.plane();
        let mut facing = 0i64;
        let mut splits = 0i64;
        for (j, face) in faces.iter().enumerate() {
            if face.plane() == plane {
                facing += 1;
                checked[j] = true;
                continue;
            }
            if plane.side(&face.winding, CLIP_EPSILON) == PlaneSide::Cross {
                splits += 1;
            }
        }
        let mut score = 5 * facing - 5 * splits;
        if plane.is_axial() {
            score += 5;
        }
        if score > best_score {
            best_score = score;
            best = Some(*plane);
        }
    }
    best
}

/// Build a face BSP over `faces`.
pub fn face_bsp(faces: Vec<BspFace>) -> Tree {
    let mut bounds = Bounds::empty();
    for face in &faces {
        for p in face.winding.points() {
            bounds.include_point(*p);
        }
    }

    let mut tree = Tree {
        nodes: Vec::new(),
        portals: Vec::new(),
        head: NodeId(0),
        outside: None,
        bounds,
    };
    tree.head = tree.push_node(Node::new(None, bounds));
    tree.build_tree(tree.head, faces);
    debug!(
        nodes = tree.node_count(),
        leaves = tree.leaf_count(),
        "face bsp built"
    );
    tree
}
