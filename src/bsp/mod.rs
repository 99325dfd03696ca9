pub mod portal;
pub mod tree;

pub use portal::{Portal, PortalId, make_tree_portals};
pub use tree::{BspFace, FaceSource, Node, NodeId, Tree, face_bsp};
