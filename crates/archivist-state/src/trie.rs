//! Immutable state trie with structural sharing.
//!
//! The trie is a binary radix tree over the 256 bits of a ledger path. A
//! leaf sits at the shallowest depth where it is alone in its subtree, so
//! the shape, and therefore the root hash, is a canonical function of the
//! contained (path, payload) set. Updates copy the nodes on the touched
//! branch and share everything else with the parent trie, which keeps a
//! forest of consecutive snapshots cheap to hold in memory.

use std::sync::Arc;
use std::sync::OnceLock;

use blake2::{Blake2b, Digest};
use digest::consts::U32;

use archivist_types::{Commit, Digest32, IndexError, IndexResult, Path, Payload};

// Domain tags keep leaf, branch and empty hashes in disjoint ranges.
const TAG_EMPTY: u8 = 0x00;
const TAG_LEAF: u8 = 0x01;
const TAG_BRANCH: u8 = 0x02;

/// Total bit depth of a path.
const PATH_BITS: usize = 256;

enum Node {
    Empty,
    Leaf {
        path: Path,
        payload: Payload,
        hash: Digest32,
    },
    Branch {
        left: Arc<Node>,
        right: Arc<Node>,
        hash: Digest32,
    },
}

fn empty_hash() -> Digest32 {
    static HASH: OnceLock<Digest32> = OnceLock::new();
    *HASH.get_or_init(|| {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update([TAG_EMPTY]);
        hasher.finalize().into()
    })
}

fn leaf_hash(path: &Path, payload: &Payload) -> Digest32 {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update([TAG_LEAF]);
    hasher.update(path);
    for part in &payload.key {
        hasher.update(part.kind.to_be_bytes());
        hasher.update((part.data.len() as u64).to_be_bytes());
        hasher.update(&part.data);
    }
    hasher.update((payload.value.len() as u64).to_be_bytes());
    hasher.update(&payload.value);
    hasher.finalize().into()
}

fn branch_hash(left: &Digest32, right: &Digest32) -> Digest32 {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update([TAG_BRANCH]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

impl Node {
    fn hash(&self) -> Digest32 {
        match self {
            Node::Empty => empty_hash(),
            Node::Leaf { hash, .. } => *hash,
            Node::Branch { hash, .. } => *hash,
        }
    }

    fn leaf(path: Path, payload: Payload) -> Arc<Node> {
        let hash = leaf_hash(&path, &payload);
        Arc::new(Node::Leaf {
            path,
            payload,
            hash,
        })
    }

    fn branch(left: Arc<Node>, right: Arc<Node>) -> Arc<Node> {
        let hash = branch_hash(&left.hash(), &right.hash());
        Arc::new(Node::Branch { left, right, hash })
    }
}

/// Bit of a path at the given depth, most significant bit first.
fn bit(path: &Path, depth: usize) -> u8 {
    (path[depth / 8] >> (7 - depth % 8)) & 1
}

fn insert(node: &Arc<Node>, depth: usize, path: Path, payload: Payload) -> IndexResult<Arc<Node>> {
    if depth >= PATH_BITS {
        return Err(IndexError::Internal(format!(
            "path bits exhausted during insert (path: {})",
            hex::encode(path)
        )));
    }
    match node.as_ref() {
        Node::Empty => Ok(Node::leaf(path, payload)),
        Node::Leaf {
            path: existing_path,
            payload: existing_payload,
            ..
        } => {
            if *existing_path == path {
                return Ok(Node::leaf(path, payload));
            }
            split(
                *existing_path,
                existing_payload.clone(),
                path,
                payload,
                depth,
            )
        }
        Node::Branch { left, right, .. } => {
            if bit(&path, depth) == 0 {
                let left = insert(left, depth + 1, path, payload)?;
                Ok(Node::branch(left, Arc::clone(right)))
            } else {
                let right = insert(right, depth + 1, path, payload)?;
                Ok(Node::branch(Arc::clone(left), right))
            }
        }
    }
}

/// Build the branch chain separating two distinct leaves from `depth` down.
fn split(
    path_a: Path,
    payload_a: Payload,
    path_b: Path,
    payload_b: Payload,
    depth: usize,
) -> IndexResult<Arc<Node>> {
    if depth >= PATH_BITS {
        return Err(IndexError::Internal(format!(
            "path bits exhausted during split (path: {})",
            hex::encode(path_a)
        )));
    }
    let bit_a = bit(&path_a, depth);
    let bit_b = bit(&path_b, depth);
    if bit_a == bit_b {
        let child = split(path_a, payload_a, path_b, payload_b, depth + 1)?;
        let node = if bit_a == 0 {
            Node::branch(child, Arc::new(Node::Empty))
        } else {
            Node::branch(Arc::new(Node::Empty), child)
        };
        return Ok(node);
    }
    let leaf_a = Node::leaf(path_a, payload_a);
    let leaf_b = Node::leaf(path_b, payload_b);
    let node = if bit_a == 0 {
        Node::branch(leaf_a, leaf_b)
    } else {
        Node::branch(leaf_b, leaf_a)
    };
    Ok(node)
}

/// An immutable snapshot of the ledger state.
#[derive(Clone)]
pub struct Trie {
    root: Arc<Node>,
}

impl Trie {
    /// The empty trie.
    pub fn empty() -> Self {
        Self {
            root: Arc::new(Node::Empty),
        }
    }

    /// Root hash identifying this snapshot.
    pub fn root_hash(&self) -> Commit {
        self.root.hash()
    }

    /// Read the payload stored at a path, if any.
    pub fn read(&self, path: &Path) -> Option<&Payload> {
        let mut node = self.root.as_ref();
        let mut depth = 0;
        loop {
            match node {
                Node::Empty => return None,
                Node::Leaf {
                    path: leaf_path,
                    payload,
                    ..
                } => {
                    if leaf_path == path {
                        return Some(payload);
                    }
                    return None;
                }
                Node::Branch { left, right, .. } => {
                    node = if bit(path, depth) == 0 { left } else { right };
                    depth += 1;
                }
            }
        }
    }

    /// Produce a new trie with the given register writes applied.
    ///
    /// The input trie is untouched; unmodified subtrees are shared between
    /// the two snapshots.
    pub fn with_updates(&self, paths: &[Path], payloads: &[Payload]) -> IndexResult<Trie> {
        if paths.len() != payloads.len() {
            return Err(IndexError::Internal(format!(
                "mismatched update: {} paths but {} payloads",
                paths.len(),
                payloads.len()
            )));
        }
        let mut root = Arc::clone(&self.root);
        for (path, payload) in paths.iter().zip(payloads.iter()) {
            root = insert(&root, 0, *path, payload.clone())?;
        }
        Ok(Trie { root })
    }

    /// Enumerate all (path, payload) leaves, in path order.
    pub fn leaves(&self) -> Vec<(Path, Payload)> {
        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }

    /// Number of registers stored.
    pub fn len(&self) -> usize {
        count(&self.root)
    }

    /// Whether the trie stores no registers.
    pub fn is_empty(&self) -> bool {
        matches!(self.root.as_ref(), Node::Empty)
    }
}

fn collect(node: &Arc<Node>, out: &mut Vec<(Path, Payload)>) {
    match node.as_ref() {
        Node::Empty => {}
        Node::Leaf { path, payload, .. } => out.push((*path, payload.clone())),
        Node::Branch { left, right, .. } => {
            collect(left, out);
            collect(right, out);
        }
    }
}

fn count(node: &Arc<Node>) -> usize {
    match node.as_ref() {
        Node::Empty => 0,
        Node::Leaf { .. } => 1,
        Node::Branch { left, right, .. } => count(left) + count(right),
    }
}

impl std::fmt::Debug for Trie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trie")
            .field("root", &hex::encode(self.root_hash()))
            .field("registers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(first: u8) -> Path {
        let mut path = [0u8; 32];
        path[0] = first;
        path
    }

    fn payload(value: &[u8]) -> Payload {
        Payload::from_value(value.to_vec())
    }

    #[test]
    fn test_empty_root_is_stable() {
        assert_eq!(Trie::empty().root_hash(), Trie::empty().root_hash());
        assert_ne!(Trie::empty().root_hash(), [0u8; 32]);
    }

    #[test]
    fn test_read_back_inserted_values() {
        let trie = Trie::empty()
            .with_updates(
                &[path(0x00), path(0x80), path(0x81)],
                &[payload(b"a"), payload(b"b"), payload(b"c")],
            )
            .unwrap();

        assert_eq!(trie.read(&path(0x00)).unwrap().value, b"a");
        assert_eq!(trie.read(&path(0x80)).unwrap().value, b"b");
        assert_eq!(trie.read(&path(0x81)).unwrap().value, b"c");
        assert!(trie.read(&path(0x42)).is_none());
        assert_eq!(trie.len(), 3);
    }

    #[test]
    fn test_root_hash_is_insertion_order_independent() {
        let forward = Trie::empty()
            .with_updates(&[path(1), path(2), path(3)], &[payload(b"a"), payload(b"b"), payload(b"c")])
            .unwrap();
        let reverse = Trie::empty()
            .with_updates(&[path(3), path(2), path(1)], &[payload(b"c"), payload(b"b"), payload(b"a")])
            .unwrap();
        assert_eq!(forward.root_hash(), reverse.root_hash());
    }

    #[test]
    fn test_overwrite_changes_root() {
        let base = Trie::empty()
            .with_updates(&[path(1)], &[payload(b"a")])
            .unwrap();
        let updated = base.with_updates(&[path(1)], &[payload(b"b")]).unwrap();

        assert_ne!(base.root_hash(), updated.root_hash());
        assert_eq!(base.read(&path(1)).unwrap().value, b"a");
        assert_eq!(updated.read(&path(1)).unwrap().value, b"b");
        assert_eq!(updated.len(), 1);
    }

    #[test]
    fn test_parent_snapshot_untouched_by_update() {
        let base = Trie::empty()
            .with_updates(&[path(1), path(2)], &[payload(b"a"), payload(b"b")])
            .unwrap();
        let root_before = base.root_hash();

        let _child = base
            .with_updates(&[path(2), path(9)], &[payload(b"b2"), payload(b"x")])
            .unwrap();

        assert_eq!(base.root_hash(), root_before);
        assert_eq!(base.read(&path(2)).unwrap().value, b"b");
        assert!(base.read(&path(9)).is_none());
    }

    #[test]
    fn test_leaves_enumeration() {
        let trie = Trie::empty()
            .with_updates(&[path(5), path(1)], &[payload(b"five"), payload(b"one")])
            .unwrap();
        let leaves = trie.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].0, path(1));
        assert_eq!(leaves[1].0, path(5));
    }

    #[test]
    fn test_adjacent_paths_diverge_late() {
        // Paths differing only in the last bit force a deep branch chain.
        let mut a = [0xFFu8; 32];
        let mut b = [0xFFu8; 32];
        a[31] = 0xFE;
        b[31] = 0xFF;
        let trie = Trie::empty()
            .with_updates(&[a, b], &[payload(b"a"), payload(b"b")])
            .unwrap();
        assert_eq!(trie.read(&a).unwrap().value, b"a");
        assert_eq!(trie.read(&b).unwrap().value, b"b");
    }
}
