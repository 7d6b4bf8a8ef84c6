//! Merkle tree implementation for transaction commitments.
//!
//! Leaves hold the raw committed bytes; every internal node holds
//! `hash(left.data || right.data)`. A level with an odd number of nodes has
//! its last node duplicated before pairing. Duplicating leaves is a known
//! weakness of this scheme: `[a, b, c]` and `[a, b, c, c]` commit to the same
//! root, so callers that need second-preimage resistance should commit to a
//! scheme with a domain-separated padding leaf instead.

use crate::hash::{hash_concat, Hash};
use thiserror::Error;

/// Errors that can occur while building a merkle tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("cannot build a merkle tree from an empty list")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, MerkleError>;

/// A node of the tree. Leaves own the committed bytes, internal nodes own
/// their two children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MerkleNode {
    Leaf {
        data: Vec<u8>,
    },
    Internal {
        data: Hash,
        left: Box<MerkleNode>,
        right: Box<MerkleNode>,
    },
}

impl MerkleNode {
    fn leaf(data: Vec<u8>) -> Self {
        MerkleNode::Leaf { data }
    }

    fn parent(left: MerkleNode, right: MerkleNode) -> Self {
        let data = hash_concat(&[left.data(), right.data()]);
        MerkleNode::Internal {
            data,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// The bytes this node commits to.
    pub fn data(&self) -> &[u8] {
        match self {
            MerkleNode::Leaf { data } => data,
            MerkleNode::Internal { data, .. } => data.as_ref(),
        }
    }

    /// The children of an internal node, `None` for a leaf.
    pub fn children(&self) -> Option<(&MerkleNode, &MerkleNode)> {
        match self {
            MerkleNode::Leaf { .. } => None,
            MerkleNode::Internal { left, right, .. } => Some((left, right)),
        }
    }
}

/// An immutable binary merkle tree.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    root: MerkleNode,
    root_hash: Hash,
    leaf_count: usize,
    depth: usize,
}

/// A sibling-path proof for a single leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// The leaf being proven.
    pub leaf: Vec<u8>,
    /// Sibling data from leaf to root.
    pub siblings: Vec<Vec<u8>>,
    /// Direction for each sibling (true = right, false = left).
    pub directions: Vec<bool>,
}

impl MerkleTree {
    /// Build a merkle tree over an ordered list of byte strings.
    pub fn new<I, T>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Vec<u8>>,
    {
        let mut level: Vec<MerkleNode> = items
            .into_iter()
            .map(|item| MerkleNode::leaf(item.into()))
            .collect();

        if level.is_empty() {
            return Err(MerkleError::EmptyInput);
        }

        let leaf_count = level.len();
        let mut depth = 0;

        // A lone leaf still gets paired with its copy, so the root is
        // always a hash.
        loop {
            if level.len() % 2 != 0 {
                if let Some(last) = level.last().cloned() {
                    level.push(last);
                }
            }

            let mut next = Vec::with_capacity(level.len() / 2);
            let mut nodes = level.into_iter();
            while let (Some(left), Some(right)) = (nodes.next(), nodes.next()) {
                next.push(MerkleNode::parent(left, right));
            }
            depth += 1;
            level = next;

            if level.len() == 1 {
                break;
            }
        }

        let root = level.pop().ok_or(MerkleError::EmptyInput)?;
        let root_hash = match &root {
            MerkleNode::Internal { data, .. } => *data,
            MerkleNode::Leaf { .. } => return Err(MerkleError::EmptyInput),
        };
        Ok(Self {
            root,
            root_hash,
            leaf_count,
            depth,
        })
    }

    /// Get the root of the merkle tree.
    pub fn root(&self) -> Hash {
        self.root_hash
    }

    /// The root node, for callers that want to walk the tree.
    pub fn root_node(&self) -> &MerkleNode {
        &self.root
    }

    /// Get the number of leaves the tree was built from (before padding).
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Heuristic membership test.
    ///
    /// At each internal node the target is compared against both children
    /// and against the recomputed parent hash. Otherwise the walk goes left
    /// when the target sorts below the left child's data and right when it
    /// does not. This is not a proof: items on the path not taken are never
    /// seen, so `false` does not mean the item is absent. Use [`proof`] and
    /// [`verify_proof`] for a real inclusion check.
    ///
    /// [`proof`]: MerkleTree::proof
    pub fn contains(&self, target: &[u8]) -> bool {
        let mut node = &self.root;

        while let Some((left, right)) = node.children() {
            if target == left.data() || target == right.data() {
                return true;
            }
            if target == hash_concat(&[left.data(), right.data()]).as_bytes().as_slice() {
                return true;
            }

            node = if target < left.data() { left } else { right };
        }

        false
    }

    /// Generate a proof for the leaf at the given index.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count {
            return None;
        }

        let mut siblings = Vec::with_capacity(self.depth);
        let mut directions = Vec::with_capacity(self.depth);
        let mut node = &self.root;

        // Bit `level` of the index picks the child at that height.
        for level in (0..self.depth).rev() {
            let (left, right) = node.children()?;
            if (index >> level) & 1 == 0 {
                siblings.push(right.data().to_vec());
                directions.push(true);
                node = left;
            } else {
                siblings.push(left.data().to_vec());
                directions.push(false);
                node = right;
            }
        }

        siblings.reverse();
        directions.reverse();

        Some(MerkleProof {
            leaf: node.data().to_vec(),
            siblings,
            directions,
        })
    }

    /// Verify a merkle proof against this tree's root.
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        verify_proof(&self.root(), proof)
    }
}

/// Compute the merkle root of a list of byte strings.
pub fn merkle_root<I, T>(items: I) -> Result<Hash>
where
    I: IntoIterator<Item = T>,
    T: Into<Vec<u8>>,
{
    MerkleTree::new(items).map(|tree| tree.root())
}

/// Verify a merkle proof against a given root.
pub fn verify_proof(root: &Hash, proof: &MerkleProof) -> bool {
    if proof.siblings.len() != proof.directions.len() || proof.siblings.is_empty() {
        return false;
    }

    let mut current = proof.leaf.clone();

    for (sibling, is_right) in proof.siblings.iter().zip(proof.directions.iter()) {
        let parent = if *is_right {
            hash_concat(&[current.as_slice(), sibling.as_slice()])
        } else {
            hash_concat(&[sibling.as_slice(), current.as_slice()])
        };
        current = parent.as_bytes().to_vec();
    }

    current.as_slice() == root.as_bytes().as_slice()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash;

    fn make_items(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("item-{i}").into_bytes()).collect()
    }

    #[test]
    fn test_merkle_empty_input() {
        let items: Vec<Vec<u8>> = Vec::new();
        assert_eq!(MerkleTree::new(items).unwrap_err(), MerkleError::EmptyInput);
        assert_eq!(
            merkle_root(Vec::<Vec<u8>>::new()),
            Err(MerkleError::EmptyInput)
        );
    }

    #[test]
    fn test_merkle_root_single() {
        let root = merkle_root(vec![b"only".to_vec()]).unwrap();
        assert_eq!(root, hash(b"onlyonly"));
    }

    #[test]
    fn test_merkle_root_two() {
        let items = make_items(2);
        let root = merkle_root(items.clone()).unwrap();
        let expected = hash_concat(&[items[0].as_slice(), items[1].as_slice()]);
        assert_eq!(root, expected);
    }

    #[test]
    fn test_merkle_root_three_duplicates_last() {
        let items = make_items(3);
        let left = hash_concat(&[items[0].as_slice(), items[1].as_slice()]);
        let right = hash_concat(&[items[2].as_slice(), items[2].as_slice()]);
        let expected = hash_concat(&[left.as_ref(), right.as_ref()]);
        assert_eq!(merkle_root(items).unwrap(), expected);
    }

    #[test]
    fn test_merkle_odd_inner_level_duplicated() {
        // Six leaves give three parents; the third parent pairs with itself.
        let items = make_items(6);
        let p: Vec<Hash> = items
            .chunks(2)
            .map(|pair| hash_concat(&[pair[0].as_slice(), pair[1].as_slice()]))
            .collect();
        let left = hash_concat(&[p[0].as_ref(), p[1].as_ref()]);
        let right = hash_concat(&[p[2].as_ref(), p[2].as_ref()]);
        let expected = hash_concat(&[left.as_ref(), right.as_ref()]);
        assert_eq!(merkle_root(items).unwrap(), expected);
    }

    #[test]
    fn test_merkle_root_deterministic() {
        let items = make_items(10);
        let r1 = merkle_root(items.clone()).unwrap();
        let r2 = merkle_root(items).unwrap();
        assert_eq!(r1, r2);
    }

    #[test]
    fn test_merkle_root_order_matters() {
        let items = make_items(4);
        let mut swapped = items.clone();
        swapped.swap(1, 2);

        let r1 = merkle_root(items).unwrap();
        let r2 = merkle_root(swapped).unwrap();
        assert_ne!(r1, r2);
    }

    #[test]
    fn test_merkle_root_value_matters() {
        let items = make_items(5);
        let mut changed = items.clone();
        changed[4].push(b'!');
        assert_ne!(merkle_root(items).unwrap(), merkle_root(changed).unwrap());
    }

    #[test]
    fn test_contains_children_of_root() {
        let items = make_items(2);
        let tree = MerkleTree::new(items.clone()).unwrap();

        assert!(tree.contains(&items[0]));
        assert!(tree.contains(&items[1]));
        assert!(tree.contains(tree.root().as_ref()));
        assert!(!tree.contains(b"missing"));
    }

    #[test]
    fn test_contains_inner_node() {
        let items = make_items(4);
        let tree = MerkleTree::new(items.clone()).unwrap();
        let left = hash_concat(&[items[0].as_slice(), items[1].as_slice()]);
        let right = hash_concat(&[items[2].as_slice(), items[3].as_slice()]);

        assert!(tree.contains(left.as_ref()));
        assert!(tree.contains(right.as_ref()));
    }

    #[test]
    fn test_contains_follows_ordering() {
        let items = make_items(4);
        let tree = MerkleTree::new(items.clone()).unwrap();
        let (left, right) = tree.root_node().children().unwrap();

        // Whichever subtree the walk picks for a leaf, finding it requires
        // the descent rule to land on that leaf's parent.
        for item in &items {
            let goes_left = item.as_slice() < left.data();
            let subtree = if goes_left { left } else { right };
            let (a, b) = subtree.children().unwrap();
            let expected = a.data() == item.as_slice() || b.data() == item.as_slice();
            assert_eq!(tree.contains(item), expected);
        }
    }

    #[test]
    fn test_merkle_proof_valid() {
        let items = make_items(8);
        let tree = MerkleTree::new(items.clone()).unwrap();

        for (i, item) in items.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert_eq!(&proof.leaf, item);
            assert!(tree.verify_proof(&proof));
            assert!(verify_proof(&tree.root(), &proof));
        }
    }

    #[test]
    fn test_merkle_proof_odd_leaves() {
        for n in [1, 3, 5, 7] {
            let items = make_items(n);
            let tree = MerkleTree::new(items.clone()).unwrap();
            for (i, item) in items.iter().enumerate() {
                let proof = tree.proof(i).unwrap();
                assert_eq!(&proof.leaf, item);
                assert!(tree.verify_proof(&proof), "n={n} i={i}");
            }
        }
    }

    #[test]
    fn test_merkle_proof_invalid_index() {
        let tree = MerkleTree::new(make_items(4)).unwrap();
        assert!(tree.proof(4).is_none());
        assert!(tree.proof(10).is_none());
    }

    #[test]
    fn test_merkle_proof_wrong_root() {
        let tree = MerkleTree::new(make_items(4)).unwrap();
        let proof = tree.proof(0).unwrap();

        let wrong_root = hash(b"wrong");
        assert!(!verify_proof(&wrong_root, &proof));
    }

    #[test]
    fn test_merkle_proof_tampered_leaf() {
        let tree = MerkleTree::new(make_items(4)).unwrap();
        let mut proof = tree.proof(2).unwrap();
        proof.leaf = b"forged".to_vec();
        assert!(!tree.verify_proof(&proof));
    }
}
