//! Triad Merkle Tree for output commitments
//!
//! Leaves are inserted three at a time. Each triad is combined with a ternary
//! hash, and everything above that level is an ordinary binary tree.
//!
//! ```text
//!                        Root                      level D-1
//!                      /      \
//!                   N10        N11                 level 1
//!                  /   \      /   \
//!                T0    T1   T2    T3               level 0 (triad hashes)
//!               /|\   /|\   /|\   /|\
//!              c c c c c c c c c c c c             leaves
//! ```
//!
//! A tree of depth `D` holds `2^(D-1)` triads. Empty positions use the
//! precomputed zero subtrees:
//! - zeros[0] = H3(Z, Z, Z)
//! - zeros[i] = H2(zeros[i-1], zeros[i-1])
//!
//! Besides the incremental frontier (`filled_subtrees`) the tree keeps every
//! computed node per level (`filled_paths`) so proofs for any leaf are read
//! straight from the cache.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::error::{PrivacyError, Result};
use crate::field::{FieldElement, field_to_decimal, serde_field};
use crate::hash::{CircomPoseidon, FieldHasher};

/// Deepest supported tree (2^31 triads)
pub const MAX_TREE_DEPTH: usize = 32;

/// Leaves per triad
pub const TRIAD_SIZE: usize = 3;

/// One element of a Merkle path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// The two other leaves of the triad (leaf level only)
    Pair(#[serde(with = "serde_field::pair")] [FieldElement; 2]),
    /// Sibling node (every level above the leaves)
    Single(#[serde(with = "serde_field")] FieldElement),
}

/// Inclusion proof for a single leaf
///
/// `path_elements[0]` / `path_indices[0]` describe the leaf's triad (index is
/// the leaf's position 0..=2 inside it). Every later entry is a binary level
/// with index 0 (node on the left) or 1 (node on the right).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    #[serde(with = "serde_field")]
    pub leaf: FieldElement,
    #[serde(with = "serde_field")]
    pub root: FieldElement,
    pub depth: usize,
    pub path_elements: Vec<PathElement>,
    pub path_indices: Vec<u8>,
}

/// A proof flattened into the signal layout the circuit expects
///
/// The leaf-level pair becomes two elements and the leaf position becomes two
/// one-bit indices (low bit first), so both vectors have `depth + 1` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitInputs {
    #[serde(with = "serde_field")]
    pub leaf: FieldElement,
    #[serde(with = "serde_field")]
    pub root: FieldElement,
    #[serde(with = "serde_field::vec")]
    pub path_elements: Vec<FieldElement>,
    pub path_indices: Vec<u8>,
}

impl MerkleProof {
    /// Reshape for the circuit
    pub fn circuit_inputs(&self) -> CircuitInputs {
        let mut path_elements = Vec::with_capacity(self.depth + 1);
        let mut path_indices = Vec::with_capacity(self.depth + 1);

        for (i, (element, index)) in self
            .path_elements
            .iter()
            .zip(self.path_indices.iter())
            .enumerate()
        {
            match element {
                PathElement::Pair(pair) => path_elements.extend_from_slice(pair),
                PathElement::Single(node) => path_elements.push(*node),
            }
            if i == 0 {
                path_indices.push(index & 1);
                path_indices.push((index >> 1) & 1);
            } else {
                path_indices.push(*index);
            }
        }

        CircuitInputs {
            leaf: self.leaf,
            root: self.root,
            path_elements,
            path_indices,
        }
    }

    /// Shorthand for [`verify_merkle_path`]
    pub fn verify<H: FieldHasher>(&self, hasher: &H) -> bool {
        verify_merkle_path(self, hasher)
    }
}

/// Check a proof against its own root. Never errors; malformed proofs are
/// simply invalid.
pub fn verify_merkle_path<H: FieldHasher>(proof: &MerkleProof, hasher: &H) -> bool {
    compute_root(proof, hasher).is_some_and(|root| root == proof.root)
}

fn compute_root<H: FieldHasher>(proof: &MerkleProof, hasher: &H) -> Option<FieldElement> {
    if proof.depth == 0
        || proof.depth > MAX_TREE_DEPTH
        || proof.path_elements.len() != proof.depth
        || proof.path_indices.len() != proof.depth
    {
        return None;
    }

    let [first, b] = match proof.path_elements[0] {
        PathElement::Pair(pair) => pair,
        PathElement::Single(_) => return None,
    };
    let triad = match proof.path_indices[0] {
        0 => [proof.leaf, first, b],
        1 => [first, proof.leaf, b],
        2 => [first, b, proof.leaf],
        _ => return None,
    };
    let mut current = hasher.hash3(triad[0], triad[1], triad[2]).ok()?;

    for (element, index) in proof.path_elements[1..]
        .iter()
        .zip(proof.path_indices[1..].iter())
    {
        let sibling = match element {
            PathElement::Single(node) => *node,
            PathElement::Pair(_) => return None,
        };
        current = match index {
            0 => hasher.hash2(current, sibling).ok()?,
            1 => hasher.hash2(sibling, current).ok()?,
            _ => return None,
        };
    }

    Some(current)
}

/// Parameters a persisted tree is expected to match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    pub depth: usize,
    pub zero_value: FieldElement,
}

/// Append-only commitment tree
#[derive(Debug, Clone)]
pub struct TriadMerkleTree<H: FieldHasher = CircomPoseidon> {
    depth: usize,
    zero_value: FieldElement,
    /// Empty subtree root per level (length = depth)
    zeros: Vec<FieldElement>,
    leaves: Vec<FieldElement>,
    /// Latest left node per level (length = depth - 1)
    filled_subtrees: Vec<FieldElement>,
    /// Every computed node: filled_paths[level][position] (length = depth)
    filled_paths: Vec<Vec<FieldElement>>,
    root: FieldElement,
    /// Number of triads inserted
    next_index: u64,
    hasher: H,
}

impl<H: FieldHasher> TriadMerkleTree<H> {
    /// Create an empty tree
    pub fn new(depth: usize, zero_value: FieldElement, hasher: H) -> Result<Self> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(PrivacyError::MalformedInput(format!(
                "tree depth must be in 1..={MAX_TREE_DEPTH}, got {depth}"
            )));
        }

        let zeros = compute_zeros(depth, zero_value, &hasher)?;
        let filled_subtrees = zeros[..depth - 1].to_vec();
        let root = zeros[depth - 1];

        Ok(Self {
            depth,
            zero_value,
            zeros,
            leaves: Vec::new(),
            filled_subtrees,
            filled_paths: vec![Vec::new(); depth],
            root,
            next_index: 0,
            hasher,
        })
    }

    /// Append one triad and return the index of its first leaf.
    ///
    /// All new nodes are computed before anything is written, so on error
    /// the tree is left untouched.
    pub fn insert_batch(&mut self, leaves: [FieldElement; TRIAD_SIZE]) -> Result<u64> {
        let capacity = self.capacity();
        if self.next_index >= capacity {
            return Err(PrivacyError::CapacityExceeded { capacity });
        }

        let triad_index = self.next_index;
        let mut current_index = triad_index;
        let mut current = self.hasher.hash3(leaves[0], leaves[1], leaves[2])?;

        let mut new_subtrees = self.filled_subtrees.clone();
        let mut updates = Vec::with_capacity(self.depth);
        updates.push((0usize, current_index, current));

        for level in 0..self.depth - 1 {
            let (left, right) = if current_index % 2 == 0 {
                new_subtrees[level] = current;
                (current, self.zeros[level])
            } else {
                (self.filled_subtrees[level], current)
            };

            current = self.hasher.hash2(left, right)?;
            current_index /= 2;
            updates.push((level + 1, current_index, current));
        }

        for (level, position, node) in updates {
            let nodes = &mut self.filled_paths[level];
            let position = position as usize;
            if position < nodes.len() {
                nodes[position] = node;
            } else {
                nodes.push(node);
            }
        }
        self.filled_subtrees = new_subtrees;
        self.leaves.extend_from_slice(&leaves);
        self.root = current;
        self.next_index += 1;

        log::debug!(
            "inserted triad {triad_index}, root {}",
            field_to_decimal(&self.root)
        );

        Ok(triad_index * TRIAD_SIZE as u64)
    }

    /// Inclusion proof for the leaf at `leaf_index`
    pub fn gen_merkle_path(&self, leaf_index: u64) -> Result<MerkleProof> {
        let len = self.leaves.len() as u64;
        if leaf_index >= len {
            return Err(PrivacyError::LeafIndexOutOfRange {
                index: leaf_index,
                len,
            });
        }

        let triad = leaf_index / TRIAD_SIZE as u64;
        let position = (leaf_index % TRIAD_SIZE as u64) as usize;
        let start = triad as usize * TRIAD_SIZE;
        let triad_leaves = &self.leaves[start..start + TRIAD_SIZE];

        let mut others = triad_leaves
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != position)
            .map(|(_, leaf)| *leaf);
        let pair = [
            others.next().unwrap_or(self.zero_value),
            others.next().unwrap_or(self.zero_value),
        ];

        let mut path_elements = Vec::with_capacity(self.depth);
        let mut path_indices = Vec::with_capacity(self.depth);
        path_elements.push(PathElement::Pair(pair));
        path_indices.push(position as u8);

        let mut current_index = triad;
        for level in 0..self.depth - 1 {
            let sibling_index = (current_index ^ 1) as usize;
            let sibling = self.filled_paths[level]
                .get(sibling_index)
                .copied()
                .unwrap_or(self.zeros[level]);

            path_elements.push(PathElement::Single(sibling));
            path_indices.push((current_index & 1) as u8);
            current_index /= 2;
        }

        Ok(MerkleProof {
            leaf: triad_leaves[position],
            root: self.root,
            depth: self.depth,
            path_elements,
            path_indices,
        })
    }

    pub fn root(&self) -> FieldElement {
        self.root
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn zero_value(&self) -> FieldElement {
        self.zero_value
    }

    pub fn zeros(&self) -> &[FieldElement] {
        &self.zeros
    }

    pub fn leaves(&self) -> &[FieldElement] {
        &self.leaves
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn triad_count(&self) -> u64 {
        self.next_index
    }

    /// Maximum number of triads
    pub fn capacity(&self) -> u64 {
        1u64 << (self.depth - 1)
    }

    pub fn is_full(&self) -> bool {
        self.next_index >= self.capacity()
    }

    /// Position of the first leaf equal to `leaf`
    pub fn index_of(&self, leaf: &FieldElement) -> Option<u64> {
        self.leaves.iter().position(|l| l == leaf).map(|i| i as u64)
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Pretty JSON snapshot, field elements as decimal strings
    pub fn serialize(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| PrivacyError::InvalidSnapshot(e.to_string()))
    }

    /// Compact snapshot: base64 of the binary encoding
    pub fn serialize_compressed(&self) -> Result<String> {
        let bytes = bincode::serialize(&self.snapshot())
            .map_err(|e| PrivacyError::InvalidSnapshot(e.to_string()))?;
        Ok(BASE64.encode(bytes))
    }

    /// Rebuild a tree from either snapshot form
    pub fn deserialize(data: &str, hasher: H) -> Result<Self> {
        let data = data.trim();
        let snapshot: TreeSnapshot = if data.starts_with('{') {
            serde_json::from_str(data).map_err(|e| PrivacyError::InvalidSnapshot(e.to_string()))?
        } else {
            let bytes = BASE64
                .decode(data)
                .map_err(|e| PrivacyError::InvalidSnapshot(format!("base64: {e}")))?;
            bincode::deserialize(&bytes)
                .map_err(|e| PrivacyError::InvalidSnapshot(e.to_string()))?
        };

        Self::from_snapshot(snapshot, hasher).inspect_err(|e| {
            log::warn!("rejected tree snapshot: {e}");
        })
    }

    pub fn save(&self, path: impl AsRef<Path>, compressed: bool) -> Result<()> {
        let path = path.as_ref();
        let data = if compressed {
            self.serialize_compressed()?
        } else {
            self.serialize()?
        };
        std::fs::write(path, data)?;
        log::debug!(
            "saved tree ({} triads) to {}",
            self.next_index,
            path.display()
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>, hasher: H) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let tree = Self::deserialize(&data, hasher)?;
        log::debug!(
            "loaded tree ({} triads) from {}",
            tree.next_index,
            path.display()
        );
        Ok(tree)
    }

    /// Load and require the given depth and zero value
    pub fn load_expecting(path: impl AsRef<Path>, params: TreeParams, hasher: H) -> Result<Self> {
        let tree = Self::load(path, hasher)?;
        if tree.depth != params.depth {
            return Err(PrivacyError::InvalidSnapshot(format!(
                "expected depth {}, found {}",
                params.depth, tree.depth
            )));
        }
        if tree.zero_value != params.zero_value {
            return Err(PrivacyError::InvalidSnapshot(format!(
                "expected zero value {}, found {}",
                field_to_decimal(&params.zero_value),
                field_to_decimal(&tree.zero_value)
            )));
        }
        Ok(tree)
    }

    fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            depth: self.depth,
            zero_value: self.zero_value,
            next_index: self.next_index,
            root: self.root,
            leaves: self.leaves.clone(),
            filled_subtrees: self.filled_subtrees.clone(),
            filled_paths: self.filled_paths.clone(),
        }
    }

    fn from_snapshot(snapshot: TreeSnapshot, hasher: H) -> Result<Self> {
        let TreeSnapshot {
            depth,
            zero_value,
            next_index,
            root,
            leaves,
            filled_subtrees,
            filled_paths,
        } = snapshot;

        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(invalid(format!("depth {depth} out of range")));
        }
        let capacity = 1u64 << (depth - 1);
        if next_index > capacity {
            return Err(invalid(format!(
                "{next_index} triads exceed capacity {capacity}"
            )));
        }
        if leaves.len() as u64 != next_index * TRIAD_SIZE as u64 {
            return Err(invalid(format!(
                "{} leaves for {next_index} triads",
                leaves.len()
            )));
        }

        // Rebuild from the leaves; every cached node must match
        let mut tree = Self::new(depth, zero_value, hasher)
            .map_err(|e| invalid(format!("cannot rebuild tree: {e}")))?;
        for triad in leaves.chunks_exact(TRIAD_SIZE) {
            tree.insert_batch([triad[0], triad[1], triad[2]])?;
        }

        if filled_paths.len() != depth {
            return Err(invalid(format!(
                "{} cached levels for depth {depth}",
                filled_paths.len()
            )));
        }
        for (level, (stored, rebuilt)) in filled_paths.iter().zip(&tree.filled_paths).enumerate() {
            if stored.len() != rebuilt.len() {
                return Err(invalid(format!(
                    "level {level} caches {} nodes, expected {}",
                    stored.len(),
                    rebuilt.len()
                )));
            }
            if let Some(position) = stored.iter().zip(rebuilt).position(|(a, b)| a != b) {
                return Err(invalid(format!(
                    "cached node mismatch at level {level}, position {position}"
                )));
            }
        }
        if filled_subtrees != tree.filled_subtrees {
            return Err(invalid("frontier does not match the leaves".into()));
        }
        if root != tree.root {
            return Err(invalid(
                "root does not match the leaves, zero value and depth".into(),
            ));
        }

        Ok(tree)
    }
}

fn invalid(msg: String) -> PrivacyError {
    PrivacyError::InvalidSnapshot(msg)
}

fn compute_zeros<H: FieldHasher>(
    depth: usize,
    zero_value: FieldElement,
    hasher: &H,
) -> Result<Vec<FieldElement>> {
    let mut zeros = Vec::with_capacity(depth);
    zeros.push(hasher.hash3(zero_value, zero_value, zero_value)?);
    for level in 1..depth {
        let prev = zeros[level - 1];
        zeros.push(hasher.hash2(prev, prev)?);
    }
    Ok(zeros)
}

/// Persisted form. Zero subtrees are rebuilt from `zero_value` on load.
#[derive(Serialize, Deserialize)]
struct TreeSnapshot {
    depth: usize,
    #[serde(with = "serde_field")]
    zero_value: FieldElement,
    next_index: u64,
    #[serde(with = "serde_field")]
    root: FieldElement,
    #[serde(with = "serde_field::vec")]
    leaves: Vec<FieldElement>,
    #[serde(with = "serde_field::vec")]
    filled_subtrees: Vec<FieldElement>,
    #[serde(with = "serde_field::nested")]
    filled_paths: Vec<Vec<FieldElement>>,
}
