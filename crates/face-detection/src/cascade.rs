//! Binary cascade model format
//!
//! Layout (all integers and floats big-endian):
//!
//! ```text
//! i32 stage_count
//! per stage:
//!     i32 tree_count
//!     per tree:
//!         i32 depth
//!         (2^depth - 1) x { i8 dx1, i8 dy1, i8 dx2, i8 dy2, i32 threshold }
//!         2^depth x f32 leaf
//!     f32 stage_threshold
//! ```
//!
//! Internal nodes are stored in implicit binary-heap order, so node `i` has
//! children `2i + 1` and `2i + 2`. Leaves follow left to right.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;
use std::path::Path;
use tracing::info;

use crate::error::FaceDetectionError;

/// Offsets are stored in 1/256ths of the window edge
pub const BASE_SIZE: i32 = 256;

/// Deepest tree accepted by the decoder
pub const MAX_TREE_DEPTH: u32 = 16;

const NODE_BYTES: usize = 8;
const LEAF_BYTES: usize = 4;
// depth + one leaf
const MIN_TREE_BYTES: usize = 4 + LEAF_BYTES;
// tree count + one minimal tree + threshold
const MIN_STAGE_BYTES: usize = 4 + MIN_TREE_BYTES + 4;

/// Binary pixel comparison test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitNode {
    pub dx1: i8,
    pub dy1: i8,
    pub dx2: i8,
    pub dy2: i8,
    pub threshold: i32,
}

/// Complete binary decision tree stored as a flat array
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    depth: u32,
    nodes: Vec<SplitNode>,
    leaves: Vec<f32>,
}

impl Tree {
    /// Build a tree of `depth` levels.
    ///
    /// `nodes` must hold `2^depth - 1` splits in heap order and `leaves`
    /// `2^depth` finite predictions.
    pub fn new(
        depth: u32,
        nodes: Vec<SplitNode>,
        leaves: Vec<f32>,
    ) -> Result<Self, FaceDetectionError> {
        if depth > MAX_TREE_DEPTH {
            return Err(FaceDetectionError::MalformedModel(format!(
                "tree depth {depth} exceeds maximum {MAX_TREE_DEPTH}"
            )));
        }
        let leaf_count = 1usize << depth;
        if nodes.len() != leaf_count - 1 || leaves.len() != leaf_count {
            return Err(FaceDetectionError::MalformedModel(format!(
                "tree of depth {depth} needs {} nodes and {leaf_count} leaves, got {} and {}",
                leaf_count - 1,
                nodes.len(),
                leaves.len()
            )));
        }
        if let Some(bad) = leaves.iter().find(|v| !v.is_finite()) {
            return Err(FaceDetectionError::MalformedModel(format!(
                "non-finite leaf value {bad}"
            )));
        }
        Ok(Self {
            depth,
            nodes,
            leaves,
        })
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[must_use]
    pub fn nodes(&self) -> &[SplitNode] {
        &self.nodes
    }

    #[must_use]
    pub fn leaves(&self) -> &[f32] {
        &self.leaves
    }

    /// Walk from the root, asking `go_right` at every split, and return the
    /// reached leaf prediction.
    #[inline]
    pub fn predict<F>(&self, mut go_right: F) -> f32
    where
        F: FnMut(&SplitNode) -> bool,
    {
        let internal = self.nodes.len();
        let mut idx = 0;
        while idx < internal {
            idx = if go_right(&self.nodes[idx]) {
                2 * idx + 2
            } else {
                2 * idx + 1
            };
        }
        self.leaves[idx - internal]
    }

    fn encoded_len(&self) -> usize {
        4 + self.nodes.len() * NODE_BYTES + self.leaves.len() * LEAF_BYTES
    }
}

/// Ordered group of trees sharing one rejection threshold
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    trees: Vec<Tree>,
    threshold: f32,
}

impl Stage {
    pub fn new(trees: Vec<Tree>, threshold: f32) -> Result<Self, FaceDetectionError> {
        if trees.is_empty() {
            return Err(FaceDetectionError::MalformedModel(
                "stage has no trees".to_string(),
            ));
        }
        if !threshold.is_finite() {
            return Err(FaceDetectionError::MalformedModel(format!(
                "non-finite stage threshold {threshold}"
            )));
        }
        Ok(Self { trees, threshold })
    }

    #[must_use]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Decoded cascade of stages. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeModel {
    stages: Vec<Stage>,
}

impl CascadeModel {
    pub fn new(stages: Vec<Stage>) -> Result<Self, FaceDetectionError> {
        if stages.is_empty() {
            return Err(FaceDetectionError::MalformedModel(
                "model has no stages".to_string(),
            ));
        }
        Ok(Self { stages })
    }

    /// Read and decode a model file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FaceDetectionError> {
        let path = path.as_ref();
        info!("Loading cascade model from {}", path.display());

        let data = std::fs::read(path)?;
        let model = Self::from_bytes(&data)?;

        info!(
            "Cascade model loaded ({} stages, {} trees, max depth {})",
            model.stage_count(),
            model.tree_count(),
            model.max_depth()
        );
        Ok(model)
    }

    /// Decode a model from its binary form
    pub fn from_bytes(data: &[u8]) -> Result<Self, FaceDetectionError> {
        let mut reader = ModelReader::new(data);

        let stage_count = reader.read_count("stage count", || "header".to_string())?;
        let mut stages = Vec::with_capacity(stage_count.min(data.len() / MIN_STAGE_BYTES));

        for s in 0..stage_count {
            let tree_count = reader.read_count("tree count", || format!("stage {s}"))?;
            let mut trees =
                Vec::with_capacity(tree_count.min(reader.remaining() / MIN_TREE_BYTES));

            for t in 0..tree_count {
                trees.push(reader.read_tree(s, t)?);
            }

            let threshold = reader.read_f32(|| format!("stage {s} threshold"))?;
            stages.push(Stage::new(trees, threshold).map_err(|e| in_stage(e, s))?);
        }

        if reader.remaining() > 0 {
            return Err(FaceDetectionError::MalformedModel(format!(
                "{} trailing bytes after stage {}",
                reader.remaining(),
                stage_count - 1
            )));
        }

        Self::new(stages)
    }

    /// Encode into the binary form read by [`CascadeModel::from_bytes`]
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = 4 + self
            .stages
            .iter()
            .map(|s| 8 + s.trees.iter().map(Tree::encoded_len).sum::<usize>())
            .sum::<usize>();
        let mut out = Vec::with_capacity(len);

        out.extend_from_slice(&(self.stages.len() as i32).to_be_bytes());
        for stage in &self.stages {
            out.extend_from_slice(&(stage.trees.len() as i32).to_be_bytes());
            for tree in &stage.trees {
                out.extend_from_slice(&(tree.depth as i32).to_be_bytes());
                for node in &tree.nodes {
                    out.extend_from_slice(&[
                        node.dx1 as u8,
                        node.dy1 as u8,
                        node.dx2 as u8,
                        node.dy2 as u8,
                    ]);
                    out.extend_from_slice(&node.threshold.to_be_bytes());
                }
                for leaf in &tree.leaves {
                    out.extend_from_slice(&leaf.to_be_bytes());
                }
            }
            out.extend_from_slice(&stage.threshold.to_be_bytes());
        }
        out
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Total number of trees across all stages
    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.stages.iter().map(|s| s.trees.len()).sum()
    }

    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.stages
            .iter()
            .flat_map(|s| s.trees.iter().map(Tree::depth))
            .max()
            .unwrap_or(0)
    }
}

fn in_stage(err: FaceDetectionError, stage: usize) -> FaceDetectionError {
    match err {
        FaceDetectionError::MalformedModel(msg) => {
            FaceDetectionError::MalformedModel(format!("stage {stage}: {msg}"))
        }
        other => other,
    }
}

struct ModelReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ModelReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    fn offset(&self) -> usize {
        self.cursor.position() as usize
    }

    fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.offset())
    }

    fn truncated(&self, offset: usize, context: String) -> FaceDetectionError {
        FaceDetectionError::TruncatedInput { offset, context }
    }

    fn read_i32(&mut self, context: impl FnOnce() -> String) -> Result<i32, FaceDetectionError> {
        let offset = self.offset();
        self.cursor
            .read_i32::<BigEndian>()
            .map_err(|_| self.truncated(offset, context()))
    }

    fn read_f32(&mut self, context: impl FnOnce() -> String) -> Result<f32, FaceDetectionError> {
        let offset = self.offset();
        self.cursor
            .read_f32::<BigEndian>()
            .map_err(|_| self.truncated(offset, context()))
    }

    /// Read a strictly positive element count
    fn read_count(
        &mut self,
        what: &str,
        location: impl Fn() -> String,
    ) -> Result<usize, FaceDetectionError> {
        let value = self.read_i32(|| format!("{} {what}", location()))?;
        if value <= 0 {
            return Err(FaceDetectionError::MalformedModel(format!(
                "{}: {what} must be positive, got {value}",
                location()
            )));
        }
        Ok(value as usize)
    }

    fn read_tree(&mut self, stage: usize, tree: usize) -> Result<Tree, FaceDetectionError> {
        let depth = self.read_i32(|| format!("stage {stage} tree {tree} depth"))?;
        if !(0..=MAX_TREE_DEPTH as i32).contains(&depth) {
            return Err(FaceDetectionError::MalformedModel(format!(
                "stage {stage} tree {tree}: depth {depth} outside 0..={MAX_TREE_DEPTH}"
            )));
        }
        let depth = depth as u32;
        let leaf_count = 1usize << depth;
        let node_count = leaf_count - 1;

        let needed = node_count * NODE_BYTES + leaf_count * LEAF_BYTES;
        if needed > self.remaining() {
            return Err(self.truncated(
                self.offset(),
                format!(
                    "stage {stage} tree {tree} body ({needed} bytes, {} available)",
                    self.remaining()
                ),
            ));
        }

        let mut nodes = Vec::with_capacity(node_count);
        for n in 0..node_count {
            let ctx = || format!("stage {stage} tree {tree} node {n}");
            let dx1 = self.read_i8(ctx)?;
            let dy1 = self.read_i8(ctx)?;
            let dx2 = self.read_i8(ctx)?;
            let dy2 = self.read_i8(ctx)?;
            let threshold = self.read_i32(ctx)?;
            nodes.push(SplitNode {
                dx1,
                dy1,
                dx2,
                dy2,
                threshold,
            });
        }

        let mut leaves = Vec::with_capacity(leaf_count);
        for l in 0..leaf_count {
            leaves.push(self.read_f32(|| format!("stage {stage} tree {tree} leaf {l}"))?);
        }

        Tree::new(depth, nodes, leaves).map_err(|e| match e {
            FaceDetectionError::MalformedModel(msg) => {
                FaceDetectionError::MalformedModel(format!("stage {stage} tree {tree}: {msg}"))
            }
            other => other,
        })
    }

    fn read_i8(&mut self, context: impl FnOnce() -> String) -> Result<i8, FaceDetectionError> {
        let offset = self.offset();
        self.cursor
            .read_i8()
            .map_err(|_| self.truncated(offset, context()))
    }
}
