//! Order-statistics left-leaning red-black tree keyed by score.
//!
//! Every node holds one distinct score and the tie group of entries sharing
//! it, so ranks are dense: rank 1 is the highest score and the bottom rank is
//! the number of nodes. Nodes live in an arena and link to each other through
//! [`NodeId`] handles (children and parent), which keeps rotations to plain
//! index reassignment and lets callers keep a handle to "their" node across
//! any number of rebalances.
//!
//! Tree shape invariants:
//! - red links lean left (no red right child),
//! - no node has a red parent link and a red left child,
//! - every root-to-leaf path crosses the same number of black links,
//! - `size(n) == size(left) + size(right) + 1`.

use std::cmp::Ordering;

use smallvec::{smallvec, SmallVec};

use crate::error::{LeaderboardError, Result};

// =============================================================================
// Handles
// =============================================================================

/// Handle to a node in a [`RankTree`] arena.
///
/// Stable for the lifetime of the node: rotations relink nodes but never move
/// them. A handle is recycled once its node is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub const NIL: NodeId = NodeId(u32::MAX);

    #[inline]
    pub fn is_nil(self) -> bool {
        self.0 == Self::NIL.0
    }

    #[inline]
    fn idx(self) -> usize {
        debug_assert!(!self.is_nil());
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

impl Color {
    #[inline]
    fn flipped(self) -> Self {
        match self {
            Color::Red => Color::Black,
            Color::Black => Color::Red,
        }
    }
}

#[derive(Clone, Debug)]
struct Node<E> {
    score: i64,
    /// Tie group in insertion order.
    entries: SmallVec<[E; 2]>,
    left: NodeId,
    right: NodeId,
    parent: NodeId,
    /// Nodes in this subtree, including this one. Zero once freed.
    size: usize,
    color: Color,
}

/// One rank: a score and every entry holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TieGroup<'a, E> {
    pub rank: usize,
    pub score: i64,
    pub node: NodeId,
    pub entries: &'a [E],
}

/// Structural defect found by [`RankTree::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeViolation {
    #[error("root is red")]
    RedRoot,
    #[error("node {score} has a red right link")]
    RedRightLink { score: i64 },
    #[error("node {score} is red with a red left child")]
    ConsecutiveReds { score: i64 },
    #[error("unbalanced blacks under {score}: left {left}, right {right}")]
    UnbalancedBlacks { score: i64, left: usize, right: usize },
    #[error("node {score} stores size {stored}, subtree has {actual}")]
    SizeMismatch {
        score: i64,
        stored: usize,
        actual: usize,
    },
    #[error("node {score} has a stale parent link")]
    ParentMismatch { score: i64 },
    #[error("node {score} is out of order")]
    SortError { score: i64 },
    #[error("node {score} has an empty tie group")]
    EmptyTieGroup { score: i64 },
    #[error("tree reaches {reachable} entries, counter says {counted}")]
    EntryCount { reachable: usize, counted: usize },
    #[error("arena holds {live} live nodes, root reaches {reachable}")]
    LeakedNodes { live: usize, reachable: usize },
}

// =============================================================================
// RankTree
// =============================================================================

/// Ranked index from score to tie groups of `E` handles.
#[derive(Clone, Debug)]
pub struct RankTree<E> {
    nodes: Vec<Node<E>>,
    free: Vec<NodeId>,
    root: NodeId,
    entry_count: usize,
}

impl<E> Default for RankTree<E>
where
    E: Copy + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> RankTree<E>
where
    E: Copy + PartialEq,
{
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NodeId::NIL,
            entry_count: 0,
        }
    }

    /// Number of distinct scores, which is also the bottom rank.
    #[inline]
    pub fn len(&self) -> usize {
        self.size(self.root)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_nil()
    }

    /// Number of entries across all tie groups.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    // --- node access -----------------------------------------------------

    #[inline]
    fn node(&self, n: NodeId) -> &Node<E> {
        &self.nodes[n.idx()]
    }

    #[inline]
    fn node_mut(&mut self, n: NodeId) -> &mut Node<E> {
        &mut self.nodes[n.idx()]
    }

    #[inline]
    fn left(&self, n: NodeId) -> NodeId {
        if n.is_nil() {
            NodeId::NIL
        } else {
            self.node(n).left
        }
    }

    #[inline]
    fn right(&self, n: NodeId) -> NodeId {
        if n.is_nil() {
            NodeId::NIL
        } else {
            self.node(n).right
        }
    }

    #[inline]
    fn parent(&self, n: NodeId) -> NodeId {
        self.node(n).parent
    }

    #[inline]
    fn size(&self, n: NodeId) -> usize {
        if n.is_nil() {
            0
        } else {
            self.node(n).size
        }
    }

    #[inline]
    fn is_red(&self, n: NodeId) -> bool {
        !n.is_nil() && self.node(n).color == Color::Red
    }

    #[inline]
    fn set_left(&mut self, n: NodeId, child: NodeId) {
        self.node_mut(n).left = child;
        if !child.is_nil() {
            self.node_mut(child).parent = n;
        }
    }

    #[inline]
    fn set_right(&mut self, n: NodeId, child: NodeId) {
        self.node_mut(n).right = child;
        if !child.is_nil() {
            self.node_mut(child).parent = n;
        }
    }

    #[inline]
    fn set_root(&mut self, root: NodeId) {
        self.root = root;
        if !root.is_nil() {
            let node = self.node_mut(root);
            node.parent = NodeId::NIL;
            node.color = Color::Black;
        }
    }

    #[inline]
    fn update_size(&mut self, n: NodeId) {
        let size = self.size(self.left(n)) + self.size(self.right(n)) + 1;
        self.node_mut(n).size = size;
    }

    fn alloc(&mut self, score: i64, entry: E) -> NodeId {
        let node = Node {
            score,
            entries: smallvec![entry],
            left: NodeId::NIL,
            right: NodeId::NIL,
            parent: NodeId::NIL,
            size: 1,
            color: Color::Red,
        };
        if let Some(id) = self.free.pop() {
            self.nodes[id.idx()] = node;
            id
        } else {
            let raw = u32::try_from(self.nodes.len()).expect("rank tree exceeds u32 node ids");
            assert!(raw != NodeId::NIL.0, "rank tree exceeds u32 node ids");
            self.nodes.push(node);
            NodeId(raw)
        }
    }

    fn release(&mut self, n: NodeId) {
        let node = self.node_mut(n);
        node.entries.clear();
        node.left = NodeId::NIL;
        node.right = NodeId::NIL;
        node.parent = NodeId::NIL;
        node.size = 0;
        self.free.push(n);
    }

    // --- rank arithmetic ---------------------------------------------------
    //
    // A node's rank is one more than the number of nodes holding a higher
    // score. These two steps carry a known rank from a node to one of its
    // children; every rank query in this module goes through them.

    /// Rank of `child`, the right child of a node ranked `parent_rank`.
    #[inline]
    fn right_child_rank(&self, parent_rank: usize, child: NodeId) -> usize {
        parent_rank - self.size(child) + self.size(self.right(child))
    }

    /// Rank of `child`, the left child of a node ranked `parent_rank`.
    #[inline]
    fn left_child_rank(&self, parent_rank: usize, child: NodeId) -> usize {
        parent_rank + self.size(self.right(child)) + 1
    }

    /// Walks down from the root carrying the current node's rank.
    ///
    /// `probe` sees each node with its rank and answers where the target is:
    /// `Greater` towards higher scores, `Less` towards lower ones, `Equal`
    /// to stop.
    fn descend(
        &self,
        mut probe: impl FnMut(&Node<E>, usize) -> Ordering,
    ) -> Option<(NodeId, usize)> {
        let mut n = self.root;
        if n.is_nil() {
            return None;
        }
        let mut rank = self.size(self.right(n)) + 1;
        loop {
            let next = match probe(self.node(n), rank) {
                Ordering::Equal => return Some((n, rank)),
                Ordering::Greater => {
                    let c = self.right(n);
                    if !c.is_nil() {
                        rank = self.right_child_rank(rank, c);
                    }
                    c
                }
                Ordering::Less => {
                    let c = self.left(n);
                    if !c.is_nil() {
                        rank = self.left_child_rank(rank, c);
                    }
                    c
                }
            };
            if next.is_nil() {
                return None;
            }
            n = next;
        }
    }

    #[inline]
    fn group_at(&self, n: NodeId, rank: usize) -> TieGroup<'_, E> {
        let node = self.node(n);
        TieGroup {
            rank,
            score: node.score,
            node: n,
            entries: &node.entries,
        }
    }

    // --- queries -------------------------------------------------------------

    fn find(&self, score: i64) -> NodeId {
        let mut n = self.root;
        while !n.is_nil() {
            let node = self.node(n);
            n = match score.cmp(&node.score) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return n,
            };
        }
        NodeId::NIL
    }

    /// Tie group holding `rank`, where rank 1 is the highest score.
    pub fn get_by_rank(&self, rank: usize) -> Result<TieGroup<'_, E>> {
        if rank == 0 || rank > self.len() {
            return Err(LeaderboardError::RankOutOfRange {
                rank,
                bottom: self.len(),
            });
        }
        let (n, rank) = self
            .descend(|_, current| current.cmp(&rank))
            .expect("in-range rank must resolve to a node");
        Ok(self.group_at(n, rank))
    }

    pub fn get_rank_by_score(&self, score: i64) -> Result<usize> {
        self.descend(|node, _| score.cmp(&node.score))
            .map(|(_, rank)| rank)
            .ok_or(LeaderboardError::UnknownScore(score))
    }

    pub fn get_by_score(&self, score: i64) -> Result<TieGroup<'_, E>> {
        self.descend(|node, _| score.cmp(&node.score))
            .map(|(n, rank)| self.group_at(n, rank))
            .ok_or(LeaderboardError::UnknownScore(score))
    }

    /// Rank of a live node, found by climbing its parent links.
    pub fn rank_of_node(&self, node: NodeId) -> usize {
        debug_assert!(self.node(node).size > 0, "rank of a freed node");
        let mut rank = self.size(self.right(node)) + 1;
        let mut cur = node;
        let mut parent = self.parent(cur);
        while !parent.is_nil() {
            if self.left(parent) == cur {
                rank += self.size(self.right(parent)) + 1;
            }
            cur = parent;
            parent = self.parent(cur);
        }
        rank
    }

    /// Tie group of a live node.
    pub fn group(&self, node: NodeId) -> TieGroup<'_, E> {
        self.group_at(node, self.rank_of_node(node))
    }

    pub fn get_max(&self) -> Result<TieGroup<'_, E>> {
        let mut n = self.root;
        if n.is_nil() {
            return Err(LeaderboardError::EmptyCollection);
        }
        while !self.right(n).is_nil() {
            n = self.right(n);
        }
        Ok(self.group_at(n, 1))
    }

    pub fn get_min(&self) -> Result<TieGroup<'_, E>> {
        let mut n = self.root;
        if n.is_nil() {
            return Err(LeaderboardError::EmptyCollection);
        }
        while !self.left(n).is_nil() {
            n = self.left(n);
        }
        Ok(self.group_at(n, self.len()))
    }

    /// Tie groups from rank 1 downwards, in one O(n) walk.
    pub fn iter_ranked(&self) -> RankedIter<'_, E> {
        let mut iter = RankedIter {
            tree: self,
            stack: Vec::new(),
        };
        if !self.root.is_nil() {
            let rank = self.size(self.right(self.root)) + 1;
            iter.push_right_spine(self.root, rank);
        }
        iter
    }

    pub fn get_all_ranked(&self) -> Vec<TieGroup<'_, E>> {
        self.iter_ranked().collect()
    }

    // --- insertion -------------------------------------------------------------

    /// Adds `entry` under `score` and returns the node now holding it.
    ///
    /// An existing score only grows its tie group; a new score gets a fresh
    /// red node and the path back to the root is rebalanced.
    pub fn insert(&mut self, score: i64, entry: E) -> NodeId {
        self.entry_count += 1;

        let existing = self.find(score);
        if !existing.is_nil() {
            self.node_mut(existing).entries.push(entry);
            return existing;
        }

        let fresh = self.alloc(score, entry);
        let root = self.put(self.root, fresh);
        self.set_root(root);
        fresh
    }

    fn put(&mut self, h: NodeId, fresh: NodeId) -> NodeId {
        if h.is_nil() {
            return fresh;
        }
        let score = self.node(fresh).score;
        match score.cmp(&self.node(h).score) {
            Ordering::Less => {
                let l = self.put(self.left(h), fresh);
                self.set_left(h, l);
            }
            Ordering::Greater => {
                let r = self.put(self.right(h), fresh);
                self.set_right(h, r);
            }
            Ordering::Equal => unreachable!("duplicate score {score} reached put"),
        }
        self.balance(h)
    }

    // --- deletion ----------------------------------------------------------------

    /// Removes `entry` from `node`, the tie group its back-reference names.
    ///
    /// A tie group with other members just shrinks. The last member takes the
    /// node with it: the tree descends to it moving red links down, splices
    /// it out (relinking its in-order successor into its place when it has two
    /// children) and rebalances on the way back up.
    ///
    /// `node` alone identifies what is removed; the descent from the root only
    /// carries red links down the path so the splice keeps the tree balanced.
    ///
    /// # Panics
    /// Panics if `node` is not a live node holding `entry`.
    pub fn delete(&mut self, node: NodeId, entry: E) {
        assert!(
            !node.is_nil() && node.idx() < self.nodes.len() && self.node(node).size > 0,
            "back-reference points at a dead node"
        );
        let group = &self.node(node).entries;
        let pos = group
            .iter()
            .position(|e| *e == entry)
            .expect("back-reference points at a node without the entry");
        let remaining = group.len() - 1;

        self.entry_count -= 1;
        if remaining > 0 {
            self.node_mut(node).entries.remove(pos);
            return;
        }

        let score = self.node(node).score;
        let root = self.root;
        if !self.is_red(self.left(root)) && !self.is_red(self.right(root)) {
            self.node_mut(root).color = Color::Red;
        }
        let root = self.delete_score(root, score);
        self.set_root(root);
        self.release(node);
    }

    fn delete_score(&mut self, mut h: NodeId, score: i64) -> NodeId {
        if score < self.node(h).score {
            let l = self.left(h);
            debug_assert!(!l.is_nil(), "score {score} missing from tree");
            if !self.is_red(l) && !self.is_red(self.left(l)) {
                h = self.move_red_left(h);
            }
            let l = self.delete_score(self.left(h), score);
            self.set_left(h, l);
        } else {
            if self.is_red(self.left(h)) {
                h = self.rotate_right(h);
            }
            if score == self.node(h).score && self.right(h).is_nil() {
                debug_assert!(self.left(h).is_nil());
                return NodeId::NIL;
            }
            let r = self.right(h);
            debug_assert!(!r.is_nil(), "score {score} missing from tree");
            if !self.is_red(r) && !self.is_red(self.left(r)) {
                h = self.move_red_right(h);
            }
            if score == self.node(h).score {
                let (rest, successor) = self.delete_min(self.right(h));
                let (left, parent, color) = {
                    let node = self.node(h);
                    (node.left, node.parent, node.color)
                };
                self.set_left(successor, left);
                self.set_right(successor, rest);
                let s = self.node_mut(successor);
                s.parent = parent;
                s.color = color;
                h = successor;
            } else {
                let r = self.delete_score(self.right(h), score);
                self.set_right(h, r);
            }
        }
        self.balance(h)
    }

    /// Detaches the minimum of the subtree at `h`.
    /// Returns the new subtree root and the detached node.
    fn delete_min(&mut self, mut h: NodeId) -> (NodeId, NodeId) {
        if self.left(h).is_nil() {
            debug_assert!(self.right(h).is_nil());
            return (NodeId::NIL, h);
        }
        let l = self.left(h);
        if !self.is_red(l) && !self.is_red(self.left(l)) {
            h = self.move_red_left(h);
        }
        let (rest, min) = self.delete_min(self.left(h));
        self.set_left(h, rest);
        (self.balance(h), min)
    }

    // --- rotations ---------------------------------------------------------------

    //              (p)                      (p)
    //               |                        |
    //               h                        x
    //              / \                      / \
    //             a  (r)                  (r)  c
    //                  \                  /
    //                   x                h
    //                  / \              / \
    //                 b   c            a   b
    //
    fn rotate_left(&mut self, h: NodeId) -> NodeId {
        let x = self.right(h);
        debug_assert!(self.is_red(x), "rotating a black link left");
        let (parent, color, size) = {
            let node = self.node(h);
            (node.parent, node.color, node.size)
        };
        let b = self.left(x);
        self.set_right(h, b);
        self.set_left(x, h);
        let xn = self.node_mut(x);
        xn.parent = parent;
        xn.color = color;
        xn.size = size;
        self.node_mut(h).color = Color::Red;
        self.update_size(h);
        x
    }

    //              (p)                      (p)
    //               |                        |
    //               h                        x
    //              / \                      / \
    //            (r)  c                    a  (r)
    //            /                              \
    //           x                                h
    //          / \                              / \
    //         a   b                            b   c
    //
    fn rotate_right(&mut self, h: NodeId) -> NodeId {
        let x = self.left(h);
        debug_assert!(self.is_red(x), "rotating a black link right");
        let (parent, color, size) = {
            let node = self.node(h);
            (node.parent, node.color, node.size)
        };
        let b = self.right(x);
        self.set_left(h, b);
        self.set_right(x, h);
        let xn = self.node_mut(x);
        xn.parent = parent;
        xn.color = color;
        xn.size = size;
        self.node_mut(h).color = Color::Red;
        self.update_size(h);
        x
    }

    fn flip_colors(&mut self, h: NodeId) {
        let (l, r) = (self.left(h), self.right(h));
        for n in [h, l, r] {
            let node = self.node_mut(n);
            node.color = node.color.flipped();
        }
    }

    /// Restores the local invariants at `h` on the way back up.
    fn balance(&mut self, mut h: NodeId) -> NodeId {
        if self.is_red(self.right(h)) && !self.is_red(self.left(h)) {
            h = self.rotate_left(h);
        }
        if self.is_red(self.left(h)) && self.is_red(self.left(self.left(h))) {
            h = self.rotate_right(h);
        }
        if self.is_red(self.left(h)) && self.is_red(self.right(h)) {
            self.flip_colors(h);
        }
        self.update_size(h);
        h
    }

    fn move_red_left(&mut self, mut h: NodeId) -> NodeId {
        self.flip_colors(h);
        if self.is_red(self.left(self.right(h))) {
            let r = self.rotate_right(self.right(h));
            self.set_right(h, r);
            h = self.rotate_left(h);
            self.flip_colors(h);
        }
        h
    }

    fn move_red_right(&mut self, mut h: NodeId) -> NodeId {
        self.flip_colors(h);
        if self.is_red(self.left(self.left(h))) {
            h = self.rotate_right(h);
            self.flip_colors(h);
        }
        h
    }

    // --- validation --------------------------------------------------------------

    /// Checks every structural invariant and returns the black height.
    pub fn validate(&self) -> std::result::Result<usize, TreeViolation> {
        let live = self.nodes.len() - self.free.len();
        if self.root.is_nil() {
            if self.entry_count != 0 {
                return Err(TreeViolation::EntryCount {
                    reachable: 0,
                    counted: self.entry_count,
                });
            }
            if live != 0 {
                return Err(TreeViolation::LeakedNodes { live, reachable: 0 });
            }
            return Ok(0);
        }

        let root = self.node(self.root);
        if root.color == Color::Red {
            return Err(TreeViolation::RedRoot);
        }
        if !root.parent.is_nil() {
            return Err(TreeViolation::ParentMismatch { score: root.score });
        }

        let mut reachable_entries = 0;
        let blacks = self.validate_node(self.root, None, None, &mut reachable_entries)?;
        if reachable_entries != self.entry_count {
            return Err(TreeViolation::EntryCount {
                reachable: reachable_entries,
                counted: self.entry_count,
            });
        }
        if live != self.len() {
            return Err(TreeViolation::LeakedNodes {
                live,
                reachable: self.len(),
            });
        }
        Ok(blacks)
    }

    fn validate_node(
        &self,
        n: NodeId,
        low: Option<i64>,
        high: Option<i64>,
        entries: &mut usize,
    ) -> std::result::Result<usize, TreeViolation> {
        if n.is_nil() {
            return Ok(0);
        }
        let node = self.node(n);
        let score = node.score;

        if node.entries.is_empty() {
            return Err(TreeViolation::EmptyTieGroup { score });
        }
        if low.is_some_and(|l| score <= l) || high.is_some_and(|h| score >= h) {
            return Err(TreeViolation::SortError { score });
        }
        if self.is_red(node.right) {
            return Err(TreeViolation::RedRightLink { score });
        }
        if node.color == Color::Red && self.is_red(node.left) {
            return Err(TreeViolation::ConsecutiveReds { score });
        }
        for child in [node.left, node.right] {
            if !child.is_nil() && self.parent(child) != n {
                return Err(TreeViolation::ParentMismatch {
                    score: self.node(child).score,
                });
            }
        }

        let left = self.validate_node(node.left, low, Some(score), entries)?;
        let right = self.validate_node(node.right, Some(score), high, entries)?;
        if left != right {
            return Err(TreeViolation::UnbalancedBlacks { score, left, right });
        }
        let actual = self.size(node.left) + self.size(node.right) + 1;
        if node.size != actual {
            return Err(TreeViolation::SizeMismatch {
                score,
                stored: node.size,
                actual,
            });
        }

        *entries += node.entries.len();
        Ok(left + usize::from(node.color == Color::Black))
    }
}

/// Iterator over tie groups in rank order; see [`RankTree::iter_ranked`].
pub struct RankedIter<'a, E> {
    tree: &'a RankTree<E>,
    stack: Vec<(NodeId, usize)>,
}

impl<'a, E> RankedIter<'a, E>
where
    E: Copy + PartialEq,
{
    fn push_right_spine(&mut self, mut n: NodeId, mut rank: usize) {
        loop {
            self.stack.push((n, rank));
            let c = self.tree.right(n);
            if c.is_nil() {
                break;
            }
            rank = self.tree.right_child_rank(rank, c);
            n = c;
        }
    }
}

impl<'a, E> Iterator for RankedIter<'a, E>
where
    E: Copy + PartialEq,
{
    type Item = TieGroup<'a, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let (n, rank) = self.stack.pop()?;
        let l = self.tree.left(n);
        if !l.is_nil() {
            let left_rank = self.tree.left_child_rank(rank, l);
            self.push_right_spine(l, left_rank);
        }
        Some(self.tree.group_at(n, rank))
    }
}
