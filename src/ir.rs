//! Contains the physical plan tree and helpers.
//!
//! The analyzer hands over validated expressions and resolved tuple
//! and slot ids; this layer assembles them into an owned node tree,
//! freezes the tree with a distribution decision per join and renders
//! it for workers (wire message) and humans (explain).

use ahash::RandomState;
use serde::{Deserialize, Serialize};
use smol_str::{format_smolstr, SmolStr};
use std::collections::{BTreeSet, HashSet};
use std::fmt::{Display, Formatter};

use crate::errors::{Entity, PlanError};
use crate::ir::distribution::DistributionMode;
use crate::ir::expression::Expr;
use crate::ir::join::{JoinNode, PlacedJoin};

pub mod distribution;
pub mod explain;
pub mod expression;
pub mod join;
pub mod tree;

/// Identifier of a node, unique within a plan tree.
///
/// Minted by the planning context that assembles the tree.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct PlanNodeId(pub u32);

impl Display for PlanNodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a row shape produced somewhere in the tree.
///
/// Issued by the analyzer; the plan layer only collects these.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct TupleId(pub u32);

impl Display for TupleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one column-like value within a tuple.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct SlotId(pub u32);

impl Display for SlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Set of slot ids a subtree must keep materialized.
pub type SlotSet = HashSet<SlotId, RandomState>;

/// Fields shared by every plan node variant.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct NodeBase {
    id: PlanNodeId,
    /// Ordered output tuple ids. For a join the disjoint union of the
    /// children's tuple ids, outer side first.
    tuple_ids: Vec<TupleId>,
    /// Subset of `tuple_ids` that may be null-valued at this point of
    /// the tree.
    nullable_tuple_ids: BTreeSet<TupleId>,
    /// Residual filters evaluated after the node's primary operation.
    conjuncts: Vec<Expr>,
}

impl NodeBase {
    pub(crate) fn new(
        id: PlanNodeId,
        tuple_ids: Vec<TupleId>,
        nullable_tuple_ids: BTreeSet<TupleId>,
    ) -> Self {
        NodeBase {
            id,
            tuple_ids,
            nullable_tuple_ids,
            conjuncts: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    #[must_use]
    pub fn tuple_ids(&self) -> &[TupleId] {
        &self.tuple_ids
    }

    #[must_use]
    pub fn nullable_tuple_ids(&self) -> &BTreeSet<TupleId> {
        &self.nullable_tuple_ids
    }

    #[must_use]
    pub fn conjuncts(&self) -> &[Expr] {
        &self.conjuncts
    }

    pub(crate) fn add_conjuncts(&mut self, conjuncts: Vec<Expr>) {
        self.conjuncts.extend(conjuncts);
    }

    pub(crate) fn collect_materialized(&self, slots: &mut SlotSet) -> Result<(), PlanError> {
        for conjunct in &self.conjuncts {
            collect_bound_slots(conjunct, &self.tuple_ids, self.id, slots)?;
        }
        Ok(())
    }
}

/// Collect the slots an expression reads, failing on a reference to a
/// tuple the node does not output.
pub(crate) fn collect_bound_slots(
    expr: &Expr,
    tuple_ids: &[TupleId],
    node_id: PlanNodeId,
    slots: &mut SlotSet,
) -> Result<(), PlanError> {
    if let Some(reference) = expr.unbound_reference(tuple_ids) {
        return Err(PlanError::NotFound(
            Entity::Slot,
            format_smolstr!(
                "{} (tuple {}) in the output of node {}",
                reference.slot_id,
                reference.tuple_id,
                node_id
            ),
        ));
    }
    expr.collect_slot_ids(slots);
    Ok(())
}

/// Leaf scan over a stored table.
///
/// Stands in for the scan node family: a single output tuple and an
/// analyzer-assigned degree of parallelism.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct ScanNode {
    base: NodeBase,
    table: SmolStr,
    instances: u32,
}

impl ScanNode {
    #[must_use]
    pub fn new(id: PlanNodeId, table: &str, tuple_id: TupleId, instances: u32) -> Self {
        ScanNode {
            base: NodeBase::new(id, vec![tuple_id], BTreeSet::new()),
            table: SmolStr::new(table),
            instances,
        }
    }

    #[must_use]
    pub fn base(&self) -> &NodeBase {
        &self.base
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn instances(&self) -> u32 {
        self.instances
    }
}

/// Plan node before the placement decision.
///
/// The tree is a strict single-owner hierarchy: every join owns its
/// two children, traversal is top-down only.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum PlanNode {
    Join(JoinNode),
    Scan(ScanNode),
}

impl PlanNode {
    #[must_use]
    pub fn base(&self) -> &NodeBase {
        match self {
            PlanNode::Join(join) => join.base(),
            PlanNode::Scan(scan) => scan.base(),
        }
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        match self {
            PlanNode::Join(join) => join.base_mut(),
            PlanNode::Scan(scan) => &mut scan.base,
        }
    }

    #[must_use]
    pub fn id(&self) -> PlanNodeId {
        self.base().id()
    }

    #[must_use]
    pub fn tuple_ids(&self) -> &[TupleId] {
        self.base().tuple_ids()
    }

    #[must_use]
    pub fn children(&self) -> &[PlanNode] {
        match self {
            PlanNode::Join(join) => join.children(),
            PlanNode::Scan(_) => &[],
        }
    }

    /// Degree of execution parallelism this node will run with.
    ///
    /// A join does not change how many instances exist, it is bounded
    /// by whichever input is already split into the most instances.
    #[must_use]
    pub fn instance_count(&self) -> u32 {
        match self {
            PlanNode::Join(join) => join
                .outer()
                .instance_count()
                .max(join.inner().instance_count()),
            PlanNode::Scan(scan) => scan.instances(),
        }
    }

    /// Append residual filters from the predicate-pushdown pass.
    ///
    /// The append is blind: boundness of the new conjuncts is checked
    /// by [`PlanNode::materialized_slot_ids`] and at placement time.
    pub fn add_conjuncts(&mut self, conjuncts: Vec<Expr>) {
        self.base_mut().add_conjuncts(conjuncts);
    }

    /// Every slot read by the node's own predicates. Producers below
    /// must keep these columns alive through pruning.
    ///
    /// # Errors
    /// - a conjunct references a tuple this node does not output
    pub fn materialized_slot_ids(&self) -> Result<SlotSet, PlanError> {
        let mut slots = SlotSet::with_hasher(RandomState::new());
        match self {
            PlanNode::Join(join) => join.collect_materialized(&mut slots)?,
            PlanNode::Scan(scan) => scan.base().collect_materialized(&mut slots)?,
        }
        Ok(slots)
    }

    /// Freeze the tree: ask the placement decision once per join and
    /// validate slot coverage of every node, so missing-slot failures
    /// surface before any serialization.
    ///
    /// Only the returned [`PlacedNode`] can be serialized or explained.
    ///
    /// # Errors
    /// - a conjunct references a tuple its node does not output
    pub fn place(
        self,
        decide: &mut impl FnMut(&JoinNode) -> DistributionMode,
    ) -> Result<PlacedNode, PlanError> {
        self.materialized_slot_ids()?;
        match self {
            PlanNode::Join(join) => {
                let mode = decide(&join);
                Ok(PlacedNode::Join(join.into_placed(mode, decide)?))
            }
            PlanNode::Scan(scan) => Ok(PlacedNode::Scan(scan)),
        }
    }

    /// Freeze the tree with the safe default mode on every join.
    ///
    /// # Errors
    /// - a conjunct references a tuple its node does not output
    pub fn place_default(self) -> Result<PlacedNode, PlanError> {
        self.place(&mut |_| DistributionMode::default())
    }
}

impl From<JoinNode> for PlanNode {
    fn from(join: JoinNode) -> Self {
        PlanNode::Join(join)
    }
}

impl From<ScanNode> for PlanNode {
    fn from(scan: ScanNode) -> Self {
        PlanNode::Scan(scan)
    }
}

/// Plan node after the placement decision, immutable from here on.
///
/// Safe to read from multiple threads, e.g. one serialization per
/// target worker.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum PlacedNode {
    Join(PlacedJoin),
    Scan(ScanNode),
}

impl PlacedNode {
    #[must_use]
    pub fn base(&self) -> &NodeBase {
        match self {
            PlacedNode::Join(join) => join.base(),
            PlacedNode::Scan(scan) => scan.base(),
        }
    }

    #[must_use]
    pub fn id(&self) -> PlanNodeId {
        self.base().id()
    }

    #[must_use]
    pub fn tuple_ids(&self) -> &[TupleId] {
        self.base().tuple_ids()
    }

    #[must_use]
    pub fn children(&self) -> &[PlacedNode] {
        match self {
            PlacedNode::Join(join) => join.children(),
            PlacedNode::Scan(_) => &[],
        }
    }

    #[must_use]
    pub fn instance_count(&self) -> u32 {
        match self {
            PlacedNode::Join(join) => join
                .outer()
                .instance_count()
                .max(join.inner().instance_count()),
            PlacedNode::Scan(scan) => scan.instances(),
        }
    }

    /// Every slot read by the node's own predicates, for the
    /// scheduler. Placement has already validated boundness.
    ///
    /// # Errors
    /// - a conjunct references a tuple this node does not output
    pub fn materialized_slot_ids(&self) -> Result<SlotSet, PlanError> {
        let mut slots = SlotSet::with_hasher(RandomState::new());
        match self {
            PlacedNode::Join(join) => join.collect_materialized(&mut slots)?,
            PlacedNode::Scan(scan) => scan.base().collect_materialized(&mut slots)?,
        }
        Ok(slots)
    }
}

#[cfg(test)]
mod tests;
