//! Merge join node module.

use log::debug;
use serde::{Deserialize, Serialize};
use smol_str::format_smolstr;
use std::collections::BTreeSet;

use crate::errors::{Entity, PlanError};
use crate::ir::distribution::DistributionMode;
use crate::ir::expression::Expr;
use crate::ir::{collect_bound_slots, NodeBase, PlacedNode, PlanNode, PlanNodeId, SlotSet};

/// One equality join predicate, split by side.
///
/// The left expression is bound by the probe (outer) child, the right
/// one by the build (inner) child. Pair order is preserved through the
/// wire message and explain output.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct EquiPair {
    pub left: Expr,
    pub right: Expr,
}

impl EquiPair {
    #[must_use]
    pub fn new(left: Expr, right: Expr) -> Self {
        EquiPair { left, right }
    }
}

/// Merge join of two child relations, before placement.
///
/// The build side must be a leaf node, i.e. can only materialize a
/// single input tuple.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct JoinNode {
    base: NodeBase,
    /// Exactly two: position 0 is the probe side, position 1 the
    /// build side.
    children: Vec<PlanNode>,
    equi_conjuncts: Vec<EquiPair>,
    other_conjuncts: Vec<Expr>,
}

impl JoinNode {
    /// Build a join node from two already-built children and the
    /// analyzer's classified predicate lists.
    ///
    /// # Errors
    /// - the build side is not a leaf or materializes more than one
    ///   tuple
    /// - a tuple id appears in both children
    /// - an equi pair side is not bound by its child
    /// - another join predicate is not bound by either child
    pub fn new(
        id: PlanNodeId,
        outer: PlanNode,
        inner: PlanNode,
        equi_conjuncts: Vec<EquiPair>,
        other_conjuncts: Vec<Expr>,
    ) -> Result<Self, PlanError> {
        if !inner.children().is_empty() {
            return Err(PlanError::Invalid(
                Entity::Node,
                Some(format_smolstr!(
                    "build side of merge join {id} must be a leaf node"
                )),
            ));
        }
        if inner.tuple_ids().len() != 1 {
            return Err(PlanError::UnexpectedNumberOfValues(format_smolstr!(
                "build side of merge join {id} materializes {} tuples",
                inner.tuple_ids().len()
            )));
        }

        let mut tuple_ids =
            Vec::with_capacity(outer.tuple_ids().len() + inner.tuple_ids().len());
        tuple_ids.extend_from_slice(outer.tuple_ids());
        for tuple_id in inner.tuple_ids() {
            if tuple_ids.contains(tuple_id) {
                return Err(PlanError::DuplicatedValue(format_smolstr!(
                    "tuple id {tuple_id} appears in both children of join {id}"
                )));
            }
        }
        tuple_ids.extend_from_slice(inner.tuple_ids());

        for pair in &equi_conjuncts {
            if let Some(reference) = pair.left.unbound_reference(outer.tuple_ids()) {
                return Err(PlanError::Invalid(
                    Entity::Expression,
                    Some(format_smolstr!(
                        "left side of equi pair references tuple {} absent from the probe side of join {id}",
                        reference.tuple_id
                    )),
                ));
            }
            if let Some(reference) = pair.right.unbound_reference(inner.tuple_ids()) {
                return Err(PlanError::Invalid(
                    Entity::Expression,
                    Some(format_smolstr!(
                        "right side of equi pair references tuple {} absent from the build side of join {id}",
                        reference.tuple_id
                    )),
                ));
            }
        }
        for conjunct in &other_conjuncts {
            if let Some(reference) = conjunct.unbound_reference(&tuple_ids) {
                return Err(PlanError::Invalid(
                    Entity::Expression,
                    Some(format_smolstr!(
                        "join predicate references tuple {} absent from both sides of join {id}",
                        reference.tuple_id
                    )),
                ));
            }
        }

        // This join shape marks both sides nullable, not only the
        // non-preserved side. The rule is specific to merge join.
        let mut nullable_tuple_ids = BTreeSet::new();
        nullable_tuple_ids.extend(inner.base().nullable_tuple_ids().iter().copied());
        nullable_tuple_ids.extend(outer.base().nullable_tuple_ids().iter().copied());
        nullable_tuple_ids.extend(outer.tuple_ids().iter().copied());
        nullable_tuple_ids.extend(inner.tuple_ids().iter().copied());

        debug!(
            "merge join {id}: {} equi pairs, {} other predicates, {} output tuples",
            equi_conjuncts.len(),
            other_conjuncts.len(),
            tuple_ids.len()
        );

        Ok(JoinNode {
            base: NodeBase::new(id, tuple_ids, nullable_tuple_ids),
            children: vec![outer, inner],
            equi_conjuncts,
            other_conjuncts,
        })
    }

    #[must_use]
    pub fn base(&self) -> &NodeBase {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    #[must_use]
    pub fn children(&self) -> &[PlanNode] {
        &self.children
    }

    /// Probe side of the join.
    #[must_use]
    pub fn outer(&self) -> &PlanNode {
        &self.children[0]
    }

    /// Build side of the join.
    #[must_use]
    pub fn inner(&self) -> &PlanNode {
        &self.children[1]
    }

    #[must_use]
    pub fn equi_conjuncts(&self) -> &[EquiPair] {
        &self.equi_conjuncts
    }

    #[must_use]
    pub fn other_conjuncts(&self) -> &[Expr] {
        &self.other_conjuncts
    }

    pub(crate) fn collect_materialized(&self, slots: &mut SlotSet) -> Result<(), PlanError> {
        collect_join_slots(
            &self.base,
            &self.equi_conjuncts,
            &self.other_conjuncts,
            slots,
        )
    }

    pub(crate) fn into_placed(
        self,
        distribution: DistributionMode,
        decide: &mut impl FnMut(&JoinNode) -> DistributionMode,
    ) -> Result<PlacedJoin, PlanError> {
        let JoinNode {
            base,
            children,
            equi_conjuncts,
            other_conjuncts,
        } = self;
        debug!("join {} placed as {distribution}", base.id());
        let mut placed = Vec::with_capacity(children.len());
        for child in children {
            placed.push(child.place(decide)?);
        }
        Ok(PlacedJoin {
            base,
            children: placed,
            equi_conjuncts,
            other_conjuncts,
            distribution,
        })
    }
}

/// Merge join carrying its distribution decision, frozen for
/// serialization and explain.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct PlacedJoin {
    base: NodeBase,
    children: Vec<PlacedNode>,
    equi_conjuncts: Vec<EquiPair>,
    other_conjuncts: Vec<Expr>,
    distribution: DistributionMode,
}

impl PlacedJoin {
    #[must_use]
    pub fn base(&self) -> &NodeBase {
        &self.base
    }

    #[must_use]
    pub fn children(&self) -> &[PlacedNode] {
        &self.children
    }

    /// Probe side of the join.
    #[must_use]
    pub fn outer(&self) -> &PlacedNode {
        &self.children[0]
    }

    /// Build side of the join.
    #[must_use]
    pub fn inner(&self) -> &PlacedNode {
        &self.children[1]
    }

    #[must_use]
    pub fn equi_conjuncts(&self) -> &[EquiPair] {
        &self.equi_conjuncts
    }

    #[must_use]
    pub fn other_conjuncts(&self) -> &[Expr] {
        &self.other_conjuncts
    }

    #[must_use]
    pub fn distribution_mode(&self) -> DistributionMode {
        self.distribution
    }

    pub(crate) fn collect_materialized(&self, slots: &mut SlotSet) -> Result<(), PlanError> {
        collect_join_slots(
            &self.base,
            &self.equi_conjuncts,
            &self.other_conjuncts,
            slots,
        )
    }
}

fn collect_join_slots(
    base: &NodeBase,
    equi_conjuncts: &[EquiPair],
    other_conjuncts: &[Expr],
    slots: &mut SlotSet,
) -> Result<(), PlanError> {
    base.collect_materialized(slots)?;
    for pair in equi_conjuncts {
        collect_bound_slots(&pair.left, base.tuple_ids(), base.id(), slots)?;
        collect_bound_slots(&pair.right, base.tuple_ids(), base.id(), slots)?;
    }
    for conjunct in other_conjuncts {
        collect_bound_slots(conjunct, base.tuple_ids(), base.id(), slots)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests;
