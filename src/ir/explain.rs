//! Explain tree module.
//!
//! Deterministic, indented text rendering of a placed plan tree.
//! Diagnostics only, never parsed back.

use itertools::Itertools;
use std::fmt::{Display, Formatter};

use crate::ir::distribution::DistributionMode;
use crate::ir::join::PlacedJoin;
use crate::ir::tree::{LevelNode, PreOrder, NODE_CAPACITY};
use crate::ir::{NodeBase, PlacedNode, ScanNode};

/// Amount of detail in explain output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExplainLevel {
    /// Operator lines and predicates.
    #[default]
    Normal,
    /// Adds the tuple-id bookkeeping lines.
    Verbose,
}

impl NodeBase {
    /// Append the lines every node variant shares: residual predicates
    /// and, at the verbose level, the tuple-id bookkeeping.
    pub(crate) fn explain_into(&self, output: &mut String, prefix: &str, level: ExplainLevel) {
        if !self.conjuncts().is_empty() {
            output.push_str(&format!(
                "{prefix}other predicates: {}\n",
                self.conjuncts().iter().join(", ")
            ));
        }
        if level == ExplainLevel::Verbose {
            output.push_str(&format!(
                "{prefix}tuple ids: {}\n",
                self.tuple_ids().iter().join(" ")
            ));
            if !self.nullable_tuple_ids().is_empty() {
                output.push_str(&format!(
                    "{prefix}nullable tuple ids: {}\n",
                    self.nullable_tuple_ids().iter().join(" ")
                ));
            }
        }
    }
}

impl ScanNode {
    #[must_use]
    pub fn explain(&self, prefix: &str, level: ExplainLevel) -> String {
        let mut output = format!("{prefix}scan {}\n", self.table());
        self.base().explain_into(&mut output, prefix, level);
        output
    }
}

impl PlacedJoin {
    /// Explain fragment of the join itself, children excluded.
    #[must_use]
    pub fn explain(&self, prefix: &str, level: ExplainLevel) -> String {
        let mut output = String::new();
        output.push_str(prefix);
        output.push_str("join op: MERGE JOIN");
        if self.distribution_mode() != DistributionMode::None {
            output.push_str(&format!(" ({})", self.distribution_mode()));
        }
        output.push('\n');
        for pair in self.equi_conjuncts() {
            output.push_str(&format!("{prefix}  {} = {}\n", pair.left, pair.right));
        }
        if !self.other_conjuncts().is_empty() {
            output.push_str(&format!(
                "{prefix}other join predicates: {}\n",
                self.other_conjuncts().iter().join(", ")
            ));
        }
        self.base().explain_into(&mut output, prefix, level);
        output
    }
}

impl PlacedNode {
    /// Explain fragment of a single node, every line starting with
    /// `prefix`.
    #[must_use]
    pub fn explain(&self, prefix: &str, level: ExplainLevel) -> String {
        match self {
            PlacedNode::Join(join) => join.explain(prefix, level),
            PlacedNode::Scan(scan) => scan.explain(prefix, level),
        }
    }
}

/// Explain tree of a placed plan, one indentation step per depth
/// level.
pub struct FullExplain<'plan> {
    top: &'plan PlacedNode,
    level: ExplainLevel,
}

impl<'plan> FullExplain<'plan> {
    #[must_use]
    pub fn new(top: &'plan PlacedNode, level: ExplainLevel) -> Self {
        FullExplain { top, level }
    }
}

impl<'plan> Display for FullExplain<'plan> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let walker = PreOrder::with_capacity(
            |node: &'plan PlacedNode| node.children().iter(),
            NODE_CAPACITY,
        );
        for LevelNode(level, node) in walker.into_iter(self.top) {
            let prefix = "    ".repeat(level);
            write!(f, "{}", node.explain(&prefix, self.level))?;
        }
        Ok(())
    }
}
