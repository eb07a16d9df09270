//! Join distribution module.
//!
//! How the inner relation of a merge join is delivered to the
//! instances executing the outer side.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Strategy for shipping the inner relation across instances.
#[derive(Serialize, Deserialize, PartialEq, Debug, Eq, Hash, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistributionMode {
    /// Placement has not decided a strategy for this join.
    None,
    /// The whole inner relation is replicated to every instance
    /// running the outer side.
    Broadcast,
    /// Both sides are repartitioned on the equi-join slots.
    #[default]
    Partitioned,
}

impl DistributionMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionMode::None => "NONE",
            DistributionMode::Broadcast => "BROADCAST",
            DistributionMode::Partitioned => "PARTITIONED",
        }
    }
}

impl Display for DistributionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
