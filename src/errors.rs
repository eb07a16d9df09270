//! Error module.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Object that an error relates to.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum Entity {
    /// Corresponds to an expression tree or one of its parts.
    Expression,
    /// Corresponds to a plan node.
    Node,
    /// Corresponds to a slot referenced by an expression.
    Slot,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entity = match self {
            Entity::Expression => "expression",
            Entity::Node => "node",
            Entity::Slot => "slot",
        };
        write!(f, "{entity}")
    }
}

/// Planning failures.
///
/// Every variant signals a bug in an upstream planning phase rather than
/// bad user input: the caller surfaces it as an internal error and must
/// not retry.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum PlanError {
    /// A value that should be unique was met more than once.
    DuplicatedValue(SmolStr),
    /// An object is in an invalid state for the requested operation.
    Invalid(Entity, Option<SmolStr>),
    /// An object expected to exist could not be resolved.
    NotFound(Entity, SmolStr),
    /// An object holds a different number of values than expected.
    UnexpectedNumberOfValues(SmolStr),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::DuplicatedValue(message) => {
                write!(f, "duplicated value: {message}")
            }
            PlanError::Invalid(entity, Some(message)) => {
                write!(f, "invalid {entity}: {message}")
            }
            PlanError::Invalid(entity, None) => write!(f, "invalid {entity}"),
            PlanError::NotFound(entity, message) => {
                write!(f, "{entity} {message} not found")
            }
            PlanError::UnexpectedNumberOfValues(message) => {
                write!(f, "unexpected number of values: {message}")
            }
        }
    }
}

impl std::error::Error for PlanError {}
