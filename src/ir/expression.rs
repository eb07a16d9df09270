//! Expression tree module.
//!
//! Analyzed predicate expressions attached to plan nodes. The analyzer
//! resolves every column reference before the tree reaches this layer,
//! so references carry final tuple and slot ids.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::{Display, Formatter};

use crate::ir::{SlotId, SlotSet, TupleId};

/// Binary operator returning a boolean result.
#[derive(Serialize, Deserialize, PartialEq, Debug, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Bool {
    /// `AND`
    And,
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `!=`
    NotEq,
    /// `OR`
    Or,
}

impl Bool {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Bool::And => "and",
            Bool::Eq => "=",
            Bool::Gt => ">",
            Bool::GtEq => ">=",
            Bool::Lt => "<",
            Bool::LtEq => "<=",
            Bool::NotEq => "<>",
            Bool::Or => "or",
        }
    }
}

impl Display for Bool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Binary arithmetic operator.
#[derive(Serialize, Deserialize, PartialEq, Debug, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Arithmetic {
    /// `%`
    Modulo,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `+`
    Add,
    /// `-`
    Subtract,
}

impl Arithmetic {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Arithmetic::Modulo => "%",
            Arithmetic::Multiply => "*",
            Arithmetic::Divide => "/",
            Arithmetic::Add => "+",
            Arithmetic::Subtract => "-",
        }
    }
}

impl Display for Arithmetic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Literal values the analyzer folds into predicates.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum Value {
    /// Boolean value.
    Boolean(bool),
    /// Signed integer value.
    Integer(i64),
    /// String value.
    String(SmolStr),
    /// The missing value.
    Null,
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::String(value) => write!(f, "'{value}'"),
            Value::Null => write!(f, "NULL"),
        }
    }
}

/// Reference to a single column of an input tuple.
///
/// Example: `a`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Tuple the referenced column belongs to.
    pub tuple_id: TupleId,
    /// Column position resolved by the analyzer.
    pub slot_id: SlotId,
    /// Source-syntax name, kept for diagnostics only.
    pub name: SmolStr,
}

/// Constant expression.
///
/// Example: `42`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct Constant {
    /// Constant value.
    pub value: Value,
}

/// Boolean expression.
///
/// Example: `a = b`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct BoolExpr {
    /// Left branch expression.
    pub left: Box<Expr>,
    /// Boolean operator.
    pub op: Bool,
    /// Right branch expression.
    pub right: Box<Expr>,
}

/// Arithmetic expression.
///
/// Example: `a + 1`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct ArithmeticExpr {
    /// Left branch expression.
    pub left: Box<Expr>,
    /// Arithmetic operator.
    pub op: Arithmetic,
    /// Right branch expression.
    pub right: Box<Expr>,
}

/// Analyzed expression with resolved references.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum Expr {
    Arithmetic(ArithmeticExpr),
    Bool(BoolExpr),
    Constant(Constant),
    Reference(Reference),
}

impl Expr {
    #[must_use]
    pub fn reference(tuple_id: TupleId, slot_id: SlotId, name: &str) -> Self {
        Expr::Reference(Reference {
            tuple_id,
            slot_id,
            name: SmolStr::new(name),
        })
    }

    #[must_use]
    pub fn constant(value: Value) -> Self {
        Expr::Constant(Constant { value })
    }

    #[must_use]
    pub fn bool(left: Expr, op: Bool, right: Expr) -> Self {
        Expr::Bool(BoolExpr {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    #[must_use]
    pub fn arithmetic(left: Expr, op: Arithmetic, right: Expr) -> Self {
        Expr::Arithmetic(ArithmeticExpr {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    /// Collect every slot id referenced in the tree.
    pub fn collect_slot_ids(&self, slots: &mut SlotSet) {
        match self {
            Expr::Arithmetic(expr) => {
                expr.left.collect_slot_ids(slots);
                expr.right.collect_slot_ids(slots);
            }
            Expr::Bool(expr) => {
                expr.left.collect_slot_ids(slots);
                expr.right.collect_slot_ids(slots);
            }
            Expr::Constant(_) => {}
            Expr::Reference(reference) => {
                slots.insert(reference.slot_id);
            }
        }
    }

    /// Find the first reference whose tuple is absent from `tuple_ids`.
    #[must_use]
    pub fn unbound_reference(&self, tuple_ids: &[TupleId]) -> Option<&Reference> {
        match self {
            Expr::Arithmetic(expr) => expr
                .left
                .unbound_reference(tuple_ids)
                .or_else(|| expr.right.unbound_reference(tuple_ids)),
            Expr::Bool(expr) => expr
                .left
                .unbound_reference(tuple_ids)
                .or_else(|| expr.right.unbound_reference(tuple_ids)),
            Expr::Constant(_) => None,
            Expr::Reference(reference) => {
                if tuple_ids.contains(&reference.tuple_id) {
                    None
                } else {
                    Some(reference)
                }
            }
        }
    }

    /// Check that every reference is satisfiable from the given tuples.
    #[must_use]
    pub fn is_bound_by(&self, tuple_ids: &[TupleId]) -> bool {
        self.unbound_reference(tuple_ids).is_none()
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Nested boolean operands are parenthesized, leaving leaf
        // comparisons bare: `(a = b) and (c < d)`.
        fn operand(expr: &Expr, f: &mut Formatter<'_>) -> std::fmt::Result {
            if matches!(expr, Expr::Bool(_)) {
                write!(f, "({expr})")
            } else {
                write!(f, "{expr}")
            }
        }

        match self {
            Expr::Arithmetic(expr) => {
                write!(f, "{} {} {}", expr.left, expr.op, expr.right)
            }
            Expr::Bool(expr) => {
                operand(&expr.left, f)?;
                write!(f, " {} ", expr.op)?;
                operand(&expr.right, f)
            }
            Expr::Constant(constant) => write!(f, "{}", constant.value),
            Expr::Reference(reference) => write!(f, "{}", reference.name),
        }
    }
}
