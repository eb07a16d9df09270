//! Plan wire encoding.
//!
//! A placed plan tree is flattened in preorder into a versioned
//! msgpack message. A worker rebuilds the tree from the per-node child
//! counts and never sees the original query text.

use log::debug;
use rmp::encode::{write_array_len, write_bool, write_nil, write_sint, write_str, write_uint};
use std::io::{Error as IoError, Result as IoResult, Write};

use crate::ir::distribution::DistributionMode;
use crate::ir::expression::{Arithmetic, Bool, Expr, Value};
use crate::ir::join::PlacedJoin;
use crate::ir::tree::{LevelNode, PreOrder, NODE_CAPACITY};
use crate::ir::{NodeBase, PlacedNode};

/// Version of the plan message layout.
pub const PROTOCOL_VERSION: u64 = 1;

const SCAN_NODE: u64 = 0;
const JOIN_NODE: u64 = 1;

const REFERENCE_EXPR: u64 = 0;
const CONSTANT_EXPR: u64 = 1;
const BOOL_EXPR: u64 = 2;
const ARITHMETIC_EXPR: u64 = 3;

/// Write a placed plan as a msgpack message.
///
/// # Errors
/// - the underlying writer fails
pub fn write_plan<'p>(writer: &mut impl Write, top: &'p PlacedNode) -> IoResult<()> {
    let walker = PreOrder::with_capacity(
        |node: &'p PlacedNode| node.children().iter(),
        NODE_CAPACITY,
    );
    let nodes = walker.populate_nodes(top);

    // [version, [node, ...]]
    write_array_len(writer, 2)?;
    write_uint(writer, PROTOCOL_VERSION)?;
    let count = u32::try_from(nodes.len()).map_err(IoError::other)?;
    write_array_len(writer, count)?;
    for LevelNode(_, node) in nodes {
        write_node(writer, node)?;
    }
    Ok(())
}

/// Serialize a placed plan into a standalone byte buffer.
///
/// # Errors
/// - the plan does not fit msgpack length limits
pub fn plan_to_bytes(top: &PlacedNode) -> IoResult<Vec<u8>> {
    let mut buf = Vec::new();
    write_plan(&mut buf, top)?;
    debug!("encoded plan {} into {} bytes", top.id(), buf.len());
    Ok(buf)
}

/// [node_type, node_id, num_children, row_tuples, nullable_tuples,
/// conjuncts, payload]
fn write_node(writer: &mut impl Write, node: &PlacedNode) -> IoResult<()> {
    write_array_len(writer, 7)?;
    match node {
        PlacedNode::Join(join) => {
            write_uint(writer, JOIN_NODE)?;
            write_base(writer, join.base(), join.children().len())?;
            write_join_payload(writer, join)?;
        }
        PlacedNode::Scan(scan) => {
            write_uint(writer, SCAN_NODE)?;
            write_base(writer, scan.base(), 0)?;
            write_array_len(writer, 2)?;
            write_str(writer, scan.table())?;
            write_uint(writer, u64::from(scan.instances()))?;
        }
    }
    Ok(())
}

fn write_base(writer: &mut impl Write, base: &NodeBase, num_children: usize) -> IoResult<()> {
    write_uint(writer, u64::from(base.id().0))?;
    write_uint(writer, num_children as u64)?;
    let len = u32::try_from(base.tuple_ids().len()).map_err(IoError::other)?;
    write_array_len(writer, len)?;
    for tuple_id in base.tuple_ids() {
        write_uint(writer, u64::from(tuple_id.0))?;
    }
    // Nullability flags parallel to the tuple list.
    write_array_len(writer, len)?;
    for tuple_id in base.tuple_ids() {
        write_bool(writer, base.nullable_tuple_ids().contains(tuple_id))?;
    }
    write_exprs(writer, base.conjuncts())?;
    Ok(())
}

/// [equi pairs, other join predicates, distribution mode]
fn write_join_payload(writer: &mut impl Write, join: &PlacedJoin) -> IoResult<()> {
    write_array_len(writer, 3)?;
    let pairs = u32::try_from(join.equi_conjuncts().len()).map_err(IoError::other)?;
    write_array_len(writer, pairs)?;
    for pair in join.equi_conjuncts() {
        write_array_len(writer, 2)?;
        write_expr(writer, &pair.left)?;
        write_expr(writer, &pair.right)?;
    }
    write_exprs(writer, join.other_conjuncts())?;
    write_uint(writer, mode_code(join.distribution_mode()))?;
    Ok(())
}

#[inline]
fn write_exprs(writer: &mut impl Write, exprs: &[Expr]) -> IoResult<()> {
    let len = u32::try_from(exprs.len()).map_err(IoError::other)?;
    write_array_len(writer, len)?;
    for expr in exprs {
        write_expr(writer, expr)?;
    }
    Ok(())
}

fn write_expr(writer: &mut impl Write, expr: &Expr) -> IoResult<()> {
    match expr {
        Expr::Arithmetic(expr) => {
            write_array_len(writer, 4)?;
            write_uint(writer, ARITHMETIC_EXPR)?;
            write_uint(writer, arithmetic_code(expr.op))?;
            write_expr(writer, &expr.left)?;
            write_expr(writer, &expr.right)?;
        }
        Expr::Bool(expr) => {
            write_array_len(writer, 4)?;
            write_uint(writer, BOOL_EXPR)?;
            write_uint(writer, bool_code(expr.op))?;
            write_expr(writer, &expr.left)?;
            write_expr(writer, &expr.right)?;
        }
        Expr::Constant(constant) => {
            write_array_len(writer, 2)?;
            write_uint(writer, CONSTANT_EXPR)?;
            write_value(writer, &constant.value)?;
        }
        Expr::Reference(reference) => {
            // The name stays off the wire.
            write_array_len(writer, 3)?;
            write_uint(writer, REFERENCE_EXPR)?;
            write_uint(writer, u64::from(reference.tuple_id.0))?;
            write_uint(writer, u64::from(reference.slot_id.0))?;
        }
    }
    Ok(())
}

#[inline]
fn write_value(writer: &mut impl Write, value: &Value) -> IoResult<()> {
    match value {
        Value::Boolean(value) => {
            write_bool(writer, *value)?;
        }
        Value::Integer(value) => {
            write_sint(writer, *value)?;
        }
        Value::String(value) => {
            write_str(writer, value)?;
        }
        Value::Null => {
            write_nil(writer)?;
        }
    }
    Ok(())
}

#[inline]
fn mode_code(mode: DistributionMode) -> u64 {
    match mode {
        DistributionMode::None => 0,
        DistributionMode::Broadcast => 1,
        DistributionMode::Partitioned => 2,
    }
}

#[inline]
fn bool_code(op: Bool) -> u64 {
    match op {
        Bool::And => 0,
        Bool::Or => 1,
        Bool::Eq => 2,
        Bool::NotEq => 3,
        Bool::Gt => 4,
        Bool::GtEq => 5,
        Bool::Lt => 6,
        Bool::LtEq => 7,
    }
}

#[inline]
fn arithmetic_code(op: Arithmetic) -> u64 {
    match op {
        Arithmetic::Modulo => 0,
        Arithmetic::Multiply => 1,
        Arithmetic::Divide => 2,
        Arithmetic::Add => 3,
        Arithmetic::Subtract => 4,
    }
}
