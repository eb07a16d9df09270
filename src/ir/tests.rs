use super::*;
use crate::ir::expression::{Bool, Value};
use pretty_assertions::assert_eq;

pub(crate) fn scan(id: u32, table: &str, tuple: u32, instances: u32) -> PlanNode {
    PlanNode::Scan(ScanNode::new(
        PlanNodeId(id),
        table,
        TupleId(tuple),
        instances,
    ))
}

pub(crate) fn column(tuple: u32, slot: u32, name: &str) -> Expr {
    Expr::reference(TupleId(tuple), SlotId(slot), name)
}

#[test]
fn id_display() {
    assert_eq!("7", PlanNodeId(7).to_string());
    assert_eq!("3", TupleId(3).to_string());
    assert_eq!("11", SlotId(11).to_string());
}

#[test]
fn scan_basics() {
    let scan = scan(1, "warehouse", 5, 8);
    assert_eq!(PlanNodeId(1), scan.id());
    assert_eq!(vec![TupleId(5)], scan.tuple_ids());
    assert!(scan.base().nullable_tuple_ids().is_empty());
    assert_eq!(8, scan.instance_count());
    assert!(scan.children().is_empty());
}

#[test]
fn pushdown_conjuncts_extend_materialized_slots() {
    let mut node = scan(1, "t", 1, 2);
    assert!(node.materialized_slot_ids().unwrap().is_empty());

    node.add_conjuncts(vec![Expr::bool(
        column(1, 4, "a"),
        Bool::Gt,
        Expr::constant(Value::Integer(0)),
    )]);
    let slots = node.materialized_slot_ids().unwrap();
    assert!(slots.contains(&SlotId(4)));
    assert_eq!(1, slots.len());
}

#[test]
fn unbound_pushdown_conjunct_is_reported() {
    let mut node = scan(1, "t", 1, 2);
    node.add_conjuncts(vec![Expr::bool(
        column(9, 4, "b"),
        Bool::Eq,
        Expr::constant(Value::Integer(1)),
    )]);

    let expected = PlanError::NotFound(Entity::Slot, "4 (tuple 9) in the output of node 1".into());
    assert_eq!(expected, node.materialized_slot_ids().unwrap_err());
    // The same failure stops placement.
    assert_eq!(expected, node.place_default().unwrap_err());
}

#[test]
fn placed_scan_keeps_the_base() {
    let placed = scan(1, "t", 5, 3).place_default().unwrap();
    assert_eq!(PlanNodeId(1), placed.id());
    assert_eq!(vec![TupleId(5)], placed.tuple_ids());
    assert_eq!(3, placed.instance_count());
    assert!(placed.children().is_empty());
    assert!(placed.materialized_slot_ids().unwrap().is_empty());
}

#[test]
fn nodes_from_variants() {
    let scan_node = ScanNode::new(PlanNodeId(1), "t", TupleId(1), 1);
    assert_eq!(
        PlanNode::Scan(scan_node.clone()),
        PlanNode::from(scan_node)
    );
}
