use super::*;
use crate::ir::expression::{Bool, Value};
use crate::ir::tests::{column, scan};
use crate::ir::{ScanNode, SlotId, TupleId};
use pretty_assertions::assert_eq;

fn col1_eq_col2() -> EquiPair {
    EquiPair::new(column(1, 10, "col1"), column(2, 20, "col2"))
}

fn simple_join(
    equi_conjuncts: Vec<EquiPair>,
    other_conjuncts: Vec<Expr>,
) -> Result<JoinNode, PlanError> {
    JoinNode::new(
        PlanNodeId(3),
        scan(1, "t1", 1, 4),
        scan(2, "t2", 2, 1),
        equi_conjuncts,
        other_conjuncts,
    )
}

#[test]
fn tuple_union_preserves_child_order() {
    let join = simple_join(vec![col1_eq_col2()], vec![]).unwrap();
    assert_eq!(vec![TupleId(1), TupleId(2)], join.base().tuple_ids());

    let upper = JoinNode::new(
        PlanNodeId(5),
        PlanNode::from(join),
        scan(4, "t3", 3, 2),
        vec![],
        vec![],
    )
    .unwrap();
    assert_eq!(
        vec![TupleId(1), TupleId(2), TupleId(3)],
        upper.base().tuple_ids()
    );
}

#[test]
fn duplicate_tuple_id_fails() {
    let err = JoinNode::new(
        PlanNodeId(3),
        scan(1, "t1", 7, 4),
        scan(2, "t2", 7, 1),
        vec![],
        vec![],
    )
    .unwrap_err();
    assert_eq!(
        PlanError::DuplicatedValue("tuple id 7 appears in both children of join 3".into()),
        err
    );
}

#[test]
fn build_side_must_be_a_leaf() {
    let inner = simple_join(vec![col1_eq_col2()], vec![]).unwrap();
    let err = JoinNode::new(
        PlanNodeId(9),
        scan(4, "t3", 3, 2),
        PlanNode::Join(inner),
        vec![],
        vec![],
    )
    .unwrap_err();
    assert_eq!(
        PlanError::Invalid(
            Entity::Node,
            Some("build side of merge join 9 must be a leaf node".into())
        ),
        err
    );
}

#[test]
fn build_side_must_materialize_one_tuple() {
    let wide = ScanNode {
        base: NodeBase::new(PlanNodeId(2), vec![TupleId(2), TupleId(3)], BTreeSet::new()),
        table: "t2".into(),
        instances: 1,
    };
    let err = JoinNode::new(
        PlanNodeId(3),
        scan(1, "t1", 1, 4),
        PlanNode::Scan(wide),
        vec![],
        vec![],
    )
    .unwrap_err();
    assert_eq!(
        PlanError::UnexpectedNumberOfValues(
            "build side of merge join 3 materializes 2 tuples".into()
        ),
        err
    );
}

#[test]
fn equi_sides_must_bind_their_children() {
    let err = simple_join(
        vec![EquiPair::new(column(2, 20, "col2"), column(2, 20, "col2"))],
        vec![],
    )
    .unwrap_err();
    assert_eq!(
        PlanError::Invalid(
            Entity::Expression,
            Some(
                "left side of equi pair references tuple 2 \
                 absent from the probe side of join 3"
                    .into()
            )
        ),
        err
    );

    let err = simple_join(
        vec![EquiPair::new(column(1, 10, "col1"), column(1, 10, "col1"))],
        vec![],
    )
    .unwrap_err();
    assert_eq!(
        PlanError::Invalid(
            Entity::Expression,
            Some(
                "right side of equi pair references tuple 1 \
                 absent from the build side of join 3"
                    .into()
            )
        ),
        err
    );
}

#[test]
fn other_conjunct_must_bind_either_child() {
    let err = simple_join(
        vec![],
        vec![Expr::bool(
            column(5, 1, "x"),
            Bool::Gt,
            Expr::constant(Value::Integer(0)),
        )],
    )
    .unwrap_err();
    assert_eq!(
        PlanError::Invalid(
            Entity::Expression,
            Some("join predicate references tuple 5 absent from both sides of join 3".into())
        ),
        err
    );
}

#[test]
fn both_sides_are_marked_nullable() {
    let join = simple_join(vec![col1_eq_col2()], vec![]).unwrap();
    let expected: BTreeSet<TupleId> = [TupleId(1), TupleId(2)].into_iter().collect();
    assert_eq!(&expected, join.base().nullable_tuple_ids());
    // For this join shape the nullable set covers the whole output.
    assert_eq!(
        join.base().tuple_ids().iter().copied().collect::<BTreeSet<_>>(),
        expected
    );
}

#[test]
fn nullability_is_inherited_from_children() {
    let lower = simple_join(vec![col1_eq_col2()], vec![]).unwrap();
    let upper = JoinNode::new(
        PlanNodeId(5),
        PlanNode::Join(lower),
        scan(4, "t3", 3, 2),
        vec![],
        vec![],
    )
    .unwrap();
    let expected: BTreeSet<TupleId> = [TupleId(1), TupleId(2), TupleId(3)].into_iter().collect();
    assert_eq!(&expected, upper.base().nullable_tuple_ids());
}

#[test]
fn instance_count_is_the_larger_child() {
    let join = simple_join(vec![col1_eq_col2()], vec![]).unwrap();
    assert_eq!(4, PlanNode::Join(join).instance_count());

    let join = JoinNode::new(
        PlanNodeId(3),
        scan(1, "t1", 1, 4),
        scan(2, "t2", 2, 16),
        vec![],
        vec![],
    )
    .unwrap();
    assert_eq!(16, PlanNode::Join(join).instance_count());
}

#[test]
fn materialized_slots_cover_every_predicate() {
    let mut node = PlanNode::Join(
        simple_join(
            vec![col1_eq_col2()],
            vec![Expr::bool(
                column(1, 10, "col1"),
                Bool::Gt,
                Expr::constant(Value::Integer(5)),
            )],
        )
        .unwrap(),
    );
    node.add_conjuncts(vec![Expr::bool(
        column(2, 21, "flag"),
        Bool::Eq,
        Expr::constant(Value::Boolean(true)),
    )]);

    let slots = node.materialized_slot_ids().unwrap();
    for slot in [10, 20, 21] {
        assert!(slots.contains(&SlotId(slot)));
    }
    assert_eq!(3, slots.len());
}

#[test]
fn place_records_the_decision() {
    let top = PlanNode::Join(simple_join(vec![col1_eq_col2()], vec![]).unwrap());
    let placed = top
        .place(&mut |join| {
            if join.inner().instance_count() == 1 {
                DistributionMode::Broadcast
            } else {
                DistributionMode::Partitioned
            }
        })
        .unwrap();

    let PlacedNode::Join(join) = placed else {
        panic!("expected a join");
    };
    assert_eq!(DistributionMode::Broadcast, join.distribution_mode());
}

#[test]
fn place_default_is_partitioned() {
    let placed = PlanNode::Join(simple_join(vec![col1_eq_col2()], vec![]).unwrap())
        .place_default()
        .unwrap();
    let PlacedNode::Join(join) = placed else {
        panic!("expected a join");
    };
    assert_eq!(DistributionMode::Partitioned, join.distribution_mode());
}

#[test]
fn place_checks_every_node() {
    let mut inner = scan(2, "t2", 2, 1);
    inner.add_conjuncts(vec![Expr::bool(
        column(8, 30, "z"),
        Bool::Lt,
        Expr::constant(Value::Integer(3)),
    )]);
    let join = JoinNode::new(
        PlanNodeId(3),
        scan(1, "t1", 1, 4),
        inner,
        vec![col1_eq_col2()],
        vec![],
    )
    .unwrap();

    let err = PlanNode::Join(join).place_default().unwrap_err();
    assert_eq!(
        PlanError::NotFound(Entity::Slot, "30 (tuple 8) in the output of node 2".into()),
        err
    );
}

#[test]
fn accessors_preserve_construction_order() {
    let pairs = vec![
        col1_eq_col2(),
        EquiPair::new(column(1, 11, "a"), column(2, 21, "b")),
    ];
    let join = simple_join(pairs.clone(), vec![]).unwrap();
    assert_eq!(pairs.as_slice(), join.equi_conjuncts());
    assert_eq!(PlanNodeId(1), join.outer().id());
    assert_eq!(PlanNodeId(2), join.inner().id());
}

#[test]
fn placement_keeps_the_base() {
    let join = simple_join(vec![col1_eq_col2()], vec![]).unwrap();
    let tuples = join.base().tuple_ids().to_vec();
    let nullable = join.base().nullable_tuple_ids().clone();

    let placed = PlanNode::Join(join).place_default().unwrap();
    assert_eq!(tuples, placed.tuple_ids());
    assert_eq!(&nullable, placed.base().nullable_tuple_ids());
    assert_eq!(4, placed.instance_count());
}
