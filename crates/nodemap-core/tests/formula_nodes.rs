//! Formula-backed nodes: evaluation, compile failures, and runtime errors.

use nodemap_core::schema::{
    ConverterDescription, FormulaDescription, NodeDescription, NodeKind, OperandDescription,
};
use nodemap_core::{AccessMode, ErrorKind, NodeMap, NodeMapConfig, Value};
use parking_lot as _;
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use swissknife as _;
use thiserror as _;
use tracing as _;

fn float_formula(name: &str, formula: &str, operands: &[(&str, &str)]) -> NodeDescription {
    NodeDescription::new(
        name,
        NodeKind::SwissKnife(FormulaDescription {
            formula: formula.into(),
            operands: operands
                .iter()
                .map(|(variable, node)| OperandDescription::new(*variable, *node))
                .collect(),
        }),
    )
}

fn map_with(nodes: Vec<NodeDescription>) -> NodeMap {
    NodeMap::builder(NodeMapConfig::default())
        .nodes(nodes)
        .build()
        .expect("map builds")
}

#[test]
fn operands_resolve_through_nodes() {
    let map = map_with(vec![
        NodeDescription::integer("NodeA", 3),
        NodeDescription::integer("NodeB", 4),
        NodeDescription::int_swiss_knife("Result", "A + B * 2", &[("A", "NodeA"), ("B", "NodeB")]),
    ]);
    assert_eq!(map.get_value("Result").expect("evaluate"), Value::Integer(11));
    assert_eq!(map.integer("Result").expect("IInteger").value().expect("read"), 11);
}

#[test]
fn float_formulas_keep_fractions() {
    let map = map_with(vec![
        NodeDescription::integer("Ten", 10),
        float_formula("Quarter", "X / 4", &[("X", "Ten")]),
    ]);
    assert_eq!(map.get_value("Quarter").expect("evaluate"), Value::Float(2.5));
}

#[test]
fn compile_failure_is_permanent_for_that_node_only() {
    let map = map_with(vec![
        NodeDescription::integer("NodeA", 1),
        NodeDescription::integer("NodeB", 2),
        NodeDescription::int_swiss_knife("Broken", "(A + B", &[("A", "NodeA"), ("B", "NodeB")]),
        NodeDescription::int_swiss_knife("Fine", "A - B", &[("A", "NodeA"), ("B", "NodeB")]),
    ]);
    for _ in 0..2 {
        let error = map.get_value("Broken").expect_err("syntax error");
        assert_eq!(error.kind(), ErrorKind::SyntaxError);
    }
    assert_eq!(
        map.set_value("Broken", 1_i64).expect_err("syntax error").kind(),
        ErrorKind::SyntaxError
    );
    assert_eq!(
        map.node("Broken").expect("node").access_mode().expect("mode"),
        AccessMode::NotAvailable
    );
    assert_eq!(map.get_value("Fine").expect("evaluate"), Value::Integer(-1));
}

#[test]
fn undeclared_variables_are_unknown_references() {
    let map = map_with(vec![
        NodeDescription::integer("NodeA", 1),
        NodeDescription::int_swiss_knife("Sum", "A + Q", &[("A", "NodeA")]),
    ]);
    assert_eq!(
        map.get_value("Sum").expect_err("unknown").kind(),
        ErrorKind::UnknownReference
    );
}

#[rstest]
#[case::integer_division("A / B", true)]
#[case::integer_modulo("A % B", true)]
#[case::float_division("A / B", false)]
fn division_by_zero_is_reported(#[case] formula: &str, #[case] integer: bool) {
    let operands = [("A", "NodeA"), ("B", "Zero")];
    let node = if integer {
        NodeDescription::int_swiss_knife("Ratio", formula, &operands)
    } else {
        float_formula("Ratio", formula, &operands)
    };
    let map = map_with(vec![
        NodeDescription::integer("NodeA", 7),
        NodeDescription::integer("Zero", 0),
        node,
    ]);
    assert_eq!(
        map.get_value("Ratio").expect_err("division by zero").kind(),
        ErrorKind::DivisionByZero
    );
}

#[test]
fn integer_overflow_is_reported() {
    let map = map_with(vec![
        NodeDescription::integer("Big", i64::MAX),
        NodeDescription::int_swiss_knife("Square", "A * A", &[("A", "Big")]),
    ]);
    assert_eq!(
        map.get_value("Square").expect_err("overflow").kind(),
        ErrorKind::Overflow
    );
}

#[test]
fn formula_loops_are_detected_on_access() {
    let map = map_with(vec![
        NodeDescription::int_swiss_knife("F", "G + 1", &[("G", "G")]),
        NodeDescription::int_swiss_knife("G", "F + 1", &[("F", "F")]),
    ]);
    assert_eq!(
        map.get_value("F").expect_err("cycle").kind(),
        ErrorKind::DependencyCycle
    );
}

#[test]
fn evaluation_depth_is_bounded() {
    let mut nodes = vec![NodeDescription::integer("N0", 0)];
    for index in 1..=5 {
        let previous = format!("N{}", index - 1);
        nodes.push(NodeDescription::int_swiss_knife(
            format!("N{index}"),
            "P + 1",
            &[("P", previous.as_str())],
        ));
    }
    let shallow = NodeMap::builder(NodeMapConfig {
        max_evaluation_depth: 3,
        ..NodeMapConfig::default()
    })
    .nodes(nodes.clone())
    .build()
    .expect("build");
    assert_eq!(
        shallow.get_value("N5").expect_err("too deep").kind(),
        ErrorKind::DependencyCycle
    );
    assert_eq!(map_with(nodes).get_value("N5").expect("evaluate"), Value::Integer(5));
}

#[test]
fn formulas_without_inverse_are_not_writable() {
    let map = map_with(vec![
        NodeDescription::integer("NodeA", 1),
        NodeDescription::int_swiss_knife("Double", "A * 2", &[("A", "NodeA")]),
        NodeDescription::new(
            "Shown",
            NodeKind::Converter(ConverterDescription {
                value: "NodeA".into(),
                formula_from: "FROM * 1.5".into(),
                formula_to: None,
                operands: Vec::new(),
            }),
        ),
    ]);
    assert_eq!(
        map.set_value("Double", 4_i64).expect_err("read only").kind(),
        ErrorKind::NotWritable
    );
    assert_eq!(
        map.set_value("Shown", 4.0).expect_err("no inverse").kind(),
        ErrorKind::NotWritable
    );
    assert_eq!(
        map.node("Shown").expect("node").access_mode().expect("mode"),
        AccessMode::ReadOnly
    );
    assert_eq!(map.get_value("Shown").expect("evaluate"), Value::Float(1.5));
}

#[test]
fn integer_converter_truncates_the_inverse_result() {
    let map = map_with(vec![
        NodeDescription::integer("Raw", 0),
        NodeDescription::new(
            "Scaled",
            NodeKind::IntConverter(ConverterDescription {
                value: "Raw".into(),
                formula_from: "FROM * 2".into(),
                formula_to: Some("TO / 2".into()),
                operands: Vec::new(),
            }),
        ),
    ]);
    map.set_value("Scaled", 7_i64).expect("write");
    assert_eq!(map.get_value("Raw").expect("read"), Value::Integer(3));
    map.invalidate("Scaled").expect("invalidate");
    assert_eq!(map.get_value("Scaled").expect("evaluate"), Value::Integer(6));
}

#[test]
fn formula_reacts_to_operand_writes() {
    let map = map_with(vec![
        NodeDescription::integer("Width", 640),
        NodeDescription::integer("Height", 480),
        NodeDescription::int_swiss_knife(
            "PayloadSize",
            "W * H",
            &[("W", "Width"), ("H", "Height")],
        ),
    ]);
    assert_eq!(map.get_value("PayloadSize").expect("read"), Value::Integer(307_200));
    map.set_value("Height", 2_i64).expect("write");
    assert_eq!(map.get_value("PayloadSize").expect("read"), Value::Integer(1280));
}
