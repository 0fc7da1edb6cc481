//! Property coverage for formula compilation and evaluation.

use proptest::prelude::*;
use rstest as _;
use swissknife::{EvalMode, Formula, FormulaErrorKind, Number};
use thiserror as _;

fn integer_formula(text: &str) -> Formula {
    Formula::compile(text, &["A", "B"], EvalMode::Integer).expect("formula should compile")
}

#[test]
fn shared_formula_evaluates_identically_across_threads() {
    let formula = integer_formula("(A + B) * (A - B) % 97");
    let expected = formula
        .evaluate_with(&[Number::Integer(1234), Number::Integer(77)])
        .expect("evaluate");

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..100 {
                    let value = formula
                        .evaluate_with(&[Number::Integer(1234), Number::Integer(77)])
                        .expect("evaluate");
                    assert_eq!(value, expected);
                }
            });
        }
    });
}

#[test]
fn compile_errors_are_classified() {
    let error = Formula::compile("(A + B", &["A", "B"], EvalMode::Integer).unwrap_err();
    assert_eq!(
        error.kind,
        FormulaErrorKind::Syntax("Brackets do not match".into())
    );

    let error = Formula::compile("A + Offset", &["A"], EvalMode::Integer).unwrap_err();
    assert_eq!(error.to_string(), "Offset - Unknown function/variable");

    let error = Formula::compile("A * * B", &["A", "B"], EvalMode::Integer).unwrap_err();
    assert!(matches!(error.kind, FormulaErrorKind::Syntax(_)));
}

proptest! {
    #[test]
    fn property_evaluation_is_deterministic(a in any::<i32>(), b in any::<i32>()) {
        let formula = Formula::compile(
            "A * 3 - B / 7 + (A > B ? SIN(A) : COS(B))",
            &["A", "B"],
            EvalMode::Float,
        ).expect("compile");
        let values = [Number::Integer(i64::from(a)), Number::Integer(i64::from(b))];
        let first = formula.evaluate_with(&values).expect("evaluate").as_f64();
        let second = formula.evaluate_with(&values).expect("evaluate").as_f64();
        prop_assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn property_integer_arithmetic_is_checked(a in any::<i64>(), b in any::<i64>()) {
        let formula = integer_formula("A * B");
        let result = formula.evaluate_with(&[Number::Integer(a), Number::Integer(b)]);
        match a.checked_mul(b) {
            Some(product) => prop_assert_eq!(result, Ok(Number::Integer(product))),
            None => prop_assert_eq!(result.unwrap_err().kind, FormulaErrorKind::Overflow),
        }
    }

    #[test]
    fn property_division_matches_native(a in any::<i64>(), b in any::<i64>()) {
        let formula = integer_formula("A / B");
        let result = formula.evaluate_with(&[Number::Integer(a), Number::Integer(b)]);
        if b == 0 {
            prop_assert_eq!(result.unwrap_err().kind, FormulaErrorKind::DivisionByZero);
        } else if let Some(quotient) = a.checked_div(b) {
            prop_assert_eq!(result, Ok(Number::Integer(quotient)));
        } else {
            prop_assert_eq!(result.unwrap_err().kind, FormulaErrorKind::Overflow);
        }
    }

    #[test]
    fn property_arbitrary_text_never_panics(text in "[A-B0-9+*/()?:<>=!&|^~%. -]{0,24}") {
        let _ = Formula::compile(&text, &["A", "B"], EvalMode::Integer)
            .map(|formula| formula.evaluate_with(&[Number::Integer(1), Number::Integer(0)]));
    }
}
