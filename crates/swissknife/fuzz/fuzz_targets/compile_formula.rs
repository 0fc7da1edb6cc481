#![no_main]

use libfuzzer_sys::fuzz_target;
use swissknife::{EvalMode, Formula, Number};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    for mode in [EvalMode::Integer, EvalMode::Float] {
        if let Ok(formula) = Formula::compile(text, &["A", "B", "SEL"], mode) {
            let _ = formula.evaluate_with(&[
                Number::Integer(3),
                Number::Integer(0),
                Number::Float(-1.5),
            ]);
        }
    }
});
