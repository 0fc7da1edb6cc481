//! Bounds and increment checks for numeric writes.

use crate::IncrementPolicy;

/// Checks `value` against `[min, max]` and aligns it to `min + k * increment`.
/// The bounds themselves are always accepted.
pub(crate) fn align_integer(
    value: i64,
    min: i64,
    max: i64,
    increment: i64,
    policy: IncrementPolicy,
) -> Result<i64, String> {
    if value < min || value > max {
        return Err(format!("{value} outside [{min}, {max}]"));
    }
    if increment <= 1 || value == min || value == max {
        return Ok(value);
    }
    let step = i128::from(increment);
    let remainder = (i128::from(value) - i128::from(min)) % step;
    if remainder == 0 {
        return Ok(value);
    }
    let down = i128::from(value) - remainder;
    let aligned = match policy {
        IncrementPolicy::Reject => {
            return Err(format!("{value} is not {min} + k * {increment}"));
        }
        IncrementPolicy::Truncate => down,
        IncrementPolicy::Nearest => {
            let up = down + step;
            if remainder * 2 >= step && up <= i128::from(max) {
                up
            } else {
                down
            }
        }
    };
    i64::try_from(aligned).map_err(|_| format!("{value} cannot be aligned"))
}

/// Float counterpart of [`align_integer`]; `increment` of `None` means
/// continuous.
#[allow(clippy::float_cmp)]
pub(crate) fn align_float(
    value: f64,
    min: f64,
    max: f64,
    increment: Option<f64>,
    policy: IncrementPolicy,
) -> Result<f64, String> {
    if !value.is_finite() {
        return Err(format!("{value} is not finite"));
    }
    if value < min || value > max {
        return Err(format!("{value} outside [{min}, {max}]"));
    }
    let Some(step) = increment.filter(|step| *step > 0.0) else {
        return Ok(value);
    };
    if value == min || value == max {
        return Ok(value);
    }
    let steps = (value - min) / step;
    let nearest = steps.round();
    if (steps - nearest).abs() <= 1e-9 * nearest.abs().max(1.0) {
        return Ok(value);
    }
    let down = steps.floor().mul_add(step, min);
    match policy {
        IncrementPolicy::Reject => Err(format!("{value} is not {min} + k * {step}")),
        IncrementPolicy::Truncate => Ok(down),
        IncrementPolicy::Nearest => {
            let candidate = nearest.mul_add(step, min);
            Ok(if candidate > max { down } else { candidate })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{align_float, align_integer};
    use crate::IncrementPolicy;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(IncrementPolicy::Reject, 13, None)]
    #[case(IncrementPolicy::Truncate, 13, Some(12))]
    #[case(IncrementPolicy::Nearest, 13, Some(12))]
    #[case(IncrementPolicy::Nearest, 14, Some(16))]
    #[case(IncrementPolicy::Reject, 16, Some(16))]
    fn increment_policies(
        #[case] policy: IncrementPolicy,
        #[case] value: i64,
        #[case] expected: Option<i64>,
    ) {
        assert_eq!(align_integer(value, 0, 100, 4, policy).ok(), expected);
    }

    #[test]
    fn bounds_are_inclusive_and_exempt_from_alignment() {
        assert_eq!(align_integer(10, 0, 10, 3, IncrementPolicy::Reject), Ok(10));
        assert_eq!(align_integer(0, 0, 10, 3, IncrementPolicy::Reject), Ok(0));
        assert!(align_integer(11, 0, 10, 1, IncrementPolicy::Nearest).is_err());
        assert!(align_integer(-1, 0, 10, 1, IncrementPolicy::Nearest).is_err());
    }

    #[test]
    fn nearest_never_rounds_past_max() {
        assert_eq!(align_integer(9, 0, 10, 4, IncrementPolicy::Nearest), Ok(8));
    }

    #[test]
    fn float_steps_round_per_policy() {
        assert_eq!(
            align_float(0.26, 0.0, 1.0, Some(0.1), IncrementPolicy::Truncate).ok(),
            Some(0.2)
        );
        let nearest =
            align_float(0.26, 0.0, 1.0, Some(0.1), IncrementPolicy::Nearest).expect("aligned");
        assert!((nearest - 0.3).abs() < 1e-12);
        assert!(align_float(0.26, 0.0, 1.0, Some(0.1), IncrementPolicy::Reject).is_err());
        assert!(align_float(0.3, 0.0, 1.0, Some(0.1), IncrementPolicy::Reject).is_ok());
        assert!(align_float(f64::NAN, 0.0, 1.0, None, IncrementPolicy::Reject).is_err());
    }

    proptest! {
        #[test]
        fn aligned_values_stay_in_bounds(value in -1000_i64..1000, increment in 1_i64..50) {
            for policy in [IncrementPolicy::Truncate, IncrementPolicy::Nearest] {
                let aligned = align_integer(value, -500, 500, increment, policy);
                if (-500..=500).contains(&value) {
                    let aligned = aligned.expect("in range");
                    prop_assert!((-500..=500).contains(&aligned));
                    prop_assert!(aligned == 500 || (aligned + 500) % increment == 0);
                } else {
                    prop_assert!(aligned.is_err());
                }
            }
        }
    }
}
