use super::PortError;

/// Returns the exclusive end address of an access, or `None` on overflow.
#[must_use]
pub const fn checked_end(address: u64, length: usize) -> Option<u64> {
    address.checked_add(length as u64)
}

/// Validates that `length` bytes starting at `address` fit in `extent`.
///
/// # Errors
///
/// Returns [`PortError::OutOfRange`] when the access runs past `extent` or the
/// end address overflows.
pub const fn validate_range(address: u64, length: usize, extent: u64) -> Result<(), PortError> {
    match checked_end(address, length) {
        Some(end) if end <= extent => Ok(()),
        _ => Err(PortError::OutOfRange {
            address,
            length,
            extent,
        }),
    }
}

/// Start offset of a validated access as a slice index.
pub(crate) fn offset(address: u64, length: usize, extent: u64) -> Result<usize, PortError> {
    validate_range(address, length, extent)?;
    usize::try_from(address).map_err(|_| PortError::OutOfRange {
        address,
        length,
        extent,
    })
}

#[cfg(test)]
mod tests {
    use super::{checked_end, validate_range};
    use crate::PortError;
    use proptest::prelude::*;

    #[test]
    fn access_ending_at_extent_is_in_range() {
        assert_eq!(validate_range(12, 4, 16), Ok(()));
        assert_eq!(validate_range(16, 0, 16), Ok(()));
    }

    #[test]
    fn access_past_extent_is_rejected() {
        assert_eq!(
            validate_range(13, 4, 16),
            Err(PortError::OutOfRange {
                address: 13,
                length: 4,
                extent: 16
            })
        );
    }

    #[test]
    fn end_overflow_is_rejected() {
        assert_eq!(checked_end(u64::MAX, 1), None);
        assert!(validate_range(u64::MAX, 1, u64::MAX).is_err());
    }

    proptest! {
        #[test]
        fn validation_matches_inclusive_end(
            address in 0_u64..4096,
            length in 0_usize..64,
            extent in 0_u64..4096,
        ) {
            let fits = address + length as u64 <= extent;
            prop_assert_eq!(validate_range(address, length, extent).is_ok(), fits);
        }
    }
}
