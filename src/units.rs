//! Exact integer unit conversion (spec §4.1).
//!
//! A mismatched or unrecognised unit is a validation failure, never a
//! silent cast — callers should route unit errors through
//! [`crate::validation_policy`] rather than calling [`to_mm`] speculatively.

use crate::types::Unit;

/// Conversion factor from `unit` to millimetres.
pub fn factor(unit: Unit) -> u64 {
    match unit {
        Unit::Mm => 1,
        Unit::Cm => 10,
        Unit::M => 1000,
    }
}

/// Convert a length expressed in `unit` to millimetres.
pub fn to_mm(value: u64, unit: Unit) -> u64 {
    value * factor(unit)
}

/// Convert a length in millimetres back to `unit`, truncating any remainder.
/// Used only for display; all internal arithmetic stays in millimetres.
pub fn from_mm(value_mm: u64, unit: Unit) -> u64 {
    value_mm / factor(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mm_is_identity() {
        assert_eq!(to_mm(1234, Unit::Mm), 1234);
    }

    #[test]
    fn cm_scales_by_ten() {
        assert_eq!(to_mm(5, Unit::Cm), 50);
        assert_eq!(from_mm(50, Unit::Cm), 5);
    }

    #[test]
    fn m_scales_by_thousand() {
        assert_eq!(to_mm(3, Unit::M), 3000);
        assert_eq!(from_mm(3000, Unit::M), 3);
    }
}
