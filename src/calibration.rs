//! Calibration of raw logical values into the physical ranges consumers expect
//!
//! Pure functions only; nothing here touches shared state, so callers may run
//! them inside or outside the state lock.
//!
//! Deadzone and saturation are basis points (out of 10000) of the distance
//! from the logical center to the extreme on the sample's side, not of the
//! full range. An asymmetric logical range such as -32768..32767 therefore
//! produces an asymmetric physical mapping.

use serde::{Deserialize, Serialize};

/// Full scale for deadzone and saturation.
pub const BASIS_POINTS: i32 = 10_000;

pub const AXIS_LOGICAL_MIN: i32 = -32_768;
pub const AXIS_LOGICAL_MAX: i32 = 32_767;
pub const AXIS_PHYSICAL_MIN: i32 = 0;
pub const AXIS_PHYSICAL_MAX: i32 = 65_535;

pub const POV_LOGICAL_MIN: i32 = -18_000;
pub const POV_LOGICAL_MAX: i32 = 18_000;
pub const POV_PHYSICAL_MIN: i32 = 0;
pub const POV_PHYSICAL_MAX: i32 = 36_000;

/// Calibration parameters of one axis or POV object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCalibration {
    pub logical_min: i32,
    pub logical_max: i32,
    pub physical_min: i32,
    pub physical_max: i32,
    pub deadzone: i32,
    pub saturation: i32,
    pub granularity: i32,
}

impl ObjectCalibration {
    pub fn axis() -> Self {
        Self {
            logical_min: AXIS_LOGICAL_MIN,
            logical_max: AXIS_LOGICAL_MAX,
            physical_min: AXIS_PHYSICAL_MIN,
            physical_max: AXIS_PHYSICAL_MAX,
            deadzone: 0,
            saturation: BASIS_POINTS,
            granularity: 1,
        }
    }

    pub fn pov() -> Self {
        Self {
            logical_min: POV_LOGICAL_MIN,
            logical_max: POV_LOGICAL_MAX,
            physical_min: POV_PHYSICAL_MIN,
            physical_max: POV_PHYSICAL_MAX,
            deadzone: 0,
            saturation: BASIS_POINTS,
            granularity: 1,
        }
    }

    /// Sets the deadzone, clamped to 0..=10000. Saturation is raised if it
    /// would otherwise sit inside the deadzone.
    pub fn set_deadzone(&mut self, basis_points: i32) {
        self.deadzone = basis_points.clamp(0, BASIS_POINTS);
        self.saturation = self.saturation.max(self.deadzone);
    }

    /// Sets the saturation, clamped to deadzone..=10000.
    pub fn set_saturation(&mut self, basis_points: i32) {
        self.saturation = basis_points.clamp(self.deadzone, BASIS_POINTS);
    }

    pub fn physical_center(&self) -> i32 {
        center(self.physical_min, self.physical_max)
    }

    pub fn logical_center(&self) -> i32 {
        center(self.logical_min, self.logical_max)
    }
}

/// `a * b / c` computed in 64 bits, rounded half away from zero.
///
/// Returns -1 for a zero divisor and saturates at the `i32` bounds.
pub fn mul_div(a: i32, b: i32, c: i32) -> i32 {
    if c == 0 {
        return -1;
    }
    let numerator = a as i64 * b as i64;
    let divisor = c as i64;
    let half = divisor.abs() / 2;
    let rounded = if (numerator < 0) == (divisor < 0) {
        (numerator.abs() + half) / divisor.abs()
    } else {
        -((numerator.abs() + half) / divisor.abs())
    };
    rounded.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn center(min: i32, max: i32) -> i32 {
    if min == 0 {
        max >> 1
    } else {
        ((min as f64 + max as f64) / 2.0).round() as i32
    }
}

/// Affine map from the logical range onto the physical range.
///
/// Used for values without center semantics, such as the synthesized
/// trigger axis.
pub fn scale_linear(raw: i32, calib: &ObjectCalibration) -> i32 {
    let logical_span = calib.logical_max - calib.logical_min;
    if logical_span == 0 {
        return calib.physical_min;
    }
    calib.physical_min
        + mul_div(
            raw - calib.logical_min,
            calib.physical_max - calib.physical_min,
            logical_span,
        )
}

/// Center-relative map with a deadzone and a saturation band on each side.
///
/// Samples inside the deadzone collapse to the physical center, samples at or
/// beyond saturation clamp to the side's physical extreme, and everything in
/// between is interpolated.
pub fn scale_axis(raw: i32, calib: &ObjectCalibration) -> i32 {
    let physical_center = calib.physical_center();
    let logical_center = calib.logical_center();
    let value = raw - logical_center;

    // (lower bound, upper bound) in logical units relative to the center,
    // paired with the physical sub-range of the same side
    let (log_low, log_high, phy_low, phy_high) = if value <= 0 {
        let reach = calib.logical_min - logical_center;
        (
            mul_div(reach, calib.saturation, BASIS_POINTS),
            mul_div(reach, calib.deadzone, BASIS_POINTS),
            calib.physical_min,
            physical_center,
        )
    } else {
        let reach = calib.logical_max - logical_center;
        (
            mul_div(reach, calib.deadzone, BASIS_POINTS),
            mul_div(reach, calib.saturation, BASIS_POINTS),
            physical_center,
            calib.physical_max,
        )
    };

    if value <= log_low {
        return phy_low;
    }
    if value >= log_high {
        return phy_high;
    }
    phy_low + mul_div(value - log_low, phy_high - phy_low, log_high - log_low)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_rounds_half_away_from_zero() {
        assert_eq!(mul_div(1, 1, 2), 1);
        assert_eq!(mul_div(-1, 1, 2), -1);
        assert_eq!(mul_div(1, 1, 3), 0);
        assert_eq!(mul_div(2, 1, 3), 1);
        assert_eq!(mul_div(65_535, 65_535, 65_535), 65_535);
        assert_eq!(mul_div(5, 5, 0), -1);
        assert_eq!(mul_div(i32::MAX, i32::MAX, 1), i32::MAX);
    }

    #[test]
    fn centers_follow_zero_min_rule() {
        let axis = ObjectCalibration::axis();
        assert_eq!(axis.physical_center(), 32_767);
        // round(-0.5) rounds away from zero
        assert_eq!(axis.logical_center(), -1);

        let pov = ObjectCalibration::pov();
        assert_eq!(pov.physical_center(), 18_000);
        assert_eq!(pov.logical_center(), 0);
    }

    #[test]
    fn linear_endpoints_and_midpoint() {
        let calib = ObjectCalibration::axis();
        assert_eq!(scale_linear(AXIS_LOGICAL_MIN, &calib), AXIS_PHYSICAL_MIN);
        assert_eq!(scale_linear(AXIS_LOGICAL_MAX, &calib), AXIS_PHYSICAL_MAX);
        assert_eq!(scale_linear(0, &calib), 32_768);
    }

    #[test]
    fn linear_with_empty_logical_range() {
        let mut calib = ObjectCalibration::axis();
        calib.logical_max = calib.logical_min;
        assert_eq!(scale_linear(123, &calib), calib.physical_min);
    }

    #[test]
    fn axis_without_deadzone() {
        let calib = ObjectCalibration::axis();
        assert_eq!(scale_axis(-1, &calib), 32_767);
        assert_eq!(scale_axis(0, &calib), 32_768);
        assert_eq!(scale_axis(100, &calib), 32_868);
        assert_eq!(scale_axis(AXIS_LOGICAL_MIN, &calib), 0);
        assert_eq!(scale_axis(AXIS_LOGICAL_MAX, &calib), 65_535);
    }

    #[test]
    fn axis_deadzone_collapses_to_center() {
        let mut calib = ObjectCalibration::axis();
        calib.set_deadzone(1_000);
        // 10% of the half range on either side, measured from the -1 center
        assert_eq!(scale_axis(3_000, &calib), 32_767);
        assert_eq!(scale_axis(-3_000, &calib), 32_767);
        assert_eq!(scale_axis(3_276, &calib), 32_767);
        assert!(scale_axis(3_400, &calib) > 32_767);
        assert!(scale_axis(-3_400, &calib) < 32_767);
    }

    #[test]
    fn axis_saturation_clamps_to_extremes() {
        let mut calib = ObjectCalibration::axis();
        calib.set_saturation(5_000);
        assert_eq!(scale_axis(16_383, &calib), 65_535);
        assert_eq!(scale_axis(20_000, &calib), 65_535);
        assert_eq!(scale_axis(-16_385, &calib), 0);
        assert_eq!(scale_axis(-20_000, &calib), 0);
        let mid = scale_axis(8_000, &calib);
        assert!(mid > 32_767 && mid < 65_535);
    }

    #[test]
    fn deadzone_and_saturation_stay_ordered() {
        let mut calib = ObjectCalibration::axis();
        calib.set_saturation(4_000);
        calib.set_deadzone(6_000);
        assert_eq!(calib.deadzone, 6_000);
        assert_eq!(calib.saturation, 6_000);

        calib.set_saturation(1_000);
        assert_eq!(calib.saturation, 6_000);

        calib.set_deadzone(-5);
        assert_eq!(calib.deadzone, 0);
        calib.set_deadzone(20_000);
        assert_eq!(calib.deadzone, BASIS_POINTS);
    }

    #[test]
    fn full_deadzone_pins_interior_to_center() {
        let mut calib = ObjectCalibration::axis();
        calib.set_deadzone(BASIS_POINTS);
        for raw in [-30_000, -1, 0, 1, AXIS_LOGICAL_MAX] {
            assert_eq!(scale_axis(raw, &calib), 32_767);
        }
    }
}
