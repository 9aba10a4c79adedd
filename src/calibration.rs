//! # Calibration Module
//!
//! Captures center and per-axis extrema from raw ADC samples and derives a
//! bounded, deadzone-corrected stick position.
//!
//! ## Capture model
//!
//! Capture is user-gated: observing samples never widens the recorded range,
//! so transient noise cannot corrupt the bounds. Center capture overwrites
//! (last capture wins); extent capture only ever widens.
//!
//! ## Normalization
//!
//! The physical range is usually asymmetric around the resting center, so a
//! single linear scale would either clip one side or never reach full
//! deflection on the other. Each side is scaled independently instead:
//! center maps to 0 and each excursion reaches exactly ±1.
//!
//! ## Deadzone
//!
//! A deadzone eliminates small stick movements near center to prevent drift.
//! Values within the deadzone are mapped to 0.0, while values outside are
//! rescaled so output is continuous at the boundary and still reaches ±1 at
//! full deflection.
//!
//! ## Usage
//!
//! ```
//! use joystick_link::calibration::CalibrationStore;
//!
//! let mut cal = CalibrationStore::new(0.1);
//! cal.capture_center(2048, 2048);
//! cal.capture_extent(0, 0);
//! cal.capture_extent(4095, 4095);
//!
//! let (x, y) = cal.position(4095, 2048);
//! assert!((x - 1.0).abs() < 0.001);
//! assert_eq!(y, 0.0);
//! ```

/// Maximum representable raw sample (12-bit ADC)
pub const RAW_SAMPLE_MAX: i32 = 4095;

/// Recorded calibration state for a single axis.
///
/// `min`/`max` are seeded at the opposite extremes so the first extent
/// capture always narrows them onto real data; after that they only widen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    /// Captured resting position; `None` until the first center capture
    pub center: Option<i32>,
    /// Smallest raw value captured so far
    pub min: i32,
    /// Largest raw value captured so far
    pub max: i32,
}

impl Default for AxisRange {
    fn default() -> Self {
        Self {
            center: None,
            min: RAW_SAMPLE_MAX,
            max: 0,
        }
    }
}

impl AxisRange {
    fn widen(&mut self, raw: i32) {
        self.min = self.min.min(raw);
        self.max = self.max.max(raw);
    }
}

/// Owned calibration state for a 2D stick.
///
/// One instance is passed explicitly to every consumer; there is no shared
/// module-level state. Values live only in memory for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationStore {
    x: AxisRange,
    y: AxisRange,
    deadzone: f32,
    last_sample: Option<(i32, i32)>,
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new(0.15)
    }
}

impl CalibrationStore {
    /// Creates an empty store with the given deadzone fraction.
    ///
    /// The deadzone is clamped into `[0, 1)`; the configuration layer rejects
    /// values `>= 0.9` before they get here, but the store guards anyway so a
    /// bad value can never invert or diverge the output.
    #[must_use]
    pub fn new(deadzone: f32) -> Self {
        Self {
            x: AxisRange::default(),
            y: AxisRange::default(),
            deadzone: clamp_deadzone(deadzone),
            last_sample: None,
        }
    }

    /// Records the latest raw sample without touching calibration bounds
    pub fn observe(&mut self, raw_x: i32, raw_y: i32) {
        self.last_sample = Some((raw_x, raw_y));
    }

    /// Most recently observed raw sample, if any
    #[must_use]
    pub fn last_sample(&self) -> Option<(i32, i32)> {
        self.last_sample
    }

    /// Captures the resting center. Overwrite semantics: last capture wins.
    pub fn capture_center(&mut self, raw_x: i32, raw_y: i32) {
        self.x.center = Some(raw_x);
        self.y.center = Some(raw_y);
    }

    /// Widens the per-axis extrema to include the given sample.
    ///
    /// Monotone: `min` never increases and `max` never decreases across
    /// captures.
    pub fn capture_extent(&mut self, raw_x: i32, raw_y: i32) {
        self.x.widen(raw_x);
        self.y.widen(raw_y);
    }

    /// Current X axis calibration
    #[must_use]
    pub fn x_range(&self) -> AxisRange {
        self.x
    }

    /// Current Y axis calibration
    #[must_use]
    pub fn y_range(&self) -> AxisRange {
        self.y
    }

    /// Configured deadzone fraction
    #[must_use]
    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }

    /// Replaces the deadzone, clamped into `[0, 1)`
    pub fn set_deadzone(&mut self, deadzone: f32) {
        self.deadzone = clamp_deadzone(deadzone);
    }

    /// Calibrated, deadzone-corrected position for a raw sample pair.
    ///
    /// Both components are in `[-1, 1]`; axes without a captured center
    /// report 0.0.
    #[must_use]
    pub fn position(&self, raw_x: i32, raw_y: i32) -> (f32, f32) {
        (
            apply_deadzone(normalize(raw_x, self.x.center, self.x.min, self.x.max), self.deadzone),
            apply_deadzone(normalize(raw_y, self.y.center, self.y.min, self.y.max), self.deadzone),
        )
    }
}

/// Maps a raw sample to `[-1, 1]` around a captured center.
///
/// Each side of center scales independently so an asymmetric physical range
/// still reaches exactly ±1 at its captured extremes. Returns 0.0 when the
/// center is unset or the range is degenerate (`hi == center` or
/// `center == lo`), so there is never a division by zero.
#[must_use]
pub fn normalize(raw: i32, center: Option<i32>, lo: i32, hi: i32) -> f32 {
    let Some(center) = center else {
        return 0.0;
    };
    if hi == center || center == lo {
        return 0.0;
    }

    let value = if raw >= center {
        (raw - center) as f32 / (hi - center) as f32
    } else {
        (raw - center) as f32 / (center - lo) as f32
    };
    value.clamp(-1.0, 1.0)
}

/// Applies a symmetric deadzone to a normalized value.
///
/// Values with `|v| <= dz` collapse to 0.0; the remaining band is rescaled so
/// output is continuous at the boundary and `|v| = 1` still maps to ±1.
#[must_use]
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    let dz = clamp_deadzone(deadzone);
    if value.abs() <= dz {
        0.0
    } else {
        (value - value.signum() * dz) / (1.0 - dz)
    }
}

/// Largest accepted deadzone; anything at or above 1.0 would invert output
const DEADZONE_LIMIT: f32 = 0.999;

fn clamp_deadzone(deadzone: f32) -> f32 {
    if deadzone.is_finite() {
        deadzone.clamp(0.0, DEADZONE_LIMIT)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Normalize Tests ====================

    #[test]
    fn test_normalize_before_center_capture_is_zero() {
        let cal = CalibrationStore::new(0.0);
        for raw in [0, 1000, 2048, 4095] {
            assert_eq!(cal.position(raw, raw), (0.0, 0.0));
        }
    }

    #[test]
    fn test_normalize_anchor_points() {
        assert_eq!(normalize(2048, Some(2048), 0, 4095), 0.0);
        assert!((normalize(4095, Some(2048), 0, 4095) - 1.0).abs() < 0.001);
        assert!((normalize(0, Some(2048), 0, 4095) - (-1.0)).abs() < 0.001);
    }

    #[test]
    fn test_normalize_asymmetric_range() {
        // Center sits well off-middle; each side still spans its full range
        let center = Some(1000);
        assert!((normalize(4095, center, 0, 4095) - 1.0).abs() < 0.001);
        assert!((normalize(0, center, 0, 4095) - (-1.0)).abs() < 0.001);
        // Halfway up the high side
        let mid = normalize(1000 + (4095 - 1000) / 2, center, 0, 4095);
        assert!((mid - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_normalize_degenerate_ranges() {
        // hi == center
        assert_eq!(normalize(3000, Some(4095), 0, 4095), 0.0);
        // center == lo
        assert_eq!(normalize(3000, Some(0), 0, 4095), 0.0);
        // collapsed range
        assert_eq!(normalize(2048, Some(2048), 2048, 2048), 0.0);
    }

    #[test]
    fn test_normalize_clamps_out_of_range_samples() {
        // Sample beyond the captured extent stays bounded
        assert_eq!(normalize(4095, Some(2000), 1000, 3000), 1.0);
        assert_eq!(normalize(0, Some(2000), 1000, 3000), -1.0);
    }

    // ==================== Deadzone Tests ====================

    #[test]
    fn test_deadzone_within_zone() {
        assert_eq!(apply_deadzone(0.05, 0.1), 0.0);
        assert_eq!(apply_deadzone(-0.05, 0.1), 0.0);
        // Boundary is inclusive
        assert_eq!(apply_deadzone(0.1, 0.1), 0.0);
        assert_eq!(apply_deadzone(-0.1, 0.1), 0.0);
    }

    #[test]
    fn test_deadzone_full_scale_preserved() {
        assert!((apply_deadzone(1.0, 0.1) - 1.0).abs() < 0.001);
        assert!((apply_deadzone(-1.0, 0.1) - (-1.0)).abs() < 0.001);
    }

    #[test]
    fn test_deadzone_rescales_midrange() {
        // 0.55 sits halfway between the 0.1 deadzone edge and full scale
        assert!((apply_deadzone(0.55, 0.1) - 0.5).abs() < 0.01);
        assert!((apply_deadzone(-0.55, 0.1) - (-0.5)).abs() < 0.01);
    }

    #[test]
    fn test_deadzone_continuous_at_boundary() {
        let just_outside = apply_deadzone(0.1001, 0.1);
        assert!(just_outside > 0.0 && just_outside < 0.001);
    }

    #[test]
    fn test_deadzone_zero_is_identity() {
        assert_eq!(apply_deadzone(0.42, 0.0), 0.42);
    }

    #[test]
    fn test_deadzone_guards_invalid_fraction() {
        // dz >= 1 must not invert or diverge
        let out = apply_deadzone(1.0, 1.5);
        assert!(out.is_finite());
        assert!(out >= 0.0 && out <= 1.0);
        assert_eq!(apply_deadzone(0.5, f32::NAN), 0.5);
        // Negative deadzone clamps to none
        assert_eq!(apply_deadzone(0.5, -0.2), 0.5);
    }

    // ==================== Capture Tests ====================

    #[test]
    fn test_capture_center_overwrites() {
        let mut cal = CalibrationStore::new(0.0);
        cal.capture_center(100, 200);
        cal.capture_center(2048, 2000);
        assert_eq!(cal.x_range().center, Some(2048));
        assert_eq!(cal.y_range().center, Some(2000));
    }

    #[test]
    fn test_capture_extent_is_monotone() {
        let mut cal = CalibrationStore::new(0.0);
        cal.capture_extent(1000, 1000);
        cal.capture_extent(3000, 3000);
        // A narrower capture must not shrink the recorded range
        cal.capture_extent(2000, 2000);
        assert_eq!(cal.x_range().min, 1000);
        assert_eq!(cal.x_range().max, 3000);
        assert_eq!(cal.y_range().min, 1000);
        assert_eq!(cal.y_range().max, 3000);
    }

    #[test]
    fn test_capture_extent_seeds() {
        let cal = CalibrationStore::new(0.0);
        assert_eq!(cal.x_range().min, RAW_SAMPLE_MAX);
        assert_eq!(cal.x_range().max, 0);
    }

    #[test]
    fn test_observe_does_not_widen() {
        let mut cal = CalibrationStore::new(0.0);
        cal.observe(0, 4095);
        cal.observe(4095, 0);
        assert_eq!(cal.x_range(), AxisRange::default());
        assert_eq!(cal.y_range(), AxisRange::default());
        assert_eq!(cal.last_sample(), Some((4095, 0)));
    }

    // ==================== Pipeline Tests ====================

    #[test]
    fn test_position_full_pipeline() {
        let mut cal = CalibrationStore::new(0.1);
        cal.capture_center(2048, 2048);
        cal.capture_extent(0, 0);
        cal.capture_extent(4095, 4095);

        let (x, y) = cal.position(2048, 2048);
        assert_eq!((x, y), (0.0, 0.0));

        let (x, _) = cal.position(4095, 2048);
        assert!((x - 1.0).abs() < 0.001);

        let (_, y) = cal.position(2048, 0);
        assert!((y - (-1.0)).abs() < 0.001);

        // Small deflection inside the deadzone reads as centered
        let (x, _) = cal.position(2100, 2048);
        assert_eq!(x, 0.0);
    }

    #[test]
    fn test_set_deadzone_clamps() {
        let mut cal = CalibrationStore::new(0.15);
        cal.set_deadzone(2.0);
        assert!(cal.deadzone() < 1.0);
        cal.set_deadzone(-1.0);
        assert_eq!(cal.deadzone(), 0.0);
    }
}
