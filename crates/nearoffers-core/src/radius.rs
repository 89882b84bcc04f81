//! The user-controlled search radius for nearby-offer queries.

use serde::{Deserialize, Serialize};

/// Search radius in whole meters, always a multiple of [`SearchRadius::STEP_M`]
/// within [`SearchRadius::MIN_M`]..=[`SearchRadius::MAX_M`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchRadius(u32);

impl SearchRadius {
    pub const MIN_M: u32 = 100;
    pub const MAX_M: u32 = 5_000;
    pub const STEP_M: u32 = 100;
    pub const DEFAULT_M: u32 = 1_000;

    /// Snaps `meters` to the nearest slider step and clamps it into range.
    #[must_use]
    pub fn new(meters: u32) -> Self {
        let snapped = meters.saturating_add(Self::STEP_M / 2) / Self::STEP_M * Self::STEP_M;
        Self(snapped.clamp(Self::MIN_M, Self::MAX_M))
    }

    /// Converts raw slider input (possibly fractional, negative or NaN) into a
    /// radius. Non-finite and negative input falls back to the minimum.
    #[must_use]
    pub fn from_slider(raw: f64) -> Self {
        if !raw.is_finite() || raw <= 0.0 {
            return Self(Self::MIN_M);
        }
        let capped = raw.min(f64::from(Self::MAX_M));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meters = capped.round() as u32;
        Self::new(meters)
    }

    #[must_use]
    pub const fn meters(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }

    /// Slider label, e.g. `"1.5 km"`.
    #[must_use]
    pub fn label(self) -> String {
        format!("{:.1} km", self.as_f64() / 1000.0)
    }
}

impl Default for SearchRadius {
    fn default() -> Self {
        Self(Self::DEFAULT_M)
    }
}

impl std::fmt::Display for SearchRadius {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.0)
    }
}
