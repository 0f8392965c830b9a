//! Dynamic id allocation window.
use std::collections::HashSet;

/// Environment variable holding the allocation window as `"<min>-<max>"`.
pub const RANGE_ENV: &str = "ENTITY_DYNAMIC_RANGE";

/// Exclusive upper limit for both bounds of an override.
const ID_LIMIT: i64 = 65534;

/// Inclusive window scanned from `start` down to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    /// First id tried (the highest).
    pub start: i64,
    /// Last id tried (the lowest).
    pub end: i64,
}

impl Default for IdRange {
    fn default() -> Self {
        Self {
            start: 999,
            end: 500,
        }
    }
}

impl IdRange {
    /// Window from [`RANGE_ENV`], or the default when unset or invalid.
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(std::env::var(RANGE_ENV).ok().as_deref())
    }

    /// Parse a `"<min>-<max>"` override.
    ///
    /// Any malformed or out-of-bounds value yields the default window.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        let Some((min, max)) = value.and_then(|v| {
            let mut parts = v.split('-');
            let min = parts.next()?.trim().parse::<i64>().ok()?;
            let max = parts.next()?.trim().parse::<i64>().ok()?;
            parts.next().is_none().then_some((min, max))
        }) else {
            return Self::default();
        };

        if min < max && (0..ID_LIMIT).contains(&min) && max > 0 && max < ID_LIMIT {
            Self {
                start: max,
                end: min,
            }
        } else {
            tracing::debug!("ignoring {RANGE_ENV}={min}-{max}: out of bounds");
            Self::default()
        }
    }

    /// Highest id in the window that is not in `used`.
    #[must_use]
    pub fn first_free(&self, used: &HashSet<i64>) -> Option<i64> {
        (self.end..=self.start).rev().find(|id| !used.contains(id))
    }
}
