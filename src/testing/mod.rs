use std::fmt;

pub mod correction;
pub mod inference;

/// Direction of a competitive gene set test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("Up"),
            Direction::Down => f.write_str("Down"),
        }
    }
}

/// The two one-sided p-values of a set test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneSidedPValues {
    /// Set statistics larger than the background
    pub up: f64,
    /// Set statistics smaller than the background
    pub down: f64,
}

impl OneSidedPValues {
    pub fn new(up: f64, down: f64) -> Self {
        OneSidedPValues { up, down }
    }

    /// Whichever direction has the smaller one-sided p-value; `Up` on ties.
    pub fn direction(&self) -> Direction {
        if self.down < self.up {
            Direction::Down
        } else {
            Direction::Up
        }
    }

    /// Two-sided p-value, twice the smaller tail, capped at 1. `NaN` when
    /// either tail is undefined (e.g. a constant contrast).
    pub fn two_sided(&self) -> f64 {
        if self.up.is_nan() || self.down.is_nan() {
            return f64::NAN;
        }
        (2.0 * self.up.min(self.down)).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_and_two_sided() {
        let p = OneSidedPValues::new(0.01, 0.99);
        assert_eq!(p.direction(), Direction::Up);
        assert_eq!(p.two_sided(), 0.02);

        let p = OneSidedPValues::new(0.7, 0.3);
        assert_eq!(p.direction(), Direction::Down);
        assert_eq!(p.two_sided(), 0.6);

        // continuity-corrected tails can both exceed 0.5
        let p = OneSidedPValues::new(0.6, 0.6);
        assert_eq!(p.two_sided(), 1.0);
        assert_eq!(Direction::Down.to_string(), "Down");
    }

    #[test]
    fn test_undefined_tails_stay_missing() {
        assert!(OneSidedPValues::new(f64::NAN, f64::NAN).two_sided().is_nan());
        assert!(OneSidedPValues::new(0.01, f64::NAN).two_sided().is_nan());
        assert!(OneSidedPValues::new(f64::NAN, 0.4).two_sided().is_nan());
    }
}
