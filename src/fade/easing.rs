//! Easing curves for brightness fades.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Maps linear progress `t` in `[0, 1]` onto an eased progress in `[0, 1]`.
///
/// Every curve is monotonic with `ease(0) == 0` and `ease(1) == 1`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    /// Cubic ease-in-out.
    #[default]
    EaseInOut,
    /// Quintic ease-in-out, flatter at both ends than cubic.
    Quintic,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::Quintic => {
                if t < 0.5 {
                    16.0 * t.powi(5)
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(5) / 2.0
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_endpoints() {
        for easing in Easing::iter() {
            assert_eq!(easing.apply(0.0), 0.0, "{easing} at 0");
            assert_eq!(easing.apply(1.0), 1.0, "{easing} at 1");
        }
    }

    #[test]
    fn test_monotonic() {
        for easing in Easing::iter() {
            let mut previous = 0.0;
            for i in 0..=1000 {
                let value = easing.apply(i as f64 / 1000.0);
                assert!(value >= previous, "{easing} decreased at step {i}");
                assert!((0.0..=1.0).contains(&value));
                previous = value;
            }
        }
    }

    #[test]
    fn test_midpoint_is_half() {
        for easing in Easing::iter() {
            assert!((easing.apply(0.5) - 0.5).abs() < 1e-12, "{easing}");
        }
    }

    #[test]
    fn test_input_is_clamped() {
        assert_eq!(Easing::Quintic.apply(-0.5), 0.0);
        assert_eq!(Easing::EaseInOut.apply(1.5), 1.0);
    }

    #[test]
    fn test_names_round_trip_through_strings() {
        assert_eq!("linear".parse::<Easing>(), Ok(Easing::Linear));
        assert_eq!("ease_in_out".parse::<Easing>(), Ok(Easing::EaseInOut));
        assert_eq!("quintic".parse::<Easing>(), Ok(Easing::Quintic));
        assert!("bounce".parse::<Easing>().is_err());
        assert_eq!(Easing::EaseInOut.to_string(), "ease_in_out");
    }
}
