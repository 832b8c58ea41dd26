//! Vortex category labels.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// The three flow-structure categories the classifiers predict.
///
/// The discriminant is the index of the class in every classifier's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VortexClass {
    /// Counter-clockwise rotating vortex.
    Ccw = 0,
    /// Clockwise rotating vortex.
    Cw = 1,
    /// Saddle point.
    Saddle = 2,
}

impl VortexClass {
    /// All classes in output order.
    pub const ALL: [VortexClass; 3] = [VortexClass::Ccw, VortexClass::Cw, VortexClass::Saddle];

    /// Number of classes.
    pub const COUNT: usize = Self::ALL.len();

    /// Look up the class for an output index.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownClass`] for indices outside the label set.
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(CoreError::UnknownClass {
                index,
                n_classes: Self::COUNT,
            })
    }

    /// Output index of this class.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            VortexClass::Ccw => "CCW",
            VortexClass::Cw => "CW",
            VortexClass::Saddle => "SADDLE",
        }
    }
}

impl std::fmt::Display for VortexClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for VortexClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CCW" => Ok(VortexClass::Ccw),
            "CW" => Ok(VortexClass::Cw),
            "SADDLE" | "SAD" => Ok(VortexClass::Saddle),
            _ => Err(CoreError::UnknownLabel(s.to_string())),
        }
    }
}

/// Index of the largest score.
///
/// Ties resolve to the lowest index; `None` for an empty slice. NaN scores
/// never win.
#[must_use]
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top || score.is_nan() => {}
            _ if score.is_nan() => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_round_trip_index() {
        for class in VortexClass::ALL {
            assert_eq!(VortexClass::from_index(class.index()).unwrap(), class);
        }
        assert!(VortexClass::from_index(3).is_err());
    }

    #[test]
    fn test_class_labels() {
        assert_eq!(VortexClass::Ccw.to_string(), "CCW");
        assert_eq!("cw".parse::<VortexClass>().unwrap(), VortexClass::Cw);
        assert_eq!("SAD".parse::<VortexClass>().unwrap(), VortexClass::Saddle);
        assert!("spiral".parse::<VortexClass>().is_err());
    }

    #[test]
    fn test_class_serde() {
        let json = serde_json::to_string(&VortexClass::Saddle).unwrap();
        assert_eq!(json, "\"SADDLE\"");
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5, 0.1]), Some(0));
        assert_eq!(argmax(&[f32::NAN, -1.0, -2.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_argmax_skips_nan_after_leader() {
        assert_eq!(argmax(&[0.2, f32::NAN, 0.1]), Some(0));
        assert_eq!(argmax(&[f32::NAN, f32::NAN]), None);
    }
}
