//! Bound values and the search comparator.

use std::fmt::Debug;

/// An orderable quality value that can live in a lock-free cell.
///
/// `encode`/`decode` must round-trip exactly; ordering is always compared on
/// decoded values, never on the raw bits.
pub trait BoundValue: Copy + PartialOrd + Debug + Send + Sync + 'static {
    /// Encodes the value into 64 bits.
    fn encode(self) -> u64;

    /// Decodes a value produced by [`BoundValue::encode`].
    fn decode(bits: u64) -> Self;
}

macro_rules! impl_bound_value_int {
    ($($t:ty),+) => {
        $(
            impl BoundValue for $t {
                #[inline]
                fn encode(self) -> u64 {
                    self as u64
                }

                #[inline]
                fn decode(bits: u64) -> Self {
                    bits as $t
                }
            }
        )+
    };
}

impl_bound_value_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl BoundValue for f64 {
    #[inline]
    fn encode(self) -> u64 {
        f64::to_bits(self)
    }

    #[inline]
    fn decode(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

impl BoundValue for f32 {
    #[inline]
    fn encode(self) -> u64 {
        f32::to_bits(self) as u64
    }

    #[inline]
    fn decode(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

/// Direction of optimization, fixed for the lifetime of a search.
///
/// Governs both the "strictly better" test for incumbent updates and the
/// pruning inequality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Objective {
    /// Larger bounds are better.
    #[default]
    Maximize,

    /// Smaller bounds are better.
    Minimize,
}

impl Objective {
    /// Returns true if `candidate` is strictly better than `current`.
    ///
    /// Incomparable values (NaN) are never better.
    #[inline]
    pub fn is_better<B: PartialOrd>(self, candidate: B, current: B) -> bool {
        match self {
            Objective::Maximize => candidate > current,
            Objective::Minimize => candidate < current,
        }
    }

    /// Returns true if a subtree whose best achievable value is `bound` can
    /// be discarded given the current best `current`.
    #[inline]
    pub fn can_prune<B: PartialOrd>(self, bound: B, current: B) -> bool {
        !self.is_better(bound, current)
    }
}

impl std::fmt::Display for Objective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Objective::Maximize => write!(f, "Maximize"),
            Objective::Minimize => write!(f, "Minimize"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_round_trip() {
        for v in [i64::MIN, -17, -1, 0, 1, i64::MAX] {
            assert_eq!(i64::decode(v.encode()), v);
        }
        for v in [i32::MIN, -5, 0, 9, i32::MAX] {
            assert_eq!(i32::decode(v.encode()), v);
        }
    }

    #[test]
    fn test_float_round_trip() {
        for v in [-2.5f64, 0.0, 1e300, f64::NEG_INFINITY] {
            assert_eq!(f64::decode(v.encode()), v);
        }
        assert_eq!(f32::decode(3.25f32.encode()), 3.25);
    }

    #[test]
    fn test_maximize_is_strict() {
        let obj = Objective::Maximize;
        assert!(obj.is_better(5, 4));
        assert!(!obj.is_better(4, 4));
        assert!(!obj.is_better(3, 4));
        assert!(obj.can_prune(4, 4));
    }

    #[test]
    fn test_minimize_is_strict() {
        let obj = Objective::Minimize;
        assert!(obj.is_better(3, 4));
        assert!(!obj.is_better(4, 4));
        assert!(obj.can_prune(5, 4));
        assert!(!obj.can_prune(3, 4));
    }

    #[test]
    fn test_nan_never_better() {
        assert!(!Objective::Maximize.is_better(f64::NAN, 1.0));
        assert!(!Objective::Minimize.is_better(f64::NAN, 1.0));
    }

    #[test]
    fn test_objective_display_and_default() {
        assert_eq!(Objective::default(), Objective::Maximize);
        assert_eq!(format!("{}", Objective::Minimize), "Minimize");
    }
}
