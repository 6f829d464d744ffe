//! Merge policies selectable by callers.

use std::fmt;
use std::str::FromStr;

use braid_core::BraidError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The merge method named in a request or config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMethod {
    Weighted,
    Interleave,
    Separate,
}

impl MergeMethod {
    pub const ALL: [Self; 3] = [Self::Weighted, Self::Interleave, Self::Separate];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weighted => "weighted",
            Self::Interleave => "interleave",
            Self::Separate => "separate",
        }
    }

    /// Parse a merge method, falling back to [`MergeMethod::Interleave`] for
    /// anything unrecognized. The fallback is logged.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|_| {
            warn!(merge_method = raw, "unknown merge method, using interleave");
            Self::Interleave
        })
    }

    /// Pair the method with its parameters.
    #[must_use]
    pub fn into_policy(self, vector_weight: f64) -> FusionPolicy {
        match self {
            Self::Weighted => FusionPolicy::weighted(vector_weight),
            Self::Interleave => FusionPolicy::Interleave,
            Self::Separate => FusionPolicy::Separate,
        }
    }
}

impl FromStr for MergeMethod {
    type Err = BraidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weighted" => Ok(Self::Weighted),
            "interleave" => Ok(Self::Interleave),
            "separate" => Ok(Self::Separate),
            _ => Err(BraidError::InvalidPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A merge method with its parameters, as the fuser consumes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionPolicy {
    /// Convex combination of normalized per-source scores.
    Weighted { vector_weight: f64 },
    /// Round-robin alternation, vector first.
    Interleave,
    /// No fusion: each source's list is returned on its own.
    Separate,
}

impl FusionPolicy {
    /// Weighted policy with `vector_weight` clamped to `[0, 1]`.
    ///
    /// A non-finite weight falls back to an even split.
    #[must_use]
    pub fn weighted(vector_weight: f64) -> Self {
        Self::Weighted {
            vector_weight: clamp_vector_weight(vector_weight),
        }
    }

    #[must_use]
    pub const fn method(self) -> MergeMethod {
        match self {
            Self::Weighted { .. } => MergeMethod::Weighted,
            Self::Interleave => MergeMethod::Interleave,
            Self::Separate => MergeMethod::Separate,
        }
    }
}

/// Clamp a vector weight into `[0, 1]`; a non-finite weight becomes `0.5`.
#[must_use]
pub fn clamp_vector_weight(vector_weight: f64) -> f64 {
    let clamped = if vector_weight.is_finite() {
        vector_weight.clamp(0.0, 1.0)
    } else {
        0.5
    };
    if !vector_weight.is_finite() || (clamped - vector_weight).abs() > f64::EPSILON {
        warn!(vector_weight, clamped, "vector_weight outside [0, 1]");
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_parse_accepts_known_methods_case_insensitively() {
        assert_eq!("weighted".parse::<MergeMethod>().ok(), Some(MergeMethod::Weighted));
        assert_eq!(" Interleave ".parse::<MergeMethod>().ok(), Some(MergeMethod::Interleave));
        assert_eq!("SEPARATE".parse::<MergeMethod>().ok(), Some(MergeMethod::Separate));
    }

    #[test]
    fn strict_parse_rejects_unknown_methods() {
        let err = "zipper".parse::<MergeMethod>().expect_err("unknown");
        assert!(matches!(err, BraidError::InvalidPolicy(ref m) if m == "zipper"));
    }

    #[test]
    fn lenient_parse_falls_back_to_interleave() {
        assert_eq!(MergeMethod::parse_lenient("rrf"), MergeMethod::Interleave);
        assert_eq!(MergeMethod::parse_lenient(""), MergeMethod::Interleave);
        assert_eq!(MergeMethod::parse_lenient("weighted"), MergeMethod::Weighted);
    }

    #[test]
    fn weighted_clamps_out_of_range() {
        assert_eq!(
            FusionPolicy::weighted(1.7),
            FusionPolicy::Weighted { vector_weight: 1.0 }
        );
        assert_eq!(
            FusionPolicy::weighted(-0.2),
            FusionPolicy::Weighted { vector_weight: 0.0 }
        );
        assert_eq!(
            FusionPolicy::weighted(f64::NAN),
            FusionPolicy::Weighted { vector_weight: 0.5 }
        );
    }

    #[test]
    fn method_round_trips_through_policy() {
        for method in MergeMethod::ALL {
            assert_eq!(method.into_policy(0.3).method(), method);
            assert_eq!(method.to_string().parse::<MergeMethod>().ok(), Some(method));
        }
    }
}
