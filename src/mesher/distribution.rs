use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const INV_SINH_STRETCH: f64 = 5.0;
const TANH_STRETCH: f64 = 1.35;
const EXP_POWER: f64 = 1.5;

/// Point-distribution law along a boundary edge.
///
/// Maps a normalized index `τ ∈ [0, 1]` to an arc-length fraction in
/// `[0, 1]`; every law is monotonic and fixes both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    #[default]
    Uniform,
    /// Clustered at both ends.
    Cosine,
    /// Clustered at the start.
    Sine,
    /// Clustered at the end.
    InvSine,
    /// Clustered in the middle.
    InvSinh,
    /// Mildly clustered at both ends.
    Tanh,
    Exp,
    InvExp,
}

impl Distribution {
    pub const ALL: [Self; 8] = [
        Self::Uniform,
        Self::Cosine,
        Self::Sine,
        Self::InvSine,
        Self::InvSinh,
        Self::Tanh,
        Self::Exp,
        Self::InvExp,
    ];

    #[must_use]
    pub fn fraction(self, tau: f64) -> f64 {
        let t = tau.clamp(0.0, 1.0);
        match self {
            Self::Uniform => t,
            Self::Cosine => 0.5 * (1.0 - (PI * t).cos()),
            Self::Sine => 1.0 - (FRAC_PI_2 * t).cos(),
            Self::InvSine => (FRAC_PI_2 * t).sin(),
            Self::InvSinh => {
                0.5 * (1.0 + (INV_SINH_STRETCH * (2.0 * t - 1.0)).asinh() / INV_SINH_STRETCH.asinh())
            }
            Self::Tanh => 0.5 * (1.0 + (TANH_STRETCH * (2.0 * t - 1.0)).tanh() / TANH_STRETCH.tanh()),
            Self::Exp => t.powf(EXP_POWER),
            Self::InvExp => 1.0 - (1.0 - t).powf(EXP_POWER),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Cosine => "cosine",
            Self::Sine => "sine",
            Self::InvSine => "inv_sine",
            Self::InvSinh => "inv_sinh",
            Self::Tanh => "tanh",
            Self::Exp => "exp",
            Self::InvExp => "inv_exp",
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Distribution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown distribution '{s}'"))
    }
}

/// Segment count plus distribution for one boundary edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSplit {
    pub segments: usize,
    #[serde(default)]
    pub distribution: Distribution,
}

impl EdgeSplit {
    #[must_use]
    pub const fn new(segments: usize, distribution: Distribution) -> Self {
        Self {
            segments,
            distribution,
        }
    }

    #[must_use]
    pub const fn uniform(segments: usize) -> Self {
        Self::new(segments, Distribution::Uniform)
    }

    /// `segments + 1` arc-length fractions from 0 to 1; at least one segment.
    #[must_use]
    pub fn fractions(&self) -> Vec<f64> {
        let n = self.segments.max(1);
        (0..=n)
            .map(|i| self.distribution.fraction(i as f64 / n as f64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_law_fixes_the_ends_and_is_monotonic() {
        for law in Distribution::ALL {
            assert!(law.fraction(0.0).abs() < 1e-12, "{law}");
            assert!((law.fraction(1.0) - 1.0).abs() < 1e-12, "{law}");
            let samples = EdgeSplit::new(20, law).fractions();
            assert!(samples.windows(2).all(|w| w[1] > w[0]), "{law}");
        }
    }

    #[test]
    fn closed_forms_match() {
        assert!((Distribution::Cosine.fraction(0.5) - 0.5).abs() < 1e-12);
        assert!((Distribution::Exp.fraction(0.25) - 0.125).abs() < 1e-12);
        assert!((Distribution::InvExp.fraction(0.75) - 0.875).abs() < 1e-12);
        assert!((Distribution::InvSinh.fraction(0.5) - 0.5).abs() < 1e-12);
        assert!(Distribution::Sine.fraction(0.5) < 0.5);
        assert!(Distribution::InvSine.fraction(0.5) > 0.5);
    }

    #[test]
    fn zero_segments_still_yields_one() {
        assert_eq!(EdgeSplit::uniform(0).fractions(), vec![0.0, 1.0]);
    }

    #[test]
    fn parses_names() {
        assert_eq!("TANH".parse::<Distribution>(), Ok(Distribution::Tanh));
        assert!("spline".parse::<Distribution>().is_err());
    }
}
