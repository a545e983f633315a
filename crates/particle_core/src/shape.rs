//! Shape families and their normalized outlines.
//!
//! Polygon outlines live on a 4×4 unit grid; the rasterizer scales them by
//! the particle size. Circle and ellipse carry no outline and are drawn
//! analytically from the size.

use crate::rng::{arange, choose_distinct, SynthRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shape family of a particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Octagon,
    #[serde(rename = "Oct-Rand")]
    OctRand,
    Square,
    Quadrilateral,
    Circle,
    Ellipse,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 6] = [
        ShapeKind::Octagon,
        ShapeKind::OctRand,
        ShapeKind::Square,
        ShapeKind::Quadrilateral,
        ShapeKind::Circle,
        ShapeKind::Ellipse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Octagon => "Octagon",
            ShapeKind::OctRand => "Oct-Rand",
            ShapeKind::Square => "Square",
            ShapeKind::Quadrilateral => "Quadrilateral",
            ShapeKind::Circle => "Circle",
            ShapeKind::Ellipse => "Ellipse",
        }
    }

    /// Whether each sampled outline differs from the last.
    pub fn is_randomized(self) -> bool {
        matches!(self, ShapeKind::OctRand | ShapeKind::Quadrilateral)
    }

    /// Whether rotation is meaningless for this family.
    pub fn is_rotation_invariant(self) -> bool {
        matches!(self, ShapeKind::Circle)
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShapeKind {
    type Err = UnknownShape;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShapeKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownShape(s.to_string()))
    }
}

/// Error for a shape name that matches no family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownShape(pub String);

impl fmt::Display for UnknownShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown shape '{}'", self.0)
    }
}

impl std::error::Error for UnknownShape {}

/// Errors from parsing or validating a size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeSpecError {
    /// Empty input.
    Empty,
    /// A component is not an integer.
    InvalidNumber(String),
    /// A component is zero.
    NonPositive,
    /// More than two components.
    Malformed(String),
    /// Scalar given for an ellipse, or an axis pair for any other shape.
    ShapeMismatch { shape: ShapeKind, size: SizeSpec },
}

impl fmt::Display for SizeSpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeSpecError::Empty => write!(f, "size is empty"),
            SizeSpecError::InvalidNumber(s) => write!(f, "invalid size component '{}'", s),
            SizeSpecError::NonPositive => write!(f, "size must be positive"),
            SizeSpecError::Malformed(s) => write!(f, "malformed size '{}', expected N or major;minor", s),
            SizeSpecError::ShapeMismatch { shape, size } => {
                write!(f, "size '{}' does not fit shape {}", size, shape)
            }
        }
    }
}

impl std::error::Error for SizeSpecError {}

/// Size of a particle: a scalar, or an ellipse axis pair written `major;minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SizeRepr", into = "String")]
pub enum SizeSpec {
    Scalar(u32),
    Axes { major: u32, minor: u32 },
}

impl SizeSpec {
    /// Parse `text` and check it suits `shape`.
    pub fn for_shape(shape: ShapeKind, text: &str) -> Result<Self, SizeSpecError> {
        let size: SizeSpec = text.parse()?;
        size.check_shape(shape)?;
        Ok(size)
    }

    /// Ellipses take an axis pair, every other family a scalar.
    pub fn check_shape(self, shape: ShapeKind) -> Result<(), SizeSpecError> {
        let fits = match shape {
            ShapeKind::Ellipse => matches!(self, SizeSpec::Axes { .. }),
            _ => matches!(self, SizeSpec::Scalar(_)),
        };
        if fits {
            Ok(())
        } else {
            Err(SizeSpecError::ShapeMismatch { shape, size: self })
        }
    }

    /// Single number standing for the size (axis mean for ellipses).
    pub fn nominal(self) -> f64 {
        match self {
            SizeSpec::Scalar(s) => s as f64,
            SizeSpec::Axes { major, minor } => (major as f64 + minor as f64) / 2.0,
        }
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeSpec::Scalar(s) => write!(f, "{}", s),
            SizeSpec::Axes { major, minor } => write!(f, "{};{}", major, minor),
        }
    }
}

impl FromStr for SizeSpec {
    type Err = SizeSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SizeSpecError::Empty);
        }

        let parse = |part: &str| -> Result<u32, SizeSpecError> {
            let value: u32 = part
                .trim()
                .parse()
                .map_err(|_| SizeSpecError::InvalidNumber(part.trim().to_string()))?;
            if value == 0 {
                return Err(SizeSpecError::NonPositive);
            }
            Ok(value)
        };

        let parts: Vec<&str> = s.split(';').collect();
        match parts.as_slice() {
            [scalar] => Ok(SizeSpec::Scalar(parse(scalar)?)),
            [major, minor] => Ok(SizeSpec::Axes {
                major: parse(major)?,
                minor: parse(minor)?,
            }),
            _ => Err(SizeSpecError::Malformed(s.to_string())),
        }
    }
}

impl From<SizeSpec> for String {
    fn from(size: SizeSpec) -> Self {
        size.to_string()
    }
}

/// Accepts both `5` and `"7;3"` in serialized documents.
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeRepr {
    Number(u32),
    Text(String),
}

impl TryFrom<SizeRepr> for SizeSpec {
    type Error = SizeSpecError;

    fn try_from(repr: SizeRepr) -> Result<Self, Self::Error> {
        match repr {
            SizeRepr::Number(0) => Err(SizeSpecError::NonPositive),
            SizeRepr::Number(n) => Ok(SizeSpec::Scalar(n)),
            SizeRepr::Text(text) => text.parse(),
        }
    }
}

/// Normalized outline of a shape family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outline {
    /// Polygon vertices on the 4×4 grid, `x` = column, `y` = row.
    Polygon { x: Vec<f64>, y: Vec<f64> },
    /// Disk whose radius is the scalar size.
    Disk,
    /// Ellipse whose semi-axes come from the `major;minor` size.
    Ellipse,
}

/// Shape family plus the outline sampled for it.
///
/// Randomized families keep the outline drawn at creation time; it is
/// never re-sampled for the same particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeSpec {
    pub kind: ShapeKind,
    pub outline: Outline,
}

impl ShapeSpec {
    /// Sample an outline for `kind`.
    pub fn sample(kind: ShapeKind, rng: &mut dyn SynthRng) -> Self {
        Self {
            kind,
            outline: generate(kind, rng),
        }
    }
}

/// Produce the outline of a shape family.
///
/// Randomized families draw fresh offsets from `rng` on every call.
pub fn generate(kind: ShapeKind, rng: &mut dyn SynthRng) -> Outline {
    match kind {
        ShapeKind::Octagon => Outline::Polygon {
            x: vec![1.0, 3.0, 4.0, 4.0, 3.0, 1.0, 0.0, 0.0],
            y: vec![0.0, 0.0, 1.0, 3.0, 4.0, 4.0, 3.0, 1.0],
        },
        ShapeKind::OctRand => {
            // Edge midpoints jitter in the center band, corners in the outer band.
            let mid = choose_distinct(&arange(-1.0 / 6.0, 1.0 / 6.0, 0.05), 4, rng);
            let outer = choose_distinct(&arange(1.0 / 3.0, 1.0, 0.05), 8, rng);
            let x = [-outer[0], mid[0], outer[1], 1.0, outer[2], mid[1], -outer[3], -1.0];
            let y = [outer[4], 1.0, outer[5], mid[2], -outer[6], -1.0, -outer[7], mid[3]];
            Outline::Polygon {
                x: to_grid(&x),
                y: to_grid(&y),
            }
        }
        ShapeKind::Square => Outline::Polygon {
            x: vec![0.0, 4.0, 4.0, 0.0],
            y: vec![0.0, 0.0, 4.0, 4.0],
        },
        ShapeKind::Quadrilateral => {
            let r = choose_distinct(&arange(-1.0, 1.0, 0.05), 4, rng);
            let x = [r[0], 1.0, r[1], -1.0];
            let y = [1.0, r[2], -1.0, r[3]];
            Outline::Polygon {
                x: to_grid(&x),
                y: to_grid(&y),
            }
        }
        ShapeKind::Circle => Outline::Disk,
        ShapeKind::Ellipse => Outline::Ellipse,
    }
}

/// Map [-1, 1] offsets onto the [0, 4] grid.
fn to_grid(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| (v + 1.0) * 2.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::StdRandom;

    #[test]
    fn test_shape_names_round_trip() {
        for kind in ShapeKind::ALL {
            assert_eq!(kind.name().parse::<ShapeKind>().unwrap(), kind);
        }
        assert_eq!("oct-rand".parse::<ShapeKind>().unwrap(), ShapeKind::OctRand);
        assert!("Hexagon".parse::<ShapeKind>().is_err());
    }

    #[test]
    fn test_size_parse() {
        assert_eq!("5".parse::<SizeSpec>().unwrap(), SizeSpec::Scalar(5));
        assert_eq!(
            " 7 ; 3 ".parse::<SizeSpec>().unwrap(),
            SizeSpec::Axes { major: 7, minor: 3 }
        );
        assert_eq!("".parse::<SizeSpec>(), Err(SizeSpecError::Empty));
        assert_eq!("0".parse::<SizeSpec>(), Err(SizeSpecError::NonPositive));
        assert!(matches!("a;3".parse::<SizeSpec>(), Err(SizeSpecError::InvalidNumber(_))));
        assert!(matches!("1;2;3".parse::<SizeSpec>(), Err(SizeSpecError::Malformed(_))));
    }

    #[test]
    fn test_size_text_is_lossless() {
        let axes = SizeSpec::Axes { major: 12, minor: 4 };
        assert_eq!(axes.to_string(), "12;4");
        assert_eq!(axes.to_string().parse::<SizeSpec>().unwrap(), axes);
    }

    #[test]
    fn test_size_must_match_shape() {
        assert!(SizeSpec::for_shape(ShapeKind::Ellipse, "8;4").is_ok());
        assert!(SizeSpec::for_shape(ShapeKind::Ellipse, "8").is_err());
        assert!(SizeSpec::for_shape(ShapeKind::Square, "8;4").is_err());
        assert!(SizeSpec::for_shape(ShapeKind::Circle, "8").is_ok());
    }

    #[test]
    fn test_size_serde_accepts_number_and_text() {
        let scalar: SizeSpec = serde_json::from_str("6").unwrap();
        assert_eq!(scalar, SizeSpec::Scalar(6));
        let axes: SizeSpec = serde_json::from_str("\"9;5\"").unwrap();
        assert_eq!(axes, SizeSpec::Axes { major: 9, minor: 5 });
        assert_eq!(serde_json::to_string(&axes).unwrap(), "\"9;5\"");
    }

    #[test]
    fn test_nominal_size() {
        assert_eq!(SizeSpec::Scalar(5).nominal(), 5.0);
        assert_eq!(SizeSpec::Axes { major: 9, minor: 4 }.nominal(), 6.5);
    }

    #[test]
    fn test_fixed_outlines() {
        let mut rng = StdRandom::from_u64_seed(1);
        match generate(ShapeKind::Octagon, &mut rng) {
            Outline::Polygon { x, y } => {
                assert_eq!(x.len(), 8);
                assert_eq!(y.len(), 8);
            }
            other => panic!("expected polygon, got {:?}", other),
        }
        assert_eq!(generate(ShapeKind::Circle, &mut rng), Outline::Disk);
        assert_eq!(generate(ShapeKind::Ellipse, &mut rng), Outline::Ellipse);
    }

    #[test]
    fn test_randomized_outlines_stay_on_grid() {
        let mut rng = StdRandom::from_u64_seed(3);
        for kind in [ShapeKind::OctRand, ShapeKind::Quadrilateral] {
            for _ in 0..20 {
                let Outline::Polygon { x, y } = generate(kind, &mut rng) else {
                    panic!("expected polygon");
                };
                assert!(x.iter().chain(&y).all(|v| (0.0..=4.0).contains(v)));
            }
        }
    }

    #[test]
    fn test_randomized_outlines_resample() {
        let mut rng = StdRandom::from_u64_seed(11);
        let a = generate(ShapeKind::OctRand, &mut rng);
        let b = generate(ShapeKind::OctRand, &mut rng);
        assert_ne!(a, b);
    }
}
