//! Axis identifiers and validated extents

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::axes::{AXIS_NAMES, MAX_AXES};
use crate::error::{invalid_shape, LayoutError, LayoutResult};

/// A logical dimension of the index space.
///
/// Axes are identified by a small integer (`0..MAX_AXES`) and conventionally
/// named `i`, `j`, `k`, ... A field's coordinates are always given in
/// ascending axis order, whatever the nesting order of its layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Axis(u8);

impl Axis {
    pub const I: Axis = Axis(0);
    pub const J: Axis = Axis(1);
    pub const K: Axis = Axis(2);
    pub const L: Axis = Axis(3);
    pub const M: Axis = Axis(4);
    pub const N: Axis = Axis(5);
    pub const O: Axis = Axis(6);
    pub const P: Axis = Axis(7);

    pub fn new(index: usize) -> LayoutResult<Self> {
        if index >= MAX_AXES {
            return Err(invalid_shape(format!(
                "axis id {} exceeds the maximum of {} axes",
                index, MAX_AXES
            )));
        }
        Ok(Axis(index as u8))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn name(self) -> &'static str {
        AXIS_NAMES[self.index()]
    }

    /// All axes in id order
    pub fn all() -> impl Iterator<Item = Axis> {
        (0..MAX_AXES as u8).map(Axis)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(index) = AXIS_NAMES.iter().position(|name| *name == trimmed) {
            return Axis::new(index);
        }
        match trimmed.parse::<usize>() {
            Ok(index) => Axis::new(index),
            Err(_) => Err(invalid_shape(format!("unknown axis `{}`", s))),
        }
    }
}

impl TryFrom<String> for Axis {
    type Error = LayoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Axis> for String {
    fn from(axis: Axis) -> Self {
        axis.name().to_string()
    }
}

/// An axis together with a validated, positive extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisExtent {
    pub axis: Axis,
    pub extent: usize,
}

impl AxisExtent {
    /// Validate a declared extent. Zero and negative extents are rejected.
    pub fn new(axis: Axis, extent: i64) -> LayoutResult<Self> {
        if extent <= 0 {
            return Err(invalid_shape(format!(
                "extent {} on axis {} must be positive",
                extent, axis
            )));
        }
        let extent = usize::try_from(extent).map_err(|_| {
            invalid_shape(format!("extent {} on axis {} does not fit usize", extent, axis))
        })?;
        Ok(Self { axis, extent })
    }

    /// Validate a parallel list of axes and extents as one node's block shape
    pub fn zip(axes: &[Axis], extents: &[i64]) -> LayoutResult<Vec<Self>> {
        if axes.is_empty() {
            return Err(invalid_shape("a layout node needs at least one axis"));
        }
        if axes.len() != extents.len() {
            return Err(invalid_shape(format!(
                "{} axes declared with {} extents",
                axes.len(),
                extents.len()
            )));
        }

        let mut seen = [false; MAX_AXES];
        let mut out = Vec::with_capacity(axes.len());
        for (&axis, &extent) in axes.iter().zip(extents) {
            if std::mem::replace(&mut seen[axis.index()], true) {
                return Err(invalid_shape(format!("axis {} declared twice in one node", axis)));
            }
            out.push(Self::new(axis, extent)?);
        }
        Ok(out)
    }
}

impl fmt::Display for AxisExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.axis, self.extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_names_round_trip() {
        for axis in Axis::all() {
            assert_eq!(axis.name().parse::<Axis>().ok(), Some(axis));
        }
        assert_eq!("3".parse::<Axis>().ok(), Some(Axis::L));
        assert!("q".parse::<Axis>().is_err());
        assert!(Axis::new(8).is_err());
    }

    #[test]
    fn test_extent_validation() {
        assert!(AxisExtent::new(Axis::I, 1).is_ok());
        assert!(matches!(AxisExtent::new(Axis::I, 0), Err(LayoutError::InvalidShape { .. })));
        assert!(matches!(AxisExtent::new(Axis::J, -4), Err(LayoutError::InvalidShape { .. })));
    }

    #[test]
    fn test_zip_rejects_malformed_blocks() {
        assert!(AxisExtent::zip(&[], &[]).is_err());
        assert!(AxisExtent::zip(&[Axis::I, Axis::J], &[4]).is_err());
        assert!(AxisExtent::zip(&[Axis::I, Axis::I], &[4, 4]).is_err());

        let block = AxisExtent::zip(&[Axis::J, Axis::I], &[3, 5]).unwrap();
        assert_eq!(block[0], AxisExtent { axis: Axis::J, extent: 3 });
        assert_eq!(block[1], AxisExtent { axis: Axis::I, extent: 5 });
    }
}
