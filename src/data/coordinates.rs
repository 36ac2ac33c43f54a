//! Geometry/coordinates storage for mesh nodes.
//!
//! Coordinates are stored axis-major: one array of length `num_nodes` per
//! spatial axis, matching the layout the codec reads and writes. Element
//! blocks borrow this view to gather element geometry.

use crate::mesh_error::MeshError;

/// Axis-major nodal coordinates with an attached dimension.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Coordinates {
    axes: Vec<Vec<f64>>,
    names: Vec<String>,
}

impl Coordinates {
    /// Builds coordinates from one array per axis.
    ///
    /// Axis names default to `x`, `y`, `z` when `names` is empty.
    ///
    /// # Errors
    /// `InvalidDimension` unless there are 2 or 3 axes; `CountMismatch` when
    /// axes differ in length or the name count differs from the axis count.
    pub fn try_new(axes: Vec<Vec<f64>>, names: Vec<String>) -> Result<Self, MeshError> {
        let dim = axes.len();
        if !(2..=3).contains(&dim) {
            return Err(MeshError::InvalidDimension(dim));
        }
        let num_nodes = axes[0].len();
        for (axis, values) in axes.iter().enumerate().skip(1) {
            if values.len() != num_nodes {
                return Err(MeshError::count_mismatch(
                    format!("coordinate axis {axis}"),
                    num_nodes,
                    values.len(),
                ));
            }
        }
        let names = if names.is_empty() {
            default_axis_names(dim)
        } else if names.len() != dim {
            return Err(MeshError::count_mismatch("coordinate names", dim, names.len()));
        } else {
            names
        };
        Ok(Self { axes, names })
    }

    /// Returns the spatial dimension (number of axes).
    #[inline]
    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    /// Number of nodes covered by the arrays.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.axes.first().map_or(0, Vec::len)
    }

    /// Axis names in axis order.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Read-only view of one axis array.
    #[inline]
    pub fn axis(&self, axis: usize) -> Option<&[f64]> {
        self.axes.get(axis).map(Vec::as_slice)
    }

    /// All axis arrays, axis-major.
    #[inline]
    pub fn axes(&self) -> &[Vec<f64>] {
        &self.axes
    }

    /// Mutable view of one axis array, for geometric morphing.
    ///
    /// The array length is fixed; only values may change.
    #[inline]
    pub fn axis_mut(&mut self, axis: usize) -> Option<&mut [f64]> {
        self.axes.get_mut(axis).map(Vec::as_mut_slice)
    }

    /// Coordinate tuple of the node at local `index`.
    pub fn try_point(&self, index: usize) -> Result<Vec<f64>, MeshError> {
        let len = self.num_nodes();
        if index >= len {
            return Err(MeshError::NodeIndexOutOfRange { index, len });
        }
        Ok(self.axes.iter().map(|axis| axis[index]).collect())
    }

    /// Overwrites the coordinate tuple of the node at local `index`.
    pub fn try_set_point(&mut self, index: usize, point: &[f64]) -> Result<(), MeshError> {
        let len = self.num_nodes();
        if index >= len {
            return Err(MeshError::NodeIndexOutOfRange { index, len });
        }
        if point.len() != self.dimension() {
            return Err(MeshError::count_mismatch(
                format!("coordinates of node {index}"),
                self.dimension(),
                point.len(),
            ));
        }
        for (axis, &value) in self.axes.iter_mut().zip(point) {
            axis[index] = value;
        }
        Ok(())
    }
}

fn default_axis_names(dim: usize) -> Vec<String> {
    ["x", "y", "z"]
        .iter()
        .take(dim)
        .map(|name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_axes() {
        let err = Coordinates::try_new(vec![vec![0.0, 1.0], vec![0.0]], vec![]).unwrap_err();
        assert!(matches!(err, MeshError::CountMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn rejects_one_dimensional_meshes() {
        let err = Coordinates::try_new(vec![vec![0.0]], vec![]).unwrap_err();
        assert_eq!(err, MeshError::InvalidDimension(1));
    }

    #[test]
    fn point_gathers_across_axes() {
        let mut coords = Coordinates::try_new(
            vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0]],
            vec![],
        )
        .unwrap();
        assert_eq!(coords.names(), ["x", "y", "z"]);
        assert_eq!(coords.try_point(1).unwrap(), vec![1.0, 3.0, 5.0]);
        coords.try_set_point(1, &[9.0, 8.0, 7.0]).unwrap();
        assert_eq!(coords.axis(2).unwrap(), &[4.0, 7.0]);
        assert!(coords.try_point(2).is_err());
    }
}
