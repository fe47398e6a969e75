use crate::error::Error;

/// Maximum number of axes a blob may have.
pub const MAX_BLOB_AXES: usize = 32;

/// Resolve a possibly negative axis against `num_axes`.
/// Negative values index from the end; the result lies in `[0, num_axes)`.
pub fn canonical_axis_index(axis: isize, num_axes: usize) -> Result<usize, Error> {
    let rank = num_axes as isize;
    if axis < -rank || axis >= rank {
        return Err(Error::AxisOutOfRange { axis, num_axes });
    }
    Ok(if axis < 0 {
        (axis + rank) as usize
    } else {
        axis as usize
    })
}

/// Product of `shape[start..end]`. An empty range yields 1.
pub fn count_range(shape: &[usize], start: usize, end: usize) -> Result<usize, Error> {
    if start > end || end > shape.len() {
        return Err(Error::InvalidAxisRange {
            start,
            end,
            num_axes: shape.len(),
        });
    }
    checked_count(&shape[start..end])
}

/// Product of all dimensions, rejecting shapes whose size overflows `usize`.
pub fn checked_count(shape: &[usize]) -> Result<usize, Error> {
    shape
        .iter()
        .try_fold(1usize, |acc, &x| acc.checked_mul(x))
        .ok_or_else(|| Error::ShapeError(format!("Shape {:?} overflows usize", shape)))
}

/// Formats a shape like `2 3 4 (24)` for log output.
pub fn shape_string(shape: &[usize]) -> String {
    let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    let count: usize = shape.iter().product();
    format!("{} ({})", dims.join(" "), count)
}
