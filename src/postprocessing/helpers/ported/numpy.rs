/* PORTED NUMPY / SCIPY FUNCTIONS */

/// Calculate the global max value in a 2D array. This is equivalent to numpy.max,
/// except that NaNs are ignored and an empty array yields negative infinity.
pub fn global_max(array: &[Vec<f32>]) -> f32 {
    array
        .iter()
        .flat_map(|row| row.iter())
        .fold(f32::NEG_INFINITY, |max, &value| max.max(value))
}

/// Returns the (row, column) of the maximum element, the first one on ties.
/// Equivalent to `np.unravel_index(np.argmax(array), array.shape)`.
pub fn arg_max_2d(array: &[Vec<f32>]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize, f32)> = None;
    for (row_idx, row) in array.iter().enumerate() {
        for (col_idx, &value) in row.iter().enumerate() {
            if value.is_nan() {
                continue;
            }
            if best.map_or(true, |(_, _, max)| value > max) {
                best = Some((row_idx, col_idx, value));
            }
        }
    }
    best.map(|(row, col, _)| (row, col))
}

/// Returns the locations, in row-major order, of elements at or above `threshold`.
///
/// # Returns
///
/// * A pair of vectors with the first representing axis 0 and the second representing axis 1.
pub fn where_at_least(arr2d: &[Vec<f32>], threshold: f32) -> (Vec<usize>, Vec<usize>) {
    let mut rows = Vec::new();
    let mut cols = Vec::new();

    for (i, row) in arr2d.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            if value >= threshold {
                rows.push(i);
                cols.push(j);
            }
        }
    }

    (rows, cols)
}

/// Relative maxima along axis 0, matching `scipy.signal.argrelmax(data, axis=0, order)`.
///
/// A point is a maximum when it is strictly greater than every point up to
/// `order` rows away. Out-of-range neighbours are clipped to the edge, so the
/// first and last rows never qualify.
///
/// # Returns
///
/// * The (row, column) of each maximum.
pub fn arg_rel_max(array: &[Vec<f32>], order: usize) -> Vec<(usize, usize)> {
    let n_rows = array.len();
    let mut result = Vec::new();
    if n_rows == 0 {
        return result;
    }

    for (row, values) in array.iter().enumerate() {
        for (col, &value) in values.iter().enumerate() {
            let is_rel_max = (1..=order).all(|shift| {
                let plus = (row + shift).min(n_rows - 1);
                let minus = row.saturating_sub(shift);
                value > array[plus][col] && value > array[minus][col]
            });

            if is_rel_max {
                result.push((row, col));
            }
        }
    }

    result
}
