use crate::components::{ConfigurationError, Matrix, MatrixRef, TileRole};

/// Multiplies two matrices with a plain triple loop on the host.
pub fn matmul_reference(lhs: MatrixRef<'_>, rhs: MatrixRef<'_>) -> Result<Matrix, ConfigurationError> {
    if lhs.cols() != rhs.rows() {
        return Err(ConfigurationError::ShapeMismatch {
            operand: TileRole::Rhs,
            expected: (lhs.cols(), rhs.cols()),
            actual: (rhs.rows(), rhs.cols()),
        });
    }

    let reduce = lhs.cols();
    Ok(Matrix::from_fn(lhs.rows(), rhs.cols(), |row, col| {
        (0..reduce)
            .map(|t| lhs.row(row)[t] * rhs.row(t)[col])
            .sum()
    }))
}

/// Asserts that two matrices are equal within `epsilon`, reporting the first differing entry.
///
/// # Panics
/// Panics if the shapes differ or an entry differs by more than `epsilon`.
pub fn assert_equals_approx(expected: &Matrix, actual: &Matrix, epsilon: f32) {
    assert_eq!(
        (expected.rows(), expected.cols()),
        (actual.rows(), actual.cols()),
        "Shapes differ"
    );

    for (i, (e, a)) in expected.data().iter().zip(actual.data()).enumerate() {
        let (row, col) = (i / expected.cols(), i % expected.cols());
        // Relative for large values.
        let tolerance = epsilon * e.abs().max(1.0);
        assert!(
            (e - a).abs() <= tolerance,
            "Values differ at ({row}, {col}): expected {e}, got {a} (tolerance {tolerance})\nexpected:\n{expected}\nactual:\n{actual}"
        );
    }
}
