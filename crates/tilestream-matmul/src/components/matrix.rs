use super::ConfigurationError;

/// A dense row-major matrix of `f32` owned by the host.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f32) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Builds a matrix by evaluating `func(row, col)` for every entry.
    pub fn from_fn<F: FnMut(usize, usize) -> f32>(rows: usize, cols: usize, mut func: F) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                data.push(func(row, col));
            }
        }

        Self { rows, cols, data }
    }

    /// A matrix whose entries are their row-major index: `0, 1, 2, ...`.
    pub fn sequential(rows: usize, cols: usize) -> Self {
        Self::from_fn(rows, cols, |row, col| (row * cols + col) as f32)
    }

    /// Wraps row-major data, which must hold exactly `rows * cols` elements.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, ConfigurationError> {
        check_len(rows, cols, data.len())?;

        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns the entry at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the position is out of bounds.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        assert!(row < self.rows && col < self.cols, "({row}, {col}) is out of bounds");
        self.data[row * self.cols + col]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Borrows the matrix as an input of the matmul.
    pub fn view(&self) -> MatrixRef<'_> {
        MatrixRef {
            data: &self.data,
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Borrows the matrix as the output of the matmul.
    pub fn view_mut(&mut self) -> MatrixMut<'_> {
        MatrixMut {
            data: &mut self.data,
            rows: self.rows,
            cols: self.cols,
        }
    }
}

impl core::fmt::Display for Matrix {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for row in self.data.chunks(self.cols.max(1)) {
            for value in row {
                write!(f, "{value:8.2}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

/// A read-only row-major matrix borrowed from the caller.
#[derive(Clone, Copy, Debug)]
pub struct MatrixRef<'a> {
    data: &'a [f32],
    rows: usize,
    cols: usize,
}

impl<'a> MatrixRef<'a> {
    /// Borrows row-major data, which must hold exactly `rows * cols` elements.
    pub fn new(data: &'a [f32], rows: usize, cols: usize) -> Result<Self, ConfigurationError> {
        check_len(rows, cols, data.len())?;

        Ok(Self { data, rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The elements of one row.
    pub fn row(&self, row: usize) -> &'a [f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn data(&self) -> &'a [f32] {
        self.data
    }
}

/// A mutable row-major matrix borrowed from the caller.
#[derive(Debug)]
pub struct MatrixMut<'a> {
    data: &'a mut [f32],
    rows: usize,
    cols: usize,
}

impl<'a> MatrixMut<'a> {
    /// Borrows row-major data, which must hold exactly `rows * cols` elements.
    pub fn new(data: &'a mut [f32], rows: usize, cols: usize) -> Result<Self, ConfigurationError> {
        check_len(rows, cols, data.len())?;

        Ok(Self { data, rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The elements of one row.
    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }
}

fn check_len(rows: usize, cols: usize, actual: usize) -> Result<(), ConfigurationError> {
    let expected = rows
        .checked_mul(cols)
        .ok_or(ConfigurationError::MatrixTooLarge { rows, cols })?;
    if expected != actual {
        return Err(ConfigurationError::LengthMismatch { expected, actual });
    }

    Ok(())
}
