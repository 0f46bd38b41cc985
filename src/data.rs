use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Contiguous column major matrix view over borrowed data.
///
/// This structure holds a dense matrix of values in a single contiguous
/// memory block in column-major order (Fortran-style), which allows for
/// efficient column slicing. It is the input container for the calibration
/// routines: no data is copied until a working buffer is needed.
pub struct Matrix<'a, T> {
    /// The raw data stored in a single slice, column by column.
    pub data: &'a [T],
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
}

impl<'a, T> Matrix<'a, T> {
    /// Create a new Matrix over borrowed column-major data.
    ///
    /// * `data` - The raw values, `rows * cols` of them.
    /// * `rows` - Number of rows.
    /// * `cols` - Number of columns.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        assert_eq!(data.len(), rows * cols, "data length must equal rows * cols");
        Matrix { data, rows, cols }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[j * self.rows + i]
    }

    /// Get an entire column in the matrix.
    pub fn get_col(&self, col: usize) -> &[T] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }

    /// Get access to a row of the data, as an iterator.
    pub fn get_row_iter(&self, row: usize) -> std::iter::StepBy<std::iter::Skip<std::slice::Iter<'a, T>>> {
        self.data.iter().skip(row).step_by(self.rows)
    }
}

impl<'a, T> Matrix<'a, T>
where
    T: Copy,
{
    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<T> {
        self.get_row_iter(row).copied().collect()
    }
}

impl<'a, T> fmt::Display for Matrix<'a, T>
where
    T: Display,
{
    /// Format a Matrix.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut val = String::new();
        for i in 0..self.rows {
            for j in 0..self.cols {
                val.push_str(self.get(i, j).to_string().as_str());
                if j == (self.cols - 1) {
                    val.push('\n');
                } else {
                    val.push(' ');
                }
            }
        }
        write!(f, "{}", val)
    }
}

/// An owned column major matrix.
///
/// This is the working buffer of the projection engine and the container
/// returned to the user: calibrated matrices keep the same layout as the
/// borrowed [`Matrix`] input so the two can be compared column by column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix<T> {
    /// The raw data in column-major order.
    pub data: Vec<T>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl<T> DenseMatrix<T> {
    /// Create a new DenseMatrix from column-major data.
    pub fn new(data: Vec<T>, rows: usize, cols: usize) -> Self {
        assert_eq!(data.len(), rows * cols, "data length must equal rows * cols");
        DenseMatrix { data, rows, cols }
    }

    /// Get a single reference to an item in the matrix.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[j * self.rows + i]
    }

    /// Get a mutable reference to an item in the matrix.
    pub fn get_mut(&mut self, i: usize, j: usize) -> &mut T {
        &mut self.data[j * self.rows + i]
    }

    /// Get an entire column in the matrix.
    pub fn get_col(&self, col: usize) -> &[T] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }

    /// Get a mutable slice of an entire column in the matrix.
    pub fn get_col_mut(&mut self, col: usize) -> &mut [T] {
        &mut self.data[col * self.rows..(col + 1) * self.rows]
    }

    /// Get access to a row of the data, as an iterator.
    pub fn get_row_iter(&self, row: usize) -> std::iter::StepBy<std::iter::Skip<std::slice::Iter<'_, T>>> {
        self.data.iter().skip(row).step_by(self.rows)
    }
}

impl<T> DenseMatrix<T>
where
    T: Copy,
{
    /// Create a matrix with every entry set to `value`.
    pub fn filled(value: T, rows: usize, cols: usize) -> Self {
        DenseMatrix {
            data: vec![value; rows * cols],
            rows,
            cols,
        }
    }

    /// Copy a borrowed [`Matrix`] into an owned buffer.
    pub fn from_matrix(m: &Matrix<T>) -> Self {
        DenseMatrix {
            data: m.data.to_vec(),
            rows: m.rows,
            cols: m.cols,
        }
    }

    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<T> {
        self.get_row_iter(row).copied().collect()
    }
}
