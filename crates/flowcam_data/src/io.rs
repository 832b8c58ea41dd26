//! I/O utilities for reading flow-field patches.

use std::path::Path;

use ndarray::{s, Array3};

use crate::error::{DataError, Result};
use crate::flow::FlowField;

/// Read a raw 3-D array from a NumPy `.npy` file.
///
/// Accepts `f32` data, or `f64` data converted to `f32`.
pub fn read_npy<P: AsRef<Path>>(path: P) -> Result<Array3<f32>> {
    use ndarray_npy::ReadNpyExt;

    let file = std::fs::File::open(path.as_ref())?;
    let reader = std::io::BufReader::new(file);

    // Try reading as f32 first
    match Array3::<f32>::read_npy(reader) {
        Ok(arr) => Ok(arr),
        Err(e) => {
            let file = std::fs::File::open(path.as_ref())?;
            let reader = std::io::BufReader::new(file);
            let arr_f64: Array3<f64> = Array3::<f64>::read_npy(reader)
                .map_err(|_| DataError::FormatError(format!("Failed to read npy file: {}", e)))?;
            Ok(arr_f64.mapv(|x| x as f32))
        }
    }
}

/// Read a flow field stored as a `(component, row, col)` stack.
///
/// Component 0 is the horizontal velocity `U`, component 1 the vertical
/// velocity `V`. Extra components are ignored.
///
/// # Errors
///
/// Returns [`DataError::InvalidShape`] if the file holds fewer than two
/// components or an empty grid.
pub fn read_flow_npy<P: AsRef<Path>>(path: P) -> Result<FlowField> {
    let path = path.as_ref();
    let stack = read_npy(path)?;
    let (components, rows, cols) = stack.dim();

    if components < 2 {
        return Err(DataError::InvalidShape {
            path: path.to_path_buf(),
            reason: format!("expected at least 2 velocity components, got {}", components),
        });
    }
    if rows == 0 || cols == 0 {
        return Err(DataError::InvalidShape {
            path: path.to_path_buf(),
            reason: format!("empty {}x{} grid", rows, cols),
        });
    }

    let u = stack.slice(s![0, .., ..]).to_owned();
    let v = stack.slice(s![1, .., ..]).to_owned();
    FlowField::new(u, v)
}

/// Write a flow field as a `(2, rows, cols)` `f32` stack.
pub fn write_flow_npy<P: AsRef<Path>>(path: P, field: &FlowField) -> Result<()> {
    use ndarray_npy::WriteNpyExt;

    let (rows, cols) = field.dim();
    let mut stack = Array3::<f32>::zeros((2, rows, cols));
    stack.slice_mut(s![0, .., ..]).assign(field.u());
    stack.slice_mut(s![1, .., ..]).assign(field.v());

    let file = std::fs::File::create(path.as_ref())?;
    let writer = std::io::BufWriter::new(file);
    stack
        .write_npy(writer)
        .map_err(|e| DataError::FormatError(format!("Failed to write npy file: {}", e)))
}
