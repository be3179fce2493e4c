//! Frame conversions between the traffic and physics backends
//!
//! Traffic frame: y up, heading measured from +y towards +x.
//! Physics frame: left-handed, y mirrored, heading measured from +x
//! towards +y. States are rows `[x, y, speed, heading_rad, ...]`.

use std::f64::consts::FRAC_PI_2;
use std::ops::IndexMut;

use nalgebra::{DMatrix, Rotation2, Vector2};

use crate::common::{CoDrivingError, CoDrivingResult};

/// Column of the y coordinate in a state row
pub const STATE_Y: usize = 1;
/// Column of the heading (radians) in a state row
pub const STATE_HEADING: usize = 3;

fn check_width(width: usize) -> CoDrivingResult<()> {
    if width <= STATE_HEADING {
        return Err(CoDrivingError::Config(format!(
            "state row has {} components, expected at least {}", width, STATE_HEADING + 1
        )));
    }
    Ok(())
}

fn check_len(data: &[f64], expected: usize) -> CoDrivingResult<()> {
    if data.len() < expected {
        return Err(CoDrivingError::Config(format!(
            "state tensor holds {} values, shape needs {}", data.len(), expected
        )));
    }
    Ok(())
}

fn convert_row<R: IndexMut<usize, Output = f64> + ?Sized>(row: &mut R) {
    row[STATE_Y] = -row[STATE_Y];
    row[STATE_HEADING] -= FRAC_PI_2;
}

/// In-place traffic -> physics conversion of a row-major state tensor.
///
/// `shape` of rank 1 is a single state, rank 2 a batch of rows; any other
/// rank is rejected.
pub fn to_secondary_frame(shape: &[usize], data: &mut [f64]) -> CoDrivingResult<()> {
    match *shape {
        [width] => {
            check_width(width)?;
            check_len(data, width)?;
            convert_row(&mut data[..width]);
            Ok(())
        }
        [rows, width] => {
            check_width(width)?;
            check_len(data, rows * width)?;
            for row in data[..rows * width].chunks_exact_mut(width) {
                convert_row(row);
            }
            Ok(())
        }
        _ => Err(CoDrivingError::UnsupportedRank(shape.len())),
    }
}

/// In-place traffic -> physics conversion of every row of a state matrix
pub fn batch_to_secondary_frame(states: &mut DMatrix<f64>) -> CoDrivingResult<()> {
    check_width(states.ncols())?;
    for mut row in states.row_iter_mut() {
        convert_row(&mut row);
    }
    Ok(())
}

/// Rotate an agent-local displacement into the global frame.
///
/// The predictor's local frame is offset a quarter turn from the heading,
/// so the rotation angle is `yaw - pi/2`.
pub fn rotate_local_to_global(local_delta: Vector2<f64>, yaw: f64) -> Vector2<f64> {
    Rotation2::new(yaw - FRAC_PI_2) * local_delta
}
