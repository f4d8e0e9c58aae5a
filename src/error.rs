use thiserror::Error;

/// Input the tracker refuses. These never change any state.
#[derive(Debug, Error, PartialEq)]
pub enum TrackerError {
    #[error("Please enter an activity name")]
    EmptyActivity,
    #[error("Hourly rate must be a non-negative number, got {0}")]
    InvalidRate(f64),
}
