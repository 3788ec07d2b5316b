pub mod batch;
pub mod board;
pub mod calibration;
pub mod config;
pub mod display;
pub mod error;
pub mod live;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};
