//! Gap filling and anomaly flagging for daily weather series.
//!
//! [`impute::fill`] completes one field's series by linear interpolation or a
//! local moving average. [`anomaly::detect`] flags the points of a series that
//! lie more than a configurable number of standard deviations from its mean.
//! Both are pure functions over in-memory slices; [`manager`] wires them to
//! record files for the command-line tool.

pub mod anomaly;
pub mod config;
pub mod impute;
pub mod manager;
pub mod model;
pub mod report;
pub mod stats;
