//! Backend worker: owns the screen controller and runs API work off the UI thread.

pub mod commands;
pub mod runtime;
