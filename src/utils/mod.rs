//! Utility modules and shared functionality

pub mod errors;
pub mod fs;
pub mod path;
pub mod text;
