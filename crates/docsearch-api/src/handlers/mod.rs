//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod documents;
pub mod health;
pub mod search;
pub mod stats;
