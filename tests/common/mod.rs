#![allow(dead_code)]

pub mod fake_tracker;
pub mod strategies;

pub use fake_tracker::*;
pub use strategies::*;
