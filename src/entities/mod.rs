pub mod creature;
pub mod item;
pub mod stats;
