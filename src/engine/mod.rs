pub mod context;
pub mod error;
pub mod event;
pub mod expedite;
pub mod notification;
pub mod outcome;
pub mod rng;
pub mod scheduler;
