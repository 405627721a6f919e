pub mod item_types;
pub mod map;
pub mod pathfinding;
pub mod position;
pub mod seed;
pub mod state;
pub mod time;
pub mod viewport;
