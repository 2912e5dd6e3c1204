pub mod calendar;
pub mod density;
pub mod drag;
pub mod models;
pub mod overlap;
pub mod slot_grid;
