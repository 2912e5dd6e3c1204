pub mod block_mapper;
pub mod block_store;
pub mod calendar_store;
pub mod config;
pub mod error;
pub mod logging;
pub mod save_queue;
