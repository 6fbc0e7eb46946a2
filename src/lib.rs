pub mod assignment;
pub mod audit;
pub mod config;
pub mod directory;
pub mod engine;
pub mod store;
pub mod tickets;
