pub mod config;
pub mod logging;
pub mod startup;
pub mod sync;
