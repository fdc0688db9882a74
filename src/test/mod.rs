mod catalog;
mod config;
mod context;
mod utils;

pub use utils::{test_db, test_utils};
