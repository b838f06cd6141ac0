// promobot-core/src/lib.rs

pub mod db;
pub mod repositories;
pub mod services;
pub mod tasks;
pub mod test_utils;

pub use db::Database;
pub use promobot_common::error::Error;
