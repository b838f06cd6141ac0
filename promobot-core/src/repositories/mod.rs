// promobot-core/src/repositories/mod.rs

pub mod postgres;

pub use postgres::epoch::{EpochRepository, PostgresEpochRepository};
pub use postgres::user::{PostgresUserRepository, UserRepository};
