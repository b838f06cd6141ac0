// promobot-core/src/repositories/postgres/mod.rs

pub mod epoch;
pub mod user;
