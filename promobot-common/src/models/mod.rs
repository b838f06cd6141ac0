// promobot-common/src/models/mod.rs

pub mod epoch;
pub mod user;

pub use epoch::{Epoch, EpochTier, MAX_EPOCH, REWARD_TABLE};
pub use user::User;
