// promobot-core/src/services/mod.rs

pub mod epoch_monitor;
pub mod redemption;
pub mod user_service;

pub use epoch_monitor::EpochMonitor;
pub use redemption::RedemptionService;
pub use user_service::UserService;
