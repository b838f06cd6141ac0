// promobot-core/src/tasks/mod.rs

pub mod epoch_flush;
