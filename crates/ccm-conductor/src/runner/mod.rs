pub mod audit;
pub mod event_log;
