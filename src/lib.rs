// Kagami image derivative proxy library

pub mod cache;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod proxy;
pub mod router;
pub mod store;
pub mod transform;
