pub mod backoff;
pub mod initializer;

pub use backoff::{ExponentialBackoff, FixedBackoff, ReconnectBackoff};
pub use initializer::{
    Connector, DEFAULT_MAX_RECONNECT, ResilientInitializer, acquire_and_register, acquire_store,
};
