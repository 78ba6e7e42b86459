mod server;

pub use server::{DispatchConfig, LifecycleConfig, ServerConfig};
