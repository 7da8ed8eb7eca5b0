pub mod channel;
pub mod config;
pub mod handler;
pub mod message;
pub mod payload;
pub mod server;
pub mod value;

pub use channel::{ChannelError, MethodCallHandler, MethodChannel, MethodChannelClient};
pub use config::ChannelConfig;
pub use handler::PpeMethodHandler;
pub use message::{ErrorCode, MethodCall, MethodError, MethodResponse};
pub use value::EncodableValue;
