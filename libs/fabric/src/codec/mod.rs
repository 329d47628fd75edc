use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub mod json;
pub mod raw;

pub use self::json::JsonCodec;
pub use self::raw::RawCodec;

/// Codec trait for turning request payloads into frame text and back
pub trait Codec: Send + Sync {
    /// Encode a value into the text carried after the tag
    fn encode<T: Serialize>(&self, value: &T) -> Result<String>;

    /// Decode response data into a value
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T>;
}
