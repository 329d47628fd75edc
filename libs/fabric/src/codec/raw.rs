use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::de::{DeserializeOwned, IntoDeserializer};
use serde::Serialize;
use serde_json::Value;

use crate::codec::Codec;
use crate::error::{Error, Result};

/// Raw codec that passes pre-serialized text through untouched
///
/// Only works with string values
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String> {
        match serde_json::to_value(value).map_err(|e| Error::Codec(e.to_string()))? {
            Value::String(text) => Ok(text),
            other => Err(Error::Codec(format!(
                "raw codec only carries strings, got {}",
                other
            ))),
        }
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        let deserializer: StrDeserializer<'_, ValueError> = text.into_deserializer();
        T::deserialize(deserializer).map_err(|e| Error::Codec(e.to_string()))
    }
}
