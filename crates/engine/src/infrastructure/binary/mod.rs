//! Binary serialization framework.
//!
//! A registry of reusable [`BinaryAdapter`]s keyed by runtime type, plus
//! read/write contexts over byte buffers. The framework knows nothing about
//! dialogues; the dialogue codec is just one registered adapter.
//!
//! Wire conventions: integers and floats are big-endian; strings are
//! length-prefixed UTF-8 with `-1` as the null sentinel; maps are a count
//! followed by key/value pairs encoded through the adapters registered for
//! the key and value types.

mod dialogue_adapter;

pub use dialogue_adapter::DialogueAdapter;

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Malformed or corrupt persisted data. Always fatal to the single read that
/// hit it, never to the process.
#[derive(Debug, Error)]
pub enum DeserializingError {
    #[error("unexpected end of stream: needed {needed} more byte(s)")]
    UnexpectedEof { needed: usize },

    #[error("read negative count {0}")]
    NegativeCount(i32),

    #[error("invalid UTF-8 in string: {0}")]
    InvalidUtf8(String),

    #[error("no adapter registered for type {0}")]
    MissingAdapter(&'static str),

    #[error("missing context data '{0}'")]
    MissingData(String),

    #[error("{0}")]
    Corrupt(String),
}

/// Failure while persisting, wrapping the underlying I/O fault when there is
/// one.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SerializingError {
    message: String,
    #[source]
    source: Option<std::io::Error>,
}

impl SerializingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            message: message.into(),
            source: Some(source),
        }
    }
}

// =============================================================================
// Adapter Registry
// =============================================================================

/// A paired encode/decode implementation for one data kind.
pub trait BinaryAdapter<T>: Send + Sync {
    fn write(
        &self,
        value: &T,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), SerializingError>;

    fn read(&self, ctx: &mut DeserializationContext<'_>) -> Result<T, DeserializingError>;
}

/// Maps a runtime type to its registered adapter.
///
/// `char` and `String` adapters are registered out of the box so the generic
/// map reader/writer can handle prefix-style mappings without further setup.
pub struct BinaryIo {
    adapters: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl BinaryIo {
    pub fn new() -> Self {
        let mut io = Self {
            adapters: HashMap::new(),
        };
        io.register::<char>(Arc::new(CharAdapter));
        io.register::<String>(Arc::new(StringAdapter));
        io
    }

    pub fn register<T: 'static>(&mut self, adapter: Arc<dyn BinaryAdapter<T>>) {
        self.adapters.insert(TypeId::of::<T>(), Box::new(adapter));
    }

    pub(crate) fn adapter<T: 'static>(&self) -> Option<Arc<dyn BinaryAdapter<T>>> {
        self.adapters
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn BinaryAdapter<T>>>())
            .cloned()
    }

    /// Encodes `value` through its registered adapter into a fresh buffer.
    pub fn encode<T: 'static>(&self, value: &T) -> Result<Bytes, SerializingError> {
        let adapter = self.adapter::<T>().ok_or_else(|| {
            SerializingError::new(format!("no adapter registered for type {}", type_name::<T>()))
        })?;
        let mut ctx = SerializationContext::new(self);
        adapter.write(value, &mut ctx)?;
        Ok(ctx.finish())
    }

    /// Decodes a value of type `T` from `bytes`.
    pub fn decode<T: 'static>(&self, bytes: Bytes) -> Result<T, DeserializingError> {
        self.decode_with(bytes, |_| {})
    }

    /// Decodes a value of type `T`, letting the caller seed the context's
    /// side-channel first (for out-of-band data such as a dialogue name that
    /// is derived from storage location rather than stream content).
    pub fn decode_with<T, F>(&self, bytes: Bytes, configure: F) -> Result<T, DeserializingError>
    where
        T: 'static,
        F: FnOnce(&mut DeserializationContext<'_>),
    {
        let adapter = self
            .adapter::<T>()
            .ok_or(DeserializingError::MissingAdapter(type_name::<T>()))?;
        let mut ctx = DeserializationContext::new(self, bytes);
        configure(&mut ctx);
        adapter.read(&mut ctx)
    }
}

impl Default for BinaryIo {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Serialization Context
// =============================================================================

/// Typed primitives over an output byte buffer.
pub struct SerializationContext<'io> {
    io: &'io BinaryIo,
    buf: BytesMut,
}

impl<'io> SerializationContext<'io> {
    fn new(io: &'io BinaryIo) -> Self {
        Self {
            io,
            buf: BytesMut::new(),
        }
    }

    fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_f32(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    /// Length-prefixed UTF-8; `None` is encoded as length `-1`.
    pub fn write_string(&mut self, value: Option<&str>) -> Result<(), SerializingError> {
        match value {
            None => self.write_i32(-1),
            Some(s) => {
                let len = i32::try_from(s.len())
                    .map_err(|_| SerializingError::new("string exceeds i32 length"))?;
                self.write_i32(len);
                self.buf.put_slice(s.as_bytes());
            }
        }
        Ok(())
    }

    /// A single Unicode scalar, encoded as a one-character string.
    pub fn write_char(&mut self, value: char) -> Result<(), SerializingError> {
        let mut tmp = [0u8; 4];
        self.write_string(Some(value.encode_utf8(&mut tmp)))
    }

    /// Count followed by key/value pairs, dispatched through the adapters
    /// registered for `K` and `V`.
    pub fn write_map<K, V>(&mut self, map: &BTreeMap<K, V>) -> Result<(), SerializingError>
    where
        K: 'static,
        V: 'static,
    {
        let count = i32::try_from(map.len())
            .map_err(|_| SerializingError::new("map exceeds i32 entry count"))?;
        self.write_i32(count);

        let key_adapter = self.io.adapter::<K>().ok_or_else(|| {
            SerializingError::new(format!("no adapter registered for type {}", type_name::<K>()))
        })?;
        let value_adapter = self.io.adapter::<V>().ok_or_else(|| {
            SerializingError::new(format!("no adapter registered for type {}", type_name::<V>()))
        })?;

        for (key, value) in map {
            key_adapter.write(key, self)?;
            value_adapter.write(value, self)?;
        }
        Ok(())
    }
}

// =============================================================================
// Deserialization Context
// =============================================================================

/// Mirror of [`SerializationContext`] over an input buffer, with bounds
/// checking and a string-keyed side-channel for out-of-band data.
pub struct DeserializationContext<'io> {
    io: &'io BinaryIo,
    buf: Bytes,
    data: HashMap<String, Box<dyn Any + Send>>,
}

impl<'io> DeserializationContext<'io> {
    fn new(io: &'io BinaryIo, buf: Bytes) -> Self {
        Self {
            io,
            buf,
            data: HashMap::new(),
        }
    }

    /// Seeds the side-channel with a value adapters can retrieve during this
    /// read operation.
    pub fn set_data<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.data.insert(key.into(), Box::new(value));
    }

    /// Retrieves out-of-band data by key; absent keys and type mismatches
    /// both report as missing.
    pub fn data<T: Any + Send>(&self, key: &str) -> Result<&T, DeserializingError> {
        self.data
            .get(key)
            .and_then(|entry| entry.downcast_ref::<T>())
            .ok_or_else(|| DeserializingError::MissingData(key.to_string()))
    }

    fn ensure(&self, needed: usize) -> Result<(), DeserializingError> {
        let remaining = self.buf.remaining();
        if remaining < needed {
            return Err(DeserializingError::UnexpectedEof {
                needed: needed - remaining,
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DeserializingError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_i32(&mut self) -> Result<i32, DeserializingError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    pub fn read_f32(&mut self) -> Result<f32, DeserializingError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32())
    }

    pub fn read_f64(&mut self) -> Result<f64, DeserializingError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    /// A non-negative count prefix; negatives are corrupt data.
    pub fn read_count(&mut self) -> Result<usize, DeserializingError> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(DeserializingError::NegativeCount(count));
        }
        Ok(count as usize)
    }

    /// Length-prefixed UTF-8; length `-1` reads as `None`.
    pub fn read_string(&mut self) -> Result<Option<String>, DeserializingError> {
        let len = self.read_i32()?;
        if len == -1 {
            return Ok(None);
        }
        if len < 0 {
            return Err(DeserializingError::NegativeCount(len));
        }
        let len = len as usize;
        self.ensure(len)?;
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec())
            .map(Some)
            .map_err(|e| DeserializingError::InvalidUtf8(e.to_string()))
    }

    /// A single Unicode scalar; null, empty, and multi-codepoint strings are
    /// all rejected as corrupt.
    pub fn read_char(&mut self) -> Result<char, DeserializingError> {
        let value = self.read_string()?.ok_or_else(|| {
            DeserializingError::Corrupt("expected single-character string, read null".to_string())
        })?;
        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(DeserializingError::Corrupt(format!(
                "expected single-character string, read {value:?}"
            ))),
        }
    }

    /// Count-prefixed key/value pairs, dispatched through the adapters
    /// registered for `K` and `V`.
    pub fn read_map<K, V>(&mut self) -> Result<BTreeMap<K, V>, DeserializingError>
    where
        K: Ord + 'static,
        V: 'static,
    {
        let count = self.read_count()?;

        let key_adapter = self
            .io
            .adapter::<K>()
            .ok_or(DeserializingError::MissingAdapter(type_name::<K>()))?;
        let value_adapter = self
            .io
            .adapter::<V>()
            .ok_or(DeserializingError::MissingAdapter(type_name::<V>()))?;

        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = key_adapter.read(self)?;
            let value = value_adapter.read(self)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

// =============================================================================
// Built-in Adapters
// =============================================================================

struct CharAdapter;

impl BinaryAdapter<char> for CharAdapter {
    fn write(
        &self,
        value: &char,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), SerializingError> {
        ctx.write_char(*value)
    }

    fn read(&self, ctx: &mut DeserializationContext<'_>) -> Result<char, DeserializingError> {
        ctx.read_char()
    }
}

struct StringAdapter;

impl BinaryAdapter<String> for StringAdapter {
    fn write(
        &self,
        value: &String,
        ctx: &mut SerializationContext<'_>,
    ) -> Result<(), SerializingError> {
        ctx.write_string(Some(value))
    }

    fn read(&self, ctx: &mut DeserializationContext<'_>) -> Result<String, DeserializingError> {
        ctx.read_string()?.ok_or_else(|| {
            DeserializingError::Corrupt("unexpected null string in map entry".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_map(map: &BTreeMap<char, String>) -> BTreeMap<char, String> {
        let io = BinaryIo::new();
        let mut ctx = SerializationContext::new(&io);
        ctx.write_map(map).expect("write map");
        let bytes = ctx.finish();

        let mut rctx = DeserializationContext::new(&io, bytes);
        rctx.read_map().expect("read map")
    }

    #[test]
    fn primitives_roundtrip() {
        let io = BinaryIo::new();
        let mut ctx = SerializationContext::new(&io);
        ctx.write_u8(0xAB);
        ctx.write_i32(-42);
        ctx.write_f32(1.5);
        ctx.write_f64(-2.25);
        let bytes = ctx.finish();

        let mut rctx = DeserializationContext::new(&io, bytes);
        assert_eq!(rctx.read_u8().expect("u8"), 0xAB);
        assert_eq!(rctx.read_i32().expect("i32"), -42);
        assert_eq!(rctx.read_f32().expect("f32"), 1.5);
        assert_eq!(rctx.read_f64().expect("f64"), -2.25);
    }

    #[test]
    fn null_string_uses_sentinel() {
        let io = BinaryIo::new();
        let mut ctx = SerializationContext::new(&io);
        ctx.write_string(None).expect("write null");
        ctx.write_string(Some("héllo")).expect("write text");
        let bytes = ctx.finish();

        let mut rctx = DeserializationContext::new(&io, bytes);
        assert_eq!(rctx.read_string().expect("null"), None);
        assert_eq!(rctx.read_string().expect("text").as_deref(), Some("héllo"));
    }

    #[test]
    fn truncated_stream_is_eof() {
        let io = BinaryIo::new();
        let mut rctx = DeserializationContext::new(&io, Bytes::from_static(&[0x00, 0x01]));
        let err = rctx.read_i32().expect_err("short read");
        assert!(matches!(err, DeserializingError::UnexpectedEof { needed: 2 }));
    }

    #[test]
    fn string_length_overruns_buffer() {
        let io = BinaryIo::new();
        // Claims 100 bytes of text, provides none.
        let mut rctx = DeserializationContext::new(&io, Bytes::from_static(&[0, 0, 0, 100]));
        let err = rctx.read_string().expect_err("overrun");
        assert!(matches!(err, DeserializingError::UnexpectedEof { .. }));
    }

    #[test]
    fn negative_count_is_rejected() {
        let io = BinaryIo::new();
        let mut rctx =
            DeserializationContext::new(&io, Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0xFE]));
        let err = rctx.read_count().expect_err("negative count");
        assert!(matches!(err, DeserializingError::NegativeCount(-2)));
    }

    #[test]
    fn multi_codepoint_char_is_corrupt() {
        let io = BinaryIo::new();
        let mut ctx = SerializationContext::new(&io);
        ctx.write_string(Some("ab")).expect("write");
        let bytes = ctx.finish();

        let mut rctx = DeserializationContext::new(&io, bytes);
        let err = rctx.read_char().expect_err("two codepoints");
        assert!(matches!(err, DeserializingError::Corrupt(_)));
    }

    #[test]
    fn map_roundtrips_through_registered_adapters() {
        let mut map = BTreeMap::new();
        map.insert('!', "[Guard] ".to_string());
        map.insert('é', "[Élise] ".to_string());

        assert_eq!(roundtrip_map(&map), map);
        assert_eq!(roundtrip_map(&BTreeMap::new()), BTreeMap::new());
    }

    #[test]
    fn missing_adapter_reports_type_name() {
        let io = BinaryIo::new();
        let err = io.encode(&7u64).expect_err("no u64 adapter");
        assert!(err.to_string().contains("u64"));

        let err = io
            .decode::<u64>(Bytes::new())
            .expect_err("no u64 adapter");
        assert!(matches!(err, DeserializingError::MissingAdapter(_)));
    }

    #[test]
    fn side_channel_is_typed() {
        let io = BinaryIo::new();
        let mut ctx = DeserializationContext::new(&io, Bytes::new());
        ctx.set_data("name", "npc.greeting".to_string());

        let name: &String = ctx.data("name").expect("present");
        assert_eq!(name, "npc.greeting");
        assert!(matches!(
            ctx.data::<i32>("name"),
            Err(DeserializingError::MissingData(_))
        ));
        assert!(matches!(
            ctx.data::<String>("other"),
            Err(DeserializingError::MissingData(_))
        ));
    }
}
