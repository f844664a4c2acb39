//! Decoder plumbing for polyarc: byte streams, codec keys, the decoder
//! contract and the decoders bundled with the crate.
//!
//! # Architecture
//!
//! - `key.rs` - Codec identifiers
//! - `stream.rs` - Rewindable archive streams and their sources
//! - `decoder.rs` - The decoder contract and its callbacks
//! - `registry.rs` - Key to decoder instantiation
//! - `decoders/` - Bundled zip, 7z, tar and single-stream decoders

pub use decoder::{
    DecoderInstance, ExtractSink, Flow, OpenCallback, PasswordPrompt, PropValue, PropertyKind,
};
pub use error::{CodecError, DecoderError, Result};
pub use key::CodecKey;
pub use registry::{BuiltinRegistry, CodecRegistry, handler};
pub use stream::{ArchiveStream, FileSource, MemorySource, StreamSource, stream_len};

pub mod decoder;
pub mod decoders;
mod error;
mod key;
pub mod registry;
pub mod stream;
