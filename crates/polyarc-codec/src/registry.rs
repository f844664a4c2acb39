use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::decoder::DecoderInstance;
use crate::error::CodecError;
use crate::key::CodecKey;

/// Handler ids of the archive formats a registry may be asked for.
pub mod handler {
    pub const ZIP: u8 = 0x01;
    pub const BZIP2: u8 = 0x02;
    pub const RAR: u8 = 0x03;
    pub const ARJ: u8 = 0x04;
    pub const Z: u8 = 0x05;
    pub const LZH: u8 = 0x06;
    pub const SEVEN_ZIP: u8 = 0x07;
    pub const CAB: u8 = 0x08;
    pub const NSIS: u8 = 0x09;
    pub const LZMA: u8 = 0x0A;
    pub const LZMA86: u8 = 0x0B;
    pub const XZ: u8 = 0x0C;
    pub const PPMD: u8 = 0x0D;
    pub const RAR5: u8 = 0xCC;
    pub const ISO: u8 = 0xE7;
    pub const CHM: u8 = 0xE9;
    pub const TAR: u8 = 0xEE;
    pub const GZIP: u8 = 0xEF;
}

/// Produces a fresh decoder for a codec key.
pub trait CodecRegistry {
    fn instantiate(&self, key: CodecKey) -> Result<Box<dyn DecoderInstance>, CodecError>;
}

impl<T: CodecRegistry + ?Sized> CodecRegistry for &T {
    fn instantiate(&self, key: CodecKey) -> Result<Box<dyn DecoderInstance>, CodecError> {
        (**self).instantiate(key)
    }
}

type Factory = Arc<dyn Fn() -> Box<dyn DecoderInstance> + Send + Sync>;

/// Registry backed by in-process factories. `Default` registers every
/// decoder compiled into this crate.
#[derive(Clone)]
pub struct BuiltinRegistry {
    factories: HashMap<CodecKey, Factory>,
}

impl BuiltinRegistry {
    /// A registry with no decoders.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for `key`.
    pub fn register<F>(&mut self, key: CodecKey, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn DecoderInstance> + Send + Sync + 'static,
    {
        self.factories.insert(key, Arc::new(factory));
        self
    }

    pub fn contains(&self, key: CodecKey) -> bool {
        self.factories.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for BuiltinRegistry {
    #[allow(unused_mut)]
    fn default() -> Self {
        let mut registry = Self::empty();

        #[cfg(feature = "zip")]
        registry.register(CodecKey::from_handler_id(handler::ZIP), || {
            Box::new(crate::decoders::zip::ZipDecoder::new())
        });
        #[cfg(feature = "sevenz")]
        registry.register(CodecKey::from_handler_id(handler::SEVEN_ZIP), || {
            Box::new(crate::decoders::sevenz::SevenZipDecoder::new())
        });
        #[cfg(feature = "tar")]
        registry.register(CodecKey::from_handler_id(handler::TAR), || {
            Box::new(crate::decoders::tar::TarDecoder::new())
        });
        #[cfg(feature = "gzip")]
        registry.register(CodecKey::from_handler_id(handler::GZIP), || {
            Box::new(crate::decoders::single::SingleStreamDecoder::gzip())
        });
        #[cfg(feature = "bzip2")]
        registry.register(CodecKey::from_handler_id(handler::BZIP2), || {
            Box::new(crate::decoders::single::SingleStreamDecoder::bzip2())
        });
        #[cfg(feature = "xz")]
        {
            registry.register(CodecKey::from_handler_id(handler::XZ), || {
                Box::new(crate::decoders::single::SingleStreamDecoder::xz())
            });
            registry.register(CodecKey::from_handler_id(handler::LZMA), || {
                Box::new(crate::decoders::single::SingleStreamDecoder::lzma())
            });
        }

        registry
    }
}

impl fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("BuiltinRegistry").field("keys", &keys).finish()
    }
}

impl CodecRegistry for BuiltinRegistry {
    fn instantiate(&self, key: CodecKey) -> Result<Box<dyn DecoderInstance>, CodecError> {
        let factory = self.factories.get(&key).ok_or(CodecError::Unavailable(key))?;
        trace!(%key, "instantiating decoder");
        Ok(factory())
    }
}
