//! Decoder for formats that compress exactly one payload (gzip, bzip2, xz,
//! lzma). The item table always has one entry.

use std::io::{self, Read, Seek};
use std::path::Path;

use tracing::trace;

use super::codecs::Compression;
use super::{Item, property_of, unix_time};
use crate::decoder::{DecoderInstance, ExtractSink, Flow, OpenCallback, PropValue, PropertyKind};
use crate::error::{DecoderError, Result};
use crate::stream::ArchiveStream;

const FALLBACK_NAME: &str = "content";

pub struct SingleStreamDecoder {
    compression: Compression,
    items: Vec<Item>,
}

impl SingleStreamDecoder {
    pub fn new(compression: Compression) -> Self {
        Self {
            compression,
            items: Vec::new(),
        }
    }

    pub fn gzip() -> Self {
        Self::new(Compression::Gzip)
    }

    pub fn bzip2() -> Self {
        Self::new(Compression::Bzip2)
    }

    pub fn xz() -> Self {
        Self::new(Compression::Xz)
    }

    pub fn lzma() -> Self {
        Self::new(Compression::Lzma)
    }
}

impl DecoderInstance for SingleStreamDecoder {
    fn name(&self) -> &'static str {
        self.compression.name()
    }

    fn open(
        &mut self,
        stream: &mut dyn ArchiveStream,
        callback: &mut dyn OpenCallback,
    ) -> Result<()> {
        let name = self.name();
        self.items.clear();

        let mut header = [0u8; 16];
        let read = read_prefix(stream, &mut header)?;
        if !self.compression.matches_header(&header[..read]) {
            return Err(DecoderError::not_recognized(name, "signature mismatch"));
        }
        stream.rewind()?;

        // Decode the whole payload once: it validates the stream and yields
        // the unpacked size, which none of these formats store reliably.
        let mut decoder = self.compression.decoder(&mut *stream)?;
        let size = io::copy(&mut decoder, &mut io::sink())
            .map_err(|e| DecoderError::not_recognized(name, e))?;
        let stored_name = decoder.stored_name();
        let modified = decoder.stored_mtime().and_then(unix_time);
        drop(decoder);

        let packed_size = stream.stream_position().ok();
        let path = stored_name
            .or_else(|| callback.stream_name().map(|n| payload_name(&n)))
            .unwrap_or_else(|| FALLBACK_NAME.to_string());
        trace!(decoder = name, path = %path, size, "single-stream payload decoded");

        self.items.push(Item {
            path: Some(path),
            size: Some(size),
            packed_size,
            modified,
            ..Item::default()
        });
        Ok(())
    }

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn property(&self, index: usize, kind: PropertyKind) -> Option<PropValue> {
        property_of(&self.items, index, kind)
    }

    fn extract_all(
        &mut self,
        stream: &mut dyn ArchiveStream,
        sink: &mut dyn ExtractSink,
    ) -> Result<Flow> {
        if self.items.is_empty() {
            return Err(DecoderError::NotOpen);
        }
        stream.rewind()?;
        let mut decoder = self.compression.decoder(&mut *stream)?;
        sink.entry(0, &mut decoder)
            .map_err(|e| DecoderError::entry(0, e))
    }
}

fn read_prefix(stream: &mut dyn ArchiveStream, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Name of the payload inside `archive_name`: the name without its last
/// extension, with tarball shorthands expanded.
fn payload_name(archive_name: &str) -> String {
    let path = Path::new(archive_name);
    let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
        return FALLBACK_NAME.to_string();
    };
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("tgz" | "tbz" | "tbz2" | "txz") => format!("{stem}.tar"),
        _ => stem,
    }
}
