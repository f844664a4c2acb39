use std::io::{Read, Seek};

use tracing::trace;

use super::{Item, property_of, unix_time};
use crate::decoder::{DecoderInstance, ExtractSink, Flow, OpenCallback, PropValue, PropertyKind};
use crate::error::{DecoderError, Result};
use crate::stream::{ArchiveStream, stream_len};

const NAME: &str = "tar";
const BLOCK: u64 = 512;
const RECORD: u64 = 20 * BLOCK;

/// Uncompressed tar. Compressed tarballs surface as a single-stream entry
/// holding the inner `.tar`.
#[derive(Default)]
pub struct TarDecoder {
    items: Vec<Item>,
    opened: bool,
}

impl TarDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecoderInstance for TarDecoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn open(&mut self, stream: &mut dyn ArchiveStream, _: &mut dyn OpenCallback) -> Result<()> {
        self.items.clear();
        self.opened = false;
        let mut archive = tar::Archive::new(&mut *stream);
        let entries = archive
            .entries()
            .map_err(|e| DecoderError::not_recognized(NAME, e))?;

        let mut items = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DecoderError::not_recognized(NAME, e))?;
            let header = entry.header();
            let entry_type = header.entry_type();
            let link_name = || {
                entry
                    .link_name()
                    .ok()
                    .flatten()
                    .map(|t| t.to_string_lossy().into_owned())
            };
            let link_target = entry_type.is_symlink().then(link_name).flatten();
            let hard_link = entry_type.is_hard_link().then(link_name).flatten();
            let special = entry_type.is_character_special()
                || entry_type.is_block_special()
                || entry_type.is_fifo();

            items.push(Item {
                path: entry
                    .path()
                    .ok()
                    .map(|p| p.to_string_lossy().into_owned()),
                size: Some(entry.size()),
                packed_size: Some(entry.size()),
                is_dir: entry_type.is_dir(),
                mode: header.mode().ok(),
                modified: header.mtime().ok().and_then(unix_time),
                link_target,
                hard_link,
                special,
                ..Item::default()
            });
        }

        if items.is_empty() && !is_end_of_archive_only(stream)? {
            return Err(DecoderError::not_recognized(NAME, "no entries"));
        }

        trace!(entries = items.len(), "tar headers read");
        self.items = items;
        self.opened = true;
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
        if !self.opened {
            return Err(DecoderError::NotOpen);
        }
        stream.rewind()?;
        let mut archive = tar::Archive::new(&mut *stream);

        for (index, entry) in archive.entries()?.enumerate() {
            let mut entry = entry.map_err(|e| DecoderError::entry(index, e))?;
            let flow = sink
                .entry(index, &mut entry)
                .map_err(|e| DecoderError::entry(index, e))?;
            if flow.is_abort() {
                return Ok(Flow::Abort);
            }
        }
        Ok(Flow::Continue)
    }
}

/// An empty tar holds only zeroed end-of-archive blocks, at most one record
/// long. Longer runs of zeros are not claimed as tar.
fn is_end_of_archive_only(stream: &mut dyn ArchiveStream) -> Result<bool> {
    let len = stream_len(stream)?;
    if len % BLOCK != 0 || !(2 * BLOCK..=RECORD).contains(&len) {
        return Ok(false);
    }
    let mut blocks = Vec::with_capacity(len as usize);
    (&mut *stream).take(len).read_to_end(&mut blocks)?;
    Ok(blocks.len() as u64 == len && blocks.iter().all(|&b| b == 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::PasswordPrompt;
    use std::io::{self, Cursor, Read};

    struct NoCallback;

    impl OpenCallback for NoCallback {
        fn password(&mut self, _: &PasswordPrompt) -> Option<String> {
            None
        }

        fn stream_name(&self) -> Option<String> {
            None
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<(usize, Vec<u8>)>);

    impl ExtractSink for Recorder {
        fn entry(&mut self, index: usize, data: &mut dyn Read) -> io::Result<Flow> {
            let mut buf = Vec::new();
            data.read_to_end(&mut buf)?;
            self.0.push((index, buf));
            Ok(Flow::Continue)
        }

        fn password(&mut self, _: &PasswordPrompt) -> Option<String> {
            None
        }
    }

    fn sample_tar() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_mtime(1_700_000_000);
        builder
            .append_data(&mut header, "bin/", io::empty())
            .unwrap();

        let body = b"#!/bin/sh\necho hi\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o755);
        header.set_mtime(1_700_000_000);
        builder
            .append_data(&mut header, "bin/hello", &body[..])
            .unwrap();

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        builder
            .append_link(&mut header, "hello-link", "bin/hello")
            .unwrap();

        builder.into_inner().unwrap()
    }

    #[test]
    fn open_reads_headers() {
        let mut decoder = TarDecoder::new();
        decoder
            .open(&mut Cursor::new(sample_tar()), &mut NoCallback)
            .unwrap();

        assert_eq!(decoder.item_count(), 3);
        assert_eq!(decoder.property(0, PropertyKind::IsDir), Some(PropValue::Bool(true)));
        assert_eq!(
            decoder.property(1, PropertyKind::Path),
            Some(PropValue::Str("bin/hello".into()))
        );
        assert_eq!(decoder.property(1, PropertyKind::Size), Some(PropValue::U64(18)));
        assert_eq!(decoder.property(1, PropertyKind::PosixMode), Some(PropValue::U32(0o755)));
        assert!(decoder.property(1, PropertyKind::Modified).is_some());
        assert_eq!(
            decoder.property(2, PropertyKind::SymlinkTarget),
            Some(PropValue::Str("bin/hello".into()))
        );
        assert_eq!(decoder.property(2, PropertyKind::Modified), None);
    }

    #[test]
    fn open_rejects_garbage_and_long_zero_runs() {
        let mut decoder = TarDecoder::new();
        assert!(
            decoder
                .open(&mut Cursor::new(vec![0xAB; 4096]), &mut NoCallback)
                .is_err()
        );
        assert!(
            decoder
                .open(&mut Cursor::new(vec![0u8; 20 * 1024]), &mut NoCallback)
                .is_err()
        );
        assert!(
            decoder
                .open(&mut Cursor::new(vec![0u8; 700]), &mut NoCallback)
                .is_err()
        );
        assert_eq!(decoder.item_count(), 0);
    }

    #[test]
    fn empty_archive_opens_with_no_items() {
        let empty = tar::Builder::new(Vec::new()).into_inner().unwrap();
        let mut stream = Cursor::new(empty);
        let mut decoder = TarDecoder::new();
        decoder.open(&mut stream, &mut NoCallback).unwrap();
        assert_eq!(decoder.item_count(), 0);

        let mut sink = Recorder::default();
        assert_eq!(decoder.extract_all(&mut stream, &mut sink).unwrap(), Flow::Continue);
        assert!(sink.0.is_empty());
    }

    #[test]
    fn hard_links_and_fifos_are_flagged() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(3);
        header.set_mode(0o644);
        builder.append_data(&mut header, "data.txt", &b"abc"[..]).unwrap();

        let mut link = tar::Header::new_gnu();
        link.set_entry_type(tar::EntryType::Link);
        link.set_size(0);
        builder.append_link(&mut link, "alias.txt", "data.txt").unwrap();

        let mut fifo = tar::Header::new_gnu();
        fifo.set_entry_type(tar::EntryType::Fifo);
        fifo.set_size(0);
        builder.append_data(&mut fifo, "pipe", io::empty()).unwrap();
        let bytes = builder.into_inner().unwrap();

        let mut decoder = TarDecoder::new();
        decoder.open(&mut Cursor::new(bytes), &mut NoCallback).unwrap();
        assert_eq!(
            decoder.property(1, PropertyKind::HardLinkTarget),
            Some(PropValue::Str("data.txt".into()))
        );
        assert_eq!(decoder.property(1, PropertyKind::SymlinkTarget), None);
        assert_eq!(decoder.property(2, PropertyKind::IsSpecial), Some(PropValue::Bool(true)));
        assert_eq!(decoder.property(0, PropertyKind::IsSpecial), Some(PropValue::Bool(false)));
    }

    #[test]
    fn extract_all_streams_entries_in_order() {
        let mut stream = Cursor::new(sample_tar());
        let mut decoder = TarDecoder::new();
        decoder.open(&mut stream, &mut NoCallback).unwrap();

        let mut sink = Recorder::default();
        assert_eq!(decoder.extract_all(&mut stream, &mut sink).unwrap(), Flow::Continue);
        let indices: Vec<_> = sink.0.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(sink.0[1].1, b"#!/bin/sh\necho hi\n");
    }
}
