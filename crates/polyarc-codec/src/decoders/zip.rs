use std::io::{self, Seek};
use std::time::SystemTime;

use chrono::NaiveDate;
use tracing::trace;

use super::{Item, property_of};
use crate::decoder::{
    DecoderInstance, ExtractSink, Flow, OpenCallback, PasswordPrompt, PropValue, PropertyKind,
};
use crate::error::{DecoderError, Result};
use crate::stream::ArchiveStream;

const NAME: &str = "zip";

#[derive(Default)]
pub struct ZipDecoder {
    items: Vec<Item>,
    opened: bool,
}

impl ZipDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecoderInstance for ZipDecoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn open(&mut self, stream: &mut dyn ArchiveStream, _: &mut dyn OpenCallback) -> Result<()> {
        self.items.clear();
        let mut archive = zip::ZipArchive::new(&mut *stream)
            .map_err(|e| DecoderError::not_recognized(NAME, e))?;

        for index in 0..archive.len() {
            // Raw access reads the central directory record without
            // touching (or decrypting) the entry data.
            let file = archive
                .by_index_raw(index)
                .map_err(|e| DecoderError::not_recognized(NAME, e))?;
            let name = file.name();
            self.items.push(Item {
                path: (!name.is_empty()).then(|| name.to_string()),
                size: Some(file.size()),
                packed_size: Some(file.compressed_size()),
                is_dir: file.is_dir(),
                mode: file.unix_mode(),
                modified: file.last_modified().and_then(dos_time),
                encrypted: file.encrypted(),
                ..Item::default()
            });
        }

        trace!(entries = self.items.len(), "zip central directory read");
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
        let mut archive = zip::ZipArchive::new(&mut *stream)
            .map_err(|e| DecoderError::not_recognized(NAME, e))?;

        for index in 0..archive.len() {
            let item = self.items.get(index);
            let delivered = if item.is_some_and(|i| i.encrypted) {
                let prompt = PasswordPrompt {
                    decoder: NAME,
                    entry: item.and_then(|i| i.path.clone()),
                };
                let password = sink.password(&prompt).ok_or_else(|| {
                    DecoderError::entry(
                        index,
                        io::Error::new(io::ErrorKind::PermissionDenied, "password required"),
                    )
                })?;
                let mut file = archive
                    .by_index_decrypt(index, password.as_bytes())
                    .map_err(|e| DecoderError::entry(index, io::Error::other(e)))?;
                sink.entry(index, &mut file)
            } else {
                let mut file = archive
                    .by_index(index)
                    .map_err(|e| DecoderError::entry(index, io::Error::other(e)))?;
                sink.entry(index, &mut file)
            };
            let flow = delivered.map_err(|e| DecoderError::entry(index, e))?;

            if flow.is_abort() {
                return Ok(Flow::Abort);
            }
        }
        Ok(Flow::Continue)
    }
}

/// Zip stores local DOS date-times; they are read as UTC.
fn dos_time(dt: zip::DateTime) -> Option<SystemTime> {
    let date = NaiveDate::from_ymd_opt(
        i32::from(dt.year()),
        u32::from(dt.month()),
        u32::from(dt.day()),
    )?;
    let datetime = date.and_hms_opt(
        u32::from(dt.hour()),
        u32::from(dt.minute()),
        u32::from(dt.second()),
    )?;
    Some(datetime.and_utc().into())
}
