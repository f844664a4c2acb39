use std::io::{self, Seek};
use std::time::{Duration, SystemTime};

use sevenz_rust::nt_time::FileTime;
use sevenz_rust::{Archive, Password, SevenZArchiveEntry, SevenZMethod, SevenZReader};
use tracing::{debug, trace};

use super::{Item, property_of};
use crate::decoder::{
    DecoderInstance, ExtractSink, Flow, OpenCallback, PasswordPrompt, PropValue, PropertyKind,
};
use crate::error::{DecoderError, Result};
use crate::stream::{ArchiveStream, stream_len};

const NAME: &str = "7z";

/// Set in the attribute word when the high 16 bits carry a unix mode.
const UNIX_EXTENSION: u32 = 0x8000;

/// 100ns ticks between 1601-01-01 and the unix epoch.
const NT_TO_UNIX_TICKS: u64 = 11_644_473_600 * 10_000_000;

/// 7z decoder. The item table is in decode order: each folder's files in
/// turn, followed by empty files and directories.
#[derive(Default)]
pub struct SevenZipDecoder {
    items: Vec<Item>,
    /// Password that unlocked an encrypted header, reused for extraction.
    password: Option<String>,
    opened: bool,
}

impl SevenZipDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

fn password_of(password: Option<&str>) -> Password {
    password.map_or_else(Password::empty, Password::from)
}

fn system_time(recorded: bool, time: FileTime) -> Option<SystemTime> {
    if !recorded {
        return None;
    }
    let ticks = time.to_raw();
    let span = |t: u64| Duration::new(t / 10_000_000, (t % 10_000_000) as u32 * 100);
    if ticks >= NT_TO_UNIX_TICKS {
        SystemTime::UNIX_EPOCH.checked_add(span(ticks - NT_TO_UNIX_TICKS))
    } else {
        SystemTime::UNIX_EPOCH.checked_sub(span(NT_TO_UNIX_TICKS - ticks))
    }
}

fn item_of(entry: &SevenZArchiveEntry, encrypted: bool) -> Item {
    let attributes = entry
        .has_windows_attributes
        .then_some(entry.windows_attributes);
    let mode = attributes
        .filter(|a| a & UNIX_EXTENSION != 0)
        .map(|a| a >> 16);
    Item {
        path: (!entry.name.is_empty()).then(|| entry.name.clone()),
        size: Some(entry.size),
        packed_size: entry.has_stream.then_some(entry.compressed_size),
        is_dir: entry.is_directory,
        attributes,
        mode,
        modified: system_time(entry.has_last_modified_date, entry.last_modified_date),
        created: system_time(entry.has_creation_date, entry.creation_date),
        accessed: system_time(entry.has_access_date, entry.access_date),
        encrypted,
        ..Item::default()
    }
}

/// File indices in the order `for_each_entries` visits them.
fn decode_order(archive: &Archive) -> Vec<usize> {
    let map = &archive.stream_map;
    let count = archive.files.len();
    let mut order = Vec::with_capacity(count);
    for (folder_index, folder) in archive.folders.iter().enumerate() {
        let Some(&start) = map.folder_first_file_index.get(folder_index) else {
            continue;
        };
        let end = (start + folder.num_unpack_sub_streams).min(count);
        order.extend(start..end);
    }
    order.extend((0..count).filter(|&i| folder_of(archive, i).is_none()));
    order
}

fn folder_of(archive: &Archive, file_index: usize) -> Option<usize> {
    archive
        .stream_map
        .file_folder_index
        .get(file_index)
        .copied()
        .flatten()
}

fn is_encrypted(archive: &Archive, file_index: usize) -> bool {
    folder_of(archive, file_index)
        .and_then(|f| archive.folders.get(f))
        .is_some_and(|folder| {
            folder
                .coders
                .iter()
                .any(|c| c.decompression_method_id() == SevenZMethod::ID_AES256SHA256)
        })
}

fn read_table(
    stream: &mut dyn ArchiveStream,
    len: u64,
    password: Password,
) -> std::result::Result<Vec<Item>, sevenz_rust::Error> {
    let reader = SevenZReader::new(&mut *stream, len, password)?;
    let archive = reader.archive();
    Ok(decode_order(archive)
        .into_iter()
        .map(|i| item_of(&archive.files[i], is_encrypted(archive, i)))
        .collect())
}

/// Item for a delivered entry. Entries arrive in table order, so the cursor
/// normally matches; otherwise fall back to the first unmatched item with
/// that name.
fn next_match(items: &[Item], matched: &[bool], cursor: usize, name: &str) -> Option<usize> {
    let fits = |i: usize| !matched[i] && items[i].path.as_deref() == Some(name);
    if cursor < items.len() && fits(cursor) {
        return Some(cursor);
    }
    (0..items.len()).find(|&i| fits(i))
}

impl DecoderInstance for SevenZipDecoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn open(
        &mut self,
        stream: &mut dyn ArchiveStream,
        callback: &mut dyn OpenCallback,
    ) -> Result<()> {
        self.items.clear();
        self.password = None;
        self.opened = false;

        let len = stream_len(stream)?;
        let items = match read_table(stream, len, Password::empty()) {
            Ok(items) => items,
            Err(sevenz_rust::Error::PasswordRequired) => {
                debug!("7z header is encrypted, requesting password");
                let prompt = PasswordPrompt {
                    decoder: NAME,
                    entry: None,
                };
                let Some(password) = callback.password(&prompt) else {
                    return Err(DecoderError::PasswordRequired { decoder: NAME });
                };
                stream.rewind()?;
                let items = read_table(stream, len, password_of(Some(&password)))
                    .map_err(|e| DecoderError::not_recognized(NAME, e))?;
                self.password = Some(password);
                items
            }
            Err(e) => return Err(DecoderError::not_recognized(NAME, e)),
        };

        trace!(entries = items.len(), "7z header read");
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

        let items = &self.items;
        let mut delivered = vec![false; items.len()];
        let mut password = self.password.clone();
        let mut prompted = false;

        loop {
            let len = stream_len(stream)?;
            let mut reader = SevenZReader::new(&mut *stream, len, password_of(password.as_deref()))
                .map_err(|e| DecoderError::not_recognized(NAME, e))?;

            let mut matched = vec![false; items.len()];
            let mut cursor = 0;
            let mut current = 0;
            let mut aborted = false;
            let mut failed: Option<(usize, io::Error)> = None;

            let result = reader.for_each_entries(|entry, data| {
                let Some(index) = next_match(items, &matched, cursor, &entry.name) else {
                    io::copy(data, &mut io::sink())?;
                    return Ok(true);
                };
                matched[index] = true;
                cursor = index + 1;
                current = index;
                if delivered[index] {
                    // Already handed out before a password retry.
                    io::copy(data, &mut io::sink())?;
                    return Ok(true);
                }
                match sink.entry(index, data) {
                    Ok(flow) => {
                        delivered[index] = true;
                        aborted = flow.is_abort();
                        Ok(!aborted)
                    }
                    Err(e) => {
                        failed = Some((index, e));
                        Ok(false)
                    }
                }
            });

            if let Some((index, e)) = failed {
                return Err(DecoderError::entry(index, e));
            }
            match result {
                Ok(()) if aborted => return Ok(Flow::Abort),
                Ok(()) => return Ok(Flow::Continue),
                Err(sevenz_rust::Error::PasswordRequired) if !prompted => {
                    prompted = true;
                    let prompt = PasswordPrompt {
                        decoder: NAME,
                        entry: items.get(current).and_then(|i| i.path.clone()),
                    };
                    let Some(supplied) = sink.password(&prompt) else {
                        return Err(DecoderError::entry(
                            current,
                            io::Error::new(io::ErrorKind::PermissionDenied, "password required"),
                        ));
                    };
                    debug!("retrying 7z extraction with supplied password");
                    password = Some(supplied);
                }
                Err(e) => return Err(DecoderError::entry(current, io::Error::other(e))),
            }
        }
    }
}
