use polyarc_codec::{CodecRegistry, DecoderInstance, PropertyKind, StreamSource};
use tracing::{debug, warn};

use crate::entry::ArchiveEntry;
use crate::error::Result;
use crate::session::ArchiveSession;

/// Entries of an open session, in the decoder's item order.
///
/// Items without a usable path are skipped. An archive with no items yields
/// an empty list.
pub fn list_entries<R: CodecRegistry, S: StreamSource>(
    session: &ArchiveSession<R, S>,
) -> Result<Vec<ArchiveEntry>> {
    let decoder = session.decoder("list entries")?;
    Ok(collect_entries(decoder))
}

/// Snapshot every item with a usable path.
pub(crate) fn collect_entries(decoder: &dyn DecoderInstance) -> Vec<ArchiveEntry> {
    let count = decoder.item_count();
    let entries: Vec<_> = (0..count)
        .filter_map(|index| read_entry(decoder, index))
        .collect();
    debug!(items = count, listed = entries.len(), "entries enumerated");
    entries
}

fn read_entry(decoder: &dyn DecoderInstance, index: usize) -> Option<ArchiveEntry> {
    let prop = |kind| decoder.property(index, kind);

    let name = match prop(PropertyKind::Path) {
        Some(value) => match value.as_str() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                warn!(index, ?value, "skipping entry with malformed path");
                return None;
            }
        },
        None => {
            warn!(index, "skipping entry without a path");
            return None;
        }
    };

    let time = |kind| prop(kind).and_then(|v| v.as_time());
    let text = |kind| prop(kind).and_then(|v| v.as_str().map(str::to_string));
    let flag = |kind| prop(kind).and_then(|v| v.as_bool()).unwrap_or(false);
    Some(ArchiveEntry {
        index,
        name,
        size: prop(PropertyKind::Size)
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        packed_size: prop(PropertyKind::PackedSize).and_then(|v| v.as_u64()),
        is_directory: flag(PropertyKind::IsDir),
        attributes: prop(PropertyKind::Attributes).and_then(|v| v.as_u32()),
        mode: prop(PropertyKind::PosixMode).and_then(|v| v.as_u32()),
        modified: time(PropertyKind::Modified),
        created: time(PropertyKind::Created),
        accessed: time(PropertyKind::Accessed),
        encrypted: flag(PropertyKind::Encrypted),
        link_target: text(PropertyKind::SymlinkTarget),
        hard_link_target: text(PropertyKind::HardLinkTarget),
        is_special: flag(PropertyKind::IsSpecial),
    })
}
