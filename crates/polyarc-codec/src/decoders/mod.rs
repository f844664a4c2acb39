//! Bundled decoders.

use std::time::{Duration, SystemTime};

use crate::decoder::{PropValue, PropertyKind};

#[cfg(any(feature = "gzip", feature = "bzip2", feature = "xz"))]
pub(crate) mod codecs;
#[cfg(any(feature = "gzip", feature = "bzip2", feature = "xz"))]
pub mod single;
#[cfg(feature = "sevenz")]
pub mod sevenz;
#[cfg(feature = "tar")]
pub mod tar;
#[cfg(feature = "zip")]
pub mod zip;

/// One row of a decoder's item table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Item {
    pub path: Option<String>,
    pub size: Option<u64>,
    pub packed_size: Option<u64>,
    pub is_dir: bool,
    pub attributes: Option<u32>,
    pub mode: Option<u32>,
    pub modified: Option<SystemTime>,
    pub created: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub encrypted: bool,
    pub link_target: Option<String>,
    pub hard_link: Option<String>,
    pub special: bool,
}

impl Item {
    pub fn property(&self, kind: PropertyKind) -> Option<PropValue> {
        match kind {
            PropertyKind::Path => self.path.clone().map(PropValue::Str),
            PropertyKind::Size => self.size.map(PropValue::U64),
            PropertyKind::PackedSize => self.packed_size.map(PropValue::U64),
            PropertyKind::IsDir => Some(PropValue::Bool(self.is_dir)),
            PropertyKind::Attributes => self.attributes.map(PropValue::U32),
            PropertyKind::PosixMode => self.mode.map(PropValue::U32),
            PropertyKind::Modified => self.modified.map(PropValue::Time),
            PropertyKind::Created => self.created.map(PropValue::Time),
            PropertyKind::Accessed => self.accessed.map(PropValue::Time),
            PropertyKind::Encrypted => Some(PropValue::Bool(self.encrypted)),
            PropertyKind::SymlinkTarget => self.link_target.clone().map(PropValue::Str),
            PropertyKind::HardLinkTarget => self.hard_link.clone().map(PropValue::Str),
            PropertyKind::IsSpecial => Some(PropValue::Bool(self.special)),
        }
    }
}

pub(crate) fn property_of(items: &[Item], index: usize, kind: PropertyKind) -> Option<PropValue> {
    items.get(index).and_then(|item| item.property(kind))
}

/// Seconds since the unix epoch; zero means "not recorded".
#[allow(dead_code)]
pub(crate) fn unix_time(secs: u64) -> Option<SystemTime> {
    (secs != 0).then(|| SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_reports_only_recorded_properties() {
        let item = Item {
            path: Some("docs/readme.md".into()),
            size: Some(12),
            ..Item::default()
        };
        assert_eq!(
            item.property(PropertyKind::Path),
            Some(PropValue::Str("docs/readme.md".into()))
        );
        assert_eq!(item.property(PropertyKind::Size), Some(PropValue::U64(12)));
        assert_eq!(item.property(PropertyKind::IsDir), Some(PropValue::Bool(false)));
        assert_eq!(item.property(PropertyKind::Modified), None);
        assert_eq!(item.property(PropertyKind::SymlinkTarget), None);
        assert_eq!(item.property(PropertyKind::HardLinkTarget), None);
        assert_eq!(item.property(PropertyKind::IsSpecial), Some(PropValue::Bool(false)));
    }

    #[test]
    fn out_of_range_index_has_no_properties() {
        assert_eq!(property_of(&[], 3, PropertyKind::Path), None);
    }

    #[test]
    fn zero_timestamp_is_absent() {
        assert_eq!(unix_time(0), None);
        assert!(unix_time(1_700_000_000).is_some());
    }
}
