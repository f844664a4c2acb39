//! Static format table: extensions, codec keys and trial order.

use std::fmt;

use polyarc_codec::{CodecKey, handler};

/// Container formats known to the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    SevenZip,
    Zip,
    GZip,
    BZip2,
    Rar,
    Tar,
    Iso,
    Cab,
    Lzma,
    Lzma86,
    Arj,
    Z,
    Lzh,
    Nsis,
    Xz,
    Ppmd,
    Rar5,
    Chm,
    /// The resolver could not decide from the name.
    Unknown,
}

/// Trial order, most common formats first.
const TRIAL_ORDER: [Format; 18] = [
    Format::Zip,
    Format::SevenZip,
    Format::GZip,
    Format::Rar,
    Format::Tar,
    Format::BZip2,
    Format::Xz,
    Format::Rar5,
    Format::Iso,
    Format::Cab,
    Format::Lzma,
    Format::Z,
    Format::Arj,
    Format::Lzh,
    Format::Lzma86,
    Format::Ppmd,
    Format::Chm,
    Format::Nsis,
];

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Self::SevenZip => "7z",
            Self::Zip => "zip",
            Self::GZip => "gzip",
            Self::BZip2 => "bzip2",
            Self::Rar => "rar",
            Self::Tar => "tar",
            Self::Iso => "iso",
            Self::Cab => "cab",
            Self::Lzma => "lzma",
            Self::Lzma86 => "lzma86",
            Self::Arj => "arj",
            Self::Z => "z",
            Self::Lzh => "lzh",
            Self::Nsis => "nsis",
            Self::Xz => "xz",
            Self::Ppmd => "ppmd",
            Self::Rar5 => "rar5",
            Self::Chm => "chm",
            Self::Unknown => "unknown",
        }
    }

    /// File extensions, lowercase and without the dot. The first one is
    /// canonical. `Rar5` has none of its own: it shares `.rar` and is only
    /// reached by trial.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::SevenZip => &["7z"],
            Self::Zip => &["zip", "jar"],
            Self::GZip => &["gz", "gzip", "tgz"],
            Self::BZip2 => &["bz2", "bzip2", "tbz", "tbz2"],
            Self::Rar => &["rar"],
            Self::Tar => &["tar"],
            Self::Iso => &["iso"],
            Self::Cab => &["cab"],
            Self::Lzma => &["lzma"],
            Self::Lzma86 => &["lzma86"],
            Self::Arj => &["arj"],
            Self::Z => &["z", "taz"],
            Self::Lzh => &["lzh", "lha"],
            Self::Nsis => &["nsis"],
            Self::Xz => &["xz", "txz"],
            Self::Ppmd => &["pmd"],
            Self::Rar5 => &[],
            Self::Chm => &["chm", "chi"],
            Self::Unknown => &[],
        }
    }

    pub fn canonical_extension(self) -> Option<&'static str> {
        self.extensions().first().copied()
    }

    fn handler_id(self) -> Option<u8> {
        let id = match self {
            Self::SevenZip => handler::SEVEN_ZIP,
            Self::Zip => handler::ZIP,
            Self::GZip => handler::GZIP,
            Self::BZip2 => handler::BZIP2,
            Self::Rar => handler::RAR,
            Self::Tar => handler::TAR,
            Self::Iso => handler::ISO,
            Self::Cab => handler::CAB,
            Self::Lzma => handler::LZMA,
            Self::Lzma86 => handler::LZMA86,
            Self::Arj => handler::ARJ,
            Self::Z => handler::Z,
            Self::Lzh => handler::LZH,
            Self::Nsis => handler::NSIS,
            Self::Xz => handler::XZ,
            Self::Ppmd => handler::PPMD,
            Self::Rar5 => handler::RAR5,
            Self::Chm => handler::CHM,
            Self::Unknown => return None,
        };
        Some(id)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Format registered for `ext` (with or without a leading dot),
/// case-insensitively.
pub fn format_for_extension(ext: &str) -> Format {
    let ext = ext.strip_prefix('.').unwrap_or(ext);
    TRIAL_ORDER
        .iter()
        .copied()
        .find(|format| {
            format
                .extensions()
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(Format::Unknown)
}

/// Key used to instantiate a decoder for `format`; `None` for `Unknown`.
pub fn codec_key_for_format(format: Format) -> Option<CodecKey> {
    format.handler_id().map(CodecKey::from_handler_id)
}

/// Every instantiable format, in trial order.
pub fn all_formats() -> &'static [Format] {
    &TRIAL_ORDER
}
