//! Format resolution: by file name, then by trial over the catalog.

use std::io::Seek;
use std::path::Path;

use polyarc_codec::{ArchiveStream, CodecRegistry, DecoderInstance, OpenCallback};
use tracing::{debug, trace};

use crate::catalog::{self, Format};
use crate::error::{Error, Result};
use crate::session::SessionState;

/// Best guess from the file extension; `Unknown` when there is none or it
/// is not registered.
pub fn resolve_by_name(path: impl AsRef<Path>) -> Format {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(Format::Unknown, catalog::format_for_extension)
}

/// Instantiate the decoder for `format` and open `stream` with it.
///
/// The stream is rewound first. A decoder that fails to open is dropped
/// before this returns.
pub fn try_candidate<R: CodecRegistry + ?Sized>(
    registry: &R,
    format: Format,
    stream: &mut dyn ArchiveStream,
    callback: &mut dyn OpenCallback,
) -> Result<Box<dyn DecoderInstance>> {
    stream.rewind()?;
    let key = catalog::codec_key_for_format(format).ok_or(Error::NotInstantiable(format))?;
    let mut decoder = registry
        .instantiate(key)
        .map_err(|source| Error::Instantiation { format, source })?;
    decoder
        .open(stream, callback)
        .map_err(|source| Error::Open { format, source })?;
    Ok(decoder)
}

/// Try every catalog format not in `tried`, in catalog order, until one
/// opens the stream.
///
/// Each attempted format is appended to `tried`, so a format is never
/// attempted twice across calls sharing the list. Candidate rejections are
/// absorbed; stream I/O failures are not.
pub fn resolve_by_trial<R: CodecRegistry + ?Sized>(
    registry: &R,
    stream: &mut dyn ArchiveStream,
    tried: &mut Vec<Format>,
    callback: &mut dyn OpenCallback,
) -> Result<Option<(Format, Box<dyn DecoderInstance>)>> {
    trial_with_states(registry, stream, tried, callback, |_| {})
}

/// [`resolve_by_trial`], reporting `Opening` before each candidate opens
/// and `Resolving` after each rejection.
pub(crate) fn trial_with_states<R: CodecRegistry + ?Sized>(
    registry: &R,
    stream: &mut dyn ArchiveStream,
    tried: &mut Vec<Format>,
    callback: &mut dyn OpenCallback,
    mut observe: impl FnMut(SessionState),
) -> Result<Option<(Format, Box<dyn DecoderInstance>)>> {
    for &format in catalog::all_formats() {
        if tried.contains(&format) {
            continue;
        }
        tried.push(format);

        observe(SessionState::Opening);
        match try_candidate(registry, format, stream, callback) {
            Ok(decoder) => {
                debug!(%format, attempts = tried.len(), "trial resolution succeeded");
                return Ok(Some((format, decoder)));
            }
            Err(e) if e.is_candidate_rejection() => {
                trace!(%format, error = %e, "trial candidate rejected");
                observe(SessionState::Resolving);
            }
            Err(e) => return Err(e),
        }
    }
    debug!(attempts = tried.len(), "trial resolution exhausted");
    Ok(None)
}
