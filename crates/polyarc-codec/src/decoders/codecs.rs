use std::io::{self, Read};

/// Stream compressions that wrap a single payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    Xz,
    Lzma,
}

const LZMA_MAX_PROPS: u8 = 9 * 5 * 5;
const LZMA_MAX_KNOWN_SIZE: u64 = 1 << 38;

/// `.lzma` has no magic. Accept only the header shapes real encoders write:
/// valid properties, a dictionary of 2^n or 2^n + 2^(n-1) bytes, and an
/// unknown or plausible uncompressed size.
fn is_lzma_alone_header(header: &[u8]) -> bool {
    let Some(head) = header.get(..13) else {
        return false;
    };
    if head[0] >= LZMA_MAX_PROPS {
        return false;
    }
    let dict = u32::from_le_bytes([head[1], head[2], head[3], head[4]]);
    let size = u64::from_le_bytes([
        head[5], head[6], head[7], head[8], head[9], head[10], head[11], head[12],
    ]);
    let dict_ok = dict == u32::MAX || {
        let top = dict & dict.wrapping_neg();
        dict == top || dict == top + (top << 1)
    };
    dict_ok && dict != 0 && (size == u64::MAX || size < LZMA_MAX_KNOWN_SIZE)
}

impl Compression {
    pub fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Lzma => "lzma",
        }
    }

    /// Quick signature check on the first bytes of the stream.
    pub fn matches_header(self, header: &[u8]) -> bool {
        match self {
            Self::Gzip => header.starts_with(&[0x1F, 0x8B]),
            Self::Bzip2 => header.starts_with(b"BZh"),
            Self::Xz => header.starts_with(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]),
            Self::Lzma => is_lzma_alone_header(header),
        }
    }

    /// Create a decoder for this compression.
    pub fn decoder<R: Read>(self, reader: R) -> io::Result<Decoder<R>> {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip => Ok(Decoder::Gzip(Box::new(flate2::read::MultiGzDecoder::new(
                reader,
            )))),
            #[cfg(feature = "bzip2")]
            Self::Bzip2 => Ok(Decoder::Bzip2(Box::new(
                bzip2::read::MultiBzDecoder::new(reader),
            ))),
            #[cfg(feature = "xz")]
            Self::Xz => Ok(Decoder::Xz(Box::new(
                xz2::read::XzDecoder::new_multi_decoder(reader),
            ))),
            #[cfg(feature = "xz")]
            Self::Lzma => {
                let stream =
                    xz2::stream::Stream::new_lzma_decoder(u64::MAX).map_err(io::Error::other)?;
                Ok(Decoder::Xz(Box::new(xz2::read::XzDecoder::new_stream(
                    reader, stream,
                ))))
            }
            #[allow(unreachable_patterns)]
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} support is not compiled in", self.name()),
            )),
        }
    }
}

/// Decompressing reader over one of the supported compressions.
pub enum Decoder<R: Read> {
    #[cfg(feature = "gzip")]
    Gzip(Box<flate2::read::MultiGzDecoder<R>>),
    #[cfg(feature = "bzip2")]
    Bzip2(Box<bzip2::read::MultiBzDecoder<R>>),
    #[cfg(feature = "xz")]
    Xz(Box<xz2::read::XzDecoder<R>>),
}

impl<R: Read> Decoder<R> {
    /// File name stored in the gzip header, if any.
    pub fn stored_name(&self) -> Option<String> {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip(d) => d
                .header()
                .and_then(|h| h.filename())
                .map(|name| String::from_utf8_lossy(name).into_owned())
                .filter(|name| !name.is_empty()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Modification time (unix seconds) stored in the gzip header, if any.
    pub fn stored_mtime(&self) -> Option<u64> {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip(d) => d.header().map(|h| u64::from(h.mtime())),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            #[cfg(feature = "gzip")]
            Self::Gzip(d) => d.read(buf),
            #[cfg(feature = "bzip2")]
            Self::Bzip2(d) => d.read(buf),
            #[cfg(feature = "xz")]
            Self::Xz(d) => d.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn signatures() {
        assert!(Compression::Gzip.matches_header(&[0x1F, 0x8B, 0x08, 0x00]));
        assert!(Compression::Bzip2.matches_header(b"BZh91AY&SY"));
        assert!(Compression::Xz.matches_header(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, 0x00]));
        assert!(!Compression::Xz.matches_header(&[0xFD, 0x37]));
        assert!(!Compression::Gzip.matches_header(b"PK\x03\x04"));
    }

    #[test]
    fn lzma_header_needs_plausible_fields() {
        let mut header = [0xFFu8; 13];
        header[..5].copy_from_slice(&[0x5D, 0x00, 0x00, 0x01, 0x00]);
        assert!(Compression::Lzma.matches_header(&header));

        // 3 MiB dictionary (2^21 + 2^20) is a valid shape.
        header[1..5].copy_from_slice(&(3u32 << 20).to_le_bytes());
        assert!(Compression::Lzma.matches_header(&header));

        header[0] = 0xE1;
        assert!(!Compression::Lzma.matches_header(&header));
        assert!(!Compression::Lzma.matches_header(&[0xAB; 16]));
        assert!(!Compression::Lzma.matches_header(&[0x5D, 0x00]));
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn gzip_round_trip_reads_stored_name() {
        use std::io::Write;

        let mut encoder = flate2::GzBuilder::new()
            .filename("notes.txt")
            .write(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"hello gzip").unwrap();
        let bytes = encoder.finish().unwrap();

        let mut decoder = Compression::Gzip.decoder(Cursor::new(bytes)).unwrap();
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello gzip");
        assert_eq!(decoder.stored_name().as_deref(), Some("notes.txt"));
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn gzip_decoder_rejects_garbage() {
        let mut decoder = Compression::Gzip
            .decoder(Cursor::new(vec![0xAB; 64]))
            .unwrap();
        let mut out = Vec::new();
        assert!(decoder.read_to_end(&mut out).is_err());
    }
}
