use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use polyarc_codec::{
    BuiltinRegistry, CodecError, CodecKey, CodecRegistry, DecoderError, DecoderInstance,
    ExtractSink, Flow, MemorySource, OpenCallback, PasswordPrompt, PropertyKind, StreamSource,
    handler,
};

struct Named(&'static str);

impl OpenCallback for Named {
    fn password(&mut self, _prompt: &PasswordPrompt) -> Option<String> {
        None
    }

    fn stream_name(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

#[derive(Default)]
struct Collect {
    entries: Vec<(usize, Vec<u8>)>,
}

impl ExtractSink for Collect {
    fn entry(&mut self, index: usize, data: &mut dyn Read) -> io::Result<Flow> {
        let mut buf = Vec::new();
        data.read_to_end(&mut buf)?;
        self.entries.push((index, buf));
        Ok(Flow::Continue)
    }

    fn password(&mut self, _prompt: &PasswordPrompt) -> Option<String> {
        None
    }
}

fn zip_bytes() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("notes/readme.md", options).unwrap();
    writer.write_all(b"# polyarc").unwrap();
    writer.finish().unwrap().into_inner()
}

fn tar_bytes() -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(4);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "data.bin", &b"\x00\x01\x02\x03"[..])
        .unwrap();
    builder.into_inner().unwrap()
}

fn gzip_bytes() -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(b"plain payload").unwrap();
    encoder.finish().unwrap()
}

fn decoder(registry: &BuiltinRegistry, id: u8) -> Box<dyn DecoderInstance> {
    registry.instantiate(CodecKey::from_handler_id(id)).unwrap()
}

fn source() -> MemorySource {
    MemorySource::new()
        .with_file("bundle.zip", zip_bytes())
        .with_file("bundle.tar", tar_bytes())
        .with_file("payload.gz", gzip_bytes())
}

#[test]
fn bundled_decoders_open_their_own_format() {
    let registry = BuiltinRegistry::default();
    let source = source();
    let cases = [
        (handler::ZIP, "bundle.zip", "notes/readme.md", 9),
        (handler::TAR, "bundle.tar", "data.bin", 4),
        (handler::GZIP, "payload.gz", "payload", 13),
    ];

    for (id, file, name, size) in cases {
        let mut stream = source.open(Path::new(file)).unwrap();
        let mut decoder = decoder(&registry, id);
        decoder.open(&mut *stream, &mut Named(file)).unwrap();

        assert_eq!(decoder.item_count(), 1, "{file}");
        let path = decoder.property(0, PropertyKind::Path).unwrap();
        assert_eq!(path.as_str(), Some(name), "{file}");
        let reported = decoder.property(0, PropertyKind::Size).unwrap();
        assert_eq!(reported.as_u64(), Some(size), "{file}");

        let mut sink = Collect::default();
        assert_eq!(
            decoder.extract_all(&mut *stream, &mut sink).unwrap(),
            Flow::Continue
        );
        assert_eq!(sink.entries.len(), 1);
        assert_eq!(sink.entries[0].1.len() as u64, size);
    }
}

#[test]
fn decoders_reject_foreign_streams() {
    let registry = BuiltinRegistry::default();
    let source = source();

    for (id, file) in [
        (handler::ZIP, "bundle.tar"),
        (handler::SEVEN_ZIP, "bundle.zip"),
        (handler::GZIP, "bundle.zip"),
        (handler::BZIP2, "payload.gz"),
        (handler::XZ, "bundle.tar"),
    ] {
        let mut stream = source.open(Path::new(file)).unwrap();
        let err = decoder(&registry, id)
            .open(&mut *stream, &mut Named(file))
            .unwrap_err();
        assert!(
            matches!(err, DecoderError::NotRecognized { .. }),
            "{id:#x} on {file}: {err}"
        );
    }
}

#[test]
fn extract_before_open_is_rejected() {
    let registry = BuiltinRegistry::default();
    let mut stream = source().open(Path::new("bundle.zip")).unwrap();
    let err = decoder(&registry, handler::ZIP)
        .extract_all(&mut *stream, &mut Collect::default())
        .unwrap_err();
    assert!(matches!(err, DecoderError::NotOpen));
}

#[test]
fn formats_without_bundled_decoder_are_unavailable() {
    let registry = BuiltinRegistry::default();
    for id in [handler::RAR, handler::ISO, handler::CAB, handler::CHM] {
        let err = registry
            .instantiate(CodecKey::from_handler_id(id))
            .err()
            .unwrap();
        assert!(matches!(err, CodecError::Unavailable(_)));
    }
}
