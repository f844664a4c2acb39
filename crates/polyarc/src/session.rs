use std::fmt;
use std::path::{Path, PathBuf};

use polyarc_codec::{
    ArchiveStream, BuiltinRegistry, CodecRegistry, DecoderInstance, FileSource, OpenCallback,
    PasswordPrompt, StreamSource,
};
use tracing::{debug, trace, warn};

use crate::catalog::Format;
use crate::error::{Error, Result};
use crate::progress::{NoProgress, ProgressPort};
use crate::resolve::{resolve_by_name, trial_with_states, try_candidate};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Closed,
    Resolving,
    Opening,
    Open,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Resolving => "resolving",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Failed => "failed",
        })
    }
}

/// Lifecycle of one opened archive.
///
/// The session exclusively owns the byte stream and the single decoder that
/// opened it. Both are released by [`close`](Self::close), by a failed
/// [`open`](Self::open) and on drop.
pub struct ArchiveSession<R = BuiltinRegistry, S = FileSource> {
    registry: R,
    source: S,
    state: SessionState,
    path: Option<PathBuf>,
    password: Option<String>,
    format: Option<Format>,
    attempts: Vec<Format>,
    stream: Option<Box<dyn ArchiveStream>>,
    decoder: Option<Box<dyn DecoderInstance>>,
}

/// Borrowed view of an open session, handed to the enumerator and extractor.
pub(crate) struct Opened<'a> {
    pub format: Format,
    pub password: Option<&'a str>,
    pub stream: &'a mut dyn ArchiveStream,
    pub decoder: &'a mut dyn DecoderInstance,
}

/// Supplies the session password, falling back to the caller's port.
struct OpenPrompt<'a> {
    password: Option<&'a str>,
    port: &'a mut dyn ProgressPort,
    stream_name: Option<String>,
}

impl OpenCallback for OpenPrompt<'_> {
    fn password(&mut self, prompt: &PasswordPrompt) -> Option<String> {
        match self.password {
            Some(password) => Some(password.to_string()),
            None => self.port.password(prompt),
        }
    }

    fn stream_name(&self) -> Option<String> {
        self.stream_name.clone()
    }
}

impl ArchiveSession {
    /// A session over the filesystem and the bundled decoders.
    pub fn new() -> Self {
        Self::with_parts(BuiltinRegistry::default(), FileSource)
    }
}

impl Default for ArchiveSession {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CodecRegistry, S: StreamSource> ArchiveSession<R, S> {
    pub fn with_parts(registry: R, source: S) -> Self {
        Self {
            registry,
            source,
            state: SessionState::Closed,
            path: None,
            password: None,
            format: None,
            attempts: Vec::new(),
            stream: None,
            decoder: None,
        }
    }

    /// Open `path`, guessing the format from its name and falling back to
    /// trial resolution.
    pub fn open(&mut self, path: impl AsRef<Path>, password: Option<&str>) -> Result<()> {
        self.open_with(path, password, Format::Unknown, &mut NoProgress)
    }

    /// Like [`open`](Self::open), with an explicit first guess (`Unknown`
    /// means "derive it from the name") and a port for password prompts.
    pub fn open_with(
        &mut self,
        path: impl AsRef<Path>,
        password: Option<&str>,
        hint: Format,
        port: &mut dyn ProgressPort,
    ) -> Result<()> {
        let path = path.as_ref();
        self.close();

        self.state = SessionState::Resolving;
        self.path = Some(path.to_path_buf());
        self.password = password.map(str::to_string);
        debug!(path = %path.display(), "opening archive");

        let mut stream = match self.source.open(path) {
            Ok(stream) => stream,
            Err(source) => {
                self.state = SessionState::Failed;
                warn!(path = %path.display(), error = %source, "archive stream unavailable");
                return Err(Error::Stream {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let guess = match hint {
            Format::Unknown => resolve_by_name(path),
            format => format,
        };
        let mut prompt = OpenPrompt {
            password: self.password.as_deref(),
            port,
            stream_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        };
        let mut tried = Vec::new();
        let mut opened = None;

        if guess != Format::Unknown {
            self.state = SessionState::Opening;
            tried.push(guess);
            trace!(format = %guess, "trying name-based guess");
            match try_candidate(&self.registry, guess, &mut *stream, &mut prompt) {
                Ok(decoder) => opened = Some((guess, decoder)),
                Err(e) if e.is_candidate_rejection() => {
                    debug!(
                        format = %guess,
                        error = %e,
                        "name-based guess rejected, trying all formats"
                    );
                    self.state = SessionState::Resolving;
                }
                Err(e) => {
                    self.attempts = tried;
                    self.state = SessionState::Failed;
                    return Err(e);
                }
            }
        }

        if opened.is_none() {
            let state = &mut self.state;
            let found = trial_with_states(
                &self.registry,
                &mut *stream,
                &mut tried,
                &mut prompt,
                |s| *state = s,
            );
            match found {
                Ok(found) => opened = found,
                Err(e) => {
                    self.attempts = tried;
                    self.state = SessionState::Failed;
                    return Err(e);
                }
            }
        }
        self.attempts = tried;

        let Some((format, decoder)) = opened else {
            self.state = SessionState::Failed;
            warn!(
                path = %path.display(),
                attempts = self.attempts.len(),
                "no decoder accepted the archive"
            );
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
            });
        };

        debug!(
            path = %path.display(),
            %format,
            entries = decoder.item_count(),
            attempts = self.attempts.len(),
            "archive open"
        );
        self.format = Some(format);
        self.stream = Some(stream);
        self.decoder = Some(decoder);
        self.state = SessionState::Open;
        Ok(())
    }

    /// Release the decoder and stream. Valid in any state.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            trace!(state = %self.state, "closing archive session");
        }
        self.decoder = None;
        self.stream = None;
        self.format = None;
        self.attempts.clear();
        self.state = SessionState::Closed;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Format that opened the archive, while open.
    pub fn format(&self) -> Option<Format> {
        self.format
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Formats attempted by the last `open`, in order.
    pub fn attempts(&self) -> &[Format] {
        &self.attempts
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub(crate) fn decoder(&self, operation: &'static str) -> Result<&dyn DecoderInstance> {
        match (self.state, self.decoder.as_deref()) {
            (SessionState::Open, Some(decoder)) => Ok(decoder),
            (state, _) => Err(Error::InvalidState { operation, state }),
        }
    }

    pub(crate) fn opened(&mut self, operation: &'static str) -> Result<Opened<'_>> {
        match (
            self.state,
            self.format,
            self.stream.as_deref_mut(),
            self.decoder.as_deref_mut(),
        ) {
            (SessionState::Open, Some(format), Some(stream), Some(decoder)) => Ok(Opened {
                format,
                password: self.password.as_deref(),
                stream,
                decoder,
            }),
            (state, ..) => Err(Error::InvalidState { operation, state }),
        }
    }
}

impl<R, S> fmt::Debug for ArchiveSession<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveSession")
            .field("state", &self.state)
            .field("path", &self.path)
            .field("format", &self.format)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyarc_codec::MemorySource;

    fn memory_session(files: MemorySource) -> ArchiveSession<BuiltinRegistry, MemorySource> {
        ArchiveSession::with_parts(BuiltinRegistry::default(), files)
    }

    #[test]
    fn new_session_is_closed() {
        let session = ArchiveSession::new();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.format(), None);
        assert!(session.attempts().is_empty());
    }

    #[test]
    fn missing_stream_fails_without_attempts() {
        let mut session = memory_session(MemorySource::new());
        let err = session.open("absent.zip", None).unwrap_err();
        assert!(matches!(err, Error::Stream { .. }));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.attempts().is_empty());
    }

    #[test]
    fn close_is_idempotent() {
        let mut session = memory_session(MemorySource::new());
        let _ = session.open("absent.zip", None);
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn operations_require_open_state() {
        let mut session = memory_session(MemorySource::new());
        assert!(matches!(
            session.decoder("list entries"),
            Err(Error::InvalidState { state: SessionState::Closed, .. })
        ));
        let _ = session.open("absent.zip", None);
        assert!(matches!(
            session.opened("extract"),
            Err(Error::InvalidState { state: SessionState::Failed, .. })
        ));
    }

    #[test]
    fn open_prompt_prefers_session_password() {
        struct Asks(usize);
        impl ProgressPort for Asks {
            fn progress(&mut self, _: &crate::Progress) -> polyarc_codec::Flow {
                polyarc_codec::Flow::Continue
            }
            fn password(&mut self, _: &PasswordPrompt) -> Option<String> {
                self.0 += 1;
                Some("from-port".into())
            }
        }

        let prompt_for = PasswordPrompt {
            decoder: "7z",
            entry: None,
        };
        let mut port = Asks(0);
        let mut prompt = OpenPrompt {
            password: Some("given"),
            port: &mut port,
            stream_name: None,
        };
        assert_eq!(prompt.password(&prompt_for).as_deref(), Some("given"));

        prompt.password = None;
        assert_eq!(prompt.password(&prompt_for).as_deref(), Some("from-port"));
        assert_eq!(port.0, 1);
    }
}
