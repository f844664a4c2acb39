use std::fmt;
use std::path::PathBuf;

use polyarc_codec::{Flow, PasswordPrompt};

/// A progress report: bytes written so far, the expected total and the entry
/// being written.
#[derive(Clone, Debug, PartialEq)]
pub struct Progress {
    pub bytes_processed: u64,
    pub total_bytes: Option<u64>,
    pub current_file: Option<PathBuf>,
}

impl Progress {
    pub fn percentage(&self) -> Option<f32> {
        self.total_bytes.map(|total| {
            if total == 0 {
                0.0
            } else {
                (self.bytes_processed as f32 / total as f32) * 100.0
            }
        })
    }
}

/// Caller-side callbacks for open and extract.
///
/// Calls are synchronous and made on the caller's thread, one at a time.
pub trait ProgressPort {
    fn progress(&mut self, progress: &Progress) -> Flow;

    /// Asked when an archive needs a password that the session was not
    /// given.
    fn password(&mut self, _prompt: &PasswordPrompt) -> Option<String> {
        None
    }
}

impl<P: ProgressPort + ?Sized> ProgressPort for &mut P {
    fn progress(&mut self, progress: &Progress) -> Flow {
        (**self).progress(progress)
    }

    fn password(&mut self, prompt: &PasswordPrompt) -> Option<String> {
        (**self).password(prompt)
    }
}

/// Ignores progress and never supplies a password.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressPort for NoProgress {
    fn progress(&mut self, _: &Progress) -> Flow {
        Flow::Continue
    }
}

type ProgressFn = Box<dyn FnMut(&Progress) -> Flow + Send>;
type PasswordFn = Box<dyn FnMut(&PasswordPrompt) -> Option<String> + Send>;

/// A [`ProgressPort`] assembled from closures.
#[derive(Default)]
pub struct Callbacks {
    on_progress: Option<ProgressFn>,
    on_password: Option<PasswordFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress(mut self, f: impl FnMut(&Progress) -> Flow + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_password(
        mut self,
        f: impl FnMut(&PasswordPrompt) -> Option<String> + Send + 'static,
    ) -> Self {
        self.on_password = Some(Box::new(f));
        self
    }
}

impl ProgressPort for Callbacks {
    fn progress(&mut self, progress: &Progress) -> Flow {
        self.on_progress
            .as_mut()
            .map_or(Flow::Continue, |f| f(progress))
    }

    fn password(&mut self, prompt: &PasswordPrompt) -> Option<String> {
        self.on_password.as_mut().and_then(|f| f(prompt))
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_password", &self.on_password.is_some())
            .finish()
    }
}
