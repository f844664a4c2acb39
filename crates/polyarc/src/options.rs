use std::path::Path;

use crate::Result;

#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub perm_strategy: PermissionStrategy,
    pub strip_components: usize,
    pub preserve_timestamps: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            perm_strategy: PermissionStrategy::default(),
            strip_components: 0,
            preserve_timestamps: true,
        }
    }
}

impl ExtractOptions {
    pub fn permission_strategy(mut self, strategy: PermissionStrategy) -> Self {
        self.perm_strategy = strategy;
        self
    }

    pub fn strip_components(mut self, n: usize) -> Self {
        self.strip_components = n;
        self
    }

    pub fn preserve_timestamps(mut self, preserve: bool) -> Self {
        self.preserve_timestamps = preserve;
        self
    }
}

/// Permission application strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PermissionStrategy {
    /// Archive mode, made at least owner read/write; 0o644 when absent.
    #[default]
    Standard,
    ReadOnly,
    /// Archive mode as stored; untouched when absent.
    Preserve,
    /// Leave whatever the platform created.
    Ignore,
}

impl PermissionStrategy {
    /// Mode bits to apply for an entry whose archive mode is `mode`.
    pub fn resolve(self, mode: Option<u32>) -> Option<u32> {
        let mode = mode.map(|m| m & 0o7777);
        match self {
            Self::Standard => Some(match mode {
                Some(m) if m & 0o111 != 0 => m | 0o600,
                Some(m) => m | 0o644,
                None => 0o644,
            }),
            Self::ReadOnly => Some(0o444),
            Self::Preserve => mode,
            Self::Ignore => None,
        }
    }

    /// Apply the resolved mode to `path`. A no-op off unix.
    pub fn apply_to_path(self, path: &Path, mode: Option<u32>) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(bits) = self.resolve(mode) {
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(bits))?;
            }
        }
        #[cfg(not(unix))]
        {
            let _ = (path, mode);
        }
        Ok(())
    }
}
