//! Settings record kept in a file.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use crate::traits::SettingsStore;

/// [`SettingsStore`] backed by a single file.
///
/// A missing file reads as an empty store. Saves go through a temporary
/// file and a rename so a crash never leaves a half-written record.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store at `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileStore {
    type Error = io::Error;

    fn load(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    fn save(&mut self, record: &[u8]) -> Result<(), io::Error> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, record)?;
        fs::rename(&tmp, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Settings, RECORD_LEN};

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("relay-switch-{}-{}", std::process::id(), name))
            .join("settings.bin")
    }

    #[test]
    fn missing_file_is_empty() {
        let mut store = FileStore::new(scratch("missing"));
        let mut buf = [0u8; 8];
        assert_eq!(store.load(&mut buf).unwrap(), 0);
    }

    #[test]
    fn settings_survive_reopen() {
        let path = scratch("reopen");
        let settings = Settings::default()
            .with_device_name("attic")
            .with_mqtt_server("10.0.0.2", 1884);

        let mut store = FileStore::new(&path);
        settings.save(&mut store).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), RECORD_LEN as u64);

        let mut reopened = FileStore::new(&path);
        assert_eq!(Settings::load_or(&mut reopened, Settings::default()), settings);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
