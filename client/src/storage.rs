//! Durable client-local key/value storage.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("reading {}: {}", path.display(), source))]
    Read { path: PathBuf, source: io::Error },
    #[snafu(display("writing {}: {}", path.display(), source))]
    Write { path: PathBuf, source: io::Error },
    #[snafu(display("decoding {}: {}", path.display(), source))]
    Decode { path: PathBuf, source: bincode::Error },
    #[snafu(display("encoding storage: {}", source))]
    Encode { source: bincode::Error },
}

/// A small string map persisted to a single file on every write.
#[derive(Debug)]
pub struct LocalStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl LocalStorage {
    /// Open the storage at `path`; a missing file is an empty storage.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => bincode::deserialize(&bytes).context(DecodeSnafu { path: &path })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no storage at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(source) => return Err(Error::Read { path, source }),
        };
        Ok(LocalStorage { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.entries.insert(key.into(), value.into());
        self.flush()
    }

    fn flush(&self) -> Result<(), Error> {
        let bytes = bincode::serialize(&self.entries).context(EncodeSnafu)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).context(WriteSnafu { path: dir })?;
        }
        fs::write(&self.path, bytes).context(WriteSnafu { path: &self.path })
    }
}
