//! Typed, versioned bulk persistence for wallet managers.
//!
//! A wallet manager persists per-type record sets (blocks, peers,
//! transactions, logs) under `<base>/<network>/<currency>/<type>/`.
//! The service owns the directory layout and the type/version routing;
//! registered reader and writer callbacks own the per-file format, and
//! records cross the boundary as opaque bytes.
//!
//! Locking is per instance: two services over distinct
//! `(network, currency)` pairs never contend, and never read or write
//! each other's files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Maximum byte length of the base directory component.
pub const BASE_DIR_MAX: usize = 100;
/// Maximum byte length of the network component.
pub const NETWORK_MAX: usize = 25;
/// Maximum byte length of the currency component.
pub const CURRENCY_MAX: usize = 25;
/// Maximum byte length of a type name.
pub const TYPE_NAME_MAX: usize = 25;
/// Maximum number of registered types per service.
pub const TYPE_TABLE_MAX: usize = 10;

/// Version tag for a registered type's on-disk format.
pub type FileVersion = u16;

/// The record sets readers produce: one opaque byte blob per record.
pub type RecordSet = Vec<Vec<u8>>;

/// Parses every record file under the type directory for a version.
pub type FileReader =
    Arc<dyn Fn(&Path, FileVersion) -> Result<RecordSet, FileServiceError> + Send + Sync>;

/// Persists one record under the type directory for a version.
pub type FileWriter =
    Arc<dyn Fn(&[u8], &Path, FileVersion) -> Result<(), FileServiceError> + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum FileServiceError {
    #[error("name `{name}` exceeds {limit} bytes")]
    NameTooLong { name: String, limit: usize },
    #[error("type table is full ({TYPE_TABLE_MAX} entries)")]
    TypeTableFull,
    #[error("type `{0}` is already defined")]
    DuplicateType(String),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("version {version} is not registered for type `{name}`")]
    UnknownVersion { name: String, version: FileVersion },
    #[error(transparent)]
    Io(#[from] io::Error),
}

struct TypeEntry {
    name: String,
    version: FileVersion,
    reader: FileReader,
    writer: FileWriter,
}

#[derive(Default)]
struct FileServiceInner {
    entries: Vec<TypeEntry>,
    /// Index of the entry whose version is stamped onto reads and
    /// writes. Defaults to the first entry.
    current: usize,
}

/// Typed, versioned persistence rooted at
/// `<base>/<network>/<currency>/`.
pub struct FileService {
    base: PathBuf,
    network: String,
    currency: String,
    inner: Mutex<FileServiceInner>,
}

impl FileService {
    /// Validate the naming bounds and create the
    /// `<base>/<network>` and `<base>/<network>/<currency>`
    /// directories if absent.
    pub fn new(
        base: impl Into<PathBuf>,
        network: &str,
        currency: &str,
    ) -> Result<Self, FileServiceError> {
        let base = base.into();
        check_name(&base.to_string_lossy(), BASE_DIR_MAX)?;
        check_name(network, NETWORK_MAX)?;
        check_name(currency, CURRENCY_MAX)?;

        fs::create_dir_all(base.join(network))?;
        fs::create_dir_all(base.join(network).join(currency))?;
        tracing::debug!(base = %base.display(), network, currency, "file service ready");

        Ok(FileService {
            base,
            network: network.to_string(),
            currency: currency.to_string(),
            inner: Mutex::new(FileServiceInner::default()),
        })
    }

    fn locked(&self) -> MutexGuard<'_, FileServiceInner> {
        self.inner.lock().expect("file service lock poisoned")
    }

    fn currency_dir(&self) -> PathBuf {
        self.base.join(&self.network).join(&self.currency)
    }

    fn type_dir(&self, name: &str) -> PathBuf {
        self.currency_dir().join(name)
    }

    /// Register a `{name, version, reader, writer}` entry. At most
    /// [`TYPE_TABLE_MAX`] entries; names are bounded and unique.
    pub fn define_type(
        &self,
        name: &str,
        version: FileVersion,
        reader: FileReader,
        writer: FileWriter,
    ) -> Result<(), FileServiceError> {
        check_name(name, TYPE_NAME_MAX)?;
        let mut inner = self.locked();
        if inner.entries.len() >= TYPE_TABLE_MAX {
            return Err(FileServiceError::TypeTableFull);
        }
        if inner.entries.iter().any(|e| e.name == name) {
            return Err(FileServiceError::DuplicateType(name.to_string()));
        }
        inner.entries.push(TypeEntry {
            name: name.to_string(),
            version,
            reader,
            writer,
        });
        Ok(())
    }

    /// Select the entry whose `(name, version)` pair matches as the
    /// current one; its version is stamped onto subsequent reads and
    /// writes.
    pub fn define_current_version(
        &self,
        name: &str,
        version: FileVersion,
    ) -> Result<(), FileServiceError> {
        check_name(name, TYPE_NAME_MAX)?;
        let mut inner = self.locked();
        match inner
            .entries
            .iter()
            .position(|e| e.name == name && e.version == version)
        {
            Some(index) => {
                inner.current = index;
                Ok(())
            }
            None => Err(FileServiceError::UnknownVersion {
                name: name.to_string(),
                version,
            }),
        }
    }

    /// Route to the type's reader with the type directory and the
    /// current entry's version.
    pub fn load(&self, name: &str) -> Result<RecordSet, FileServiceError> {
        check_name(name, TYPE_NAME_MAX)?;
        let (reader, version) = {
            let inner = self.locked();
            let entry = find_entry(&inner, name)?;
            (Arc::clone(&entry.reader), inner.entries[inner.current].version)
        };
        let dir = self.type_dir(name);
        fs::create_dir_all(&dir)?;
        reader(&dir, version)
    }

    /// Route one record to the type's writer with the type directory
    /// and the current entry's version.
    pub fn save(&self, record: &[u8], name: &str) -> Result<(), FileServiceError> {
        check_name(name, TYPE_NAME_MAX)?;
        let (writer, version) = {
            let inner = self.locked();
            let entry = find_entry(&inner, name)?;
            (Arc::clone(&entry.writer), inner.entries[inner.current].version)
        };
        let dir = self.type_dir(name);
        fs::create_dir_all(&dir)?;
        writer(record, &dir, version)
    }

    /// Remove the files in the type directory (non-recursive), then
    /// the directory itself. A type with no directory is not an error.
    pub fn clear(&self, name: &str) -> Result<(), FileServiceError> {
        check_name(name, TYPE_NAME_MAX)?;
        {
            let inner = self.locked();
            find_entry(&inner, name)?;
        }
        remove_type_dir(&self.type_dir(name))?;
        Ok(())
    }

    /// Remove every registered type's files and directory, then the
    /// currency directory, then the network directory, bottom-up.
    pub fn clear_all(&self) -> Result<(), FileServiceError> {
        let names: Vec<String> = {
            let inner = self.locked();
            inner.entries.iter().map(|e| e.name.clone()).collect()
        };
        for name in names {
            remove_type_dir(&self.type_dir(&name))?;
        }
        // Parent directories may hold foreign data; removal is
        // best-effort and stops at non-empty directories.
        let _ = fs::remove_dir(self.currency_dir());
        let _ = fs::remove_dir(self.base.join(&self.network));
        Ok(())
    }

    /// Available bytes on the filesystem holding the base directory.
    pub fn free_storage(&self) -> Result<u64, FileServiceError> {
        Ok(fs2::available_space(&self.base)?)
    }
}

fn check_name(name: &str, limit: usize) -> Result<(), FileServiceError> {
    if name.len() >= limit {
        return Err(FileServiceError::NameTooLong {
            name: name.to_string(),
            limit,
        });
    }
    Ok(())
}

fn find_entry<'a>(
    inner: &'a FileServiceInner,
    name: &str,
) -> Result<&'a TypeEntry, FileServiceError> {
    inner
        .entries
        .iter()
        .find(|e| e.name == name)
        .ok_or_else(|| FileServiceError::UnknownType(name.to_string()))
}

fn remove_type_dir(dir: &Path) -> Result<(), io::Error> {
    match fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    fs::remove_file(entry.path())?;
                }
            }
            fs::remove_dir(dir)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
