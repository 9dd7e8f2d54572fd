use crate::config::FjallConfig;
use fjall::{Keyspace, PartitionHandle, PersistMode};
use rknn::{KeyValueStore, RknnError, RknnResult};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Persistent [`KeyValueStore`] backed by one partition of a fjall keyspace.
///
/// Clones share the keyspace. Writes go to fjall's journal immediately;
/// [`flush`](KeyValueStore::flush) and [`close`](KeyValueStore::close)
/// persist it with `SyncAll`.
#[derive(Clone)]
pub struct FjallStore {
    inner: Arc<FjallStoreInner>,
}

impl FjallStore {
    /// Opens (or creates) the keyspace at `config.db_path()`.
    pub fn open(config: FjallConfig) -> RknnResult<FjallStore> {
        if config.db_path().is_empty() {
            return Err(RknnError::InvalidConfig(
                "fjall store needs a db_path".to_string(),
            ));
        }

        let keyspace = Keyspace::open(config.keyspace_config()).map_err(|err| {
            log::error!("Failed to open or create keyspace at {}: {}", config.db_path(), err);
            backend_error("open keyspace", err)
        })?;
        let partition = keyspace
            .open_partition(config.partition_name(), config.partition_config())
            .map_err(|err| {
                log::error!("Failed to open partition {}: {}", config.partition_name(), err);
                backend_error("open partition", err)
            })?;
        log::debug!(
            "Opened fjall store at {} (partition {})",
            config.db_path(),
            config.partition_name()
        );

        Ok(FjallStore {
            inner: Arc::new(FjallStoreInner {
                keyspace,
                partition,
                config,
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &FjallConfig {
        &self.inner.config
    }

    pub fn path(&self) -> &str {
        self.inner.config.db_path()
    }

    /// Recursively copies a closed store directory, e.g. to take a working
    /// copy of a base dataset. Fails if `to` already exists.
    pub fn copy_dir(from: impl AsRef<Path>, to: impl AsRef<Path>) -> RknnResult<()> {
        let (from, to) = (from.as_ref(), to.as_ref());
        if to.exists() {
            return Err(RknnError::InvalidConfig(format!(
                "copy target {} already exists",
                to.display()
            )));
        }
        copy_recursive(from, to)?;
        log::debug!("Copied store {} to {}", from.display(), to.display());
        Ok(())
    }

    /// Deletes a closed store directory. A missing directory is not an error.
    pub fn destroy(path: impl AsRef<Path>) -> RknnResult<()> {
        let path = path.as_ref();
        if path.exists() {
            fs::remove_dir_all(path)?;
            log::debug!("Destroyed store {}", path.display());
        }
        Ok(())
    }

    fn check_opened(&self) -> RknnResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            Err(RknnError::Closed)
        } else {
            Ok(())
        }
    }
}

fn copy_recursive(from: &Path, to: &Path) -> RknnResult<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

fn backend_error(action: &str, err: fjall::Error) -> RknnError {
    RknnError::Backend(format!("fjall failed to {}: {}", action, err))
}

struct FjallStoreInner {
    keyspace: Keyspace,
    partition: PartitionHandle,
    config: FjallConfig,
    closed: AtomicBool,
}

impl FjallStoreInner {
    fn persist(&self) -> RknnResult<()> {
        self.keyspace.persist(PersistMode::SyncAll).map_err(|err| {
            log::error!("Failed to persist keyspace: {}", err);
            backend_error("persist keyspace", err)
        })
    }
}

impl KeyValueStore for FjallStore {
    fn get(&self, key: &[u8]) -> RknnResult<Option<Vec<u8>>> {
        self.check_opened()?;
        match self.inner.partition.get(key) {
            Ok(value) => Ok(value.map(|slice| slice.to_vec())),
            Err(err) => {
                log::error!("Failed to get value from fjall partition: {}", err);
                Err(backend_error("get", err))
            }
        }
    }

    fn put(&self, key: &[u8], value: &[u8]) -> RknnResult<()> {
        self.check_opened()?;
        self.inner.partition.insert(key, value).map_err(|err| {
            log::error!("Failed to put value into fjall partition: {}", err);
            backend_error("put", err)
        })
    }

    fn delete(&self, key: &[u8]) -> RknnResult<()> {
        self.check_opened()?;
        self.inner.partition.remove(key).map_err(|err| {
            log::error!("Failed to remove key from fjall partition: {}", err);
            backend_error("remove", err)
        })
    }

    fn contains(&self, key: &[u8]) -> RknnResult<bool> {
        self.check_opened()?;
        self.inner.partition.contains_key(key).map_err(|err| {
            log::error!("Failed to check key in fjall partition: {}", err);
            backend_error("contains_key", err)
        })
    }

    fn flush(&self) -> RknnResult<()> {
        self.check_opened()?;
        self.inner.persist()
    }

    fn close(&self) -> RknnResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.inner.config.commit_before_close() {
            self.inner.persist()?;
        }
        log::debug!("Closed fjall store at {}", self.path());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl Drop for FjallStoreInner {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) || !self.config.commit_before_close() {
            return;
        }
        match self.persist() {
            Ok(_) => log::debug!("Persisted keyspace during drop"),
            Err(err) => log::error!("Failed to persist keyspace during drop: {}", err),
        }
    }
}
