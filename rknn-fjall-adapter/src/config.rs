use fjall::{CompressionType, Config, PartitionCreateOptions};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU16, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

/// Partition holding the node records when none is configured.
pub const DEFAULT_PARTITION: &str = "rknn_nodes";

/// Fjall keyspace and partition settings for a [`FjallStore`](crate::FjallStore).
///
/// Clones share the same settings. Values are fixed once a store has been
/// opened from the config; build a new config to change them.
#[derive(Clone)]
pub struct FjallConfig {
    inner: Arc<FjallConfigInner>,
}

impl FjallConfig {
    /// Defaults: 64 MB block cache, 128 MB write buffer, 512 MB journal,
    /// 32 MB memtables, 10 bloom filter bits per key, LZ4 compression.
    pub fn new() -> FjallConfig {
        FjallConfig {
            inner: Arc::new(FjallConfigInner::new()),
        }
    }

    pub fn builder() -> FjallConfigBuilder {
        FjallConfigBuilder::new()
    }

    pub(crate) fn keyspace_config(&self) -> Config {
        let inner = &self.inner;
        let mut config = Config::new(self.db_path())
            .manual_journal_persist(inner.manual_journal_persist.load(Ordering::Relaxed))
            .flush_workers(inner.flush_workers.load(Ordering::Relaxed))
            .compaction_workers(inner.compaction_workers.load(Ordering::Relaxed))
            .cache_size(inner.block_cache_capacity.load(Ordering::Relaxed))
            .max_journaling_size(inner.max_journaling_size.load(Ordering::Relaxed))
            .max_write_buffer_size(inner.max_write_buffer_size.load(Ordering::Relaxed));

        let fsync = inner.fsync_frequency.load(Ordering::Relaxed);
        if fsync > 0 {
            config = config.fsync_ms(Some(fsync));
        }
        config
    }

    pub(crate) fn partition_config(&self) -> PartitionCreateOptions {
        let bits = self.bloom_filter_bits();
        PartitionCreateOptions::default()
            .bloom_filter_bits(if bits < 0 { None } else { Some(bits as u8) })
            .compression(self.compression_type())
            .max_memtable_size(self.max_memtable_size())
            .block_size(self.block_size())
    }

    /// Directory of the keyspace; empty until set.
    pub fn db_path(&self) -> &str {
        self.inner.db_path.get().map(String::as_str).unwrap_or("")
    }

    pub fn partition_name(&self) -> &str {
        self.inner
            .partition_name
            .get()
            .map(String::as_str)
            .unwrap_or(DEFAULT_PARTITION)
    }

    pub fn manual_journal_persist(&self) -> bool {
        self.inner.manual_journal_persist.load(Ordering::Relaxed)
    }

    pub fn flush_workers(&self) -> usize {
        self.inner.flush_workers.load(Ordering::Relaxed)
    }

    pub fn compaction_workers(&self) -> usize {
        self.inner.compaction_workers.load(Ordering::Relaxed)
    }

    pub fn block_cache_capacity(&self) -> u64 {
        self.inner.block_cache_capacity.load(Ordering::Relaxed)
    }

    pub fn max_journaling_size(&self) -> u64 {
        self.inner.max_journaling_size.load(Ordering::Relaxed)
    }

    pub fn max_write_buffer_size(&self) -> u64 {
        self.inner.max_write_buffer_size.load(Ordering::Relaxed)
    }

    /// Milliseconds between background fsyncs; 0 disables them.
    pub fn fsync_frequency(&self) -> u16 {
        self.inner.fsync_frequency.load(Ordering::Relaxed)
    }

    /// Whether closing (or dropping) the store persists the journal first.
    pub fn commit_before_close(&self) -> bool {
        self.inner.commit_before_close.load(Ordering::Relaxed)
    }

    /// Bloom filter bits per key; negative disables the filter.
    pub fn bloom_filter_bits(&self) -> i8 {
        self.inner.bloom_filter_bits.load(Ordering::Relaxed)
    }

    pub fn compression_type(&self) -> CompressionType {
        *self.inner.compression_type.read()
    }

    pub fn max_memtable_size(&self) -> u32 {
        self.inner.max_memtable_size.load(Ordering::Relaxed)
    }

    pub fn block_size(&self) -> u32 {
        self.inner.block_size.load(Ordering::Relaxed)
    }
}

impl Default for FjallConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct FjallConfigInner {
    db_path: OnceLock<String>,
    partition_name: OnceLock<String>,
    manual_journal_persist: AtomicBool,
    flush_workers: AtomicUsize,
    compaction_workers: AtomicUsize,
    block_cache_capacity: AtomicU64,
    max_journaling_size: AtomicU64,
    max_write_buffer_size: AtomicU64,
    fsync_frequency: AtomicU16,
    commit_before_close: AtomicBool,
    bloom_filter_bits: AtomicI8,
    compression_type: RwLock<CompressionType>,
    max_memtable_size: AtomicU32,
    block_size: AtomicU32,
}

impl FjallConfigInner {
    const DEFAULT_BLOCK_CACHE_MB: u64 = 64;
    const DEFAULT_WRITE_BUFFER_MB: u64 = 128;
    const DEFAULT_MAX_JOURNALING_MB: u64 = 512;
    const DEFAULT_MEMTABLE_MB: u32 = 32;

    fn new() -> FjallConfigInner {
        let cpus = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(4);

        FjallConfigInner {
            db_path: OnceLock::new(),
            partition_name: OnceLock::new(),
            manual_journal_persist: AtomicBool::new(false),
            flush_workers: AtomicUsize::new(cpus.max(1)),
            compaction_workers: AtomicUsize::new((cpus / 2).max(1)),
            block_cache_capacity: AtomicU64::new(Self::DEFAULT_BLOCK_CACHE_MB * 1_024 * 1_024),
            max_journaling_size: AtomicU64::new(Self::DEFAULT_MAX_JOURNALING_MB * 1_024 * 1_024),
            max_write_buffer_size: AtomicU64::new(Self::DEFAULT_WRITE_BUFFER_MB * 1_024 * 1_024),
            fsync_frequency: AtomicU16::new(0),
            commit_before_close: AtomicBool::new(true),
            bloom_filter_bits: AtomicI8::new(10),
            compression_type: RwLock::new(CompressionType::Lz4),
            max_memtable_size: AtomicU32::new(Self::DEFAULT_MEMTABLE_MB * 1_024 * 1_024),
            block_size: AtomicU32::new(4 * 1_024),
        }
    }
}

/// Consuming builder for [`FjallConfig`].
///
/// ```rust,ignore
/// let config = FjallConfig::builder()
///     .low_memory_preset()
///     .db_path("/tmp/points")
///     .build();
/// ```
pub struct FjallConfigBuilder {
    config: FjallConfig,
}

impl FjallConfigBuilder {
    pub fn new() -> FjallConfigBuilder {
        FjallConfigBuilder {
            config: FjallConfig::new(),
        }
    }

    /// Large caches, all cores for flushing and a 100 ms fsync interval.
    pub fn production_preset(self) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(4);
        self.block_cache_capacity(256 * 1024 * 1024)
            .max_write_buffer_size(128 * 1024 * 1024)
            .max_memtable_size(32 * 1024 * 1024)
            .flush_workers(cpus)
            .compaction_workers((cpus / 2).max(1))
            .bloom_filter_bits(10)
            .fsync_frequency(100)
            .compression_type(CompressionType::Lz4)
    }

    /// Bulk loading: big buffers and journal persistence left to `flush`.
    pub fn high_throughput_preset(self) -> Self {
        let cpus = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(4);
        self.block_cache_capacity(512 * 1024 * 1024)
            .max_write_buffer_size(256 * 1024 * 1024)
            .max_memtable_size(64 * 1024 * 1024)
            .flush_workers(cpus)
            .compaction_workers(cpus)
            .manual_journal_persist(true)
    }

    /// Small caches and a single worker each; suited to tests.
    pub fn low_memory_preset(self) -> Self {
        self.block_cache_capacity(16 * 1024 * 1024)
            .max_write_buffer_size(32 * 1024 * 1024)
            .max_memtable_size(8 * 1024 * 1024)
            .flush_workers(1)
            .compaction_workers(1)
            .bloom_filter_bits(10)
    }

    pub fn db_path(self, db_path: &str) -> Self {
        let _ = self.config.inner.db_path.set(db_path.to_string());
        self
    }

    /// Partition name; fjall accepts ASCII alphanumerics plus `_-#$`.
    pub fn partition_name(self, name: &str) -> Self {
        let _ = self.config.inner.partition_name.set(name.to_string());
        self
    }

    pub fn manual_journal_persist(self, value: bool) -> Self {
        self.config.inner.manual_journal_persist.store(value, Ordering::Relaxed);
        self
    }

    pub fn flush_workers(self, count: usize) -> Self {
        self.config.inner.flush_workers.store(count, Ordering::Relaxed);
        self
    }

    pub fn compaction_workers(self, count: usize) -> Self {
        self.config.inner.compaction_workers.store(count, Ordering::Relaxed);
        self
    }

    pub fn block_cache_capacity(self, bytes: u64) -> Self {
        self.config.inner.block_cache_capacity.store(bytes, Ordering::Relaxed);
        self
    }

    pub fn max_journaling_size(self, bytes: u64) -> Self {
        self.config.inner.max_journaling_size.store(bytes, Ordering::Relaxed);
        self
    }

    pub fn max_write_buffer_size(self, bytes: u64) -> Self {
        self.config.inner.max_write_buffer_size.store(bytes, Ordering::Relaxed);
        self
    }

    pub fn fsync_frequency(self, millis: u16) -> Self {
        self.config.inner.fsync_frequency.store(millis, Ordering::Relaxed);
        self
    }

    pub fn commit_before_close(self, value: bool) -> Self {
        self.config.inner.commit_before_close.store(value, Ordering::Relaxed);
        self
    }

    pub fn bloom_filter_bits(self, bits: i8) -> Self {
        self.config.inner.bloom_filter_bits.store(bits, Ordering::Relaxed);
        self
    }

    pub fn compression_type(self, compression: CompressionType) -> Self {
        *self.config.inner.compression_type.write() = compression;
        self
    }

    pub fn max_memtable_size(self, bytes: u32) -> Self {
        self.config.inner.max_memtable_size.store(bytes, Ordering::Relaxed);
        self
    }

    pub fn block_size(self, bytes: u32) -> Self {
        self.config.inner.block_size.store(bytes, Ordering::Relaxed);
        self
    }

    pub fn build(self) -> FjallConfig {
        self.config
    }
}

impl Default for FjallConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
