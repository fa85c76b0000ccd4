use anyhow::Context as _;
use bourse_execution::{restored_sequence, Adb, Memory, State, Status};
use bourse_types::{Key, Value};
use commonware_runtime::{buffer::PoolRef, tokio::Context, Metrics};
use commonware_storage::{adb, translator::EightCap};
use commonware_utils::{NZUsize, NZU64};
use std::num::{NonZero, NonZeroUsize};

const PARTITION_PREFIX: &str = "bourse";
const MMR_ITEMS_PER_BLOB: NonZero<u64> = NZU64!(128_000);
const LOG_ITEMS_PER_SECTION: NonZero<u64> = NZU64!(64_000);
const LOCATIONS_ITEMS_PER_BLOB: NonZero<u64> = NZU64!(128_000);
const WRITE_BUFFER: NonZeroUsize = NZUsize!(1024 * 1024); // 1MB
const BUFFER_POOL_PAGE_SIZE: NonZeroUsize = NZUsize!(4_096); // 4KB
const BUFFER_POOL_CAPACITY: NonZeroUsize = NZUsize!(8_192); // 32MB

/// Account storage behind the server.
pub enum Store {
    Memory(Memory),
    Durable(Adb<Context, EightCap>),
}

impl Store {
    /// Opens the durable store in the runtime's storage directory.
    ///
    /// Returns the store and the sequence of the last persisted instruction.
    pub async fn open(context: &Context) -> anyhow::Result<(Self, u64)> {
        let buffer_pool = PoolRef::new(BUFFER_POOL_PAGE_SIZE, BUFFER_POOL_CAPACITY);
        let adb = Adb::init(
            context.with_label("state"),
            adb::any::variable::Config {
                mmr_journal_partition: format!("{PARTITION_PREFIX}-state-mmr-journal"),
                mmr_metadata_partition: format!("{PARTITION_PREFIX}-state-mmr-metadata"),
                mmr_items_per_blob: MMR_ITEMS_PER_BLOB,
                mmr_write_buffer: WRITE_BUFFER,
                log_journal_partition: format!("{PARTITION_PREFIX}-state-log-journal"),
                log_items_per_section: LOG_ITEMS_PER_SECTION,
                log_write_buffer: WRITE_BUFFER,
                log_compression: None,
                log_codec_config: (),
                locations_journal_partition: format!(
                    "{PARTITION_PREFIX}-state-locations-journal"
                ),
                locations_items_per_blob: LOCATIONS_ITEMS_PER_BLOB,
                translator: EightCap,
                thread_pool: None,
                buffer_pool,
            },
        )
        .await
        .context("failed to initialize state ADB")?;
        let sequence = restored_sequence(&adb).await;
        Ok((Self::Durable(adb), sequence))
    }
}

impl State for Store {
    async fn get(&self, key: &Key) -> Option<Value> {
        match self {
            Self::Memory(memory) => memory.get(key).await,
            Self::Durable(adb) => State::get(adb, key).await,
        }
    }

    async fn insert(&mut self, key: Key, value: Value) {
        match self {
            Self::Memory(memory) => memory.insert(key, value).await,
            Self::Durable(adb) => State::insert(adb, key, value).await,
        }
    }

    async fn delete(&mut self, key: &Key) {
        match self {
            Self::Memory(memory) => memory.delete(key).await,
            Self::Durable(adb) => State::delete(adb, key).await,
        }
    }

    async fn apply(&mut self, changes: Vec<(Key, Status)>) {
        match self {
            Self::Memory(memory) => memory.apply(changes).await,
            Self::Durable(adb) => State::apply(adb, changes).await,
        }
    }

    async fn persist(&mut self, sequence: u64) {
        if let Self::Durable(adb) = self {
            State::persist(adb, sequence).await;
        }
    }
}
