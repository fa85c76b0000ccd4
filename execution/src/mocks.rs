use crate::{execute, Adb, Memory};
use anyhow::Context;
use bourse_types::Instruction;
use commonware_runtime::{buffer::PoolRef, Clock, Metrics, Spawner, Storage};
use commonware_storage::{adb, translator::EightCap};
use commonware_utils::{NZUsize, NZU64};

const TEST_BUFFER_POOL_PAGES: usize = 1024;
const TEST_BUFFER_POOL_PAGE_SIZE: usize = 1024;
const TEST_MMR_ITEMS_PER_BLOB: u64 = 1024;
const TEST_MMR_WRITE_BUFFER: usize = 1024;
const TEST_LOG_ITEMS_PER_SECTION: u64 = 1024;
const TEST_LOG_WRITE_BUFFER: usize = 1024;
const TEST_LOCATIONS_ITEMS_PER_BLOB: u64 = 1024;

/// Password used for every mock account
pub const TEST_PASSWORD: &str = "correct-horse";

/// A time far enough past the epoch that fresh accounts may claim and refresh
pub const TEST_NOW: u64 = 1_700_000_000;

/// Creates a state database for testing
pub async fn create_adb<E: Spawner + Metrics + Storage + Clock>(
    context: &E,
) -> anyhow::Result<Adb<E, EightCap>> {
    let buffer_pool = PoolRef::new(
        NZUsize!(TEST_BUFFER_POOL_PAGE_SIZE),
        NZUsize!(TEST_BUFFER_POOL_PAGES),
    );

    Adb::init(
        context.with_label("state"),
        adb::any::variable::Config {
            mmr_journal_partition: String::from("state-mmr-journal"),
            mmr_metadata_partition: String::from("state-mmr-metadata"),
            mmr_items_per_blob: NZU64!(TEST_MMR_ITEMS_PER_BLOB),
            mmr_write_buffer: NZUsize!(TEST_MMR_WRITE_BUFFER),
            log_journal_partition: String::from("state-log-journal"),
            log_items_per_section: NZU64!(TEST_LOG_ITEMS_PER_SECTION),
            log_write_buffer: NZUsize!(TEST_LOG_WRITE_BUFFER),
            log_compression: None,
            log_codec_config: (),
            locations_journal_partition: String::from("state-locations-journal"),
            locations_items_per_blob: NZU64!(TEST_LOCATIONS_ITEMS_PER_BLOB),
            translator: EightCap,
            thread_pool: None,
            buffer_pool,
        },
    )
    .await
    .context("failed to initialize state ADB")
}

/// Creates a [Memory] with one signed-up account per name, in order.
///
/// Every account uses [TEST_PASSWORD] and signs up at `TEST_NOW - 1_000`.
pub async fn seeded_memory(usernames: &[&str]) -> Memory {
    let mut state = Memory::default();
    let instruction = Instruction::SignUp {
        password: TEST_PASSWORD.to_string(),
        confirm_password: TEST_PASSWORD.to_string(),
    };
    for (i, username) in usernames.iter().enumerate() {
        let sequence = i as u64 + 1;
        let events = execute(
            &mut state,
            TEST_NOW - 1_000,
            sequence,
            sequence,
            username,
            &instruction,
        )
        .await;
        assert!(
            events.iter().all(|e| e.rejection().is_none()),
            "failed to seed {username}: {events:?}"
        );
    }
    state
}
