//! Checkpoint log tests against the RocksDB backend

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use depth_indexer::config::RocksDBConfig;
use depth_indexer::core::{AppendOutcome, Block, CheckpointStore};
use depth_indexer::database::{InMemoryCheckpointStore, RocksDBCheckpointStore};
use depth_indexer::models::PoolEvent;
use depth_indexer::recorder::SettlementPolicy;
use depth_indexer::{Timeline, Tracker};
use std::sync::Arc;
use tempfile::TempDir;

fn test_config(temp_dir: &TempDir) -> RocksDBConfig {
    RocksDBConfig {
        path: temp_dir.path().to_path_buf(),
        enable_compression: true,
        max_open_files: 100,
        write_buffer_size_mb: 16,
        max_write_buffer_number: 2,
        block_cache_size_mb: 32,
        sync_writes: true,
    }
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
}

#[test]
fn test_rows_survive_reopen() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir);

    {
        let store = RocksDBCheckpointStore::open(&config)?;
        store.append(1, ts(0), b"h1", b"s1")?;
        store.append(2, ts(5), b"h2", b"s2")?;
        store.flush()?;
    }

    let store = RocksDBCheckpointStore::open(&config)?;
    let latest = store.latest_checkpoint()?.expect("latest row");
    assert_eq!(latest.height, 2);
    assert_eq!(latest.timestamp, ts(5));
    assert_eq!(latest.hash, b"h2");
    assert_eq!(latest.snapshot, b"s2");
    assert_eq!(store.list_heights()?, vec![1, 2]);

    Ok(())
}

#[test]
fn test_append_never_overwrites() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = RocksDBCheckpointStore::open(&test_config(&temp_dir))?;

    assert_eq!(store.append(7, ts(0), b"first", b"a")?, AppendOutcome::Inserted);
    assert_eq!(store.append(7, ts(9), b"second", b"b")?, AppendOutcome::AlreadyExisted);

    let row = store.checkpoint_at(7)?.expect("row at 7");
    assert_eq!(row.timestamp, ts(0));
    assert_eq!(row.hash, b"first");
    assert_eq!(row.snapshot, b"a");
    assert_eq!(store.list_heights()?, vec![7]);

    Ok(())
}

#[test]
fn test_latest_is_max_height_not_last_written() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = RocksDBCheckpointStore::open(&test_config(&temp_dir))?;

    for height in [300u64, 2, 1_000_000, 45] {
        store.append(height, ts(height as i64), b"h", b"")?;
    }

    assert_eq!(store.latest_checkpoint()?.map(|row| row.height), Some(1_000_000));
    assert_eq!(store.list_heights()?, vec![2, 45, 300, 1_000_000]);
    assert!(store.checkpoint_at(46)?.is_none());

    Ok(())
}

#[test]
fn test_empty_snapshot_bytes_are_stored() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = RocksDBCheckpointStore::open(&test_config(&temp_dir))?;

    store.append(3, ts(0), b"h3", b"")?;
    let row = store.checkpoint_at(3)?.expect("row at 3");
    assert!(row.snapshot.is_empty());
    assert_eq!(row.hash, b"h3");

    Ok(())
}

#[test]
fn test_memory_store_matches_rocksdb_semantics() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let stores: Vec<Box<dyn CheckpointStore>> = vec![
        Box::new(InMemoryCheckpointStore::new()),
        Box::new(RocksDBCheckpointStore::open(&test_config(&temp_dir))?),
    ];

    for store in &stores {
        assert!(store.latest_checkpoint()?.is_none());
        assert!(store.list_heights()?.is_empty());
        assert_eq!(store.append(10, ts(0), b"h", b"x")?, AppendOutcome::Inserted);
        assert_eq!(store.append(5, ts(0), b"h", b"y")?, AppendOutcome::Inserted);
        assert_eq!(store.append(10, ts(0), b"h", b"z")?, AppendOutcome::AlreadyExisted);
        assert_eq!(store.list_heights()?, vec![5, 10]);
        assert_eq!(store.latest_checkpoint()?.map(|row| row.snapshot), Some(b"x".to_vec()));
    }

    Ok(())
}

#[test]
fn test_recommitted_heights_keep_rocksdb_rows() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = Arc::new(RocksDBCheckpointStore::open(&test_config(&temp_dir))?);
    let mut timeline = Timeline::new(store.clone(), Arc::new(Tracker::new()), SettlementPolicy::default());
    timeline.recover()?;

    let mut saved = Vec::new();
    for height in 0..6u64 {
        let block = Block::new(height, ts(height as i64), format!("h{}", height).into_bytes()).with_event(
            PoolEvent::Stake {
                pool: "BTC.BTC".into(),
                asset_e8: 7 * (height as i64 + 1),
                rune_e8: 2,
            },
        );
        timeline.apply_block(&block)?;
        saved.push(store.checkpoint_at(height)?.expect("row"));
    }

    for height in 0..6u64 {
        let report = timeline.commit(height, ts(100), b"replay")?;
        assert_eq!(report.outcome, AppendOutcome::AlreadyExisted);
    }

    assert_eq!(store.list_heights()?, (0..6).collect::<Vec<_>>());
    for (height, row) in saved.iter().enumerate() {
        assert_eq!(store.checkpoint_at(height as u64)?.as_ref(), Some(row));
    }

    Ok(())
}
