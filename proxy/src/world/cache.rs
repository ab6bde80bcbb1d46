//! Process-wide deduplicated chunk store.
//!
//! The cache owns every chunk column. Worlds subscribe to entries and keep an
//! `Arc` handle per position; the cache keeps the subscriber set. Equal
//! columns at one position share an entry. Mutations are copy-on-write: an
//! entry with more than one subscriber is cloned and the mutating world moves
//! to the clone.
//!
//! Locking: the index mutex is always taken before any entry lock, and any
//! operation that holds two entry locks at once holds the index mutex too.

use super::chunk::Chunk;
use log::debug;
use parking_lot::{Mutex, RwLock};
use shared::{BlockPos, ChunkPos};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

pub type WorldId = u64;

/// How long a set-block memo stays usable.
pub const TRANSACTION_TTL: Duration = Duration::from_secs(5);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);
/// Every Nth sweep also shrinks the cache's maps.
pub const RECLAIM_EVERY: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TransactionKey {
    pos: BlockPos,
    layer: usize,
    runtime_id: u32,
}

struct Transaction {
    result: Weak<CacheEntry>,
    /// Version of `result` when the memo was taken.
    version: u64,
    created: Instant,
}

struct EntryState {
    chunk: Chunk,
    subscribers: HashSet<WorldId>,
    transactions: HashMap<TransactionKey, Transaction>,
    /// Set when the sweeper merged this entry into an equal one.
    retired_into: Option<Arc<CacheEntry>>,
    alive: bool,
    /// Bumped by every in-place mutation; memos pointing here are only valid at the recorded version.
    version: u64,
}

pub struct CacheEntry {
    id: u64,
    pos: ChunkPos,
    state: RwLock<EntryState>,
}

impl CacheEntry {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.read().subscribers.len()
    }

    pub fn is_subscribed(&self, world: WorldId) -> bool {
        self.state.read().subscribers.contains(&world)
    }

    pub fn transaction_count(&self) -> usize {
        self.state.read().transactions.len()
    }

    /// Runs `f` against the column under a read lock.
    pub fn with_chunk<R>(&self, f: impl FnOnce(&Chunk) -> R) -> R {
        f(&self.state.read().chunk)
    }

    /// The entry this one was merged into, if any.
    pub fn successor(&self) -> Option<Arc<CacheEntry>> {
        self.state.read().retired_into.clone()
    }
}

/// Follows merge links to the live entry.
pub fn resolve(entry: &Arc<CacheEntry>) -> Arc<CacheEntry> {
    let mut current = Arc::clone(entry);
    while let Some(next) = current.successor() {
        current = next;
    }
    current
}

/// Counters reported by one sweeper pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub dropped: usize,
    pub pruned_memos: usize,
    pub collapsed: usize,
}

/// Outcome of [`ChunkCache::set_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetBlockOutcome {
    Unchanged,
    InPlace,
    Copied,
    Memoized,
}

pub struct ChunkCache {
    index: Mutex<HashMap<ChunkPos, BTreeMap<u64, Arc<CacheEntry>>>>,
    next_entry_id: AtomicU64,
    next_world_id: AtomicU64,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self {
            index: Mutex::new(HashMap::new()),
            next_entry_id: AtomicU64::new(1),
            next_world_id: AtomicU64::new(1),
        }
    }

    pub fn next_world_id(&self) -> WorldId {
        self.next_world_id.fetch_add(1, Ordering::Relaxed)
    }

    fn mint(&self, pos: ChunkPos, chunk: Chunk, subscriber: WorldId) -> Arc<CacheEntry> {
        let mut subscribers = HashSet::new();
        subscribers.insert(subscriber);
        Arc::new(CacheEntry {
            id: self.next_entry_id.fetch_add(1, Ordering::Relaxed),
            pos,
            state: RwLock::new(EntryState {
                chunk,
                subscribers,
                transactions: HashMap::new(),
                retired_into: None,
                alive: true,
                version: 0,
            }),
        })
    }

    /// Subscribes `world` to an entry holding `chunk`, reusing an equal entry when one exists.
    pub fn insert(&self, world: WorldId, pos: ChunkPos, chunk: Chunk) -> Arc<CacheEntry> {
        let mut index = self.index.lock();
        let entries = index.entry(pos).or_default();

        for entry in entries.values() {
            let mut state = entry.state.write();
            if state.alive && state.chunk.content_eq(&chunk) {
                state.subscribers.insert(world);
                return Arc::clone(entry);
            }
        }

        let entry = self.mint(pos, chunk, world);
        entries.insert(entry.id, Arc::clone(&entry));
        entry
    }

    pub fn unsubscribe(&self, world: WorldId, entry: &Arc<CacheEntry>) {
        let _index = self.index.lock();
        let entry = resolve(entry);
        entry.state.write().subscribers.remove(&world);
    }

    /// Applies a block change on behalf of `world`.
    ///
    /// Returns the entry the world must hold afterwards, which differs from the input
    /// whenever the change was copied or served from a memo.
    pub fn set_block(
        &self,
        world: WorldId,
        entry: &Arc<CacheEntry>,
        pos: BlockPos,
        layer: usize,
        runtime_id: u32,
    ) -> (Arc<CacheEntry>, SetBlockOutcome) {
        let mut index = self.index.lock();
        let entry = resolve(entry);
        let (lx, lz) = (pos.x.rem_euclid(16) as usize, pos.z.rem_euclid(16) as usize);
        let key = TransactionKey {
            pos,
            layer,
            runtime_id,
        };

        let mut state = entry.state.write();
        if state.chunk.block(lx, pos.y, lz, layer) == runtime_id || !state.chunk.range().contains(pos.y) {
            return (Arc::clone(&entry), SetBlockOutcome::Unchanged);
        }

        // a retired or since-mutated target no longer holds this entry plus the edit
        let memo_target = state.transactions.get(&key).and_then(|t| {
            let target = t.result.upgrade()?;
            (!Arc::ptr_eq(&target, &entry)).then_some((target, t.version))
        });
        if let Some((target, version)) = memo_target {
            let mut target_state = target.state.write();
            if target_state.alive && target_state.version == version {
                target_state.subscribers.insert(world);
                state.subscribers.remove(&world);
                return (Arc::clone(&target), SetBlockOutcome::Memoized);
            }
            drop(target_state);
            state.transactions.remove(&key);
        }

        if state.subscribers.len() <= 1 {
            state.chunk.set_block(lx, pos.y, lz, layer, runtime_id);
            state.transactions.clear();
            state.version += 1;
            return (Arc::clone(&entry), SetBlockOutcome::InPlace);
        }

        let mut chunk = state.chunk.clone();
        chunk.set_block(lx, pos.y, lz, layer, runtime_id);
        let copy = self.mint(entry.pos, chunk, world);
        state.subscribers.remove(&world);
        state.transactions.insert(
            key,
            Transaction {
                result: Arc::downgrade(&copy),
                version: 0,
                created: Instant::now(),
            },
        );
        index
            .entry(entry.pos)
            .or_default()
            .insert(copy.id, Arc::clone(&copy));
        (copy, SetBlockOutcome::Copied)
    }

    /// Drops unsubscribed entries, prunes stale memos and merges equal entries at one position.
    pub fn sweep(&self, now: Instant) -> SweepStats {
        let mut stats = SweepStats::default();
        let mut index = self.index.lock();

        for entries in index.values_mut() {
            entries.retain(|_, entry| {
                let mut state = entry.state.write();
                let before = state.transactions.len();
                state.transactions.retain(|_, t| {
                    now.saturating_duration_since(t.created) < TRANSACTION_TTL
                        && t.result.strong_count() > 0
                });
                stats.pruned_memos += before - state.transactions.len();

                if state.subscribers.is_empty() {
                    state.alive = false;
                    stats.dropped += 1;
                    false
                } else {
                    true
                }
            });

            let ids: Vec<u64> = entries.keys().copied().collect();
            for (i, keep_id) in ids.iter().enumerate() {
                for merge_id in &ids[i + 1..] {
                    let (Some(keep), Some(merge)) = (entries.get(keep_id), entries.get(merge_id)) else {
                        continue;
                    };
                    let mut keep_state = keep.state.write();
                    let mut merge_state = merge.state.write();
                    if !keep_state.chunk.content_eq(&merge_state.chunk) {
                        continue;
                    }
                    let moved: Vec<WorldId> = merge_state.subscribers.drain().collect();
                    keep_state.subscribers.extend(moved);
                    merge_state.retired_into = Some(Arc::clone(keep));
                    merge_state.alive = false;
                    merge_state.transactions.clear();
                    drop(merge_state);
                    drop(keep_state);
                    entries.remove(merge_id);
                    stats.collapsed += 1;
                }
            }
        }

        index.retain(|_, entries| !entries.is_empty());
        stats
    }

    /// Releases spare capacity held by the index and the memo tables.
    pub fn reclaim(&self) {
        let mut index = self.index.lock();
        for entries in index.values() {
            for entry in entries.values() {
                entry.state.write().transactions.shrink_to_fit();
            }
        }
        index.shrink_to_fit();
    }

    pub fn entry_count(&self) -> usize {
        self.index.lock().values().map(|e| e.len()).sum()
    }

    pub fn entries_at(&self, pos: ChunkPos) -> Vec<Arc<CacheEntry>> {
        self.index
            .lock()
            .get(&pos)
            .map(|e| e.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the sweeper once per second until the task is aborted.
pub fn spawn_sweeper(cache: Arc<ChunkCache>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        let mut passes: u64 = 0;
        loop {
            interval.tick().await;
            passes += 1;
            let stats = cache.sweep(Instant::now());
            if stats != SweepStats::default() {
                debug!(
                    "Chunk sweep: dropped {}, pruned {} memos, collapsed {}",
                    stats.dropped, stats.pruned_memos, stats.collapsed
                );
            }
            if passes % RECLAIM_EVERY == 0 {
                cache.reclaim();
            }
        }
    })
}
