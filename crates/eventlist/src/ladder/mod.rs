//! Ladder queue: an approximately O(1) priority queue for simulation event
//! streams.
//!
//! # Structure
//!
//! ```text
//!   Top      unsorted, events at or after `top_start`        (running min/max)
//!    │  epoch: bucket-sort all of Top into rung 0
//!    ▼
//!   Rung 0   [b0][b1][b2]...[bn]     uniform width, cursor ──► next bucket
//!    │  a bucket with more than `threshold` events spawns a finer rung
//!    ▼
//!   Rung k   [b0][b1]...             at most 8 rungs
//!    │  the next non-empty bucket is sorted into Bottom
//!    ▼
//!   Bottom   sorted; delete_min pops its head
//! ```
//!
//! Every event lives in exactly one tier, and
//! `Bottom < deepest rung < ... < rung 0 < Top` holds between tiers.
//! An event is routed to the shallowest rung whose cursor time it has
//! reached; anything earlier than every cursor belongs in Bottom. When Bottom
//! grows past the threshold it is redistributed into a rung again: the
//! deepest rung is rewound if Bottom fits inside it, otherwise a new rung
//! spans Bottom's range.

mod chain;

use crate::arena::Arena;
use crate::error::{fatal, StructuralError};
use crate::event::{EventHandle, ListId, SimEvent};
use crate::list::{check_detached, check_timestamp, EventList, EventListKind};
use chain::Chain;
use pdes_types::Timestamp;
use std::cmp::Ordering;
use tracing::{debug, trace, warn};

/// Bucket occupancy above which a bucket is split into a new rung.
pub const DEFAULT_THRESHOLD: usize = 50;

/// Maximum ladder depth.
pub const MAX_RUNGS: usize = 8;

/// Where a node currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Top,
    Rung { rung: usize, bucket: usize },
    Bottom,
}

#[derive(Debug)]
pub(super) struct LadderNode<T, E> {
    event: SimEvent<T, E>,
    tier: Tier,
    prev: Option<u32>,
    next: Option<u32>,
}

#[derive(Debug)]
struct Rung<T> {
    start: T,
    width: T,
    /// Index of the next bucket to drain. Buckets before it are empty.
    cur: usize,
    buckets: Vec<Chain>,
    len: usize,
}

impl<T: Timestamp> Rung<T> {
    /// A rung starting at `start` whose buckets reach past `end`.
    ///
    /// Returns `None` when `width` is too small to make progress.
    fn covering(start: T, width: T, end: T) -> Option<Self> {
        let last = end.bucket_index(start, width);
        if last < 0 {
            return None;
        }
        let mut count = last as usize + 1;
        // Float rounding can leave `end` on the closing boundary.
        if T::bucket_start(start, width, count).cmp_time(&end) != Ordering::Greater {
            count += 1;
        }
        if T::bucket_start(start, width, count).cmp_time(&end) != Ordering::Greater {
            return None;
        }
        Some(Self {
            start,
            width,
            cur: 0,
            buckets: vec![Chain::default(); count],
            len: 0,
        })
    }

    fn count(&self) -> usize {
        self.buckets.len()
    }

    /// Start time of the cursor bucket.
    fn cursor_time(&self) -> T {
        T::bucket_start(self.start, self.width, self.cur)
    }
}

/// Occupancy of each ladder tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounts {
    pub top: usize,
    pub rungs: usize,
    pub bottom: usize,
}

impl TierCounts {
    pub fn total(&self) -> usize {
        self.top + self.rungs + self.bottom
    }
}

/// Structural activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LadderStats {
    /// Times Top was emptied into the ladder.
    pub epochs: u64,
    /// Rungs created, from Top, an overfull bucket, or a Bottom spill.
    pub rungs_spawned: u64,
    /// Times an overfull Bottom was redistributed into a rung.
    pub bottom_spills: u64,
}

/// Ladder queue with amortized O(1) insert and delete-min for near-uniform
/// timestamp distributions.
#[derive(Debug)]
pub struct LadderQueue<T, E> {
    id: ListId,
    nodes: Arena<LadderNode<T, E>>,
    threshold: usize,

    top: Chain,
    top_min: Option<T>,
    top_max: Option<T>,
    /// Events at or after this time go to Top. `None` until the first epoch.
    top_start: Option<T>,

    rungs: Vec<Rung<T>>,
    bottom: Chain,

    stats: LadderStats,
}

impl<T: Timestamp, E> Default for LadderQueue<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Timestamp, E> LadderQueue<T, E> {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_THRESHOLD)
    }

    /// Create a ladder that splits buckets holding more than `threshold`
    /// events. A threshold of zero is treated as one.
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            id: ListId::next(),
            nodes: Arena::default(),
            threshold: threshold.max(1),
            top: Chain::default(),
            top_min: None,
            top_max: None,
            top_start: None,
            rungs: Vec::with_capacity(MAX_RUNGS),
            bottom: Chain::default(),
            stats: LadderStats::default(),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Events held by each tier. Always sums to `len()`.
    pub fn tier_counts(&self) -> TierCounts {
        TierCounts {
            top: self.top.len(),
            rungs: self.rungs.iter().map(|rung| rung.len).sum(),
            bottom: self.bottom.len(),
        }
    }

    /// Number of rungs currently allocated.
    pub fn active_rungs(&self) -> usize {
        self.rungs.len()
    }

    pub fn stats(&self) -> LadderStats {
        self.stats
    }

    fn time(&self, slot: u32) -> T {
        self.nodes.node(slot).event.timestamp()
    }

    fn set_tier(&mut self, slot: u32, tier: Tier) {
        self.nodes.node_mut(slot).tier = tier;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Routing
    // ═══════════════════════════════════════════════════════════════════════

    /// Place an unlinked node into the tier its timestamp belongs to.
    fn enqueue(&mut self, slot: u32) -> Result<(), StructuralError> {
        let time = self.time(slot);

        let to_top = match self.top_start {
            None => true,
            Some(start) => time.cmp_time(&start) != Ordering::Less,
        };
        if to_top {
            self.push_top(slot);
            return Ok(());
        }

        if let Some(rung) = self.route(time) {
            return self.push_rung(rung, slot);
        }
        if self.bottom.len() < self.threshold {
            self.insert_bottom(slot);
            return Ok(());
        }

        // Bottom is full. Make room, then route again: the rewound or new
        // rung may now cover this event.
        self.spill_bottom()?;
        match self.route(time) {
            Some(rung) => self.push_rung(rung, slot),
            None => {
                self.insert_bottom(slot);
                Ok(())
            }
        }
    }

    /// The shallowest rung whose cursor `time` has reached.
    fn route(&self, time: T) -> Option<usize> {
        self.rungs
            .iter()
            .position(|rung| time.cmp_time(&rung.cursor_time()) != Ordering::Less)
    }

    fn push_top(&mut self, slot: u32) {
        let time = self.time(slot);
        self.top.push_front(&mut self.nodes, slot);
        self.top_min = Some(self.top_min.map_or(time, |min| min.earlier(time)));
        self.top_max = Some(self.top_max.map_or(time, |max| max.later(time)));
        self.set_tier(slot, Tier::Top);
    }

    fn push_rung(&mut self, rung_index: usize, slot: u32) -> Result<(), StructuralError> {
        let time = self.time(slot);
        let rung = &mut self.rungs[rung_index];
        let raw = time.bucket_index(rung.start, rung.width);
        // Routing guarantees `time >= cursor_time`; rounding may still land
        // one bucket short of the cursor.
        let index = raw.max(rung.cur as i64);
        if raw < 0 || index as usize >= rung.count() {
            return Err(StructuralError::BucketOutOfRange {
                rung: rung_index,
                index: raw,
                count: rung.count(),
            });
        }
        let bucket = index as usize;
        rung.buckets[bucket].push_front(&mut self.nodes, slot);
        rung.len += 1;
        self.set_tier(
            slot,
            Tier::Rung {
                rung: rung_index,
                bucket,
            },
        );
        Ok(())
    }

    /// Sorted insert, scanning from the tail since new events tend to be
    /// later than what Bottom already holds. Equal times keep arrival order.
    fn insert_bottom(&mut self, slot: u32) {
        let time = self.time(slot);
        let mut cursor = self.bottom.tail();
        while let Some(at) = cursor {
            if self.time(at).cmp_time(&time) != Ordering::Greater {
                self.bottom.insert_after(&mut self.nodes, at, slot);
                self.set_tier(slot, Tier::Bottom);
                return;
            }
            cursor = Chain::prev_of(&self.nodes, at);
        }
        self.bottom.push_front(&mut self.nodes, slot);
        self.set_tier(slot, Tier::Bottom);
    }

    fn add_rung(&mut self, rung: Rung<T>) -> Result<usize, StructuralError> {
        if self.rungs.len() >= MAX_RUNGS {
            return Err(StructuralError::RungOverflow(self.rungs.len()));
        }
        self.rungs.push(rung);
        self.stats.rungs_spawned += 1;
        Ok(self.rungs.len() - 1)
    }

    /// Move an overfull Bottom back into the ladder.
    ///
    /// Bottom only holds events earlier than the deepest cursor. If they all
    /// fall inside the deepest rung, its cursor is rewound over them;
    /// otherwise a new rung spans them. At full depth Bottom keeps growing.
    fn spill_bottom(&mut self) -> Result<(), StructuralError> {
        let (Some(head), Some(tail)) = (self.bottom.head(), self.bottom.tail()) else {
            return Ok(());
        };
        let (lo, hi) = (self.time(head), self.time(tail));

        if let Some(deepest) = self.rungs.len().checked_sub(1) {
            let rung = &self.rungs[deepest];
            if lo.cmp_time(&rung.start) != Ordering::Less {
                self.rewind(deepest, lo);
                return Ok(());
            }
        }

        if self.rungs.len() >= MAX_RUNGS {
            return Ok(());
        }
        let end = match self.rungs.last() {
            Some(rung) => rung.cursor_time(),
            None => self.top_start.unwrap_or(hi),
        }
        .later(hi);
        let width = T::bucket_width(lo, end, self.bottom.len());
        let Some(rung) = Rung::covering(lo, width, end) else {
            return Ok(());
        };

        let slots = self.bottom.take_all(&self.nodes);
        let index = self.add_rung(rung)?;
        for slot in slots {
            self.push_rung(index, slot)?;
        }
        self.stats.bottom_spills += 1;
        debug!(rung = index, low = %lo, high = %end, "Ladder bottom spilled into new rung");
        Ok(())
    }

    fn rewind(&mut self, rung_index: usize, lo: T) {
        let slots = self.bottom.take_all(&self.nodes);
        let rung = &self.rungs[rung_index];
        // Bottom events precede the cursor; rounding must not push them past
        // it or off the end of the rung.
        let limit = rung.cur.min(rung.count() - 1);
        let clamp = |time: T, rung: &Rung<T>| -> usize {
            (time.bucket_index(rung.start, rung.width).max(0) as usize).min(limit)
        };
        let new_cur = clamp(lo, rung);

        for slot in slots {
            let time = self.time(slot);
            let rung = &mut self.rungs[rung_index];
            let bucket = clamp(time, rung);
            rung.buckets[bucket].push_front(&mut self.nodes, slot);
            rung.len += 1;
            self.set_tier(
                slot,
                Tier::Rung {
                    rung: rung_index,
                    bucket,
                },
            );
        }
        self.rungs[rung_index].cur = new_cur;
        self.stats.bottom_spills += 1;
        trace!(rung = rung_index, cursor = new_cur, "Ladder cursor rewound");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Draining
    // ═══════════════════════════════════════════════════════════════════════

    /// Make Bottom non-empty if any event is left.
    fn refill_bottom(&mut self) -> Result<(), StructuralError> {
        while self.bottom.is_empty() {
            let Some(deepest) = self.rungs.len().checked_sub(1) else {
                if self.top.is_empty() {
                    return Ok(());
                }
                self.start_epoch()?;
                continue;
            };

            let rung = &mut self.rungs[deepest];
            if rung.len == 0 {
                self.rungs.pop();
                continue;
            }
            while rung.buckets[rung.cur].is_empty() {
                rung.cur += 1;
            }
            let bucket = rung.cur;

            let splittable = rung.buckets[bucket].len() > self.threshold
                && self.rungs.len() < MAX_RUNGS
                && !T::is_min_width(self.rungs[deepest].width)
                && self.has_spread(deepest, bucket);
            if !splittable || !self.split_bucket(deepest, bucket)? {
                self.bucket_to_bottom(deepest, bucket);
            }
        }
        Ok(())
    }

    /// Whether a bucket holds more than one distinct timestamp.
    fn has_spread(&self, rung: usize, bucket: usize) -> bool {
        let mut times = self.rungs[rung].buckets[bucket]
            .iter(&self.nodes)
            .map(|slot| self.time(slot));
        match times.next() {
            Some(first) => times.any(|time| time.cmp_time(&first) != Ordering::Equal),
            None => false,
        }
    }

    /// Spread an overfull bucket over a new, finer rung.
    ///
    /// Returns false, leaving the bucket untouched, when no finer rung can be
    /// built.
    fn split_bucket(&mut self, parent: usize, bucket: usize) -> Result<bool, StructuralError> {
        let (start, end, count) = {
            let rung = &self.rungs[parent];
            let chain = &rung.buckets[bucket];
            let mut lo = T::bucket_start(rung.start, rung.width, bucket);
            let mut hi = T::bucket_start(rung.start, rung.width, bucket + 1);
            for slot in chain.iter(&self.nodes) {
                let time = self.time(slot);
                lo = lo.earlier(time);
                hi = hi.later(time);
            }
            (lo, hi, chain.len())
        };
        let width = T::bucket_width(start, end, count);
        let Some(child) = Rung::covering(start, width, end) else {
            return Ok(false);
        };

        let slots = self.rungs[parent].buckets[bucket].take_all(&self.nodes);
        let rung = &mut self.rungs[parent];
        rung.len -= slots.len();
        rung.cur = bucket + 1;

        let index = self.add_rung(child)?;
        for slot in slots {
            self.push_rung(index, slot)?;
        }
        debug!(
            parent,
            bucket,
            rung = index,
            events = count,
            "Ladder bucket split into new rung"
        );
        Ok(true)
    }

    fn bucket_to_bottom(&mut self, rung_index: usize, bucket: usize) {
        let mut slots = self.rungs[rung_index].buckets[bucket].take_all(&self.nodes);
        let rung = &mut self.rungs[rung_index];
        rung.len -= slots.len();
        rung.cur = bucket + 1;

        slots.sort_by(|a, b| self.time(*a).cmp_time(&self.time(*b)));
        for slot in slots {
            self.bottom.push_back(&mut self.nodes, slot);
            self.set_tier(slot, Tier::Bottom);
        }
    }

    /// Empty Top into the ladder. Called only when rungs and Bottom are
    /// empty.
    fn start_epoch(&mut self) -> Result<(), StructuralError> {
        let (Some(min), Some(max)) = (self.top_min, self.top_max) else {
            unreachable!("non-empty top without bounds");
        };
        let slots = self.top.take_all(&self.nodes);
        self.top_min = None;
        self.top_max = None;
        self.top_start = Some(max);
        self.stats.epochs += 1;

        let rung = if min.cmp_time(&max) == Ordering::Equal {
            None
        } else {
            Rung::covering(min, T::bucket_width(min, max, slots.len()), max)
        };

        let Some(rung) = rung else {
            // All timestamps equal (or too close to bucket): Top becomes Bottom.
            for slot in slots {
                self.insert_bottom(slot);
            }
            debug!(events = self.bottom.len(), time = %min, "Ladder epoch moved top to bottom");
            return Ok(());
        };

        let width = rung.width;
        let index = self.add_rung(rung)?;
        for slot in slots {
            self.push_rung(index, slot)?;
        }
        debug!(
            events = self.rungs[index].len,
            buckets = self.rungs[index].count(),
            width = %width,
            "Ladder epoch built rung 0"
        );
        Ok(())
    }

    fn unlink(&mut self, slot: u32) {
        match self.nodes.node(slot).tier {
            Tier::Top => {
                self.top.unlink(&mut self.nodes, slot);
                if self.top.is_empty() {
                    self.top_min = None;
                    self.top_max = None;
                }
            }
            Tier::Rung { rung, bucket } => {
                let rung = &mut self.rungs[rung];
                rung.buckets[bucket].unlink(&mut self.nodes, slot);
                rung.len -= 1;
            }
            Tier::Bottom => self.bottom.unlink(&mut self.nodes, slot),
        }
    }

    /// Earliest node of a chain without reordering anything.
    fn min_of(&self, chain: &Chain) -> Option<u32> {
        chain.iter(&self.nodes).reduce(|best, slot| {
            if self.time(slot).cmp_time(&self.time(best)) == Ordering::Less {
                slot
            } else {
                best
            }
        })
    }
}

impl<T: Timestamp, E> EventList<T, E> for LadderQueue<T, E> {
    fn id(&self) -> ListId {
        self.id
    }

    fn kind(&self) -> EventListKind {
        EventListKind::LadderQueue
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    /// O(1) when Bottom is populated; otherwise scans the bucket (or Top)
    /// that the next `delete_min` would drain.
    fn peek_min(&self) -> Option<&SimEvent<T, E>> {
        let slot = match self.bottom.head() {
            Some(head) => Some(head),
            None => match self.rungs.iter().rev().find(|rung| rung.len > 0) {
                Some(rung) => rung.buckets[rung.cur..]
                    .iter()
                    .find(|bucket| !bucket.is_empty())
                    .and_then(|bucket| self.min_of(bucket)),
                None => self.min_of(&self.top),
            },
        }?;
        Some(&self.nodes.node(slot).event)
    }

    fn delete_min(&mut self) -> Option<SimEvent<T, E>> {
        if self.bottom.is_empty() {
            if let Err(e) = self.refill_bottom() {
                fatal(e);
            }
        }
        let slot = self.bottom.pop_front(&mut self.nodes)?;
        Some(self.nodes.remove(slot).event.detach())
    }

    fn try_insert(&mut self, event: SimEvent<T, E>) -> Result<EventHandle, StructuralError> {
        check_detached(&event)?;
        check_timestamp(event.timestamp())?;

        let (slot, generation) = self.nodes.insert(LadderNode {
            event,
            tier: Tier::Top,
            prev: None,
            next: None,
        });
        let handle = EventHandle {
            list: self.id,
            slot,
            generation,
        };
        self.nodes.node_mut(slot).event.attach(handle);
        if let Err(e) = self.enqueue(slot) {
            self.nodes.remove(slot);
            return Err(e);
        }
        Ok(handle)
    }

    fn try_cancel(&mut self, handle: EventHandle) -> Result<SimEvent<T, E>, StructuralError> {
        let slot = self.nodes.resolve(self.id, handle)?;
        self.unlink(slot);
        Ok(self.nodes.remove(slot).event.detach())
    }

    fn try_adjust(&mut self, handle: EventHandle, timestamp: T) -> Result<(), StructuralError> {
        let slot = self.nodes.resolve(self.id, handle)?;
        check_timestamp(timestamp)?;
        self.unlink(slot);
        let previous = self.time(slot);
        self.nodes.node_mut(slot).event.set_timestamp(timestamp);
        let Err(e) = self.enqueue(slot) else {
            return Ok(());
        };

        // Put the event back where it was due; drop it if even that fails.
        self.nodes.node_mut(slot).event.set_timestamp(previous);
        if self.enqueue(slot).is_err() {
            warn!(slot, "Ladder dropped an event it could not relink");
            self.nodes.remove(slot);
        }
        Err(e)
    }

    fn get(&self, handle: EventHandle) -> Option<&SimEvent<T, E>> {
        self.nodes.get(self.id, handle).map(|node| &node.event)
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.top = Chain::default();
        self.top_min = None;
        self.top_max = None;
        self.top_start = None;
        self.rungs.clear();
        self.bottom = Chain::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn drain<E>(ladder: &mut LadderQueue<u64, E>) -> Vec<u64> {
        std::iter::from_fn(|| ladder.delete_min().map(|e| e.timestamp())).collect()
    }

    fn assert_tiers<E>(ladder: &LadderQueue<u64, E>) {
        assert_eq!(ladder.tier_counts().total(), ladder.len());
        assert!(ladder.active_rungs() <= MAX_RUNGS);
    }

    #[test]
    fn test_delete_min_returns_sorted_order() {
        let mut ladder = LadderQueue::new();
        for t in [7, 3, 9, 3, 1] {
            ladder.insert(SimEvent::new(t, ()));
        }
        assert_eq!(ladder.tier_counts().top, 5);
        assert_eq!(drain(&mut ladder), vec![1, 3, 3, 7, 9]);
        assert_eq!(ladder.len(), 0);
        assert!(ladder.delete_min().is_none());
    }

    #[test]
    fn test_new_rung_after_window_advanced() {
        let mut ladder = LadderQueue::with_threshold(2);
        ladder.insert(SimEvent::new(5u64, ()));
        ladder.insert(SimEvent::new(15, ()));
        assert_eq!(drain(&mut ladder), vec![5, 15]);
        assert_eq!(ladder.stats().rungs_spawned, 1);

        // The window now ends at 15: 10 lands in Bottom, the rest in Top.
        for t in [10, 20, 30, 40] {
            ladder.insert(SimEvent::new(t, ()));
        }
        assert_eq!(
            ladder.tier_counts(),
            TierCounts {
                top: 3,
                rungs: 0,
                bottom: 1
            }
        );

        assert_eq!(ladder.delete_min().map(|e| e.timestamp()), Some(10));
        assert_eq!(ladder.stats().rungs_spawned, 1);

        assert_eq!(ladder.delete_min().map(|e| e.timestamp()), Some(20));
        assert_eq!(ladder.stats().rungs_spawned, 2);
        assert_eq!(ladder.stats().epochs, 2);

        assert_eq!(drain(&mut ladder), vec![30, 40]);
    }

    #[test]
    fn test_identical_timestamps_skip_rungs() {
        let mut ladder = LadderQueue::with_threshold(2);
        for payload in 0..10 {
            ladder.insert(SimEvent::new(42u64, payload));
        }
        assert_eq!(ladder.delete_min().map(|e| e.timestamp()), Some(42));
        assert_eq!(ladder.stats().rungs_spawned, 0);
        assert_eq!(ladder.tier_counts().bottom, 9);
        assert_eq!(drain(&mut ladder).len(), 9);
    }

    #[test]
    fn test_overfull_bucket_spawns_finer_rung() {
        let mut ladder = LadderQueue::with_threshold(2);
        ladder.insert(SimEvent::new(0u64, ()));
        ladder.insert(SimEvent::new(1_000, ()));
        for t in (100..120).rev() {
            ladder.insert(SimEvent::new(t, ()));
        }

        let mut expected: Vec<u64> = (100..120).collect();
        expected.insert(0, 0);
        expected.push(1_000);
        assert_eq!(drain(&mut ladder), expected);
        assert!(ladder.stats().rungs_spawned >= 2);
    }

    #[test]
    fn test_full_bottom_rewinds_rung() {
        let mut ladder = LadderQueue::with_threshold(2);
        ladder.insert(SimEvent::new(100u64, ()));
        ladder.insert(SimEvent::new(200, ()));
        assert_eq!(ladder.delete_min().map(|e| e.timestamp()), Some(100));

        ladder.insert(SimEvent::new(102, ()));
        ladder.insert(SimEvent::new(101, ()));
        assert_eq!(ladder.tier_counts().bottom, 2);

        ladder.insert(SimEvent::new(103, ()));
        assert_eq!(ladder.stats().bottom_spills, 1);
        assert_eq!(ladder.tier_counts().bottom, 0);
        assert_tiers(&ladder);

        assert_eq!(ladder.peek_min().map(|e| e.timestamp()), Some(101));
        assert_eq!(drain(&mut ladder), vec![101, 102, 103, 200]);
    }

    #[test]
    fn test_full_bottom_below_rung_spawns_rung() {
        let mut ladder = LadderQueue::with_threshold(2);
        ladder.insert(SimEvent::new(100u64, ()));
        ladder.insert(SimEvent::new(200, ()));
        ladder.delete_min();

        // Earlier than rung 0's start: Bottom cannot be rewound into it.
        for t in [50, 40, 30] {
            ladder.insert(SimEvent::new(t, ()));
        }
        assert_eq!(ladder.stats().bottom_spills, 1);
        assert_eq!(ladder.active_rungs(), 2);
        assert_tiers(&ladder);
        assert_eq!(drain(&mut ladder), vec![30, 40, 50, 200]);
    }

    #[test]
    fn test_cancel_from_each_tier() {
        let mut ladder = LadderQueue::with_threshold(4);
        let handles: Vec<_> = [10u64, 20, 30, 40, 50]
            .into_iter()
            .map(|t| ladder.insert(SimEvent::new(t, t)))
            .collect();
        ladder.delete_min();

        // 20..50 sit in rung buckets. 15 precedes the cursor and 60 is past
        // the window.
        let early = ladder.insert(SimEvent::new(15, 15));
        let late = ladder.insert(SimEvent::new(60, 60));
        assert_eq!(
            ladder.tier_counts(),
            TierCounts {
                top: 1,
                rungs: 4,
                bottom: 1
            }
        );

        for handle in [handles[1], handles[3], early, late] {
            let event = ladder.try_cancel(handle).unwrap();
            assert!(!event.is_scheduled());
            assert_tiers(&ladder);
        }
        assert_eq!(drain(&mut ladder), vec![30, 50]);
    }

    #[test]
    fn test_adjust_across_tiers() {
        let mut ladder = LadderQueue::with_threshold(4);
        let handles: Vec<_> = [10u64, 20, 30, 40]
            .into_iter()
            .map(|t| ladder.insert(SimEvent::new(t, t)))
            .collect();
        ladder.delete_min();

        ladder.adjust(handles[3], 15);
        ladder.adjust(handles[1], 500);
        assert_tiers(&ladder);
        assert_eq!(ladder.get(handles[1]).map(|e| e.timestamp()), Some(500));

        let order: Vec<_> =
            std::iter::from_fn(|| ladder.delete_min().map(|e| *e.payload())).collect();
        assert_eq!(order, vec![40, 30, 20]);
    }

    #[test]
    fn test_misrouted_event_is_out_of_range() {
        let mut ladder: LadderQueue<u64, ()> = LadderQueue::with_threshold(2);
        ladder.insert(SimEvent::new(100, ()));
        ladder.insert(SimEvent::new(200, ()));
        ladder.delete_min();
        assert_eq!(ladder.active_rungs(), 1);

        let (slot, _) = ladder.nodes.insert(LadderNode {
            event: SimEvent::new(50, ()),
            tier: Tier::Top,
            prev: None,
            next: None,
        });
        assert!(matches!(
            ladder.push_rung(0, slot),
            Err(StructuralError::BucketOutOfRange {
                rung: 0,
                index: -1,
                ..
            })
        ));
    }

    #[test]
    fn test_failed_routing_keeps_len_consistent() {
        let mut ladder: LadderQueue<u64, ()> = LadderQueue::with_threshold(2);
        ladder.insert(SimEvent::new(100, ()));
        let kept = ladder.insert(SimEvent::new(200, ()));
        ladder.delete_min();
        assert_eq!(ladder.active_rungs(), 1);

        // Route everything past the rung into it instead of Top.
        ladder.top_start = Some(u64::MAX);

        assert!(matches!(
            ladder.try_insert(SimEvent::new(10_000, ())),
            Err(StructuralError::BucketOutOfRange { rung: 0, .. })
        ));
        assert_eq!(ladder.len(), 1);
        assert_tiers(&ladder);

        assert!(ladder.try_adjust(kept, 10_000).is_err());
        assert_eq!(ladder.len(), 1);
        assert_tiers(&ladder);
        assert_eq!(ladder.get(kept).map(|e| e.timestamp()), Some(200));
        assert_eq!(drain(&mut ladder), vec![200]);
    }

    #[test]
    fn test_float_timestamps() {
        let mut ladder = LadderQueue::with_threshold(3);
        let times = [0.5f64, 0.25, 3.75, 1.0 / 3.0, 2.0, 0.1, 2.0, 9.99];
        for t in times {
            ladder.insert(SimEvent::new(t, ()));
        }
        let mut sorted = times.to_vec();
        sorted.sort_by(f64::total_cmp);
        let drained: Vec<f64> =
            std::iter::from_fn(|| ladder.delete_min().map(|e| e.timestamp())).collect();
        assert_eq!(drained, sorted);
    }

    #[test]
    fn test_random_hold_model_keeps_tier_invariant() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut ladder = LadderQueue::with_threshold(8);
        let mut now = 0u64;
        for _ in 0..500 {
            ladder.insert(SimEvent::new(rng.gen_range(0..1_000), ()));
        }
        for _ in 0..5_000 {
            let event = ladder.delete_min().unwrap();
            assert!(event.timestamp() >= now);
            now = event.timestamp();
            ladder.insert(SimEvent::new(now + rng.gen_range(1..1_000), ()));
            assert_tiers(&ladder);
        }
        assert_eq!(ladder.len(), 500);
    }
}
