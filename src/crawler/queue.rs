use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::crawler::url_canon::{canonicalize, host_of};
use crate::domain::QueueItem;

#[derive(Debug, Clone, Eq, PartialEq)]
struct Entry {
    item: QueueItem,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on priority; ties broken FIFO (earlier added_at wins, so it
        // must compare as "greater" to come out of the max-heap first).
        self.item
            .priority
            .cmp(&other.item.priority)
            .then_with(|| other.item.added_at.cmp(&self.item.added_at))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Outcome of a `next()` call.
pub enum NextResult {
    /// An item is ready to crawl now.
    Item(QueueItem),
    /// Nothing is ready right now, but work is still in flight — try again later.
    Empty,
    /// No item is queued and nothing is in flight: the scan can terminate.
    Drained,
}

/// Priority-ordered crawl frontier for a single scan.
///
/// Only the owning `CrawlCoordinator` task touches a given queue, so its
/// internals are plain (non-shared) collections — no internal locking.
pub struct CrawlQueue {
    heap: BinaryHeap<Entry>,
    seen: HashSet<String>,
    in_flight: HashSet<String>,
    last_access: HashMap<String, Instant>,
    default_delay: Duration,
    paused: bool,
}

impl CrawlQueue {
    pub fn new(default_delay: Duration) -> Self {
        CrawlQueue {
            heap: BinaryHeap::new(),
            seen: HashSet::new(),
            in_flight: HashSet::new(),
            last_access: HashMap::new(),
            default_delay,
            paused: false,
        }
    }

    /// Canonicalize and admit `item` unless its canonical URL has already been seen.
    pub fn add(&mut self, mut item: QueueItem) {
        if self.paused {
            return;
        }
        item.url = canonicalize(&item.url);
        if self.seen.insert(item.url.clone()) {
            self.heap.push(Entry { item });
        }
    }

    /// Pop the highest-priority ready item, applying the per-domain gate.
    /// `delay_for` maps a host to its configured crawl delay (robots
    /// `Crawl-delay` if present, else the queue's default).
    pub async fn next(&mut self, delay_for: impl Fn(&str) -> Duration) -> NextResult {
        let Some(Entry { item }) = self.heap.pop() else {
            return if self.in_flight.is_empty() {
                NextResult::Drained
            } else {
                NextResult::Empty
            };
        };

        if let Some(host) = host_of(&item.url) {
            let delay = delay_for(&host);
            if let Some(last) = self.last_access.get(&host) {
                let ready_at = *last + delay;
                let now = Instant::now();
                if ready_at > now {
                    tokio::time::sleep(ready_at - now).await;
                }
            }
            self.last_access.insert(host, Instant::now());
        }

        self.in_flight.insert(item.url.clone());
        NextResult::Item(item)
    }

    pub fn done(&mut self, url: &str) {
        self.in_flight.remove(&canonicalize(url));
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.seen.clear();
        self.in_flight.clear();
    }

    pub fn size(&self) -> usize {
        self.heap.len()
    }

    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}
