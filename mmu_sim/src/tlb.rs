/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::collections::HashMap;

use log::trace;

use crate::process::ProcessId;

/// Key of a cached translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TlbKey {
    pub pid: ProcessId,
    pub virtual_page: usize,
}

impl TlbKey {
    pub fn new(pid: ProcessId, virtual_page: usize) -> Self {
        Self { pid, virtual_page }
    }
}

/// Snapshot of one cached translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TlbEntry {
    pub key: TlbKey,
    pub frame: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TlbStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

#[derive(Debug)]
struct Node {
    key: TlbKey,
    frame: usize,

    /// neighbour towards the most recently used end
    prev: Option<usize>,

    /// neighbour towards the least recently used end
    next: Option<usize>,
}

/// Capacity-bounded translation cache with least-recently-used eviction.
///
/// Entries live in a slab and are chained into a doubly linked recency list
/// (`head` is the most recently used entry, `tail` the least recently used
/// one). `slots` maps a key to its slab index, so lookup, insert and evict
/// are all O(1).
#[derive(Debug)]
pub struct TranslationCache {
    capacity: usize,
    slots: HashMap<TlbKey, usize>,
    nodes: Vec<Node>,

    /// unused slab indices
    free: Vec<usize>,

    head: Option<usize>,
    tail: Option<usize>,

    hits: u64,
    misses: u64,
}

impl TranslationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: HashMap::with_capacity(capacity + 1),
            nodes: Vec::with_capacity(capacity + 1),
            free: Vec::new(),
            head: None,
            tail: None,
            hits: 0,
            misses: 0,
        }
    }

    /// Looks up a translation.
    ///
    /// A hit promotes the entry to most recently used, a miss changes
    /// nothing but the miss counter.
    pub fn lookup(&mut self, pid: ProcessId, virtual_page: usize) -> Option<usize> {
        match self.slots.get(&TlbKey::new(pid, virtual_page)) {
            Some(&slot) => {
                self.hits += 1;
                self.detach(slot);
                self.push_front(slot);
                Some(self.nodes[slot].frame)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Inserts or overwrites a translation and marks it most recently used.
    ///
    /// If the cache grows beyond its capacity, the least recently used entry
    /// is evicted.
    pub fn insert(&mut self, pid: ProcessId, virtual_page: usize, frame: usize) {
        let key = TlbKey::new(pid, virtual_page);

        if let Some(&slot) = self.slots.get(&key) {
            self.nodes[slot].frame = frame;
            self.detach(slot);
            self.push_front(slot);
            return;
        }

        let node = Node {
            key,
            frame,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        self.slots.insert(key, slot);
        self.push_front(slot);

        if self.slots.len() > self.capacity {
            self.evict_least_recently_used();
        }
    }

    /// Removes every entry of process `pid`
    pub fn invalidate_process(&mut self, pid: ProcessId) {
        let stale: Vec<usize> = self
            .slots
            .iter()
            .filter(|(key, _)| key.pid == pid)
            .map(|(_, slot)| *slot)
            .collect();

        for slot in stale {
            self.remove_slot(slot);
        }
    }

    /// Drops all entries and zeroes the counters
    pub fn reset(&mut self) {
        self.slots.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.hits = 0;
        self.misses = 0;
    }

    /// Checks for `key` without touching counters or recency
    pub fn contains(&self, key: &TlbKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn stats(&self) -> TlbStats {
        TlbStats {
            hits: self.hits,
            misses: self.misses,
            len: self.len(),
            capacity: self.capacity,
        }
    }

    /// All entries, most recently used first
    pub fn entries(&self) -> Vec<TlbEntry> {
        let mut res = Vec::with_capacity(self.len());
        let mut curr = self.head;
        while let Some(slot) = curr {
            let node = &self.nodes[slot];
            res.push(TlbEntry {
                key: node.key,
                frame: node.frame,
            });
            curr = node.next;
        }
        res
    }

    fn evict_least_recently_used(&mut self) {
        if let Some(slot) = self.tail {
            let key = self.nodes[slot].key;
            trace!(
                "TLB evict: pid={} page={} frame={}",
                key.pid,
                key.virtual_page,
                self.nodes[slot].frame
            );
            self.remove_slot(slot);
        }
    }

    fn remove_slot(&mut self, slot: usize) {
        self.detach(slot);
        self.slots.remove(&self.nodes[slot].key);
        self.free.push(slot);
    }

    /// Unlinks `slot` from the recency list
    fn detach(&mut self, slot: usize) {
        let (prev, next) = {
            let node = &self.nodes[slot];
            (node.prev, node.next)
        };

        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }

        let node = &mut self.nodes[slot];
        node.prev = None;
        node.next = None;
    }

    /// Links a detached `slot` in as most recently used
    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        {
            let node = &mut self.nodes[slot];
            node.prev = None;
            node.next = old_head;
        }

        match old_head {
            Some(old_head) => self.nodes[old_head].prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }
}
