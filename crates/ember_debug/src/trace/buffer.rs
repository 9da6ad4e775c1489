//! Ring buffer for trace records.
//!
//! Provides a fixed-size buffer that stores the most recent trace records,
//! indexed by (fire, pass) for queries.

use std::collections::{HashMap, VecDeque};

use super::record::{TraceEvent, TraceRecord};

/// A (fire call, pass) pair identifying one pass of one `fire()` call.
pub type PassKey = (u64, u64);

// =============================================================================
// Trace Buffer
// =============================================================================

/// A ring buffer for storing trace records.
///
/// Maintains a fixed maximum size, discarding oldest records when full.
/// Record ids are consecutive, so the records of a pass form one contiguous
/// run located through the pass index.
#[derive(Clone, Debug)]
pub struct TraceBuffer {
    /// The records, oldest first.
    records: VecDeque<TraceRecord>,
    /// Maximum number of records to store.
    max_size: usize,
    /// Next record ID to assign.
    next_id: u64,
    /// First record ID of every pass still (partly) in the buffer.
    pass_index: VecDeque<(PassKey, u64)>,
}

impl TraceBuffer {
    /// Creates a new trace buffer with the given maximum size.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
            next_id: 0,
            pass_index: VecDeque::new(),
        }
    }

    /// Creates a buffer with default size (10000 records).
    #[must_use]
    pub fn default_size() -> Self {
        Self::new(10_000)
    }

    /// Pushes a new event to the buffer.
    ///
    /// Returns the assigned record ID.
    pub fn push(&mut self, fire: u64, pass: u64, timestamp_ns: u64, event: TraceEvent) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let key = (fire, pass);
        if self.pass_index.back().map(|(k, _)| *k) != Some(key) {
            self.pass_index.push_back((key, id));
        }
        self.records
            .push_back(TraceRecord::new(id, fire, pass, timestamp_ns, event));

        while self.records.len() > self.max_size {
            self.records.pop_front();
            self.trim_index();
        }

        id
    }

    /// Drops index entries for passes with no records left.
    fn trim_index(&mut self) {
        let Some(front) = self.records.front().map(|r| r.id) else {
            self.pass_index.clear();
            return;
        };
        while self.pass_index.len() > 1 && self.pass_index[1].1 <= front {
            self.pass_index.pop_front();
        }
        if let Some(first) = self.pass_index.front_mut() {
            first.1 = first.1.max(front);
        }
    }

    /// Returns the number of records in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Clears all records from the buffer.
    pub fn clear(&mut self) {
        self.records.clear();
        self.pass_index.clear();
        // Ids stay monotonic across clears.
    }

    /// Returns an iterator over all records.
    pub fn iter(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.iter()
    }

    /// Returns the record with the given ID, if still buffered.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&TraceRecord> {
        let front = self.records.front()?.id;
        let offset = usize::try_from(id.checked_sub(front)?).ok()?;
        self.records.get(offset)
    }

    /// Returns the records of one pass.
    #[must_use]
    pub fn records_for_pass(&self, fire: u64, pass: u64) -> Vec<&TraceRecord> {
        let Some(pos) = self.pass_index.iter().position(|(k, _)| *k == (fire, pass)) else {
            return Vec::new();
        };
        let start = self.pass_index[pos].1;
        let end = self
            .pass_index
            .get(pos + 1)
            .map_or(self.next_id, |(_, id)| *id);
        (start..end).filter_map(|id| self.get(id)).collect()
    }

    /// Returns the records of one `fire()` call.
    #[must_use]
    pub fn records_for_fire(&self, fire: u64) -> Vec<&TraceRecord> {
        self.records.iter().filter(|r| r.fire == fire).collect()
    }

    /// Returns the most recent N records.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<&TraceRecord> {
        let start = self.records.len().saturating_sub(count);
        self.records.iter().skip(start).collect()
    }

    /// Returns records matching a predicate.
    pub fn filter<F>(&self, predicate: F) -> Vec<&TraceRecord>
    where
        F: Fn(&TraceRecord) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).collect()
    }

    /// Returns records of a specific event type.
    #[must_use]
    pub fn by_event_type(&self, event_type: &str) -> Vec<&TraceRecord> {
        self.filter(|r| r.event_type() == event_type)
    }

    /// Returns every buffered (fire, pass) pair, oldest first.
    #[must_use]
    pub fn passes(&self) -> Vec<PassKey> {
        self.pass_index.iter().map(|(k, _)| *k).collect()
    }

    /// Returns statistics about the buffer.
    #[must_use]
    pub fn stats(&self) -> TraceBufferStats {
        let mut event_counts = HashMap::new();
        for record in &self.records {
            *event_counts.entry(record.event_type()).or_insert(0) += 1;
        }

        TraceBufferStats {
            record_count: self.records.len(),
            max_size: self.max_size,
            oldest_pass: self.pass_index.front().map(|(k, _)| *k),
            newest_pass: self.pass_index.back().map(|(k, _)| *k),
            pass_count: self.pass_index.len(),
            event_counts,
        }
    }
}

impl Default for TraceBuffer {
    fn default() -> Self {
        Self::default_size()
    }
}

// =============================================================================
// Buffer Statistics
// =============================================================================

/// Statistics about a trace buffer.
#[derive(Clone, Debug)]
pub struct TraceBufferStats {
    /// Number of records currently in buffer.
    pub record_count: usize,
    /// Maximum buffer size.
    pub max_size: usize,
    /// Oldest pass in buffer.
    pub oldest_pass: Option<PassKey>,
    /// Newest pass in buffer.
    pub newest_pass: Option<PassKey>,
    /// Number of distinct passes.
    pub pass_count: usize,
    /// Count of each event type.
    pub event_counts: HashMap<&'static str, usize>,
}
