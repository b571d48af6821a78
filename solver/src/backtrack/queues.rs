use crate::backtrack::Backtrack;
use std::marker::PhantomData;
use std::num::NonZeroU32;

/// Represents a decision level.
///
/// The ROOT is the level at which no decision has been made.
/// Each time a decision is made, the decision level increases.
///
/// As a layout optimization, the internal representation disallows the 0 value.
/// This enables the compiler to use this value to represent an `Option<DecLvl>`
/// on 32 bits (rather than 64 without this optimisation).
#[derive(Copy, Clone, Ord, PartialOrd, PartialEq, Eq, Hash)]
pub struct DecLvl(NonZeroU32);

impl DecLvl {
    /// Represents the root decision level, at which no decision has been taken yet.
    pub const ROOT: DecLvl = Self::new(0);

    pub const fn new(num_saved: u32) -> Self {
        match NonZeroU32::new(num_saved + 1) {
            Some(lvl) => DecLvl(lvl),
            None => panic!("decision level overflow"),
        }
    }

    /// Returns an integer representation of the decision level.
    /// O represents the ROOT.
    pub const fn to_int(self) -> u32 {
        self.0.get() - 1
    }

    /// The decision level immediately below this one, or `None` for the root.
    pub fn parent(self) -> Option<DecLvl> {
        match self.to_int() {
            0 => None,
            n => Some(DecLvl::new(n - 1)),
        }
    }
}

impl Default for DecLvl {
    fn default() -> Self {
        Self::ROOT
    }
}

impl std::ops::Add<u32> for DecLvl {
    type Output = DecLvl;

    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self::new(self.to_int() + rhs)
    }
}

impl From<u32> for DecLvl {
    fn from(u: u32) -> Self {
        DecLvl::new(u)
    }
}
impl From<usize> for DecLvl {
    fn from(u: usize) -> Self {
        DecLvl::new(u as u32)
    }
}
impl From<DecLvl> for usize {
    fn from(dl: DecLvl) -> Self {
        dl.to_int() as usize
    }
}

impl std::fmt::Debug for DecLvl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dl({})", self.to_int())
    }
}

/// Position of an event in an [`ObsTrail`].
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct EventIndex(NonZeroU32);

impl EventIndex {
    pub const fn new(index: usize) -> Self {
        match NonZeroU32::new(index as u32 + 1) {
            Some(id) => EventIndex(id),
            None => panic!("event index overflow"),
        }
    }
}
impl From<EventIndex> for usize {
    fn from(ei: EventIndex) -> Self {
        (ei.0.get() - 1) as usize
    }
}
impl From<usize> for EventIndex {
    fn from(u: usize) -> Self {
        Self::new(u)
    }
}

/// An observable, backtrackable queue of events.
///
/// Events are appended by a single producer and can be read by any number of
/// consumers, each with its own [`ObsTrailCursor`]. On backtrack, the events of the
/// cancelled decision levels are removed and cursors that had read past the
/// backtrack point are moved back on their next access.
#[derive(Clone)]
pub struct ObsTrail<V> {
    events: Vec<V>,
    /// Maps each decision level [DecLvl] with the index of its first event.
    backtrack_points: Vec<EventIndex>,
    /// For each backtrack that ever occurred, the size of the queue right after it.
    backtracks: Vec<EventIndex>,
}

impl<V> Default for ObsTrail<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ObsTrail<V> {
    pub fn new() -> Self {
        ObsTrail {
            events: Default::default(),
            backtrack_points: Default::default(),
            backtracks: Default::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn next_slot(&self) -> EventIndex {
        EventIndex::new(self.events.len())
    }

    pub fn push(&mut self, value: V) -> EventIndex {
        let id = self.next_slot();
        self.events.push(value);
        id
    }

    pub fn get(&self, id: EventIndex) -> &V {
        &self.events[usize::from(id)]
    }

    /// Returns the last event, if any.
    pub fn peek(&self) -> Option<&V> {
        self.events.last()
    }

    /// Creates a new reader for this queue, positioned at its first event.
    pub fn reader(&self) -> ObsTrailCursor<V> {
        ObsTrailCursor::new()
    }

    /// Returns a slice of all events, in chronological order.
    pub fn events(&self) -> &[V] {
        &self.events
    }

    /// Returns all events of the current decision level, in chronological order.
    pub fn current_level_events(&self) -> &[V] {
        let first = self.backtrack_points.last().map_or(0, |&ev| usize::from(ev));
        &self.events[first..]
    }

    fn backtrack_with_callback(&mut self, mut f: impl FnMut(&V)) {
        let after_last = self.backtrack_points.pop().expect("No backup points left.");
        let id = usize::from(after_last);
        for ev in self.events[id..].iter().rev() {
            f(ev)
        }
        self.events.truncate(id);
        self.backtracks.push(after_last);
    }
}

impl<V> Backtrack for ObsTrail<V> {
    fn save_state(&mut self) -> DecLvl {
        self.backtrack_points.push(self.next_slot());
        self.current_decision_level()
    }

    fn num_saved(&self) -> u32 {
        self.backtrack_points.len() as u32
    }

    fn restore_last(&mut self) {
        self.backtrack_with_callback(|_| ())
    }
}

/// A read position in an [`ObsTrail`].
///
/// A cursor should only be used to read from a single queue.
#[derive(Clone)]
pub struct ObsTrailCursor<V> {
    next_read: EventIndex,
    /// Number of backtracks of the queue that this cursor is aware of.
    seen_backtracks: usize,
    _phantom: PhantomData<V>,
}

impl<V> Default for ObsTrailCursor<V> {
    fn default() -> Self {
        ObsTrailCursor::new()
    }
}

impl<V> ObsTrailCursor<V> {
    pub fn new() -> Self {
        ObsTrailCursor {
            next_read: EventIndex::new(0),
            seen_backtracks: 0,
            _phantom: PhantomData,
        }
    }

    fn sync_backtrack(&mut self, queue: &ObsTrail<V>) {
        if let Some(lowest) = queue.backtracks[self.seen_backtracks..].iter().min() {
            // events from `lowest` on may have been replaced since our last read
            if self.next_read > *lowest {
                self.next_read = *lowest;
            }
            self.seen_backtracks = queue.backtracks.len();
        }
        debug_assert!(self.next_read <= queue.next_slot());
    }

    /// Number of events in the queue that were not yet read by this cursor.
    pub fn num_pending(&mut self, queue: &ObsTrail<V>) -> usize {
        self.sync_backtrack(queue);
        queue.events.len() - usize::from(self.next_read)
    }

    pub fn pop<'q>(&mut self, queue: &'q ObsTrail<V>) -> Option<&'q V> {
        self.sync_backtrack(queue);
        let next = self.next_read;
        if next < queue.next_slot() {
            self.next_read = EventIndex::new(usize::from(next) + 1);
            Some(queue.get(next))
        } else {
            None
        }
    }

    /// Marks all events currently in the queue as read.
    pub fn move_to_end(&mut self, queue: &ObsTrail<V>) {
        self.sync_backtrack(queue);
        self.next_read = queue.next_slot();
    }
}
