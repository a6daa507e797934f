//! Buffered value streams.
//!
//! A [`ValueStream`] is the value a service hands back when it produces data
//! incrementally (lines of a file, messages from a socket). Producers push
//! items and close the stream; consumers drain what has been buffered.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::value::Value;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct StreamState {
    buffer: VecDeque<Value>,
    closed: bool,
}

/// Shared handle to a buffered stream of values.
///
/// Cloning the handle shares the underlying buffer.
#[derive(Clone)]
pub struct ValueStream {
    id: u64,
    state: Arc<Mutex<StreamState>>,
}

impl ValueStream {
    /// Creates an empty, open stream.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            state: Arc::new(Mutex::new(StreamState::default())),
        }
    }

    /// Creates a closed stream holding the given items.
    pub fn from_items<I: IntoIterator<Item = Value>>(items: I) -> Self {
        let stream = Self::new();
        {
            let mut state = stream.lock();
            state.buffer.extend(items);
            state.closed = true;
        }
        stream
    }

    fn lock(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the identity of this stream.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns true if both handles refer to the same stream.
    #[must_use]
    pub fn same_stream(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Appends an item. Returns false if the stream was already closed.
    pub fn push(&self, item: Value) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.buffer.push_back(item);
        true
    }

    /// Marks the stream as complete.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    /// Returns true once the producer has closed the stream.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Takes the next buffered item, if any.
    #[must_use]
    pub fn next_item(&self) -> Option<Value> {
        self.lock().buffer.pop_front()
    }

    /// Returns the number of buffered items.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Removes and returns every buffered item.
    #[must_use]
    pub fn drain(&self) -> Vec<Value> {
        self.lock().buffer.drain(..).collect()
    }

    /// Copies the buffered items without consuming them.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Value> {
        self.lock().buffer.iter().cloned().collect()
    }
}

impl Default for ValueStream {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValueStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ValueStream")
            .field("id", &self.id)
            .field("buffered", &state.buffer.len())
            .field("closed", &state.closed)
            .finish()
    }
}
