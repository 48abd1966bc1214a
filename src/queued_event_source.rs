// Copyright (C) 2017 Jesse Jones
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 3, or (at your option)
// any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program; if not, write to the Free Software Foundation,
// Inc., 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301, USA.

//! A dynamic event source backed by a timestamp-ordered queue of values
//! pushed in from outside the process.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::etc::EventTimingController;
use crate::event_source::EventSource;
use crate::store::ValueStore;
use crate::timestamp::Timestamp;
use crate::value::Value;

struct QueuedEvent
{
	topic: String,
	value: Value,
	#[allow(dead_code)]
	component: String,
	#[allow(dead_code)]
	port: String,
}

struct Inner
{
	queue: BTreeMap<i64, VecDeque<QueuedEvent>>,
	finished: bool,
}

/// Buffers externally-injected `(timestamp, topic, value)` triples and
/// fires them in timestamp order (ties broken by insertion order) when
/// driven by the event timing controller.
pub struct QueuedEventSource
{
	value_store: Arc<dyn ValueStore>,
	etc: Weak<EventTimingController>,
	inner: Mutex<Inner>,
}

impl QueuedEventSource
{
	pub fn new(value_store: Arc<dyn ValueStore>, etc: Weak<EventTimingController>) -> Self
	{
		QueuedEventSource {
			value_store,
			etc,
			inner: Mutex::new(Inner {
				queue: BTreeMap::new(),
				finished: false,
			}),
		}
	}

	/// Inserts a new event into the queue and notifies the event timing
	/// controller. The controller is notified with this source's own lock
	/// released, matching the contract that a source must never be
	/// re-entered while holding its own mutex.
	pub fn push_new_event(
		&self,
		timestamp: Timestamp,
		topic: impl Into<String>,
		value: Value,
		component: impl Into<String>,
		port: impl Into<String>,
	)
	{
		{
			let mut inner = self.inner.lock();
			inner
				.queue
				.entry(timestamp.micros())
				.or_default()
				.push_back(QueuedEvent {
					topic: topic.into(),
					value,
					component: component.into(),
					port: port.into(),
				});
		}

		if let Some(etc) = self.etc.upgrade() {
			etc.trigger_new_event_pushed();
		}
		// If the controller no longer exists the push is silently retained;
		// it will simply never be fired.
	}

	pub fn clear_event_queue(&self)
	{
		self.inner.lock().queue.clear();
	}

	/// Drops every queued event earlier than `timestamp`. Returns true iff
	/// anything was actually removed.
	pub fn seek(&self, timestamp: Timestamp) -> bool
	{
		let mut inner = self.inner.lock();
		let before = inner.queue.values().map(VecDeque::len).sum::<usize>();
		let remaining = inner.queue.split_off(&timestamp.micros());
		inner.queue = remaining;
		let after = inner.queue.values().map(VecDeque::len).sum::<usize>();
		before > after
	}

	pub fn set_finished(&self, finished: bool)
	{
		self.inner.lock().finished = finished;
	}

	/// Returns `(size, first_timestamp, last_timestamp)`; the timestamps
	/// are zero when the queue is empty.
	pub fn queue_info(&self) -> (usize, i64, i64)
	{
		let inner = self.inner.lock();
		let size = inner.queue.values().map(VecDeque::len).sum();
		if inner.queue.is_empty() {
			(size, 0, 0)
		} else {
			let first = *inner.queue.keys().next().unwrap();
			let last = *inner.queue.keys().next_back().unwrap();
			(size, first, last)
		}
	}
}

impl EventSource for QueuedEventSource
{
	fn peek_next(&self) -> Option<(Timestamp, String)>
	{
		let inner = self.inner.lock();
		let (&ts, entries) = inner.queue.iter().next()?;
		let topic = entries.front()?.topic.clone();
		Some((Timestamp::from_micros(ts), topic))
	}

	fn fire(&self)
	{
		let (topic, value) = {
			let mut inner = self.inner.lock();
			let Some((&ts, entries)) = inner.queue.iter_mut().next() else {
				return;
			};
			let event = entries.pop_front();
			if entries.is_empty() {
				inner.queue.remove(&ts);
			}
			match event {
				Some(e) => (e.topic, e.value),
				None => return,
			}
		};
		self.value_store.set_value(&topic, value);
	}

	fn is_finished(&self) -> bool
	{
		self.inner.lock().finished
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::store::InMemoryValueStore;

	fn make_source() -> (Arc<QueuedEventSource>, Arc<dyn ValueStore>)
	{
		let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
		let source = Arc::new(QueuedEventSource::new(store.clone(), Weak::new()));
		(source, store)
	}

	#[test]
	fn peek_next_reflects_earliest_timestamp()
	{
		let (source, _store) = make_source();
		source.push_new_event(Timestamp(200), "b", Value::new(2i32, 2), "", "");
		source.push_new_event(Timestamp(100), "a", Value::new(1i32, 1), "", "");
		let (ts, topic) = source.peek_next().unwrap();
		assert_eq!(ts, Timestamp(100));
		assert_eq!(topic, "a");
	}

	#[test]
	fn ties_broken_by_insertion_order()
	{
		let (source, _store) = make_source();
		source.push_new_event(Timestamp(100), "first", Value::new(1i32, 1), "", "");
		source.push_new_event(Timestamp(100), "second", Value::new(2i32, 2), "", "");
		let (_, topic) = source.peek_next().unwrap();
		assert_eq!(topic, "first");
		source.fire();
		let (_, topic) = source.peek_next().unwrap();
		assert_eq!(topic, "second");
	}

	#[test]
	fn fire_publishes_to_the_value_store()
	{
		let (source, store) = make_source();
		source.push_new_event(Timestamp(0), "topic", Value::new(42i32, 1), "", "");
		source.fire();
		assert!(store.has_value("topic"));
		assert!(source.peek_next().is_none());
	}

	#[test]
	fn seek_drops_earlier_events()
	{
		let (source, _store) = make_source();
		source.push_new_event(Timestamp(0), "a", Value::new(1i32, 1), "", "");
		source.push_new_event(Timestamp(100), "b", Value::new(2i32, 2), "", "");
		source.push_new_event(Timestamp(200), "c", Value::new(3i32, 3), "", "");
		assert!(source.seek(Timestamp(150)));
		let (ts, _) = source.peek_next().unwrap();
		assert_eq!(ts, Timestamp(200));
	}

	#[test]
	fn seek_with_nothing_to_drop_returns_false()
	{
		let (source, _store) = make_source();
		source.push_new_event(Timestamp(100), "a", Value::new(1i32, 1), "", "");
		assert!(!source.seek(Timestamp(0)));
	}

	#[test]
	fn push_with_no_controller_still_queues()
	{
		let (source, _store) = make_source();
		source.push_new_event(Timestamp(0), "a", Value::new(1i32, 1), "", "");
		assert!(source.peek_next().is_some());
	}
}
