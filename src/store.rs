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

//! The value store contract (§6.1) and a minimal in-memory reference
//! adapter used by this crate's own tests.
//!
//! The production value store — persistence, cross-process fan-out, wire
//! transport — is out of scope here. Callers bring their own
//! implementation of [`ValueStore`]; [`InMemoryValueStore`] exists only so
//! the rest of this crate (and its test suite) has something concrete to
//! drive against.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::value::Value;

/// Notified whenever a value is published on a topic the receiver is
/// registered against.
pub trait Receiver: Send + Sync
{
	fn on_value(&self, topic: &str, value: &Value);
}

/// The external interface every value store implementation must provide.
///
/// Notifications may be delivered synchronously on the publisher's thread
/// or asynchronously; callers must tolerate either.
pub trait ValueStore: Send + Sync
{
	fn set_value(&self, topic: &str, value: Value);
	fn get_value(&self, topic: &str) -> Option<Value>;
	fn has_value(&self, topic: &str) -> bool;
	fn add_receiver(&self, topic: &str, receiver: Arc<dyn Receiver>);
	fn remove_receiver(&self, topic: &str, receiver: &Arc<dyn Receiver>);
	fn get_type_info(&self, topic: &str) -> Option<&'static str>;
}

/// Fetches and downcasts a topic's current value in one step.
pub fn get_value_as<T: std::any::Any + Clone>(store: &dyn ValueStore, topic: &str) -> Option<T>
{
	store.get_value(topic)?.downcast_ref::<T>().cloned()
}

#[derive(Default)]
struct Slot
{
	value: Option<Value>,
	receivers: Vec<Arc<dyn Receiver>>,
}

/// A minimal, process-local implementation of [`ValueStore`] holding the
/// latest value per topic behind a single lock. Notifications are
/// delivered synchronously, with the lock released before each receiver
/// is invoked so that a receiver may itself publish without deadlocking.
pub struct InMemoryValueStore
{
	slots: Mutex<HashMap<String, Slot>>,
}

impl InMemoryValueStore
{
	pub fn new() -> Self
	{
		InMemoryValueStore {
			slots: Mutex::new(HashMap::new()),
		}
	}
}

impl Default for InMemoryValueStore
{
	fn default() -> Self
	{
		Self::new()
	}
}

impl ValueStore for InMemoryValueStore
{
	fn set_value(&self, topic: &str, value: Value)
	{
		let receivers = {
			let mut slots = self.slots.lock();
			let slot = slots.entry(topic.to_string()).or_default();
			slot.value = Some(value.clone());
			slot.receivers.clone()
		};
		for receiver in receivers {
			receiver.on_value(topic, &value);
		}
	}

	fn get_value(&self, topic: &str) -> Option<Value>
	{
		self.slots.lock().get(topic).and_then(|s| s.value.clone())
	}

	fn has_value(&self, topic: &str) -> bool
	{
		self.slots
			.lock()
			.get(topic)
			.map(|s| s.value.is_some())
			.unwrap_or(false)
	}

	fn add_receiver(&self, topic: &str, receiver: Arc<dyn Receiver>)
	{
		self.slots
			.lock()
			.entry(topic.to_string())
			.or_default()
			.receivers
			.push(receiver);
	}

	fn remove_receiver(&self, topic: &str, receiver: &Arc<dyn Receiver>)
	{
		if let Some(slot) = self.slots.lock().get_mut(topic) {
			slot.receivers.retain(|r| !Arc::ptr_eq(r, receiver));
		}
	}

	fn get_type_info(&self, topic: &str) -> Option<&'static str>
	{
		self.slots
			.lock()
			.get(topic)
			.and_then(|s| s.value.as_ref())
			.map(|v| v.type_name())
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct CountingReceiver
	{
		count: AtomicUsize,
	}

	impl Receiver for CountingReceiver
	{
		fn on_value(&self, _topic: &str, _value: &Value)
		{
			self.count.fetch_add(1, Ordering::SeqCst);
		}
	}

	#[test]
	fn missing_key_has_no_value()
	{
		let store = InMemoryValueStore::new();
		assert!(!store.has_value("tick"));
		assert!(store.get_value("tick").is_none());
	}

	#[test]
	fn has_value_after_set()
	{
		let store = InMemoryValueStore::new();
		store.set_value("tick", Value::new(1i32, 1));
		assert!(store.has_value("tick"));
		assert_eq!(get_value_as::<i32>(&store, "tick"), Some(1));
	}

	#[test]
	fn erase_before_write_never_delivers()
	{
		let store = InMemoryValueStore::new();
		let receiver = Arc::new(CountingReceiver {
			count: AtomicUsize::new(0),
		});
		store.add_receiver("tick", receiver.clone());
		store.remove_receiver("tick", &(receiver.clone() as Arc<dyn Receiver>));
		store.set_value("tick", Value::new(1i32, 1));
		assert_eq!(receiver.count.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn changing_value_notifies_each_time()
	{
		let store = InMemoryValueStore::new();
		let receiver = Arc::new(CountingReceiver {
			count: AtomicUsize::new(0),
		});
		store.add_receiver("tick", receiver.clone() as Arc<dyn Receiver>);
		store.set_value("tick", Value::new(1i32, 1));
		store.set_value("tick", Value::new(2i32, 2));
		assert_eq!(receiver.count.load(Ordering::SeqCst), 2);
	}
}
