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

//! Wait-for-any / wait-for-all synchronization over a set of topics,
//! driven by value store notifications.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::store::{Receiver, ValueStore};
use crate::value::Value;

struct FlagState
{
	flags: HashMap<String, bool>,
	exit: bool,
}

struct TopicFlag
{
	name: String,
	state: Arc<Mutex<FlagState>>,
	trigger: Arc<Condvar>,
}

impl Receiver for TopicFlag
{
	fn on_value(&self, _topic: &str, _value: &Value)
	{
		let mut state = self.state.lock();
		state.flags.insert(self.name.clone(), true);
		self.trigger.notify_all();
	}
}

/// A set of per-topic flags, all driven by one shared condition variable,
/// used to wait until one or all of a group of topics have been modified.
pub struct TopicTriggerFlags
{
	value_store: Arc<dyn ValueStore>,
	state: Arc<Mutex<FlagState>>,
	trigger: Arc<Condvar>,
	receivers: Mutex<HashMap<String, Arc<TopicFlag>>>,
}

impl TopicTriggerFlags
{
	pub fn new(value_store: Arc<dyn ValueStore>) -> Self
	{
		TopicTriggerFlags {
			value_store,
			state: Arc::new(Mutex::new(FlagState {
				flags: HashMap::new(),
				exit: false,
			})),
			trigger: Arc::new(Condvar::new()),
			receivers: Mutex::new(HashMap::new()),
		}
	}

	/// Registers a topic. A no-op if the topic is already present, so
	/// survivors of [`TopicTriggerFlags::update_topics`] keep their flag
	/// state.
	pub fn add_topic(&self, topic: impl Into<String>)
	{
		let topic = topic.into();
		let mut receivers = self.receivers.lock();
		if receivers.contains_key(&topic) {
			return;
		}
		let flag = Arc::new(TopicFlag {
			name: topic.clone(),
			state: Arc::clone(&self.state),
			trigger: Arc::clone(&self.trigger),
		});
		self.state.lock().flags.entry(topic.clone()).or_insert(false);
		self.value_store
			.add_receiver(&topic, flag.clone() as Arc<dyn Receiver>);
		receivers.insert(topic, flag);
	}

	pub fn remove_topic(&self, topic: &str)
	{
		let mut receivers = self.receivers.lock();
		if let Some(flag) = receivers.remove(topic) {
			self.value_store
				.remove_receiver(topic, &(flag as Arc<dyn Receiver>));
			self.state.lock().flags.remove(topic);
		}
	}

	/// Replaces the full topic set in one locked pass: removes topics not
	/// in `topics`, adds new ones. Survivors' flags are left untouched.
	pub fn update_topics(&self, topics: &[String])
	{
		let wanted: std::collections::HashSet<&str> = topics.iter().map(String::as_str).collect();
		let existing: Vec<String> = self.receivers.lock().keys().cloned().collect();
		for topic in &existing {
			if !wanted.contains(topic.as_str()) {
				self.remove_topic(topic);
			}
		}
		for topic in topics {
			self.add_topic(topic.clone());
		}
	}

	pub fn reset_flags(&self)
	{
		let mut state = self.state.lock();
		for value in state.flags.values_mut() {
			*value = false;
		}
	}

	/// Vacuously true when there are no topics registered.
	pub fn are_all_flags_set(&self) -> bool
	{
		self.state.lock().flags.values().all(|&v| v)
	}

	pub fn topic_names(&self) -> Vec<String>
	{
		self.receivers.lock().keys().cloned().collect()
	}

	/// Blocks until at least one flag is set or the wait is exited.
	pub fn wait_for_any_topic_modified(&self)
	{
		let mut state = self.state.lock();
		while !state.exit && !state.flags.values().any(|&v| v) {
			self.trigger.wait(&mut state);
		}
		state.exit = false;
	}

	/// Blocks until every registered flag is set or the wait is exited.
	/// Returns true if the wait ended because of an explicit exit request
	/// rather than all flags becoming set.
	pub fn wait_for_all_topics_modified(&self) -> bool
	{
		let mut state = self.state.lock();
		loop {
			if state.exit {
				state.exit = false;
				return true;
			}
			if state.flags.values().all(|&v| v) {
				for value in state.flags.values_mut() {
					*value = false;
				}
				return false;
			}
			self.trigger.wait(&mut state);
		}
	}

	/// Unblocks any in-progress wait without marking topic flags set.
	pub fn exit_wait_for_all_topics_modified(&self)
	{
		let mut state = self.state.lock();
		state.exit = true;
		self.trigger.notify_all();
	}

	/// Wakes any waiter without touching topic flags or the exit flag.
	pub fn manually_trigger_event(&self)
	{
		self.trigger.notify_all();
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::store::InMemoryValueStore;

	#[test]
	fn empty_flag_set_is_vacuously_all_set()
	{
		let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
		let flags = TopicTriggerFlags::new(store);
		assert!(flags.are_all_flags_set());
	}

	#[test]
	fn setting_one_topic_value_flips_its_flag()
	{
		let store = Arc::new(InMemoryValueStore::new());
		let flags = TopicTriggerFlags::new(store.clone() as Arc<dyn ValueStore>);
		flags.add_topic("a");
		flags.add_topic("b");
		assert!(!flags.are_all_flags_set());
		store.set_value("a", Value::new(1i32, 1));
		assert!(!flags.are_all_flags_set());
		store.set_value("b", Value::new(2i32, 2));
		assert!(flags.are_all_flags_set());
	}

	#[test]
	fn update_topics_preserves_survivor_flags()
	{
		let store = Arc::new(InMemoryValueStore::new());
		let flags = TopicTriggerFlags::new(store.clone() as Arc<dyn ValueStore>);
		flags.add_topic("a");
		flags.add_topic("b");
		store.set_value("a", Value::new(1i32, 1));
		flags.update_topics(&["a".to_string(), "c".to_string()]);
		assert_eq!(
			flags.topic_names().into_iter().collect::<std::collections::HashSet<_>>(),
			["a", "c"].iter().map(|s| s.to_string()).collect()
		);
		assert!(!flags.are_all_flags_set());
		store.set_value("c", Value::new(1i32, 1));
		assert!(flags.are_all_flags_set());
	}

	#[test]
	fn exit_wait_unblocks_without_setting_flags()
	{
		let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
		let flags = Arc::new(TopicTriggerFlags::new(store));
		flags.add_topic("a");
		let worker_flags = flags.clone();
		let handle = std::thread::spawn(move || worker_flags.wait_for_all_topics_modified());
		std::thread::sleep(std::time::Duration::from_millis(20));
		flags.exit_wait_for_all_topics_modified();
		let exited_early = handle.join().unwrap();
		assert!(exited_early);
	}
}
