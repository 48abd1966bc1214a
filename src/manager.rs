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

//! The component manager (§4.1): registry of components, ports, and topic
//! wiring, enforcing the REGISTERED -> CONFIGURED -> RUNNING lifecycle and
//! issuing proxy handles that re-validate on every call.
//!
//! A single re-entrant mutex around a `RefCell<ManagerState>` serializes
//! every mutation. Re-entrancy is required because `configure` calls back
//! into the user's `configure` method, which in turn calls `register_port`
//! on this same manager: the `RefCell` borrow is always dropped before
//! user code runs, so the only thing actually held across that call is the
//! re-entrant lock itself.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::ReentrantMutex;

use crate::component::{Component, ComponentState, PortRegistrar, SchedulingParameters};
use crate::error::{McfError, Result};
use crate::logging::LogSeverity;
use crate::port::{Port, PortDirection};
use crate::ports::{invalid_port, PortQueue, PortReceiver, PortSender};
use crate::store::ValueStore;
use crate::topic::is_valid_topic;
use crate::value::{IdGenerator, Value};

const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The manager's own view of a component's lifecycle. Distinct from the
/// component's inner [`ComponentState`] (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle
{
	Registered,
	Configured,
	Running,
	Stopped,
}

struct PortEntry
{
	port: Port,
	is_valid: bool,
	connected: bool,
	queue: Option<Arc<PortQueue>>,
}

struct ComponentRecord
{
	component: Option<Box<dyn Component>>,
	type_name: String,
	instance_name: String,
	lifecycle: Lifecycle,
	ports: HashMap<String, PortEntry>,
	scheduling: SchedulingParameters,
}

struct ManagerState
{
	next_id: u64,
	components: HashMap<u64, ComponentRecord>,
	name_to_id: HashMap<String, u64>,
}

/// Registry of components and ports; see the module docs.
pub struct ComponentManager
{
	state: ReentrantMutex<RefCell<ManagerState>>,
	value_store: Arc<dyn ValueStore>,
	id_generator: Arc<IdGenerator>,
	config_dirs: Vec<String>,
	self_weak: Weak<ComponentManager>,
}

/// Snapshot of one port's current state, returned by `get_port`/`get_ports`.
#[derive(Debug, Clone)]
pub struct PortInfo
{
	pub name: String,
	pub direction: PortDirection,
	pub topic: String,
	pub is_valid: bool,
	pub is_connected: bool,
}

/// An opaque, re-validating handle to a manager-owned component.
#[derive(Clone)]
pub struct ComponentProxy
{
	id: u64,
	manager: Arc<ComponentManager>,
}

impl ComponentProxy
{
	pub fn id(&self) -> u64
	{
		self.id
	}

	pub fn configure(&self) -> Result<()>
	{
		self.manager.configure_one(self.id)
	}

	pub fn startup(&self, connect_ports: bool) -> Result<()>
	{
		self.manager.startup_one(self.id, connect_ports)
	}

	pub fn shutdown(&self) -> Result<()>
	{
		self.manager.shutdown_one(self.id)
	}

	pub fn erase(&self) -> Result<()>
	{
		self.manager.erase_component(self.id)
	}

	pub fn map_port(&self, port_name: &str, topic: &str) -> Result<()>
	{
		self.manager.map_port(self.id, port_name, topic)
	}

	pub fn connect_port(&self, port_name: &str) -> Result<()>
	{
		self.manager.connect_port(self.id, port_name)
	}

	pub fn disconnect_port(&self, port_name: &str) -> Result<()>
	{
		self.manager.disconnect_port(self.id, port_name)
	}

	pub fn set_scheduling_parameters(&self, params: SchedulingParameters) -> Result<()>
	{
		self.manager.set_scheduling_parameters(self.id, params)
	}

	pub fn set_log_levels(&self, console: LogSeverity, store: LogSeverity) -> Result<()>
	{
		self.manager.set_component_log_levels_by_id(self.id, console, store)
	}

	pub fn ports(&self) -> Result<Vec<PortInfo>>
	{
		self.manager.get_ports(self.id)
	}

	pub fn port(&self, name: &str) -> Result<PortInfo>
	{
		self.manager.get_port(self.id, name)
	}

	pub fn sender(&self, name: &str) -> Result<PortSender>
	{
		self.manager.sender_for(self.id, name)
	}

	pub fn receiver(&self, name: &str) -> Result<PortReceiver>
	{
		self.manager.receiver_for(self.id, name)
	}

	pub fn type_name(&self) -> Result<String>
	{
		self.manager.with_record(self.id, |r| r.type_name.clone())
	}

	pub fn instance_name(&self) -> Result<String>
	{
		self.manager.with_record(self.id, |r| r.instance_name.clone())
	}
}

struct Registrar<'a>
{
	manager: &'a ComponentManager,
	component_id: u64,
}

impl<'a> PortRegistrar for Registrar<'a>
{
	fn register_port(&mut self, port: Port) -> Result<()>
	{
		self.manager.register_port_internal(self.component_id, port, None)
	}

	fn register_port_mapped(&mut self, port: Port, topic: &str) -> Result<()>
	{
		self.manager
			.register_port_internal(self.component_id, port, Some(topic))
	}

	fn sender(&self, name: &str) -> Result<PortSender>
	{
		self.manager.sender_for_locked(self.component_id, name)
	}

	fn receiver(&self, name: &str) -> Result<PortReceiver>
	{
		self.manager.receiver_for_locked(self.component_id, name)
	}
}

impl ComponentManager
{
	/// Constructs a manager over `value_store`, publishing the well-known
	/// `/mcf/configdirectory` and `/mcf/configdirectories` topics (§6.4).
	pub fn new(value_store: Arc<dyn ValueStore>, config_dirs: Vec<String>) -> Arc<Self>
	{
		let id_generator = Arc::new(IdGenerator::new());
		let manager = Arc::new_cyclic(|weak| ComponentManager {
			state: ReentrantMutex::new(RefCell::new(ManagerState {
				next_id: 1,
				components: HashMap::new(),
				name_to_id: HashMap::new(),
			})),
			value_store: value_store.clone(),
			id_generator,
			config_dirs: config_dirs.clone(),
			self_weak: weak.clone(),
		});

		let first = config_dirs.first().cloned().unwrap_or_default();
		value_store.set_value("/mcf/configdirectory", Value::new(first, 0));
		value_store.set_value("/mcf/configdirectories", Value::new(config_dirs, 0));
		manager
	}

	pub fn value_store(&self) -> Arc<dyn ValueStore>
	{
		self.value_store.clone()
	}

	pub fn id_generator(&self) -> Arc<IdGenerator>
	{
		self.id_generator.clone()
	}

	fn with_record<T>(&self, id: u64, f: impl FnOnce(&ComponentRecord) -> T) -> Result<T>
	{
		let guard = self.state.lock();
		let state = guard.borrow();
		let record = state
			.components
			.get(&id)
			.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
		Ok(f(record))
	}

	pub fn register_component(
		self: &Arc<Self>,
		mut component: Box<dyn Component>,
		type_name: impl Into<String>,
		instance_name: impl Into<String>,
	) -> Result<ComponentProxy>
	{
		let instance_name = instance_name.into();
		let type_name = type_name.into();
		if instance_name.is_empty() {
			return Err(McfError::InvalidArgument(
				"instance name must not be empty".to_string(),
			));
		}

		let guard = self.state.lock();
		let mut state = guard.borrow_mut();
		if state.name_to_id.contains_key(&instance_name) {
			return Err(McfError::DuplicateInstance(instance_name));
		}

		let id = state.next_id;
		state.next_id += 1;

		component.set_id_generator(self.id_generator.clone());
		component.ctrl_set_config_dirs(&self.config_dirs);

		state.components.insert(
			id,
			ComponentRecord {
				component: Some(component),
				type_name,
				instance_name: instance_name.clone(),
				lifecycle: Lifecycle::Registered,
				ports: HashMap::new(),
				scheduling: SchedulingParameters::default(),
			},
		);
		state.name_to_id.insert(instance_name, id);

		Ok(ComponentProxy {
			id,
			manager: Arc::clone(self),
		})
	}

	fn register_port_internal(&self, id: u64, mut port: Port, topic: Option<&str>) -> Result<()>
	{
		let guard = self.state.lock();
		let mut state = guard.borrow_mut();
		let record = state
			.components
			.get_mut(&id)
			.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;

		if record.ports.contains_key(&port.name) {
			return Err(McfError::DuplicatePort {
				component: record.instance_name.clone(),
				port: port.name,
			});
		}

		if let Some(topic) = topic {
			port.topic = topic.to_string();
		}
		let queue = match port.direction {
			PortDirection::Receiver { queued } => {
				let (max_len, blocking) = match queued {
					Some(p) => (Some(p.max_queue_length), p.blocking),
					None => (None, false),
				};
				Some(PortQueue::new(max_len, blocking))
			}
			PortDirection::Sender => None,
		};

		record.ports.insert(
			port.name.clone(),
			PortEntry {
				port,
				is_valid: false,
				connected: false,
				queue,
			},
		);
		Ok(())
	}

	/// Invokes every REGISTERED component's `configure` callback, logging
	/// and continuing past individual failures (the bulk variant; the
	/// single-proxy variant below fails fast).
	pub fn configure(&self)
	{
		let ids: Vec<u64> = {
			let guard = self.state.lock();
			let state = guard.borrow();
			state
				.components
				.iter()
				.filter(|(_, r)| r.lifecycle == Lifecycle::Registered)
				.map(|(id, _)| *id)
				.collect()
		};
		for id in ids {
			if let Err(e) = self.configure_one(id) {
				tracing::warn!(component = id, error = %e, "configure failed");
			}
		}
	}

	fn configure_one(&self, id: u64) -> Result<()>
	{
		let guard = self.state.lock();
		{
			let state = guard.borrow();
			let record = state
				.components
				.get(&id)
				.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
			if record.lifecycle != Lifecycle::Registered {
				tracing::warn!(component = id, "configure called on already-configured component; ignoring");
				return Ok(());
			}
		}

		let mut component = {
			let mut state = guard.borrow_mut();
			state.components.get_mut(&id).unwrap().component.take().unwrap()
		};

		let mut registrar = Registrar {
			manager: self,
			component_id: id,
		};
		let result = component.configure(&mut registrar);

		let mut state = guard.borrow_mut();
		let record = state.components.get_mut(&id).unwrap();
		record.component = Some(component);
		result?;
		record.lifecycle = Lifecycle::Configured;
		Ok(())
	}

	/// Checks every non-empty topic in use: the topic name must be valid,
	/// and ports bound to it are marked `is_valid` once it is. Returns
	/// true iff every non-empty topic validated cleanly.
	pub fn validate_configuration(&self) -> bool
	{
		let guard = self.state.lock();
		let mut state = guard.borrow_mut();

		let mut by_topic: HashMap<String, (usize, usize)> = HashMap::new();
		for record in state.components.values() {
			for entry in record.ports.values() {
				if entry.port.topic.is_empty() {
					continue;
				}
				let counts = by_topic.entry(entry.port.topic.clone()).or_insert((0, 0));
				match entry.port.direction {
					PortDirection::Sender => counts.0 += 1,
					PortDirection::Receiver { .. } => counts.1 += 1,
				}
			}
		}

		let mut all_valid = true;
		let mut valid_topics = std::collections::HashSet::new();
		for (topic, (senders, receivers)) in &by_topic {
			if !is_valid_topic(topic) {
				all_valid = false;
				continue;
			}
			if *senders != 1 {
				tracing::warn!(topic, senders, "topic does not have exactly one sender");
			}
			if *receivers == 0 {
				tracing::warn!(topic, "topic has no receivers");
			}
			valid_topics.insert(topic.clone());
		}

		for record in state.components.values_mut() {
			for entry in record.ports.values_mut() {
				entry.is_valid = !entry.port.topic.is_empty() && valid_topics.contains(&entry.port.topic);
			}
		}

		all_valid
	}

	pub fn startup(&self, connect_ports: bool)
	{
		self.validate_configuration();
		let ids: Vec<u64> = {
			let guard = self.state.lock();
			let state = guard.borrow();
			state
				.components
				.iter()
				.filter(|(_, r)| r.lifecycle == Lifecycle::Configured)
				.map(|(id, _)| *id)
				.collect()
		};
		for id in ids {
			if let Err(e) = self.startup_one(id, connect_ports) {
				tracing::warn!(component = id, error = %e, "startup failed");
			}
		}
	}

	fn startup_one(&self, id: u64, connect_ports: bool) -> Result<()>
	{
		self.validate_configuration();
		{
			let guard = self.state.lock();
			let state = guard.borrow();
			let record = state
				.components
				.get(&id)
				.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
			if record.lifecycle != Lifecycle::Configured {
				return Err(McfError::NotConfigured(record.instance_name.clone()));
			}
		}

		if connect_ports {
			let port_names: Vec<String> = {
				let guard = self.state.lock();
				let state = guard.borrow();
				state.components[&id]
					.ports
					.iter()
					.filter(|(_, e)| e.is_valid)
					.map(|(n, _)| n.clone())
					.collect()
			};
			for name in port_names {
				self.connect_port(id, &name)?;
			}
		}

		{
			let guard = self.state.lock();
			let mut state = guard.borrow_mut();
			let record = state.components.get_mut(&id).unwrap();
			record.component.as_mut().unwrap().ctrl_start();
		}

		loop {
			let state_now = {
				let guard = self.state.lock();
				let state = guard.borrow();
				state.components[&id].component.as_ref().unwrap().get_state()
			};
			if state_now == ComponentState::Started {
				break;
			}
			thread::sleep(STARTUP_POLL_INTERVAL);
		}

		{
			let guard = self.state.lock();
			let mut state = guard.borrow_mut();
			let record = state.components.get_mut(&id).unwrap();
			record.component.as_mut().unwrap().ctrl_run();
			record.lifecycle = Lifecycle::Running;
		}
		Ok(())
	}

	pub fn shutdown(&self)
	{
		let ids: Vec<u64> = {
			let guard = self.state.lock();
			let state = guard.borrow();
			state
				.components
				.iter()
				.filter(|(_, r)| r.lifecycle == Lifecycle::Running)
				.map(|(id, _)| *id)
				.collect()
		};
		for id in ids {
			if let Err(e) = self.shutdown_one(id) {
				tracing::warn!(component = id, error = %e, "shutdown failed");
			}
		}
	}

	fn shutdown_one(&self, id: u64) -> Result<()>
	{
		let lifecycle = self.with_record(id, |r| r.lifecycle)?;
		if lifecycle != Lifecycle::Running {
			return Ok(());
		}

		let port_names: Vec<String> = {
			let guard = self.state.lock();
			let state = guard.borrow();
			state.components[&id]
				.ports
				.iter()
				.filter(|(_, e)| e.connected)
				.map(|(n, _)| n.clone())
				.collect()
		};
		for name in port_names {
			self.disconnect_port(id, &name)?;
		}

		let guard = self.state.lock();
		let mut state = guard.borrow_mut();
		let record = state.components.get_mut(&id).unwrap();
		record.component.as_mut().unwrap().ctrl_stop();
		record.lifecycle = Lifecycle::Configured;
		Ok(())
	}

	/// Disconnects ports and calls `ctrl_stop`, landing in the terminal
	/// `Stopped` state rather than `Configured` (unlike a normal
	/// `shutdown`, a force-stopped component is about to be erased, not
	/// reused).
	fn force_stop(&self, id: u64) -> Result<()>
	{
		let port_names: Vec<String> = {
			let guard = self.state.lock();
			let state = guard.borrow();
			state.components[&id]
				.ports
				.iter()
				.filter(|(_, e)| e.connected)
				.map(|(n, _)| n.clone())
				.collect()
		};
		for name in port_names {
			self.disconnect_port(id, &name)?;
		}

		let guard = self.state.lock();
		let mut state = guard.borrow_mut();
		let record = state.components.get_mut(&id).unwrap();
		record.component.as_mut().unwrap().ctrl_stop();
		record.lifecycle = Lifecycle::Stopped;
		Ok(())
	}

	pub fn erase_component(&self, id: u64) -> Result<()>
	{
		let lifecycle = self.with_record(id, |r| r.lifecycle)?;
		if lifecycle == Lifecycle::Running {
			self.force_stop(id)?;
		}

		let guard = self.state.lock();
		let mut state = guard.borrow_mut();
		let record = state
			.components
			.remove(&id)
			.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
		state.name_to_id.remove(&record.instance_name);
		Ok(())
	}

	pub fn map_port(&self, id: u64, port_name: &str, topic: &str) -> Result<()>
	{
		{
			let guard = self.state.lock();
			let mut state = guard.borrow_mut();
			let record = state
				.components
				.get_mut(&id)
				.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
			let entry = record
				.ports
				.get_mut(port_name)
				.ok_or_else(|| invalid_port(&record.instance_name, port_name))?;
			entry.port.topic = topic.to_string();
		}
		self.validate_configuration();
		Ok(())
	}

	pub fn connect_port(&self, id: u64, port_name: &str) -> Result<()>
	{
		let guard = self.state.lock();
		let mut state = guard.borrow_mut();
		let record = state
			.components
			.get_mut(&id)
			.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
		let lifecycle_ok = matches!(record.lifecycle, Lifecycle::Configured | Lifecycle::Running);
		let entry = record
			.ports
			.get_mut(port_name)
			.ok_or_else(|| invalid_port(&record.instance_name, port_name))?;

		if entry.connected || !entry.is_valid || entry.port.topic.is_empty() || !lifecycle_ok {
			return Ok(());
		}

		if let PortDirection::Receiver { .. } = entry.port.direction {
			let queue = entry.queue.clone().expect("receiver ports always carry a queue");
			self.value_store.add_receiver(&entry.port.topic, queue);
		}
		entry.connected = true;
		Ok(())
	}

	pub fn disconnect_port(&self, id: u64, port_name: &str) -> Result<()>
	{
		let guard = self.state.lock();
		let mut state = guard.borrow_mut();
		let record = state
			.components
			.get_mut(&id)
			.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
		let entry = record
			.ports
			.get_mut(port_name)
			.ok_or_else(|| invalid_port(&record.instance_name, port_name))?;

		if !entry.connected {
			return Ok(());
		}
		if let PortDirection::Receiver { .. } = entry.port.direction {
			if let Some(queue) = &entry.queue {
				let receiver: Arc<dyn crate::store::Receiver> = queue.clone();
				self.value_store.remove_receiver(&entry.port.topic, &receiver);
			}
		}
		entry.connected = false;
		Ok(())
	}

	/// The manager is always reached through an `Arc` (see [`ComponentManager::new`]),
	/// so this upgrade only fails during the brief window inside
	/// `Arc::new_cyclic` itself, before `new` has returned.
	fn self_arc(&self) -> Arc<ComponentManager>
	{
		self.self_weak
			.upgrade()
			.expect("ComponentManager is always held by an Arc once constructed")
	}

	fn sender_for_locked(&self, id: u64, name: &str) -> Result<PortSender>
	{
		self.sender_for_with_guard(id, name)
	}

	fn receiver_for_locked(&self, id: u64, name: &str) -> Result<PortReceiver>
	{
		self.receiver_for_with_guard(id, name)
	}

	fn sender_for_with_guard(&self, id: u64, name: &str) -> Result<PortSender>
	{
		let guard = self.state.lock();
		let state = guard.borrow();
		let record = state
			.components
			.get(&id)
			.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
		let entry = record
			.ports
			.get(name)
			.ok_or_else(|| invalid_port(&record.instance_name, name))?;
		if !matches!(entry.port.direction, PortDirection::Sender) {
			return Err(McfError::InvalidArgument(format!(
				"port {name} is not a sender port"
			)));
		}
		Ok(PortSender {
			manager: self.self_arc(),
			component_id: id,
			name: name.to_string(),
		})
	}

	fn receiver_for_with_guard(&self, id: u64, name: &str) -> Result<PortReceiver>
	{
		let guard = self.state.lock();
		let state = guard.borrow();
		let record = state
			.components
			.get(&id)
			.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
		let entry = record
			.ports
			.get(name)
			.ok_or_else(|| invalid_port(&record.instance_name, name))?;
		let queue = entry
			.queue
			.clone()
			.ok_or_else(|| McfError::InvalidArgument(format!("port {name} is not a receiver port")))?;
		Ok(PortReceiver {
			queue,
			name: name.to_string(),
		})
	}

	pub fn sender_for(&self, id: u64, name: &str) -> Result<PortSender>
	{
		self.sender_for_with_guard(id, name)
	}

	pub fn receiver_for(&self, id: u64, name: &str) -> Result<PortReceiver>
	{
		self.receiver_for_with_guard(id, name)
	}

	pub fn publish_on_port(&self, id: u64, name: &str, value: Value) -> Result<()>
	{
		let guard = self.state.lock();
		let state = guard.borrow();
		let record = state
			.components
			.get(&id)
			.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
		let entry = record
			.ports
			.get(name)
			.ok_or_else(|| invalid_port(&record.instance_name, name))?;
		if !matches!(entry.port.direction, PortDirection::Sender) {
			return Err(McfError::InvalidArgument(format!(
				"port {name} is not a sender port"
			)));
		}
		if entry.connected {
			self.value_store.set_value(&entry.port.topic, value);
		}
		Ok(())
	}

	pub fn set_scheduling_parameters(&self, id: u64, params: SchedulingParameters) -> Result<()>
	{
		let guard = self.state.lock();
		let mut state = guard.borrow_mut();
		let record = state
			.components
			.get_mut(&id)
			.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
		record.scheduling = params;
		record.component.as_mut().unwrap().ctrl_set_scheduling_parameters(params);
		Ok(())
	}

	fn set_component_log_levels_by_id(&self, id: u64, console: LogSeverity, store: LogSeverity) -> Result<()>
	{
		let guard = self.state.lock();
		let mut state = guard.borrow_mut();
		let record = state
			.components
			.get_mut(&id)
			.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
		record.component.as_mut().unwrap().ctrl_set_log_levels(console, store);
		Ok(())
	}

	/// Applies log levels to every component whose instance name matches
	/// `name_glob` (a [`glob::Pattern`]).
	pub fn set_component_log_levels(&self, name_glob: &str, console: LogSeverity, store: LogSeverity) -> Result<()>
	{
		let pattern = glob::Pattern::new(name_glob)
			.map_err(|e| McfError::InvalidArgument(e.to_string()))?;
		let ids: Vec<u64> = {
			let guard = self.state.lock();
			let state = guard.borrow();
			state
				.components
				.iter()
				.filter(|(_, r)| pattern.matches(&r.instance_name))
				.map(|(id, _)| *id)
				.collect()
		};
		for id in ids {
			self.set_component_log_levels_by_id(id, console, store)?;
		}
		Ok(())
	}

	pub fn set_global_log_levels(&self, console: LogSeverity, store: LogSeverity)
	{
		let ids: Vec<u64> = {
			let guard = self.state.lock();
			let state = guard.borrow();
			state.components.keys().copied().collect()
		};
		for id in ids {
			let _ = self.set_component_log_levels_by_id(id, console, store);
		}
	}

	pub fn get_components(self: &Arc<Self>) -> Vec<ComponentProxy>
	{
		let guard = self.state.lock();
		let state = guard.borrow();
		state
			.components
			.keys()
			.map(|&id| ComponentProxy {
				id,
				manager: Arc::clone(self),
			})
			.collect()
	}

	pub fn get_component(self: &Arc<Self>, id: u64) -> Result<ComponentProxy>
	{
		let guard = self.state.lock();
		let state = guard.borrow();
		if state.components.contains_key(&id) {
			Ok(ComponentProxy {
				id,
				manager: Arc::clone(self),
			})
		} else {
			Err(McfError::UnknownComponent(id.to_string()))
		}
	}

	pub fn find_by_name(self: &Arc<Self>, name: &str) -> Result<ComponentProxy>
	{
		let guard = self.state.lock();
		let state = guard.borrow();
		let id = *state
			.name_to_id
			.get(name)
			.ok_or_else(|| McfError::UnknownComponent(name.to_string()))?;
		Ok(ComponentProxy {
			id,
			manager: Arc::clone(self),
		})
	}

	fn get_ports(&self, id: u64) -> Result<Vec<PortInfo>>
	{
		let guard = self.state.lock();
		let state = guard.borrow();
		let record = state
			.components
			.get(&id)
			.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
		Ok(record
			.ports
			.values()
			.map(|e| PortInfo {
				name: e.port.name.clone(),
				direction: e.port.direction,
				topic: e.port.topic.clone(),
				is_valid: e.is_valid,
				is_connected: e.connected,
			})
			.collect())
	}

	fn get_port(&self, id: u64, name: &str) -> Result<PortInfo>
	{
		let guard = self.state.lock();
		let state = guard.borrow();
		let record = state
			.components
			.get(&id)
			.ok_or_else(|| McfError::UnknownComponent(id.to_string()))?;
		let entry = record
			.ports
			.get(name)
			.ok_or_else(|| invalid_port(&record.instance_name, name))?;
		Ok(PortInfo {
			name: entry.port.name.clone(),
			direction: entry.port.direction,
			topic: entry.port.topic.clone(),
			is_valid: entry.is_valid,
			is_connected: entry.connected,
		})
	}
}
