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

//! Delivery channels for connected ports: the runtime counterpart to the
//! static [`crate::port::Port`] description.
//!
//! A connected Sender port is a thin handle back into the manager that
//! publishes to the store under the port's mapped topic. A connected
//! Receiver port is backed by a bounded or unbounded queue fed by a
//! [`crate::store::Receiver`] registered on the store; queued receivers
//! apply the port's `maxQueueLength`/`blocking` policy, unqueued receivers
//! keep only the most recent value.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{McfError, Result};
use crate::manager::ComponentManager;
use crate::store::Receiver;
use crate::value::Value;

/// Handle a component uses to publish on one of its connected Sender
/// ports. Re-validates the owning component and the port's connection
/// state on every send.
pub struct PortSender
{
	pub(crate) manager: Arc<ComponentManager>,
	pub(crate) component_id: u64,
	pub(crate) name: String,
}

impl PortSender
{
	/// Publishes `value` to the port's mapped topic. A no-op (not an
	/// error) if the port is not currently connected, matching the
	/// invariant that a disconnected port simply drops writes.
	pub fn send(&self, value: Value) -> Result<()>
	{
		self.manager.publish_on_port(self.component_id, &self.name, value)
	}

	pub fn name(&self) -> &str
	{
		&self.name
	}
}

struct QueueState
{
	buffer: VecDeque<Value>,
	max_len: Option<usize>,
	blocking: bool,
}

impl Receiver for PortQueue
{
	fn on_value(&self, _topic: &str, value: &Value)
	{
		let mut state = self.state.lock();
		if let Some(max_len) = state.max_len {
			if state.buffer.len() >= max_len {
				if state.blocking {
					// A blocking queued receiver backs up the publisher's
					// thread rather than dropping data; since publication
					// here is synchronous on the caller's own thread we
					// wait for room rather than spin.
					while state.buffer.len() >= max_len {
						self.not_full.wait_for(&mut state, Duration::from_millis(50));
					}
				} else {
					state.buffer.pop_front();
				}
			}
		} else if state.buffer.len() >= UNQUEUED_CAPACITY {
			state.buffer.pop_front();
		}
		state.buffer.push_back(value.clone());
		self.not_empty.notify_all();
	}
}

/// An unqueued receiver keeps only the single latest value: the store
/// already holds it, so this capacity just bounds the small backlog that
/// can build up between deliveries and the component actually polling.
const UNQUEUED_CAPACITY: usize = 1;

/// The store-side receiver object for one connected Receiver port, shared
/// between the value store (which pushes) and the component (which pops
/// through a [`PortReceiver`] handle).
pub struct PortQueue
{
	state: Mutex<QueueState>,
	not_empty: Condvar,
	not_full: Condvar,
}

impl PortQueue
{
	pub fn new(max_len: Option<usize>, blocking: bool) -> Arc<Self>
	{
		Arc::new(PortQueue {
			state: Mutex::new(QueueState {
				buffer: VecDeque::new(),
				max_len,
				blocking,
			}),
			not_empty: Condvar::new(),
			not_full: Condvar::new(),
		})
	}

	fn pop(&self, wait: bool) -> Option<Value>
	{
		let mut state = self.state.lock();
		loop {
			if let Some(v) = state.buffer.pop_front() {
				self.not_full.notify_all();
				return Some(v);
			}
			if !wait {
				return None;
			}
			self.not_empty.wait(&mut state);
		}
	}

	pub fn len(&self) -> usize
	{
		self.state.lock().buffer.len()
	}

	pub fn is_empty(&self) -> bool
	{
		self.len() == 0
	}
}

/// Handle a component uses to read values delivered to one of its
/// connected, queued Receiver ports.
pub struct PortReceiver
{
	pub(crate) queue: Arc<PortQueue>,
	pub(crate) name: String,
}

impl PortReceiver
{
	pub fn try_recv(&self) -> Option<Value>
	{
		self.queue.pop(false)
	}

	/// Blocks until a value is available.
	pub fn recv(&self) -> Value
	{
		self.queue
			.pop(true)
			.expect("pop(true) only returns None when told not to wait")
	}

	pub fn len(&self) -> usize
	{
		self.queue.len()
	}

	pub fn is_empty(&self) -> bool
	{
		self.queue.is_empty()
	}

	pub fn name(&self) -> &str
	{
		&self.name
	}
}

pub(crate) fn invalid_port(component: &str, port: &str) -> McfError
{
	McfError::UnknownPort {
		component: component.to_string(),
		port: port.to_string(),
	}
}
