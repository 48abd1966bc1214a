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

//! The contract every user component implements (§6.2), plus the small
//! value types the manager threads through it: inner lifecycle state,
//! scheduling parameters, and the port registrar a component sees during
//! its one-time `configure` call.

use std::sync::Arc;

use crate::error::Result;
use crate::logging::LogSeverity;
use crate::port::Port;
use crate::ports::{PortReceiver, PortSender};
use crate::value::IdGenerator;

/// A component's view of its own lifecycle, distinct from (but coupled to)
/// the manager's REGISTERED/CONFIGURED/RUNNING view of the same component
/// (see the data model note in §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState
{
	Stopped,
	Started,
	Running,
}

/// OS scheduling policy requested for a component's thread. Applying this
/// is best-effort: a host without the right privileges may silently not
/// honor it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingPolicy
{
	Default,
	Other,
	Fifo,
	RoundRobin,
}

impl Default for SchedulingPolicy
{
	fn default() -> Self
	{
		SchedulingPolicy::Default
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulingParameters
{
	pub policy: SchedulingPolicy,
	pub priority: i32,
}

/// Handed to a component's `configure` method so it can register its ports
/// without holding a reference to the whole manager. Implemented by the
/// manager itself; every call re-enters the manager's (re-entrant) guard.
pub trait PortRegistrar
{
	/// Registers a port with no topic mapped; the port stays unconnectable
	/// until a later `mapPort` call gives it one.
	fn register_port(&mut self, port: Port) -> Result<()>;

	/// Registers a port already bound to `topic`.
	fn register_port_mapped(&mut self, port: Port, topic: &str) -> Result<()>;

	/// A handle to publish on a just-registered Sender port.
	fn sender(&self, name: &str) -> Result<PortSender>;

	/// A handle to read from a just-registered Receiver port.
	fn receiver(&self, name: &str) -> Result<PortReceiver>;
}

/// Implemented by every user-defined component type and driven through the
/// REGISTERED -> CONFIGURED -> RUNNING -> CONFIGURED -> ... lifecycle by a
/// [`crate::manager::ComponentManager`].
pub trait Component: Send
{
	/// Called exactly once, while the manager's guard is held, to register
	/// this component's ports. Must not block.
	fn configure(&mut self, registrar: &mut dyn PortRegistrar) -> Result<()>;

	/// Called once per RUNNING transition, before the manager polls
	/// `get_state` for STARTED. Implementations that spawn a worker thread
	/// should flip their inner state to STARTED as soon as that thread is
	/// ready to process events, not merely spawned.
	fn ctrl_start(&mut self);

	/// Called once `get_state` has reported STARTED; implementations
	/// transition to RUNNING here (or let their worker thread do so).
	fn ctrl_run(&mut self);

	/// Called on shutdown; must block until the component's thread (if
	/// any) has actually stopped.
	fn ctrl_stop(&mut self);

	fn ctrl_set_config_dirs(&mut self, _dirs: &[String])
	{}
	fn ctrl_set_config_name(&mut self, _name: &str)
	{}
	fn ctrl_set_scheduling_parameters(&mut self, _params: SchedulingParameters)
	{}
	fn ctrl_set_log_levels(&mut self, _console: LogSeverity, _store: LogSeverity)
	{}
	fn set_id_generator(&mut self, _generator: Arc<IdGenerator>)
	{}

	fn get_state(&self) -> ComponentState;
	fn get_name(&self) -> &str;
}
