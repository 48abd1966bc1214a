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

//! In-process middleware for assembling, wiring, and driving a graph of
//! long-lived components that exchange typed messages through a shared,
//! topic-addressed value store. The key types are:
//!
//! *   [`ComponentManager`] owns the component/port registry and the
//!     REGISTERED -> CONFIGURED -> RUNNING lifecycle.
//! *   [`ComponentInstantiator`] creates named component instances from
//!     registered factory types and registers them with a manager.
//! *   [`ComponentSystemConfigurator`] turns a declarative description of a
//!     component graph into instantiated, wired components.
//! *   [`EventTimingController`] fires events from dynamic event sources in
//!     virtual-time order, with speed control and pause/resume.
//! *   [`ReplayEventController`] drives an `EventTimingController` through
//!     continuous, single-step, or step-by-time playback.
//! *   [`QueuedEventSource`] buffers externally-injected timestamped events.
//! *   [`ValueStore`] is the trait the topic-addressed store must satisfy;
//!     [`InMemoryValueStore`] is a reference adapter used by this crate's
//!     own tests.

mod component;
mod error;
mod etc;
mod event_source;
mod instantiator;
mod logging;
mod manager;
mod port;
mod ports;
mod queued_event_source;
mod rec;
mod store;
mod system_config;
mod timestamp;
mod topic;
mod topic_trigger_flags;
mod value;

pub use component::{Component, ComponentState, PortRegistrar, SchedulingParameters, SchedulingPolicy};
pub use error::{McfError, Result};
pub use etc::EventTimingController;
pub use event_source::EventSource;
pub use instantiator::{ComponentInstantiator, ComponentType};
pub use logging::LogSeverity;
pub use manager::{ComponentManager, ComponentProxy, PortInfo};
pub use port::{Port, PortDirection, QueuedReceiverParams};
pub use ports::{PortReceiver, PortSender};
pub use queued_event_source::QueuedEventSource;
pub use rec::{RecParams, RecState, ReplayEventController, RunMode};
pub use store::{get_value_as, InMemoryValueStore, Receiver, ValueStore};
pub use system_config::{
	ComponentConfig, ComponentSystemConfiguration, ComponentSystemConfigurator, PortMappingEntry,
	SchedulingParametersConfig,
};
pub use timestamp::Timestamp;
pub use topic::{is_valid_topic, UNMAPPED};
pub use topic_trigger_flags::TopicTriggerFlags;
pub use value::{IdGenerator, Value};
