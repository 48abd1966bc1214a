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

//! The system configurator (§4.7): turns a declarative, serde-deserializable
//! description of a component graph into instantiated, wired, running
//! components.
//!
//! This crate does not parse JSON/YAML itself — a caller deserializes
//! [`ComponentSystemConfiguration`] from whatever format they like and
//! passes it to [`ComponentSystemConfigurator::configure`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::component::{SchedulingParameters, SchedulingPolicy};
use crate::error::{McfError, Result};
use crate::instantiator::ComponentInstantiator;
use crate::manager::{ComponentManager, ComponentProxy};

fn default_policy() -> String
{
	"default".to_string()
}

fn default_priority() -> i32
{
	0
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingParametersConfig
{
	#[serde(default = "default_policy")]
	pub policy: String,
	#[serde(default = "default_priority")]
	pub priority: i32,
}

impl Default for SchedulingParametersConfig
{
	fn default() -> Self
	{
		SchedulingParametersConfig {
			policy: default_policy(),
			priority: default_priority(),
		}
	}
}

impl SchedulingParametersConfig
{
	fn to_scheduling_parameters(&self) -> SchedulingParameters
	{
		let policy = match self.policy.as_str() {
			"other" => SchedulingPolicy::Other,
			"fifo" => SchedulingPolicy::Fifo,
			"round-robin" => SchedulingPolicy::RoundRobin,
			_ => SchedulingPolicy::Default,
		};
		SchedulingParameters {
			policy,
			priority: self.priority,
		}
	}
}

/// One port's mapping entry: either a bare topic string, an explicit
/// `null` (unmapped), or `{ topic, connected }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortMappingEntry
{
	Topic(String),
	Detailed { topic: String, connected: bool },
}

impl PortMappingEntry
{
	fn topic(&self) -> &str
	{
		match self {
			PortMappingEntry::Topic(t) => t,
			PortMappingEntry::Detailed { topic, .. } => topic,
		}
	}

	/// Defaults to `true` unless the topic is empty, per §6.3.
	fn connected(&self) -> bool
	{
		match self {
			PortMappingEntry::Topic(t) => !t.is_empty(),
			PortMappingEntry::Detailed { topic, connected } => *connected && !topic.is_empty(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentConfig
{
	#[serde(default)]
	pub r#type: String,
	#[serde(default)]
	pub scheduling_parameters: SchedulingParametersConfig,
	#[serde(default)]
	pub port_mapping: HashMap<String, Option<PortMappingEntry>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ComponentSystemConfiguration
{
	#[serde(default)]
	pub components: HashMap<String, ComponentConfig>,
}

/// Instantiates and wires a component graph from a declarative
/// description, atomically: any failure rolls back every component this
/// call itself created (reused, pre-existing components are left alone).
pub struct ComponentSystemConfigurator
{
	manager: Arc<ComponentManager>,
	instantiator: Arc<ComponentInstantiator>,
}

impl ComponentSystemConfigurator
{
	pub fn new(manager: Arc<ComponentManager>, instantiator: Arc<ComponentInstantiator>) -> Self
	{
		ComponentSystemConfigurator {
			manager,
			instantiator,
		}
	}

	pub fn configure(&self, config: &ComponentSystemConfiguration) -> Result<()>
	{
		let existing: HashMap<String, String> = self
			.instantiator
			.list_components()
			.into_iter()
			.filter_map(|(name, proxy)| proxy.type_name().ok().map(|t| (name, t)))
			.collect();

		let mut created: Vec<String> = Vec::new();
		let mut errors: Vec<String> = Vec::new();

		for (instance_name, entry) in &config.components {
			match self.configure_one(instance_name, entry, &existing) {
				Ok(Some(name)) => created.push(name),
				Ok(None) => {}
				Err(e) => errors.push(format!("{instance_name}: {e}")),
			}
		}

		let valid = self.manager.validate_configuration();
		if !errors.is_empty() || !valid {
			for name in created.into_iter().rev() {
				if let Err(e) = self.instantiator.remove_component(&name) {
					tracing::warn!(instance = name, error = %e, "rollback failed to remove component");
				}
			}
			if !valid {
				errors.push("post-configuration topic validation failed".to_string());
			}
			return Err(McfError::SystemConfigurationError(errors.join("\n")));
		}

		Ok(())
	}

	/// Returns `Ok(Some(name))` if this call instantiated a fresh
	/// component (so the caller can roll it back on overall failure),
	/// `Ok(None)` if an existing component was reused in place.
	fn configure_one(
		&self,
		instance_name: &str,
		entry: &ComponentConfig,
		existing: &HashMap<String, String>,
	) -> Result<Option<String>>
	{
		let (proxy, freshly_created) = match existing.get(instance_name) {
			Some(existing_type) => {
				if !entry.r#type.is_empty() && existing_type != &entry.r#type {
					return Err(McfError::TypeMismatch {
						name: instance_name.to_string(),
						expected_type: existing_type.clone(),
						actual_type: entry.r#type.clone(),
					});
				}
				let proxy = self.manager.find_by_name(instance_name)?;
				(proxy, false)
			}
			None => {
				if entry.r#type.is_empty() {
					return Err(McfError::InvalidArgument(format!(
						"{instance_name} has no existing instance and no type to instantiate"
					)));
				}
				let proxy = self.instantiator.create_component(&entry.r#type, instance_name)?;
				proxy.configure()?;
				(proxy, true)
			}
		};

		self.apply_wiring(&proxy, instance_name, entry)?;

		Ok(if freshly_created {
			Some(instance_name.to_string())
		} else {
			None
		})
	}

	fn apply_wiring(&self, proxy: &ComponentProxy, instance_name: &str, entry: &ComponentConfig) -> Result<()>
	{
		let config_topic = format!("/mcf/config/{instance_name}");
		for implicit_port in ["config_in", "config_out"] {
			if proxy.port(implicit_port).is_ok() {
				proxy.map_port(implicit_port, &config_topic)?;
				proxy.connect_port(implicit_port)?;
			}
		}

		proxy.set_scheduling_parameters(entry.scheduling_parameters.to_scheduling_parameters())?;

		for (port_name, mapping) in &entry.port_mapping {
			let Some(mapping) = mapping else {
				continue;
			};
			let topic = mapping.topic();
			proxy.map_port(port_name, topic)?;
			if mapping.connected() {
				proxy.connect_port(port_name)?;
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::component::{Component, ComponentState, PortRegistrar};
	use crate::instantiator::ComponentType;
	use crate::port::Port;
	use crate::store::InMemoryValueStore;

	struct Echo
	{
		name: String,
		state: ComponentState,
	}

	impl Component for Echo
	{
		fn configure(&mut self, registrar: &mut dyn PortRegistrar) -> Result<()>
		{
			registrar.register_port(Port::new_sender("out"))?;
			registrar.register_port(Port::new_receiver("in"))?;
			Ok(())
		}
		fn ctrl_start(&mut self)
		{
			self.state = ComponentState::Started;
		}
		fn ctrl_run(&mut self)
		{
			self.state = ComponentState::Running;
		}
		fn ctrl_stop(&mut self)
		{
			self.state = ComponentState::Stopped;
		}
		fn get_state(&self) -> ComponentState
		{
			self.state
		}
		fn get_name(&self) -> &str
		{
			&self.name
		}
	}

	fn setup() -> (Arc<ComponentManager>, Arc<ComponentInstantiator>, ComponentSystemConfigurator)
	{
		let store: Arc<dyn crate::store::ValueStore> = Arc::new(InMemoryValueStore::new());
		let manager = ComponentManager::new(store, vec![]);
		let instantiator = Arc::new(ComponentInstantiator::new(Arc::clone(&manager)));
		instantiator
			.add_component_type(ComponentType::new("demo/echo", || {
				Box::new(Echo {
					name: "echo".to_string(),
					state: ComponentState::Stopped,
				})
			}))
			.unwrap();
		let configurator = ComponentSystemConfigurator::new(Arc::clone(&manager), Arc::clone(&instantiator));
		(manager, instantiator, configurator)
	}

	fn config_from_json(json: &str) -> ComponentSystemConfiguration
	{
		serde_json::from_str(json).unwrap()
	}

	#[test]
	fn instantiates_and_wires_a_new_component()
	{
		let (manager, _instantiator, configurator) = setup();
		let config = config_from_json(
			r#"{
				"components": {
					"a": {
						"type": "demo/echo",
						"port_mapping": { "out": "topic.x" }
					}
				}
			}"#,
		);
		configurator.configure(&config).unwrap();
		let proxy = manager.find_by_name("a").unwrap();
		assert_eq!(proxy.port("out").unwrap().topic, "topic.x");
		assert!(proxy.port("out").unwrap().is_connected);
	}

	#[test]
	fn reusing_an_existing_instance_with_matching_type_succeeds()
	{
		let (_manager, instantiator, configurator) = setup();
		instantiator.create_component("demo/echo", "a").unwrap().configure().unwrap();
		let config = config_from_json(
			r#"{ "components": { "a": { "type": "demo/echo", "port_mapping": {} } } }"#,
		);
		assert!(configurator.configure(&config).is_ok());
	}

	#[test]
	fn conflicting_type_reuse_is_a_type_mismatch()
	{
		let (_manager, instantiator, configurator) = setup();
		instantiator.create_component("demo/echo", "a").unwrap().configure().unwrap();
		let config = config_from_json(
			r#"{ "components": { "a": { "type": "demo/other", "port_mapping": {} } } }"#,
		);
		let err = configurator.configure(&config).unwrap_err();
		assert!(matches!(err, McfError::SystemConfigurationError(_)));
	}

	#[test]
	fn null_port_mapping_leaves_the_port_unmapped()
	{
		let (manager, _instantiator, configurator) = setup();
		let config = config_from_json(
			r#"{ "components": { "a": { "type": "demo/echo", "port_mapping": { "out": null } } } }"#,
		);
		configurator.configure(&config).unwrap();
		let proxy = manager.find_by_name("a").unwrap();
		assert_eq!(proxy.port("out").unwrap().topic, "");
	}

	#[test]
	fn unknown_type_rolls_back_every_component_created_in_the_call()
	{
		let (manager, _instantiator, configurator) = setup();
		let config = config_from_json(
			r#"{
				"components": {
					"a": { "type": "demo/echo", "port_mapping": {} },
					"b": { "type": "demo/missing", "port_mapping": {} }
				}
			}"#,
		);
		assert!(configurator.configure(&config).is_err());
		assert!(manager.find_by_name("a").is_err());
		assert!(manager.find_by_name("b").is_err());
	}
}
