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

//! The component instantiator (§4.2): a factory registry that creates
//! named instances of registered component types and registers them with
//! a [`ComponentManager`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::component::Component;
use crate::error::{McfError, Result};
use crate::manager::{ComponentManager, ComponentProxy};

/// A qualified `namespace/name` component type plus the closure that
/// produces fresh instances of it.
pub struct ComponentType
{
	pub qualified_name: String,
	factory: Arc<dyn Fn() -> Box<dyn Component> + Send + Sync>,
}

impl ComponentType
{
	pub fn new(
		qualified_name: impl Into<String>,
		factory: impl Fn() -> Box<dyn Component> + Send + Sync + 'static,
	) -> Self
	{
		ComponentType {
			qualified_name: qualified_name.into(),
			factory: Arc::new(factory),
		}
	}
}

struct Instance
{
	instance_name: String,
	qualified_name: String,
	proxy: ComponentProxy,
}

struct InstantiatorState
{
	types: HashMap<String, ComponentType>,
	instances: Vec<Instance>,
}

/// Creates and tracks named instances of registered component types.
pub struct ComponentInstantiator
{
	manager: Arc<ComponentManager>,
	state: Mutex<InstantiatorState>,
}

impl ComponentInstantiator
{
	pub fn new(manager: Arc<ComponentManager>) -> Self
	{
		ComponentInstantiator {
			manager,
			state: Mutex::new(InstantiatorState {
				types: HashMap::new(),
				instances: Vec::new(),
			}),
		}
	}

	pub fn add_component_type(&self, component_type: ComponentType) -> Result<()>
	{
		let mut state = self.state.lock();
		if state.types.contains_key(&component_type.qualified_name) {
			return Err(McfError::DuplicateType(component_type.qualified_name));
		}
		state
			.types
			.insert(component_type.qualified_name.clone(), component_type);
		Ok(())
	}

	/// Existing instances of a removed type are left running; only new
	/// `createComponent` calls for that type are affected.
	pub fn remove_component_type(&self, qualified_name: &str)
	{
		self.state.lock().types.remove(qualified_name);
	}

	pub fn create_component(
		&self,
		qualified_name: &str,
		instance_name: &str,
	) -> Result<ComponentProxy>
	{
		if instance_name.is_empty() {
			return Err(McfError::InvalidArgument(
				"instance name must not be empty".to_string(),
			));
		}

		let mut state = self.state.lock();
		if state.instances.iter().any(|i| i.instance_name == instance_name) {
			return Err(McfError::InstantiationError {
				instance: instance_name.to_string(),
				type_name: qualified_name.to_string(),
				reason: "instance name already in use".to_string(),
			});
		}
		let factory = state
			.types
			.get(qualified_name)
			.map(|t| Arc::clone(&t.factory))
			.ok_or_else(|| McfError::InstantiationError {
				instance: instance_name.to_string(),
				type_name: qualified_name.to_string(),
				reason: "unknown component type".to_string(),
			})?;

		let component = factory();
		let proxy = self
			.manager
			.register_component(component, qualified_name, instance_name)
			.map_err(|e| McfError::InstantiationError {
				instance: instance_name.to_string(),
				type_name: qualified_name.to_string(),
				reason: e.to_string(),
			})?;

		state.instances.push(Instance {
			instance_name: instance_name.to_string(),
			qualified_name: qualified_name.to_string(),
			proxy: proxy.clone(),
		});
		Ok(proxy)
	}

	pub fn remove_component(&self, instance_name: &str) -> Result<()>
	{
		let mut state = self.state.lock();
		let index = state
			.instances
			.iter()
			.position(|i| i.instance_name == instance_name)
			.ok_or_else(|| McfError::UnknownComponent(instance_name.to_string()))?;
		let instance = state.instances.remove(index);
		instance.proxy.erase()
	}

	/// Removes the existing instance and creates a fresh one of the same
	/// qualified type under the same instance name. Per the design notes,
	/// this intentionally does not carry over the old instance's port
	/// mappings or scheduling parameters.
	pub fn reload_component(&self, instance_name: &str) -> Result<ComponentProxy>
	{
		let qualified_name = {
			let state = self.state.lock();
			state
				.instances
				.iter()
				.find(|i| i.instance_name == instance_name)
				.map(|i| i.qualified_name.clone())
				.ok_or_else(|| McfError::UnknownComponent(instance_name.to_string()))?
		};
		self.remove_component(instance_name)?;
		self.create_component(&qualified_name, instance_name)
	}

	pub fn list_components(&self) -> Vec<(String, ComponentProxy)>
	{
		self.state
			.lock()
			.instances
			.iter()
			.map(|i| (i.instance_name.clone(), i.proxy.clone()))
			.collect()
	}

	/// Lists every registered type's qualified name, optionally filtered
	/// to those under `namespace` (the part before the `/`).
	pub fn list_component_types(&self, namespace: Option<&str>) -> Vec<String>
	{
		let state = self.state.lock();
		state
			.types
			.keys()
			.filter(|name| match namespace {
				Some(ns) => name.split('/').next() == Some(ns),
				None => true,
			})
			.cloned()
			.collect()
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::component::{Component, ComponentState, PortRegistrar};
	use crate::store::InMemoryValueStore;

	struct Noop
	{
		name: String,
		state: ComponentState,
	}

	impl Component for Noop
	{
		fn configure(&mut self, _registrar: &mut dyn PortRegistrar) -> Result<()>
		{
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

	fn setup() -> (Arc<ComponentManager>, ComponentInstantiator)
	{
		let store: Arc<dyn crate::store::ValueStore> = Arc::new(InMemoryValueStore::new());
		let manager = ComponentManager::new(store, vec![]);
		let instantiator = ComponentInstantiator::new(Arc::clone(&manager));
		instantiator
			.add_component_type(ComponentType::new("demo/noop", || {
				Box::new(Noop {
					name: "noop".to_string(),
					state: ComponentState::Stopped,
				})
			}))
			.unwrap();
		(manager, instantiator)
	}

	#[test]
	fn create_registers_with_the_manager()
	{
		let (manager, instantiator) = setup();
		let proxy = instantiator.create_component("demo/noop", "a").unwrap();
		assert!(manager.get_component(proxy.id()).is_ok());
	}

	#[test]
	fn duplicate_instance_name_is_rejected()
	{
		let (_manager, instantiator) = setup();
		instantiator.create_component("demo/noop", "a").unwrap();
		assert!(instantiator.create_component("demo/noop", "a").is_err());
	}

	#[test]
	fn unknown_type_is_rejected()
	{
		let (_manager, instantiator) = setup();
		assert!(instantiator.create_component("demo/missing", "a").is_err());
	}

	#[test]
	fn reload_preserves_instance_name_with_a_fresh_instance()
	{
		let (manager, instantiator) = setup();
		let first = instantiator.create_component("demo/noop", "a").unwrap();
		let reloaded = instantiator.reload_component("a").unwrap();
		assert_ne!(first.id(), reloaded.id());
		assert!(manager.get_component(first.id()).is_err());
		assert!(manager.get_component(reloaded.id()).is_ok());
	}

	#[test]
	fn remove_component_type_leaves_existing_instances_alone()
	{
		let (manager, instantiator) = setup();
		let proxy = instantiator.create_component("demo/noop", "a").unwrap();
		instantiator.remove_component_type("demo/noop");
		assert!(manager.get_component(proxy.id()).is_ok());
		assert!(instantiator.create_component("demo/noop", "b").is_err());
	}
}
