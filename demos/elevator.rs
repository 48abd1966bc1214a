//! Smallest possible component: registers no ports, just logs through its
//! lifecycle. Shows the minimum ceremony needed to run a component to
//! completion.

use std::sync::Arc;

use mcf_rt::{Component, ComponentManager, ComponentState, InMemoryValueStore, PortRegistrar, Result, ValueStore};

struct Elevator
{
	state: ComponentState,
}

impl Component for Elevator
{
	fn configure(&mut self, _registrar: &mut dyn PortRegistrar) -> Result<()>
	{
		tracing::info!("configuring");
		Ok(())
	}

	fn ctrl_start(&mut self)
	{
		self.state = ComponentState::Started;
	}

	fn ctrl_run(&mut self)
	{
		tracing::info!("running");
		self.state = ComponentState::Running;
	}

	fn ctrl_stop(&mut self)
	{
		tracing::info!("stopping");
		self.state = ComponentState::Stopped;
	}

	fn get_state(&self) -> ComponentState
	{
		self.state
	}

	fn get_name(&self) -> &str
	{
		"elevator"
	}
}

fn main()
{
	tracing_subscriber::fmt::init();

	let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
	let manager = ComponentManager::new(store, vec![]);

	let elevator = Box::new(Elevator {
		state: ComponentState::Stopped,
	});
	let proxy = manager
		.register_component(elevator, "demo/elevator", "elevator")
		.expect("register");

	proxy.configure().expect("configure");
	proxy.startup(true).expect("startup");
	proxy.shutdown().expect("shutdown");
}
