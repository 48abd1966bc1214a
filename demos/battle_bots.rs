//! Two bots trade blows over a pair of topics until one of them runs out
//! of hit points. Demonstrates wiring components together declaratively
//! through [`ComponentSystemConfigurator`] rather than calling `mapPort`
//! by hand.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use mcf_rt::{
	Component, ComponentInstantiator, ComponentManager, ComponentState, ComponentSystemConfiguration,
	ComponentSystemConfigurator, ComponentType, InMemoryValueStore, Port, PortReceiver, PortRegistrar, PortSender,
	Result, Value, ValueStore,
};

const STARTING_HP: i32 = 20;

struct Bot
{
	name: String,
	state: ComponentState,
	hp: Arc<AtomicI32>,
	running: Arc<AtomicBool>,
	incoming: Option<PortReceiver>,
	outgoing: Option<PortSender>,
	worker: Option<JoinHandle<()>>,
}

impl Bot
{
	fn new(name: impl Into<String>) -> Self
	{
		Bot {
			name: name.into(),
			state: ComponentState::Stopped,
			hp: Arc::new(AtomicI32::new(STARTING_HP)),
			running: Arc::new(AtomicBool::new(false)),
			incoming: None,
			outgoing: None,
			worker: None,
		}
	}
}

impl Component for Bot
{
	fn configure(&mut self, registrar: &mut dyn PortRegistrar) -> Result<()>
	{
		registrar.register_port(Port::new_queued_receiver(
			"incoming",
			mcf_rt::QueuedReceiverParams {
				max_queue_length: 4,
				blocking: false,
			},
		))?;
		registrar.register_port(Port::new_sender("outgoing"))?;
		self.incoming = Some(registrar.receiver("incoming")?);
		self.outgoing = Some(registrar.sender("outgoing")?);
		Ok(())
	}

	fn ctrl_start(&mut self)
	{
		self.running.store(true, Ordering::SeqCst);
		let incoming = self.incoming.take().expect("configured before start");
		let outgoing = self.outgoing.take().expect("configured before start");
		let hp = Arc::clone(&self.hp);
		let running = Arc::clone(&self.running);
		let name = self.name.clone();

		self.worker = Some(thread::spawn(move || {
			// Polls rather than blocking on `recv` so shutdown (which
			// disconnects ports before this loop notices) can't wedge the
			// thread waiting on a hit that will never arrive.
			while running.load(Ordering::SeqCst) {
				let Some(hit) = incoming.try_recv() else {
					thread::sleep(std::time::Duration::from_millis(5));
					continue;
				};
				let damage = hit.downcast_ref::<i32>().copied().unwrap_or(0);
				let remaining = hp.fetch_sub(damage, Ordering::SeqCst) - damage;
				tracing::info!(bot = %name, damage, remaining, "took a hit");
				if remaining <= 0 {
					break;
				}
				let _ = outgoing.send(Value::new(1i32, remaining as u64));
			}
		}));
		self.state = ComponentState::Started;
	}

	fn ctrl_run(&mut self)
	{
		self.state = ComponentState::Running;
	}

	fn ctrl_stop(&mut self)
	{
		self.running.store(false, Ordering::SeqCst);
		if let Some(worker) = self.worker.take() {
			let _ = worker.join();
		}
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

fn main()
{
	tracing_subscriber::fmt::init();

	let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
	let manager = ComponentManager::new(store.clone(), vec![]);
	let instantiator = Arc::new(ComponentInstantiator::new(Arc::clone(&manager)));
	instantiator
		.add_component_type(ComponentType::new("demo/bot", || Box::new(Bot::new("unnamed"))))
		.expect("register type");

	let configurator = ComponentSystemConfigurator::new(Arc::clone(&manager), Arc::clone(&instantiator));
	let config: ComponentSystemConfiguration = serde_json::from_str(
		r#"{
			"components": {
				"alice": {
					"type": "demo/bot",
					"port_mapping": { "incoming": "bots.to_alice", "outgoing": "bots.to_bob" }
				},
				"bob": {
					"type": "demo/bot",
					"port_mapping": { "incoming": "bots.to_bob", "outgoing": "bots.to_alice" }
				}
			}
		}"#,
	)
	.expect("valid config");
	configurator.configure(&config).expect("wiring succeeds");

	manager.startup(true);

	// Throw the first punch; the bots keep going until one drops.
	store.set_value("bots.to_alice", Value::new(3i32, 1));

	thread::sleep(std::time::Duration::from_millis(200));
	manager.shutdown();
}
