//! A crude game of telephone: a chain of repeater components each garble
//! a line of text by replacing a fraction of its letters with dashes and
//! forward it downstream. The line is injected through a
//! [`QueuedEventSource`] driven by an [`EventTimingController`], ending
//! when the last repeater's output is all dashes.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;

use mcf_rt::{
	Component, ComponentInstantiator, ComponentManager, ComponentState, ComponentSystemConfiguration,
	ComponentSystemConfigurator, ComponentType, EventTimingController, InMemoryValueStore, Port, PortReceiver,
	PortRegistrar, PortSender, QueuedEventSource, Result, Timestamp, Value, ValueStore,
};

const POEM_LINE: &str = "Tyger Tyger, burning bright, in the forests of the night";
const ERROR_RATE: u32 = 6;
const NUM_REPEATERS: usize = 5;

fn garble(text: &str) -> String
{
	let mut rng = rand::thread_rng();
	text.chars()
		.map(|c| if rng.gen_ratio(1, ERROR_RATE) { '-' } else { c })
		.collect()
}

fn is_fully_garbled(text: &str) -> bool
{
	text.chars().all(|c| c == '-' || c.is_whitespace() || !c.is_alphabetic())
}

struct Repeater
{
	name: String,
	state: ComponentState,
	incoming: Option<PortReceiver>,
	outgoing: Option<PortSender>,
	worker: Option<thread::JoinHandle<()>>,
	stop: Arc<std::sync::atomic::AtomicBool>,
}

impl Repeater
{
	fn new(name: impl Into<String>) -> Self
	{
		Repeater {
			name: name.into(),
			state: ComponentState::Stopped,
			incoming: None,
			outgoing: None,
			worker: None,
			stop: Arc::new(std::sync::atomic::AtomicBool::new(false)),
		}
	}
}

impl Component for Repeater
{
	fn configure(&mut self, registrar: &mut dyn PortRegistrar) -> Result<()>
	{
		registrar.register_port(Port::new_receiver("incoming"))?;
		registrar.register_port(Port::new_sender("outgoing"))?;
		self.incoming = Some(registrar.receiver("incoming")?);
		self.outgoing = Some(registrar.sender("outgoing")?);
		Ok(())
	}

	fn ctrl_start(&mut self)
	{
		let incoming = self.incoming.take().expect("configured before start");
		let outgoing = self.outgoing.take().expect("configured before start");
		let stop = Arc::clone(&self.stop);
		let name = self.name.clone();

		self.worker = Some(thread::spawn(move || {
			while !stop.load(std::sync::atomic::Ordering::SeqCst) {
				let Some(line) = incoming.try_recv() else {
					thread::sleep(Duration::from_millis(5));
					continue;
				};
				let Some(text) = line.downcast_ref::<String>() else {
					continue;
				};
				let garbled = garble(text);
				tracing::debug!(repeater = %name, %garbled, "forwarding");
				let _ = outgoing.send(Value::new(garbled, line.id()));
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
		self.stop.store(true, std::sync::atomic::Ordering::SeqCst);
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
		.add_component_type(ComponentType::new("demo/repeater", || Box::new(Repeater::new("unnamed"))))
		.expect("register type");

	let mut components = serde_json::Map::new();
	for i in 0..NUM_REPEATERS {
		let entry = serde_json::json!({
			"type": "demo/repeater",
			"port_mapping": {
				"incoming": format!("line.{i}"),
				"outgoing": format!("line.{}", i + 1),
			}
		});
		components.insert(format!("repeater-{i}"), entry);
	}
	let config: ComponentSystemConfiguration =
		serde_json::from_value(serde_json::json!({ "components": components })).expect("valid config");

	let configurator = ComponentSystemConfigurator::new(Arc::clone(&manager), Arc::clone(&instantiator));
	configurator.configure(&config).expect("wiring succeeds");
	manager.startup(true);

	let etc = Arc::new(EventTimingController::new());
	let source = Arc::new(QueuedEventSource::new(store.clone(), Arc::downgrade(&etc)));
	source.push_new_event(Timestamp(0), "line.0", Value::new(POEM_LINE.to_string(), 1), "narrator", "outgoing");
	source.set_finished(true);
	etc.add_event_source("narrator", source);
	etc.start();

	let last_topic = format!("line.{NUM_REPEATERS}");
	let deadline = std::time::Instant::now() + Duration::from_secs(2);
	loop {
		if let Some(line) = store.get_value(&last_topic) {
			if let Some(text) = line.downcast_ref::<String>() {
				if is_fully_garbled(text) {
					tracing::info!(%text, "fully garbled, stopping");
					break;
				}
			}
		}
		if std::time::Instant::now() > deadline {
			tracing::info!("deadline reached without full garbling");
			break;
		}
		thread::sleep(Duration::from_millis(10));
	}

	etc.finish();
	manager.shutdown();
}
