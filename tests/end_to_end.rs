//! End-to-end scenarios exercising the full component/port/topic stack
//! together rather than one module at a time.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mcf_rt::{
	Component, ComponentInstantiator, ComponentManager, ComponentState, ComponentSystemConfiguration,
	ComponentSystemConfigurator, ComponentType, EventTimingController, InMemoryValueStore, McfError, Port,
	PortReceiver, PortRegistrar, PortSender, QueuedEventSource, QueuedReceiverParams, RecParams,
	ReplayEventController, RunMode, Result, SchedulingParameters, Timestamp, Value, ValueStore,
};

fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool
{
	let deadline = std::time::Instant::now() + timeout;
	while std::time::Instant::now() < deadline {
		if condition() {
			return true;
		}
		thread::sleep(Duration::from_millis(5));
	}
	condition()
}

struct Echo
{
	name: String,
	state: ComponentState,
	incoming: Option<PortReceiver>,
	outgoing: Option<PortSender>,
	worker: Option<thread::JoinHandle<()>>,
	running: Arc<AtomicBool>,
}

impl Echo
{
	fn new(name: impl Into<String>) -> Self
	{
		Echo {
			name: name.into(),
			state: ComponentState::Stopped,
			incoming: None,
			outgoing: None,
			worker: None,
			running: Arc::new(AtomicBool::new(false)),
		}
	}
}

impl Component for Echo
{
	fn configure(&mut self, registrar: &mut dyn PortRegistrar) -> Result<()>
	{
		registrar.register_port(Port::new_receiver("in"))?;
		registrar.register_port(Port::new_sender("out"))?;
		self.incoming = Some(registrar.receiver("in")?);
		self.outgoing = Some(registrar.sender("out")?);
		Ok(())
	}

	fn ctrl_start(&mut self)
	{
		self.running.store(true, Ordering::SeqCst);
		let incoming = self.incoming.take().expect("configured before start");
		let outgoing = self.outgoing.take().expect("configured before start");
		let running = Arc::clone(&self.running);

		self.worker = Some(thread::spawn(move || {
			while running.load(Ordering::SeqCst) {
				let Some(value) = incoming.try_recv() else {
					thread::sleep(Duration::from_millis(5));
					continue;
				};
				let _ = outgoing.send(value);
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

#[test]
fn echo_round_trips_a_value_through_two_topics()
{
	let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
	let manager = ComponentManager::new(store.clone(), vec![]);

	let proxy = manager
		.register_component(Box::new(Echo::new("echo")), "demo/echo", "echo")
		.unwrap();
	proxy.configure().unwrap();
	proxy.map_port("in", "echo.in").unwrap();
	proxy.map_port("out", "echo.out").unwrap();
	proxy.startup(true).unwrap();

	store.set_value("echo.in", Value::new(42i32, 1));
	assert!(wait_until(|| store.has_value("echo.out"), Duration::from_millis(500)));
	assert_eq!(
		store.get_value("echo.out").unwrap().downcast_ref::<i32>().copied(),
		Some(42)
	);

	manager.shutdown();
}

#[test]
fn erase_component_before_write_never_delivers_a_stale_value()
{
	let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
	let manager = ComponentManager::new(store.clone(), vec![]);

	let proxy = manager
		.register_component(Box::new(Echo::new("echo")), "demo/echo", "echo")
		.unwrap();
	proxy.configure().unwrap();
	proxy.map_port("in", "echo.in").unwrap();
	proxy.map_port("out", "echo.out").unwrap();
	proxy.startup(true).unwrap();
	proxy.shutdown().unwrap();
	proxy.erase().unwrap();

	store.set_value("echo.in", Value::new(7i32, 1));
	thread::sleep(Duration::from_millis(50));
	assert!(!store.has_value("echo.out"));
	assert!(manager.get_component(proxy.id()).is_err());
}

struct Counter
{
	name: String,
	state: ComponentState,
	incoming: Option<PortReceiver>,
	total: Arc<AtomicI32>,
	worker: Option<thread::JoinHandle<()>>,
	running: Arc<AtomicBool>,
}

impl Counter
{
	fn new(name: impl Into<String>, total: Arc<AtomicI32>) -> Self
	{
		Counter {
			name: name.into(),
			state: ComponentState::Stopped,
			incoming: None,
			total,
			worker: None,
			running: Arc::new(AtomicBool::new(false)),
		}
	}
}

impl Component for Counter
{
	fn configure(&mut self, registrar: &mut dyn PortRegistrar) -> Result<()>
	{
		registrar.register_port(Port::new_queued_receiver(
			"in",
			QueuedReceiverParams {
				max_queue_length: 8,
				blocking: false,
			},
		))?;
		self.incoming = Some(registrar.receiver("in")?);
		Ok(())
	}

	fn ctrl_start(&mut self)
	{
		self.running.store(true, Ordering::SeqCst);
		let incoming = self.incoming.take().expect("configured before start");
		let total = Arc::clone(&self.total);
		let running = Arc::clone(&self.running);
		self.worker = Some(thread::spawn(move || {
			while running.load(Ordering::SeqCst) {
				let Some(value) = incoming.try_recv() else {
					thread::sleep(Duration::from_millis(5));
					continue;
				};
				if let Some(n) = value.downcast_ref::<i32>() {
					total.fetch_add(*n, Ordering::SeqCst);
				}
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

#[test]
fn declarative_config_honors_explicit_connected_false()
{
	let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
	let manager = ComponentManager::new(store.clone(), vec![]);
	let instantiator = Arc::new(ComponentInstantiator::new(Arc::clone(&manager)));
	let total = Arc::new(AtomicI32::new(0));
	let total_for_factory = Arc::clone(&total);
	instantiator
		.add_component_type(ComponentType::new("demo/counter", move || {
			Box::new(Counter::new("unnamed", Arc::clone(&total_for_factory)))
		}))
		.unwrap();

	let configurator = ComponentSystemConfigurator::new(Arc::clone(&manager), Arc::clone(&instantiator));
	let config: ComponentSystemConfiguration = serde_json::from_str(
		r#"{
			"components": {
				"counter": {
					"type": "demo/counter",
					"port_mapping": { "in": { "topic": "tally", "connected": false } }
				}
			}
		}"#,
	)
	.unwrap();
	configurator.configure(&config).unwrap();

	let proxy = manager.find_by_name("counter").unwrap();
	assert_eq!(proxy.port("in").unwrap().topic, "tally");
	assert!(!proxy.port("in").unwrap().is_connected);

	manager.startup(false);
	store.set_value("tally", Value::new(5i32, 1));
	thread::sleep(Duration::from_millis(50));
	assert_eq!(total.load(Ordering::SeqCst), 0);

	manager.shutdown();
}

#[test]
fn atomic_rollback_leaves_no_partially_created_components()
{
	let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
	let manager = ComponentManager::new(store.clone(), vec![]);
	let instantiator = Arc::new(ComponentInstantiator::new(Arc::clone(&manager)));
	instantiator
		.add_component_type(ComponentType::new("demo/echo", || Box::new(Echo::new("unnamed"))))
		.unwrap();

	let configurator = ComponentSystemConfigurator::new(Arc::clone(&manager), Arc::clone(&instantiator));
	let config: ComponentSystemConfiguration = serde_json::from_str(
		r#"{
			"components": {
				"a": { "type": "demo/echo", "port_mapping": {} },
				"b": { "type": "demo/echo", "port_mapping": {} },
				"c": { "type": "demo/nonexistent", "port_mapping": {} }
			}
		}"#,
	)
	.unwrap();

	let err = configurator.configure(&config).unwrap_err();
	assert!(matches!(err, McfError::SystemConfigurationError(_)));
	assert!(manager.find_by_name("a").is_err());
	assert!(manager.find_by_name("b").is_err());
	assert!(manager.find_by_name("c").is_err());
	assert!(instantiator.list_components().is_empty());
}

#[test]
fn etc_fires_two_sources_in_virtual_time_order_across_a_speed_change()
{
	let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
	let etc = Arc::new(EventTimingController::new());

	let early = Arc::new(QueuedEventSource::new(store.clone(), Arc::downgrade(&etc)));
	let late = Arc::new(QueuedEventSource::new(store.clone(), Arc::downgrade(&etc)));
	early.push_new_event(Timestamp(0), "first", Value::new(1i32, 1), "", "");
	late.push_new_event(Timestamp(5_000), "second", Value::new(2i32, 2), "", "");
	early.set_finished(true);
	late.set_finished(true);

	etc.add_event_source("early", early);
	etc.add_event_source("late", late);
	etc.set_speed(50.0);
	etc.start();

	assert!(wait_until(|| store.has_value("first"), Duration::from_millis(500)));
	assert!(wait_until(|| store.has_value("second"), Duration::from_millis(500)));
	etc.wait_till_finished();
}

#[test]
fn rec_single_step_with_no_drops_gates_on_a_pipeline_end_topic()
{
	let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
	let etc = Arc::new(EventTimingController::new());
	let source = Arc::new(QueuedEventSource::new(store.clone(), Arc::downgrade(&etc)));
	source.push_new_event(Timestamp(0), "stage.in", Value::new(1i32, 1), "", "");
	etc.add_event_source("source", source);

	let params = RecParams {
		run_mode: RunMode::SingleStep,
		run_without_drops: true,
		pipeline_end_topics: vec!["stage.out".to_string()],
		..RecParams::default()
	};
	let rec = ReplayEventController::new(Arc::clone(&etc), store.clone(), params);
	rec.start();
	rec.set_initialisation_complete();
	rec.step_once();

	assert!(wait_until(|| store.has_value("stage.in"), Duration::from_millis(200)));
	// Simulate a downstream component reacting to stage.in and completing the batch.
	store.set_value("stage.out", Value::new(1i32, 1));

	rec.finish();
}

#[test]
fn scheduling_parameters_round_trip_through_the_proxy()
{
	let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
	let manager = ComponentManager::new(store, vec![]);
	let proxy = manager
		.register_component(Box::new(Echo::new("echo")), "demo/echo", "echo")
		.unwrap();
	proxy.configure().unwrap();

	proxy
		.set_scheduling_parameters(SchedulingParameters {
			policy: mcf_rt::SchedulingPolicy::Fifo,
			priority: 5,
		})
		.unwrap();

	// No direct getter is exposed on the proxy; absence of an error is the
	// contract here (the manager validated the id and applied it).
	proxy.startup(true).unwrap();
	proxy.shutdown().unwrap();
}
