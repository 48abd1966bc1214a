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

//! The replay event controller (§4.6): a thin state machine wrapped
//! around an [`EventTimingController`] that drives it either freely
//! (`Continuous`), one event at a time (`SingleStep`), or in fixed
//! virtual-time increments (`StepTime`), with an optional run-without-drops
//! mode that pauses firing until a batch of downstream pipeline-end topics
//! have all been refreshed.
//!
//! Playback modifiers (pause/resume/step/finish) issued before
//! [`ReplayEventController::set_initialisation_complete`] is called queue up
//! rather than apply immediately, since a host typically wires up
//! components and topic subscriptions before deciding whether playback
//! should start paused.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::etc::EventTimingController;
use crate::store::ValueStore;
use crate::timestamp::Timestamp;
use crate::topic_trigger_flags::TopicTriggerFlags;

const NO_DROP_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode
{
	Continuous,
	SingleStep,
	StepTime,
}

#[derive(Debug, Clone)]
pub struct RecParams
{
	pub run_mode: RunMode,
	pub run_without_drops: bool,
	/// Forwarded to the underlying [`EventTimingController`] via `set_speed`.
	/// Per §4.6, this is the one field (besides pause/resume/finish) that
	/// takes effect immediately even while `Uninitialized`.
	pub speed_factor: f64,
	pub pipeline_end_topics: Vec<String>,
	/// Paired with `wait_input_topic` to match the (source, topic) of the
	/// next pending event before gating on a no-drops pipeline-end wait.
	/// Empty means "any source".
	pub wait_input_source: String,
	pub wait_input_topic: String,
	pub step_time_micros: i64,
}

impl Default for RecParams
{
	fn default() -> Self
	{
		RecParams {
			run_mode: RunMode::Continuous,
			run_without_drops: false,
			speed_factor: 1.0,
			pipeline_end_topics: Vec::new(),
			wait_input_source: String::new(),
			wait_input_topic: String::new(),
			step_time_micros: 0,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecState
{
	Uninitialized,
	Playback,
	Paused,
	Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier
{
	Pause,
	Resume,
	StepOnce,
	Finish,
}

struct Inner
{
	state: RecState,
	params: RecParams,
	pending: Vec<Modifier>,
	pending_steps: usize,
}

pub struct ReplayEventController
{
	etc: Arc<EventTimingController>,
	inner: Mutex<Inner>,
	condvar: Condvar,
	pipeline_end: Arc<TopicTriggerFlags>,
	batch: Mutex<u64>,
	batch_condvar: Condvar,
	pipeline_end_callback: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
	etc_started: AtomicBool,
	/// Cumulative virtual-time deadline for `StepTime` mode, advanced by
	/// `step_time_micros` on each step rather than re-read from the ETC
	/// (which never starts its background thread outside `Continuous`).
	step_cursor: Mutex<Option<Timestamp>>,
}

impl ReplayEventController
{
	pub fn new(etc: Arc<EventTimingController>, value_store: Arc<dyn ValueStore>, params: RecParams) -> Arc<Self>
	{
		let pipeline_end = Arc::new(TopicTriggerFlags::new(value_store));
		pipeline_end.update_topics(&params.pipeline_end_topics);
		etc.set_speed(params.speed_factor);
		Arc::new(ReplayEventController {
			etc,
			inner: Mutex::new(Inner {
				state: RecState::Uninitialized,
				params,
				pending: Vec::new(),
				pending_steps: 0,
			}),
			condvar: Condvar::new(),
			pipeline_end,
			batch: Mutex::new(0),
			batch_condvar: Condvar::new(),
			pipeline_end_callback: Mutex::new(None),
			etc_started: AtomicBool::new(false),
			step_cursor: Mutex::new(None),
		})
	}

	pub fn set_pipeline_end_callback(&self, callback: impl Fn() + Send + Sync + 'static)
	{
		*self.pipeline_end_callback.lock() = Some(Box::new(callback));
	}

	pub fn state(&self) -> RecState
	{
		self.inner.lock().state
	}

	/// Applies any immediately-settable parts of `params` (the pipeline-end
	/// topic subscriptions and `speed_factor`) right away, and stores the
	/// rest for the next time the main loop reads it. Changing
	/// `run_mode`/`step_time_micros` mid-playback takes effect on the next
	/// step or tick, not instantly.
	pub fn set_params(&self, params: RecParams)
	{
		self.pipeline_end.update_topics(&params.pipeline_end_topics);
		self.etc.set_speed(params.speed_factor);
		self.inner.lock().params = params;
	}

	/// Spawns the main playback-driving thread and the dedicated
	/// pipeline-end-wait thread. Does not block.
	pub fn start(self: &Arc<Self>)
	{
		let main_loop = Arc::clone(self);
		thread::spawn(move || main_loop.run());

		let pipeline_watcher = Arc::clone(self);
		thread::spawn(move || pipeline_watcher.watch_pipeline_end());
	}

	/// Transitions out of `Uninitialized`, applying every queued modifier
	/// in the order it was received.
	pub fn set_initialisation_complete(&self)
	{
		let mut inner = self.inner.lock();
		if inner.state != RecState::Uninitialized {
			return;
		}
		inner.state = RecState::Playback;
		let pending = std::mem::take(&mut inner.pending);
		for modifier in pending {
			self.apply_locked(&mut inner, modifier);
		}
		self.condvar.notify_all();
	}

	pub fn pause(&self)
	{
		self.apply(Modifier::Pause);
	}

	pub fn resume(&self)
	{
		self.apply(Modifier::Resume);
	}

	/// Requests that exactly one event (or, in `StepTime` mode, one
	/// fixed-size time increment) be fired. No-op in `Continuous` mode.
	pub fn step_once(&self)
	{
		self.apply(Modifier::StepOnce);
	}

	pub fn finish(&self)
	{
		self.apply(Modifier::Finish);
	}

	fn apply(&self, modifier: Modifier)
	{
		let mut inner = self.inner.lock();
		if inner.state == RecState::Uninitialized {
			inner.pending.push(modifier);
			return;
		}
		self.apply_locked(&mut inner, modifier);
		self.condvar.notify_all();
	}

	fn apply_locked(&self, inner: &mut Inner, modifier: Modifier)
	{
		match modifier {
			Modifier::Pause => {
				if inner.state == RecState::Playback {
					inner.state = RecState::Paused;
					self.etc.pause();
				}
			}
			Modifier::Resume => {
				if inner.state == RecState::Paused {
					inner.state = RecState::Playback;
					self.etc.resume();
				}
			}
			Modifier::StepOnce => {
				inner.pending_steps += 1;
			}
			Modifier::Finish => {
				inner.state = RecState::Finished;
				self.etc.finish();
			}
		}
	}

	fn wait_for_step(&self) -> bool
	{
		let mut inner = self.inner.lock();
		loop {
			match inner.state {
				RecState::Finished => return false,
				RecState::Uninitialized | RecState::Paused => self.condvar.wait(&mut inner),
				RecState::Playback => {
					if inner.pending_steps > 0 {
						inner.pending_steps -= 1;
						return true;
					}
					self.condvar.wait(&mut inner);
				}
			}
		}
	}

	fn run(self: Arc<Self>)
	{
		loop {
			let (run_mode, no_drops, wait_source, wait_topic, step_micros) = {
				let mut inner = self.inner.lock();
				loop {
					match inner.state {
						RecState::Finished => return,
						RecState::Uninitialized | RecState::Paused => self.condvar.wait(&mut inner),
						RecState::Playback => break,
					}
				}
				(
					inner.params.run_mode,
					inner.params.run_without_drops,
					inner.params.wait_input_source.clone(),
					inner.params.wait_input_topic.clone(),
					inner.params.step_time_micros,
				)
			};

			match run_mode {
				RunMode::Continuous => {
					if !self.etc_started.swap(true, Ordering::SeqCst) {
						self.etc.start();
					}
					if no_drops {
						self.gate_on_wait_topic(&wait_source, &wait_topic);
					}
					thread::sleep(NO_DROP_POLL_INTERVAL);
				}
				RunMode::SingleStep => {
					if !self.wait_for_step() {
						continue;
					}
					self.etc.fire_earliest_now();
					if no_drops {
						self.wait_for_batch();
					}
				}
				RunMode::StepTime => {
					if !self.wait_for_step() {
						continue;
					}
					let mut cursor = self.step_cursor.lock();
					let base = match *cursor {
						Some(ts) => ts,
						None => self.etc.peek_earliest_named().map(|(ts, _, _)| ts).unwrap_or(Timestamp::ZERO),
					};
					let deadline = base + step_micros;
					*cursor = Some(deadline);
					drop(cursor);
					self.etc.fire_due_through(deadline);
					if no_drops {
						self.wait_for_batch();
					}
				}
			}
		}
	}

	/// Pauses the underlying controller (without changing REC's own
	/// externally-visible state) whenever the next pending event matches
	/// `(wait_source, wait_topic)` — an empty `wait_source` matches any
	/// source — until a full downstream batch has been observed.
	fn gate_on_wait_topic(&self, wait_source: &str, wait_topic: &str)
	{
		if wait_topic.is_empty() {
			return;
		}
		if let Some((_, source, topic)) = self.etc.peek_earliest_named() {
			let source_matches = wait_source.is_empty() || source == wait_source;
			if source_matches && topic == wait_topic {
				self.etc.pause();
				self.wait_for_batch();
				self.etc.resume();
			}
		}
	}

	fn wait_for_batch(&self)
	{
		let mut batch = self.batch.lock();
		let target = *batch + 1;
		while *batch < target {
			self.batch_condvar.wait(&mut batch);
		}
	}

	/// Runs for the lifetime of the controller, invoking the pipeline-end
	/// callback at most once per coalesced batch of topic updates.
	fn watch_pipeline_end(self: Arc<Self>)
	{
		loop {
			if self.state() == RecState::Finished {
				return;
			}
			let exited = self.pipeline_end.wait_for_all_topics_modified();
			if exited {
				return;
			}
			{
				let mut batch = self.batch.lock();
				*batch += 1;
				self.batch_condvar.notify_all();
			}
			if let Some(cb) = self.pipeline_end_callback.lock().as_ref() {
				cb();
			}
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::queued_event_source::QueuedEventSource;
	use crate::store::InMemoryValueStore;
	use crate::value::Value;
	use std::sync::atomic::AtomicUsize;

	fn setup() -> (Arc<EventTimingController>, Arc<dyn ValueStore>)
	{
		let store: Arc<dyn ValueStore> = Arc::new(InMemoryValueStore::new());
		let etc = Arc::new(EventTimingController::new());
		(etc, store)
	}

	#[test]
	fn modifiers_issued_before_initialisation_are_queued_then_applied()
	{
		let (etc, store) = setup();
		let rec = ReplayEventController::new(etc, store, RecParams::default());
		rec.pause();
		assert_eq!(rec.state(), RecState::Uninitialized);
		rec.set_initialisation_complete();
		assert_eq!(rec.state(), RecState::Paused);
	}

	#[test]
	fn finish_is_terminal()
	{
		let (etc, store) = setup();
		let rec = ReplayEventController::new(etc, store, RecParams::default());
		rec.set_initialisation_complete();
		rec.finish();
		assert_eq!(rec.state(), RecState::Finished);
		rec.resume();
		assert_eq!(rec.state(), RecState::Finished);
	}

	#[test]
	fn single_step_fires_exactly_one_queued_event_per_request()
	{
		let (etc, store) = setup();
		let source = Arc::new(QueuedEventSource::new(store.clone(), Arc::downgrade(&etc)));
		source.push_new_event(Timestamp(0), "a", Value::new(1i32, 1), "", "");
		source.push_new_event(Timestamp(1), "b", Value::new(2i32, 2), "", "");
		etc.add_event_source("source", source);

		let params = RecParams {
			run_mode: RunMode::SingleStep,
			..RecParams::default()
		};
		let rec = ReplayEventController::new(Arc::clone(&etc), store.clone(), params);
		rec.start();
		rec.set_initialisation_complete();

		rec.step_once();
		let seen = wait_until(|| store.has_value("a"), Duration::from_millis(200));
		assert!(seen);
		assert!(!store.has_value("b"));

		rec.step_once();
		let seen = wait_until(|| store.has_value("b"), Duration::from_millis(200));
		assert!(seen);
		rec.finish();
	}

	#[test]
	fn run_without_drops_invokes_pipeline_end_callback_once_per_batch()
	{
		let (etc, store) = setup();
		let source = Arc::new(QueuedEventSource::new(store.clone(), Arc::downgrade(&etc)));
		source.push_new_event(Timestamp(0), "a", Value::new(1i32, 1), "", "");
		etc.add_event_source("source", source);

		let params = RecParams {
			run_mode: RunMode::SingleStep,
			run_without_drops: true,
			pipeline_end_topics: vec!["downstream".to_string()],
			..RecParams::default()
		};
		let rec = ReplayEventController::new(Arc::clone(&etc), store.clone(), params);
		let calls = Arc::new(AtomicUsize::new(0));
		let calls_clone = Arc::clone(&calls);
		rec.set_pipeline_end_callback(move || {
			calls_clone.fetch_add(1, Ordering::SeqCst);
		});
		rec.start();
		rec.set_initialisation_complete();
		rec.step_once();

		assert!(wait_until(|| store.has_value("a"), Duration::from_millis(200)));
		store.set_value("downstream", Value::new(0i32, 0));
		assert!(wait_until(|| calls.load(Ordering::SeqCst) == 1, Duration::from_millis(200)));
		rec.finish();
	}

	#[test]
	fn step_time_advances_deadline_cumulatively()
	{
		let (etc, store) = setup();
		let source = Arc::new(QueuedEventSource::new(store.clone(), Arc::downgrade(&etc)));
		source.push_new_event(Timestamp(1_000), "a", Value::new(1i32, 1), "", "");
		source.push_new_event(Timestamp(2_500), "b", Value::new(2i32, 2), "", "");
		etc.add_event_source("source", source);

		let params = RecParams {
			run_mode: RunMode::StepTime,
			step_time_micros: 1_000,
			..RecParams::default()
		};
		let rec = ReplayEventController::new(Arc::clone(&etc), store.clone(), params);
		rec.start();
		rec.set_initialisation_complete();

		// First step: deadline = 1_000 (first event's timestamp) + 1_000 = 2_000, fires "a" only.
		rec.step_once();
		assert!(wait_until(|| store.has_value("a"), Duration::from_millis(200)));
		assert!(!store.has_value("b"));

		// Second step: deadline advances to 3_000, now past "b"'s timestamp.
		rec.step_once();
		assert!(wait_until(|| store.has_value("b"), Duration::from_millis(200)));
		rec.finish();
	}

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
}
