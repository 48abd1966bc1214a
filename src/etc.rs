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

//! The event timing controller: a single background thread that fires
//! events from its registered dynamic event sources in virtual-time
//! order, with a speed factor, pause/resume, and reactive re-evaluation
//! whenever a source receives a new event.
//!
//! Virtual time is computed from a wall-clock baseline rather than
//! advanced tick-by-tick:
//!
//! ```text
//! now = simStart + runElapsed + currentRunTime - pauseElapsed - currentPauseTime
//! ```
//!
//! `runElapsed`/`run_checkpoint` are only re-checkpointed when the speed
//! factor changes; `pauseElapsed` is only finalized when playback resumes.
//! This keeps the common case (no speed changes, no pauses) a single
//! multiply-and-add. `simStart` itself is pinned to the timestamp of the
//! first event ever scanned, not to construction time: there is no
//! meaningful "time zero" until something is actually due to fire.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::event_source::EventSource;
use crate::timestamp::Timestamp;

type NextEventCallback = Box<dyn Fn(&str, &str) + Send + Sync>;

struct NamedSource
{
	name: String,
	source: Arc<dyn EventSource>,
}

struct EtcState
{
	sources: Vec<NamedSource>,
	speed: f64,
	sim_start: Timestamp,
	initialized: bool,
	run_checkpoint: Instant,
	run_elapsed: i64,
	pause_checkpoint: Option<Instant>,
	pause_elapsed: i64,
	running_thread_started: bool,
	finished: bool,
	wait_for_push: bool,
	/// The (timestamp, source index) last handed to `next_event_callback`,
	/// so a source idling at the head of the queue across several paused
	/// loop iterations is only announced once.
	last_notified: Option<(Timestamp, usize)>,
}

impl EtcState
{
	fn virtual_now(&self) -> Timestamp
	{
		let now = Instant::now();
		let current_run =
			(now.duration_since(self.run_checkpoint).as_micros() as f64 * self.speed) as i64;
		let current_pause = match self.pause_checkpoint {
			Some(pc) => (now.duration_since(pc).as_micros() as f64 * self.speed) as i64,
			None => 0,
		};
		Timestamp(self.sim_start.0 + self.run_elapsed + current_run - self.pause_elapsed - current_pause)
	}

	fn is_paused(&self) -> bool
	{
		self.pause_checkpoint.is_some()
	}

	fn set_speed(&mut self, speed: f64)
	{
		let now = Instant::now();
		let current_run =
			(now.duration_since(self.run_checkpoint).as_micros() as f64 * self.speed) as i64;
		self.run_elapsed += current_run;
		self.run_checkpoint = now;
		self.speed = speed;
	}

	fn pause(&mut self)
	{
		if self.pause_checkpoint.is_none() {
			self.pause_checkpoint = Some(Instant::now());
		}
	}

	fn resume(&mut self)
	{
		if let Some(pc) = self.pause_checkpoint.take() {
			self.pause_elapsed += (Instant::now().duration_since(pc).as_micros() as f64 * self.speed) as i64;
		}
	}

	/// The earliest pending event across every registered source, if any.
	/// Ties are broken by source registration order.
	fn earliest(&self) -> Option<(Timestamp, usize)>
	{
		self.sources
			.iter()
			.enumerate()
			.filter_map(|(i, s)| s.source.peek_next().map(|(ts, _)| (ts, i)))
			.min_by_key(|(ts, i)| (*ts, *i))
	}

	fn all_sources_finished(&self) -> bool
	{
		!self.sources.is_empty() && self.sources.iter().all(|s| s.source.is_finished())
	}
}

/// Drives virtual time forward and fires events from its sources in
/// timestamp order. Runs its processing loop on a dedicated background
/// thread started by [`EventTimingController::start`].
pub struct EventTimingController
{
	state: Mutex<EtcState>,
	fire_condvar: Condvar,
	finish_condvar: Condvar,
	init_condvar: Condvar,
	next_event_callback: Option<NextEventCallback>,
}

impl EventTimingController
{
	pub fn new() -> Self
	{
		EventTimingController {
			state: Mutex::new(EtcState {
				sources: Vec::new(),
				speed: 1.0,
				sim_start: Timestamp::ZERO,
				initialized: false,
				run_checkpoint: Instant::now(),
				run_elapsed: 0,
				pause_checkpoint: None,
				pause_elapsed: 0,
				running_thread_started: false,
				finished: false,
				wait_for_push: false,
				last_notified: None,
			}),
			fire_condvar: Condvar::new(),
			finish_condvar: Condvar::new(),
			init_condvar: Condvar::new(),
			next_event_callback: None,
		}
	}

	pub fn with_next_event_callback(
		mut self,
		callback: impl Fn(&str, &str) + Send + Sync + 'static,
	) -> Self
	{
		self.next_event_callback = Some(Box::new(callback));
		self
	}

	pub fn add_event_source(&self, name: impl Into<String>, source: Arc<dyn EventSource>)
	{
		let mut state = self.state.lock();
		state.sources.push(NamedSource {
			name: name.into(),
			source,
		});
		self.fire_condvar.notify_all();
	}

	/// Searches the registered sources linearly by name.
	pub fn remove_event_source(&self, name: &str)
	{
		let mut state = self.state.lock();
		state.sources.retain(|s| s.name != name);
		self.fire_condvar.notify_all();
	}

	/// Spawns the processing thread. Does not block: use
	/// `wait_till_initialised` to wait for the first event to be scanned.
	pub fn start(self: &Arc<Self>)
	{
		let mut state = self.state.lock();
		if state.running_thread_started {
			return;
		}
		state.running_thread_started = true;
		drop(state);

		let this = Arc::clone(self);
		thread::spawn(move || this.event_processing());
	}

	pub fn pause(&self)
	{
		let mut state = self.state.lock();
		state.pause();
		self.fire_condvar.notify_all();
	}

	pub fn resume(&self)
	{
		let mut state = self.state.lock();
		state.resume();
		self.fire_condvar.notify_all();
	}

	pub fn is_paused(&self) -> bool
	{
		self.state.lock().is_paused()
	}

	pub fn set_speed(&self, speed: f64)
	{
		let mut state = self.state.lock();
		state.set_speed(speed);
		self.fire_condvar.notify_all();
	}

	pub fn get_playback_speed(&self) -> f64
	{
		self.state.lock().speed
	}

	/// `None` until the first event has been scanned (matches `getTime`
	/// returning false on an uninitialized or source-less controller).
	pub fn get_time(&self) -> Option<Timestamp>
	{
		let state = self.state.lock();
		if state.initialized {
			Some(state.virtual_now())
		} else {
			None
		}
	}

	pub fn is_finished(&self) -> bool
	{
		self.state.lock().finished
	}

	pub fn finish(&self)
	{
		let mut state = self.state.lock();
		state.finished = true;
		self.fire_condvar.notify_all();
		self.finish_condvar.notify_all();
	}

	pub fn wait_till_finished(&self)
	{
		let mut state = self.state.lock();
		while !state.finished {
			self.finish_condvar.wait(&mut state);
		}
	}

	pub fn wait_till_initialised(&self)
	{
		let mut state = self.state.lock();
		while !state.initialized && !state.finished {
			self.init_condvar.wait(&mut state);
		}
	}

	/// Called by a [`crate::queued_event_source::QueuedEventSource`] after
	/// it pushes a new event, with its own lock already released. Always
	/// re-evaluates the earliest pending event; a spurious wake when the
	/// push could not have changed the earliest event is harmless.
	pub fn trigger_new_event_pushed(&self)
	{
		let mut state = self.state.lock();
		state.wait_for_push = false;
		self.fire_condvar.notify_all();
	}

	pub fn begin_wait_for_push_event(&self)
	{
		let mut state = self.state.lock();
		state.wait_for_push = true;
		self.fire_condvar.notify_all();
	}

	pub fn end_wait_for_push_event(&self)
	{
		let mut state = self.state.lock();
		state.wait_for_push = false;
		self.fire_condvar.notify_all();
	}

	/// Fires exactly the earliest pending event across all sources,
	/// regardless of whether its virtual timestamp has actually arrived.
	/// Used by the replay controller's single-step mode, which paces
	/// firing itself rather than delegating to the background thread.
	pub fn fire_earliest_now(&self) -> bool
	{
		let mut state = self.state.lock();
		let Some((_, index)) = state.earliest() else {
			return false;
		};
		let source = Arc::clone(&state.sources[index].source);
		state.last_notified = None;
		drop(state);
		source.fire();
		true
	}

	/// Fires every pending event whose timestamp is at or before
	/// `deadline`, in timestamp order, stopping as soon as none remain.
	/// Used by the replay controller's step-by-time mode. Returns the
	/// number of events fired.
	pub fn fire_due_through(&self, deadline: Timestamp) -> usize
	{
		let mut fired = 0;
		loop {
			let mut state = self.state.lock();
			let Some((ts, index)) = state.earliest() else {
				break;
			};
			if ts > deadline {
				break;
			}
			let source = Arc::clone(&state.sources[index].source);
			state.last_notified = None;
			drop(state);
			source.fire();
			fired += 1;
		}
		fired
	}

	/// Peeks the earliest pending event's topic without firing it.
	pub fn peek_earliest(&self) -> Option<(Timestamp, String)>
	{
		let state = self.state.lock();
		let (_, index) = state.earliest()?;
		state.sources[index].source.peek_next()
	}

	/// Like `peek_earliest`, but also reports the name of the source the
	/// event would fire from, for matching against a (source, topic) pair.
	pub fn peek_earliest_named(&self) -> Option<(Timestamp, String, String)>
	{
		let state = self.state.lock();
		let (_, index) = state.earliest()?;
		let (ts, topic) = state.sources[index].source.peek_next()?;
		Some((ts, state.sources[index].name.clone(), topic))
	}

	fn event_processing(self: Arc<Self>)
	{
		loop {
			let mut state = self.state.lock();
			if state.finished {
				break;
			}
			if state.all_sources_finished() {
				state.finished = true;
				drop(state);
				self.fire_condvar.notify_all();
				self.finish_condvar.notify_all();
				break;
			}
			if state.is_paused() || state.wait_for_push {
				self.fire_condvar.wait(&mut state);
				continue;
			}

			let Some((target, index)) = state.earliest() else {
				state.wait_for_push = true;
				self.fire_condvar.wait(&mut state);
				continue;
			};

			if !state.initialized {
				state.sim_start = target;
				state.run_checkpoint = Instant::now();
				state.initialized = true;
				drop(state);
				self.init_condvar.notify_all();
				continue;
			}

			if state.last_notified != Some((target, index)) {
				state.last_notified = Some((target, index));
				if self.next_event_callback.is_some() {
					let topic = state.sources[index].source.peek_next().map(|(_, t)| t);
					drop(state);
					if let (Some(cb), Some(topic)) = (&self.next_event_callback, topic) {
						cb("event_timing_controller", &topic);
					}
					continue;
				}
			}

			let now = state.virtual_now();
			if target <= now {
				let source = Arc::clone(&state.sources[index].source);
				state.last_notified = None;
				drop(state);
				source.fire();
			} else {
				let wall_micros = ((target - now) as f64 / state.speed.max(1e-9)) as u64;
				let timeout = Duration::from_micros(wall_micros.max(1));
				self.fire_condvar.wait_for(&mut state, timeout);
			}
		}
	}
}

impl Default for EventTimingController
{
	fn default() -> Self
	{
		Self::new()
	}
}

#[cfg(test)]
mod tests
{
	use super::*;
	use crate::queued_event_source::QueuedEventSource;
	use crate::store::InMemoryValueStore;
	use crate::value::Value;
	use std::sync::Arc;

	#[test]
	fn zero_sources_is_uninitialized()
	{
		let etc = EventTimingController::new();
		assert!(etc.get_time().is_none());
	}

	#[test]
	fn pause_freezes_virtual_time()
	{
		let etc = Arc::new(EventTimingController::new());
		let store: Arc<dyn crate::store::ValueStore> = Arc::new(InMemoryValueStore::new());
		let source = Arc::new(QueuedEventSource::new(store, Arc::downgrade(&etc)));
		source.push_new_event(Timestamp(0), "a", Value::new(1i32, 1), "", "");
		etc.add_event_source("source", source);
		etc.start();
		etc.wait_till_initialised();

		etc.pause();
		let t1 = etc.get_time().unwrap();
		std::thread::sleep(Duration::from_millis(5));
		let t2 = etc.get_time().unwrap();
		assert_eq!(t1.0, t2.0);
	}

	#[test]
	fn pause_freezes_virtual_time_at_non_unit_speed()
	{
		let etc = Arc::new(EventTimingController::new());
		let store: Arc<dyn crate::store::ValueStore> = Arc::new(InMemoryValueStore::new());
		let source = Arc::new(QueuedEventSource::new(store, Arc::downgrade(&etc)));
		source.push_new_event(Timestamp(0), "a", Value::new(1i32, 1), "", "");
		etc.add_event_source("source", source);
		etc.set_speed(4.0);
		etc.start();
		etc.wait_till_initialised();

		etc.pause();
		let t1 = etc.get_time().unwrap();
		std::thread::sleep(Duration::from_millis(5));
		let t2 = etc.get_time().unwrap();
		assert_eq!(t1.0, t2.0);
	}

	#[test]
	fn two_sources_interleaved_ordering_with_mid_stream_speed_change()
	{
		let etc = Arc::new(EventTimingController::new());
		let store: Arc<dyn crate::store::ValueStore> = Arc::new(InMemoryValueStore::new());
		let source_a = Arc::new(QueuedEventSource::new(store.clone(), Arc::downgrade(&etc)));
		let source_b = Arc::new(QueuedEventSource::new(store.clone(), Arc::downgrade(&etc)));

		source_a.push_new_event(Timestamp(100), "a1", Value::new(1i32, 1), "", "");
		source_a.push_new_event(Timestamp(300), "a2", Value::new(3i32, 3), "", "");
		source_b.push_new_event(Timestamp(200), "b1", Value::new(2i32, 2), "", "");

		etc.add_event_source("a", source_a.clone());
		etc.add_event_source("b", source_b.clone());

		let (ts, idx) = etc.state.lock().earliest().unwrap();
		assert_eq!(ts, Timestamp(100));
		assert_eq!(idx, 0);

		etc.set_speed(2.0);
		assert!((etc.get_playback_speed() - 2.0).abs() < f64::EPSILON);
	}

	#[test]
	fn finishes_when_every_source_is_finished()
	{
		let etc = Arc::new(EventTimingController::new());
		let store: Arc<dyn crate::store::ValueStore> = Arc::new(InMemoryValueStore::new());
		let source = Arc::new(QueuedEventSource::new(store, Arc::downgrade(&etc)));
		source.push_new_event(Timestamp(0), "a", Value::new(1i32, 1), "", "");
		source.set_finished(true);
		etc.add_event_source("source", source);
		etc.start();
		etc.wait_till_finished();
		assert!(etc.is_finished());
	}

	#[test]
	fn fire_earliest_now_steps_without_waiting_on_virtual_time()
	{
		let etc = Arc::new(EventTimingController::new());
		let store: Arc<dyn crate::store::ValueStore> = Arc::new(InMemoryValueStore::new());
		let source = Arc::new(QueuedEventSource::new(store.clone(), Arc::downgrade(&etc)));
		source.push_new_event(Timestamp(1_000_000_000), "far", Value::new(1i32, 1), "", "");
		etc.add_event_source("source", source);
		assert!(etc.fire_earliest_now());
		assert!(store.has_value("far"));
	}
}
