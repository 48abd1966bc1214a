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

//! The single trait every dynamic event source implements, replacing the
//! original class hierarchy (`IDynamicEventSource`/`ISimpleEventSource`)
//! with one object-safe trait.

use crate::timestamp::Timestamp;

/// A source of timestamped events the event timing controller can drive.
///
/// `drop` defaults to false: most sources (e.g. [`crate::queued_event_source::QueuedEventSource`])
/// never ask to be skipped; a source that models "fire only if still
/// relevant" overrides it.
pub trait EventSource: Send
{
	/// The timestamp and topic of the next pending event, if any.
	fn peek_next(&self) -> Option<(Timestamp, String)>;

	/// Publishes the next pending event and removes it from the source.
	fn fire(&self);

	/// If true, the controller discards the next event without firing it.
	fn drop_next(&self) -> bool
	{
		false
	}

	/// True once the source can never produce another event.
	fn is_finished(&self) -> bool;
}
