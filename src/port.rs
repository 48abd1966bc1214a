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

//! Ports: the typed endpoints through which a component exchanges values
//! with the rest of the system via the value store.

/// A receiver port may buffer incoming values instead of only exposing the
/// store's latest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedReceiverParams
{
	pub max_queue_length: usize,
	/// If true, a full queue blocks the publisher; if false, the oldest
	/// entry is dropped to make room for the newest.
	pub blocking: bool,
}

/// The direction a port moves data in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection
{
	Sender,
	Receiver { queued: Option<QueuedReceiverParams> },
}

/// A single named endpoint owned by exactly one component.
#[derive(Debug, Clone)]
pub struct Port
{
	pub name: String,
	pub direction: PortDirection,
	/// Empty string means unmapped.
	pub topic: String,
}

impl Port
{
	pub fn new_sender(name: impl Into<String>) -> Self
	{
		Port {
			name: name.into(),
			direction: PortDirection::Sender,
			topic: String::new(),
		}
	}

	pub fn new_receiver(name: impl Into<String>) -> Self
	{
		Port {
			name: name.into(),
			direction: PortDirection::Receiver { queued: None },
			topic: String::new(),
		}
	}

	pub fn new_queued_receiver(name: impl Into<String>, params: QueuedReceiverParams) -> Self
	{
		Port {
			name: name.into(),
			direction: PortDirection::Receiver {
				queued: Some(params),
			},
			topic: String::new(),
		}
	}

	pub fn is_queued(&self) -> bool
	{
		matches!(
			self.direction,
			PortDirection::Receiver {
				queued: Some(_)
			}
		)
	}

	pub fn has_topic(&self) -> bool
	{
		!self.topic.is_empty()
	}
}
