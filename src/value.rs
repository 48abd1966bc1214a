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

//! Opaque, reference-countable payloads and the id generator that stamps them.

use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// An opaque, reference-countable payload carried through the value store.
///
/// Cloning a `Value` is cheap: it clones the `Arc`, not the payload.
#[derive(Clone)]
pub struct Value
{
	id: u64,
	type_name: &'static str,
	payload: Arc<dyn Any + Send + Sync>,
}

impl Value
{
	pub fn new<T: Any + Send + Sync>(payload: T, id: u64) -> Self
	{
		Value {
			id,
			type_name: std::any::type_name::<T>(),
			payload: Arc::new(payload),
		}
	}

	pub fn id(&self) -> u64
	{
		self.id
	}

	/// The payload's type name, as reported by `getTypeInfo` in the value
	/// store contract.
	pub fn type_name(&self) -> &'static str
	{
		self.type_name
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T>
	{
		self.payload.downcast_ref::<T>()
	}

	pub fn is<T: Any>(&self) -> bool
	{
		self.payload.is::<T>()
	}
}

impl std::fmt::Debug for Value
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
	{
		f.debug_struct("Value")
			.field("id", &self.id)
			.field("type_name", &self.type_name)
			.finish()
	}
}

/// Produces unique 64-bit ids for values, derived once per process from a
/// host/pid hash and mixed with a nanosecond timestamp on every call.
pub struct IdGenerator
{
	hash_base: u64,
}

impl IdGenerator
{
	pub fn new() -> Self
	{
		let hostname = std::env::var("HOSTNAME")
			.or_else(|_| std::env::var("COMPUTERNAME"))
			.unwrap_or_default();
		let pid = std::process::id();

		let mut hasher = DefaultHasher::new();
		hostname.hash(&mut hasher);
		pid.hash(&mut hasher);

		IdGenerator {
			hash_base: hasher.finish(),
		}
	}

	/// Injects a new unique id: `hash_base XOR nanoseconds-since-epoch`.
	pub fn next_id(&self) -> u64
	{
		let nanos = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.unwrap_or_default()
			.as_nanos() as u64;
		self.hash_base ^ nanos
	}

	pub fn make_value<T: Any + Send + Sync>(&self, payload: T) -> Value
	{
		Value::new(payload, self.next_id())
	}
}

impl Default for IdGenerator
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

	#[test]
	fn ids_are_distinct_across_calls()
	{
		let gen = IdGenerator::new();
		let a = gen.next_id();
		let b = gen.next_id();
		assert_ne!(a, b);
	}

	#[test]
	fn value_roundtrips_through_downcast()
	{
		let v = Value::new(42i32, 7);
		assert_eq!(v.id(), 7);
		assert_eq!(v.downcast_ref::<i32>(), Some(&42));
		assert_eq!(v.downcast_ref::<String>(), None);
	}

	#[test]
	fn clone_is_cheap_and_shares_payload()
	{
		let v = Value::new(String::from("hello"), 1);
		let v2 = v.clone();
		assert_eq!(v2.downcast_ref::<String>().unwrap(), "hello");
	}
}
