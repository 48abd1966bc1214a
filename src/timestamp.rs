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

//! Microsecond-resolution virtual timestamps.

use std::ops::{Add, Sub};
use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since the Unix epoch, stored as a signed 64-bit count so
/// that differences and pre-epoch values remain representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp
{
	pub const ZERO: Timestamp = Timestamp(0);

	pub fn from_micros(micros: i64) -> Self
	{
		Timestamp(micros)
	}

	pub fn micros(self) -> i64
	{
		self.0
	}

	/// Current wall-clock time expressed as a `Timestamp`.
	pub fn now() -> Self
	{
		let since_epoch = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.unwrap_or_default();
		Timestamp(since_epoch.as_micros() as i64)
	}
}

impl Add<i64> for Timestamp
{
	type Output = Timestamp;
	fn add(self, rhs: i64) -> Timestamp
	{
		Timestamp(self.0 + rhs)
	}
}

impl Sub for Timestamp
{
	type Output = i64;
	fn sub(self, rhs: Timestamp) -> i64
	{
		self.0 - rhs.0
	}
}

impl Sub<i64> for Timestamp
{
	type Output = Timestamp;
	fn sub(self, rhs: i64) -> Timestamp
	{
		Timestamp(self.0 - rhs)
	}
}
