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

//! Topic name validation.
//!
//! A topic is a non-empty string containing only printable, non-whitespace
//! characters. The empty string is reserved to mean "unmapped" and is
//! rejected by [`is_valid_topic`] but accepted wherever a port's mapped
//! topic is allowed to be absent.

/// Returns true if `topic` is non-empty and every character is printable
/// and not whitespace.
pub fn is_valid_topic(topic: &str) -> bool
{
	!topic.is_empty() && topic.chars().all(|c| !c.is_whitespace() && !c.is_control())
}

/// The sentinel meaning "no topic mapped".
pub const UNMAPPED: &str = "";

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn empty_is_invalid()
	{
		assert!(!is_valid_topic(""));
	}

	#[test]
	fn whitespace_is_invalid()
	{
		assert!(!is_valid_topic("foo bar"));
		assert!(!is_valid_topic("foo\tbar"));
		assert!(!is_valid_topic("foo\nbar"));
	}

	#[test]
	fn control_characters_are_invalid()
	{
		assert!(!is_valid_topic("foo\u{7}bar"));
	}

	#[test]
	fn ordinary_path_like_topic_is_valid()
	{
		assert!(is_valid_topic("/vehicle/gps"));
		assert!(is_valid_topic("tick"));
	}
}
