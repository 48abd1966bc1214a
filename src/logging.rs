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

//! Log severity levels used by `setComponentLogLevels`/`setGlobalLogLevels`
//! (§6.2, §7); mirrors `tracing::Level` rather than redefining it so that
//! component authors can use the two interchangeably.

use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity
{
	Error,
	Warning,
	Info,
	Debug,
	Trace,
}

impl LogSeverity
{
	pub fn to_tracing_level(self) -> tracing::Level
	{
		match self {
			LogSeverity::Error => tracing::Level::ERROR,
			LogSeverity::Warning => tracing::Level::WARN,
			LogSeverity::Info => tracing::Level::INFO,
			LogSeverity::Debug => tracing::Level::DEBUG,
			LogSeverity::Trace => tracing::Level::TRACE,
		}
	}
}

impl FromStr for LogSeverity
{
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err>
	{
		match s.to_ascii_lowercase().as_str() {
			"error" => Ok(LogSeverity::Error),
			"warning" | "warn" => Ok(LogSeverity::Warning),
			"info" => Ok(LogSeverity::Info),
			"debug" => Ok(LogSeverity::Debug),
			"trace" | "excessive" => Ok(LogSeverity::Trace),
			other => Err(format!("unrecognized log severity: {other}")),
		}
	}
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn parses_known_severities()
	{
		assert_eq!("warn".parse::<LogSeverity>().unwrap(), LogSeverity::Warning);
		assert_eq!("Excessive".parse::<LogSeverity>().unwrap(), LogSeverity::Trace);
	}

	#[test]
	fn rejects_unknown_severity()
	{
		assert!("nope".parse::<LogSeverity>().is_err());
	}

	#[test]
	fn ordering_matches_verbosity()
	{
		assert!(LogSeverity::Error < LogSeverity::Trace);
	}
}
