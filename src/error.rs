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

//! Typed error taxonomy for every fallible operation in this crate.

use thiserror::Error;

/// The single error type returned by manager, instantiator, and system
/// configurator operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum McfError
{
	#[error("unknown component: {0}")]
	UnknownComponent(String),

	#[error("unknown port {port} on component {component}")]
	UnknownPort { component: String, port: String },

	#[error("port {port} already registered on component {component}")]
	DuplicatePort { component: String, port: String },

	#[error("instance {0} already exists")]
	DuplicateInstance(String),

	#[error("component type {0} already registered")]
	DuplicateType(String),

	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("component {0} has not been configured")]
	NotConfigured(String),

	#[error("{name} is already registered as type {expected_type}, cannot reuse as {actual_type}")]
	TypeMismatch {
		name: String,
		expected_type: String,
		actual_type: String,
	},

	#[error("could not instantiate component {instance} of type {type_name}: {reason}")]
	InstantiationError {
		instance: String,
		type_name: String,
		reason: String,
	},

	#[error("system configuration invalid:\n{0}")]
	SystemConfigurationError(String),

	/// Reserved for dynamic plugin loading, which is out of scope for this
	/// crate. No operation currently constructs this variant.
	#[error("plugin error: {0}")]
	PluginError(String),
}

pub type Result<T> = std::result::Result<T, McfError>;
