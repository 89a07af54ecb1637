// CSR Manager: Virtual Router Lifecycle on OpenStack
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Module containing all error types

use crate::config::ConfigError;
use crate::registry::StateError;

use openstack_api::Error as ApiError;
use std::fmt;
use thiserror::Error;

/// Kind of cloud resource the shim looks up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Compute flavor
    Flavor,
    /// Boot image
    Image,
    /// CSR instance (server)
    Instance,
    /// Neutron network
    Network,
    /// Neutron subnet
    Subnet,
    /// Neutron port
    Port,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Flavor => write!(f, "flavor"),
            ResourceKind::Image => write!(f, "image"),
            ResourceKind::Instance => write!(f, "instance"),
            ResourceKind::Network => write!(f, "network"),
            ResourceKind::Subnet => write!(f, "subnet"),
            ResourceKind::Port => write!(f, "port"),
        }
    }
}

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// The cloud cannot be reached, or refused our credentials
    #[error("Cannot connect to the cloud: {0}")]
    Connection(#[source] ApiError),
    /// A resource required for the operation does not exist
    #[error("Required {kind} not found: {name}")]
    ResourceNotFound {
        /// What was looked up
        kind: ResourceKind,
        /// Name or ID used for the lookup
        name: String,
    },
    /// A lookup by name matched more than one resource
    #[error("Found {count} resources of type {kind} named {name}, expected exactly one")]
    AmbiguousResource {
        /// What was looked up
        kind: ResourceKind,
        /// Name used for the lookup
        name: String,
        /// Number of matches
        count: usize,
    },
    /// The cloud rejected the request
    #[error("Request rejected by the cloud: {0}")]
    MalformedRequest(#[source] ApiError),
    /// Any other failure reported by the cloud
    #[error("Cloud API Error: {0}")]
    Api(#[source] ApiError),
    /// The router already has a CSR instance
    #[error("Router {0} is already managed")]
    RouterExists(String),
    /// Another router with the same name is managed, and would get the same CSR instance name
    #[error("Router name {name} is already used by router {id}")]
    RouterNameInUse {
        /// Router name
        name: String,
        /// ID of the router using the name
        id: String,
    },
    /// The router is not known to the manager
    #[error("Router {0} is not managed")]
    UnknownRouter(String),
    /// Invalid configuration
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    /// The router registry cannot be stored
    #[error("Cannot persist the router registry: {0}")]
    State(#[from] StateError),
}

impl Error {
    /// Translate an API error of an operation on a known resource. A 404 becomes
    /// [`Error::ResourceNotFound`], everything else is classified as in the `From` implementation.
    pub fn from_api(error: ApiError, kind: ResourceKind, name: impl Into<String>) -> Self {
        if error.is_not_found() {
            Error::ResourceNotFound { kind, name: name.into() }
        } else {
            error.into()
        }
    }

    /// Returns true if a required resource is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ResourceNotFound { .. })
    }

    /// Returns true if the cloud could not be reached
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

impl From<ApiError> for Error {
    fn from(cause: ApiError) -> Self {
        if cause.is_connection_error() {
            Error::Connection(cause)
        } else if cause.is_bad_request() {
            Error::MalformedRequest(cause)
        } else {
            Error::Api(cause)
        }
    }
}

/// Pick the single element of a lookup result.
pub(crate) fn exactly_one<T>(mut items: Vec<T>, kind: ResourceKind, name: &str) -> Result<T, Error> {
    match items.len() {
        0 => Err(Error::ResourceNotFound { kind, name: name.to_string() }),
        1 => Ok(items.remove(0)),
        count => Err(Error::AmbiguousResource { kind, name: name.to_string(), count }),
    }
}
