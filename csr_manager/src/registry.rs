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

//! # Router Registry
//!
//! Remembers which instance and which ports were created for which router, such that deleting a
//! router does not depend on looking up resources by name. The registry can be stored as a JSON
//! file and loaded again after a restart.

use crate::config::PortRole;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Error while reading or writing the registry file
#[derive(Debug, Error)]
pub enum StateError {
    /// IO Error
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
    /// The file content is no valid registry
    #[error("Invalid registry file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Logical router, as handed over by the networking control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterInfo {
    /// ID of the router
    pub id: String,
    /// Name of the router
    pub name: String,
    /// Tenant owning the router
    pub tenant_id: String,
}

impl RouterInfo {
    /// Create a new router description
    pub fn new(id: impl Into<String>, name: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), tenant_id: tenant_id.into() }
    }
}

/// Port created for a router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedPort {
    /// Role of the port
    pub role: PortRole,
    /// ID of the port
    pub id: String,
}

/// Everything that was created for a router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterResources {
    /// The router
    pub router: RouterInfo,
    /// The CSR instance. `None` once it was deleted while some ports could not be.
    pub instance_id: Option<String>,
    /// The ports, in the order they are attached to the instance
    pub ports: Vec<OwnedPort>,
}

impl RouterResources {
    /// Get the port of a role
    pub fn port(&self, role: PortRole) -> Option<&OwnedPort> {
        self.ports.iter().find(|p| p.role == role)
    }
}

/// # Router Registry
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterRegistry {
    routers: BTreeMap<String, RouterResources>,
}

impl RouterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the registry from a file. A missing file is an empty registry.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StateError> {
        match fs::read_to_string(path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Store the registry. The file is replaced atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StateError> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Add or replace the resources of a router. Returns the previous entry.
    pub fn insert(&mut self, resources: RouterResources) -> Option<RouterResources> {
        self.routers.insert(resources.router.id.clone(), resources)
    }

    /// Get the resources of a router
    pub fn get(&self, router_id: &str) -> Option<&RouterResources> {
        self.routers.get(router_id)
    }

    /// Returns true if the router is registered
    pub fn contains(&self, router_id: &str) -> bool {
        self.routers.contains_key(router_id)
    }

    /// Remove a router
    pub fn remove(&mut self, router_id: &str) -> Option<RouterResources> {
        self.routers.remove(router_id)
    }

    /// Iterate over all routers, ordered by ID
    pub fn routers(&self) -> impl Iterator<Item = &RouterResources> {
        self.routers.values()
    }

    /// Number of registered routers
    pub fn len(&self) -> usize {
        self.routers.len()
    }

    /// Returns true if no router is registered
    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }
}
