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

//! # CSR Instance Manager
//!
//! Launches and terminates the CSR instance of a router. Flavor and image are resolved by name
//! on every launch. Nothing is polled: a launch returns as soon as Nova accepted the request.

use crate::backend::ComputeApi;
use crate::config::CsrConfig;
use crate::error::exactly_one;
use crate::naming::instance_name;
use crate::{Error, ResourceKind, Result};

use log::*;
use openstack_api::{Flavor, Image, Server, ServerSpec};

/// Number of servers requested when looking up an instance by name. One more than needed, such
/// that duplicates are detected.
const NAME_LOOKUP_LIMIT: usize = 2;

/// # CSR Instance Manager
#[derive(Debug)]
pub struct CsrVmManager<C> {
    compute: C,
    flavor: String,
    image: String,
}

impl<C: ComputeApi> CsrVmManager<C> {
    /// Create a manager booting instances with the given flavor and image name.
    pub fn new(compute: C, flavor: impl Into<String>, image: impl Into<String>) -> Self {
        Self { compute, flavor: flavor.into(), image: image.into() }
    }

    /// Create a manager with flavor and image taken from the configuration.
    pub fn from_config(compute: C, config: &CsrConfig) -> Self {
        Self::new(compute, &config.flavor, &config.image)
    }

    /// The compute backend
    pub fn compute(&self) -> &C {
        &self.compute
    }

    /// Launch the CSR instance of a router, attaching the given ports in order. Fails without
    /// creating anything if the flavor or the image cannot be found.
    pub fn launch(&self, router_name: &str, port_ids: &[String]) -> Result<Server> {
        debug!("launch CSR for router {} with ports {:?}", router_name, port_ids);
        let flavor = self.resolve_flavor()?;
        let image = self.resolve_image()?;

        let vm_name = instance_name(router_name);
        let spec = port_ids
            .iter()
            .fold(ServerSpec::new(&vm_name, &image.id, &flavor.id), |spec, port| spec.with_port(port));
        info!("Launching CSR instance {} (flavor {}, image {})", vm_name, flavor.name, image.name);
        let server = self.compute.create_server(&spec)?;
        debug!("CSR instance {} has id {}, status {:?}", vm_name, server.id, server.status);
        Ok(server)
    }

    /// Look up the CSR instance of a router by name and delete it. Returns the deleted instance.
    pub fn terminate(&self, router_name: &str) -> Result<Server> {
        let vm_name = instance_name(router_name);
        let server = self.find_by_name(&vm_name)?;
        self.terminate_by_id(&server.id)?;
        Ok(server)
    }

    /// Delete a CSR instance by ID.
    pub fn terminate_by_id(&self, instance_id: &str) -> Result<()> {
        info!("Deleting CSR instance {}", instance_id);
        self.compute
            .delete_server(instance_id)
            .map_err(|e| Error::from_api(e, ResourceKind::Instance, instance_id))
    }

    /// Find the single instance with the given name.
    pub fn find_by_name(&self, name: &str) -> Result<Server> {
        let servers = self.compute.list_servers(name, NAME_LOOKUP_LIMIT)?;
        debug!("servers named {}: {:?}", name, servers);
        exactly_one(servers, ResourceKind::Instance, name)
    }

    fn resolve_flavor(&self) -> Result<Flavor> {
        exactly_one(self.compute.find_flavors(&self.flavor)?, ResourceKind::Flavor, &self.flavor)
            .map_err(log_lookup_error)
    }

    fn resolve_image(&self) -> Result<Image> {
        exactly_one(self.compute.find_images(&self.image)?, ResourceKind::Image, &self.image)
            .map_err(log_lookup_error)
    }
}

fn log_lookup_error(e: Error) -> Error {
    error!("{}", e);
    e
}
