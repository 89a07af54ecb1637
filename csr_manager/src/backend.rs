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

//! # Cloud Backends
//!
//! The managers never talk to OpenStack directly, but through the two traits in this module.
//! Errors are reported as [`openstack_api::Error`], and translated by the managers, which know
//! what resource was requested.

use openstack_api::{
    Error as ApiError, Flavor, Image, Network, OpenStackClient, Port, PortSpec, Server, ServerSpec,
    Subnet, SubnetFilter,
};
use std::sync::Arc;

/// Result of a backend call
pub type ApiResult<T> = Result<T, ApiError>;

/// Operations on the compute service
pub trait ComputeApi {
    /// All flavors with exactly this name
    fn find_flavors(&self, name: &str) -> ApiResult<Vec<Flavor>>;
    /// All images with exactly this name
    fn find_images(&self, name: &str) -> ApiResult<Vec<Image>>;
    /// Boot a new server
    fn create_server(&self, spec: &ServerSpec) -> ApiResult<Server>;
    /// At most `limit` servers with exactly this name
    fn list_servers(&self, name: &str, limit: usize) -> ApiResult<Vec<Server>>;
    /// Delete a server
    fn delete_server(&self, server_id: &str) -> ApiResult<()>;
}

/// Operations on the network service
pub trait NetworkApi {
    /// All networks with exactly this name
    fn find_networks(&self, name: &str) -> ApiResult<Vec<Network>>;
    /// All subnets matching the filter
    fn find_subnets(&self, filter: &SubnetFilter) -> ApiResult<Vec<Subnet>>;
    /// Create a port
    fn create_port(&self, spec: &PortSpec) -> ApiResult<Port>;
    /// Delete a port
    fn delete_port(&self, port_id: &str) -> ApiResult<()>;
}

impl ComputeApi for OpenStackClient {
    fn find_flavors(&self, name: &str) -> ApiResult<Vec<Flavor>> {
        Ok(self.list_flavors()?.into_iter().filter(|f| f.name == name).collect())
    }

    fn find_images(&self, name: &str) -> ApiResult<Vec<Image>> {
        Ok(self.list_images(Some(name))?.into_iter().filter(|i| i.name == name).collect())
    }

    fn create_server(&self, spec: &ServerSpec) -> ApiResult<Server> {
        OpenStackClient::create_server(self, spec)
    }

    fn list_servers(&self, name: &str, limit: usize) -> ApiResult<Vec<Server>> {
        OpenStackClient::list_servers(self, name, limit)
    }

    fn delete_server(&self, server_id: &str) -> ApiResult<()> {
        OpenStackClient::delete_server(self, server_id)
    }
}

impl NetworkApi for OpenStackClient {
    fn find_networks(&self, name: &str) -> ApiResult<Vec<Network>> {
        Ok(self.list_networks(Some(name))?.into_iter().filter(|n| n.name == name).collect())
    }

    fn find_subnets(&self, filter: &SubnetFilter) -> ApiResult<Vec<Subnet>> {
        self.list_subnets(filter)
    }

    fn create_port(&self, spec: &PortSpec) -> ApiResult<Port> {
        OpenStackClient::create_port(self, spec)
    }

    fn delete_port(&self, port_id: &str) -> ApiResult<()> {
        OpenStackClient::delete_port(self, port_id)
    }
}

impl<T: ComputeApi + ?Sized> ComputeApi for &T {
    fn find_flavors(&self, name: &str) -> ApiResult<Vec<Flavor>> {
        (**self).find_flavors(name)
    }
    fn find_images(&self, name: &str) -> ApiResult<Vec<Image>> {
        (**self).find_images(name)
    }
    fn create_server(&self, spec: &ServerSpec) -> ApiResult<Server> {
        (**self).create_server(spec)
    }
    fn list_servers(&self, name: &str, limit: usize) -> ApiResult<Vec<Server>> {
        (**self).list_servers(name, limit)
    }
    fn delete_server(&self, server_id: &str) -> ApiResult<()> {
        (**self).delete_server(server_id)
    }
}

impl<T: NetworkApi + ?Sized> NetworkApi for &T {
    fn find_networks(&self, name: &str) -> ApiResult<Vec<Network>> {
        (**self).find_networks(name)
    }
    fn find_subnets(&self, filter: &SubnetFilter) -> ApiResult<Vec<Subnet>> {
        (**self).find_subnets(filter)
    }
    fn create_port(&self, spec: &PortSpec) -> ApiResult<Port> {
        (**self).create_port(spec)
    }
    fn delete_port(&self, port_id: &str) -> ApiResult<()> {
        (**self).delete_port(port_id)
    }
}

impl<T: ComputeApi + ?Sized> ComputeApi for Arc<T> {
    fn find_flavors(&self, name: &str) -> ApiResult<Vec<Flavor>> {
        (**self).find_flavors(name)
    }
    fn find_images(&self, name: &str) -> ApiResult<Vec<Image>> {
        (**self).find_images(name)
    }
    fn create_server(&self, spec: &ServerSpec) -> ApiResult<Server> {
        (**self).create_server(spec)
    }
    fn list_servers(&self, name: &str, limit: usize) -> ApiResult<Vec<Server>> {
        (**self).list_servers(name, limit)
    }
    fn delete_server(&self, server_id: &str) -> ApiResult<()> {
        (**self).delete_server(server_id)
    }
}

impl<T: NetworkApi + ?Sized> NetworkApi for Arc<T> {
    fn find_networks(&self, name: &str) -> ApiResult<Vec<Network>> {
        (**self).find_networks(name)
    }
    fn find_subnets(&self, filter: &SubnetFilter) -> ApiResult<Vec<Subnet>> {
        (**self).find_subnets(filter)
    }
    fn create_port(&self, spec: &PortSpec) -> ApiResult<Port> {
        (**self).create_port(spec)
    }
    fn delete_port(&self, port_id: &str) -> ApiResult<()> {
        (**self).delete_port(port_id)
    }
}
