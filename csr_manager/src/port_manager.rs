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

//! # Port Manager
//!
//! Creates the ports of a CSR instance. Every port gets exactly one fixed IP on the subnet chosen
//! by the [`SubnetPolicy`], no security groups, and is not bound to any device. The instance is
//! bound to the port later, when it is booted with the port attached.

use crate::backend::NetworkApi;
use crate::config::{ConfigError, PortRole, PortSettings, PortsConfig, SubnetPolicy};
use crate::error::exactly_one;
use crate::naming::port_name;
use crate::{Error, ResourceKind, Result};

use log::*;
use openstack_api::{FixedIp, Network, Port, PortSpec, SubnetFilter};
use std::net::IpAddr;

/// # Port Manager
#[derive(Debug)]
pub struct PortManager<N> {
    network: N,
    ports: PortsConfig,
}

impl<N: NetworkApi> PortManager<N> {
    /// Create a new port manager
    pub fn new(network: N, ports: PortsConfig) -> Self {
        Self { network, ports }
    }

    /// The network backend
    pub fn network(&self) -> &N {
        &self.network
    }

    /// Create the management port of a router
    pub fn create_management_port(&self, router_name: &str, tenant_id: &str) -> Result<Port> {
        self.create_role_port(PortRole::Management, router_name, tenant_id)
    }

    /// Create the ingress port of a router
    pub fn create_ingress_port(&self, router_name: &str, tenant_id: &str) -> Result<Port> {
        self.create_role_port(PortRole::Ingress, router_name, tenant_id)
    }

    /// Create the egress port of a router
    pub fn create_egress_port(&self, router_name: &str, tenant_id: &str) -> Result<Port> {
        self.create_role_port(PortRole::Egress, router_name, tenant_id)
    }

    /// Create the port of the given role, on the network configured for that role.
    pub fn create_role_port(&self, role: PortRole, router_name: &str, tenant_id: &str) -> Result<Port> {
        let settings = self.ports.settings(role).ok_or(ConfigError::MissingPortSettings(role))?;
        let network = self.resolve_network(&settings.network)?;
        debug!("{} network of router {}: {}", role, router_name, network.id);
        self.create_port(&port_name(role, router_name), tenant_id, settings, &network.id)
    }

    /// Create a port on a network, with subnet and address as configured in `settings`.
    pub fn create_port(
        &self,
        name: &str,
        tenant_id: &str,
        settings: &PortSettings,
        network_id: &str,
    ) -> Result<Port> {
        let subnet_id = self.resolve_subnet(&settings.subnet, network_id)?;
        let spec = port_spec(name, tenant_id, network_id, &subnet_id, settings.ip_address);
        debug!("create port {:?}", spec);
        let port = self.network.create_port(&spec)?;
        info!("Created port {} ({}), status {:?}", port.name, port.id, port.status);
        Ok(port)
    }

    /// Delete a port
    pub fn delete_port(&self, port_id: &str) -> Result<()> {
        info!("Deleting port {}", port_id);
        self.network
            .delete_port(port_id)
            .map_err(|e| Error::from_api(e, ResourceKind::Port, port_id))
    }

    fn resolve_network(&self, name: &str) -> Result<Network> {
        exactly_one(self.network.find_networks(name)?, ResourceKind::Network, name)
    }

    fn resolve_subnet(&self, policy: &SubnetPolicy, network_id: &str) -> Result<String> {
        match policy {
            SubnetPolicy::Id(id) => Ok(id.clone()),
            SubnetPolicy::Name(name) => {
                let filter = SubnetFilter {
                    name: Some(name.clone()),
                    network_id: Some(network_id.to_string()),
                    ..Default::default()
                };
                Ok(exactly_one(self.network.find_subnets(&filter)?, ResourceKind::Subnet, name)?.id)
            }
            SubnetPolicy::First => {
                let filter =
                    SubnetFilter { network_id: Some(network_id.to_string()), ..Default::default() };
                self.network
                    .find_subnets(&filter)?
                    .into_iter()
                    .next()
                    .map(|s| s.id)
                    .ok_or_else(|| Error::ResourceNotFound {
                        kind: ResourceKind::Subnet,
                        name: format!("any subnet on network {}", network_id),
                    })
            }
        }
    }
}

/// Build the request for a CSR port: one fixed IP, no security groups, no device binding.
pub fn port_spec(
    name: &str,
    tenant_id: &str,
    network_id: &str,
    subnet_id: &str,
    ip_address: Option<IpAddr>,
) -> PortSpec {
    PortSpec {
        name: name.to_string(),
        tenant_id: tenant_id.to_string(),
        network_id: network_id.to_string(),
        admin_state_up: true,
        fixed_ips: vec![FixedIp {
            subnet_id: subnet_id.to_string(),
            ip_address: ip_address.map(|ip| ip.to_string()),
        }],
        security_groups: Vec::new(),
        device_id: String::new(),
        device_owner: String::new(),
    }
}
