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

//! Names of the cloud resources belonging to a router.

use crate::config::PortRole;

/// Prefix of every CSR instance name
pub const INSTANCE_PREFIX: &str = "_CSR_";

/// Name of the CSR instance of a router.
pub fn instance_name(router_name: &str) -> String {
    format!("{}{}", INSTANCE_PREFIX, router_name)
}

/// Name of a port of a router.
pub fn port_name(role: PortRole, router_name: &str) -> String {
    let prefix = match role {
        PortRole::Management => "_CSR_mgmt_port_",
        PortRole::Ingress => "_CSR_ingress_port_",
        PortRole::Egress => "_CSR_egress_port_",
    };
    format!("{}{}", prefix, router_name)
}
