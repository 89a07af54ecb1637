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

//! # CSR Manager
//!
//! This library manages one CSR (virtual router appliance) instance per logical router on an
//! OpenStack cloud. When the networking control plane creates a router, the ports of the router
//! are created in Neutron and the CSR instance is booted in Nova. When the router is deleted, the
//! instance and the owned ports are removed again. For simplified usage, check the
//! [`CsrRouterPlugin`](plugin::CsrRouterPlugin).
//!
//! ## Structure
//!
//! - **[`config`]**: The configuration of the manager, loaded from a JSON file and the usual
//!   `OS_*` environment variables.
//! - **[`backend`]**: The [`ComputeApi`](backend::ComputeApi) and
//!   [`NetworkApi`](backend::NetworkApi) traits, which the managers talk to. Both are implemented
//!   for the [`OpenStackClient`](openstack_api::OpenStackClient).
//! - **[`vm_manager`]**: Launch, find and terminate the CSR instance of a router.
//! - **[`port_manager`]**: Create the management, ingress and egress ports of a router.
//! - **[`registry`]**: Which instance and which ports belong to which router. Can be persisted.
//! - **[`plugin`]**: The router lifecycle hooks, combining all of the above.

#![deny(missing_docs, missing_debug_implementations)]

pub mod backend;
pub mod config;
mod error;
pub mod locks;
pub mod naming;
pub mod plugin;
pub mod port_manager;
pub mod registry;
#[cfg(test)]
mod test;
pub mod vm_manager;

pub use error::{Error, ResourceKind};
pub use plugin::CsrRouterPlugin;

use config::CsrConfig;
use log::*;
use openstack_api::OpenStackClient;

/// Result type of the CSR manager
pub type Result<T> = std::result::Result<T, Error>;

/// Authenticate against the cloud described in the configuration. Any failure is reported as
/// [`Error::Connection`].
pub fn connect(config: &CsrConfig) -> Result<OpenStackClient> {
    let credentials = config.credentials()?;
    info!("Connecting to {}", credentials.auth_url);
    OpenStackClient::connect(credentials, config.client_settings()).map_err(|e| {
        error!("Cannot connect to the cloud: {}", e);
        Error::Connection(e)
    })
}
