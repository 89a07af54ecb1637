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

//! # CSR Router Plugin
//!
//! Router lifecycle hooks, to be called by the networking control plane whenever a router is
//! created or deleted. Both hooks are serialized per router ID.
//!
//! Creating a router does the following:
//!
//! 1. Create one port for every role in `launch_ports` (by default only the management port).
//! 2. Launch the CSR instance with all those ports attached.
//! 3. Store the instance ID and the port IDs in the registry.
//!
//! If any step fails, the ports created so far are deleted again. Deleting a router removes the
//! instance by its stored ID, and the ports if they are owned by the router.

use crate::backend::{ComputeApi, NetworkApi};
use crate::config::{CsrConfig, PortOwnership, PortRole};
use crate::locks::KeyedLocks;
use crate::port_manager::PortManager;
use crate::registry::{OwnedPort, RouterInfo, RouterRegistry, RouterResources};
use crate::vm_manager::CsrVmManager;
use crate::{Error, Result};

use log::*;
use openstack_api::Server;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// # CSR Router Plugin
#[derive(Debug)]
pub struct CsrRouterPlugin<C, N> {
    vm_manager: CsrVmManager<C>,
    port_manager: PortManager<N>,
    launch_ports: Vec<PortRole>,
    port_ownership: PortOwnership,
    state_file: Option<PathBuf>,
    registry: Mutex<RouterRegistry>,
    locks: KeyedLocks,
    name_locks: KeyedLocks,
}

impl<C: ComputeApi, N: NetworkApi> CsrRouterPlugin<C, N> {
    /// Create the plugin. If a state file is configured, the registry is loaded from it.
    pub fn new(config: &CsrConfig, compute: C, network: N) -> Result<Self> {
        let registry = match &config.state_file {
            Some(path) => RouterRegistry::load(path)?,
            None => RouterRegistry::new(),
        };
        if !registry.is_empty() {
            info!("Loaded {} routers from the registry", registry.len());
        }
        Ok(Self {
            vm_manager: CsrVmManager::from_config(compute, config),
            port_manager: PortManager::new(network, config.ports.clone()),
            launch_ports: config.launch_ports.clone(),
            port_ownership: config.port_ownership,
            state_file: config.state_file.clone(),
            registry: Mutex::new(registry),
            locks: KeyedLocks::new(),
            name_locks: KeyedLocks::new(),
        })
    }

    /// The instance manager
    pub fn vm_manager(&self) -> &CsrVmManager<C> {
        &self.vm_manager
    }

    /// The port manager
    pub fn port_manager(&self) -> &PortManager<N> {
        &self.port_manager
    }

    /// Get the resources of a router
    pub fn resources(&self, router_id: &str) -> Option<RouterResources> {
        self.registry().get(router_id).cloned()
    }

    /// Get the resources of all routers
    pub fn routers(&self) -> Vec<RouterResources> {
        self.registry().routers().cloned().collect()
    }

    /// Create the ports and the CSR instance of a new router. Fails if the router ID, or the
    /// router name, is already managed, since the instance and the ports are named after the
    /// router.
    pub fn create_router(&self, router: RouterInfo) -> Result<RouterResources> {
        let router_id = router.id.clone();
        let router_name = router.name.clone();
        // the name lock is always taken after the ID lock
        self.locks.with_lock(&router_id, || {
            self.name_locks.with_lock(&router_name, || self.create_router_locked(router))
        })
    }

    /// Delete the CSR instance and the owned ports of a router.
    ///
    /// If the instance cannot be deleted, nothing else is touched and the router stays
    /// registered. If some ports cannot be deleted, the router stays registered with only these
    /// ports, such that a second call can finish the job.
    pub fn delete_router(&self, router_id: &str) -> Result<RouterResources> {
        self.locks.with_lock(router_id, || self.delete_router_locked(router_id))
    }

    fn create_router_locked(&self, router: RouterInfo) -> Result<RouterResources> {
        {
            let registry = self.registry();
            if registry.contains(&router.id) {
                return Err(Error::RouterExists(router.id));
            }
            if let Some(other) = registry.routers().find(|r| r.router.name == router.name) {
                return Err(Error::RouterNameInUse {
                    name: router.name,
                    id: other.router.id.clone(),
                });
            };
        }
        info!("Creating CSR for router {} ({})", router.name, router.id);

        let mut ports: Vec<OwnedPort> = Vec::new();
        let server = match self.provision(&router, &mut ports) {
            Ok(server) => server,
            Err(e) => {
                error!("Cannot create CSR for router {}: {}", router.name, e);
                self.rollback_ports(&ports);
                return Err(e);
            }
        };

        let resources = RouterResources { router, instance_id: Some(server.id), ports };
        self.record(|registry| {
            registry.insert(resources.clone());
        })?;
        Ok(resources)
    }

    fn provision(&self, router: &RouterInfo, ports: &mut Vec<OwnedPort>) -> Result<Server> {
        for role in self.launch_ports.iter() {
            let port = self.port_manager.create_role_port(*role, &router.name, &router.tenant_id)?;
            ports.push(OwnedPort { role: *role, id: port.id });
        }
        let port_ids: Vec<String> = ports.iter().map(|p| p.id.clone()).collect();
        self.vm_manager.launch(&router.name, &port_ids)
    }

    fn rollback_ports(&self, ports: &[OwnedPort]) {
        for port in ports.iter().rev() {
            if let Err(e) = self.port_manager.delete_port(&port.id) {
                warn!("Cannot remove the {} port {} during rollback: {}", port.role, port.id, e);
            }
        }
    }

    fn delete_router_locked(&self, router_id: &str) -> Result<RouterResources> {
        let resources = self
            .resources(router_id)
            .ok_or_else(|| Error::UnknownRouter(router_id.to_string()))?;
        info!("Deleting CSR of router {} ({})", resources.router.name, router_id);

        if let Some(instance_id) = resources.instance_id.as_deref() {
            match self.vm_manager.terminate_by_id(instance_id) {
                Ok(()) => {}
                Err(Error::ResourceNotFound { .. }) => {
                    warn!("CSR instance {} of router {} is already gone", instance_id, router_id)
                }
                Err(e) => return Err(e),
            }
        }

        let mut remaining: Vec<OwnedPort> = Vec::new();
        let mut port_error: Option<Error> = None;
        if self.port_ownership == PortOwnership::Owned {
            for port in resources.ports.iter() {
                match self.port_manager.delete_port(&port.id) {
                    Ok(()) => {}
                    Err(Error::ResourceNotFound { .. }) => {
                        warn!("The {} port {} is already gone", port.role, port.id)
                    }
                    Err(e) => {
                        error!("Cannot delete the {} port {}: {}", port.role, port.id, e);
                        remaining.push(port.clone());
                        port_error.get_or_insert(e);
                    }
                }
            }
        }

        match port_error {
            Some(e) => {
                let partial = RouterResources {
                    router: resources.router.clone(),
                    instance_id: None,
                    ports: remaining,
                };
                self.record(|registry| {
                    registry.insert(partial);
                })?;
                Err(e)
            }
            None => {
                self.record(|registry| {
                    registry.remove(router_id);
                })?;
                info!("Router {} ({}) is cleaned up", resources.router.name, router_id);
                Ok(resources)
            }
        }
    }

    fn record<F: FnOnce(&mut RouterRegistry)>(&self, f: F) -> Result<()> {
        let mut registry = self.registry();
        f(&mut *registry);
        if let Some(path) = &self.state_file {
            registry.save(path)?;
        }
        Ok(())
    }

    fn registry(&self) -> MutexGuard<'_, RouterRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
