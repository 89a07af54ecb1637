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

use csr_manager::config::{CsrConfig, PortRole};
use csr_manager::naming::instance_name;
use csr_manager::port_manager::PortManager;
use csr_manager::registry::RouterInfo;
use csr_manager::vm_manager::CsrVmManager;
use csr_manager::CsrRouterPlugin;
use openstack_api::{OpenStackClient, Port, Server};

use clap::{Parser, Subcommand};
use log::*;
use std::error::Error;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn Error>> {
    // initialize the env logger
    pretty_env_logger::init();

    // run clap
    let args = CommandLineArguments::parse();

    let config = CsrConfig::load(&args.config)?;
    let client = csr_manager::connect(&config)?;

    match args.cmd {
        MainCommand::Launch { router, ports } => {
            let server = CsrVmManager::from_config(&client, &config).launch(&router, &ports)?;
            print_server(&server);
        }
        MainCommand::Terminate { router } => {
            let server = CsrVmManager::from_config(&client, &config).terminate(&router)?;
            info!("Deleted instance {} of router {}", server.id, router);
            print_server(&server);
        }
        MainCommand::Find { router } => {
            let server = CsrVmManager::from_config(&client, &config).find_by_name(&instance_name(&router))?;
            print_server(&server);
        }
        MainCommand::CreatePort { role, router, tenant } => {
            let port = PortManager::new(&client, config.ports.clone()).create_role_port(role, &router, &tenant)?;
            print_port(&port);
        }
        MainCommand::CreateRouter { id, name, tenant } => {
            let resources = plugin(&config, &client)?.create_router(RouterInfo::new(id, name, tenant))?;
            println!("{}", serde_json::to_string_pretty(&resources)?);
        }
        MainCommand::DeleteRouter { id } => {
            let resources = plugin(&config, &client)?.delete_router(&id)?;
            println!("{}", serde_json::to_string_pretty(&resources)?);
        }
        MainCommand::ListRouters => {
            let routers = plugin(&config, &client)?.routers();
            if routers.is_empty() {
                warn!("No routers are registered");
            }
            println!("{}", serde_json::to_string_pretty(&routers)?);
        }
    }

    Ok(())
}

fn plugin<'a>(
    config: &CsrConfig,
    client: &'a OpenStackClient,
) -> Result<CsrRouterPlugin<&'a OpenStackClient, &'a OpenStackClient>, Box<dyn Error>> {
    if config.state_file.is_none() {
        warn!("No state file configured! The registry is lost when the program exits.");
    }
    Ok(CsrRouterPlugin::new(config, client, client)?)
}

fn print_server(server: &Server) {
    let status = server.status.as_ref().map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
    println!("{}\t{}\t{}", server.id, server.name, status);
}

fn print_port(port: &Port) {
    let ips: Vec<&str> = port.fixed_ips.iter().filter_map(|ip| ip.ip_address.as_deref()).collect();
    println!("{}\t{}\t{}\t{}", port.id, port.name, port.network_id, ips.join(","));
}

#[derive(Parser, Debug)]
#[clap(name = "CSR Manager", author = "Tibor Schneider")]
struct CommandLineArguments {
    /// Configuration file (JSON). Credentials may also come from the OS_* environment variables.
    #[clap(short = 'c', long, default_value = "csr_manager.json")]
    config: PathBuf,
    /// Action to perform
    #[clap(subcommand)]
    cmd: MainCommand,
}

#[derive(Subcommand, Debug)]
enum MainCommand {
    /// Launch the CSR instance of a router
    #[clap(name = "launch")]
    Launch {
        /// Name of the router
        router: String,
        /// Port IDs to attach, in this order
        #[clap(short = 'p', long = "port")]
        ports: Vec<String>,
    },
    /// Delete the CSR instance of a router, looked up by name
    #[clap(name = "terminate")]
    Terminate {
        /// Name of the router
        router: String,
    },
    /// Show the CSR instance of a router
    #[clap(name = "find")]
    Find {
        /// Name of the router
        router: String,
    },
    /// Create a port of a router
    #[clap(name = "create-port")]
    CreatePort {
        /// Role of the port (management, ingress or egress)
        role: PortRole,
        /// Name of the router
        router: String,
        /// Tenant owning the port
        tenant: String,
    },
    /// Create the ports and the CSR instance of a router, and register it
    #[clap(name = "create-router")]
    CreateRouter {
        /// Router ID
        id: String,
        /// Router name
        name: String,
        /// Tenant ID
        tenant: String,
    },
    /// Delete the CSR instance and the owned ports of a registered router
    #[clap(name = "delete-router")]
    DeleteRouter {
        /// Router ID
        id: String,
    },
    /// Print all registered routers
    #[clap(name = "list-routers")]
    ListRouters,
}
