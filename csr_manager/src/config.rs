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

//! # Configuration
//!
//! The configuration is stored as a JSON file. Every field except the credentials has a default,
//! and the credentials can also be taken from the usual OpenStack environment variables
//! (`OS_USERNAME`, `OS_PASSWORD`, `OS_AUTH_URL`, `OS_PROJECT_NAME` or `OS_TENANT_NAME`, and
//! `OS_REGION_NAME`). Values from the environment win over values from the file.
//!
//! ```json
//! {
//!     "credentials": { "auth_url": "http://controller:5000/v2.0", "project_name": "csr" },
//!     "flavor": "csr-medium-public",
//!     "image": "csr-3.13-mcp",
//!     "ports": {
//!         "management": { "network": "public", "subnet": { "name": "public-subnet" } },
//!         "egress": { "network": "public", "subnet": "first", "ip_address": "172.24.4.100" }
//!     },
//!     "launch_ports": ["management"],
//!     "state_file": "/var/lib/csr_manager/routers.json"
//! }
//! ```

use openstack_api::{ClientSettings, Credentials, Interface, MAX_GET_RETRIES};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Flavor used when the configuration does not name one
pub const DEFAULT_FLAVOR: &str = "csr-medium-public";
/// Image used when the configuration does not name one
pub const DEFAULT_IMAGE: &str = "csr-3.13-mcp";
/// Network of the management port, when the configuration does not name one
pub const DEFAULT_MANAGEMENT_NETWORK: &str = "public";

/// Error while loading or checking the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file cannot be read
    #[error("Cannot read the configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is no valid JSON, or has unknown fields
    #[error("Cannot parse the configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// A required value is neither in the file nor in the environment
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
    /// A value is present, but unusable
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Name of the field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// A port role is used, but no port settings are configured for it
    #[error("No port settings for the {0} port")]
    MissingPortSettings(PortRole),
}

/// Role of a port of the CSR instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortRole {
    /// Management interface
    Management,
    /// Interface towards the tenant networks
    Ingress,
    /// Interface towards the external network
    Egress,
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRole::Management => write!(f, "management"),
            PortRole::Ingress => write!(f, "ingress"),
            PortRole::Egress => write!(f, "egress"),
        }
    }
}

impl FromStr for PortRole {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "management" | "mgmt" => Ok(PortRole::Management),
            "ingress" => Ok(PortRole::Ingress),
            "egress" => Ok(PortRole::Egress),
            _ => Err(ConfigError::Invalid {
                field: "role",
                reason: format!("unknown port role {}", s),
            }),
        }
    }
}

/// How the subnet of a port is chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetPolicy {
    /// Use exactly this subnet ID, without looking it up
    Id(String),
    /// Use the subnet with this name on the port network
    Name(String),
    /// Use the first subnet on the port network
    First,
}

impl Default for SubnetPolicy {
    fn default() -> Self {
        SubnetPolicy::First
    }
}

/// Settings of one port role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortSettings {
    /// Name of the network the port is created on
    pub network: String,
    /// How to choose the subnet of the fixed IP
    #[serde(default)]
    pub subnet: SubnetPolicy,
    /// Static address of the port. Neutron allocates one if unset.
    #[serde(default)]
    pub ip_address: Option<IpAddr>,
}

impl PortSettings {
    /// Port settings on a network, with the first subnet and an allocated address.
    pub fn on_network(network: impl Into<String>) -> Self {
        Self { network: network.into(), subnet: SubnetPolicy::First, ip_address: None }
    }
}

/// Port settings of all roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortsConfig {
    /// Management port
    pub management: Option<PortSettings>,
    /// Ingress port
    pub ingress: Option<PortSettings>,
    /// Egress port
    pub egress: Option<PortSettings>,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            management: Some(PortSettings::on_network(DEFAULT_MANAGEMENT_NETWORK)),
            ingress: None,
            egress: None,
        }
    }
}

impl PortsConfig {
    /// Get the settings of a role
    pub fn settings(&self, role: PortRole) -> Option<&PortSettings> {
        match role {
            PortRole::Management => self.management.as_ref(),
            PortRole::Ingress => self.ingress.as_ref(),
            PortRole::Egress => self.egress.as_ref(),
        }
    }
}

/// Whether the ports of a router are removed together with the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortOwnership {
    /// Ports are deleted when the router is deleted
    Owned,
    /// Ports are left alone when the router is deleted
    External,
}

impl Default for PortOwnership {
    fn default() -> Self {
        PortOwnership::Owned
    }
}

/// Credentials, as written in the configuration file. Missing values may come from the
/// environment.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsConfig {
    /// User name
    pub username: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Keystone URL
    pub auth_url: Option<String>,
    /// Project (tenant) name
    pub project_name: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("auth_url", &self.auth_url)
            .field("project_name", &self.project_name)
            .finish()
    }
}

/// # CSR Manager Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsrConfig {
    /// Keystone credentials
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Catalog interface to use for compute and network
    #[serde(default)]
    pub endpoint_interface: Interface,
    /// Region to use from the catalog
    #[serde(default)]
    pub region: Option<String>,
    /// Timeout of each request to the cloud, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// How often a failed GET request is repeated, at most `MAX_GET_RETRIES`
    #[serde(default = "default_get_retries")]
    pub get_retries: u32,
    /// Name of the flavor of the CSR instances
    #[serde(default = "default_flavor")]
    pub flavor: String,
    /// Name of the image of the CSR instances
    #[serde(default = "default_image")]
    pub image: String,
    /// Port settings per role
    #[serde(default)]
    pub ports: PortsConfig,
    /// Ports created for every router, and attached to its CSR instance in this order
    #[serde(default = "default_launch_ports")]
    pub launch_ports: Vec<PortRole>,
    /// Whether ports are deleted together with the router
    #[serde(default)]
    pub port_ownership: PortOwnership,
    /// Where the router registry is stored. Kept in memory only if unset.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_get_retries() -> u32 {
    2
}

fn default_flavor() -> String {
    DEFAULT_FLAVOR.to_string()
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

fn default_launch_ports() -> Vec<PortRole> {
    vec![PortRole::Management]
}

impl Default for CsrConfig {
    fn default() -> Self {
        Self {
            credentials: CredentialsConfig::default(),
            endpoint_interface: Interface::default(),
            region: None,
            request_timeout_secs: default_request_timeout(),
            get_retries: default_get_retries(),
            flavor: default_flavor(),
            image: default_image(),
            ports: PortsConfig::default(),
            launch_ports: default_launch_ports(),
            port_ownership: PortOwnership::default(),
            state_file: None,
        }
    }
}

impl CsrConfig {
    /// Parse a configuration from a JSON string, without looking at the environment.
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(data)?)
    }

    /// Read the configuration file, apply the environment, and validate the result.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_json(&fs::read_to_string(path)?)?;
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overwrite credentials and region with the values returned by `lookup` for the `OS_*`
    /// variables.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        let creds = &mut self.credentials;
        if let Some(v) = lookup("OS_USERNAME") {
            creds.username = Some(v);
        }
        if let Some(v) = lookup("OS_PASSWORD") {
            creds.password = Some(v);
        }
        if let Some(v) = lookup("OS_AUTH_URL") {
            creds.auth_url = Some(v);
        }
        if let Some(v) = lookup("OS_PROJECT_NAME").or_else(|| lookup("OS_TENANT_NAME")) {
            creds.project_name = Some(v);
        }
        if let Some(v) = lookup("OS_REGION_NAME") {
            self.region = Some(v);
        }
    }

    /// Check the configuration for completeness and consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let credentials = self.credentials()?;
        let url_re = Regex::new(r"^https?://[^/\s]+").unwrap();
        if !url_re.is_match(&credentials.auth_url) {
            return Err(ConfigError::Invalid {
                field: "credentials.auth_url",
                reason: format!("{} is no http(s) URL", credentials.auth_url),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be at least one second".to_string(),
            });
        }
        if self.get_retries > MAX_GET_RETRIES {
            return Err(ConfigError::Invalid {
                field: "get_retries",
                reason: format!("at most {} retries are allowed", MAX_GET_RETRIES),
            });
        }
        if self.flavor.trim().is_empty() {
            return Err(ConfigError::Missing("flavor"));
        }
        if self.image.trim().is_empty() {
            return Err(ConfigError::Missing("image"));
        }
        for (i, role) in self.launch_ports.iter().enumerate() {
            if self.launch_ports[..i].contains(role) {
                return Err(ConfigError::Invalid {
                    field: "launch_ports",
                    reason: format!("{} is listed twice", role),
                });
            }
            let settings = self.ports.settings(*role).ok_or(ConfigError::MissingPortSettings(*role))?;
            if settings.network.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "ports",
                    reason: format!("the {} port has an empty network name", role),
                });
            }
            match &settings.subnet {
                SubnetPolicy::Id(s) | SubnetPolicy::Name(s) if s.trim().is_empty() => {
                    return Err(ConfigError::Invalid {
                        field: "ports",
                        reason: format!("the {} port has an empty subnet", role),
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Get the complete credentials
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
            match value {
                Some(v) if !v.trim().is_empty() => Ok(v.clone()),
                _ => Err(ConfigError::Missing(name)),
            }
        }
        let c = &self.credentials;
        Ok(Credentials {
            username: required(&c.username, "credentials.username")?,
            password: required(&c.password, "credentials.password")?,
            auth_url: required(&c.auth_url, "credentials.auth_url")?,
            project_name: required(&c.project_name, "credentials.project_name")?,
        })
    }

    /// Settings for the HTTP client
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            interface: self.endpoint_interface,
            region: self.region.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            get_retries: self.get_retries,
            ..Default::default()
        }
    }
}
