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

//! # OpenStack Types

use crate::{Error, Result};

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Clone)]
pub(crate) struct AuthRequest<'a> {
    pub auth: AuthBody<'a>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthBody<'a> {
    pub tenant_name: &'a str,
    pub password_credentials: PasswordCredentials<'a>,
}

#[derive(Debug, Serialize, Clone)]
pub(crate) struct PasswordCredentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct AuthResponse {
    pub access: Access,
}

/// Token and service catalog, as handed out by Keystone
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Access {
    /// The issued token
    pub token: Token,
    /// All services reachable with this token
    #[serde(rename = "serviceCatalog", default)]
    pub service_catalog: Vec<CatalogEntry>,
}

impl Access {
    /// Pick the endpoint URL of the given service type (e.g., `compute`). If a region is given,
    /// only endpoints of that region are considered.
    pub fn endpoint(
        &self,
        service_type: &str,
        interface: Interface,
        region: Option<&str>,
    ) -> Result<String> {
        self.service_catalog
            .iter()
            .filter(|entry| entry.service_type == service_type)
            .flat_map(|entry| entry.endpoints.iter())
            .filter(|ep| region.is_none() || ep.region.as_deref() == region)
            .find_map(|ep| ep.url(interface))
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| Error::MissingEndpoint(service_type.to_string()))
    }
}

/// Keystone token
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Token {
    /// Token ID, sent as `X-Auth-Token`
    pub id: String,
    /// Expiry timestamp, as reported by Keystone
    pub expires: Option<String>,
}

/// Service in the catalog
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Service type (compute, network, identity, ...)
    #[serde(rename = "type")]
    pub service_type: String,
    /// Service name
    #[serde(default)]
    pub name: Option<String>,
    /// Endpoints of the service
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

/// Endpoint of a service in the catalog
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CatalogEndpoint {
    /// Region of the endpoint
    #[serde(default)]
    pub region: Option<String>,
    /// Public URL
    #[serde(rename = "publicURL", default)]
    pub public_url: Option<String>,
    /// Internal URL
    #[serde(rename = "internalURL", default)]
    pub internal_url: Option<String>,
    /// Admin URL
    #[serde(rename = "adminURL", default)]
    pub admin_url: Option<String>,
}

impl CatalogEndpoint {
    /// Returns the URL for the interface, if the endpoint has one
    pub fn url(&self, interface: Interface) -> Option<&str> {
        match interface {
            Interface::Public => self.public_url.as_deref(),
            Interface::Internal => self.internal_url.as_deref(),
            Interface::Admin => self.admin_url.as_deref(),
        }
    }
}

/// Endpoint interface to talk to
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Interface {
    /// `publicURL`
    Public,
    /// `internalURL`
    Internal,
    /// `adminURL`
    Admin,
}

impl Default for Interface {
    fn default() -> Self {
        Self::Public
    }
}

/// Compute flavor
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Flavor {
    /// ID of the flavor
    pub id: String,
    /// Name of the flavor
    pub name: String,
    /// Memory in MB
    #[serde(default)]
    pub ram: u64,
    /// Number of virtual CPUs
    #[serde(default)]
    pub vcpus: u32,
    /// Root disk size in GB
    #[serde(default)]
    pub disk: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct FlavorList {
    pub flavors: Vec<Flavor>,
}

/// Boot image
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Image {
    /// ID of the image
    pub id: String,
    /// Name of the image
    pub name: String,
    /// Status of the image (ACTIVE, SAVING, ...)
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ImageList {
    pub images: Vec<Image>,
}

/// Server (VM instance) information
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Server {
    /// ID of the server
    pub id: String,
    /// Name of the server. Empty in the response to a create request.
    #[serde(default)]
    pub name: String,
    /// Status of the server. Missing in the response to a create request.
    #[serde(default)]
    pub status: Option<ServerStatus>,
}

/// Server Status
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    /// Server is running
    Active,
    /// Server is being built
    Build,
    /// Server is stopped
    Shutoff,
    /// Server failed
    Error,
    /// Server is deleted
    Deleted,
    /// Any other state (REBOOT, RESIZE, ...)
    #[serde(other)]
    Other,
}

impl ServerStatus {
    /// Returns true if the server is running
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
    /// Returns true if the server is in the error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Build => write!(f, "BUILD"),
            Self::Shutoff => write!(f, "SHUTOFF"),
            Self::Error => write!(f, "ERROR"),
            Self::Deleted => write!(f, "DELETED"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ServerResponse {
    pub server: Server,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ServerList {
    pub servers: Vec<Server>,
}

/// Request to boot a new server
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ServerSpec {
    /// Name of the new server
    pub name: String,
    /// ID of the image to boot from
    #[serde(rename = "imageRef")]
    pub image_ref: String,
    /// ID of the flavor
    #[serde(rename = "flavorRef")]
    pub flavor_ref: String,
    /// Network interfaces, each bound to an existing port
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<ServerNic>,
}

impl ServerSpec {
    /// Create a spec without any network interface
    pub fn new(name: impl Into<String>, image_id: impl Into<String>, flavor_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_ref: image_id.into(),
            flavor_ref: flavor_id.into(),
            networks: Vec::new(),
        }
    }

    /// Attach an existing port to the server
    pub fn with_port(mut self, port_id: impl Into<String>) -> Self {
        self.networks.push(ServerNic { port: port_id.into() });
        self
    }
}

/// Network interface of a new server
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ServerNic {
    /// ID of the port to attach
    pub port: String,
}

#[derive(Debug, Serialize, Clone)]
pub(crate) struct ServerRequest<'a> {
    pub server: &'a ServerSpec,
}

/// Neutron network
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Network {
    /// ID of the network
    pub id: String,
    /// Name of the network
    pub name: String,
    /// IDs of the subnets on this network
    #[serde(default)]
    pub subnets: Vec<String>,
    /// Owner of the network
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct NetworkList {
    pub networks: Vec<Network>,
}

/// Neutron subnet
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Subnet {
    /// ID of the subnet
    pub id: String,
    /// Name of the subnet
    #[serde(default)]
    pub name: String,
    /// Network of the subnet
    pub network_id: String,
    /// Address range
    #[serde(default)]
    pub cidr: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct SubnetList {
    pub subnets: Vec<Subnet>,
}

/// Query parameters for listing subnets. Unset fields do not filter.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubnetFilter {
    /// Only subnets with this ID
    pub id: Option<String>,
    /// Only subnets with this name
    pub name: Option<String>,
    /// Only subnets on this network
    pub network_id: Option<String>,
}

impl SubnetFilter {
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(id) = self.id.as_deref() {
            pairs.push(("id", id));
        }
        if let Some(name) = self.name.as_deref() {
            pairs.push(("name", name));
        }
        if let Some(network_id) = self.network_id.as_deref() {
            pairs.push(("network_id", network_id));
        }
        pairs
    }
}

/// Fixed IP of a port
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FixedIp {
    /// Subnet the address is taken from
    pub subnet_id: String,
    /// The address itself. If unset on creation, Neutron picks one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// Request to create a new port
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PortSpec {
    /// Name of the port
    pub name: String,
    /// Owner of the port
    pub tenant_id: String,
    /// Network of the port
    pub network_id: String,
    /// Administrative state
    pub admin_state_up: bool,
    /// Addresses of the port
    pub fixed_ips: Vec<FixedIp>,
    /// Security groups. Empty disables the default group.
    pub security_groups: Vec<String>,
    /// Device the port is bound to
    pub device_id: String,
    /// Owner of the bound device
    pub device_owner: String,
}

#[derive(Debug, Serialize, Clone)]
pub(crate) struct PortRequest<'a> {
    pub port: &'a PortSpec,
}

/// Neutron port
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Port {
    /// ID of the port
    pub id: String,
    /// Name of the port
    #[serde(default)]
    pub name: String,
    /// Network of the port
    pub network_id: String,
    /// Addresses of the port
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
    /// MAC address assigned by Neutron
    #[serde(default)]
    pub mac_address: Option<String>,
    /// Status of the port (DOWN, ACTIVE, ...)
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct PortResponse {
    pub port: Port,
}

/// Extract the message out of an error body. Nova wraps it as `{"itemNotFound": {"message": ..}}`,
/// Neutron as `{"NeutronError": {"message": ..}}`. Anything else is returned as is.
pub(crate) fn fault_message(body: &str) -> String {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return body.trim().to_string(),
    };
    value
        .as_object()
        .and_then(|o| o.values().next())
        .and_then(|inner| inner.get("message"))
        .and_then(|m| m.as_str())
        .map(|m| m.to_string())
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    const AUTH_RESPONSE: &str = r#"{
        "access": {
            "token": {"id": "tok-1", "expires": "2030-01-01T00:00:00Z"},
            "serviceCatalog": [
                {"type": "compute", "name": "nova", "endpoints": [
                    {"region": "RegionOne",
                     "publicURL": "http://ctl:8774/v2/abc",
                     "internalURL": "http://10.0.0.1:8774/v2/abc",
                     "adminURL": "http://10.0.0.1:8774/v2/abc"},
                    {"region": "RegionTwo",
                     "publicURL": "http://ctl2:8774/v2/abc"}
                ]},
                {"type": "network", "name": "neutron", "endpoints": [
                    {"region": "RegionOne", "publicURL": "http://ctl:9696/"}
                ]}
            ]
        }
    }"#;

    #[test]
    fn parse_auth_response() {
        let auth: AuthResponse = serde_json::from_str(AUTH_RESPONSE).unwrap();
        assert_eq!(auth.access.token.id, "tok-1");
        assert_eq!(auth.access.service_catalog.len(), 2);
    }

    #[test]
    fn endpoint_selection() {
        let access = serde_json::from_str::<AuthResponse>(AUTH_RESPONSE).unwrap().access;
        assert_eq!(
            access.endpoint("compute", Interface::Public, None).unwrap(),
            "http://ctl:8774/v2/abc"
        );
        assert_eq!(
            access.endpoint("compute", Interface::Internal, None).unwrap(),
            "http://10.0.0.1:8774/v2/abc"
        );
        assert_eq!(
            access.endpoint("compute", Interface::Public, Some("RegionTwo")).unwrap(),
            "http://ctl2:8774/v2/abc"
        );
        // trailing slash is removed
        assert_eq!(access.endpoint("network", Interface::Public, None).unwrap(), "http://ctl:9696");
        assert!(matches!(
            access.endpoint("network", Interface::Admin, None),
            Err(Error::MissingEndpoint(_))
        ));
        assert!(matches!(
            access.endpoint("image", Interface::Public, None),
            Err(Error::MissingEndpoint(_))
        ));
    }

    #[test]
    fn server_spec_json() {
        let spec = ServerSpec::new("_CSR_r1", "img", "flv").with_port("p1");
        let json = serde_json::to_value(&ServerRequest { server: &spec }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"server": {
                "name": "_CSR_r1",
                "imageRef": "img",
                "flavorRef": "flv",
                "networks": [{"port": "p1"}]
            }})
        );
        // no networks key without ports
        let json = serde_json::to_value(&ServerSpec::new("a", "b", "c")).unwrap();
        assert!(json.get("networks").is_none());
    }

    #[test]
    fn server_status() {
        let server: Server =
            serde_json::from_str(r#"{"id": "abc", "name": "_CSR_r1", "status": "ACTIVE"}"#).unwrap();
        assert!(server.status.unwrap().is_active());
        let server: Server =
            serde_json::from_str(r#"{"id": "abc", "name": "x", "status": "HARD_REBOOT"}"#).unwrap();
        assert_eq!(server.status, Some(ServerStatus::Other));
        // create responses only carry the id
        let server: Server = serde_json::from_str(r#"{"id": "abc", "adminPass": "pw"}"#).unwrap();
        assert_eq!(server.name, "");
        assert_eq!(server.status, None);
    }

    #[test]
    fn port_spec_json() {
        let spec = PortSpec {
            name: "_CSR_mgmt_port_r1".to_string(),
            tenant_id: "t1".to_string(),
            network_id: "net".to_string(),
            admin_state_up: true,
            fixed_ips: vec![FixedIp { subnet_id: "sub".to_string(), ip_address: None }],
            security_groups: Vec::new(),
            device_id: String::new(),
            device_owner: String::new(),
        };
        let json = serde_json::to_value(&PortRequest { port: &spec }).unwrap();
        assert_eq!(json["port"]["fixed_ips"], serde_json::json!([{"subnet_id": "sub"}]));
        assert_eq!(json["port"]["security_groups"], serde_json::json!([]));
        assert_eq!(json["port"]["device_id"], "");
    }

    #[test]
    fn subnet_filter_pairs() {
        assert!(SubnetFilter::default().query_pairs().is_empty());
        let filter = SubnetFilter {
            name: Some("public-subnet".to_string()),
            network_id: Some("n1".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.query_pairs(), vec![("name", "public-subnet"), ("network_id", "n1")]);
    }

    #[test]
    fn fault_messages() {
        assert_eq!(
            fault_message(r#"{"itemNotFound": {"message": "Flavor could not be found", "code": 404}}"#),
            "Flavor could not be found"
        );
        assert_eq!(
            fault_message(r#"{"NeutronError": {"type": "PortNotFound", "message": "Port x not found"}}"#),
            "Port x not found"
        );
        assert_eq!(fault_message("  plain text\n"), "plain text");
    }
}
