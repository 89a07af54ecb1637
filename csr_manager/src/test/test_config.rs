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

use crate::config::*;
use openstack_api::{Interface, MAX_GET_RETRIES};

use maplit::hashmap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

const FULL_CONFIG: &str = r#"{
    "credentials": {
        "username": "admin",
        "password": "secret",
        "auth_url": "http://controller:5000/v2.0",
        "project_name": "csr"
    },
    "endpoint_interface": "internal",
    "region": "RegionOne",
    "request_timeout_secs": 10,
    "flavor": "medium",
    "image": "tmpl",
    "ports": {
        "management": { "network": "public", "subnet": { "name": "public-subnet" } },
        "ingress": { "network": "private" },
        "egress": { "network": "public", "subnet": { "id": "sub-1" }, "ip_address": "172.24.4.100" }
    },
    "launch_ports": ["management", "egress"],
    "port_ownership": "external",
    "state_file": "/var/lib/csr_manager/routers.json"
}"#;

fn valid_config() -> CsrConfig {
    let mut config = CsrConfig::default();
    config.credentials = CredentialsConfig {
        username: Some("admin".to_string()),
        password: Some("secret".to_string()),
        auth_url: Some("https://keystone.example.com:5000".to_string()),
        project_name: Some("csr".to_string()),
    };
    config
}

#[test]
fn empty_config_has_defaults() {
    let config = CsrConfig::from_json("{}").unwrap();
    assert_eq!(config, CsrConfig::default());
    assert_eq!(config.flavor, DEFAULT_FLAVOR);
    assert_eq!(config.image, DEFAULT_IMAGE);
    assert_eq!(config.request_timeout_secs, 30);
    assert_eq!(config.launch_ports, vec![PortRole::Management]);
    assert_eq!(config.port_ownership, PortOwnership::Owned);
    assert_eq!(config.ports.management, Some(PortSettings::on_network(DEFAULT_MANAGEMENT_NETWORK)));
    assert!(config.ports.ingress.is_none());
    assert!(config.state_file.is_none());
    // credentials are never defaulted
    assert!(matches!(config.validate(), Err(ConfigError::Missing("credentials.username"))));
}

#[test]
fn full_config() {
    let config = CsrConfig::from_json(FULL_CONFIG).unwrap();
    config.validate().unwrap();
    assert_eq!(config.endpoint_interface, Interface::Internal);
    assert_eq!(config.region.as_deref(), Some("RegionOne"));
    assert_eq!(config.flavor, "medium");
    assert_eq!(config.image, "tmpl");
    assert_eq!(
        config.ports.management,
        Some(PortSettings {
            network: "public".to_string(),
            subnet: SubnetPolicy::Name("public-subnet".to_string()),
            ip_address: None,
        })
    );
    assert_eq!(config.ports.ingress, Some(PortSettings::on_network("private")));
    assert_eq!(
        config.ports.egress,
        Some(PortSettings {
            network: "public".to_string(),
            subnet: SubnetPolicy::Id("sub-1".to_string()),
            ip_address: Some(IpAddr::V4(Ipv4Addr::new(172, 24, 4, 100))),
        })
    );
    assert_eq!(config.launch_ports, vec![PortRole::Management, PortRole::Egress]);
    assert_eq!(config.port_ownership, PortOwnership::External);
    assert_eq!(config.state_file, Some(PathBuf::from("/var/lib/csr_manager/routers.json")));
}

#[test]
fn unknown_fields_are_rejected() {
    assert!(matches!(CsrConfig::from_json(r#"{"flavour": "medium"}"#), Err(ConfigError::Json(_))));
    assert!(matches!(
        CsrConfig::from_json(r#"{"ports": {"management": {"network": "public", "fixed_ip": "1.2.3.4"}}}"#),
        Err(ConfigError::Json(_))
    ));
    assert!(matches!(
        CsrConfig::from_json(r#"{"ports": {"egress": {"network": "public", "ip_address": "not-an-ip"}}}"#),
        Err(ConfigError::Json(_))
    ));
}

#[test]
fn environment_overrides_file() {
    let mut config = CsrConfig::from_json(FULL_CONFIG).unwrap();
    let env = hashmap! {
        "OS_USERNAME" => "demo",
        "OS_PASSWORD" => "other",
        "OS_TENANT_NAME" => "tenant",
        "OS_REGION_NAME" => "RegionTwo",
    };
    config.apply_env(|key| env.get(key).map(|v| v.to_string()));
    let credentials = config.credentials().unwrap();
    assert_eq!(credentials.username, "demo");
    assert_eq!(credentials.password, "other");
    assert_eq!(credentials.auth_url, "http://controller:5000/v2.0");
    assert_eq!(credentials.project_name, "tenant");
    assert_eq!(config.region.as_deref(), Some("RegionTwo"));
}

#[test]
fn project_name_wins_over_tenant_name() {
    let mut config = CsrConfig::default();
    let env = hashmap! {
        "OS_USERNAME" => "demo",
        "OS_PASSWORD" => "secret",
        "OS_AUTH_URL" => "http://controller:5000/v2.0",
        "OS_PROJECT_NAME" => "project",
        "OS_TENANT_NAME" => "tenant",
    };
    config.apply_env(|key| env.get(key).map(|v| v.to_string()));
    config.validate().unwrap();
    assert_eq!(config.credentials().unwrap().project_name, "project");
    assert_eq!(config.region, None);
}

#[test]
fn missing_password() {
    let mut config = valid_config();
    config.credentials.password = None;
    assert!(matches!(config.validate(), Err(ConfigError::Missing("credentials.password"))));
    config.credentials.password = Some("  ".to_string());
    assert!(matches!(config.validate(), Err(ConfigError::Missing("credentials.password"))));
}

#[test]
fn invalid_values() {
    let mut config = valid_config();
    config.validate().unwrap();

    config.credentials.auth_url = Some("controller:5000".to_string());
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid { field: "credentials.auth_url", .. })
    ));

    let mut config = valid_config();
    config.request_timeout_secs = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "request_timeout_secs", .. })));

    let mut config = valid_config();
    config.get_retries = MAX_GET_RETRIES;
    config.validate().unwrap();
    config.get_retries = MAX_GET_RETRIES + 1;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "get_retries", .. })));
    config.get_retries = u32::MAX;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "get_retries", .. })));

    let mut config = valid_config();
    config.image = String::new();
    assert!(matches!(config.validate(), Err(ConfigError::Missing("image"))));

    let mut config = valid_config();
    config.ports.management = Some(PortSettings {
        network: "public".to_string(),
        subnet: SubnetPolicy::Name(String::new()),
        ip_address: None,
    });
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "ports", .. })));
}

#[test]
fn launch_ports_need_settings() {
    let mut config = valid_config();
    config.launch_ports = vec![PortRole::Management, PortRole::Ingress];
    assert!(matches!(config.validate(), Err(ConfigError::MissingPortSettings(PortRole::Ingress))));

    config.ports.ingress = Some(PortSettings::on_network("private"));
    config.validate().unwrap();

    config.launch_ports.push(PortRole::Management);
    assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "launch_ports", .. })));
}

#[test]
fn client_settings() {
    let mut config = valid_config();
    config.endpoint_interface = Interface::Admin;
    config.region = Some("RegionOne".to_string());
    config.request_timeout_secs = 5;
    config.get_retries = 0;
    let settings = config.client_settings();
    assert_eq!(settings.interface, Interface::Admin);
    assert_eq!(settings.region.as_deref(), Some("RegionOne"));
    assert_eq!(settings.timeout, Duration::from_secs(5));
    assert_eq!(settings.get_retries, 0);
}

#[test]
fn credentials_are_not_printed() {
    let config = valid_config();
    let debug = format!("{:?}", config);
    assert!(!debug.contains("secret"));
    assert!(debug.contains("admin"));
}

#[test]
fn load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("csr.json");
    fs::write(&path, FULL_CONFIG).unwrap();
    // the environment of the test process may override the credentials, but they stay complete
    let config = CsrConfig::load(&path).unwrap();
    assert_eq!(config.flavor, "medium");
    assert_eq!(config.launch_ports, vec![PortRole::Management, PortRole::Egress]);

    assert!(matches!(CsrConfig::load(dir.path().join("missing.json")), Err(ConfigError::Io(_))));
}

#[test]
fn parse_port_role() {
    assert_eq!("management".parse::<PortRole>().unwrap(), PortRole::Management);
    assert_eq!("mgmt".parse::<PortRole>().unwrap(), PortRole::Management);
    assert_eq!("Egress".parse::<PortRole>().unwrap(), PortRole::Egress);
    assert!(matches!("uplink".parse::<PortRole>(), Err(ConfigError::Invalid { field: "role", .. })));
}
