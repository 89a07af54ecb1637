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

use super::fake_cloud::*;
use crate::config::{ConfigError, PortRole, PortSettings, PortsConfig, SubnetPolicy};
use crate::port_manager::{port_spec, PortManager};
use crate::{Error, ResourceKind};

use openstack_api::{FixedIp, PortSpec, SubnetFilter};
use std::net::IpAddr;

fn created_ports(cloud: &FakeCloud) -> Vec<PortSpec> {
    cloud
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::CreatePort(spec) => Some(spec),
            _ => None,
        })
        .collect()
}

#[test]
fn management_port_with_defaults() {
    let cloud = FakeCloud::new();
    let manager = PortManager::new(&cloud, PortsConfig::default());
    let port = manager.create_management_port("r1", "tenant-1").unwrap();
    assert_eq!(port.name, "_CSR_mgmt_port_r1");
    assert_eq!(
        cloud.calls()[..2],
        [
            Call::FindNetworks("public".to_string()),
            Call::FindSubnets(SubnetFilter {
                network_id: Some("net-public".to_string()),
                ..Default::default()
            }),
        ]
    );
    let spec = created_ports(&cloud).remove(0);
    assert_eq!(spec.network_id, "net-public");
    assert_eq!(spec.tenant_id, "tenant-1");
    assert_eq!(
        spec.fixed_ips,
        vec![FixedIp { subnet_id: "sub-public".to_string(), ip_address: None }]
    );
    assert!(spec.security_groups.is_empty());
    assert_eq!(spec.device_id, "");
    assert_eq!(spec.device_owner, "");
    assert!(spec.admin_state_up);
}

#[test]
fn port_exactly_as_configured() {
    let cloud = FakeCloud::new();
    let ip: IpAddr = "172.24.4.100".parse().unwrap();
    let ports = PortsConfig {
        egress: Some(PortSettings {
            network: "public".to_string(),
            subnet: SubnetPolicy::Id("0c2ae3bd-26d7-44fa-bd6e-34f4521f7a5b".to_string()),
            ip_address: Some(ip),
        }),
        ..Default::default()
    };
    let manager = PortManager::new(&cloud, ports);
    manager.create_egress_port("r1", "tenant-1").unwrap();
    // the subnet ID is used as is
    assert_eq!(cloud.count(|c| matches!(c, Call::FindSubnets(_))), 0);
    assert_eq!(
        created_ports(&cloud),
        vec![PortSpec {
            name: "_CSR_egress_port_r1".to_string(),
            tenant_id: "tenant-1".to_string(),
            network_id: "net-public".to_string(),
            admin_state_up: true,
            fixed_ips: vec![FixedIp {
                subnet_id: "0c2ae3bd-26d7-44fa-bd6e-34f4521f7a5b".to_string(),
                ip_address: Some("172.24.4.100".to_string()),
            }],
            security_groups: Vec::new(),
            device_id: String::new(),
            device_owner: String::new(),
        }]
    );
}

#[test]
fn subnet_by_name() {
    let cloud = FakeCloud::new().with(|s| {
        s.subnets.push(subnet("sub-public-2", "public-subnet-2", "net-public"));
    });
    let ports = PortsConfig {
        ingress: Some(PortSettings {
            network: "public".to_string(),
            subnet: SubnetPolicy::Name("public-subnet-2".to_string()),
            ip_address: None,
        }),
        ..Default::default()
    };
    let manager = PortManager::new(&cloud, ports);
    let port = manager.create_ingress_port("r1", "t").unwrap();
    assert_eq!(port.fixed_ips[0].subnet_id, "sub-public-2");
    assert_eq!(port.name, "_CSR_ingress_port_r1");
    assert!(cloud.calls().contains(&Call::FindSubnets(SubnetFilter {
        name: Some("public-subnet-2".to_string()),
        network_id: Some("net-public".to_string()),
        ..Default::default()
    })));
}

#[test]
fn role_without_settings() {
    let cloud = FakeCloud::new();
    let manager = PortManager::new(&cloud, PortsConfig::default());
    assert!(matches!(
        manager.create_ingress_port("r1", "t"),
        Err(Error::Config(ConfigError::MissingPortSettings(PortRole::Ingress)))
    ));
    assert!(cloud.calls().is_empty());
}

#[test]
fn missing_network() {
    let cloud = FakeCloud::new();
    let ports = PortsConfig { egress: Some(PortSettings::on_network("external")), ..Default::default() };
    let manager = PortManager::new(&cloud, ports);
    match manager.create_egress_port("r1", "t") {
        Err(Error::ResourceNotFound { kind: ResourceKind::Network, name }) => assert_eq!(name, "external"),
        r => panic!("unexpected result: {:?}", r),
    }
    assert!(created_ports(&cloud).is_empty());
}

#[test]
fn network_without_subnet() {
    let cloud = FakeCloud::new().with(|s| s.networks.push(network("net-empty", "empty")));
    let ports = PortsConfig { egress: Some(PortSettings::on_network("empty")), ..Default::default() };
    let manager = PortManager::new(&cloud, ports);
    assert!(matches!(
        manager.create_egress_port("r1", "t"),
        Err(Error::ResourceNotFound { kind: ResourceKind::Subnet, .. })
    ));
    assert!(created_ports(&cloud).is_empty());
}

#[test]
fn delete_ports() {
    let cloud = FakeCloud::new();
    let manager = PortManager::new(&cloud, PortsConfig::default());
    let port = manager.create_management_port("r1", "t").unwrap();
    manager.delete_port(&port.id).unwrap();
    assert!(cloud.state().ports.is_empty());
    match manager.delete_port(&port.id) {
        Err(Error::ResourceNotFound { kind: ResourceKind::Port, name }) => assert_eq!(name, port.id),
        r => panic!("unexpected result: {:?}", r),
    }
}

#[test]
fn create_port_rejected() {
    let cloud = FakeCloud::new();
    cloud.set_failure("create_port", Failure::BadRequest);
    let manager = PortManager::new(&cloud, PortsConfig::default());
    assert!(matches!(
        manager.create_management_port("r1", "t"),
        Err(Error::MalformedRequest(_))
    ));
}

#[test]
fn spec_without_address() {
    let spec = port_spec("p", "t", "n", "s", None);
    assert_eq!(spec.fixed_ips, vec![FixedIp { subnet_id: "s".to_string(), ip_address: None }]);
    assert!(spec.security_groups.is_empty());
    assert!(spec.device_id.is_empty() && spec.device_owner.is_empty());
}
