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

//! # OpenStack Client

use crate::types::*;
use crate::{Error, Result};

use isahc::config::Configurable;
use isahc::prelude::*;
use log::*;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::thread::sleep;
use std::time::Duration;

/// Upper bound on `ClientSettings::get_retries`. Larger values are clamped.
pub const MAX_GET_RETRIES: u32 = 10;
/// Upper bound on the wait time between two attempts of a GET request
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Keystone credentials of the account managing the CSR instances
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// User name
    pub username: String,
    /// Password (called `api_key` by the legacy nova client)
    pub password: String,
    /// Keystone URL, e.g. `http://controller:5000/v2.0`
    pub auth_url: String,
    /// Project (tenant) name to scope the token to
    pub project_name: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_url", &self.auth_url)
            .field("project_name", &self.project_name)
            .finish()
    }
}

/// Settings of the HTTP connection
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// Which catalog URL to use for compute and network
    pub interface: Interface,
    /// Restrict the catalog to a region
    pub region: Option<String>,
    /// Timeout of every single request
    pub timeout: Duration,
    /// How many times a GET request is repeated after a connection failure, at most
    /// [`MAX_GET_RETRIES`]
    pub get_retries: u32,
    /// Wait time before the first retry. Doubles with every retry, up to [`MAX_RETRY_BACKOFF`].
    pub retry_backoff: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            interface: Interface::Public,
            region: None,
            timeout: Duration::from_secs(30),
            get_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    Compute,
    Network,
}

#[derive(Debug, Clone, PartialEq)]
struct Session {
    token: String,
    compute_url: String,
    network_url: String,
}

/// # OpenStack Client Handle
///
/// Holds the Keystone token together with the compute and network endpoints taken from the
/// service catalog. The token is refreshed once whenever a request is rejected with 401.
pub struct OpenStackClient {
    http: HttpClient,
    credentials: Credentials,
    settings: ClientSettings,
    session: Mutex<Session>,
}

impl fmt::Debug for OpenStackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpenStackClient({}@{})", self.credentials.username, self.credentials.auth_url)
    }
}

impl OpenStackClient {
    /// Authenticate against Keystone and create a new client
    pub fn connect(credentials: Credentials, settings: ClientSettings) -> Result<Self> {
        let http = HttpClient::builder().timeout(settings.timeout).build()?;
        let session = authenticate(&http, &credentials, &settings)?;
        info!(
            "Connected to OpenStack as {} (project {})",
            credentials.username, credentials.project_name
        );
        debug!("compute: {}, network: {}", session.compute_url, session.network_url);
        Ok(Self { http, credentials, settings, session: Mutex::new(session) })
    }

    /// Get the compute endpoint in use
    pub fn compute_url(&self) -> String {
        self.session().compute_url
    }

    /// Get the network endpoint in use
    pub fn network_url(&self) -> String {
        self.session().network_url
    }

    /// Request a new token, replacing the current one
    pub fn reauthenticate(&self) -> Result<()> {
        let session = authenticate(&self.http, &self.credentials, &self.settings)?;
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = session;
        Ok(())
    }

    /// Returns all flavors
    pub fn list_flavors(&self) -> Result<Vec<Flavor>> {
        let list: FlavorList = self.request_get(Service::Compute, "flavors/detail", &[])?;
        Ok(list.flavors)
    }

    /// Returns all images, optionally only those with the given name
    pub fn list_images(&self, name: Option<&str>) -> Result<Vec<Image>> {
        let query: Vec<(&str, &str)> = name.map(|n| ("name", n)).into_iter().collect();
        let list: ImageList = self.request_get(Service::Compute, "images/detail", &query)?;
        Ok(list.images)
    }

    /// Boot a new server. Returns as soon as Nova accepted the request.
    pub fn create_server(&self, spec: &ServerSpec) -> Result<Server> {
        let response: ServerResponse =
            self.request_post(Service::Compute, "servers", &ServerRequest { server: spec })?;
        let mut server = response.server;
        if server.name.is_empty() {
            server.name = spec.name.clone();
        }
        Ok(server)
    }

    /// Returns at most `limit` servers whose name is exactly `name`
    pub fn list_servers(&self, name: &str, limit: usize) -> Result<Vec<Server>> {
        // nova matches the name as a regular expression
        let pattern = format!("^{}$", regex::escape(name));
        let limit = limit.to_string();
        let list: ServerList = self.request_get(
            Service::Compute,
            "servers",
            &[("name", pattern.as_str()), ("limit", limit.as_str())],
        )?;
        Ok(list.servers.into_iter().filter(|s| s.name == name).collect())
    }

    /// Get the details of a single server
    pub fn get_server(&self, server_id: impl AsRef<str>) -> Result<Server> {
        let response: ServerResponse = self.request_get(
            Service::Compute,
            &format!("servers/{}", server_id.as_ref()),
            &[],
        )?;
        Ok(response.server)
    }

    /// Delete a server
    pub fn delete_server(&self, server_id: impl AsRef<str>) -> Result<()> {
        self.request_delete(Service::Compute, &format!("servers/{}", server_id.as_ref()))
    }

    /// Returns all networks, optionally only those with the given name
    pub fn list_networks(&self, name: Option<&str>) -> Result<Vec<Network>> {
        let query: Vec<(&str, &str)> = name.map(|n| ("name", n)).into_iter().collect();
        let list: NetworkList = self.request_get(Service::Network, "networks", &query)?;
        Ok(list.networks)
    }

    /// Returns all subnets matching the filter
    pub fn list_subnets(&self, filter: &SubnetFilter) -> Result<Vec<Subnet>> {
        let list: SubnetList =
            self.request_get(Service::Network, "subnets", &filter.query_pairs())?;
        Ok(list.subnets)
    }

    /// Create a new port
    pub fn create_port(&self, spec: &PortSpec) -> Result<Port> {
        let response: PortResponse =
            self.request_post(Service::Network, "ports", &PortRequest { port: spec })?;
        Ok(response.port)
    }

    /// Delete a port
    pub fn delete_port(&self, port_id: impl AsRef<str>) -> Result<()> {
        self.request_delete(Service::Network, &format!("ports/{}", port_id.as_ref()))
    }

    fn session(&self) -> Session {
        self.session.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn request_get<T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let retries = self.settings.get_retries.min(MAX_GET_RETRIES);
        let mut attempt: u32 = 0;
        loop {
            match self.send("GET", service, path, query, None) {
                Err(Error::HTTPError(e)) if attempt < retries => {
                    let backoff = retry_delay(self.settings.retry_backoff, attempt);
                    warn!("GET {} failed: {}. Retrying in {:?}", path, e, backoff);
                    sleep(backoff);
                    attempt += 1;
                }
                result => return Ok(serde_json::from_str(&result?)?),
            }
        }
    }

    fn request_post<B: Serialize, T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let data = serde_json::to_string(body)?;
        Ok(serde_json::from_str(&self.send("POST", service, path, &[], Some(data))?)?)
    }

    fn request_delete(&self, service: Service, path: &str) -> Result<()> {
        self.send("DELETE", service, path, &[], None)?;
        Ok(())
    }

    fn send(
        &self,
        method: &str,
        service: Service,
        path: &str,
        query: &[(&str, &str)],
        data: Option<String>,
    ) -> Result<String> {
        match self.send_once(method, service, path, query, data.clone()) {
            Err(Error::Unauthorized(message)) => {
                debug!("Token rejected ({}), authenticating again", message);
                self.reauthenticate()?;
                self.send_once(method, service, path, query, data)
            }
            result => result,
        }
    }

    fn send_once(
        &self,
        method: &str,
        service: Service,
        path: &str,
        query: &[(&str, &str)],
        data: Option<String>,
    ) -> Result<String> {
        let session = self.session();
        let base = match service {
            Service::Compute => &session.compute_url,
            Service::Network => &session.network_url,
        };
        let url = build_url(base, path, query)?;
        debug!("{} {}", method, url);
        let builder = Request::builder()
            .method(method)
            .uri(url.as_str())
            .header("X-Auth-Token", session.token.as_str())
            .header("Accept", "application/json");
        let request = match data {
            Some(data) => builder.header("Content-Type", "application/json").body(Body::from(data))?,
            None => builder.body(Body::empty())?,
        };
        let mut response = self.http.send(request)?;
        let status = response.status().as_u16();
        handle_response(status, response.text()?)
    }
}

/// Exponential backoff, clamped to [`MAX_RETRY_BACKOFF`].
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_RETRY_BACKOFF, |delay| delay.min(MAX_RETRY_BACKOFF))
}

fn authenticate(
    http: &HttpClient,
    credentials: &Credentials,
    settings: &ClientSettings,
) -> Result<Session> {
    let url = Url::parse(&format!("{}/tokens", identity_base(&credentials.auth_url)?))?;
    let body = serde_json::to_string(&AuthRequest {
        auth: AuthBody {
            tenant_name: &credentials.project_name,
            password_credentials: PasswordCredentials {
                username: &credentials.username,
                password: &credentials.password,
            },
        },
    })?;
    debug!("POST {}", url);
    let request = Request::post(url.as_str())
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .body(Body::from(body))?;
    let mut response = http.send(request)?;
    let status = response.status().as_u16();
    let auth: AuthResponse = serde_json::from_str(&handle_response(status, response.text()?)?)?;
    let region = settings.region.as_deref();
    let compute_url = auth.access.endpoint("compute", settings.interface, region)?;
    let network_url = network_base(&auth.access.endpoint("network", settings.interface, region)?);
    Ok(Session { token: auth.access.token.id, compute_url, network_url })
}

/// Normalize the Keystone URL to its v2.0 root. URLs without a version get `/v2.0` appended.
fn identity_base(auth_url: &str) -> Result<String> {
    let trimmed = auth_url.trim_end_matches('/');
    let version_re = Regex::new(r"/v\d+(\.\d+)?$").unwrap();
    match version_re.find(trimmed) {
        Some(m) if m.as_str() == "/v2.0" => Ok(trimmed.to_string()),
        Some(_) => Err(Error::UnsupportedIdentityVersion(auth_url.to_string())),
        None => Ok(format!("{}/v2.0", trimmed)),
    }
}

/// Neutron registers its endpoint without the API version.
fn network_base(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    if trimmed.ends_with("/v2.0") {
        trimmed.to_string()
    } else {
        format!("{}/v2.0", trimmed)
    }
}

fn build_url(base: &str, path: &str, query: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/{}", base, path))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    Ok(url)
}

fn handle_response(status: u16, body: String) -> Result<String> {
    match status {
        200..=299 => Ok(body),
        401 => Err(Error::Unauthorized(fault_message(&body))),
        403 => Err(Error::Forbidden(fault_message(&body))),
        404 => Err(Error::NotFound(fault_message(&body))),
        400 | 409 | 413 | 422 => Err(Error::BadRequest(status, fault_message(&body))),
        _ => Err(Error::ResponseError(status, body)),
    }
}
