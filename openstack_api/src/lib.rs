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

//! # OpenStack API
//!
//! This is a very simple crate to interact with an OpenStack cloud, authenticating against
//! Keystone (v2.0), and creating or deleting servers (Nova) and ports (Neutron).
//!
//! ```no_run
//! use openstack_api::{ClientSettings, Credentials, OpenStackClient, ServerSpec};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials {
//!         username: "admin".to_string(),
//!         password: "secret".to_string(),
//!         auth_url: "http://controller:5000/v2.0".to_string(),
//!         project_name: "csr".to_string(),
//!     };
//!     // authenticate and read the service catalog
//!     let client = OpenStackClient::connect(credentials, ClientSettings::default())?;
//!
//!     // get the flavor and the image
//!     let flavor = client
//!         .list_flavors()?
//!         .into_iter()
//!         .find(|f| f.name == "m1.small")
//!         .unwrap();
//!     let image = client.list_images(Some("cirros"))?.remove(0);
//!
//!     // boot the server
//!     let server = client.create_server(&ServerSpec::new("test", &image.id, &flavor.id))?;
//!
//!     // and remove it again
//!     client.delete_server(&server.id)?;
//!     Ok(())
//! }
//! ```
#![deny(missing_docs)]

mod client;
mod types;
pub use client::{
    ClientSettings, Credentials, OpenStackClient, MAX_GET_RETRIES, MAX_RETRY_BACKOFF,
};
pub use types::*;

use thiserror::Error;

/// # OpenStack Error type
#[derive(Debug, Error)]
pub enum Error {
    /// Error during handling of the HTTP request
    #[allow(clippy::upper_case_acronyms)]
    #[error("HTTP Error: {0}")]
    HTTPError(#[from] isahc::Error),
    /// The HTTP request could not be assembled
    #[error("Invalid HTTP request: {0}")]
    InvalidRequest(#[from] isahc::http::Error),
    /// An endpoint or the authentication URL cannot be parsed
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
    /// Cannot deserialize the response
    #[error("Cannot parse JSON response: {0}")]
    JsonError(#[from] serde_json::error::Error),
    /// IO Error
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
    /// Keystone refused the credentials, or the token was rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The token is valid, but the request is not allowed (e.g., a quota is exceeded)
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),
    /// The API rejected the request as malformed or conflicting
    #[error("Bad request ({0}): {1}")]
    BadRequest(u16, String),
    /// HTTP Response Error
    #[error("HTTP Response Error: {0}. Message:\n{1}")]
    ResponseError(u16, String),
    /// The service catalog contains no usable endpoint for the service type
    #[error("No usable {0} endpoint in the service catalog")]
    MissingEndpoint(String),
    /// The authentication URL points to an identity API other than v2.0
    #[error("Unsupported identity API version: {0}")]
    UnsupportedIdentityVersion(String),
}

impl Error {
    /// Returns true if the cloud could not be reached, or refused to authenticate us.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::HTTPError(_)
                | Self::IoError(_)
                | Self::Unauthorized(_)
                | Self::MissingEndpoint(_)
                | Self::UnsupportedIdentityVersion(_)
        )
    }

    /// Returns true if the API answered with 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if the API rejected the request itself
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest(_, _) | Self::InvalidRequest(_))
    }
}

/// OpenStack Result type
type Result<T> = core::result::Result<T, Error>;
