//! Authenticated CRUD access to the microservice API.
//!
//! Every call reads the current token from the [`TokenStore`]. The client
//! never authenticates on its own: with no usable token it fails with
//! [`ResourceError::NoToken`] before touching the network.
//!
//! URLs are `{api_base_url}/v1/{service}/{collection}[/{id}]`. Ids are pushed
//! as a single percent-encoded path segment.

use crate::config::{trim_base_url, ClientConfig};
use crate::error::TokenError;
use crate::token_store::TokenStore;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// API version prefix shared by every service.
pub const API_VERSION: &str = "v1";

/// Error bodies longer than this are truncated before they reach an error.
const MAX_ERROR_BODY_LEN: usize = 256;

/// Remote resource collections, grouped by owning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    // contacts
    Activities,
    Addresses,
    Customers,
    Groups,
    Providers,
    // ecommerces
    Stores,
    // inventory
    Categories,
    Catalogues,
    Products,
    // oauth2
    Organizations,
    Members,
    Users,
    // ubications
    Ubications,
    // billing
    Invoices,
    Orders,
    // notifications
    Push,
}

impl Resource {
    /// Every collection, in declaration order.
    pub const ALL: [Resource; 16] = [
        Resource::Activities,
        Resource::Addresses,
        Resource::Customers,
        Resource::Groups,
        Resource::Providers,
        Resource::Stores,
        Resource::Categories,
        Resource::Catalogues,
        Resource::Products,
        Resource::Organizations,
        Resource::Members,
        Resource::Users,
        Resource::Ubications,
        Resource::Invoices,
        Resource::Orders,
        Resource::Push,
    ];

    /// Collection path below the API version, service first.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Resource::Activities => "contacts/activities",
            Resource::Addresses => "contacts/addresses",
            Resource::Customers => "contacts/customers",
            Resource::Groups => "contacts/groups",
            Resource::Providers => "contacts/providers",
            Resource::Stores => "ecommerces/stores",
            Resource::Categories => "inventory/categories",
            Resource::Catalogues => "inventory/catalogues",
            Resource::Products => "inventory/products",
            Resource::Organizations => "oauth2/organizations",
            Resource::Members => "oauth2/organizations/members",
            Resource::Users => "oauth2/users",
            Resource::Ubications => "ubications/ubications",
            // Billing collections are mounted under their own name.
            Resource::Invoices => "invoices/invoices",
            Resource::Orders => "orders/orders",
            Resource::Push => "notifications/push",
        }
    }

    /// Singular label used in error messages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Resource::Activities => "Activity",
            Resource::Addresses => "Address",
            Resource::Customers => "Customer",
            Resource::Groups => "Group",
            Resource::Providers => "Provider",
            Resource::Stores => "Store",
            Resource::Categories => "Category",
            Resource::Catalogues => "Catalogue",
            Resource::Products => "Product",
            Resource::Organizations => "Organization",
            Resource::Members => "Member",
            Resource::Users => "User",
            Resource::Ubications => "Ubication",
            Resource::Invoices => "Invoice",
            Resource::Orders => "Order",
            Resource::Push => "Push notification",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("No valid access token is available")]
    NoToken,

    #[error("{} ID is required", .0.label())]
    MissingId(Resource),

    #[error("Invalid {} ID: {id:?}", .resource.label())]
    InvalidId { resource: Resource, id: String },

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Response body could not be decoded: {0}")]
    Decode(String),
}

/// Shape of a structured error body, when the API sends one.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// CRUD client over `{api_base_url}/v1/{resource path}`.
pub struct ResourceClient {
    http_client: Client,
    base_url: Url,
    store: Arc<dyn TokenStore>,
}

impl fmt::Debug for ResourceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ResourceClient {
    /// Create a client reading tokens from `store`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if `base_url` is not an absolute
    /// http(s) URL or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        store: Arc<dyn TokenStore>,
        http_timeout: Duration,
    ) -> Result<Self, TokenError> {
        let base_url = Url::parse(&trim_base_url(base_url))
            .map_err(|e| TokenError::Configuration(format!("Invalid API base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TokenError::Configuration(format!(
                "Invalid API base URL: {base_url}"
            )));
        }

        let http_client = Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| TokenError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
            store,
        })
    }

    /// Create a client from the SDK configuration.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self, TokenError> {
        Self::new(&config.api_base_url, store, config.http_timeout)
    }

    #[must_use]
    pub fn collection_url(&self, resource: Resource) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(API_VERSION)
                .extend(resource.path().split('/'));
        }
        url
    }

    /// URL of one item. The id becomes exactly one path segment.
    ///
    /// # Errors
    ///
    /// - `ResourceError::MissingId` if `id` is blank
    /// - `ResourceError::InvalidId` if `id` is a `.` or `..` segment
    pub fn item_url(&self, resource: Resource, id: &str) -> Result<Url, ResourceError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ResourceError::MissingId(resource));
        }
        if id == "." || id == ".." {
            return Err(ResourceError::InvalidId {
                resource,
                id: id.to_string(),
            });
        }

        let mut url = self.collection_url(resource);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        Ok(url)
    }

    /// `GET /v1/{resource}/{id}`
    ///
    /// # Errors
    ///
    /// See [`ResourceError`].
    #[instrument(skip_all, fields(resource = %resource))]
    pub async fn get<T: DeserializeOwned>(
        &self,
        resource: Resource,
        id: &str,
    ) -> Result<T, ResourceError> {
        let request = self.request(Method::GET, self.item_url(resource, id)?)?;
        decode(check(request.send().await?).await?).await
    }

    /// `GET /v1/{resource}`
    ///
    /// # Errors
    ///
    /// See [`ResourceError`].
    #[instrument(skip_all, fields(resource = %resource))]
    pub async fn list<T: DeserializeOwned>(&self, resource: Resource) -> Result<Vec<T>, ResourceError> {
        let request = self.request(Method::GET, self.collection_url(resource))?;
        decode(check(request.send().await?).await?).await
    }

    /// `POST /v1/{resource}` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ResourceError`].
    #[instrument(skip_all, fields(resource = %resource))]
    pub async fn add<B, T>(&self, resource: Resource, body: &B) -> Result<T, ResourceError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST, self.collection_url(resource))?
            .json(body);
        decode(check(request.send().await?).await?).await
    }

    /// `PUT /v1/{resource}/{id}` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ResourceError`].
    #[instrument(skip_all, fields(resource = %resource))]
    pub async fn update<B, T>(&self, resource: Resource, id: &str, body: &B) -> Result<T, ResourceError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::PUT, self.item_url(resource, id)?)?
            .json(body);
        decode(check(request.send().await?).await?).await
    }

    /// `DELETE /v1/{resource}/{id}`. Any response body is ignored.
    ///
    /// # Errors
    ///
    /// See [`ResourceError`].
    #[instrument(skip_all, fields(resource = %resource))]
    pub async fn remove(&self, resource: Resource, id: &str) -> Result<(), ResourceError> {
        let request = self.request(Method::DELETE, self.item_url(resource, id)?)?;
        check(request.send().await?).await?;
        Ok(())
    }

    /// Start a request carrying the current bearer token.
    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, ResourceError> {
        let token = self.store.get().ok_or(ResourceError::NoToken)?;

        debug!(target: "auth_client.resources", method = %method, url = %url, "Sending resource request");

        Ok(self
            .http_client
            .request(method, url)
            .header("Authorization", token.authorization_header()))
    }
}

/// Turn a non-2xx response into `ResourceError::Status`.
async fn check(response: Response) -> Result<Response, ResourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or_else(|_| truncate(&body));

    debug!(
        target: "auth_client.resources",
        status = status.as_u16(),
        "Resource request failed"
    );

    Err(ResourceError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ResourceError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ResourceError::Decode(e.to_string()))
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated]", body.get(..end).unwrap_or_default())
}
