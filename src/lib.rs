//! `cds-webapi` sends requests to the Dataverse / Common Data Service Web
//! API (`{url}/api/data/v{version}/`).
//!
//! [`RequestDispatcher::send`] attaches the OData headers and a bearer token
//! from a [`TokenProvider`], retries requests rejected by service protection
//! limits (HTTP 429) and turns error responses into [`ServiceError`].
//! Record helpers built on it:
//! - [`RequestDispatcher::post_create`]
//! - [`RequestDispatcher::get`]
//! - [`RequestDispatcher::patch`]
//! - [`RequestDispatcher::delete`]

mod client;
mod config;
mod error;
mod operations;
mod request;
mod response;
pub mod retry;
mod token;
mod translate;
pub mod transport;
mod wire;

pub use client::RequestDispatcher;
pub use config::{ServiceConfig, DEFAULT_AUTHORITY, DEFAULT_VERSION};
pub use error::{ServiceError, WebApiError};
pub use operations::ExtraHeaders;
pub use request::OutboundRequest;
pub use response::{CompletionMode, Response, ODATA_ENTITY_ID};
pub use token::{StaticToken, TokenProvider};
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, WebApiError>;
