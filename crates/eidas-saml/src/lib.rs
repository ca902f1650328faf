//! eIDAS SAML 2.0 protocol engine.
//!
//! This crate provides the protocol side of an eIDAS node:
//!
//! - **Messages** - authentication requests and responses, attributes,
//!   levels of assurance and the attribute registry
//! - **XML** - marshalling and unmarshalling of the eIDAS SAML profile
//! - **XML signature** - signing and validation with algorithm allow-lists
//!   and certificate trust
//! - **POST and Redirect bindings** - with size limits on received payloads
//! - **Metadata** - the role descriptors of federation partners
//!
//! # Architecture
//!
//! - [`types`] - Core eIDAS types and data structures
//! - [`xml`] - Reading and writing protocol messages
//! - [`signature`] - XML signature signing, validation and trust
//! - [`bindings`] - POST and Redirect binding implementations
//! - [`metadata`] - Partner metadata and its resolver
//! - [`engine`] - The engine tying the above together
//! - [`error`] - Error types for SAML operations
//!
//! # Example
//!
//! ```rust,ignore
//! use eidas_saml::{ProtocolEngine, SamlBinding};
//!
//! let (request, metadata) =
//!     engine.unmarshal_request_and_validate(&saml_request, SamlBinding::HttpPost, "CC")?;
//! ```
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [eIDAS SAML Message Format](https://ec.europa.eu/digital-building-blocks/sites/display/DIGITAL/eIDAS+eID+Profile)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod signature;
pub mod types;
pub mod xml;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use engine::ProtocolEngine;
pub use error::{SamlError, SamlResult};
pub use metadata::{MetadataResolver, ProtocolVersion, RoleDescriptor, StaticMetadataResolver};
pub use types::*;
