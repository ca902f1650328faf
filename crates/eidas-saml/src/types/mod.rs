//! eIDAS message types and data structures.

mod attribute;
mod authn_request;
mod constants;
mod loa;
mod registry;
mod response;
mod status;

pub use attribute::*;
pub use authn_request::*;
pub use constants::*;
pub use loa::*;
pub use registry::*;
pub use response::*;
pub use status::*;
