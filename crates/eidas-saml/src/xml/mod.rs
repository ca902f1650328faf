//! XML marshalling and unmarshalling of eIDAS protocol messages.

mod reader;
mod writer;

pub use reader::{parse_authn_request, parse_response, MAX_ID_LENGTH, MAX_ISSUER_LENGTH};
pub use writer::{marshal_request, marshal_response};
