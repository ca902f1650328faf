//! End-to-end tests of the node's HTTP surface.
//!
//! Each test serves a fresh node on an ephemeral port with the fixture
//! credentials and drives it with `reqwest`.

mod common;
mod service_provider;
