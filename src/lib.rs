// Library exports for folio
// Integration tests and the binaries build on these modules

pub mod auth;
pub mod config;
pub mod content;
pub mod context;
pub mod db;
pub mod error;
pub mod extractors;
pub mod remote;
pub mod routes;
pub mod session;
pub mod site;
pub mod state;
pub mod sync;
