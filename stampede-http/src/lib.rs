//! HTTP request driver for Stampede
//!
//! Virtual users share one pooled client. Each call to
//! [`RequestDriver::execute`] issues a single request and turns whatever
//! happens into a [`stampede_core::LoadTestResult`]; request-level failures
//! never surface as errors.

pub mod client;
pub mod driver;
pub mod errors;
pub mod request;

pub use client::build_client;
pub use driver::{HttpDriver, RequestDriver};
pub use errors::HttpError;
pub use request::{to_reqwest_method, PreparedRequest};
