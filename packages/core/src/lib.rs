// Library root: shared by the `weather-api` and `email-worker` binaries and
// by the integration tests in `tests/`.

pub mod api;
pub mod cache;
pub mod db;
pub mod error;
pub mod notification;
pub mod queue;
pub mod repository;
pub mod services;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

// Process bootstrap only.
pub mod cli;
pub mod config;
pub mod logging;
