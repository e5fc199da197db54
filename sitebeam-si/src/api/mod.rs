//! HTTP API handlers for sitebeam-si

pub mod elements;
pub mod health;
pub mod imports;
pub mod maintenance;
pub mod sse;

pub use elements::element_routes;
pub use health::health_routes;
pub use imports::import_routes;
pub use maintenance::maintenance_routes;
pub use sse::event_stream;
