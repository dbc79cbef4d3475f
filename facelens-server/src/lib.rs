//! REST API over the FaceLens analysis store.

pub mod routes;

pub use routes::{AppState, CreateAnalysisRequest, Dimensions, router};
