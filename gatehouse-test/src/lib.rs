mod app;
mod strategy;

pub use app::{TestApp, TestRequest, TestResponse};
pub use strategy::{CountingResourceStrategy, StaticControlStrategy, TestIdentity};
