//! Lifecycle test suites run against a temporary deployment.

mod support;
