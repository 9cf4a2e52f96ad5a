//! Internal test modules - whitebox tests with crate access
//!
//! Scenarios and properties that drive the engine through the headless host
//! and inspect the document it writes.
