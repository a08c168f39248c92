pub mod actions;
pub mod assertions;
pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use assertions::EventAssertion;
#[allow(unused_imports)]
pub use mocks::{MockConnection, MockSpeechGateway};
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder};
