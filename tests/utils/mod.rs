pub mod builders;
pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use builders::{day, PayloadBuilder};
#[allow(unused_imports)]
pub use mocks::{FailingSink, RecordingSink, ScriptedGameClient};
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder};
