// Common test utilities and fixtures

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items
// Note: These may appear unused in some test binaries
#[allow(unused_imports)]
pub use fixtures::DropDir;
#[allow(unused_imports)]
pub use helpers::{
    counting_stages, create_test_services, run_backlog, stub_stages, test_config, CountingLoader,
    FailingTransformer, RecordingSink, StubExtractor,
};
