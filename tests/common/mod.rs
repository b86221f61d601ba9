#![allow(dead_code)]

pub use mcpshare_test_utils::builders;
pub use mcpshare_test_utils::fake_executor;
pub use mcpshare_test_utils::{init_tracing, with_timeout};
