//! Circuit breakers that stop an unproductive loop.
//!
//! Exit checks, highest priority first:
//! 1. permission denial (before any bookkeeping)
//! 2. confirmed completion
//! 3. missing status block
//! 4. no file changes
//! 5. repeated error
//! 6. test-only work

mod evaluator;

pub use evaluator::{COMPLETION_KEYWORDS, contains_completion_keyword, evaluate};
