//! Prompt construction for loop iterations.

mod render;
mod step;

pub use render::build_loop_prompt;
pub use step::RunStep;
