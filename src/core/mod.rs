pub mod pipeline;
pub mod postprocess;
pub mod prompt;
pub mod structure;
