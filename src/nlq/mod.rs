pub mod extract;
pub mod guard;
pub mod interpret;
pub mod outcome;
pub mod pipeline;
pub mod prompts;

pub use pipeline::{AnswerPackage, AnswerStatus, QueryPipeline};
