pub mod filing_ctx;
pub mod filing_pipeline;

pub use filing_ctx::FilingCtx;
pub use filing_pipeline::FilingPipeline;
