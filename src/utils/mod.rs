pub mod logging;

pub use logging::FilingStats;
