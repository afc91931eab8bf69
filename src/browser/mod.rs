pub mod downloads;
pub mod headless;

pub use headless::BrowserSession;
