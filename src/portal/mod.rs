pub mod filing;
pub mod markup;
pub mod session;

pub use filing::FilingWorkflow;
pub use session::{classify, AuthenticatedSession, LoginStats, PortalSession, SessionSettings};
