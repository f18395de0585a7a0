pub mod agent_handlers;
pub mod application_handlers;
pub mod auth_handlers;
pub mod follow_handlers;
pub mod job_handlers;
pub mod message_handlers;
pub mod profile_handlers;
pub mod system_handlers;

pub use agent_handlers::*;
pub use application_handlers::*;
pub use auth_handlers::*;
pub use follow_handlers::*;
pub use job_handlers::*;
pub use message_handlers::*;
pub use profile_handlers::*;
pub use system_handlers::*;
