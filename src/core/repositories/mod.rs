pub mod agents;
pub mod applications;
pub mod follows;
pub mod jobs;
pub mod messages;
pub mod profiles;
pub mod users;

pub use agents::{AgentRepository, AgentUpsert};
pub use applications::{ApplicationRepository, NewApplication};
pub use follows::FollowRepository;
pub use jobs::{JobFilter, JobRepository, JobUpdate, NewJob};
pub use messages::MessageRepository;
pub use profiles::{ProfileFilter, ProfileRepository, ProfileUpdate};
pub use users::{IdentityUpsert, UserRepository};

pub(crate) const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// `%needle%` for a `LIKE ... ESCAPE '\'` clause, with wildcards in `needle` matched literally.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
