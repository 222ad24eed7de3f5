//! Value types shared by the core pipeline and the collaborator clients.

pub mod post;
pub mod push;
pub mod verdict;

pub use post::Post;
pub use push::PushMessage;
pub use verdict::{AnalysisVerdict, VerdictPayload};
