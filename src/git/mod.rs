pub mod repo;

pub use repo::{GitRepo, DEFAULT_COMMIT_LIMIT};
