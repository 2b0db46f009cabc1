use thiserror::Error;

pub type Result<T> = std::result::Result<T, DevMetricsError>;

#[derive(Error, Debug)]
pub enum DevMetricsError {
    #[error("Invalid snapshot data: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("Invalid parameter: {0}")]
    Parameter(String),
    #[error("{operation}: {source}")]
    Storage {
        operation: String,
        #[source]
        source: Box<DevMetricsError>,
    },
    #[error("Store error: {0}")]
    Store(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Git repository error: {0}")]
    GitRepo(String),
    #[error("Git error: {0}")]
    Git(#[from] Box<gix::open::Error>),
    #[error("Git discover error: {0}")]
    GitDiscover(#[from] Box<gix::discover::Error>),
    #[error("Object find error: {0}")]
    ObjectFind(#[from] Box<gix::object::find::existing::Error>),
    #[error("Object find with conversion error: {0}")]
    ObjectFindConv(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Object decode error: {0}")]
    ObjectDecode(#[from] Box<gix::objs::decode::Error>),
    #[error("Commit error: {0}")]
    Commit(#[from] Box<gix::object::commit::Error>),
    #[error("Reference find error: {0}")]
    RefFind(#[from] Box<gix::reference::find::existing::Error>),
    #[error("Head peel error: {0}")]
    HeadPeel(#[from] Box<gix::head::peel::to_commit::Error>),
    #[error("Diff tree to tree error: {0}")]
    DiffTreeToTree(#[from] Box<gix::repository::diff_tree_to_tree::Error>),
}

impl DevMetricsError {
    /// Wraps a lower-level failure with the name of the operation that hit it.
    pub fn storage(operation: impl Into<String>, source: DevMetricsError) -> Self {
        DevMetricsError::Storage {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DevMetricsError::Validation(_))
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self, DevMetricsError::Parameter(_))
    }
}

// gix hands back large error types; box them on the way in.
macro_rules! boxed_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for DevMetricsError {
                fn from(err: $ty) -> Self {
                    DevMetricsError::$variant(Box::new(err))
                }
            }
        )*
    };
}

boxed_from! {
    gix::open::Error => Git,
    gix::discover::Error => GitDiscover,
    gix::object::find::existing::Error => ObjectFind,
    gix::object::find::existing::with_conversion::Error => ObjectFindConv,
    gix::objs::decode::Error => ObjectDecode,
    gix::object::commit::Error => Commit,
    gix::reference::find::existing::Error => RefFind,
    gix::head::peel::to_commit::Error => HeadPeel,
    gix::repository::diff_tree_to_tree::Error => DiffTreeToTree,
}
