//! Tag editing for a single file backed by a tmsu database.

pub mod backend;
pub mod config;
pub mod memory;
pub mod rows;
pub mod runner;
pub mod session;

pub use backend::{BackendError, BackendInfo, BackendOp, FileTag, TagBackend, Tmsu};
pub use rows::{TagRow, TagRows};
pub use session::{SessionError, TagSession};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::version;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
