//! Content-addressed cache and the links that lead into it

mod fetch;
mod layout;
mod naming;
mod paths;
mod retrieve;
mod swap;

pub use fetch::{FetchError, Fetcher, MakeFetcher, batches};
pub use layout::{ensure_dirs, ensure_primary_link};
pub use naming::{make_read_only, unique_name};
pub use paths::SymPaths;
pub use retrieve::{is_resolved, retrieve};
pub use swap::atomic_symlink_swap;

#[cfg(test)]
pub(crate) use retrieve::tests::FakeFetcher;
