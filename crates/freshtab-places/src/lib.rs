//! Link records and ranking for the new-tab grid.
//!
//! Links arrive as loosely-typed history records; [`compare_links`] defines
//! the grid ordering and rejects malformed records instead of guessing.

pub mod link;
pub mod provider;

pub use link::{compare_links, Link};
pub use provider::LinksProvider;
