pub mod errors;
pub mod events;
pub mod types;

pub use errors::{BridgeError, FreshtabError, LinkError, PrefsError};
pub use events::{topic, HostEvents};
pub use types::{Visibility, WindowId};

pub type Result<T> = std::result::Result<T, FreshtabError>;
