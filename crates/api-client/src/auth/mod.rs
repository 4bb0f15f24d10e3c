//! Authentication: token storage, refresh, and coordination

pub mod coordinator;
pub mod refresher;
pub mod store;

pub use coordinator::{AuthCoordinator, TokenRefresher};
pub use refresher::HttpTokenRefresher;
pub use store::{FileTokenStore, MemoryTokenStore, TokenPair, TokenStore};
