pub mod auth;

pub use auth::{require_auth, restore_user, Claims, CurrentUser};
