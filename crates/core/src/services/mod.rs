//! Domain services.
//!
//! Services hold the application's use cases and depend only on the
//! port traits. Each is constructed with its explicit configuration and
//! an `Arc<dyn Repositories>`; there is no container or global wiring.

mod auth;
mod notation;
mod notification;
mod tag;
mod user;

pub use auth::{AuthConfig, AuthService};
pub use notation::{CreateNotation, NotationService};
pub use notification::{NotificationConfig, NotificationService};
pub use tag::TagService;
pub use user::UserService;
