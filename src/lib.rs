//! Client core for the study-abroad portal dashboard.
//!
//! DESIGN
//! ======
//! The crate is the non-visual half of the dashboard: who is signed in, how
//! requests reach the backend, and the state behind the cities screen.
//!
//! - [`storage`]: key/value credential storage shared between instances,
//!   with change notifications.
//! - [`http`]: the single request client. Attaches the bearer token and
//!   performs at most one silent refresh-and-retry on a 401.
//! - [`session`]: the session store plus route guard and sign-in decisions.
//! - [`cities`]: city CRUD and the list screen model.
//! - [`context`]: the application root that wires everything together.
//!
//! Rendering is left to the embedding application; the `portal` CLI is one
//! such application.

pub mod cities;
pub mod config;
pub mod context;
pub mod http;
pub mod navigation;
pub mod session;
pub mod storage;

#[cfg(test)]
mod test_helpers;

pub use config::PortalConfig;
pub use context::AppContext;
pub use http::{ApiClient, ApiError};
pub use navigation::{Navigator, RecordingNavigator, TracingNavigator};
pub use session::{SessionSnapshot, SessionStore};
