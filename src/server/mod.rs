pub mod dto;
pub mod response;
mod router;
mod session;
mod tracking;

pub use router::{AdminCredentials, AppState, create_router};
pub use session::session_router;
pub use tracking::tracking_router;
