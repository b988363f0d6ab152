pub mod server;
pub mod types;

pub use server::{app_router, GatewayServer};
pub use types::{ApiError, ErrorBody, ReplyRequest};
