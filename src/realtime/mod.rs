mod events_sse;
mod socket;

pub use events_sse::events_sse;
pub use socket::websocket_handler;
