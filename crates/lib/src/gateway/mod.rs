//! Messaging gateway: per-action operations over the transport adapters with endpoint fallback.
//!
//! Every operation goes structured adapter -> raw adapter at the canonical base URL ->
//! raw adapter at each alternative base URL, stopping at the first success.

pub mod fallback;
mod messaging;

pub use messaging::{ActionResult, Endpoints, GatewayError, MessagingGateway, DEFAULT_MESSAGE_LIMIT};
