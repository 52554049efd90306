//! HTTP front end mirroring the tool catalog (health, catalog, generic tool call, convenience routes).

mod server;

pub use server::{router, run_web, WebState, SERVICE_NAME};
