//! MCP tool server over stdio (JSON-RPC 2.0, newline-delimited).

pub mod protocol;
mod server;

pub use server::{run_stdio, McpServer, SERVER_NAME};
