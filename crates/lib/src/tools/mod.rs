//! Tool layer: the static action catalog plus the dispatcher that runs invocations against the gateway.

mod dispatcher;
mod registry;

pub use dispatcher::{
    error_envelope, ContentBlock, DispatchError, Dispatcher, Invocation, ResultEnvelope, ToolOutput,
};
pub use registry::{
    ActionDescriptor, ParamKind, ParamSpec, ToolInfo, ToolRegistry, CREATE_GROUP, GET_ALL_MESSAGES,
    GET_CHATS, GET_CHAT_DETAILS, GET_CHAT_MESSAGES, GET_CONTACT, SEND_MEDIA, SEND_MESSAGE,
};
