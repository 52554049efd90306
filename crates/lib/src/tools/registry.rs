//! Static tool catalog: action names, descriptions and input schemas.
//!
//! The schema here is the single source of truth for required parameters; the dispatcher
//! validates every invocation against it before anything goes over the network.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

pub const SEND_MESSAGE: &str = "send_whatsapp_message";
pub const GET_CHATS: &str = "get_whatsapp_chats";
pub const GET_CHAT_DETAILS: &str = "get_chat_details";
pub const GET_CHAT_MESSAGES: &str = "get_chat_messages";
pub const GET_ALL_MESSAGES: &str = "get_all_messages";
pub const CREATE_GROUP: &str = "create_whatsapp_group";
pub const GET_CONTACT: &str = "get_contact_info";
pub const SEND_MEDIA: &str = "send_whatsapp_media";

/// JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    StringArray,
}

/// One input parameter of an action.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub enum_values: Option<&'static [&'static str]>,
    pub description: &'static str,
    /// Accepted in place of another (required) parameter, e.g. `to` for `chat_id`.
    pub alias_of: Option<&'static str>,
}

impl ParamSpec {
    fn new(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            enum_values: None,
            description,
            alias_of: None,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.enum_values = Some(values);
        self
    }

    fn alias_of(mut self, target: &'static str) -> Self {
        self.alias_of = Some(target);
        self
    }

    fn schema(&self) -> Value {
        let mut s = match self.kind {
            ParamKind::String => json!({ "type": "string" }),
            ParamKind::Integer => json!({ "type": "integer", "minimum": 1 }),
            ParamKind::StringArray => json!({ "type": "array", "items": { "type": "string" } }),
        };
        s["description"] = Value::String(self.description.to_string());
        if let Some(values) = self.enum_values {
            s["enum"] = json!(values);
        }
        s
    }
}

/// An action as advertised to clients.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

/// Wire form of a descriptor (`tools/list` item).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ActionDescriptor {
    fn aliases_for(&self, name: &str) -> impl Iterator<Item = &ParamSpec> {
        let name = name.to_string();
        self.params.iter().filter(move |p| p.alias_of == Some(name.as_str()))
    }

    /// JSON Schema object for the inputs. Required params that have aliases become an `anyOf` group.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            properties.insert(p.name.to_string(), p.schema());
        }
        let mut required = Vec::new();
        let mut any_of = Vec::new();
        for p in self.params.iter().filter(|p| p.required) {
            let aliases: Vec<&str> = self.aliases_for(p.name).map(|a| a.name).collect();
            if aliases.is_empty() {
                required.push(p.name);
            } else {
                any_of.extend(
                    std::iter::once(p.name)
                        .chain(aliases)
                        .map(|n| json!({ "required": [n] })),
                );
            }
        }
        let mut schema = json!({ "type": "object", "properties": properties });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        if !any_of.is_empty() {
            schema["anyOf"] = Value::Array(any_of);
        }
        schema
    }

    pub fn to_tool_info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: self.to_json_schema(),
        }
    }

    /// Check arguments against the schema. `null` counts as no arguments; unknown keys are ignored.
    pub fn validate(&self, arguments: &Value) -> Result<(), String> {
        let empty = Map::new();
        let args = match arguments {
            Value::Null => &empty,
            Value::Object(m) => m,
            _ => return Err("arguments must be an object".to_string()),
        };
        for p in &self.params {
            let value = args.get(p.name).filter(|v| !v.is_null());
            match value {
                Some(v) => check_value(p, v)?,
                None if p.required => {
                    let present = self
                        .aliases_for(p.name)
                        .any(|a| args.get(a.name).is_some_and(|v| !v.is_null()));
                    if !present {
                        let names: Vec<&str> = std::iter::once(p.name)
                            .chain(self.aliases_for(p.name).map(|a| a.name))
                            .collect();
                        return Err(format!("missing required parameter: {}", names.join(" or ")));
                    }
                }
                None => {}
            }
        }
        Ok(())
    }
}

fn check_value(p: &ParamSpec, v: &Value) -> Result<(), String> {
    match p.kind {
        ParamKind::String => {
            let s = scalar_string(v)
                .ok_or_else(|| format!("parameter {} must be a string", p.name))?;
            if let Some(values) = p.enum_values {
                if !values.contains(&s.as_str()) {
                    return Err(format!(
                        "parameter {} must be one of: {} (got {:?})",
                        p.name,
                        values.join(", "),
                        s
                    ));
                }
            }
            // aliases of required params must be non-empty too
            if (p.required || p.alias_of.is_some()) && s.trim().is_empty() {
                return Err(format!("parameter {} must not be empty", p.name));
            }
        }
        ParamKind::Integer => match v.as_u64() {
            Some(n) if n > 0 => {}
            _ => return Err(format!("parameter {} must be a positive integer", p.name)),
        },
        ParamKind::StringArray => {
            let items = v
                .as_array()
                .ok_or_else(|| format!("parameter {} must be an array of strings", p.name))?;
            let mut strings = Vec::with_capacity(items.len());
            for item in items {
                let s = scalar_string(item)
                    .ok_or_else(|| format!("parameter {} must be an array of strings", p.name))?;
                strings.push(s);
            }
            if strings.iter().any(|s| s.trim().is_empty()) {
                return Err(format!("parameter {} must not contain empty entries", p.name));
            }
            if p.required && items.is_empty() {
                return Err(format!("parameter {} must not be empty", p.name));
            }
        }
    }
    Ok(())
}

/// Strings as-is; numbers as their decimal text (phone numbers often arrive unquoted).
pub(crate) fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Immutable, process-wide catalog.
#[derive(Debug)]
pub struct ToolRegistry {
    actions: Vec<ActionDescriptor>,
}

impl ToolRegistry {
    /// The built-in catalog, built once on first use.
    pub fn builtin() -> &'static ToolRegistry {
        static REGISTRY: OnceLock<ToolRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| ToolRegistry {
            actions: builtin_actions(),
        })
    }

    /// Descriptors in advertised order.
    pub fn describe(&self) -> &[ActionDescriptor] {
        &self.actions
    }

    pub fn get(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn tool_infos(&self) -> Vec<ToolInfo> {
        self.actions.iter().map(ActionDescriptor::to_tool_info).collect()
    }
}

fn builtin_actions() -> Vec<ActionDescriptor> {
    vec![
        ActionDescriptor {
            name: SEND_MESSAGE,
            description: "Send a WhatsApp message to a specific chat or person",
            params: vec![
                ParamSpec::new(
                    "chat_id",
                    ParamKind::String,
                    "WhatsApp chat ID (e.g., 917060284729@c.us for individual, or 120363373936603867@g.us for group)",
                )
                .required(),
                ParamSpec::new("to", ParamKind::String, "Phone number or chat ID; alternative to chat_id")
                    .alias_of("chat_id"),
                ParamSpec::new("message", ParamKind::String, "The message content to send").required(),
            ],
        },
        ActionDescriptor {
            name: GET_CHATS,
            description: "Get all WhatsApp chats and conversations",
            params: vec![ParamSpec::new(
                "chat_type",
                ParamKind::String,
                "Filter by chat type: \"user\" for individual chats, \"group\" for group chats, or leave empty for all",
            )
            .one_of(&["user", "group"])],
        },
        ActionDescriptor {
            name: GET_CHAT_DETAILS,
            description: "Get detailed information about a specific chat",
            params: vec![
                ParamSpec::new("chat_id", ParamKind::String, "WhatsApp chat ID to get details for").required(),
            ],
        },
        ActionDescriptor {
            name: GET_CHAT_MESSAGES,
            description: "Get messages from a specific chat",
            params: vec![
                ParamSpec::new("chat_id", ParamKind::String, "WhatsApp chat ID to get messages from").required(),
                ParamSpec::new("limit", ParamKind::Integer, "Maximum number of messages to return (default 50)"),
            ],
        },
        ActionDescriptor {
            name: GET_ALL_MESSAGES,
            description: "Get all recent messages across all chats",
            params: Vec::new(),
        },
        ActionDescriptor {
            name: CREATE_GROUP,
            description: "Create a new WhatsApp group",
            params: vec![
                ParamSpec::new("name", ParamKind::String, "Name of the group to create").required(),
                ParamSpec::new(
                    "members",
                    ParamKind::StringArray,
                    "Array of phone numbers to add to the group (format: 919537851844@c.us)",
                )
                .required(),
            ],
        },
        ActionDescriptor {
            name: GET_CONTACT,
            description: "Get information about a WhatsApp contact by phone number",
            params: vec![ParamSpec::new(
                "phone_number",
                ParamKind::String,
                "Phone number (e.g., 917060284729) or contact ID (917060284729@c.us)",
            )
            .required()],
        },
        ActionDescriptor {
            name: SEND_MEDIA,
            description: "Send an image, video or document by URL to a WhatsApp chat",
            params: vec![
                ParamSpec::new("to", ParamKind::String, "Phone number or chat ID of the recipient").required(),
                ParamSpec::new("media_url", ParamKind::String, "Public URL of the media file").required(),
                ParamSpec::new("caption", ParamKind::String, "Optional caption sent with the media"),
            ],
        },
    ]
}
