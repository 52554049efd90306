use clap::{Parser, Subcommand};
use lib::models::ChatType;
use lib::tools::{self, Dispatcher, Invocation, ResultEnvelope};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "periskope")]
#[command(about = "WhatsApp messaging through the Periskope API", long_about = None)]
struct Cli {
    /// Config file path (default: PERISKOPE_CONFIG_PATH or ~/.periskope/config.json)
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init,

    /// Send a text message to a phone number or chat id.
    Send {
        /// Phone number (e.g. 917060284729) or chat id (…@c.us / …@g.us)
        to: String,
        /// Message text
        message: String,
    },

    /// Send media by URL.
    Media {
        to: String,
        /// Public URL of the image, video or document
        url: String,
        #[arg(long)]
        caption: Option<String>,
    },

    /// List chats.
    Chats {
        /// Filter: "user" (or "individual") or "group"
        #[arg(long = "type", value_name = "TYPE")]
        chat_type: Option<String>,
    },

    /// Show messages of one chat.
    Messages {
        chat_id: String,
        /// Maximum number of messages (default 50)
        #[arg(long, short)]
        limit: Option<u64>,
    },

    /// Show recent messages across all chats.
    Recent,

    /// Show chat details.
    Chat { chat_id: String },

    /// Look up a contact.
    Contact { phone: String },

    /// Create a group.
    Group {
        name: String,
        /// Member phone numbers or chat ids
        #[arg(required = true)]
        members: Vec<String>,
    },

    /// Run tool commands from a prompt.
    Interactive,

    /// List the tool catalog with input schemas.
    Tools,

    /// Serve the tools over MCP (JSON-RPC on stdin/stdout).
    Mcp,

    /// Run the HTTP front end.
    Serve {
        /// Port (default from PORT, config, or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("periskope {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init) => run_init(config),
        Some(Commands::Tools) => run_tools(),
        Some(Commands::Mcp) => run_mcp(config).await,
        Some(Commands::Serve { port }) => run_serve(config, port).await,
        Some(Commands::Interactive) => run_interactive(config).await,
        Some(command) => match invocation_for(command) {
            Some(invocation) => run_once(config, invocation).await,
            None => Ok(()),
        },
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Map one-shot subcommands onto tool invocations.
fn invocation_for(command: Commands) -> Option<Invocation> {
    let inv = match command {
        Commands::Send { to, message } => {
            Invocation::new(tools::SEND_MESSAGE, json!({ "to": to, "message": message }))
        }
        Commands::Media { to, url, caption } => {
            let mut args = json!({ "to": to, "media_url": url });
            if let Some(c) = caption {
                args["caption"] = Value::String(c);
            }
            Invocation::new(tools::SEND_MEDIA, args)
        }
        Commands::Chats { chat_type } => {
            let args = match chat_type {
                Some(t) => json!({ "chat_type": chat_type_arg(t) }),
                None => json!({}),
            };
            Invocation::new(tools::GET_CHATS, args)
        }
        Commands::Messages { chat_id, limit } => {
            let mut args = json!({ "chat_id": chat_id });
            if let Some(l) = limit {
                args["limit"] = json!(l);
            }
            Invocation::new(tools::GET_CHAT_MESSAGES, args)
        }
        Commands::Recent => Invocation::new(tools::GET_ALL_MESSAGES, json!({})),
        Commands::Chat { chat_id } => Invocation::new(tools::GET_CHAT_DETAILS, json!({ "chat_id": chat_id })),
        Commands::Contact { phone } => Invocation::new(tools::GET_CONTACT, json!({ "phone_number": phone })),
        Commands::Group { name, members } => {
            Invocation::new(tools::CREATE_GROUP, json!({ "name": name, "members": members }))
        }
        _ => return None,
    };
    Some(inv)
}

/// Accept the `individual` spelling for one-to-one chats; anything unknown is left for validation to reject.
fn chat_type_arg(raw: String) -> String {
    match ChatType::parse(&raw) {
        Some(t) => t.as_api_str().to_string(),
        None => raw,
    }
}

fn load_dispatcher(config_path: Option<PathBuf>) -> anyhow::Result<Dispatcher> {
    let (config, path) = lib::config::load_config(config_path)?;
    log::debug!("using config {}", path.display());
    lib::build_dispatcher(&config)
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    println!("set periskope.apiKey and periskope.phone in {} (or PERISKOPE_API_KEY / PERISKOPE_PHONE_NUMBER)", path.display());
    Ok(())
}

fn run_tools() -> anyhow::Result<()> {
    let infos = lib::tools::ToolRegistry::builtin().tool_infos();
    println!("{}", serde_json::to_string_pretty(&infos)?);
    Ok(())
}

async fn run_once(config_path: Option<PathBuf>, invocation: Invocation) -> anyhow::Result<()> {
    let dispatcher = load_dispatcher(config_path)?;
    let envelope = dispatcher.dispatch(&invocation).await;
    if print_envelope(&envelope) {
        anyhow::bail!("{} failed", invocation.action);
    }
    Ok(())
}

/// Print to stdout, or stderr for errors. Returns `is_error`.
fn print_envelope(envelope: &ResultEnvelope) -> bool {
    if envelope.is_error {
        eprintln!("{}", envelope.first_text());
    } else {
        println!("{}", envelope.first_text());
    }
    envelope.is_error
}

async fn run_mcp(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let dispatcher = load_dispatcher(config_path)?;
    lib::mcp::run_stdio(dispatcher).await
}

async fn run_serve(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let dispatcher = lib::build_dispatcher(&config)?;
    let port = port.unwrap_or_else(|| lib::config::resolve_web_port(&config));
    log::info!("starting web front end on {}:{}", config.web.bind, port);
    lib::web::run_web(&config.web.bind, port, dispatcher).await
}

const INTERACTIVE_HELP: &str = "commands:
  send <to> <message...>
  media <to> <url> [caption...]
  chats [user|individual|group]
  chat <chat_id>
  messages <chat_id> [limit]
  recent
  contact <phone>
  group <name> <member> [member...]
  tools
  /exit";

async fn run_interactive(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let dispatcher = load_dispatcher(config_path)?;
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("{}", INTERACTIVE_HELP);

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        match parse_interactive(input) {
            Ok(Some(invocation)) => {
                print_envelope(&dispatcher.dispatch(&invocation).await);
            }
            Ok(None) => {
                for info in dispatcher.registry().describe() {
                    println!("{} - {}", info.name, info.description);
                }
            }
            Err(msg) => {
                eprintln!("{}", msg);
                eprintln!("{}", INTERACTIVE_HELP);
            }
        }
    }

    Ok(())
}

/// Parse a prompt line. `Ok(None)` means "list tools".
fn parse_interactive(input: &str) -> Result<Option<Invocation>, String> {
    let mut words = input.split_whitespace();
    let cmd = words.next().unwrap_or_default().to_lowercase();
    let rest: Vec<&str> = words.collect();
    let need = |n: usize| {
        if rest.len() < n {
            Err(format!("{} needs at least {} argument(s)", cmd, n))
        } else {
            Ok(())
        }
    };
    let command = match cmd.as_str() {
        "tools" => return Ok(None),
        "send" => {
            need(2)?;
            Commands::Send {
                to: rest[0].to_string(),
                message: rest[1..].join(" "),
            }
        }
        "media" => {
            need(2)?;
            Commands::Media {
                to: rest[0].to_string(),
                url: rest[1].to_string(),
                caption: (rest.len() > 2).then(|| rest[2..].join(" ")),
            }
        }
        "chats" => Commands::Chats {
            chat_type: rest.first().map(|s| s.to_string()),
        },
        "chat" => {
            need(1)?;
            Commands::Chat {
                chat_id: rest[0].to_string(),
            }
        }
        "messages" => {
            need(1)?;
            let limit = match rest.get(1) {
                Some(l) => Some(l.parse::<u64>().map_err(|_| format!("invalid limit: {}", l))?),
                None => None,
            };
            Commands::Messages {
                chat_id: rest[0].to_string(),
                limit,
            }
        }
        "recent" => Commands::Recent,
        "contact" => {
            need(1)?;
            Commands::Contact {
                phone: rest[0].to_string(),
            }
        }
        "group" => {
            need(2)?;
            Commands::Group {
                name: rest[0].to_string(),
                members: rest[1..].iter().map(|s| s.to_string()).collect(),
            }
        }
        other => return Err(format!("unknown command: {}", other)),
    };
    Ok(invocation_for(command))
}
