//! JSON-RPC IPC worker serving accessibility providers.
//!
//! Reads line-delimited JSON requests from stdin, writes JSON responses to
//! stdout.  The stdin thread is the foreign caller: the element tree lives
//! on a dedicated UI context thread and every request is marshalled onto it.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use log::{debug, LevelFilter, Log, Metadata, Record};
use serde::{Deserialize, Serialize};

use peerbridge_core::context::{AffinityContext, ContextOptions, ContextThread};
use peerbridge_core::errors::BridgeError;
use peerbridge_core::pattern::{PatternId, ValueProvider, ValueStore};
use peerbridge_core::peer::{AutomationPeer, ElementProxy, TextFieldPeer};
use peerbridge_core::root::GenericRootPeer;
use peerbridge_core::window::NativeWindow;

#[derive(Parser)]
#[command(name = "peerbridge-worker", about = "Accessibility provider IPC worker process")]
struct Args {
    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Name of the UI context thread
    #[arg(long, default_value = "peerbridge-ui")]
    context_name: String,

    /// Accessible name of the root pane (empty: use the window title)
    #[arg(long, default_value = "")]
    name: String,

    /// Accessible name of the text field
    #[arg(long, default_value = "Value")]
    field_name: String,

    /// Initial text of the field
    #[arg(long, default_value = "")]
    value: String,

    /// Reject writes to the field
    #[arg(long)]
    read_only: bool,

    /// Native window handle backing the root pane
    #[cfg(windows)]
    #[arg(long)]
    hwnd: Option<isize>,
}

#[derive(Deserialize)]
struct Request {
    id: u64,
    method: String,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Serialize)]
struct Response {
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "peerbridge-worker: [{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: bool) {
    if verbose && log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

// ---------------------------------------------------------------------------
// Element tree
// ---------------------------------------------------------------------------

/// What the UI thread needs to build its elements.
struct ElementSpec {
    root_name: String,
    field_name: String,
    initial_value: String,
    read_only: bool,
    window: Option<Arc<dyn NativeWindow>>,
}

struct Elements {
    root: ElementProxy,
    field: ElementProxy,
    value: Arc<dyn ValueProvider>,
}

impl Elements {
    /// Build the peers on the UI thread that owns them.
    fn build(context: &AffinityContext, spec: ElementSpec) -> Result<Self, BridgeError> {
        let owner = context.clone();
        let (root, field) = context.run_on_context(
            move |spec: ElementSpec| {
                let store = if spec.read_only {
                    ValueStore::read_only(spec.initial_value)
                } else {
                    ValueStore::new(spec.initial_value)
                };
                let root: Arc<dyn AutomationPeer> =
                    Arc::new(GenericRootPeer::new(owner.clone(), spec.root_name, spec.window));
                let field: Arc<dyn AutomationPeer> =
                    Arc::new(TextFieldPeer::new(owner, spec.field_name, Arc::new(store)));
                Ok((root, field))
            },
            spec,
        )?;

        let field = ElementProxy::new(field);
        let value = field
            .pattern(PatternId::Value)?
            .and_then(|p| p.as_value().cloned())
            .ok_or_else(|| BridgeError::OperationFault("field has no value pattern".to_owned()))?;

        Ok(Self {
            root: ElementProxy::new(root),
            field,
            value,
        })
    }

    fn select(&self, params: &serde_json::Value) -> Result<&ElementProxy, String> {
        match params.get("element").and_then(|v| v.as_str()).unwrap_or("field") {
            "field" => Ok(&self.field),
            "root" => Ok(&self.root),
            other => Err(format!("unknown element: {other}")),
        }
    }
}

#[cfg(windows)]
fn native_window(args: &Args) -> Option<Arc<dyn NativeWindow>> {
    use peerbridge_core::window::Win32Window;
    args.hwnd
        .map(|handle| Arc::new(Win32Window::new(handle)) as Arc<dyn NativeWindow>)
}

#[cfg(not(windows))]
fn native_window(_args: &Args) -> Option<Arc<dyn NativeWindow>> {
    None
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

fn dispatch(
    elements: &Elements,
    method: &str,
    params: &serde_json::Value,
) -> Result<serde_json::Value, String> {
    match method {
        "value.set" => {
            let text = params.get("text").and_then(|v| v.as_str()).unwrap_or("");
            elements.value.set_value(text).map_err(|e| e.to_string())?;
            Ok(serde_json::Value::Null)
        }
        "value.get" => {
            let value = elements.value.value().map_err(|e| e.to_string())?;
            Ok(serde_json::Value::String(value))
        }
        "value.is_read_only" => {
            let read_only = elements.value.is_read_only().map_err(|e| e.to_string())?;
            Ok(serde_json::Value::Bool(read_only))
        }
        "element.info" => {
            let info = elements.select(params)?.snapshot().map_err(|e| e.to_string())?;
            serde_json::to_value(info).map_err(|e| e.to_string())
        }
        "element.name" => {
            let name = elements.select(params)?.name().map_err(|e| e.to_string())?;
            Ok(serde_json::Value::String(name))
        }
        "element.bounds" => {
            let rect = elements
                .select(params)?
                .bounding_rectangle()
                .map_err(|e| e.to_string())?;
            serde_json::to_value(rect).map_err(|e| e.to_string())
        }
        "element.patterns" => {
            let names: Vec<&str> = elements
                .select(params)?
                .supported_patterns()
                .map_err(|e| e.to_string())?
                .into_iter()
                .map(PatternId::name)
                .collect();
            serde_json::to_value(names).map_err(|e| e.to_string())
        }
        "ping" => Ok(serde_json::Value::String("pong".to_owned())),
        _ => Err(format!("unknown method: {method}")),
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let ui = match ContextThread::spawn(ContextOptions {
        name: args.context_name.clone(),
        stack_size: None,
    }) {
        Ok(ui) => ui,
        Err(e) => {
            eprintln!("peerbridge-worker: {e}");
            std::process::exit(1);
        }
    };

    let spec = ElementSpec {
        root_name: args.name.clone(),
        field_name: args.field_name.clone(),
        initial_value: args.value.clone(),
        read_only: args.read_only,
        window: native_window(&args),
    };
    let elements = match Elements::build(ui.context(), spec) {
        Ok(elements) => elements,
        Err(e) => {
            eprintln!("peerbridge-worker: failed to build elements: {e}");
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    debug!("ready on context '{}'", ui.context().name());

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                debug!("stdin read error: {e}");
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let req: Request = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                // Parse error -- use id=0 since we can't extract it.
                let resp = Response {
                    id: 0,
                    result: None,
                    error: Some(format!("invalid JSON: {e}")),
                };
                if let Ok(json) = serde_json::to_string(&resp) {
                    let _ = writeln!(stdout, "{json}");
                    let _ = stdout.flush();
                }
                continue;
            }
        };

        let resp = match dispatch(&elements, &req.method, &req.params) {
            Ok(result) => Response {
                id: req.id,
                result: Some(result),
                error: None,
            },
            Err(error) => Response {
                id: req.id,
                result: None,
                error: Some(error),
            },
        };

        if let Ok(json) = serde_json::to_string(&resp) {
            let _ = writeln!(stdout, "{json}");
        } else {
            let _ = writeln!(
                stdout,
                r#"{{"id":{},"error":"response serialization failed"}}"#,
                req.id
            );
        }
        let _ = stdout.flush();
    }

    if let Err(e) = ui.shutdown() {
        eprintln!("peerbridge-worker: {e}");
    }
}
