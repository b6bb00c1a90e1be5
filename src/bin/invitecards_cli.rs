//! InviteCards CLI - Card Generator Front End
//!
//! Commands: templates, validate, render, interactive
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation failure

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use invitecards_core::{
    terminal::Terminal, AppConfig, CardSession, CardTemplate, DirectorySink, ExportFormat,
    Rasterizer, ResvgRasterizer, SvgPassthrough, TemplateRegistry,
};

#[derive(Parser)]
#[command(name = "invitecards-cli")]
#[command(about = "InviteCards CLI - Invitation Card Generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with extra card templates
    #[arg(short, long)]
    templates_dir: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available card types
    Templates,

    /// Validate a filled form
    Validate {
        /// Card type ID
        #[arg(short, long)]
        card: String,

        /// JSON payload (field name -> value)
        #[arg(short, long)]
        payload: String,
    },

    /// Generate a card and export it
    Render {
        /// Card type ID
        #[arg(short, long)]
        card: String,

        /// JSON payload (field name -> value)
        #[arg(short, long)]
        payload: String,

        /// png or svg
        #[arg(short, long)]
        format: Option<ExportFormat>,

        /// Downloads directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Pixel scale of the PNG export
        #[arg(long)]
        scale: Option<f32>,
    },

    /// Fill in a card from the terminal
    Interactive,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    let mut config = match &cli.config {
        Some(path) => match AppConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                print_json(&json!({ "error": e.to_string() }));
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };
    if let Some(dir) = cli.templates_dir {
        config.templates_dir = Some(dir);
    }

    let registry = match load_registry(&config) {
        Ok(r) => r,
        Err(e) => {
            print_json(&json!({ "error": format!("Failed to load templates: {}", e) }));
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = registry
                .list()
                .iter()
                .map(|t| json!({
                    "id": t.id,
                    "name": t.name,
                    "kind": t.kind,
                    "version": t.template_version,
                    "required": t.required_fields().map(|f| f.name.clone()).collect::<Vec<_>>(),
                }))
                .collect();

            print_json(&Value::Array(templates));
            ExitCode::SUCCESS
        }

        Commands::Validate { card, payload } => {
            let Some(template) = registry.get(&card) else {
                print_json(&json!({ "valid": false, "error": format!("Card type not found: {}", card) }));
                return ExitCode::FAILURE;
            };
            let mut session = match session_from_payload(template, &payload, &config) {
                Ok(s) => s,
                Err(e) => {
                    print_json(&json!({ "valid": false, "error": e }));
                    return ExitCode::FAILURE;
                }
            };

            let result = session.submit();
            print_json(&json!(result));
            if result.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)  // Validation failure
            }
        }

        Commands::Render { card, payload, format, out_dir, scale } => {
            if let Some(scale) = scale {
                config.scale = scale;
            }
            let Some(template) = registry.get(&card) else {
                print_json(&json!({ "success": false, "error": format!("Card type not found: {}", card) }));
                return ExitCode::FAILURE;
            };
            let mut session = match session_from_payload(template, &payload, &config) {
                Ok(s) => s,
                Err(e) => {
                    print_json(&json!({ "success": false, "error": e }));
                    return ExitCode::FAILURE;
                }
            };

            let validation = session.submit();
            if !validation.valid {
                print_json(&json!({ "success": false, "validation": validation }));
                return ExitCode::from(2);
            }

            let rasterizer = rasterizer_for(format.unwrap_or(config.format));
            let mut sink = DirectorySink::new(out_dir.unwrap_or_else(|| config.output_dir.clone()));
            let now = Instant::now();
            let outcome = session.export(rasterizer.as_ref(), &mut sink, now);
            let notice = session.toast(now).map(|t| t.text.clone());

            match outcome {
                Ok(card) => {
                    print_json(&json!({ "success": true, "notice": notice, "card": card }));
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    print_json(&json!({ "success": false, "notice": notice, "error": e.to_string() }));
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Interactive => {
            let rasterizer = rasterizer_for(config.format);
            let mut sink = DirectorySink::new(config.output_dir.clone());
            let stdin = io::stdin();
            let mut terminal = Terminal::new(&registry, &config, stdin.lock(), io::stdout());

            match terminal.run(rasterizer.as_ref(), &mut sink) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn load_registry(config: &AppConfig) -> Result<TemplateRegistry, invitecards_core::templates::TemplateError> {
    let mut registry = TemplateRegistry::builtin()?;
    if let Some(dir) = &config.templates_dir {
        registry.extend_from_dir(dir)?;
    }
    Ok(registry)
}

fn rasterizer_for(format: ExportFormat) -> Box<dyn Rasterizer> {
    match format {
        ExportFormat::Png => Box::new(ResvgRasterizer::new()),
        ExportFormat::Svg => Box::new(SvgPassthrough),
    }
}

/// Builds a session from `{"field": "value"}`; numbers are accepted as text.
fn session_from_payload(
    template: &CardTemplate,
    payload: &str,
    config: &AppConfig,
) -> Result<CardSession, String> {
    let fields: serde_json::Map<String, Value> =
        serde_json::from_str(payload).map_err(|e| format!("Invalid payload: {}", e))?;
    let options = config.raster_options().map_err(|e| e.to_string())?;

    let mut session = CardSession::new(template.clone())
        .with_locale(config.locale)
        .with_raster_options(options)
        .with_toast_duration(config.toast_duration());

    for (name, value) in fields {
        let text = match value {
            Value::String(s) => s,
            Value::Null => String::new(),
            Value::Number(n) => n.to_string(),
            other => return Err(format!("Field {} must be text, got {}", name, other)),
        };
        session.set_field(&name, text).map_err(|e| e.to_string())?;
    }
    Ok(session)
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}
