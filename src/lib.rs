//! InviteCards Core - Invitation Card Engine
//!
//! # The Ground Rules
//! 1. Templates Are Contracts
//! 2. Validation Guards The Card
//! 3. SVG Is Truth
//! 4. Formatting Never Fails
//! 5. One Export At A Time

pub mod config;
pub mod download;
pub mod format;
pub mod hashing;
pub mod raster;
pub mod render;
pub mod templates;
pub mod terminal;
pub mod validation;
pub mod workflow;

pub use config::AppConfig;
pub use download::{DirectorySink, DownloadSink, MemorySink};
pub use format::{format_date, format_time, ordinal, DateLocale};
pub use raster::{ExportFormat, RasterOptions, Rasterizer, ResvgRasterizer, SvgPassthrough};
pub use render::{render_card, CardDocument};
pub use templates::{CardTemplate, TemplateId, TemplateRegistry};
pub use validation::{ErrorRecord, FormRecord, ValidationResult, Validator};
pub use workflow::{CardSession, ExportedCard, SessionError, ViewState};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
