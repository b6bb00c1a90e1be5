//! Card Workflow - Form, Card, Export
//!
//! One generic session drives every card type. The template supplies the
//! fields, the rules and the layout; the session owns the view state.
//!
//! CRITICAL: the card view is only reachable through `submit`, which always
//! validates. Export is only reachable from the card view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::download::{DownloadError, DownloadSink};
use crate::format::{interpolate, DateLocale};
use crate::hashing::{compute_job_hash, sha256_hex};
use crate::raster::{ExportFormat, RasterError, RasterOptions, Rasterizer};
use crate::render::{render_card, CardDocument};
use crate::templates::{CardTemplate, TemplateError};
use crate::validation::{ErrorRecord, FormRecord, ValidationResult, Validator};
use crate::ENGINE_VERSION;

pub const SUCCESS_NOTICE: &str = "✅ Card downloaded to your Downloads folder!";
pub const FAILURE_NOTICE: &str = "⚠️ Download failed. Please try again.";
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(3500);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewState {
    #[default]
    Form,
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub text: String,
    pub kind: ToastKind,
    pub raised_at: Instant,
}

impl Toast {
    pub fn is_visible(&self, now: Instant, duration: Duration) -> bool {
        now.saturating_duration_since(self.raised_at) < duration
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Rasterization failed: {0}")]
    Raster(#[from] RasterError),

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("The card has not been generated yet")]
    NotOnCard,

    #[error("An export is already in progress")]
    ExportPending,

    #[error("No export is in progress")]
    NoExportPending,

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Manifest of one finished export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedCard {
    pub id: String,
    pub template_id: String,
    pub template_version: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub filename: String,
    pub format: ExportFormat,
    pub mime: String,
    pub size: [u32; 2],
    pub sha256: String,
    pub job_hash: String,
    #[serde(default)]
    pub location: Option<std::path::PathBuf>,
}

/// Everything an export needs, detached from the session.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub document: CardDocument,
    pub filename_stem: String,
    pub options: RasterOptions,
    template_id: String,
    template_version: String,
    form: FormRecord,
}

impl ExportJob {
    pub fn filename(&self, format: ExportFormat) -> String {
        format!("{}.{}", self.filename_stem, format.extension())
    }

    pub fn run(
        &self,
        rasterizer: &dyn Rasterizer,
        sink: &mut dyn DownloadSink,
    ) -> Result<ExportedCard, ExportError> {
        let image = rasterizer.rasterize(&self.document, &self.options)?;
        let filename = self.filename(image.format);
        let download = sink.deliver(&filename, image.mime(), &image.bytes)?;

        let job_hash = compute_job_hash(
            &self.template_id,
            &self.template_version,
            &self.form,
            ENGINE_VERSION,
        )?;

        Ok(ExportedCard {
            id: Uuid::new_v4().to_string(),
            template_id: self.template_id.clone(),
            template_version: self.template_version.clone(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            filename: download.filename,
            format: image.format,
            mime: download.mime,
            size: [image.width, image.height],
            sha256: sha256_hex(&image.bytes),
            job_hash,
            location: download.location,
        })
    }
}

/// A mounted card flow: form state, errors, view, export flag and toast.
pub struct CardSession {
    template: CardTemplate,
    validator: Validator,
    form: FormRecord,
    errors: ErrorRecord,
    view: ViewState,
    exporting: bool,
    toast: Option<Toast>,
    toast_duration: Duration,
    locale: DateLocale,
    raster_options: RasterOptions,
    on_back: Option<Box<dyn FnMut()>>,
}

impl CardSession {
    pub fn new(template: CardTemplate) -> Self {
        let form = FormRecord::with_fields(template.fields.iter().map(|f| f.name.clone()));
        Self {
            template,
            validator: Validator::new(),
            form,
            errors: ErrorRecord::default(),
            view: ViewState::Form,
            exporting: false,
            toast: None,
            toast_duration: DEFAULT_TOAST_DURATION,
            locale: DateLocale::default(),
            raster_options: RasterOptions::default(),
            on_back: None,
        }
    }

    /// Host callback for leaving the card flow.
    pub fn with_back(mut self, on_back: impl FnMut() + 'static) -> Self {
        self.on_back = Some(Box::new(on_back));
        self
    }

    pub fn with_locale(mut self, locale: DateLocale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_raster_options(mut self, options: RasterOptions) -> Self {
        self.raster_options = options;
        self
    }

    pub fn with_toast_duration(mut self, duration: Duration) -> Self {
        self.toast_duration = duration;
        self
    }

    pub fn template(&self) -> &CardTemplate {
        &self.template
    }

    pub fn form(&self) -> &FormRecord {
        &self.form
    }

    pub fn errors(&self) -> &ErrorRecord {
        &self.errors
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    /// Stores a value and drops that field's stale error; nothing is re-validated.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) -> Result<(), SessionError> {
        if !self.form.contains(name) {
            return Err(SessionError::UnknownField(name.to_string()));
        }
        self.form.set(name, value);
        if self.errors.clear(name) {
            debug!(template = %self.template.id, field = name, "cleared field error");
        }
        Ok(())
    }

    pub fn submit(&mut self) -> ValidationResult {
        let result = self.validator.validate(&self.form, &self.template);
        if result.valid {
            self.errors = ErrorRecord::default();
            self.view = ViewState::Card;
            debug!(template = %self.template.id, "form accepted");
        } else {
            self.errors = result.errors.clone();
            debug!(template = %self.template.id, errors = self.errors.len(), "form rejected");
        }
        result
    }

    /// Back to the form with every value kept.
    pub fn edit(&mut self) -> ViewState {
        self.view = ViewState::Form;
        self.view
    }

    pub fn back(&mut self) {
        debug!(template = %self.template.id, "leaving card flow");
        if let Some(on_back) = self.on_back.as_mut() {
            on_back();
        }
    }

    pub fn render(&self) -> Result<CardDocument, SessionError> {
        if self.view != ViewState::Card {
            return Err(SessionError::NotOnCard);
        }
        Ok(render_card(&self.template, &self.form, self.locale)?)
    }

    /// Download name without extension, e.g. `Anniversary_Card_Rahul_Priya`.
    pub fn filename_stem(&self) -> Result<String, SessionError> {
        let stem = interpolate(&self.template.filename, &self.form, self.locale)
            .map_err(TemplateError::from)?;
        Ok(stem)
    }

    pub fn begin_export(&mut self) -> Result<ExportJob, SessionError> {
        if self.exporting {
            return Err(SessionError::ExportPending);
        }
        let document = self.render()?;
        let filename_stem = self.filename_stem()?;

        self.exporting = true;
        info!(template = %self.template.id, file = %filename_stem, "export started");

        Ok(ExportJob {
            document,
            filename_stem,
            options: self.raster_options,
            template_id: self.template.id.clone(),
            template_version: self.template.template_version.clone(),
            form: self.form.clone(),
        })
    }

    /// Clears the busy flag and raises the matching notice. The view is left alone.
    pub fn finish_export(
        &mut self,
        outcome: Result<ExportedCard, ExportError>,
        now: Instant,
    ) -> Result<ExportedCard, SessionError> {
        if !self.exporting {
            return Err(SessionError::NoExportPending);
        }
        self.exporting = false;

        match outcome {
            Ok(card) => {
                info!(file = %card.filename, sha256 = %card.sha256, "export finished");
                self.raise_toast(SUCCESS_NOTICE, ToastKind::Success, now);
                Ok(card)
            }
            Err(e) => {
                warn!(template = %self.template.id, error = %e, "export failed");
                self.raise_toast(FAILURE_NOTICE, ToastKind::Failure, now);
                Err(e.into())
            }
        }
    }

    pub fn export(
        &mut self,
        rasterizer: &dyn Rasterizer,
        sink: &mut dyn DownloadSink,
        now: Instant,
    ) -> Result<ExportedCard, SessionError> {
        let job = self.begin_export()?;
        let outcome = job.run(rasterizer, sink);
        self.finish_export(outcome, now)
    }

    fn raise_toast(&mut self, text: &str, kind: ToastKind, now: Instant) {
        self.toast = Some(Toast {
            text: text.to_string(),
            kind,
            raised_at: now,
        });
    }

    /// The notice, while it is still within its display window.
    pub fn toast(&self, now: Instant) -> Option<&Toast> {
        self.toast
            .as_ref()
            .filter(|t| t.is_visible(now, self.toast_duration))
    }

    pub fn clear_expired_toast(&mut self, now: Instant) {
        if self.toast(now).is_none() {
            self.toast = None;
        }
    }
}
