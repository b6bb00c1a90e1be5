//! Template System - Card Contracts
//!
//! A card template is the whole per-card-type configuration: fields,
//! required messages, theme and layout. The workflow stays generic.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::format::{referenced_fields, FormatError};
use crate::raster::parse_hex_color;
use crate::ENGINE_VERSION;

pub type TemplateId = String;

const BUILTIN_TEMPLATES: [(&str, &str); 3] = [
    ("anniversary.json", include_str!("../templates/anniversary.json")),
    ("birthday.json", include_str!("../templates/birthday.json")),
    ("jagrata.json", include_str!("../templates/jagrata.json")),
];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template {template}: unknown field '{field}'")]
    UnknownField { template: String, field: String },

    #[error("Template {template}: field '{field}' declared twice")]
    DuplicateField { template: String, field: String },

    #[error("Template {template}: field '{field}' has min greater than max")]
    InvalidRange { template: String, field: String },

    #[error("Template {template}: theme colour {key} is not #rrggbb or #rrggbbaa: {value}")]
    InvalidColor { template: String, key: String, value: String },

    #[error("Template {0} has no element id")]
    MissingElementId(String),

    #[error("Template version {0} requires engine >= {1}, current is {2}")]
    EngineVersionMismatch(String, String, String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Template text error: {0}")]
    Format(#[from] FormatError),

    #[error("Failed to read templates: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse template {0}: {1}")]
    Parse(String, serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardTemplate {
    pub id: TemplateId,
    pub name: String,
    pub description: String,
    pub kind: CardKind,
    pub template_version: String,
    pub engine_min_version: String,
    /// Root element captured on export.
    pub element_id: String,
    /// Download name without extension, e.g. `Birthday_Card_{birthdayPerson|underscore}`.
    pub filename: String,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub theme: Theme,
    pub layout: Vec<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    Anniversary,
    Birthday,
    Jagrata,
    Custom,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Number,
    Date,
    Time,
    Textarea,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub kind: FieldKind,
    /// Message shown when the field is left empty. `None` means optional.
    #[serde(default)]
    pub required: Option<String>,
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

impl FieldSpec {
    pub fn is_required(&self) -> bool {
        self.required.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub background: [String; 2],
    pub border: String,
    #[serde(default)]
    pub inner_border: Option<String>,
    pub panel: String,
    pub body: String,
    pub accent: String,
    pub muted: String,
    pub strong: String,
    #[serde(default = "default_badge_text")]
    pub badge_text: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    /// Top-left, top-right, bottom-left, bottom-right.
    #[serde(default)]
    pub corners: Vec<String>,
}

fn default_badge_text() -> String { "#ffffff".to_string() }
fn default_font_family() -> String { "Georgia, 'Noto Sans', serif".to_string() }

impl Theme {
    pub fn tone(&self, tone: Tone) -> &str {
        match tone {
            Tone::Body => &self.body,
            Tone::Accent => &self.accent,
            Tone::Muted => &self.muted,
            Tone::Strong => &self.strong,
        }
    }

    /// Every colour written into the card SVG, keyed by its JSON name.
    pub fn colors(&self) -> Vec<(&'static str, &str)> {
        let mut colors = vec![
            ("background", self.background[0].as_str()),
            ("background", self.background[1].as_str()),
            ("border", self.border.as_str()),
            ("panel", self.panel.as_str()),
            ("body", self.body.as_str()),
            ("accent", self.accent.as_str()),
            ("muted", self.muted.as_str()),
            ("strong", self.strong.as_str()),
            ("badgeText", self.badge_text.as_str()),
        ];
        if let Some(inner) = &self.inner_border {
            colors.push(("innerBorder", inner.as_str()));
        }
        colors
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: ["#ffffff".to_string(), "#f3f3f3".to_string()],
            border: "#888888".to_string(),
            inner_border: None,
            panel: "#ffffff".to_string(),
            body: "#333333".to_string(),
            accent: "#555555".to_string(),
            muted: "#777777".to_string(),
            strong: "#111111".to_string(),
            badge_text: default_badge_text(),
            font_family: default_font_family(),
            corners: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Body,
    Accent,
    Muted,
    Strong,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStyle {
    #[serde(default = "default_text_size")]
    pub size: f32,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub tone: Tone,
}

fn default_text_size() -> f32 { 16.0 }
fn default_ornament_size() -> f32 { 32.0 }

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: default_text_size(),
            bold: false,
            italic: false,
            tone: Tone::Body,
        }
    }
}

/// Layout blocks, stacked top to bottom. Text supports `{field|filter}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Text {
        text: String,
        #[serde(default)]
        style: TextStyle,
    },
    Ornaments {
        icons: Vec<String>,
        #[serde(default = "default_ornament_size")]
        size: f32,
    },
    Badge {
        text: String,
    },
    Ordinal {
        field: String,
        label: String,
    },
    Divider {
        text: String,
    },
    Details {
        rows: Vec<DetailRow>,
    },
    Panel {
        label: String,
        text: String,
    },
    Message {
        field: String,
        #[serde(default)]
        closing: Vec<String>,
    },
    Spacer {
        height: f32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailRow {
    pub icon: String,
    pub text: String,
    /// Row is dropped when this field is empty.
    #[serde(default)]
    pub when: Option<String>,
}

impl CardTemplate {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.is_required())
    }

    /// Every interpolated string in the template, filename included.
    fn texts(&self) -> Vec<&str> {
        let mut texts = vec![self.filename.as_str()];
        for block in &self.layout {
            match block {
                Block::Text { text, .. } | Block::Badge { text } | Block::Divider { text } => {
                    texts.push(text)
                }
                Block::Ordinal { label, .. } => texts.push(label),
                Block::Details { rows } => texts.extend(rows.iter().map(|r| r.text.as_str())),
                Block::Panel { label, text } => {
                    texts.push(label);
                    texts.push(text);
                }
                Block::Message { closing, .. } => texts.extend(closing.iter().map(String::as_str)),
                Block::Ornaments { .. } | Block::Spacer { .. } => {}
            }
        }
        texts
    }

    /// Field names a block reads directly rather than through placeholders.
    fn direct_fields(&self) -> Vec<&str> {
        let mut fields = vec![];
        for block in &self.layout {
            match block {
                Block::Ordinal { field, .. } | Block::Message { field, .. } => fields.push(field.as_str()),
                Block::Details { rows } => fields.extend(rows.iter().filter_map(|r| r.when.as_deref())),
                _ => {}
            }
        }
        fields
    }

    /// Checks the template contract before it may be registered.
    pub fn check(&self) -> Result<(), TemplateError> {
        if self.element_id.trim().is_empty() {
            return Err(TemplateError::MissingElementId(self.id.clone()));
        }

        for (key, value) in self.theme.colors() {
            if parse_hex_color(value).is_err() {
                return Err(TemplateError::InvalidColor {
                    template: self.id.clone(),
                    key: key.to_string(),
                    value: value.to_string(),
                });
            }
        }

        let mut declared = HashSet::new();
        for field in &self.fields {
            if !declared.insert(field.name.as_str()) {
                return Err(TemplateError::DuplicateField {
                    template: self.id.clone(),
                    field: field.name.clone(),
                });
            }
            if let (Some(min), Some(max)) = (field.min, field.max) {
                if min > max {
                    return Err(TemplateError::InvalidRange {
                        template: self.id.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }

        let mut used = self.direct_fields().into_iter().map(String::from).collect::<Vec<_>>();
        for text in self.texts() {
            used.extend(referenced_fields(text)?);
        }

        if let Some(unknown) = used.into_iter().find(|f| !declared.contains(f.as_str())) {
            return Err(TemplateError::UnknownField {
                template: self.id.clone(),
                field: unknown,
            });
        }

        check_engine_version(self)
    }
}

pub fn check_engine_version(template: &CardTemplate) -> Result<(), TemplateError> {
    let engine_ver = semver::Version::parse(ENGINE_VERSION)
        .map_err(|_| TemplateError::InvalidVersion(ENGINE_VERSION.to_string()))?;
    let min_ver = semver::Version::parse(&template.engine_min_version)
        .map_err(|_| TemplateError::InvalidVersion(template.engine_min_version.clone()))?;

    if engine_ver < min_ver {
        return Err(TemplateError::EngineVersionMismatch(
            template.template_version.clone(),
            template.engine_min_version.clone(),
            ENGINE_VERSION.to_string(),
        ));
    }

    Ok(())
}

/// Template registry - built-in cards plus any loaded from disk
#[derive(Debug)]
pub struct TemplateRegistry {
    templates: HashMap<TemplateId, CardTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self { templates: HashMap::new() }
    }

    /// Anniversary, birthday and jagrata cards.
    pub fn builtin() -> Result<Self, TemplateError> {
        let mut registry = Self::new();
        for (name, content) in BUILTIN_TEMPLATES {
            let template = serde_json::from_str::<CardTemplate>(content)
                .map_err(|e| TemplateError::Parse(name.to_string(), e))?;
            registry.register(template)?;
        }
        Ok(registry)
    }

    pub fn load_from_dir(dir: &Path) -> Result<Self, TemplateError> {
        let mut registry = Self::new();
        registry.extend_from_dir(dir)?;
        Ok(registry)
    }

    /// Adds every valid `*.json` template in `dir`; broken files are skipped.
    pub fn extend_from_dir(&mut self, dir: &Path) -> Result<usize, TemplateError> {
        let mut loaded = 0;
        if !dir.exists() {
            return Ok(loaded);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                let parsed = fs::read_to_string(&path)
                    .map_err(TemplateError::from)
                    .and_then(|content| {
                        serde_json::from_str::<CardTemplate>(&content)
                            .map_err(|e| TemplateError::Parse(path.display().to_string(), e))
                    })
                    .and_then(|template| self.register(template));

                match parsed {
                    Ok(()) => loaded += 1,
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping template"),
                }
            }
        }

        Ok(loaded)
    }

    pub fn get(&self, id: &str) -> Option<&CardTemplate> {
        self.templates.get(id)
    }

    /// Templates ordered by id.
    pub fn list(&self) -> Vec<&CardTemplate> {
        let mut templates: Vec<_> = self.templates.values().collect();
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        templates
    }

    pub fn register(&mut self, template: CardTemplate) -> Result<(), TemplateError> {
        template.check()?;
        debug!(id = %template.id, version = %template.template_version, "registered template");
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}
