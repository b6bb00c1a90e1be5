//! Card Layout - SVG Is Truth
//!
//! Blocks are stacked top-down and centered on a fixed-width card. The SVG
//! document is the master; raster exports are derived from it.

use serde::{Deserialize, Serialize};

use crate::format::{interpolate, ordinal_text, DateLocale};
use crate::templates::{Block, CardTemplate, DetailRow, TemplateError, TextStyle, Theme, Tone};
use crate::validation::FormRecord;

pub const CARD_WIDTH: f32 = 480.0;
const PADDING: f32 = 36.0;
const LINE_SPACING: f32 = 1.35;
const BLOCK_GAP: f32 = 10.0;
const CENTER: f32 = CARD_WIDTH / 2.0;
const INNER_WIDTH: f32 = CARD_WIDTH - 2.0 * PADDING;

/// A rendered card: the SVG master plus its plain-text reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDocument {
    pub element_id: String,
    pub width: u32,
    pub height: u32,
    pub svg: String,
    pub lines: Vec<String>,
}

impl CardDocument {
    pub fn contains_text(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

pub fn render_card(
    template: &CardTemplate,
    form: &FormRecord,
    locale: DateLocale,
) -> Result<CardDocument, TemplateError> {
    let mut layout = Layout::new(&template.theme);

    for block in &template.layout {
        match block {
            Block::Text { text, style } => {
                let text = interpolate(text, form, locale)?;
                layout.text(&text, style);
            }
            Block::Ornaments { icons, size } => layout.ornaments(icons, *size),
            Block::Badge { text } => {
                let text = interpolate(text, form, locale)?;
                layout.badge(&text);
            }
            Block::Ordinal { field, label } => {
                let label = interpolate(label, form, locale)?;
                layout.ordinal(&ordinal_text(form.get(field)), &label);
            }
            Block::Divider { text } => {
                let text = interpolate(text, form, locale)?;
                layout.divider(&text);
            }
            Block::Details { rows } => {
                let rows = visible_rows(rows, form, locale)?;
                layout.details(&rows);
            }
            Block::Panel { label, text } => {
                let label = interpolate(label, form, locale)?;
                let text = interpolate(text, form, locale)?;
                layout.panel(&label, &text);
            }
            Block::Message { field, closing } => {
                let closing = closing
                    .iter()
                    .map(|line| interpolate(line, form, locale))
                    .collect::<Result<Vec<_>, _>>()?;
                layout.message(form.get(field).trim(), &closing);
            }
            Block::Spacer { height } => layout.y += *height,
        }
    }

    Ok(layout.finish(&template.element_id))
}

fn visible_rows(
    rows: &[DetailRow],
    form: &FormRecord,
    locale: DateLocale,
) -> Result<Vec<(String, String)>, TemplateError> {
    let mut visible = vec![];
    for row in rows {
        if let Some(field) = &row.when {
            if form.get(field).trim().is_empty() {
                continue;
            }
        }
        visible.push((row.icon.clone(), interpolate(&row.text, form, locale)?));
    }
    Ok(visible)
}

struct Layout<'a> {
    theme: &'a Theme,
    y: f32,
    body: String,
    lines: Vec<String>,
}

impl<'a> Layout<'a> {
    fn new(theme: &'a Theme) -> Self {
        Self {
            theme,
            y: PADDING + 8.0,
            body: String::new(),
            lines: vec![],
        }
    }

    fn push_text(&mut self, x: f32, baseline: f32, anchor: &str, text: &str, style: &TextStyle, fill: &str) {
        self.body.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" text-anchor="{}" font-size="{}"{}{} fill="{}">{}</text>"#,
            x,
            baseline,
            anchor,
            style.size,
            if style.bold { r#" font-weight="bold""# } else { "" },
            if style.italic { r#" font-style="italic""# } else { "" },
            fill,
            escape_xml(text),
        ));
    }

    fn text(&mut self, text: &str, style: &TextStyle) {
        if text.trim().is_empty() {
            return;
        }
        let fill = self.theme.tone(style.tone).to_string();
        for line in wrap_text(text, style.size, INNER_WIDTH) {
            self.push_text(CENTER, self.y + style.size, "middle", &line, style, &fill);
            self.y += style.size * LINE_SPACING;
        }
        self.y += BLOCK_GAP / 2.0;
        self.lines.push(text.to_string());
    }

    fn ornaments(&mut self, icons: &[String], size: f32) {
        if icons.is_empty() {
            return;
        }
        let spacing = size * 1.4;
        let start = CENTER - spacing * (icons.len() as f32 - 1.0) / 2.0;
        let style = TextStyle { size, ..TextStyle::default() };
        let fill = self.theme.body.clone();
        for (i, icon) in icons.iter().enumerate() {
            self.push_text(start + spacing * i as f32, self.y + size, "middle", icon, &style, &fill);
        }
        self.y += size * LINE_SPACING + BLOCK_GAP / 2.0;
        self.lines.push(icons.join(" "));
    }

    fn badge(&mut self, text: &str) {
        let style = TextStyle { size: 14.0, bold: true, ..TextStyle::default() };
        let width = (estimate_width(text, style.size) + 36.0).min(INNER_WIDTH);
        let height = style.size + 16.0;
        self.body.push_str(&format!(
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" rx="{:.1}" fill="{}"/>"#,
            CENTER - width / 2.0,
            self.y,
            width,
            height,
            height / 2.0,
            self.theme.accent,
        ));
        let fill = self.theme.badge_text.clone();
        self.push_text(CENTER, self.y + height / 2.0 + style.size * 0.35, "middle", text, &style, &fill);
        self.y += height + BLOCK_GAP;
        self.lines.push(text.to_string());
    }

    fn ordinal(&mut self, value: &str, label: &str) {
        let radius = 44.0;
        let cy = self.y + radius;
        self.body.push_str(&format!(
            r#"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}" stroke="{}" stroke-width="3"/>"#,
            CENTER,
            cy,
            radius,
            self.theme.accent,
            self.theme.border,
        ));
        let value_style = TextStyle { size: 26.0, bold: true, ..TextStyle::default() };
        let fill = self.theme.badge_text.clone();
        self.push_text(CENTER, cy + value_style.size * 0.35, "middle", value, &value_style, &fill);
        self.y += radius * 2.0 + 6.0;

        let label_style = TextStyle { size: 15.0, bold: true, tone: Tone::Muted, ..TextStyle::default() };
        let fill = self.theme.muted.clone();
        self.push_text(CENTER, self.y + label_style.size, "middle", label, &label_style, &fill);
        self.y += label_style.size * LINE_SPACING + BLOCK_GAP;

        self.lines.push(format!("{} {}", value, label).trim().to_string());
    }

    fn divider(&mut self, text: &str) {
        let style = TextStyle { size: 16.0, ..TextStyle::default() };
        let mid = self.y + style.size * 0.7;
        let gap = estimate_width(text, style.size) / 2.0 + 12.0;
        self.body.push_str(&format!(
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-width="1"/><line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-width="1"/>"#,
            PADDING + 20.0, mid, CENTER - gap, mid, self.theme.border,
            CENTER + gap, mid, CARD_WIDTH - PADDING - 20.0, mid, self.theme.border,
        ));
        let fill = self.theme.accent.clone();
        self.push_text(CENTER, self.y + style.size, "middle", text, &style, &fill);
        self.y += style.size * LINE_SPACING + BLOCK_GAP;
        self.lines.push(text.to_string());
    }

    /// Frames whatever `draw` lays out; the box ends at the cursor.
    fn boxed(&mut self, draw: impl FnOnce(&mut Self)) {
        let top = self.y;
        let content_start = self.body.len();
        self.y += 14.0;
        draw(self);
        self.y += 6.0;
        let rect = format!(
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" rx="14" fill="{}" fill-opacity="0.75" stroke="{}" stroke-width="1.5"/>"#,
            PADDING,
            top,
            INNER_WIDTH,
            self.y - top,
            self.theme.panel,
            self.theme.border,
        );
        self.body.insert_str(content_start, &rect);
        self.y += BLOCK_GAP;
    }

    fn details(&mut self, rows: &[(String, String)]) {
        if rows.is_empty() {
            return;
        }
        self.boxed(|layout| {
            let style = TextStyle { size: 15.0, ..TextStyle::default() };
            let fill = layout.theme.body.clone();
            let text_x = PADDING + 52.0;
            let text_width = CARD_WIDTH - PADDING - 16.0 - text_x;
            for (icon, text) in rows {
                layout.push_text(PADDING + 20.0, layout.y + style.size, "start", icon, &style, &fill);
                for line in wrap_text(text, style.size, text_width) {
                    layout.push_text(text_x, layout.y + style.size, "start", &line, &style, &fill);
                    layout.y += style.size * LINE_SPACING;
                }
                layout.y += 4.0;
                layout.lines.push(format!("{} {}", icon, text));
            }
        });
    }

    fn panel(&mut self, label: &str, text: &str) {
        self.boxed(|layout| {
            let label_style = TextStyle { size: 14.0, bold: true, tone: Tone::Accent, ..TextStyle::default() };
            let fill = layout.theme.accent.clone();
            layout.push_text(CENTER, layout.y + label_style.size, "middle", label, &label_style, &fill);
            layout.y += label_style.size * LINE_SPACING;
            layout.lines.push(label.to_string());

            let text_style = TextStyle { size: 16.0, bold: true, ..TextStyle::default() };
            let fill = layout.theme.body.clone();
            for line in wrap_text(text, text_style.size, INNER_WIDTH - 32.0) {
                layout.push_text(CENTER, layout.y + text_style.size, "middle", &line, &text_style, &fill);
                layout.y += text_style.size * LINE_SPACING;
            }
            layout.lines.push(text.to_string());
        });
    }

    fn message(&mut self, message: &str, closing: &[String]) {
        if !message.is_empty() {
            let quoted = format!("\"{}\"", message);
            let style = TextStyle { size: 15.0, italic: true, tone: Tone::Strong, ..TextStyle::default() };
            self.text(&quoted, &style);
            self.y += 6.0;
        }
        let style = TextStyle { size: 14.0, ..TextStyle::default() };
        for line in closing {
            self.text(line, &style);
        }
    }

    fn finish(self, element_id: &str) -> CardDocument {
        let theme = self.theme;
        let height = (self.y + PADDING).ceil();
        let mut svg = String::new();

        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" id="{id}" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            id = escape_xml(element_id),
            w = CARD_WIDTH,
            h = height,
        ));
        svg.push_str(&format!(
            r#"<defs><linearGradient id="card-bg" x1="0" y1="0" x2="1" y2="1"><stop offset="0" stop-color="{}"/><stop offset="1" stop-color="{}"/></linearGradient></defs>"#,
            theme.background[0], theme.background[1],
        ));
        svg.push_str(&format!(
            r#"<rect x="2" y="2" width="{:.1}" height="{:.1}" rx="24" fill="url(#card-bg)" stroke="{}" stroke-width="3"/>"#,
            CARD_WIDTH - 4.0,
            height - 4.0,
            theme.border,
        ));
        if let Some(inner) = &theme.inner_border {
            svg.push_str(&format!(
                r#"<rect x="12" y="12" width="{:.1}" height="{:.1}" rx="18" fill="none" stroke="{}" stroke-width="2" stroke-dasharray="6 4"/>"#,
                CARD_WIDTH - 24.0,
                height - 24.0,
                inner,
            ));
        }

        svg.push_str(&format!(r#"<g font-family="{}">"#, escape_xml(&theme.font_family)));
        let corners = [
            (22.0, 40.0),
            (CARD_WIDTH - 22.0, 40.0),
            (22.0, height - 22.0),
            (CARD_WIDTH - 22.0, height - 22.0),
        ];
        for (icon, (x, y)) in theme.corners.iter().zip(corners) {
            svg.push_str(&format!(
                r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="22">{}</text>"#,
                x,
                y,
                escape_xml(icon),
            ));
        }
        svg.push_str(&self.body);
        svg.push_str("</g></svg>");

        CardDocument {
            element_id: element_id.to_string(),
            width: CARD_WIDTH as u32,
            height: height as u32,
            svg,
            lines: self.lines,
        }
    }
}

fn char_width(c: char, size: f32) -> f32 {
    if c.is_ascii() {
        size * 0.55
    } else {
        size
    }
}

fn estimate_width(text: &str, size: f32) -> f32 {
    text.chars().map(|c| char_width(c, size)).sum()
}

/// Greedy word wrap against an estimated glyph width.
fn wrap_text(text: &str, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = vec![];
    let mut current = String::new();

    for word in text.split_whitespace() {
        for piece in split_long_word(word, size, max_width) {
            let candidate = if current.is_empty() {
                piece.clone()
            } else {
                format!("{} {}", current, piece)
            };
            if estimate_width(&candidate, size) <= max_width || current.is_empty() {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, piece));
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Cuts a word wider than a whole line into line-sized chunks.
fn split_long_word(word: &str, size: f32, max_width: f32) -> Vec<String> {
    if estimate_width(word, size) <= max_width {
        return vec![word.to_string()];
    }

    let mut pieces = vec![];
    let mut piece = String::new();
    let mut width = 0.0;
    for c in word.chars() {
        let w = char_width(c, size);
        if width + w > max_width && !piece.is_empty() {
            pieces.push(std::mem::take(&mut piece));
            width = 0.0;
        }
        piece.push(c);
        width += w;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
