//! Interactive Terminal Flow
//!
//! Card chooser -> form -> card preview -> edit / download / choose another.
//! Generic over the reader and writer so the flow can be scripted.

use std::cell::Cell;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::time::Instant;
use thiserror::Error;

use crate::config::AppConfig;
use crate::download::DownloadSink;
use crate::raster::{RasterError, Rasterizer};
use crate::templates::{CardTemplate, TemplateRegistry};
use crate::workflow::{CardSession, SessionError, ViewState};

const BACK: &str = "<";
const CLEAR: &str = "-";

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("Terminal I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

enum Flow {
    Continue,
    Quit,
}

pub struct Terminal<'a, R, W> {
    registry: &'a TemplateRegistry,
    config: &'a AppConfig,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Terminal<'a, R, W> {
    pub fn new(registry: &'a TemplateRegistry, config: &'a AppConfig, input: R, output: W) -> Self {
        Self { registry, config, input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Runs until the user quits or input ends.
    pub fn run(
        &mut self,
        rasterizer: &dyn Rasterizer,
        sink: &mut dyn DownloadSink,
    ) -> Result<(), TerminalError> {
        let registry = self.registry;
        loop {
            let templates = registry.list();
            writeln!(self.output, "\nChoose a card (q to quit):")?;
            for (i, template) in templates.iter().enumerate() {
                writeln!(self.output, "  {}) {} - {}", i + 1, template.id, template.name)?;
            }
            self.prompt()?;

            let Some(choice) = self.read_line()? else {
                return Ok(());
            };
            let choice = choice.trim();
            if choice.eq_ignore_ascii_case("q") {
                return Ok(());
            }

            let selected = choice
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| templates.get(i).copied())
                .or_else(|| registry.get(choice));

            match selected {
                Some(template) => {
                    if let Flow::Quit = self.run_card(template.clone(), rasterizer, sink)? {
                        return Ok(());
                    }
                }
                None => writeln!(self.output, "Unknown card: {}", choice)?,
            }
        }
    }

    fn run_card(
        &mut self,
        template: CardTemplate,
        rasterizer: &dyn Rasterizer,
        sink: &mut dyn DownloadSink,
    ) -> Result<Flow, TerminalError> {
        let left = Rc::new(Cell::new(false));
        let flag = Rc::clone(&left);
        let mut session = CardSession::new(template)
            .with_back(move || flag.set(true))
            .with_locale(self.config.locale)
            .with_raster_options(self.config.raster_options()?)
            .with_toast_duration(self.config.toast_duration());

        while !left.get() {
            let flow = match session.view() {
                ViewState::Form => self.form_step(&mut session)?,
                ViewState::Card => self.card_step(&mut session, rasterizer, sink)?,
            };
            if let Flow::Quit = flow {
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Prompts every field, or only the failing ones after a rejected submit.
    fn form_step(&mut self, session: &mut CardSession) -> Result<Flow, TerminalError> {
        let template = session.template().clone();
        writeln!(
            self.output,
            "\n{} ({} to go back, {} to clear a value, enter to keep it)",
            template.name, BACK, CLEAR
        )?;

        let retry = !session.errors().is_empty();
        for field in &template.fields {
            if retry && session.errors().get(&field.name).is_none() {
                continue;
            }

            write!(self.output, "{}", field.label)?;
            if field.is_required() {
                write!(self.output, " *")?;
            }
            let current = session.form().get(&field.name);
            if !current.is_empty() {
                write!(self.output, " [{}]", current)?;
            } else if let Some(placeholder) = &field.placeholder {
                write!(self.output, " ({})", placeholder)?;
            }
            if let Some(message) = session.errors().get(&field.name) {
                write!(self.output, "\n  ! {}", message)?;
            }
            writeln!(self.output)?;
            self.prompt()?;

            let Some(answer) = self.read_line()? else {
                return Ok(Flow::Quit);
            };
            match answer.trim() {
                BACK => {
                    session.back();
                    return Ok(Flow::Continue);
                }
                "" => {}
                CLEAR => session.set_field(&field.name, "")?,
                _ => session.set_field(&field.name, answer.as_str())?,
            }
        }

        let result = session.submit();
        if !result.valid {
            writeln!(self.output, "Please fix {} field(s):", result.errors.len())?;
            for (name, message) in result.errors.iter() {
                let label = template.field(name).map_or(name, |f| f.label.as_str());
                writeln!(self.output, "  - {}: {}", label, message)?;
            }
        }
        Ok(Flow::Continue)
    }

    fn card_step(
        &mut self,
        session: &mut CardSession,
        rasterizer: &dyn Rasterizer,
        sink: &mut dyn DownloadSink,
    ) -> Result<Flow, TerminalError> {
        let document = session.render()?;
        writeln!(self.output, "\n----- {} -----", document.element_id)?;
        for line in &document.lines {
            writeln!(self.output, "  {}", line)?;
        }
        writeln!(self.output, "-----")?;
        writeln!(self.output, "[e] Edit Details  [d] Download Card  [c] Choose Another")?;
        self.prompt()?;

        let Some(answer) = self.read_line()? else {
            return Ok(Flow::Quit);
        };
        match answer.trim().to_ascii_lowercase().as_str() {
            "e" => {
                session.edit();
            }
            "d" => {
                let now = Instant::now();
                let outcome = session.export(rasterizer, sink, now);
                if let Some(toast) = session.toast(now) {
                    writeln!(self.output, "{}", toast.text)?;
                }
                match outcome {
                    Ok(card) => {
                        let saved = card
                            .location
                            .map_or(card.filename, |p| p.display().to_string());
                        writeln!(self.output, "Saved {}", saved)?;
                    }
                    Err(SessionError::Export(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            "c" => session.back(),
            other => writeln!(self.output, "Unknown action: {}", other)?,
        }
        Ok(Flow::Continue)
    }

    fn prompt(&mut self) -> io::Result<()> {
        write!(self.output, "> ")?;
        self.output.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string()))
    }
}
