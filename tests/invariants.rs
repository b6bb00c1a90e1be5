//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees of the card flow.

use std::time::Instant;

use invitecards_core::{
    format::{format_date, format_time, ordinal, DateLocale},
    hashing::compute_job_hash,
    raster::{RasterError, RasterImage},
    workflow::{FAILURE_NOTICE, SUCCESS_NOTICE},
    CardDocument, CardSession, DirectorySink, ExportFormat, MemorySink, RasterOptions, Rasterizer,
    ResvgRasterizer, SessionError, TemplateRegistry, ViewState,
};

fn session(card: &str) -> CardSession {
    let registry = TemplateRegistry::builtin().unwrap();
    CardSession::new(registry.get(card).unwrap().clone())
}

fn filled_anniversary() -> CardSession {
    let mut s = session("anniversary");
    s.set_field("guestName", "Anita").unwrap();
    s.set_field("years", "25").unwrap();
    s.set_field("partner1", "Rahul Sharma").unwrap();
    s.set_field("partner2", "Priya Sharma").unwrap();
    s.set_field("date", "2025-03-14").unwrap();
    s.set_field("venue", "Hotel Grand").unwrap();
    s
}

fn filled(card: &str) -> CardSession {
    let mut s = session(card);
    let template = s.template().clone();
    for field in template.required_fields() {
        let value = match field.name.as_str() {
            "years" | "age" => "10",
            "date" => "2025-03-14",
            _ => "Sample",
        };
        s.set_field(&field.name, value).unwrap();
    }
    s
}

struct BrokenRasterizer;

impl Rasterizer for BrokenRasterizer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Png
    }

    fn rasterize(&self, _: &CardDocument, _: &RasterOptions) -> Result<RasterImage, RasterError> {
        Err(RasterError::EmptyCanvas)
    }
}

fn png_dimensions(bytes: &[u8]) -> (u32, u32) {
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    (width, height)
}

#[test]
fn invariant_each_missing_required_field_blocks_card() {
    for card in ["anniversary", "birthday", "jagrata"] {
        let required: Vec<String> = session(card)
            .template()
            .required_fields()
            .map(|f| f.name.clone())
            .collect();

        for name in &required {
            let mut s = filled(card);
            s.set_field(name, "   ").unwrap();
            let result = s.submit();

            assert!(!result.valid, "{card}: {name} left empty");
            assert_eq!(result.errors.len(), 1);
            assert!(result.errors.get(name).is_some());
            assert_eq!(s.view(), ViewState::Form);
        }
    }
}

#[test]
fn invariant_optional_fields_may_stay_empty() {
    for card in ["anniversary", "birthday", "jagrata"] {
        let mut s = filled(card);
        assert!(s.submit().valid, "{card}");
        assert_eq!(s.view(), ViewState::Card);
        assert!(s.errors().is_empty());
    }
}

#[test]
fn invariant_editing_clears_only_that_error() {
    let mut s = session("anniversary");
    let result = s.submit();
    assert_eq!(result.errors.len(), 6);
    assert_eq!(result.errors.get("partner1"), Some("Partner 1 name is required"));

    s.set_field("partner1", "Rahul").unwrap();
    assert!(s.errors().get("partner1").is_none());
    assert_eq!(s.errors().len(), 5);
    assert_eq!(s.errors().get("venue"), Some("Venue name is required"));
}

#[test]
fn invariant_numeric_field_out_of_range() {
    for bad in ["121", "abc"] {
        let mut s = filled("birthday");
        s.set_field("age", bad).unwrap();
        let result = s.submit();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors.get("age"),
            Some("Which Birthday? (Age) must be a whole number between 1 and 120")
        );
        assert_eq!(s.view(), ViewState::Form);
    }
}

#[test]
fn invariant_ordinals() {
    let expected = [
        (1, "1st"), (2, "2nd"), (3, "3rd"), (4, "4th"),
        (11, "11th"), (12, "12th"), (13, "13th"),
        (21, "21st"), (22, "22nd"), (101, "101st"), (111, "111th"),
    ];
    for (n, text) in expected {
        assert_eq!(ordinal(n), text);
    }
}

#[test]
fn invariant_formatting_is_total() {
    assert_eq!(format_date("", DateLocale::EnIn), "");
    assert_eq!(format_date("2025-03-14", DateLocale::EnIn), "Friday, 14 March, 2025");
    assert_eq!(format_date("soon", DateLocale::EnIn), "soon");
    assert_eq!(format_time(""), "");
    assert_eq!(format_time("00:05"), "12:05 AM");
    assert_eq!(format_time("19:30"), "7:30 PM");
}

#[test]
fn invariant_card_shows_formatted_values() {
    let mut s = filled_anniversary();
    s.set_field("time", "19:30").unwrap();
    assert!(s.submit().valid);

    let card = s.render().unwrap();
    assert_eq!(card.element_id, "anniv-card-print");
    assert!(card.contains_text("25th Anniversary"));
    assert!(card.contains_text("Friday, 14 March, 2025 at 7:30 PM"));
    assert!(!card.contains_text("{"));
}

#[test]
fn invariant_jagrata_default_start_time() {
    let mut s = filled("jagrata");
    assert!(s.submit().valid);
    let card = s.render().unwrap();
    assert!(card.contains_text("Ratri 9:00 Baje Se Prabhat Tak"));
}

#[test]
fn invariant_one_export_at_a_time() {
    let mut s = filled_anniversary();
    s.submit();

    let job = s.begin_export().unwrap();
    assert!(s.is_exporting());
    assert!(matches!(s.begin_export(), Err(SessionError::ExportPending)));

    let mut sink = MemorySink::new();
    let outcome = job.run(&invitecards_core::SvgPassthrough, &mut sink);
    s.finish_export(outcome, Instant::now()).unwrap();
    assert!(!s.is_exporting());
    assert_eq!(sink.downloads.len(), 1);
}

#[test]
fn invariant_export_requires_card_view() {
    let mut s = filled_anniversary();
    assert!(matches!(s.begin_export(), Err(SessionError::NotOnCard)));
    assert!(!s.is_exporting());
}

#[test]
fn invariant_failed_export_stays_on_card() {
    let mut s = filled_anniversary();
    s.submit();

    let now = Instant::now();
    let mut sink = MemorySink::new();
    let err = s.export(&BrokenRasterizer, &mut sink, now).unwrap_err();

    assert!(matches!(err, SessionError::Export(_)));
    assert_eq!(s.view(), ViewState::Card);
    assert!(!s.is_exporting());
    assert_eq!(s.toast(now).unwrap().text, FAILURE_NOTICE);
    assert!(sink.downloads.is_empty());
}

#[test]
fn invariant_png_export_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = filled_anniversary();
    s.submit();
    let height = s.render().unwrap().height;

    let now = Instant::now();
    let mut sink = DirectorySink::new(dir.path());
    let card = s.export(&ResvgRasterizer::new(), &mut sink, now).unwrap();

    assert_eq!(card.filename, "Anniversary_Card_Rahul_Sharma_Priya_Sharma.png");
    assert_eq!(card.mime, "image/png");
    assert_eq!(s.toast(now).unwrap().text, SUCCESS_NOTICE);
    assert_eq!(s.view(), ViewState::Card);

    let bytes = std::fs::read(dir.path().join(&card.filename)).unwrap();
    assert_eq!(png_dimensions(&bytes), (960, height * 2));
    assert_eq!(card.size, [960, height * 2]);
}

#[test]
fn invariant_job_hash_follows_the_form() {
    let mut a = filled_anniversary();

    let mut b = session("anniversary");
    b.set_field("venue", "Hotel Grand").unwrap();
    b.set_field("date", "2025-03-14").unwrap();
    b.set_field("partner2", "Priya Sharma").unwrap();
    b.set_field("partner1", "Rahul Sharma").unwrap();
    b.set_field("years", "25").unwrap();
    b.set_field("guestName", "Anita").unwrap();

    let mut c = filled_anniversary();
    c.set_field("years", "26").unwrap();

    let mut sink = MemorySink::new();
    let mut cards = vec![];
    for s in [&mut a, &mut b, &mut c] {
        assert!(s.submit().valid);
        cards.push(s.export(&invitecards_core::SvgPassthrough, &mut sink, Instant::now()).unwrap());
    }

    assert_eq!(cards[0].job_hash, cards[1].job_hash);
    assert_ne!(cards[0].job_hash, cards[2].job_hash);
    assert_ne!(cards[0].id, cards[1].id);
    assert_eq!(
        cards[0].job_hash,
        compute_job_hash("anniversary", "1.0.0", a.form(), invitecards_core::ENGINE_VERSION).unwrap()
    );
}
