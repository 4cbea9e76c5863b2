//! Stateless draw layer for the four wizard screens.
//!
//! Follows the direct-crossterm approach: fixed layouts, `queue!` plus
//! `write!` per line, one flush per frame. No widget framework — the
//! screens are small and the layout is static.

#![allow(clippy::cast_possible_truncation)]

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Attribute, Color, SetAttribute, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};

use crate::catalog::CATALOG;
use crate::present::{ProcessingStage, format_size};
use crate::wizard::model::{Notice, NoticeSeverity, Stage, WizardModel};

/// Horizontal gauge width on the processing screen.
const GAUGE_WIDTH: usize = 30;

/// Draw one full frame for the current model state.
pub fn draw<W: Write>(out: &mut W, model: &WizardModel, width: usize) -> io::Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;

    let mut row = draw_header(out, model, width)?;
    row += 1;

    row = match model.stage {
        Stage::Upload => draw_upload(out, model, row)?,
        Stage::Context => draw_context(out, model, row)?,
        Stage::Processing => draw_processing(out, model, row)?,
        Stage::Result => draw_result(out, model, row)?,
    };

    row += 1;
    row = draw_notices(out, model, row)?;
    row += 1;
    draw_footer(out, model, width, row)?;

    out.flush()
}

// ──────────────────── header / footer ────────────────────

fn draw_header<W: Write>(out: &mut W, model: &WizardModel, width: usize) -> io::Result<u16> {
    let header = format!(" PixelPress  [{}]", model.stage.title());
    let right = format!("{} ", model.usage_label());
    let pad = width.saturating_sub(header.len() + right.len() + 4);

    queue!(
        out,
        MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        SetAttribute(Attribute::Bold),
    )?;
    write!(out, "┌─{header}{:─<pad$}{right}─┐", "")?;
    queue!(out, SetAttribute(Attribute::Reset))?;
    Ok(1)
}

fn draw_footer<W: Write>(
    out: &mut W,
    model: &WizardModel,
    width: usize,
    row: u16,
) -> io::Result<()> {
    let footer = footer_hint(model.stage);
    let pad = width.saturating_sub(footer.len() + 4);
    queue!(out, MoveTo(0, row), SetForegroundColor(Color::Cyan))?;
    write!(out, "└─{footer}{:─<pad$}─┘", "")?;
    queue!(out, SetAttribute(Attribute::Reset))?;
    Ok(())
}

/// Key hints for the footer line. ASCII only so box padding stays exact.
fn footer_hint(stage: Stage) -> &'static str {
    match stage {
        Stage::Upload => " Enter to submit, Esc to quit ",
        Stage::Context => " Up/Down move, Enter select, o optimize, Esc back ",
        Stage::Processing => " Esc to cancel ",
        Stage::Result => " d download, r start over, q quit ",
    }
}

// ──────────────────── upload screen ────────────────────

fn draw_upload<W: Write>(out: &mut W, model: &WizardModel, mut row: u16) -> io::Result<u16> {
    queue!(out, MoveTo(3, row), SetForegroundColor(Color::White))?;
    write!(
        out,
        "Drag an image onto this window, or type a path and press Enter."
    )?;
    row += 2;

    let caret = if model.editing { "█" } else { "" };
    queue!(out, MoveTo(3, row), SetForegroundColor(Color::White))?;
    write!(out, "Path: ")?;
    queue!(out, SetForegroundColor(Color::Cyan))?;
    write!(out, "{}{caret}", model.input)?;
    row += 2;

    queue!(out, MoveTo(3, row), SetForegroundColor(Color::DarkGrey))?;
    write!(out, "{}", format_hint(model.max_file_bytes))?;
    queue!(out, SetAttribute(Attribute::Reset))?;
    Ok(row + 1)
}

/// Accepted-formats line under the path prompt.
fn format_hint(max_file_bytes: u64) -> String {
    format!("JPG, PNG or WebP, up to {}.", format_size(max_file_bytes))
}

// ──────────────────── context screen ────────────────────

fn draw_context<W: Write>(out: &mut W, model: &WizardModel, mut row: u16) -> io::Result<u16> {
    queue!(out, MoveTo(3, row), SetForegroundColor(Color::White))?;
    write!(out, "Where will this image be used?")?;
    row += 2;

    for (idx, entry) in CATALOG.iter().enumerate() {
        let under_cursor = idx == model.context_cursor;
        let selected = model.selected_context == Some(entry.id);

        let cursor = if under_cursor { "›" } else { " " };
        let marker = if selected { "●" } else { "○" };

        queue!(out, MoveTo(1, row), SetForegroundColor(Color::Cyan))?;
        write!(out, "{cursor} ")?;
        let color = if selected { Color::Cyan } else { Color::White };
        queue!(out, SetForegroundColor(color))?;
        if under_cursor {
            queue!(out, SetAttribute(Attribute::Bold))?;
        }
        write!(out, "{marker} [{}] {:<12}", idx + 1, entry.label)?;
        queue!(out, SetAttribute(Attribute::Reset), SetForegroundColor(color))?;
        write!(out, "{}", entry.description)?;
        queue!(out, SetAttribute(Attribute::Reset))?;
        row += 1;

        if under_cursor {
            queue!(out, MoveTo(7, row), SetForegroundColor(Color::DarkGrey))?;
            write!(out, "{}", entry.hints.join(" · "))?;
            queue!(out, SetAttribute(Attribute::Reset))?;
            row += 1;
        }
    }
    Ok(row)
}

// ──────────────────── processing screen ────────────────────

fn draw_processing<W: Write>(out: &mut W, model: &WizardModel, mut row: u16) -> io::Result<u16> {
    if let Some(candidate) = model.candidate.as_ref() {
        queue!(out, MoveTo(3, row), SetForegroundColor(Color::DarkGrey))?;
        write!(
            out,
            "{} · {}",
            candidate.file_name,
            format_size(candidate.size_bytes)
        )?;
        row += 2;
    }

    let stage = model.processing_stage;
    queue!(
        out,
        MoveTo(3, row),
        SetForegroundColor(Color::White),
        SetAttribute(Attribute::Bold),
    )?;
    write!(out, "{}", stage.label())?;
    queue!(out, SetAttribute(Attribute::Reset))?;
    row += 2;

    queue!(out, MoveTo(3, row), SetForegroundColor(Color::Cyan))?;
    write!(out, "{}", gauge(stage.progress(), GAUGE_WIDTH))?;
    row += 2;

    queue!(out, MoveTo(3, row), SetForegroundColor(Color::DarkGrey))?;
    write!(out, "{}", step_line(stage))?;
    queue!(out, SetAttribute(Attribute::Reset))?;
    Ok(row + 1)
}

/// Horizontal bar gauge: `[███████░░░] 75%`.
fn gauge(percent: u8, width: usize) -> String {
    let filled = (usize::from(percent) * width + 50) / 100;
    let filled = filled.min(width);
    format!(
        "[{}{}] {percent}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
    )
}

/// `Step N of 4` under the gauge.
fn step_line(stage: ProcessingStage) -> String {
    let position = ProcessingStage::SEQUENCE
        .iter()
        .position(|s| *s == stage)
        .unwrap_or_default();
    format!(
        "Step {} of {}",
        position + 1,
        ProcessingStage::SEQUENCE.len()
    )
}

// ──────────────────── result screen ────────────────────

fn draw_result<W: Write>(out: &mut W, model: &WizardModel, mut row: u16) -> io::Result<u16> {
    let Some(view) = model.comparison() else {
        return Ok(row);
    };

    queue!(out, MoveTo(3, row), SetForegroundColor(Color::White))?;
    write!(out, "{:<11}{:>10}", "Original", view.original_display())?;
    row += 1;

    queue!(out, MoveTo(3, row), SetForegroundColor(Color::Green))?;
    write!(
        out,
        "{:<11}{:>10} · {}",
        "Optimized",
        view.optimized_display(),
        view.format_label,
    )?;
    row += 1;

    queue!(out, MoveTo(3, row), SetForegroundColor(Color::Green))?;
    write!(
        out,
        "{:<11}{:>10} ({}% smaller)",
        "Savings",
        view.savings_display(),
        view.ratio_percent,
    )?;
    row += 1;

    queue!(out, MoveTo(3, row), SetForegroundColor(Color::White))?;
    write!(out, "{:<11}{}% retained", "Quality", view.quality_percent)?;
    queue!(out, SetAttribute(Attribute::Reset))?;
    row += 2;

    if let Some(saved) = model.last_saved.as_ref() {
        queue!(out, MoveTo(3, row), SetForegroundColor(Color::DarkGrey))?;
        write!(out, "Saved to {}", saved.display())?;
        queue!(out, SetAttribute(Attribute::Reset))?;
        row += 1;
    }
    Ok(row)
}

// ──────────────────── notices ────────────────────

fn draw_notices<W: Write>(out: &mut W, model: &WizardModel, mut row: u16) -> io::Result<u16> {
    for notice in &model.notices {
        let color = match notice.severity {
            NoticeSeverity::Neutral => Color::Green,
            NoticeSeverity::Destructive => Color::Red,
        };
        queue!(out, MoveTo(1, row), SetForegroundColor(color))?;
        write!(out, "{}", notice_line(notice))?;
        queue!(out, SetAttribute(Attribute::Reset))?;
        row += 1;
    }
    Ok(row)
}

/// One-line notice rendering: glyph, title, body.
fn notice_line(notice: &Notice) -> String {
    let glyph = match notice.severity {
        NoticeSeverity::Neutral => "✓",
        NoticeSeverity::Destructive => "✗",
    };
    format!("{glyph} {}: {}", notice.title, notice.body)
}

// ──────────────────── tests ────────────────────
