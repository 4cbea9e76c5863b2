//! Interactive wizard: terminal lifecycle and the main event loop.
//!
//! One thread owns the model. Keyboard events and runtime replies both
//! become [`WizardMsg`] values fed through the pure update function; the
//! returned commands go straight back to the runtime.

use std::io::{self, Stdout};
use std::path::Path;
use std::time::Duration;

use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};

use crate::catalog::{CATALOG, ContextId};
use crate::core::config::Config;
use crate::core::errors::{PxpError, Result};
use crate::logger::jsonl::ActivityEvent;
use crate::session::SessionRuntime;
use crate::wizard::model::{Stage, WizardModel, WizardMsg};
use crate::wizard::update::update;

use super::render;

/// Keyboard poll interval; also caps render latency for runtime replies.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run the interactive wizard until the user quits.
///
/// `initial_path` and `initial_context` prefill the session as if the user
/// had dropped the file and picked the card; both are optional.
///
/// # Errors
/// Terminal setup or IO failures. The terminal is restored on every exit
/// path, including errors.
pub fn run(
    config: &Config,
    initial_path: Option<&Path>,
    initial_context: Option<ContextId>,
) -> Result<()> {
    let mut runtime = SessionRuntime::new(config);
    let mut model = WizardModel::new(config, runtime.used_today());
    if let Some(context) = initial_context {
        model.selected_context = Some(context);
        model.context_cursor = CATALOG.iter().position(|e| e.id == context).unwrap_or(0);
    }

    let config_hash = config
        .stable_hash()
        .unwrap_or_else(|_| "unknown".to_string());
    runtime.log(&ActivityEvent::SessionStarted {
        config_hash,
        used_today: model.daily_used,
    });

    if let Some(path) = initial_path {
        let cmd = update(&mut model, WizardMsg::DropPath(path.display().to_string()));
        runtime.execute(cmd);
    }

    let mut stdout = io::stdout();
    terminal::enable_raw_mode().map_err(terminal_error)?;
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste).map_err(terminal_error)?;

    let result = run_loop(&mut stdout, &mut model, &mut runtime);

    // Always restore the terminal, even when the loop errored.
    let _ = execute!(stdout, DisableBracketedPaste, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();

    runtime.log(&ActivityEvent::SessionEnded {
        completed: runtime.completed(),
    });
    result
}

fn run_loop(
    stdout: &mut Stdout,
    model: &mut WizardModel,
    runtime: &mut SessionRuntime,
) -> Result<()> {
    let mut dirty = true;
    loop {
        // Drain runtime replies first so the next frame shows fresh state.
        while let Some(msg) = runtime.try_recv() {
            let cmd = update(model, msg);
            runtime.execute(cmd);
            dirty = true;
        }
        if model.quit {
            return Ok(());
        }

        if dirty {
            let (cols, _rows) = terminal::size().map_err(terminal_error)?;
            render::draw(stdout, model, cols as usize).map_err(terminal_error)?;
            dirty = false;
        }

        if !event::poll(POLL_INTERVAL).map_err(terminal_error)? {
            continue;
        }
        match event::read().map_err(terminal_error)? {
            Event::Key(key) => {
                if let Some(msg) = translate_key(model, key) {
                    let cmd = update(model, msg);
                    runtime.execute(cmd);
                    dirty = true;
                }
            }
            // Terminal drag-and-drop arrives as a bracketed paste.
            Event::Paste(pasted) => {
                let cmd = update(model, WizardMsg::DropPath(pasted));
                runtime.execute(cmd);
                dirty = true;
            }
            Event::Resize(..) => dirty = true,
            _ => {}
        }
    }
}

/// Map a key event to a wizard message for the current stage.
///
/// Upload treats printable keys as path input, so global shortcuts there
/// are limited to keys that can never appear in a path (Esc, Ctrl-C).
fn translate_key(model: &WizardModel, key: KeyEvent) -> Option<WizardMsg> {
    // Windows terminals deliver both press and release events.
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(WizardMsg::Quit);
    }

    match model.stage {
        Stage::Upload => match key.code {
            KeyCode::Enter => Some(WizardMsg::SubmitPath),
            KeyCode::Backspace => Some(WizardMsg::InputBackspace),
            KeyCode::Esc => Some(WizardMsg::Quit),
            KeyCode::Char(c) => Some(WizardMsg::InputChar(c)),
            _ => None,
        },
        Stage::Context => match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(WizardMsg::ContextCursorUp),
            KeyCode::Down | KeyCode::Char('j') => Some(WizardMsg::ContextCursorDown),
            // Enter confirms the highlighted card; a second Enter on an
            // already-selected card starts the pipeline.
            KeyCode::Enter | KeyCode::Char(' ') => {
                if model.selected_context == Some(model.cursor_context()) {
                    Some(WizardMsg::StartOptimize)
                } else {
                    Some(WizardMsg::ContextChosen(model.cursor_context()))
                }
            }
            KeyCode::Char('o') => Some(WizardMsg::StartOptimize),
            KeyCode::Char(c @ '1'..='4') => digit_context(c).map(WizardMsg::ContextChosen),
            KeyCode::Esc => Some(WizardMsg::Reset),
            _ => None,
        },
        Stage::Processing => match key.code {
            KeyCode::Esc => Some(WizardMsg::Reset),
            KeyCode::Char('q') => Some(WizardMsg::Quit),
            _ => None,
        },
        Stage::Result => match key.code {
            KeyCode::Char('d') | KeyCode::Enter => Some(WizardMsg::Download),
            KeyCode::Char('r') => Some(WizardMsg::Reset),
            KeyCode::Char('q') | KeyCode::Esc => Some(WizardMsg::Quit),
            _ => None,
        },
    }
}

/// Number-row shortcut on the context screen.
fn digit_context(digit: char) -> Option<ContextId> {
    let idx = (digit as usize).checked_sub('1' as usize)?;
    CATALOG.get(idx).map(|entry| entry.id)
}

fn terminal_error(e: io::Error) -> PxpError {
    PxpError::Terminal {
        details: e.to_string(),
    }
}

// ──────────────────── tests ────────────────────
