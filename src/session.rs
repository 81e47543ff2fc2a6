//! A running playroom
//!
//! `PlayroomSession` owns the editor state, the frame set and the persisted
//! store. Actions go in through [`PlayroomSession::dispatch`]; timers and
//! frame messages come out of [`PlayroomSession::next_event`], which the host
//! polls in its event loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::compiler::validate_code;
use crate::config::PlayroomConfig;
use crate::debounce::Debouncer;
use crate::error::{CompileError, Result};
use crate::frame_set::{FrameErrorState, FrameKey, FrameSet};
use crate::message::FrameMessage;
use crate::scope::{ComponentRegistry, ScopeBuilder};
use crate::storage::{SessionStore, StoredSession};
use crate::store::{update, Action, Effect, EditorState, PersistSnapshot};
use crate::url_state::{create_preview_url, create_url, decode_url, SharedState};

/// Something that happened while the host was waiting
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Debounced code reached the frames (or failed to compile)
    Rendered {
        code: String,
        result: std::result::Result<(), CompileError>,
    },
    /// Debounced snapshot was written; failures are logged, not raised
    Persisted { ok: bool },
    Frame { key: FrameKey, message: FrameMessage },
}

enum Fired {
    Render(String),
    Persist(PersistSnapshot),
    Frame(FrameKey, FrameMessage),
}

pub struct PlayroomSession {
    config: Arc<PlayroomConfig>,
    state: EditorState,
    frames: FrameSet,
    store: SessionStore,
    render_debounce: Debouncer<String>,
    persist_debounce: Debouncer<PersistSnapshot>,
    persist_writes: u64,
}

impl PlayroomSession {
    /// Validate the config, restore the previous session and render the
    /// initial code. Must be called from within a tokio runtime.
    ///
    /// Initial code comes from the share `url` when URL decoding is enabled,
    /// then from the stored session, then from the configured example.
    pub fn open(
        config: Arc<PlayroomConfig>,
        scope_builder: ScopeBuilder,
        registry: &ComponentRegistry,
        store: SessionStore,
        url: Option<&str>,
    ) -> Result<Self> {
        config.validate()?;

        let stored = store.read().unwrap_or_else(|e| {
            warn!("Could not restore previous session: {}", e);
            StoredSession::default()
        });

        let mut state = EditorState::from_config(&config);
        restore_editor(&mut state, &stored);

        let shared = if config.decode_url_state {
            url.and_then(decode_url)
        } else {
            None
        };
        match shared {
            Some(shared) => {
                debug!("Opening playroom from share link");
                // frames don't exist yet; sync and render happen below
                let _ = update(&mut state, Action::OpenPlayroom(shared));
            }
            None => {
                if let Some(code) = stored.code {
                    state.code = code;
                }
            }
        }
        state.ready = true;

        let frames = FrameSet::new(config.clone(), scope_builder, registry)?;
        let timing = &config.timing;
        let mut session = Self {
            render_debounce: Debouncer::new(Duration::from_millis(timing.render_debounce_ms)),
            persist_debounce: Debouncer::new(Duration::from_millis(timing.persist_debounce_ms)),
            config: config.clone(),
            state,
            frames,
            store,
            persist_writes: 0,
        };

        let targets = session.state.render_targets();
        session.frames.sync_targets(&targets);
        let code = session.state.code.clone();
        let _ = session.render(&code);

        info!(
            "Playroom session open: {} frames, store '{}'",
            session.frames.len(),
            session.store.namespace()
        );
        Ok(session)
    }

    pub fn dispatch(&mut self, action: Action) {
        for effect in update(&mut self.state, action) {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ScheduleRender(code) => self.render_debounce.schedule(code),
            Effect::RenderNow(code) => {
                self.render_debounce.cancel();
                let _ = self.render(&code);
            }
            Effect::SchedulePersist(snapshot) => self.persist_debounce.schedule(snapshot),
            Effect::SyncFrames => {
                let targets = self.state.render_targets();
                self.frames.sync_targets(&targets);
                // a hidden frame's error must not linger in the editor
                self.refresh_error_message();
            }
        }
    }

    /// Fan `code` out to the frames and record the compile outcome
    fn render(&mut self, code: &str) -> std::result::Result<(), CompileError> {
        let result = self.frames.update_code(code);
        let compile_error = match &result {
            Ok(()) => None,
            // prefer the located diagnostic for the editor gutter
            Err(e) => Some(validate_code(code).err().unwrap_or_else(|| e.clone())),
        };
        if let Some(error) = &compile_error {
            debug!("Compile error: {}", error);
        }
        let _ = update(&mut self.state, Action::SetCompileError(compile_error));
        result
    }

    /// Wait for the next debounced render, persistence write or frame
    /// message and apply it. `None` once every source has shut down.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let fired = tokio::select! {
            Some(code) = self.render_debounce.fired() => Fired::Render(code),
            Some(snapshot) = self.persist_debounce.fired() => Fired::Persist(snapshot),
            Some((key, message)) = self.frames.next_message() => Fired::Frame(key, message),
            else => return None,
        };

        Some(match fired {
            Fired::Render(code) => {
                let result = self.render(&code);
                SessionEvent::Rendered { code, result }
            }
            Fired::Persist(snapshot) => SessionEvent::Persisted {
                ok: self.persist(&snapshot),
            },
            Fired::Frame(key, message) => {
                if matches!(message, FrameMessage::Error { .. }) {
                    self.refresh_error_message();
                }
                SessionEvent::Frame { key, message }
            }
        })
    }

    fn persist(&mut self, snapshot: &PersistSnapshot) -> bool {
        match self.store.write(snapshot) {
            Ok(()) => {
                self.persist_writes += 1;
                true
            }
            Err(e) => {
                warn!("Failed to persist session: {}", e);
                false
            }
        }
    }

    /// The banner shows the first failing frame in frame order
    fn refresh_error_message(&mut self) {
        let first = self
            .frames
            .keys()
            .find_map(|key| self.frames.frame_error(key))
            .map(|error| (error.message.clone(), error.delay_visibility));
        let action = match first {
            Some((message, delay_visibility)) => Action::ReportFrameError {
                message,
                delay_visibility,
            },
            None => Action::ResetErrorMessage,
        };
        self.dispatch(action);
    }

    /// Rebuild the scope from `registry` and restart every frame
    pub fn reload_components(&mut self, registry: &ComponentRegistry) -> Result<()> {
        self.frames.reload_components(registry)?;
        let _ = update(&mut self.state, Action::ResetErrorMessage);
        Ok(())
    }

    /// Link reproducing the current code, frame filters and title
    pub fn share_url(&self) -> String {
        let state = SharedState {
            code: self.state.code.clone(),
            theme: None,
            themes: non_empty(&self.state.selected_themes),
            widths: non_empty(&self.state.selected_widths),
            title: self.state.title.clone(),
        };
        create_url(&self.config.base_url, self.config.params_type, &state)
    }

    /// Preview link; previews render a single theme
    pub fn preview_url(&self, theme: Option<&str>) -> String {
        let theme = theme
            .map(str::to_string)
            .or_else(|| self.state.selected_themes.first().cloned())
            .or_else(|| self.config.themes.first().cloned());
        let state = SharedState {
            code: self.state.code.clone(),
            theme,
            title: self.state.title.clone(),
            ..SharedState::default()
        };
        create_preview_url(&self.config.base_url, self.config.params_type, &state)
    }

    /// Error worth showing at `now`, honouring the soft-error grace period
    pub fn visible_error(&self, now: Instant) -> Option<(&FrameKey, &FrameErrorState)> {
        self.frames.visible_error(now)
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn config(&self) -> &PlayroomConfig {
        &self.config
    }

    pub fn frames(&self) -> &FrameSet {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut FrameSet {
        &mut self.frames
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Successful persistence writes since the session opened
    pub fn persist_writes(&self) -> u64 {
        self.persist_writes
    }
}

fn restore_editor(state: &mut EditorState, stored: &StoredSession) {
    if let Some(position) = stored.editor_position {
        state.editor_position = position;
    }
    if let Some(width) = stored.editor_width {
        state.editor_width = width;
    }
    if let Some(height) = stored.editor_height {
        state.editor_height = height;
    }
}

fn non_empty<T: Clone>(items: &[T]) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items.to_vec())
    }
}
