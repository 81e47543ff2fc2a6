//! Fan-out of the current code to every visible render target

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::CompileCache;
use crate::compiler::CompileOptions;
use crate::config::PlayroomConfig;
use crate::error::{CompileError, Result};
use crate::frame::{FrameController, ScreenshotSink, UnsupportedScreenshots};
use crate::message::{FrameMessage, ScreenshotAction};
use crate::scope::{ComponentRegistry, EvalScope, ScopeBuilder};

pub const FIT_TO_WINDOW: &str = "Fit to window";

// ═══════════════════════════════════════════════════════════════════════════════
// RENDER TARGETS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Px(u32),
    /// Fills the container instead of a fixed pixel width
    Fit,
}

impl Width {
    pub fn css(&self) -> String {
        match self {
            Width::Px(px) => format!("{}px", px),
            Width::Fit => "100%".to_string(),
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Width::Px(px) => write!(f, "{}", px),
            Width::Fit => f.write_str(FIT_TO_WINDOW),
        }
    }
}

impl Serialize for Width {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Width::Px(px) => serializer.serialize_u32(*px),
            Width::Fit => serializer.serialize_str(FIT_TO_WINDOW),
        }
    }
}

impl<'de> Deserialize<'de> for Width {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Px(u32),
            Label(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Px(px) => Ok(Width::Px(px)),
            Raw::Label(label) if label == FIT_TO_WINDOW => Ok(Width::Fit),
            Raw::Label(label) => Err(serde::de::Error::custom(format!(
                "unknown width '{}'",
                label
            ))),
        }
    }
}

/// Stable identity of a frame across re-renders
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub theme: Option<String>,
    pub width: Width,
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.theme.as_deref().unwrap_or("default"), self.width)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub theme: Option<String>,
    pub width: Width,
}

impl RenderTarget {
    pub fn key(&self) -> FrameKey {
        FrameKey {
            theme: self.theme.clone(),
            width: self.width,
        }
    }
}

/// One target per (width, theme), widths outermost. An empty selection means "all".
pub fn derive_frames(
    selected_themes: &[String],
    selected_widths: &[Width],
    all_themes: &[String],
    all_widths: &[Width],
) -> Vec<RenderTarget> {
    let themes = if selected_themes.is_empty() {
        all_themes
    } else {
        selected_themes
    };
    let widths = if selected_widths.is_empty() {
        all_widths
    } else {
        selected_widths
    };

    let themes: Vec<Option<String>> = if themes.is_empty() {
        vec![None]
    } else {
        themes.iter().cloned().map(Some).collect()
    };

    widths
        .iter()
        .flat_map(|width| {
            themes.iter().map(move |theme| RenderTarget {
                theme: theme.clone(),
                width: *width,
            })
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAME SET
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct FrameErrorState {
    pub message: String,
    pub delay_visibility: bool,
    pub reported_at: Instant,
}

impl FrameErrorState {
    /// Soft errors only show once they outlive the grace period
    pub fn is_visible(&self, now: Instant, grace: Duration) -> bool {
        !self.delay_visibility || now.duration_since(self.reported_at) >= grace
    }
}

pub struct FrameSet {
    config: Arc<PlayroomConfig>,
    scope_builder: ScopeBuilder,
    scope: EvalScope,
    screenshots: Arc<dyn ScreenshotSink>,
    cache: CompileCache,
    options: CompileOptions,
    frames: IndexMap<FrameKey, FrameController>,
    errors: HashMap<FrameKey, FrameErrorState>,
    compiled: Option<String>,
    messages_tx: mpsc::UnboundedSender<(FrameKey, serde_json::Value)>,
    messages_rx: mpsc::UnboundedReceiver<(FrameKey, serde_json::Value)>,
    recomputes: u64,
}

impl FrameSet {
    /// Build the scope up front; a reserved-name collision fails here
    pub fn new(
        config: Arc<PlayroomConfig>,
        scope_builder: ScopeBuilder,
        registry: &ComponentRegistry,
    ) -> Result<Self> {
        let scope = scope_builder.build(registry)?;
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        let options = CompileOptions::from(&config.pragma);
        Ok(Self {
            config,
            scope_builder,
            scope,
            screenshots: Arc::new(UnsupportedScreenshots),
            cache: CompileCache::new(),
            options,
            frames: IndexMap::new(),
            errors: HashMap::new(),
            compiled: None,
            messages_tx,
            messages_rx,
            recomputes: 0,
        })
    }

    pub fn with_screenshot_sink(mut self, sink: Arc<dyn ScreenshotSink>) -> Self {
        self.screenshots = sink;
        self
    }

    /// Reconcile frames with `targets` by key. Surviving frames keep their
    /// load state; new frames start unloaded at the current code.
    pub fn sync_targets(&mut self, targets: &[RenderTarget]) {
        let mut previous = std::mem::take(&mut self.frames);
        for target in targets {
            let key = target.key();
            let controller = match previous.shift_remove(&key) {
                Some(existing) => existing,
                None => {
                    let mut controller = FrameController::spawn(
                        key.clone(),
                        self.scope.clone(),
                        self.screenshots.clone(),
                        self.messages_tx.clone(),
                    );
                    if let Some(code) = &self.compiled {
                        controller.navigate(self.config.frame_src_for(key.theme.as_deref(), code));
                    }
                    controller
                }
            };
            self.frames.insert(key, controller);
        }
        for key in previous.keys() {
            self.errors.remove(key);
        }
        debug!(
            "Synced frames: {} active, {} removed",
            self.frames.len(),
            previous.len()
        );
    }

    /// Compile once and navigate every frame. On a compile error the frames
    /// keep showing what they had.
    pub fn update_code(&mut self, code: &str) -> std::result::Result<(), CompileError> {
        let compiled = self.cache.compile(code, &self.options)?;
        if self.compiled.as_deref() == Some(compiled.as_str()) {
            return Ok(());
        }
        self.recomputes += 1;
        for (key, controller) in self.frames.iter_mut() {
            controller.navigate(self.config.frame_src_for(key.theme.as_deref(), &compiled));
        }
        self.compiled = Some(compiled);
        Ok(())
    }

    /// Rebuild the scope and restart every frame in place
    pub fn reload_components(&mut self, registry: &ComponentRegistry) -> Result<()> {
        self.scope = self.scope_builder.build(registry)?;
        let previous = std::mem::take(&mut self.frames);
        for (key, old) in previous {
            let next = FrameController::respawn(
                &old,
                self.scope.clone(),
                self.screenshots.clone(),
                self.messages_tx.clone(),
            );
            self.frames.insert(key, next);
        }
        self.errors.clear();
        info!("Reloaded components, restarted {} frames", self.frames.len());
        Ok(())
    }

    pub fn observe_intersection(&mut self, key: &FrameKey, ratio: f64) {
        if let Some(frame) = self.frames.get_mut(key) {
            frame.observe_intersection(ratio);
        }
    }

    pub fn hover(&mut self, key: &FrameKey) {
        if let Some(frame) = self.frames.get_mut(key) {
            frame.hover();
        }
    }

    pub fn request_screenshot(&self, key: &FrameKey, action: ScreenshotAction, file_name: &str) {
        if let Some(frame) = self.frames.get(key) {
            frame.post(&FrameMessage::Screenshot {
                action,
                file_name: file_name.to_string(),
            });
        }
    }

    /// Apply a message posted by frame `key`. Foreign messages and messages
    /// from frames no longer in the set change nothing.
    pub fn handle_message(&mut self, key: FrameKey, raw: &serde_json::Value) -> Option<FrameMessage> {
        let message = FrameMessage::from_post(raw)?;
        if !self.frames.contains_key(&key) {
            return None;
        }
        if let FrameMessage::Error {
            message: text,
            delay_visibility,
        } = &message
        {
            if text.is_empty() {
                self.errors.remove(&key);
            } else {
                self.errors.insert(
                    key,
                    FrameErrorState {
                        message: text.clone(),
                        delay_visibility: *delay_visibility,
                        reported_at: Instant::now(),
                    },
                );
            }
        }
        Some(message)
    }

    /// Wait for the next recognised message from any frame
    pub async fn next_message(&mut self) -> Option<(FrameKey, FrameMessage)> {
        loop {
            let (key, raw) = self.messages_rx.recv().await?;
            if let Some(message) = self.handle_message(key.clone(), &raw) {
                return Some((key, message));
            }
        }
    }

    pub fn frame_error(&self, key: &FrameKey) -> Option<&FrameErrorState> {
        self.errors.get(key)
    }

    /// First visible error in frame order
    pub fn visible_error(&self, now: Instant) -> Option<(&FrameKey, &FrameErrorState)> {
        let grace = Duration::from_millis(self.config.timing.error_grace_ms);
        self.frames.keys().find_map(|key| {
            self.errors
                .get(key)
                .filter(|state| state.is_visible(now, grace))
                .map(|state| (key, state))
        })
    }

    pub fn frame(&self, key: &FrameKey) -> Option<&FrameController> {
        self.frames.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &FrameKey> {
        self.frames.keys()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn compiled(&self) -> Option<&str> {
        self.compiled.as_deref()
    }

    /// How many times new code has been fanned out to the frames
    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PragmaSettings;
    use serde_json::json;

    fn themes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn target(theme: &str, px: u32) -> RenderTarget {
        RenderTarget {
            theme: Some(theme.into()),
            width: Width::Px(px),
        }
    }

    #[test]
    fn test_derive_frames_defaults_to_all() {
        let frames = derive_frames(
            &[],
            &[],
            &themes(&["light", "dark"]),
            &[Width::Px(320), Width::Px(768)],
        );
        assert_eq!(
            frames,
            vec![
                target("light", 320),
                target("dark", 320),
                target("light", 768),
                target("dark", 768),
            ]
        );
    }

    #[test]
    fn test_derive_frames_with_selection() {
        let frames = derive_frames(
            &themes(&["dark"]),
            &[],
            &themes(&["light", "dark"]),
            &[Width::Px(320), Width::Px(768)],
        );
        assert_eq!(frames, vec![target("dark", 320), target("dark", 768)]);
    }

    #[test]
    fn test_derive_frames_without_themes() {
        let frames = derive_frames(&[], &[Width::Fit], &[], &[Width::Px(320), Width::Fit]);
        assert_eq!(
            frames,
            vec![RenderTarget {
                theme: None,
                width: Width::Fit
            }]
        );
    }

    #[test]
    fn test_width_serde() {
        assert_eq!(
            serde_json::to_value(vec![Width::Px(320), Width::Fit]).unwrap(),
            json!([320, "Fit to window"])
        );
        let widths: Vec<Width> = serde_json::from_value(json!([1024, "Fit to window"])).unwrap();
        assert_eq!(widths, vec![Width::Px(1024), Width::Fit]);
        assert!(serde_json::from_value::<Width>(json!("wide")).is_err());
        assert_eq!(Width::Fit.css(), "100%");
    }

    #[test]
    fn test_error_visibility_grace() {
        let now = Instant::now();
        let soft = FrameErrorState {
            message: "x".into(),
            delay_visibility: true,
            reported_at: now,
        };
        let grace = Duration::from_millis(500);
        assert!(!soft.is_visible(now, grace));
        assert!(soft.is_visible(now + grace, grace));
        let hard = FrameErrorState {
            delay_visibility: false,
            ..soft
        };
        assert!(hard.is_visible(now, grace));
    }

    fn frame_set() -> FrameSet {
        let config = Arc::new(PlayroomConfig {
            themes: themes(&["light", "dark"]),
            widths: vec![320],
            ..PlayroomConfig::default()
        });
        FrameSet::new(
            config,
            ScopeBuilder::new(&PragmaSettings::default()),
            &ComponentRegistry::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_sync_targets_preserves_loaded_frames() {
        let mut set = frame_set();
        set.sync_targets(&[target("light", 320), target("dark", 320)]);
        set.hover(&target("light", 320).key());

        set.sync_targets(&[target("light", 320)]);
        assert_eq!(set.len(), 1);
        assert!(set.frame(&target("light", 320).key()).unwrap().is_loaded());

        set.sync_targets(&[target("light", 320), target("dark", 320)]);
        assert!(!set.frame(&target("dark", 320).key()).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_update_code_compiles_once_and_skips_errors() {
        let mut set = frame_set();
        set.sync_targets(&[target("light", 320), target("dark", 320)]);

        set.update_code("<p>one</p>").unwrap();
        let compiled = set.compiled().unwrap().to_string();
        assert!(set.update_code("<p>").is_err());
        assert_eq!(set.compiled(), Some(compiled.as_str()));
        set.update_code("<p>one</p>").unwrap();
        assert_eq!(set.recompute_count(), 1);

        let location = set
            .frame(&target("dark", 320).key())
            .and_then(|f| f.location())
            .unwrap()
            .to_string();
        assert!(location.contains("themeName=dark"));
    }

    #[tokio::test]
    async fn test_handle_message_filters_and_tracks_errors() {
        let mut set = frame_set();
        let key = target("light", 320).key();
        set.sync_targets(&[target("light", 320)]);

        assert!(set
            .handle_message(key.clone(), &json!({"message": "nope", "delayVisibility": false}))
            .is_none());
        assert!(set.frame_error(&key).is_none());

        let message = set.handle_message(
            key.clone(),
            &json!({"source": "Playroom Frame Error", "message": "boom", "delayVisibility": false}),
        );
        assert_eq!(message, Some(FrameMessage::error("boom", false)));
        let state = set.frame_error(&key).unwrap();
        assert_eq!(state.message, "boom");
        assert!(!state.delay_visibility);

        set.handle_message(
            key.clone(),
            &json!({"source": "Playroom Frame Error", "message": "", "delayVisibility": true}),
        );
        assert!(set.frame_error(&key).is_none());
    }

    #[tokio::test]
    async fn test_frame_errors_reach_next_message() {
        let mut set = frame_set();
        let key = target("light", 320).key();
        set.sync_targets(&[target("light", 320)]);
        set.hover(&key);
        set.update_code("<Missing />").unwrap();

        let (from, message) = set.next_message().await.unwrap();
        assert_eq!(from, key);
        assert_eq!(
            message,
            FrameMessage::error("ReferenceError: Missing is not defined", true)
        );
        assert!(set.frame_error(&key).is_some());
    }

    #[test]
    fn test_reserved_scope_collision_fails_construction() {
        let pragma = PragmaSettings::default();
        let name = pragma.element.clone();
        let result = FrameSet::new(
            Arc::new(PlayroomConfig::default()),
            ScopeBuilder::new(&pragma).with_user_scope(move || {
                let mut map = IndexMap::new();
                map.insert(name.clone(), crate::value::Value::Null);
                map
            }),
            &ComponentRegistry::new(),
        );
        assert!(result.is_err());
    }
}
