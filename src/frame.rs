//! Frames: one isolated render surface per render target
//!
//! A frame runs as its own tokio task. The parent side ([`FrameController`])
//! only talks to it through channels:
//! - a `watch` carrying the latest frame location, so navigations replace
//!   each other instead of queueing
//! - an inbox of raw JSON messages posted to the frame
//! - a shared outbox of `(FrameKey, JSON)` messages posted back to the parent
//!
//! Inside the task, [`FrameRuntime`] decodes the location, renders through
//! its own [`CodeRenderer`] and reports errors as [`FrameMessage`]s.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::form_urlencoded;

use crate::boundary::CodeRenderer;
use crate::config::ParamType;
use crate::error::{PlayroomError, Result};
use crate::frame_set::FrameKey;
use crate::message::{FrameMessage, ScreenshotAction};
use crate::render::RenderTree;
use crate::scope::EvalScope;

/// Messages a frame posts to its parent
pub type ParentSender = mpsc::UnboundedSender<(FrameKey, serde_json::Value)>;

// ═══════════════════════════════════════════════════════════════════════════════
// FRAME LOCATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct FrameSrcParams<'a> {
    pub theme_name: Option<&'a str>,
    pub code: &'a str,
}

/// `<baseUrl>frame.html[#]?themeName=<enc>&code=<enc>`
pub fn default_frame_src(base_url: &str, params_type: ParamType, params: &FrameSrcParams<'_>) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("themeName", params.theme_name.unwrap_or(""))
        .append_pair("code", params.code)
        .finish();
    let hash = match params_type {
        ParamType::Hash => "#",
        ParamType::Search => "",
    };
    format!("{}frame.html{}?{}", base_url, hash, query)
}

/// What a frame document decodes from its location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDocument {
    pub theme_name: Option<String>,
    pub code: String,
}

/// Inverse of [`default_frame_src`]; `None` when there is no `code` param
pub fn parse_frame_src(src: &str) -> Option<FrameDocument> {
    let (_, query) = src.split_once('?')?;
    let mut theme_name = None;
    let mut code = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "themeName" if !value.is_empty() => theme_name = Some(value.into_owned()),
            "code" => code = Some(value.into_owned()),
            _ => {}
        }
    }
    Some(FrameDocument {
        theme_name,
        code: code?,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCREENSHOTS
// ═══════════════════════════════════════════════════════════════════════════════

pub trait ScreenshotSink: Send + Sync {
    fn capture(&self, action: ScreenshotAction, file_name: &str, html: &str) -> Result<()>;
}

/// Default sink for environments with no capture support
#[derive(Debug, Default)]
pub struct UnsupportedScreenshots;

impl ScreenshotSink for UnsupportedScreenshots {
    fn capture(&self, action: ScreenshotAction, _file_name: &str, _html: &str) -> Result<()> {
        Err(PlayroomError::Unsupported(format!(
            "screenshot {:?}",
            action
        )))
    }
}

/// Writes the frame's HTML to a directory on `download`
#[derive(Debug)]
pub struct HtmlSnapshotSink {
    dir: PathBuf,
}

impl HtmlSnapshotSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ScreenshotSink for HtmlSnapshotSink {
    fn capture(&self, action: ScreenshotAction, file_name: &str, html: &str) -> Result<()> {
        match action {
            ScreenshotAction::Download => {
                let name = std::path::Path::new(file_name)
                    .file_name()
                    .ok_or_else(|| PlayroomError::storage(format!("invalid file name '{}'", file_name)))?;
                let path = self.dir.join(name).with_extension("html");
                std::fs::create_dir_all(&self.dir)?;
                std::fs::write(&path, html)?;
                info!("Saved frame snapshot to {}", path.display());
                Ok(())
            }
            ScreenshotAction::Copy => Err(PlayroomError::Unsupported(
                "clipboard access".to_string(),
            )),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAME RUNTIME (inside the isolated context)
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutput {
    pub theme_name: Option<String>,
    pub tree: RenderTree,
    /// Number of locations loaded so far
    pub loads: u64,
}

pub struct FrameRuntime {
    key: FrameKey,
    scope: EvalScope,
    renderer: CodeRenderer,
    screenshots: Arc<dyn ScreenshotSink>,
    output: watch::Sender<FrameOutput>,
    parent: ParentSender,
    /// A hard error was posted and has not been cleared yet
    hard_error: bool,
}

impl FrameRuntime {
    pub fn new(
        key: FrameKey,
        scope: EvalScope,
        screenshots: Arc<dyn ScreenshotSink>,
        output: watch::Sender<FrameOutput>,
        parent: ParentSender,
    ) -> Self {
        Self {
            key,
            scope,
            renderer: CodeRenderer::new(),
            screenshots,
            output,
            parent,
            hard_error: false,
        }
    }

    pub fn load(&mut self, src: &str) {
        let Some(document) = parse_frame_src(src) else {
            warn!("[{}] Unreadable frame location", self.key);
            self.post(FrameMessage::error("Unable to read frame location", false));
            self.hard_error = true;
            self.publish(None, RenderTree::default());
            return;
        };

        let mut reported: Vec<String> = Vec::new();
        let renderer = &mut self.renderer;
        let scope = &self.scope;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            renderer.render(&document.code, scope, &mut |message| {
                reported.push(message.to_string())
            })
        }));

        match result {
            Ok(tree) => {
                // the fresh boundary has no error of its own to clear
                if std::mem::take(&mut self.hard_error) && reported.is_empty() {
                    self.post(FrameMessage::error("", true));
                }
                for message in reported {
                    self.post(FrameMessage::error(message, true));
                }
                self.publish(document.theme_name, tree);
            }
            Err(payload) => {
                let message = panic_message(payload);
                error!("[{}] Render crashed: {}", self.key, message);
                // nothing rendered by this renderer can be trusted any more
                self.renderer = CodeRenderer::new();
                self.post(FrameMessage::error(message, false));
                self.hard_error = true;
                self.publish(document.theme_name, RenderTree::default());
            }
        }
    }

    /// Handle a message posted into the frame
    pub fn receive(&mut self, raw: &serde_json::Value) {
        match FrameMessage::from_post(raw) {
            Some(FrameMessage::Screenshot { action, file_name }) => {
                let html = self.output.borrow().tree.to_html();
                if let Err(e) = self.screenshots.capture(action, &file_name, &html) {
                    warn!("[{}] Screenshot failed: {}", self.key, e);
                }
            }
            Some(other) => trace!("[{}] Ignoring {:?}", self.key, other),
            None => {}
        }
    }

    fn post(&self, message: FrameMessage) {
        if self.parent.send((self.key.clone(), message.to_post())).is_err() {
            debug!("[{}] Parent is gone, dropping message", self.key);
        }
    }

    fn publish(&self, theme_name: Option<String>, tree: RenderTree) {
        self.output.send_modify(|output| {
            output.theme_name = theme_name;
            output.tree = tree;
            output.loads += 1;
        });
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Render crashed".to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LAZY LOADING
// ═══════════════════════════════════════════════════════════════════════════════

/// Defers navigation until the frame has been seen once. Loading is
/// permanent: later navigations go straight through.
#[derive(Debug, Clone, Default)]
pub struct LazyLoad {
    loaded: bool,
    pending: Option<String>,
    current: Option<String>,
}

impl LazyLoad {
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Latest location, whether or not it has been delivered yet
    pub fn location(&self) -> Option<&str> {
        self.current.as_deref().or(self.pending.as_deref())
    }

    /// Returns the location to deliver now, if any
    pub fn navigate(&mut self, src: String) -> Option<String> {
        if self.loaded {
            self.current = Some(src.clone());
            Some(src)
        } else {
            self.pending = Some(src);
            None
        }
    }

    pub fn intersect(&mut self, ratio: f64) -> Option<String> {
        if ratio >= 0.0 {
            self.activate()
        } else {
            None
        }
    }

    pub fn activate(&mut self) -> Option<String> {
        if self.loaded {
            return None;
        }
        self.loaded = true;
        let src = self.pending.take();
        self.current = src.clone();
        src
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAME CONTROLLER (parent side)
// ═══════════════════════════════════════════════════════════════════════════════

pub struct FrameController {
    key: FrameKey,
    lazy: LazyLoad,
    src_tx: watch::Sender<Option<String>>,
    inbox_tx: mpsc::UnboundedSender<serde_json::Value>,
    output_rx: watch::Receiver<FrameOutput>,
    task: JoinHandle<()>,
}

impl FrameController {
    /// Spawn the frame task. Must be called inside a tokio runtime.
    pub fn spawn(
        key: FrameKey,
        scope: EvalScope,
        screenshots: Arc<dyn ScreenshotSink>,
        parent: ParentSender,
    ) -> Self {
        let (src_tx, mut src_rx) = watch::channel::<Option<String>>(None);
        let (inbox_tx, mut inbox_rx) = mpsc::unbounded_channel::<serde_json::Value>();
        let (output_tx, output_rx) = watch::channel(FrameOutput::default());
        let mut runtime = FrameRuntime::new(key.clone(), scope, screenshots, output_tx, parent);

        let task_key = key.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = src_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let src = src_rx.borrow_and_update().clone();
                        if let Some(src) = src {
                            runtime.load(&src);
                        }
                    }
                    message = inbox_rx.recv() => match message {
                        Some(raw) => runtime.receive(&raw),
                        None => break,
                    },
                }
            }
            trace!("[{}] Frame task finished", task_key);
        });

        Self {
            key,
            lazy: LazyLoad::default(),
            src_tx,
            inbox_tx,
            output_rx,
            task,
        }
    }

    /// Spawn a replacement that keeps `previous`'s lazy-load state and
    /// location, e.g. after the component registry changed
    pub fn respawn(
        previous: &FrameController,
        scope: EvalScope,
        screenshots: Arc<dyn ScreenshotSink>,
        parent: ParentSender,
    ) -> Self {
        let mut next = Self::spawn(previous.key.clone(), scope, screenshots, parent);
        next.lazy = previous.lazy.clone();
        if next.lazy.is_loaded() {
            if let Some(src) = next.lazy.location().map(str::to_string) {
                next.deliver(src);
            }
        }
        next
    }

    pub fn key(&self) -> &FrameKey {
        &self.key
    }

    pub fn is_loaded(&self) -> bool {
        self.lazy.is_loaded()
    }

    pub fn location(&self) -> Option<&str> {
        self.lazy.location()
    }

    pub fn navigate(&mut self, src: String) {
        if let Some(src) = self.lazy.navigate(src) {
            self.deliver(src);
        }
    }

    pub fn observe_intersection(&mut self, ratio: f64) {
        if let Some(src) = self.lazy.intersect(ratio) {
            self.deliver(src);
        }
    }

    pub fn hover(&mut self) {
        if let Some(src) = self.lazy.activate() {
            self.deliver(src);
        }
    }

    /// Post a message into the frame
    pub fn post(&self, message: &FrameMessage) {
        if self.inbox_tx.send(message.to_post()).is_err() {
            debug!("[{}] Frame task is gone, dropping message", self.key);
        }
    }

    pub fn output(&self) -> FrameOutput {
        self.output_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FrameOutput> {
        self.output_rx.clone()
    }

    fn deliver(&self, src: String) {
        trace!("[{}] Navigating", self.key);
        self.src_tx.send_replace(Some(src));
    }
}

impl Drop for FrameController {
    fn drop(&mut self) {
        self.task.abort();
    }
}
