//! Session tests: initial load, debouncing and persistence

#[cfg(test)]
mod tests {
    use crate::config::{PlayroomConfig, PragmaSettings};
    use crate::error::{PlayroomError, Result};
    use crate::frame_set::{RenderTarget, Width};
    use crate::message::FrameMessage;
    use crate::scope::{ComponentRegistry, ScopeBuilder};
    use crate::session::{PlayroomSession, SessionEvent};
    use crate::storage::{KeyValueStore, SessionStore};
    use crate::store::{Action, EditorOrientation, EditorPosition, FrameErrorReport, PersistSnapshot};
    use crate::url_state::{create_url, SharedState};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const NAMESPACE: &str = "playroom-test";

    fn config() -> PlayroomConfig {
        PlayroomConfig {
            storage_key: "test".into(),
            themes: vec!["light".into(), "dark".into()],
            widths: vec![320],
            example_code: "<p>example</p>".into(),
            ..PlayroomConfig::default()
        }
    }

    fn open_with(
        config: PlayroomConfig,
        store: SessionStore,
        url: Option<&str>,
    ) -> PlayroomSession {
        PlayroomSession::open(
            Arc::new(config),
            ScopeBuilder::new(&PragmaSettings::default()),
            &ComponentRegistry::new(),
            store,
            url,
        )
        .unwrap()
    }

    fn open(store: SessionStore, url: Option<&str>) -> PlayroomSession {
        open_with(config(), store, url)
    }

    fn stored(code: &str) -> SessionStore {
        let store = SessionStore::in_memory(NAMESPACE);
        store
            .write(&PersistSnapshot {
                code: code.into(),
                editor_position: EditorPosition::Bottom,
                editor_width: 500,
                editor_height: 200,
                editor_orientation: EditorOrientation::Horizontal,
            })
            .unwrap();
        store
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(PlayroomError::storage("disk full"))
        }
    }

    async fn assert_quiet(session: &mut PlayroomSession) {
        assert!(timeout(Duration::from_secs(5), session.next_event())
            .await
            .is_err());
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // INITIAL LOAD
    // ═══════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_example_code_when_nothing_stored() {
        let session = open(SessionStore::in_memory(NAMESPACE), None);
        assert!(session.state().ready);
        assert_eq!(session.state().code, "<p>example</p>");
        assert!(session.frames().compiled().is_some());
        // two themes, one px width plus fit
        assert_eq!(session.frames().len(), 4);
    }

    #[tokio::test]
    async fn test_stored_code_beats_example() {
        let session = open(stored("<p>stored</p>"), None);
        assert_eq!(session.state().code, "<p>stored</p>");
    }

    #[tokio::test]
    async fn test_url_beats_stored_code() {
        let shared = SharedState {
            code: "<p>shared</p>".into(),
            themes: Some(vec!["dark".into()]),
            widths: Some(vec![Width::Fit]),
            ..SharedState::default()
        };
        let url = create_url("https://example.com/", Default::default(), &shared);
        let session = open(stored("<p>stored</p>"), Some(&url));

        assert_eq!(session.state().code, "<p>shared</p>");
        assert_eq!(
            session.state().render_targets(),
            vec![RenderTarget {
                theme: Some("dark".into()),
                width: Width::Fit
            }]
        );
        assert_eq!(session.frames().len(), 1);
    }

    #[tokio::test]
    async fn test_url_ignored_when_decoding_disabled() {
        let url = create_url(
            "https://example.com/",
            Default::default(),
            &SharedState::new("<p>shared</p>"),
        );
        let config = PlayroomConfig {
            decode_url_state: false,
            ..config()
        };
        let session = open_with(config, stored("<p>stored</p>"), Some(&url));
        assert_eq!(session.state().code, "<p>stored</p>");
    }

    #[tokio::test]
    async fn test_unreadable_url_falls_back() {
        let session = open(stored("<p>stored</p>"), Some("https://example.com/#?code=%%%"));
        assert_eq!(session.state().code, "<p>stored</p>");
    }

    #[tokio::test]
    async fn test_invalid_config_fails_open() {
        let config = PlayroomConfig {
            widths: Vec::new(),
            ..config()
        };
        let result = PlayroomSession::open(
            Arc::new(config),
            ScopeBuilder::new(&PragmaSettings::default()),
            &ComponentRegistry::new(),
            SessionStore::in_memory(NAMESPACE),
            None,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_orientation_restores_stored_size() {
        let mut session = open(stored("<p />"), None);
        assert_eq!(session.state().editor_position, EditorPosition::Bottom);
        assert_eq!(session.state().active_size(), 200);

        session.dispatch(Action::UpdateEditorPosition(EditorPosition::Left));
        assert_eq!(session.state().orientation(), EditorOrientation::Vertical);
        assert_eq!(session.state().active_size(), 500);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // DEBOUNCING
    // ═══════════════════════════════════════════════════════════════════════════════

    #[tokio::test(start_paused = true)]
    async fn test_keystrokes_coalesce_into_one_render_and_one_write() {
        let mut session = open(SessionStore::in_memory(NAMESPACE), None);
        let before = session.frames().recompute_count();

        for code in ["<p>a</p>", "<p>ab</p>", "<p>abc</p>"] {
            session.dispatch(Action::UpdateCode(code.into()));
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        assert_eq!(
            session.next_event().await,
            Some(SessionEvent::Rendered {
                code: "<p>abc</p>".into(),
                result: Ok(())
            })
        );
        assert_eq!(
            session.next_event().await,
            Some(SessionEvent::Persisted { ok: true })
        );
        assert_quiet(&mut session).await;

        assert_eq!(session.frames().recompute_count(), before + 1);
        assert_eq!(session.persist_writes(), 1);
        assert_eq!(
            session.store().read().unwrap().code.as_deref(),
            Some("<p>abc</p>")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_playroom_renders_without_waiting() {
        let mut session = open(SessionStore::in_memory(NAMESPACE), None);
        let before = session.frames().recompute_count();
        session.dispatch(Action::UpdateCode("<p>typing</p>".into()));
        session.dispatch(Action::OpenPlayroom(SharedState::new("<p>opened</p>")));

        assert_eq!(session.frames().recompute_count(), before + 1);
        // the pending keystroke render was dropped
        assert_eq!(
            session.next_event().await,
            Some(SessionEvent::Persisted { ok: true })
        );
        assert_quiet(&mut session).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_failure_is_not_fatal() {
        let mut session = open(SessionStore::new(NAMESPACE, FailingStore), None);
        session.dispatch(Action::UpdateCode("<p>x</p>".into()));

        assert!(matches!(
            session.next_event().await,
            Some(SessionEvent::Rendered { result: Ok(()), .. })
        ));
        assert_eq!(
            session.next_event().await,
            Some(SessionEvent::Persisted { ok: false })
        );
        assert_eq!(session.persist_writes(), 0);
        assert_eq!(session.state().code, "<p>x</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_compile_error_is_located_and_frames_keep_last_good() {
        let mut session = open(SessionStore::in_memory(NAMESPACE), None);
        let good = session.frames().compiled().unwrap().to_string();

        session.dispatch(Action::UpdateCode("\n\n<Foo bar=>".into()));
        let event = session.next_event().await.unwrap();
        assert!(matches!(event, SessionEvent::Rendered { result: Err(_), .. }));

        let error = session.state().compile_error.clone().unwrap();
        assert_eq!(error.location.unwrap().line, 3);
        assert_eq!(session.frames().compiled(), Some(good.as_str()));

        session.dispatch(Action::UpdateCode("<p>fixed</p>".into()));
        session.next_event().await.unwrap();
        assert_eq!(session.state().compile_error, None);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // FRAMES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[tokio::test(start_paused = true)]
    async fn test_frame_error_reaches_editor_state() {
        let mut session = open(SessionStore::in_memory(NAMESPACE), None);
        let key = session.frames().keys().next().unwrap().clone();
        session.frames_mut().hover(&key);
        session.dispatch(Action::OpenPlayroom(SharedState::new("<Missing />")));

        let event = session.next_event().await.unwrap();
        assert_eq!(
            event,
            SessionEvent::Frame {
                key,
                message: FrameMessage::error("ReferenceError: Missing is not defined", true)
            }
        );
        assert_eq!(
            session.state().error_message,
            Some(FrameErrorReport {
                message: "ReferenceError: Missing is not defined".into(),
                delay_visibility: true
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hiding_failing_frame_clears_editor_error() {
        let mut session = open(SessionStore::in_memory(NAMESPACE), None);
        let key = session.frames().keys().next().unwrap().clone();
        assert_eq!(key.theme.as_deref(), Some("light"));
        session.frames_mut().hover(&key);
        session.dispatch(Action::OpenPlayroom(SharedState::new("<Missing />")));

        assert!(matches!(
            session.next_event().await,
            Some(SessionEvent::Frame { .. })
        ));
        assert!(session.state().error_message.is_some());

        session.dispatch(Action::UpdateVisibleThemes(vec!["dark".into()]));
        assert!(session.frames().keys().all(|k| k.theme.as_deref() == Some("dark")));
        assert_eq!(session.state().error_message, None);
    }

    #[tokio::test]
    async fn test_share_url_round_trips_filters() {
        let mut session = open(SessionStore::in_memory(NAMESPACE), None);
        session.dispatch(Action::UpdateVisibleThemes(vec!["dark".into()]));
        session.dispatch(Action::UpdateTitle("Cards".into()));

        let reopened = open(SessionStore::in_memory(NAMESPACE), Some(&session.share_url()));
        assert_eq!(reopened.state().code, "<p>example</p>");
        assert_eq!(reopened.state().selected_themes, vec!["dark".to_string()]);
        assert_eq!(reopened.state().title.as_deref(), Some("Cards"));

        let preview = session.preview_url(None);
        assert!(preview.starts_with("preview/#?code="));
        let shared = crate::url_state::decode_url(&preview).unwrap();
        assert_eq!(shared.theme.as_deref(), Some("dark"));
    }
}
