//! Streaming chat session.
//!
//! A [`ChatSession`] drives one request/response exchange per call to
//! [`ChatSession::send`]. The UI is reached only through the
//! [`MessageSink`] and [`InputControls`] ports, so the whole turn can run
//! against an in-memory recorder in tests.

use futures_util::StreamExt;
use std::sync::Mutex;
use tracing::{debug, error, warn};

use crate::assembly::TurnAssembly;
use crate::error::ExchangeError;
use crate::identity::Identity;
use crate::state::{ChatRole, SessionState, SlotId};
use crate::transport::{ChatRequest, ChatTransport};

/// Surface that renders chat bubbles.
pub trait MessageSink: Send {
    /// Append a new bubble. Assistant bubbles start with a typing placeholder.
    fn create_slot(&mut self, role: ChatRole) -> SlotId;

    /// Replace everything the slot shows. `\n` renders as a line break.
    fn set_content(&mut self, slot: SlotId, text: &str, is_error: bool);

    fn scroll_to_latest(&mut self);
}

/// The text input and its send button.
pub trait InputControls: Send {
    /// Empty the input and collapse any auto-grown height
    fn clear_input(&mut self);

    /// Enable or disable input and send together
    fn set_enabled(&mut self, enabled: bool);

    fn focus_input(&mut self);
}

/// Everything a turn needs from the front end
pub trait ChatUi: MessageSink + InputControls {}

impl<T: MessageSink + InputControls> ChatUi for T {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank input, nothing happened
    Ignored,
    /// Another turn was already streaming, nothing happened
    Busy,
    Completed,
    /// The exchange failed; carries the logged error
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Final content of the assistant slot
    pub text: String,
    pub deltas: usize,
    pub parse_failures: usize,
}

impl TurnReport {
    fn untouched(outcome: TurnOutcome) -> Self {
        Self {
            outcome,
            text: String::new(),
            deltas: 0,
            parse_failures: 0,
        }
    }
}

pub struct ChatSession<T> {
    transport: T,
    identity: Identity,
    error_message: String,
    state: Mutex<SessionState>,
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(transport: T, identity: Identity, error_message: impl Into<String>) -> Self {
        Self {
            transport,
            identity,
            error_message: error_message.into(),
            state: Mutex::new(SessionState::Idle),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(SessionState::Idle)
    }

    /// Run one conversation turn.
    ///
    /// Blank input is ignored and a call made while another turn is
    /// streaming is refused, both without touching the UI. Otherwise the
    /// user bubble and one assistant bubble are created, the reply is
    /// streamed into the assistant bubble, and the input is re-enabled and
    /// focused on every exit path. Exchange failures replace the assistant
    /// bubble with the configured error message; they are never returned.
    pub async fn send<U: ChatUi>(&self, input_text: &str, ui: &mut U) -> TurnReport {
        let text = input_text.trim();
        if text.is_empty() {
            return TurnReport::untouched(TurnOutcome::Ignored);
        }
        if !self.try_begin() {
            warn!("send refused, a turn is already streaming");
            return TurnReport::untouched(TurnOutcome::Busy);
        }

        let mut turn = TurnGuard {
            ui,
            state: &self.state,
        };

        let user_slot = turn.ui.create_slot(ChatRole::User);
        turn.ui.set_content(user_slot, text, false);
        turn.ui.clear_input();
        turn.ui.set_enabled(false);

        let slot = turn.ui.create_slot(ChatRole::Assistant);
        let mut assembly = TurnAssembly::new(slot);
        debug!(user_id = %self.identity, chars = text.len(), "turn started");

        let result = self.stream_reply(text, &mut assembly, &mut *turn.ui).await;

        let deltas = assembly.deltas();
        let parse_failures = assembly.parse_failures();
        let report = match result {
            Ok(()) => TurnReport {
                outcome: TurnOutcome::Completed,
                text: assembly.into_text(),
                deltas,
                parse_failures,
            },
            Err(e) => {
                error!(error = %e, deltas, "chat exchange failed");
                turn.ui.set_content(slot, &self.error_message, true);
                TurnReport {
                    outcome: TurnOutcome::Failed(e.to_string()),
                    text: self.error_message.clone(),
                    deltas,
                    parse_failures,
                }
            }
        };

        drop(turn);
        report
    }

    async fn stream_reply(
        &self,
        text: &str,
        assembly: &mut TurnAssembly,
        sink: &mut dyn MessageSink,
    ) -> Result<(), ExchangeError> {
        let request = ChatRequest::single_turn(text);
        let mut body = self.transport.open(&request, &self.identity).await?;

        while let Some(chunk) = body.next().await {
            assembly.push_chunk(&chunk?, sink);
        }
        assembly.finish(sink);
        Ok(())
    }

    fn try_begin(&self) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if *state == SessionState::Streaming {
            return false;
        }
        *state = SessionState::Streaming;
        true
    }
}

/// Restores the input and returns the session to idle when dropped, so
/// every exit path of a turn runs the same finalization.
struct TurnGuard<'a, U: ChatUi> {
    ui: &'a mut U,
    state: &'a Mutex<SessionState>,
}

impl<U: ChatUi> Drop for TurnGuard<'_, U> {
    fn drop(&mut self) {
        self.ui.set_enabled(true);
        self.ui.focus_input();
        if let Ok(mut state) = self.state.lock() {
            *state = SessionState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    use crate::transport::ByteStream;

    const APOLOGY: &str = "Lo siento, hubo un error de conexión. Intenta de nuevo.";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum UiCall {
        CreateSlot(ChatRole, SlotId),
        SetContent(SlotId, String, bool),
        Scroll,
        ClearInput,
        SetEnabled(bool),
        Focus,
    }

    #[derive(Default)]
    struct RecordingUi {
        calls: Vec<UiCall>,
        next_slot: u64,
    }

    impl RecordingUi {
        fn slots(&self) -> Vec<(ChatRole, SlotId)> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    UiCall::CreateSlot(role, id) => Some((*role, *id)),
                    _ => None,
                })
                .collect()
        }

        fn assistant_slot(&self) -> SlotId {
            self.slots()
                .into_iter()
                .find(|(role, _)| *role == ChatRole::Assistant)
                .map(|(_, id)| id)
                .unwrap()
        }

        fn updates_of(&self, slot: SlotId) -> Vec<(String, bool)> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    UiCall::SetContent(id, text, err) if *id == slot => Some((text.clone(), *err)),
                    _ => None,
                })
                .collect()
        }

        fn count(&self, wanted: &UiCall) -> usize {
            self.calls.iter().filter(|call| *call == wanted).count()
        }

        fn ends_interactive(&self) -> bool {
            self.calls.ends_with(&[UiCall::SetEnabled(true), UiCall::Focus])
        }
    }

    impl MessageSink for RecordingUi {
        fn create_slot(&mut self, role: ChatRole) -> SlotId {
            self.next_slot += 1;
            let id = SlotId(self.next_slot);
            self.calls.push(UiCall::CreateSlot(role, id));
            id
        }

        fn set_content(&mut self, slot: SlotId, text: &str, is_error: bool) {
            self.calls.push(UiCall::SetContent(slot, text.to_string(), is_error));
        }

        fn scroll_to_latest(&mut self) {
            self.calls.push(UiCall::Scroll);
        }
    }

    impl InputControls for RecordingUi {
        fn clear_input(&mut self) {
            self.calls.push(UiCall::ClearInput);
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.calls.push(UiCall::SetEnabled(enabled));
        }

        fn focus_input(&mut self) {
            self.calls.push(UiCall::Focus);
        }
    }

    #[derive(Clone)]
    enum Script {
        Status(u16),
        Body(Vec<Result<Vec<u8>, String>>),
    }

    struct ScriptedTransport {
        script: Script,
        opened: AtomicUsize,
        last_request: Mutex<Option<(serde_json::Value, String)>>,
    }

    impl ScriptedTransport {
        fn new(script: Script) -> Self {
            Self {
                script,
                opened: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn lines(lines: &[&str]) -> Self {
            Self::new(Script::Body(
                lines.iter().map(|line| Ok(line.as_bytes().to_vec())).collect(),
            ))
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn open(&self, request: &ChatRequest, identity: &Identity) -> Result<ByteStream, ExchangeError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() =
                Some((serde_json::to_value(request).unwrap(), identity.to_string()));

            match self.script.clone() {
                Script::Status(code) => Err(ExchangeError::Status(code)),
                Script::Body(chunks) => Ok(stream::iter(
                    chunks
                        .into_iter()
                        .map(|chunk| chunk.map(Bytes::from).map_err(ExchangeError::Read)),
                )
                .boxed()),
            }
        }
    }

    fn session(transport: ScriptedTransport) -> ChatSession<ScriptedTransport> {
        ChatSession::new(transport, Identity::from_stored("user_k3j9x0a1b"), APOLOGY)
    }

    #[tokio::test]
    async fn test_streams_two_deltas() {
        let session = session(ScriptedTransport::lines(&[
            "{\"message\":{\"content\":\"Hi\"}}\n",
            "{\"message\":{\"content\":\" there\"}}\n",
        ]));
        let mut ui = RecordingUi::default();

        let report = session.send("hello", &mut ui).await;

        assert_eq!(report.outcome, TurnOutcome::Completed);
        assert_eq!(report.text, "Hi there");
        let slot = ui.assistant_slot();
        assert_eq!(
            ui.updates_of(slot),
            vec![("Hi".to_string(), false), ("Hi there".to_string(), false)]
        );
        assert_eq!(ui.count(&UiCall::Scroll), 2);
        assert!(ui.ends_interactive());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_side_effect_order() {
        let session = session(ScriptedTransport::lines(&["{\"message\":{\"content\":\"ok\"}}\n"]));
        let mut ui = RecordingUi::default();

        session.send("  hello \n", &mut ui).await;

        assert_eq!(
            ui.calls,
            vec![
                UiCall::CreateSlot(ChatRole::User, SlotId(1)),
                UiCall::SetContent(SlotId(1), "hello".to_string(), false),
                UiCall::ClearInput,
                UiCall::SetEnabled(false),
                UiCall::CreateSlot(ChatRole::Assistant, SlotId(2)),
                UiCall::SetContent(SlotId(2), "ok".to_string(), false),
                UiCall::Scroll,
                UiCall::SetEnabled(true),
                UiCall::Focus,
            ]
        );
    }

    #[tokio::test]
    async fn test_request_carries_message_stream_flag_and_identity() {
        let session = session(ScriptedTransport::lines(&[]));
        let mut ui = RecordingUi::default();

        session.send(" hello ", &mut ui).await;

        let (body, identity) = session.transport.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "messages": [{ "role": "user", "content": "hello" }], "stream": true })
        );
        assert_eq!(identity, "user_k3j9x0a1b");
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let session = session(ScriptedTransport::lines(&[]));

        for input in ["", "   ", "\n\t"] {
            let mut ui = RecordingUi::default();
            let report = session.send(input, &mut ui).await;
            assert_eq!(report.outcome, TurnOutcome::Ignored);
            assert!(ui.calls.is_empty());
        }
        assert_eq!(session.transport.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_line_is_logged_and_skipped() {
        let session = session(ScriptedTransport::lines(&[
            "{\"message\":\n",
            "{\"message\":{\"content\":\"ok\"}}\n",
        ]));
        let mut ui = RecordingUi::default();

        let report = session.send("test", &mut ui).await;

        assert_eq!(report.text, "ok");
        assert_eq!(report.parse_failures, 1);
        assert_eq!(ui.updates_of(ui.assistant_slot()), vec![("ok".to_string(), false)]);
    }

    #[tokio::test]
    async fn test_unterminated_malformed_chunk_keeps_next_delta() {
        let session = session(ScriptedTransport::lines(&[
            "{\"message\":",
            "{\"message\":{\"content\":\"ok\"}}\n",
        ]));
        let mut ui = RecordingUi::default();

        let report = session.send("test", &mut ui).await;

        assert_eq!(report.outcome, TurnOutcome::Completed);
        assert_eq!(report.text, "ok");
        assert_eq!(report.parse_failures, 1);
        assert_eq!(ui.updates_of(ui.assistant_slot()), vec![("ok".to_string(), false)]);
    }

    #[tokio::test]
    async fn test_non_success_status_shows_apology() {
        let session = session(ScriptedTransport::new(Script::Status(500)));
        let mut ui = RecordingUi::default();

        let report = session.send("hello", &mut ui).await;

        assert!(matches!(report.outcome, TurnOutcome::Failed(_)));
        assert_eq!(report.text, APOLOGY);
        assert_eq!(
            ui.updates_of(ui.assistant_slot()),
            vec![(APOLOGY.to_string(), true)]
        );
        assert!(ui.ends_interactive());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_read_error_discards_partial_text() {
        let session = session(ScriptedTransport::new(Script::Body(vec![
            Ok(b"{\"message\":{\"content\":\"Hi\"}}\n".to_vec()),
            Ok(b"{\"message\":{\"content\":\" the".to_vec()),
            Err("connection reset".to_string()),
        ])));
        let mut ui = RecordingUi::default();

        let report = session.send("hello", &mut ui).await;

        assert_eq!(report.outcome, TurnOutcome::Failed("stream read error: connection reset".to_string()));
        assert_eq!(report.deltas, 1);
        let updates = ui.updates_of(ui.assistant_slot());
        assert_eq!(updates.last(), Some(&(APOLOGY.to_string(), true)));
        assert!(ui.ends_interactive());
    }

    #[tokio::test]
    async fn test_same_text_twice_gives_two_turns() {
        let session = session(ScriptedTransport::lines(&["{\"message\":{\"content\":\"ok\"}}\n"]));
        let mut ui = RecordingUi::default();

        session.send("again", &mut ui).await;
        session.send("again", &mut ui).await;

        let assistant_slots: Vec<_> = ui
            .slots()
            .into_iter()
            .filter(|(role, _)| *role == ChatRole::Assistant)
            .collect();
        assert_eq!(assistant_slots.len(), 2);
        assert_ne!(assistant_slots[0].1, assistant_slots[1].1);
        assert_eq!(session.transport.opened.load(Ordering::SeqCst), 2);
    }

    /// Holds `open` until released so a turn can be observed mid-flight.
    struct GatedTransport {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl ChatTransport for GatedTransport {
        async fn open(&self, _request: &ChatRequest, _identity: &Identity) -> Result<ByteStream, ExchangeError> {
            self.started.notify_one();
            self.release.notified().await;
            let line = Bytes::from_static(b"{\"message\":{\"content\":\"first\"}}\n");
            Ok(stream::iter(vec![Ok(line)]).boxed())
        }
    }

    #[tokio::test]
    async fn test_second_send_while_streaming_is_refused() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let session = ChatSession::new(
            GatedTransport {
                started: started.clone(),
                release: release.clone(),
            },
            Identity::generate(),
            APOLOGY,
        );
        let mut first_ui = RecordingUi::default();
        let mut second_ui = RecordingUi::default();

        let (first, second) = tokio::join!(session.send("one", &mut first_ui), async {
            started.notified().await;
            assert_eq!(session.state(), SessionState::Streaming);
            let report = session.send("two", &mut second_ui).await;
            release.notify_one();
            report
        });

        assert_eq!(first.text, "first");
        assert_eq!(second.outcome, TurnOutcome::Busy);
        assert!(second_ui.calls.is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }
}
