use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use sitechat_core::{ChatRole, InputControls, MessageSink, SlotId};
use tokio::sync::mpsc;

/// UI mutations requested by a running turn, applied by the event loop in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiUpdate {
    CreateSlot { slot: SlotId, role: ChatRole },
    SetContent { slot: SlotId, text: String, is_error: bool },
    ScrollToLatest,
    ClearInput,
    SetEnabled(bool),
    FocusInput,
}

/// Sink and input controls for a turn running in a background task.
///
/// Slot ids are allocated here so `create_slot` can answer immediately;
/// clones share the counter, so ids stay unique across turns.
#[derive(Clone)]
pub struct ChannelUi {
    tx: mpsc::UnboundedSender<UiUpdate>,
    next_slot: Arc<AtomicU64>,
}

impl ChannelUi {
    pub fn new(tx: mpsc::UnboundedSender<UiUpdate>) -> Self {
        Self {
            tx,
            next_slot: Arc::new(AtomicU64::new(0)),
        }
    }

    // A closed receiver means the UI is shutting down; updates are dropped
    fn push(&self, update: UiUpdate) {
        let _ = self.tx.send(update);
    }
}

impl MessageSink for ChannelUi {
    fn create_slot(&mut self, role: ChatRole) -> SlotId {
        let slot = SlotId(self.next_slot.fetch_add(1, Ordering::Relaxed) + 1);
        self.push(UiUpdate::CreateSlot { slot, role });
        slot
    }

    fn set_content(&mut self, slot: SlotId, text: &str, is_error: bool) {
        self.push(UiUpdate::SetContent {
            slot,
            text: text.to_string(),
            is_error,
        });
    }

    fn scroll_to_latest(&mut self) {
        self.push(UiUpdate::ScrollToLatest);
    }
}

impl InputControls for ChannelUi {
    fn clear_input(&mut self) {
        self.push(UiUpdate::ClearInput);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.push(UiUpdate::SetEnabled(enabled));
    }

    fn focus_input(&mut self) {
        self.push(UiUpdate::FocusInput);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_ids_unique_across_clones() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut first = ChannelUi::new(tx);
        let mut second = first.clone();

        let a = first.create_slot(ChatRole::User);
        let b = second.create_slot(ChatRole::Assistant);
        assert_ne!(a, b);

        assert_eq!(rx.try_recv().unwrap(), UiUpdate::CreateSlot { slot: a, role: ChatRole::User });
        assert_eq!(rx.try_recv().unwrap(), UiUpdate::CreateSlot { slot: b, role: ChatRole::Assistant });
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut ui = ChannelUi::new(tx);
        ui.set_enabled(true);
        ui.scroll_to_latest();
    }
}
