use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use super::types::{Edit, PageDraft, SaveState};
use crate::cache::PageCache;
use crate::content::ContentTree;
use crate::pages::PageGateway;

/// Quiet period between the last keystroke and the write it triggers
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(1000);

enum Command {
    Edit(Edit),
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    /// No unsaved edits; the last write, if any, succeeded
    Idle,
    /// Edits received, debounce timer running
    Pending,
    /// A write has been issued and has not settled
    InFlight,
    /// The last write failed; the draft is retained
    Failed,
}

/// Spawns per-page sync sessions over a shared gateway/cache pair.
///
/// Each open page gets its own task owning that page's draft; sessions on
/// different pages are fully independent.
#[derive(Clone)]
pub struct SyncEngine {
    gateway: PageGateway,
    cache: PageCache,
    quiet_period: Duration,
}

impl SyncEngine {
    pub fn new(gateway: PageGateway, cache: PageCache) -> Self {
        SyncEngine {
            gateway,
            cache,
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }

    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    /// Begin an editing session for one page
    pub fn open(&self, page_id: impl Into<String>) -> SyncHandle {
        let page_id = page_id.into();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, save_state) = watch::channel(SaveState::Saved);

        let session = Session {
            gateway: self.gateway.clone(),
            cache: self.cache.clone(),
            page_id: page_id.clone(),
            quiet_period: self.quiet_period,
            state_tx,
        };
        tokio::spawn(session.run(command_rx));

        SyncHandle {
            commands,
            save_state,
            page_id,
        }
    }
}

/// Local control of one open page.
///
/// Dropping the handle ends the session: a write already on the wire is left
/// to settle, but edits still inside the quiet period are abandoned with it.
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<Command>,
    save_state: watch::Receiver<SaveState>,
    page_id: String,
}

impl SyncHandle {
    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// Record a title keystroke
    pub fn edit_title(&self, title: impl Into<String>) {
        let _ = self
            .commands
            .send(Command::Edit(Edit::Title(title.into())));
    }

    /// Record a whole-tree content replacement from the editor
    pub fn edit_content(&self, content: ContentTree) {
        let _ = self.commands.send(Command::Edit(Edit::Content(content)));
    }

    /// Ask for an immediate re-send after a failed save
    pub fn retry(&self) {
        let _ = self.commands.send(Command::Retry);
    }

    /// Current save indicator
    pub fn save_state(&self) -> SaveState {
        *self.save_state.borrow()
    }

    /// Watch the save indicator
    pub fn save_states(&self) -> watch::Receiver<SaveState> {
        self.save_state.clone()
    }
}

struct Session {
    gateway: PageGateway,
    cache: PageCache,
    page_id: String,
    quiet_period: Duration,
    state_tx: watch::Sender<SaveState>,
}

impl Session {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut draft = PageDraft::default();
        let mut state = EngineState::Idle;
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    // Handle dropped; anything still unsaved goes with it
                    None => break,
                    Some(Command::Edit(edit)) => {
                        draft.apply(edit);
                        deadline = Some(Instant::now() + self.quiet_period);
                        self.transition(&mut state, EngineState::Pending, SaveState::Saving);
                    }
                    Some(Command::Retry) => {
                        if state == EngineState::Failed && !draft.is_empty() {
                            deadline = Some(Instant::now());
                            self.transition(&mut state, EngineState::Pending, SaveState::Saving);
                        }
                    }
                },
                _ = sleep_until_deadline(deadline) => {
                    deadline = None;
                    let closed = self
                        .write_out(&mut draft, &mut state, &mut deadline, &mut commands)
                        .await;
                    if closed {
                        break;
                    }
                }
            }
        }
    }

    /// Issue exactly one update carrying the draft as of send time, folding
    /// in any edits that land while the call is on the wire. Returns true
    /// when the handle was dropped and the session should end.
    async fn write_out(
        &self,
        draft: &mut PageDraft,
        state: &mut EngineState,
        deadline: &mut Option<Instant>,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> bool {
        let sent = draft.clone();
        *state = EngineState::InFlight;
        debug!(page_id = %self.page_id, "issuing debounced update");

        let call = self.gateway.update(&self.page_id, sent.to_update());
        tokio::pin!(call);

        let mut closed = false;
        let mut edited_in_flight = false;

        // Never two writes on the wire for one page: edits arriving now are
        // folded into the draft and get their own turn once this settles.
        let result = loop {
            tokio::select! {
                result = &mut call => break result,
                cmd = commands.recv(), if !closed => match cmd {
                    None => closed = true,
                    Some(Command::Edit(edit)) => {
                        draft.apply(edit);
                        edited_in_flight = true;
                        self.set_save_state(SaveState::Saving);
                    }
                    // Already writing
                    Some(Command::Retry) => {}
                },
            }
        };

        match result {
            Ok(page) => {
                self.cache.note_updated(&page);
                draft.confirm(&sent);
                if draft.is_empty() {
                    self.transition(state, EngineState::Idle, SaveState::Saved);
                } else {
                    // Part of what was written is already superseded
                    *deadline = Some(Instant::now() + self.quiet_period);
                    self.transition(state, EngineState::Pending, SaveState::Saving);
                }
            }
            Err(e) => {
                warn!(page_id = %self.page_id, error = %e, "debounced update failed");
                if edited_in_flight {
                    // The failure is already stale; the newer edits take over
                    *deadline = Some(Instant::now() + self.quiet_period);
                    self.transition(state, EngineState::Pending, SaveState::Saving);
                } else {
                    self.transition(state, EngineState::Failed, SaveState::Error);
                }
            }
        }

        closed
    }

    fn transition(&self, state: &mut EngineState, next: EngineState, visible: SaveState) {
        if *state != next {
            debug!(page_id = %self.page_id, ?state, ?next, "sync state change");
        }
        *state = next;
        self.set_save_state(visible);
    }

    fn set_save_state(&self, next: SaveState) {
        self.state_tx.send_if_modified(|current| {
            if *current != next {
                *current = next;
                true
            } else {
                false
            }
        });
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
