//! Session controller: user registry and command routing.
//!
//! The session is the only owner of the [`Picture`] and of every
//! [`ToolRunner`]. It runs on a single command-processing context; the
//! transport's reader task never touches it directly and instead pushes
//! [`SessionEvent`]s onto a queue that only the session drains.
//!
//! ```text
//! GUI ──gui_input()──────────────┐
//!                                ▼
//! socket ─► reader task ─► SessionEvent queue ─► Session ─► ToolRunner(user) ─► Picture
//!                                                   │
//!                                                   └─► Outbound (broadcast local input)
//! ```
//!
//! Local input is applied before it is broadcast and nothing reorders it
//! against remote input afterwards. Peers converge only as far as they see
//! commands in the same order.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::command::{Command, CommandKind, UserId};
use crate::constants::LOCAL_USER;
use crate::error::SessionError;
use crate::picture::Picture;
use crate::runner::ToolRunner;

/// Outbound half of a transport, as the session sees it.
///
/// `send` is fire-and-forget: it never blocks and reports nothing back.
pub trait Outbound {
    /// Whether a connection is currently established.
    fn is_connected(&self) -> bool;
    /// Queue already-encoded bytes for delivery.
    fn send(&self, bytes: Vec<u8>);
}

/// Hand-off from the I/O context to the command-processing context.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A command decoded from the peer stream.
    Inbound(Command),
    /// The connection ended; the session continues locally.
    Disconnected,
}

/// Identity assigned by the relay through `credentials`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Room joined.
    pub room: String,
    /// Name the relay knows us by.
    pub user: UserId,
}

/// Called with each newly registered interpreter, typically to attach
/// redraw and status listeners.
pub type JoinHook = Box<dyn FnMut(&mut ToolRunner)>;

/// Registry of participants and router for their commands.
pub struct Session {
    picture: Picture,
    users: HashMap<UserId, ToolRunner>,
    transport: Option<Box<dyn Outbound>>,
    identity: Option<Identity>,
    join_hooks: Vec<JoinHook>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("users", &self.users.keys().collect::<Vec<_>>())
            .field("layers", &self.picture.len())
            .field("identity", &self.identity)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session around a picture, with no users and no transport.
    pub fn new(picture: Picture) -> Self {
        Self {
            picture,
            users: HashMap::new(),
            transport: None,
            identity: None,
            join_hooks: Vec::new(),
        }
    }

    /// Register a hook run for every interpreter created from now on.
    pub fn on_user_joined(&mut self, hook: impl FnMut(&mut ToolRunner) + 'static) {
        self.join_hooks.push(Box::new(hook));
    }

    /// Register the local participant under [`LOCAL_USER`].
    pub fn create_local_user(&mut self) -> bool {
        self.add_user(LOCAL_USER)
    }

    /// Attach the outbound side of a transport.
    pub fn attach_transport(&mut self, transport: Box<dyn Outbound>) {
        self.transport = Some(transport);
    }

    /// True if a transport is attached and connected.
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_connected())
    }

    /// Apply a locally produced command, then broadcast it if connected.
    ///
    /// A command the local interpreter rejects is not broadcast.
    pub fn gui_input(&mut self, command: Command) -> Result<(), SessionError> {
        let runner = self
            .users
            .get_mut(LOCAL_USER)
            .ok_or_else(|| SessionError::UnknownUser(LOCAL_USER.to_string()))?;
        runner.execute(&mut self.picture, &command)?;

        if let Some(transport) = self.transport.as_ref().filter(|t| t.is_connected()) {
            transport.send(command.encode());
        }
        Ok(())
    }

    /// Route a command received from the transport.
    pub fn handle_inbound(&mut self, command: Command) -> Result<(), SessionError> {
        match &command.kind {
            CommandKind::Credentials { room, user } => {
                log::info!("[Session] Joined room '{}' as '{}'", room, user);
                self.identity = Some(Identity {
                    room: room.clone(),
                    user: user.clone(),
                });
            }
            CommandKind::UserJoin { user } => {
                self.add_user(user);
            }
            CommandKind::UserQuit { user } => {
                self.remove_user(user);
            }
            _ => {
                let user = command
                    .user
                    .as_deref()
                    .ok_or_else(|| SessionError::MissingUser(command.func().to_string()))?;
                let runner = self
                    .users
                    .get_mut(user)
                    .ok_or_else(|| SessionError::UnknownUser(user.to_string()))?;
                runner.execute(&mut self.picture, &command)?;
            }
        }
        Ok(())
    }

    /// Process one queued event. Failures are logged, never propagated.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Inbound(command) => {
                let func = command.func().to_string();
                if let Err(e) = self.handle_inbound(command) {
                    log::warn!("[Session] Dropped inbound '{}': {e}", func);
                }
            }
            SessionEvent::Disconnected => {
                log::info!("[Session] Transport lost, continuing locally");
            }
        }
    }

    /// Process every event already queued without waiting.
    ///
    /// Returns the number of events handled.
    pub fn drain(&mut self, rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> usize {
        let mut handled = 0;
        while let Ok(event) = rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Process events until every sender is dropped.
    pub async fn run(&mut self, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
        log::debug!("[Session] Event queue closed");
    }

    /// The shared picture.
    pub fn picture(&self) -> &Picture {
        &self.picture
    }

    /// Identity received from the relay, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Interpreter of a participant.
    pub fn runner(&self, user: &str) -> Option<&ToolRunner> {
        self.users.get(user)
    }

    /// Interpreter of a participant, mutably (to attach listeners).
    pub fn runner_mut(&mut self, user: &str) -> Option<&mut ToolRunner> {
        self.users.get_mut(user)
    }

    /// Registered participant ids, in no particular order.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    /// Number of registered participants.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn add_user(&mut self, user: &str) -> bool {
        if self.users.contains_key(user) {
            log::warn!("[Session] User '{}' already registered, keeping existing interpreter", user);
            return false;
        }
        let mut runner = ToolRunner::new(user);
        for hook in &mut self.join_hooks {
            hook(&mut runner);
        }
        self.users.insert(user.to_string(), runner);
        log::info!("[Session] User joined: {}", user);
        true
    }

    fn remove_user(&mut self, user: &str) {
        match self.users.remove(user) {
            Some(runner) if runner.is_stroking() => {
                log::info!("[Session] User quit mid-stroke, stroke left open: {}", user);
            }
            Some(_) => log::info!("[Session] User quit: {}", user),
            None => log::debug!("[Session] Quit for unknown user ignored: {}", user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Default)]
    struct FakeTransport {
        connected: Rc<Cell<bool>>,
        sent: Rc<RefCell<Vec<Vec<u8>>>>,
    }

    impl Outbound for FakeTransport {
        fn is_connected(&self) -> bool {
            self.connected.get()
        }

        fn send(&self, bytes: Vec<u8>) {
            self.sent.borrow_mut().push(bytes);
        }
    }

    fn cmd(value: serde_json::Value) -> Command {
        Command::try_from(value).unwrap()
    }

    fn session() -> Session {
        let mut session = Session::new(Picture::new(16, 16));
        session.create_local_user();
        session
    }

    #[test]
    fn test_gui_input_applies_then_broadcasts_when_connected() {
        let mut session = session();
        let transport = FakeTransport::default();
        let connected = Rc::clone(&transport.connected);
        let sent = Rc::clone(&transport.sent);
        session.attach_transport(Box::new(transport));

        session
            .gui_input(cmd(json!({"func": "create_layer", "layer": "L"})))
            .unwrap();
        assert!(session.picture().contains("L"));
        assert!(sent.borrow().is_empty());

        connected.set(true);
        session
            .gui_input(cmd(json!({"func": "rename_layer", "layer": "L", "name": "Ink"})))
            .unwrap();
        assert_eq!(sent.borrow().len(), 1);
        let echoed: Command = serde_json::from_slice(&sent.borrow()[0]).unwrap();
        assert_eq!(echoed.func(), "rename_layer");
    }

    #[test]
    fn test_rejected_gui_input_is_not_broadcast() {
        let mut session = session();
        let transport = FakeTransport::default();
        transport.connected.set(true);
        let sent = Rc::clone(&transport.sent);
        session.attach_transport(Box::new(transport));

        let err = session
            .gui_input(cmd(json!({"func": "clear", "layer": "nope"})))
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::Command(CommandError::UnknownLayer("nope".to_string()))
        );
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_credentials_record_identity() {
        let mut session = session();
        session
            .handle_inbound(cmd(json!({"func": "credentials", "room": "r1", "user": "guest7"})))
            .unwrap();
        assert_eq!(
            session.identity(),
            Some(&Identity {
                room: "r1".to_string(),
                user: "guest7".to_string()
            })
        );
        assert_eq!(session.user_count(), 1);
    }

    #[test]
    fn test_join_runs_hooks_and_quit_removes() {
        let mut session = Session::new(Picture::new(8, 8));
        let joined = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&joined);
        session.on_user_joined(move |runner| log.borrow_mut().push(runner.user().to_string()));

        session.create_local_user();
        session
            .handle_inbound(cmd(json!({"func": "user_join", "user": "bob"})))
            .unwrap();
        session
            .handle_inbound(cmd(json!({"func": "user_join", "user": "bob"})))
            .unwrap();
        assert_eq!(*joined.borrow(), vec![LOCAL_USER, "bob"]);

        session
            .handle_inbound(cmd(json!({"func": "user_quit", "user": "bob"})))
            .unwrap();
        session
            .handle_inbound(cmd(json!({"func": "user_quit", "user": "ghost"})))
            .unwrap();
        assert!(session.runner("bob").is_none());
        assert_eq!(session.user_count(), 1);
    }

    #[test]
    fn test_routing_errors() {
        let mut session = session();
        assert_eq!(
            session.handle_inbound(cmd(json!({"func": "undo", "layer": "L", "user": "eve"}))),
            Err(SessionError::UnknownUser("eve".to_string()))
        );
        assert_eq!(
            session.handle_inbound(cmd(json!({"func": "undo", "layer": "L"}))),
            Err(SessionError::MissingUser("undo".to_string()))
        );
    }

    #[test]
    fn test_drain_handles_queued_events_in_order() {
        let mut session = session();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(SessionEvent::Inbound(cmd(json!({"func": "user_join", "user": "bob"}))))
            .unwrap();
        tx.send(SessionEvent::Inbound(cmd(
            json!({"func": "create_layer", "layer": "B1", "user": "bob"}),
        )))
        .unwrap();
        tx.send(SessionEvent::Inbound(cmd(
            json!({"func": "clear", "layer": "B1", "user": "nobody"}),
        )))
        .unwrap();
        tx.send(SessionEvent::Disconnected).unwrap();

        assert_eq!(session.drain(&mut rx), 4);
        assert_eq!(session.picture().order(), ["B1"]);
        assert_eq!(session.drain(&mut rx), 0);
    }
}
