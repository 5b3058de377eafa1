//! In-memory collaborators for dispatcher and command tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use cmdrelay_core::{
    AccessLevel, ConversationKey, MessagingService, PermissionLevel, PermissionResolver,
    SettingsStore, StructuredPayload, UserQuery, WorldInfo, WorldService, WorldUser,
};

use crate::context::Services;
use crate::dispatch::{CommandDispatcher, DispatchOptions, DispatcherBuilder};

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text(ConversationKey, String),
    Structured(ConversationKey, StructuredPayload),
}

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    read: Mutex<Vec<String>>,
    all_read: Mutex<Vec<ConversationKey>>,
    reject_structured: AtomicBool,
}

impl RecordingMessenger {
    pub fn reject_structured(&self) {
        self.reject_structured.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts_to(&self, sender_id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text(to, text) if to.as_str() == sender_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn structured_to(&self, sender_id: &str) -> Vec<StructuredPayload> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Structured(to, payload) if to.as_str() == sender_id => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn read_ids(&self) -> Vec<String> {
        self.read.lock().unwrap().clone()
    }

    pub fn all_read(&self) -> Vec<ConversationKey> {
        self.all_read.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingService for RecordingMessenger {
    async fn send_text(&self, to: &ConversationKey, text: &str) -> bool {
        self.sent.lock().unwrap().push(Sent::Text(to.clone(), text.to_string()));
        true
    }

    async fn send_structured(&self, to: &ConversationKey, payload: StructuredPayload) -> bool {
        if self.reject_structured.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().unwrap().push(Sent::Structured(to.clone(), payload));
        true
    }

    async fn mark_read(&self, message_id: &str) {
        self.read.lock().unwrap().push(message_id.to_string());
    }

    async fn mark_all_read(&self, conversation: &ConversationKey) {
        self.all_read.lock().unwrap().push(conversation.clone());
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FixedPermissions {
    levels: Mutex<HashMap<String, PermissionLevel>>,
}

impl FixedPermissions {
    pub fn set(&self, sender_id: &str, level: PermissionLevel) {
        self.levels.lock().unwrap().insert(sender_id.to_string(), level);
    }
}

impl PermissionResolver for FixedPermissions {
    fn check(&self, sender_id: &str) -> PermissionLevel {
        self.levels
            .lock()
            .unwrap()
            .get(sender_id)
            .copied()
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Two worlds: "Lobby" (focused, alice and bob inside) and "My World Name" (empty).
pub struct FakeWorld {
    worlds: Vec<WorldInfo>,
    focused: Mutex<Option<usize>>,
    members: HashMap<String, Vec<WorldUser>>,
    banned: Mutex<HashSet<(String, String)>>,
    actions: Mutex<Vec<String>>,
}

impl Default for FakeWorld {
    fn default() -> Self {
        let world = |session_id: &str, name: &str, active, users, access_level| WorldInfo {
            session_id: session_id.into(),
            name: name.into(),
            raw_name: name.into(),
            active_users: active,
            users,
            access_level,
        };
        let user = |id: &str, name: &str| WorldUser {
            user_id: id.into(),
            user_name: name.into(),
        };

        let mut members = HashMap::new();
        members.insert(
            "S-lobby".to_string(),
            vec![user("U-alice", "Alice"), user("U-bob", "Bob")],
        );

        Self {
            worlds: vec![
                world("S-lobby", "Lobby", 2, 2, AccessLevel::Anyone),
                world("S-mine", "My World Name", 0, 0, AccessLevel::Contacts),
            ],
            focused: Mutex::new(Some(0)),
            members,
            banned: Mutex::new(HashSet::new()),
            actions: Mutex::new(Vec::new()),
        }
    }
}

impl FakeWorld {
    pub fn unfocus(&self) {
        *self.focused.lock().unwrap() = None;
    }

    pub fn ban(&self, session_id: &str, user_id: &str) {
        self.banned
            .lock()
            .unwrap()
            .insert((session_id.to_string(), user_id.to_string()));
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }
}

impl WorldService for FakeWorld {
    fn worlds(&self) -> Vec<WorldInfo> {
        self.worlds.clone()
    }

    fn focused_world(&self) -> Option<WorldInfo> {
        self.focused
            .lock()
            .unwrap()
            .and_then(|i| self.worlds.get(i).cloned())
    }

    fn world_of_user(&self, user_id: &str) -> Option<WorldInfo> {
        self.worlds
            .iter()
            .find(|w| {
                self.members
                    .get(&w.session_id)
                    .is_some_and(|users| users.iter().any(|u| u.user_id == user_id))
            })
            .cloned()
    }

    fn can_user_join(&self, world: &WorldInfo, user_id: &str) -> bool {
        !self
            .banned
            .lock()
            .unwrap()
            .contains(&(world.session_id.clone(), user_id.to_string()))
    }

    fn allow_user_to_join(&self, world: &WorldInfo, user_id: &str) {
        self.record(format!("allow {} {}", world.session_id, user_id));
    }

    fn find_user(&self, world: &WorldInfo, query: &UserQuery) -> Option<WorldUser> {
        self.members
            .get(&world.session_id)?
            .iter()
            .find(|u| query.matches(u))
            .cloned()
    }

    fn scale_user(&self, world: &WorldInfo, user: &WorldUser, factor: f32, _seconds: f32) {
        self.record(format!("scale {} {} {}", world.session_id, user.user_id, factor));
    }

    fn play_test_sound(&self, world: &WorldInfo) {
        self.record(format!("sound {}", world.session_id));
    }

    fn spawn_box(&self, world: &WorldInfo) {
        self.record(format!("box {}", world.session_id));
    }

    fn spawn_explosion(&self, world: &WorldInfo) {
        self.record(format!("explode {}", world.session_id));
    }

    fn session_orb(&self, world: &WorldInfo) -> Option<serde_json::Value> {
        Some(serde_json::json!({ "session": world.session_id }))
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemorySettings {
    opted_out: Mutex<HashSet<String>>,
    fail_writes: AtomicBool,
}

impl MemorySettings {
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn toggle_auto_invite_opt_out(&self, user_id: &str) -> Result<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("settings store is read-only");
        }
        let mut opted_out = self.opted_out.lock().unwrap();
        if opted_out.remove(user_id) {
            Ok(false)
        } else {
            opted_out.insert(user_id.to_string());
            Ok(true)
        }
    }

    async fn is_opted_out(&self, user_id: &str) -> bool {
        self.opted_out.lock().unwrap().contains(user_id)
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

pub struct Fakes {
    pub messenger: Arc<RecordingMessenger>,
    pub permissions: Arc<FixedPermissions>,
    pub world: Arc<FakeWorld>,
    pub settings: Arc<MemorySettings>,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            messenger: Arc::new(RecordingMessenger::default()),
            permissions: Arc::new(FixedPermissions::default()),
            world: Arc::new(FakeWorld::default()),
            settings: Arc::new(MemorySettings::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            messaging: self.messenger.clone(),
            permissions: self.permissions.clone(),
            world: self.world.clone(),
            settings: self.settings.clone(),
        }
    }

    /// An empty builder over these fakes.
    pub fn builder(&self) -> DispatcherBuilder {
        DispatcherBuilder::new(self.services())
    }

    /// A dispatcher serving the built-in catalog.
    pub fn dispatcher(&self) -> CommandDispatcher {
        let mut builder = self.builder().options(DispatchOptions::default());
        builder.register_builtins().unwrap();
        builder.build()
    }
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// Collects formatted log lines emitted on the current thread while the
/// guard returned by [`LogCapture::install`] is alive.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
