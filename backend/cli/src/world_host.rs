//! In-process world host used by the console front-end.
//!
//! Keeps a fixed set of sessions in memory. Side effects (sounds, boxes,
//! scaling) are only logged, there is no engine behind them.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use cmdrelay_core::{AccessLevel, UserQuery, WorldInfo, WorldService, WorldUser};
use serde_json::json;
use tracing::info;

struct HostState {
    focused: Option<usize>,
    members: HashMap<String, Vec<WorldUser>>,
    /// (session id, user id) pairs allowed in past their access level.
    allowed: HashSet<(String, String)>,
}

pub struct InMemoryWorldHost {
    worlds: Vec<WorldInfo>,
    state: Mutex<HostState>,
}

impl InMemoryWorldHost {
    pub fn new(worlds: Vec<WorldInfo>) -> Self {
        let focused = if worlds.is_empty() { None } else { Some(0) };
        Self {
            worlds,
            state: Mutex::new(HostState {
                focused,
                members: HashMap::new(),
                allowed: HashSet::new(),
            }),
        }
    }

    /// Two sessions; `host_user` stands in the focused "Lobby".
    pub fn demo(host_user: &str) -> Self {
        let world = |session_id: &str, name: &str, access_level| WorldInfo {
            session_id: session_id.to_string(),
            name: name.to_string(),
            raw_name: name.to_string(),
            active_users: 0,
            users: 0,
            access_level,
        };
        let host = Self::new(vec![
            world("S-lobby", "Lobby", AccessLevel::Anyone),
            world("S-workshop", "Workshop", AccessLevel::Contacts),
        ]);
        host.add_user("S-lobby", host_user, host_user);
        host
    }

    pub fn add_user(&self, session_id: &str, user_id: &str, user_name: &str) {
        if let Ok(mut state) = self.state.lock() {
            state
                .members
                .entry(session_id.to_string())
                .or_default()
                .push(WorldUser {
                    user_id: user_id.to_string(),
                    user_name: user_name.to_string(),
                });
        }
    }

    fn with_counts(&self, world: &WorldInfo, state: &HostState) -> WorldInfo {
        let users = state
            .members
            .get(&world.session_id)
            .map(Vec::len)
            .unwrap_or(0) as u32;
        WorldInfo {
            active_users: users,
            users,
            ..world.clone()
        }
    }
}

impl WorldService for InMemoryWorldHost {
    fn worlds(&self) -> Vec<WorldInfo> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        self.worlds.iter().map(|w| self.with_counts(w, &state)).collect()
    }

    fn focused_world(&self) -> Option<WorldInfo> {
        let state = self.state.lock().ok()?;
        let world = self.worlds.get(state.focused?)?;
        Some(self.with_counts(world, &state))
    }

    fn world_of_user(&self, user_id: &str) -> Option<WorldInfo> {
        let state = self.state.lock().ok()?;
        self.worlds
            .iter()
            .find(|w| {
                state
                    .members
                    .get(&w.session_id)
                    .is_some_and(|users| users.iter().any(|u| u.user_id == user_id))
            })
            .map(|w| self.with_counts(w, &state))
    }

    fn can_user_join(&self, world: &WorldInfo, user_id: &str) -> bool {
        if world.access_level != AccessLevel::Private {
            return true;
        }
        self.state
            .lock()
            .map(|s| s.allowed.contains(&(world.session_id.clone(), user_id.to_string())))
            .unwrap_or(false)
    }

    fn allow_user_to_join(&self, world: &WorldInfo, user_id: &str) {
        info!(world = %world.session_id, user_id, "User allowed to join");
        if let Ok(mut state) = self.state.lock() {
            state
                .allowed
                .insert((world.session_id.clone(), user_id.to_string()));
        }
    }

    fn find_user(&self, world: &WorldInfo, query: &UserQuery) -> Option<WorldUser> {
        let state = self.state.lock().ok()?;
        state
            .members
            .get(&world.session_id)?
            .iter()
            .find(|u| query.matches(u))
            .cloned()
    }

    fn scale_user(&self, world: &WorldInfo, user: &WorldUser, factor: f32, seconds: f32) {
        info!(world = %world.session_id, user_id = %user.user_id, factor, seconds, "Scaling user");
    }

    fn play_test_sound(&self, world: &WorldInfo) {
        info!(world = %world.session_id, "Playing test sound");
    }

    fn spawn_box(&self, world: &WorldInfo) {
        info!(world = %world.session_id, "Spawning box");
    }

    fn spawn_explosion(&self, world: &WorldInfo) {
        info!(world = %world.session_id, "Spawning explosion");
    }

    fn session_orb(&self, world: &WorldInfo) -> Option<serde_json::Value> {
        Some(json!({
            "sessionId": world.session_id,
            "name": world.name,
        }))
    }
}
