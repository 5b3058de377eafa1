/// Built-in command handlers.
///
/// Each handler is a unit struct implementing `SyncCommand` or `AsyncCommand`.
/// Bodies talk to the outside world only through the context's services.
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use cmdrelay_core::{InboundMessage, StructuredPayload, UserQuery, WorldInfo, WorldService};
use tracing::{debug, info};

use crate::context::CommandContext;
use crate::correlator::WaitError;
use crate::types::{AsyncCommand, SyncCommand, join_args};

const NO_FOCUSED_WORLD: &str = "No world is currently focused";

/// Find a world by raw name or session id, falling back to an index into
/// the world list. `Err` carries the reply for the sender.
fn find_world(world: &dyn WorldService, query: &str) -> Result<WorldInfo, String> {
    let worlds = world.worlds();
    if let Some(found) = worlds
        .iter()
        .find(|w| w.raw_name == query || w.session_id == query)
    {
        return Ok(found.clone());
    }
    match query.parse::<usize>() {
        Ok(index) => worlds
            .get(index)
            .cloned()
            .ok_or_else(|| "World index out of range".to_string()),
        Err(_) => Err(format!("No world found with the name {query}")),
    }
}

// ---------------------------------------------------------------------------
// /help
// ---------------------------------------------------------------------------

pub struct HelpHandler;

#[async_trait]
impl AsyncCommand for HelpHandler {
    async fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, args: &[String]) -> Result<()> {
        let registry = ctx.registry();

        if let Some(target) = args.first() {
            let target = target.trim_start_matches('/');
            let visible = registry
                .resolve(target)
                .filter(|c| c.required_permission <= ctx.permission);
            let Some(cmd) = visible else {
                ctx.reply(&format!("Command '{target}' not found")).await;
                return Ok(());
            };

            let mut text = format!("/{} {}", cmd.name, cmd.usage).trim_end().to_string();
            text.push_str(&format!("\n{}\nCategory: {}", cmd.description, cmd.category));
            if !cmd.aliases.is_empty() {
                text.push_str("\nAliases:");
                for alias in &cmd.aliases {
                    text.push_str(&format!("\n/{alias}"));
                }
            }
            ctx.reply(&text).await;
            return Ok(());
        }

        let mut batch = ctx.batch();
        for cmd in registry.list(ctx.permission) {
            let mut entry = format!("{} - {}", cmd.name, cmd.description);
            if !cmd.aliases.is_empty() {
                entry.push_str(&format!("\nAliases: {}", cmd.aliases.join(", ")));
            }
            batch.push_entry(entry);
        }
        batch.send().await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// /optOut
// ---------------------------------------------------------------------------

pub struct OptOutHandler;

#[async_trait]
impl AsyncCommand for OptOutHandler {
    async fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, _args: &[String]) -> Result<()> {
        let opted_out = ctx
            .services
            .settings
            .toggle_auto_invite_opt_out(&ctx.sender_id)
            .await?;
        info!(sender_id = %ctx.sender_id, opted_out, "Auto-invite preference changed");
        let reply = if opted_out {
            "Opted out of auto-invites"
        } else {
            "Opted in to auto-invites"
        };
        ctx.reply(reply).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// /markAllRead
// ---------------------------------------------------------------------------

pub struct MarkAllReadHandler;

#[async_trait]
impl AsyncCommand for MarkAllReadHandler {
    async fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, _args: &[String]) -> Result<()> {
        ctx.services.messaging.mark_all_read(&ctx.conversation).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// /reqInvite
// ---------------------------------------------------------------------------

pub struct ReqInviteHandler;

#[async_trait]
impl AsyncCommand for ReqInviteHandler {
    async fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, args: &[String]) -> Result<()> {
        let world = ctx.services.world.as_ref();

        let target = if args.is_empty() {
            world.focused_world().ok_or_else(|| NO_FOCUSED_WORLD.to_string())
        } else {
            find_world(world, &join_args(args))
        };
        let target = match target {
            Ok(target) => target,
            Err(reply) => {
                ctx.reply(&reply).await;
                return Ok(());
            }
        };

        if !world.can_user_join(&target, &ctx.sender_id) {
            ctx.reply(&format!("You can't join {}", target.name)).await;
            return Ok(());
        }

        world.allow_user_to_join(&target, &ctx.sender_id);
        let sent = ctx
            .send_structured(StructuredPayload::SessionInvite {
                session_id: target.session_id.clone(),
                world_name: target.name.clone(),
            })
            .await;
        debug!(sender_id = %ctx.sender_id, world = %target.session_id, sent, "Invite sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// /getSessionOrb
// ---------------------------------------------------------------------------

pub struct GetSessionOrbHandler;

#[async_trait]
impl AsyncCommand for GetSessionOrbHandler {
    async fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, args: &[String]) -> Result<()> {
        let world = ctx.services.world.as_ref();

        let target = if args.is_empty() {
            world
                .world_of_user(&ctx.sender_id)
                .ok_or_else(|| "You are not in any world".to_string())
        } else {
            find_world(world, &join_args(args))
        };
        let target = match target {
            Ok(target) => target,
            Err(reply) => {
                ctx.reply(&reply).await;
                return Ok(());
            }
        };

        if !world.can_user_join(&target, &ctx.sender_id) {
            ctx.reply(&format!("You can't join {}", target.name)).await;
            return Ok(());
        }

        let orb = world
            .session_orb(&target)
            .ok_or_else(|| anyhow!("could not create a session orb for {}", target.name))?;
        let delivered = ctx
            .send_structured(StructuredPayload::Object {
                label: format!("{} Session Orb", target.name),
                data: orb,
            })
            .await;
        if delivered {
            world.allow_user_to_join(&target, &ctx.sender_id);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// /worlds
// ---------------------------------------------------------------------------

pub struct WorldsHandler;

#[async_trait]
impl AsyncCommand for WorldsHandler {
    async fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, _args: &[String]) -> Result<()> {
        let world = ctx.services.world.as_ref();
        let mut batch = ctx.batch();

        // Indices refer to the full list so `/reqInvite <index>` lines up.
        for (index, w) in world.worlds().iter().enumerate() {
            if !world.can_user_join(w, &ctx.sender_id) {
                continue;
            }
            batch.push_entry(format!(
                "[{index}] {} | {} ({}) | {}",
                w.name, w.active_users, w.users, w.access_level
            ));
        }

        if batch.is_empty() {
            ctx.reply("No worlds available").await;
        } else {
            batch.send().await;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// /owo
// ---------------------------------------------------------------------------

pub struct OwoHandler;

impl SyncCommand for OwoHandler {
    fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, _args: &[String]) -> Result<()> {
        ctx.queue_reply("owo what's this?");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// World side effects
// ---------------------------------------------------------------------------

/// Runs `action` against the focused world and queues `done`.
fn with_focused_world(ctx: &CommandContext, done: &str, action: impl FnOnce(&dyn WorldService, &WorldInfo)) {
    let world = ctx.services.world.as_ref();
    match world.focused_world() {
        Some(focused) => {
            action(world, &focused);
            ctx.queue_reply(done);
        }
        None => ctx.queue_reply(NO_FOCUSED_WORLD),
    }
}

pub struct PlayTestSoundHandler;

impl SyncCommand for PlayTestSoundHandler {
    fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, _args: &[String]) -> Result<()> {
        with_focused_world(ctx, "A test sound was played.", |world, w| world.play_test_sound(w));
        Ok(())
    }
}

pub struct SpawnBoxHandler;

impl SyncCommand for SpawnBoxHandler {
    fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, _args: &[String]) -> Result<()> {
        with_focused_world(ctx, "A box was created.", |world, w| world.spawn_box(w));
        Ok(())
    }
}

pub struct ExplodeHandler;

impl SyncCommand for ExplodeHandler {
    fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, _args: &[String]) -> Result<()> {
        with_focused_world(ctx, "An explode was created owo.", |world, w| world.spawn_explosion(w));
        Ok(())
    }
}

const SCALE_SECONDS: f32 = 1.0;

/// Scale the sender, or the user named by `args`, in the focused world.
fn scale_target(ctx: &CommandContext, args: &[String], factor: f32, verb: &str) {
    let world = ctx.services.world.as_ref();
    let Some(focused) = world.focused_world() else {
        ctx.queue_reply(NO_FOCUSED_WORLD);
        return;
    };

    let query = if args.is_empty() {
        UserQuery::ById(ctx.sender_id.clone())
    } else {
        UserQuery::ByName(join_args(args))
    };
    match world.find_user(&focused, &query) {
        Some(user) => {
            world.scale_user(&focused, &user, factor, SCALE_SECONDS);
            ctx.queue_reply(format!("User {} was made {verb}.", user.user_name));
        }
        None => ctx.queue_reply("User not found!"),
    }
}

pub struct BiggerHandler;

impl SyncCommand for BiggerHandler {
    fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, args: &[String]) -> Result<()> {
        scale_target(ctx, args, 1.25, "bigger");
        Ok(())
    }
}

pub struct SmallerHandler;

impl SyncCommand for SmallerHandler {
    fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, args: &[String]) -> Result<()> {
        scale_target(ctx, args, 0.75, "smaller");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Debug
// ---------------------------------------------------------------------------

pub struct EchoNextHandler;

#[async_trait]
impl AsyncCommand for EchoNextHandler {
    async fn run(&self, ctx: &CommandContext, _msg: &InboundMessage, _args: &[String]) -> Result<()> {
        ctx.reply("Send your next message to echo it.").await;
        match ctx.await_reply(ctx.reply_timeout()).await {
            Ok(next) => {
                ctx.reply(&next.content).await;
            }
            Err(WaitError::TimedOut(_)) => {
                ctx.reply("No reply received.").await;
            }
            Err(reason) => {
                info!(sender_id = %ctx.sender_id, %reason, "Echo wait ended without a reply");
            }
        }
        Ok(())
    }
}

pub struct ThrowErrHandler;

impl SyncCommand for ThrowErrHandler {
    fn run(&self, _ctx: &CommandContext, _msg: &InboundMessage, _args: &[String]) -> Result<()> {
        Err(anyhow!("Error Thrown"))
    }
}

pub struct ThrowErrAsyncHandler;

#[async_trait]
impl AsyncCommand for ThrowErrAsyncHandler {
    async fn run(&self, _ctx: &CommandContext, _msg: &InboundMessage, _args: &[String]) -> Result<()> {
        tokio::task::yield_now().await;
        Err(anyhow!("Async Error Thrown"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{CommandDispatcher, DispatchOptions, DispatchOutcome};
    use crate::test_support::Fakes;
    use cmdrelay_core::{ConversationKey, PermissionLevel};
    use std::time::Duration;

    async fn run(dispatcher: &CommandDispatcher, sender: &str, text: &str) -> DispatchOutcome {
        dispatcher
            .handle_inbound_message(&InboundMessage::text(sender, text))
            .await
    }

    #[test]
    fn test_find_world_by_name_id_and_index() {
        let fakes = Fakes::new();
        let world = fakes.world.as_ref();
        assert_eq!(find_world(world, "My World Name").unwrap().session_id, "S-mine");
        assert_eq!(
            find_world(world, "my world name").unwrap_err(),
            "No world found with the name my world name"
        );
        assert_eq!(find_world(world, "S-lobby").unwrap().name, "Lobby");
        assert_eq!(find_world(world, "1").unwrap().session_id, "S-mine");
        assert_eq!(find_world(world, "7").unwrap_err(), "World index out of range");
        assert_eq!(find_world(world, "Nowhere").unwrap_err(), "No world found with the name Nowhere");
    }

    #[tokio::test]
    async fn test_help_hides_gated_commands() {
        let fakes = Fakes::new();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-bob", "/help").await;

        let replies = fakes.messenger.texts_to("U-bob").join("\n");
        assert!(replies.contains("help - Shows this help message\nAliases: commands"));
        assert!(replies.contains("owo - owo command"));
        assert!(!replies.contains("throwErr"));
        assert!(!replies.contains("spawnBox"));
    }

    #[tokio::test]
    async fn test_help_lists_everything_for_owner() {
        let fakes = Fakes::new();
        fakes.permissions.set("U-owner", PermissionLevel::Owner);
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-owner", "/commands").await;

        let replies = fakes.messenger.texts_to("U-owner").join("\n");
        assert!(replies.contains("throwErrAsync - Throw Error Asynchronously"));
        assert!(replies.contains("echoNext - Echoes your next message back"));
    }

    #[tokio::test]
    async fn test_help_respects_batch_budget() {
        let fakes = Fakes::new();
        fakes.permissions.set("U-owner", PermissionLevel::Owner);
        let mut builder = fakes
            .builder()
            .options(DispatchOptions { batch_max_chars: 80, ..DispatchOptions::default() });
        builder.register_builtins().unwrap();
        let dispatcher = builder.build();
        run(&dispatcher, "U-owner", "/help").await;

        let replies = fakes.messenger.texts_to("U-owner");
        assert!(replies.len() > 1);
        assert!(replies.iter().all(|r| r.chars().count() <= 80));
    }

    #[tokio::test]
    async fn test_help_for_single_command() {
        let fakes = Fakes::new();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-bob", "/help reqInvite").await;
        assert_eq!(
            fakes.messenger.texts_to("U-bob"),
            vec!["/reqInvite [?world name...]\nRequests an invite to a world\nCategory: Common\nAliases:\n/requestInvite"]
        );
    }

    #[tokio::test]
    async fn test_help_hides_gated_single_command() {
        let fakes = Fakes::new();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-bob", "/help throwErr").await;
        run(&dispatcher, "U-bob", "/help nope").await;
        // Double space: the first argument is the empty token.
        run(&dispatcher, "U-bob", "/help  owo").await;
        assert_eq!(
            fakes.messenger.texts_to("U-bob"),
            vec!["Command 'throwErr' not found", "Command 'nope' not found", "Command '' not found"]
        );
    }

    #[tokio::test]
    async fn test_opt_out_toggles() {
        let fakes = Fakes::new();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-bob", "/optOut").await;
        run(&dispatcher, "U-bob", "/OPTOUT").await;
        assert_eq!(
            fakes.messenger.texts_to("U-bob"),
            vec!["Opted out of auto-invites", "Opted in to auto-invites"]
        );
    }

    #[tokio::test]
    async fn test_opt_out_store_failure_is_reported() {
        let fakes = Fakes::new();
        fakes.settings.fail_writes();
        let dispatcher = fakes.dispatcher();
        let outcome = run(&dispatcher, "U-bob", "/optOut").await;
        assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
        assert_eq!(fakes.messenger.texts_to("U-bob"), vec!["Error: settings store is read-only"]);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let fakes = Fakes::new();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-bob", "/markAllRead").await;
        assert_eq!(fakes.messenger.all_read(), vec![ConversationKey::for_sender("U-bob")]);
    }

    #[tokio::test]
    async fn test_req_invite_focused_world() {
        let fakes = Fakes::new();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-carol", "/reqInvite").await;
        assert_eq!(fakes.world.actions(), vec!["allow S-lobby U-carol"]);
        assert_eq!(
            fakes.messenger.structured_to("U-carol"),
            vec![StructuredPayload::SessionInvite {
                session_id: "S-lobby".into(),
                world_name: "Lobby".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_req_invite_by_multi_word_name_via_alias() {
        let fakes = Fakes::new();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-carol", "/requestInvite My World Name").await;
        assert_eq!(fakes.world.actions(), vec!["allow S-mine U-carol"]);
    }

    #[tokio::test]
    async fn test_req_invite_lookup_failures() {
        let fakes = Fakes::new();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-carol", "/reqInvite 9").await;
        run(&dispatcher, "U-carol", "/reqInvite Nowhere").await;
        fakes.world.ban("S-lobby", "U-carol");
        run(&dispatcher, "U-carol", "/reqInvite Lobby").await;
        fakes.world.unfocus();
        run(&dispatcher, "U-carol", "/reqInvite").await;

        assert_eq!(
            fakes.messenger.texts_to("U-carol"),
            vec![
                "World index out of range",
                "No world found with the name Nowhere",
                "You can't join Lobby",
                NO_FOCUSED_WORLD,
            ]
        );
        assert!(fakes.world.actions().is_empty());
    }

    #[tokio::test]
    async fn test_session_orb_for_current_world() {
        let fakes = Fakes::new();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-alice", "/getSessionOrb").await;
        let sent = fakes.messenger.structured_to("U-alice");
        assert!(matches!(
            &sent[..],
            [StructuredPayload::Object { label, .. }] if label == "Lobby Session Orb"
        ));
        assert_eq!(fakes.world.actions(), vec!["allow S-lobby U-alice"]);
    }

    #[tokio::test]
    async fn test_session_orb_not_delivered_skips_join() {
        let fakes = Fakes::new();
        fakes.messenger.reject_structured();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-alice", "/getSessionOrb Lobby").await;
        assert!(fakes.world.actions().is_empty());
    }

    #[tokio::test]
    async fn test_session_orb_outside_any_world() {
        let fakes = Fakes::new();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-carol", "/getSessionOrb").await;
        assert_eq!(fakes.messenger.texts_to("U-carol"), vec!["You are not in any world"]);
    }

    #[tokio::test]
    async fn test_worlds_listing() {
        let fakes = Fakes::new();
        fakes.world.ban("S-lobby", "U-carol");
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-bob", "/worlds").await;
        run(&dispatcher, "U-carol", "/worlds").await;
        assert_eq!(
            fakes.messenger.texts_to("U-bob"),
            vec!["[0] Lobby | 2 (2) | Anyone\n[1] My World Name | 0 (0) | Contacts"]
        );
        assert_eq!(
            fakes.messenger.texts_to("U-carol"),
            vec!["[1] My World Name | 0 (0) | Contacts"]
        );
    }

    #[tokio::test]
    async fn test_owo() {
        let fakes = Fakes::new();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-bob", "/OwO").await;
        assert_eq!(fakes.messenger.texts_to("U-bob"), vec!["owo what's this?"]);
    }

    #[tokio::test]
    async fn test_world_side_effects_for_moderator() {
        let fakes = Fakes::new();
        fakes.permissions.set("U-mod", PermissionLevel::Moderator);
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-mod", "/playTestSound").await;
        run(&dispatcher, "U-mod", "/spawnBox").await;
        run(&dispatcher, "U-mod", "/explode").await;

        assert_eq!(fakes.world.actions(), vec!["sound S-lobby", "box S-lobby", "explode S-lobby"]);
        assert_eq!(
            fakes.messenger.texts_to("U-mod"),
            vec!["A test sound was played.", "A box was created.", "An explode was created owo."]
        );
    }

    #[tokio::test]
    async fn test_world_side_effect_without_focus() {
        let fakes = Fakes::new();
        fakes.permissions.set("U-mod", PermissionLevel::Moderator);
        fakes.world.unfocus();
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-mod", "/spawnBox").await;
        assert_eq!(fakes.messenger.texts_to("U-mod"), vec![NO_FOCUSED_WORLD]);
        assert!(fakes.world.actions().is_empty());
    }

    #[tokio::test]
    async fn test_bigger_and_smaller() {
        let fakes = Fakes::new();
        fakes.permissions.set("U-alice", PermissionLevel::Moderator);
        let dispatcher = fakes.dispatcher();
        run(&dispatcher, "U-alice", "/bigger").await;
        run(&dispatcher, "U-alice", "/smaller bob").await;
        run(&dispatcher, "U-alice", "/smaller Nobody Here").await;

        assert_eq!(
            fakes.world.actions(),
            vec!["scale S-lobby U-alice 1.25", "scale S-lobby U-bob 0.75"]
        );
        assert_eq!(
            fakes.messenger.texts_to("U-alice"),
            vec!["User Alice was made bigger.", "User Bob was made smaller.", "User not found!"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_next_times_out() {
        let fakes = Fakes::new();
        fakes.permissions.set("U-mod", PermissionLevel::Moderator);
        let mut builder = fakes.builder().options(DispatchOptions {
            reply_timeout: Duration::from_secs(2),
            ..DispatchOptions::default()
        });
        builder.register_builtins().unwrap();
        let dispatcher = builder.build();

        let outcome = run(&dispatcher, "U-mod", "/echoNext").await;
        assert_eq!(outcome, DispatchOutcome::Completed { command: "echoNext".into() });
        assert_eq!(
            fakes.messenger.texts_to("U-mod"),
            vec!["Send your next message to echo it.", "No reply received."]
        );
        assert!(!dispatcher.correlator().is_waiting(&ConversationKey::for_sender("U-mod")).await);
    }

    #[tokio::test]
    async fn test_echo_next_echoes_reply() {
        let fakes = Fakes::new();
        fakes.permissions.set("U-mod", PermissionLevel::Moderator);
        let dispatcher = fakes.dispatcher();
        let conversation = ConversationKey::for_sender("U-mod");

        let echo = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { run(&dispatcher, "U-mod", "/echoNext").await })
        };
        while !dispatcher.correlator().is_waiting(&conversation).await {
            tokio::task::yield_now().await;
        }
        assert_eq!(run(&dispatcher, "U-mod", "/owo").await, DispatchOutcome::Claimed);
        assert_eq!(
            echo.await.unwrap(),
            DispatchOutcome::Completed { command: "echoNext".into() }
        );
        assert_eq!(
            fakes.messenger.texts_to("U-mod"),
            vec!["Send your next message to echo it.", "/owo"]
        );
    }
}
