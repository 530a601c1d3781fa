//! Inbound message handling
//!
//! Filters senders, answers bridge commands, validates directives and hands
//! everything else to the [`Orchestrator`].

pub mod serve;

pub use serve::serve;

use std::sync::Arc;

use crate::chat::{parse_message, BridgeCommand, ChatChannel, InboundMessage, ParsedMessage};
use crate::error::Result;
use crate::opencode::Catalog;
use crate::orchestrator::{Orchestrator, Submission};
use crate::session::{ConversationContext, ConversationId, PendingRequest, SettingsChange};

/// What happened to an inbound message
#[derive(Debug)]
pub enum Handled {
    /// Sender not allowed, or nothing to do
    Ignored,
    Command(BridgeCommand),
    /// Directives only; applied to the idle conversation
    Configured,
    /// Refused with a notice in the thread
    Rejected(String),
    Submitted(Submission),
}

pub struct Bridge {
    orchestrator: Orchestrator,
    catalog: Option<Arc<Catalog>>,
    allowed_user: Option<String>,
    queue_notice: bool,
}

impl Bridge {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            catalog: None,
            allowed_user: None,
            queue_notice: true,
        }
    }

    /// Validate `model:` and `agent:` directives against this catalog
    pub fn with_catalog(mut self, catalog: Arc<Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Only act on messages from this sender
    pub fn with_allowed_user(mut self, user: Option<String>) -> Self {
        self.allowed_user = user;
        self
    }

    pub fn with_queue_notice(mut self, enabled: bool) -> Self {
        self.queue_notice = enabled;
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    fn channel(&self) -> &Arc<dyn ChatChannel> {
        self.orchestrator.channel()
    }

    pub async fn handle(&self, message: InboundMessage) -> Result<Handled> {
        if let Some(allowed) = &self.allowed_user {
            if &message.sender != allowed {
                tracing::debug!(sender = %message.sender, "Ignoring message from other user");
                return Ok(Handled::Ignored);
            }
        }

        let id = message.conversation_id();
        tracing::debug!(conversation = %id, reply = message.is_reply, "Inbound message");

        if let Some(command) = BridgeCommand::parse(&message.text) {
            self.run_command(&id, command).await?;
            return Ok(Handled::Command(command));
        }

        let parsed = parse_message(&message.text);
        if let Err(reason) = self.validate(&parsed).await {
            self.channel().post_text(&id, &format!("⚠️ {}", reason)).await?;
            return Ok(Handled::Rejected(reason));
        }

        let settings = SettingsChange {
            working_context: parsed.dir,
            model_override: parsed.model,
            agent_override: parsed.agent,
        };

        if parsed.payload.is_empty() && parsed.command.is_none() {
            if settings.is_empty() {
                return Ok(Handled::Ignored);
            }
            return self.configure(&id, settings).await;
        }

        let request = PendingRequest::new(parsed.payload)
            .with_command(parsed.command)
            .with_files(message.files)
            .with_settings(settings);

        let submission = self.orchestrator.submit(&id, request);
        if let Submission::Queued { position } = &submission {
            if self.queue_notice {
                let notice = format!(
                    "⏳ Queued (position {}), will run when the current request finishes",
                    position
                );
                self.channel().post_text(&id, &notice).await?;
            }
        }
        Ok(Handled::Submitted(submission))
    }

    /// Directive-only message: apply now if idle, refuse while a run is active
    async fn configure(&self, id: &ConversationId, settings: SettingsChange) -> Result<Handled> {
        let applied = self.orchestrator.store().update(id, |ctx| {
            if ctx.busy {
                None
            } else {
                settings.apply_to(ctx);
                ctx.touch();
                Some(ctx.clone())
            }
        });

        match applied {
            Some(ctx) => {
                let summary = format!("⚙️ Settings updated: {}", describe_settings(&ctx));
                self.channel().post_text(id, &summary).await?;
                Ok(Handled::Configured)
            }
            None => {
                let reason = "A request is running; send settings together with your next message"
                    .to_string();
                self.channel().post_text(id, &format!("⚠️ {}", reason)).await?;
                Ok(Handled::Rejected(reason))
            }
        }
    }

    async fn validate(&self, parsed: &ParsedMessage) -> std::result::Result<(), String> {
        if let Some(dir) = &parsed.dir {
            match tokio::fs::metadata(dir).await {
                Ok(meta) if meta.is_dir() => {}
                _ => return Err(format!("Directory not found: `{}`", dir.display())),
            }
        }

        let Some(catalog) = &self.catalog else {
            return Ok(());
        };

        if let Some(Some(model)) = &parsed.model {
            let models = catalog.models().await;
            // An empty catalog means the listing failed, not that nothing exists
            if !models.is_empty() && !models.contains(model) {
                return Err(format!("Unknown model `{}`", model));
            }
        }

        if let Some(Some(agent)) = &parsed.agent {
            let agents = catalog.agents().await;
            if !agents.is_empty() && !agents.iter().any(|a| &a.name == agent) {
                return Err(format!("Unknown agent `{}`", agent));
            }
        }

        Ok(())
    }

    async fn run_command(&self, id: &ConversationId, command: BridgeCommand) -> Result<()> {
        let store = self.orchestrator.store();
        let reply = match command {
            BridgeCommand::Reset => {
                let busy = store.get(id).is_some_and(|ctx| ctx.busy);
                if busy {
                    "⚠️ Cannot reset while a request is running".to_string()
                } else {
                    store.delete(id);
                    tracing::info!(conversation = %id, "Conversation reset");
                    "🔄 Conversation reset; the next message starts a new session".to_string()
                }
            }
            BridgeCommand::Status => status_report(&store.list_all()),
        };

        self.channel().post_text(id, &reply).await?;
        Ok(())
    }
}

fn describe_settings(ctx: &ConversationContext) -> String {
    let dir = ctx
        .working_context
        .as_ref()
        .map(|d| format!("`{}`", d.display()))
        .unwrap_or_else(|| "default".to_string());
    format!(
        "dir {} · model {} · agent {}",
        dir,
        ctx.model_override.as_deref().unwrap_or("default"),
        ctx.agent_override.as_deref().unwrap_or("default"),
    )
}

pub fn status_report(conversations: &[(ConversationId, ConversationContext)]) -> String {
    if conversations.is_empty() {
        return "No conversations".to_string();
    }

    let mut lines = vec![format!("*Conversations* ({})", conversations.len())];
    for (id, ctx) in conversations {
        lines.push(format!(
            "• `{}` · {} · session {} · {} · last active {}",
            id,
            ctx.phase(),
            ctx.continuation_handle.as_deref().unwrap_or("none"),
            describe_settings(ctx),
            ctx.last_active.format("%Y-%m-%d %H:%M:%S UTC"),
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::OrchestratorSettings;
    use crate::session::{ContextPatch, ConversationStore};
    use crate::subprocess::MockProcessRunner;
    use crate::testing::{RecordingChannel, ScriptedLauncher, ScriptedRun};
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn inbound(text: &str) -> InboundMessage {
        InboundMessage {
            sender: "U1".to_string(),
            text: text.to_string(),
            thread_id: "C1:1".to_string(),
            is_reply: true,
            files: Vec::new(),
        }
    }

    fn setup(runs: Vec<ScriptedRun>) -> (Bridge, Arc<ScriptedLauncher>, Arc<RecordingChannel>) {
        let launcher = Arc::new(ScriptedLauncher::with_runs(runs));
        let channel = Arc::new(RecordingChannel::new());
        let orchestrator = Orchestrator::new(
            Arc::new(ConversationStore::new()),
            launcher.clone(),
            channel.clone(),
            OrchestratorSettings {
                publish_interval: Duration::from_millis(20),
                ..Default::default()
            },
        );
        (Bridge::new(orchestrator), launcher, channel)
    }

    async fn settle(handled: Handled) {
        if let Handled::Submitted(Submission::Started(worker)) = handled {
            worker.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_other_senders_are_ignored() {
        let (bridge, launcher, channel) = setup(vec![]);
        let bridge = bridge.with_allowed_user(Some("U_OWNER".to_string()));

        let handled = bridge.handle(inbound("hello")).await.unwrap();
        assert!(matches!(handled, Handled::Ignored));
        assert!(launcher.started().is_empty());
        assert!(channel.ops().is_empty());
    }

    #[tokio::test]
    async fn test_message_with_directives_is_submitted() {
        let (bridge, launcher, _channel) = setup(vec![]);
        let dir = tempfile::tempdir().unwrap();
        let text = format!("dir:{} model:openai/gpt-5 /review the diff", dir.path().display());

        settle(bridge.handle(inbound(&text)).await.unwrap()).await;

        let started = launcher.started();
        assert_eq!(started[0].request.message, "the diff");
        assert_eq!(started[0].request.command.as_deref(), Some("review"));
        assert_eq!(started[0].request.model.as_deref(), Some("openai/gpt-5"));
        assert_eq!(started[0].request.working_dir.as_deref(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_missing_directory_is_rejected() {
        let (bridge, launcher, channel) = setup(vec![]);

        let handled = bridge
            .handle(inbound("dir:/definitely/not/here-123 hi"))
            .await
            .unwrap();

        assert!(matches!(handled, Handled::Rejected(_)));
        assert!(launcher.started().is_empty());
        assert!(channel.thread_texts(&"C1:1".into())[0].contains("Directory not found"));
    }

    #[tokio::test]
    async fn test_unknown_model_is_rejected_when_catalog_is_available() {
        let mock = MockProcessRunner::new();
        mock.expect_command("opencode")
            .with_args(|args| args == ["models"])
            .returns_stdout("anthropic/claude-sonnet-4\n")
            .finish();
        let catalog = Arc::new(Catalog::new(
            Arc::new(mock),
            "opencode",
            Duration::from_secs(60),
        ));
        let (bridge, launcher, _channel) = setup(vec![]);
        let bridge = bridge.with_catalog(catalog);

        let handled = bridge.handle(inbound("model:nope/x hi")).await.unwrap();
        assert!(matches!(handled, Handled::Rejected(ref r) if r.contains("nope/x")));

        settle(bridge.handle(inbound("model:anthropic/claude-sonnet-4 hi")).await.unwrap()).await;
        assert_eq!(launcher.started().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_catalog_accepts_any_agent() {
        let mock = MockProcessRunner::new();
        mock.expect_command("opencode").returns_exit_code(1).finish();
        let catalog = Arc::new(Catalog::new(Arc::new(mock), "opencode", Duration::ZERO));
        let (bridge, launcher, _channel) = setup(vec![]);
        let bridge = bridge.with_catalog(catalog);

        settle(bridge.handle(inbound("agent:plan hi")).await.unwrap()).await;
        assert_eq!(launcher.started()[0].request.agent.as_deref(), Some("plan"));
    }

    #[tokio::test]
    async fn test_directive_only_message_configures_idle_conversation() {
        let (bridge, launcher, channel) = setup(vec![]);

        let handled = bridge.handle(inbound("model:openai/gpt-5")).await.unwrap();
        assert!(matches!(handled, Handled::Configured));
        assert!(launcher.started().is_empty());

        let ctx = bridge.orchestrator().store().get(&"C1:1".into()).unwrap();
        assert_eq!(ctx.model_override.as_deref(), Some("openai/gpt-5"));
        assert!(channel.thread_texts(&"C1:1".into())[0].contains("openai/gpt-5"));
    }

    #[tokio::test]
    async fn test_queue_notice_and_reset_refused_while_busy() {
        let gate = Arc::new(Notify::new());
        let (bridge, launcher, channel) =
            setup(vec![ScriptedRun::new().wait_for(gate.clone()).completes(Some("s1"), 0)]);
        let id = ConversationId::from("C1:1");

        let first = bridge.handle(inbound("first")).await.unwrap();
        let second = bridge.handle(inbound("second")).await.unwrap();
        assert!(matches!(
            second,
            Handled::Submitted(Submission::Queued { position: 1 })
        ));

        bridge.handle(inbound("!reset")).await.unwrap();
        assert!(bridge.orchestrator().store().get(&id).is_some());

        let texts = channel.thread_texts(&id).join("\n");
        assert!(texts.contains("Queued (position 1)"));
        assert!(texts.contains("Cannot reset"));

        gate.notify_one();
        settle(first).await;
        assert_eq!(launcher.started_messages(), vec!["first", "second"]);

        bridge.handle(inbound("!reset")).await.unwrap();
        assert!(bridge.orchestrator().store().get(&id).is_none());
    }

    #[tokio::test]
    async fn test_status_lists_conversations() {
        let (bridge, _launcher, channel) = setup(vec![]);
        bridge.orchestrator().store().upsert(
            &"C9:9".into(),
            ContextPatch::new()
                .continuation_handle(Some("ses_9".into()))
                .working_context(Some(PathBuf::from("/srv/nine"))),
        );

        let handled = bridge.handle(inbound("!status")).await.unwrap();
        assert!(matches!(handled, Handled::Command(BridgeCommand::Status)));

        let text = channel.thread_texts(&"C1:1".into()).join("\n");
        assert!(text.contains("`C9:9` · idle · session ses_9"));
        assert!(text.contains("/srv/nine"));
    }

    #[test]
    fn test_empty_status_report() {
        assert_eq!(status_report(&[]), "No conversations");
    }
}
