//! Dispatcher — the orchestrating loop binding inbound messages to rule
//! execution and reply delivery.
//!
//! One long-lived receive loop pulls messages from the channel; each
//! message's pipeline runs as an independent task gated by a fixed-size
//! semaphore. Nothing from one message's pipeline can terminate the
//! receive loop or affect other in-flight pipelines.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::channels::{Channel, InboundMessage, OutboundReply};
use crate::command::CommandBuilder;
use crate::error::{Error, Result};
use crate::interpret;
use crate::rules::RuleSet;
use crate::runner::ProcessRunner;

/// Default number of commands allowed to run concurrently.
const DEFAULT_POOL_CAPACITY: usize = 4;

/// Terminal state of one message's pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No rule matched; nothing executed, nothing sent.
    Dropped,
    /// A reply was delivered.
    Replied { rule: String },
    /// The command ran but produced no reply body.
    Suppressed { rule: String },
    /// The pipeline failed; diagnostics recorded, no reply sent.
    Failed {
        rule: Option<String>,
        error: String,
    },
}

/// The orchestrating loop. Holds the immutable rule set and the
/// per-message pipeline components; all remaining state is per-task.
pub struct Dispatcher {
    rules: Arc<RuleSet>,
    builder: CommandBuilder,
    runner: ProcessRunner,
    timeout: Duration,
    pool_capacity: usize,
    outcome_tx: Option<mpsc::UnboundedSender<DispatchOutcome>>,
}

impl Dispatcher {
    pub fn new(rules: RuleSet, timeout: Duration) -> Self {
        Self {
            rules: Arc::new(rules),
            builder: CommandBuilder::from_process_env(),
            runner: ProcessRunner::new(),
            timeout,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            outcome_tx: None,
        }
    }

    /// Cap on simultaneously running commands.
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Replace the command builder (fixes the base environment).
    pub fn with_command_builder(mut self, builder: CommandBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Report every message's terminal state on a channel, so callers can
    /// observe outcomes instead of scraping logs.
    pub fn outcome_reporter(&mut self) -> mpsc::UnboundedReceiver<DispatchOutcome> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outcome_tx = Some(tx);
        rx
    }

    /// Consume messages until the stream ends or `shutdown` fires.
    ///
    /// Shutdown stops the receive loop immediately and aborts in-flight
    /// executions; queued tasks are abandoned.
    pub async fn run(self, channel: Arc<dyn Channel>, shutdown: CancellationToken) -> Result<()> {
        let mut stream = channel.start().await.map_err(Error::Channel)?;
        let semaphore = Arc::new(Semaphore::new(self.pool_capacity));
        let state = Arc::new(Pipeline {
            rules: self.rules,
            builder: self.builder,
            runner: self.runner,
            timeout: self.timeout,
            outcome_tx: self.outcome_tx,
        });

        info!(
            rules = state.rules.len(),
            capacity = self.pool_capacity,
            "listening"
        );

        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("shutting down");
                    break;
                }
                message = stream.next() => match message {
                    Some(m) => m,
                    None => {
                        info!("inbound stream ended");
                        break;
                    }
                }
            };

            info!(
                sender = %message.sender_id,
                text = %message.text,
                "got message"
            );

            let semaphore = Arc::clone(&semaphore);
            let state = Arc::clone(&state);
            let channel = Arc::clone(&channel);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                // Queue for a pool slot. Depth is unbounded; a message is
                // never rejected for arriving over capacity, it waits.
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let outcome = state.process(channel.as_ref(), message, &shutdown).await;
                state.report(outcome);
            });
        }

        Ok(())
    }
}

/// Per-message pipeline shared across dispatch tasks. Everything here is
/// read-only after construction.
struct Pipeline {
    rules: Arc<RuleSet>,
    builder: CommandBuilder,
    runner: ProcessRunner,
    timeout: Duration,
    outcome_tx: Option<mpsc::UnboundedSender<DispatchOutcome>>,
}

impl Pipeline {
    async fn process(
        &self,
        channel: &dyn Channel,
        message: InboundMessage,
        shutdown: &CancellationToken,
    ) -> DispatchOutcome {
        let Some(rule) = self.rules.first_match(&message.text) else {
            debug!("no matching rule");
            return DispatchOutcome::Dropped;
        };
        let rule_name = rule.name.clone();

        let invocation = match self.builder.build(rule, &message) {
            Ok(invocation) => invocation,
            Err(e) => {
                error!(rule = %rule_name, error = %e, "cannot build command");
                return DispatchOutcome::Failed {
                    rule: Some(rule_name),
                    error: e.to_string(),
                };
            }
        };

        let result = match self.runner.execute(invocation, self.timeout, shutdown).await {
            Ok(result) => result,
            Err(e) => {
                error!(rule = %rule_name, error = %e, "command did not run");
                return DispatchOutcome::Failed {
                    rule: Some(rule_name),
                    error: e.to_string(),
                };
            }
        };

        let body = match interpret::interpret(result) {
            Ok(Some(body)) => body,
            Ok(None) => {
                debug!(rule = %rule_name, "empty reply body, nothing to send");
                return DispatchOutcome::Suppressed { rule: rule_name };
            }
            Err(e) => {
                error!(rule = %rule_name, error = %e, "cannot parse stdout");
                return DispatchOutcome::Failed {
                    rule: Some(rule_name),
                    error: e.to_string(),
                };
            }
        };

        let reply = OutboundReply {
            conversation_id: message.conversation_id.clone(),
            body,
            reply_to_message_id: Some(message.source_message_id.clone()),
            suppress_prior_keyboard: true,
        };
        if let Err(e) = channel.send(reply).await {
            error!(rule = %rule_name, error = %e, "failed to reply");
            return DispatchOutcome::Failed {
                rule: Some(rule_name),
                error: e.to_string(),
            };
        }

        DispatchOutcome::Replied { rule: rule_name }
    }

    fn report(&self, outcome: DispatchOutcome) {
        if let Some(tx) = &self.outcome_tx {
            let _ = tx.send(outcome);
        }
    }
}
