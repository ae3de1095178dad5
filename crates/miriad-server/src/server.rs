//! NDJSON server over standard input/output.
//!
//! One JSON object per line in, one per line out. A single writer channel
//! orders every event of a turn before that turn's `result` line. Parse
//! errors produce a `system{error}` line and the server keeps reading.

use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use miriad_core::config::AgentConfig;
use miriad_core::events::EventSink;
use miriad_core::ids::{IdService, SessionId};
use miriad_core::provider::ModelProvider;
use miriad_engine::agent::{AgentLoop, AgentOptions, BeforeTurnHook};
use miriad_engine::compaction::CompactionAgent;
use miriad_engine::{EngineError, ToolRegistry};
use miriad_store::{StoreError, Stores};

use crate::scheduler::{QueuedTurn, Submission, TurnScheduler};
use crate::wire::{self, ControlAction, InboundMessage, ResultSubtype};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Everything a server needs to run turns. Built once at startup and passed
/// down; no hidden globals.
#[derive(Clone)]
pub struct ServerContext {
    pub stores: Stores,
    pub ids: Arc<IdService>,
    pub config: AgentConfig,
    pub provider: Arc<dyn ModelProvider>,
    pub registry: Arc<ToolRegistry>,
}

/// Run the NDJSON server on stdin/stdout until stdin closes.
pub async fn run_stdio(ctx: ServerContext) -> Result<(), ServerError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    serve(ctx, tokio::io::BufReader::new(tokio::io::stdin()), tx).await?;
    let _ = writer.await;
    Ok(())
}

/// Run a single batch turn. Returns the process exit code.
pub async fn run_batch(ctx: ServerContext, prompt: &str, format: OutputFormat) -> i32 {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let scheduler = Arc::new(TurnScheduler::new());

    let Submission::Started { turn, cancel } = scheduler.submit(QueuedTurn {
        prompt: prompt.to_string(),
        session_id: None,
    }) else {
        // A fresh scheduler is always idle.
        return 1;
    };

    let report = run_one_turn(&ctx, &scheduler, &tx, turn, cancel).await;
    let _ = scheduler.finish_turn();
    drop(tx);

    while let Some(line) = rx.recv().await {
        if format == OutputFormat::Json {
            println!("{line}");
        }
    }
    if format == OutputFormat::Text && !report.response.is_empty() {
        println!("{}", report.response);
    }

    if report.success {
        0
    } else {
        1
    }
}

/// Core server loop over any line source. Output lines go through the
/// sender so tests can observe the exact stream.
pub async fn serve<R>(
    ctx: ServerContext,
    input: R,
    output: UnboundedSender<String>,
) -> Result<(), ServerError>
where
    R: AsyncBufRead + Unpin,
{
    let scheduler = Arc::new(TurnScheduler::new());
    let mut turn_tasks: Vec<JoinHandle<()>> = Vec::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<InboundMessage>(line) {
            Err(e) => {
                send(&output, wire::system_error(&format!("parse error: {e}")));
            }
            Ok(InboundMessage::Control { action }) => match action {
                ControlAction::Interrupt => {
                    if scheduler.interrupt() {
                        send(&output, wire::system_interrupted());
                    } else {
                        send(&output, wire::system_error("no turn is running"));
                    }
                }
                ControlAction::Status => {
                    send(
                        &output,
                        wire::system_status(scheduler.state().as_str(), scheduler.queue_depth()),
                    );
                }
            },
            Ok(InboundMessage::User {
                message,
                session_id,
            }) => {
                let prompt = message.content.flatten();
                match scheduler.submit(QueuedTurn { prompt, session_id }) {
                    Submission::Queued { position } => {
                        send(&output, wire::system_queued(position));
                    }
                    Submission::Started { turn, cancel } => {
                        let ctx = ctx.clone();
                        let scheduler = Arc::clone(&scheduler);
                        let output = output.clone();
                        turn_tasks.push(tokio::spawn(async move {
                            let mut next = Some((turn, cancel));
                            while let Some((turn, cancel)) = next.take() {
                                run_one_turn(&ctx, &scheduler, &output, turn, cancel).await;
                                next = scheduler.finish_turn();
                            }
                        }));
                    }
                }
            }
        }
    }

    // stdin closed: let in-flight turns (and their queued successors) end.
    for task in turn_tasks {
        let _ = task.await;
    }
    info!("input closed, server stopping");
    Ok(())
}

struct TurnReport {
    success: bool,
    response: String,
}

async fn run_one_turn(
    ctx: &ServerContext,
    scheduler: &Arc<TurnScheduler>,
    output: &UnboundedSender<String>,
    turn: QueuedTurn,
    cancel: CancellationToken,
) -> TurnReport {
    let started = Instant::now();

    let session_id = match &turn.session_id {
        Some(raw) => SessionId::from_raw(raw.clone()),
        None => ctx
            .stores
            .session
            .get_or_create_session_id(&ctx.ids)
            .unwrap_or_else(|_| ctx.ids.session_id()),
    };

    let agent = AgentLoop::new(
        Arc::clone(&ctx.provider),
        Arc::clone(&ctx.registry),
        ctx.stores.clone(),
        Arc::clone(&ctx.ids),
        ctx.config.clone(),
        session_id.clone(),
    );

    let model = ctx.provider.model().to_string();
    let event_out = output.clone();
    let sink: EventSink = Arc::new(move |event| {
        if let Some(value) = wire::agent_event_to_wire(&event, &model) {
            let _ = event_out.send(value.to_string());
        }
    });

    let hook_scheduler = Arc::clone(scheduler);
    let hook_out = output.clone();
    let hook: BeforeTurnHook = Arc::new(move || {
        hook_scheduler.take_injection().map(|(joined, count)| {
            let _ = hook_out.send(wire::system_injected(count, joined.len()).to_string());
            joined
        })
    });

    let options = AgentOptions {
        cancel,
        on_event: Some(sink),
        on_before_turn: Some(hook),
    };

    let result = agent.run(&turn.prompt, &options).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let report = match result {
        Ok(outcome) => {
            send(
                output,
                wire::result_event(
                    ResultSubtype::Success,
                    duration_ms,
                    outcome.num_turns,
                    session_id.as_str(),
                    Some(&outcome.response),
                    Some(&outcome.usage),
                ),
            );
            TurnReport {
                success: true,
                response: outcome.response,
            }
        }
        Err(e) if e.is_cancelled() => {
            send(
                output,
                wire::result_event(
                    ResultSubtype::Cancelled,
                    duration_ms,
                    0,
                    session_id.as_str(),
                    None,
                    None,
                ),
            );
            TurnReport {
                success: false,
                response: String::new(),
            }
        }
        Err(e) => {
            let message = e.to_string();
            send(
                output,
                wire::result_event(
                    ResultSubtype::Error,
                    duration_ms,
                    0,
                    session_id.as_str(),
                    Some(&message),
                    None,
                ),
            );
            TurnReport {
                success: false,
                response: message,
            }
        }
    };

    maybe_spawn_compaction(ctx, output);
    report
}

/// Best-effort compaction after a turn. The next turn does not wait for it.
fn maybe_spawn_compaction(ctx: &ServerContext, output: &UnboundedSender<String>) {
    let compactor = CompactionAgent::new(
        Arc::clone(&ctx.provider),
        ctx.stores.clone(),
        Arc::clone(&ctx.ids),
        ctx.config.clone(),
    );
    if !compactor.needed().unwrap_or(false) {
        return;
    }

    let output = output.clone();
    tokio::spawn(async move {
        match compactor.run(&CancellationToken::new()).await {
            Ok(outcome) => {
                let _ = output.send(
                    wire::system_consolidation(
                        outcome.worker_id.as_str(),
                        outcome.tokens_before,
                        outcome.tokens_after,
                        outcome.summaries_created,
                    )
                    .to_string(),
                );
            }
            Err(e) => warn!(error = %e, "compaction worker failed"),
        }
    });
}

fn send(output: &UnboundedSender<String>, value: serde_json::Value) {
    let _ = output.send(value.to_string());
}
