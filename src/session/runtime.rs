//! Session event loop.
//!
//! Multiplexes the four inputs of a running session: service events, timer
//! events, operator commands and cancellation. The orchestrator is only
//! ever touched from this loop.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::command::{COMMANDS, OperatorCommand};
use super::orchestrator::{Orchestrator, SessionChannels};
use crate::error::LinkError;
use crate::game::GameInput;
use crate::link::ServiceLink;
use crate::observability::ViewEvent;

/// Why [`run_session`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The operator typed `quit`
    Quit,
    /// The command stream ended
    InputClosed,
    /// The service closed the link
    LinkClosed,
    /// Cancelled from outside (signal)
    Cancelled,
}

enum Flow {
    Continue,
    Quit,
}

/// Drives `orchestrator` until the operator quits, input ends, the link
/// closes or `cancel` fires.
///
/// Each item of `commands` is one console line.
///
/// # Errors
///
/// Returns a [`LinkError`] if the link fails to send or receive.
pub async fn run_session<S>(
    orchestrator: &mut Orchestrator,
    mut channels: SessionChannels,
    link: Arc<dyn ServiceLink>,
    mut commands: S,
    cancel: CancellationToken,
) -> Result<RunOutcome, LinkError>
where
    S: Stream<Item = String> + Unpin,
{
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn({
        let link = Arc::clone(&link);
        async move {
            loop {
                match link.receive().await {
                    Ok(Some(event)) => {
                        if inbound_tx.send(Ok(event)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = inbound_tx.send(Err(e));
                        break;
                    }
                }
            }
        }
    });

    info!(link = %link.kind(), "session started");
    orchestrator.set_connected(true);

    let result = loop {
        tokio::select! {
            () = cancel.cancelled() => break Ok(RunOutcome::Cancelled),

            inbound = inbound_rx.recv() => match inbound {
                Some(Ok(event)) => orchestrator.handle_inbound(event),
                Some(Err(e)) => break Err(e),
                None => {
                    warn!("service closed the link");
                    break Ok(RunOutcome::LinkClosed);
                }
            },

            Some(event) = channels.timer.recv() => orchestrator.handle_timer(event),

            Some(message) = channels.outbound.recv() => {
                if let Err(e) = link.send(&message).await {
                    break Err(e);
                }
            }

            line = commands.next() => match line {
                Some(line) => {
                    if matches!(dispatch_line(orchestrator, &line), Flow::Quit) {
                        break Ok(RunOutcome::Quit);
                    }
                }
                None => break Ok(RunOutcome::InputClosed),
            },
        }
    };

    reader.abort();
    orchestrator.set_connected(false);
    match &result {
        Ok(outcome) => info!(?outcome, phase = %orchestrator.phase(), "session loop ended"),
        Err(e) => warn!(error = %e, "session loop failed"),
    }
    result
}

fn dispatch_line(orchestrator: &mut Orchestrator, line: &str) -> Flow {
    match OperatorCommand::parse(line) {
        Ok(Some(command)) => dispatch(orchestrator, command),
        Ok(None) => Flow::Continue,
        Err(e) => {
            debug!(error = %e, "unparseable command");
            orchestrator.notify(ViewEvent::ValidationFailed {
                message: e.to_string(),
            });
            Flow::Continue
        }
    }
}

/// Applies one command. Failed operations were already reported to the
/// view by the orchestrator.
fn dispatch(orchestrator: &mut Orchestrator, command: OperatorCommand) -> Flow {
    match command {
        OperatorCommand::Init => {
            let _ = orchestrator.initialize();
        }
        OperatorCommand::Demographics { age, sex } => {
            let _ = orchestrator.submit_demographics(age, sex);
        }
        OperatorCommand::Questionnaire(responses) => {
            let _ = orchestrator.submit_questionnaire(responses);
        }
        OperatorCommand::Baseline(secs) => {
            let _ = orchestrator.begin_baseline(secs);
        }
        OperatorCommand::Proceed => {
            let _ = orchestrator.proceed_to_activation();
        }
        OperatorCommand::Select(kind) => {
            let _ = orchestrator.select_game(kind);
        }
        OperatorCommand::Answer(n) => {
            let _ = orchestrator.submit_answer(GameInput::Number(n));
        }
        OperatorCommand::Ink(color) | OperatorCommand::Press(color) => {
            let _ = orchestrator.submit_answer(GameInput::Color(color));
        }
        OperatorCommand::Regulate => {
            let _ = orchestrator.begin_regulation();
        }
        OperatorCommand::Stop => {
            let _ = orchestrator.stop();
        }
        OperatorCommand::Post(responses) => {
            let _ = orchestrator.submit_post_questionnaire(responses);
        }
        OperatorCommand::Reset => {
            let _ = orchestrator.reset();
        }
        OperatorCommand::Status => {
            let status = orchestrator.status();
            let text = serde_json::to_string(&status)
                .unwrap_or_else(|_| format!("phase: {}", status.phase));
            orchestrator.notify(ViewEvent::info(text));
        }
        OperatorCommand::Results => {
            let text = orchestrator.results().to_string();
            orchestrator.notify(ViewEvent::info(text));
        }
        OperatorCommand::Help => {
            orchestrator.notify(ViewEvent::info(format!("commands: {}", COMMANDS.join(", "))));
        }
        OperatorCommand::Quit => return Flow::Quit,
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use biocalm_core::SessionPhase;
    use biocalm_core::config::SessionConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::chart::MemoryChartSink;
    use crate::link::DemoLink;
    use crate::observability::ChannelSink;

    fn orchestrator() -> (
        Orchestrator,
        SessionChannels,
        mpsc::UnboundedReceiver<ViewEvent>,
    ) {
        let (sink, view) = ChannelSink::new();
        let (orch, channels) = Orchestrator::new(
            Arc::new(SessionConfig::default()),
            Arc::new(sink),
            Box::new(MemoryChartSink::new()),
            StdRng::seed_from_u64(11),
        );
        (orch, channels, view)
    }

    fn lines(input: &[&str]) -> impl Stream<Item = String> + Unpin {
        futures_util::stream::iter(input.iter().map(ToString::to_string).collect::<Vec<_>>())
    }

    #[tokio::test(start_paused = true)]
    async fn input_end_finishes_the_loop() {
        let (mut orch, channels, _view) = orchestrator();
        let outcome = run_session(
            &mut orch,
            channels,
            Arc::new(DemoLink::seeded(1)),
            lines(&["help"]),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, RunOutcome::InputClosed);
        assert!(!orch.status().connected);
    }

    #[tokio::test(start_paused = true)]
    async fn quit_stops_before_later_lines() {
        let (mut orch, channels, mut view) = orchestrator();
        let outcome = run_session(
            &mut orch,
            channels,
            Arc::new(DemoLink::seeded(1)),
            lines(&["bogus", "quit", "init"]),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, RunOutcome::Quit);
        assert_eq!(orch.phase(), SessionPhase::Idle);
        assert!(matches!(
            view.try_recv().unwrap(),
            ViewEvent::ValidationFailed { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn commands_reach_the_demo_service() {
        let (mut orch, channels, _view) = orchestrator();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let commands = futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx));
        let cancel = CancellationToken::new();

        tx.send("init".into()).unwrap();
        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                cancel.cancel();
            })
        };
        let outcome = run_session(
            &mut orch,
            channels,
            Arc::new(DemoLink::seeded(2)),
            commands,
            cancel,
        )
        .await
        .unwrap();
        stopper.await.unwrap();

        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(orch.phase(), SessionPhase::AwaitingDemographics);
        drop(tx);
    }

    #[tokio::test]
    async fn closed_link_ends_the_loop() {
        let (mut orch, channels, _view) = orchestrator();
        let link = crate::link::NdjsonLink::new(
            tokio::io::empty(),
            tokio::io::sink(),
            crate::link::NdjsonConfig::default(),
        );
        let outcome = run_session(
            &mut orch,
            channels,
            Arc::new(link),
            futures_util::stream::pending(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, RunOutcome::LinkClosed);
    }
}
