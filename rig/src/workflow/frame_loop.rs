use crate::console::{AlertOutcome, OperatorConsole};
use crate::gui_bridge::model::{StatusBoard, StatusModel};
use crate::workflow::command::{Envelope, Request, RequestReceiver};
use crate::workflow::runner::Session;
use log::{info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use vantagecore::hardware::DacDriver;
use vantagecore::project::ProjectRecord;
use vantagecore::safety::CriticalAlert;

/// How the magnets were left when the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Zeroed,
    /// Zeroing failed; the operator was held on the critical alert.
    ZeroFailed(AlertOutcome),
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub outcome: ShutdownOutcome,
    pub status: StatusModel,
    pub project: ProjectRecord,
}

#[derive(Debug, Clone, Copy)]
pub struct LoopTiming {
    pub frame_tick: Duration,
    pub control_tick: Duration,
    pub alert_countdown: Duration,
}

/// Drives a [`Session`] on two independent timers and owns the shutdown sequence.
pub struct FrameLoop<D: DacDriver> {
    session: Session<D>,
    board: StatusBoard,
    console: OperatorConsole,
    timing: LoopTiming,
}

enum Flow {
    Continue,
    Close,
}

impl<D: DacDriver> FrameLoop<D> {
    pub fn new(session: Session<D>, board: StatusBoard, console: OperatorConsole, timing: LoopTiming) -> Self {
        board.publish(session.status());
        board.publish_project(session.project_record());
        Self {
            session,
            board,
            console,
            timing,
        }
    }

    /// Runs until `shutdown` resolves or a close request arrives, then zeroes the magnets.
    pub async fn run(mut self, mut requests: RequestReceiver, shutdown: impl Future<Output = ()>) -> SessionSummary {
        {
            let mut frames = interval(self.timing.frame_tick);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut control = interval(self.timing.control_tick);
            control.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tokio::pin!(shutdown);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        info!("shutdown requested");
                        break;
                    }
                    Some(envelope) = requests.recv() => {
                        if let Flow::Close = self.handle(envelope) {
                            break;
                        }
                    }
                    _ = control.tick() => {
                        self.session.control_tick();
                        self.publish();
                    }
                    _ = frames.tick() => {
                        self.session.frame_tick();
                        self.publish();
                    }
                }
            }
        }
        self.close(&mut requests).await
    }

    /// Deterministic run without wall-clock ticks: `frames` frame ticks with a control
    /// tick every time the control period has elapsed in frame time.
    pub async fn run_offline(mut self, frames: usize, mut requests: RequestReceiver) -> SessionSummary {
        let frame_ms = self.timing.frame_tick.as_millis().max(1);
        let control_ms = self.timing.control_tick.as_millis().max(1);
        let mut next_control = 0u128;
        for tick in 0..frames {
            while let Ok(envelope) = requests.try_recv() {
                if let Flow::Close = self.handle(envelope) {
                    return self.close(&mut requests).await;
                }
            }
            let now = tick as u128 * frame_ms;
            self.session.frame_tick();
            if now >= next_control {
                self.session.control_tick();
                next_control += control_ms;
            }
            self.publish();
        }
        self.close(&mut requests).await
    }

    fn handle(&mut self, envelope: Envelope) -> Flow {
        match envelope.request {
            Request::Command(ref command) => {
                let command = command.clone();
                let outcome = self.session.apply(command).map_err(|err| format!("{:#}", err));
                self.board.publish_project(self.session.project_record());
                self.publish();
                envelope.respond(outcome);
                Flow::Continue
            }
            Request::AcknowledgeAlert => {
                envelope.respond(Err("no critical alert is active".to_string()));
                Flow::Continue
            }
            Request::Close => {
                envelope.respond(Ok("closing session".to_string()));
                Flow::Close
            }
        }
    }

    fn publish(&mut self) {
        if let Some(notice) = self.session.take_new_notice() {
            self.console.show_notice(&notice);
        }
        self.board.publish(self.session.status());
    }

    /// Timers are already stopped. Zero, hold the operator on the alert if that
    /// failed, and only then let go of the frame source.
    async fn close(mut self, requests: &mut RequestReceiver) -> SessionSummary {
        let outcome = match self.session.zero_for_shutdown() {
            Ok(()) => {
                self.console.show_status("Magnets zeroed.");
                ShutdownOutcome::Zeroed
            }
            Err(err) => {
                warn!("shutdown zeroing failed: {}", err);
                self.publish();
                let alert = CriticalAlert::zero_failure(self.timing.alert_countdown);
                let held = self.console.run_alert(alert, requests, &self.board).await;
                ShutdownOutcome::ZeroFailed(held)
            }
        };
        self.session.release_source();

        let mut status = self.session.status();
        status.alert = self.board.snapshot().alert;
        self.board.publish(status.clone());
        SessionSummary {
            outcome,
            status,
            project: self.session.project_record(),
        }
    }
}
