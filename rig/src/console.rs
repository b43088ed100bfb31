use crate::gui_bridge::model::StatusBoard;
use crate::workflow::command::{Envelope, OperatorCommand, Request, RequestReceiver, RequestSender};
use log::{error, info, warn};
use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use vantagecore::safety::{CriticalAlert, OperatorNotice, FLASH_PERIOD};
use vantagecore::telemetry::AuditLog;

/// How an alert drill ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertOutcome {
    pub beeps: u64,
    pub held_for: Duration,
}

/// Terminal stand-in for the operator's modal dialogs.
#[derive(Clone, Debug)]
pub struct OperatorConsole {
    audit: AuditLog,
    auto_acknowledge: bool,
}

impl OperatorConsole {
    pub fn new(audit: AuditLog, auto_acknowledge: bool) -> Self {
        Self {
            audit,
            auto_acknowledge,
        }
    }

    pub fn show_notice(&self, notice: &OperatorNotice) {
        println!("[CONSOLE] *** {} ***", notice.title);
        println!("[CONSOLE] {}", notice.message);
    }

    pub fn show_status(&self, message: &str) {
        println!("[CONSOLE] {}", message);
    }

    /// Holds the alert on screen until it has been acknowledged. Nothing the
    /// operator does can end it before the countdown reaches zero.
    pub async fn run_alert(
        &self,
        mut alert: CriticalAlert,
        requests: &mut RequestReceiver,
        board: &StatusBoard,
    ) -> AlertOutcome {
        let started = Instant::now();
        let mut beeps = 0;
        let mut ticker = interval(FLASH_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = started;

        self.audit.critical(format!("{}: {}", alert.title(), alert.message()));
        println!("[CONSOLE] !!! {} !!!", alert.title());
        println!("[CONSOLE] {}", alert.message());

        loop {
            tokio::select! {
                now = ticker.tick() => {
                    let due = alert.advance(now.saturating_duration_since(last));
                    last = now;
                    beeps += due;
                    self.render(&alert, due);
                    board.set_alert(Some(alert.status()));
                    if self.auto_acknowledge && alert.is_dismissable() && alert.try_acknowledge().is_ok() {
                        info!("critical alert acknowledged automatically after countdown");
                        break;
                    }
                }
                Some(envelope) = requests.recv() => {
                    match envelope.request {
                        Request::AcknowledgeAlert => {
                            let outcome = alert.try_acknowledge().map_err(|err| err.to_string());
                            let done = outcome.is_ok();
                            envelope.respond(outcome.map(|_| "critical alert acknowledged".to_string()));
                            if done {
                                break;
                            }
                            warn!("critical alert acknowledgement refused during countdown");
                        }
                        Request::Command(_) | Request::Close => {
                            envelope.respond(Err(format!(
                                "critical alert active; acknowledge it after {} s",
                                alert.remaining_secs()
                            )));
                        }
                    }
                }
            }
        }

        board.set_alert(Some(alert.status()));
        self.audit.warning(format!(
            "Critical alert acknowledged after {:.1} s",
            started.elapsed().as_secs_f64()
        ));
        AlertOutcome {
            beeps,
            held_for: started.elapsed(),
        }
    }

    fn render(&self, alert: &CriticalAlert, beeps: u64) {
        let mut out = io::stdout().lock();
        let banner = if alert.flash_on() { alert.title() } else { "" };
        let countdown = if alert.is_dismissable() {
            "acknowledge to continue".to_string()
        } else {
            format!("OK available in {} s", alert.remaining_secs())
        };
        let bell = "\x07".repeat(beeps as usize);
        if let Err(err) = write!(out, "\r{}[CONSOLE] {:<16} {}   ", bell, banner, countdown).and_then(|_| out.flush()) {
            error!("console write failed: {}", err);
        }
    }
}

/// Parses one operator line: `ack`, `quit`, or a JSON command.
pub fn parse_console_line(line: &str) -> Result<Request, String> {
    match line.trim() {
        "ack" => Ok(Request::AcknowledgeAlert),
        "quit" | "q" => Ok(Request::Close),
        other => serde_json::from_str::<OperatorCommand>(other)
            .map(Request::Command)
            .map_err(|err| format!("unrecognised input ({}); use ack, quit or a JSON command", err)),
    }
}

/// Forwards operator keyboard input to the frame loop from a detached thread, so a
/// blocked read never holds up process exit.
pub fn spawn_stdin_reader(sender: RequestSender) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            let request = match parse_console_line(&line) {
                Ok(request) => request,
                Err(message) => {
                    println!("[CONSOLE] {}", message);
                    continue;
                }
            };
            let (envelope, reply) = Envelope::new(request);
            if sender.blocking_send(envelope).is_err() {
                break;
            }
            match reply.blocking_recv() {
                Ok(Ok(message)) => println!("[CONSOLE] {}", message),
                Ok(Err(message)) => println!("[CONSOLE] refused: {}", message),
                Err(_) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::command::{request_channel, submit};
    use vantagecore::project::ProjectRecord;
    use vantagecore::safety::DEFAULT_COUNTDOWN;

    fn board() -> StatusBoard {
        StatusBoard::new(ProjectRecord {
            camera_port: 0,
            resolution: "640x480".into(),
            red_threshold: 20,
            green_threshold: 20,
            min_particle_size: 30,
            max_particle_size: 600,
            green_boxes: Vec::new(),
            red_boxes: Vec::new(),
        })
    }

    #[test]
    fn console_lines_map_to_requests() {
        assert!(matches!(parse_console_line(" ack "), Ok(Request::AcknowledgeAlert)));
        assert!(matches!(parse_console_line("quit"), Ok(Request::Close)));
        assert!(matches!(
            parse_console_line(r#"{"command": "set_pid_active", "active": false}"#),
            Ok(Request::Command(OperatorCommand::SetPidActive { active: false }))
        ));
        assert!(parse_console_line("please stop").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn unattended_alert_is_held_for_the_full_countdown() {
        let console = OperatorConsole::new(AuditLog::in_memory(), true);
        let (_sender, mut receiver) = request_channel();
        let outcome = console
            .run_alert(CriticalAlert::zero_failure(DEFAULT_COUNTDOWN), &mut receiver, &board())
            .await;
        assert!(outcome.held_for >= DEFAULT_COUNTDOWN);
        // immediately, then at 2, 4, 6 and 8 seconds
        assert_eq!(outcome.beeps, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn early_acknowledgement_is_refused() {
        let audit = AuditLog::in_memory();
        let console = OperatorConsole::new(audit.clone(), false);
        let (sender, mut receiver) = request_channel();
        let board = board();
        let drill_board = board.clone();
        let drill = tokio::spawn(async move {
            console
                .run_alert(CriticalAlert::zero_failure(DEFAULT_COUNTDOWN), &mut receiver, &drill_board)
                .await
        });

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(submit(&sender, Request::AcknowledgeAlert).await.is_err());
        assert!(submit(&sender, Request::Close).await.is_err());
        let status = board.snapshot().alert.unwrap();
        assert!(!status.dismissable);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(submit(&sender, Request::AcknowledgeAlert).await.is_ok());
        let outcome = drill.await.unwrap();
        assert!(outcome.held_for >= Duration::from_secs(9));
        assert!(outcome.beeps >= 5);
        assert!(board.snapshot().alert.unwrap().acknowledged);
    }
}
