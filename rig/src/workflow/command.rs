use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use vantagecore::prelude::Tag;
use vantagecore::vision::ExtractionStrategy;

/// Operator edits applied on the frame loop task, between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum OperatorCommand {
    SetSetpoint { value: f64 },
    TuneGains { kp: f64, ki: f64, kd: f64 },
    SetPidActive { active: bool },
    ResetPid,
    SetThreshold { tag: Tag, value: u8 },
    SetSizeBand { tag: Tag, min: f64, max: f64 },
    SetStrategy { strategy: ExtractionStrategy },
    /// `[x, y, w, h]` as persisted in the project file.
    AddRegion { tag: Tag, rect: [i32; 4] },
    ClearRegions,
    ManualAmplitude { amplitude: f64 },
    SetResolution { resolution: String },
    SetCameraPort { port: u32 },
    SimulateZeroFailure { enabled: bool },
}

#[derive(Debug)]
pub enum Request {
    Command(OperatorCommand),
    AcknowledgeAlert,
    Close,
}

pub type Reply = Result<String, String>;

/// A request plus the channel its outcome is reported on.
#[derive(Debug)]
pub struct Envelope {
    pub request: Request,
    pub reply: oneshot::Sender<Reply>,
}

impl Envelope {
    pub fn new(request: Request) -> (Self, oneshot::Receiver<Reply>) {
        let (reply, receiver) = oneshot::channel();
        (Self { request, reply }, receiver)
    }

    pub fn respond(self, outcome: Reply) {
        // the requester may have given up waiting
        let _ = self.reply.send(outcome);
    }
}

pub type RequestSender = mpsc::Sender<Envelope>;
pub type RequestReceiver = mpsc::Receiver<Envelope>;

pub fn request_channel() -> (RequestSender, RequestReceiver) {
    mpsc::channel(32)
}

/// Sends a request and waits for the loop to answer it.
pub async fn submit(sender: &RequestSender, request: Request) -> Reply {
    let (envelope, receiver) = Envelope::new(request);
    sender
        .send(envelope)
        .await
        .map_err(|_| "frame loop is not running".to_string())?;
    receiver
        .await
        .map_err(|_| "frame loop dropped the request".to_string())?
}
