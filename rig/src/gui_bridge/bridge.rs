use crate::gui_bridge::model::StatusBoard;
use crate::workflow::command::{submit, OperatorCommand, Request, RequestSender};
use anyhow::Context;
use log::{info, warn};
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use warp::{http::StatusCode, Filter};

/// HTTP surface for operator displays: live status out, commands in.
///
/// Commands never touch session state directly; they are queued to the frame loop,
/// which answers once the edit has been applied.
pub struct OperatorBridge {
    board: StatusBoard,
    requests: RequestSender,
}

impl OperatorBridge {
    pub fn new(board: StatusBoard, requests: RequestSender) -> Self {
        Self { board, requests }
    }

    pub fn routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let board = self.board.clone();
        let board_filter = warp::any().map(move || board.clone());
        let sender = self.requests.clone();
        let sender_filter = warp::any().map(move || sender.clone());

        let status_route = warp::path("status")
            .and(warp::path::end())
            .and(warp::get())
            .and(board_filter.clone())
            .map(|board: StatusBoard| warp::reply::json(&board.snapshot()));

        let project_route = warp::path("project")
            .and(warp::path::end())
            .and(warp::get())
            .and(board_filter)
            .map(|board: StatusBoard| warp::reply::json(&board.project()));

        let command_route = warp::path("command")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::json())
            .and(sender_filter.clone())
            .and_then(|command: OperatorCommand, sender: RequestSender| async move {
                Ok::<_, Infallible>(respond(submit(&sender, Request::Command(command)).await))
            });

        let ack_route = warp::path!("alert" / "ack")
            .and(warp::post())
            .and(sender_filter)
            .and_then(|sender: RequestSender| async move {
                Ok::<_, Infallible>(respond(submit(&sender, Request::AcknowledgeAlert).await))
            });

        status_route.or(project_route).or(command_route).or(ack_route)
    }

    /// Binds `address` and returns the server future, which runs until `shutdown` resolves.
    pub fn serve(
        self,
        address: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<impl Future<Output = ()>> {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(address, shutdown)
            .with_context(|| format!("binding operator bridge to {}", address))?;
        info!("operator bridge listening on http://{}", bound);
        Ok(server)
    }
}

fn respond(outcome: Result<String, String>) -> warp::reply::WithStatus<warp::reply::Json> {
    match outcome {
        Ok(message) => warp::reply::with_status(
            warp::reply::json(&json!({"status": "ok", "message": message})),
            StatusCode::OK,
        ),
        Err(message) => {
            warn!("operator request refused: {}", message);
            warp::reply::with_status(
                warp::reply::json(&json!({"status": "error", "message": message})),
                StatusCode::CONFLICT,
            )
        }
    }
}
