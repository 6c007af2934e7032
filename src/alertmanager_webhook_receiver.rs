use std::{
	net::{IpAddr, SocketAddr},
	sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
	extract::{rejection::JsonRejection, Extension, Json},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
	Router,
};
use prometheus::{opts, IntCounter, IntCounterVec, Registry};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::{
	alert::{AlertBatch, AlertStatus},
	card_renderer,
	feishu_client::FeishuClient,
};

#[derive(Debug, Deserialize, Clone)]
pub struct AlertReceiverSettings {
	pub bind_address: IpAddr,
	pub port: u16,
}

impl AlertReceiverSettings {
	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

/// Errors answered to alertmanager, every variant renders as `{"error": ...}`
#[derive(Error, Debug)]
pub enum ApiError {
	/// body missing, not json or not an alertmanager payload
	#[error("{0}")]
	BadRequest(String),
	/// the card couldn't be delivered to the bot webhook
	#[error("{0}")]
	UpstreamFailure(String),
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		match rejection {
			JsonRejection::MissingJsonContentType(_) => {
				ApiError::BadRequest("Content-Type must be application/json".to_string())
			}
			rejection => ApiError::BadRequest(rejection.to_string()),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = match &self {
			ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
			ApiError::UpstreamFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};

		(status, Json(json!({ "error": self.to_string() }))).into_response()
	}
}

struct State {
	client: FeishuClient,
	received_alerts: IntCounterVec,
	rejected_requests: IntCounter,
}

impl State {
	pub fn new(client: FeishuClient, registry: &Registry) -> Result<Self> {
		let received_alerts = IntCounterVec::new(
			opts!("received_alerts_total", "total number of deserialized alerts")
				.namespace("alert_card_relay")
				.subsystem("alertmanager_webhook"),
			&["status"],
		)?;
		let rejected_requests = IntCounter::with_opts(
			opts!("rejected_requests_total", "requests rejected as malformed")
				.namespace("alert_card_relay")
				.subsystem("alertmanager_webhook"),
		)?;

		registry.register(Box::new(received_alerts.clone()))?;
		registry.register(Box::new(rejected_requests.clone()))?;

		Ok(Self { client, received_alerts, rejected_requests })
	}
}

async fn alert_receiver(
	Extension(state): Extension<Arc<State>>,
	batch: Result<Json<AlertBatch>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
	let batch = match batch {
		Ok(Json(batch)) => batch,
		Err(err) => {
			tracing::debug!("failed to deserialize alert: {:?}", err);
			state.rejected_requests.inc();
			return Err(err.into());
		}
	};

	tracing::info!(
		receiver = batch.receiver.as_str(),
		group_key = batch.group_key.as_str(),
		alerts = batch.alerts.len(),
		"received alert batch"
	);
	tracing::debug!("alert batch: {:?}", batch);

	for status in [AlertStatus::Firing, AlertStatus::Resolved] {
		state.received_alerts.with_label_values(&[status.as_str()]).inc_by(batch.count(status) as u64);
	}

	let card = card_renderer::build_card(&batch);

	if let Err(err) = state.client.send(&card).await {
		let err = anyhow::Error::from(err);
		tracing::error!(title = card.card.header.title.content(), "failed to forward card: {err:#}");
		return Err(ApiError::UpstreamFailure(format!("{err:#}")));
	}

	tracing::info!(title = card.card.header.title.content(), "card forwarded");

	Ok(Json(json!({ "status": "ok" })))
}

async fn health() -> &'static str {
	"OK"
}

fn router(state: Arc<State>) -> Router {
	Router::new()
		.route("/alert", post(alert_receiver))
		.route("/health", get(health))
		.layer(Extension(state))
}

pub async fn run_alert_receiver(
	settings: &AlertReceiverSettings,
	client: FeishuClient,
	registry: &Registry,
) -> Result<()> {
	let state = Arc::new(State::new(client, registry)?);
	let addr = settings.to_socket_addr();

	tracing::info!("accepting alertmanager webhooks on http://{addr}/alert");

	axum::Server::bind(&addr)
		.serve(router(state).into_make_service())
		.await
		.context("alertmanager webhook endpoint crashed")?;

	Ok(())
}
