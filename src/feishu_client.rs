//! Sends rendered cards to the feishu/lark bot webhook.
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{Histogram, IntCounterVec, Registry};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use thiserror::Error;
use url::Url;

use crate::card::CardMessage;

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSettings {
	/// bot webhook the cards are posted to
	pub url: Url,
	/// upper bound for a single delivery attempt
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	pub timeout: Duration,
}

/// Error returned when a card couldn't be delivered
#[derive(Error, Debug)]
pub enum ForwardError {
	/// connection failure, timeout or similar
	#[error("failed to send card to webhook")]
	Request(#[from] reqwest::Error),
	/// the webhook answered with a non 2xx status
	#[error("webhook responded with status {status}: {body}")]
	Status { status: StatusCode, body: String },
}

#[derive(Debug, Clone)]
struct Metrics {
	forwarded_cards: IntCounterVec,
	forward_duration: Histogram,
}

impl Metrics {
	fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
		use prometheus::{exponential_buckets, histogram_opts, opts};

		let forwarded_cards = IntCounterVec::new(
			opts!("forwarded_cards_total", "total number of cards posted to the bot webhook")
				.namespace("alert_card_relay")
				.subsystem("feishu"),
			&["result"],
		)?;

		let forward_duration = Histogram::with_opts(
			histogram_opts!(
				"forward_duration_seconds",
				"total time of a webhook request in seconds",
				exponential_buckets(0.01, 2., 12)?
			)
			.namespace("alert_card_relay")
			.subsystem("feishu"),
		)?;

		registry.register(Box::new(forwarded_cards.clone()))?;
		registry.register(Box::new(forward_duration.clone()))?;

		Ok(Self { forwarded_cards, forward_duration })
	}
}

#[derive(Debug, Clone)]
/// Client for the bot webhook. Cheap to clone, clones share the connection pool.
pub struct FeishuClient {
	client: reqwest::Client,
	url: Url,
	metrics: Metrics,
}

impl FeishuClient {
	/// Build a client for the configured webhook and register its meters.
	pub fn new(settings: &WebhookSettings, registry: &Registry) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(settings.timeout)
			.build()
			.context("failed to build http client")?;

		let metrics = Metrics::new(registry).context("failed to register webhook metrics")?;

		Ok(Self { client, url: settings.url.clone(), metrics })
	}

	/// Post `card` to the webhook. No retries are made, alertmanager
	/// re-delivers on failure.
	pub async fn send(&self, card: &CardMessage) -> Result<(), ForwardError> {
		let result = {
			let _timer = self.metrics.forward_duration.start_timer();
			self.post(card).await
		};

		let label = if result.is_ok() { "ok" } else { "error" };
		self.metrics.forwarded_cards.with_label_values(&[label]).inc();

		result
	}

	async fn post(&self, card: &CardMessage) -> Result<(), ForwardError> {
		// serde_json keeps non-ascii characters literal, the body is plain utf-8
		let response = self.client.post(self.url.clone()).json(card).send().await?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(ForwardError::Status { status, body });
		}

		tracing::debug!(%status, "card delivered to webhook");

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use wiremock::{
		matchers::{body_json, header, method, path},
		Mock, MockServer, ResponseTemplate,
	};

	use super::*;
	use crate::card::{CardHeader, Element, HeaderColor};

	fn settings(server: &MockServer, timeout: Duration) -> WebhookSettings {
		WebhookSettings {
			url: Url::parse(&format!("{}/open-apis/bot/v2/hook/test", server.uri())).unwrap(),
			timeout,
		}
	}

	fn card() -> CardMessage {
		CardMessage::interactive(
			CardHeader::new("Alerts Firing (1)", HeaderColor::Red),
			vec![Element::markdown("**Firing 磁盘告警**")],
		)
	}

	#[tokio::test]
	async fn posts_card_as_json() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/open-apis/bot/v2/hook/test"))
			.and(header("content-type", "application/json"))
			.and(body_json(serde_json::to_value(card()).unwrap()))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": 0})))
			.expect(1)
			.mount(&server)
			.await;

		let registry = Registry::new();
		let client = FeishuClient::new(&settings(&server, Duration::from_secs(10)), &registry).unwrap();

		client.send(&card()).await.unwrap();

		let received = server.received_requests().await.unwrap();
		let body = String::from_utf8(received[0].body.clone()).unwrap();
		assert!(body.contains("磁盘告警"));
		assert_eq!(client.metrics.forwarded_cards.with_label_values(&["ok"]).get(), 1);
	}

	#[tokio::test]
	async fn non_success_status_is_an_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
			.mount(&server)
			.await;

		let registry = Registry::new();
		let client = FeishuClient::new(&settings(&server, Duration::from_secs(10)), &registry).unwrap();

		let err = client.send(&card()).await.unwrap_err();

		match &err {
			ForwardError::Status { status, body } => {
				assert_eq!(*status, StatusCode::SERVICE_UNAVAILABLE);
				assert_eq!(body, "maintenance");
			}
			other => panic!("unexpected error {other:?}"),
		}
		assert!(err.to_string().contains("503"));
		assert_eq!(client.metrics.forwarded_cards.with_label_values(&["error"]).get(), 1);
	}

	#[tokio::test]
	async fn slow_webhook_times_out() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
			.mount(&server)
			.await;

		let registry = Registry::new();
		let client =
			FeishuClient::new(&settings(&server, Duration::from_millis(100)), &registry).unwrap();

		let err = client.send(&card()).await.unwrap_err();

		assert!(matches!(err, ForwardError::Request(ref err) if err.is_timeout()));
	}
}
