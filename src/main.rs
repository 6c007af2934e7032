//! prometheus alertmanager receiver that forwards alerts as interactive cards
//! to a feishu/lark bot webhook
//!
//! Features:
//! - one card per alertmanager notification, colored by firing/resolved state
//! - trigger times shown in UTC+8
//! - "View Chart" button linking to the alert's generator url
//! - prometheus metrics on a separate endpoint
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::Registry;
use settings::Settings;

use crate::feishu_client::FeishuClient;

mod alert;
mod alertmanager_webhook_receiver;
mod card;
mod card_renderer;
mod feishu_client;
mod log;
mod settings;
mod telemetry_endpoint;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let settings = Settings::load().context("failed to load config and command line arguments")?;

	log::setup_logging(&settings.log).context("could not setup logging")?;

	let registry = Arc::new(Registry::new());

	let client = FeishuClient::new(&settings.webhook, &registry)
		.context("failed to construct webhook client")?;

	if let Some(telemetry) = settings.telemetry_endpoint.clone() {
		let registry = Arc::clone(&registry);
		tokio::spawn(async move {
			#[allow(clippy::expect_used)]
			telemetry_endpoint::run_telemetry_endpoint(&telemetry, registry)
				.await
				.expect("telemetry endpoint failed to start or crashed");
		});
	}

	alertmanager_webhook_receiver::run_alert_receiver(
		&settings.alert_webhook_receiver,
		client,
		&registry,
	)
	.await
}
