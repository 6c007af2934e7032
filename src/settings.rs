use anyhow::{Context, Result};
use clap::{Arg, Command};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::{
	alertmanager_webhook_receiver::AlertReceiverSettings, feishu_client::WebhookSettings,
	log::LogSettings, telemetry_endpoint::TelemetryEndpointSettings,
};

/// prefix of environment variables overriding config file values, nested keys
/// are separated by `__`, e.g. `ALERT_CARD_RELAY__WEBHOOK__URL`
const ENV_PREFIX: &str = "ALERT_CARD_RELAY";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	pub webhook: WebhookSettings,
	pub alert_webhook_receiver: AlertReceiverSettings,
	pub log: LogSettings,
	/// metrics are only served if this is set
	pub telemetry_endpoint: Option<TelemetryEndpointSettings>,
}

impl Settings {
	/// Load settings from command line, config file and environment.
	pub fn load() -> Result<Self> {
		let opts = Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.author(clap::crate_authors!())
			.args(&[
				Arg::new("config")
					.help("path of config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.default_value("./config.yaml"),
				Arg::new("level")
					.help("log level")
					.possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
			])
			.get_matches();

		let config_path = opts.value_of("config").unwrap_or("./config.yaml");

		let mut settings = Self::from_sources(File::with_name(config_path).required(false))?;

		if let Some(level) = opts.value_of("level") {
			settings.log.level = level.to_string();
		}

		Ok(settings)
	}

	/// Merge defaults, the given config file and the environment.
	fn from_sources(file: impl config::Source + Send + Sync + 'static) -> Result<Self> {
		Self::builder()?
			.add_source(file)
			.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
			.build()
			.context("can't load config")?
			.try_deserialize()
			.context("invalid config")
	}

	fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
		Ok(Config::builder()
			.set_default("webhook.timeout", 10.0)?
			.set_default("alert_webhook_receiver.bind_address", "0.0.0.0")?
			.set_default("alert_webhook_receiver.port", 4000_i64)?
			.set_default("log.level", "info")?)
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use config::FileFormat;

	use super::*;

	fn from_yaml(yaml: &str) -> Result<Settings> {
		Settings::from_sources(File::from_str(yaml, FileFormat::Yaml))
	}

	#[test]
	fn applies_defaults() {
		let settings =
			from_yaml("webhook:\n  url: https://open.feishu.cn/open-apis/bot/v2/hook/abc\n")
				.unwrap();

		assert_eq!(settings.webhook.url.as_str(), "https://open.feishu.cn/open-apis/bot/v2/hook/abc");
		assert_eq!(settings.webhook.timeout, Duration::from_secs(10));
		assert_eq!(settings.alert_webhook_receiver.to_socket_addr().to_string(), "0.0.0.0:4000");
		assert_eq!(settings.log.level, "info");
		assert!(settings.telemetry_endpoint.is_none());
	}

	#[test]
	fn reads_all_sections() {
		let settings = from_yaml(
			r#"
webhook:
  url: https://open.larksuite.com/open-apis/bot/v2/hook/xyz
  timeout: 2.5
alert_webhook_receiver:
  bind_address: 127.0.0.1
  port: 8080
log:
  level: debug
telemetry_endpoint:
  bind_address: "::"
  port: 9100
"#,
		)
		.unwrap();

		assert_eq!(settings.webhook.timeout, Duration::from_millis(2500));
		assert_eq!(settings.alert_webhook_receiver.to_socket_addr().to_string(), "127.0.0.1:8080");
		assert_eq!(settings.log.level, "debug");
		assert_eq!(settings.telemetry_endpoint.unwrap().to_socket_addr().to_string(), "[::]:9100");
	}

	#[test]
	fn keeps_sub_second_timeout() {
		let settings =
			from_yaml("webhook:\n  url: http://127.0.0.1/hook\n  timeout: 0.4\n").unwrap();

		assert_eq!(settings.webhook.timeout.as_millis(), 400);
	}

	#[test]
	fn webhook_url_is_required() {
		let err = from_yaml("webhook:\n  timeout: 5\n").unwrap_err();
		assert!(format!("{err:#}").contains("url"));
	}

	#[test]
	fn rejects_invalid_url() {
		assert!(from_yaml("webhook:\n  url: not a url\n").is_err());
	}
}
