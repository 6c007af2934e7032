//! data structures for deserializing incoming alerts
use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DefaultOnError};

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// data from prometheus received by the alertmanager webhook receiver
///
/// only `alerts` is mandatory, the envelope fields are kept for logging
#[allow(clippy::missing_docs_in_private_items)]
pub struct AlertBatch {
	#[serde(default, deserialize_with = "lenient_string")]
	pub version: String,
	#[serde(default, deserialize_with = "lenient_string")]
	pub group_key: String,
	#[serde_as(as = "DefaultOnError")]
	#[serde(default)]
	pub truncated_alerts: u64,
	#[serde(default, deserialize_with = "lenient_string")]
	pub receiver: String,
	#[serde(default, deserialize_with = "lenient_string")]
	pub status: String,
	pub alerts: Vec<Alert>,
	#[serde(default)]
	pub group_labels: LabelSet,
	#[serde(default)]
	pub common_labels: LabelSet,
	#[serde(default)]
	pub common_annotations: LabelSet,
	#[serde(default, rename = "externalURL", deserialize_with = "lenient_string")]
	pub external_url: String,
}

impl AlertBatch {
	/// number of alerts with the given status
	pub fn count(&self, status: AlertStatus) -> usize {
		self.alerts.iter().filter(|alert| alert.status == status).count()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
/// state of a single alert as reported by alertmanager
pub enum AlertStatus {
	/// the alert condition is currently active
	Firing,
	/// a previously firing alert condition has cleared
	Resolved,
}

impl AlertStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			AlertStatus::Firing => "firing",
			AlertStatus::Resolved => "resolved",
		}
	}
}

/// Single alert of a batch.
///
/// Only `status` has to be well-formed. Every other field degrades instead of
/// rejecting the batch: timestamps are kept as raw text, mistyped links are
/// dropped and mistyped label values are stringified.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::missing_docs_in_private_items)]
pub struct Alert {
	pub status: AlertStatus,
	#[serde(default)]
	pub labels: LabelSet,
	#[serde(default)]
	pub annotations: LabelSet,
	#[serde(default, deserialize_with = "lenient_string")]
	pub starts_at: String,
	#[serde(default, deserialize_with = "lenient_string")]
	pub ends_at: String,
	#[serde_as(as = "DefaultOnError")]
	#[serde(default, rename = "generatorURL")]
	pub generator_url: Option<String>,
	#[serde_as(as = "DefaultOnError")]
	#[serde(default)]
	pub fingerprint: Option<String>,
}

/// json text of any non-string value, `null` becomes the empty string
fn json_text(value: Value) -> String {
	match value {
		Value::String(text) => text,
		Value::Null => String::new(),
		other => other.to_string(),
	}
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Value::deserialize(deserializer).map(json_text)
}

/// Labels or annotations of an alert.
///
/// Alertmanager may leave out any key, so all access goes through
/// [LabelSet::get_or] (absent keys resolve to a default) or
/// [LabelSet::non_empty] (absent and empty values resolve to [None]).
///
/// Anything but a json object deserializes to an empty set. `null` values are
/// skipped, other non-string values are kept as their json text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LabelSet(HashMap<String, String>);

impl<'de> Deserialize<'de> for LabelSet {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let labels = match Value::deserialize(deserializer)? {
			Value::Object(map) => map
				.into_iter()
				.filter(|(_, value)| !value.is_null())
				.map(|(key, value)| (key, json_text(value)))
				.collect(),
			_ => HashMap::new(),
		};

		Ok(LabelSet(labels))
	}
}

impl LabelSet {
	/// value of `key`, or `default` if the key is absent
	pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
		self.0.get(key).map_or(default, String::as_str)
	}

	/// value of `key` if it is present and not empty
	pub fn non_empty(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str).filter(|value| !value.is_empty())
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
	fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}
