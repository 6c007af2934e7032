//! Renders alert batches into interactive cards.
//!
//! Alerts are received from [alertmanager_webhook_receiver](crate::alertmanager_webhook_receiver)
//! Rendered cards are sent by [feishu_client](crate::feishu_client)
//!
//! Rendering never fails: absent labels and annotations fall back to defaults
//! or are left out, timestamps that can't be parsed are shown verbatim.

use chrono::{DateTime, FixedOffset};

use crate::{
	alert::{Alert, AlertBatch, AlertStatus},
	card::{Action, CardHeader, CardMessage, Element, HeaderColor},
};

/// UTC offset trigger times are displayed in (Asia/Shanghai, no DST)
const DISPLAY_UTC_OFFSET_SECS: i32 = 8 * 3600;

const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render an alert batch into a card message.
///
/// Elements are emitted in the order of `batch.alerts`. Each alert yields a
/// title block, a details block, an optional "View Chart" button and a
/// separator. The separator after the last alert is dropped.
pub fn build_card(batch: &AlertBatch) -> CardMessage {
	let header = render_header(batch);

	let mut elements = Vec::with_capacity(batch.alerts.len() * 4);
	for alert in &batch.alerts {
		render_alert(alert, &mut elements);
		elements.push(Element::Hr);
	}

	if elements.last().map_or(false, Element::is_separator) {
		elements.pop();
	}

	CardMessage::interactive(header, elements)
}

/// header color and title derived from the firing/resolved counts
fn render_header(batch: &AlertBatch) -> CardHeader {
	let firing = batch.count(AlertStatus::Firing);
	let resolved = batch.count(AlertStatus::Resolved);

	if resolved > 0 && firing == 0 {
		CardHeader::new("Alerts Resolved", HeaderColor::Green)
	} else if firing > 0 {
		CardHeader::new(format!("Alerts Firing ({firing})"), HeaderColor::Red)
	} else {
		CardHeader::new("Alert Notification", HeaderColor::Grey)
	}
}

fn render_alert(alert: &Alert, elements: &mut Vec<Element>) {
	let status = match alert.status {
		AlertStatus::Resolved => "Resolved",
		AlertStatus::Firing => "Firing",
	};
	let alertname = alert.labels.get_or("alertname", "Unknown Alert");

	elements.push(Element::markdown(format!("**{status} {alertname}**")));

	let mut fields = vec![
		format!("**Instance**: {}", alert.labels.get_or("instance", "N/A")),
		format!("**Severity**: {}", alert.labels.get_or("severity", "info")),
		format!("**Trigger Time**: {}", format_start_time(&alert.starts_at)),
	];
	if let Some(summary) = alert.annotations.non_empty("summary") {
		fields.push(format!("**Summary**: {summary}"));
	}
	if let Some(description) = alert.annotations.non_empty("description") {
		fields.push(format!("**Description**: {description}"));
	}

	elements.push(Element::markdown(fields.join("\n")));

	if let Some(url) = alert.generator_url.as_deref().filter(|url| !url.is_empty()) {
		elements.push(Element::Action { actions: vec![Action::link_button("View Chart", url)] });
	}
}

#[allow(clippy::expect_used)]
fn display_offset() -> FixedOffset {
	FixedOffset::east_opt(DISPLAY_UTC_OFFSET_SECS).expect("display offset is within a day")
}

/// Convert an RFC 3339 timestamp into display time (UTC+8).
///
/// Returns the input unchanged if it can't be parsed.
pub fn format_start_time(starts_at: &str) -> String {
	let parsed = DateTime::parse_from_rfc3339(starts_at)
		.map(|time| time.with_timezone(&display_offset()));

	match parsed {
		Ok(time) => time.format(DISPLAY_TIME_FORMAT).to_string(),
		Err(err) => {
			tracing::warn!(starts_at, "failed to parse alert start time, showing it verbatim: {err}");
			starts_at.to_owned()
		}
	}
}
