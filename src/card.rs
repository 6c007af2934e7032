//! Feishu/Lark interactive card message, the payload sent to the bot webhook.
//!
//! The nesting mirrors the json the chat platform expects:
//!
//! ```json
//! {
//!   "msg_type": "interactive",
//!   "card": {
//!     "config": {"wide_screen_mode": true},
//!     "header": {"title": {"tag": "plain_text", "content": "..."}, "template": "red"},
//!     "elements": [{"tag": "div", "text": {"tag": "lark_md", "content": "..."}}, {"tag": "hr"}]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// complete message as posted to the bot webhook
pub struct CardMessage {
	pub msg_type: MsgType,
	pub card: Card,
}

impl CardMessage {
	/// wrap header and elements into an interactive message
	pub fn interactive(header: CardHeader, elements: Vec<Element>) -> Self {
		Self {
			msg_type: MsgType::Interactive,
			card: Card { config: CardConfig { wide_screen_mode: true }, header, elements },
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgType {
	Interactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
	pub config: CardConfig,
	pub header: CardHeader,
	pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardConfig {
	pub wide_screen_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardHeader {
	pub title: Text,
	pub template: HeaderColor,
}

impl CardHeader {
	pub fn new(title: impl Into<String>, template: HeaderColor) -> Self {
		Self { title: Text::plain(title), template }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// color template of the card header
pub enum HeaderColor {
	Green,
	Red,
	Grey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum Text {
	#[serde(rename = "plain_text")]
	PlainText { content: String },
	/// markdown dialect of the chat platform
	#[serde(rename = "lark_md")]
	LarkMd { content: String },
}

impl Text {
	pub fn plain(content: impl Into<String>) -> Self {
		Self::PlainText { content: content.into() }
	}

	pub fn markdown(content: impl Into<String>) -> Self {
		Self::LarkMd { content: content.into() }
	}

	pub fn content(&self) -> &str {
		match self {
			Text::PlainText { content } | Text::LarkMd { content } => content,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "lowercase")]
/// rendering block of the card body
pub enum Element {
	/// text block
	Div { text: Text },
	/// row of interactive components
	Action { actions: Vec<Action> },
	/// horizontal separator
	Hr,
}

impl Element {
	pub fn markdown(content: impl Into<String>) -> Self {
		Self::Div { text: Text::markdown(content) }
	}

	pub fn is_separator(&self) -> bool {
		matches!(self, Element::Hr)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "lowercase")]
pub enum Action {
	Button {
		text: Text,
		#[serde(rename = "type")]
		kind: ButtonKind,
		url: String,
	},
}

impl Action {
	/// primary button opening `url`
	pub fn link_button(label: impl Into<String>, url: impl Into<String>) -> Self {
		Self::Button { text: Text::plain(label), kind: ButtonKind::Primary, url: url.into() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonKind {
	Primary,
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn serializes_in_platform_layout() {
		let message = CardMessage::interactive(
			CardHeader::new("Alerts Firing (1)", HeaderColor::Red),
			vec![
				Element::markdown("**Firing HighCPU**"),
				Element::Action {
					actions: vec![Action::link_button("View Chart", "http://prometheus/graph")],
				},
				Element::Hr,
			],
		);

		assert_eq!(
			serde_json::to_value(&message).unwrap(),
			json!({
				"msg_type": "interactive",
				"card": {
					"config": {"wide_screen_mode": true},
					"header": {
						"title": {"tag": "plain_text", "content": "Alerts Firing (1)"},
						"template": "red"
					},
					"elements": [
						{"tag": "div", "text": {"tag": "lark_md", "content": "**Firing HighCPU**"}},
						{"tag": "action", "actions": [{
							"tag": "button",
							"text": {"tag": "plain_text", "content": "View Chart"},
							"type": "primary",
							"url": "http://prometheus/graph"
						}]},
						{"tag": "hr"}
					]
				}
			})
		);
	}

	#[test]
	fn keeps_non_ascii_literal() {
		let message = CardMessage::interactive(
			CardHeader::new("Alert Notification", HeaderColor::Grey),
			vec![Element::markdown("**Summary**: 磁盘空间不足")],
		);

		let body = serde_json::to_string(&message).unwrap();

		assert!(body.contains("磁盘空间不足"));
		assert!(!body.contains("\\u"));
	}
}
