// src/sources/mail.rs
// Forwards mails from one JMAP mailbox. The JMAP session is discovered per
// run via the well-known endpoint; the mailbox ID is looked up by name once
// and then cached in the cursor. Listing chains Email/query (receivedAt
// descending) into Email/get with a result back-reference, so one request
// returns full messages newest-first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::compose::{chunked_text_messages, OutboundMessage};
use crate::config::MailConfig;
use crate::cursor::CursorState;
use crate::error::TransportError;
use crate::forward::Source;
use crate::sources::{ok_json, single_page};
use crate::window::{FeedItem, Window};

const PAGE_LIMIT: usize = 50;
const FIRST_RUN_CAP: usize = 10;

const USING: [&str; 2] = [
    "urn:ietf:params:jmap:core",
    "urn:ietf:params:jmap:mail",
];

#[derive(Debug, Clone)]
pub struct Mail {
    pub id: String,
    pub thread_id: Option<String>,
    pub received_at: DateTime<Utc>,
    pub subject: Option<String>,
    pub text_body: String,
}

impl FeedItem for Mail {
    type Id = String;

    fn item_id(&self) -> &String {
        &self.id
    }

    fn published_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MailCursor {
    pub last_mail_id: Option<String>,
    pub last_received_at: Option<DateTime<Utc>>,
    /// Cached mailbox lookup; cleared manually if the mailbox is renamed.
    pub mailbox_id: Option<String>,
}

impl CursorState for MailCursor {
    const KIND: &'static str = "mail";
}

/// Extract the arguments of the first method response named `method`.
fn method_response<'a>(body: &'a Value, method: &str) -> Result<&'a Value, TransportError> {
    body.get("methodResponses")
        .and_then(Value::as_array)
        .and_then(|responses| {
            responses.iter().find_map(|entry| {
                let call = entry.as_array()?;
                if call.first()?.as_str()? == method {
                    call.get(1)
                } else {
                    None
                }
            })
        })
        .ok_or_else(|| TransportError::Malformed(format!("no {method} response")))
}

fn build_mail(raw: &Value) -> Result<Mail, TransportError> {
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| TransportError::Malformed("mail without id".into()))?
        .to_string();

    let received_at = raw
        .get("receivedAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| TransportError::Malformed("mail without receivedAt".into()))?;

    // The body text lives in bodyValues, keyed by the part ID the textBody
    // list points at.
    let text_body = raw
        .get("textBody")
        .and_then(Value::as_array)
        .and_then(|parts| parts.first())
        .and_then(|part| part.get("partId"))
        .and_then(Value::as_str)
        .and_then(|part_id| raw.get("bodyValues")?.get(part_id)?.get("value"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(Mail {
        id,
        thread_id: raw
            .get("threadId")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        received_at,
        subject: raw
            .get("subject")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string),
        text_body,
    })
}

fn parse_mail_list(body: &Value) -> Result<Vec<Mail>, TransportError> {
    method_response(body, "Email/get")?
        .get("list")
        .and_then(Value::as_array)
        .ok_or_else(|| TransportError::Malformed("Email/get without list".into()))?
        .iter()
        .map(build_mail)
        .collect()
}

pub struct MailSource {
    config: MailConfig,
    client: Client,
    api_url: Option<String>,
    account_id: Option<String>,
    mailbox_id: Option<String>,
}

impl MailSource {
    pub fn new(config: MailConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            api_url: None,
            account_id: None,
            mailbox_id: None,
        }
    }

    async fn discover_session(&mut self) -> Result<(), TransportError> {
        let url = format!("https://{}/.well-known/jmap", self.config.api_host);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        let session: Value = ok_json(response).await?;

        let api_url = session
            .get("apiUrl")
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::Malformed("session without apiUrl".into()))?;
        let account_id = session
            .get("primaryAccounts")
            .and_then(|a| a.get("urn:ietf:params:jmap:mail"))
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::Malformed("session without mail account".into()))?;

        self.api_url = Some(api_url.to_string());
        self.account_id = Some(account_id.to_string());
        Ok(())
    }

    async fn call(&self, method_calls: Value) -> Result<Value, TransportError> {
        let api_url = self.api_url.as_deref().unwrap_or_default();
        let response = self
            .client
            .post(api_url)
            .bearer_auth(&self.config.token)
            .json(&json!({
                "using": USING,
                "methodCalls": method_calls,
            }))
            .send()
            .await?;
        ok_json(response).await
    }

    async fn lookup_mailbox_id(&self) -> Result<String, TransportError> {
        tracing::info!(mailbox = %self.config.mailbox_name, "looking up mailbox ID");
        let body = self
            .call(json!([[
                "Mailbox/query",
                {
                    "accountId": self.account_id,
                    "filter": {"name": self.config.mailbox_name},
                },
                "0",
            ]]))
            .await?;

        let ids = method_response(&body, "Mailbox/query")?
            .get("ids")
            .and_then(Value::as_array)
            .ok_or_else(|| TransportError::Malformed("didn't get IDs as list".into()))?;
        if ids.len() != 1 {
            return Err(TransportError::Malformed(format!(
                "could not find mailbox (got {} matches)",
                ids.len()
            )));
        }
        ids[0]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| TransportError::Malformed("mailbox ID is not a string".into()))
    }

    async fn fetch_mails(&self) -> Result<Vec<Mail>, TransportError> {
        let body = self
            .call(json!([
                [
                    "Email/query",
                    {
                        "accountId": self.account_id,
                        "filter": {"inMailbox": self.mailbox_id},
                        "sort": [{"property": "receivedAt", "isAscending": false}],
                        "limit": PAGE_LIMIT,
                    },
                    "0",
                ],
                [
                    "Email/get",
                    {
                        "accountId": self.account_id,
                        "#ids": {"resultOf": "0", "name": "Email/query", "path": "/ids"},
                        "properties": [
                            "id", "threadId", "receivedAt", "subject", "textBody", "bodyValues",
                        ],
                        "fetchTextBodyValues": true,
                    },
                    "1",
                ],
            ]))
            .await?;
        parse_mail_list(&body)
    }
}

#[async_trait]
impl Source for MailSource {
    const NAME: &'static str = "mail";

    type Item = Mail;
    type Cursor = MailCursor;

    async fn prepare(&mut self, cursor: &mut MailCursor) -> Result<(), TransportError> {
        self.discover_session().await?;

        let mailbox_id = match &cursor.mailbox_id {
            Some(id) => id.clone(),
            None => {
                let id = self.lookup_mailbox_id().await?;
                cursor.mailbox_id = Some(id.clone());
                id
            }
        };
        self.mailbox_id = Some(mailbox_id);
        Ok(())
    }

    fn items(&self) -> BoxStream<'_, Result<Mail, TransportError>> {
        single_page(self.fetch_mails()).boxed()
    }

    fn window(&self, cursor: &MailCursor) -> Window<String> {
        Window {
            last_id: cursor.last_mail_id.clone(),
            last_time: cursor.last_received_at,
            first_run_cap: FIRST_RUN_CAP,
        }
    }

    fn advance(&self, cursor: &mut MailCursor, item: &Mail) {
        cursor.last_mail_id = Some(item.id.clone());
        cursor.last_received_at = Some(item.received_at);
    }

    fn compose(&self, item: &Mail, _files: Vec<crate::media::MediaFile>) -> Vec<OutboundMessage> {
        let mut text = String::new();
        if let Some(subject) = &item.subject {
            text.push_str(subject);
            text.push_str("\n\n");
        }
        text.push_str(item.text_body.trim());
        chunked_text_messages(text.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail_response() -> Value {
        json!({
            "methodResponses": [
                ["Email/query", {"ids": ["m2", "m1"]}, "0"],
                ["Email/get", {"list": [
                    {
                        "id": "m2",
                        "threadId": "t2",
                        "receivedAt": "2025-06-02T08:00:00Z",
                        "subject": "Newer",
                        "textBody": [{"partId": "1"}],
                        "bodyValues": {"1": {"value": "second body"}},
                    },
                    {
                        "id": "m1",
                        "threadId": "t1",
                        "receivedAt": "2025-06-01T08:00:00Z",
                        "subject": "",
                        "textBody": [],
                        "bodyValues": {},
                    },
                ]}, "1"],
            ],
        })
    }

    #[test]
    fn mail_list_is_parsed_from_chained_response() {
        let mails = parse_mail_list(&mail_response()).unwrap();
        assert_eq!(mails.len(), 2);
        assert_eq!(mails[0].id, "m2");
        assert_eq!(mails[0].subject.as_deref(), Some("Newer"));
        assert_eq!(mails[0].text_body, "second body");
        // Blank subject and missing body degrade to empty, not errors.
        assert_eq!(mails[1].subject, None);
        assert_eq!(mails[1].text_body, "");
    }

    #[test]
    fn missing_method_response_is_malformed() {
        let body = json!({"methodResponses": [["Mailbox/get", {}, "0"]]});
        assert!(parse_mail_list(&body).is_err());
    }

    #[test]
    fn long_mail_bodies_are_chunked() {
        let source = MailSource::new(MailConfig {
            api_host: "mail.test".into(),
            token: "token".into(),
            mailbox_name: "Inbox".into(),
        });
        let mail = Mail {
            id: "m1".into(),
            thread_id: None,
            received_at: Utc::now(),
            subject: Some("Subject".into()),
            text_body: "x".repeat(5000),
        };
        let messages = source.compose(&mail, Vec::new());
        assert_eq!(messages.len(), 2);
        match &messages[0] {
            OutboundMessage::Text { body, html } => {
                assert!(!html);
                assert!(body.starts_with("Subject"));
            }
            other => panic!("expected text, got {other:?}"),
        }
    }
}
