//! Common test utilities and fixtures

#![allow(dead_code)]

use reply_desk::config::Config;
use reply_desk::notify::RecordingNotifier;
use reply_desk::session::{Session, StaticSession};
use reply_desk::ReplyDesk;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::matchers::path_regex;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TEST_TOKEN: &str = "test-token";

/// Email as served by `/api/emails`
pub fn email_json(id: &str, subject: &str) -> Value {
    json!({
        "id": id,
        "thread_id": format!("thread_{}", id),
        "from": "\"Alice Example\" <alice@example.com>",
        "to": "me@example.com",
        "subject": subject,
        "body": "Could you review the attached report?",
        "snippet": "Could you review",
        "labels": ["INBOX", "UNREAD"],
        "is_read": false,
        "is_important": false,
        "received_at": "2025-03-01T09:00:00Z"
    })
}

pub fn draft_json(id: &str, email_id: &str, content: &str, status: &str) -> Value {
    json!({
        "id": id,
        "emailId": email_id,
        "userId": "user_1",
        "content": content,
        "confidenceScore": 0.82,
        "status": status,
        "metadata": { "model": "gpt-4", "tone": "professional" },
        "createdAt": "2025-03-01T09:05:00Z"
    })
}

/// Desk pointed at `server` with a fixed token and a recording notifier
pub fn desk_for(server: &MockServer) -> (ReplyDesk, Arc<RecordingNotifier>) {
    desk_with_config(server, Config::default())
}

pub fn desk_with_config(server: &MockServer, mut config: Config) -> (ReplyDesk, Arc<RecordingNotifier>) {
    config.api.base_url = server.uri();
    let notifier = Arc::new(RecordingNotifier::new());
    let desk = ReplyDesk::with_session(
        config,
        Arc::new(StaticSession::new(Session::new(TEST_TOKEN))),
        notifier.clone(),
    )
    .expect("desk should build");
    (desk, notifier)
}

#[derive(Debug, Default)]
struct DraftState {
    drafts: Vec<Value>,
    next_id: u32,
    idempotency_keys: Vec<String>,
    unauthorized: u32,
}

/// In-memory stand-in for the drafts routes of the backend
#[derive(Clone, Default)]
pub struct FakeDraftBackend {
    state: Arc<Mutex<DraftState>>,
}

impl FakeDraftBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mount(&self, server: &MockServer) {
        Mock::given(path_regex(r"^/api/drafts(/.*)?$"))
            .respond_with(self.clone())
            .mount(server)
            .await;
    }

    /// Preload a draft, e.g. one that is already sent
    pub fn insert(&self, draft: Value) {
        self.state.lock().unwrap().drafts.push(draft);
    }

    pub fn draft(&self, id: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .drafts
            .iter()
            .find(|d| d["id"] == id)
            .cloned()
    }

    pub fn idempotency_keys(&self) -> Vec<String> {
        self.state.lock().unwrap().idempotency_keys.clone()
    }

    pub fn unauthorized_requests(&self) -> u32 {
        self.state.lock().unwrap().unauthorized
    }

    fn generate(state: &mut DraftState, body: &Value) -> ResponseTemplate {
        let email_id = body["emailId"].as_str().unwrap_or_default().to_string();
        let variations = body["variations"].as_u64().unwrap_or(0);
        if email_id.is_empty() || variations == 0 {
            return ResponseTemplate::new(400).set_body_json(json!({ "error": "Invalid request" }));
        }

        let mut created = Vec::new();
        for i in 0..variations {
            state.next_id += 1;
            let mut draft = draft_json(
                &format!("draft_{}", state.next_id),
                &email_id,
                &format!("Reply variation {} for {}", i + 1, email_id),
                "draft",
            );
            draft["confidenceScore"] = json!(0.9 - 0.1 * i as f64);
            state.drafts.push(draft.clone());
            created.push(draft);
        }

        let data = if created.len() == 1 {
            created.remove(0)
        } else {
            Value::Array(created)
        };
        ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": data,
            "analysis": {
                "intent": "request",
                "tone": "professional",
                "keyPoints": ["review report"],
                "strategy": "acknowledge and commit to a timeline"
            }
        }))
    }
}

fn conflict(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(409).set_body_json(json!({ "success": false, "error": message }))
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({ "success": false, "error": "Draft not found" }))
}

impl Respond for FakeDraftBackend {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();

        let authorized = request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", TEST_TOKEN))
            .unwrap_or(false);
        if !authorized {
            state.unauthorized += 1;
            return ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid token" }));
        }

        let segments: Vec<&str> = request
            .url
            .path()
            .trim_start_matches("/api/drafts")
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);

        match (request.method.as_str(), segments.as_slice()) {
            ("POST", ["generate"]) => Self::generate(&mut state, &body),
            ("GET", [email_id]) => {
                let drafts: Vec<Value> = state
                    .drafts
                    .iter()
                    .filter(|d| d["emailId"] == *email_id)
                    .cloned()
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": drafts }))
            }
            ("PUT", [draft_id]) => match state.drafts.iter_mut().find(|d| d["id"] == *draft_id) {
                Some(draft) if draft["status"] != "draft" => conflict("Draft is no longer editable"),
                Some(draft) => {
                    draft["content"] = body["content"].clone();
                    ResponseTemplate::new(200)
                        .set_body_json(json!({ "success": true, "data": draft.clone() }))
                }
                None => not_found(),
            },
            ("DELETE", [draft_id]) => {
                let before = state.drafts.len();
                state.drafts.retain(|d| d["id"] != *draft_id);
                if state.drafts.len() == before {
                    not_found()
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({ "success": true }))
                }
            }
            ("POST", [draft_id, "send"]) => {
                let key = request
                    .headers
                    .get("idempotency-key")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let Some(key) = key else {
                    return ResponseTemplate::new(400)
                        .set_body_json(json!({ "error": "Idempotency-Key required" }));
                };
                let duplicate = state.idempotency_keys.contains(&key);
                state.idempotency_keys.push(key);

                match state.drafts.iter_mut().find(|d| d["id"] == *draft_id) {
                    Some(_) if duplicate => ResponseTemplate::new(200).set_body_json(json!({ "success": true })),
                    Some(draft) if draft["status"] != "draft" => conflict("Draft already sent"),
                    Some(draft) => {
                        draft["status"] = json!("sent");
                        draft["sentAt"] = json!("2025-03-01T10:00:00Z");
                        ResponseTemplate::new(200).set_body_json(json!({ "success": true }))
                    }
                    None => not_found(),
                }
            }
            _ => not_found(),
        }
    }
}
