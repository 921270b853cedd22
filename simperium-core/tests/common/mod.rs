//! Shared test helpers: an in-memory stand-in for the sync service.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use simperium_core::{
    Api, Auth, Bucket, BucketOptions, Endpoint, Request, RequestBody, Response, Transport,
    TransportError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const HOST: &str = "sync.test";
pub const APP: &str = "myapp";

/// Converts a `json!` object literal into document data.
pub fn data(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}

pub fn endpoint() -> Endpoint {
    Endpoint::new("https", HOST)
}

#[derive(Debug, Default, Clone)]
struct Item {
    /// Data per version, index 0 holding version 1.
    history: Vec<Map<String, Value>>,
    deleted: bool,
    /// Sequence of the last write, for index ordering.
    touched: u64,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, String>,
    tokens_issued: u64,
    items: HashMap<(String, String), Item>,
    /// Every accepted change, in order; the cv of entry `n` is `n + 1`.
    log: Vec<(String, Value)>,
    requests: Vec<Request>,
}

/// In-memory fake of the auth and data services.
///
/// Long-polls never block: a poll with nothing new fails with
/// [`TransportError::Timeout`], as an idle connection would.
#[derive(Debug, Clone, Default)]
pub struct FakeService {
    state: Arc<Mutex<State>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auth(&self) -> Auth {
        Auth::with_transport(APP, "api-key", endpoint(), Arc::new(self.clone()))
    }

    pub fn bucket(&self, name: &str) -> Bucket {
        Bucket::with_transport(
            APP,
            "token",
            name,
            BucketOptions {
                endpoint: endpoint(),
                ..Default::default()
            },
            Arc::new(self.clone()),
        )
    }

    pub fn api(&self) -> Api {
        Api::with_transport(APP, "token", endpoint(), Arc::new(self.clone()))
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }

    fn handle(&self, request: &Request) -> Result<Response, TransportError> {
        let prefix = format!("https://{HOST}/1/{APP}/");
        let path = request
            .url
            .strip_prefix(&prefix)
            .ok_or_else(|| TransportError::InvalidRequest(request.url.clone()))?;
        let segments: Vec<String> = path
            .trim_end_matches('/')
            .split('/')
            .map(|s| urlencoding::decode(s).map(|c| c.into_owned()).unwrap_or_default())
            .collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

        let mut state = self.state.lock().unwrap();
        match (request.method.as_str(), segments.as_slice()) {
            ("POST", ["create"]) => Ok(create_user(&mut state, request)),
            ("POST", ["authorize"]) => Ok(authorize(&mut state, request)),
            ("GET", [bucket, "index"]) => Ok(index(&state, bucket, request)),
            ("GET", [bucket, "i", id]) => Ok(get_item(&state, bucket, id, None)),
            ("GET", [bucket, "i", id, "v", v]) => {
                Ok(get_item(&state, bucket, id, v.parse().ok()))
            }
            ("POST", [bucket, "i", id]) => Ok(post_item(&mut state, bucket, id, None, request)),
            ("POST", [bucket, "i", id, "v", v]) => {
                Ok(post_item(&mut state, bucket, id, v.parse().ok(), request))
            }
            ("DELETE", [bucket, "i", id]) => Ok(delete_item(&mut state, bucket, id, request)),
            ("POST", [bucket, "changes"]) => Ok(bulk(&mut state, bucket, request)),
            ("GET", [bucket, "changes"]) | ("GET", [bucket, "all"]) => {
                poll(&state, bucket, request)
            }
            _ => Ok(Response::new(404, "")),
        }
    }
}

#[async_trait]
impl Transport for FakeService {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let result = self.handle(&request);
        self.state.lock().unwrap().requests.push(request);
        result
    }
}

fn form_field<'a>(request: &'a Request, key: &str) -> Option<&'a str> {
    match &request.body {
        RequestBody::Form(fields) => fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str()),
        _ => None,
    }
}

fn create_user(state: &mut State, request: &Request) -> Response {
    let (Some(user), Some(pass)) = (form_field(request, "username"), form_field(request, "password"))
    else {
        return Response::new(400, "missing credentials");
    };
    if state.users.contains_key(user) {
        return Response::json_ok(&json!({"error": "user exists"}));
    }
    state.users.insert(user.to_string(), pass.to_string());
    state.tokens_issued += 1;
    Response::json_ok(&json!({"access_token": format!("tok-{}", state.tokens_issued)}))
}

fn authorize(state: &mut State, request: &Request) -> Response {
    let user = form_field(request, "username").unwrap_or_default();
    let pass = form_field(request, "password").unwrap_or_default();
    if state.users.get(user).map(String::as_str) != Some(pass) {
        return Response::new(401, "invalid password");
    }
    state.tokens_issued += 1;
    Response::json_ok(&json!({"access_token": format!("tok-{}", state.tokens_issued)}))
}

fn live_items<'a>(state: &'a State, bucket: &str) -> Vec<(&'a String, &'a Item)> {
    let mut items: Vec<_> = state
        .items
        .iter()
        .filter(|((b, _), item)| b == bucket && !item.deleted)
        .map(|((_, id), item)| (id, item))
        .collect();
    items.sort_by(|a, b| b.1.touched.cmp(&a.1.touched));
    items
}

fn index(state: &State, bucket: &str, request: &Request) -> Response {
    let items = live_items(state, bucket);
    let offset: usize = request
        .query_value("mark")
        .and_then(|m| m.parse().ok())
        .unwrap_or(0);
    let limit: usize = request
        .query_value("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(100)
        .min(1000);
    let with_data = request.query_value("data") == Some("1");

    let page: Vec<Value> = items
        .iter()
        .skip(offset)
        .take(limit)
        .map(|(id, item)| {
            let mut entry = json!({"id": id, "v": item.history.len()});
            if with_data {
                entry["d"] = Value::Object(item.history.last().cloned().unwrap_or_default());
            }
            entry
        })
        .collect();

    let mut body = json!({
        "current": state.log.len().to_string(),
        "count": items.len(),
        "index": page,
    });
    if offset + limit < items.len() {
        body["mark"] = json!((offset + limit).to_string());
    }
    Response::json_ok(&body)
}

fn get_item(state: &State, bucket: &str, id: &str, version: Option<usize>) -> Response {
    let Some(item) = state.items.get(&(bucket.to_string(), id.to_string())) else {
        return Response::new(404, "");
    };
    if item.deleted && version.is_none() {
        return Response::new(404, "");
    }
    let v = version.unwrap_or(item.history.len());
    match v.checked_sub(1).and_then(|i| item.history.get(i)) {
        Some(doc) => Response::json_ok(&Value::Object(doc.clone()))
            .with_header("X-Simperium-Version", &v.to_string()),
        None => Response::new(404, ""),
    }
}

fn record(state: &mut State, bucket: &str, change: Value) -> Value {
    state.log.push((bucket.to_string(), change));
    let cv = state.log.len().to_string();
    let entry = &mut state.log.last_mut().unwrap().1;
    entry["cv"] = json!(cv);
    entry.clone()
}

fn post_item(
    state: &mut State,
    bucket: &str,
    id: &str,
    version: Option<usize>,
    request: &Request,
) -> Response {
    let RequestBody::Json(Value::Object(body)) = &request.body else {
        return Response::new(400, "expected object");
    };
    let key = (bucket.to_string(), id.to_string());
    if let Some(expected) = version {
        let current = state.items.get(&key).map_or(0, |item| item.history.len());
        if expected != current {
            return Response::new(412, "version mismatch");
        }
    }
    let seq = state.log.len() as u64 + 1;
    let item = state.items.entry(key).or_default();

    let replace = request.query_value("replace") == Some("1");
    let mut next = if replace || item.deleted {
        Map::new()
    } else {
        item.history.last().cloned().unwrap_or_default()
    };
    for (k, v) in body {
        next.insert(k.clone(), v.clone());
    }
    let sv = item.history.len();
    item.history.push(next.clone());
    item.deleted = false;
    item.touched = seq;
    let ev = item.history.len();

    record(
        state,
        bucket,
        json!({
            "id": id, "o": "M", "sv": sv, "ev": ev,
            "clientid": request.query_value("clientid"),
            "ccids": [request.query_value("ccid")],
        }),
    );

    if request.query_value("response") == Some("1") {
        Response::json_ok(&Value::Object(next))
    } else {
        Response::new(200, "")
    }
}

fn delete_item(state: &mut State, bucket: &str, id: &str, request: &Request) -> Response {
    let seq = state.log.len() as u64 + 1;
    let Some(item) = state.items.get_mut(&(bucket.to_string(), id.to_string())) else {
        return Response::new(404, "");
    };
    item.deleted = true;
    item.touched = seq;
    record(
        state,
        bucket,
        json!({
            "id": id, "o": "-",
            "clientid": request.query_value("clientid"),
            "ccids": [request.query_value("ccid")],
        }),
    );
    Response::new(200, "")
}

fn bulk(state: &mut State, bucket: &str, request: &Request) -> Response {
    let RequestBody::Json(Value::Array(changes)) = &request.body else {
        return Response::new(400, "expected array");
    };
    let mut results = Vec::new();
    for change in changes {
        let id = change["id"].as_str().unwrap_or_default().to_string();
        let ccid = change["ccid"].clone();
        let seq = state.log.len() as u64 + 1;
        let item = state.items.entry((bucket.to_string(), id.clone())).or_default();
        let mut next = Map::new();
        if let Some(fields) = change["v"].as_object() {
            for (field, op) in fields {
                if op["o"] == "+" {
                    next.insert(field.clone(), op["v"].clone());
                }
            }
        }
        item.history.push(next);
        item.deleted = false;
        item.touched = seq;
        let ev = item.history.len();
        let entry = record(
            state,
            bucket,
            json!({
                "id": id, "o": "M", "ev": ev, "v": change["v"].clone(),
                "clientid": request.query_value("clientid"),
                "ccids": [ccid],
            }),
        );
        results.push(entry);
    }

    if request.query_value("wait") == Some("1") {
        Response::json_ok(&Value::Array(results))
    } else {
        Response::new(200, "")
    }
}

fn poll(state: &State, bucket: &str, request: &Request) -> Result<Response, TransportError> {
    let after: usize = match request.query_value("cv") {
        Some(cv) => cv.parse().unwrap_or(0),
        // "from now": nothing already logged is new
        None => state.log.len(),
    };
    let skip = request.query_values("skip_clientid");

    let changes: Vec<Value> = state
        .log
        .iter()
        .skip(after)
        .filter(|(b, _)| b == bucket)
        .map(|(_, c)| c.clone())
        .filter(|c| !skip.iter().any(|s| c["clientid"] == *s))
        .collect();

    if changes.is_empty() {
        return Err(TransportError::Timeout);
    }
    Ok(Response::json_ok(&Value::Array(changes)))
}
