//! Bucket client: document CRUD, indexing, and the change feed.
//!
//! Every method issues exactly one request and keeps no state between calls
//! apart from the client id minted at construction. Concurrent writers to
//! the same document are arbitrated by the service through the optional
//! version precondition, never by the client.

use crate::change::{Change, ChangeRecord};
use crate::config::Endpoint;
use crate::diff::encode_create;
use crate::error::{Action, Error, Result};
use crate::transport::{HttpTransport, Request, Response, Transport};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use simperium_types::{ChangeId, ChangeVersion, ClientId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Page size for `all` when the caller gives none.
pub const BATCH_DEFAULT_SIZE: u32 = 100;
/// Header carrying the access token.
pub const TOKEN_HEADER: &str = "X-Simperium-Token";
/// Header naming the user an admin token acts for.
pub const USER_HEADER: &str = "X-Simperium-User";
/// Response header with the version of a fetched document.
pub const VERSION_HEADER: &str = "X-Simperium-Version";

/// Document payload: field name to value.
pub type Data = Map<String, Value>;

/// Construction options for a [`Bucket`].
#[derive(Debug, Clone)]
pub struct BucketOptions {
    /// User to act as when holding an admin token.
    pub user_id: Option<String>,
    /// Reuse a client id instead of generating one.
    pub client_id: Option<ClientId>,
    pub endpoint: Endpoint,
}

impl Default for BucketOptions {
    fn default() -> Self {
        Self {
            user_id: None,
            client_id: None,
            endpoint: Endpoint::api(),
        }
    }
}

/// Parameters for [`Bucket::index`].
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Include each document's current data.
    pub data: bool,
    /// Resume after a previous page.
    pub mark: Option<ChangeVersion>,
    /// Page size; the service defaults to 100 and caps at 1000. Zero means unset.
    pub limit: Option<u32>,
    /// Only documents changed since this cv.
    pub since: Option<ChangeVersion>,
}

/// One document in an index page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub v: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

/// A page of the bucket index, most recently modified first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexPage {
    /// Head cv of the bucket.
    #[serde(default)]
    pub current: Option<ChangeVersion>,
    /// Present only when another page follows.
    #[serde(default)]
    pub mark: Option<ChangeVersion>,
    /// Total documents available.
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub index: Vec<IndexEntry>,
}

impl IndexPage {
    pub fn has_more(&self) -> bool {
        self.mark.is_some()
    }
}

/// A fetched document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Version reported by the service, when it sent one.
    pub version: Option<u64>,
    pub data: Data,
}

/// Parameters for [`Bucket::post`].
#[derive(Debug, Clone, Default)]
pub struct PostOptions {
    /// Reject the write unless the document is at this version. Zero means
    /// no precondition.
    pub version: Option<u64>,
    /// Change id to submit under; generated when absent. Reuse it on retry.
    pub ccid: Option<ChangeId>,
    /// Ask the service to echo the resulting document.
    pub include_response: bool,
    /// Replace the document wholesale instead of merging.
    pub replace: bool,
}

/// Result of a successful [`Bucket::post`].
#[derive(Debug, Clone, PartialEq)]
pub struct PostResult {
    pub id: String,
    pub ccid: ChangeId,
    /// Service response, when `include_response` was set.
    pub response: Option<Value>,
}

/// Result of a bulk submission.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOutcome {
    /// The batch was queued; outcomes will show up on the change feed.
    Accepted,
    /// Per-change outcomes. Entries may carry an error even though the batch
    /// as a whole was accepted.
    Completed(Vec<Change>),
}

impl BulkOutcome {
    /// Changes the service rejected.
    pub fn errors(&self) -> Vec<&Change> {
        match self {
            BulkOutcome::Accepted => Vec::new(),
            BulkOutcome::Completed(changes) => changes.iter().filter(|c| c.is_error()).collect(),
        }
    }
}

/// Parameters for [`Bucket::all`].
#[derive(Debug, Clone, Default)]
pub struct AllOptions {
    /// Resume after this cv; absent means "from now".
    pub cv: Option<ChangeVersion>,
    /// Include the latest data of each changed document.
    pub data: bool,
    /// Include the author of each change.
    pub username: bool,
    /// Collapse repeated changes to one document down to the latest.
    pub most_recent: bool,
    /// Give up waiting after this long; absent waits indefinitely.
    pub timeout: Option<Duration>,
    /// Omit changes originating from these clients.
    pub skip_client_ids: Vec<ClientId>,
    /// Page size; [`BATCH_DEFAULT_SIZE`] when absent or zero.
    pub batch: Option<u32>,
}

/// Client for one bucket, scoped to one token and session.
#[derive(Clone)]
pub struct Bucket {
    appname: String,
    name: String,
    token: String,
    user_id: Option<String>,
    client_id: ClientId,
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("appname", &self.appname)
            .field("name", &self.name)
            .field("user_id", &self.user_id)
            .field("client_id", &self.client_id)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl Bucket {
    /// Creates a client for `name` against the default data endpoint.
    pub fn new(
        appname: impl Into<String>,
        token: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let transport = HttpTransport::new().map_err(Error::Setup)?;
        Ok(Self::with_transport(
            appname,
            token,
            name,
            BucketOptions::default(),
            Arc::new(transport),
        ))
    }

    pub fn with_transport(
        appname: impl Into<String>,
        token: impl Into<String>,
        name: impl Into<String>,
        options: BucketOptions,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            appname: appname.into(),
            name: name.into(),
            token: token.into(),
            user_id: options.user_id,
            client_id: options.client_id.unwrap_or_default(),
            endpoint: options.endpoint,
            transport,
        }
    }

    pub fn appname(&self) -> &str {
        &self.appname
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    // ── Documents ────────────────────────────────────────────────

    /// Fetches one page of the index.
    pub async fn index(&self, options: &IndexOptions) -> Result<IndexPage> {
        let mut request = self.request(Method::GET, &self.path("index"));
        if options.data {
            request = request.query("data", "1");
        }
        if let Some(mark) = &options.mark {
            request = request.query("mark", mark.as_str());
        }
        if let Some(limit) = options.limit.filter(|n| *n > 0) {
            request = request.query("limit", limit.to_string());
        }
        if let Some(since) = &options.since {
            request = request.query("since", since.as_str());
        }

        let response = self.send(Action::Index, request).await?;
        let response = ensure_success(Action::Index, response)?;
        decode(Action::Index, &response)
    }

    /// Walks every index page and returns all entries.
    pub async fn index_all(&self, data: bool) -> Result<Vec<IndexEntry>> {
        let mut options = IndexOptions {
            data,
            ..Default::default()
        };
        let mut entries = Vec::new();

        loop {
            let page = self.index(&options).await?;
            entries.extend(page.index);
            match page.mark {
                Some(mark) => options.mark = Some(mark),
                None => break,
            }
        }

        Ok(entries)
    }

    /// Fetches the latest, or a specific, version of a document.
    ///
    /// Returns `None` when the service reports the document absent.
    pub async fn get(&self, item: &str, version: Option<u64>) -> Result<Option<Document>> {
        let request = self.request(Method::GET, &self.item_path(item, version));
        let response = self.send(Action::Get, request).await?;

        if response.status == StatusCode::NOT_FOUND {
            debug!("{}/{} not found", self.name, item);
            return Ok(None);
        }
        let response = ensure_success(Action::Get, response)?;

        let data: Data = decode(Action::Get, &response)?;
        let version = response
            .header(VERSION_HEADER)
            .and_then(|v| v.trim().parse().ok())
            .or(version.filter(|v| *v > 0));

        Ok(Some(Document {
            id: item.to_string(),
            version,
            data,
        }))
    }

    /// Like [`Bucket::get`], substituting `default` for an absent document.
    pub async fn get_or(&self, item: &str, version: Option<u64>, default: Data) -> Result<Data> {
        Ok(self
            .get(item, version)
            .await?
            .map(|doc| doc.data)
            .unwrap_or(default))
    }

    /// Writes a document, creating it if needed.
    pub async fn post(&self, item: &str, data: &Data, options: PostOptions) -> Result<PostResult> {
        let ccid = options.ccid.unwrap_or_default();
        let mut request = self
            .request(Method::POST, &self.item_path(item, options.version))
            .query("clientid", self.client_id.as_str())
            .query("ccid", ccid.as_str())
            .json(Value::Object(data.clone()));
        if options.include_response {
            request = request.query("response", "1");
        }
        if options.replace {
            request = request.query("replace", "1");
        }

        let response = self.send(Action::Post, request).await?;
        let response = ensure_success(Action::Post, response)?;

        let body = if options.include_response {
            Some(decode(Action::Post, &response)?)
        } else {
            None
        };

        info!("Posted {}/{} (ccid {})", self.name, item, ccid);
        Ok(PostResult {
            id: item.to_string(),
            ccid,
            response: body,
        })
    }

    /// Writes a new document under a random id.
    pub async fn create(&self, data: &Data) -> Result<PostResult> {
        let item = Uuid::new_v4().simple().to_string();
        self.post(&item, data, PostOptions::default()).await
    }

    /// Builds one modify record per document, each diffed against an empty
    /// document and tagged with its own ccid.
    pub fn bulk_changes<I>(documents: I) -> Vec<ChangeRecord>
    where
        I: IntoIterator<Item = (String, Data)>,
    {
        documents
            .into_iter()
            .map(|(id, data)| ChangeRecord::modify(id, encode_create(&data)))
            .collect()
    }

    /// Creates many documents in one request.
    pub async fn bulk_post<I>(&self, documents: I, wait: bool) -> Result<BulkOutcome>
    where
        I: IntoIterator<Item = (String, Data)>,
    {
        self.submit_changes(&Self::bulk_changes(documents), wait).await
    }

    /// Submits prepared change records as one batch.
    pub async fn submit_changes(&self, changes: &[ChangeRecord], wait: bool) -> Result<BulkOutcome> {
        let body = serde_json::to_value(changes).map_err(|source| Error::Decode {
            action: Action::BulkPost,
            source,
        })?;

        let mut request = self
            .request(Method::POST, &self.path("changes"))
            .query("clientid", self.client_id.as_str())
            .json(body);
        if wait {
            request = request.query("wait", "1");
        }

        let response = self.send(Action::BulkPost, request).await?;
        let response = ensure_success(Action::BulkPost, response)?;

        if !wait {
            info!("Queued {} changes on {}", changes.len(), self.name);
            return Ok(BulkOutcome::Accepted);
        }

        let results: Vec<Change> = decode(Action::BulkPost, &response)?;
        info!(
            "Applied {} changes on {} ({} rejected)",
            results.len(),
            self.name,
            results.iter().filter(|c| c.is_error()).count()
        );
        Ok(BulkOutcome::Completed(results))
    }

    /// Deletes a document and returns the ccid the delete was tagged with.
    pub async fn delete(&self, item: &str, version: Option<u64>) -> Result<ChangeId> {
        let ccid = ChangeId::new();
        let request = self
            .request(Method::DELETE, &self.item_path(item, version))
            .query("clientid", self.client_id.as_str())
            .query("ccid", ccid.as_str());

        let response = self.send(Action::Delete, request).await?;
        let response = ensure_success(Action::Delete, response)?;

        if !response.body.trim().is_empty() {
            return Err(Error::UnexpectedBody {
                action: Action::Delete,
                body: response.body,
            });
        }

        info!("Deleted {}/{} (ccid {})", self.name, item, ccid);
        Ok(ccid)
    }

    // ── Change feed ──────────────────────────────────────────────

    /// Long-polls this user's changes after `cv`.
    ///
    /// Timeouts, dropped connections, and 502/504 from a gateway end the poll
    /// with an empty list.
    pub async fn changes(
        &self,
        cv: Option<&ChangeVersion>,
        timeout: Option<Duration>,
    ) -> Result<Vec<Change>> {
        let mut request = self
            .request(Method::GET, &self.path("changes"))
            .query("clientid", self.client_id.as_str())
            .timeout(timeout);
        if let Some(cv) = cv {
            request = request.query("cv", cv.as_str());
        }

        self.poll(Action::Changes, request).await
    }

    /// Long-polls changes from every user of the bucket.
    pub async fn all(&self, options: &AllOptions) -> Result<Vec<Change>> {
        let mut request = self
            .request(Method::GET, &self.path("all"))
            .query("clientid", self.client_id.as_str())
            .timeout(options.timeout);
        if let Some(cv) = &options.cv {
            request = request.query("cv", cv.as_str());
        }
        for skip in &options.skip_client_ids {
            request = request.query("skip_clientid", skip.as_str());
        }
        if options.username {
            request = request.query("username", "1");
        }
        if options.data {
            request = request.query("data", "1");
        }
        if options.most_recent {
            request = request.query("most_recent", "1");
        }
        let batch = options
            .batch
            .filter(|n| *n > 0)
            .unwrap_or(BATCH_DEFAULT_SIZE);
        request = request.query("batch", batch.to_string());

        self.poll(Action::All, request).await
    }

    async fn poll(&self, action: Action, request: Request) -> Result<Vec<Change>> {
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) if e.is_transient() => {
                debug!("{} poll on {} ended empty: {}", action, self.name, e);
                return Ok(Vec::new());
            }
            Err(source) => return Err(Error::Transport { action, source }),
        };

        if matches!(
            response.status,
            StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT
        ) {
            debug!(
                "{} poll on {} ended empty: HTTP {}",
                action, self.name, response.status
            );
            return Ok(Vec::new());
        }

        let response = ensure_success(action, response)?;
        decode(action, &response)
    }

    // ── Request plumbing ─────────────────────────────────────────

    fn path(&self, tail: &str) -> String {
        format!("{}/{}/{}", self.appname, self.name, tail)
    }

    fn item_path(&self, item: &str, version: Option<u64>) -> String {
        let mut path = self.path(&format!("i/{}", urlencoding::encode(item)));
        if let Some(v) = version.filter(|v| *v > 0) {
            path.push_str(&format!("/v/{v}"));
        }
        path
    }

    fn request(&self, method: Method, path: &str) -> Request {
        let mut request =
            Request::new(method, self.endpoint.url(path)).header(TOKEN_HEADER, self.token.as_str());
        if let Some(user) = &self.user_id {
            request = request.header(USER_HEADER, user.as_str());
        }
        request
    }

    async fn send(&self, action: Action, request: Request) -> Result<Response> {
        self.transport
            .send(request)
            .await
            .map_err(|source| Error::Transport { action, source })
    }
}

fn ensure_success(action: Action, response: Response) -> Result<Response> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(Error::Status {
            action,
            status: response.status.as_u16(),
            body: response.body,
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(action: Action, response: &Response) -> Result<T> {
    response
        .json()
        .map_err(|source| Error::Decode { action, source })
}
