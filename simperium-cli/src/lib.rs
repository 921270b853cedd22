//! Command-line front end for `simperium-core`.
//!
//! Every subcommand maps onto one client operation and prints its result as
//! pretty JSON on stdout. Logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use simperium_core::config::{DEFAULT_API_HOST, DEFAULT_AUTH_HOST};
use simperium_core::{
    last_cv, Admin, AllOptions, Api, Auth, Bucket, BulkOutcome, Change, ChangeVersion, ClientId,
    Data, Endpoint, HttpTransport, IndexOptions, PostOptions,
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Pause between follow-mode polls that came back empty.
const IDLE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "simperium", version)]
#[command(about = "Command-line client for the Simperium sync service")]
pub struct Cli {
    /// Application id
    #[arg(short, long, env = "SIMPERIUM_APP")]
    pub app: String,

    /// Access token for data commands
    #[arg(short, long, env = "SIMPERIUM_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// API key for account commands
    #[arg(long, env = "SIMPERIUM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Bucket for data commands
    #[arg(short, long, env = "SIMPERIUM_BUCKET")]
    pub bucket: Option<String>,

    /// Act as this user (requires an admin token)
    #[arg(long)]
    pub user: Option<String>,

    /// Reuse a client id instead of generating one
    #[arg(long)]
    pub client_id: Option<String>,

    /// Data service host
    #[arg(long, env = "SIMPERIUM_APIHOST", default_value = DEFAULT_API_HOST)]
    pub api_host: String,

    /// Auth service host
    #[arg(long, env = "SIMPERIUM_AUTHHOST", default_value = DEFAULT_AUTH_HOST)]
    pub auth_host: String,

    /// URL scheme for both services
    #[arg(long, default_value = "https")]
    pub scheme: String,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an account and print its access token
    CreateUser {
        username: String,
        #[arg(long, env = "SIMPERIUM_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Exchange credentials for an access token
    Authorize {
        username: String,
        #[arg(long, env = "SIMPERIUM_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// List documents in the bucket
    Index {
        /// Include document data
        #[arg(long)]
        data: bool,
        /// Page size
        #[arg(long)]
        limit: Option<u32>,
        /// Resume after a previous page
        #[arg(long)]
        mark: Option<String>,
        /// Only documents changed since this cv
        #[arg(long)]
        since: Option<String>,
        /// Follow marks and print every entry
        #[arg(long, conflicts_with = "mark")]
        all: bool,
    },

    /// Fetch a document
    Get {
        id: String,
        #[arg(long)]
        version: Option<u64>,
    },

    /// Write a document from a JSON object
    Post {
        id: String,
        json: String,
        /// Reject unless the document is at this version
        #[arg(long)]
        version: Option<u64>,
        /// Replace instead of merging
        #[arg(long)]
        replace: bool,
    },

    /// Create many documents from a JSON object of id to document
    BulkPost {
        json: String,
        /// Return as soon as the batch is queued
        #[arg(long)]
        no_wait: bool,
    },

    /// Delete a document
    Delete {
        id: String,
        #[arg(long)]
        version: Option<u64>,
    },

    /// Poll this user's changes
    Changes {
        #[arg(long)]
        cv: Option<String>,
        /// Poll timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Keep polling and print changes as they arrive
        #[arg(long)]
        follow: bool,
    },

    /// Poll changes from every user of the bucket
    All {
        #[arg(long)]
        cv: Option<String>,
        #[arg(long)]
        data: bool,
        #[arg(long)]
        username: bool,
        #[arg(long)]
        most_recent: bool,
        /// Poll timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Omit changes from this client; repeatable
        #[arg(long = "skip-clientid")]
        skip_clientid: Vec<String>,
        #[arg(long)]
        batch: Option<u32>,
        #[arg(long)]
        follow: bool,
    },
}

/// Runs the parsed command, writing results to `out`.
pub async fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<()> {
    match &cli.command {
        Command::CreateUser { username, password } => {
            let token = cli
                .auth()?
                .create(username, password)
                .await
                .context("account creation unavailable")?;
            write_json(out, &json!({ "access_token": token }))
        }

        Command::Authorize { username, password } => {
            let token = cli
                .auth()?
                .authorize(username, password)
                .await
                .context("Failed to authorize")?;
            write_json(out, &json!({ "access_token": token }))
        }

        Command::Index {
            data,
            limit,
            mark,
            since,
            all,
        } => {
            let bucket = cli.bucket()?;
            if *all {
                let entries = bucket.index_all(*data).await.context("Failed to list index")?;
                return write_json(out, &entries);
            }
            let options = IndexOptions {
                data: *data,
                mark: mark.as_deref().map(ChangeVersion::from),
                limit: *limit,
                since: since.as_deref().map(ChangeVersion::from),
            };
            let page = bucket.index(&options).await.context("Failed to fetch index")?;
            write_json(out, &page)
        }

        Command::Get { id, version } => {
            let doc = cli
                .bucket()?
                .get(id, *version)
                .await
                .with_context(|| format!("Failed to get {id}"))?;
            let value = match doc {
                Some(doc) => json!({ "id": doc.id, "version": doc.version, "data": doc.data }),
                None => Value::Null,
            };
            write_json(out, &value)
        }

        Command::Post {
            id,
            json: body,
            version,
            replace,
        } => {
            let data = parse_object(body).context("post body must be a JSON object")?;
            let options = PostOptions {
                version: *version,
                include_response: true,
                replace: *replace,
                ..Default::default()
            };
            let result = cli
                .bucket()?
                .post(id, &data, options)
                .await
                .with_context(|| format!("Failed to post {id}"))?;
            write_json(
                out,
                &json!({ "id": result.id, "ccid": result.ccid, "response": result.response }),
            )
        }

        Command::BulkPost { json: body, no_wait } => {
            let documents = parse_documents(body)?;
            let outcome = cli
                .bucket()?
                .bulk_post(documents, !no_wait)
                .await
                .context("Failed to submit batch")?;
            match outcome {
                BulkOutcome::Accepted => write_json(out, &json!({ "accepted": true })),
                BulkOutcome::Completed(results) => write_json(out, &results),
            }
        }

        Command::Delete { id, version } => {
            let ccid = cli
                .bucket()?
                .delete(id, *version)
                .await
                .with_context(|| format!("Failed to delete {id}"))?;
            write_json(out, &json!({ "id": id, "ccid": ccid }))
        }

        Command::Changes {
            cv,
            timeout,
            follow,
        } => {
            let feed = Feed::Changes(timeout.map(Duration::from_secs));
            follow_feed(out, &cli.bucket()?, &feed, cv.as_deref(), *follow).await
        }

        Command::All {
            cv,
            data,
            username,
            most_recent,
            timeout,
            skip_clientid,
            batch,
            follow,
        } => {
            let feed = Feed::All(AllOptions {
                cv: None,
                data: *data,
                username: *username,
                most_recent: *most_recent,
                timeout: timeout.map(Duration::from_secs),
                skip_client_ids: skip_clientid.iter().map(|s| ClientId::from(s.as_str())).collect(),
                batch: *batch,
            });
            follow_feed(out, &cli.bucket()?, &feed, cv.as_deref(), *follow).await
        }
    }
}

impl Cli {
    fn api_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.scheme, &self.api_host)
    }

    fn auth_endpoint(&self) -> Endpoint {
        Endpoint::new(&self.scheme, &self.auth_host)
    }

    fn auth(&self) -> Result<Auth> {
        let api_key = self
            .api_key
            .as_deref()
            .context("an API key is required (--api-key or SIMPERIUM_API_KEY)")?;
        let transport = HttpTransport::new().context("Failed to create HTTP client")?;
        Ok(Auth::with_transport(
            &self.app,
            api_key,
            self.auth_endpoint(),
            Arc::new(transport),
        ))
    }

    fn api(&self) -> Result<Api> {
        let token = self
            .token
            .as_deref()
            .context("an access token is required (--token or SIMPERIUM_TOKEN)")?;
        let transport = HttpTransport::new().context("Failed to create HTTP client")?;
        let mut api = Api::with_transport(&self.app, token, self.api_endpoint(), Arc::new(transport));
        if let Some(user) = &self.user {
            api = Admin::from_api(api).as_user(user);
        }
        if let Some(client_id) = &self.client_id {
            api = api.with_client_id(ClientId::from(client_id.as_str()));
        }
        Ok(api)
    }

    fn bucket(&self) -> Result<Bucket> {
        let name = self
            .bucket
            .as_deref()
            .context("a bucket is required (--bucket or SIMPERIUM_BUCKET)")?;
        Ok(self.api()?.handle(name).bucket().clone())
    }
}

enum Feed {
    Changes(Option<Duration>),
    All(AllOptions),
}

impl Feed {
    async fn next(
        &self,
        bucket: &Bucket,
        cv: Option<&ChangeVersion>,
    ) -> simperium_core::Result<Vec<Change>> {
        match self {
            Feed::Changes(timeout) => bucket.changes(cv, *timeout).await,
            Feed::All(options) => {
                let options = AllOptions {
                    cv: cv.cloned(),
                    ..options.clone()
                };
                bucket.all(&options).await
            }
        }
    }
}

/// Prints one poll, or with `follow` keeps polling from the last cv seen.
async fn follow_feed<W: Write>(
    out: &mut W,
    bucket: &Bucket,
    feed: &Feed,
    cv: Option<&str>,
    follow: bool,
) -> Result<()> {
    let mut cv = cv.map(ChangeVersion::from);

    loop {
        let changes = feed
            .next(bucket, cv.as_ref())
            .await
            .context("Failed to poll changes")?;

        if !follow {
            return write_json(out, &changes);
        }

        for change in &changes {
            write_json(out, change)?;
        }
        match last_cv(&changes) {
            Some(last) => cv = Some(last.clone()),
            None => {
                debug!("No new changes, polling again");
                tokio::time::sleep(IDLE_BACKOFF).await;
            }
        }
    }
}

fn parse_object(text: &str) -> Result<Data> {
    let value: Value = serde_json::from_str(text).context("invalid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("expected a JSON object, got {other}"),
    }
}

fn parse_documents(text: &str) -> Result<Vec<(String, Data)>> {
    let documents = parse_object(text).context("bulk body must map ids to documents")?;
    documents
        .into_iter()
        .map(|(id, doc)| match doc {
            Value::Object(data) => Ok((id, data)),
            _ => bail!("document {id} is not a JSON object"),
        })
        .collect()
}

fn write_json<W: Write, T: serde::Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("Failed to write output")?;
    writeln!(out)?;
    Ok(())
}
