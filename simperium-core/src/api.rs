//! Name-based factory for bucket clients.
//!
//! `spuser` is reserved: it names the per-user profile pseudo-bucket rather
//! than an ordinary collection.

use crate::bucket::{Bucket, BucketOptions, Data, Document, PostOptions, PostResult};
use crate::config::Endpoint;
use crate::error::{Error, Result};
use crate::transport::{HttpTransport, Transport};
use simperium_types::ClientId;
use std::sync::Arc;

/// Reserved name of the user profile bucket.
pub const USER_BUCKET: &str = "spuser";
/// Item holding the profile inside [`USER_BUCKET`].
pub const USER_ITEM: &str = "info";

/// Client resolved from a bucket name.
#[derive(Debug, Clone)]
pub enum Handle {
    Bucket(Bucket),
    User(SpUser),
}

impl Handle {
    /// The bucket client underneath either variant.
    pub fn bucket(&self) -> &Bucket {
        match self {
            Handle::Bucket(bucket) => bucket,
            Handle::User(user) => &user.bucket,
        }
    }
}

/// The current user's profile document.
#[derive(Debug, Clone)]
pub struct SpUser {
    bucket: Bucket,
}

impl SpUser {
    pub fn new(bucket: Bucket) -> Self {
        Self { bucket }
    }

    pub async fn get(&self) -> Result<Option<Document>> {
        self.bucket.get(USER_ITEM, None).await
    }

    pub async fn post(&self, data: &Data) -> Result<PostResult> {
        self.bucket.post(USER_ITEM, data, PostOptions::default()).await
    }
}

/// Hands out bucket clients for one application and token.
#[derive(Clone)]
pub struct Api {
    appname: String,
    token: String,
    user_id: Option<String>,
    client_id: Option<ClientId>,
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("appname", &self.appname)
            .field("user_id", &self.user_id)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl Api {
    pub fn new(appname: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let transport = HttpTransport::new().map_err(Error::Setup)?;
        Ok(Self::with_transport(
            appname,
            token,
            Endpoint::api(),
            Arc::new(transport),
        ))
    }

    pub fn with_transport(
        appname: impl Into<String>,
        token: impl Into<String>,
        endpoint: Endpoint,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            appname: appname.into(),
            token: token.into(),
            user_id: None,
            client_id: None,
            endpoint,
            transport,
        }
    }

    /// Shares one client id across every bucket handed out.
    pub fn with_client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Resolves `name` to a client; `spuser` (any case) yields the profile.
    pub fn handle(&self, name: &str) -> Handle {
        if name.eq_ignore_ascii_case(USER_BUCKET) {
            Handle::User(self.user())
        } else {
            Handle::Bucket(self.bucket(name))
        }
    }

    /// Client for an ordinary bucket.
    pub fn bucket(&self, name: &str) -> Bucket {
        Bucket::with_transport(
            self.appname.clone(),
            self.token.clone(),
            name,
            BucketOptions {
                user_id: self.user_id.clone(),
                client_id: self.client_id.clone(),
                endpoint: self.endpoint.clone(),
            },
            Arc::clone(&self.transport),
        )
    }

    /// Client for the profile of the token's user.
    pub fn user(&self) -> SpUser {
        SpUser::new(self.bucket(USER_BUCKET))
    }
}

/// An [`Api`] holding an admin token, able to act as any user.
#[derive(Debug, Clone)]
pub struct Admin {
    api: Api,
}

impl Admin {
    pub fn new(appname: impl Into<String>, admin_token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api: Api::new(appname, admin_token)?,
        })
    }

    pub fn from_api(api: Api) -> Self {
        Self { api }
    }

    /// Buckets reached through the admin token itself.
    pub fn api(&self) -> &Api {
        &self.api
    }

    /// An [`Api`] whose requests act on behalf of `user_id`.
    pub fn as_user(&self, user_id: impl Into<String>) -> Api {
        Api {
            user_id: Some(user_id.into()),
            ..self.api.clone()
        }
    }
}
