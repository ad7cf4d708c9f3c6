//! HTTP client for a PocketBase backend.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Url;
use serde_json::Value;

use super::realtime::RealtimeConnection;
use super::subscriptions::{topic_name, ChangeHandler, SubscriptionId, SubscriptionRegistry};
use super::{CollectionService, ListOptions, RecordPage};
use crate::error::{Result, ScheduleError};

/// Page size used when walking a whole collection.
const FULL_LIST_BATCH: u32 = 500;

const USER_AGENT_VALUE: &str = concat!("teacher-schedule-board/", env!("CARGO_PKG_VERSION"));

pub struct PocketBaseClient {
    client: reqwest::Client,
    base_url: Url,
    registry: Arc<SubscriptionRegistry>,
    realtime: Arc<RealtimeConnection>,
}

impl PocketBaseClient {
    /// Creates a client for the backend at `base_url`, e.g. `http://127.0.0.1:8090`.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized)
            .map_err(|e| ScheduleError::Config(format!("invalid backend URL '{base_url}': {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ScheduleError::Config(format!("failed to create HTTP client: {e}")))?;

        let registry = Arc::new(SubscriptionRegistry::new());
        let realtime_url = join(&base_url, "api/realtime")?;
        let realtime = Arc::new(RealtimeConnection::new(
            client.clone(),
            realtime_url,
            Arc::clone(&registry),
        ));

        Ok(Self {
            client,
            base_url,
            registry,
            realtime,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of a collection's record list with the query applied.
    pub fn records_url(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        options: &ListOptions,
        skip_total: bool,
    ) -> Result<Url> {
        let mut url = join(&self.base_url, &format!("api/collections/{collection}/records"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page", &page.to_string());
            query.append_pair("perPage", &per_page.to_string());
            if let Some(sort) = &options.sort {
                query.append_pair("sort", sort);
            }
            if let Some(filter) = &options.filter {
                query.append_pair("filter", filter);
            }
            if let Some(expand) = &options.expand {
                query.append_pair("expand", expand);
            }
            if skip_total {
                query.append_pair("skipTotal", "1");
            }
        }
        Ok(url)
    }

    async fn fetch_page(&self, collection: &str, url: Url) -> Result<RecordPage> {
        tracing::debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScheduleError::fetch(collection, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScheduleError::fetch(
                collection,
                format!("server error ({status}): {body}"),
            ));
        }

        response
            .json::<RecordPage>()
            .await
            .map_err(|e| ScheduleError::Decode(format!("{collection}: {e}")))
    }
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| ScheduleError::Config(format!("invalid path '{path}': {e}")))
}

#[async_trait]
impl CollectionService for PocketBaseClient {
    async fn get_full_list(&self, collection: &str, options: &ListOptions) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let url = self.records_url(collection, page, FULL_LIST_BATCH, options, true)?;
            let batch = self.fetch_page(collection, url).await?;
            let done = (batch.items.len() as u32) < FULL_LIST_BATCH;
            items.extend(batch.items);
            if done {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    async fn get_list(
        &self,
        collection: &str,
        page: u32,
        per_page: u32,
        options: &ListOptions,
    ) -> Result<RecordPage> {
        let url = self.records_url(collection, page, per_page, options, false)?;
        self.fetch_page(collection, url).await
    }

    async fn subscribe(
        &self,
        collection: &str,
        topic: &str,
        handler: ChangeHandler,
    ) -> Result<SubscriptionId> {
        let name = topic_name(collection, topic);
        let id = self.registry.add(name.clone(), handler);
        // A fresh connection posts the registry's topics itself.
        let synced = match self.realtime.ensure_connected().await {
            Ok(_) => self.realtime.sync_topics().await,
            Err(e) => Err(e),
        };
        if let Err(e) = synced {
            self.registry.remove(&name, id);
            return Err(e);
        }
        tracing::debug!(topic = %name, "subscribed");
        Ok(id)
    }

    async fn unsubscribe(&self, collection: &str, topic: &str, id: SubscriptionId) -> Result<()> {
        let name = topic_name(collection, topic);
        if !self.registry.remove(&name, id) {
            return Err(ScheduleError::Subscription(format!(
                "no subscription {id:?} on {name}"
            )));
        }
        if self.registry.is_empty() {
            self.realtime.shutdown().await;
            return Ok(());
        }
        self.realtime.sync_topics().await
    }
}
