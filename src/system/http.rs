use crate::config::HttpSystemConfig;
use crate::error::{Result, UserSyncError};
use crate::models::{Record, Watermark};
use crate::system::adapter::{PageKey, SystemConnector, SystemDescriptor, WriteReceipt};
use async_trait::async_trait;
use reqwest::{header, Client, Method, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// System reached through a JSON collection resource:
///
/// - `GET  {base}/{resource}?modified_since=..&limit=..[&after_modified=..&after_id=..]`
/// - `GET  {base}/{resource}?{identifier_field}=..`
/// - `POST {base}/{resource}`
/// - `PATCH {base}/{resource}/{primary_key}`
/// - `GET  {base}/health`
pub struct HttpSystem {
    descriptor: SystemDescriptor,
    config: HttpSystemConfig,
    client: Client,
}

impl HttpSystem {
    pub fn new(descriptor: SystemDescriptor, config: HttpSystemConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| UserSyncError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            descriptor,
            config,
            client,
        })
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.resource.trim_matches('/')
        )
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn error_for(&self, response: Response) -> UserSyncError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        UserSyncError::Connection(format!(
            "{} returned {}: {}",
            self.descriptor.name, status, body
        ))
    }

    /// Accept either a bare array or `{"records": [...]}`
    fn records_from(&self, body: Value) -> Result<Vec<Record>> {
        let items = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("records") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(UserSyncError::Connection(format!(
                        "{} returned an object without a records array",
                        self.descriptor.name
                    )))
                }
            },
            other => {
                return Err(UserSyncError::Connection(format!(
                    "{} returned unexpected payload: {}",
                    self.descriptor.name, other
                )))
            }
        };

        Ok(items.into_iter().filter_map(Record::from_value).collect())
    }

    fn receipt_from(&self, body: Value, fallback_pk: Option<&str>) -> Result<WriteReceipt> {
        let record = Record::from_value(body).unwrap_or_default();
        let primary_key = record
            .get_str(&self.descriptor.primary_key_field)
            .map(str::to_string)
            .or_else(|| fallback_pk.map(str::to_string))
            .ok_or_else(|| {
                UserSyncError::Connection(format!(
                    "{} response did not contain '{}'",
                    self.descriptor.name, self.descriptor.primary_key_field
                ))
            })?;

        Ok(WriteReceipt {
            primary_key,
            last_modified: record
                .timestamp(&self.descriptor.last_modified_field)
                .map(Watermark::new),
        })
    }
}

#[async_trait]
impl SystemConnector for HttpSystem {
    fn descriptor(&self) -> &SystemDescriptor {
        &self.descriptor
    }

    #[instrument(skip(self), fields(system = %self.descriptor.name))]
    async fn fetch_changes(
        &self,
        since: Watermark,
        after: Option<&PageKey>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let url = self.collection_url();
        let order_by = format!(
            "{},{}",
            self.descriptor.last_modified_field, self.descriptor.primary_key_field
        );
        let mut query = vec![
            ("modified_since", since.to_rfc3339()),
            ("limit", limit.to_string()),
            ("order_by", order_by),
        ];
        if let Some(key) = after {
            query.push(("after_modified", key.last_modified.to_rfc3339()));
            query.push(("after_id", key.primary_key.clone()));
        }

        let response = self.request(Method::GET, &url).query(&query).send().await?;

        if !response.status().is_success() {
            return Err(self.error_for(response).await);
        }

        let records = self.records_from(response.json().await?)?;
        debug!(count = records.len(), "Fetched page of changes");
        Ok(records)
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Record>> {
        let url = self.collection_url();
        let response = self
            .request(Method::GET, &url)
            .query(&[(self.descriptor.identifier_field.as_str(), identifier)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.error_for(response).await);
        }

        let wanted = identifier.trim().to_lowercase();
        let field = &self.descriptor.identifier_field;
        Ok(self
            .records_from(response.json().await?)?
            .into_iter()
            .find(|r| r.identifier(field).as_deref() == Some(wanted.as_str())))
    }

    async fn insert(&self, record: Record) -> Result<WriteReceipt> {
        let url = self.collection_url();
        let response = self
            .request(Method::POST, &url)
            .json(&record)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.error_for(response).await);
        }

        self.receipt_from(response.json().await?, None)
    }

    async fn update(&self, primary_key: &str, fields: Record) -> Result<WriteReceipt> {
        let url = format!("{}/{}", self.collection_url(), primary_key);
        let response = self
            .request(Method::PATCH, &url)
            .json(&fields)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(UserSyncError::NotFound(format!(
                "{} in {}",
                primary_key, self.descriptor.name
            )));
        }
        if !response.status().is_success() {
            return Err(self.error_for(response).await);
        }

        // Some services answer 204 without a body
        let body = if response.status() == StatusCode::NO_CONTENT {
            Value::Null
        } else {
            response.json().await.unwrap_or(Value::Null)
        };
        self.receipt_from(body, Some(primary_key))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.config.base_url.trim_end_matches('/'));
        let response = self.request(Method::GET, &url).send().await?;
        Ok(response.status().is_success())
    }
}
