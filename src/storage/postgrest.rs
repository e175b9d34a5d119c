use log::debug;
use reqwest::header::{ HeaderMap, HeaderValue, AUTHORIZATION };
use reqwest::{ Client as HttpClient, RequestBuilder, StatusCode };
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::error::StoreError;
use crate::session::AuthUser;

const REST_PATH: &str = "rest/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    column: String,
    value: String,
}

impl Filter {
    pub fn eq(column: &str, value: &str) -> Self {
        Self { column: column.to_string(), value: format!("eq.{}", value) }
    }
}

/// Newest-first ordering on a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    column: String,
}

impl Order {
    pub fn desc(column: &str) -> Self {
        Self { column: column.to_string() }
    }

    fn to_param(&self) -> String {
        format!("{}.desc", self.column)
    }
}

/// Client for the hosted backend's REST table interface. Row-level isolation
/// is enforced by the backend from the bearer token; callers still filter by
/// `user_id` explicitly.
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    http: HttpClient,
    base_url: Url,
    anon_key: String,
}

impl PostgrestClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, StoreError> {
        Self::with_timeout(base_url, anon_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let trimmed = base_url.trim_end_matches('/');
        let base_url = Url::parse(&format!("{}/", trimmed))?;
        Ok(Self {
            http: HttpClient::builder().timeout(timeout).build()?,
            base_url,
            anon_key: anon_key.to_string(),
        })
    }

    fn table_url(&self, table: &str, filters: &[Filter]) -> Result<Url, StoreError> {
        let mut url = self.base_url.join(&format!("{}/{}", REST_PATH, table))?;
        if !filters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for filter in filters {
                pairs.append_pair(&filter.column, &filter.value);
            }
        }
        Ok(url)
    }

    fn headers(&self, user: Option<&AuthUser>) -> Result<HeaderMap, StoreError> {
        let bearer = user
            .and_then(|u| u.access_token.as_deref())
            .unwrap_or(&self.anon_key);
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&self.anon_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", bearer))?);
        Ok(headers)
    }

    async fn send(request: RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            return Err(StoreError::Conflict(body));
        }
        Err(StoreError::Backend { status: status.as_u16(), body })
    }

    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        user: Option<&AuthUser>,
        filters: &[Filter],
        order: Option<Order>,
        limit: Option<usize>
    ) -> Result<Vec<T>, StoreError> {
        let mut url = self.table_url(table, filters)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");
            if let Some(order) = &order {
                pairs.append_pair("order", &order.to_param());
            }
            if let Some(limit) = limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        debug!("GET {}", url);
        let request = self.http.get(url).headers(self.headers(user)?);
        Ok(Self::send(request).await?.json::<Vec<T>>().await?)
    }

    pub async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        user: Option<&AuthUser>,
        row: &B
    ) -> Result<T, StoreError> {
        let url = self.table_url(table, &[])?;
        debug!("POST {}", url);
        let request = self.http
            .post(url)
            .headers(self.headers(user)?)
            .header("Prefer", "return=representation")
            .json(row);
        first_row(table, Self::send(request).await?.json::<Vec<T>>().await?)
    }

    pub async fn upsert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        user: Option<&AuthUser>,
        row: &B,
        on_conflict: &str
    ) -> Result<T, StoreError> {
        let mut url = self.table_url(table, &[])?;
        url.query_pairs_mut().append_pair("on_conflict", on_conflict);
        debug!("POST (upsert) {}", url);
        let request = self.http
            .post(url)
            .headers(self.headers(user)?)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(row);
        first_row(table, Self::send(request).await?.json::<Vec<T>>().await?)
    }

    pub async fn delete(
        &self,
        table: &str,
        user: Option<&AuthUser>,
        filters: &[Filter]
    ) -> Result<(), StoreError> {
        let url = self.table_url(table, filters)?;
        debug!("DELETE {}", url);
        let request = self.http.delete(url).headers(self.headers(user)?);
        Self::send(request).await?;
        Ok(())
    }
}

fn header_value(value: &str) -> Result<HeaderValue, StoreError> {
    HeaderValue::from_str(value).map_err(|e| StoreError::Config(format!("Invalid header value: {}", e)))
}

fn first_row<T>(table: &str, rows: Vec<T>) -> Result<T, StoreError> {
    rows
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::Backend {
            status: 200,
            body: format!("'{}' returned no representation", table),
        })
}
