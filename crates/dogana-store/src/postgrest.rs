//! PostgREST (Supabase) backend over HTTP.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::datastore::{BoxFuture, Datastore, check_identifiers};
use crate::error::StoreError;
use crate::types::{ChunkMatch, TableRow};

const DEFAULT_SEARCH_FUNCTION: &str = "search_chunks_multi_type";

/// Error bodies longer than this are cut before being surfaced.
const MAX_ERROR_BODY: usize = 300;

/// Talks to the REST interface of a Supabase project.
///
/// Lookups are `GET /rest/v1/{table}` with `eq.`/`like.` filters; similarity
/// search calls the `POST /rest/v1/rpc/{function}` remote procedure with
/// `query_embedding`, `match_count` and `type_filters`.
#[derive(Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    rest_url: String,
    service_key: String,
    search_function: String,
}

impl fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("rest_url", &self.rest_url)
            .field("service_key", &"<redacted>")
            .field("search_function", &self.search_function)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SearchParams<'a> {
    query_embedding: &'a [f32],
    match_count: usize,
    type_filters: Option<&'a [String]>,
}

impl PostgrestStore {
    /// `project_url` is the project root (e.g. `https://xyz.supabase.co`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Http`] if the HTTP client cannot be constructed.
    pub fn new(
        project_url: &str,
        service_key: String,
        request_timeout: Duration,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            client: crate::http::default_client(request_timeout)?,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            service_key,
            search_function: DEFAULT_SEARCH_FUNCTION.into(),
        })
    }

    /// Override the similarity-search remote procedure name.
    #[must_use]
    pub fn with_search_function(mut self, name: impl Into<String>) -> Self {
        self.search_function = name.into();
        self
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
    }

    async fn select(
        &self,
        table: &str,
        filters: Vec<(String, String)>,
        limit: usize,
    ) -> Result<Vec<TableRow>, StoreError> {
        let mut query = vec![("select".to_owned(), "*".to_owned())];
        query.extend(filters);
        query.push(("limit".to_owned(), limit.to_string()));

        let request = self
            .client
            .get(format!("{}/{table}", self.rest_url))
            .query(&query);
        let response = self.authorized(request).send().await?;
        let body = read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, StoreError> {
    let status = response.status();
    let body = response.text().await?;

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(StoreError::Unauthorized {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        tracing::error!("PostgREST error {status}: {body}");
        let message = body.chars().take(MAX_ERROR_BODY).collect();
        return Err(StoreError::Status {
            status: status.as_u16(),
            message,
        });
    }
    Ok(body)
}

impl Datastore for PostgrestStore {
    fn select_eq(
        &self,
        table: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<TableRow>, StoreError>> {
        let checked = check_identifiers(&[table, field]);
        let table = table.to_owned();
        let filters = vec![(field.to_owned(), format!("eq.{value}"))];
        Box::pin(async move {
            checked?;
            self.select(&table, filters, limit).await
        })
    }

    fn select_prefix(
        &self,
        table: &str,
        field: &str,
        prefix: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<TableRow>, StoreError>> {
        let checked = check_identifiers(&[table, field]);
        let table = table.to_owned();
        let filters = vec![
            (field.to_owned(), format!("like.{prefix}*")),
            ("order".to_owned(), format!("{field}.asc")),
        ];
        Box::pin(async move {
            checked?;
            self.select(&table, filters, limit).await
        })
    }

    fn search_chunks(
        &self,
        query_vector: Vec<f32>,
        match_count: usize,
        type_filters: Option<Vec<String>>,
    ) -> BoxFuture<'_, Result<Vec<ChunkMatch>, StoreError>> {
        Box::pin(async move {
            let params = SearchParams {
                query_embedding: &query_vector,
                match_count,
                type_filters: type_filters.as_deref(),
            };
            let request = self
                .client
                .post(format!("{}/rpc/{}", self.rest_url, self.search_function))
                .json(&params);
            let response = self.authorized(request).send().await?;
            let body = read_body(response).await?;
            Ok(serde_json::from_str(&body)?)
        })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "postgrest"
    }
}
