//! PostgREST-backed comment store.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Response;

use super::SupabaseEndpoint;
use crate::error::RemoteError;
use crate::models::{Comment, NewComment, ThreadId};
use crate::remote::{CommentStore, DEFAULT_PAGE_SIZE};

const HTTP_TIMEOUT_SECS: u64 = 10;
const NOT_DELETED_FILTER: &str = "(is_deleted.is.null,is_deleted.eq.false)";

#[derive(Debug, Clone)]
pub struct PostgrestCommentStore {
    endpoint: SupabaseEndpoint,
    page_size: usize,
    client: reqwest::Client,
}

impl PostgrestCommentStore {
    pub fn new(endpoint: SupabaseEndpoint) -> crate::Result<Self> {
        Ok(Self {
            endpoint,
            page_size: DEFAULT_PAGE_SIZE,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
                .build()?,
        })
    }

    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub const fn endpoint(&self) -> &SupabaseEndpoint {
        &self.endpoint
    }

    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
        access_token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let bearer = access_token.unwrap_or_else(|| self.endpoint.anon_key());
        request
            .header("apikey", self.endpoint.anon_key())
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .header(ACCEPT, "application/json")
    }
}

impl CommentStore for PostgrestCommentStore {
    async fn fetch_thread(&self, thread_id: &ThreadId) -> Result<Vec<Comment>, RemoteError> {
        let request = self
            .client
            .get(self.endpoint.rest_url())
            .query(&thread_query(thread_id, self.page_size));
        let response = self
            .authorized(request, None)
            .send()
            .await
            .map_err(transport_error)?;
        let body = read_success_body(response).await?;
        parse_rows(&body)
    }

    async fn insert(
        &self,
        comment: &NewComment,
        access_token: Option<&str>,
    ) -> Result<Comment, RemoteError> {
        let request = self
            .client
            .post(self.endpoint.rest_url())
            .header("Prefer", "return=representation")
            .json(comment);
        let response = self
            .authorized(request, access_token)
            .send()
            .await
            .map_err(transport_error)?;
        let body = read_success_body(response).await?;
        parse_rows(&body)?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::transport("Insert returned no rows"))
    }
}

/// Query string for one thread: non-deleted rows, oldest first, bounded.
fn thread_query(thread_id: &ThreadId, page_size: usize) -> Vec<(&'static str, String)> {
    vec![
        ("select", "*".to_string()),
        ("video_id", format!("eq.{thread_id}")),
        ("or", NOT_DELETED_FILTER.to_string()),
        ("order", "created_at.asc".to_string()),
        ("limit", page_size.to_string()),
    ]
}

async fn read_success_body(response: Response) -> Result<String, RemoteError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(RemoteError::from_http(status.as_u16(), &body))
    }
}

fn parse_rows(body: &str) -> Result<Vec<Comment>, RemoteError> {
    serde_json::from_str(body)
        .map_err(|error| RemoteError::transport(format!("Invalid comments payload: {error}")))
}

#[allow(clippy::needless_pass_by_value)]
fn transport_error(error: reqwest::Error) -> RemoteError {
    RemoteError {
        status: error.status().map(|status| status.as_u16()),
        ..RemoteError::transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::diagnostics::{DiagnosticKind, Diagnostics};

    #[test]
    fn thread_query_filters_orders_and_bounds() {
        let query = thread_query(&ThreadId::new("abc123"), 500);
        assert_eq!(
            query,
            vec![
                ("select", "*".to_string()),
                ("video_id", "eq.abc123".to_string()),
                ("or", "(is_deleted.is.null,is_deleted.eq.false)".to_string()),
                ("order", "created_at.asc".to_string()),
                ("limit", "500".to_string()),
            ]
        );
    }

    #[test]
    fn parse_rows_reads_postgrest_payload() {
        let body = r#"[
          {
            "id": "7b0c3f5e-1111-4c1e-9d7a-000000000001",
            "video_id": "abc123",
            "user_id": "0f8f7c2a-2222-4b7e-8c1d-000000000002",
            "body": "first!",
            "parent_id": null,
            "timestamp_seconds": 12,
            "created_at": "2024-05-01T12:00:00.123456+00:00",
            "is_deleted": null
          }
        ]"#;

        let rows = parse_rows(body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].thread_id, ThreadId::new("abc123"));
        assert_eq!(rows[0].timestamp_seconds, Some(12));
        assert!(!rows[0].is_deleted);
        assert!(!rows[0].is_seed);
    }

    #[test]
    fn parse_rows_rejects_garbage() {
        let error = parse_rows("<html>").unwrap_err();
        assert_eq!(error.code, None);
        assert!(error.message.starts_with("Invalid comments payload"));

        let error = crate::Error::from(error);
        assert!(matches!(error, crate::Error::Remote(_)));
        assert_eq!(
            Diagnostics::from_error(&error).kind(),
            DiagnosticKind::Generic
        );
    }

    #[test]
    fn store_keeps_endpoint_and_page_size() {
        let endpoint =
            SupabaseEndpoint::new("https://project.supabase.co", "anon", "shadow_comments")
                .unwrap();
        let store = PostgrestCommentStore::new(endpoint.clone())
            .unwrap()
            .with_page_size(50);
        assert_eq!(store.endpoint(), &endpoint);
        assert_eq!(store.page_size, 50);
    }
}
