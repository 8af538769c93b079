use std::time::Duration;

use reqwest::{Client, Response};

use super::EntryStore;
use super::error::StoreError;
use super::types::{self, ErrorEnvelope, ListDocumentsResponse};
use crate::entry::{Entry, EntryPatch};

const API_URL: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: u32 = 300;

/// Firestore REST client bound to one collection.
pub struct FirestoreClient {
    api_key: String,
    client: Client,
    /// `.../databases/(default)/documents`
    base_url: String,
    collection: String,
}

impl FirestoreClient {
    pub fn new(
        project_id: &str,
        api_key: String,
        collection: String,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base_url = format!("{API_URL}/projects/{project_id}/databases/(default)/documents");
        Self::with_base_url(base_url, api_key, collection, timeout)
    }

    /// Create a client pointing at a custom documents root (useful for testing).
    pub fn with_base_url(
        base_url: String,
        api_key: String,
        collection: String,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, self.collection)
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.collection, id)
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|env| match env.error.status {
                Some(code) => format!("{code}: {}", env.error.message),
                None => env.error.message,
            })
            .unwrap_or(text);

        Err(StoreError::ApiError {
            status: status.as_u16(),
            message,
        })
    }
}

impl EntryStore for FirestoreClient {
    async fn get_all(&self) -> Result<Vec<Entry>, StoreError> {
        let url = self.collection_url();
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("key", &self.api_key)])
                .query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = Self::check(request.send().await?).await?;
            let page: ListDocumentsResponse = response.json().await?;

            for doc in &page.documents {
                match types::decode_entry(doc) {
                    Ok(entry) => entries.push(entry),
                    Err(err) => tracing::warn!(%err, "Skipping malformed document"),
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(count = entries.len(), collection = %self.collection, "Fetched collection");
        Ok(entries)
    }

    async fn set_by_id(&self, id: &str, entry: &Entry) -> Result<(), StoreError> {
        let body = types::encode_entry(entry)?;
        let request = self
            .client
            .patch(self.document_url(id))
            .query(&[("key", &self.api_key)])
            .json(&body);

        Self::check(request.send().await?).await?;
        Ok(())
    }

    async fn update_by_id(&self, id: &str, patch: &EntryPatch) -> Result<(), StoreError> {
        let (body, mask) = types::encode_patch(patch)?;

        let mut query: Vec<(&str, &str)> = vec![
            ("key", self.api_key.as_str()),
            ("currentDocument.exists", "true"),
        ];
        query.extend(mask.iter().map(|f| ("updateMask.fieldPaths", f.as_str())));

        let request = self
            .client
            .patch(self.document_url(id))
            .query(&query)
            .json(&body);

        Self::check(request.send().await?).await?;
        Ok(())
    }
}
