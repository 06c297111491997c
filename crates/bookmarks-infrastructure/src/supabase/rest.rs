//! PostgREST bookmark repository.

use std::sync::Arc;

use async_trait::async_trait;
use bookmarks_core::bookmark::{Bookmark, BookmarkRepository, NewBookmark};
use bookmarks_core::{BookmarkError, Result};
use reqwest::Method;
use url::Url;

use super::AccessTokenSource;
use super::client::{SupabaseClient, json, send};

/// [`BookmarkRepository`] over `/rest/v1/<table>`.
///
/// Ownership is enforced by the table's row-level policies; requests carry
/// the signed-in user's token.
pub struct PostgRestRepository {
    client: SupabaseClient,
    tokens: Arc<dyn AccessTokenSource>,
    table: String,
}

impl PostgRestRepository {
    pub fn new(client: SupabaseClient, tokens: Arc<dyn AccessTokenSource>, table: impl Into<String>) -> Self {
        Self {
            client,
            tokens,
            table: table.into(),
        }
    }

    fn table_url(&self) -> Result<Url> {
        self.client.endpoint(&format!("rest/v1/{}", self.table))
    }
}

/// `?select=*&user_id=eq.<owner>&order=created_at.desc`
pub(crate) fn list_url(mut table_url: Url, owner_id: &str) -> Url {
    table_url
        .query_pairs_mut()
        .append_pair("select", "*")
        .append_pair("user_id", &format!("eq.{}", owner_id))
        .append_pair("order", "created_at.desc");
    table_url
}

/// `?id=eq.<id>`
pub(crate) fn delete_url(mut table_url: Url, id: &str) -> Url {
    table_url
        .query_pairs_mut()
        .append_pair("id", &format!("eq.{}", id));
    table_url
}

#[async_trait]
impl BookmarkRepository for PostgRestRepository {
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Bookmark>> {
        let url = list_url(self.table_url()?, owner_id);
        let token = self.tokens.access_token().await;
        let request = self.client.request(Method::GET, url, token.as_deref());

        let response = send(request, "list bookmarks").await?;
        let rows: Vec<Bookmark> = json(response, "list bookmarks").await?;
        tracing::debug!("[PostgRest] Listed {} bookmarks for {}", rows.len(), owner_id);
        Ok(rows)
    }

    async fn insert(&self, bookmark: &NewBookmark) -> Result<String> {
        let token = self.tokens.access_token().await;
        let request = self
            .client
            .request(Method::POST, self.table_url()?, token.as_deref())
            .header("Prefer", "return=representation")
            .json(bookmark);

        let response = send(request, "insert bookmark").await?;
        let rows: Vec<Bookmark> = json(response, "insert bookmark").await?;
        rows.into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| BookmarkError::data_access("insert bookmark: no row returned"))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let url = delete_url(self.table_url()?, id);
        let token = self.tokens.access_token().await;
        let request = self.client.request(Method::DELETE, url, token.as_deref());

        // Zero matched rows is still a success
        send(request, "delete bookmark").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_url() -> Url {
        Url::parse("https://abcd.supabase.co/rest/v1/bookmarks").unwrap()
    }

    #[test]
    fn test_list_url() {
        let url = list_url(table_url(), "8f3e-u1");
        assert_eq!(
            url.as_str(),
            "https://abcd.supabase.co/rest/v1/bookmarks?select=*&user_id=eq.8f3e-u1&order=created_at.desc"
        );
    }

    #[test]
    fn test_delete_url() {
        let url = delete_url(table_url(), "42");
        assert_eq!(url.query(), Some("id=eq.42"));
    }

    #[test]
    fn test_insert_payload_shape() {
        let new = NewBookmark {
            title: "Docs".to_string(),
            url: "https://example.com/docs".to_string(),
            user_id: "u1".to_string(),
        };
        let value = serde_json::to_value(&new).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "title": "Docs",
                "url": "https://example.com/docs",
                "user_id": "u1"
            })
        );
    }
}
