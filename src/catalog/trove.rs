//! Trove catalog pagination and download URL signing.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::endpoints::Endpoints;
use super::error::CatalogError;
use super::model::{SignedUrl, TroveProduct};
use crate::download::{DownloadError, HttpClient};

/// Client for the subscription catalog.
#[derive(Debug, Clone)]
pub struct TroveCatalog {
    client: HttpClient,
    endpoints: Endpoints,
}

impl TroveCatalog {
    /// Creates a catalog client sharing `client`'s session and pool.
    #[must_use]
    pub fn new(client: HttpClient, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    /// Fetches one page of products.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Fetch`] on transport or decode failure.
    pub async fn page(
        &self,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<TroveProduct>, CatalogError> {
        let url = self.endpoints.trove_page(index);
        Ok(self.client.get_json(&url, cancel).await?)
    }

    /// Walks the catalog from page 0 until a page comes back empty.
    ///
    /// # Errors
    ///
    /// Returns the first page failure; a partial listing is never returned.
    #[instrument(skip(self, cancel))]
    pub async fn products(&self, cancel: &CancellationToken) -> Result<Vec<TroveProduct>, CatalogError> {
        let mut products = Vec::new();
        let mut index = 0;
        loop {
            let page = self.page(index, cancel).await?;
            if page.is_empty() {
                break;
            }
            debug!(index, count = page.len(), "trove page loaded");
            products.extend(page);
            index += 1;
        }
        info!(pages = index, products = products.len(), "Trove catalog loaded");
        Ok(products)
    }

    /// Exchanges a catalog path for a short-lived download URL.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unauthorized`] when the account can't sign
    /// trove downloads (an `Unauthorized` marker or HTTP 401/403), and
    /// [`CatalogError::MissingSignedUrl`] when the reply has no URL.
    #[instrument(skip(self, cancel))]
    pub async fn sign(
        &self,
        machine_name: &str,
        filename: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CatalogError> {
        let form = [("machine_name", machine_name), ("filename", filename)];
        let reply: SignedUrl = match self
            .client
            .post_form_json(&self.endpoints.sign(), &form, cancel)
            .await
        {
            Ok(reply) => reply,
            Err(DownloadError::AuthRequired { .. }) => {
                return Err(CatalogError::Unauthorized {
                    machine_name: machine_name.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if reply.is_unauthorized() {
            return Err(CatalogError::Unauthorized {
                machine_name: machine_name.to_string(),
            });
        }
        reply
            .signed_url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| CatalogError::MissingSignedUrl {
                machine_name: machine_name.to_string(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::download::HttpSettings;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalog(server: &MockServer) -> TroveCatalog {
        let client = HttpClient::new(None, &HttpSettings::default()).unwrap();
        TroveCatalog::new(client, Endpoints::new(server.uri()))
    }

    fn product(name: &str) -> serde_json::Value {
        serde_json::json!({
            "human-name": name,
            "downloads": {"windows": {"machine_name": format!("{name}_win"), "url": {"web": format!("{name}.zip")}}}
        })
    }

    #[tokio::test]
    async fn test_products_walks_pages_until_empty() {
        let server = MockServer::start().await;
        for (index, body) in [
            ("0", serde_json::json!([product("a"), product("b")])),
            ("1", serde_json::json!([product("c")])),
            ("2", serde_json::json!([])),
        ] {
            Mock::given(method("GET"))
                .and(path("/client/catalog"))
                .and(query_param("index", index))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .expect(1)
                .mount(&server)
                .await;
        }

        let products = catalog(&server).products(&CancellationToken::new()).await.unwrap();
        let names: Vec<_> = products.iter().map(|p| p.human_name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_page_failure_fails_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/client/catalog"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = catalog(&server).products(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CatalogError::Fetch(DownloadError::HttpStatus { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_sign_returns_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/user/download/sign"))
            .and(body_string_contains("machine_name=a_win"))
            .and(body_string_contains("filename=a.zip"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"signed_url": "https://cdn.example/a.zip?t=1"})),
            )
            .mount(&server)
            .await;

        let url = catalog(&server)
            .sign("a_win", "a.zip", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example/a.zip?t=1");
    }

    #[tokio::test]
    async fn test_sign_unauthorized_marker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/user/download/sign"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"_errors": "Unauthorized"})))
            .mount(&server)
            .await;

        let err = catalog(&server)
            .sign("a_win", "a.zip", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_sign_forbidden_status_is_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/user/download/sign"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let err = catalog(&server)
            .sign("a_win", "a.zip", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_authorization());
    }

    #[tokio::test]
    async fn test_sign_without_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/user/download/sign"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = catalog(&server)
            .sign("a_win", "a.zip", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::MissingSignedUrl { .. }));
    }
}
