use super::*;

use gloo_net::http::Request;

/// Fetches template and page markup from the web view's origin.
pub(super) struct HttpTemplateFetcher;

#[async_trait(?Send)]
impl TemplateFetcher for HttpTemplateFetcher {
    async fn fetch(&self, url: &str) -> Result<String, String> {
        let response = Request::get(url)
            .send()
            .await
            .map_err(|error| format!("request failed: {error}"))?;
        if !response.ok() {
            return Err(format!(
                "HTTP {} {}",
                response.status(),
                response.status_text()
            ));
        }
        response
            .text()
            .await
            .map_err(|error| format!("failed to read body: {error}"))
    }
}
