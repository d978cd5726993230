//! Read access to the roster spreadsheet through the Google Sheets REST API.

use crate::api::TokenProvider;
use crate::Result;
use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use tracing::trace;
use url::Url;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// An abstract source of roster grids. Lets the notification pipeline run against canned data in
/// tests.
#[async_trait::async_trait]
pub(crate) trait Sheet {
    /// Returns the cell grid of the named tab, rows outermost, as formatted strings.
    async fn get(&mut self, sheet_name: &str) -> Result<Vec<Vec<String>>>;
}

/// Implements the `Sheet` trait against the Google Sheets `values.get` endpoint. It takes a
/// `TokenProvider`, on which it calls refresh to keep the token up-to-date.
pub(crate) struct GoogleSheet {
    spreadsheet_id: String,
    token_provider: TokenProvider,
    client: reqwest::Client,
}

impl GoogleSheet {
    pub(crate) fn new(spreadsheet_id: impl Into<String>, token_provider: TokenProvider) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            token_provider,
            client: reqwest::Client::new(),
        }
    }

    /// Hands the provider back so another API client can reuse it, refreshed state included.
    pub(crate) fn into_token_provider(self) -> TokenProvider {
        self.token_provider
    }
}

/// The subset of the `values.get` response body that we use.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[async_trait::async_trait]
impl Sheet for GoogleSheet {
    async fn get(&mut self, sheet_name: &str) -> Result<Vec<Vec<String>>> {
        trace!("get for {sheet_name}");
        let access_token = self.token_provider.token_with_refresh().await?.to_string();

        // GET https://sheets.googleapis.com/v4/spreadsheets/{id}/values/{sheet!A1:ZZ}
        let mut url = Url::parse(SHEETS_API_BASE).context("Invalid Sheets API base URL")?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("Invalid Sheets API base URL"))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{sheet_name}!A1:ZZ"));
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE")
            .append_pair("dateTimeRenderOption", "FORMATTED_STRING");

        let response = self
            .client
            .get(url)
            .bearer_auth(&access_token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch the '{sheet_name}' sheet"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("Google Sheets API returned status {status}: {body}");
        }

        let range: ValueRange = response
            .json()
            .await
            .context("Failed to parse the Sheets API response")?;
        Ok(range.values)
    }
}
