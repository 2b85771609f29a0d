//! Report service client

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::{Config, Credentials};
use crate::errors::Result;
use crate::models::{DownloadUnit, ReportKind};

const SALES_ENDPOINT: &str = "/sales/v1";
const FINANCE_ENDPOINT: &str = "/finance/v1";

/// Anything able to issue one report request per download unit.
///
/// Implementations return the raw response; classification of the outcome
/// belongs to the fetcher.
#[async_trait]
pub trait ReportService: Send + Sync {
    async fn get_report(&self, unit: &DownloadUnit) -> std::result::Result<Response, reqwest::Error>;
}

/// HTTP implementation backed by reqwest
pub struct HttpReportService {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpReportService {
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.http.user_agent)
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn endpoint(&self, unit: &DownloadUnit) -> String {
        let path = match unit.kind() {
            ReportKind::Sales => SALES_ENDPOINT,
            ReportKind::Financial => FINANCE_ENDPOINT,
        };
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ReportService for HttpReportService {
    async fn get_report(&self, unit: &DownloadUnit) -> std::result::Result<Response, reqwest::Error> {
        let url = self.endpoint(unit);
        debug!("Requesting {} from: {}", unit.logical_name(), url);

        let request = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.user_id, Some(&self.credentials.password));

        let request = match unit {
            DownloadUnit::Sales(params) => request.query(params),
            DownloadUnit::Financial(params) => request.query(params),
        };

        request.send().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SalesParams, SALES_DATE_TYPE, SALES_REPORT_SUB_TYPE};

    #[test]
    fn test_endpoint_per_report_kind() {
        let config = Config {
            base_url: "http://localhost:1234/reportservice/".to_string(),
            ..Config::default()
        };
        let service = HttpReportService::new(
            &config,
            Credentials {
                user_id: "user".to_string(),
                password: "secret".to_string(),
            },
        )
        .unwrap();

        let unit = DownloadUnit::Sales(SalesParams {
            vendor_number: "123".to_string(),
            report_type: "Sales".to_string(),
            report_sub_type: SALES_REPORT_SUB_TYPE.to_string(),
            date_type: SALES_DATE_TYPE.to_string(),
            date: "20200101".to_string(),
        });
        assert_eq!(
            service.endpoint(&unit),
            "http://localhost:1234/reportservice/sales/v1"
        );
    }
}
