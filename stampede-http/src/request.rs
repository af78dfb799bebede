//! Request templates built once per run

use crate::errors::HttpError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use stampede_core::{HttpMethod, LoadTestConfig};
use std::str::FromStr;

/// Everything needed to issue the run's request, parsed up front so that
/// virtual users never re-validate the configuration.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl PreparedRequest {
    pub fn from_config(config: &LoadTestConfig) -> Result<Self, HttpError> {
        let method = config
            .effective_method()
            .parse::<HttpMethod>()
            .map_err(|_| HttpError::InvalidMethod(config.method.clone()))?;

        let url = Url::parse(&config.url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

        let mut headers = HeaderMap::with_capacity(config.headers.len());
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_str(name)
                .map_err(|_| HttpError::InvalidHeaderName(name.clone()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| HttpError::InvalidHeaderValue(name.clone()))?;
            headers.insert(header_name, header_value);
        }

        Ok(Self {
            method,
            url,
            headers,
            body: config.body.clone(),
        })
    }
}

pub fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
    }
}
