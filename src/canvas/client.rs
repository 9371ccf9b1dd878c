// Canvas REST API HTTP client.
// Handles authentication, pagination, and request/response processing. The
// caching layer sits on top of this client and never builds requests itself.

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::error::{CanvasError, Result};

const API_PREFIX: &str = "/api/v1";
const PER_PAGE: &str = "100";

/// Canvas API client over a blocking HTTP connection.
pub struct CanvasClient {
    client: Client,
    base_url: String,
}

impl CanvasClient {
    /// Create a new client for the given Canvas instance and access token.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| CanvasError::Other(e.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("canvas-cache"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(CanvasError::Api)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from the CANVAS_BASE_URL and CANVAS_ACCESS_TOKEN
    /// environment variables.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("CANVAS_BASE_URL").map_err(|_| CanvasError::MissingBaseUrl)?;
        let token =
            std::env::var("CANVAS_ACCESS_TOKEN").map_err(|_| CanvasError::MissingToken)?;
        Self::new(&base_url, &token)
    }

    /// Make a GET request to an API endpoint (or a full pagination URL).
    pub fn get(&self, endpoint: &str, query: &[(String, String)]) -> Result<Response> {
        let url = self.endpoint_url(endpoint);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .map_err(CanvasError::Api)?;
        self.check_response(response)
    }

    /// Make a GET request and deserialize the JSON response.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let response = self.get(endpoint, query)?;
        response.json().map_err(CanvasError::Api)
    }

    /// Lazily iterate a paginated collection endpoint, following the
    /// `Link: rel="next"` headers. No request is made until the iterator is
    /// first polled.
    pub fn get_paginated<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Paginated<'_, T> {
        let mut query = query.to_vec();
        query.push(("per_page".to_string(), PER_PAGE.to_string()));
        Paginated {
            client: self,
            next: Some(PageRequest::First {
                endpoint: endpoint.to_string(),
                query,
            }),
            buffer: Vec::new().into_iter(),
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}{}{}", self.base_url, API_PREFIX, endpoint)
        }
    }

    /// Check response status and convert errors.
    fn check_response(&self, response: Response) -> Result<Response> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(response),
            StatusCode::UNAUTHORIZED => Err(CanvasError::Unauthorized),
            StatusCode::NOT_FOUND => {
                let url = response.url().to_string();
                Err(CanvasError::NotFound(url))
            }
            StatusCode::FORBIDDEN => {
                // Canvas throttles with 403 once the request bucket drains.
                let throttled = response
                    .headers()
                    .get("x-rate-limit-remaining")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<f64>().ok())
                    .is_some_and(|remaining| remaining <= 0.0);
                if throttled {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown")
                        .to_string();
                    Err(CanvasError::RateLimited { retry_after })
                } else {
                    Err(CanvasError::Other(format!(
                        "Forbidden: {}",
                        response.text().unwrap_or_default()
                    )))
                }
            }
            status => Err(CanvasError::Other(format!(
                "HTTP {}: {}",
                status,
                response.text().unwrap_or_default()
            ))),
        }
    }
}

enum PageRequest {
    First {
        endpoint: String,
        query: Vec<(String, String)>,
    },
    Next {
        url: String,
    },
}

/// Lazy iterator over a paginated Canvas collection.
pub struct Paginated<'c, T> {
    client: &'c CanvasClient,
    next: Option<PageRequest>,
    buffer: std::vec::IntoIter<T>,
}

impl<'c, T: DeserializeOwned> Iterator for Paginated<'c, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }

            let request = self.next.take()?;
            let response = match request {
                PageRequest::First { endpoint, query } => self.client.get(&endpoint, &query),
                PageRequest::Next { url } => self.client.get(&url, &[]),
            };
            let response = match response {
                Ok(response) => response,
                Err(err) => return Some(Err(err)),
            };

            // The Link header must be read before the body consumes the
            // response.
            self.next = response
                .headers()
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_next_link)
                .map(|url| PageRequest::Next { url });

            let page: Vec<T> = match response.json() {
                Ok(page) => page,
                Err(err) => {
                    self.next = None;
                    return Some(Err(CanvasError::Api(err)));
                }
            };
            self.buffer = page.into_iter();
        }
    }
}

/// Extract the `rel="next"` URL from a Link header value.
fn parse_next_link(header: &str) -> Option<String> {
    for part in header.split(',') {
        let part = part.trim();
        if !part.contains("rel=\"next\"") {
            continue;
        }
        let start = part.find('<')?;
        let end = part.find('>')?;
        if start < end {
            return Some(part[start + 1..end].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_api_prefix() {
        let client = CanvasClient::new("https://canvas.example.edu/", "token").unwrap();
        assert_eq!(
            client.endpoint_url("/courses/17"),
            "https://canvas.example.edu/api/v1/courses/17"
        );
    }

    #[test]
    fn endpoint_url_passes_full_urls_through() {
        let client = CanvasClient::new("https://canvas.example.edu", "token").unwrap();
        let next = "https://canvas.example.edu/api/v1/courses?page=2&per_page=100";
        assert_eq!(client.endpoint_url(next), next);
    }

    #[test]
    fn parses_next_link_from_header() {
        let header = "<https://canvas.example.edu/api/v1/courses?page=1&per_page=100>; \
                      rel=\"current\",\
                      <https://canvas.example.edu/api/v1/courses?page=2&per_page=100>; \
                      rel=\"next\",\
                      <https://canvas.example.edu/api/v1/courses?page=5&per_page=100>; \
                      rel=\"last\"";
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://canvas.example.edu/api/v1/courses?page=2&per_page=100")
        );
    }

    #[test]
    fn last_page_has_no_next_link() {
        let header = "<https://canvas.example.edu/api/v1/courses?page=5>; rel=\"current\",\
                      <https://canvas.example.edu/api/v1/courses?page=1>; rel=\"first\"";
        assert_eq!(parse_next_link(header), None);
    }
}
