//! Request extractors that report malformed input as [`ApiError::BadRequest`].

use std::fmt::Display;
use std::str::FromStr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use chrono::{DateTime, NaiveDateTime, Utc};
use common::{PageRequest, Sort};

use crate::config::Config;
use crate::error::ApiError;

/// Parses a path segment into a typed id.
pub fn parse_id<T>(raw: &str, what: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} '{raw}': {e}")))
}

/// Parses an RFC 3339 timestamp, or an ISO date-time without offset read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>().ok().map(|at| at.and_utc())
}

/// JSON body extractor.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Raw query-string pairs, keeping repeated keys such as `sort`.
#[derive(Debug, Default)]
pub struct ListParams(Vec<(String, String)>);

impl<S> FromRequestParts<S> for ListParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(Self(pairs))
    }
}

impl ListParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// First non-blank value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .find(|v| !v.is_empty())
    }

    /// Text filter value of `key`.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    /// Parses the value of `key`; absent or blank yields `None`.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, ApiError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse()
                    .map_err(|e| ApiError::BadRequest(format!("Invalid {key} '{raw}': {e}")))
            })
            .transpose()
    }

    /// Parses the timestamp value of `key`; see [`parse_timestamp`].
    pub fn timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
        self.get(key)
            .map(|raw| {
                parse_timestamp(raw).ok_or_else(|| {
                    ApiError::BadRequest(format!(
                        "Invalid {key} '{raw}': expected an ISO-8601 date-time"
                    ))
                })
            })
            .transpose()
    }

    /// Builds the page request from `page`, `size` and every `sort` value.
    ///
    /// Sizes are clamped to the configured maximum.
    pub fn page_request<F>(&self, config: &Config) -> Result<PageRequest<F>, ApiError>
    where
        F: FromStr,
    {
        let page = self.parse::<u32>("page")?.unwrap_or(0);
        let size = self
            .parse::<u32>("size")?
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size);

        let mut request = PageRequest::new(page, size);
        for raw in self
            .0
            .iter()
            .filter(|(k, v)| k == "sort" && !v.trim().is_empty())
            .map(|(_, v)| v)
        {
            let sort: Sort<F> = raw
                .parse()
                .map_err(|e| ApiError::BadRequest(format!("Invalid sort '{raw}': {e}")))?;
            request = request.sorted_by(sort);
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use common::Direction;
    use store::OrderField;

    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        ListParams::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn page_request_uses_defaults_and_clamps_size() {
        let config = Config::default();
        let req: PageRequest<OrderField> = params(&[]).page_request(&config).unwrap();
        assert_eq!((req.page, req.size), (0, 10));
        assert!(req.sort.is_empty());

        let req: PageRequest<OrderField> = params(&[("page", "2"), ("size", "5000")])
            .page_request(&config)
            .unwrap();
        assert_eq!((req.page, req.size), (2, 100));
    }

    #[test]
    fn repeated_sort_keys_are_kept_in_order() {
        let req: PageRequest<OrderField> = params(&[("sort", "status"), ("sort", "createdAt,desc")])
            .page_request(&Config::default())
            .unwrap();
        assert_eq!(req.sort.len(), 2);
        assert_eq!(req.sort[0].field, OrderField::Status);
        assert_eq!(req.sort[1].direction, Direction::Desc);
    }

    #[test]
    fn unknown_sort_field_is_a_bad_request() {
        let result: Result<PageRequest<OrderField>, _> =
            params(&[("sort", "bogus,asc")]).page_request(&Config::default());
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn timestamps_accept_offset_and_local_forms() {
        let expected = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 9, 10, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-09-10T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-09-10T02:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-09-10T00:00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-09-10T00:00:00.250").map(|at| at.timestamp_subsec_millis()),
            Some(250)
        );
        assert_eq!(parse_timestamp("yesterday"), None);

        let p = params(&[("from", "2025-09-10T00:00:00"), ("to", "2025-09-10")]);
        assert_eq!(p.timestamp("from").unwrap(), Some(expected));
        assert!(matches!(p.timestamp("to"), Err(ApiError::BadRequest(_))));
        assert_eq!(p.timestamp("missing").unwrap(), None);
    }

    #[test]
    fn blank_values_are_absent() {
        let p = params(&[("name", "  "), ("status", "")]);
        assert_eq!(p.get("name"), None);
        assert_eq!(p.parse::<u32>("status").unwrap(), None);
        assert!(params(&[("page", "x")]).parse::<u32>("page").is_err());
    }
}
