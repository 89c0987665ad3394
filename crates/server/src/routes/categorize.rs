use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use titlecat::{CategorizeConfig, ErrorMarker, TitleOutcome, TitleQuery};

/// Letters, digits, whitespace and light punctuation.
static TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\s.,!?-]+$").expect("title pattern is valid"));

#[derive(Debug, Deserialize)]
pub struct CategorizeRequest {
    pub user_id: String,
    pub titles: Vec<String>,
    /// Signed so a negative value is a validation error rather than a parse error.
    #[serde(default)]
    pub top_n: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategorizeResponse {
    pub user_id: String,
    pub snapshot_version: u64,
    pub results: Vec<TitleResultBody>,
}

/// One title's outcome: either its matches or an error marker.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TitleResultBody {
    Matches {
        title: String,
        matches: Vec<MatchBody>,
    },
    Error {
        title: String,
        error: ErrorMarker,
    },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchBody {
    pub service_type: String,
    pub score: f32,
}

impl CategorizeRequest {
    /// Check the request against the configured limits and return the `top_n` to use.
    pub fn validate(&self, limits: &CategorizeConfig) -> Result<usize, ServerError> {
        if self.user_id.trim().is_empty() {
            return Err(ServerError::BadRequest("user_id must not be empty".into()));
        }
        if self.titles.is_empty() {
            return Err(ServerError::BadRequest("titles must not be empty".into()));
        }
        if self.titles.len() > limits.max_batch_size {
            return Err(ServerError::BadRequest(format!(
                "too many titles: {} (max {})",
                self.titles.len(),
                limits.max_batch_size
            )));
        }
        for (idx, title) in self.titles.iter().enumerate() {
            if title.trim().is_empty() || !TITLE_PATTERN.is_match(title) {
                return Err(ServerError::BadRequest(format!(
                    "titles[{idx}] contains unsupported characters or is blank"
                )));
            }
        }

        let top_n = self.top_n.unwrap_or(limits.default_top_n as i64);
        if top_n < 1 || top_n > limits.max_top_n as i64 {
            return Err(ServerError::BadRequest(format!(
                "top_n must be between 1 and {}",
                limits.max_top_n
            )));
        }
        Ok(top_n as usize)
    }
}

/// `POST /api/v1/categorize`
///
/// ```json
/// // Request
/// { "user_id": "u-1", "titles": ["pipe fitter"], "top_n": 1 }
///
/// // Response
/// {
///   "user_id": "u-1",
///   "snapshot_version": 3,
///   "results": [
///     { "title": "pipe fitter", "matches": [{ "service_type": "A", "score": 0.9939 }] }
///   ]
/// }
/// ```
///
/// Titles that fail individually carry `"error": { "kind", "message" }`
/// instead of `matches`. If no catalog has been loaded yet the whole request
/// answers 503.
pub async fn categorize_titles(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<CategorizeRequest>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let Json(request) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let service = &state.core.categorize;
    let top_n = request.validate(service.config())?;

    let queries: Vec<TitleQuery> = request
        .titles
        .iter()
        .map(|title| TitleQuery::new(request.user_id.clone(), title.clone()))
        .collect();

    let response = service.categorize(&queries, top_n).await;
    if response.all_empty_index() {
        return Err(ServerError::NotReady(
            "no service-type catalog has been loaded yet".into(),
        ));
    }

    let results = response
        .results
        .into_iter()
        .map(|result| match result.outcome {
            TitleOutcome::Matches(matches) => TitleResultBody::Matches {
                title: result.title,
                matches: matches
                    .into_iter()
                    .map(|m| MatchBody {
                        service_type: m.service_type_id,
                        score: m.score,
                    })
                    .collect(),
            },
            TitleOutcome::Error(error) => TitleResultBody::Error {
                title: result.title,
                error: error.marker(),
            },
        })
        .collect();

    Ok(Json(CategorizeResponse {
        user_id: request.user_id,
        snapshot_version: response.snapshot_version,
        results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(titles: &[&str], top_n: Option<i64>) -> CategorizeRequest {
        CategorizeRequest {
            user_id: "u-1".into(),
            titles: titles.iter().map(|t| t.to_string()).collect(),
            top_n,
        }
    }

    #[test]
    fn default_top_n_applies() {
        let limits = CategorizeConfig::default();
        assert_eq!(
            request(&["Senior Plumber"], None).validate(&limits).unwrap(),
            limits.default_top_n
        );
    }

    #[test]
    fn punctuation_is_allowed() {
        let limits = CategorizeConfig::default();
        let ok = request(&["Sr. Engineer, Back-end!", "Who? me."], Some(3));
        assert_eq!(ok.validate(&limits).unwrap(), 3);
    }

    #[test]
    fn rejects_out_of_range_top_n() {
        let limits = CategorizeConfig::default();
        for top_n in [0, -1, limits.max_top_n as i64 + 1] {
            assert!(matches!(
                request(&["plumber"], Some(top_n)).validate(&limits),
                Err(ServerError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn rejects_bad_titles() {
        let limits = CategorizeConfig::default();
        for title in ["", "   ", "<script>", "café owner", "rm -rf /"] {
            assert!(
                request(&[title], None).validate(&limits).is_err(),
                "{title:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_oversized_batches() {
        let limits = CategorizeConfig {
            max_batch_size: 2,
            ..CategorizeConfig::default()
        };
        assert!(request(&["a", "b", "c"], None).validate(&limits).is_err());
        assert!(request(&[], None).validate(&limits).is_err());
    }

    #[test]
    fn error_results_serialize_with_marker() {
        let body = TitleResultBody::Error {
            title: "x".into(),
            error: ErrorMarker {
                kind: "degenerate_vector".into(),
                message: "zero".into(),
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["error"]["kind"], "degenerate_vector");
        assert!(value.get("matches").is_none());
    }
}
