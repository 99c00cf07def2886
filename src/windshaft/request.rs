use serde_json::Value;

use crate::core::config::SyncConfig;
use crate::core::reload::ReloadOptions;

/// Query params sent along with an instantiation payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    pub stat_tag: Option<String>,
    pub api_key: Option<String>,
    pub auth_token: Option<String>,
    /// `{dataviews: {id: filter}}`, only when filters were requested
    pub filters: Option<Value>,
}

impl RequestParams {
    /// `stat_tag` plus `api_key` or, failing that, `auth_token`.
    pub fn from_config(config: &SyncConfig) -> Self {
        let mut params = Self {
            stat_tag: config.stat_tag.clone(),
            ..Self::default()
        };
        match config.auth_param() {
            Some(("api_key", api_key)) => params.api_key = Some(api_key.to_string()),
            Some((_, auth_token)) => params.auth_token = Some(auth_token.to_string()),
            None => {}
        }
        params
    }

    /// `key=value` pairs in wire order, values url-encoded.
    pub fn to_query(&self) -> Vec<String> {
        let mut query = Vec::new();
        query.push(format!(
            "stat_tag={}",
            urlencoding::encode(self.stat_tag.as_deref().unwrap_or_default())
        ));
        if let Some(api_key) = &self.api_key {
            query.push(format!("api_key={}", urlencoding::encode(api_key)));
        } else if let Some(auth_token) = &self.auth_token {
            query.push(format!("auth_token={}", urlencoding::encode(auth_token)));
        }
        if let Some(filters) = &self.filters {
            query.push(format!(
                "filters={}",
                urlencoding::encode(&filters.to_string())
            ));
        }
        query
    }
}

/// One instantiation attempt.
///
/// Two requests are the same request when payload and params match; the
/// reload options only travel along to the model updater.
#[derive(Debug, Clone)]
pub struct Request {
    pub payload: String,
    pub params: RequestParams,
    pub options: ReloadOptions,
}

impl Request {
    pub fn new(payload: String, params: RequestParams, options: ReloadOptions) -> Self {
        Self {
            payload,
            params,
            options,
        }
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload && self.params == other.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_from_config() {
        let config = SyncConfig::for_testing()
            .with_stat_tag("tag")
            .with_auth_token("TOKEN");
        let params = RequestParams::from_config(&config);
        assert_eq!(params.auth_token.as_deref(), Some("TOKEN"));
        assert_eq!(params.to_query(), vec!["stat_tag=tag", "auth_token=TOKEN"]);

        let params = RequestParams::from_config(&config.with_api_key("KEY"));
        assert_eq!(params.api_key.as_deref(), Some("KEY"));
        assert_eq!(params.auth_token, None);
    }

    #[test]
    fn test_filters_are_encoded() {
        let params = RequestParams {
            filters: Some(json!({ "dataviews": { "dv": { "accept": ["a b"] } } })),
            ..RequestParams::default()
        };
        let query = params.to_query();
        assert_eq!(query[0], "stat_tag=");
        assert!(query[1].starts_with("filters=%7B%22dataviews%22"));
    }

    #[test]
    fn test_equality_ignores_options() {
        let first = Request::new("{}".to_string(), RequestParams::default(), ReloadOptions::new());
        let second = Request::new(
            "{}".to_string(),
            RequestParams::default(),
            ReloadOptions::scoped("a1").force_fetch(),
        );
        assert_eq!(first, second);

        let third = Request::new("{ }".to_string(), RequestParams::default(), ReloadOptions::new());
        assert_ne!(first, third);
    }
}
