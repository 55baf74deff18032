//! Backend client for spatial records

use serde::de::DeserializeOwned;
use vuestock_core::{Level, LevelId, Rack, RackId, Slot, TableNames, TableQuery, ViewerError};
use vuestock_scene::fetcher::{FetchOutcome, FetchRequest, FetchedRecords, PendingFetches, SpatialDataSource};

/// Where the viewer gets its records from
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// REST base URL, e.g. "https://project.example.co/rest/v1"
    pub rest_url: String,
    /// Sent as `apikey` and bearer token when present
    pub api_key: Option<String>,
    pub tables: TableNames,
    /// Use the built-in demo warehouse instead of the backend
    pub demo: bool,
    /// Verbose console logging
    pub debug: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            rest_url: "http://localhost:8080/rest/v1".to_string(),
            api_key: None,
            tables: TableNames::default(),
            demo: false,
            debug: false,
        }
    }
}

impl BackendConfig {
    /// Create config from URL query parameters or same-origin fallback
    #[cfg(target_arch = "wasm32")]
    pub fn from_browser() -> Self {
        let Some(window) = web_sys::window() else {
            return Self::default();
        };
        let location = window.location();
        let search = location.search().unwrap_or_default();

        let rest_url = match Self::parse_query_param(&search, "backend") {
            Some(backend) => {
                tracing::info!("Using backend from URL parameter: {}", backend);
                Self::rest_url_for(&backend)
            }
            None => {
                let origin = location
                    .origin()
                    .unwrap_or_else(|_| "http://localhost:8080".to_string());
                format!("{}/rest/v1", origin)
            }
        };

        Self::from_search(rest_url, &search)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_browser() -> Self {
        Self::default()
    }

    /// Apply the `key`, `demo` and `debug` query parameters
    pub fn from_search(rest_url: String, search: &str) -> Self {
        let flag = |name: &str| {
            Self::parse_query_param(search, name)
                .map(|v| v == "1" || v == "true")
                .unwrap_or(false)
        };
        Self {
            rest_url,
            api_key: Self::parse_query_param(search, "key").filter(|k| !k.is_empty()),
            tables: TableNames::default(),
            demo: flag("demo"),
            debug: flag("debug"),
        }
    }

    /// REST base URL for a backend address.
    ///
    /// A bare `host:port` gets `http://` and the `/rest/v1` prefix; a full URL
    /// is used as given.
    pub fn rest_url_for(addr: &str) -> String {
        if addr.starts_with("https://") || addr.starts_with("http://") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{}/rest/v1", addr.trim_end_matches('/'))
        }
    }

    /// Value of `param` in a location search string, percent-decoded.
    /// Values that do not decode to UTF-8 are skipped.
    pub fn parse_query_param(search: &str, param: &str) -> Option<String> {
        search
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == param)
            .and_then(|(_, value)| {
                urlencoding::decode(&value.replace('+', " "))
                    .map(|decoded| decoded.into_owned())
                    .ok()
            })
    }

    pub fn url_for(&self, query: &TableQuery) -> String {
        format!("{}/{}?{}", self.rest_url, query.table, query.to_query_string())
    }
}

/// Decode a response body for `request`
pub fn decode_records(request: FetchRequest, body: &str) -> Result<FetchedRecords, ViewerError> {
    fn rows<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, ViewerError> {
        serde_json::from_str(body).map_err(|e| ViewerError::BackendQuery(format!("invalid response: {}", e)))
    }

    Ok(match request {
        FetchRequest::Racks => FetchedRecords::Racks(rows::<Rack>(body)?),
        FetchRequest::Levels(_) => FetchedRecords::Levels(rows::<Level>(body)?),
        FetchRequest::Slots(_) => FetchedRecords::Slots(rows::<Slot>(body)?),
    })
}

/// Fetches records over the backend's REST interface
pub struct RestDataSource {
    config: BackendConfig,
}

impl RestDataSource {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    fn get(&self, request: FetchRequest, query: TableQuery, sink: PendingFetches) {
        let url = self.config.url_for(&query);
        tracing::info!("Fetching {:?} from: {}", request, url);

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen_futures::spawn_local;

            let api_key = self.config.api_key.clone();
            spawn_local(async move {
                let result = fetch_text(&url, api_key.as_deref())
                    .await
                    .and_then(|body| decode_records(request, &body));
                if let Err(e) = &result {
                    tracing::error!("Failed to fetch {:?}: {}", request, e);
                }
                sink.push(FetchOutcome { request, result });
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        sink.push(FetchOutcome {
            request,
            result: Err(ViewerError::BackendQuery(format!(
                "REST fetch of {} is only available in the browser",
                url
            ))),
        });
    }
}

#[cfg(target_arch = "wasm32")]
async fn fetch_text(url: &str, api_key: Option<&str>) -> Result<String, ViewerError> {
    let mut builder = gloo_net::http::Request::get(url).header("Accept", "application/json");
    if let Some(key) = api_key {
        builder = builder
            .header("apikey", key)
            .header("Authorization", &format!("Bearer {}", key));
    }

    let response = builder
        .send()
        .await
        .map_err(|e| ViewerError::BackendQuery(e.to_string()))?;
    if !response.ok() {
        return Err(ViewerError::BackendQuery(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }
    response
        .text()
        .await
        .map_err(|e| ViewerError::BackendQuery(e.to_string()))
}

impl SpatialDataSource for RestDataSource {
    fn fetch_racks(&self, sink: PendingFetches) {
        let query = self.config.tables.racks_query();
        self.get(FetchRequest::Racks, query, sink);
    }

    fn fetch_levels(&self, rack_id: RackId, sink: PendingFetches) {
        let query = self.config.tables.levels_query(rack_id);
        self.get(FetchRequest::Levels(rack_id), query, sink);
    }

    fn fetch_slots(&self, level_id: LevelId, sink: PendingFetches) {
        let query = self.config.tables.slots_query(level_id);
        self.get(FetchRequest::Slots(level_id), query, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_param() {
        let search = "?backend=192.168.1.10%3A8080&key=abc&demo=1";
        assert_eq!(
            BackendConfig::parse_query_param(search, "backend"),
            Some("192.168.1.10:8080".to_string())
        );
        assert_eq!(BackendConfig::parse_query_param(search, "key"), Some("abc".to_string()));
        assert_eq!(BackendConfig::parse_query_param(search, "missing"), None);
    }

    #[test]
    fn test_api_key_is_fully_decoded() {
        let config = BackendConfig::from_search("http://x/rest/v1".to_string(), "?key=ab%2Bc%3D%3D&demo=0");
        assert_eq!(config.api_key.as_deref(), Some("ab+c=="));
        assert!(!config.demo);
    }

    #[test]
    fn test_from_search_flags() {
        let config = BackendConfig::from_search("http://x/rest/v1".to_string(), "?demo=1&debug=true&key=");
        assert!(config.demo);
        assert!(config.debug);
        assert_eq!(config.api_key, None);

        let config = BackendConfig::from_search("http://x/rest/v1".to_string(), "");
        assert!(!config.demo);
    }

    #[test]
    fn test_rest_url_for() {
        assert_eq!(
            BackendConfig::rest_url_for("localhost:8080"),
            "http://localhost:8080/rest/v1"
        );
        assert_eq!(
            BackendConfig::rest_url_for("https://project.example.co/rest/v1/"),
            "https://project.example.co/rest/v1"
        );
    }

    #[test]
    fn test_levels_url() {
        let config = BackendConfig::default();
        let url = config.url_for(&config.tables.levels_query(RackId(7)));
        assert_eq!(
            url,
            "http://localhost:8080/rest/v1/w_vuestock_levels?select=*&rack_id=eq.7&is_active=eq.true&order=display_order.asc"
        );
    }

    #[test]
    fn test_decode_records() {
        let body = r#"[{"id": 1, "rack_code": "A1", "position_x": 100, "position_y": 50, "rotation": 90}]"#;
        match decode_records(FetchRequest::Racks, body).unwrap() {
            FetchedRecords::Racks(racks) => {
                assert_eq!(racks.len(), 1);
                assert_eq!(racks[0].position(), (100.0, 50.0));
            }
            other => panic!("unexpected records: {:?}", other),
        }

        let err = decode_records(FetchRequest::Levels(RackId(1)), "{\"message\": \"denied\"}").unwrap_err();
        assert!(matches!(err, ViewerError::BackendQuery(_)));
    }

    #[test]
    fn test_native_fetch_reports_error() {
        let source = RestDataSource::new(BackendConfig::default());
        let pending = PendingFetches::default();
        source.fetch_racks(pending.clone());
        let outcomes = pending.drain();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result.is_err());
    }
}
