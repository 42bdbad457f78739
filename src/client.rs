//! HTTP client for the agricultural monitoring API.
//!
//! - One method per backend resource/action; no retries.
//! - Authenticated calls read the bearer token from the `SessionStore` at call
//!   time, so a rotated token is picked up by the next call.
//! - A 401 is surfaced as `ApiError::Unauthorized`; forcing the logout is the
//!   caller's job (see `SessionStore::check_auth`).

use http::Method;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::rc::Rc;

use crate::models::agri::*;
use crate::session::{AuthBackend, SessionStore};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("missing access token for authenticated endpoint")]
    MissingAuth,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl ApiError {
    /// Errors that mean the session can no longer be used.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::MissingAuth | ApiError::Unauthorized(_))
    }
}

fn decode_error(e: serde_path_to_error::Error<serde_json::Error>) -> ApiError {
    ApiError::Decode(format!("{}: {}", e.path(), e.inner()))
}

impl From<crate::transport::TransportError> for ApiError {
    fn from(value: crate::transport::TransportError) -> Self {
        ApiError::Transport(value.0)
    }
}

#[derive(Clone)]
pub struct AgriClient {
    transport: Rc<dyn HttpTransport>,
    session: SessionStore,
}

impl AgriClient {
    pub fn new(transport: Rc<dyn HttpTransport>, session: SessionStore) -> Self {
        AgriClient { transport, session }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    fn bearer(&self) -> Result<String, ApiError> {
        self.session.access_token().ok_or(ApiError::MissingAuth)
    }

    fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        debug!("{} {}", request.method, request.path);
        let res = self.transport.send(&request)?;
        if res.is_success() {
            return Ok(res);
        }
        let message = if res.body.trim().is_empty() {
            String::from("<no body>")
        } else {
            res.body
        };
        Err(match res.status {
            401 => ApiError::Unauthorized(message),
            404 => ApiError::NotFound(format!("{} {}", request.method, request.path)),
            status => ApiError::Http { status, message },
        })
    }

    fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
        let de = &mut serde_json::Deserializer::from_str(body);
        serde_path_to_error::deserialize(de).map_err(decode_error)
    }

    fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T, ApiError> {
        let mut req = ApiRequest::new(method, path);
        req.query = query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        req.body = body;
        req.bearer = Some(self.bearer()?);
        let res = self.execute(req)?;
        Self::decode(&res.body)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        self.call(Method::GET, path, query, None)
    }

    /// The envelope is matched with untyped items first; items are then
    /// decoded on their own so a bad field is reported with its JSON path.
    fn get_list<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<T>, ApiError> {
        let items = self.get_json::<ListPayload<serde_json::Value>>(path, query)?.into_vec();
        serde_path_to_error::deserialize(serde_json::Value::Array(items)).map_err(decode_error)
    }

    fn send_json<B: Serialize, T: DeserializeOwned>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.call(method, path, &[], Some(body))
    }

    /// POST an action endpoint; the response body is not interpreted.
    fn post_action(&self, path: &str) -> Result<(), ApiError> {
        let mut req = ApiRequest::new(Method::POST, path);
        req.body = Some(serde_json::json!({}));
        req.bearer = Some(self.bearer()?);
        self.execute(req).map(|_| ())
    }

    fn delete(&self, path: &str) -> Result<(), ApiError> {
        let mut req = ApiRequest::new(Method::DELETE, path);
        req.bearer = Some(self.bearer()?);
        self.execute(req).map(|_| ())
    }

    fn post_anonymous<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let mut req = ApiRequest::new(Method::POST, path);
        req.body = Some(serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))?);
        let res = self.execute(req)?;
        Self::decode(&res.body)
    }

    // ---- auth ----

    pub fn register(&self, account: &NewAccount) -> Result<serde_json::Value, ApiError> {
        self.post_anonymous("/auth/register/", account)
    }

    pub fn get_current_user(&self) -> Result<UserProfile, ApiError> {
        self.get_json("/auth/user/", &[])
    }

    // ---- farms ----

    pub fn list_farms(&self) -> Result<Vec<Farm>, ApiError> {
        self.get_list("/farms/", &[])
    }

    pub fn get_farm(&self, farm_id: FarmId) -> Result<Farm, ApiError> {
        self.get_json(&format!("/farms/{}/", farm_id.0), &[])
    }

    pub fn create_farm(&self, farm: &FarmInput) -> Result<Farm, ApiError> {
        self.send_json(Method::POST, "/farms/", farm)
    }

    pub fn update_farm(&self, farm_id: FarmId, farm: &FarmInput) -> Result<Farm, ApiError> {
        self.send_json(Method::PUT, &format!("/farms/{}/", farm_id.0), farm)
    }

    pub fn delete_farm(&self, farm_id: FarmId) -> Result<(), ApiError> {
        self.delete(&format!("/farms/{}/", farm_id.0))
    }

    // ---- plots ----

    pub fn list_plots(&self, farm: Option<FarmId>) -> Result<Vec<FieldPlot>, ApiError> {
        let mut q = Vec::new();
        if let Some(f) = farm {
            q.push(("farm", f.0.to_string()));
        }
        self.get_list("/plots/", &q)
    }

    pub fn get_plot(&self, plot_id: PlotId) -> Result<FieldPlot, ApiError> {
        self.get_json(&format!("/plots/{}/", plot_id.0), &[])
    }

    pub fn create_plot(&self, plot: &PlotInput) -> Result<FieldPlot, ApiError> {
        self.send_json(Method::POST, "/plots/", plot)
    }

    pub fn update_plot(&self, plot_id: PlotId, plot: &PlotInput) -> Result<FieldPlot, ApiError> {
        self.send_json(Method::PUT, &format!("/plots/{}/", plot_id.0), plot)
    }

    pub fn delete_plot(&self, plot_id: PlotId) -> Result<(), ApiError> {
        self.delete(&format!("/plots/{}/", plot_id.0))
    }

    // ---- sensor readings ----

    pub fn list_sensor_readings(&self, plot: Option<PlotId>) -> Result<Vec<SensorReading>, ApiError> {
        let mut q = Vec::new();
        if let Some(p) = plot {
            q.push(("field_plot", p.0.to_string()));
        }
        self.get_list("/sensor-readings/", &q)
    }

    pub fn create_sensor_reading(&self, reading: &NewSensorReading) -> Result<SensorReading, ApiError> {
        self.send_json(Method::POST, "/sensor-readings/", reading)
    }

    // ---- anomalies ----

    pub fn list_anomalies(&self, plot: Option<PlotId>) -> Result<Vec<AnomalyEvent>, ApiError> {
        let mut q = Vec::new();
        if let Some(p) = plot {
            q.push(("field_plot", p.0.to_string()));
        }
        self.get_list("/anomalies/", &q)
    }

    pub fn get_anomaly(&self, anomaly_id: AnomalyId) -> Result<AnomalyEvent, ApiError> {
        self.get_json(&format!("/anomalies/{}/", anomaly_id.0), &[])
    }

    /// POST `/anomalies/{id}/recommend/` with an empty body. The backend may
    /// answer with a previously stored recommendation.
    pub fn generate_recommendation(&self, anomaly_id: AnomalyId) -> Result<RecommendationPayload, ApiError> {
        self.send_json(
            Method::POST,
            &format!("/anomalies/{}/recommend/", anomaly_id.0),
            &RecommendRequest { force_regenerate: false },
        )
    }

    /// Same endpoint as `generate_recommendation`, asking the backend to skip its cache.
    pub fn regenerate_recommendation(&self, anomaly_id: AnomalyId) -> Result<RecommendationPayload, ApiError> {
        self.send_json(
            Method::POST,
            &format!("/anomalies/{}/recommend/", anomaly_id.0),
            &RecommendRequest { force_regenerate: true },
        )
    }

    pub fn resolve_anomaly(&self, anomaly_id: AnomalyId) -> Result<(), ApiError> {
        self.post_action(&format!("/anomalies/{}/resolve/", anomaly_id.0))
    }

    // ---- recommendations ----

    /// Stored recommendations for an anomaly. "Nothing yet" (404) is an empty list.
    pub fn list_recommendations(&self, anomaly_id: AnomalyId) -> Result<Vec<RecommendationPayload>, ApiError> {
        match self.get_list("/recommendations/", &[("anomaly", anomaly_id.0.to_string())]) {
            Err(ApiError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    pub fn apply_recommendation(&self, recommendation_id: RecommendationId) -> Result<(), ApiError> {
        self.post_action(&format!("/recommendations/{}/apply/", recommendation_id.0))
    }

    // ---- dashboard ----

    pub fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.get_json("/dashboard/stats/", &[])
    }
}

impl AuthBackend for AgriClient {
    fn obtain_token_pair(&self, username: &str, password: &str) -> Result<TokenPair, ApiError> {
        self.post_anonymous("/auth/login/", &Credentials { username, password })
    }

    fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        let mut req = ApiRequest::new(Method::GET, "/auth/user/");
        req.bearer = Some(access_token.to_string());
        let res = self.execute(req)?;
        Self::decode(&res.body)
    }

    fn refresh_access(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        self.post_anonymous("/auth/refresh/", &serde_json::json!({ "refresh": refresh_token }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockAuthBackend;
    use crate::storage::MemoryStorage;
    use crate::transport::{MockHttpTransport, TransportError};

    fn logged_in_session(token: &str) -> SessionStore {
        let storage = MemoryStorage::default();
        storage.seed(crate::session::keys::ACCESS_TOKEN, token);
        storage.seed(crate::session::keys::REFRESH_TOKEN, "refresh-1");
        storage.seed(
            crate::session::keys::USER,
            r#"{"id": 1, "username": "ana", "role": "farmer"}"#,
        );
        SessionStore::rehydrate(Rc::new(storage))
    }

    fn client_with(mock: MockHttpTransport, session: SessionStore) -> AgriClient {
        AgriClient::new(Rc::new(mock), session)
    }

    #[test]
    fn authenticated_call_reads_token_at_call_time() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|r| r.path == "/farms/" && r.bearer.as_deref() == Some("tok-1"))
            .times(1)
            .returning(|_| Ok(ApiResponse::new(200, "[]")));
        mock.expect_send()
            .withf(|r| r.path == "/farms/" && r.bearer.as_deref() == Some("tok-2"))
            .times(1)
            .returning(|_| Ok(ApiResponse::new(200, "[]")));
        let session = logged_in_session("tok-1");
        let client = client_with(mock, session.clone());
        let mut auth = MockAuthBackend::new();
        auth.expect_refresh_access()
            .withf(|r| r == "refresh-1")
            .times(1)
            .returning(|_| {
                Ok(RefreshedToken {
                    access: "tok-2".into(),
                    refresh: None,
                })
            });

        client.list_farms().unwrap();
        session.refresh_token(&auth).unwrap();
        client.list_farms().unwrap();
    }

    #[test]
    fn missing_token_fails_without_network_call() {
        let mock = MockHttpTransport::new();
        let session = SessionStore::rehydrate(Rc::new(MemoryStorage::default()));
        let client = client_with(mock, session);

        let err = client.list_plots(None).unwrap_err();
        assert_eq!(err, ApiError::MissingAuth);
        assert!(err.is_auth_failure());
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|r| r.path == "/plots/1/")
            .returning(|_| Ok(ApiResponse::new(401, r#"{"detail": "Token is invalid or expired"}"#)));
        mock.expect_send()
            .withf(|r| r.path == "/plots/2/")
            .returning(|_| Ok(ApiResponse::new(404, r#"{"error": "Plot not found"}"#)));
        mock.expect_send()
            .withf(|r| r.path == "/plots/3/")
            .returning(|_| Ok(ApiResponse::new(500, "")));
        mock.expect_send()
            .withf(|r| r.path == "/plots/4/")
            .returning(|_| Err(TransportError("connection refused".into())));
        let client = client_with(mock, logged_in_session("tok"));

        assert!(matches!(client.get_plot(PlotId(1)), Err(ApiError::Unauthorized(_))));
        assert!(matches!(client.get_plot(PlotId(2)), Err(ApiError::NotFound(_))));
        assert_eq!(
            client.get_plot(PlotId(3)).unwrap_err(),
            ApiError::Http {
                status: 500,
                message: "<no body>".into()
            }
        );
        assert!(matches!(client.get_plot(PlotId(4)), Err(ApiError::Transport(_))));
    }

    #[test]
    fn decode_error_names_offending_field() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .returning(|_| Ok(ApiResponse::new(200, r#"[{"id": 1, "crop_variety": 5}]"#)));
        let client = client_with(mock, logged_in_session("tok"));

        match client.list_plots(None) {
            Err(ApiError::Decode(msg)) => assert!(msg.contains("crop_variety"), "{msg}"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn filtered_lists_send_query_parameters() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|r| r.path == "/plots/" && r.query_param("farm") == Some("5"))
            .times(1)
            .returning(|_| Ok(ApiResponse::new(200, "[]")));
        mock.expect_send()
            .withf(|r| r.path == "/sensor-readings/" && r.query_param("field_plot") == Some("8"))
            .times(1)
            .returning(|_| Ok(ApiResponse::new(200, r#"{"results": []}"#)));
        mock.expect_send()
            .withf(|r| r.path == "/anomalies/" && r.query_param("field_plot") == Some("8"))
            .times(1)
            .returning(|_| Ok(ApiResponse::new(200, "[]")));
        let client = client_with(mock, logged_in_session("tok"));

        assert!(client.list_plots(Some(FarmId(5))).unwrap().is_empty());
        assert!(client.list_sensor_readings(Some(PlotId(8))).unwrap().is_empty());
        assert!(client.list_anomalies(Some(PlotId(8))).unwrap().is_empty());
    }

    #[test]
    fn regenerate_passes_force_flag() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|r| {
                r.method == Method::POST
                    && r.path == "/anomalies/4/recommend/"
                    && r.body == Some(serde_json::json!({}))
            })
            .times(1)
            .returning(|_| Ok(ApiResponse::new(200, r#"{"id": 1, "recommended_action": "Water"}"#)));
        mock.expect_send()
            .withf(|r| {
                r.path == "/anomalies/4/recommend/" && r.body == Some(serde_json::json!({"force_regenerate": true}))
            })
            .times(1)
            .returning(|_| Ok(ApiResponse::new(201, r#"{"id": 2, "recommended_action": "Water more"}"#)));
        let client = client_with(mock, logged_in_session("tok"));

        let first = client.generate_recommendation(AnomalyId(4)).unwrap();
        let second = client.regenerate_recommendation(AnomalyId(4)).unwrap();
        assert_eq!(first.id, Some(RecommendationId(1)));
        assert_eq!(second.recommended_action.as_deref(), Some("Water more"));
    }

    #[test]
    fn write_endpoints_use_expected_methods_and_bodies() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|r| {
                r.method == Method::POST
                    && r.path == "/farms/"
                    && r.body == Some(serde_json::json!({"location": "Ribera", "size": 12.5, "crop_type": "grapes"}))
            })
            .times(1)
            .returning(|_| {
                Ok(ApiResponse::new(
                    201,
                    r#"{"id": 3, "owner": 1, "location": "Ribera", "size": 12.5, "crop_type": "grapes"}"#,
                ))
            });
        mock.expect_send()
            .withf(|r| r.method == Method::PUT && r.path == "/plots/9/")
            .times(1)
            .returning(|_| Ok(ApiResponse::new(200, r#"{"id": 9, "crop_variety": "Tempranillo", "farm": 3}"#)));
        mock.expect_send()
            .withf(|r| r.method == Method::DELETE && r.path == "/farms/3/" && r.body.is_none())
            .times(1)
            .returning(|_| Ok(ApiResponse::new(204, "")));
        mock.expect_send()
            .withf(|r| r.method == Method::POST && r.path == "/recommendations/12/apply/")
            .times(1)
            .returning(|_| Ok(ApiResponse::new(200, r#"{"status": "applied"}"#)));
        let client = client_with(mock, logged_in_session("tok"));

        let farm = client
            .create_farm(&FarmInput {
                location: "Ribera".into(),
                size: 12.5,
                crop_type: "grapes".into(),
            })
            .unwrap();
        assert_eq!(farm.id, FarmId(3));
        let plot = client
            .update_plot(
                PlotId(9),
                &PlotInput {
                    farm: FarmId(3),
                    crop_variety: "Tempranillo".into(),
                },
            )
            .unwrap();
        assert_eq!(plot.status, PlotStatus::Normal);
        client.delete_farm(FarmId(3)).unwrap();
        client.apply_recommendation(RecommendationId(12)).unwrap();
    }

    #[test]
    fn paginated_list_errors_keep_item_path() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send().returning(|_| {
            Ok(ApiResponse::new(
                200,
                r#"{"count": 2, "results": [{"id": 1, "crop_variety": "Syrah"}, {"id": "two", "crop_variety": "Merlot"}]}"#,
            ))
        });
        let client = client_with(mock, logged_in_session("tok"));

        match client.list_plots(None) {
            Err(ApiError::Decode(msg)) => assert!(msg.starts_with("[1].id"), "{msg}"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn read_endpoints_hit_detail_paths() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|r| r.method == Method::GET && r.path == "/auth/user/" && r.bearer.as_deref() == Some("tok"))
            .times(1)
            .returning(|_| {
                Ok(ApiResponse::new(
                    200,
                    r#"{"id": 1, "username": "ana", "email": "ana@example.org", "is_staff": true}"#,
                ))
            });
        mock.expect_send()
            .withf(|r| r.method == Method::GET && r.path == "/farms/3/")
            .times(1)
            .returning(|_| {
                Ok(ApiResponse::new(
                    200,
                    r#"{"id": 3, "location": "Ribera", "size": 12.5, "crop_type": "grapes"}"#,
                ))
            });
        mock.expect_send()
            .withf(|r| r.method == Method::GET && r.path == "/anomalies/21/")
            .times(1)
            .returning(|_| {
                Ok(ApiResponse::new(
                    200,
                    r#"{"id": 21, "anomaly_type": "soil_moisture_low", "severity": "high", "confidence_score": 0.88, "plot": 9}"#,
                ))
            });
        let client = client_with(mock, logged_in_session("tok"));

        let me = client.get_current_user().unwrap();
        assert!(me.is_staff);
        assert_eq!(me.email.as_deref(), Some("ana@example.org"));
        assert_eq!(client.get_farm(FarmId(3)).unwrap().owner, None);
        let anomaly = client.get_anomaly(AnomalyId(21)).unwrap();
        assert_eq!(anomaly.severity, Severity::High);
        assert_eq!(anomaly.plot, Some(PlotId(9)));
    }

    #[test]
    fn plot_and_reading_writes_send_json_bodies() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|r| {
                r.method == Method::POST
                    && r.path == "/plots/"
                    && r.body == Some(serde_json::json!({"farm": 3, "crop_variety": "Garnacha"}))
            })
            .times(1)
            .returning(|_| Ok(ApiResponse::new(201, r#"{"id": 10, "crop_variety": "Garnacha", "farm": 3}"#)));
        mock.expect_send()
            .withf(|r| r.method == Method::DELETE && r.path == "/plots/10/")
            .times(1)
            .returning(|_| Ok(ApiResponse::new(204, "")));
        mock.expect_send()
            .withf(|r| {
                r.method == Method::POST
                    && r.path == "/sensor-readings/"
                    && r.body == Some(serde_json::json!({"plot": 10, "sensor_type": "soil_moisture", "value": 27.5}))
            })
            .times(1)
            .returning(|_| {
                Ok(ApiResponse::new(
                    201,
                    r#"{"id": 55, "timestamp": "2025-06-01T10:00:00Z", "plot": 10, "sensor_type": "soil_moisture", "value": 27.5}"#,
                ))
            });
        let client = client_with(mock, logged_in_session("tok"));

        let plot = client
            .create_plot(&PlotInput {
                farm: FarmId(3),
                crop_variety: "Garnacha".into(),
            })
            .unwrap();
        assert_eq!(plot.id, PlotId(10));
        let reading = client
            .create_sensor_reading(&NewSensorReading {
                plot: PlotId(10),
                sensor_type: SensorType::SoilMoisture,
                value: 27.5,
                source: None,
            })
            .unwrap();
        assert_eq!(reading.id, ReadingId(55));
        client.delete_plot(PlotId(10)).unwrap();
    }

    #[test]
    fn missing_recommendations_are_an_empty_list() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|r| r.path == "/recommendations/" && r.query_param("anomaly") == Some("3"))
            .returning(|_| Ok(ApiResponse::new(404, "")));
        let client = client_with(mock, logged_in_session("tok"));

        assert!(client.list_recommendations(AnomalyId(3)).unwrap().is_empty());
    }

    #[test]
    fn login_endpoints_do_not_send_session_token() {
        let mut mock = MockHttpTransport::new();
        mock.expect_send()
            .withf(|r| {
                r.path == "/auth/login/"
                    && r.bearer.is_none()
                    && r.body == Some(serde_json::json!({"username": "ana", "password": "pw"}))
            })
            .returning(|_| Ok(ApiResponse::new(200, r#"{"access": "a", "refresh": "r"}"#)));
        mock.expect_send()
            .withf(|r| r.path == "/auth/user/" && r.bearer.as_deref() == Some("a"))
            .returning(|_| Ok(ApiResponse::new(200, r#"{"id": 1, "username": "ana"}"#)));
        mock.expect_send()
            .withf(|r| r.path == "/auth/refresh/" && r.body == Some(serde_json::json!({"refresh": "r"})))
            .returning(|_| Ok(ApiResponse::new(200, r#"{"access": "a2"}"#)));
        let client = client_with(mock, logged_in_session("stale"));

        let pair = client.obtain_token_pair("ana", "pw").unwrap();
        let profile = client.fetch_profile(&pair.access).unwrap();
        let refreshed = client.refresh_access(&pair.refresh).unwrap();
        assert_eq!(profile.username, "ana");
        assert_eq!(refreshed.access, "a2");
        assert_eq!(refreshed.refresh, None);
    }
}
