use crate::error::ClientError;
use crate::models::{ApiResponse, IgnoredMessage, RatingKind, Track};
use crate::services::proxy;
use crate::services::RemoteClient;
use chrono::Utc;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://ws.audioscrobbler.com/2.0/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking client for the Last.fm 2.0 web service.
#[derive(Debug, Clone)]
pub struct LastfmClient {
    base_url: String,
    api_key: String,
    api_secret: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: u32,
    #[serde(default)]
    message: String,
}

impl LastfmClient {
    pub fn new(api_key: String, api_secret: String) -> Result<Self, ClientError> {
        Self::with_base_url(DEFAULT_API_URL.to_string(), api_key, api_secret)
    }

    pub fn with_base_url(
        base_url: String,
        api_key: String,
        api_secret: String,
    ) -> Result<Self, ClientError> {
        let mut builder = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("scrobble-relay/", env!("CARGO_PKG_VERSION")));

        if let Some(url) = proxy::proxy() {
            let proxy = reqwest::Proxy::all(&url)
                .map_err(|e| ClientError::Transport(format!("Invalid proxy {}: {}", url, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::from_parts(base_url, api_key, api_secret, client))
    }

    fn from_parts(base_url: String, api_key: String, api_secret: String, client: Client) -> Self {
        Self {
            base_url,
            api_key,
            api_secret,
            client,
        }
    }

    /// md5 over every `key` + `value` pair sorted by key, followed by the secret.
    /// `format` and `callback` are not part of the signature.
    fn sign(&self, params: &[(String, String)]) -> String {
        let mut sorted: Vec<&(String, String)> = params
            .iter()
            .filter(|(key, _)| key != "format" && key != "callback")
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut payload = String::new();
        for (key, value) in sorted {
            payload.push_str(key);
            payload.push_str(value);
        }
        payload.push_str(&self.api_secret);

        format!("{:x}", md5::compute(payload))
    }

    fn build_params(
        &self,
        method: &str,
        session_key: &str,
        additional: Vec<(&str, String)>,
    ) -> Vec<(String, String)> {
        let mut params = vec![
            ("method".to_string(), method.to_string()),
            ("api_key".to_string(), self.api_key.clone()),
            ("sk".to_string(), session_key.to_string()),
        ];

        for (key, value) in additional {
            params.push((key.to_string(), value));
        }

        let api_sig = self.sign(&params);
        params.push(("api_sig".to_string(), api_sig));
        params.push(("format".to_string(), "json".to_string()));

        params
    }

    fn call(
        &self,
        method: &str,
        session_key: &str,
        additional: Vec<(&str, String)>,
    ) -> Result<ApiResponse, ClientError> {
        let params = self.build_params(method, session_key, additional);

        tracing::debug!("Calling Last.fm: {} {}", self.base_url, method);

        let response = self
            .client
            .post(&self.base_url)
            .form(&params)
            .send()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| ClientError::Transport(format!("Failed to read response: {}", e)))?;

        tracing::debug!(
            "Last.fm response ({}): {}",
            status,
            truncate(&body, 500)
        );

        parse_response(status, &body)
    }

    fn rate(&self, kind: RatingKind, session_key: &str, track: &Track) -> Result<ApiResponse, ClientError> {
        check_track(track)?;
        self.call(
            kind.method(),
            session_key,
            vec![("artist", track.artist.clone()), ("track", track.title.clone())],
        )
    }
}

impl RemoteClient for LastfmClient {
    fn now_playing(&self, session_key: &str, track: &Track) -> Result<ApiResponse, ClientError> {
        check_track(track)?;
        self.call("track.updateNowPlaying", session_key, track_params(track))
    }

    fn scrobble(&self, session_key: &str, track: &Track) -> Result<ApiResponse, ClientError> {
        check_track(track)?;
        let timestamp = track
            .timestamp
            .ok_or_else(|| ClientError::InvalidTrack(format!("{}: missing timestamp", track)))?;
        if timestamp > Utc::now() {
            return Err(ClientError::InvalidTrack(format!(
                "{}: timestamp {} is in the future",
                track, timestamp
            )));
        }

        let mut params = track_params(track);
        params.push(("timestamp", timestamp.timestamp().to_string()));
        self.call("track.scrobble", session_key, params)
    }

    fn love(&self, session_key: &str, track: &Track) -> Result<ApiResponse, ClientError> {
        self.rate(RatingKind::Love, session_key, track)
    }

    fn unlove(&self, session_key: &str, track: &Track) -> Result<ApiResponse, ClientError> {
        self.rate(RatingKind::Unlove, session_key, track)
    }

    fn ban(&self, session_key: &str, track: &Track) -> Result<ApiResponse, ClientError> {
        self.rate(RatingKind::Ban, session_key, track)
    }

    fn unban(&self, session_key: &str, track: &Track) -> Result<ApiResponse, ClientError> {
        self.rate(RatingKind::Unban, session_key, track)
    }
}

fn check_track(track: &Track) -> Result<(), ClientError> {
    if track.artist.trim().is_empty() || track.title.trim().is_empty() {
        return Err(ClientError::InvalidTrack(
            "artist and title must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn track_params(track: &Track) -> Vec<(&'static str, String)> {
    let mut params = vec![("artist", track.artist.clone()), ("track", track.title.clone())];
    if let Some(album) = &track.album {
        params.push(("album", album.clone()));
    }
    if let Some(duration) = track.duration {
        params.push(("duration", duration.to_string()));
    }
    params
}

/// Maps a raw HTTP response onto the remote-call contract: service errors
/// become an `ApiResponse` carrying the error, anything unreadable is a
/// `ClientError`.
fn parse_response(status: u16, body: &str) -> Result<ApiResponse, ClientError> {
    // Last.fm sends its error envelope with 4xx statuses too
    if let Ok(err) = serde_json::from_str::<ErrorBody>(body) {
        return Ok(ApiResponse::api_error(err.error, err.message));
    }

    if !(200..300).contains(&status) {
        tracing::error!("Last.fm API error: {} - {}", status, body);
        return Err(ClientError::Status {
            status,
            body: body.to_string(),
        });
    }

    let value: Value = serde_json::from_str(body).map_err(|e| {
        ClientError::Decode(format!(
            "{} - Response: {}",
            e,
            truncate(body, 200)
        ))
    })?;

    Ok(ApiResponse {
        error: None,
        ignored: ignored_message(&value),
    })
}

/// Cuts `text` to at most `max` characters for logging.
fn truncate(text: &str, max: usize) -> &str {
    text.char_indices()
        .nth(max)
        .map_or(text, |(idx, _)| &text[..idx])
}

fn ignored_message(value: &Value) -> Option<IgnoredMessage> {
    let item = match &value["scrobbles"]["scrobble"] {
        Value::Array(items) => items.first(),
        Value::Object(_) => Some(&value["scrobbles"]["scrobble"]),
        _ => value.get("nowplaying"),
    }?;

    let ignored = item.get("ignoredMessage")?;
    let code = match &ignored["code"] {
        Value::String(s) => s.parse().ok()?,
        Value::Number(n) => u32::try_from(n.as_u64()?).ok()?,
        _ => return None,
    };
    if code == 0 {
        return None;
    }

    Some(IgnoredMessage {
        code,
        message: ignored["#text"].as_str().unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn client() -> LastfmClient {
        LastfmClient::new("KEY".to_string(), "SECRET".to_string()).unwrap()
    }

    /// Client pointed at `base_url`, ignoring any proxy from the environment.
    fn local_client(base_url: String) -> LastfmClient {
        let http = Client::builder().no_proxy().build().unwrap();
        LastfmClient::from_parts(base_url, "KEY".to_string(), "SECRET".to_string(), http)
    }

    fn url_decode(s: &str) -> String {
        let bytes = s.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'+' => {
                    out.push(b' ');
                    i += 1;
                }
                b'%' if i + 2 < bytes.len() => {
                    out.push(u8::from_str_radix(&s[i + 1..i + 3], 16).unwrap());
                    i += 3;
                }
                b => {
                    out.push(b);
                    i += 1;
                }
            }
        }
        String::from_utf8(out).unwrap()
    }

    /// Answers a single HTTP request with `status` and a JSON `body`, and
    /// hands back the form fields the request carried.
    fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, thread::JoinHandle<Vec<(String, String)>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/2.0/", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];

            let body_start = loop {
                let n = stream.read(&mut buf).unwrap();
                assert!(n > 0, "connection closed before headers");
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let headers = String::from_utf8_lossy(&request[..body_start]).to_ascii_lowercase();
            let length: usize = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map(|v| v.trim().parse().unwrap())
                .unwrap_or(0);
            while request.len() < body_start + length {
                let n = stream.read(&mut buf).unwrap();
                assert!(n > 0, "connection closed before body");
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();

            let form = String::from_utf8(request[body_start..body_start + length].to_vec()).unwrap();
            form.split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (url_decode(key), url_decode(value))
                })
                .collect()
        });

        (base_url, handle)
    }

    fn field<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_signature_sorts_params_and_skips_format() {
        let client = client();
        let params = vec![
            ("method".to_string(), "track.love".to_string()),
            ("track".to_string(), "Words".to_string()),
            ("format".to_string(), "json".to_string()),
            ("api_key".to_string(), "KEY".to_string()),
            ("sk".to_string(), "SESSION".to_string()),
            ("artist".to_string(), "Low".to_string()),
        ];

        // md5("api_keyKEYartistLowmethodtrack.loveskSESSIONtrackWordsSECRET")
        assert_eq!(client.sign(&params), "17e6ad7c783c40b4991149732625b559");
    }

    #[test]
    fn test_build_params_appends_signature_and_format() {
        let client = client();
        let params = client.build_params(
            "track.love",
            "SESSION",
            vec![("artist", "Low".to_string()), ("track", "Words".to_string())],
        );

        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("method"), Some("track.love"));
        assert_eq!(get("sk"), Some("SESSION"));
        assert_eq!(get("format"), Some("json"));
        assert_eq!(get("api_sig"), Some("17e6ad7c783c40b4991149732625b559"));
    }

    #[test]
    fn test_parse_service_error_is_not_a_local_failure() {
        let response = parse_response(403, r#"{"error":9,"message":"Invalid session key"}"#).unwrap();
        assert_eq!(response.error.as_ref().map(|e| e.code), Some(9));
        assert_eq!(response.error.unwrap().message, "Invalid session key");
    }

    #[test]
    fn test_parse_non_json_error_status() {
        let err = parse_response(503, "<html>Service Unavailable</html>").unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 503, .. }));
    }

    #[test]
    fn test_parse_garbage_success_body() {
        let err = parse_response(200, "not json").unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn test_parse_ignored_scrobble() {
        let body = r##"{"scrobbles":{"@attr":{"accepted":0,"ignored":1},
            "scrobble":{"track":{"#text":"Words"},
            "ignoredMessage":{"code":"3","#text":"Timestamp too old"}}}}"##;
        let response = parse_response(200, body).unwrap();
        assert!(response.is_ok());
        assert_eq!(
            response.ignored,
            Some(IgnoredMessage {
                code: 3,
                message: "Timestamp too old".to_string()
            })
        );
    }

    #[test]
    fn test_parse_accepted_now_playing() {
        let body = r##"{"nowplaying":{"track":{"#text":"Words"},
            "ignoredMessage":{"code":"0","#text":""}}}"##;
        assert_eq!(parse_response(200, body).unwrap(), ApiResponse::ok());
        assert_eq!(parse_response(200, "{}").unwrap(), ApiResponse::ok());
    }

    #[test]
    fn test_scrobble_posts_signed_form() {
        let (base_url, server) = serve_once(
            "200 OK",
            r##"{"scrobbles":{"@attr":{"accepted":1,"ignored":0},
                "scrobble":{"track":{"#text":"Words"},"ignoredMessage":{"code":"0","#text":""}}}}"##,
        );
        let client = local_client(base_url);
        let track = Track::new("Low", "Words")
            .with_album("I Could Live in Hope")
            .with_duration(331)
            .played_at(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());

        let response = client.scrobble("SESSION", &track).unwrap();
        assert_eq!(response, ApiResponse::ok());

        let form = server.join().unwrap();
        assert_eq!(field(&form, "method"), Some("track.scrobble"));
        assert_eq!(field(&form, "artist"), Some("Low"));
        assert_eq!(field(&form, "track"), Some("Words"));
        assert_eq!(field(&form, "album"), Some("I Could Live in Hope"));
        assert_eq!(field(&form, "duration"), Some("331"));
        assert_eq!(field(&form, "timestamp"), Some("1709294400"));
        assert_eq!(field(&form, "sk"), Some("SESSION"));
        assert_eq!(field(&form, "api_key"), Some("KEY"));
        assert_eq!(field(&form, "format"), Some("json"));

        let unsigned: Vec<(String, String)> = form
            .iter()
            .filter(|(k, _)| k != "api_sig")
            .cloned()
            .collect();
        assert_eq!(field(&form, "api_sig"), Some(client.sign(&unsigned).as_str()));
    }

    #[test]
    fn test_love_reports_service_error() {
        let (base_url, server) = serve_once(
            "403 Forbidden",
            r#"{"error":9,"message":"Invalid session key - Please re-authenticate"}"#,
        );
        let client = local_client(base_url);
        let track = Track::new("Low", "Lullaby").with_album("I Could Live in Hope");

        let response = client.love("STALE", &track).unwrap();
        assert_eq!(
            response.error.map(|e| e.code),
            Some(9)
        );

        let form = server.join().unwrap();
        assert_eq!(field(&form, "method"), Some("track.love"));
        assert_eq!(field(&form, "sk"), Some("STALE"));
        // Ratings only carry artist and title
        assert_eq!(field(&form, "album"), None);
        assert_eq!(field(&form, "timestamp"), None);
    }

    #[test]
    fn test_unreachable_service_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/2.0/", listener.local_addr().unwrap());
        drop(listener);

        let err = local_client(base_url)
            .now_playing("SESSION", &Track::new("Low", "Words"))
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[test]
    fn test_future_scrobble_is_rejected_before_sending() {
        // Nothing listens here; the request must never be attempted
        let client = local_client("http://127.0.0.1:9/2.0/".to_string());
        let track = Track::new("Low", "Words").played_at(Utc::now() + ChronoDuration::hours(1));

        let err = client.scrobble("SESSION", &track).unwrap_err();
        match err {
            ClientError::InvalidTrack(msg) => assert!(msg.contains("in the future")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("Sigur Rós", 8), "Sigur Ró");
        assert_eq!(truncate("short", 200), "short");
    }

    #[test]
    fn test_scrobble_without_timestamp_is_rejected_before_sending() {
        let client = client();
        let err = client
            .scrobble("SESSION", &Track::new("Low", "Words"))
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidTrack(_)));

        let err = client.love("SESSION", &Track::new("", "Words")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidTrack(_)));
    }
}
