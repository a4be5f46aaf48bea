mod fetch;

use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn setup_mock_server(body: &str) -> (String, MockServer) {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/playlist.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    (format!("{}/playlist.m3u8", mock_server.uri()), mock_server)
}

trait HlsMock {
    async fn mock<S>(&self, mock_path: &str, body: S) -> &Self
    where
        S: AsRef<str>;

    async fn mock_bytes(&self, mock_path: &str, body: Vec<u8>) -> &Self;

    async fn mock_status(&self, mock_path: &str, status: u16) -> &Self;

    /// Serves `body` for the first `times` requests only. Mount the fallback afterwards.
    async fn mock_times<S>(&self, mock_path: &str, body: S, times: u64) -> &Self
    where
        S: AsRef<str>;
}

impl HlsMock for MockServer {
    async fn mock<S>(&self, mock_path: &str, body: S) -> &Self
    where
        S: AsRef<str>,
    {
        Mock::given(method("GET"))
            .and(path(mock_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.as_ref()))
            .mount(self)
            .await;
        self
    }

    async fn mock_bytes(&self, mock_path: &str, body: Vec<u8>) -> &Self {
        Mock::given(method("GET"))
            .and(path(mock_path))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(self)
            .await;
        self
    }

    async fn mock_status(&self, mock_path: &str, status: u16) -> &Self {
        Mock::given(method("GET"))
            .and(path(mock_path))
            .respond_with(ResponseTemplate::new(status))
            .mount(self)
            .await;
        self
    }

    async fn mock_times<S>(&self, mock_path: &str, body: S, times: u64) -> &Self
    where
        S: AsRef<str>,
    {
        Mock::given(method("GET"))
            .and(path(mock_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.as_ref()))
            .up_to_n_times(times)
            .mount(self)
            .await;
        self
    }
}

/// A media playlist listing `uris` with the given segment duration.
fn media_playlist(media_sequence: u64, duration: f32, uris: &[&str], closed: bool) -> String {
    let mut playlist = format!(
        "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:1\n#EXT-X-MEDIA-SEQUENCE:{media_sequence}\n"
    );
    for uri in uris {
        playlist.push_str(&format!("#EXTINF:{duration:.3},\n{uri}\n"));
    }
    if closed {
        playlist.push_str("#EXT-X-ENDLIST\n");
    }
    playlist
}
