//! Recording middleware: one incoming and one outgoing cassette per request

use tracing::{debug, info};

use crate::cassette::RecordMode;
use crate::config::Config;
use crate::recording::{IncomingRequest, IncomingResponse, Recorder};
use crate::settings::Settings;
use crate::Result;

/// Name under which the middleware is registered in a middleware list
pub const MIDDLEWARE_NAME: &str = "test_recorder::RecorderMiddleware";

/// The rest of the request pipeline
pub trait Handler<Req> {
    /// Response produced by the pipeline
    type Response;

    /// Process a request
    fn handle(&mut self, request: &Req) -> Self::Response;
}

impl<F, Req, Resp> Handler<Req> for F
where
    F: FnMut(&Req) -> Resp,
{
    type Response = Resp;

    fn handle(&mut self, request: &Req) -> Resp {
        self(request)
    }
}

/// Middleware recording every request it sees.
///
/// Request `n` (counting from 0 over the lifetime of the instance) is
/// recorded as `<n>_<recording name>_incoming.json` and
/// `<n>_<recording name>_outgoing.json` in the configured cassettes
/// directory. Settings are re-read on every request.
pub struct RecorderMiddleware<H> {
    get_response: H,
    settings: Settings,
    config: Config,
    index: usize,
    recorder: Option<Recorder>,
}

impl<H> RecorderMiddleware<H> {
    /// Wrap `get_response`
    pub fn new(get_response: H, settings: Settings) -> Self {
        Self {
            get_response,
            settings,
            config: Config::default(),
            index: 0,
            recorder: None,
        }
    }

    /// Use an explicit recorder configuration
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Index the next request will be recorded under
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Recorder used for the most recent request
    #[must_use]
    pub fn recorder(&self) -> Option<&Recorder> {
        self.recorder.as_ref()
    }

    /// Handle a request, recording outgoing calls made while processing it
    /// and then the request/response pair itself. The response is returned
    /// unchanged.
    ///
    /// The index advances even when recording fails.
    ///
    /// # Errors
    ///
    /// Returns error if the settings cannot be read or a cassette cannot be
    /// loaded or saved
    pub fn call<Req>(&mut self, request: &Req) -> Result<H::Response>
    where
        Req: IncomingRequest,
        H: Handler<Req>,
        H::Response: IncomingResponse,
    {
        let index = self.index;
        self.index += 1;

        let recording_name = format!("{index}_{}", self.settings.recording_name()?);
        let recorder = self.recorder.insert(Recorder::with_config(
            recording_name,
            self.settings.cassettes_path()?,
            RecordMode::All,
            &self.config,
        ));

        debug!(
            "Recording {} {} as '{}'",
            request.http_method(),
            request.raw_uri(),
            recorder.recording_name()
        );

        let session = recorder.use_outgoing_cassette()?;
        let response = self.get_response.handle(request);
        let outgoing = session.finish()?;

        recorder.save_incoming_interaction(request, &response)?;

        info!(
            "Recorded '{}': status {}, {} outgoing interactions",
            recorder.recording_name(),
            response.status_code(),
            outgoing.len()
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::{Cassette, RecordingClient, RequestRecord, ResponseRecord, Transport};
    use bytes::Bytes;
    use hyper::{Request, Response};
    use tempfile::TempDir;

    fn request(path: &str) -> Request<Bytes> {
        Request::builder()
            .uri(path)
            .header("Host", "testserver")
            .body(Bytes::new())
            .unwrap()
    }

    fn ok(_: &Request<Bytes>) -> Response<Bytes> {
        Response::builder()
            .status(200)
            .body(Bytes::from_static(b"ok"))
            .unwrap()
    }

    fn settings(temp_dir: &TempDir) -> Settings {
        let settings = Settings::new(temp_dir.path());
        std::fs::create_dir_all(settings.default_cassettes_path()).unwrap();
        settings
    }

    #[test]
    fn test_index_names_cassettes() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(&temp_dir);
        let cassettes = settings.default_cassettes_path();
        let mut middleware = RecorderMiddleware::new(ok, settings);

        middleware.call(&request("/one")).unwrap();
        middleware.call(&request("/two")).unwrap();

        assert_eq!(middleware.index(), 2);
        assert!(cassettes.join("0_test_incoming.json").exists());
        assert!(cassettes.join("1_test_incoming.json").exists());
        assert_eq!(middleware.recorder().unwrap().recording_name(), "1_test");
    }

    #[test]
    fn test_recording_name_read_per_request() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(&temp_dir);
        let cassettes = settings.default_cassettes_path();
        let mut middleware = RecorderMiddleware::new(ok, settings.clone());

        middleware.call(&request("/one")).unwrap();
        settings.set_recording_name("signup").unwrap();
        middleware.call(&request("/two")).unwrap();

        assert!(cassettes.join("0_test_incoming.json").exists());
        assert!(cassettes.join("1_signup_incoming.json").exists());
    }

    #[test]
    fn test_index_advances_after_failure() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::new(temp_dir.path());
        settings
            .set_cassettes_path(temp_dir.path().join("missing"))
            .unwrap();
        let mut middleware = RecorderMiddleware::new(ok, settings.clone());

        assert!(middleware.call(&request("/one")).is_err());

        let cassettes = temp_dir.path().join("cassettes");
        std::fs::create_dir_all(&cassettes).unwrap();
        settings.set_cassettes_path(&cassettes).unwrap();
        middleware.call(&request("/two")).unwrap();

        assert!(cassettes.join("1_test_incoming.json").exists());
        assert!(!cassettes.join("0_test_incoming.json").exists());
    }

    #[test]
    fn test_outgoing_calls_recorded() {
        let temp_dir = TempDir::new().unwrap();
        let settings = settings(&temp_dir);
        let cassettes = settings.default_cassettes_path();
        let upstream = |_: &RequestRecord| -> Result<ResponseRecord> {
            Ok(ResponseRecord::new(200, "OK").with_body(&b"up"[..]))
        };
        let client = RecordingClient::new(upstream);

        let handler = |_: &Request<Bytes>| {
            let upstream = client
                .send(&RequestRecord::new("GET", "http://api.example.com/rates?cur=EUR"))
                .unwrap();
            Response::builder()
                .status(200)
                .body(upstream.body)
                .unwrap()
        };
        let mut middleware = RecorderMiddleware::new(handler, settings);

        let response = middleware.call(&request("/quote")).unwrap();
        assert_eq!(&response.body()[..], b"up");

        let outgoing =
            Cassette::open(cassettes.join("0_test_outgoing.json"), RecordMode::None).unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(
            outgoing.interactions()[0].request.uri,
            "http://api.example.com/rates?cur=EUR"
        );
    }
}
