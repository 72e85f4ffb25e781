//! Replay harness for tests

use std::path::PathBuf;

use tracing::{debug, info};

use super::{ClientOptions, ClientRequest, TestClient, DEFAULT_REPLAY_MODE};
use crate::cassette::{Cassette, Headers, RecordMode};
use crate::config::Config;
use crate::recording::{IncomingResponse, Recorder, Recorders};
use crate::settings::middleware_enabled;
use crate::{RecorderError, Result};

/// How a replay harness is set up. Exactly one of `recording_name` and
/// `recording_names` must be given.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Single recording to replay
    pub recording_name: Option<String>,
    /// Several recordings, selected with `use_recorder`
    pub recording_names: Option<Vec<String>>,
    /// Directory holding the cassettes
    pub cassettes_path: PathBuf,
    /// Outgoing record mode, `None` (strict replay) by default
    pub outgoing_record_mode: Option<RecordMode>,
    /// Client options, follow + secure by default
    pub client_options: Option<ClientOptions>,
    /// Recorded headers forwarded to the client
    pub client_headers: Vec<String>,
    /// Recorder configuration
    pub config: Config,
}

impl ReplayOptions {
    /// Replay a single recording
    pub fn single(recording_name: impl Into<String>, cassettes_path: impl Into<PathBuf>) -> Self {
        Self {
            recording_name: Some(recording_name.into()),
            cassettes_path: cassettes_path.into(),
            ..Self::default()
        }
    }

    /// Replay several recordings in sequence
    pub fn multiple<I, S>(recording_names: I, cassettes_path: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            recording_names: Some(recording_names.into_iter().map(Into::into).collect()),
            cassettes_path: cassettes_path.into(),
            ..Self::default()
        }
    }

    /// Override the outgoing record mode
    #[must_use]
    pub fn with_record_mode(mut self, mode: RecordMode) -> Self {
        self.outgoing_record_mode = Some(mode);
        self
    }

    /// Override the client options
    #[must_use]
    pub fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.client_options = Some(options);
        self
    }

    /// Forward these recorded headers to the client
    #[must_use]
    pub fn with_client_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.client_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Use an explicit recorder configuration
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }
}

/// Replays recorded incoming requests against the system under test, with
/// its outgoing calls served from the matching outgoing cassette
#[derive(Debug)]
pub struct ReplayHarness {
    recorder: Option<Recorder>,
    recorders: Option<Recorders>,
    client_options: ClientOptions,
    client_headers: Vec<String>,
}

impl ReplayHarness {
    /// Build the harness.
    ///
    /// `active_middleware` is the framework's middleware list; replaying
    /// with the recording middleware active would re-record instead.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the recording middleware is active, or if
    /// not exactly one of `recording_name` / `recording_names` is set
    pub fn set_up<S: AsRef<str>>(options: ReplayOptions, active_middleware: &[S]) -> Result<Self> {
        if middleware_enabled(active_middleware) {
            return Err(RecorderError::ConfigError(
                "recording middleware is active; disable it to replay".to_string(),
            ));
        }

        let mode = options.outgoing_record_mode.unwrap_or(DEFAULT_REPLAY_MODE);

        let (recorder, recorders) = match (options.recording_name, options.recording_names) {
            (Some(name), None) => (
                Some(Recorder::with_config(
                    name,
                    options.cassettes_path,
                    mode,
                    &options.config,
                )),
                None,
            ),
            (None, Some(names)) => (
                None,
                Some(Recorders::with_config(
                    names,
                    &options.cassettes_path,
                    mode,
                    &options.config,
                )),
            ),
            _ => {
                return Err(RecorderError::ConfigError(
                    "set exactly one of recording_name or recording_names".to_string(),
                ))
            }
        };

        debug!("Replay harness ready (outgoing record mode: {})", mode);

        Ok(Self {
            recorder,
            recorders,
            client_options: options.client_options.unwrap_or_default(),
            client_headers: options.client_headers,
        })
    }

    /// Recorder currently in use
    #[must_use]
    pub fn recorder(&self) -> Option<&Recorder> {
        self.recorder.as_ref()
    }

    /// Switch to the recorder at `index` of a multi-recording setup
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the harness was built for a single recording
    /// or `index` is out of range
    pub fn use_recorder(&mut self, index: usize) -> Result<()> {
        let recorders = self.recorders.as_ref().ok_or_else(|| {
            RecorderError::ConfigError("harness was set up with a single recording".to_string())
        })?;
        let recorder = recorders.get(index).ok_or_else(|| {
            RecorderError::ConfigError(format!(
                "no recording at index {index} ({} configured)",
                recorders.len()
            ))
        })?;

        self.recorder = Some(recorder.clone());
        Ok(())
    }

    /// Replay the stored incoming request through `client` and check the
    /// status code. Outgoing calls made meanwhile are answered from the
    /// outgoing cassette.
    ///
    /// Returns the response and the outgoing cassette after the call, for
    /// assertions such as [`Cassette::all_played`].
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedStatus` if the status differs from
    /// `expected_status_code`, `MissingHeader` if a forwarded header was not
    /// recorded, and any error from loading cassettes or the client
    pub fn receive_incoming_request<C: TestClient>(
        &self,
        client: &mut C,
        expected_status_code: u16,
    ) -> Result<(C::Response, Cassette)> {
        let recorder = self.recorder.as_ref().ok_or_else(|| {
            RecorderError::ConfigError("no recorder selected; call use_recorder first".to_string())
        })?;

        let incoming = recorder.load_incoming_interaction()?;
        let content_type = incoming.content_type().map(str::to_string);

        let headers = self
            .client_headers
            .iter()
            .map(|name| {
                incoming
                    .headers
                    .get(name)
                    .map(|value| (name.clone(), value.clone()))
                    .ok_or_else(|| RecorderError::MissingHeader(name.clone()))
            })
            .collect::<Result<Headers>>()?;

        info!(
            "Replaying '{}': {} {}",
            recorder.recording_name(),
            incoming.method,
            incoming.uri
        );

        let session = recorder.use_outgoing_cassette()?;
        let response = client.generic(ClientRequest {
            method: incoming.method,
            uri: incoming.uri,
            body: incoming.body,
            content_type,
            headers,
            options: self.client_options,
        })?;

        let status = response.status_code();
        if status != expected_status_code {
            return Err(RecorderError::UnexpectedStatus {
                expected: expected_status_code,
                actual: status,
            });
        }

        let cassette = session.finish()?;
        Ok((response, cassette))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::MIDDLEWARE_NAME;

    const NO_MIDDLEWARE: [&str; 0] = [];

    #[test]
    fn test_rejects_active_middleware() {
        let options = ReplayOptions::single("0_test", "/tmp");

        let result = ReplayHarness::set_up(options, &[MIDDLEWARE_NAME]);

        assert!(matches!(result, Err(RecorderError::ConfigError(_))));
    }

    #[test]
    fn test_requires_exactly_one_name_source() {
        let neither = ReplayOptions::default();
        assert!(ReplayHarness::set_up(neither, &NO_MIDDLEWARE).is_err());

        let both = ReplayOptions {
            recording_name: Some("a".to_string()),
            recording_names: Some(vec!["b".to_string()]),
            ..ReplayOptions::default()
        };
        assert!(ReplayHarness::set_up(both, &NO_MIDDLEWARE).is_err());
    }

    #[test]
    fn test_defaults() {
        let harness =
            ReplayHarness::set_up(ReplayOptions::single("0_test", "/tmp"), &NO_MIDDLEWARE)
                .unwrap();

        let recorder = harness.recorder().unwrap();
        assert_eq!(recorder.outgoing_record_mode(), RecordMode::None);
        assert_eq!(harness.client_options, ClientOptions::default());
        assert!(harness.client_options.follow && harness.client_options.secure);
    }

    #[test]
    fn test_use_recorder() {
        let options = ReplayOptions::multiple(["0_flow", "1_flow"], "/tmp")
            .with_record_mode(RecordMode::NewEpisodes);
        let mut harness = ReplayHarness::set_up(options, &NO_MIDDLEWARE).unwrap();
        assert!(harness.recorder().is_none());

        harness.use_recorder(1).unwrap();
        let recorder = harness.recorder().unwrap();
        assert_eq!(recorder.recording_name(), "1_flow");
        assert_eq!(recorder.outgoing_record_mode(), RecordMode::NewEpisodes);

        assert!(harness.use_recorder(2).is_err());
    }

    #[test]
    fn test_use_recorder_single_fails() {
        let mut harness =
            ReplayHarness::set_up(ReplayOptions::single("0_test", "/tmp"), &NO_MIDDLEWARE)
                .unwrap();

        assert!(harness.use_recorder(0).is_err());
    }
}
