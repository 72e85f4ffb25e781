//! In-memory cassette with load/save and playback bookkeeping

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{
    requests_match, CassetteFile, HeaderFilter, Interaction, MatchField, RecordMode,
    RequestRecord, ResponseRecord, Transport, CASSETTE_VERSION, DEFAULT_MATCH_ON,
};
use crate::{RecorderError, Result};

/// Transform applied to every response before it is recorded
pub type BeforeRecordResponse = fn(ResponseRecord) -> Result<ResponseRecord>;

/// A cassette file and the interactions it holds
#[derive(Debug, Clone)]
pub struct Cassette {
    path: PathBuf,
    record_mode: RecordMode,
    match_on: Vec<MatchField>,
    header_filter: HeaderFilter,
    before_record_response: Option<BeforeRecordResponse>,
    interactions: Vec<Interaction>,
    play_counts: Vec<usize>,
    existed: bool,
    dirty: bool,
}

impl Cassette {
    /// Create an empty cassette that will be written to `path`
    pub fn new(path: impl Into<PathBuf>, record_mode: RecordMode) -> Self {
        Self {
            path: path.into(),
            record_mode,
            match_on: DEFAULT_MATCH_ON.to_vec(),
            header_filter: HeaderFilter::default(),
            before_record_response: None,
            interactions: Vec::new(),
            play_counts: Vec::new(),
            existed: false,
            dirty: false,
        }
    }

    /// Load a cassette, starting empty if the file does not exist yet
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: impl Into<PathBuf>, record_mode: RecordMode) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("Cassette {} not found, starting empty", path.display());
            return Ok(Self::new(path, record_mode));
        }

        Self::open(path, record_mode)
    }

    /// Load a cassette that must already exist
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing, unreadable or malformed
    pub fn open(path: impl Into<PathBuf>, record_mode: RecordMode) -> Result<Self> {
        let path = path.into();
        let content = fs::read_to_string(&path)?;
        let file: CassetteFile = serde_json::from_str(&content)?;

        debug!(
            "Loaded cassette {} ({} interactions)",
            path.display(),
            file.interactions.len()
        );

        let mut cassette = Self::new(path, record_mode);
        cassette.play_counts = vec![0; file.interactions.len()];
        cassette.interactions = file.interactions;
        cassette.existed = true;
        Ok(cassette)
    }

    /// Set the request components used for matching
    #[must_use]
    pub fn with_match_on(mut self, match_on: Vec<MatchField>) -> Self {
        self.match_on = match_on;
        self
    }

    /// Set the headers stripped from recorded requests
    #[must_use]
    pub fn with_header_filter(mut self, header_filter: HeaderFilter) -> Self {
        self.header_filter = header_filter;
        self
    }

    /// Set a transform applied to responses before they are recorded
    #[must_use]
    pub fn with_before_record_response(mut self, hook: BeforeRecordResponse) -> Self {
        self.before_record_response = Some(hook);
        self
    }

    /// Cassette file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record mode
    #[must_use]
    pub fn record_mode(&self) -> RecordMode {
        self.record_mode
    }

    /// Matching rule
    #[must_use]
    pub fn match_on(&self) -> &[MatchField] {
        &self.match_on
    }

    /// Number of interactions
    #[must_use]
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether the cassette holds no interactions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Interactions in recording order
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Recorded requests in order
    pub fn requests(&self) -> impl Iterator<Item = &RequestRecord> {
        self.interactions.iter().map(|i| &i.request)
    }

    /// Recorded responses in order
    pub fn responses(&self) -> impl Iterator<Item = &ResponseRecord> {
        self.interactions.iter().map(|i| &i.response)
    }

    /// Total number of responses played back
    #[must_use]
    pub fn play_count(&self) -> usize {
        self.play_counts.iter().sum()
    }

    /// Whether every recorded interaction has been played back
    #[must_use]
    pub fn all_played(&self) -> bool {
        self.play_counts.iter().all(|count| *count > 0)
    }

    /// Whether the file existed when the cassette was loaded
    #[must_use]
    pub fn existed(&self) -> bool {
        self.existed
    }

    /// Whether there are interactions not yet written to disk
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether new interactions may not be recorded
    #[must_use]
    pub fn write_protected(&self) -> bool {
        match self.record_mode {
            RecordMode::None => true,
            RecordMode::Once => self.existed,
            RecordMode::All | RecordMode::NewEpisodes => false,
        }
    }

    /// Record an interaction.
    ///
    /// Excluded headers are stripped from the request and the response goes
    /// through the before-record transform.
    ///
    /// # Errors
    ///
    /// Returns error if the before-record transform fails
    pub fn append(&mut self, mut request: RequestRecord, response: ResponseRecord) -> Result<()> {
        self.header_filter.scrub(&mut request);
        let response = match self.before_record_response {
            Some(hook) => hook(response)?,
            None => response,
        };

        debug!(
            "Recording {} {} -> {} in {}",
            request.method,
            request.uri,
            response.status.code,
            self.path.display()
        );

        self.interactions.push(Interaction { request, response });
        self.play_counts.push(0);
        self.dirty = true;
        Ok(())
    }

    /// Whether a recorded response is available for `request`
    #[must_use]
    pub fn can_play(&self, request: &RequestRecord) -> bool {
        self.unplayed_match(request).is_some()
    }

    /// Play back the first unplayed interaction matching `request`. Each
    /// interaction plays at most once; nothing plays in `All` mode.
    pub fn play(&mut self, request: &RequestRecord) -> Option<ResponseRecord> {
        let index = self.unplayed_match(request)?;
        self.play_counts[index] += 1;
        debug!("Playing back {} {} from {}", request.method, request.uri, self.path.display());
        Some(self.interactions[index].response.clone())
    }

    fn unplayed_match(&self, request: &RequestRecord) -> Option<usize> {
        if self.record_mode == RecordMode::All {
            return None;
        }

        self.interactions
            .iter()
            .zip(&self.play_counts)
            .position(|(interaction, count)| {
                *count == 0 && requests_match(&interaction.request, request, &self.match_on)
            })
    }

    /// Answer an outgoing request: play it back if possible, otherwise send
    /// it through `transport` and record the result.
    ///
    /// # Errors
    ///
    /// Returns `UnmatchedRequest` if nothing matches and the cassette is
    /// write protected, or any transport error
    pub fn respond(
        &mut self,
        request: RequestRecord,
        transport: &dyn Transport,
    ) -> Result<ResponseRecord> {
        if let Some(response) = self.play(&request) {
            return Ok(response);
        }

        if self.write_protected() {
            warn!(
                "No match for {} {} in {} (record mode: {})",
                request.method,
                request.uri,
                self.path.display(),
                self.record_mode
            );
            return Err(RecorderError::UnmatchedRequest {
                method: request.method,
                uri: request.uri,
                mode: self.record_mode,
            });
        }

        let response = transport.send(&request)?;
        self.append(request, response.clone())?;
        Ok(response)
    }

    /// Write the cassette to disk if it has new interactions, or always when
    /// `force` is set. The parent directory must exist.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails
    pub fn save(&mut self, force: bool) -> Result<()> {
        if !force && !self.dirty {
            return Ok(());
        }

        let file = CassetteFile {
            interactions: self.interactions.clone(),
            version: CASSETTE_VERSION,
            record_mode: Some(self.record_mode),
            match_on: self.match_on.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, content)?;
        self.dirty = false;

        info!(
            "Saved cassette {} ({} interactions)",
            self.path.display(),
            self.interactions.len()
        );
        Ok(())
    }
}
