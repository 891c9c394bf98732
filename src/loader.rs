//! The loader façade: lines in, projected tuples out.

use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::{Schema, SchemaRef};
use thiserror::Error;
use tracing::debug;

use crate::arrow::{BatchError, TupleBatchBuilder};
use crate::config::ConfigurationError;
use crate::line::{LineSource, ScanStats, SourceError};
use crate::projection::{ProjectionError, ProjectionSpec, TupleProjector};
use crate::protobuf::{translate, RecordDecoder, SchemaError};
use crate::registry::{RecordType, TypeRegistry};
use crate::tuple::Tuple;

/// Errors surfaced by [`B64LineLoader`].
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("batch error: {0}")]
    Batch(#[from] BatchError),
}

/// Lifecycle of a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    /// Record type bound, no line read yet. The projection may still change.
    TypeBound,
    /// At least one line has been requested.
    Reading,
    /// End of input or a fatal error. No more tuples will be produced.
    Done,
}

/// Loads base64 line-encoded protobuf records from a [`LineSource`].
///
/// Each call to [`next_tuple`](Self::next_tuple) reads lines until one
/// decodes, then returns the projection of that record. Lines that fail to
/// decode are reported to the source and skipped; the source decides when
/// too many have been skipped.
pub struct B64LineLoader<S> {
    source: S,
    decoder: RecordDecoder,
    spec: Option<ProjectionSpec>,
    projector: Option<TupleProjector>,
    schema: Option<SchemaRef>,
    state: LoaderState,
}

impl<S: LineSource> B64LineLoader<S> {
    pub fn new(record_type: RecordType, source: S) -> Self {
        debug!(record_type = record_type.name(), "loader bound to record type");
        Self {
            source,
            decoder: RecordDecoder::new(record_type),
            spec: None,
            projector: None,
            schema: None,
            state: LoaderState::TypeBound,
        }
    }

    /// Resolve `type_name` through `registry` and bind a loader to it.
    pub fn from_registry(
        registry: &TypeRegistry,
        type_name: &str,
        source: S,
    ) -> Result<Self, ConfigurationError> {
        let record_type = registry.resolve(type_name)?;
        Ok(Self::new(record_type, source))
    }

    pub fn record_type(&self) -> &RecordType {
        self.decoder.record_type()
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    /// Counters of the underlying source.
    pub fn stats(&self) -> ScanStats {
        self.source.stats()
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Arrow schema of the full record type. Computed once.
    pub fn schema(&mut self) -> Result<SchemaRef, LoaderError> {
        if let Some(schema) = &self.schema {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(translate(self.decoder.record_type())?);
        self.schema = Some(Arc::clone(&schema));
        Ok(schema)
    }

    /// Restrict the tuples to the given field paths.
    ///
    /// The paths are resolved immediately. Pushing the same projection again
    /// is a no-op; any other change after a projection was set, or after
    /// reading started, fails with [`ConfigurationError::ProjectionFrozen`].
    pub fn push_projection(&mut self, spec: ProjectionSpec) -> Result<(), LoaderError> {
        if let Some(current) = &self.spec {
            if *current == spec {
                return Ok(());
            }
            return Err(ConfigurationError::ProjectionFrozen(
                "a different projection is already set".to_string(),
            )
            .into());
        }
        if self.state != LoaderState::TypeBound {
            return Err(ConfigurationError::ProjectionFrozen(
                "reading has already started".to_string(),
            )
            .into());
        }

        let projector = TupleProjector::new(self.decoder.record_type(), &spec)?;
        debug!(paths = spec.len(), "projection set");
        self.spec = Some(spec);
        self.projector = Some(projector);
        Ok(())
    }

    /// Arrow schema of the tuples returned by [`next_tuple`](Self::next_tuple).
    pub fn projected_schema(&self) -> Result<Schema, LoaderError> {
        match &self.projector {
            Some(projector) => Ok(projector.schema()?),
            None => Ok(TupleProjector::whole_record(self.decoder.record_type()).schema()?),
        }
    }

    /// Return the next tuple, or `None` at end of input.
    ///
    /// Once an error has been returned the loader is `Done` and yields no
    /// further tuples.
    pub fn next_tuple(&mut self) -> Result<Option<Tuple>, LoaderError> {
        match self.state {
            LoaderState::Done => return Ok(None),
            LoaderState::TypeBound => {
                debug!(record_type = self.decoder.record_type().name(), "reading started");
                self.state = LoaderState::Reading;
            }
            LoaderState::Reading => {}
        }

        loop {
            let line = match self.source.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.finish();
                    return Ok(None);
                }
                Err(e) => {
                    self.finish();
                    return Err(e.into());
                }
            };

            match self.decoder.decode(&line.text) {
                Ok(record) => {
                    let projector = self
                        .projector
                        .get_or_insert_with(|| TupleProjector::whole_record(self.decoder.record_type()));
                    return Ok(Some(projector.build(record)));
                }
                Err(cause) => {
                    if let Err(e) = self.source.report_malformed(line.offset, &cause) {
                        self.finish();
                        return Err(e.into());
                    }
                }
            }
        }
    }

    /// Collect up to `max_rows` tuples into a record batch of the projected
    /// schema. Returns `None` once no rows remain.
    pub fn next_batch(&mut self, max_rows: usize) -> Result<Option<RecordBatch>, LoaderError> {
        let mut builder = TupleBatchBuilder::new(Arc::new(self.projected_schema()?))?;
        while builder.len() < max_rows.max(1) {
            match self.next_tuple()? {
                Some(tuple) => builder.append(&tuple)?,
                None => break,
            }
        }
        if builder.is_empty() {
            return Ok(None);
        }
        Ok(Some(builder.finish()?))
    }

    fn finish(&mut self) {
        if self.state != LoaderState::Done {
            let stats = self.source.stats();
            debug!(
                lines = stats.lines,
                skipped = stats.skipped,
                "loader done"
            );
            self.state = LoaderState::Done;
        }
    }
}

impl<S: LineSource> Iterator for B64LineLoader<S> {
    type Item = Result<Tuple, LoaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tuple().transpose()
    }
}
