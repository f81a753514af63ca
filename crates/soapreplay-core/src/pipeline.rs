//! Trace to scenario pipeline
//!
//! One run reads the trace through the configured reader and action filter,
//! resolves each surviving message to a contract operation, rebuilds its
//! parameters and hands the call to the scenario emitter. Runs are strictly
//! sequential; every message is fully emitted before the next one is read.
//!
//! A message whose action matches no contract operation is skipped and
//! recorded in the [`RunReport`]. Everything else that goes wrong is fatal,
//! and no file is written unless both units rendered.

use crate::config::RunConfig;
use crate::error::ReplayError;
use crate::supplier::TraceSupplier;
use soapreplay_codegen::{CSharpPrinter, CodePrinter, ScenarioCodeEmitter};
use soapreplay_contract::{
    ContractResolver, MessageDeserializer, ResolvedCall, SkippedContainer, TypeRegistry,
};
use soapreplay_trace::{MessageFilter, ReaderRegistry, TraceFormatReader};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Captured call left out of the scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCall {
    /// Position among the messages that passed the filter, from zero
    pub index: usize,
    /// Wire action
    pub action: String,
    /// Why it was skipped
    pub reason: String,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Trace that was read
    pub trace: PathBuf,
    /// Messages the reader yielded
    pub messages_read: usize,
    /// Messages that passed the action filter
    pub messages_kept: usize,
    /// Generated call method names, in trace order
    pub methods: Vec<String>,
    /// Calls that were not generated
    pub skipped_calls: Vec<SkippedCall>,
    /// Type containers that failed to load
    pub skipped_containers: Vec<SkippedContainer>,
    /// Written primary unit
    pub primary_path: PathBuf,
    /// Written stub unit
    pub stub_path: PathBuf,
}

impl RunReport {
    /// Number of generated calls
    #[inline]
    #[must_use]
    pub fn calls_generated(&self) -> usize {
        self.methods.len()
    }
}

/// Number of times an action occurs in a trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCount {
    /// Wire action
    pub action: String,
    /// Occurrences
    pub count: usize,
}

/// Runs the whole generation for a [`RunConfig`]
pub struct ScenarioPipeline {
    readers: ReaderRegistry,
    printer: Box<dyn CodePrinter>,
}

impl std::fmt::Debug for ScenarioPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioPipeline")
            .field("readers", &self.readers)
            .field("language", &self.printer.language())
            .finish()
    }
}

impl Default for ScenarioPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioPipeline {
    /// Create pipeline with the built-in readers and the C# printer
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(ReaderRegistry::with_defaults(), Box::new(CSharpPrinter::new()))
    }

    /// Create pipeline with custom readers and printer
    #[must_use]
    pub fn with_parts(readers: ReaderRegistry, printer: Box<dyn CodePrinter>) -> Self {
        Self { readers, printer }
    }

    /// Available readers
    #[inline]
    #[must_use]
    pub fn readers(&self) -> &ReaderRegistry {
        &self.readers
    }

    /// Take the trace from `supplier`, then [`run`](Self::run)
    pub fn run_supplied(
        &self,
        config: &RunConfig,
        supplier: &mut dyn TraceSupplier,
    ) -> Result<RunReport, ReplayError> {
        let trace = supplier.supply()?;
        let mut config = config.clone();
        supplier.merge_into(&mut config, &trace);
        self.run(&config)
    }

    /// Generate and write both units
    pub fn run(&self, config: &RunConfig) -> Result<RunReport, ReplayError> {
        config.validate(&self.readers)?;
        let trace = config
            .trace
            .clone()
            .ok_or_else(|| ReplayError::config("no trace file given"))?;

        let registry = TypeRegistry::load(&config.containers);
        let resolver = ContractResolver::new(&registry);
        let deserializer = MessageDeserializer::new(&registry);
        let mut emitter = ScenarioCodeEmitter::new(&registry, config.output.scenario.clone());

        let mut reader = MessageFilter::new(self.open(config, &trace)?, config.filter.clone())
            .with_observer(|message| debug!(action = message.action(), "read message"));

        let mut report = RunReport {
            trace: trace.clone(),
            skipped_containers: registry.skipped().to_vec(),
            ..RunReport::default()
        };

        let mut index = 0;
        while let Some(parsed) = reader.read_next()? {
            let action = parsed.action().to_string();
            let position = index;
            index += 1;

            let Some(contract_method) = resolver.resolve_action(&action) else {
                warn!(action = %action, "no contract operation matches action; skipping call");
                report.skipped_calls.push(SkippedCall {
                    index: position,
                    action,
                    reason: "no contract operation matches the action".to_string(),
                });
                continue;
            };

            let strategy = deserializer.strategy(&contract_method);
            let parameters = deserializer.deserialize(parsed.message(), &contract_method)?;
            let call = ResolvedCall {
                action,
                timestamp: parsed.timestamp(),
                implementing_method: resolver.resolve_implementation(&contract_method),
                strategy,
                contract_method,
                parameters,
            };
            report.methods.push(emitter.add_call(&call)?);
        }
        report.messages_read = reader.seen();
        report.messages_kept = reader.passed();

        if report.methods.is_empty() {
            return Err(ReplayError::NoCalls { file: trace });
        }

        let rendered = emitter.finish().render(self.printer.as_ref());
        let ext = self.printer.file_extension();
        report.primary_path = config.output.primary_path(ext);
        report.stub_path = config.output.stub_path(ext);

        std::fs::create_dir_all(&config.output.dir)
            .map_err(|e| ReplayError::io(&config.output.dir, e))?;
        let primary = stage_unit(&report.primary_path, &rendered.primary)?;
        let stubs = stage_unit(&report.stub_path, &rendered.stubs)?;
        commit_units(primary, &report.primary_path, stubs, &report.stub_path)?;

        info!(
            trace = %report.trace.display(),
            calls = report.calls_generated(),
            skipped = report.skipped_calls.len(),
            primary = %report.primary_path.display(),
            "scenario generated"
        );
        Ok(report)
    }

    /// Actions in the trace with their counts, first occurrence order
    ///
    /// Side flags and the action filter of `config` apply; containers are not
    /// consulted.
    pub fn list_actions(&self, config: &RunConfig) -> Result<Vec<ActionCount>, ReplayError> {
        let trace = config
            .trace
            .clone()
            .ok_or_else(|| ReplayError::config("no trace file given"))?;
        let mut reader = MessageFilter::new(self.open(config, &trace)?, config.filter.clone());

        let mut counts: Vec<ActionCount> = Vec::new();
        while let Some(parsed) = reader.read_next()? {
            match counts.iter_mut().find(|c| c.action == parsed.action()) {
                Some(entry) => entry.count += 1,
                None => counts.push(ActionCount {
                    action: parsed.action().to_string(),
                    count: 1,
                }),
            }
        }
        Ok(counts)
    }

    fn open(
        &self,
        config: &RunConfig,
        trace: &Path,
    ) -> Result<Box<dyn TraceFormatReader>, ReplayError> {
        let mut reader = self
            .readers
            .create(&config.parser)
            .ok_or_else(|| ReplayError::UnknownReader {
                name: config.parser.clone(),
                available: self.readers.names().join(", "),
            })?;
        let file = File::open(trace).map_err(|e| ReplayError::io(trace, e))?;
        reader.setup(
            Box::new(BufReader::new(file)),
            trace,
            config.client_side,
            config.service_side,
        )?;
        debug!(reader = reader.name(), trace = %trace.display(), "trace opened");
        Ok(reader)
    }
}

/// Write `text` to a temporary file next to `path`
fn stage_unit(path: &Path, text: &str) -> Result<NamedTempFile, ReplayError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(|e| ReplayError::io(path, e))?;
    file.write_all(text.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| ReplayError::io(path, e))?;
    Ok(file)
}

/// Move both staged units into place; neither is left behind on failure
fn commit_units(
    primary: NamedTempFile,
    primary_path: &Path,
    stubs: NamedTempFile,
    stub_path: &Path,
) -> Result<(), ReplayError> {
    primary
        .persist(primary_path)
        .map_err(|e| ReplayError::io(primary_path, e.error))?;
    if let Err(e) = stubs.persist(stub_path) {
        if let Err(cleanup) = std::fs::remove_file(primary_path) {
            warn!(path = %primary_path.display(), error = %cleanup, "could not remove primary unit");
        }
        return Err(ReplayError::io(stub_path, e.error));
    }
    Ok(())
}
