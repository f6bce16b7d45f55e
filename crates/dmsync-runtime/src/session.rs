//! Running one synchronization against a host.
//!
//! A [`SyncSession`] collects script fragments, exposed values and read-back
//! requests. Starting it goes through
//! `Building -> Executing -> Reading -> Cleaning -> Done`, with `Failed`
//! reachable from every phase. Every shared store key the session plans is
//! owned by a lease that deletes it when dropped, so Cleaning happens on
//! every exit path, including errors and panics in the caller's code.

use crate::bridge::{HostBridge, HostError, HostErrorCode, WaitHandle};
use crate::config::SyncOptions;
use crate::plan::{
    build_postamble, build_preamble, validate_names, ExposedValue, RetrievalRequest, RunTag,
};
use crate::source::ScriptSource;
use crate::view::SynchronizedVars;
use crate::{Error, Result};
use dmsync_format::{decode_typed, escape_identifier, TypeDef, TypeSpecifier, Value};
use log::{debug, info, warn};
use std::fmt;
use std::ops::Deref;
use std::path::PathBuf;

const HEADER: &str = "\
// This code is created automatically by concatenating files and
// code fragments.
//
// This code is generated by dmsync.";

/// Phases of a synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Validating names and generating the combined script.
    Building,
    /// The host runs the script.
    Executing,
    /// Reading the private keys back.
    Reading,
    /// Deleting the private keys.
    Cleaning,
    /// Finished.
    Done,
    /// Aborted with an error.
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Building => "building",
            Phase::Executing => "executing",
            Phase::Reading => "reading",
            Phase::Cleaning => "cleaning",
            Phase::Done => "done",
            Phase::Failed => "failed",
        })
    }
}

/// A variable the postamble stores and the session reads back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRead {
    /// Variable name as requested.
    pub name: String,
    /// Private shared store key.
    pub key: String,
    /// Type to decode into.
    pub ty: TypeDef,
}

/// The combined script of a session, as it would be submitted.
#[derive(Debug, Clone)]
pub struct RenderedScript {
    /// Namespace of the private keys.
    pub run_tag: RunTag,
    /// Script text.
    pub script: String,
    /// Variables the script stores, in request order.
    pub reads: Vec<PlannedRead>,
}

/// Builder for one synchronization.
///
/// ```ignore
/// let guard = SyncSession::new()
///     .expose("a", 10)
///     .expose("b", 20)
///     .script_text("number c = a + b;")
///     .read("c", TypeSpecifier::Integer)
///     .run(&host)?;
/// assert_eq!(guard.get("c")?, &Value::Integer(30));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncSession {
    sources: Vec<(ScriptSource, Option<bool>)>,
    exposed: Vec<ExposedValue>,
    requests: Vec<RetrievalRequest>,
    options: SyncOptions,
}

impl SyncSession {
    /// Create an empty session with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a script fragment. Ignore blocks are handled according to
    /// [`SyncOptions::strip_ignore_blocks`].
    pub fn script(mut self, source: impl Into<ScriptSource>) -> Self {
        self.sources.push((source.into(), None));
        self
    }

    /// Append a script fragment, choosing whether ignore blocks are removed.
    pub fn script_with_ignore_blocks(
        mut self,
        source: impl Into<ScriptSource>,
        strip_ignore_blocks: bool,
    ) -> Self {
        self.sources.push((source.into(), Some(strip_ignore_blocks)));
        self
    }

    /// Append inline script text.
    pub fn script_text(self, text: impl Into<String>) -> Self {
        self.script(ScriptSource::Text(text.into()))
    }

    /// Append a script file, read when the session is built.
    pub fn script_file(self, path: impl Into<PathBuf>) -> Self {
        self.script(ScriptSource::File(path.into()))
    }

    /// Expose `value` to the script as the variable `name`.
    pub fn expose(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.exposed.push(ExposedValue::new(name, value));
        self
    }

    /// Expose `value` declared with an explicit type.
    pub fn expose_as(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        ty: TypeSpecifier,
    ) -> Self {
        self.exposed.push(ExposedValue::typed(name, value, ty));
        self
    }

    /// Read the script variable `name` back as `ty` after execution.
    ///
    /// `ty` is a [`TypeSpecifier`] or, to fix the types of nested elements,
    /// a [`TypeDef`].
    pub fn read(mut self, name: impl Into<String>, ty: impl Into<TypeDef>) -> Self {
        self.requests.push(RetrievalRequest::new(name, ty));
        self
    }

    /// Replace the options.
    pub fn options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// The current options.
    pub fn current_options(&self) -> &SyncOptions {
        &self.options
    }

    /// Explicit requests followed by the exposed values that are read back
    /// automatically.
    fn effective_requests(&self) -> Vec<RetrievalRequest> {
        let mut requests = self.requests.clone();
        if self.options.read_back_exposed {
            for exposed in &self.exposed {
                let ident = escape_identifier(&exposed.name).to_ascii_lowercase();
                let requested = requests
                    .iter()
                    .any(|r| escape_identifier(&r.name).to_ascii_lowercase() == ident);
                if !requested {
                    requests.push(RetrievalRequest::new(
                        exposed.name.clone(),
                        exposed.effective_type(),
                    ));
                }
            }
        }
        requests
    }

    /// Build the combined script under a fresh [`RunTag`] without touching a
    /// host. Debug mode writes exactly this text.
    pub fn render(&self) -> Result<RenderedScript> {
        let run_tag = RunTag::generate();
        debug!("{}: {}", run_tag, Phase::Building);

        validate_names(self.exposed.iter().map(|v| v.name.as_str()))?;
        let requests = self.effective_requests();
        validate_names(requests.iter().map(|r| r.name.as_str()))?;

        let preamble = build_preamble(&self.exposed)?;
        let postamble = build_postamble(&requests, &run_tag)?;

        let mut parts = vec![HEADER.to_string()];
        if !preamble.is_empty() {
            parts.push(preamble);
        }
        for (source, strip) in &self.sources {
            if source.is_blank() {
                continue;
            }
            let fragment = source.load(strip.unwrap_or(self.options.strip_ignore_blocks))?;
            parts.push(format!(
                "{}\n{}",
                fragment.origin,
                terminated(&fragment.text)
            ));
        }
        if !postamble.is_empty() {
            parts.push(postamble);
        }

        let mut script = parts.join("\n\n");
        script.push('\n');

        let reads = requests
            .into_iter()
            .map(|request| PlannedRead {
                key: run_tag.key(&request.name),
                name: request.name,
                ty: request.ty,
            })
            .collect();

        Ok(RenderedScript {
            run_tag,
            script,
            reads,
        })
    }

    /// Build the script and submit it to `host`.
    ///
    /// In blocking mode the script has finished when this returns; with
    /// [`SyncOptions::non_blocking`] it was only submitted. Either way,
    /// [`PendingSync::wait`] yields the read-back variables. In debug mode the
    /// script is written to the debug file and nothing is executed.
    pub fn start<'h>(self, host: &'h dyn HostBridge) -> Result<PendingSync<'h>> {
        let RenderedScript {
            run_tag,
            script,
            reads,
        } = self.render()?;
        debug!(
            "{}: generated {} bytes of script reading {} variable(s)",
            run_tag,
            script.len(),
            reads.len()
        );

        if self.options.debug {
            let path = self.options.debug_path();
            std::fs::write(&path, &script)?;
            info!(
                "did not execute the script but saved it to {} (debug mode)",
                path.display()
            );
            let mut vars = SynchronizedVars::default();
            for read in &reads {
                vars.push(&read.name, read.ty.clone(), None);
            }
            debug!("{}: {}", run_tag, Phase::Done);
            return Ok(PendingSync {
                lease: KeyLease::released(host, run_tag.clone()),
                run_tag,
                handle: None,
                reads: Vec::new(),
                require_all: false,
                ready: Some(vars),
            });
        }

        debug!("{}: {}", run_tag, Phase::Executing);
        let keys = reads.iter().map(|read| read.key.clone()).collect();
        let lease = KeyLease::new(host, run_tag.clone(), keys);

        let handle = if self.options.non_blocking {
            match host.execute_script_async(&script) {
                Ok(handle) => Some(handle),
                Err(err) if err.code == HostErrorCode::Unsupported => {
                    return Err(lease.fail(Error::Host(err)))
                }
                Err(err) => return Err(lease.fail(Error::ScriptExecutionFailed(err))),
            }
        } else {
            if let Err(err) = host.execute_script(&script) {
                return Err(lease.fail(Error::ScriptExecutionFailed(err)));
            }
            None
        };

        Ok(PendingSync {
            lease,
            run_tag,
            handle,
            reads,
            require_all: self.options.require_all,
            ready: None,
        })
    }

    /// Run the session to completion, returning the guard holding the
    /// read-back variables.
    pub fn run<'h>(self, host: &'h dyn HostBridge) -> Result<SyncGuard<'h>> {
        self.start(host)?.wait()
    }

    /// Run the session, hand the variables to `f` and clean up afterwards.
    pub fn with<R>(self, host: &dyn HostBridge, f: impl FnOnce(&SynchronizedVars) -> R) -> Result<R> {
        let guard = self.run(host)?;
        let output = f(&guard);
        guard.release();
        Ok(output)
    }
}

/// Run `scripts` with `exposed` values and read `requests` back.
pub fn synchronize<'h>(
    host: &'h dyn HostBridge,
    scripts: impl IntoIterator<Item = ScriptSource>,
    exposed: impl IntoIterator<Item = ExposedValue>,
    requests: impl IntoIterator<Item = RetrievalRequest>,
    options: SyncOptions,
) -> Result<SyncGuard<'h>> {
    let mut session = SyncSession::new().options(options);
    session
        .sources
        .extend(scripts.into_iter().map(|source| (source, None)));
    session.exposed.extend(exposed);
    session.requests.extend(requests);
    session.run(host)
}

/// Make sure a fragment ends in a statement terminator.
fn terminated(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.is_empty() || trimmed.ends_with(';') || trimmed.ends_with('}') {
        trimmed.to_string()
    } else {
        format!("{trimmed}\n;")
    }
}

/// A submitted script whose variables have not been read yet.
///
/// Dropping it without calling [`wait`](PendingSync::wait) still waits for
/// the host before the private keys are deleted.
pub struct PendingSync<'h> {
    lease: KeyLease<'h>,
    run_tag: RunTag,
    handle: Option<Box<dyn WaitHandle>>,
    reads: Vec<PlannedRead>,
    require_all: bool,
    ready: Option<SynchronizedVars>,
}

impl<'h> PendingSync<'h> {
    /// Namespace of this run's private keys.
    pub fn run_tag(&self) -> &RunTag {
        &self.run_tag
    }

    /// Whether the host may still be running the script.
    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    /// Wait for the host and read the requested variables back.
    pub fn wait(mut self) -> Result<SyncGuard<'h>> {
        let placeholder = KeyLease::released(self.lease.host, self.run_tag.clone());
        let lease = std::mem::replace(&mut self.lease, placeholder);

        if let Some(handle) = self.handle.take() {
            debug!("{}: waiting for the host", self.run_tag);
            if let Err(err) = handle.wait() {
                return Err(lease.fail(Error::ScriptExecutionFailed(err)));
            }
        }

        if let Some(vars) = self.ready.take() {
            return Ok(SyncGuard { lease, vars });
        }

        let reads = std::mem::take(&mut self.reads);
        read_back(lease, &reads, self.require_all)
    }
}

impl Drop for PendingSync<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            warn!(
                "{}: pending synchronization dropped without waiting, waiting for the host before cleaning up",
                self.run_tag
            );
            if let Err(err) = handle.wait() {
                warn!("{}: script failed: {}", self.run_tag, err);
            }
        }
    }
}

fn read_back<'h>(
    lease: KeyLease<'h>,
    reads: &[PlannedRead],
    require_all: bool,
) -> Result<SyncGuard<'h>> {
    debug!("{}: {}", lease.run_tag, Phase::Reading);
    let mut vars = SynchronizedVars::default();

    for read in reads {
        let tag = match lease.host.read_global(&read.key) {
            Ok(tag) => tag,
            Err(err) => return Err(lease.fail(Error::Host(err))),
        };
        let value = match tag {
            Some(tag) => match decode_typed(&tag, &read.ty, &read.name) {
                Ok(value) => Some(value),
                Err(err) => return Err(lease.fail(err.into())),
            },
            None => {
                debug!("{}: `{}` was not written back", lease.run_tag, read.name);
                None
            }
        };
        vars.push(&read.name, read.ty.clone(), value);
    }

    if require_all {
        let missing: Vec<String> = vars.missing().into_iter().map(String::from).collect();
        if !missing.is_empty() {
            return Err(lease.fail(Error::MissingVariables(missing)));
        }
    }

    Ok(SyncGuard { lease, vars })
}

/// Ownership of the private keys of one run; dropping it deletes them.
struct KeyLease<'h> {
    host: &'h dyn HostBridge,
    run_tag: RunTag,
    keys: Vec<String>,
    released: bool,
}

impl<'h> KeyLease<'h> {
    fn new(host: &'h dyn HostBridge, run_tag: RunTag, keys: Vec<String>) -> Self {
        Self {
            host,
            run_tag,
            keys,
            released: false,
        }
    }

    /// A lease with nothing to clean up.
    fn released(host: &'h dyn HostBridge, run_tag: RunTag) -> Self {
        Self {
            host,
            run_tag,
            keys: Vec::new(),
            released: true,
        }
    }

    fn clean(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        if self.released {
            return report;
        }
        self.released = true;

        debug!("{}: {}", self.run_tag, Phase::Cleaning);
        for key in &self.keys {
            if let Err(err) = self.host.delete_global(key) {
                warn!("{}: could not remove {}: {}", self.run_tag, key, err);
                report.failed.push((key.clone(), err));
            }
        }
        report
    }

    /// Clean up and pass `err` through.
    fn fail(mut self, err: Error) -> Error {
        self.clean();
        debug!("{}: {} ({})", self.run_tag, Phase::Failed, err);
        err
    }
}

impl Drop for KeyLease<'_> {
    fn drop(&mut self) {
        self.clean();
    }
}

/// Keys that could not be deleted during Cleaning.
#[derive(Debug, Default)]
pub struct CleanupReport {
    failed: Vec<(String, HostError)>,
}

impl CleanupReport {
    /// Whether every key was deleted.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Keys left in the shared store.
    pub fn failed_keys(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|(key, _)| key.as_str())
    }

    /// The host errors, per key.
    pub fn failures(&self) -> &[(String, HostError)] {
        &self.failed
    }

    /// Turn leftover keys into [`Error::CleanupPartialFailure`].
    pub fn into_result(self) -> Result<()> {
        if self.failed.is_empty() {
            Ok(())
        } else {
            Err(Error::CleanupPartialFailure {
                keys: self.failed.into_iter().map(|(key, _)| key).collect(),
            })
        }
    }
}

/// The read-back variables of a finished run.
///
/// Dereferences to [`SynchronizedVars`]. The private keys are deleted when
/// the guard is released or dropped.
pub struct SyncGuard<'h> {
    lease: KeyLease<'h>,
    vars: SynchronizedVars,
}

impl SyncGuard<'_> {
    /// Namespace of this run's private keys.
    pub fn run_tag(&self) -> &RunTag {
        &self.lease.run_tag
    }

    /// The read-back variables.
    pub fn vars(&self) -> &SynchronizedVars {
        &self.vars
    }

    /// Delete the private keys now.
    pub fn release(self) -> CleanupReport {
        self.finish().1
    }

    /// Delete the private keys, keeping the variables.
    pub fn finish(self) -> (SynchronizedVars, CleanupReport) {
        let SyncGuard { mut lease, vars } = self;
        let report = lease.clean();
        debug!("{}: {}", lease.run_tag, Phase::Done);
        (vars, report)
    }
}

impl fmt::Debug for SyncGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncGuard")
            .field("run_tag", &self.lease.run_tag)
            .field("vars", &self.vars)
            .finish()
    }
}

impl Deref for SyncGuard<'_> {
    type Target = SynchronizedVars;

    fn deref(&self) -> &SynchronizedVars {
        &self.vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_get_terminators() {
        assert_eq!(terminated("a = 1;\n\n"), "a = 1;");
        assert_eq!(terminated("if (a) { b = 1; }"), "if (a) { b = 1; }");
        assert_eq!(terminated("a = 1 // note"), "a = 1 // note\n;");
    }

    #[test]
    fn rendered_script_orders_parts() {
        let rendered = SyncSession::new()
            .expose("a", 10)
            .script_text("number c = a * 2;")
            .read("c", TypeSpecifier::Integer)
            .render()
            .unwrap();

        let script = &rendered.script;
        let preamble = script.find("number a = 10;").unwrap();
        let user = script.find("// Directly given script\nnumber c = a * 2;").unwrap();
        let postamble = script.find("GetPersistentTagGroup()").unwrap();
        assert!(script.starts_with("// This code is created automatically"));
        assert!(preamble < user && user < postamble);

        let names: Vec<_> = rendered.reads.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a"]);
        assert_eq!(rendered.reads[0].key, rendered.run_tag.key("c"));
    }

    #[test]
    fn explicit_request_wins_over_read_back() {
        let rendered = SyncSession::new()
            .expose("x", 1)
            .read("X", TypeSpecifier::Real)
            .render()
            .unwrap();
        assert_eq!(rendered.reads.len(), 1);
        assert_eq!(rendered.reads[0].ty, TypeSpecifier::Real);
    }

    #[test]
    fn read_back_can_be_disabled() {
        let options = SyncOptions {
            read_back_exposed: false,
            ..SyncOptions::default()
        };
        let rendered = SyncSession::new()
            .expose("x", 1)
            .options(options)
            .render()
            .unwrap();
        assert!(rendered.reads.is_empty());
        assert!(!rendered.script.contains("GetPersistentTagGroup"));
    }

    #[test]
    fn options_are_kept_on_the_session() {
        let session = SyncSession::new().options(SyncOptions::default().with_non_blocking(true));
        assert!(session.current_options().non_blocking);
        assert!(!SyncSession::new().current_options().non_blocking);
    }

    #[test]
    fn inexact_integers_fail_while_building() {
        let err = SyncSession::new()
            .expose("big", i64::MAX)
            .render()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Format(dmsync_format::Error::OutOfRange { value: i64::MAX, .. })
        ));

        let rendered = SyncSession::new()
            .expose_as("big", i64::MAX, TypeSpecifier::Real)
            .render()
            .unwrap();
        assert_eq!(rendered.reads[0].ty, TypeSpecifier::Real);
    }

    #[test]
    fn blank_fragments_are_skipped() {
        let rendered = SyncSession::new().script_text("  \n").render().unwrap();
        assert!(!rendered.script.contains("// Directly given script"));
    }

    #[test]
    fn declared_type_conflicts_fail_while_building() {
        let err = SyncSession::new()
            .expose_as("n", 1, TypeSpecifier::Text)
            .render()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Format(dmsync_format::Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn cleanup_report_escalates_on_request() {
        let report = CleanupReport {
            failed: vec![(
                "k".to_string(),
                HostError::new(HostErrorCode::StoreError, "locked"),
            )],
        };
        assert!(!report.is_clean());
        assert_eq!(report.failed_keys().collect::<Vec<_>>(), vec!["k"]);
        assert!(matches!(
            report.into_result(),
            Err(Error::CleanupPartialFailure { ref keys }) if keys == &["k".to_string()]
        ));
        assert!(CleanupReport::default().into_result().is_ok());
    }
}
