use dmsync_runtime::{
    HostBridge, HostError, HostErrorCode, SyncOptions, SyncSession, TagGroup, TagValue,
    TypeDef, TypeSpecifier, Value, WaitHandle,
};
use dmsync_runtime::{Error, Map};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

type Store = Arc<Mutex<BTreeMap<String, TagValue>>>;

/// In-memory host. Executing a script does not interpret it: every key the
/// postamble creates is filled from `results`, looked up by variable name.
#[derive(Default)]
struct MockHost {
    store: Store,
    scripts: Mutex<Vec<String>>,
    results: HashMap<String, TagValue>,
    fail_execute: bool,
    fail_delete: bool,
    supports_async: bool,
}

impl MockHost {
    fn with_result(mut self, name: &str, value: TagValue) -> Self {
        self.results.insert(name.to_string(), value);
        self
    }

    fn keys(&self) -> Vec<String> {
        self.store.lock().unwrap().keys().cloned().collect()
    }

    fn executed(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    /// Writes the postamble of `script` would perform.
    fn writes(&self, script: &str) -> Vec<(String, TagValue)> {
        const MARKER: &str = "__dmsync_store.TagGroupSetTagAs";
        script
            .lines()
            .filter_map(|line| {
                let call = &line[line.find(MARKER)?..];
                let start = call.find("(\"")? + 2;
                let key = &call[start..call[start..].find('"')? + start];
                let name = key.rsplit('.').next()?;
                let value = self.results.get(name)?;
                Some((key.to_string(), value.clone()))
            })
            .collect()
    }
}

impl HostBridge for MockHost {
    fn execute_script(&self, script: &str) -> Result<(), HostError> {
        self.scripts.lock().unwrap().push(script.to_string());
        let mut store = self.store.lock().unwrap();
        for (key, value) in self.writes(script) {
            store.insert(key, value);
        }
        if self.fail_execute {
            return Err(HostError::new(HostErrorCode::ScriptError, "Script error"));
        }
        Ok(())
    }

    fn read_global(&self, key: &str) -> Result<Option<TagValue>, HostError> {
        Ok(self.store.lock().unwrap().get(key).cloned())
    }

    fn write_global(&self, key: &str, value: TagValue) -> Result<(), HostError> {
        self.store.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    fn delete_global(&self, key: &str) -> Result<(), HostError> {
        if self.fail_delete {
            return Err(HostError::new(HostErrorCode::StoreError, "locked"));
        }
        self.store.lock().unwrap().remove(key);
        Ok(())
    }

    fn execute_script_async(&self, script: &str) -> Result<Box<dyn WaitHandle>, HostError> {
        if !self.supports_async {
            return Err(HostError::new(HostErrorCode::Unsupported, "no threads"));
        }
        self.scripts.lock().unwrap().push(script.to_string());
        Ok(Box::new(Deferred {
            store: Arc::clone(&self.store),
            writes: self.writes(script),
        }))
    }
}

/// Applies the writes only when waited on.
struct Deferred {
    store: Store,
    writes: Vec<(String, TagValue)>,
}

impl WaitHandle for Deferred {
    fn wait(self: Box<Self>) -> Result<(), HostError> {
        let mut store = self.store.lock().unwrap();
        for (key, value) in self.writes {
            store.insert(key, value);
        }
        Ok(())
    }
}

fn no_read_back() -> SyncOptions {
    SyncOptions {
        read_back_exposed: false,
        ..SyncOptions::default()
    }
}

#[test]
fn sum_of_exposed_values_is_read_back() {
    let host = MockHost::default().with_result("c", TagValue::Double(30.0));
    host.write_global("unrelated", TagValue::Long(1)).unwrap();
    let before = host.keys();

    let guard = SyncSession::new()
        .expose("a", 10)
        .expose("b", 20)
        .script_text("number c = a + b;")
        .read("c", TypeSpecifier::Integer)
        .options(no_read_back())
        .run(&host)
        .unwrap();

    assert_eq!(guard.get("c").unwrap(), &Value::Integer(30));
    assert_eq!(guard.len(), 1);

    let script = &host.executed()[0];
    assert!(script.contains("number a = 10;"));
    assert!(script.contains("number c = a + b;"));
    assert!(script.contains(&format!("\"{}.c\"", guard.run_tag())));

    assert!(guard.release().is_clean());
    assert_eq!(host.keys(), before);
}

#[test]
fn missing_variable_only_affects_its_name() {
    let host = MockHost::default().with_result("found", TagValue::String("yes".into()));

    let guard = SyncSession::new()
        .script_text("string found = \"yes\";")
        .read("found", TypeSpecifier::Text)
        .read("never_declared", TypeSpecifier::Integer)
        .run(&host)
        .unwrap();

    assert_eq!(guard.get("found").unwrap(), &Value::from("yes"));
    assert!(matches!(
        guard.get("never_declared"),
        Err(Error::MissingVariable(ref name)) if name == "never_declared"
    ));
    assert_eq!(guard.missing(), vec!["never_declared"]);
    drop(guard);
    assert!(host.keys().is_empty());
}

#[test]
fn require_all_escalates_missing_variables() {
    let host = MockHost::default().with_result("a", TagValue::Long(1));

    let err = SyncSession::new()
        .read("a", TypeSpecifier::Integer)
        .read("b", TypeSpecifier::Integer)
        .options(SyncOptions::default().with_require_all(true))
        .run(&host)
        .err()
        .unwrap();

    assert!(matches!(err, Error::MissingVariables(ref names) if names == &["b".to_string()]));
    assert!(host.keys().is_empty());
}

#[test]
fn execution_failure_still_cleans_partial_writes() {
    let host = MockHost {
        fail_execute: true,
        ..MockHost::default()
    }
    .with_result("x", TagValue::Long(5));

    let err = SyncSession::new()
        .script_text("number x = 5; Throw(\"boom\");")
        .read("x", TypeSpecifier::Integer)
        .run(&host)
        .err()
        .unwrap();

    match err {
        Error::ScriptExecutionFailed(host_err) => {
            assert_eq!(host_err.code, HostErrorCode::ScriptError)
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(host.keys().is_empty());
}

#[test]
fn type_mismatch_while_reading_is_fatal_and_cleans_up() {
    let host = MockHost::default()
        .with_result("ratio", TagValue::Double(2.5))
        .with_result("label", TagValue::String("ok".into()));

    let err = SyncSession::new()
        .read("label", TypeSpecifier::Text)
        .read("ratio", TypeSpecifier::Integer)
        .run(&host)
        .err()
        .unwrap();

    assert!(matches!(
        err,
        Error::Format(dmsync_format::Error::TypeMismatch { ref path, .. }) if path == "ratio"
    ));
    assert!(host.keys().is_empty());
}

#[test]
fn containers_decode_by_requested_type() {
    let mut list = TagGroup::new_list();
    list.push(TagValue::String("Section 1".into()));
    list.push(TagValue::String("Section 2".into()));

    let host = MockHost::default().with_result("headlines", TagValue::Group(list));

    let guard = SyncSession::new()
        .expose("headlines", Value::list(["Section 1", "Section 2"]))
        .script_text("if (headlines.TagGroupCountTags() != 2) Throw(\"count\");")
        .run(&host)
        .unwrap();

    assert_eq!(
        guard.get("headlines").unwrap(),
        &Value::list(["Section 1", "Section 2"])
    );
    let script = &host.executed()[0];
    assert!(script.contains("TagGroup headlines = NewTagList();"));
    assert!(script.contains(&format!(
        "__dmsync_store.TagGroupSetTagAsTagGroup(\"{}\", headlines);",
        guard.run_tag().key("headlines")
    )));
}

#[test]
fn structure_definition_types_nested_elements() {
    let mut shape = TagGroup::new_list();
    shape.push(TagValue::Double(512.0));
    shape.push(TagValue::Double(0.5));
    let mut cfg = TagGroup::new();
    cfg.set("name", TagValue::String("scan".into()));
    cfg.set("shape", TagValue::Group(shape));
    cfg.set("extra", TagValue::Long(1));

    let host = MockHost::default().with_result("cfg", TagValue::Group(cfg));
    let def = TypeDef::group([
        ("name", TypeDef::from(TypeSpecifier::Text)),
        (
            "shape",
            TypeDef::list([TypeSpecifier::Integer, TypeSpecifier::Real]),
        ),
    ]);

    let guard = SyncSession::new()
        .read("cfg", def.clone())
        .run(&host)
        .unwrap();

    assert_eq!(
        guard.get("cfg").unwrap(),
        &Value::map([
            ("name", Value::from("scan")),
            ("shape", Value::list(vec![Value::Integer(512), Value::Real(0.5)])),
        ])
    );
    assert_eq!(guard.requested_type("cfg"), Some(&def));
}

#[test]
fn failed_deletes_are_reported_not_raised() {
    let host = MockHost {
        fail_delete: true,
        ..MockHost::default()
    }
    .with_result("v", TagValue::Boolean(true));

    let guard = SyncSession::new()
        .read("v", TypeSpecifier::Boolean)
        .run(&host)
        .unwrap();
    assert_eq!(guard.get("v").unwrap(), &Value::Boolean(true));

    let key = format!("{}.v", guard.run_tag());
    let report = guard.release();
    assert_eq!(report.failed_keys().collect::<Vec<_>>(), vec![key.as_str()]);
    assert!(matches!(
        report.into_result(),
        Err(Error::CleanupPartialFailure { .. })
    ));
}

#[test]
fn debug_mode_writes_the_script_instead_of_running_it() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("debug.s");
    let host = MockHost::default();

    let guard = SyncSession::new()
        .expose("a", 1)
        .script_text("number b = a;")
        .read("b", TypeSpecifier::Integer)
        .options(SyncOptions::default().with_debug_file(&path))
        .run(&host)
        .unwrap();

    assert!(host.executed().is_empty());
    assert!(host.keys().is_empty());
    assert!(guard.is_missing("b"));

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("number a = 1;"));
    assert!(written.contains("number b = a;"));
    assert!(written.contains(&format!("\"{}.b\"", guard.run_tag())));
}

#[test]
fn cyclic_values_fail_before_execution() {
    let map = Map::new();
    map.insert("self", map.clone());
    let host = MockHost::default();

    let err = SyncSession::new()
        .expose("m", map)
        .script_text("number x = 1;")
        .run(&host)
        .err()
        .unwrap();

    assert!(matches!(
        err,
        Error::Format(dmsync_format::Error::Cyclic { .. })
    ));
    assert!(host.executed().is_empty());
}

#[test]
fn invalid_names_fail_before_execution() {
    let host = MockHost::default();

    let err = SyncSession::new()
        .expose("count", 1)
        .expose("COUNT", 2)
        .run(&host)
        .err()
        .unwrap();
    assert!(matches!(err, Error::DuplicateVariable { .. }));

    let err = SyncSession::new()
        .read("__dmsync_store", TypeSpecifier::Group)
        .run(&host)
        .err()
        .unwrap();
    assert!(matches!(err, Error::ReservedName(_)));
    assert!(host.executed().is_empty());
}

#[test]
fn non_blocking_run_reads_after_wait() {
    let host = MockHost {
        supports_async: true,
        ..MockHost::default()
    }
    .with_result("n", TagValue::Long(7));

    let pending = SyncSession::new()
        .read("n", TypeSpecifier::Integer)
        .options(SyncOptions::default().with_non_blocking(true))
        .start(&host)
        .unwrap();
    assert!(pending.is_pending());
    assert!(host.keys().is_empty());

    let guard = pending.wait().unwrap();
    assert_eq!(guard.get("n").unwrap(), &Value::Integer(7));
    drop(guard);
    assert!(host.keys().is_empty());
}

#[test]
fn dropped_pending_run_waits_then_cleans() {
    let host = MockHost {
        supports_async: true,
        ..MockHost::default()
    }
    .with_result("n", TagValue::Long(7));

    let pending = SyncSession::new()
        .read("n", TypeSpecifier::Integer)
        .options(SyncOptions::default().with_non_blocking(true))
        .start(&host)
        .unwrap();
    drop(pending);

    assert!(host.keys().is_empty());
}

#[test]
fn non_blocking_requires_host_support() {
    let host = MockHost::default();
    let err = SyncSession::new()
        .script_text("number n = 1;")
        .options(SyncOptions::default().with_non_blocking(true))
        .start(&host)
        .err()
        .unwrap();
    assert!(matches!(err, Error::Host(ref e) if e.code == HostErrorCode::Unsupported));
}

#[test]
fn panicking_caller_still_cleans_up() {
    let host = MockHost::default().with_result("n", TagValue::Long(1));

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        SyncSession::new()
            .read("n", TypeSpecifier::Integer)
            .with(&host, |_| panic!("caller failed"))
    }));

    assert!(result.is_err());
    assert!(host.keys().is_empty());
}

#[test]
fn script_files_are_included_with_their_path() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("compute.s");
    std::fs::write(&path, "number r = 2 * 21;\n").unwrap();
    let host = MockHost::default().with_result("r", TagValue::Double(42.0));

    let value = SyncSession::new()
        .script_file(&path)
        .read("r", TypeSpecifier::Integer)
        .with(&host, |vars| vars.get("r").ok().and_then(Value::as_integer))
        .unwrap();

    assert_eq!(value, Some(42));
    assert!(host.executed()[0].contains(&format!("// File {}", path.display())));
}
