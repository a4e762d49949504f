//! Behaviour-driven step definitions driving the sync CLI scenarios.

use super::*;
use crate::sync::{Pipeline, PipelineBuilder, SyncConfig, run_sync_with};
use camino::Utf8PathBuf;
use osmsync_core::{
    CursorStore, SequenceNumber, SyncReport,
    test_support::{
        RecordingEmitter, RecordingObserver, ScriptedConverter, StubNodeSource,
        StubReplicationSource,
    },
};
use osmsync_data::ApplyLog;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::{cell::RefCell, fs, path::PathBuf};
use tempfile::TempDir;

const UNTAGGED_CREATE: &str = r#"<osmChange version="0.6" generator="osmdbt-create-diff/0.6">
  <create>
    <node id="11" version="1" lat="47.99" lon="7.84"/>
  </create>
</osmChange>"#;

/// Hands out the scenario's feed once, backed by stubs and a real apply log.
struct StubPipelineBuilder {
    feed: RefCell<Option<StubReplicationSource>>,
}

impl PipelineBuilder for StubPipelineBuilder {
    fn build(&self, config: &SyncConfig) -> Result<Pipeline, CliError> {
        let source = self
            .feed
            .borrow_mut()
            .take()
            .unwrap_or_else(|| panic!("pipeline built twice"));
        Ok(Pipeline {
            source: Box::new(source),
            nodes: Box::new(StubNodeSource::default()),
            converter: Box::new(ScriptedConverter::default()),
            emitter: Box::new(RecordingEmitter::default()),
            cursor: Box::new(ApplyLog::initialise(&config.cursor_db)?),
        })
    }
}

struct SyncWorld {
    _tmp: TempDir,
    root: Utf8PathBuf,
    builder: StubPipelineBuilder,
    observer: RecordingObserver,
    result: RefCell<Option<Result<SyncReport, CliError>>>,
}

impl SyncWorld {
    fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");
        Self {
            _tmp: tmp,
            root,
            builder: StubPipelineBuilder {
                feed: RefCell::new(None),
            },
            observer: RecordingObserver::default(),
            result: RefCell::new(None),
        }
    }

    fn cursor_db(&self) -> Utf8PathBuf {
        self.root.join("cursor.sqlite")
    }

    fn command_line(&self, extra: &[&str]) -> Vec<String> {
        let mut argv = vec![
            "osmsync".to_owned(),
            "sync".to_owned(),
            format!("--{ARG_OSM2RDF_DIR}"),
            self.root.join("osm2rdf").into_string(),
            format!("--{ARG_OSM2RDF_IMAGE}"),
            "osm2rdf".to_owned(),
            format!("--{ARG_SPARQL_ENDPOINT}"),
            "http://localhost:7001/update".to_owned(),
            format!("--{ARG_CURSOR_DB}"),
            self.cursor_db().into_string(),
        ];
        argv.extend(extra.iter().map(|arg| (*arg).to_owned()));
        argv
    }

    fn run(&self, extra: &[&str]) {
        let parsed = Cli::try_parse_from(self.command_line(extra)).map_err(CliError::from);
        let outcome = parsed.and_then(|cli| match cli.command {
            Command::Sync(args) => run_sync_with(args, &self.builder, &self.observer),
            Command::Latest(_) => panic!("expected sync command"),
        });
        self.result.replace(Some(outcome));
    }

    fn error(&self) -> std::cell::Ref<'_, CliError> {
        std::cell::Ref::map(self.result.borrow(), |result| {
            result
                .as_ref()
                .expect("result recorded")
                .as_ref()
                .expect_err("expected error")
        })
    }
}

#[fixture]
fn world() -> SyncWorld {
    SyncWorld::new()
}

#[given("an upstream feed at sequence 102 where 101 is unpublished")]
fn upstream_feed(#[from(world)] world: &SyncWorld) {
    let feed = StubReplicationSource::new(SequenceNumber::new(102))
        .with_unpublished(SequenceNumber::new(101))
        .with_diff(SequenceNumber::new(102), UNTAGGED_CREATE);
    world.builder.feed.replace(Some(feed));
}

#[when("I run the sync command from sequence 100")]
fn run_from_sequence(#[from(world)] world: &SyncWorld) {
    let flag = format!("--{ARG_FROM_SEQUENCE}");
    world.run(&[flag.as_str(), "100"]);
}

#[when("I run the sync command without a starting sequence")]
fn run_without_sequence(#[from(world)] world: &SyncWorld) {
    world.run(&[]);
}

#[when("I run the sync command with both a converter image and binary")]
fn run_with_conflict(#[from(world)] world: &SyncWorld) {
    let binary = world.root.join("osm2rdf-bin");
    let flag = format!("--{ARG_OSM2RDF_BINARY}");
    world.run(&[flag.as_str(), binary.as_str()]);
}

#[then("the command succeeds with the cursor at sequence 102")]
fn succeeds_at_102(#[from(world)] world: &SyncWorld) {
    let borrowed = world.result.borrow();
    let report = borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect("expected success");
    assert_eq!(report.cursor, SequenceNumber::new(102));
    assert_eq!(report.skipped, vec![SequenceNumber::new(101)]);
}

#[then("the cursor database records sequence 102")]
fn database_records_102(#[from(world)] world: &SyncWorld) {
    let log = ApplyLog::initialise(&world.cursor_db()).expect("reopen apply log");
    assert_eq!(log.load().expect("load"), Some(SequenceNumber::new(102)));
}

#[then("the command fails because the starting sequence is missing")]
fn fails_missing_sequence(#[from(world)] world: &SyncWorld) {
    match &*world.error() {
        CliError::MissingArgument { field, env } => {
            assert_eq!(*field, ARG_FROM_SEQUENCE);
            assert_eq!(*env, ENV_FROM_SEQUENCE);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[then("the command fails because the converter options conflict")]
fn fails_conflict(#[from(world)] world: &SyncWorld) {
    match &*world.error() {
        CliError::ConflictingArguments { first, second } => {
            assert_eq!(*first, ARG_OSM2RDF_IMAGE);
            assert_eq!(*second, ARG_OSM2RDF_BINARY);
        }
        other => panic!("expected ConflictingArguments, found {other:?}"),
    }
}

#[test]
fn scenario_indices_follow_feature_order() {
    let feature =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/features/sync_command.feature");
    let contents = fs::read_to_string(&feature).unwrap_or_else(|err| {
        panic!("failed to read feature file {feature:?}: {err}");
    });
    let titles: Vec<&str> = contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Scenario: "))
        .collect();
    assert_eq!(
        titles,
        [
            "syncing from an explicit sequence",
            "resuming without a recorded cursor",
            "rejecting conflicting converter options",
        ],
        "scenario order changed in feature file"
    );
}

#[scenario(path = "tests/features/sync_command.feature", index = 0)]
fn syncing_from_explicit_sequence(world: SyncWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sync_command.feature", index = 1)]
fn resuming_without_cursor(world: SyncWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/sync_command.feature", index = 2)]
fn rejecting_conflicting_converter(world: SyncWorld) {
    let _ = world;
}
