use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use kafka_sandbox::archive::Fetch;
use kafka_sandbox::config::Settings;
use kafka_sandbox::plugin::{self, KAFKA, Kafka};
use kafka_sandbox::process::{GRACE_PERIOD, Readiness, Runner, Script, Shell};
use kafka_sandbox::{Blueprint, BuildError, FetchError, Mode, ProcessError, Project, TaskState};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Fetch(String),
    Run(Utf8PathBuf, &'static str),
    Settle(Readiness),
}

type Journal = Arc<Mutex<Vec<Call>>>;

struct MockFetch {
    journal: Journal,
    body: Vec<u8>,
}

impl Fetch for MockFetch {
    fn fetch(&self, url: &str, sink: &mut dyn Write) -> Result<u64, FetchError> {
        self.journal.lock().unwrap().push(Call::Fetch(url.to_string()));
        sink.write_all(&self.body)?;
        Ok(self.body.len() as u64)
    }
}

/// Records every call. With `shell` set, scripts really run from the
/// extracted home.
struct MockRunner {
    journal: Journal,
    shell: bool,
    wait: bool,
}

impl Runner for MockRunner {
    fn run(&self, home: &Utf8Path, script: &Script) -> Result<(), ProcessError> {
        self.journal
            .lock()
            .unwrap()
            .push(Call::Run(home.to_owned(), script.command));

        if self.shell { Shell.run(home, script) } else { Ok(()) }
    }

    fn settle(&self, readiness: &Readiness) -> Result<(), ProcessError> {
        self.journal
            .lock()
            .unwrap()
            .push(Call::Settle(readiness.clone()));

        if self.wait { readiness.wait() } else { Ok(()) }
    }
}

struct Sandbox {
    _dir: tempfile::TempDir,
    root: Utf8PathBuf,
    journal: Journal,
    project: Project<Kafka>,
    broker_start: &'static [u8],
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        let mut blueprint = Blueprint::new();
        blueprint.apply(&KAFKA);

        Self {
            _dir: dir,
            root,
            journal: Journal::default(),
            project: blueprint.finish().unwrap(),
            broker_start: b"#!/bin/bash\n",
        }
    }

    /// Ships `body` as the broker start script of the distribution.
    fn with_broker_start(mut self, body: &'static [u8]) -> Self {
        self.broker_start = body;
        self
    }

    fn work_dir(&self) -> Utf8PathBuf {
        self.root.join("work")
    }

    fn settings(&self) -> Settings {
        Settings::new("2.12", "2.4.0", self.work_dir())
            .unwrap()
            .with_download_url("https://mirror.test/kafka_2.12-2.4.0.tgz")
    }

    fn kafka(&self, shell: bool, wait: bool) -> Kafka {
        Kafka::new(self.settings())
            .with_fetch(Arc::new(MockFetch {
                journal: self.journal.clone(),
                body: distribution("kafka_2.12-2.4.0", self.broker_start),
            }))
            .with_runner(Arc::new(MockRunner {
                journal: self.journal.clone(),
                shell,
                wait,
            }))
    }

    fn calls(&self) -> Vec<Call> {
        self.journal.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.journal.lock().unwrap().clear();
    }
}

/// A gzipped tarball shaped like the Kafka distribution.
fn distribution(root: &str, broker_start: &[u8]) -> Vec<u8> {
    let gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    let mut builder = tar::Builder::new(gz);

    let files: [(&str, &[u8]); 4] = [
        ("bin/zookeeper-server-start.sh", b"#!/bin/bash\n"),
        ("bin/kafka-server-start.sh", broker_start),
        ("config/zookeeper.properties", b"clientPort=2181\n"),
        ("config/server.properties", b"broker.id=0\n"),
    ];

    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{root}/{name}"), data)
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

#[test]
fn start_from_scratch() {
    let sandbox = Sandbox::new();
    let kafka = sandbox.kafka(false, false);
    let home = kafka.settings.home();

    let report = sandbox
        .project
        .execute(&kafka, &[plugin::START], Mode::FailFast)
        .unwrap();

    assert_eq!(
        sandbox.calls(),
        vec![
            Call::Fetch("https://mirror.test/kafka_2.12-2.4.0.tgz".to_string()),
            Call::Run(home.clone(), Script::ZOOKEEPER_START.command),
            Call::Run(home.clone(), Script::BROKER_START.command),
            Call::Settle(Readiness::Delay(GRACE_PERIOD)),
        ]
    );

    let ran: Vec<_> = report
        .executions()
        .iter()
        .map(|e| (e.name.as_str(), e.state))
        .collect();
    assert_eq!(
        ran,
        vec![
            (plugin::DOWNLOAD, TaskState::Succeeded),
            (plugin::EXTRACT, TaskState::Succeeded),
            (plugin::START, TaskState::Succeeded),
            (plugin::ZOOKEEPER_START, TaskState::Succeeded),
            (plugin::BROKER_START, TaskState::Succeeded),
        ]
    );

    assert!(kafka.settings.archive().is_file());
    assert!(home.join("bin/kafka-server-start.sh").is_file());
    assert!(home.join("config/server.properties").is_file());
}

#[test]
fn second_start_uses_cached_archive() {
    let sandbox = Sandbox::new();
    let kafka = sandbox.kafka(false, false);

    sandbox
        .project
        .execute(&kafka, &[plugin::START], Mode::FailFast)
        .unwrap();
    sandbox.clear();

    sandbox
        .project
        .execute(&kafka, &[plugin::START], Mode::FailFast)
        .unwrap();

    let calls = sandbox.calls();
    assert!(!calls.iter().any(|c| matches!(c, Call::Fetch(_))));
    assert_eq!(calls.len(), 3);
}

#[test]
fn grace_period_elapses_before_success() {
    let sandbox = Sandbox::new();
    let kafka = sandbox
        .kafka(false, true)
        .with_readiness(Readiness::Delay(Duration::from_millis(200)));

    let start = Instant::now();
    sandbox
        .project
        .execute(&kafka, &[plugin::BROKER_START], Mode::FailFast)
        .unwrap();

    assert!(start.elapsed() >= Duration::from_millis(200));
}

#[cfg(unix)]
#[test]
fn failing_broker_start_skips_grace_period() {
    let sandbox = Sandbox::new().with_broker_start(b"#!/bin/bash\nexit 1\n");
    let kafka = sandbox.kafka(true, true);

    let start = Instant::now();
    let err = sandbox
        .project
        .execute(&kafka, &[plugin::START], Mode::FailFast)
        .unwrap_err();

    assert!(start.elapsed() < GRACE_PERIOD);
    assert!(!sandbox.calls().iter().any(|c| matches!(c, Call::Settle(_))));

    let BuildError::Failed { failures, report } = err else {
        panic!("expected a task failure");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, plugin::BROKER_START);
    match failures[0].error.downcast_ref::<ProcessError>() {
        Some(ProcessError::Exit(command, status)) => {
            assert_eq!(*command, Script::BROKER_START.command);
            assert_eq!(status.code(), Some(1));
        }
        other => panic!("expected a non-zero exit, got {other:?}"),
    }
    assert_eq!(report.state(plugin::ZOOKEEPER_START), Some(TaskState::Succeeded));
    assert_eq!(report.state(plugin::BROKER_START), Some(TaskState::Failed));
}

#[test]
fn stop_uses_zookeeper_script_twice_by_default() {
    let sandbox = Sandbox::new();
    let kafka = sandbox.kafka(false, false);
    let home = kafka.settings.home();

    sandbox
        .project
        .execute(&kafka, &[plugin::STOP], Mode::FailFast)
        .unwrap();

    let runs: Vec<_> = sandbox
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Run(..)))
        .collect();
    assert_eq!(
        runs,
        vec![
            Call::Run(home.clone(), Script::ZOOKEEPER_STOP.command),
            Call::Run(home.clone(), Script::ZOOKEEPER_STOP.command),
        ]
    );
}

#[test]
fn stop_with_broker_script() {
    let sandbox = Sandbox::new();
    let kafka = sandbox
        .kafka(false, false)
        .with_broker_stop(Script::BROKER_STOP);

    sandbox
        .project
        .execute(&kafka, &[plugin::STOP], Mode::FailFast)
        .unwrap();

    let commands: Vec<_> = sandbox
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Run(_, command) => Some(command),
            _ => None,
        })
        .collect();
    assert_eq!(
        commands,
        vec![Script::BROKER_STOP.command, Script::ZOOKEEPER_STOP.command]
    );
}

#[cfg(unix)]
#[test]
fn clean_leaves_symlink_targets_alone() {
    let sandbox = Sandbox::new();
    let kafka = sandbox.kafka(false, false);

    sandbox
        .project
        .execute(&kafka, &[plugin::EXTRACT], Mode::FailFast)
        .unwrap();

    let outside = sandbox.root.join("outside.txt");
    fs::write(&outside, b"keep me").unwrap();
    std::os::unix::fs::symlink(&outside, kafka.settings.home().join("link.txt")).unwrap();

    sandbox
        .project
        .execute(&kafka, &[plugin::CLEAN], Mode::FailFast)
        .unwrap();

    assert!(!sandbox.work_dir().exists());
    assert_eq!(fs::read(&outside).unwrap(), b"keep me");
}

#[test]
fn remove_tasks_target_their_paths() {
    let sandbox = Sandbox::new();
    let kafka = sandbox.kafka(false, false);

    sandbox
        .project
        .execute(&kafka, &[plugin::EXTRACT], Mode::FailFast)
        .unwrap();

    sandbox
        .project
        .execute(&kafka, &[plugin::RM_TAR], Mode::FailFast)
        .unwrap();
    assert!(!kafka.settings.archive().exists());
    assert!(kafka.settings.home().is_dir());

    sandbox
        .project
        .execute(&kafka, &[plugin::RM_HOME], Mode::FailFast)
        .unwrap();
    assert!(!kafka.settings.home().exists());
    assert!(sandbox.work_dir().is_dir());

    // Nothing left to remove is not an error.
    sandbox
        .project
        .execute(&kafka, &[plugin::RM_HOME, plugin::RM_TAR], Mode::FailFast)
        .unwrap();
}

#[test]
fn info_touches_nothing() {
    let sandbox = Sandbox::new();
    let kafka = sandbox.kafka(false, false);

    sandbox
        .project
        .execute(&kafka, &[plugin::INFO], Mode::FailFast)
        .unwrap();

    assert!(sandbox.calls().is_empty());
    assert!(!sandbox.work_dir().exists());
}
