//! The Kafka tasks.
//!
//! Registering [`KAFKA`] in a [`Blueprint`] adds the twelve tasks below, all in
//! the [`GROUP`] group. Dependencies point downwards:
//!
//! ```text
//! kafkaStart ─finalized by─▶ kafkaZookeeperStart, kafkaBrokerStart
//! kafkaBrokerStart ─▶ kafkaZookeeperStart ─▶ kafkaExtract ─▶ kafkaDownload
//! kafkaStop ─finalized by─▶ kafkaZookeeperStop (declared twice)
//! kafkaZookeeperStop ─▶ kafkaBrokerStop ─▶ kafkaExtract
//! kafkaInfo, kafkaClean, kafkaRmTar, kafkaRmHome
//! ```

use std::sync::Arc;

use crate::archive::{self, Cached, Fetch, Http};
use crate::blueprint::Blueprint;
use crate::config::Settings;
use crate::process::{Readiness, Runner, Script, Shell};

pub const GROUP: &str = "Kafka";

pub const INFO: &str = "kafkaInfo";
pub const CLEAN: &str = "kafkaClean";
pub const RM_TAR: &str = "kafkaRmTar";
pub const RM_HOME: &str = "kafkaRmHome";
pub const DOWNLOAD: &str = "kafkaDownload";
pub const EXTRACT: &str = "kafkaExtract";
pub const ZOOKEEPER_START: &str = "kafkaZookeeperStart";
pub const BROKER_START: &str = "kafkaBrokerStart";
pub const START: &str = "kafkaStart";
pub const BROKER_STOP: &str = "kafkaBrokerStop";
pub const ZOOKEEPER_STOP: &str = "kafkaZookeeperStop";
pub const STOP: &str = "kafkaStop";

/// A function adding a coherent set of tasks to a blueprint.
pub struct Plugin<G> {
    pub(crate) func: fn(&mut Blueprint<G>),
}

impl<G> Plugin<G> {
    pub const fn new(func: fn(&mut Blueprint<G>)) -> Self {
        Self { func }
    }
}

/// Provisioning tasks for a local Kafka installation.
pub const KAFKA: Plugin<Kafka> = Plugin::new(register);

/// Data shared by the Kafka tasks.
pub struct Kafka {
    pub settings: Settings,
    /// What `kafkaBrokerStart` waits for after the start script returns.
    pub readiness: Readiness,
    /// Script run by `kafkaBrokerStop`.
    ///
    /// Defaults to [`Script::ZOOKEEPER_STOP`], matching the established
    /// behaviour of this task even though [`Script::BROKER_STOP`] looks like
    /// the intended one.
    pub broker_stop: Script,
    runner: Arc<dyn Runner>,
    fetch: Arc<dyn Fetch>,
}

impl Kafka {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            readiness: Readiness::default(),
            broker_stop: Script::ZOOKEEPER_STOP,
            runner: Arc::new(Shell),
            fetch: Arc::new(Http::new()),
        }
    }

    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn with_broker_stop(mut self, script: Script) -> Self {
        self.broker_stop = script;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = fetch;
        self
    }
}

fn register(blueprint: &mut Blueprint<Kafka>) {
    blueprint
        .task(INFO)
        .group(GROUP)
        .description("Print kafka-sandbox configuration")
        .run(|ctx| {
            println!("{}", ctx.data.settings);
            Ok(())
        });

    blueprint
        .task(CLEAN)
        .group(GROUP)
        .description("Cleanup all kafka-sandbox files and directories")
        .run(|ctx| {
            let work_dir = ctx.data.settings.work_dir();
            archive::remove(work_dir)?;
            tracing::info!("removed: {}", work_dir);
            Ok(())
        });

    blueprint
        .task(RM_TAR)
        .group(GROUP)
        .description("Remove kafka archive")
        .run(|ctx| {
            let tar = ctx.data.settings.archive();
            archive::remove(&tar)?;
            tracing::info!("removed: {}", tar);
            Ok(())
        });

    blueprint
        .task(RM_HOME)
        .group(GROUP)
        .description("Remove kafka home directory")
        .run(|ctx| {
            let home = ctx.data.settings.home();
            archive::remove(&home)?;
            tracing::info!("removed: {}", home);
            Ok(())
        });

    blueprint
        .task(DOWNLOAD)
        .group(GROUP)
        .description("Download kafka binaries")
        .run(|ctx| {
            let kafka = ctx.data;
            let url = kafka.settings.download_url();

            if let Cached::Downloaded(bytes) =
                archive::ensure_archive(&kafka.settings.archive(), &url, kafka.fetch.as_ref())?
            {
                tracing::info!("downloaded {} ({} bytes)", kafka.settings.filename(), bytes);
            }
            Ok(())
        });

    blueprint
        .task(EXTRACT)
        .group(GROUP)
        .description("Extract kafka tar archive into kafka home")
        .depends_on(DOWNLOAD)
        .run(|ctx| {
            let settings = &ctx.data.settings;
            archive::extract(&settings.archive(), settings.work_dir())?;
            tracing::info!("check kafka home in: {}", settings.home());
            Ok(())
        });

    blueprint
        .task(ZOOKEEPER_START)
        .group(GROUP)
        .description("Start zooKeeper server")
        .depends_on(EXTRACT)
        .run(|ctx| {
            let kafka = ctx.data;
            kafka
                .runner
                .run(&kafka.settings.home(), &Script::ZOOKEEPER_START)?;
            tracing::info!("starting up zookeeper...");
            Ok(())
        });

    blueprint
        .task(BROKER_START)
        .group(GROUP)
        .description("Start kafka broker")
        .depends_on(ZOOKEEPER_START)
        .runs_after(ZOOKEEPER_START)
        .run(|ctx| {
            let kafka = ctx.data;
            kafka
                .runner
                .run(&kafka.settings.home(), &Script::BROKER_START)?;
            tracing::info!("starting up kafka broker...");
            kafka.runner.settle(&kafka.readiness)?;
            Ok(())
        });

    blueprint
        .task(START)
        .group(GROUP)
        .description("Start kafka")
        .finalized_by(ZOOKEEPER_START)
        .finalized_by(BROKER_START)
        .run(|_| {
            tracing::info!("starting kafka...");
            Ok(())
        });

    blueprint
        .task(BROKER_STOP)
        .group(GROUP)
        .description("Stop kafka broker")
        .depends_on(EXTRACT)
        .run(|ctx| {
            let kafka = ctx.data;
            kafka.runner.run(&kafka.settings.home(), &kafka.broker_stop)?;
            tracing::info!("shutting down broker...");
            Ok(())
        });

    blueprint
        .task(ZOOKEEPER_STOP)
        .group(GROUP)
        .description("Stop zooKeeper server")
        .depends_on(BROKER_STOP)
        .run(|ctx| {
            let kafka = ctx.data;
            kafka
                .runner
                .run(&kafka.settings.home(), &Script::ZOOKEEPER_STOP)?;
            tracing::info!("shutting down zookeeper...");
            Ok(())
        });

    // Finalized by the ZooKeeper stop twice, the broker stop is only reached
    // through its dependency.
    blueprint
        .task(STOP)
        .group(GROUP)
        .description("Stop kafka")
        .finalized_by(ZOOKEEPER_STOP)
        .finalized_by(ZOOKEEPER_STOP)
        .run(|_| {
            tracing::info!("shutting down kafka...");
            Ok(())
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Project;

    fn project() -> Project<Kafka> {
        let mut blueprint = Blueprint::new();
        blueprint.apply(&KAFKA);
        blueprint.finish().unwrap()
    }

    #[test]
    fn test_all_tasks_in_group() {
        let project = project();
        let names: Vec<_> = project.tasks().map(|t| t.name()).collect();

        assert_eq!(
            names,
            vec![
                INFO,
                CLEAN,
                RM_TAR,
                RM_HOME,
                DOWNLOAD,
                EXTRACT,
                ZOOKEEPER_START,
                BROKER_START,
                START,
                BROKER_STOP,
                ZOOKEEPER_STOP,
                STOP
            ]
        );
        assert!(project.tasks().all(|t| t.group() == Some(GROUP)));
        assert!(project.tasks().all(|t| t.description().is_some()));
    }

    #[test]
    fn test_start_plan() {
        assert_eq!(
            project().plan(&[START]).unwrap(),
            vec![DOWNLOAD, EXTRACT, START, ZOOKEEPER_START, BROKER_START]
        );
    }

    #[test]
    fn test_broker_start_plan() {
        assert_eq!(
            project().plan(&[BROKER_START]).unwrap(),
            vec![DOWNLOAD, EXTRACT, ZOOKEEPER_START, BROKER_START]
        );
    }

    #[test]
    fn test_stop_plan() {
        assert_eq!(
            project().plan(&[STOP]).unwrap(),
            vec![DOWNLOAD, EXTRACT, BROKER_STOP, STOP, ZOOKEEPER_STOP]
        );
    }

    #[test]
    fn test_standalone_tasks() {
        let project = project();
        for name in [INFO, CLEAN, RM_TAR, RM_HOME, DOWNLOAD] {
            assert_eq!(project.plan(&[name]).unwrap(), vec![name]);
        }
    }
}
