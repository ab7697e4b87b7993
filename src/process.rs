//! Lifecycle scripts shipped inside the Kafka distribution.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;

use crate::config::{READINESS_ADDR, Resolver};
use crate::error::{ConfigError, ProcessError};

/// How long the broker gets to bind its listener when no probe address is set.
pub const GRACE_PERIOD: Duration = Duration::from_secs(5);

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// A shell invocation run from the Kafka home directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Script {
    pub command: &'static str,
}

impl Script {
    pub const ZOOKEEPER_START: Script = Script {
        command: "./bin/zookeeper-server-start.sh -daemon ./config/zookeeper.properties",
    };
    pub const ZOOKEEPER_STOP: Script = Script {
        command: "./bin/zookeeper-server-stop.sh",
    };
    pub const BROKER_START: Script = Script {
        command: "./bin/kafka-server-start.sh -daemon ./config/server.properties",
    };
    pub const BROKER_STOP: Script = Script {
        command: "./bin/kafka-server-stop.sh",
    };
}

/// What to wait for after the broker start script returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Sleep for a fixed amount of time.
    Delay(Duration),
    /// Poll until something accepts TCP connections on `addr`.
    Probe {
        addr: SocketAddr,
        timeout: Duration,
        interval: Duration,
    },
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness::Delay(GRACE_PERIOD)
    }
}

impl Readiness {
    pub fn probe(addr: SocketAddr) -> Self {
        Readiness::Probe {
            addr,
            timeout: PROBE_TIMEOUT,
            interval: PROBE_INTERVAL,
        }
    }

    /// Probes `KAFKA_READINESS_ADDR` when it is set, otherwise falls back to
    /// the fixed grace period.
    pub fn resolve(resolver: &Resolver) -> Result<Self, ConfigError> {
        let Some(addr) = resolver.get(READINESS_ADDR) else {
            return Ok(Readiness::default());
        };

        let resolved = addr
            .to_socket_addrs()
            .map_err(|e| ConfigError::ReadinessAddr(addr.clone(), e))?
            .next()
            .ok_or_else(|| ConfigError::ReadinessUnresolved(addr.clone()))?;

        Ok(Readiness::probe(resolved))
    }

    /// Blocks the calling thread until the broker is considered ready.
    pub fn wait(&self) -> Result<(), ProcessError> {
        match self {
            Readiness::Delay(delay) => {
                thread::sleep(*delay);
                Ok(())
            }
            Readiness::Probe {
                addr,
                timeout,
                interval,
            } => {
                let deadline = Instant::now() + *timeout;

                loop {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(ProcessError::NotReady(addr.to_string(), *timeout));
                    }

                    if TcpStream::connect_timeout(addr, left.min(*interval)).is_ok() {
                        return Ok(());
                    }

                    tracing::debug!("{} not accepting connections yet", addr);
                    thread::sleep(left.min(*interval));
                }
            }
        }
    }
}

/// Runs lifecycle scripts on behalf of tasks.
pub trait Runner: Send + Sync {
    /// Runs `script` with `home` as working directory and waits for it to exit.
    fn run(&self, home: &Utf8Path, script: &Script) -> Result<(), ProcessError>;

    /// Waits for the broker after it has been started.
    fn settle(&self, readiness: &Readiness) -> Result<(), ProcessError> {
        readiness.wait()
    }
}

/// Runs scripts through `bash -c`.
#[derive(Debug, Clone, Default)]
pub struct Shell;

impl Runner for Shell {
    fn run(&self, home: &Utf8Path, script: &Script) -> Result<(), ProcessError> {
        tracing::debug!("running `{}` in {}", script.command, home);

        let status = Command::new("bash")
            .arg("-c")
            .arg(script.command)
            .current_dir(home)
            .status()
            .map_err(|e| ProcessError::Spawn(script.command.to_string(), e))?;

        if status.success() {
            Ok(())
        } else {
            Err(ProcessError::Exit(script.command.to_string(), status))
        }
    }
}
