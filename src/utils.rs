use std::fmt::Display;
use std::time::Instant;

use console::Style;
use indicatif::ProgressStyle;

const ANSI_BLUE: Style = Style::new().blue();

const TEMPLATE_BAR: &str = "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
const TEMPLATE_TASK: &str = "{spinner:.blue} {msg}";

pub(crate) fn style_bar() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(TEMPLATE_BAR)
        .map(|style| style.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

pub(crate) fn style_task() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(TEMPLATE_TASK)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Elapsed time since `s`, formatted like `(+12ms)`.
pub fn as_overhead(s: Instant) -> impl Display {
    let f = format!("(+{}ms)", s.elapsed().as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Installs a `tracing` subscriber writing through the progress bars.
///
/// The filter defaults to `info` and can be overridden with `RUST_LOG`.
#[cfg(feature = "logging")]
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_indicatif::IndicatifLayer;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let indicatif = IndicatifLayer::new();
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(indicatif.get_stderr_writer()),
        )
        .with(indicatif)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overhead_format() {
        let text = console::strip_ansi_codes(&as_overhead(Instant::now()).to_string()).to_string();
        assert!(text.starts_with("(+"));
        assert!(text.ends_with("ms)"));
    }
}
