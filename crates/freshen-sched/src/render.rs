use std::collections::HashMap;
use std::io::Write;

use freshen_policy::{Status, StatusRecord};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;

use crate::live::BatchSummary;

/// Consumes merged per-path views on the render thread.
pub trait Renderer: Send {
    fn update(&mut self, view: &StatusRecord);

    fn finish(&mut self, _summary: &BatchSummary) {}
}

/// Renders nothing.
#[derive(Debug, Default)]
pub struct SilentRenderer;

impl Renderer for SilentRenderer {
    fn update(&mut self, _view: &StatusRecord) {}
}

/// One line per finished path, then a summary line.
pub struct PlainRenderer<W> {
    out: W,
}

impl<W: Write + Send> PlainRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Renderer for PlainRenderer<W> {
    fn update(&mut self, view: &StatusRecord) {
        let Some(status) = view.status else {
            return;
        };
        let path = view.path.as_deref().unwrap_or("-");
        let line = match &view.message {
            Some(message) => format!("{:<8} {path}: {message}", status_label(status)),
            None => format!("{:<8} {path}", status_label(status)),
        };
        if let Err(err) = writeln!(self.out, "{line}") {
            tracing::debug!(%err, "progress output closed");
        }
    }

    fn finish(&mut self, summary: &BatchSummary) {
        if let Err(err) = writeln!(self.out, "{}", summary_line(summary)) {
            tracing::debug!(%err, "progress output closed");
        }
    }
}

const PB_STYLE: &str =
    "{spinner:.blue} {prefix} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

static PB_TEMPLATE: Lazy<ProgressStyle> = Lazy::new(|| match ProgressStyle::with_template(PB_STYLE) {
    Ok(style) => style.tick_chars(TICK).progress_chars(PB_CHARS),
    Err(_) => ProgressStyle::default_bar(),
});

/// One progress bar per path.
pub struct BarRenderer {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl Default for BarRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BarRenderer {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: HashMap::new(),
        }
    }

    fn bar(&mut self, path: &str) -> &ProgressBar {
        self.bars.entry(path.to_string()).or_insert_with(|| {
            let pb = self.multi.add(ProgressBar::no_length());
            pb.set_style(PB_TEMPLATE.clone());
            pb.set_prefix(path.to_string());
            pb
        })
    }
}

impl Renderer for BarRenderer {
    fn update(&mut self, view: &StatusRecord) {
        let path = view.path.clone().unwrap_or_default();
        let pb = self.bar(&path);
        if let Some(size) = view.size {
            pb.set_length(size);
        }
        if let Some(done) = view.done {
            pb.set_position(done);
        }
        let Some(status) = view.status else {
            return;
        };
        if !pb.is_finished() {
            let mut message = status_label(status).to_string();
            if let Some(checksum) = view.checksum {
                message.push_str(&format!(" [checksum {}]", checksum_label(checksum)));
            }
            if let Some(detail) = &view.message {
                message.push_str(": ");
                message.push_str(detail);
            }
            match status {
                Status::Error => pb.abandon_with_message(message),
                _ => pb.finish_with_message(message),
            }
        }
    }

    fn finish(&mut self, summary: &BatchSummary) {
        if let Err(err) = self.multi.println(summary_line(summary)) {
            tracing::debug!(%err, "progress output closed");
        }
    }
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Done => "done",
        Status::Skipped => "skipped",
        Status::Error => "error",
    }
}

fn checksum_label(checksum: freshen_policy::ChecksumOutcome) -> &'static str {
    match checksum {
        freshen_policy::ChecksumOutcome::Ok => "ok",
        freshen_policy::ChecksumOutcome::Differs => "differs",
        freshen_policy::ChecksumOutcome::Unchecked => "-",
    }
}

fn summary_line(summary: &BatchSummary) -> String {
    format!(
        "{} done, {} skipped, {} errors",
        summary.done, summary.skipped, summary.errors
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshen_policy::ErrorKind;

    #[test]
    fn test_plain_renderer_prints_terminal_records_only() {
        let mut renderer = PlainRenderer::new(Vec::new());
        renderer.update(&StatusRecord::progress(1, Some(2)).with_path("a"));
        renderer.update(&StatusRecord::done().with_path("a"));
        renderer.update(&StatusRecord::error(ErrorKind::Io, "disk full").with_path("b"));
        renderer.finish(&BatchSummary {
            done: 1,
            errors: 1,
            ..BatchSummary::default()
        });

        let out = String::from_utf8(renderer.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "done     a");
        assert_eq!(lines[1], "error    b: [Io] disk full");
        assert_eq!(lines[2], "1 done, 0 skipped, 1 errors");
    }

    #[test]
    fn test_bar_renderer_finishes_bars() {
        let mut renderer = BarRenderer::new();
        renderer.multi.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        renderer.update(&StatusRecord::progress(5, Some(10)).with_path("a"));
        assert_eq!(renderer.bars["a"].position(), 5);
        assert_eq!(renderer.bars["a"].length(), Some(10));
        renderer.update(&StatusRecord::done().with_path("a"));
        assert!(renderer.bars["a"].is_finished());
    }
}
