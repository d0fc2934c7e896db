use std::io::Write;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use sitesmith::{
    cas::Cid,
    chat::{AssemblerListener, AssemblerState, Phase},
    upload::{PutOutcome, Reporter},
};

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:20!} [{bar:40!.bright.yellow/dim.white}] {pos:>4}/{len:4} {wide_msg:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╾─")
}

/// Renders the progress of an upload as two progress bars, one for the existence checks and one
/// for the writes.
pub struct IndicatifReporter {
    multi_progress: MultiProgress,
    probe: Mutex<Option<ProgressBar>>,
    upload: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    pub fn new(multi_progress: MultiProgress) -> Self {
        Self {
            multi_progress,
            probe: Mutex::default(),
            upload: Mutex::default(),
        }
    }

    fn add_bar(&self, prefix: &'static str, total: usize) -> ProgressBar {
        self.multi_progress.add(
            ProgressBar::new(total as u64)
                .with_style(bar_style())
                .with_prefix(prefix),
        )
    }
}

impl Reporter for IndicatifReporter {
    fn on_probe_start(&self, total: usize) {
        *self.probe.lock() = Some(self.add_bar("checking blocks", total));
    }

    fn on_probe_complete(&self, cid: &Cid, present: bool) {
        if let Some(bar) = self.probe.lock().as_ref() {
            if present {
                bar.set_message(format!("{cid} is present"));
            }
            bar.inc(1);
        }
    }

    fn on_probes_done(&self) {
        if let Some(bar) = self.probe.lock().take() {
            bar.finish_and_clear();
        }
    }

    fn on_upload_start(&self, total: usize) {
        *self.upload.lock() = Some(self.add_bar("uploading blocks", total));
    }

    fn on_block_uploaded(&self, cid: &Cid, outcome: PutOutcome) {
        if let Some(bar) = self.upload.lock().as_ref() {
            bar.set_message(match outcome {
                PutOutcome::Written => cid.to_string(),
                PutOutcome::AlreadyApplied => format!("{cid} (already applied)"),
            });
            bar.inc(1);
        }
    }

    fn on_upload_complete(&self) {
        for bar in [self.probe.lock().take(), self.upload.lock().take()]
            .into_iter()
            .flatten()
        {
            bar.finish_and_clear();
        }
    }
}

/// Prints the assistant message to stdout while it streams in.
pub struct StdoutListener {
    spinner: Mutex<Option<ProgressBar>>,
    multi_progress: MultiProgress,
}

impl StdoutListener {
    pub fn new(multi_progress: MultiProgress) -> Self {
        Self {
            spinner: Mutex::default(),
            multi_progress,
        }
    }
}

impl AssemblerListener for StdoutListener {
    fn on_state_change(&self, state: AssemblerState) {
        let mut spinner = self.spinner.lock();
        if let Some(spinner) = spinner.take() {
            spinner.finish_and_clear();
        }
        if state == AssemblerState::Recovering {
            let bar = self.multi_progress.add(ProgressBar::new_spinner());
            bar.set_message("the conversation is too long, summarizing");
            bar.enable_steady_tick(std::time::Duration::from_millis(100));
            *spinner = Some(bar);
        }
    }

    fn on_delta(&self, phase: Phase, delta: &str) {
        // Only the answer to the user is shown, not the summary of the conversation.
        if phase == Phase::Summary {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(delta.as_bytes());
        let _ = stdout.flush();
    }
}
