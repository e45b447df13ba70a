use indicatif::{ProgressBar, ProgressStyle};
use parcel::{AttachmentEvent, AttachmentId};
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

const PB_STYLE: &str =
    "{spinner:.blue} {prefix:>12.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {percent:>3}% {wide_msg}";

const TICK: &str = "⠁⠂⠄⡀⢀⠠⠐⠈ ";

const PB_CHARS: &str = "█▓▒░  ";

/// Bar resolution; fractions are scaled to this many steps.
const STEPS: u64 = 1000;

fn style() -> Option<ProgressStyle> {
    ProgressStyle::with_template(PB_STYLE)
        .ok()
        .map(|style| style.tick_chars(TICK).progress_chars(PB_CHARS))
}

/// Draws one attachment's progress from the event bus until it completes or
/// fails.
pub fn track(mut rx: Receiver<AttachmentEvent>, id: AttachmentId, prefix: &str) -> JoinHandle<()> {
    let pb = ProgressBar::new(STEPS);
    if let Some(style) = style() {
        pb.set_style(style);
    }
    pb.set_prefix(prefix.to_string());

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.attachment_id() != &id => {}
                Ok(AttachmentEvent::Progress { fraction, .. }) => pb.set_position((fraction * STEPS as f64) as u64),
                Ok(AttachmentEvent::Completed { bytes, .. }) => {
                    pb.set_position(STEPS);
                    pb.finish_with_message(format!("{bytes} bytes"));
                    break;
                }
                Ok(AttachmentEvent::Failed { reason, .. }) => {
                    pb.abandon_with_message(reason);
                    break;
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => {
                    pb.abandon();
                    break;
                }
            }
        }
    })
}
