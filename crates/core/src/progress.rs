//! Progress reporting for ingestion.

use std::fmt;

/// Pipeline stage an event belongs to, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestStage {
    Container,
    Package,
    Toc,
    Images,
    Chapters,
    Links,
    Done,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::Package => "package",
            Self::Toc => "toc",
            Self::Images => "images",
            Self::Chapters => "chapters",
            Self::Links => "links",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted while a book is being ingested.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: IngestStage,
    pub current: u64,
    pub total: Option<u64>,
    pub message: Option<String>,
}

/// Receives progress updates. Implement this to drive progress bars or
/// browser status callbacks.
pub trait ProgressHandler {
    fn on_progress(&self, event: ProgressEvent);
}

/// Discards every event.
pub struct NoopProgress;

impl ProgressHandler for NoopProgress {
    fn on_progress(&self, _event: ProgressEvent) {}
}

/// Emit an event if a handler is provided.
pub fn emit_progress(
    handler: Option<&dyn ProgressHandler>,
    stage: IngestStage,
    current: u64,
    total: Option<u64>,
    message: Option<&str>,
) {
    if let Some(h) = handler {
        h.on_progress(ProgressEvent {
            stage,
            current,
            total,
            message: message.map(|s| s.to_string()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recorder(RefCell<Vec<(IngestStage, u64)>>);

    impl ProgressHandler for Recorder {
        fn on_progress(&self, event: ProgressEvent) {
            self.0.borrow_mut().push((event.stage, event.current));
        }
    }

    #[test]
    fn emit_reaches_handler() {
        let rec = Recorder(RefCell::new(Vec::new()));
        emit_progress(Some(&rec), IngestStage::Chapters, 2, Some(5), None);
        emit_progress(None, IngestStage::Done, 0, None, None);
        assert_eq!(*rec.0.borrow(), vec![(IngestStage::Chapters, 2)]);
        assert_eq!(IngestStage::Toc.to_string(), "toc");
    }
}
