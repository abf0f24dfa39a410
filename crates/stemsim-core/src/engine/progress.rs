#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Runs `stage` between a `PhaseStart` and a `PhaseFinish`.
    ///
    /// `PhaseFinish` is reported whether or not the stage succeeds.
    pub fn phase<T>(&self, name: &'static str, stage: impl FnOnce() -> T) -> T {
        self.report(Progress::PhaseStart { name });
        let output = stage();
        self.report(Progress::PhaseFinish);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_is_silent() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::Message("ignored".to_string()));
        assert_eq!(reporter.phase("noop", || 7), 7);
    }

    #[test]
    fn phase_brackets_the_stage_with_start_and_finish() {
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(event);
        }));

        let value = reporter.phase("Probe", || {
            reporter.report(Progress::Message("forming".to_string()));
            3
        });
        drop(reporter);

        assert_eq!(value, 3);
        assert_eq!(
            events.into_inner().unwrap(),
            vec![
                Progress::PhaseStart { name: "Probe" },
                Progress::Message("forming".to_string()),
                Progress::PhaseFinish,
            ]
        );
    }
}
