//! Section-aware reducer that turns lexed lines into a [`PlanSnapshot`].
//!
//! Parsing is total and stateless: every call re-scans the whole text. The
//! document is edited out-of-band by the agents, so there is nothing to diff
//! against.

use crate::core::lexer::{LineTag, lex};
use crate::core::types::{PlanSnapshot, Task};

/// Heading text prefix that opens the task section.
pub const SECTION_KEYWORD: &str = "TODO";

/// Annotation marker left by the reviewer when it wants another pass.
pub const REVIEW_FEEDBACK_MARKER: &str = "review: status=request_changes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionState {
    Outside,
    Inside { level: usize },
}

/// Single-pass reducer over line tags.
#[derive(Debug)]
struct Reducer {
    state: SectionState,
    tasks: Vec<Task>,
    /// Index of the task that annotations currently attach to.
    current: Option<usize>,
}

impl Reducer {
    fn new() -> Self {
        Self {
            state: SectionState::Outside,
            tasks: Vec::new(),
            current: None,
        }
    }

    fn feed(&mut self, tag: LineTag<'_>) {
        match (self.state, tag) {
            (SectionState::Outside, LineTag::Heading { level, text }) => {
                if text.starts_with(SECTION_KEYWORD) {
                    self.state = SectionState::Inside { level };
                    self.current = None;
                }
            }
            (SectionState::Outside, _) => {}
            (SectionState::Inside { level }, LineTag::Heading { level: seen, text })
                if seen == level =>
            {
                self.state = SectionState::Outside;
                self.current = None;
                // A sibling heading can itself open a new task section.
                self.feed(LineTag::Heading { level: seen, text });
            }
            (SectionState::Inside { .. }, LineTag::TaskDone(text)) => {
                self.open_task(Task {
                    done: true,
                    ..Task::pending(text)
                });
            }
            (SectionState::Inside { .. }, LineTag::TaskPending(text)) => {
                self.open_task(Task::pending(text));
            }
            (SectionState::Inside { .. }, LineTag::TaskBlocked(text)) => {
                self.open_task(Task {
                    blocked: true,
                    ..Task::pending(text)
                });
            }
            (SectionState::Inside { .. }, annotation) => self.annotate(annotation),
        }
    }

    fn open_task(&mut self, task: Task) {
        let marker_in_text = task.text.contains(REVIEW_FEEDBACK_MARKER);
        self.tasks.push(task);
        let index = self.tasks.len() - 1;
        self.current = Some(index);
        if marker_in_text {
            self.tasks[index].has_review_feedback = true;
        }
    }

    fn annotate(&mut self, tag: LineTag<'_>) {
        let Some(index) = self.current else {
            return;
        };
        if tag
            .text()
            .is_some_and(|text| text.contains(REVIEW_FEEDBACK_MARKER))
        {
            self.tasks[index].has_review_feedback = true;
        }
    }

    fn finish(self) -> PlanSnapshot {
        PlanSnapshot::from_tasks(self.tasks)
    }
}

/// Parse plan document text into a snapshot.
pub fn parse(text: &str) -> PlanSnapshot {
    let mut reducer = Reducer::new();
    for tag in lex(text) {
        reducer.feed(tag);
    }
    reducer.finish()
}
