//! Timing checkpoints for multi-stage operations.
//!
//! A [`Tracer`] records named stages as an operation progresses. The first
//! stage spans the whole operation; later stages segment it. On
//! [`Tracer::finish`] one trace event per stage is published in the order
//! the stages were entered, so observers see the checkpoint sequence even
//! for operations that bailed out early.

use std::time::Instant;

use veilnet_core::event::{AppEvent, TraceEvent};

use crate::Publisher;

struct Stage {
    key: String,
    entered: Instant,
}

/// Collects stage timings for a single operation.
pub struct Tracer {
    stages: Vec<Stage>,
}

impl Tracer {
    /// Start tracing. `key` names the stage covering the whole operation.
    pub fn new(key: &str) -> Self {
        Self {
            stages: vec![Stage {
                key: key.to_string(),
                entered: Instant::now(),
            }],
        }
    }

    /// Enter the next stage.
    pub fn stage(&mut self, key: &str) {
        self.stages.push(Stage {
            key: key.to_string(),
            entered: Instant::now(),
        });
    }

    /// Publish one trace event per entered stage, in entry order.
    pub fn finish(self, publisher: &dyn Publisher, id: &str) {
        let now = Instant::now();
        for (i, stage) in self.stages.iter().enumerate() {
            // The opening stage spans the whole operation; each later stage
            // ends where its successor begins.
            let end = if i == 0 || i + 1 == self.stages.len() {
                now
            } else {
                self.stages[i + 1].entered
            };
            publisher.publish(AppEvent::Trace(TraceEvent {
                id: id.to_string(),
                key: stage.key.clone(),
                duration: end.duration_since(stage.entered),
            }));
        }
    }
}
