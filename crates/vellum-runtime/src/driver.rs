//! The frame driver: ticks a scene stack and persists it every frame.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use vellum_core::clock::{Clock, FrameTime};
use vellum_scenes::SceneStack;
use vellum_serde::registry::{self, Registry};
use vellum_serde::{Document, ObjectRef, Value, decode, encode};
use vellum_state::StateObject;

use crate::error::AppError;

/// What one frame produced.
#[derive(Debug)]
pub struct FrameReport {
    /// Frames ticked so far, including this one.
    pub frame: u64,
    /// Whether the stack changed since the previous frame.
    pub dirty: bool,
    /// The stack as persisted at the end of the frame.
    pub document: Document,
    /// Whether the stack is now empty.
    pub finished: bool,
}

/// Drives a [`SceneStack`] one frame at a time.
pub struct FrameDriver<C> {
    clock: C,
    frame: FrameTime,
    stack: Rc<RefCell<SceneStack>>,
    root: Value,
    dump_documents: bool,
}

impl<C: Clock> FrameDriver<C> {
    /// Creates a driver for `stack`, starting the frame clock now.
    #[must_use]
    pub fn new(clock: C, stack: SceneStack) -> Self {
        let frame = FrameTime::starting_at(clock.now());
        let stack = Rc::new(RefCell::new(stack));
        let root = Value::Object(ObjectRef::from_rc(Rc::clone(&stack)));
        Self {
            clock,
            frame,
            stack,
            root,
            dump_documents: false,
        }
    }

    /// Logs every frame's JSON document at `info` level.
    #[must_use]
    pub fn with_document_dump(mut self, dump_documents: bool) -> Self {
        self.dump_documents = dump_documents;
        self
    }

    /// The driven stack.
    #[must_use]
    pub fn stack(&self) -> &Rc<RefCell<SceneStack>> {
        &self.stack
    }

    /// Timing of the most recent frame.
    #[must_use]
    pub fn frame(&self) -> FrameTime {
        self.frame
    }

    /// Runs one frame against `registry`.
    ///
    /// The stack is updated with the new frame time, encoded, decoded back
    /// as a self-check and then marked clean.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Engine` if the update, encode or decode fails, or
    /// `AppError::Json` if the document cannot be dumped.
    pub fn tick(&mut self, registry: &Registry) -> Result<FrameReport, AppError> {
        self.frame.advance(self.clock.now());
        {
            let mut stack = self.stack.borrow_mut();
            stack.set_frame_time(self.frame);
            stack.update()?;
        }

        let document = encode(registry, &self.root)?;
        decode(registry, &document)?;
        if self.dump_documents {
            let json = serde_json::to_string(&document)?;
            info!(frame = self.frame.frame, document = %json, "persisted scene stack");
        }

        let stack = self.stack.borrow();
        let dirty = stack.is_dirty();
        stack.set_dirty(false)?;
        let report = FrameReport {
            frame: self.frame.frame,
            dirty,
            document,
            finished: stack.is_empty(),
        };
        debug!(
            frame = report.frame,
            dirty,
            scenes = stack.len(),
            "frame ticked"
        );
        Ok(report)
    }

    /// Ticks once per `interval` against the global registry until the
    /// stack empties or `max_frames` frames have run.
    ///
    /// Returns the number of frames ticked.
    ///
    /// # Errors
    ///
    /// Returns the first error a frame returns.
    pub async fn run(&mut self, interval: Duration, max_frames: Option<u64>) -> Result<u64, AppError> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = {
                let registry = registry::global();
                self.tick(&registry)?
            };
            if report.finished {
                info!(frames = report.frame, "scene stack is empty");
                return Ok(report.frame);
            }
            if max_frames.is_some_and(|max| report.frame >= max) {
                info!(frames = report.frame, "frame limit reached");
                return Ok(report.frame);
            }
        }
    }
}
