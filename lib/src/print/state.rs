//! Pipeline steps and their started/done bookkeeping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// A step of a linear pipeline.
pub trait PipelineStep: Copy + Eq + fmt::Debug {
    const COUNT: usize;

    fn index(self) -> usize;
}

/// Steps run once per object, in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectStep {
    Assembly,
    Hollowing,
    DrillHoles,
    ObjectSlice,
    SupportPoints,
    SupportTree,
    Pad,
    SliceSupports,
}

impl ObjectStep {
    pub const ALL: [ObjectStep; 8] = [
        ObjectStep::Assembly,
        ObjectStep::Hollowing,
        ObjectStep::DrillHoles,
        ObjectStep::ObjectSlice,
        ObjectStep::SupportPoints,
        ObjectStep::SupportTree,
        ObjectStep::Pad,
        ObjectStep::SliceSupports,
    ];
}

impl PipelineStep for ObjectStep {
    const COUNT: usize = 8;

    fn index(self) -> usize {
        self as usize
    }
}

/// Steps run once per print after all objects are done.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrintStep {
    MergeSlicesAndEval,
    Rasterize,
}

impl PrintStep {
    pub const ALL: [PrintStep; 2] = [PrintStep::MergeSlicesAndEval, PrintStep::Rasterize];
}

impl PipelineStep for PrintStep {
    const COUNT: usize = 2;

    fn index(self) -> usize {
        self as usize
    }
}

/// Started/done flags of every step of a pipeline.
///
/// Invalidating a step also invalidates all later steps.
#[derive(Clone, Debug)]
pub struct StepState<S: PipelineStep> {
    started: Vec<bool>,
    done: Vec<bool>,
    _step: PhantomData<S>,
}

impl<S: PipelineStep> StepState<S> {
    pub fn new() -> Self {
        Self {
            started: vec![false; S::COUNT],
            done: vec![false; S::COUNT],
            _step: PhantomData,
        }
    }

    pub fn is_started(&self, step: S) -> bool {
        self.started[step.index()]
    }

    pub fn is_done(&self, step: S) -> bool {
        self.done[step.index()]
    }

    pub fn set_started(&mut self, step: S) {
        self.started[step.index()] = true;
        self.done[step.index()] = false;
    }

    pub fn set_done(&mut self, step: S) {
        self.started[step.index()] = true;
        self.done[step.index()] = true;
    }

    /// Reset `step` and everything after it. Returns true if any of them
    /// had been started.
    pub fn invalidate(&mut self, step: S) -> bool {
        let from = step.index();
        let any = self.started[from..].iter().any(|&s| s);
        self.started[from..].iter_mut().for_each(|s| *s = false);
        self.done[from..].iter_mut().for_each(|d| *d = false);
        any
    }

    pub fn invalidate_all(&mut self) -> bool {
        let any = self.started.iter().any(|&s| s);
        self.started.iter_mut().for_each(|s| *s = false);
        self.done.iter_mut().for_each(|d| *d = false);
        any
    }

    /// True when every step is done.
    pub fn all_done(&self) -> bool {
        self.done.iter().all(|&d| d)
    }
}

impl<S: PipelineStep> Default for StepState<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order() {
        assert!(ObjectStep::Assembly < ObjectStep::SliceSupports);
        assert_eq!(ObjectStep::Pad.index(), 6);
        assert_eq!(PrintStep::Rasterize.index(), 1);
        assert_eq!(ObjectStep::ALL.len(), ObjectStep::COUNT);
    }

    #[test]
    fn test_invalidate_cascades() {
        let mut state = StepState::<ObjectStep>::new();
        for step in ObjectStep::ALL {
            state.set_done(step);
        }
        assert!(state.all_done());

        assert!(state.invalidate(ObjectStep::ObjectSlice));
        assert!(state.is_done(ObjectStep::DrillHoles));
        assert!(!state.is_done(ObjectStep::ObjectSlice));
        assert!(!state.is_started(ObjectStep::SliceSupports));

        // Nothing left to invalidate downstream.
        assert!(!state.invalidate(ObjectStep::Pad));
        assert!(state.invalidate_all());
        assert!(!state.is_done(ObjectStep::Assembly));
    }

    #[test]
    fn test_started_is_not_done() {
        let mut state = StepState::<PrintStep>::new();
        state.set_started(PrintStep::MergeSlicesAndEval);
        assert!(state.is_started(PrintStep::MergeSlicesAndEval));
        assert!(!state.is_done(PrintStep::MergeSlicesAndEval));
    }
}
