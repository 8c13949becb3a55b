//! Pull-based stage interface shared by the receiver blocks.
//!
//! A stage states how much input it needs to produce a given number of output
//! items, then consumes and produces against the slices the driver hands it.
//! Stages never block: without enough input they report zero progress and get
//! called again once more data has accumulated.

/// Items consumed from the input and written to the output by one `work` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Work {
    pub consumed: usize,
    pub produced: usize,
}

impl Work {
    pub fn new(consumed: usize, produced: usize) -> Self {
        Self { consumed, produced }
    }

    pub fn is_idle(&self) -> bool {
        self.consumed == 0 && self.produced == 0
    }
}

pub trait Stage {
    type Input;
    type Output;

    /// Name used in invariant-violation errors
    const NAME: &'static str;

    /// Minimum number of input items needed before `noutput` items can be asked for.
    /// Must be monotone in `noutput`.
    fn required_input(&self, noutput: usize) -> usize;

    /// Consume a prefix of `input` and write at most `output.len()` items.
    fn work(&mut self, input: &[Self::Input], output: &mut [Self::Output]) -> Work;
}
