use std::fmt;

/// How many jobs a producer sends per cycle unless told otherwise.
pub const JOB_COUNT: u32 = 3;

/// A unit of work: just its ordinal, starting at 1.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Job(u32);

impl Job {
    pub fn new(id: u32) -> Job {
        Job(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }

    /// Jobs `1..=count`, in increasing order.
    pub fn sequence(count: u32) -> impl Iterator<Item = Job> {
        (1..=count).map(Job)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}
