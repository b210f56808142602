use chrono::{DateTime, Utc};

// Progress of a pass, streamed to whoever renders status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassState {
    Checking { name: String },
    Updating { name: String },
    Complete { summary: PassSummary },
}

impl PassState {
    pub fn label(&self) -> String {
        match self {
            PassState::Checking { name } => format!("Checking: {name}"),
            PassState::Updating { name } => format!("Updating: {name}"),
            PassState::Complete { .. } => "Plugin update check complete".into(),
        }
    }
}

// What asked for a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Timer,
    Manual,
}

impl Trigger {
    pub fn label(self) -> &'static str {
        match self {
            Trigger::Startup => "startup",
            Trigger::Timer => "timer",
            Trigger::Manual => "manual",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub up_to_date: usize,
    pub available: usize,
    pub updated: usize,
    pub failed: usize,
}

impl PassSummary {
    pub fn started() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            up_to_date: 0,
            available: 0,
            updated: 0,
            failed: 0,
        }
    }

    pub fn checked(&self) -> usize {
        self.up_to_date + self.available + self.updated + self.failed
    }
}
