/// Run-scoped mutable state threaded through the trace readers.
///
/// Holds the counter that numbers records lacking an embedded sequence
/// number and the two baselines that reject receiver-log records stamped
/// earlier than the packet could have been sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    next_sequence: u32,
    send_baseline: Option<f64>,
    normal_baseline: Option<f64>,
}

/// Outcome of checking an observed receiver timestamp against the baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    BeforeSend,
    BeforeNormal,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            send_baseline: None,
            normal_baseline: None,
        }
    }

    /// Each trace numbers its own entries from 1.
    pub fn begin_trace(&mut self) {
        self.next_sequence = 1;
    }

    pub fn next_sequence(&mut self) -> u32 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    pub fn set_send_baseline(&mut self, ts: Option<f64>) {
        self.send_baseline = ts;
    }

    pub fn set_normal_baseline(&mut self, ts: Option<f64>) {
        self.normal_baseline = ts;
    }

    pub fn send_baseline(&self) -> Option<f64> {
        self.send_baseline
    }

    pub fn normal_baseline(&self) -> Option<f64> {
        self.normal_baseline
    }

    pub fn admit(&self, observed: f64) -> Admission {
        if self.send_baseline.is_some_and(|baseline| observed < baseline) {
            return Admission::BeforeSend;
        }
        if self.normal_baseline.is_some_and(|baseline| observed < baseline) {
            return Admission::BeforeNormal;
        }
        Admission::Admitted
    }
}
