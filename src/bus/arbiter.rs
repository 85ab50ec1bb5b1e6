/// Round-robin grant over the caches attached to the bus. The scan starts just after the last
/// cache served.
#[derive(Debug, Clone, Default)]
pub struct RoundRobin {
    cursor: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn grant(&mut self, requests: &[bool]) -> Option<usize> {
        let n = requests.len();
        if n == 0 {
            return None;
        }
        let start = self.cursor % n;
        let granted = (0..n)
            .map(|offset| (start + offset) % n)
            .find(|&id| requests[id])?;
        self.cursor = (granted + 1) % n;
        Some(granted)
    }
}
