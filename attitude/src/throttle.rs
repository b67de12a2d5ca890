/// Down-counter that passes one sample out of every `delay + 1`.
///
/// Devices report faster than the output needs. Each incoming sample calls
/// [`ReportThrottle::tick`]; when the counter is at zero the sample is
/// emitted and the counter reloads, otherwise it counts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportThrottle {
    delay: u32,
    remaining: u32,
}

impl ReportThrottle {
    /// Throttle that emits the first sample immediately
    pub fn new(delay: u32) -> Self {
        Self {
            delay,
            remaining: 0,
        }
    }

    /// Throttle that skips `delay` samples before the first emission
    pub fn delayed(delay: u32) -> Self {
        Self {
            delay,
            remaining: delay,
        }
    }

    pub fn delay(&self) -> u32 {
        self.delay
    }

    /// Samples left to skip before the next emission
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Count one sample. Returns true if it should be emitted.
    pub fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            self.remaining = self.delay;
            true
        } else {
            self.remaining -= 1;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(mut throttle: ReportThrottle, n: usize) -> Vec<bool> {
        (0..n).map(|_| throttle.tick()).collect()
    }

    #[test]
    fn test_zero_delay_emits_everything() {
        assert!(pattern(ReportThrottle::new(0), 20).iter().all(|&e| e));
        assert!(pattern(ReportThrottle::delayed(0), 20).iter().all(|&e| e));
    }

    #[test]
    fn test_one_in_delay_plus_one() {
        let emitted = pattern(ReportThrottle::new(3), 400);
        assert_eq!(emitted.iter().filter(|&&e| e).count(), 100);
        assert_eq!(&emitted[..8], &[true, false, false, false, true, false, false, false]);
    }

    #[test]
    fn test_delayed_start() {
        let emitted = pattern(ReportThrottle::delayed(2), 6);
        assert_eq!(emitted, vec![false, false, true, false, false, true]);

        let emitted = pattern(ReportThrottle::delayed(3), 12);
        for window in emitted.chunks(4) {
            assert_eq!(window, &[false, false, false, true]);
        }
    }

    #[test]
    fn test_counter_state() {
        let mut throttle = ReportThrottle::new(2);
        assert_eq!(throttle.remaining(), 0);
        assert!(throttle.tick());
        assert_eq!(throttle.remaining(), 2);
        assert!(!throttle.tick());
        assert_eq!(throttle.remaining(), 1);
        assert_eq!(throttle.delay(), 2);
    }
}
