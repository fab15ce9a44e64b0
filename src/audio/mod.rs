// Audio module - channel mixing and the host-facing sample ring
//
// The APU resampler calls `mix` once per emitted sample and pushes the
// result into a fixed-size ring of unsigned 8-bit mono samples. The host
// drains the available prefix between frames; when the host falls behind,
// new samples are dropped rather than blocking the machine.

/// Capacity of the sample ring in bytes
pub const RING_CAPACITY: usize = 8192;

/// Combine the five channel levels through the non-linear mixer
///
/// `pulse1`/`pulse2` are 0-15 envelope levels, `triangle` 0-15, `noise`
/// 0-15 and `dmc` 0-127. The result is in 0.0..=1.0.
pub fn mix(pulse1: u32, pulse2: u32, triangle: u32, noise: u32, dmc: u32) -> f64 {
    let mut output = 0.0;

    let pulse_sum = pulse1 + pulse2;
    if pulse_sum > 0 {
        output += 95.88 / (100.0 + 8128.0 / pulse_sum as f64);
    }

    if triangle > 0 || noise > 0 || dmc > 0 {
        let tnd = triangle as f64 / 8227.0 + noise as f64 / 12241.0 + dmc as f64 / 22638.0;
        output += 159.79 / (100.0 + 1.0 / tnd);
    }

    output.min(1.0)
}

/// Fixed-capacity ring of 8-bit audio samples
///
/// Pushes drop silently when the ring is full; the machine never waits for
/// the host.
#[derive(Debug, Clone)]
pub struct SampleRing {
    buffer: Vec<u8>,
    head: usize,
    tail: usize,
    len: usize,
}

impl SampleRing {
    /// Create an empty ring with the fixed capacity
    pub fn new() -> Self {
        SampleRing {
            buffer: vec![0; RING_CAPACITY],
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Number of buffered samples
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no samples are buffered
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one sample, dropping it if the ring is full
    pub fn push(&mut self, sample: u8) {
        if self.len == RING_CAPACITY {
            return;
        }
        self.buffer[self.tail] = sample;
        self.tail = (self.tail + 1) % RING_CAPACITY;
        self.len += 1;
    }

    /// Move all buffered samples into `out`, oldest first
    pub fn drain_into(&mut self, out: &mut Vec<u8>) {
        while self.len > 0 {
            out.push(self.buffer[self.head]);
            self.head = (self.head + 1) % RING_CAPACITY;
            self.len -= 1;
        }
    }

    /// Discard all buffered samples
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }
}

impl Default for SampleRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_silence() {
        assert_eq!(mix(0, 0, 0, 0, 0), 0.0);
    }

    #[test]
    fn test_mix_is_monotonic_in_pulse() {
        let quiet = mix(4, 0, 0, 0, 0);
        let loud = mix(15, 15, 0, 0, 0);
        assert!(loud > quiet);
        assert!(loud <= 1.0);
    }

    #[test]
    fn test_mix_full_scale_is_clamped() {
        assert!(mix(15, 15, 15, 15, 127) <= 1.0);
    }

    #[test]
    fn test_ring_push_and_drain() {
        let mut ring = SampleRing::new();
        for i in 0..10u8 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 10);

        let mut out = Vec::new();
        ring.drain_into(&mut out);
        assert_eq!(out, (0..10).collect::<Vec<u8>>());
        assert!(ring.is_empty());
    }

    #[test]
    fn test_ring_drops_when_full() {
        let mut ring = SampleRing::new();
        for _ in 0..RING_CAPACITY {
            ring.push(0xAA);
        }
        ring.push(0x55);
        assert_eq!(ring.len(), RING_CAPACITY);

        let mut out = Vec::new();
        ring.drain_into(&mut out);
        assert_eq!(out.len(), RING_CAPACITY);
        assert!(out.iter().all(|&s| s == 0xAA), "overflow sample was dropped");
    }

    #[test]
    fn test_ring_wraps_around() {
        let mut ring = SampleRing::new();
        for i in 0..RING_CAPACITY {
            ring.push(i as u8);
        }
        let mut out = Vec::new();
        ring.drain_into(&mut out);

        ring.push(0x11);
        ring.push(0x22);
        out.clear();
        ring.drain_into(&mut out);
        assert_eq!(out, vec![0x11, 0x22]);
    }
}
