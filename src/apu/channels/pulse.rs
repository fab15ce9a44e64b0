//! Pulse wave channel

use serde::{Deserialize, Serialize};

use crate::apu::components::Envelope;
use crate::apu::constants::{LENGTH_TABLE, PULSE_SEQUENCE_TABLE};

/// Pulse wave channel (used for both Pulse 1 and Pulse 2)
///
/// The two pulse channels differ only in the sweep unit's negate arithmetic:
/// channel 1 uses one's complement, channel 2 two's complement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pulse {
    /// Channel enable (from $4015)
    pub enable: bool,

    /// Envelope generator
    pub envelope: Envelope,

    /// Sweep unit enable
    pub sweep_enable: bool,
    /// Negate the period delta
    pub sweep_negate: bool,
    /// Shift amount producing the period delta
    pub sweep_shift: u8,
    /// Sweep divider reload value
    pub sweep_divider_period: u8,
    /// Sweep divider count
    pub sweep_divider_count: u8,
    /// Reload the sweep divider on the next half-frame
    pub sweep_divider_reset: bool,

    /// Sequencer clock generator period
    pub timer_period: u16,
    /// Sequencer clock generator timer
    pub timer: u16,
    /// Duty sequence selector (0-3)
    pub sequence_mode: u8,
    /// Duty sequence position (0-7)
    pub sequence_time: u8,

    /// Length counter decrement enable
    pub length_enable: bool,
    /// Length counter value
    pub length: u8,

    /// Sweep negate uses one's complement (pulse 1 only)
    negate_ones_complement: bool,
}

impl Pulse {
    /// Create a pulse channel; `channel_number` is 1 or 2
    pub fn new(channel_number: u8) -> Self {
        Pulse {
            enable: false,
            envelope: Envelope::default(),
            sweep_enable: false,
            sweep_negate: false,
            sweep_shift: 0,
            sweep_divider_period: 0,
            sweep_divider_count: 0,
            sweep_divider_reset: false,
            timer_period: 0,
            timer: 0,
            sequence_mode: 0,
            sequence_time: 0,
            length_enable: false,
            length: 0,
            negate_ones_complement: channel_number == 1,
        }
    }

    /// Write $4000/$4004: duty, length halt, envelope
    pub fn write_control(&mut self, data: u8) {
        self.sequence_mode = (data >> 6) & 0x03;
        self.length_enable = data & 0x20 == 0;
        self.envelope.write_control(data);
    }

    /// Write $4001/$4005: sweep unit
    pub fn write_sweep(&mut self, data: u8) {
        self.sweep_enable = data & 0x80 != 0;
        self.sweep_divider_period = (data >> 4) & 0x07;
        self.sweep_negate = data & 0x08 != 0;
        self.sweep_shift = data & 0x07;
        self.sweep_divider_reset = true;
    }

    /// Write $4002/$4006: timer period low byte
    pub fn write_timer_low(&mut self, data: u8) {
        self.timer_period = (self.timer_period & 0xFF00) | u16::from(data);
    }

    /// Write $4003/$4007: timer period high bits and length counter load
    pub fn write_timer_high(&mut self, data: u8) {
        self.timer_period = (self.timer_period & 0x00FF) | u16::from(data & 0x07) << 8;
        // Length counter value can only be changed while the unit is enabled.
        if self.enable {
            self.length = LENGTH_TABLE[usize::from(data >> 3)];
        }
        self.envelope.reset = true;
        self.sequence_time = 0;
    }

    /// Target period the sweep unit would commit
    pub fn sweep_target_period(&self) -> u16 {
        let period = i32::from(self.timer_period);
        let delta = period >> self.sweep_shift;

        let target = if self.sweep_negate {
            period - delta - i32::from(self.negate_ones_complement)
        } else {
            period + delta
        };

        target.max(0) as u16
    }

    /// True when the sweep unit forces the channel silent
    ///
    /// Muting only gates the output; the sequencer keeps running.
    pub fn is_muted_by_sweep(&self) -> bool {
        self.timer_period < 8 || self.sweep_target_period() > 0x7FF
    }

    /// Quarter-frame event: clock the envelope
    pub fn quarter_frame(&mut self) {
        self.envelope.quarter_frame();
    }

    /// Half-frame event: clock the sweep unit and length counter
    pub fn half_frame(&mut self) {
        let target_period = self.sweep_target_period();

        // To commit the target, the sweep unit must be enabled, the shift
        // non-zero, and the channel not muted.
        let can_update_period = self.sweep_enable
            && self.sweep_shift > 0
            && self.timer_period >= 8
            && target_period < 0x800;

        if self.sweep_divider_count == 0 && can_update_period {
            self.timer_period = target_period;
        }

        if self.sweep_divider_count == 0 || self.sweep_divider_reset {
            self.sweep_divider_count = self.sweep_divider_period;
            self.sweep_divider_reset = false;
        } else {
            self.sweep_divider_count -= 1;
        }

        if self.length_enable && self.length > 0 {
            self.length -= 1;
        }
    }

    /// Clock the sequencer timer (half CPU rate)
    pub fn clock_timer(&mut self) {
        if self.timer == 0 {
            self.sequence_time = (self.sequence_time + 1) % 8;
            self.timer = self.timer_period;
        } else {
            self.timer -= 1;
        }
    }

    /// Current output level (0-15)
    pub fn output(&self) -> u32 {
        let sequencer_low =
            PULSE_SEQUENCE_TABLE[usize::from(self.sequence_mode)][usize::from(self.sequence_time)]
                == 0;

        if self.enable && self.length > 0 && !self.is_muted_by_sweep() && !sequencer_low {
            u32::from(self.envelope.output())
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_period_mutes() {
        let mut pulse = Pulse::new(1);
        pulse.enable = true;
        pulse.timer_period = 7;
        assert!(pulse.is_muted_by_sweep());
        pulse.timer_period = 8;
        assert!(!pulse.is_muted_by_sweep());
    }

    #[test]
    fn test_sweep_overflow_mutes() {
        let mut pulse = Pulse::new(2);
        pulse.timer_period = 0x700;
        pulse.sweep_shift = 1;
        // Target = 0x700 + 0x380 > 0x7FF.
        assert!(pulse.is_muted_by_sweep());
    }

    #[test]
    fn test_mute_does_not_stop_sequencer() {
        let mut pulse = Pulse::new(1);
        pulse.timer_period = 2; // muted (period < 8)
        let before = pulse.sequence_time;
        for _ in 0..3 {
            pulse.clock_timer();
        }
        assert_ne!(pulse.sequence_time, before);
    }

    #[test]
    fn test_negate_ones_complement_difference() {
        let mut p1 = Pulse::new(1);
        let mut p2 = Pulse::new(2);
        for pulse in [&mut p1, &mut p2] {
            pulse.timer_period = 0x100;
            pulse.sweep_negate = true;
            pulse.sweep_shift = 2;
        }
        assert_eq!(p1.sweep_target_period() + 1, p2.sweep_target_period());
    }

    #[test]
    fn test_length_load_requires_enable() {
        let mut pulse = Pulse::new(1);
        pulse.write_timer_high(0xF8);
        assert_eq!(pulse.length, 0);

        pulse.enable = true;
        pulse.write_timer_high(0xF8);
        assert_eq!(pulse.length, LENGTH_TABLE[0xF8 >> 3]);
    }

    #[test]
    fn test_half_frame_clocks_length() {
        let mut pulse = Pulse::new(1);
        pulse.enable = true;
        pulse.write_control(0x00); // length enabled
        pulse.write_timer_high(0x18); // length index 3 -> 2
        assert_eq!(pulse.length, 2);
        pulse.half_frame();
        assert_eq!(pulse.length, 1);
    }
}
