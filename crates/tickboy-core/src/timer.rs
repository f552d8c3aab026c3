use crate::interrupts::{Interrupt, InterruptController};

/// Ticks between TIMA overflowing and the TMA reload + interrupt request.
const RELOAD_DELAY_TICKS: u8 = 4;

pub const DIV: u16 = 0xFF04;
pub const TIMA: u16 = 0xFF05;
pub const TMA: u16 = 0xFF06;
pub const TAC: u16 = 0xFF07;

#[derive(Debug, Clone, Default)]
pub struct Timer {
    /// 16-bit internal divider counter. DIV register is the upper 8 bits.
    div: u16,
    /// Timer counter
    tima: u8,
    /// Timer modulo
    tma: u8,
    /// Timer control
    tac: u8,
    last_signal: bool,
    /// Ticks left until an overflowed TIMA is reloaded
    reload_delay: Option<u8>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            DIV => (self.div >> 8) as u8,
            TIMA => {
                if self.reload_delay.is_some() {
                    0
                } else {
                    self.tima
                }
            }
            TMA => self.tma,
            TAC => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            DIV => self.reset_div(),
            TIMA => {
                // The counter is held at zero until the pending reload lands.
                if self.reload_delay.is_none() {
                    self.tima = val;
                }
            }
            TMA => self.tma = val,
            TAC => {
                self.tac = val & 0x07;
                self.detect_falling_edge();
            }
            _ => {}
        }
    }

    /// Advance by one base clock tick.
    pub fn tick(&mut self, interrupts: &mut InterruptController) {
        if let Some(remaining) = self.reload_delay {
            let remaining = remaining - 1;
            if remaining == 0 {
                self.tima = self.tma;
                interrupts.request(Interrupt::Timer);
                self.reload_delay = None;
            } else {
                self.reload_delay = Some(remaining);
            }
        }
        self.div = self.div.wrapping_add(1);
        self.detect_falling_edge();
    }

    /// Reset the internal divider counter, applying TIMA edge logic.
    pub fn reset_div(&mut self) {
        self.div = 0;
        self.detect_falling_edge();
    }

    pub fn div_counter(&self) -> u16 {
        self.div
    }

    pub fn set_div_counter(&mut self, div: u16) {
        self.div = div;
        self.last_signal = Self::signal_with(self.div, self.tac);
    }

    pub fn tima(&self) -> u8 {
        self.tima
    }

    pub fn tma(&self) -> u8 {
        self.tma
    }

    pub fn tac(&self) -> u8 {
        self.tac
    }

    pub fn overflow_pending(&self) -> bool {
        self.reload_delay.is_some()
    }

    /// Divider bit watched for the frequency selected by TAC bits 0-1.
    pub const fn edge_bit(tac: u8) -> u8 {
        match tac & 0x03 {
            0x00 => 9,
            0x01 => 3,
            0x02 => 5,
            _ => 7,
        }
    }

    fn detect_falling_edge(&mut self) {
        let signal = Self::signal_with(self.div, self.tac);
        if self.last_signal && !signal {
            self.increment();
        }
        self.last_signal = signal;
    }

    fn increment(&mut self) {
        if self.tima == 0xFF {
            self.tima = 0;
            self.reload_delay = Some(RELOAD_DELAY_TICKS);
        } else {
            self.tima = self.tima.wrapping_add(1);
        }
    }

    fn signal_with(div: u16, tac: u8) -> bool {
        tac & 0x04 != 0 && (div >> Self::edge_bit(tac)) & 1 != 0
    }
}
