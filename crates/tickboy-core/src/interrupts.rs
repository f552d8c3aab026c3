// Interrupt vectors (gbdev.io/pandocs/Interrupts.html)
const VECTOR_VBLANK: u16 = 0x40;
const VECTOR_STAT: u16 = 0x48;
const VECTOR_TIMER: u16 = 0x50;
const VECTOR_SERIAL: u16 = 0x58;
const VECTOR_JOYPAD: u16 = 0x60;

const INTERRUPT_MASK: u8 = 0x1F;

/// Interrupt sources in priority order, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Interrupt::VBlank => 0x01,
            Interrupt::LcdStat => 0x02,
            Interrupt::Timer => 0x04,
            Interrupt::Serial => 0x08,
            Interrupt::Joypad => 0x10,
        }
    }

    #[inline]
    pub const fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => VECTOR_VBLANK,
            Interrupt::LcdStat => VECTOR_STAT,
            Interrupt::Timer => VECTOR_TIMER,
            Interrupt::Serial => VECTOR_SERIAL,
            Interrupt::Joypad => VECTOR_JOYPAD,
        }
    }
}

/// Highest-priority interrupt that is both enabled and requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    pub kind: Interrupt,
    /// AND this into IF to acknowledge `kind` and nothing else.
    pub clear_mask: u8,
}

/// IE/IF pair plus the resolution latched on the last tick.
#[derive(Debug, Clone, Default)]
pub struct InterruptController {
    enabled: u8,
    requested: u8,
    latched: Option<Pending>,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the pending interrupt without changing any state.
    pub fn check_pending(&self) -> Option<Pending> {
        let active = self.enabled & self.requested & INTERRUPT_MASK;
        if active == 0 {
            return None;
        }
        Interrupt::ALL
            .into_iter()
            .find(|kind| active & kind.bit() != 0)
            .map(|kind| Pending {
                kind,
                clear_mask: !kind.bit(),
            })
    }

    /// Latch the current resolution so the CPU sees it on the next tick.
    pub fn tick(&mut self) {
        self.latched = self.check_pending();
    }

    /// Resolution latched by the most recent [`InterruptController::tick`].
    pub fn latched(&self) -> Option<Pending> {
        self.latched
    }

    pub fn request(&mut self, kind: Interrupt) {
        self.requested |= kind.bit();
    }

    pub fn acknowledge(&mut self, pending: Pending) {
        self.requested &= pending.clear_mask;
    }

    pub fn enabled(&self) -> u8 {
        self.enabled
    }

    pub fn set_enabled(&mut self, val: u8) {
        self.enabled = val;
    }

    pub fn requested(&self) -> u8 {
        self.requested
    }

    pub fn set_requested(&mut self, val: u8) {
        self.requested = val & INTERRUPT_MASK;
    }

    /// IF as seen by the CPU: unused upper bits read as 1.
    pub fn read_flags(&self) -> u8 {
        self.requested | !INTERRUPT_MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_pending_without_enable() {
        let mut ic = InterruptController::new();
        ic.set_requested(0x1F);
        assert_eq!(ic.check_pending(), None);
    }

    #[test]
    fn priority_follows_bit_order() {
        let mut ic = InterruptController::new();
        ic.set_enabled(0xFF);
        ic.set_requested(0x14);
        let pending = ic.check_pending().unwrap();
        assert_eq!(pending.kind, Interrupt::Timer);
        assert_eq!(pending.kind.vector(), 0x50);

        ic.request(Interrupt::LcdStat);
        assert_eq!(ic.check_pending().unwrap().kind, Interrupt::LcdStat);
    }

    #[test]
    fn clear_mask_removes_only_resolved_bit() {
        let mut ic = InterruptController::new();
        ic.set_enabled(0x1F);
        ic.set_requested(0x1F);
        for kind in Interrupt::ALL {
            let pending = ic.check_pending().unwrap();
            assert_eq!(pending.kind, kind);
            let before = ic.requested();
            ic.acknowledge(pending);
            assert_eq!(before & !ic.requested(), kind.bit());
        }
        assert_eq!(ic.requested(), 0);
    }

    #[test]
    fn latch_lags_until_tick() {
        let mut ic = InterruptController::new();
        ic.set_enabled(0x01);
        ic.request(Interrupt::VBlank);
        assert_eq!(ic.latched(), None);
        ic.tick();
        assert_eq!(ic.latched().map(|p| p.kind), Some(Interrupt::VBlank));
    }

    #[test]
    fn flags_read_with_upper_bits_set() {
        let mut ic = InterruptController::new();
        ic.set_requested(0xFF);
        assert_eq!(ic.requested(), 0x1F);
        assert_eq!(ic.read_flags(), 0xFF);
        ic.set_requested(0x00);
        assert_eq!(ic.read_flags(), 0xE0);
    }
}
