use log::error;
#[cfg(feature = "cpu-trace")]
use log::trace;

use crate::{
    alu::{self, AluOp, RotOp},
    error::CpuError,
    interrupts::Interrupt,
    microcode::{Addr, MicroOp, MicroOpQueue, Modify, Scratch, Source, Target},
    mmu::Mmu,
    registers::{Condition, Operand8, R8, R16, Registers},
};

// Clock ticks per machine cycle
const TICKS_PER_M_CYCLE: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Fetching,
    Executing,
    Halted,
    Stopped,
}

pub struct Cpu {
    pub regs: Registers,
    pub ime: bool,
    state: State,
    queue: MicroOpQueue,
    /// Ticks since the last M-cycle boundary.
    ticks: u8,
    /// Counts down from 2 after EI; IME is set once it passes 1 at a fetch.
    ime_enable_delay: u8,
    halt_bug: bool,
    fault: Option<CpuError>,
    pub m_cycles: u64,
}

impl Cpu {
    /// CPU in the register state the boot ROM leaves behind.
    pub fn new() -> Self {
        Self::with_registers(Registers::post_boot())
    }

    /// CPU at PC=0 with zeroed registers, for running a boot ROM.
    pub fn new_power_on() -> Self {
        Self::with_registers(Registers::default())
    }

    fn with_registers(regs: Registers) -> Self {
        Self {
            regs,
            ime: false,
            state: State::Fetching,
            queue: MicroOpQueue::new(),
            ticks: 0,
            ime_enable_delay: 0,
            halt_bug: false,
            fault: None,
            m_cycles: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn fault(&self) -> Option<CpuError> {
        self.fault
    }

    /// Advance by one base clock tick. Work happens on every fourth call.
    pub fn tick(&mut self, mmu: &mut Mmu) -> Result<(), CpuError> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        self.ticks += 1;
        if self.ticks < TICKS_PER_M_CYCLE {
            return Ok(());
        }
        self.ticks = 0;
        self.m_cycles += 1;
        self.m_cycle(mmu).inspect_err(|&fault| {
            error!("CPU stopped: {fault}");
            self.fault = Some(fault);
        })
    }

    fn m_cycle(&mut self, mmu: &mut Mmu) -> Result<(), CpuError> {
        match self.state {
            State::Executing => {
                if let Some(op) = self.queue.pop() {
                    self.execute(op, mmu);
                }
                if self.queue.is_empty() {
                    self.state = State::Fetching;
                }
                Ok(())
            }
            State::Fetching => self.fetch(mmu),
            State::Halted => {
                if mmu.interrupts.latched().is_some() {
                    self.state = State::Fetching;
                    self.fetch(mmu)
                } else {
                    Ok(())
                }
            }
            State::Stopped => {
                if mmu.joypad.any_pressed()
                    || mmu.interrupts.requested() & Interrupt::Joypad.bit() != 0
                {
                    self.state = State::Fetching;
                }
                Ok(())
            }
        }
    }

    fn fetch(&mut self, mmu: &mut Mmu) -> Result<(), CpuError> {
        if self.ime
            && let Some(pending) = mmu.interrupts.latched()
        {
            // Entry takes five M-cycles including this one.
            self.ime = false;
            self.ime_enable_delay = 0;
            self.queue.extend(&[
                MicroOp::Idle,
                MicroOp::Idle,
                MicroOp::PushHigh(R16::Pc),
                MicroOp::PushLowJump(Target::Interrupt(pending)),
            ]);
            self.state = State::Executing;
            return Ok(());
        }

        let enable_after = self.ime_enable_delay == 1;
        let pc = self.regs.pc;
        let opcode = mmu.read(pc);
        if self.halt_bug {
            self.halt_bug = false;
        } else {
            self.regs.pc = pc.wrapping_add(1);
        }

        #[cfg(feature = "cpu-trace")]
        trace!("{pc:04X}: {opcode:02X} {}", self.regs);

        self.decode(opcode, pc, mmu)?;

        if enable_after && self.ime_enable_delay > 0 {
            self.ime = true;
        }
        self.ime_enable_delay = self.ime_enable_delay.saturating_sub(1);

        if self.state == State::Fetching && !self.queue.is_empty() {
            self.state = State::Executing;
        }
        Ok(())
    }

    fn read_operand(&self, operand: Operand8) -> Option<u8> {
        match operand {
            Operand8::Reg(r) => Some(self.regs.get(r)),
            Operand8::HlIndirect => None,
        }
    }

    fn decode(&mut self, opcode: u8, pc: u16, mmu: &mut Mmu) -> Result<(), CpuError> {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;
        let p = y >> 1;
        let q = y & 0x01;
        let regs = &mut self.regs;
        let queue = &mut self.queue;

        match (x, z) {
            (0, 0) => match y {
                0 => {}
                1 => queue.extend(&[
                    MicroOp::ReadImm(Scratch::Z),
                    MicroOp::ReadImm(Scratch::W),
                    MicroOp::Write(Addr::WzInc, Source::SpLow),
                    MicroOp::Write(Addr::Wz, Source::SpHigh),
                ]),
                2 => {
                    // STOP consumes its padding byte.
                    regs.pc = regs.pc.wrapping_add(1);
                    mmu.timer.reset_div();
                    self.state = State::Stopped;
                }
                3 => queue.extend(&[MicroOp::ReadImm(Scratch::Z), MicroOp::JumpRelative]),
                _ => {
                    queue.push(MicroOp::ReadImm(Scratch::Z));
                    if Condition::decode(y - 4).holds(regs.f) {
                        queue.push(MicroOp::JumpRelative);
                    }
                }
            },
            (0, 1) => {
                let rr = R16::rp(p);
                if q == 0 {
                    queue.extend(&[MicroOp::ReadImm(Scratch::Z), MicroOp::ReadImmHighToPair(rr)]);
                } else {
                    queue.push(MicroOp::AddHl(rr));
                }
            }
            (0, 2) => {
                let addr = match p {
                    0 => Addr::Bc,
                    1 => Addr::De,
                    2 => Addr::HlInc,
                    _ => Addr::HlDec,
                };
                if q == 0 {
                    queue.push(MicroOp::Write(addr, Source::Reg(R8::A)));
                } else {
                    queue.push(MicroOp::ReadToReg(addr, R8::A));
                }
            }
            (0, 3) => {
                let rr = R16::rp(p);
                queue.push(if q == 0 {
                    MicroOp::IncPair(rr)
                } else {
                    MicroOp::DecPair(rr)
                });
            }
            (0, 4) | (0, 5) => {
                let operand = Operand8::decode(y);
                let modify = if z == 4 { Modify::Inc } else { Modify::Dec };
                match operand {
                    Operand8::Reg(r) => {
                        let res = match modify {
                            Modify::Inc => alu::inc8(regs.get(r), regs.f.c),
                            _ => alu::dec8(regs.get(r), regs.f.c),
                        };
                        regs.set(r, res.value);
                        regs.f = res.flags;
                    }
                    Operand8::HlIndirect => queue.extend(&[
                        MicroOp::Read(Addr::Hl, Scratch::Z),
                        MicroOp::WriteBack(modify),
                    ]),
                }
            }
            (0, 6) => match Operand8::decode(y) {
                Operand8::Reg(r) => queue.push(MicroOp::ReadImmToReg(r)),
                Operand8::HlIndirect => queue.extend(&[
                    MicroOp::ReadImm(Scratch::Z),
                    MicroOp::Write(Addr::Hl, Source::Z),
                ]),
            },
            (0, 7) => match y {
                0..=3 => {
                    // RLCA/RRCA/RLA/RRA always clear Z.
                    let mut res = RotOp::decode(y).apply(regs.a, regs.f.c);
                    res.flags.z = false;
                    regs.a = res.value;
                    regs.f = res.flags;
                }
                4 => {
                    let res = alu::daa(regs.a, regs.f);
                    regs.a = res.value;
                    regs.f = res.flags;
                }
                5 => {
                    regs.a = !regs.a;
                    regs.f.n = true;
                    regs.f.h = true;
                }
                6 => {
                    regs.f.n = false;
                    regs.f.h = false;
                    regs.f.c = true;
                }
                _ => {
                    regs.f.n = false;
                    regs.f.h = false;
                    regs.f.c = !regs.f.c;
                }
            },
            (1, 6) if y == 6 => {
                if !self.ime && mmu.interrupts.check_pending().is_some() {
                    // HALT with IME=0 and a request already pending does not
                    // halt; the next opcode byte is read twice.
                    self.halt_bug = true;
                } else {
                    self.state = State::Halted;
                }
            }
            (1, _) => {
                let dst = Operand8::decode(y);
                let src = Operand8::decode(z);
                match (dst, src) {
                    (Operand8::Reg(d), Operand8::Reg(s)) => {
                        let val = regs.get(s);
                        regs.set(d, val);
                    }
                    (Operand8::Reg(d), Operand8::HlIndirect) => {
                        queue.push(MicroOp::ReadToReg(Addr::Hl, d));
                    }
                    (Operand8::HlIndirect, Operand8::Reg(s)) => {
                        queue.push(MicroOp::Write(Addr::Hl, Source::Reg(s)));
                    }
                    (Operand8::HlIndirect, Operand8::HlIndirect) => {}
                }
            }
            (2, _) => {
                let op = AluOp::decode(y);
                match self.read_operand(Operand8::decode(z)) {
                    Some(val) => self.apply_alu(op, val),
                    None => self.queue.push(MicroOp::AluRead(op, Addr::Hl)),
                }
            }
            (3, 0) => match y {
                0..=3 => {
                    queue.push(MicroOp::Idle);
                    if Condition::decode(y).holds(regs.f) {
                        queue.extend(&[
                            MicroOp::Pop(Scratch::Z),
                            MicroOp::Pop(Scratch::W),
                            MicroOp::JumpWz,
                        ]);
                    }
                }
                4 => queue.extend(&[
                    MicroOp::ReadImm(Scratch::Z),
                    MicroOp::Write(Addr::HighZ, Source::Reg(R8::A)),
                ]),
                5 => queue.extend(&[MicroOp::ReadImm(Scratch::Z), MicroOp::Idle, MicroOp::AddSp]),
                6 => queue.extend(&[
                    MicroOp::ReadImm(Scratch::Z),
                    MicroOp::ReadToReg(Addr::HighZ, R8::A),
                ]),
                _ => queue.extend(&[MicroOp::ReadImm(Scratch::Z), MicroOp::LoadHlSp]),
            },
            (3, 1) => {
                if q == 0 {
                    let rr = R16::rp2(p);
                    queue.extend(&[MicroOp::Pop(Scratch::Z), MicroOp::PopHighToPair(rr)]);
                } else {
                    match p {
                        0 => queue.extend(&[
                            MicroOp::Pop(Scratch::Z),
                            MicroOp::Pop(Scratch::W),
                            MicroOp::JumpWz,
                        ]),
                        1 => queue.extend(&[
                            MicroOp::Pop(Scratch::Z),
                            MicroOp::Pop(Scratch::W),
                            MicroOp::ReturnFromInterrupt,
                        ]),
                        2 => regs.pc = regs.hl(),
                        _ => queue.push(MicroOp::LoadSpHl),
                    }
                }
            }
            (3, 2) => match y {
                0..=3 => {
                    queue.extend(&[MicroOp::ReadImm(Scratch::Z), MicroOp::ReadImm(Scratch::W)]);
                    if Condition::decode(y).holds(regs.f) {
                        queue.push(MicroOp::JumpWz);
                    }
                }
                4 => queue.push(MicroOp::Write(Addr::HighC, Source::Reg(R8::A))),
                5 => queue.extend(&[
                    MicroOp::ReadImm(Scratch::Z),
                    MicroOp::ReadImm(Scratch::W),
                    MicroOp::Write(Addr::Wz, Source::Reg(R8::A)),
                ]),
                6 => queue.push(MicroOp::ReadToReg(Addr::HighC, R8::A)),
                _ => queue.extend(&[
                    MicroOp::ReadImm(Scratch::Z),
                    MicroOp::ReadImm(Scratch::W),
                    MicroOp::ReadToReg(Addr::Wz, R8::A),
                ]),
            },
            (3, 3) => match y {
                0 => queue.extend(&[
                    MicroOp::ReadImm(Scratch::Z),
                    MicroOp::ReadImm(Scratch::W),
                    MicroOp::JumpWz,
                ]),
                1 => queue.push(MicroOp::FetchCb),
                6 => {
                    self.ime = false;
                    self.ime_enable_delay = 0;
                }
                7 => self.ime_enable_delay = 2,
                _ => return Err(CpuError::UnimplementedOpcode { opcode, pc }),
            },
            (3, 4) => {
                if y > 3 {
                    return Err(CpuError::UnimplementedOpcode { opcode, pc });
                }
                queue.extend(&[MicroOp::ReadImm(Scratch::Z), MicroOp::ReadImm(Scratch::W)]);
                if Condition::decode(y).holds(regs.f) {
                    queue.extend(&[
                        MicroOp::Idle,
                        MicroOp::PushHigh(R16::Pc),
                        MicroOp::PushLowJump(Target::Wz),
                    ]);
                }
            }
            (3, 5) => {
                if q == 0 {
                    let rr = R16::rp2(p);
                    queue.extend(&[
                        MicroOp::Idle,
                        MicroOp::PushHigh(rr),
                        MicroOp::PushLow(rr),
                    ]);
                } else if p == 0 {
                    queue.extend(&[
                        MicroOp::ReadImm(Scratch::Z),
                        MicroOp::ReadImm(Scratch::W),
                        MicroOp::Idle,
                        MicroOp::PushHigh(R16::Pc),
                        MicroOp::PushLowJump(Target::Wz),
                    ]);
                } else {
                    return Err(CpuError::UnimplementedOpcode { opcode, pc });
                }
            }
            (3, 6) => queue.push(MicroOp::AluImm(AluOp::decode(y))),
            _ => queue.extend(&[
                MicroOp::Idle,
                MicroOp::PushHigh(R16::Pc),
                MicroOp::PushLowJump(Target::Restart(u16::from(y) * 8)),
            ]),
        }
        Ok(())
    }

    /// Decode and run the second byte of a CB-prefixed opcode.
    fn decode_cb(&mut self, opcode: u8) {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0x07;
        let operand = Operand8::decode(opcode);

        #[cfg(feature = "cpu-trace")]
        trace!("     CB {opcode:02X}");

        let modify = match x {
            0 => Modify::Rotate(RotOp::decode(y)),
            1 => {
                match self.read_operand(operand) {
                    Some(val) => self.regs.f = alu::bit(y, val, self.regs.f.c),
                    None => self.queue.push(MicroOp::BitRead(y)),
                }
                return;
            }
            2 => Modify::Res(y),
            _ => Modify::Set(y),
        };
        match operand {
            Operand8::Reg(r) => {
                let val = self.regs.get(r);
                let res = self.modify(modify, val);
                self.regs.set(r, res);
            }
            Operand8::HlIndirect => self.queue.extend(&[
                MicroOp::Read(Addr::Hl, Scratch::Z),
                MicroOp::WriteBack(modify),
            ]),
        }
    }

    fn apply_alu(&mut self, op: AluOp, val: u8) {
        let res = op.apply(self.regs.a, val, self.regs.f.c);
        self.regs.a = res.value;
        self.regs.f = res.flags;
    }

    /// Apply a read-modify-write operation, updating flags where it defines them.
    fn modify(&mut self, modify: Modify, val: u8) -> u8 {
        let carry = self.regs.f.c;
        match modify {
            Modify::Inc => {
                let res = alu::inc8(val, carry);
                self.regs.f = res.flags;
                res.value
            }
            Modify::Dec => {
                let res = alu::dec8(val, carry);
                self.regs.f = res.flags;
                res.value
            }
            Modify::Rotate(op) => {
                let res = op.apply(val, carry);
                self.regs.f = res.flags;
                res.value
            }
            Modify::Res(bit) => val & !(1 << bit),
            Modify::Set(bit) => val | (1 << bit),
        }
    }

    fn resolve(&mut self, addr: Addr) -> u16 {
        match addr {
            Addr::Bc => self.regs.get16(R16::Bc),
            Addr::De => self.regs.get16(R16::De),
            Addr::Hl => self.regs.hl(),
            Addr::HlInc => {
                let hl = self.regs.hl();
                self.regs.set16(R16::Hl, hl.wrapping_add(1));
                hl
            }
            Addr::HlDec => {
                let hl = self.regs.hl();
                self.regs.set16(R16::Hl, hl.wrapping_sub(1));
                hl
            }
            Addr::Wz => self.regs.wz(),
            Addr::WzInc => {
                let wz = self.regs.wz();
                self.regs.set_wz(wz.wrapping_add(1));
                wz
            }
            Addr::HighZ => 0xFF00 | u16::from(self.regs.z),
            Addr::HighC => 0xFF00 | u16::from(self.regs.c),
        }
    }

    fn fetch_imm(&mut self, mmu: &Mmu) -> u8 {
        let val = mmu.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        val
    }

    fn set_scratch(&mut self, scratch: Scratch, val: u8) {
        match scratch {
            Scratch::Z => self.regs.z = val,
            Scratch::W => self.regs.w = val,
        }
    }

    fn push_byte(&mut self, mmu: &mut Mmu, val: u8) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write(self.regs.sp, val);
    }

    fn pop_byte(&mut self, mmu: &Mmu) -> u8 {
        let val = mmu.read(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        val
    }

    fn execute(&mut self, op: MicroOp, mmu: &mut Mmu) {
        match op {
            MicroOp::Idle => {}
            MicroOp::ReadImm(scratch) => {
                let val = self.fetch_imm(mmu);
                self.set_scratch(scratch, val);
            }
            MicroOp::ReadImmToReg(r) => {
                let val = self.fetch_imm(mmu);
                self.regs.set(r, val);
            }
            MicroOp::ReadImmHighToPair(rr) => {
                self.regs.w = self.fetch_imm(mmu);
                let wz = self.regs.wz();
                self.regs.set16(rr, wz);
            }
            MicroOp::Read(addr, scratch) => {
                let addr = self.resolve(addr);
                let val = mmu.read(addr);
                self.set_scratch(scratch, val);
            }
            MicroOp::ReadToReg(addr, r) => {
                let addr = self.resolve(addr);
                let val = mmu.read(addr);
                self.regs.set(r, val);
            }
            MicroOp::Write(addr, source) => {
                let val = match source {
                    Source::Reg(r) => self.regs.get(r),
                    Source::Z => self.regs.z,
                    Source::SpLow => self.regs.sp as u8,
                    Source::SpHigh => (self.regs.sp >> 8) as u8,
                };
                let addr = self.resolve(addr);
                mmu.write(addr, val);
            }
            MicroOp::AluRead(op, addr) => {
                let addr = self.resolve(addr);
                let val = mmu.read(addr);
                self.apply_alu(op, val);
            }
            MicroOp::AluImm(op) => {
                let val = self.fetch_imm(mmu);
                self.apply_alu(op, val);
            }
            MicroOp::WriteBack(modify) => {
                let res = self.modify(modify, self.regs.z);
                mmu.write(self.regs.hl(), res);
            }
            MicroOp::BitRead(bit) => {
                let val = mmu.read(self.regs.hl());
                self.regs.f = alu::bit(bit, val, self.regs.f.c);
            }
            MicroOp::FetchCb => {
                let opcode = self.fetch_imm(mmu);
                self.decode_cb(opcode);
            }
            MicroOp::IncPair(rr) => {
                let val = self.regs.get16(rr).wrapping_add(1);
                self.regs.set16(rr, val);
            }
            MicroOp::DecPair(rr) => {
                let val = self.regs.get16(rr).wrapping_sub(1);
                self.regs.set16(rr, val);
            }
            MicroOp::AddHl(rr) => {
                let res = alu::add16(self.regs.hl(), self.regs.get16(rr), self.regs.f.z);
                self.regs.set16(R16::Hl, res.value);
                self.regs.f = res.flags;
            }
            MicroOp::AddSp => {
                let res = alu::add_sp_offset(self.regs.sp, self.regs.z);
                self.regs.sp = res.value;
                self.regs.f = res.flags;
            }
            MicroOp::LoadHlSp => {
                let res = alu::add_sp_offset(self.regs.sp, self.regs.z);
                self.regs.set16(R16::Hl, res.value);
                self.regs.f = res.flags;
            }
            MicroOp::LoadSpHl => self.regs.sp = self.regs.hl(),
            MicroOp::PushHigh(rr) => {
                let [hi, _] = self.regs.get16(rr).to_be_bytes();
                self.push_byte(mmu, hi);
            }
            MicroOp::PushLow(rr) => {
                let [_, lo] = self.regs.get16(rr).to_be_bytes();
                self.push_byte(mmu, lo);
            }
            MicroOp::PushLowJump(target) => {
                let [_, lo] = self.regs.pc.to_be_bytes();
                self.push_byte(mmu, lo);
                self.regs.pc = match target {
                    Target::Wz => self.regs.wz(),
                    Target::Restart(vector) => vector,
                    Target::Interrupt(pending) => {
                        mmu.interrupts.acknowledge(pending);
                        pending.kind.vector()
                    }
                };
            }
            MicroOp::Pop(scratch) => {
                let val = self.pop_byte(mmu);
                self.set_scratch(scratch, val);
            }
            MicroOp::PopHighToPair(rr) => {
                self.regs.w = self.pop_byte(mmu);
                let wz = self.regs.wz();
                self.regs.set16(rr, wz);
            }
            MicroOp::JumpWz => self.regs.pc = self.regs.wz(),
            MicroOp::ReturnFromInterrupt => {
                self.regs.pc = self.regs.wz();
                self.ime = true;
            }
            MicroOp::JumpRelative => {
                let offset = self.regs.z as i8 as i16 as u16;
                self.regs.pc = self.regs.pc.wrapping_add(offset);
            }
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
