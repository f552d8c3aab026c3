//! Micro-operations: one entry per machine cycle of the instruction in flight.
//!
//! Decode lowers an opcode into a short run of these; the CPU pops and runs
//! exactly one per M-cycle. Each variant carries just the operands it needs.

use crate::{
    alu::{AluOp, RotOp},
    interrupts::Pending,
    registers::{R8, R16},
};

/// Memory address source for a bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addr {
    Bc,
    De,
    Hl,
    /// HL, then HL is incremented.
    HlInc,
    /// HL, then HL is decremented.
    HlDec,
    Wz,
    /// WZ, then WZ is incremented.
    WzInc,
    /// 0xFF00 + Z
    HighZ,
    /// 0xFF00 + C
    HighC,
}

/// Scratch register half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scratch {
    Z,
    W,
}

/// Byte stored by a write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Reg(R8),
    Z,
    SpLow,
    SpHigh,
}

/// Read-modify-write applied to Z before it is written back to (HL).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modify {
    Inc,
    Dec,
    Rotate(RotOp),
    Res(u8),
    Set(u8),
}

/// Where the final push of a call-like sequence jumps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// CALL: the address assembled in WZ.
    Wz,
    /// RST: a fixed page-zero vector.
    Restart(u16),
    /// Interrupt entry: acknowledge the request and jump to its vector.
    Interrupt(Pending),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOp {
    /// Internal cycle with no visible effect.
    Idle,
    /// Scratch = [PC++]
    ReadImm(Scratch),
    /// r = [PC++]
    ReadImmToReg(R8),
    /// W = [PC++], then rr = WZ.
    ReadImmHighToPair(R16),
    /// Scratch = [addr]
    Read(Addr, Scratch),
    /// r = [addr]
    ReadToReg(Addr, R8),
    /// [addr] = source
    Write(Addr, Source),
    /// A = A op [addr]
    AluRead(AluOp, Addr),
    /// A = A op [PC++]
    AluImm(AluOp),
    /// [HL] = modify(Z)
    WriteBack(Modify),
    /// BIT b,(HL)
    BitRead(u8),
    /// Second byte of a 0xCB-prefixed opcode.
    FetchCb,
    IncPair(R16),
    DecPair(R16),
    /// ADD HL,rr
    AddHl(R16),
    /// SP = SP + e, e in Z.
    AddSp,
    /// HL = SP + e, e in Z.
    LoadHlSp,
    /// SP = HL
    LoadSpHl,
    /// SP--, [SP] = high(rr)
    PushHigh(R16),
    /// SP--, [SP] = low(rr)
    PushLow(R16),
    /// SP--, [SP] = low(PC), then PC = target.
    PushLowJump(Target),
    /// Scratch = [SP++]
    Pop(Scratch),
    /// W = [SP++], then rr = WZ.
    PopHighToPair(R16),
    /// PC = WZ
    JumpWz,
    /// PC = WZ, IME = 1
    ReturnFromInterrupt,
    /// PC = PC + Z as signed.
    JumpRelative,
}

const QUEUE_CAPACITY: usize = 8;

/// Fixed-capacity FIFO of pending micro-operations.
#[derive(Debug, Clone)]
pub struct MicroOpQueue {
    ops: [MicroOp; QUEUE_CAPACITY],
    len: u8,
    pos: u8,
}

impl Default for MicroOpQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MicroOpQueue {
    pub const fn new() -> Self {
        Self {
            ops: [MicroOp::Idle; QUEUE_CAPACITY],
            len: 0,
            pos: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.pos = 0;
    }

    pub fn push(&mut self, op: MicroOp) {
        debug_assert!((self.len as usize) < QUEUE_CAPACITY, "micro-op queue overflow");
        self.ops[self.len as usize] = op;
        self.len += 1;
    }

    pub fn extend(&mut self, ops: &[MicroOp]) {
        for &op in ops {
            self.push(op);
        }
    }

    pub fn pop(&mut self) -> Option<MicroOp> {
        if self.pos >= self.len {
            return None;
        }
        let op = self.ops[self.pos as usize];
        self.pos += 1;
        if self.pos == self.len {
            self.clear();
        }
        Some(op)
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.len
    }

    pub fn len(&self) -> usize {
        (self.len - self.pos) as usize
    }
}
