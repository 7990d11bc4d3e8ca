use log::{debug, trace};
use thiserror::Error;

use crate::alu::{self, FLAG_C, FLAG_H, FLAG_N, FLAG_Z};
use crate::instruction::{
    self, AluOp, CbInstruction, Condition, Indirect, Instruction, Reg8, Reg16, ShiftOp,
    StackReg,
};
use crate::interrupts::Interrupt;
use crate::mmu::{BusFault, Mmu};

// Post-boot CPU state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

const DMG_BOOT_A: u8 = 0x01;
const DMG_BOOT_F: u8 = 0xB0;
const DMG_BOOT_B: u8 = 0x00;
const DMG_BOOT_C: u8 = 0x13;
const DMG_BOOT_D: u8 = 0x00;
const DMG_BOOT_E: u8 = 0xD8;
const DMG_BOOT_H: u8 = 0x01;
const DMG_BOOT_L: u8 = 0x4D;

/// Push PC and jump: five machine cycles.
pub const INTERRUPT_DISPATCH_CYCLES: u32 = 20;
/// One machine cycle per step while halted or stopped.
pub const IDLE_STEP_CYCLES: u32 = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CpuError {
    #[error("unimplemented opcode {opcode:#04X} at {pc:#06X}")]
    UnimplementedOpcode { opcode: u8, pc: u16 },

    #[error("bus fault in instruction at {pc:#06X}: {source}")]
    Bus { pc: u16, source: BusFault },
}

pub struct Cpu {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub pc: u16,
    pub sp: u16,
    /// Total T-cycles executed.
    pub cycles: u64,
    pub ime: bool,
    pub halted: bool,
    pub stopped: bool,
    halt_bug: bool,
    ime_enable_delay: u8,
}

impl Cpu {
    /// Registers as the DMG boot ROM leaves them at 0x0100.
    pub fn new() -> Self {
        Self {
            a: DMG_BOOT_A,
            f: DMG_BOOT_F,
            b: DMG_BOOT_B,
            c: DMG_BOOT_C,
            d: DMG_BOOT_D,
            e: DMG_BOOT_E,
            h: DMG_BOOT_H,
            l: DMG_BOOT_L,
            pc: BOOT_PC,
            sp: BOOT_SP,
            cycles: 0,
            ime: false,
            halted: false,
            stopped: false,
            halt_bug: false,
            ime_enable_delay: 0,
        }
    }

    /// Cleared registers at 0x0000, for running a boot ROM.
    pub fn power_on() -> Self {
        Self {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            pc: 0,
            sp: 0,
            ..Self::new()
        }
    }

    pub fn get_af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f as u16
    }

    fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        // Low nibble of F does not exist.
        self.f = val as u8 & 0xF0;
    }

    pub fn get_bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn get_de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn get_hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    fn read_r16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::BC => self.get_bc(),
            Reg16::DE => self.get_de(),
            Reg16::HL => self.get_hl(),
            Reg16::SP => self.sp,
        }
    }

    fn write_r16(&mut self, reg: Reg16, val: u16) {
        match reg {
            Reg16::BC => self.set_bc(val),
            Reg16::DE => self.set_de(val),
            Reg16::HL => self.set_hl(val),
            Reg16::SP => self.sp = val,
        }
    }

    fn read_r8(&self, mmu: &Mmu, reg: Reg8) -> u8 {
        match reg {
            Reg8::B => self.b,
            Reg8::C => self.c,
            Reg8::D => self.d,
            Reg8::E => self.e,
            Reg8::H => self.h,
            Reg8::L => self.l,
            Reg8::HlInd => mmu.read(self.get_hl()),
            Reg8::A => self.a,
        }
    }

    fn write_r8(&mut self, mmu: &mut Mmu, reg: Reg8, val: u8) {
        match reg {
            Reg8::B => self.b = val,
            Reg8::C => self.c = val,
            Reg8::D => self.d = val,
            Reg8::E => self.e = val,
            Reg8::H => self.h = val,
            Reg8::L => self.l = val,
            Reg8::HlInd => mmu.write(self.get_hl(), val),
            Reg8::A => self.a = val,
        }
    }

    fn flag(&self, mask: u8) -> bool {
        self.f & mask != 0
    }

    fn condition(&self, cond: Condition) -> bool {
        match cond {
            Condition::NZ => !self.flag(FLAG_Z),
            Condition::Z => self.flag(FLAG_Z),
            Condition::NC => !self.flag(FLAG_C),
            Condition::C => self.flag(FLAG_C),
        }
    }

    fn fetch8(&mut self, mmu: &Mmu) -> u8 {
        let val = mmu.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        val
    }

    fn fetch16(&mut self, mmu: &Mmu) -> u16 {
        let lo = self.fetch8(mmu) as u16;
        let hi = self.fetch8(mmu) as u16;
        (hi << 8) | lo
    }

    fn push_stack(&mut self, mmu: &mut Mmu, val: u16) {
        self.sp = self.sp.wrapping_sub(1);
        mmu.write(self.sp, (val >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        mmu.write(self.sp, val as u8);
    }

    fn pop_stack(&mut self, mmu: &Mmu) -> u16 {
        let lo = mmu.read(self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        let hi = mmu.read(self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        (hi << 8) | lo
    }

    fn indirect_addr(&mut self, ptr: Indirect) -> u16 {
        match ptr {
            Indirect::BC => self.get_bc(),
            Indirect::DE => self.get_de(),
            Indirect::HlInc => {
                let hl = self.get_hl();
                self.set_hl(hl.wrapping_add(1));
                hl
            }
            Indirect::HlDec => {
                let hl = self.get_hl();
                self.set_hl(hl.wrapping_sub(1));
                hl
            }
        }
    }

    /// Execute one instruction (or one idle machine cycle while halted or
    /// stopped), advance the peripherals, then dispatch a pending interrupt.
    /// Returns the T-cycles consumed, dispatch included.
    pub fn step(&mut self, mmu: &mut Mmu) -> Result<u32, CpuError> {
        if self.stopped {
            self.idle(mmu);
            if mmu.interrupts.is_requested(Interrupt::Joypad) {
                debug!("leaving STOP on joypad request");
                self.stopped = false;
            }
            return Ok(IDLE_STEP_CYCLES);
        }

        if self.halted {
            self.idle(mmu);
            if mmu.interrupts.has_pending() {
                self.halted = false;
            }
            return Ok(IDLE_STEP_CYCLES + self.handle_interrupts(mmu));
        }

        let enable_after = self.ime_enable_delay == 1;
        let pc = self.pc;
        let opcode = if self.halt_bug {
            // The byte after HALT is fetched without advancing PC.
            self.halt_bug = false;
            mmu.read(self.pc)
        } else {
            self.fetch8(mmu)
        };
        let instr = instruction::decode(opcode)
            .ok_or(CpuError::UnimplementedOpcode { opcode, pc })?;
        trace!("{pc:04X}: {opcode:02X} {instr}");

        let cycles = self.execute(mmu, instr, opcode);
        self.cycles += cycles as u64;
        mmu.tick(cycles);
        if let Some(source) = mmu.take_fault() {
            return Err(CpuError::Bus { pc, source });
        }

        if enable_after && self.ime_enable_delay > 0 {
            self.ime = true;
        }
        if self.ime_enable_delay > 0 {
            self.ime_enable_delay -= 1;
        }
        Ok(cycles + self.handle_interrupts(mmu))
    }

    fn idle(&mut self, mmu: &mut Mmu) {
        self.cycles += IDLE_STEP_CYCLES as u64;
        mmu.tick(IDLE_STEP_CYCLES);
    }

    fn handle_interrupts(&mut self, mmu: &mut Mmu) -> u32 {
        if !self.ime {
            return 0;
        }
        let Some(source) = mmu.interrupts.pending() else {
            return 0;
        };
        mmu.interrupts.clear(source);
        self.ime = false;
        self.ime_enable_delay = 0;
        self.halted = false;
        let pc = self.pc;
        self.push_stack(mmu, pc);
        self.pc = source.vector();
        trace!("interrupt {source:?} from {pc:04X}");

        self.cycles += INTERRUPT_DISPATCH_CYCLES as u64;
        mmu.tick(INTERRUPT_DISPATCH_CYCLES);
        INTERRUPT_DISPATCH_CYCLES
    }

    fn execute(&mut self, mmu: &mut Mmu, instr: Instruction, opcode: u8) -> u32 {
        let mut taken = false;
        match instr {
            Instruction::Nop => {}
            Instruction::Stop => {
                // STOP is two bytes; the second is ignored.
                self.fetch8(mmu);
                debug!("STOP at {:04X}", self.pc.wrapping_sub(2));
                self.stopped = true;
            }
            Instruction::Halt => {
                let pending = mmu.interrupts.has_pending();
                if pending && self.ime_enable_delay > 0 {
                    // EI; HALT with a request waiting: the interrupt is taken
                    // with the HALT itself as the return address.
                    self.pc = self.pc.wrapping_sub(1);
                } else if self.ime || !pending {
                    self.halted = true;
                } else {
                    self.halt_bug = true;
                }
            }
            Instruction::Di => {
                self.ime = false;
                self.ime_enable_delay = 0;
            }
            Instruction::Ei => {
                if !self.ime && self.ime_enable_delay == 0 {
                    self.ime_enable_delay = 2;
                }
            }
            Instruction::Ld(dst, src) => {
                let val = self.read_r8(mmu, src);
                self.write_r8(mmu, dst, val);
            }
            Instruction::LdImm(dst) => {
                let val = self.fetch8(mmu);
                self.write_r8(mmu, dst, val);
            }
            Instruction::Ld16Imm(dst) => {
                let val = self.fetch16(mmu);
                self.write_r16(dst, val);
            }
            Instruction::StoreA(ptr) => {
                let addr = self.indirect_addr(ptr);
                mmu.write(addr, self.a);
            }
            Instruction::LoadA(ptr) => {
                let addr = self.indirect_addr(ptr);
                self.a = mmu.read(addr);
            }
            Instruction::StoreAbs => {
                let addr = self.fetch16(mmu);
                mmu.write(addr, self.a);
            }
            Instruction::LoadAbs => {
                let addr = self.fetch16(mmu);
                self.a = mmu.read(addr);
            }
            Instruction::StoreHigh => {
                let offset = self.fetch8(mmu);
                mmu.write(0xFF00 | offset as u16, self.a);
            }
            Instruction::LoadHigh => {
                let offset = self.fetch8(mmu);
                self.a = mmu.read(0xFF00 | offset as u16);
            }
            Instruction::StoreHighC => mmu.write(0xFF00 | self.c as u16, self.a),
            Instruction::LoadHighC => self.a = mmu.read(0xFF00 | self.c as u16),
            Instruction::StoreSp => {
                let addr = self.fetch16(mmu);
                mmu.write(addr, self.sp as u8);
                mmu.write(addr.wrapping_add(1), (self.sp >> 8) as u8);
            }
            Instruction::LdSpHl => self.sp = self.get_hl(),
            Instruction::LdHlSpOffset => {
                let offset = self.fetch8(mmu) as i8;
                let (res, flags) = alu::add_sp_offset(self.sp, offset);
                self.set_hl(res);
                self.f = flags;
            }
            Instruction::Inc(reg) => {
                let (res, flags) = alu::inc8(self.read_r8(mmu, reg), self.f);
                self.write_r8(mmu, reg, res);
                self.f = flags;
            }
            Instruction::Dec(reg) => {
                let (res, flags) = alu::dec8(self.read_r8(mmu, reg), self.f);
                self.write_r8(mmu, reg, res);
                self.f = flags;
            }
            Instruction::Inc16(reg) => {
                let val = self.read_r16(reg).wrapping_add(1);
                self.write_r16(reg, val);
            }
            Instruction::Dec16(reg) => {
                let val = self.read_r16(reg).wrapping_sub(1);
                self.write_r16(reg, val);
            }
            Instruction::AddHl(reg) => {
                let (res, flags) = alu::add16(self.get_hl(), self.read_r16(reg), self.f);
                self.set_hl(res);
                self.f = flags;
            }
            Instruction::AddSp => {
                let offset = self.fetch8(mmu) as i8;
                let (res, flags) = alu::add_sp_offset(self.sp, offset);
                self.sp = res;
                self.f = flags;
            }
            Instruction::Alu(op, reg) => {
                let val = self.read_r8(mmu, reg);
                self.alu(op, val);
            }
            Instruction::AluImm(op) => {
                let val = self.fetch8(mmu);
                self.alu(op, val);
            }
            Instruction::Rlca => {
                let (res, flags) = alu::rlc(self.a);
                self.a = res;
                self.f = flags & FLAG_C;
            }
            Instruction::Rrca => {
                let (res, flags) = alu::rrc(self.a);
                self.a = res;
                self.f = flags & FLAG_C;
            }
            Instruction::Rla => {
                let (res, flags) = alu::rl(self.a, self.f);
                self.a = res;
                self.f = flags & FLAG_C;
            }
            Instruction::Rra => {
                let (res, flags) = alu::rr(self.a, self.f);
                self.a = res;
                self.f = flags & FLAG_C;
            }
            Instruction::Daa => {
                let (res, flags) = alu::daa(self.a, self.f);
                self.a = res;
                self.f = flags;
            }
            Instruction::Cpl => {
                self.a = !self.a;
                self.f |= FLAG_N | FLAG_H;
            }
            Instruction::Scf => self.f = (self.f & FLAG_Z) | FLAG_C,
            Instruction::Ccf => self.f = (self.f & (FLAG_Z | FLAG_C)) ^ FLAG_C,
            Instruction::Jr(cond) => {
                let offset = self.fetch8(mmu) as i8;
                if cond.is_none_or(|c| self.condition(c)) {
                    self.pc = self.pc.wrapping_add(offset as i16 as u16);
                    taken = true;
                }
            }
            Instruction::Jp(cond) => {
                let addr = self.fetch16(mmu);
                if cond.is_none_or(|c| self.condition(c)) {
                    self.pc = addr;
                    taken = true;
                }
            }
            Instruction::JpHl => self.pc = self.get_hl(),
            Instruction::Call(cond) => {
                let addr = self.fetch16(mmu);
                if cond.is_none_or(|c| self.condition(c)) {
                    let ret = self.pc;
                    self.push_stack(mmu, ret);
                    self.pc = addr;
                    taken = true;
                }
            }
            Instruction::Ret(cond) => {
                if cond.is_none_or(|c| self.condition(c)) {
                    self.pc = self.pop_stack(mmu);
                    taken = true;
                }
            }
            Instruction::Reti => {
                self.pc = self.pop_stack(mmu);
                self.ime = true;
            }
            Instruction::Rst(vector) => {
                let ret = self.pc;
                self.push_stack(mmu, ret);
                self.pc = vector;
            }
            Instruction::Push(reg) => {
                let val = match reg {
                    StackReg::BC => self.get_bc(),
                    StackReg::DE => self.get_de(),
                    StackReg::HL => self.get_hl(),
                    StackReg::AF => self.get_af(),
                };
                self.push_stack(mmu, val);
            }
            Instruction::Pop(reg) => {
                let val = self.pop_stack(mmu);
                match reg {
                    StackReg::BC => self.set_bc(val),
                    StackReg::DE => self.set_de(val),
                    StackReg::HL => self.set_hl(val),
                    StackReg::AF => self.set_af(val),
                }
            }
            Instruction::Prefix => {
                let cb = self.fetch8(mmu);
                self.execute_cb(mmu, instruction::decode_cb(cb));
                return instruction::cb_cycles(cb);
            }
        }
        instruction::cycles(opcode, taken)
    }

    fn alu(&mut self, op: AluOp, val: u8) {
        let carry = self.flag(FLAG_C);
        let (res, flags) = match op {
            AluOp::Add => alu::add8(self.a, val, false),
            AluOp::Adc => alu::add8(self.a, val, carry),
            AluOp::Sub => alu::sub8(self.a, val, false),
            AluOp::Sbc => alu::sub8(self.a, val, carry),
            AluOp::And => alu::and8(self.a, val),
            AluOp::Xor => alu::xor8(self.a, val),
            AluOp::Or => alu::or8(self.a, val),
            AluOp::Cp => {
                let (_, flags) = alu::sub8(self.a, val, false);
                (self.a, flags)
            }
        };
        self.a = res;
        self.f = flags;
    }

    fn execute_cb(&mut self, mmu: &mut Mmu, instr: CbInstruction) {
        match instr {
            CbInstruction::Shift(op, reg) => {
                let val = self.read_r8(mmu, reg);
                let (res, flags) = match op {
                    ShiftOp::Rlc => alu::rlc(val),
                    ShiftOp::Rrc => alu::rrc(val),
                    ShiftOp::Rl => alu::rl(val, self.f),
                    ShiftOp::Rr => alu::rr(val, self.f),
                    ShiftOp::Sla => alu::sla(val),
                    ShiftOp::Sra => alu::sra(val),
                    ShiftOp::Swap => alu::swap(val),
                    ShiftOp::Srl => alu::srl(val),
                };
                self.write_r8(mmu, reg, res);
                self.f = flags;
            }
            CbInstruction::Bit(n, reg) => {
                let val = self.read_r8(mmu, reg);
                self.f = alu::bit(n, val, self.f);
            }
            CbInstruction::Res(n, reg) => {
                let val = self.read_r8(mmu, reg) & !(1 << n);
                self.write_r8(mmu, reg, val);
            }
            CbInstruction::Set(n, reg) => {
                let val = self.read_r8(mmu, reg) | (1 << n);
                self.write_r8(mmu, reg, val);
            }
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
