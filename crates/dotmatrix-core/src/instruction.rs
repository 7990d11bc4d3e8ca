//! Closed instruction set: opcode decoding, disassembly and cycle tables.

use std::fmt;

/// 8-bit operand selected by a 3-bit register field. `HlInd` is `(HL)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    B,
    C,
    D,
    E,
    H,
    L,
    HlInd,
    A,
}

impl Reg8 {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Reg8::B,
            1 => Reg8::C,
            2 => Reg8::D,
            3 => Reg8::E,
            4 => Reg8::H,
            5 => Reg8::L,
            6 => Reg8::HlInd,
            _ => Reg8::A,
        }
    }
}

/// Register pairs addressable by 16-bit loads and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    BC,
    DE,
    HL,
    SP,
}

impl Reg16 {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Reg16::BC,
            1 => Reg16::DE,
            2 => Reg16::HL,
            _ => Reg16::SP,
        }
    }
}

/// Register pairs addressable by PUSH and POP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackReg {
    BC,
    DE,
    HL,
    AF,
}

impl StackReg {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => StackReg::BC,
            1 => StackReg::DE,
            2 => StackReg::HL,
            _ => StackReg::AF,
        }
    }
}

/// Pointer forms of `LD (rr),A` and `LD A,(rr)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indirect {
    BC,
    DE,
    HlInc,
    HlDec,
}

impl Indirect {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Indirect::BC,
            1 => Indirect::DE,
            2 => Indirect::HlInc,
            _ => Indirect::HlDec,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    NZ,
    Z,
    NC,
    C,
}

impl Condition {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Condition::NZ,
            1 => Condition::Z,
            2 => Condition::NC,
            _ => Condition::C,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => AluOp::Add,
            1 => AluOp::Adc,
            2 => AluOp::Sub,
            3 => AluOp::Sbc,
            4 => AluOp::And,
            5 => AluOp::Xor,
            6 => AluOp::Or,
            _ => AluOp::Cp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

impl ShiftOp {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => ShiftOp::Rlc,
            1 => ShiftOp::Rrc,
            2 => ShiftOp::Rl,
            3 => ShiftOp::Rr,
            4 => ShiftOp::Sla,
            5 => ShiftOp::Sra,
            6 => ShiftOp::Swap,
            _ => ShiftOp::Srl,
        }
    }
}

/// A primary-table instruction. Immediate operands are fetched at execution
/// time and do not appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Stop,
    Halt,
    Di,
    Ei,
    /// LD r,r'
    Ld(Reg8, Reg8),
    /// LD r,d8
    LdImm(Reg8),
    /// LD rr,d16
    Ld16Imm(Reg16),
    /// LD (rr),A
    StoreA(Indirect),
    /// LD A,(rr)
    LoadA(Indirect),
    /// LD (a16),A
    StoreAbs,
    /// LD A,(a16)
    LoadAbs,
    /// LDH (a8),A
    StoreHigh,
    /// LDH A,(a8)
    LoadHigh,
    /// LD (C),A
    StoreHighC,
    /// LD A,(C)
    LoadHighC,
    /// LD (a16),SP
    StoreSp,
    LdSpHl,
    LdHlSpOffset,
    Inc(Reg8),
    Dec(Reg8),
    Inc16(Reg16),
    Dec16(Reg16),
    AddHl(Reg16),
    AddSp,
    Alu(AluOp, Reg8),
    AluImm(AluOp),
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Jr(Option<Condition>),
    Jp(Option<Condition>),
    JpHl,
    Call(Option<Condition>),
    Ret(Option<Condition>),
    Reti,
    Rst(u16),
    Push(StackReg),
    Pop(StackReg),
    /// Escape into the CB-prefixed table.
    Prefix,
}

/// A CB-prefixed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CbInstruction {
    Shift(ShiftOp, Reg8),
    Bit(u8, Reg8),
    Res(u8, Reg8),
    Set(u8, Reg8),
}

/// Decode a primary opcode. The eleven holes in the table yield `None`.
pub fn decode(opcode: u8) -> Option<Instruction> {
    use Instruction::*;

    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let p = y >> 1;

    let instr = match opcode {
        0x00 => Nop,
        0x08 => StoreSp,
        0x10 => Stop,
        0x18 => Jr(None),
        0x20 | 0x28 | 0x30 | 0x38 => Jr(Some(Condition::from_bits(y - 4))),
        0x01 | 0x11 | 0x21 | 0x31 => Ld16Imm(Reg16::from_bits(p)),
        0x09 | 0x19 | 0x29 | 0x39 => AddHl(Reg16::from_bits(p)),
        0x02 | 0x12 | 0x22 | 0x32 => StoreA(Indirect::from_bits(p)),
        0x0A | 0x1A | 0x2A | 0x3A => LoadA(Indirect::from_bits(p)),
        0x03 | 0x13 | 0x23 | 0x33 => Inc16(Reg16::from_bits(p)),
        0x0B | 0x1B | 0x2B | 0x3B => Dec16(Reg16::from_bits(p)),
        0x00..=0x3F if z == 4 => Inc(Reg8::from_bits(y)),
        0x00..=0x3F if z == 5 => Dec(Reg8::from_bits(y)),
        0x00..=0x3F if z == 6 => LdImm(Reg8::from_bits(y)),
        0x07 => Rlca,
        0x0F => Rrca,
        0x17 => Rla,
        0x1F => Rra,
        0x27 => Daa,
        0x2F => Cpl,
        0x37 => Scf,
        0x3F => Ccf,
        0x76 => Halt,
        0x40..=0x7F => Ld(Reg8::from_bits(y), Reg8::from_bits(z)),
        0x80..=0xBF => Alu(AluOp::from_bits(y), Reg8::from_bits(z)),
        0xC0 | 0xC8 | 0xD0 | 0xD8 => Ret(Some(Condition::from_bits(y))),
        0xE0 => StoreHigh,
        0xE8 => AddSp,
        0xF0 => LoadHigh,
        0xF8 => LdHlSpOffset,
        0xC1 | 0xD1 | 0xE1 | 0xF1 => Pop(StackReg::from_bits(p)),
        0xC5 | 0xD5 | 0xE5 | 0xF5 => Push(StackReg::from_bits(p)),
        0xC9 => Ret(None),
        0xD9 => Reti,
        0xE9 => JpHl,
        0xF9 => LdSpHl,
        0xC2 | 0xCA | 0xD2 | 0xDA => Jp(Some(Condition::from_bits(y))),
        0xC3 => Jp(None),
        0xE2 => StoreHighC,
        0xEA => StoreAbs,
        0xF2 => LoadHighC,
        0xFA => LoadAbs,
        0xCB => Prefix,
        0xF3 => Di,
        0xFB => Ei,
        0xC4 | 0xCC | 0xD4 | 0xDC => Call(Some(Condition::from_bits(y))),
        0xCD => Call(None),
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => AluImm(AluOp::from_bits(y)),
        0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => Rst(y as u16 * 8),
        // 0xD3 0xDB 0xDD 0xE3 0xE4 0xEB 0xEC 0xED 0xF4 0xFC 0xFD
        _ => return None,
    };
    Some(instr)
}

/// Decode a CB-prefixed opcode. Every byte is defined.
pub fn decode_cb(opcode: u8) -> CbInstruction {
    let reg = Reg8::from_bits(opcode);
    let n = (opcode >> 3) & 0x07;
    match opcode >> 6 {
        0 => CbInstruction::Shift(ShiftOp::from_bits(n), reg),
        1 => CbInstruction::Bit(n, reg),
        2 => CbInstruction::Res(n, reg),
        _ => CbInstruction::Set(n, reg),
    }
}

/// T-cycles per primary opcode. Conditional branches list the not-taken
/// cost; 0xCB is zero because the CB table carries the whole cost. Holes
/// are zero.
#[rustfmt::skip]
pub const CYCLES: [u8; 256] = [
//  x0  x1  x2  x3  x4  x5  x6  x7  x8  x9  xA  xB  xC  xD  xE  xF
     4, 12,  8,  8,  4,  4,  8,  4, 20,  8,  8,  8,  4,  4,  8,  4, // 0x
     4, 12,  8,  8,  4,  4,  8,  4, 12,  8,  8,  8,  4,  4,  8,  4, // 1x
     8, 12,  8,  8,  4,  4,  8,  4,  8,  8,  8,  8,  4,  4,  8,  4, // 2x
     8, 12,  8,  8, 12, 12, 12,  4,  8,  8,  8,  8,  4,  4,  8,  4, // 3x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 4x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 5x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 6x
     8,  8,  8,  8,  8,  8,  4,  8,  4,  4,  4,  4,  4,  4,  8,  4, // 7x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 8x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 9x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // Ax
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // Bx
     8, 12, 12, 16, 12, 16,  8, 16,  8, 16, 12,  0, 12, 24,  8, 16, // Cx
     8, 12, 12,  0, 12, 16,  8, 16,  8, 16, 12,  0, 12,  0,  8, 16, // Dx
    12, 12,  8,  0,  0, 16,  8, 16, 16,  4, 16,  0,  0,  0,  8, 16, // Ex
    12, 12,  8,  4,  0, 16,  8, 16, 12,  8, 16,  4,  0,  0,  8, 16, // Fx
];

/// Cost of a conditional branch whose condition held.
fn taken_cycles(opcode: u8) -> Option<u8> {
    match opcode {
        0x20 | 0x28 | 0x30 | 0x38 => Some(12),
        0xC0 | 0xC8 | 0xD0 | 0xD8 => Some(20),
        0xC2 | 0xCA | 0xD2 | 0xDA => Some(16),
        0xC4 | 0xCC | 0xD4 | 0xDC => Some(24),
        _ => None,
    }
}

/// T-cycles for a primary opcode given whether its branch was taken.
/// Unconditional opcodes ignore `taken`.
pub fn cycles(opcode: u8, taken: bool) -> u32 {
    match taken_cycles(opcode) {
        Some(t) if taken => t as u32,
        _ => CYCLES[opcode as usize] as u32,
    }
}

/// T-cycles for a CB-prefixed opcode, prefix fetch included.
pub fn cb_cycles(opcode: u8) -> u32 {
    match (opcode >> 6, opcode & 0x07) {
        (1, 6) => 12,
        (_, 6) => 16,
        _ => 8,
    }
}

impl fmt::Display for Reg8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reg8::B => "B",
            Reg8::C => "C",
            Reg8::D => "D",
            Reg8::E => "E",
            Reg8::H => "H",
            Reg8::L => "L",
            Reg8::HlInd => "(HL)",
            Reg8::A => "A",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Reg16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reg16::BC => "BC",
            Reg16::DE => "DE",
            Reg16::HL => "HL",
            Reg16::SP => "SP",
        };
        f.write_str(s)
    }
}

impl fmt::Display for StackReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StackReg::BC => "BC",
            StackReg::DE => "DE",
            StackReg::HL => "HL",
            StackReg::AF => "AF",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Indirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Indirect::BC => "(BC)",
            Indirect::DE => "(DE)",
            Indirect::HlInc => "(HL+)",
            Indirect::HlDec => "(HL-)",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Condition::NZ => "NZ",
            Condition::Z => "Z",
            Condition::NC => "NC",
            Condition::C => "C",
        };
        f.write_str(s)
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AluOp::Add => "ADD A,",
            AluOp::Adc => "ADC A,",
            AluOp::Sub => "SUB ",
            AluOp::Sbc => "SBC A,",
            AluOp::And => "AND ",
            AluOp::Xor => "XOR ",
            AluOp::Or => "OR ",
            AluOp::Cp => "CP ",
        };
        f.write_str(s)
    }
}

impl fmt::Display for ShiftOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShiftOp::Rlc => "RLC",
            ShiftOp::Rrc => "RRC",
            ShiftOp::Rl => "RL",
            ShiftOp::Rr => "RR",
            ShiftOp::Sla => "SLA",
            ShiftOp::Sra => "SRA",
            ShiftOp::Swap => "SWAP",
            ShiftOp::Srl => "SRL",
        };
        f.write_str(s)
    }
}

fn cond_prefix(cond: &Option<Condition>) -> String {
    cond.map(|c| format!("{c},")).unwrap_or_default()
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match self {
            Nop => write!(f, "NOP"),
            Stop => write!(f, "STOP"),
            Halt => write!(f, "HALT"),
            Di => write!(f, "DI"),
            Ei => write!(f, "EI"),
            Ld(dst, src) => write!(f, "LD {dst},{src}"),
            LdImm(dst) => write!(f, "LD {dst},d8"),
            Ld16Imm(dst) => write!(f, "LD {dst},d16"),
            StoreA(ptr) => write!(f, "LD {ptr},A"),
            LoadA(ptr) => write!(f, "LD A,{ptr}"),
            StoreAbs => write!(f, "LD (a16),A"),
            LoadAbs => write!(f, "LD A,(a16)"),
            StoreHigh => write!(f, "LDH (a8),A"),
            LoadHigh => write!(f, "LDH A,(a8)"),
            StoreHighC => write!(f, "LD (C),A"),
            LoadHighC => write!(f, "LD A,(C)"),
            StoreSp => write!(f, "LD (a16),SP"),
            LdSpHl => write!(f, "LD SP,HL"),
            LdHlSpOffset => write!(f, "LD HL,SP+r8"),
            Inc(r) => write!(f, "INC {r}"),
            Dec(r) => write!(f, "DEC {r}"),
            Inc16(r) => write!(f, "INC {r}"),
            Dec16(r) => write!(f, "DEC {r}"),
            AddHl(r) => write!(f, "ADD HL,{r}"),
            AddSp => write!(f, "ADD SP,r8"),
            Alu(op, r) => write!(f, "{op}{r}"),
            AluImm(op) => write!(f, "{op}d8"),
            Rlca => write!(f, "RLCA"),
            Rrca => write!(f, "RRCA"),
            Rla => write!(f, "RLA"),
            Rra => write!(f, "RRA"),
            Daa => write!(f, "DAA"),
            Cpl => write!(f, "CPL"),
            Scf => write!(f, "SCF"),
            Ccf => write!(f, "CCF"),
            Jr(c) => write!(f, "JR {}r8", cond_prefix(c)),
            Jp(c) => write!(f, "JP {}a16", cond_prefix(c)),
            JpHl => write!(f, "JP HL"),
            Call(c) => write!(f, "CALL {}a16", cond_prefix(c)),
            Ret(Some(c)) => write!(f, "RET {c}"),
            Ret(None) => write!(f, "RET"),
            Reti => write!(f, "RETI"),
            Rst(vec) => write!(f, "RST {vec:02X}H"),
            Push(r) => write!(f, "PUSH {r}"),
            Pop(r) => write!(f, "POP {r}"),
            Prefix => write!(f, "PREFIX CB"),
        }
    }
}

impl fmt::Display for CbInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CbInstruction::Shift(op, r) => write!(f, "{op} {r}"),
            CbInstruction::Bit(n, r) => write!(f, "BIT {n},{r}"),
            CbInstruction::Res(n, r) => write!(f, "RES {n},{r}"),
            CbInstruction::Set(n, r) => write!(f, "SET {n},{r}"),
        }
    }
}
