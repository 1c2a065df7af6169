//! Instruction encoding table
//!
//! The [`opcode_table!`] macro holds the canonical opcode list and generates:
//! - the [`op`] module of opcode constants
//! - [`mnemonic`] and [`operands`] lookups used by the disassembler
//!
//! Short forms that encode their operand in the opcode itself (`SLDC`,
//! `SLDL`, `SLDO`, `SIND`) are ranges and are handled outside the table.
//!
//! # Operand Kinds
//!
//! - `UB`: unsigned byte
//! - `SB`: signed byte (branch displacement)
//! - `DB`: lexical level difference byte
//! - `B`: one byte below 0x80, otherwise two bytes `((b & 0x7F) << 8) | next`
//! - `W`: word at the next even address, in memory byte order
//! - `Str`: length byte followed by that many characters
//! - `Words`: count byte, then that many aligned words (`LDC`)
//! - `Cmp`: comparison type byte, followed by a `B` size for array compares
//! - `Case`: aligned `low`, `high`, default `UJP` and a self-relative table (`XJP`)

/// Operand encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    UB,
    SB,
    DB,
    B,
    W,
    Str,
    Words,
    Cmp,
    Case,
}

macro_rules! opcode_table {
    ($( $name:ident = $code:literal [$($kind:ident),*] ),* $(,)?) => {
        /// Opcode constants
        pub mod op {
            $( pub const $name: u8 = $code; )*
        }

        /// Mnemonic for a table opcode
        fn table_mnemonic(opcode: u8) -> Option<&'static str> {
            match opcode {
                $( $code => Some(stringify!($name)), )*
                _ => None,
            }
        }

        /// Operand list for a table opcode
        fn table_operands(opcode: u8) -> Option<&'static [Operand]> {
            match opcode {
                $( $code => Some(&[$(Operand::$kind),*]), )*
                _ => None,
            }
        }
    };
}

opcode_table! {
    ABI = 128 [],
    ABR = 129 [],
    ADI = 130 [],
    ADR = 131 [],
    LAND = 132 [],
    DIF = 133 [],
    DVI = 134 [],
    DVR = 135 [],
    CHK = 136 [],
    FLO = 137 [],
    FLT = 138 [],
    INN = 139 [],
    INT = 140 [],
    LOR = 141 [],
    MODI = 142 [],
    MPI = 143 [],
    MPR = 144 [],
    NGI = 145 [],
    NGR = 146 [],
    LNOT = 147 [],
    SRS = 148 [],
    SBI = 149 [],
    SBR = 150 [],
    SGS = 151 [],
    SQI = 152 [],
    SQR = 153 [],
    STO = 154 [],
    IXS = 155 [],
    UNI = 156 [],
    LDE = 157 [UB, B],
    CSP = 158 [UB],
    LDCN = 159 [],
    ADJ = 160 [UB],
    FJP = 161 [SB],
    INC = 162 [B],
    IND = 163 [B],
    IXA = 164 [B],
    LAO = 165 [B],
    LSA = 166 [Str],
    LAE = 167 [UB, B],
    MOV = 168 [B],
    LDO = 169 [B],
    SAS = 170 [UB],
    SRO = 171 [B],
    XJP = 172 [Case],
    RNP = 173 [DB],
    CIP = 174 [UB],
    EQU = 175 [Cmp],
    GEQ = 176 [Cmp],
    GRT = 177 [Cmp],
    LDA = 178 [DB, B],
    LDC = 179 [Words],
    LEQ = 180 [Cmp],
    LES = 181 [Cmp],
    LOD = 182 [DB, B],
    NEQ = 183 [Cmp],
    STR = 184 [DB, B],
    UJP = 185 [SB],
    LDP = 186 [],
    STP = 187 [],
    LDM = 188 [UB],
    STM = 189 [UB],
    LDB = 190 [],
    STB = 191 [],
    IXP = 192 [UB, UB],
    RBP = 193 [DB],
    CBP = 194 [UB],
    EQUI = 195 [],
    GEQI = 196 [],
    GRTI = 197 [],
    LLA = 198 [B],
    LDCI = 199 [W],
    LEQI = 200 [],
    LESI = 201 [],
    LDL = 202 [B],
    NEQI = 203 [],
    STL = 204 [B],
    CXP = 205 [UB, UB],
    CLP = 206 [UB],
    CGP = 207 [UB],
    LPA = 208 [Str],
    STE = 209 [UB, B],
    EFJ = 211 [SB],
    NFJ = 212 [SB],
    BPT = 213 [B],
    XIT = 214 [],
    NOP = 215 [],
}

/// Short-form ranges
pub const SLDC_LAST: u8 = 127;
pub const SLDL_FIRST: u8 = 216;
pub const SLDO_FIRST: u8 = 232;
pub const SIND_FIRST: u8 = 248;

/// Comparison type bytes
pub mod cmp {
    pub const REAL: u8 = 2;
    pub const STRING: u8 = 4;
    pub const BOOLEAN: u8 = 6;
    pub const SET: u8 = 8;
    pub const BYTE_ARRAY: u8 = 10;
    pub const WORD_ARRAY: u8 = 12;
}

/// Opcode classification, including the short forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// Push the opcode value itself
    ShortConstant(u8),
    /// Load local word 1-16
    ShortLocal(u8),
    /// Load global word 1-16
    ShortGlobal(u8),
    /// Indirect load with offset 0-7
    ShortIndirect(u8),
    /// Anything in the table
    Table(u8),
    /// Unassigned opcode
    Unused(u8),
}

pub fn decode(opcode: u8) -> Decoded {
    match opcode {
        0..=SLDC_LAST => Decoded::ShortConstant(opcode),
        SLDL_FIRST..=231 => Decoded::ShortLocal(opcode - SLDL_FIRST + 1),
        SLDO_FIRST..=247 => Decoded::ShortGlobal(opcode - SLDO_FIRST + 1),
        SIND_FIRST..=255 => Decoded::ShortIndirect(opcode - SIND_FIRST),
        _ if table_mnemonic(opcode).is_some() => Decoded::Table(opcode),
        _ => Decoded::Unused(opcode),
    }
}

/// Mnemonic for any opcode
pub fn mnemonic(opcode: u8) -> &'static str {
    match decode(opcode) {
        Decoded::ShortConstant(_) => "SLDC",
        Decoded::ShortLocal(_) => "SLDL",
        Decoded::ShortGlobal(_) => "SLDO",
        Decoded::ShortIndirect(_) => "SIND",
        Decoded::Table(code) => table_mnemonic(code).unwrap_or("???"),
        Decoded::Unused(_) => "???",
    }
}

/// Operand kinds following an opcode
pub fn operands(opcode: u8) -> &'static [Operand] {
    table_operands(opcode).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_forms_decode_their_operand() {
        assert_eq!(decode(5), Decoded::ShortConstant(5));
        assert_eq!(decode(216), Decoded::ShortLocal(1));
        assert_eq!(decode(231), Decoded::ShortLocal(16));
        assert_eq!(decode(232), Decoded::ShortGlobal(1));
        assert_eq!(decode(255), Decoded::ShortIndirect(7));
        assert_eq!(decode(210), Decoded::Unused(210));
    }

    #[test]
    fn test_table_lookups() {
        assert_eq!(op::SBI, 149);
        assert_eq!(mnemonic(op::CXP), "CXP");
        assert_eq!(operands(op::CXP), &[Operand::UB, Operand::UB]);
        assert_eq!(operands(op::LDCI), &[Operand::W]);
        assert_eq!(mnemonic(250), "SIND");
        assert!(operands(op::ADI).is_empty());
    }
}
