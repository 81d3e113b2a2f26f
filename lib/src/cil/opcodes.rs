//! The CIL opcode table
//!
//! Every opcode carries the metadata the analyses need to reason about it without knowing its
//! semantics: how it affects control flow, what kind of operand follows it in the byte stream, and
//! how many values it pops and pushes (expressed as a [`StackBehaviour`] class). The table follows
//! [ECMA-335 partition III][0].
//!
//! [0]: https://www.ecma-international.org/publications-and-standards/standards/ecma-335/

use std::fmt;

/// How an instruction affects control flow
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FlowControl {
    /// Unconditional branch (`br`, `leave`)
    Branch,

    /// Debugger break
    Break,

    /// Method call (including `jmp` and `newobj`)
    Call,

    /// Conditional branch (`brtrue`, `beq`, `switch`, ...)
    CondBranch,

    /// Prefix applying to the next instruction (`tail.`, `volatile.`, ...)
    Meta,

    /// Falls through to the next instruction
    Next,

    /// Leaves the method or the protected block (`ret`, `endfinally`, `endfilter`)
    Return,

    /// Raises an exception (`throw`, `rethrow`)
    Throw,
}

/// Shape of the operand encoded after the opcode
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OperandType {
    InlineNone,
    InlineBrTarget,
    ShortInlineBrTarget,
    InlineSwitch,
    InlineMethod,
    InlineSig,
    InlineField,
    InlineType,
    InlineTok,
    InlineString,
    InlineI,
    ShortInlineI,
    InlineI8,
    InlineR,
    ShortInlineR,
    InlineVar,
    ShortInlineVar,
    InlineArg,
    ShortInlineArg,
}

impl OperandType {
    /// Encoded width of the operand in bytes
    ///
    /// `switch` has a variable width (4 bytes of count, then 4 bytes per target) so this returns
    /// `None` for it.
    pub fn fixed_width(self) -> Option<usize> {
        use OperandType::*;
        Some(match self {
            InlineNone => 0,
            ShortInlineBrTarget | ShortInlineI | ShortInlineVar | ShortInlineArg => 1,
            InlineVar | InlineArg => 2,
            InlineBrTarget | InlineMethod | InlineSig | InlineField | InlineType | InlineTok
            | InlineString | InlineI | ShortInlineR => 4,
            InlineI8 | InlineR => 8,
            InlineSwitch => return None,
        })
    }

    /// Is the operand one or more branch targets?
    pub fn is_branch_target(self) -> bool {
        matches!(
            self,
            OperandType::InlineBrTarget | OperandType::ShortInlineBrTarget | OperandType::InlineSwitch
        )
    }
}

/// Stack behaviour class of an opcode
///
/// An opcode has one class for what it pops and one for what it pushes. The names encode the
/// operands from bottom to top: `PoprefPopiPopi` pops an object reference, then an integer, then
/// another integer (so three values in total).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StackBehaviour {
    Pop0,
    Pop1,
    Pop1Pop1,
    Popi,
    PopiPop1,
    PopiPopi,
    PopiPopi8,
    PopiPopiPopi,
    PopiPopr4,
    PopiPopr8,
    Popref,
    PoprefPop1,
    PoprefPopi,
    PoprefPopiPopi,
    PoprefPopiPopi8,
    PoprefPopiPopr4,
    PoprefPopiPopr8,
    PoprefPopiPopref,
    /// Empties the whole evaluation stack (`leave`)
    PopAll,
    /// Depends on the operand (calls, `ret`)
    Varpop,

    Push0,
    Push1,
    Push1Push1,
    Pushi,
    Pushi8,
    Pushr4,
    Pushr8,
    Pushref,
    /// Depends on the operand (calls)
    Varpush,
}

/// Static description of an opcode
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct OpCode {
    pub code: Code,

    /// Assembler mnemonic (eg. `ldc.i4.s`)
    pub name: &'static str,

    /// Encoded value: single byte opcodes are `0x00..=0xE0`, two byte ones are `0xFE00..`
    pub value: u16,

    pub flow_control: FlowControl,
    pub operand_type: OperandType,
    pub stack_pop: StackBehaviour,
    pub stack_push: StackBehaviour,
}

impl OpCode {
    /// Number of bytes used to encode the opcode itself (not including the operand)
    pub fn size(&self) -> usize {
        if self.value > 0xFF {
            2
        } else {
            1
        }
    }
}

impl fmt::Debug for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

macro_rules! opcodes {
    ($( $variant:ident = $value:literal, $name:literal, $flow:ident, $operand:ident, $pop:ident, $push:ident; )*) => {
        /// CIL opcode
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub enum Code {
            $( $variant, )*
        }

        impl Code {
            /// Every opcode, in encoding order
            pub const ALL: &'static [Code] = &[ $( Code::$variant, )* ];

            /// Static description of the opcode
            pub fn op_code(self) -> OpCode {
                match self {
                    $(
                        Code::$variant => OpCode {
                            code: Code::$variant,
                            name: $name,
                            value: $value,
                            flow_control: FlowControl::$flow,
                            operand_type: OperandType::$operand,
                            stack_pop: StackBehaviour::$pop,
                            stack_push: StackBehaviour::$push,
                        },
                    )*
                }
            }

            /// Look up an opcode from its encoded value
            pub fn from_value(value: u16) -> Option<Code> {
                match value {
                    $( $value => Some(Code::$variant), )*
                    _ => None,
                }
            }

            /// Look up an opcode from its mnemonic
            pub fn from_name(name: &str) -> Option<Code> {
                match name {
                    $( $name => Some(Code::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    Nop = 0x00, "nop", Next, InlineNone, Pop0, Push0;
    Break = 0x01, "break", Break, InlineNone, Pop0, Push0;
    Ldarg0 = 0x02, "ldarg.0", Next, InlineNone, Pop0, Push1;
    Ldarg1 = 0x03, "ldarg.1", Next, InlineNone, Pop0, Push1;
    Ldarg2 = 0x04, "ldarg.2", Next, InlineNone, Pop0, Push1;
    Ldarg3 = 0x05, "ldarg.3", Next, InlineNone, Pop0, Push1;
    Ldloc0 = 0x06, "ldloc.0", Next, InlineNone, Pop0, Push1;
    Ldloc1 = 0x07, "ldloc.1", Next, InlineNone, Pop0, Push1;
    Ldloc2 = 0x08, "ldloc.2", Next, InlineNone, Pop0, Push1;
    Ldloc3 = 0x09, "ldloc.3", Next, InlineNone, Pop0, Push1;
    Stloc0 = 0x0A, "stloc.0", Next, InlineNone, Pop1, Push0;
    Stloc1 = 0x0B, "stloc.1", Next, InlineNone, Pop1, Push0;
    Stloc2 = 0x0C, "stloc.2", Next, InlineNone, Pop1, Push0;
    Stloc3 = 0x0D, "stloc.3", Next, InlineNone, Pop1, Push0;
    LdargS = 0x0E, "ldarg.s", Next, ShortInlineArg, Pop0, Push1;
    LdargaS = 0x0F, "ldarga.s", Next, ShortInlineArg, Pop0, Pushi;
    StargS = 0x10, "starg.s", Next, ShortInlineArg, Pop1, Push0;
    LdlocS = 0x11, "ldloc.s", Next, ShortInlineVar, Pop0, Push1;
    LdlocaS = 0x12, "ldloca.s", Next, ShortInlineVar, Pop0, Pushi;
    StlocS = 0x13, "stloc.s", Next, ShortInlineVar, Pop1, Push0;
    Ldnull = 0x14, "ldnull", Next, InlineNone, Pop0, Pushref;
    LdcI4M1 = 0x15, "ldc.i4.m1", Next, InlineNone, Pop0, Pushi;
    LdcI4_0 = 0x16, "ldc.i4.0", Next, InlineNone, Pop0, Pushi;
    LdcI4_1 = 0x17, "ldc.i4.1", Next, InlineNone, Pop0, Pushi;
    LdcI4_2 = 0x18, "ldc.i4.2", Next, InlineNone, Pop0, Pushi;
    LdcI4_3 = 0x19, "ldc.i4.3", Next, InlineNone, Pop0, Pushi;
    LdcI4_4 = 0x1A, "ldc.i4.4", Next, InlineNone, Pop0, Pushi;
    LdcI4_5 = 0x1B, "ldc.i4.5", Next, InlineNone, Pop0, Pushi;
    LdcI4_6 = 0x1C, "ldc.i4.6", Next, InlineNone, Pop0, Pushi;
    LdcI4_7 = 0x1D, "ldc.i4.7", Next, InlineNone, Pop0, Pushi;
    LdcI4_8 = 0x1E, "ldc.i4.8", Next, InlineNone, Pop0, Pushi;
    LdcI4S = 0x1F, "ldc.i4.s", Next, ShortInlineI, Pop0, Pushi;
    LdcI4 = 0x20, "ldc.i4", Next, InlineI, Pop0, Pushi;
    LdcI8 = 0x21, "ldc.i8", Next, InlineI8, Pop0, Pushi8;
    LdcR4 = 0x22, "ldc.r4", Next, ShortInlineR, Pop0, Pushr4;
    LdcR8 = 0x23, "ldc.r8", Next, InlineR, Pop0, Pushr8;
    Dup = 0x25, "dup", Next, InlineNone, Pop1, Push1Push1;
    Pop = 0x26, "pop", Next, InlineNone, Pop1, Push0;
    Jmp = 0x27, "jmp", Call, InlineMethod, Pop0, Push0;
    Call = 0x28, "call", Call, InlineMethod, Varpop, Varpush;
    Calli = 0x29, "calli", Call, InlineSig, Varpop, Varpush;
    Ret = 0x2A, "ret", Return, InlineNone, Varpop, Push0;
    BrS = 0x2B, "br.s", Branch, ShortInlineBrTarget, Pop0, Push0;
    BrfalseS = 0x2C, "brfalse.s", CondBranch, ShortInlineBrTarget, Popi, Push0;
    BrtrueS = 0x2D, "brtrue.s", CondBranch, ShortInlineBrTarget, Popi, Push0;
    BeqS = 0x2E, "beq.s", CondBranch, ShortInlineBrTarget, Pop1Pop1, Push0;
    BgeS = 0x2F, "bge.s", CondBranch, ShortInlineBrTarget, Pop1Pop1, Push0;
    BgtS = 0x30, "bgt.s", CondBranch, ShortInlineBrTarget, Pop1Pop1, Push0;
    BleS = 0x31, "ble.s", CondBranch, ShortInlineBrTarget, Pop1Pop1, Push0;
    BltS = 0x32, "blt.s", CondBranch, ShortInlineBrTarget, Pop1Pop1, Push0;
    BneUnS = 0x33, "bne.un.s", CondBranch, ShortInlineBrTarget, Pop1Pop1, Push0;
    BgeUnS = 0x34, "bge.un.s", CondBranch, ShortInlineBrTarget, Pop1Pop1, Push0;
    BgtUnS = 0x35, "bgt.un.s", CondBranch, ShortInlineBrTarget, Pop1Pop1, Push0;
    BleUnS = 0x36, "ble.un.s", CondBranch, ShortInlineBrTarget, Pop1Pop1, Push0;
    BltUnS = 0x37, "blt.un.s", CondBranch, ShortInlineBrTarget, Pop1Pop1, Push0;
    Br = 0x38, "br", Branch, InlineBrTarget, Pop0, Push0;
    Brfalse = 0x39, "brfalse", CondBranch, InlineBrTarget, Popi, Push0;
    Brtrue = 0x3A, "brtrue", CondBranch, InlineBrTarget, Popi, Push0;
    Beq = 0x3B, "beq", CondBranch, InlineBrTarget, Pop1Pop1, Push0;
    Bge = 0x3C, "bge", CondBranch, InlineBrTarget, Pop1Pop1, Push0;
    Bgt = 0x3D, "bgt", CondBranch, InlineBrTarget, Pop1Pop1, Push0;
    Ble = 0x3E, "ble", CondBranch, InlineBrTarget, Pop1Pop1, Push0;
    Blt = 0x3F, "blt", CondBranch, InlineBrTarget, Pop1Pop1, Push0;
    BneUn = 0x40, "bne.un", CondBranch, InlineBrTarget, Pop1Pop1, Push0;
    BgeUn = 0x41, "bge.un", CondBranch, InlineBrTarget, Pop1Pop1, Push0;
    BgtUn = 0x42, "bgt.un", CondBranch, InlineBrTarget, Pop1Pop1, Push0;
    BleUn = 0x43, "ble.un", CondBranch, InlineBrTarget, Pop1Pop1, Push0;
    BltUn = 0x44, "blt.un", CondBranch, InlineBrTarget, Pop1Pop1, Push0;
    Switch = 0x45, "switch", CondBranch, InlineSwitch, Popi, Push0;
    LdindI1 = 0x46, "ldind.i1", Next, InlineNone, Popi, Pushi;
    LdindU1 = 0x47, "ldind.u1", Next, InlineNone, Popi, Pushi;
    LdindI2 = 0x48, "ldind.i2", Next, InlineNone, Popi, Pushi;
    LdindU2 = 0x49, "ldind.u2", Next, InlineNone, Popi, Pushi;
    LdindI4 = 0x4A, "ldind.i4", Next, InlineNone, Popi, Pushi;
    LdindU4 = 0x4B, "ldind.u4", Next, InlineNone, Popi, Pushi;
    LdindI8 = 0x4C, "ldind.i8", Next, InlineNone, Popi, Pushi8;
    LdindI = 0x4D, "ldind.i", Next, InlineNone, Popi, Pushi;
    LdindR4 = 0x4E, "ldind.r4", Next, InlineNone, Popi, Pushr4;
    LdindR8 = 0x4F, "ldind.r8", Next, InlineNone, Popi, Pushr8;
    LdindRef = 0x50, "ldind.ref", Next, InlineNone, Popi, Pushref;
    StindRef = 0x51, "stind.ref", Next, InlineNone, PopiPopi, Push0;
    StindI1 = 0x52, "stind.i1", Next, InlineNone, PopiPopi, Push0;
    StindI2 = 0x53, "stind.i2", Next, InlineNone, PopiPopi, Push0;
    StindI4 = 0x54, "stind.i4", Next, InlineNone, PopiPopi, Push0;
    StindI8 = 0x55, "stind.i8", Next, InlineNone, PopiPopi8, Push0;
    StindR4 = 0x56, "stind.r4", Next, InlineNone, PopiPopr4, Push0;
    StindR8 = 0x57, "stind.r8", Next, InlineNone, PopiPopr8, Push0;
    Add = 0x58, "add", Next, InlineNone, Pop1Pop1, Push1;
    Sub = 0x59, "sub", Next, InlineNone, Pop1Pop1, Push1;
    Mul = 0x5A, "mul", Next, InlineNone, Pop1Pop1, Push1;
    Div = 0x5B, "div", Next, InlineNone, Pop1Pop1, Push1;
    DivUn = 0x5C, "div.un", Next, InlineNone, Pop1Pop1, Push1;
    Rem = 0x5D, "rem", Next, InlineNone, Pop1Pop1, Push1;
    RemUn = 0x5E, "rem.un", Next, InlineNone, Pop1Pop1, Push1;
    And = 0x5F, "and", Next, InlineNone, Pop1Pop1, Push1;
    Or = 0x60, "or", Next, InlineNone, Pop1Pop1, Push1;
    Xor = 0x61, "xor", Next, InlineNone, Pop1Pop1, Push1;
    Shl = 0x62, "shl", Next, InlineNone, Pop1Pop1, Push1;
    Shr = 0x63, "shr", Next, InlineNone, Pop1Pop1, Push1;
    ShrUn = 0x64, "shr.un", Next, InlineNone, Pop1Pop1, Push1;
    Neg = 0x65, "neg", Next, InlineNone, Pop1, Push1;
    Not = 0x66, "not", Next, InlineNone, Pop1, Push1;
    ConvI1 = 0x67, "conv.i1", Next, InlineNone, Pop1, Pushi;
    ConvI2 = 0x68, "conv.i2", Next, InlineNone, Pop1, Pushi;
    ConvI4 = 0x69, "conv.i4", Next, InlineNone, Pop1, Pushi;
    ConvI8 = 0x6A, "conv.i8", Next, InlineNone, Pop1, Pushi8;
    ConvR4 = 0x6B, "conv.r4", Next, InlineNone, Pop1, Pushr4;
    ConvR8 = 0x6C, "conv.r8", Next, InlineNone, Pop1, Pushr8;
    ConvU4 = 0x6D, "conv.u4", Next, InlineNone, Pop1, Pushi;
    ConvU8 = 0x6E, "conv.u8", Next, InlineNone, Pop1, Pushi8;
    Callvirt = 0x6F, "callvirt", Call, InlineMethod, Varpop, Varpush;
    Cpobj = 0x70, "cpobj", Next, InlineType, PopiPopi, Push0;
    Ldobj = 0x71, "ldobj", Next, InlineType, Popi, Push1;
    Ldstr = 0x72, "ldstr", Next, InlineString, Pop0, Pushref;
    Newobj = 0x73, "newobj", Call, InlineMethod, Varpop, Pushref;
    Castclass = 0x74, "castclass", Next, InlineType, Popref, Pushref;
    Isinst = 0x75, "isinst", Next, InlineType, Popref, Pushi;
    ConvRUn = 0x76, "conv.r.un", Next, InlineNone, Pop1, Pushr8;
    Unbox = 0x79, "unbox", Next, InlineType, Popref, Pushi;
    Throw = 0x7A, "throw", Throw, InlineNone, Popref, Push0;
    Ldfld = 0x7B, "ldfld", Next, InlineField, Popref, Push1;
    Ldflda = 0x7C, "ldflda", Next, InlineField, Popref, Pushi;
    Stfld = 0x7D, "stfld", Next, InlineField, PoprefPop1, Push0;
    Ldsfld = 0x7E, "ldsfld", Next, InlineField, Pop0, Push1;
    Ldsflda = 0x7F, "ldsflda", Next, InlineField, Pop0, Pushi;
    Stsfld = 0x80, "stsfld", Next, InlineField, Pop1, Push0;
    Stobj = 0x81, "stobj", Next, InlineType, PopiPop1, Push0;
    ConvOvfI1Un = 0x82, "conv.ovf.i1.un", Next, InlineNone, Pop1, Pushi;
    ConvOvfI2Un = 0x83, "conv.ovf.i2.un", Next, InlineNone, Pop1, Pushi;
    ConvOvfI4Un = 0x84, "conv.ovf.i4.un", Next, InlineNone, Pop1, Pushi;
    ConvOvfI8Un = 0x85, "conv.ovf.i8.un", Next, InlineNone, Pop1, Pushi8;
    ConvOvfU1Un = 0x86, "conv.ovf.u1.un", Next, InlineNone, Pop1, Pushi;
    ConvOvfU2Un = 0x87, "conv.ovf.u2.un", Next, InlineNone, Pop1, Pushi;
    ConvOvfU4Un = 0x88, "conv.ovf.u4.un", Next, InlineNone, Pop1, Pushi;
    ConvOvfU8Un = 0x89, "conv.ovf.u8.un", Next, InlineNone, Pop1, Pushi8;
    ConvOvfIUn = 0x8A, "conv.ovf.i.un", Next, InlineNone, Pop1, Pushi;
    ConvOvfUUn = 0x8B, "conv.ovf.u.un", Next, InlineNone, Pop1, Pushi;
    Box = 0x8C, "box", Next, InlineType, Pop1, Pushref;
    Newarr = 0x8D, "newarr", Next, InlineType, Popi, Pushref;
    Ldlen = 0x8E, "ldlen", Next, InlineNone, Popref, Pushi;
    Ldelema = 0x8F, "ldelema", Next, InlineType, PoprefPopi, Pushi;
    LdelemI1 = 0x90, "ldelem.i1", Next, InlineNone, PoprefPopi, Pushi;
    LdelemU1 = 0x91, "ldelem.u1", Next, InlineNone, PoprefPopi, Pushi;
    LdelemI2 = 0x92, "ldelem.i2", Next, InlineNone, PoprefPopi, Pushi;
    LdelemU2 = 0x93, "ldelem.u2", Next, InlineNone, PoprefPopi, Pushi;
    LdelemI4 = 0x94, "ldelem.i4", Next, InlineNone, PoprefPopi, Pushi;
    LdelemU4 = 0x95, "ldelem.u4", Next, InlineNone, PoprefPopi, Pushi;
    LdelemI8 = 0x96, "ldelem.i8", Next, InlineNone, PoprefPopi, Pushi8;
    LdelemI = 0x97, "ldelem.i", Next, InlineNone, PoprefPopi, Pushi;
    LdelemR4 = 0x98, "ldelem.r4", Next, InlineNone, PoprefPopi, Pushr4;
    LdelemR8 = 0x99, "ldelem.r8", Next, InlineNone, PoprefPopi, Pushr8;
    LdelemRef = 0x9A, "ldelem.ref", Next, InlineNone, PoprefPopi, Pushref;
    StelemI = 0x9B, "stelem.i", Next, InlineNone, PoprefPopiPopi, Push0;
    StelemI1 = 0x9C, "stelem.i1", Next, InlineNone, PoprefPopiPopi, Push0;
    StelemI2 = 0x9D, "stelem.i2", Next, InlineNone, PoprefPopiPopi, Push0;
    StelemI4 = 0x9E, "stelem.i4", Next, InlineNone, PoprefPopiPopi, Push0;
    StelemI8 = 0x9F, "stelem.i8", Next, InlineNone, PoprefPopiPopi8, Push0;
    StelemR4 = 0xA0, "stelem.r4", Next, InlineNone, PoprefPopiPopr4, Push0;
    StelemR8 = 0xA1, "stelem.r8", Next, InlineNone, PoprefPopiPopr8, Push0;
    StelemRef = 0xA2, "stelem.ref", Next, InlineNone, PoprefPopiPopref, Push0;
    LdelemAny = 0xA3, "ldelem.any", Next, InlineType, PoprefPopi, Push1;
    StelemAny = 0xA4, "stelem.any", Next, InlineType, PoprefPopiPopref, Push0;
    UnboxAny = 0xA5, "unbox.any", Next, InlineType, Popref, Push1;
    ConvOvfI1 = 0xB3, "conv.ovf.i1", Next, InlineNone, Pop1, Pushi;
    ConvOvfU1 = 0xB4, "conv.ovf.u1", Next, InlineNone, Pop1, Pushi;
    ConvOvfI2 = 0xB5, "conv.ovf.i2", Next, InlineNone, Pop1, Pushi;
    ConvOvfU2 = 0xB6, "conv.ovf.u2", Next, InlineNone, Pop1, Pushi;
    ConvOvfI4 = 0xB7, "conv.ovf.i4", Next, InlineNone, Pop1, Pushi;
    ConvOvfU4 = 0xB8, "conv.ovf.u4", Next, InlineNone, Pop1, Pushi;
    ConvOvfI8 = 0xB9, "conv.ovf.i8", Next, InlineNone, Pop1, Pushi8;
    ConvOvfU8 = 0xBA, "conv.ovf.u8", Next, InlineNone, Pop1, Pushi8;
    Refanyval = 0xC2, "refanyval", Next, InlineType, Pop1, Pushi;
    Ckfinite = 0xC3, "ckfinite", Next, InlineNone, Pop1, Pushr8;
    Mkrefany = 0xC6, "mkrefany", Next, InlineType, Popi, Push1;
    Ldtoken = 0xD0, "ldtoken", Next, InlineTok, Pop0, Pushi;
    ConvU2 = 0xD1, "conv.u2", Next, InlineNone, Pop1, Pushi;
    ConvU1 = 0xD2, "conv.u1", Next, InlineNone, Pop1, Pushi;
    ConvI = 0xD3, "conv.i", Next, InlineNone, Pop1, Pushi;
    ConvOvfI = 0xD4, "conv.ovf.i", Next, InlineNone, Pop1, Pushi;
    ConvOvfU = 0xD5, "conv.ovf.u", Next, InlineNone, Pop1, Pushi;
    AddOvf = 0xD6, "add.ovf", Next, InlineNone, Pop1Pop1, Push1;
    AddOvfUn = 0xD7, "add.ovf.un", Next, InlineNone, Pop1Pop1, Push1;
    MulOvf = 0xD8, "mul.ovf", Next, InlineNone, Pop1Pop1, Push1;
    MulOvfUn = 0xD9, "mul.ovf.un", Next, InlineNone, Pop1Pop1, Push1;
    SubOvf = 0xDA, "sub.ovf", Next, InlineNone, Pop1Pop1, Push1;
    SubOvfUn = 0xDB, "sub.ovf.un", Next, InlineNone, Pop1Pop1, Push1;
    Endfinally = 0xDC, "endfinally", Return, InlineNone, Pop0, Push0;
    Leave = 0xDD, "leave", Branch, InlineBrTarget, PopAll, Push0;
    LeaveS = 0xDE, "leave.s", Branch, ShortInlineBrTarget, PopAll, Push0;
    StindI = 0xDF, "stind.i", Next, InlineNone, PopiPopi, Push0;
    ConvU = 0xE0, "conv.u", Next, InlineNone, Pop1, Pushi;
    Arglist = 0xFE00, "arglist", Next, InlineNone, Pop0, Pushi;
    Ceq = 0xFE01, "ceq", Next, InlineNone, Pop1Pop1, Pushi;
    Cgt = 0xFE02, "cgt", Next, InlineNone, Pop1Pop1, Pushi;
    CgtUn = 0xFE03, "cgt.un", Next, InlineNone, Pop1Pop1, Pushi;
    Clt = 0xFE04, "clt", Next, InlineNone, Pop1Pop1, Pushi;
    CltUn = 0xFE05, "clt.un", Next, InlineNone, Pop1Pop1, Pushi;
    Ldftn = 0xFE06, "ldftn", Next, InlineMethod, Pop0, Pushi;
    Ldvirtftn = 0xFE07, "ldvirtftn", Next, InlineMethod, Popref, Pushi;
    Ldarg = 0xFE09, "ldarg", Next, InlineArg, Pop0, Push1;
    Ldarga = 0xFE0A, "ldarga", Next, InlineArg, Pop0, Pushi;
    Starg = 0xFE0B, "starg", Next, InlineArg, Pop1, Push0;
    Ldloc = 0xFE0C, "ldloc", Next, InlineVar, Pop0, Push1;
    Ldloca = 0xFE0D, "ldloca", Next, InlineVar, Pop0, Pushi;
    Stloc = 0xFE0E, "stloc", Next, InlineVar, Pop1, Push0;
    Localloc = 0xFE0F, "localloc", Next, InlineNone, Popi, Pushi;
    Endfilter = 0xFE11, "endfilter", Return, InlineNone, Popi, Push0;
    Unaligned = 0xFE12, "unaligned.", Meta, ShortInlineI, Pop0, Push0;
    Volatile = 0xFE13, "volatile.", Meta, InlineNone, Pop0, Push0;
    Tail = 0xFE14, "tail.", Meta, InlineNone, Pop0, Push0;
    Initobj = 0xFE15, "initobj", Next, InlineType, Popi, Push0;
    Constrained = 0xFE16, "constrained.", Meta, InlineType, Pop0, Push0;
    Cpblk = 0xFE17, "cpblk", Next, InlineNone, PopiPopiPopi, Push0;
    Initblk = 0xFE18, "initblk", Next, InlineNone, PopiPopiPopi, Push0;
    No = 0xFE19, "no.", Meta, ShortInlineI, Pop0, Push0;
    Rethrow = 0xFE1A, "rethrow", Throw, InlineNone, Pop0, Push0;
    Sizeof = 0xFE1C, "sizeof", Next, InlineType, Pop0, Pushi;
    Refanytype = 0xFE1D, "refanytype", Next, InlineNone, Pop1, Pushi;
    Readonly = 0xFE1E, "readonly.", Meta, InlineNone, Pop0, Push0;
}

impl Code {
    /// Is this one of the `stelem` family of instructions?
    pub fn is_stelem(self) -> bool {
        matches!(
            self,
            Code::StelemAny
                | Code::StelemI
                | Code::StelemI1
                | Code::StelemI2
                | Code::StelemI4
                | Code::StelemI8
                | Code::StelemR4
                | Code::StelemR8
                | Code::StelemRef
        )
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.op_code().name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn values_and_names_round_trip() {
        for code in Code::ALL {
            let op_code = code.op_code();
            assert_eq!(Code::from_value(op_code.value), Some(*code), "{}", op_code.name);
            assert_eq!(Code::from_name(op_code.name), Some(*code), "{}", op_code.name);
        }
    }

    #[test]
    fn opcode_sizes() {
        assert_eq!(Code::Nop.op_code().size(), 1);
        assert_eq!(Code::ConvU.op_code().size(), 1);
        assert_eq!(Code::Ceq.op_code().size(), 2);
        assert_eq!(Code::Readonly.op_code().size(), 2);
    }

    #[test]
    fn leave_empties_the_stack() {
        assert_eq!(Code::Leave.op_code().stack_pop, StackBehaviour::PopAll);
        assert_eq!(Code::LeaveS.op_code().stack_pop, StackBehaviour::PopAll);
        assert_eq!(Code::Leave.op_code().flow_control, FlowControl::Branch);
    }

    #[test]
    fn stelem_family() {
        assert!(Code::StelemRef.is_stelem());
        assert!(Code::StelemAny.is_stelem());
        assert!(!Code::LdelemRef.is_stelem());
        assert!(!Code::StindRef.is_stelem());
    }
}
