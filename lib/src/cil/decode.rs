//! Decoding method bodies from their binary encoding
//!
//! A method body is a header (tiny or fat), the code stream, and, for fat headers, optional extra
//! data sections holding the exception handling clauses. See [ECMA-335 partition II.25.4][0].
//!
//! Metadata tokens are not interpreted here: calls need their method references for stack
//! analysis, so those are looked up through a [`TokenResolver`]. Other tokens are kept as
//! [`Operand::Token`].
//!
//! [0]: https://www.ecma-international.org/publications-and-standards/standards/ecma-335/

use super::{
    Code, Error, ExceptionHandler, HandlerKind, Instruction, InstructionId, MethodBody, MethodRef,
    Operand, OperandType, Signature,
};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Resolves the metadata tokens found in a method body
pub trait TokenResolver {
    /// Method referenced by a `MethodDef`, `MemberRef`, or `MethodSpec` token
    fn resolve_method(&self, token: u32) -> Option<MethodRef>;

    /// Call site signature referenced by a `StandAloneSig` token (the operand of `calli`)
    fn resolve_signature(&self, token: u32) -> Option<Signature>;

    /// Name of the exception type caught by a `catch` clause
    fn resolve_type(&self, _token: u32) -> Option<String> {
        None
    }
}

const TINY_FORMAT: u8 = 0x2;
const FAT_FORMAT: u8 = 0x3;
const MORE_SECTS: u16 = 0x8;

const SECTION_EH_TABLE: u8 = 0x1;
const SECTION_FAT_FORMAT: u8 = 0x40;
const SECTION_MORE_SECTS: u8 = 0x80;

/// Decode a method body, starting at its header
pub fn decode_method_body(
    name: impl Into<String>,
    bytes: &[u8],
    resolver: &impl TokenResolver,
) -> Result<MethodBody, Error> {
    let mut reader = Cursor::new(bytes);
    let header = reader.read_u8()?;

    let (code_start, code_size, more_sections) = match header & 0x3 {
        TINY_FORMAT => (1, (header >> 2) as usize, false),
        FAT_FORMAT => {
            reader.set_position(0);
            let flags_and_size = reader.read_u16::<LittleEndian>()?;
            let _max_stack = reader.read_u16::<LittleEndian>()?;
            let code_size = reader.read_u32::<LittleEndian>()?;
            let _local_var_sig_token = reader.read_u32::<LittleEndian>()?;
            let header_size = (flags_and_size >> 12) as usize * 4;
            (
                header_size,
                code_size as usize,
                flags_and_size & MORE_SECTS != 0,
            )
        }
        _ => return Err(Error::InvalidHeader(header)),
    };

    let code = bytes
        .get(code_start..code_start + code_size)
        .ok_or(Error::TruncatedBody)?;
    let (mut instructions, fixups) = decode_code(code, resolver)?;

    for (idx, targets) in fixups {
        instructions[idx].operand = match targets {
            BranchOffsets::Single(target) => Operand::Target(find_offset(&instructions, target)),
            BranchOffsets::Switch(targets) => Operand::Switch(
                targets
                    .into_iter()
                    .map(|target| find_offset(&instructions, target))
                    .collect(),
            ),
        };
    }

    let mut exception_handlers = vec![];
    if more_sections {
        let sections_start = align4(code_start + code_size);
        let sections = bytes.get(sections_start..).ok_or(Error::TruncatedBody)?;
        for clause in decode_sections(sections)? {
            exception_handlers.push(clause.into_handler(&instructions, resolver)?);
        }
    }

    let body = MethodBody::with_offsets(name, instructions, exception_handlers);
    log::debug!(
        "decoded {} ({} instructions, {} exception handlers)",
        body.name,
        body.len(),
        body.exception_handlers.len()
    );
    Ok(body)
}

/// Branch targets as absolute byte offsets
///
/// Offsets are signed since a malformed branch can point before the start of the method.
enum BranchOffsets {
    Single(i64),
    Switch(Vec<i64>),
}

fn decode_code(
    code: &[u8],
    resolver: &impl TokenResolver,
) -> Result<(Vec<Instruction>, Vec<(usize, BranchOffsets)>), Error> {
    let mut reader = Cursor::new(code);
    let mut instructions = vec![];
    let mut fixups = vec![];

    while (reader.position() as usize) < code.len() {
        let offset = reader.position() as usize;
        let first = reader.read_u8()?;
        let value = if first == 0xFE {
            0xFE00 | reader.read_u8()? as u16
        } else {
            first as u16
        };
        let opcode = Code::from_value(value).ok_or(Error::UnknownOpCode { value, offset })?;

        let operand = match opcode.op_code().operand_type {
            OperandType::InlineNone => Operand::None,
            OperandType::ShortInlineBrTarget => {
                let relative = reader.read_i8()? as i64;
                let target = reader.position() as i64 + relative;
                fixups.push((instructions.len(), BranchOffsets::Single(target)));
                Operand::Target(None)
            }
            OperandType::InlineBrTarget => {
                let relative = reader.read_i32::<LittleEndian>()? as i64;
                let target = reader.position() as i64 + relative;
                fixups.push((instructions.len(), BranchOffsets::Single(target)));
                Operand::Target(None)
            }
            OperandType::InlineSwitch => {
                let count = reader.read_u32::<LittleEndian>()? as usize;
                let mut relatives = Vec::with_capacity(count.min(code.len() / 4));
                for _ in 0..count {
                    relatives.push(reader.read_i32::<LittleEndian>()? as i64);
                }
                let next = reader.position() as i64;
                let targets: Vec<i64> = relatives.iter().map(|rel| next + rel).collect();
                let operand = Operand::Switch(vec![None; targets.len()]);
                fixups.push((instructions.len(), BranchOffsets::Switch(targets)));
                operand
            }
            OperandType::InlineMethod => {
                let token = reader.read_u32::<LittleEndian>()?;
                let method = resolver
                    .resolve_method(token)
                    .ok_or(Error::UnresolvedToken { token, offset })?;
                Operand::Method(method)
            }
            OperandType::InlineSig => {
                let token = reader.read_u32::<LittleEndian>()?;
                let signature = resolver
                    .resolve_signature(token)
                    .ok_or(Error::UnresolvedToken { token, offset })?;
                Operand::Signature(signature)
            }
            OperandType::InlineField
            | OperandType::InlineType
            | OperandType::InlineTok
            | OperandType::InlineString => Operand::Token(reader.read_u32::<LittleEndian>()?),
            OperandType::InlineI => Operand::Int32(reader.read_i32::<LittleEndian>()?),
            OperandType::ShortInlineI => Operand::Int8(reader.read_i8()?),
            OperandType::InlineI8 => Operand::Int64(reader.read_i64::<LittleEndian>()?),
            OperandType::InlineR => Operand::Float64(reader.read_f64::<LittleEndian>()?),
            OperandType::ShortInlineR => Operand::Float32(reader.read_f32::<LittleEndian>()?),
            OperandType::InlineVar => Operand::Variable(reader.read_u16::<LittleEndian>()?),
            OperandType::ShortInlineVar => Operand::Variable(reader.read_u8()? as u16),
            OperandType::InlineArg => Operand::Argument(reader.read_u16::<LittleEndian>()?),
            OperandType::ShortInlineArg => Operand::Argument(reader.read_u8()? as u16),
        };

        log::trace!("IL_{:04x}: {} {:?}", offset, opcode, operand);
        let mut instruction = Instruction::new(opcode, operand);
        instruction.offset = offset as u32;
        instructions.push(instruction);
    }

    Ok((instructions, fixups))
}

/// Exception handling clause, with offsets not yet resolved to instructions
struct RawClause {
    flags: u32,
    try_offset: u32,
    try_length: u32,
    handler_offset: u32,
    handler_length: u32,
    class_token_or_filter_offset: u32,
}

impl RawClause {
    fn into_handler(
        self,
        instructions: &[Instruction],
        resolver: &impl TokenResolver,
    ) -> Result<ExceptionHandler, Error> {
        let kind = match self.flags {
            0x0 => HandlerKind::Catch,
            0x1 => HandlerKind::Filter,
            0x2 => HandlerKind::Finally,
            0x4 => HandlerKind::Fault,
            other => return Err(Error::InvalidHandlerKind(other)),
        };
        let find = |offset: u32| find_offset(instructions, offset as i64);
        let find_end = |start: u32, length: u32| start.checked_add(length).and_then(find);

        Ok(ExceptionHandler {
            kind,
            try_start: find(self.try_offset),
            try_end: find_end(self.try_offset, self.try_length),
            handler_start: find(self.handler_offset),
            handler_end: find_end(self.handler_offset, self.handler_length),
            filter_start: match kind {
                HandlerKind::Filter => find(self.class_token_or_filter_offset),
                _ => None,
            },
            catch_type: match kind {
                HandlerKind::Catch => resolver.resolve_type(self.class_token_or_filter_offset),
                _ => None,
            },
        })
    }
}

fn decode_sections(bytes: &[u8]) -> Result<Vec<RawClause>, Error> {
    let mut reader = Cursor::new(bytes);
    let mut clauses = vec![];

    loop {
        let section_start = reader.position() as usize;
        let kind = reader.read_u8()?;
        if kind & SECTION_EH_TABLE == 0 {
            return Err(Error::InvalidSection(kind));
        }

        if kind & SECTION_FAT_FORMAT != 0 {
            let data_size = reader.read_u24::<LittleEndian>()? as usize;
            if data_size < 4 {
                return Err(Error::InvalidSection(kind));
            }
            for _ in 0..data_size.saturating_sub(4) / 24 {
                clauses.push(RawClause {
                    flags: reader.read_u32::<LittleEndian>()?,
                    try_offset: reader.read_u32::<LittleEndian>()?,
                    try_length: reader.read_u32::<LittleEndian>()?,
                    handler_offset: reader.read_u32::<LittleEndian>()?,
                    handler_length: reader.read_u32::<LittleEndian>()?,
                    class_token_or_filter_offset: reader.read_u32::<LittleEndian>()?,
                });
            }
            reader.set_position((section_start + data_size) as u64);
        } else {
            let data_size = reader.read_u8()? as usize;
            let _reserved = reader.read_u16::<LittleEndian>()?;
            if data_size < 4 {
                return Err(Error::InvalidSection(kind));
            }
            for _ in 0..data_size.saturating_sub(4) / 12 {
                clauses.push(RawClause {
                    flags: reader.read_u16::<LittleEndian>()? as u32,
                    try_offset: reader.read_u16::<LittleEndian>()? as u32,
                    try_length: reader.read_u8()? as u32,
                    handler_offset: reader.read_u16::<LittleEndian>()? as u32,
                    handler_length: reader.read_u8()? as u32,
                    class_token_or_filter_offset: reader.read_u32::<LittleEndian>()?,
                });
            }
            reader.set_position((section_start + data_size) as u64);
        }

        if kind & SECTION_MORE_SECTS == 0 {
            break;
        }
        reader.set_position(align4(reader.position() as usize) as u64);
    }

    Ok(clauses)
}

/// Instruction starting at exactly this offset
fn find_offset(instructions: &[Instruction], offset: i64) -> Option<InstructionId> {
    let offset = u32::try_from(offset).ok()?;
    instructions
        .binary_search_by_key(&offset, |instruction| instruction.offset)
        .ok()
        .map(InstructionId)
}

fn align4(position: usize) -> usize {
    (position + 3) & !3
}
