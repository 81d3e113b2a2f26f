//! Textual method listings
//!
//! The listing format is a small subset of `ildasm` output, enough to write method bodies by hand:
//!
//! ```text
//! // Comments run to the end of the line
//! .method Example::Guarded
//!     .catch on_error
//!     ldc.i4.1
//!     call void InlineIL.IL::Push<int32>(!!0)
//!     brtrue.s done
//!   on_error:
//!     pop
//!   done:
//!     ret
//! .end
//! ```
//!
//! Each `.method NAME` block ends with `.end`. Instructions appear one per line, optionally
//! prefixed by a `label:`. Exception handler entry points are declared with `.catch HANDLER`,
//! `.filter FILTER HANDLER`, `.finally HANDLER`, or `.fault HANDLER` anywhere in the block.
//!
//! Method operands are written `[instance] [explicit] RET TYPE::NAME[<GENERICS>](PARAMS)` and
//! `calli` operands `[instance] [explicit] RET(PARAMS)`, where a `void` return type means the
//! method returns nothing. The declaring type may not contain whitespace.

use super::{
    CallingConvention, Code, Error, HandlerKind, Label, LabelGenerator, MethodBody,
    MethodBodyBuilder, MethodRef, OperandType, Operand, Signature,
};
use std::collections::HashMap;

/// Parse all of the method bodies in a listing
pub fn parse_listing(source: &str) -> Result<Vec<MethodBody>, Error> {
    let mut methods = vec![];
    let mut current: Option<MethodParser> = None;

    for (line_idx, raw_line) in source.lines().enumerate() {
        let line_no = line_idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = directive(line, ".method") {
            if current.is_some() {
                return Err(syntax(line_no, "`.method` inside of another method"));
            }
            if name.is_empty() {
                return Err(syntax(line_no, "`.method` needs a name"));
            }
            current = Some(MethodParser::new(name));
            continue;
        }

        if line == ".end" {
            match current.take() {
                Some(method) => methods.push(method.finish(line_no)?),
                None => return Err(syntax(line_no, "`.end` outside of a method")),
            }
            continue;
        }

        match current.as_mut() {
            Some(method) => method.parse_line(line, line_no)?,
            None => return Err(syntax(line_no, "instruction outside of a method")),
        }
    }

    if current.is_some() {
        return Err(syntax(source.lines().count(), "missing `.end`"));
    }

    Ok(methods)
}

/// Parse a method reference, as written in the operand of a `call` (eg.
/// `instance void System.Object::.ctor()`)
pub fn parse_method_ref(text: &str) -> Result<MethodRef, String> {
    let (calling_convention, rest) = strip_calling_convention(text);
    let (head, parameters) = split_parameters(rest)?;

    let head = strip_trailing_generics(head);
    let separator = head
        .rfind("::")
        .ok_or_else(|| format!("expected `TYPE::NAME` in `{}`", text))?;
    let name = &head[separator + 2..];
    let before = head[..separator].trim_end();
    let (return_type, declaring_type) = before
        .rsplit_once(char::is_whitespace)
        .ok_or_else(|| format!("expected a return type in `{}`", text))?;
    let return_type = return_type.trim();

    if name.is_empty() || declaring_type.is_empty() {
        return Err(format!("malformed method reference `{}`", text));
    }

    Ok(MethodRef::new(
        declaring_type,
        name,
        Signature {
            calling_convention,
            parameters,
            return_type: parse_return_type(return_type),
        },
    ))
}

/// Parse a call site signature, as written in the operand of a `calli` (eg. `int32(int32, int32)`)
pub fn parse_signature(text: &str) -> Result<Signature, String> {
    let (calling_convention, rest) = strip_calling_convention(text);
    let (head, parameters) = split_parameters(rest)?;
    if head.is_empty() {
        return Err(format!("expected a return type in `{}`", text));
    }
    Ok(Signature {
        calling_convention,
        parameters,
        return_type: parse_return_type(head),
    })
}

struct MethodParser {
    builder: MethodBodyBuilder,
    labels: HashMap<String, Label>,

    /// Labels which have been placed
    placed: HashMap<String, usize>,

    /// First line on which every label was referenced
    referenced: HashMap<String, usize>,
}

impl MethodParser {
    fn new(name: &str) -> MethodParser {
        MethodParser {
            builder: MethodBodyBuilder::new(name),
            labels: HashMap::new(),
            placed: HashMap::new(),
            referenced: HashMap::new(),
        }
    }

    fn label(&mut self, name: &str, line_no: usize) -> Label {
        self.referenced.entry(name.to_owned()).or_insert(line_no);
        match self.labels.get(name) {
            Some(label) => *label,
            None => {
                let label = self.builder.fresh_label();
                self.labels.insert(name.to_owned(), label);
                label
            }
        }
    }

    fn parse_line(&mut self, mut line: &str, line_no: usize) -> Result<(), Error> {
        if let Some((label, rest)) = split_label(line) {
            if let Some(previous) = self.placed.insert(label.to_owned(), line_no) {
                return Err(syntax(
                    line_no,
                    format!("label `{}` already placed on line {}", label, previous),
                ));
            }
            let label = self.label(label, line_no);
            self.builder.place_label(label)?;
            line = rest.trim();
            if line.is_empty() {
                return Ok(());
            }
        }

        if line.starts_with('.') {
            return self.parse_handler(line, line_no);
        }

        let (mnemonic, operand) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim()),
            None => (line, ""),
        };
        let code = Code::from_name(mnemonic)
            .ok_or_else(|| syntax(line_no, format!("unknown opcode `{}`", mnemonic)))?;
        let operand_type = code.op_code().operand_type;

        if operand_type == OperandType::InlineNone {
            if !operand.is_empty() {
                return Err(syntax(
                    line_no,
                    format!("`{}` does not take an operand", mnemonic),
                ));
            }
            self.builder.emit(code);
            return Ok(());
        }
        if operand.is_empty() {
            return Err(syntax(line_no, format!("`{}` needs an operand", mnemonic)));
        }

        if operand_type == OperandType::InlineSwitch {
            let targets = operand
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(|| syntax(line_no, "expected `(label, ...)` after `switch`"))?;
            let labels = split_top_level(targets)
                .iter()
                .map(|target| self.label(target, line_no))
                .collect();
            self.builder.emit_switch(labels);
            return Ok(());
        }
        if operand_type.is_branch_target() {
            let label = self.label(operand, line_no);
            self.builder.emit_branch(code, label);
            return Ok(());
        }

        let operand = parse_operand(operand_type, operand).map_err(|msg| syntax(line_no, msg))?;
        self.builder.emit_with(code, operand);
        Ok(())
    }

    fn parse_handler(&mut self, line: &str, line_no: usize) -> Result<(), Error> {
        let mut words = line.split_whitespace();
        let directive = words.next().unwrap_or_default();
        let labels: Vec<&str> = words.collect();

        let (kind, handler, filter) = match (directive, labels.as_slice()) {
            (".catch", [handler]) => (HandlerKind::Catch, *handler, None),
            (".finally", [handler]) => (HandlerKind::Finally, *handler, None),
            (".fault", [handler]) => (HandlerKind::Fault, *handler, None),
            (".filter", [filter, handler]) => (HandlerKind::Filter, *handler, Some(*filter)),
            (".catch" | ".finally" | ".fault" | ".filter", _) => {
                return Err(syntax(
                    line_no,
                    format!("wrong number of labels for `{}`", directive),
                ))
            }
            _ => return Err(syntax(line_no, format!("unknown directive `{}`", directive))),
        };

        let handler = self.label(handler, line_no);
        let filter = filter.map(|filter| self.label(filter, line_no));
        self.builder.add_handler(kind, handler, filter);
        Ok(())
    }

    fn finish(self, line_no: usize) -> Result<MethodBody, Error> {
        let mut unplaced: Vec<(&usize, &String)> = self
            .referenced
            .iter()
            .filter(|(name, _)| !self.placed.contains_key(*name))
            .map(|(name, line)| (line, name))
            .collect();
        unplaced.sort();
        if let Some((line, name)) = unplaced.first() {
            return Err(syntax(**line, format!("label `{}` is never placed", name)));
        }

        self.builder.finish().map_err(|err| match err {
            Error::UnplacedLabel(_) => syntax(line_no, "label at the end of the method"),
            other => other,
        })
    }
}

fn syntax(line: usize, message: impl Into<String>) -> Error {
    Error::Syntax {
        line,
        message: message.into(),
    }
}

/// If the line is `directive ARGS`, return `ARGS`
fn directive<'a>(line: &'a str, directive: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(directive)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Remove a trailing `//` comment (but not one inside a string literal)
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    let bytes = line.as_bytes();
    for (idx, byte) in bytes.iter().enumerate() {
        match byte {
            _ if escaped => escaped = false,
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'/' if !in_string && bytes.get(idx + 1) == Some(&b'/') => return &line[..idx],
            _ => (),
        }
    }
    line
}

/// Split `label: rest` (but not `Type::Member`)
fn split_label(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let label = &line[..colon];
    let is_label_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.');
    if label.is_empty() || !label.chars().all(is_label_char) || line[colon..].starts_with("::") {
        return None;
    }
    Some((label, &line[colon + 1..]))
}

fn strip_calling_convention(text: &str) -> (CallingConvention, &str) {
    let mut calling_convention = CallingConvention::empty();
    let mut rest = text.trim();
    loop {
        if let Some(after) = rest.strip_prefix("instance ") {
            calling_convention |= CallingConvention::HAS_THIS;
            rest = after.trim_start();
        } else if let Some(after) = rest.strip_prefix("explicit ") {
            calling_convention |= CallingConvention::EXPLICIT_THIS;
            rest = after.trim_start();
        } else {
            break (calling_convention, rest);
        }
    }
}

/// Split `HEAD(PARAMS)` into the head and the list of parameters
fn split_parameters(text: &str) -> Result<(&str, Vec<String>), String> {
    let open = text
        .find('(')
        .ok_or_else(|| format!("expected a parameter list in `{}`", text))?;
    let parameters = text[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| format!("unterminated parameter list in `{}`", text))?;
    let parameters = split_top_level(parameters)
        .into_iter()
        .map(String::from)
        .collect();
    Ok((text[..open].trim(), parameters))
}

/// Remove generic arguments at the end of a method name (eg. `Push<int32>`)
fn strip_trailing_generics(text: &str) -> &str {
    if !text.ends_with('>') {
        return text;
    }
    let mut depth = 0;
    for (idx, c) in text.char_indices().rev() {
        match c {
            '>' => depth += 1,
            '<' => {
                depth -= 1;
                if depth == 0 {
                    return &text[..idx];
                }
            }
            _ => (),
        }
    }
    text
}

/// Split on commas which aren't nested inside of brackets
fn split_top_level(text: &str) -> Vec<&str> {
    if text.trim().is_empty() {
        return vec![];
    }
    let mut parts = vec![];
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '<' | '[' | '(' => depth += 1,
            '>' | ']' | ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(text[start..idx].trim());
                start = idx + 1;
            }
            _ => (),
        }
    }
    parts.push(text[start..].trim());
    parts
}

fn parse_return_type(text: &str) -> Option<String> {
    match text {
        "void" | "System.Void" => None,
        other => Some(other.to_owned()),
    }
}

fn parse_operand(operand_type: OperandType, text: &str) -> Result<Operand, String> {
    use OperandType::*;
    Ok(match operand_type {
        InlineMethod => Operand::Method(parse_method_ref(text)?),
        InlineSig => Operand::Signature(parse_signature(text)?),
        InlineField | InlineType | InlineTok => Operand::Symbol(text.to_owned()),
        InlineString => Operand::String(parse_string(text)?),
        InlineI => Operand::Int32(parse_int(text)?),
        ShortInlineI => {
            let value: i64 = parse_int(text)?;
            let byte = i8::try_from(value)
                .or_else(|_| u8::try_from(value).map(|b| b as i8))
                .map_err(|_| format!("`{}` does not fit in a byte", text))?;
            Operand::Int8(byte)
        }
        InlineI8 => Operand::Int64(parse_int(text)?),
        InlineR => Operand::Float64(
            text.parse()
                .map_err(|_| format!("invalid floating point `{}`", text))?,
        ),
        ShortInlineR => Operand::Float32(
            text.parse()
                .map_err(|_| format!("invalid floating point `{}`", text))?,
        ),
        InlineVar | ShortInlineVar => Operand::Variable(parse_int(text)?),
        InlineArg | ShortInlineArg => Operand::Argument(parse_int(text)?),
        InlineNone | InlineBrTarget | ShortInlineBrTarget | InlineSwitch => {
            return Err(String::from("unexpected operand"))
        }
    })
}

/// Parse a decimal or `0x`-prefixed hexadecimal integer
fn parse_int<T: TryFrom<i64>>(text: &str) -> Result<T, String> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| format!("invalid integer `{}`", text))?;
    let value = if negative { -magnitude } else { magnitude };
    T::try_from(value).map_err(|_| format!("integer `{}` is out of range", text))
}

fn parse_string(text: &str) -> Result<String, String> {
    let inner = text
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| format!("expected a string literal, found `{}`", text))?;
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some(c @ ('\\' | '"')) => result.push(c),
            Some(other) => return Err(format!("unknown escape `\\{}`", other)),
            None => return Err(String::from("unterminated escape")),
        }
    }
    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cil::InstructionId;

    #[test]
    fn method_refs() {
        let method = parse_method_ref("void InlineIL.IL::Push<int32>(!!0)").unwrap();
        assert_eq!(method.declaring_type, "InlineIL.IL");
        assert_eq!(method.name, "Push");
        assert_eq!(method.signature.parameters, vec!["!!0"]);
        assert_eq!(method.signature.return_type, None);
        assert!(!method.signature.has_implicit_receiver());

        let method = parse_method_ref("instance void System.Object::.ctor()").unwrap();
        assert_eq!(method.name, ".ctor");
        assert!(method.signature.parameters.is_empty());
        assert!(method.signature.has_implicit_receiver());

        let method = parse_method_ref(
            "instance explicit class System.Collections.Generic.List`1<int32> Foo::Bar(class Foo, valuetype Pair<int32, int32>)",
        )
        .unwrap();
        assert_eq!(method.declaring_type, "Foo");
        assert_eq!(
            method.signature.return_type.as_deref(),
            Some("class System.Collections.Generic.List`1<int32>")
        );
        assert_eq!(
            method.signature.parameters,
            vec!["class Foo", "valuetype Pair<int32, int32>"]
        );
        assert!(!method.signature.has_implicit_receiver());

        assert!(parse_method_ref("void Push(!!0)").is_err());
        assert!(parse_method_ref("void Foo::Push").is_err());
    }

    #[test]
    fn non_ascii_whitespace_in_method_refs() {
        let method = parse_method_ref("void\u{a0}Foo::Bar()").unwrap();
        assert_eq!(method.declaring_type, "Foo");
        assert_eq!(method.name, "Bar");
        assert_eq!(method.signature.return_type, None);

        let method = parse_method_ref("int32\u{2003}\u{3000}Foo::Bar(int32)").unwrap();
        assert_eq!(method.declaring_type, "Foo");
        assert_eq!(method.signature.return_type.as_deref(), Some("int32"));

        assert!(parse_method_ref("\u{a0}Foo::Bar()").is_err());
    }

    #[test]
    fn calli_signatures() {
        let signature = parse_signature("int32(int32, int64)").unwrap();
        assert_eq!(signature.parameters, vec!["int32", "int64"]);
        assert_eq!(signature.return_type.as_deref(), Some("int32"));

        let signature = parse_signature("instance void()").unwrap();
        assert!(signature.has_implicit_receiver());
        assert!(!signature.returns_value());
    }

    #[test]
    fn small_listing() {
        let methods = parse_listing(
            r#"
            // leading comment
            .method Test::First
                ldc.i4.s -3        // trailing comment
                ldstr "a // b"
                pop
                pop
              done: ret
            .end

            .method Test::Second
                .catch handler
              top:
                ldarg.0
                brtrue.s top
                switch (top, handler)
              handler:
                pop
                ret
            .end
            "#,
        )
        .unwrap();

        assert_eq!(methods.len(), 2);
        let first = &methods[0];
        assert_eq!(first.name, "Test::First");
        assert_eq!(first.len(), 5);
        assert_eq!(first.get(InstructionId(0)).unwrap().operand, Operand::Int8(-3));
        assert_eq!(
            first.get(InstructionId(1)).unwrap().operand,
            Operand::String(String::from("a // b"))
        );

        let second = &methods[1];
        assert_eq!(second.len(), 5);
        assert_eq!(
            second.get(InstructionId(1)).unwrap().branch_targets(),
            &[Some(InstructionId(0))]
        );
        assert_eq!(
            second.get(InstructionId(2)).unwrap().branch_targets(),
            &[Some(InstructionId(0)), Some(InstructionId(3))]
        );
        assert_eq!(
            second.exception_handlers[0].handler_start,
            Some(InstructionId(3))
        );
    }

    #[test]
    fn syntax_errors_have_lines() {
        let err = parse_listing(".method M\n  frobnicate\n.end\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 2, .. }), "{:?}", err);

        let err = parse_listing(".method M\n  br nowhere\n  ret\n.end\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 2, .. }), "{:?}", err);

        let err = parse_listing(".method M\n  ret\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }), "{:?}", err);

        let err = parse_listing("ret\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 1, .. }), "{:?}", err);

        let err = parse_listing(".method M\n a: nop\n a: ret\n.end\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 3, .. }), "{:?}", err);

        let err = parse_listing(".method M\n  pop 1\n.end\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 2, .. }), "{:?}", err);
    }

    #[test]
    fn numeric_operands() {
        let methods = parse_listing(
            ".method M\n ldc.i4 0x10\n ldc.i8 -5\n ldc.r8 1.5\n ldloc.s 3\n ldarg 2\n unaligned. 255\n.end",
        )
        .unwrap();
        let operands: Vec<Operand> = methods[0]
            .iter()
            .map(|(_, insn)| insn.operand.clone())
            .collect();
        assert_eq!(
            operands,
            vec![
                Operand::Int32(16),
                Operand::Int64(-5),
                Operand::Float64(1.5),
                Operand::Variable(3),
                Operand::Argument(2),
                Operand::Int8(-1),
            ]
        );
    }
}
