//! Graph IR (HLO text) parser implementation.
//!
//! Accepted grammar, a subset of the HLO text format:
//!
//! ```text
//! module      := 'HloModule' name [',' attributes] computation+
//! computation := ['ENTRY'] name [signature] '{' instruction* '}'
//! signature   := '(' [name ':' shape (',' name ':' shape)*] ')' '->' shape
//! instruction := ['ROOT'] name '=' shape opcode '(' operands ')' [',' attributes]
//! shape       := type '[' [dim (',' dim)*] ']' ['{' layout '}'] | '(' shape (',' shape)* ')'
//! ```
//!
//! Names may carry a leading `%`. Operands may be written with their shape
//! (`add(s32[] a, s32[] b)`). Trailing attributes are skipped. Only the ENTRY
//! computation is kept; other computations are parsed and dropped.

use super::{GraphComputation, GraphInstruction, GraphModule, GraphOpcode, GraphShape};
use crate::core::{Literal, LiteralData, PrimitiveType, Result, Shape};
use crate::program::computation::{BinaryOp, UnaryOp};
use crate::program::cursor::Cursor;
use hashbrown::HashMap;

pub fn parse_module(text: &str) -> Result<GraphModule> {
    Parser::new(text).parse()
}

struct Parser<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            cursor: Cursor::new(text),
        }
    }

    fn parse(mut self) -> Result<GraphModule> {
        self.cursor.expect_keyword("HloModule")?;
        let name = self.read_name()?;
        // Module attributes (entry_computation_layout=..., etc.) run to end of line.
        self.cursor.skip_line();

        let mut entry = None;
        let mut others = Vec::new();
        self.cursor.skip_whitespace();
        while !self.cursor.is_eof() {
            let is_entry = self.cursor.try_keyword("ENTRY");
            let computation = self.parse_computation()?;
            if is_entry {
                if entry.is_some() {
                    return Err(self.cursor.error("module has more than one ENTRY computation"));
                }
                entry = Some(computation);
            } else {
                others.push(computation);
            }
            self.cursor.skip_whitespace();
        }

        let entry = match entry {
            Some(entry) => {
                for other in &others {
                    log::debug!("skipping non-entry computation {}", other.name);
                }
                entry
            }
            None if others.len() == 1 => others.remove(0),
            None => return Err(self.cursor.error("module has no ENTRY computation")),
        };

        Ok(GraphModule {
            name: name.to_string(),
            entry,
        })
    }

    fn read_name(&mut self) -> Result<&'a str> {
        self.cursor.skip_whitespace();
        if self.cursor.peek() == Some(b'%') {
            self.cursor.advance();
        }
        self.cursor.read_word()
    }

    fn parse_computation(&mut self) -> Result<GraphComputation> {
        let name = self.read_name()?.to_string();

        let mut signature = None;
        let mut result_shape = None;
        if self.cursor.try_read(b'(') {
            let mut params = Vec::new();
            while !self.cursor.try_read(b')') {
                let param_name = self.read_name()?;
                self.cursor.expect(b':')?;
                let shape = self.parse_array_shape()?;
                params.push((param_name.to_string(), shape));
                if !self.cursor.try_read(b',') && self.cursor.peek() != Some(b')') {
                    return Err(self.cursor.error("expected ',' or ')' in parameter list"));
                }
            }
            self.cursor.expect(b'-')?;
            self.cursor.expect(b'>')?;
            result_shape = Some(self.parse_shape()?);
            signature = Some(params);
        }

        self.cursor.expect(b'{')?;

        let mut instructions: Vec<GraphInstruction> = Vec::new();
        let mut names: HashMap<&'a str, usize> = HashMap::new();
        let mut root = None;

        while !self.cursor.try_read(b'}') {
            if self.cursor.is_eof() {
                return Err(self.cursor.error(format!("computation {} is not closed", name)));
            }
            let is_root = self.cursor.try_keyword("ROOT");
            let (inst_name, inst) = self.parse_instruction(&names)?;
            if names.insert(inst_name, instructions.len()).is_some() {
                return Err(self.cursor.error(format!("instruction {} is defined twice", inst_name)));
            }
            if is_root {
                if root.is_some() {
                    return Err(self.cursor.error(format!("computation {} has more than one ROOT", name)));
                }
                root = Some(instructions.len());
            }
            instructions.push(inst);
        }

        if instructions.is_empty() {
            return Err(self.cursor.error(format!("computation {} is empty", name)));
        }
        let root = root.unwrap_or(instructions.len() - 1);

        Ok(GraphComputation {
            name,
            signature,
            result_shape,
            instructions,
            root,
        })
    }

    fn parse_instruction(&mut self, names: &HashMap<&'a str, usize>) -> Result<(&'a str, GraphInstruction)> {
        let name = self.read_name()?;
        self.cursor.expect(b'=')?;
        let shape = self.parse_shape()?;
        let opcode_pos = self.cursor.pos();
        let opcode_name = self.cursor.read_identifier()?;
        self.cursor.expect(b'(')?;

        let (opcode, operands) = match opcode_name {
            "parameter" => {
                let number = self.cursor.read_unsigned()?;
                self.cursor.expect(b')')?;
                (GraphOpcode::Parameter(number), Vec::new())
            }
            "constant" => {
                let array = match &shape {
                    GraphShape::Array(array) => array,
                    GraphShape::Tuple(_) => return Err(self.cursor.error("tuple constants are not supported")),
                };
                let literal = self.parse_literal(array)?;
                self.cursor.expect(b')')?;
                (GraphOpcode::Constant(literal), Vec::new())
            }
            other => {
                let opcode = if other == "tuple" {
                    GraphOpcode::Tuple
                } else if let Some(op) = UnaryOp::from_name(other) {
                    GraphOpcode::Unary(op)
                } else if let Some(op) = BinaryOp::from_name(other) {
                    GraphOpcode::Binary(op)
                } else {
                    self.cursor.set_pos(opcode_pos);
                    return Err(self.cursor.error(format!("unsupported opcode '{}'", other)));
                };
                let operands = self.parse_operands(names)?;
                let expected = match opcode {
                    GraphOpcode::Unary(_) => Some(1),
                    GraphOpcode::Binary(_) => Some(2),
                    _ => None,
                };
                if let Some(expected) = expected {
                    if operands.len() != expected {
                        return Err(self.cursor.error(format!(
                            "{} expects {} operands but got {}",
                            other,
                            expected,
                            operands.len()
                        )));
                    }
                }
                (opcode, operands)
            }
        };

        // Attributes such as metadata={...} or sharding={...}.
        if self.cursor.try_read(b',') {
            self.cursor.skip_line();
        }

        Ok((
            name,
            GraphInstruction {
                name: name.to_string(),
                shape,
                opcode,
                operands,
            },
        ))
    }

    fn parse_operands(&mut self, names: &HashMap<&'a str, usize>) -> Result<Vec<usize>> {
        let mut operands = Vec::new();
        if self.cursor.try_read(b')') {
            return Ok(operands);
        }
        loop {
            self.skip_operand_shape()?;
            let operand = self.read_name()?;
            let index = names
                .get(operand)
                .copied()
                .ok_or_else(|| self.cursor.error(format!("use of undefined instruction '{}'", operand)))?;
            operands.push(index);
            if self.cursor.try_read(b')') {
                return Ok(operands);
            }
            self.cursor.expect(b',')?;
        }
    }

    /// Skip the optional shape that may precede an operand name.
    fn skip_operand_shape(&mut self) -> Result<()> {
        self.cursor.skip_whitespace();
        if self.cursor.peek() == Some(b'(') {
            self.parse_shape()?;
            return Ok(());
        }
        let saved = self.cursor.pos();
        if let Ok(word) = self.cursor.read_identifier() {
            if PrimitiveType::from_name(word).is_some() && self.cursor.peek() == Some(b'[') {
                self.cursor.set_pos(saved);
                self.parse_array_shape()?;
                return Ok(());
            }
        }
        self.cursor.set_pos(saved);
        Ok(())
    }

    fn parse_shape(&mut self) -> Result<GraphShape> {
        if self.cursor.try_read(b'(') {
            let mut elements = Vec::new();
            while !self.cursor.try_read(b')') {
                match self.parse_shape()? {
                    GraphShape::Array(shape) => elements.push(shape),
                    GraphShape::Tuple(_) => return Err(self.cursor.error("nested tuple shapes are not supported")),
                }
                if !self.cursor.try_read(b',') && self.cursor.peek() != Some(b')') {
                    return Err(self.cursor.error("expected ',' or ')' in tuple shape"));
                }
            }
            return Ok(GraphShape::Tuple(elements));
        }
        Ok(GraphShape::Array(self.parse_array_shape()?))
    }

    fn parse_array_shape(&mut self) -> Result<Shape> {
        let type_name = self.cursor.read_identifier()?;
        let element_type = PrimitiveType::from_name(type_name)
            .ok_or_else(|| self.cursor.error(format!("unknown element type '{}'", type_name)))?;
        self.cursor.expect(b'[')?;
        let mut dims = Vec::new();
        while !self.cursor.try_read(b']') {
            let dim = self.cursor.read_unsigned()?;
            let dim = i64::try_from(dim).map_err(|_| self.cursor.error(format!("dimension {} is too large", dim)))?;
            dims.push(dim);
            if !self.cursor.try_read(b',') && self.cursor.peek() != Some(b']') {
                return Err(self.cursor.error("expected ',' or ']' in dimensions"));
            }
        }
        // Layouts are ignored: buffers are always dense row-major. A layout
        // must touch the dimensions, otherwise the brace opens a body.
        if self.cursor.peek() == Some(b'{') {
            self.cursor.skip_balanced(b'{', b'}')?;
        }
        let shape = Shape::new(element_type, dims);
        if shape.checked_byte_size().is_none() {
            return Err(self.cursor.error(format!("shape {} is too large", shape)));
        }
        Ok(shape)
    }

    /// Parse a scalar or `{...}` literal for `shape`; nesting braces are flattened.
    fn parse_literal(&mut self, shape: &Shape) -> Result<Literal> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        loop {
            self.cursor.skip_whitespace();
            match self.cursor.peek() {
                Some(b'{') => {
                    depth += 1;
                    self.cursor.advance();
                }
                Some(b'}') => {
                    if depth == 0 {
                        return Err(self.cursor.error("unbalanced '}' in constant"));
                    }
                    depth -= 1;
                    self.cursor.advance();
                }
                Some(b',') if depth > 0 => self.cursor.advance(),
                Some(b')') if depth == 0 => break,
                Some(_) => tokens.push(self.cursor.read_scalar_token()?),
                None => return Err(self.cursor.error("unterminated constant")),
            }
        }

        if shape.literal_byte_size().is_none() {
            return Err(self.cursor.error(format!("constant of shape {} is too large", shape)));
        }
        if tokens.len() != shape.element_count() {
            return Err(self.cursor.error(format!(
                "constant of shape {} needs {} values but has {}",
                shape,
                shape.element_count(),
                tokens.len()
            )));
        }
        let data = parse_elements(shape.element_type(), &tokens).map_err(|m| self.cursor.error(m))?;
        Literal::new(shape.clone(), data)
    }
}

/// Parse scalar tokens into typed storage.
pub(crate) fn parse_elements(ty: PrimitiveType, tokens: &[&str]) -> std::result::Result<LiteralData, String> {
    fn each<T>(tokens: &[&str], f: impl Fn(&str) -> Option<T>) -> std::result::Result<Vec<T>, String> {
        tokens
            .iter()
            .map(|t| f(t).ok_or_else(|| format!("invalid literal value '{}'", t)))
            .collect()
    }

    fn float(token: &str) -> Option<f64> {
        match token {
            "inf" | "+inf" => Some(f64::INFINITY),
            "-inf" => Some(f64::NEG_INFINITY),
            "nan" => Some(f64::NAN),
            _ => token.parse().ok(),
        }
    }

    Ok(match ty {
        PrimitiveType::Pred => LiteralData::Pred(each(tokens, |t| match t {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        })?),
        PrimitiveType::S32 => LiteralData::S32(each(tokens, |t| t.parse().ok())?),
        PrimitiveType::S64 => LiteralData::S64(each(tokens, |t| t.parse().ok())?),
        PrimitiveType::F32 => LiteralData::F32(each(tokens, |t| float(t).map(|v| v as f32))?),
        PrimitiveType::F64 => LiteralData::F64(each(tokens, float)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;

    const CONSTANT_PROGRAM: &str = r#"HloModule Computation

ENTRY Computation() -> s32[] {
  ROOT result = s32[] constant(2)
}"#;

    #[test]
    fn test_parse_constant_module() {
        let module = parse_module(CONSTANT_PROGRAM).unwrap();
        assert_eq!(module.name, "Computation");
        assert_eq!(module.entry.instructions.len(), 1);
        let root = module.entry.root_instruction().unwrap();
        assert_eq!(root.name, "result");
        assert_eq!(root.opcode, GraphOpcode::Constant(Literal::scalar(2i32)));
        assert_eq!(module.entry.signature, Some(Vec::new()));
    }

    #[test]
    fn test_parse_typed_operands_and_attributes() {
        let text = r#"
HloModule add, entry_computation_layout={(s32[2]{0}, s32[2]{0})->s32[2]{0}}

ENTRY %main (p0: s32[2], p1: s32[2]) -> s32[2] {
  %p0 = s32[2]{0} parameter(0)
  %p1 = s32[2]{0} parameter(1)
  ROOT %sum = s32[2]{0} add(s32[2]{0} %p0, s32[2]{0} %p1), metadata={op_name="sum"}
}
"#;
        let module = parse_module(text).unwrap();
        let entry = &module.entry;
        assert_eq!(entry.name, "main");
        assert_eq!(entry.instructions.len(), 3);
        assert_eq!(entry.instructions[2].operands, vec![0, 1]);
        assert_eq!(entry.root, 2);
    }

    #[test]
    fn test_parse_tuple_root_and_array_constant() {
        let text = r#"
HloModule pair
ENTRY pair() -> (s32[], f32[2]) {
  a = s32[] constant(-7)
  b = f32[2] constant({1.5, 2})
  ROOT t = (s32[], f32[2]) tuple(a, b)
}
"#;
        let module = parse_module(text).unwrap();
        let entry = &module.entry;
        assert_eq!(entry.instructions[1].opcode, GraphOpcode::Constant(Literal::vec1(&[1.5f32, 2.0])));
        assert_eq!(entry.root_instruction().unwrap().opcode, GraphOpcode::Tuple);
        assert_eq!(
            entry.result_shape,
            Some(GraphShape::Tuple(vec![
                Shape::scalar(PrimitiveType::S32),
                Shape::new(PrimitiveType::F32, vec![2]),
            ]))
        );
    }

    #[test]
    fn test_undefined_operand_reports_position() {
        let text = "HloModule m\nENTRY e() -> s32[] {\n  ROOT r = s32[] negate(x)\n}";
        match parse_module(text).unwrap_err() {
            Error::Parse { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("undefined instruction 'x'"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_opcode() {
        let text = "HloModule m\nENTRY e() -> s32[] {\n  ROOT r = s32[] iota(), iota_dimension=0\n}";
        let err = parse_module(text).unwrap_err();
        assert!(err.to_string().contains("unsupported opcode 'iota'"));
    }

    #[test]
    fn test_constant_element_count_checked() {
        let text = "HloModule m\nENTRY e() -> s32[3] {\n  ROOT r = s32[3] constant({1, 2})\n}";
        assert!(parse_module(text).is_err());
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        let overflowing = "HloModule m\nENTRY e() -> s32[] {\n  ROOT r = s32[4294967296,4294967296] constant(1)\n}";
        match parse_module(overflowing).unwrap_err() {
            Error::Parse { line, message, .. } => {
                assert_eq!(line, 3);
                assert!(message.contains("too large"));
            }
            other => panic!("unexpected error {:?}", other),
        }

        let truncated = "HloModule m\nENTRY e() -> s32[18446744073709551615] {\n  ROOT r = s32[18446744073709551615] constant({})\n}";
        let err = parse_module(truncated).unwrap_err();
        assert!(err.to_string().contains("dimension 18446744073709551615 is too large"));

        let huge_constant = "HloModule m\nENTRY e() -> s32[1000000000] {\n  ROOT r = s32[1000000000] constant(0)\n}";
        assert!(parse_module(huge_constant).unwrap_err().to_string().contains("too large"));
    }

    #[test]
    fn test_default_root_is_last_instruction() {
        let text = "HloModule m\nENTRY e {\n  a = pred[] constant(true)\n  b = pred[] not(a)\n}";
        let module = parse_module(text).unwrap();
        assert_eq!(module.entry.root, 1);
        assert!(module.entry.signature.is_none());
    }
}
