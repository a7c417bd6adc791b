//! Structured IR (MHLO / StableHLO text) parser implementation.
//!
//! Accepted grammar, the pretty-printed subset emitted by common tooling:
//!
//! ```text
//! module    := 'module' ['@' name] ['attributes' dict] '{' func* '}' | func*
//! func      := 'func.func' ['public' | 'private'] '@' name '(' [arg (',' arg)*] ')'
//!              ['->' results] ['attributes' dict] '{' operation* return '}'
//! arg       := '%' name ':' tensor [dict]
//! operation := '%' name '=' dialect '.' op operands ':' (tensor | fn-type)
//!            | '%' name '=' dialect '.constant' 'dense<' elements '>' ':' tensor
//! return    := ('return' | 'func.return') [values ':' tensors]
//! tensor    := 'tensor<' (dim 'x')* element '>'
//! ```
//!
//! `dialect` is `mhlo` or `stablehlo`. Everything is copied into the
//! context's arena, so the source text may be dropped after parsing.

use super::{DenseAttr, FuncOp, OpKind, Operation, ScalarAttr, StructuredModule, TensorType, ValueId};
use crate::core::{PrimitiveType, Result};
use crate::program::computation::{BinaryOp, UnaryOp};
use crate::program::cursor::Cursor;
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use hashbrown::HashMap;

pub fn parse_module<'ctx>(arena: &'ctx Bump, source: &str) -> Result<StructuredModule<'ctx>> {
    Parser {
        arena,
        cursor: Cursor::new(source),
    }
    .parse()
}

struct Parser<'ctx, 's> {
    arena: &'ctx Bump,
    cursor: Cursor<'s>,
}

type ValueMap<'s> = HashMap<&'s str, ValueId>;

impl<'ctx, 's> Parser<'ctx, 's> {
    fn parse(mut self) -> Result<StructuredModule<'ctx>> {
        let mut functions = BumpVec::new_in(self.arena);
        let mut name = None;

        if self.cursor.try_keyword("module") {
            self.cursor.skip_whitespace();
            if self.cursor.peek() == Some(b'@') {
                self.cursor.advance();
                name = Some(&*self.arena.alloc_str(self.cursor.read_word()?));
            }
            self.skip_attributes()?;
            self.cursor.expect(b'{')?;
            while !self.cursor.try_read(b'}') {
                if self.cursor.is_eof() {
                    return Err(self.cursor.error("module body is not closed"));
                }
                functions.push(self.parse_func()?);
            }
        } else {
            self.cursor.skip_whitespace();
            while !self.cursor.is_eof() {
                functions.push(self.parse_func()?);
                self.cursor.skip_whitespace();
            }
        }

        self.cursor.skip_whitespace();
        if !self.cursor.is_eof() {
            return Err(self.cursor.error("unexpected input after module"));
        }
        if functions.is_empty() {
            return Err(self.cursor.error("module contains no functions"));
        }

        Ok(StructuredModule::new(name, functions.into_bump_slice()))
    }

    fn skip_attributes(&mut self) -> Result<()> {
        if self.cursor.try_keyword("attributes") {
            self.cursor.skip_whitespace();
            self.cursor.skip_balanced(b'{', b'}')?;
        }
        Ok(())
    }

    fn skip_dictionary(&mut self) -> Result<()> {
        self.cursor.skip_whitespace();
        if self.cursor.peek() == Some(b'{') {
            self.cursor.skip_balanced(b'{', b'}')?;
        }
        Ok(())
    }

    fn parse_func(&mut self) -> Result<FuncOp<'ctx>> {
        if !self.cursor.try_keyword("func.func") {
            return Err(self.cursor.error("expected 'func.func'"));
        }
        if !self.cursor.try_keyword("public") {
            self.cursor.try_keyword("private");
        }
        self.cursor.expect(b'@')?;
        let name = self.arena.alloc_str(self.cursor.read_word()?);

        let mut values = ValueMap::new();
        let mut arguments = BumpVec::new_in(self.arena);
        self.cursor.expect(b'(')?;
        while !self.cursor.try_read(b')') {
            let arg = self.read_value_name()?;
            self.cursor.expect(b':')?;
            let ty = self.parse_tensor_type()?;
            self.skip_dictionary()?;
            self.define(&mut values, arg, arguments.len())?;
            arguments.push(ty);
            if !self.cursor.try_read(b',') && self.cursor.peek() != Some(b')') {
                return Err(self.cursor.error("expected ',' or ')' in argument list"));
            }
        }

        let mut result_types = BumpVec::new_in(self.arena);
        if self.cursor.try_read(b'-') {
            self.cursor.expect(b'>')?;
            if self.cursor.try_read(b'(') {
                while !self.cursor.try_read(b')') {
                    result_types.push(self.parse_tensor_type()?);
                    self.skip_dictionary()?;
                    if !self.cursor.try_read(b',') && self.cursor.peek() != Some(b')') {
                        return Err(self.cursor.error("expected ',' or ')' in result list"));
                    }
                }
            } else {
                result_types.push(self.parse_tensor_type()?);
            }
        }
        self.skip_attributes()?;
        self.cursor.expect(b'{')?;

        let mut body = BumpVec::new_in(self.arena);
        let returned = loop {
            if self.cursor.try_keyword("return") || self.cursor.try_keyword("func.return") {
                break self.parse_return(&values)?;
            }
            if self.cursor.is_eof() || self.cursor.peek() == Some(b'}') {
                return Err(self.cursor.error(format!("function @{} has no return", name)));
            }
            let next = arguments.len() + body.len();
            body.push(self.parse_operation(&mut values, next)?);
        };
        self.cursor.expect(b'}')?;

        Ok(FuncOp {
            name,
            arguments: arguments.into_bump_slice(),
            result_types: result_types.into_bump_slice(),
            body: body.into_bump_slice(),
            returned,
        })
    }

    fn read_value_name(&mut self) -> Result<&'s str> {
        self.cursor.expect(b'%')?;
        self.cursor.read_word()
    }

    fn define(&self, values: &mut ValueMap<'s>, name: &'s str, index: usize) -> Result<ValueId> {
        let id = ValueId(index as u32);
        if values.insert(name, id).is_some() {
            return Err(self.cursor.error(format!("value %{} is defined twice", name)));
        }
        Ok(id)
    }

    fn resolve(&mut self, values: &ValueMap<'s>) -> Result<ValueId> {
        let pos = self.cursor.pos();
        let name = self.read_value_name()?;
        values.get(name).copied().ok_or_else(|| {
            self.cursor.set_pos(pos);
            self.cursor.error(format!("use of undefined value %{}", name))
        })
    }

    fn parse_operation(&mut self, values: &mut ValueMap<'s>, next: usize) -> Result<Operation<'ctx>> {
        let result_name = self.read_value_name()?;
        self.cursor.expect(b'=')?;
        self.cursor.skip_whitespace();
        if self.cursor.peek() == Some(b'"') {
            return Err(self.cursor.error("generic operation syntax is not supported"));
        }

        let op_pos = self.cursor.pos();
        let full_name = self.cursor.read_identifier()?;
        let mnemonic = match full_name.split_once('.') {
            Some(("mhlo", mnemonic)) | Some(("stablehlo", mnemonic)) => mnemonic,
            _ => {
                self.cursor.set_pos(op_pos);
                return Err(self.cursor.error(format!("unsupported operation '{}'", full_name)));
            }
        };

        let (kind, operands) = if mnemonic == "constant" {
            self.cursor.expect_keyword("dense")?;
            self.cursor.expect(b'<')?;
            let elements = self.parse_dense_elements()?;
            (OpKind::Constant(DenseAttr { elements }), &[] as &[ValueId])
        } else {
            let (kind, arity) = if let Some(op) = UnaryOp::from_name(mnemonic) {
                (OpKind::Unary(op), 1)
            } else if let Some(op) = BinaryOp::from_name(mnemonic) {
                (OpKind::Binary(op), 2)
            } else {
                self.cursor.set_pos(op_pos);
                return Err(self.cursor.error(format!("unsupported operation '{}'", full_name)));
            };
            let mut operands = BumpVec::new_in(self.arena);
            loop {
                operands.push(self.resolve(values)?);
                if !self.cursor.try_read(b',') {
                    break;
                }
            }
            if operands.len() != arity {
                return Err(self.cursor.error(format!(
                    "{} expects {} operands but got {}",
                    full_name,
                    arity,
                    operands.len()
                )));
            }
            (kind, operands.into_bump_slice() as &[ValueId])
        };

        self.cursor.expect(b':')?;
        self.cursor.skip_whitespace();
        if self.cursor.peek() == Some(b'(') {
            // Functional type `(operand types) -> result type`; only the result matters.
            self.cursor.skip_balanced(b'(', b')')?;
            self.cursor.expect(b'-')?;
            self.cursor.expect(b'>')?;
        }
        let result_type = self.parse_tensor_type()?;
        let result = self.define(values, result_name, next)?;

        Ok(Operation {
            name: self.arena.alloc_str(full_name),
            kind,
            operands,
            result,
            result_type,
        })
    }

    fn parse_return(&mut self, values: &ValueMap<'s>) -> Result<&'ctx [ValueId]> {
        let mut returned = BumpVec::new_in(self.arena);
        self.cursor.skip_whitespace();
        if self.cursor.peek() == Some(b'%') {
            loop {
                returned.push(self.resolve(values)?);
                if !self.cursor.try_read(b',') {
                    break;
                }
            }
            self.cursor.expect(b':')?;
            let mut types = 0usize;
            loop {
                self.parse_tensor_type()?;
                types += 1;
                if !self.cursor.try_read(b',') {
                    break;
                }
            }
            if types != returned.len() {
                return Err(self.cursor.error(format!(
                    "return lists {} values but {} types",
                    returned.len(),
                    types
                )));
            }
        }
        Ok(returned.into_bump_slice())
    }

    fn parse_tensor_type(&mut self) -> Result<TensorType<'ctx>> {
        self.cursor.expect_keyword("tensor")?;
        self.cursor.expect(b'<')?;
        let word = self.cursor.read_word()?;
        if self.cursor.peek() != Some(b'>') {
            return Err(self.cursor.error("dynamic dimensions and tensor encodings are not supported"));
        }
        self.cursor.advance();

        let mut parts: Vec<&str> = word.split('x').collect();
        let element_name = parts.pop().unwrap_or_default();
        let element_type = PrimitiveType::from_mlir_name(element_name)
            .ok_or_else(|| self.cursor.error(format!("unsupported element type '{}'", element_name)))?;
        let mut dims = Vec::with_capacity(parts.len());
        for part in parts {
            let dim: i64 = part
                .parse()
                .map_err(|_| self.cursor.error(format!("invalid dimension '{}' in tensor type", part)))?;
            if dim < 0 {
                return Err(self.cursor.error(format!("negative dimension {} in tensor type", dim)));
            }
            dims.push(dim);
        }

        let ty = TensorType {
            element_type,
            dims: self.arena.alloc_slice_copy(&dims),
        };
        if ty.to_shape().checked_byte_size().is_none() {
            return Err(self.cursor.error(format!("{} is too large", ty)));
        }
        Ok(ty)
    }

    /// Parse the body of `dense<...>` up to and including the closing `>`.
    fn parse_dense_elements(&mut self) -> Result<&'ctx [ScalarAttr]> {
        let mut elements = BumpVec::new_in(self.arena);
        let mut depth = 0usize;
        loop {
            self.cursor.skip_whitespace();
            match self.cursor.peek() {
                Some(b'[') => {
                    depth += 1;
                    self.cursor.advance();
                }
                Some(b']') if depth > 0 => {
                    depth -= 1;
                    self.cursor.advance();
                }
                Some(b',') if depth > 0 => self.cursor.advance(),
                Some(b'>') if depth == 0 => {
                    self.cursor.advance();
                    break;
                }
                Some(_) => {
                    let token = self.cursor.read_scalar_token()?;
                    elements.push(scalar_attr(token).ok_or_else(|| {
                        self.cursor.error(format!("invalid dense element '{}'", token))
                    })?);
                }
                None => return Err(self.cursor.error("unterminated dense attribute")),
            }
        }
        if elements.is_empty() {
            return Err(self.cursor.error("dense attribute has no elements"));
        }
        Ok(elements.into_bump_slice())
    }
}

fn scalar_attr(token: &str) -> Option<ScalarAttr> {
    match token {
        "true" => Some(ScalarAttr::Bool(true)),
        "false" => Some(ScalarAttr::Bool(false)),
        _ => token
            .parse::<i64>()
            .map(ScalarAttr::Int)
            .ok()
            .or_else(|| token.parse::<f64>().map(ScalarAttr::Float).ok()),
    }
}
