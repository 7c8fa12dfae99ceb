//! Per-pixel RPN expression backend
//!
//! The program is evaluated once per pixel on a stack of small vectors
//! (1 to 4 components). Rows run in parallel with rayon.
//!
//! # Tokens
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `x` `y` `z` `w`, `in0` .. `inN` | pixel of input N (all channels) |
//! | `x[k]`, `in1[k]` | channel k of an input |
//! | `:i` `:j` | pixel column / row |
//! | `:w` `:h` | image width / height |
//! | number | scalar constant |
//! | `+ - * / ^ min max` | binary, scalars broadcast over vectors |
//! | `neg abs sqrt exp log sin cos floor` | unary, per component |
//! | `dup swap pop` | stack manipulation |
//! | `join` | concatenate the two top vectors |
//!
//! The output depth is the depth of the value left on top of the stack.

use log::trace;
use rayon::prelude::*;

use super::{EditBackend, EditError, EditInput, EditKind, EditOutput, common_size};

const MAX_DEPTH: usize = 4;

pub struct ExpressionBackend;

impl EditBackend for ExpressionBackend {
    fn kind(&self) -> EditKind {
        EditKind::Expression
    }

    fn run(&self, inputs: &[EditInput<'_>], program: &str) -> Result<EditOutput, EditError> {
        let ops = compile(program, inputs.len())?;
        let (width, height) = common_size(inputs)?;
        if width == 0 || height == 0 {
            return Err(EditError::Runtime("empty input image".into()));
        }

        let ctx = Context { inputs, width, height };
        let mut stack = Vec::with_capacity(ops.len());
        let first = ctx.eval(&ops, 0, 0, &mut stack)?;
        let channels = first.n;
        trace!("Expression output depth {}", channels);

        let mut pixels = vec![0.0f32; width * height * channels];
        pixels
            .par_chunks_mut(width * channels)
            .enumerate()
            .try_for_each(|(j, row)| {
                let mut stack = Vec::with_capacity(ops.len());
                for (i, out) in row.chunks_exact_mut(channels).enumerate() {
                    let v = ctx.eval(&ops, i, j, &mut stack)?;
                    if v.n != channels {
                        return Err(EditError::Runtime(format!(
                            "output depth changed from {} to {} at ({}, {})",
                            channels, v.n, i, j
                        )));
                    }
                    out.copy_from_slice(v.as_slice());
                }
                Ok(())
            })?;

        Ok(EditOutput {
            pixels,
            width,
            height,
            channels,
        })
    }
}

/// Small fixed-capacity vector value
#[derive(Debug, Clone, Copy, PartialEq)]
struct Val {
    n: usize,
    v: [f32; MAX_DEPTH],
}

impl Val {
    fn scalar(s: f32) -> Self {
        Self { n: 1, v: [s, 0.0, 0.0, 0.0] }
    }

    fn from_slice(s: &[f32]) -> Self {
        let mut v = [0.0; MAX_DEPTH];
        let n = s.len().min(MAX_DEPTH);
        v[..n].copy_from_slice(&s[..n]);
        Self { n, v }
    }

    fn as_slice(&self) -> &[f32] {
        &self.v[..self.n]
    }

    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        let mut out = self;
        for c in &mut out.v[..self.n] {
            *c = f(*c);
        }
        out
    }

    fn zip(a: Val, b: Val, f: impl Fn(f32, f32) -> f32) -> Result<Val, EditError> {
        let n = match (a.n, b.n) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            (x, y) => return Err(EditError::Runtime(format!("cannot combine depths {} and {}", x, y))),
        };
        let mut out = Val { n, v: [0.0; MAX_DEPTH] };
        for k in 0..n {
            let ak = if a.n == 1 { a.v[0] } else { a.v[k] };
            let bk = if b.n == 1 { b.v[0] } else { b.v[k] };
            out.v[k] = f(ak, bk);
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Binary {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Unary {
    Neg,
    Abs,
    Sqrt,
    Exp,
    Log,
    Sin,
    Cos,
    Floor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Const(f32),
    Input(usize),
    Component(usize, usize),
    Col,
    Row,
    Width,
    Height,
    Binary(Binary),
    Unary(Unary),
    Dup,
    Swap,
    Pop,
    Join,
}

impl Op {
    /// (popped, pushed)
    fn arity(&self) -> (usize, usize) {
        match self {
            Op::Binary(_) | Op::Join => (2, 1),
            Op::Unary(_) => (1, 1),
            Op::Dup => (1, 2),
            Op::Swap => (2, 2),
            Op::Pop => (1, 0),
            _ => (0, 1),
        }
    }
}

fn input_index(name: &str) -> Option<usize> {
    match name {
        "x" => Some(0),
        "y" => Some(1),
        "z" => Some(2),
        "w" => Some(3),
        _ => name.strip_prefix("in").and_then(|n| n.parse().ok()),
    }
}

fn parse_token(token: &str, n_inputs: usize) -> Result<Op, EditError> {
    let op = match token {
        "+" => Op::Binary(Binary::Add),
        "-" => Op::Binary(Binary::Sub),
        "*" => Op::Binary(Binary::Mul),
        "/" => Op::Binary(Binary::Div),
        "^" => Op::Binary(Binary::Pow),
        "min" => Op::Binary(Binary::Min),
        "max" => Op::Binary(Binary::Max),
        "neg" => Op::Unary(Unary::Neg),
        "abs" => Op::Unary(Unary::Abs),
        "sqrt" => Op::Unary(Unary::Sqrt),
        "exp" => Op::Unary(Unary::Exp),
        "log" => Op::Unary(Unary::Log),
        "sin" => Op::Unary(Unary::Sin),
        "cos" => Op::Unary(Unary::Cos),
        "floor" => Op::Unary(Unary::Floor),
        "dup" => Op::Dup,
        "swap" => Op::Swap,
        "pop" => Op::Pop,
        "join" => Op::Join,
        ":i" => Op::Col,
        ":j" => Op::Row,
        ":w" => Op::Width,
        ":h" => Op::Height,
        _ => {
            if let Ok(v) = token.parse::<f32>() {
                return Ok(Op::Const(v));
            }
            let (name, component) = match token.split_once('[') {
                Some((name, rest)) => {
                    let k = rest
                        .strip_suffix(']')
                        .and_then(|k| k.parse::<usize>().ok())
                        .ok_or_else(|| EditError::Parse(format!("bad component access '{}'", token)))?;
                    (name, Some(k))
                }
                None => (token, None),
            };
            let index = input_index(name).ok_or_else(|| EditError::Parse(format!("unknown token '{}'", token)))?;
            if index >= n_inputs {
                return Err(EditError::Parse(format!(
                    "'{}' refers to input {} but only {} given",
                    token, index, n_inputs
                )));
            }
            match component {
                Some(k) => Op::Component(index, k),
                None => Op::Input(index),
            }
        }
    };
    Ok(op)
}

/// Parse and check stack balance.
fn compile(program: &str, n_inputs: usize) -> Result<Vec<Op>, EditError> {
    let ops: Vec<Op> = program
        .split_whitespace()
        .map(|t| parse_token(t, n_inputs))
        .collect::<Result<_, _>>()?;

    let mut depth = 0usize;
    for op in &ops {
        let (pop, push) = op.arity();
        depth = depth
            .checked_sub(pop)
            .ok_or_else(|| EditError::Parse(format!("stack underflow at {:?}", op)))?
            + push;
    }
    if depth == 0 {
        return Err(EditError::Parse("program leaves nothing on the stack".into()));
    }
    Ok(ops)
}

struct Context<'a, 'b> {
    inputs: &'a [EditInput<'b>],
    width: usize,
    height: usize,
}

impl Context<'_, '_> {
    fn pixel(&self, index: usize, i: usize, j: usize) -> &[f32] {
        let input = &self.inputs[index];
        let start = (j * self.width + i) * input.channels;
        &input.pixels[start..start + input.channels]
    }

    fn eval(&self, ops: &[Op], i: usize, j: usize, stack: &mut Vec<Val>) -> Result<Val, EditError> {
        stack.clear();
        for op in ops {
            match *op {
                Op::Const(c) => stack.push(Val::scalar(c)),
                Op::Input(k) => stack.push(Val::from_slice(self.pixel(k, i, j))),
                Op::Component(k, c) => {
                    let px = self.pixel(k, i, j);
                    let v = px
                        .get(c)
                        .copied()
                        .ok_or_else(|| EditError::Runtime(format!("input {} has no channel {}", k, c)))?;
                    stack.push(Val::scalar(v));
                }
                Op::Col => stack.push(Val::scalar(i as f32)),
                Op::Row => stack.push(Val::scalar(j as f32)),
                Op::Width => stack.push(Val::scalar(self.width as f32)),
                Op::Height => stack.push(Val::scalar(self.height as f32)),
                Op::Unary(u) => {
                    let a = pop(stack)?;
                    stack.push(a.map(|v| match u {
                        Unary::Neg => -v,
                        Unary::Abs => v.abs(),
                        Unary::Sqrt => v.sqrt(),
                        Unary::Exp => v.exp(),
                        Unary::Log => v.ln(),
                        Unary::Sin => v.sin(),
                        Unary::Cos => v.cos(),
                        Unary::Floor => v.floor(),
                    }));
                }
                Op::Binary(b) => {
                    let rhs = pop(stack)?;
                    let lhs = pop(stack)?;
                    stack.push(Val::zip(lhs, rhs, |x, y| match b {
                        Binary::Add => x + y,
                        Binary::Sub => x - y,
                        Binary::Mul => x * y,
                        Binary::Div => x / y,
                        Binary::Pow => x.powf(y),
                        Binary::Min => x.min(y),
                        Binary::Max => x.max(y),
                    })?);
                }
                Op::Dup => {
                    let a = pop(stack)?;
                    stack.push(a);
                    stack.push(a);
                }
                Op::Swap => {
                    let b = pop(stack)?;
                    let a = pop(stack)?;
                    stack.push(b);
                    stack.push(a);
                }
                Op::Pop => {
                    pop(stack)?;
                }
                Op::Join => {
                    let b = pop(stack)?;
                    let a = pop(stack)?;
                    if a.n + b.n > MAX_DEPTH {
                        return Err(EditError::Runtime(format!(
                            "join of depths {} and {} exceeds {}",
                            a.n, b.n, MAX_DEPTH
                        )));
                    }
                    let mut out = a;
                    out.v[a.n..a.n + b.n].copy_from_slice(b.as_slice());
                    out.n = a.n + b.n;
                    stack.push(out);
                }
            }
        }
        pop(stack)
    }
}

fn pop(stack: &mut Vec<Val>) -> Result<Val, EditError> {
    stack
        .pop()
        .ok_or_else(|| EditError::Runtime("stack underflow".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn input(pixels: Vec<f32>, width: usize, height: usize, channels: usize) -> EditInput<'static> {
        EditInput {
            pixels: Cow::Owned(pixels),
            width,
            height,
            channels,
        }
    }

    /// Test: Difference of two inputs
    #[test]
    fn test_binary_two_inputs() {
        let a = input(vec![1.0, 5.0, 3.0, 0.0], 2, 2, 1);
        let b = input(vec![2.0, 2.0, 2.0, 2.0], 2, 2, 1);
        let out = ExpressionBackend.run(&[a, b], "x y - abs").unwrap();
        assert_eq!(out.channels, 1);
        assert_eq!(out.pixels, vec![1.0, 3.0, 1.0, 2.0]);
    }

    /// Test: Scalars broadcast over vectors, depth follows the stack top
    #[test]
    fn test_broadcast_and_depth() {
        let rgb = input(vec![1.0, 2.0, 3.0], 1, 1, 3);
        let out = ExpressionBackend.run(&[rgb.clone()], "x 10 *").unwrap();
        assert_eq!(out.channels, 3);
        assert_eq!(out.pixels, vec![10.0, 20.0, 30.0]);

        let out = ExpressionBackend.run(&[rgb.clone()], "x[0] x[2] +").unwrap();
        assert_eq!(out.channels, 1);
        assert_eq!(out.pixels, vec![4.0]);

        let out = ExpressionBackend.run(&[rgb], "x[2] x[1] join x[0] join").unwrap();
        assert_eq!(out.pixels, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_coordinates() {
        let a = input(vec![0.0; 6], 3, 2, 1);
        let out = ExpressionBackend.run(&[a], ":i :j :w * +").unwrap();
        assert_eq!(out.pixels, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    /// Test: Program errors are reported, not panics
    #[test]
    fn test_errors() {
        let a = input(vec![0.0; 4], 2, 2, 1);
        assert!(matches!(ExpressionBackend.run(&[a.clone()], "+"), Err(EditError::Parse(_))));
        assert!(matches!(ExpressionBackend.run(&[a.clone()], "y"), Err(EditError::Parse(_))));
        assert!(matches!(ExpressionBackend.run(&[a.clone()], "bogus"), Err(EditError::Parse(_))));
        assert!(matches!(ExpressionBackend.run(&[a.clone()], "x pop"), Err(EditError::Parse(_))));

        let wide = input(vec![0.0; 12], 4, 1, 3);
        assert!(matches!(ExpressionBackend.run(&[a, wide], "x y"), Err(EditError::SizeMismatch { .. })));
    }

    #[test]
    fn test_depth_mismatch() {
        let a = input(vec![0.0; 2], 2, 1, 1);
        let rgb = input(vec![0.0; 6], 2, 1, 3);
        let b = input(vec![0.0; 4], 2, 1, 2);
        assert!(matches!(ExpressionBackend.run(&[rgb, b], "x y +"), Err(EditError::Runtime(_))));
        assert!(ExpressionBackend.run(&[a], "x dup join dup join").is_ok());
    }
}
