//! Edit programs: per-pixel transforms over one or more sequences
//!
//! An edit program is `INDICES PROGRAM`, where `INDICES` is one or more
//! leading tokens of 0-based session sequence indices (separated by spaces
//! or commas) and `PROGRAM`, starting at the first other token, is handed to
//! the backend selected by [`EditKind`]:
//!
//! ```text
//! 0 x neg              expression: negate sequence 0
//! 0 1 x y - abs        expression: absolute difference of 0 and 1
//! 0,1 x y - abs        same inputs, comma form
//! 2 blur 3 normalize 0 1
//!                      filter pipeline on sequence 2
//! ```
//!
//! # Architecture
//!
//! ```text
//! Session::current_image()
//!   └── parse_program(text)          -> indices + backend text
//!   └── check_indices(indices, n)    -> out of range = no result
//!   └── raw images of each sequence  (never their edited state)
//!   └── EditRegistry::run(kind, ..)  -> EditBackend::run(inputs, text)
//!   └── Image::from_f32(output)      -> owned, never cached
//! ```
//!
//! Backends are registered at startup; asking for a kind without a backend
//! is [`EditError::Unsupported`], not a panic.

pub mod expr;
pub mod filters;

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::image::{Image, ImageError};

/// Edit backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditKind {
    /// Per-pixel RPN expressions
    Expression,
    /// Whole-image filter pipeline
    Filter,
    /// Reserved for a scripting backend
    Script,
}

impl EditKind {
    pub const ALL: [EditKind; 3] = [EditKind::Expression, EditKind::Filter, EditKind::Script];

    pub fn name(self) -> &'static str {
        match self {
            EditKind::Expression => "expression",
            EditKind::Filter => "filter",
            EditKind::Script => "script",
        }
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Edit program errors
#[derive(Debug, Clone, PartialEq)]
pub enum EditError {
    /// Program does not start with any sequence index
    NoInputs,
    /// Index does not name a sequence of the session
    IndexOutOfRange { index: usize, count: usize },
    /// An input sequence has no loadable image
    InputUnavailable(usize),
    /// No backend registered for this kind
    Unsupported(EditKind),
    /// Program text could not be parsed
    Parse(String),
    /// Program failed while running
    Runtime(String),
    /// Inputs do not share one size
    SizeMismatch { expected: (usize, usize), actual: (usize, usize) },
    /// Backend output is not a valid image
    Output(String),
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::NoInputs => write!(f, "Edit program names no input sequence"),
            EditError::IndexOutOfRange { index, count } => {
                write!(f, "Sequence index {} out of range ({} sequences)", index, count)
            }
            EditError::InputUnavailable(i) => write!(f, "Sequence {} has no image", i),
            EditError::Unsupported(kind) => write!(f, "No backend for {} edits", kind),
            EditError::Parse(e) => write!(f, "Parse error: {}", e),
            EditError::Runtime(e) => write!(f, "Runtime error: {}", e),
            EditError::SizeMismatch { expected, actual } => write!(
                f,
                "Input size mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            EditError::Output(e) => write!(f, "Invalid output: {}", e),
        }
    }
}

impl std::error::Error for EditError {}

impl From<ImageError> for EditError {
    fn from(e: ImageError) -> Self {
        EditError::Output(e.to_string())
    }
}

/// One input image as float samples, row-major and interleaved
#[derive(Debug, Clone)]
pub struct EditInput<'a> {
    pub pixels: Cow<'a, [f32]>,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl<'a> EditInput<'a> {
    pub fn from_image(image: &'a Image) -> Self {
        Self {
            pixels: image.to_f32(),
            width: image.width(),
            height: image.height(),
            channels: image.channels(),
        }
    }
}

/// Backend result, row-major and interleaved
#[derive(Debug, Clone, PartialEq)]
pub struct EditOutput {
    pub pixels: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

/// Implementation of one [`EditKind`]
pub trait EditBackend: Send + Sync {
    fn kind(&self) -> EditKind;

    fn run(&self, inputs: &[EditInput<'_>], program: &str) -> Result<EditOutput, EditError>;
}

/// Backends available to the session
pub struct EditRegistry {
    backends: HashMap<EditKind, Box<dyn EditBackend>>,
}

impl Default for EditRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(expr::ExpressionBackend));
        registry.register(Box::new(filters::FilterBackend));
        registry
    }
}

impl EditRegistry {
    pub fn empty() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register a backend, replacing any previous one of the same kind.
    pub fn register(&mut self, backend: Box<dyn EditBackend>) {
        debug!("Registered {} edit backend", backend.kind());
        self.backends.insert(backend.kind(), backend);
    }

    pub fn supports(&self, kind: EditKind) -> bool {
        self.backends.contains_key(&kind)
    }

    /// Run `program` over `images` and wrap the result as a new image.
    pub fn run(&self, kind: EditKind, images: &[&Image], program: &str) -> Result<Image, EditError> {
        let backend = self.backends.get(&kind).ok_or(EditError::Unsupported(kind))?;
        let inputs: Vec<EditInput<'_>> = images.iter().map(|img| EditInput::from_image(img)).collect();
        let out = backend.run(&inputs, program)?;
        Ok(Image::from_f32(out.pixels, out.width, out.height, out.channels)?)
    }
}

/// Split an edit program into its input indices and the backend text.
///
/// Leading whitespace-delimited tokens made only of indices (`0 1` or
/// `0,1`) are inputs; the first other token starts the backend text.
/// Text that does not start with an index has no inputs.
pub fn parse_program(text: &str) -> Result<(Vec<usize>, &str), EditError> {
    let mut indices = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let parsed: Result<Vec<usize>, _> = rest[..end].split(',').map(str::parse::<usize>).collect();
        let Ok(parsed) = parsed else {
            break;
        };
        indices.extend(parsed);
        rest = rest[end..].trim_start();
    }

    if indices.is_empty() {
        return Err(EditError::NoInputs);
    }
    Ok((indices, rest))
}

/// Every index must name an existing sequence; no partial results.
pub fn check_indices(indices: &[usize], count: usize) -> Result<(), EditError> {
    match indices.iter().find(|&&i| i >= count) {
        Some(&index) => Err(EditError::IndexOutOfRange { index, count }),
        None => Ok(()),
    }
}

/// Size shared by all inputs
pub(crate) fn common_size(inputs: &[EditInput<'_>]) -> Result<(usize, usize), EditError> {
    let first = inputs.first().ok_or(EditError::NoInputs)?;
    let expected = (first.width, first.height);
    for input in &inputs[1..] {
        let actual = (input.width, input.height);
        if actual != expected {
            return Err(EditError::SizeMismatch { expected, actual });
        }
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: Leading index list
    #[test]
    fn test_parse_program() {
        assert_eq!(parse_program("0 x neg").unwrap(), (vec![0], "x neg"));
        assert_eq!(parse_program("  0,2,1   x y +").unwrap(), (vec![0, 2, 1], "x y +"));
        assert_eq!(parse_program("3").unwrap(), (vec![3], ""));
        assert_eq!(parse_program("x neg"), Err(EditError::NoInputs));
        assert_eq!(parse_program(""), Err(EditError::NoInputs));
        assert_eq!(parse_program("0,x y"), Err(EditError::NoInputs));
        assert_eq!(parse_program("0 1 x y +").unwrap(), (vec![0, 1], "x y +"));
        assert_eq!(parse_program("2, x"), Err(EditError::NoInputs));
    }

    #[test]
    fn test_check_indices() {
        assert!(check_indices(&[0, 1], 2).is_ok());
        assert_eq!(
            check_indices(&[0, 5], 2),
            Err(EditError::IndexOutOfRange { index: 5, count: 2 })
        );
    }

    /// Test: Script has no backend by default
    #[test]
    fn test_registry_unsupported() {
        let registry = EditRegistry::default();
        assert!(registry.supports(EditKind::Expression));
        assert!(registry.supports(EditKind::Filter));
        assert!(!registry.supports(EditKind::Script));

        let img = Image::from_f32(vec![1.0], 1, 1, 1).unwrap();
        assert!(matches!(
            registry.run(EditKind::Script, &[&img], "x"),
            Err(EditError::Unsupported(EditKind::Script))
        ));
    }

    /// Test: Registry wraps backend output as a float image
    #[test]
    fn test_registry_run_expression() {
        let registry = EditRegistry::default();
        let img = Image::new(
            crate::core::image::PixelData::U8(vec![10, 20, 30, 40]),
            2,
            2,
            crate::core::image::PixelFormat::R,
        )
        .unwrap();
        let out = registry.run(EditKind::Expression, &[&img], "x 2 *").unwrap();
        assert_eq!(out.element_type(), crate::core::image::ElementType::F32);
        assert_eq!((out.min(), out.max()), (20.0, 80.0));
    }
}
