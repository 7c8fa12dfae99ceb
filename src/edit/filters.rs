//! Whole-image filter pipeline backend
//!
//! Inputs are converted to planar float images (one plane per channel) and
//! kept in a list. Each command is applied to every image of the list in
//! order; the first image left at the end is the result.
//!
//! # Commands
//!
//! A leading `-` on a command name is accepted (`-blur 2` == `blur 2`).
//!
//! | Command | Args | Effect |
//! |---------|------|--------|
//! | `negate` | | `min + max - v` per image |
//! | `add` `sub` `mul` `div` | `v` | arithmetic with a constant |
//! | `blur` | `sigma` | separable gaussian, clamped edges |
//! | `bc` | `brightness contrast` | `(v - mid) * (1 + c) + mid + b * range` |
//! | `normalize` | `lo hi` | linear stretch of `[min, max]` to `[lo, hi]` |
//! | `threshold` | `v` | `1` where `v >= t`, else `0` |
//! | `mirror` | `x` or `y` | flip columns or rows |
//! | `luminance` | | Rec.709 luma, single channel |
//! | `sum` `mean` | | collapse the list into one image |

use rayon::prelude::*;

use super::{EditBackend, EditError, EditInput, EditKind, EditOutput};

pub struct FilterBackend;

impl EditBackend for FilterBackend {
    fn kind(&self) -> EditKind {
        EditKind::Filter
    }

    fn run(&self, inputs: &[EditInput<'_>], program: &str) -> Result<EditOutput, EditError> {
        let commands = parse(program)?;
        let mut images: Vec<Planar> = inputs.iter().map(Planar::from_input).collect();

        for command in &commands {
            images = command.apply(images)?;
        }

        images
            .into_iter()
            .next()
            .map(Planar::into_output)
            .ok_or_else(|| EditError::Runtime("filter pipeline produced no image".into()))
    }
}

/// Channel-planar float image
#[derive(Debug, Clone, PartialEq)]
struct Planar {
    width: usize,
    height: usize,
    planes: Vec<Vec<f32>>,
}

impl Planar {
    fn from_input(input: &EditInput<'_>) -> Self {
        let n = input.width * input.height;
        let c = input.channels;
        let planes = (0..c)
            .map(|k| (0..n).map(|p| input.pixels[p * c + k]).collect())
            .collect();
        Self {
            width: input.width,
            height: input.height,
            planes,
        }
    }

    fn into_output(self) -> EditOutput {
        let n = self.width * self.height;
        let c = self.planes.len();
        let mut pixels = vec![0.0f32; n * c];
        for (k, plane) in self.planes.iter().enumerate() {
            for (p, &v) in plane.iter().enumerate() {
                pixels[p * c + k] = v;
            }
        }
        EditOutput {
            pixels,
            width: self.width,
            height: self.height,
            channels: c,
        }
    }

    fn min_max(&self) -> (f32, f32) {
        let (lo, hi) = self
            .planes
            .iter()
            .flatten()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if lo > hi { (0.0, 0.0) } else { (lo, hi) }
    }

    fn map(mut self, f: impl Fn(f32) -> f32 + Sync) -> Self {
        self.planes
            .par_iter_mut()
            .for_each(|plane| plane.iter_mut().for_each(|v| *v = f(*v)));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Negate,
    Add(f32),
    Sub(f32),
    Mul(f32),
    Div(f32),
    Blur(f32),
    BrightnessContrast(f32, f32),
    Normalize(f32, f32),
    Threshold(f32),
    Mirror(Axis),
    Luminance,
    Sum,
    Mean,
}

fn parse(program: &str) -> Result<Vec<Command>, EditError> {
    let mut tokens = program.split_whitespace();
    let mut commands = Vec::new();

    while let Some(token) = tokens.next() {
        let name = token.strip_prefix('-').unwrap_or(token);
        let command = match name {
            "negate" => Command::Negate,
            "add" => Command::Add(next_number(&mut tokens, name)?),
            "sub" => Command::Sub(next_number(&mut tokens, name)?),
            "mul" => Command::Mul(next_number(&mut tokens, name)?),
            "div" => Command::Div(next_number(&mut tokens, name)?),
            "blur" => {
                let sigma = next_number(&mut tokens, name)?;
                if !sigma.is_finite() {
                    return Err(EditError::Parse(format!("'blur' expects a finite sigma, got {}", sigma)));
                }
                Command::Blur(sigma)
            }
            "bc" => {
                let b = next_number(&mut tokens, name)?;
                let c = next_number(&mut tokens, name)?;
                Command::BrightnessContrast(b, c)
            }
            "normalize" => {
                let lo = next_number(&mut tokens, name)?;
                let hi = next_number(&mut tokens, name)?;
                Command::Normalize(lo, hi)
            }
            "threshold" => Command::Threshold(next_number(&mut tokens, name)?),
            "mirror" => match tokens.next() {
                Some("x") => Command::Mirror(Axis::X),
                Some("y") => Command::Mirror(Axis::Y),
                other => {
                    return Err(EditError::Parse(format!(
                        "'mirror' expects x or y, got {:?}",
                        other.unwrap_or("")
                    )));
                }
            },
            "luminance" => Command::Luminance,
            "sum" => Command::Sum,
            "mean" => Command::Mean,
            _ => return Err(EditError::Parse(format!("unknown command '{}'", token))),
        };
        commands.push(command);
    }
    Ok(commands)
}

fn next_number(tokens: &mut std::str::SplitWhitespace<'_>, cmd: &str) -> Result<f32, EditError> {
    let token = tokens
        .next()
        .ok_or_else(|| EditError::Parse(format!("'{}' expects a number", cmd)))?;
    token
        .parse::<f32>()
        .map_err(|_| EditError::Parse(format!("'{}': bad number '{}'", cmd, token)))
}

impl Command {
    fn apply(&self, images: Vec<Planar>) -> Result<Vec<Planar>, EditError> {
        match *self {
            Command::Sum => collapse(images, false).map(|img| vec![img]),
            Command::Mean => collapse(images, true).map(|img| vec![img]),
            _ => Ok(images.into_iter().map(|img| self.apply_one(img)).collect()),
        }
    }

    fn apply_one(&self, img: Planar) -> Planar {
        match *self {
            Command::Negate => {
                let (lo, hi) = img.min_max();
                img.map(move |v| lo + hi - v)
            }
            Command::Add(a) => img.map(move |v| v + a),
            Command::Sub(a) => img.map(move |v| v - a),
            Command::Mul(a) => img.map(move |v| v * a),
            Command::Div(a) => img.map(move |v| v / a),
            Command::Blur(sigma) => blur(img, sigma),
            Command::BrightnessContrast(b, c) => {
                let (lo, hi) = img.min_max();
                let mid = (lo + hi) * 0.5;
                let range = hi - lo;
                let cf = 1.0 + c;
                img.map(move |v| (v - mid) * cf + mid + b * range)
            }
            Command::Normalize(to_lo, to_hi) => {
                let (lo, hi) = img.min_max();
                if hi > lo {
                    let scale = (to_hi - to_lo) / (hi - lo);
                    img.map(move |v| (v - lo) * scale + to_lo)
                } else {
                    img.map(move |_| to_lo)
                }
            }
            Command::Threshold(t) => img.map(move |v| if v >= t { 1.0 } else { 0.0 }),
            Command::Mirror(axis) => mirror(img, axis),
            Command::Luminance => luminance(img),
            Command::Sum | Command::Mean => img,
        }
    }
}

/// Element-wise sum (or mean) of every image in the list
fn collapse(images: Vec<Planar>, mean: bool) -> Result<Planar, EditError> {
    let count = images.len();
    let mut iter = images.into_iter();
    let mut acc = iter
        .next()
        .ok_or_else(|| EditError::Runtime("empty image list".into()))?;

    for img in iter {
        if (img.width, img.height, img.planes.len()) != (acc.width, acc.height, acc.planes.len()) {
            return Err(EditError::SizeMismatch {
                expected: (acc.width, acc.height),
                actual: (img.width, img.height),
            });
        }
        for (dst, src) in acc.planes.iter_mut().zip(&img.planes) {
            dst.iter_mut().zip(src).for_each(|(d, s)| *d += s);
        }
    }

    if mean && count > 1 {
        let inv = 1.0 / count as f32;
        acc = acc.map(move |v| v * inv);
    }
    Ok(acc)
}

/// 1D Gaussian kernel, normalized, `3 * sigma` half-size capped at `max_half`.
///
/// Taps past the image edge repeat the clamped edge pixel, so a half-size
/// longer than the image adds nothing.
fn gaussian_kernel(sigma: f32, max_half: usize) -> Vec<f32> {
    let half_size = ((sigma * 3.0).ceil() as i64).clamp(0, max_half as i64) as i32;
    let sigma2 = sigma * sigma;

    let mut kernel: Vec<f32> = (-half_size..=half_size)
        .map(|i| {
            let x = i as f32;
            (-x * x / (2.0 * sigma2)).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// Separable gaussian blur on each plane, edge pixels clamped
fn blur(mut img: Planar, sigma: f32) -> Planar {
    if sigma <= 0.0 || img.width == 0 || img.height == 0 {
        return img;
    }
    let kernel = gaussian_kernel(sigma, img.width.max(img.height));
    let half = (kernel.len() / 2) as i32;
    let (w, h) = (img.width, img.height);

    img.planes.par_iter_mut().for_each(|plane| {
        let mut tmp = vec![0.0f32; plane.len()];
        // horizontal
        for y in 0..h {
            for x in 0..w {
                tmp[y * w + x] = kernel
                    .iter()
                    .enumerate()
                    .map(|(ki, &k)| {
                        let sx = (x as i32 + ki as i32 - half).clamp(0, w as i32 - 1) as usize;
                        plane[y * w + sx] * k
                    })
                    .sum();
            }
        }
        // vertical
        for y in 0..h {
            for x in 0..w {
                plane[y * w + x] = kernel
                    .iter()
                    .enumerate()
                    .map(|(ki, &k)| {
                        let sy = (y as i32 + ki as i32 - half).clamp(0, h as i32 - 1) as usize;
                        tmp[sy * w + x] * k
                    })
                    .sum();
            }
        }
    });
    img
}

fn mirror(mut img: Planar, axis: Axis) -> Planar {
    let (w, h) = (img.width, img.height);
    for plane in &mut img.planes {
        match axis {
            Axis::X => plane.chunks_exact_mut(w.max(1)).for_each(|row| row.reverse()),
            Axis::Y => {
                for y in 0..h / 2 {
                    let (top, bottom) = plane.split_at_mut((h - 1 - y) * w);
                    top[y * w..(y + 1) * w].swap_with_slice(&mut bottom[..w]);
                }
            }
        }
    }
    img
}

fn luminance(img: Planar) -> Planar {
    let Planar { width, height, planes } = img;
    let plane = if planes.len() >= 3 {
        planes[0]
            .iter()
            .zip(&planes[1])
            .zip(&planes[2])
            .map(|((r, g), b)| 0.2126 * r + 0.7152 * g + 0.0722 * b)
            .collect()
    } else {
        planes.into_iter().next().unwrap_or_default()
    };
    Planar {
        width,
        height,
        planes: vec![plane],
    }
}
