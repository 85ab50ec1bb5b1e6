use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use log::{info, warn};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Leading digit of a trace line.
#[derive(Debug, FromPrimitive, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Load = 0,
    Store = 1,
    Other = 2,
    Invalid = 3,
}

/// One trace record. For loads and stores `value` is the address, for `Other` it is the number
/// of compute cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub value: u32,
}

impl Instruction {
    pub const INVALID: Instruction = Instruction {
        kind: InstructionKind::Invalid,
        value: 0,
    };

    pub fn load(addr: u32) -> Self {
        Self {
            kind: InstructionKind::Load,
            value: addr,
        }
    }

    pub fn store(addr: u32) -> Self {
        Self {
            kind: InstructionKind::Store,
            value: addr,
        }
    }

    pub fn other(cycles: u32) -> Self {
        Self {
            kind: InstructionKind::Other,
            value: cycles,
        }
    }
}

/// Parse `"<digit> 0x<hex>"`. Unknown digits decode as `Invalid`; lines that do not have that
/// shape at all become `Instruction::INVALID`.
pub fn parse_line(line: &str) -> Instruction {
    let mut fields = line.split_whitespace();
    let (Some(kind), Some(value), None) = (fields.next(), fields.next(), fields.next()) else {
        warn!("cannot parse trace line '{}'", line);
        return Instruction::INVALID;
    };

    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    let (Some(digit), Ok(value)) = (single_digit(kind), u32::from_str_radix(digits, 16)) else {
        warn!("cannot parse trace line '{}'", line);
        return Instruction::INVALID;
    };

    let kind = InstructionKind::from_u8(digit).unwrap_or_else(|| {
        warn!("unknown instruction kind {} in '{}'", digit, line);
        InstructionKind::Invalid
    });
    Instruction { kind, value }
}

fn single_digit(field: &str) -> Option<u8> {
    match field.as_bytes() {
        [d] if d.is_ascii_digit() => Some(d - b'0'),
        _ => None,
    }
}

pub fn load_trace(path: &Path) -> anyhow::Result<Vec<Instruction>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    let trace: Vec<_> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect();
    info!("loaded {} instructions from {}", trace.len(), path.display());
    Ok(trace)
}

/// Resolve trace arguments to files: directories expand to their `*.data` entries in name order,
/// files are kept as given.
pub fn discover_traces(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut traces = Vec::new();
    for input in inputs {
        if input.is_file() {
            traces.push(input.clone());
        } else if input.is_dir() {
            let mut found = Vec::new();
            let entries = fs::read_dir(input)
                .with_context(|| format!("failed to list {}", input.display()))?;
            for entry in entries {
                let path = entry
                    .with_context(|| format!("failed to list {}", input.display()))?
                    .path();
                if path.is_file() && path.extension().map_or(false, |ext| ext == "data") {
                    found.push(path);
                }
            }
            found.sort();
            traces.extend(found);
        } else {
            bail!("invalid trace input file or folder: {}", input.display());
        }
    }
    Ok(traces)
}
