use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};

use crate::constants::*;
use crate::memory::PhysicalStore;
use crate::vm::VirtualMemory;

/// One line of a trace file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Read(u64),
    Write(u64, Word),
}

/// Result of running one [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Value(Word),
    Written,
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Value(value) => write!(f, "{}", value),
            Outcome::Written => write!(f, "ok"),
            Outcome::Failed => write!(f, "{}", FAILED_ACCESS),
        }
    }
}

fn parse_number(token: &str) -> Result<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| anyhow!("Invalid number: {}", token))?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_address(token: &str) -> Result<u64> {
    let value = parse_number(token)?;
    u64::try_from(value).map_err(|_| anyhow!("Negative address: {}", token))
}

fn parse_value(token: &str) -> Result<Word> {
    let value = parse_number(token)?;
    Word::try_from(value).map_err(|_| anyhow!("Value out of range: {}", token))
}

fn parse_line(line: &str) -> Result<Option<Command>> {
    let code = line.split_once('#').map_or(line, |(code, _)| code);
    let tokens: Vec<&str> = code.split_whitespace().collect();
    let command = match tokens.as_slice() {
        [] => return Ok(None),
        [op, address] if op.eq_ignore_ascii_case("r") => Command::Read(parse_address(address)?),
        [op, address, value] if op.eq_ignore_ascii_case("w") => {
            Command::Write(parse_address(address)?, parse_value(value)?)
        }
        [op, ..] => bail!(
            "Expected `r <addr>` or `w <addr> <value>`, got `{}` with {} tokens",
            op,
            tokens.len()
        ),
    };
    Ok(Some(command))
}

/// Parse a trace: one command per line, `#` comments to end of line.
pub fn parse_trace(content: &str) -> Result<Vec<Command>> {
    let mut commands = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let parsed = parse_line(line).with_context(|| format!("line {}", number + 1))?;
        commands.extend(parsed);
    }
    Ok(commands)
}

pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<Vec<Command>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace file {}", path.display()))?;
    parse_trace(&content).with_context(|| format!("Failed to parse trace file {}", path.display()))
}

/// Run every command in order. Failed accesses do not stop the batch.
pub fn run_batch<S: PhysicalStore>(vm: &mut VirtualMemory<S>, commands: &[Command]) -> Vec<Outcome> {
    commands
        .iter()
        .map(|command| match *command {
            Command::Read(address) => vm.read(address).map_or(Outcome::Failed, Outcome::Value),
            Command::Write(address, value) => {
                vm.write(address, value).map_or(Outcome::Failed, |_| Outcome::Written)
            }
        })
        .collect()
}

pub fn format_results(results: &[Outcome]) -> String {
    let output: Vec<String> = results.iter().map(|r| r.to_string()).collect();
    output.join(" ")
}

pub fn write_results<P: AsRef<Path>>(path: P, results: &[Outcome]) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, format_results(results))
        .with_context(|| format!("Failed to write output file {}", path.display()))
}
