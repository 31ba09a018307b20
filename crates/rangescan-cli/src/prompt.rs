//! Interactive scan configuration

use anyhow::{Context, Result};
use dialoguer::{console::Term, Confirm, Input, Select};

use crate::{EncodingArg, FormatArg, ModeArg, ScanArgs};

const FORMATS: [(&str, FormatArg); 3] = [
    ("Bitcoin addresses (P2PKH)", FormatArg::Address),
    ("HASH160 hex", FormatArg::Hash160),
    ("Public keys hex", FormatArg::Pubkey),
];

const ENCODINGS: [(&str, EncodingArg); 3] = [
    ("Compressed only (recommended)", EncodingArg::Compressed),
    ("Uncompressed only", EncodingArg::Uncompressed),
    ("Both (half speed)", EncodingArg::Both),
];

const MODES: [(&str, ModeArg); 3] = [
    ("Sequential range", ModeArg::Sequential),
    ("Random keyspace", ModeArg::Random),
    ("Geometric progression", ModeArg::Geometric),
];

/// Ask for the scan parameters, keeping paths and limits from `base`.
pub fn run_scan_menu(base: ScanArgs) -> Result<ScanArgs> {
    let term = Term::stderr();
    let mut args = base;

    args.format = pick(&term, "Target list format", &FORMATS, 0)?;
    args.encoding = pick(&term, "Public-key encodings to check", &ENCODINGS, 0)?;
    args.stop_on_find = Confirm::new()
        .with_prompt("Stop all workers after the first find?")
        .default(false)
        .interact_on(&term)
        .context("prompt failed")?;
    args.mode = pick(&term, "Operation mode", &MODES, 0)?;

    match args.mode {
        ModeArg::Sequential => {
            let bits: String = Input::new()
                .with_prompt("Starting bit (blank = resume from checkpoint)")
                .allow_empty(true)
                .interact_text_on(&term)
                .context("prompt failed")?;
            apply_start_bit(&mut args, &bits)?;
            args.stride = Input::new()
                .with_prompt("Stride multiplier")
                .default(1u64)
                .interact_text_on(&term)
                .context("prompt failed")?;
        }
        ModeArg::Random => {
            let range: String = Input::new()
                .with_prompt("Bit range, e.g. 66 or 60:70 (blank = 1:256)")
                .allow_empty(true)
                .interact_text_on(&term)
                .context("prompt failed")?;
            args.range = random_range(&range);
        }
        ModeArg::Geometric => {
            args.start_bit = Some(
                Input::new()
                    .with_prompt("Starting bit")
                    .default(1u32)
                    .interact_text_on(&term)
                    .context("prompt failed")?,
            );
            args.start = None;
            args.multiplier = Input::new()
                .with_prompt("Multiplication factor")
                .default(2u64)
                .interact_text_on(&term)
                .context("prompt failed")?;
        }
    }

    Ok(args)
}

fn pick<T: Copy>(term: &Term, prompt: &str, items: &[(&str, T)], default: usize) -> Result<T> {
    let labels: Vec<&str> = items.iter().map(|(label, _)| *label).collect();
    let index = Select::new()
        .with_prompt(prompt)
        .items(&labels)
        .default(default)
        .interact_on(term)
        .context("prompt failed")?;
    Ok(items[index].1)
}

/// Blank input switches the sequential scan to checkpoint resume.
fn apply_start_bit(args: &mut ScanArgs, input: &str) -> Result<()> {
    let input = input.trim();
    args.start = None;
    if input.is_empty() {
        args.start_bit = None;
        args.resume = true;
    } else {
        args.start_bit = Some(
            input
                .parse()
                .with_context(|| format!("invalid starting bit '{}'", input))?,
        );
        args.resume = false;
    }
    Ok(())
}

fn random_range(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        None
    } else {
        Some(input.to_string())
    }
}
