//! Assembly listing output.

use std::fmt::Write as _;
use std::io::{self, Write};

use generator_core::{ConcreteCall, LabelDef, Operand, Sequence, SequenceSink};

use crate::errors::FrontEndError;
use crate::isa::{self, Format};
use crate::model::REGISTER_MODE;
use crate::registers;

fn render_operand(operand: &Operand) -> String {
    match operand {
        Operand::Mode(mode) if mode.name() == REGISTER_MODE => {
            match mode.int_argument(0, "i").and_then(|i| u32::try_from(i).ok()) {
                Some(index) => registers::alias(index)
                    .map_or_else(|| format!("${index}"), |alias| format!("${alias}")),
                None => mode.to_string(),
            }
        }
        Operand::Mode(mode) => mode.to_string(),
        Operand::Int(value) if (0..10).contains(value) || *value < 0 => value.to_string(),
        Operand::Int(value) => format!("0x{value:x}"),
        Operand::Str(text) => text.clone(),
        Operand::Label(label) => label.reference.to_string(),
    }
}

/// Renders one call in assembly syntax, e.g. `ori $t0, $zero, 0x1234`.
#[must_use]
pub fn render_call(call: &ConcreteCall) -> String {
    let Some(entry) = isa::lookup(call.name()) else {
        return call.to_string();
    };
    let parameters = entry.format.parameters();
    let operands: Vec<String> = parameters
        .iter()
        .enumerate()
        .map(|(position, name)| {
            call.arguments()
                .get(position, name)
                .map_or_else(String::new, render_operand)
        })
        .collect();
    match (entry.format, operands.as_slice()) {
        (Format::NoOperands, _) => entry.name.to_owned(),
        (Format::Memory, [rt, offset, base]) => format!("{:<6} {rt}, {offset}({base})", entry.name),
        _ => format!("{:<6} {}", entry.name, operands.join(", ")),
    }
}

fn render_label(out: &mut String, label: &LabelDef) {
    let _ = writeln!(out, "{label}:");
}

/// Renders a sequence as a commented listing block.
#[must_use]
pub fn render_sequence(index: usize, sequence: &Sequence) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# sequence {index}");
    for (position, call) in sequence.calls().iter().enumerate() {
        for label in sequence.labels_at(position) {
            render_label(&mut out, label);
        }
        let _ = writeln!(out, "    {}", render_call(call));
    }
    for label in sequence.labels_at(sequence.len()) {
        render_label(&mut out, label);
    }
    out
}

/// Sink that writes each sequence as an assembly listing.
///
/// The sink interface cannot fail, so the first I/O error is kept and
/// reported by [`ListingPrinter::finish`]; later sequences are dropped.
#[derive(Debug)]
pub struct ListingPrinter<W: Write> {
    out: W,
    written: usize,
    failure: Option<io::Error>,
}

impl<W: Write> ListingPrinter<W> {
    /// Printer writing to `out`.
    pub const fn new(out: W) -> Self {
        Self {
            out,
            written: 0,
            failure: None,
        }
    }

    /// Sequences written so far.
    #[must_use]
    pub const fn written(&self) -> usize {
        self.written
    }

    /// Flushes the writer and returns it.
    ///
    /// # Errors
    ///
    /// Returns the first write error seen by the sink, or the flush error.
    pub fn finish(mut self) -> Result<W, FrontEndError> {
        if let Some(error) = self.failure.take() {
            return Err(error.into());
        }
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> SequenceSink for ListingPrinter<W> {
    fn accept_sequence(&mut self, sequence: Sequence) {
        if self.failure.is_some() {
            return;
        }
        let separator = if self.written == 0 { "" } else { "\n" };
        let text = render_sequence(self.written, &sequence);
        match write!(self.out, "{separator}{text}") {
            Ok(()) => self.written += 1,
            Err(error) => {
                tracing::warn!(%error, "listing write failed");
                self.failure = Some(error);
            }
        }
    }
}
