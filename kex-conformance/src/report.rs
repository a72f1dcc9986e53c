//! Console rendering of traced handshakes and run summaries.

use crate::driver::HarnessReport;
use crate::runner::Transcript;
use std::io::{self, Write};

const RULE: &str = "================================================================================";

/// `label (  N bytes):  HEX` with the label padded to 20 columns.
pub fn hex_line(label: &str, len: usize, hex: &str) -> String {
	format!("{label:<20} ({len:>4} bytes):  {hex}")
}

pub fn write_transcript(out: &mut impl Write, t: &Transcript) -> io::Result<()> {
	writeln!(out, "{RULE}")?;
	writeln!(out, "Sample computation for key exchange method {}", t.method_name)?;
	writeln!(out, "{RULE}")?;
	for e in &t.entries {
		writeln!(out, "{}", hex_line(e.label, e.len, &e.hex))?;
	}
	if t.matched {
		writeln!(out, "Alice and Bob's session keys match.")?;
	}
	writeln!(out)?;
	writeln!(out)
}

pub fn write_summary(out: &mut impl Write, r: &HarnessReport) -> io::Result<()> {
	writeln!(out, "{RULE}")?;
	writeln!(
		out,
		"Testing correctness and randomness of key exchange method {} (params={}) for {} iterations",
		r.method_name,
		r.params.as_deref().unwrap_or("default"),
		r.iterations
	)?;
	writeln!(out, "{RULE}")?;
	writeln!(out, "All session keys matched.")?;
	writeln!(out, "Statistical distance from uniform: {:12.10}", r.statistical_distance)?;
	if let Some(chi) = r.chi_square {
		writeln!(out, "Chi-square (255 dof) over {} bytes: {:.4}", r.bytes_sampled, chi)?;
	}
	Ok(())
}
