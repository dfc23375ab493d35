//! Sweep output records and the CSV report writer.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

/// One finished candidate position set with its per-band SPL vector.
#[derive(Debug, Clone, Serialize)]
pub struct SweepRecord {
    /// Unix timestamp of completion, seconds.
    pub timestamp: f64,
    /// Position-set index in input order.
    pub index: usize,
    /// Source cells of this candidate set.
    pub positions: Vec<(usize, usize, usize)>,
    /// Flatness score: sum of squared first differences of the SPL vector.
    pub deviation: f64,
    /// Mean SPL over the test bands.
    pub avg_spl: f64,
    /// Per-band SPL at the listener cells, ascending frequency.
    pub band_spl: Vec<f64>,
}

/// Streaming CSV writer with one row per candidate position set.
pub struct SweepCsvWriter {
    writer: BufWriter<File>,
    dx: f64,
}

impl SweepCsvWriter {
    /// Create the file and write the header row.
    pub fn create(
        path: &Path,
        speakers: usize,
        frequencies: &[f64],
        dx: f64,
    ) -> io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);

        let mut header: Vec<String> = vec!["Time".into(), "Index".into()];
        for i in 0..speakers {
            header.push(format!("W{i} idx"));
            header.push(format!("w{i} (m)"));
            header.push(format!("H{i} idx"));
            header.push(format!("h{i} (m)"));
            header.push(format!("D{i} idx"));
            header.push(format!("d{i} (m)"));
        }
        header.push("Deviation".into());
        header.push("SPL (avg dB)".into());
        header.push("Bands (SPL dB):".into());
        header.extend(frequencies.iter().map(|f| format!("{f:.2}")));
        writeln!(writer, "{}", header.join(","))?;
        writer.flush()?;

        Ok(Self { writer, dx })
    }

    /// Append one record row and flush.
    pub fn write_record(&mut self, record: &SweepRecord) -> io::Result<()> {
        let mut row: Vec<String> =
            vec![format!("{:.3}", record.timestamp), record.index.to_string()];
        for &(w, h, d) in &record.positions {
            for cell in [w, h, d] {
                row.push(cell.to_string());
                row.push(format!("{:.2}", (cell as f64 + 0.5) * self.dx));
            }
        }
        row.push(format!("{:.4}", record.deviation));
        row.push(format!("{:.4}", record.avg_spl));
        row.push(String::new());
        row.extend(record.band_spl.iter().map(|spl| format!("{spl:.2}")));
        writeln!(self.writer, "{}", row.join(","))?;
        self.writer.flush()
    }
}
