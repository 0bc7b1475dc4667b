//! Tabular rendering of benchmark results.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::benchmark::BenchmarkResult;
use crate::error::Result;

/// Column header written by [`write_csv`].
pub const CSV_HEADER: &str = "Algorithm,Metric,Distribution,DatasetSize,Dimensions,\
PreprocessTime(us),MemoryUsage(bytes),AvgQueryTime(us),MinQueryTime(us),MaxQueryTime(us),Recall";

/// Write `results` as CSV, one row per result, preceded by [`CSV_HEADER`].
pub fn write_csv<W: Write>(mut writer: W, results: &[BenchmarkResult]) -> Result<()> {
    writeln!(writer, "{CSV_HEADER}")?;
    for r in results {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{}",
            escape(r.algorithm_name()),
            escape(r.metric_name()),
            escape(r.data_distribution()),
            r.dataset_size(),
            r.dimensions(),
            r.preprocess_time().as_micros(),
            r.memory_usage(),
            r.avg_query_time().as_micros(),
            r.min_query_time().as_micros(),
            r.max_query_time().as_micros(),
            r.recall(),
        )?;
    }
    Ok(())
}

/// Write `results` as CSV to a new file at `path`.
pub fn save_csv(path: impl AsRef<Path>, results: &[BenchmarkResult]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_csv(&mut writer, results)?;
    writer.flush()?;
    Ok(())
}

/// Render `results` as a pretty-printed JSON array.
#[cfg(feature = "serde")]
pub fn to_json(results: &[BenchmarkResult]) -> Result<String> {
    serde_json::to_string_pretty(results)
        .map_err(|e| crate::error::NnError::Serialization(e.to_string()))
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
