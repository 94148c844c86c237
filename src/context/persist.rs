//! Context store persistence: EVCX binary, JSON snapshot, CSV export
//!
//! The binary framing is big-endian (`u32` lengths and counts, `u64`
//! timestamps high word first); `f64` payloads are IEEE-754 little-endian.
//! Files failing the magic or version check are rejected as format errors.
use super::{ContextDimension, ContextStats, ContextSystem};
use crate::errors::{EvoError, Result};
use crate::stats::WeightedStats;
use chrono::{DateTime, TimeZone, Utc};
use itertools::Itertools;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"EVCX";
const VERSION: u32 = 1;

impl ContextSystem {
    /// Write the store in the `EVCX` v1 binary format
    pub fn save_binary(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(MAGIC)?;
        write_u32(&mut writer, VERSION)?;
        write_u32(&mut writer, self.dimensions.len() as u32)?;
        write_u32(&mut writer, self.param_count as u32)?;

        for dimension in &self.dimensions {
            write_string(&mut writer, &dimension.name)?;
            write_u32(&mut writer, dimension.values.len() as u32)?;
            for value in &dimension.values {
                write_string(&mut writer, value)?;
            }
        }

        write_u32(&mut writer, self.entries.len() as u32)?;
        // stable key order keeps saves byte-comparable
        for key in self.entries.keys().sorted() {
            let entry = &self.entries[key];
            write_string(&mut writer, &entry.key)?;
            write_u32(&mut writer, entry.params.len() as u32)?;
            write_u32(&mut writer, entry.total_experiences as u32)?;
            write_f64(&mut writer, entry.confidence)?;
            write_f64(&mut writer, entry.avg_fitness)?;
            write_f64(&mut writer, entry.best_fitness)?;
            write_u64(&mut writer, entry.first_update.timestamp().max(0) as u64)?;
            write_u64(&mut writer, entry.last_update.timestamp().max(0) as u64)?;
            for slot in entry.params.slots() {
                write_f64(&mut writer, slot.mean)?;
                write_f64(&mut writer, slot.variance())?;
                write_f64(&mut writer, slot.sum_weights)?;
                write_u32(&mut writer, slot.count as u32)?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Load a store saved by [save_binary](ContextSystem::save_binary)
    pub fn load_binary(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        read_exact(&mut reader, &mut magic)?;
        if &magic != MAGIC {
            return Err(EvoError::Format(format!(
                "bad magic {:?}, expected EVCX",
                magic
            )));
        }
        let version = read_u32(&mut reader)?;
        if version != VERSION {
            return Err(EvoError::Format(format!(
                "unsupported version {}, expected {}",
                version, VERSION
            )));
        }

        let dimension_count = read_u32(&mut reader)? as usize;
        let param_count = read_u32(&mut reader)? as usize;

        let mut dimensions = Vec::with_capacity(dimension_count);
        for _ in 0..dimension_count {
            let name = read_string(&mut reader)?;
            let value_count = read_u32(&mut reader)? as usize;
            let mut values = Vec::with_capacity(value_count);
            for _ in 0..value_count {
                values.push(read_string(&mut reader)?);
            }
            dimensions.push(ContextDimension { name, values });
        }

        let total_contexts = read_u32(&mut reader)? as usize;
        let mut entries = FxHashMap::default();
        for _ in 0..total_contexts {
            let key = read_string(&mut reader)?;
            let entry_param_count = read_u32(&mut reader)? as usize;
            if entry_param_count != param_count {
                return Err(EvoError::Format(format!(
                    "context {:?} has {} params, header says {}",
                    key, entry_param_count, param_count
                )));
            }
            let total_experiences = read_u32(&mut reader)? as u64;
            let confidence = read_f64(&mut reader)?;
            let avg_fitness = read_f64(&mut reader)?;
            let best_fitness = read_f64(&mut reader)?;
            let first_update = read_timestamp(&mut reader)?;
            let last_update = read_timestamp(&mut reader)?;

            let mut entry = ContextStats::new(key.clone(), param_count, first_update);
            for slot in entry.params.slots_mut() {
                let mean = read_f64(&mut reader)?;
                let variance = read_f64(&mut reader)?;
                let sum_weights = read_f64(&mut reader)?;
                let count = read_u32(&mut reader)? as usize;
                *slot = WeightedStats::from_parts(mean, variance, sum_weights, count);
            }
            entry.total_experiences = total_experiences;
            entry.confidence = confidence;
            entry.avg_fitness = avg_fitness;
            entry.best_fitness = best_fitness;
            entry.first_update = first_update;
            entry.last_update = last_update;
            entries.insert(key, entry);
        }

        Ok(Self {
            dimensions,
            param_count,
            entries,
        })
    }

    /// Human-readable JSON snapshot
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Symmetric counterpart of [save_json](ContextSystem::save_json)
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Export every cell as one CSV row:
    /// `context,param_0_mean,param_0_std,...,experiences,confidence,avg_fitness,best_fitness`
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["context".to_string()];
        for index in 0..self.param_count {
            header.push(format!("param_{}_mean", index));
            header.push(format!("param_{}_std", index));
        }
        header.extend(
            ["experiences", "confidence", "avg_fitness", "best_fitness"]
                .iter()
                .map(|s| s.to_string()),
        );
        writer.write_record(&header)?;

        for key in self.entries.keys().sorted() {
            let entry = &self.entries[key];
            let mut record = vec![entry.key.clone()];
            for slot in entry.params.slots() {
                record.push(format!("{:.6}", slot.mean));
                record.push(format!("{:.6}", slot.std()));
            }
            record.push(entry.total_experiences.to_string());
            record.push(format!("{:.4}", entry.confidence));
            record.push(format!("{:.6}", entry.avg_fitness));
            record.push(format!("{:.6}", entry.best_fitness));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|error| {
        if error.kind() == std::io::ErrorKind::UnexpectedEof {
            EvoError::Format("unexpected end of file".to_string())
        } else {
            EvoError::Io(error)
        }
    })
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

fn write_f64<W: Write>(writer: &mut W, value: f64) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    write_u32(writer, value.len() as u32)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

fn read_f64<R: Read>(reader: &mut R) -> Result<f64> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_u32(reader)? as usize;
    let mut buf = vec![0u8; len];
    read_exact(reader, &mut buf)?;
    String::from_utf8(buf)
        .map_err(|_| EvoError::Format("string field is not valid utf-8".to_string()))
}

fn read_timestamp<R: Read>(reader: &mut R) -> Result<DateTime<Utc>> {
    let seconds = read_u64(reader)? as i64;
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| EvoError::Format(format!("timestamp {} out of range", seconds)))
}
