//! Vector file readers and writers: whitespace text format and binary `.fvecs`/`.ivecs`.
//!
//! Grounded on the original `load_text_file`/`load_vecs` routines: text files start
//! with an `n d` header, binary files are a stream of `[dim:i32][dim x T]` rows whose
//! total size must exactly match `n * (4 + dim * sizeof(T))`.
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Read a text vector file: first line `n d`, followed by `n*d` whitespace-separated floats.
pub fn read_text<P: AsRef<Path>>(path: P) -> Result<Matrix> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut header = String::new();
    reader.read_line(&mut header)?;
    let mut parts = header.split_whitespace();
    let (n, d) = parse_header(path, &mut parts)?;

    let mut rest = String::new();
    reader.read_to_string(&mut rest)?;
    let values: Result<Vec<f32>> = rest
        .split_whitespace()
        .map(|tok| {
            tok.parse::<f32>().map_err(|_| Error::MalformedInput {
                file: path.display().to_string(),
                reason: format!("could not parse float token {:?}", tok),
            })
        })
        .collect();
    let values = values?;
    if values.len() != n * d {
        return Err(Error::MalformedInput {
            file: path.display().to_string(),
            reason: format!("header declared {} x {} but found {} values", n, d, values.len()),
        });
    }
    Matrix::from_vec(d, values)
}

fn parse_header(path: &Path, parts: &mut std::str::SplitWhitespace<'_>) -> Result<(usize, usize)> {
    let malformed = || Error::MalformedInput {
        file: path.display().to_string(),
        reason: "missing 'n d' header".to_string(),
    };
    let n: usize = parts.next().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;
    let d: usize = parts.next().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;
    Ok((n, d))
}

/// Write a text vector file in the `read_text` format.
pub fn write_text<P: AsRef<Path>>(path: P, matrix: &Matrix) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{} {}", matrix.rows(), matrix.cols())?;
    for i in 0..matrix.rows() {
        let row = matrix.row_slice(i);
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", line.join(" "))?;
    }
    Ok(())
}

/// Read a binary `.fvecs` file: rows of `[dim:i32 LE][dim x f32]`.
pub fn read_fvecs<P: AsRef<Path>>(path: P) -> Result<Matrix> {
    let path = path.as_ref();
    let raw = std::fs::read(path)?;
    let dim = read_row_dim(path, &raw)?;
    let row_size = 4 + dim * 4;
    let n = validate_file_size(path, raw.len(), row_size)?;

    let mut data = Vec::with_capacity(n * dim);
    for i in 0..n {
        let row_start = i * row_size;
        let row_dim = i32::from_le_bytes(raw[row_start..row_start + 4].try_into().unwrap()) as usize;
        if row_dim != dim {
            return Err(Error::MalformedInput {
                file: path.display().to_string(),
                reason: format!("row {} declares dim {}, expected {}", i, row_dim, dim),
            });
        }
        let body = &raw[row_start + 4..row_start + row_size];
        for chunk in body.chunks_exact(4) {
            data.push(f32::from_le_bytes(chunk.try_into().unwrap()));
        }
    }
    Matrix::from_vec(dim, data)
}

/// Write a binary `.fvecs` file readable by [`read_fvecs`].
pub fn write_fvecs<P: AsRef<Path>>(path: P, matrix: &Matrix) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let dim = matrix.cols() as i32;
    for i in 0..matrix.rows() {
        writer.write_all(&dim.to_le_bytes())?;
        for &v in matrix.row_slice(i) {
            writer.write_all(&v.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Read a binary `.ivecs` file: rows of `[dim:i32 LE][dim x i32]`, returned as `i64`
/// labels (e.g. ground-truth neighbor ids for the benchmark driver).
pub fn read_ivecs<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<i64>>> {
    let path = path.as_ref();
    let raw = std::fs::read(path)?;
    let dim = read_row_dim(path, &raw)?;
    let row_size = 4 + dim * 4;
    let n = validate_file_size(path, raw.len(), row_size)?;

    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let row_start = i * row_size;
        let row_dim = i32::from_le_bytes(raw[row_start..row_start + 4].try_into().unwrap()) as usize;
        if row_dim != dim {
            return Err(Error::MalformedInput {
                file: path.display().to_string(),
                reason: format!("row {} declares dim {}, expected {}", i, row_dim, dim),
            });
        }
        let body = &raw[row_start + 4..row_start + row_size];
        let row: Vec<i64> = body
            .chunks_exact(4)
            .map(|chunk| i32::from_le_bytes(chunk.try_into().unwrap()) as i64)
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn read_row_dim(path: &Path, raw: &[u8]) -> Result<usize> {
    if raw.len() < 4 {
        return Err(Error::MalformedInput {
            file: path.display().to_string(),
            reason: "file too short to contain a row header".to_string(),
        });
    }
    Ok(i32::from_le_bytes(raw[0..4].try_into().unwrap()) as usize)
}

fn validate_file_size(path: &Path, file_size: usize, row_size: usize) -> Result<usize> {
    let n = file_size / row_size;
    if file_size != n * row_size {
        return Err(Error::MalformedInput {
            file: path.display().to_string(),
            reason: format!("file size {} is not a multiple of row size {}", file_size, row_size),
        });
    }
    Ok(n)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::env::temp_dir;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        let mut p = temp_dir();
        p.push(format!("mips_rs_io_test_{}_{}", std::process::id(), name));
        p
    }

    #[test]
    fn test_fvecs_round_trip() {
        let path = scratch_path("round_trip.fvecs");
        let m = Matrix::from_rows(&[vec![1.0, 2.0, 3.0], vec![-1.0, 0.5, 9.0]]).unwrap();
        write_fvecs(&path, &m).unwrap();
        let back = read_fvecs(&path).unwrap();
        assert_eq!(back.rows(), m.rows());
        assert_eq!(back.cols(), m.cols());
        for i in 0..m.rows() {
            assert_eq!(back.row_slice(i), m.row_slice(i));
        }
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_text_round_trip() {
        let path = scratch_path("round_trip.txt");
        let m = Matrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        write_text(&path, &m).unwrap();
        let back = read_text(&path).unwrap();
        assert_eq!(back.row_slice(0), m.row_slice(0));
        assert_eq!(back.row_slice(1), m.row_slice(1));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_fvecs_rejects_truncated_file() {
        let path = scratch_path("truncated.fvecs");
        let m = Matrix::from_rows(&[vec![1.0, 2.0, 3.0]]).unwrap();
        write_fvecs(&path, &m).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.pop();
        std::fs::write(&path, &bytes).unwrap();
        assert!(read_fvecs(&path).is_err());
        std::fs::remove_file(&path).ok();
    }
}
