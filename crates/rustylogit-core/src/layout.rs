// =============================================================================
// Flat State Layout
// =============================================================================
//
// A transition state crosses process and language boundaries as a single
// array of f64. Scalars, vectors and the information matrix sit back to back
// at offsets that depend only on the width w:
//
//     CG:   [iteration, width, coef(w), dir(w), grad(w), beta,
//            rowCount, gradAccum(w), infoMatrix(w·w), logLikelihood]
//
//     IRLS: [width, coef(w), rowCount, rhsAccum(w), infoMatrix(w·w),
//            logLikelihood]
//
// Inside the crate the states are plain structs with owned ndarray fields.
// `FlatWriter` and `FlatReader` are the only places that know about offsets:
// a state writes (or reads) its fields in layout order and the cursor keeps
// track of where it is. The matrix is stored row-major.
//
// =============================================================================

use ndarray::{Array1, Array2};

use crate::error::{Result, RustyLogitError};

/// Widths above this are rejected when decoding; w² must fit in memory.
pub const MAX_WIDTH: usize = u16::MAX as usize;

/// Sequential writer producing a flat state buffer.
#[derive(Debug)]
pub(crate) struct FlatWriter {
    buf: Vec<f64>,
}

impl FlatWriter {
    pub(crate) fn with_capacity(len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(len),
        }
    }

    pub(crate) fn scalar(&mut self, value: f64) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub(crate) fn vector(&mut self, v: &Array1<f64>) -> &mut Self {
        self.buf.extend(v.iter().copied());
        self
    }

    /// Row-major, regardless of the array's memory order.
    pub(crate) fn matrix(&mut self, m: &Array2<f64>) -> &mut Self {
        self.buf.extend(m.rows().into_iter().flat_map(|row| row.to_vec()));
        self
    }

    pub(crate) fn finish(self) -> Vec<f64> {
        self.buf
    }
}

/// Sequential reader over a flat state buffer.
///
/// Every read is bounds-checked, so a truncated buffer is an error rather
/// than a panic.
#[derive(Debug)]
pub(crate) struct FlatReader<'a> {
    buf: &'a [f64],
    pos: usize,
}

impl<'a> FlatReader<'a> {
    pub(crate) fn new(buf: &'a [f64]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [f64]> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(RustyLogitError::InvalidLayout(format!(
                "buffer of length {} ends before {} (needs {} values at offset {})",
                self.buf.len(),
                what,
                n,
                self.pos
            )));
        }
        let buf: &'a [f64] = self.buf;
        let slice = &buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn scalar(&mut self, what: &str) -> Result<f64> {
        Ok(self.take(1, what)?[0])
    }

    /// A slot that must hold a non-negative integer (width, counters).
    pub(crate) fn count(&mut self, what: &str) -> Result<u64> {
        let value = self.scalar(what)?;
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u64::MAX as f64 {
            return Err(RustyLogitError::InvalidLayout(format!(
                "{} must be a non-negative integer, got {}",
                what, value
            )));
        }
        Ok(value as u64)
    }

    /// The width slot, checked against `MAX_WIDTH`.
    pub(crate) fn width(&mut self) -> Result<usize> {
        let width = self.count("width")?;
        if width > MAX_WIDTH as u64 {
            return Err(RustyLogitError::InvalidLayout(format!(
                "width {} exceeds the maximum of {}",
                width, MAX_WIDTH
            )));
        }
        Ok(width as usize)
    }

    pub(crate) fn vector(&mut self, n: usize, what: &str) -> Result<Array1<f64>> {
        Ok(Array1::from(self.take(n, what)?.to_vec()))
    }

    pub(crate) fn matrix(&mut self, n: usize, what: &str) -> Result<Array2<f64>> {
        let values = self.take(n * n, what)?.to_vec();
        Array2::from_shape_vec((n, n), values)
            .map_err(|e| RustyLogitError::InvalidLayout(format!("{}: {}", what, e)))
    }

    /// Fail if anything is left over.
    pub(crate) fn finish(self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(RustyLogitError::InvalidLayout(format!(
                "buffer has {} trailing values after offset {}",
                self.buf.len() - self.pos,
                self.pos
            )));
        }
        Ok(())
    }
}

/// Check a buffer's total length against the length implied by its width.
pub(crate) fn expect_len(buf: &[f64], expected: usize, width: usize) -> Result<()> {
    if buf.len() != expected {
        return Err(RustyLogitError::InvalidLayout(format!(
            "width {} implies {} values, buffer has {}",
            width,
            expected,
            buf.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_writer_matrix_is_row_major() {
        let m = array![[1.0, 2.0], [3.0, 4.0]];
        let mut w = FlatWriter::with_capacity(4);
        w.matrix(&m.t().to_owned());
        assert_eq!(w.finish(), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_reader_rejects_truncated_buffer() {
        let buf = [1.0, 2.0];
        let mut r = FlatReader::new(&buf);
        assert!(r.vector(3, "coef").is_err());
    }

    #[test]
    fn test_reader_count_validation() {
        let buf = [2.5, -1.0, f64::NAN, 3.0];
        let mut r = FlatReader::new(&buf);
        assert!(r.count("a").is_err());
        assert!(r.count("b").is_err());
        assert!(r.count("c").is_err());
        assert_eq!(r.count("d").unwrap(), 3);
        assert!(r.finish().is_ok());
    }

    #[test]
    fn test_reader_trailing_values() {
        let buf = [1.0, 2.0];
        let mut r = FlatReader::new(&buf);
        r.scalar("x").unwrap();
        assert!(r.finish().is_err());
    }
}
