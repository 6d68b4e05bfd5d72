use crate::element::Fixed;

/// Rolling storage for the most recent `kernel_height - 1` input rows.
///
/// Together with the row currently arriving on the input stream, the buffer
/// holds exactly the rows covered by the sliding window, so the input never
/// has to be reread. The buffer is created zero-filled at the start of each
/// pass and fully primed from the stream before the first output is computed.
#[derive(Debug)]
pub(crate) struct LineBuffer {
    rows: Vec<Vec<Fixed>>,
}

impl LineBuffer {
    /// Zero-filled buffer of `rows` rows by `width` columns.
    pub(crate) fn new(rows: usize, width: usize) -> Self {
        Self {
            rows: vec![vec![Fixed::ZERO; width]; rows],
        }
    }

    /// Buffered row `index`, oldest first.
    pub(crate) fn row(&self, index: usize) -> &[Fixed] {
        &self.rows[index]
    }

    /// Advances the horizon by one input row: row `k` takes the contents of
    /// row `k + 1` and `incoming` becomes the bottom row.
    pub(crate) fn shift(&mut self, incoming: Vec<Fixed>) {
        // A single-row kernel keeps no history.
        let Some(last) = self.rows.len().checked_sub(1) else {
            return;
        };
        debug_assert_eq!(incoming.len(), self.rows[last].len());

        self.rows.rotate_left(1);
        self.rows[last] = incoming;
    }
}
