use std::io::{BufRead, StdinLock};

use crate::models::Document;

/// Produces the input documents of a pipeline run.
///
/// The sequence is lazy and finite. Calling `documents` again continues from
/// where the previous sequence stopped; consumed input is not replayed.
pub trait DocumentSource {
    fn documents(&mut self) -> Box<dyn Iterator<Item = Document> + '_>;
}

/// Reads documents from a fixed list of texts.
#[derive(Debug, Default, Clone)]
pub struct TextReader {
    texts: Vec<String>,
}

impl TextReader {
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            texts: texts.into_iter().map(Into::into).collect(),
        }
    }
}

impl DocumentSource for TextReader {
    fn documents(&mut self) -> Box<dyn Iterator<Item = Document> + '_> {
        Box::new(std::mem::take(&mut self.texts).into_iter().map(Document::new))
    }
}

/// Reads one document per non-blank line, until end of input.
pub struct LineReader<R> {
    input: R,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl LineReader<StdinLock<'static>> {
    /// Reads questions typed on the terminal.
    pub fn stdin() -> Self {
        Self::new(std::io::stdin().lock())
    }
}

impl<R: BufRead> DocumentSource for LineReader<R> {
    fn documents(&mut self) -> Box<dyn Iterator<Item = Document> + '_> {
        Box::new(
            (&mut self.input)
                .lines()
                .map_while(|line| match line {
                    Ok(line) => Some(line),
                    Err(e) => {
                        tracing::warn!(error = %e, "stopped reading input");
                        None
                    }
                })
                .filter(|line| !line.trim().is_empty())
                .map(|line| Document::new(line.trim())),
        )
    }
}
