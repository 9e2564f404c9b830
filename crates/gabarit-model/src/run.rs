/// The smallest independently styled text unit within a block.
///
/// Only the properties the fill pipeline acts on are modelled: the raw
/// character content and the strike-through flag. All other run formatting
/// is preserved untouched at the container level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub strike: bool,
}

impl Run {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            strike: false,
        }
    }
}

/// One paragraph or one spreadsheet cell: an ordered sequence of runs with a
/// concatenated-text view.
///
/// The block owns its runs exclusively; mutation happens only through the
/// substitution passes, which either edit individual run texts in place or
/// collapse the whole block onto a single surviving run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub runs: Vec<Run>,
}

impl Block {
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            runs: texts.into_iter().map(|t| Run::new(t)).collect(),
        }
    }

    /// Concatenated text of every run, in order.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.runs.iter().map(|r| r.text.len()).sum());
        for run in &self.runs {
            out.push_str(&run.text);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|r| r.text.is_empty())
    }
}
