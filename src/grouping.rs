use tracing::{debug, info};

use crate::config::GroupingConfig;
use crate::error::Result;
use crate::subtitle::Segment;
use crate::tokenizer::{TokenCounter, TokenizerSpec};

/// Consecutive segments sent to the backend as one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub segments: Vec<Segment>,
    /// Token count including one delimiter per appended segment
    pub tokens: usize,
}

impl Group {
    /// Segments that are sent to the backend
    pub fn translatable(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|segment| segment.is_translatable())
    }

    pub fn translatable_count(&self) -> usize {
        self.translatable().count()
    }

    /// Join the translatable texts with `delimiter`.
    ///
    /// A delimiter inside a cue would split it in two, so it is swapped for a
    /// look-alike that differs from the delimiter.
    pub fn prompt_text(&self, delimiter: char) -> String {
        let stand_in = delimiter_stand_in(delimiter).to_string();
        self.translatable()
            .map(|segment| segment.text.replace(delimiter, &stand_in))
            .collect::<Vec<_>>()
            .join(&delimiter.to_string())
    }
}

fn delimiter_stand_in(delimiter: char) -> char {
    if delimiter == '¦' { '|' } else { '¦' }
}

/// Greedily pack segments into groups of at most `budget` tokens.
///
/// Each segment costs its own tokens plus one for the delimiter that follows
/// it, including the segment that opens a group. That keeps every group with
/// more than one segment within `tokens + delimiters <= budget`. A segment
/// larger than the budget still gets a group of its own.
pub fn group_segments(
    segments: &[Segment],
    budget: usize,
    counter: &dyn TokenCounter,
) -> Result<Vec<Group>> {
    let mut groups = Vec::new();
    let mut current: Vec<Segment> = Vec::new();
    let mut running = 0;

    for segment in segments {
        let tokens = counter.count(&segment.text)?;

        if running + tokens <= budget {
            current.push(segment.clone());
            running += tokens + 1;
        } else {
            if !current.is_empty() {
                groups.push(Group {
                    segments: std::mem::take(&mut current),
                    tokens: running,
                });
            }
            current.push(segment.clone());
            running = tokens + 1;
        }
    }

    if !current.is_empty() {
        groups.push(Group {
            segments: current,
            tokens: running,
        });
    }

    Ok(groups)
}

/// Owns the grouping settings and the tokenizer lifecycle
#[derive(Debug, Clone)]
pub struct Grouper {
    budget: usize,
    tokenizer: TokenizerSpec,
}

impl Grouper {
    pub fn new(budget: usize, tokenizer: TokenizerSpec) -> Self {
        Self { budget, tokenizer }
    }

    pub fn from_config(config: &GroupingConfig) -> Self {
        Self::new(
            config.token_budget,
            TokenizerSpec::from_config(config.tokenizer_file.as_deref()),
        )
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Group `segments`. The tokenizer lives only for this call.
    pub fn group(&self, segments: &[Segment]) -> Result<Vec<Group>> {
        let counter = self.tokenizer.acquire()?;
        let groups = group_segments(segments, self.budget, counter.as_ref())?;
        drop(counter);

        info!(
            "Packed {} segments into {} groups (budget {} tokens)",
            segments.len(),
            groups.len(),
            self.budget
        );
        for (idx, group) in groups.iter().enumerate() {
            debug!("Group {}: {} segments, {} tokens", idx + 1, group.segments.len(), group.tokens);
        }
        Ok(groups)
    }
}
