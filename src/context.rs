//! Context window assembly and confidence scoring.

use crate::{
    config::ConfidenceConfig,
    search::RankedResult,
    text_util::{ELLIPSIS, char_len, take_chars},
};

/// The text handed to the generator and the results that went into it.
#[derive(Debug, Clone, Default)]
pub struct ContextWindow<'a> {
    pub text: String,
    /// Results included in `text`, in ranked order.
    pub used: Vec<&'a RankedResult>,
}

impl ContextWindow<'_> {
    /// Sources of the included results, in order.
    pub fn sources(&self) -> Vec<String> {
        self.used
            .iter()
            .map(|r| r.result.record.chunk.source.clone())
            .collect()
    }
}

fn header(result: &RankedResult) -> String {
    let chunk = &result.result.record.chunk;
    format!("[{} - {}]\n", chunk.source, chunk.section)
}

/// Cut an over-long first block down to about `max_chars` characters.
fn truncate_block(result: &RankedResult, max_chars: usize) -> String {
    let header = header(result);
    let header_len = char_len(&header);
    if header_len < max_chars {
        let content = take_chars(
            &result.result.record.chunk.content,
            max_chars - header_len - 1,
        );
        format!("{header}{content}{ELLIPSIS}\n")
    } else {
        let block = format!("{header}{}\n", result.result.record.chunk.content);
        format!("{}{ELLIPSIS}", take_chars(&block, max_chars))
    }
}

/// Concatenate `[source - section]\ncontent\n` blocks in ranked order while
/// they fit in `max_chars` characters.
///
/// A first block that does not fit on its own is truncated and marked with
/// an ellipsis, so the window is never empty when there are results and
/// never longer than `max_chars` plus the ellipsis.
pub fn build_context(
    results: &[RankedResult],
    max_chars: usize,
) -> ContextWindow<'_> {
    let mut window = ContextWindow::default();
    let mut len = 0;

    for result in results {
        let block = format!(
            "{}{}\n",
            header(result),
            result.result.record.chunk.content
        );
        let block_len = char_len(&block);
        if len + block_len > max_chars {
            if window.used.is_empty() {
                window.text = truncate_block(result, max_chars);
                window.used.push(result);
            }
            break;
        }
        window.text.push_str(&block);
        len += block_len;
        window.used.push(result);
    }
    window
}

/// `avg(similarity) + count_weight * min(n / count_saturation, 1)
/// + diversity_weight * min(distinct_sources / source_saturation, 1)`,
/// clamped to `[0, 1]` and rounded to two decimals. Returns the configured
/// floor when `used` is empty.
pub fn confidence(used: &[&RankedResult], config: &ConfidenceConfig) -> f32 {
    if used.is_empty() {
        return config.empty_floor;
    }
    let n = used.len() as f32;
    let average =
        used.iter().map(|r| r.result.similarity).sum::<f32>() / n;

    let mut sources: Vec<&str> = used
        .iter()
        .map(|r| r.result.record.chunk.source.as_str())
        .collect();
    sources.sort_unstable();
    sources.dedup();

    let saturation = |count: f32, at: usize| (count / at.max(1) as f32).min(1.0);
    let raw = average
        + config.count_weight * saturation(n, config.count_saturation)
        + config.diversity_weight
            * saturation(sources.len() as f32, config.source_saturation);
    (raw.clamp(0.0, 1.0) * 100.0).round() / 100.0
}
