pub mod pdf;

use tracing::info;

use crate::models::chunk::Chunk;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const PAGE_MARKER_PREFIX: &str = "[Page ";

/// Text chunking: greedy paragraph packing with character overlap, then a
/// sentence-level re-split for anything still longer than `chunk_size`.
///
/// All lengths are counted in characters. A chunk only exceeds `chunk_size`
/// when it is a single sentence that is already longer than that.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![];
    }

    let mut paragraph_chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split(PARAGRAPH_SEPARATOR) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if current.is_empty() {
            current.push_str(paragraph);
        } else if char_len(&current) + PARAGRAPH_SEPARATOR.len() + char_len(paragraph) > chunk_size
        {
            let overlap = tail_chars(&current, chunk_overlap).to_string();
            paragraph_chunks.push(current.trim().to_string());

            current = if overlap.is_empty() {
                paragraph.to_string()
            } else {
                format!("{overlap}{PARAGRAPH_SEPARATOR}{paragraph}")
            };
        } else {
            current.push_str(PARAGRAPH_SEPARATOR);
            current.push_str(paragraph);
        }
    }

    let last = current.trim();
    if !last.is_empty() {
        paragraph_chunks.push(last.to_string());
    }

    let mut chunks = Vec::with_capacity(paragraph_chunks.len());
    for chunk in paragraph_chunks {
        if char_len(&chunk) <= chunk_size {
            chunks.push(chunk);
        } else {
            chunks.extend(merge_sentences(&chunk, chunk_size));
        }
    }
    chunks
}

/// Split on `.`, `!` or `?` followed by whitespace. The punctuation stays
/// with its sentence; the whitespace run is dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = i + c.len_utf8();
        let mut resume = end;
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                break;
            }
            resume = j + w.len_utf8();
            chars.next();
        }
        if resume > end {
            push_trimmed(&mut sentences, &text[start..end]);
            start = resume;
        }
    }
    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

/// Chunk extracted document text and attach a `page` label to every chunk.
///
/// Labels come from the `[Page N]` markers inside each chunk. A chunk with
/// no marker continues the last page seen in the previous chunk.
pub fn chunk_document(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let mut last_page: Option<u32> = None;

    let chunks: Vec<Chunk> = split_text(text, chunk_size, chunk_overlap)
        .into_iter()
        .map(|content| {
            let pages = page_markers(&content);
            let label = match (pages.first(), pages.last()) {
                (Some(&first), Some(&last)) => {
                    let start = if content.starts_with(PAGE_MARKER_PREFIX) {
                        first
                    } else {
                        last_page.map_or(first, |p| p.min(first))
                    };
                    last_page = Some(last);
                    Some(page_label(start, last))
                }
                _ => last_page.map(|p| page_label(p, p)),
            };

            let mut chunk = Chunk::new(content);
            if let Some(label) = label {
                chunk
                    .metadata
                    .insert("page".to_string(), serde_json::json!(label));
            }
            chunk
        })
        .collect();

    info!("Created {} chunks from text", chunks.len());
    chunks
}

fn merge_sentences(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        if current.is_empty() {
            current.push_str(sentence);
        } else if char_len(&current) + 1 + char_len(sentence) > chunk_size {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
        } else {
            current.push(' ');
            current.push_str(sentence);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Page numbers of every well-formed `[Page N]` marker, in order.
fn page_markers(text: &str) -> Vec<u32> {
    text.match_indices(PAGE_MARKER_PREFIX)
        .filter_map(|(i, _)| {
            let rest = &text[i + PAGE_MARKER_PREFIX.len()..];
            let (digits, _) = rest.split_once(']')?;
            digits.parse().ok()
        })
        .collect()
}

fn page_label(first: u32, last: u32) -> String {
    if first == last {
        format!("Page {first}")
    } else {
        format!("Pages {first}-{last}")
    }
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, segment: &'a str) {
    let segment = segment.trim();
    if !segment.is_empty() {
        out.push(segment);
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The last `n` characters of `text` (all of it when shorter).
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((i, _)) => &text[i..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(tag: char, len: usize) -> String {
        std::iter::repeat(tag).take(len).collect()
    }

    #[test]
    fn test_split_empty() {
        assert!(split_text("", 1000, 200).is_empty());
        assert!(split_text("   \n\n \t\n", 1000, 200).is_empty());
    }

    #[test]
    fn test_split_small_text() {
        let chunks = split_text("  hello world  ", 1000, 200);
        assert_eq!(chunks, vec!["hello world"]);
    }

    #[test]
    fn test_paragraphs_are_packed_together() {
        let text = "First paragraph.\n\nSecond paragraph.\n\n\n\nThird paragraph.";
        let chunks = split_text(text, 1000, 200);
        assert_eq!(
            chunks,
            vec!["First paragraph.\n\nSecond paragraph.\n\nThird paragraph."]
        );
    }

    #[test]
    fn test_flush_seeds_overlap() {
        let a = paragraph('a', 60);
        let b = paragraph('b', 60);
        let text = format!("{a}\n\n{b}");
        let chunks = split_text(&text, 100, 10);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], a);
        assert_eq!(chunks[1], format!("{}\n\n{b}", paragraph('a', 10)));
    }

    #[test]
    fn test_overlap_matches_next_chunk_prefix() {
        let text = (0..12)
            .map(|i| format!("Paragraph {i} talks about topic {i} in some detail"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let overlap = 20;
        let chunks = split_text(&text, 120, overlap);
        assert!(chunks.len() > 2);

        for pair in chunks.windows(2) {
            let tail = tail_chars(&pair[0], overlap);
            assert!(
                pair[1].starts_with(tail.trim_start()),
                "chunk {:?} does not start with overlap {:?}",
                pair[1],
                tail
            );
        }
    }

    #[test]
    fn test_zero_overlap_starts_fresh() {
        let a = paragraph('a', 60);
        let b = paragraph('b', 60);
        let chunks = split_text(&format!("{a}\n\n{b}"), 100, 0);
        assert_eq!(chunks, vec![a, b]);
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let sentence = "The model attends to every token in the sequence.";
        let long_paragraph = vec![sentence; 40].join(" ");
        let text = format!("Intro.\n\n{long_paragraph}\n\nOutro paragraph here.");
        let chunks = split_text(&text, 300, 50);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 300, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_long_paragraph_falls_to_sentences() {
        let text = "One short sentence. Two short sentence! Three short sentence? Four.";
        let chunks = split_text(text, 40, 0);
        assert_eq!(
            chunks,
            vec![
                "One short sentence. Two short sentence!",
                "Three short sentence? Four.",
            ]
        );
    }

    #[test]
    fn test_oversized_sentence_is_kept_whole() {
        let giant = format!("{}.", paragraph('x', 250));
        let text = format!("Short one. {giant} Short two.");
        let chunks = split_text(&text, 100, 20);

        assert!(chunks.contains(&giant));
        let oversized: Vec<_> = chunks.iter().filter(|c| c.chars().count() > 100).collect();
        assert_eq!(oversized, vec![&giant]);
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let a = "é".repeat(80);
        let b = "ü".repeat(80);
        let chunks = split_text(&format!("{a}\n\n{b}"), 100, 15);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].starts_with(&"é".repeat(15)));
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("Hello there.  How are you?\nFine!Thanks. ok");
        assert_eq!(
            sentences,
            vec!["Hello there.", "How are you?", "Fine!Thanks.", "ok"]
        );
    }

    #[test]
    fn test_split_sentences_trailing_punctuation() {
        assert_eq!(split_sentences("Only one."), vec!["Only one."]);
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 5), "ab");
        assert_eq!(tail_chars("abc", 0), "");
        assert_eq!(tail_chars("añb", 2), "ñb");
    }

    #[test]
    fn test_page_markers() {
        assert_eq!(page_markers("[Page 1]\nfoo [Page 12]\nbar"), vec![1, 12]);
        assert!(page_markers("ge 3]\nno full marker").is_empty());
        assert!(page_markers("[Page x]").is_empty());
    }

    #[test]
    fn test_chunk_document_labels_pages() {
        let page_one = format!("[Page 1]\n{}", paragraph('a', 80));
        let page_two = format!("[Page 2]\n{}", paragraph('b', 80));
        let continuation = paragraph('c', 80);
        let text = format!("{page_one}\n\n{page_two}\n\n{continuation}");

        let chunks = chunk_document(&text, 100, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].metadata["page"], "Page 1");
        assert_eq!(chunks[1].metadata["page"], "Page 2");
        assert_eq!(chunks[2].metadata["page"], "Page 2");
    }

    #[test]
    fn test_chunk_document_page_range() {
        let text = "[Page 1]\nIntro text.\n\n[Page 2]\nMore text.";
        let chunks = chunk_document(text, 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata["page"], "Pages 1-2");
    }

    #[test]
    fn test_chunk_document_without_markers() {
        let chunks = chunk_document("plain text without markers", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].metadata.get("page").is_none());
    }
}
