pub const N_LINES_PER_CHUNK: usize = 500;

const TERMINATORS: [char; 5] = ['。', '！', '？', '!', '?'];
const CLOSERS: [char; 6] = ['」', '』', '）', ')', '】', '"'];

/// Groups the lines of `doc` into chunks of at most `n_lines_per_chunk` lines.
pub fn chunkify_on_linebreaks(doc: &str, n_lines_per_chunk: usize) -> Vec<String> {
    let lines: Vec<&str> = doc.split_inclusive('\n').collect();
    lines.chunks(n_lines_per_chunk.max(1)).map(|chunk| chunk.concat()).collect()
}

fn split_sentences(text: &str, out: &mut Vec<String>) {
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' || c == '\r' {
            push_trimmed(&mut current, out);
            continue;
        }
        current.push(c);
        if TERMINATORS.contains(&c) {
            // Repeated marks and closing quotes stay with the sentence
            while let Some(&next) = chars.peek() {
                if TERMINATORS.contains(&next) || CLOSERS.contains(&next) {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            push_trimmed(&mut current, out);
        }
    }
    push_trimmed(&mut current, out);
}

fn push_trimmed(current: &mut String, out: &mut Vec<String>) {
    let sentence = current.trim();
    if !sentence.is_empty() {
        out.push(sentence.to_string());
    }
    current.clear();
}

/// Splits a document into trimmed, non-empty sentences.
///
/// Sentences end at `。！？!?` and at line breaks. When `sep_tok` is given the
/// document is also cut wherever it appears, and the separator itself is dropped.
pub fn sentencize(doc: &str, sep_tok: Option<&str>, n_lines_per_chunk: usize) -> Vec<String> {
    let mut sentences = Vec::new();
    for chunk in chunkify_on_linebreaks(doc, n_lines_per_chunk) {
        match sep_tok.filter(|sep| !sep.is_empty()) {
            Some(sep) => {
                for part in chunk.split(sep) {
                    split_sentences(part, &mut sentences);
                }
            }
            None => split_sentences(&chunk, &mut sentences),
        }
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentencize_on_marks_and_lines() {
        let sentences = sentence_list("食べる。飲む！\n\n歌う？「寝る。」笑う", None);
        assert_eq!(sentences, vec!["食べる。", "飲む！", "歌う？", "「寝る。」", "笑う"]);
    }

    #[test]
    fn test_sentencize_with_separator() {
        let sentences = sentence_list("今日は雨-|-明日は晴れ-|-", Some("-|-"));
        assert_eq!(sentences, vec!["今日は雨", "明日は晴れ"]);
    }

    #[test]
    fn test_chunks_keep_every_line() {
        let doc = "一\n二\n三\n四\n五";
        let chunks = chunkify_on_linebreaks(doc, 2);
        assert_eq!(chunks, vec!["一\n二\n", "三\n四\n", "五"]);
        assert_eq!(chunks.concat(), doc);
    }

    fn sentence_list(doc: &str, sep_tok: Option<&str>) -> Vec<String> {
        sentencize(doc, sep_tok, N_LINES_PER_CHUNK)
    }
}
