use std::collections::BTreeMap;

use super::text::needs_space;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct PixelBox {
    pub(super) x: u32,
    pub(super) y: u32,
    pub(super) w: u32,
    pub(super) h: u32,
}

impl PixelBox {
    fn union(&self, other: &PixelBox) -> PixelBox {
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = (self.x + self.w).max(other.x + other.w);
        let y2 = (self.y + self.h).max(other.y + other.h);
        PixelBox {
            x: x1,
            y: y1,
            w: x2 - x1,
            h: y2 - y1,
        }
    }
}

/// A text line assembled from tesseract words. `conf` stays on tesseract's 0-100 scale.
#[derive(Debug, Clone)]
pub(super) struct TsvLine {
    pub(super) text: String,
    pub(super) bbox: PixelBox,
    pub(super) conf: f32,
}

#[derive(Clone)]
struct WordToken {
    text: String,
    bbox: PixelBox,
    conf: f32,
    len: usize,
}

pub(super) fn parse_tsv_lines(tsv: &str) -> Vec<TsvLine> {
    // BTreeMap keeps tesseract's block/paragraph/line order stable.
    let mut word_map: BTreeMap<(i32, i32, i32, i32), Vec<WordToken>> = BTreeMap::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let page_num: i32 = cols[1].parse().unwrap_or(0);
        let block_num: i32 = cols[2].parse().unwrap_or(0);
        let par_num: i32 = cols[3].parse().unwrap_or(0);
        let line_num: i32 = cols[4].parse().unwrap_or(0);
        let left: u32 = cols[6].parse().unwrap_or(0);
        let top: u32 = cols[7].parse().unwrap_or(0);
        let width: u32 = cols[8].parse().unwrap_or(0);
        let height: u32 = cols[9].parse().unwrap_or(0);
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 || width == 0 || height == 0 {
            continue;
        }

        let key = (page_num, block_num, par_num, line_num);
        word_map.entry(key).or_default().push(WordToken {
            text: text.to_string(),
            bbox: PixelBox {
                x: left,
                y: top,
                w: width,
                h: height,
            },
            conf,
            len: text.chars().count().max(1),
        });
    }

    let mut lines = Vec::new();
    for (_, mut words) in word_map {
        words.sort_by_key(|word| word.bbox.x);
        for segment in split_word_segments(words) {
            if let Some(line) = build_line(&segment) {
                lines.push(line);
            }
        }
    }
    lines
}

fn split_word_segments(words: Vec<WordToken>) -> Vec<Vec<WordToken>> {
    if words.len() <= 1 {
        return if words.is_empty() { Vec::new() } else { vec![words] };
    }

    let mut heights = words.iter().map(|word| word.bbox.h).collect::<Vec<_>>();
    heights.sort_unstable();
    let median_h = heights[heights.len() / 2].max(1) as f32;
    let gap_threshold = (median_h * 2.5).clamp(12.0, 120.0);

    let mut segments: Vec<Vec<WordToken>> = Vec::new();
    let mut current: Vec<WordToken> = Vec::new();
    let mut last_right = 0u32;
    for word in words {
        let right = word.bbox.x + word.bbox.w;
        if !current.is_empty() && word.bbox.x.saturating_sub(last_right) as f32 > gap_threshold {
            segments.push(std::mem::take(&mut current));
            last_right = right;
        } else {
            last_right = last_right.max(right);
        }
        current.push(word);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

fn build_line(words: &[WordToken]) -> Option<TsvLine> {
    let mut text = String::new();
    let mut last_token = "";
    for word in words {
        if !text.is_empty() && needs_space(last_token, &word.text) {
            text.push(' ');
        }
        text.push_str(&word.text);
        last_token = &word.text;
    }
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let bbox = words
        .iter()
        .map(|word| word.bbox)
        .reduce(|acc, next| acc.union(&next))?;
    let (conf_sum, len_sum) = words.iter().fold((0.0, 0.0), |(conf, len), word| {
        let weight = word.len as f32;
        (conf + word.conf * weight, len + weight)
    });
    let conf = if len_sum > 0.0 { conf_sum / len_sum } else { 0.0 };

    Some(TsvLine {
        text: text.to_string(),
        bbox,
        conf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn row(line: i32, left: u32, top: u32, w: u32, h: u32, conf: f32, text: &str) -> String {
        format!("5\t1\t1\t1\t{line}\t1\t{left}\t{top}\t{w}\t{h}\t{conf}\t{text}")
    }

    #[test]
    fn words_on_one_line_are_joined_with_weighted_confidence() {
        let tsv = [
            HEADER.to_string(),
            "4\t1\t1\t1\t1\t0\t10\t10\t200\t30\t-1\t".to_string(),
            row(1, 10, 10, 50, 30, 90.0, "HELLO"),
            row(1, 70, 12, 60, 28, 60.0, "WORLD"),
        ]
        .join("\n");
        let lines = parse_tsv_lines(&tsv);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "HELLO WORLD");
        assert_eq!(
            lines[0].bbox,
            PixelBox {
                x: 10,
                y: 10,
                w: 120,
                h: 30
            }
        );
        assert!((lines[0].conf - 75.0).abs() < 1e-3);
    }

    #[test]
    fn wide_gaps_split_a_line() {
        let tsv = [
            HEADER.to_string(),
            row(1, 0, 0, 40, 20, 80.0, "TOP"),
            row(1, 400, 0, 40, 20, 80.0, "RIGHT"),
        ]
        .join("\n");
        let lines = parse_tsv_lines(&tsv);
        let texts = lines.iter().map(|line| line.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["TOP", "RIGHT"]);
    }

    #[test]
    fn blank_and_negative_confidence_rows_are_skipped() {
        let tsv = [
            HEADER.to_string(),
            row(1, 0, 0, 40, 20, -1.0, "ghost"),
            row(2, 0, 30, 40, 20, 70.0, "   "),
            "garbage row".to_string(),
        ]
        .join("\n");
        assert!(parse_tsv_lines(&tsv).is_empty());
    }
}
