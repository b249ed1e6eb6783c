use once_cell::sync::Lazy;
use regex::Regex;

static EMOJI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\p{Emoji_Presentation}|\p{Extended_Pictographic}").expect("emoji regex")
});
static FORMAT_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(?:b|strong|i|em|u|s|del)\s*>").expect("format tag regex"));
static BR_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("br tag regex"));

const NARROW_CHARS: &[char] = &[
    'i', 'l', 't', 'f', 'j', 'I', '1', '!', '|', '.', ',', ':', ';', '\'',
];
const WIDE_CHARS: &[char] = &['w', 'm', '@', '%'];
const VERY_WIDE_CHARS: &[char] = &['W', 'M'];
const SEMI_NARROW_PUNCT: &[char] = &['(', ')', '[', ']', '{', '}', '/', '\\', '-', '"', '`'];

const LINE_HEIGHT_RATIO: f64 = 1.3;
const MIN_PADDING_RATIO: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextSize {
    pub width: f64,
    pub height: f64,
}

/// Measures label text for sizing. Implementations must be deterministic.
pub trait TextMetrics {
    fn measure(&self, label: &str, font_size: f64, font_weight: f64) -> TextSize;
}

/// Character-class width model; no font files are consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTextMetrics;

impl TextMetrics for HeuristicTextMetrics {
    fn measure(&self, label: &str, font_size: f64, font_weight: f64) -> TextSize {
        let lines = label_lines(label);
        let mut width: f64 = 0.0;
        for line in &lines {
            width = width.max(measure_text_width(line, font_size, font_weight));
        }
        TextSize {
            width,
            height: lines.len() as f64 * font_size * LINE_HEIGHT_RATIO,
        }
    }
}

/// Splits a raw label into display lines with formatting tags removed.
pub fn label_lines(label: &str) -> Vec<String> {
    let unquoted = strip_surrounding_quotes(label);
    let with_breaks = BR_TAG_RE.replace_all(unquoted, "\n").replace("\\n", "\n");
    with_breaks
        .split('\n')
        .map(|line| FORMAT_TAG_RE.replace_all(line, "").into_owned())
        .collect()
}

pub fn measure_text_width(text: &str, font_size: f64, font_weight: f64) -> f64 {
    let mut units = 0.0;
    let mut buffer = [0_u8; 4];
    for ch in text.chars() {
        units += char_width(ch, ch.encode_utf8(&mut buffer));
    }
    units * font_size * base_ratio(font_weight) + font_size * MIN_PADDING_RATIO
}

fn strip_surrounding_quotes(input: &str) -> &str {
    if input.len() >= 2 && input.starts_with('"') && input.ends_with('"') {
        &input[1..input.len() - 1]
    } else if input == "\"" {
        ""
    } else {
        input
    }
}

fn base_ratio(font_weight: f64) -> f64 {
    if font_weight >= 600.0 {
        0.60
    } else if font_weight >= 500.0 {
        0.57
    } else {
        0.54
    }
}

fn char_width(ch: char, as_str: &str) -> f64 {
    let code = ch as u32;
    if is_combining_mark(code) {
        return 0.0;
    }
    if is_fullwidth(code) || EMOJI_RE.is_match(as_str) {
        return 2.0;
    }
    if ch == ' ' {
        return 0.3;
    }
    if VERY_WIDE_CHARS.contains(&ch) {
        return 1.5;
    }
    if WIDE_CHARS.contains(&ch) {
        return 1.2;
    }
    if NARROW_CHARS.contains(&ch) {
        return 0.4;
    }
    if SEMI_NARROW_PUNCT.contains(&ch) {
        return 0.5;
    }
    if ch == 'r' {
        return 0.8;
    }
    if ch.is_ascii_uppercase() {
        return 1.2;
    }
    1.0
}

fn is_combining_mark(code: u32) -> bool {
    (0x0300..=0x036f).contains(&code)
        || (0x1ab0..=0x1aff).contains(&code)
        || (0x1dc0..=0x1dff).contains(&code)
        || (0x20d0..=0x20ff).contains(&code)
        || (0xfe20..=0xfe2f).contains(&code)
}

fn is_fullwidth(code: u32) -> bool {
    (0x1100..=0x115f).contains(&code)
        || (0x2e80..=0x2fdf).contains(&code)
        || (0x3000..=0x33ff).contains(&code)
        || (0x3400..=0x4dbf).contains(&code)
        || (0x4e00..=0x9fff).contains(&code)
        || (0xac00..=0xd7af).contains(&code)
        || (0xf900..=0xfaff).contains(&code)
        || (0xff00..=0xff60).contains(&code)
        || (0xffe0..=0xffe6).contains(&code)
        || code >= 0x20000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_grows_with_text_and_weight() {
        let metrics = HeuristicTextMetrics;
        let short = metrics.measure("abc", 13.0, 400.0);
        let long = metrics.measure("abcdef", 13.0, 400.0);
        let bold = metrics.measure("abc", 13.0, 600.0);
        assert!(long.width > short.width);
        assert!(bold.width > short.width);
        assert!((short.height - 13.0 * 1.3).abs() < 1e-9);
    }

    #[test]
    fn character_classes() {
        // "W" is 1.5 units, "i" 0.4, at ratio 0.54 with 10px font plus 1.5px padding.
        assert!((measure_text_width("W", 10.0, 400.0) - (1.5 * 5.4 + 1.5)).abs() < 1e-9);
        assert!((measure_text_width("i", 10.0, 400.0) - (0.4 * 5.4 + 1.5)).abs() < 1e-9);
        assert!((measure_text_width("\u{4e2d}", 10.0, 400.0) - (2.0 * 5.4 + 1.5)).abs() < 1e-9);
        assert_eq!(measure_text_width("", 10.0, 400.0), 1.5);
    }

    #[test]
    fn line_breaks_and_tags() {
        assert_eq!(label_lines("a<br>b<BR/>c"), vec!["a", "b", "c"]);
        assert_eq!(label_lines("\"<b>bold</b> text\""), vec!["bold text"]);
        assert_eq!(label_lines("one\\ntwo"), vec!["one", "two"]);
        let size = HeuristicTextMetrics.measure("x<br>y", 10.0, 400.0);
        assert!((size.height - 26.0).abs() < 1e-9);
    }
}
