//! 译文后处理
//!
//! 使译文的结尾标点和大小写与原文保持一致。

/// 参与结尾标点对齐的字符
pub const TERMINAL_PUNCTUATION: &[char] = &['!', '?', '.', ',', ';', '。'];

fn is_terminal(c: char) -> bool {
    TERMINAL_PUNCTUATION.contains(&c)
}

/// 至少包含一个有大小写的字符，且全部为小写
fn is_all_lowercase(text: &str) -> bool {
    let mut cased = false;
    for c in text.chars() {
        if c.is_uppercase() {
            return false;
        }
        cased |= c.is_lowercase();
    }
    cased
}

fn is_all_uppercase(text: &str) -> bool {
    let mut cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        cased |= c.is_uppercase();
    }
    cased
}

fn map_first(text: &str, upper: bool) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if upper => first.to_uppercase().chain(chars).collect(),
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 按原文调整译文的结尾标点与大小写
///
/// 1. 两端去空白；原文为空返回空串，译文为空返回原文
/// 2. 原文以标点结尾且与译文结尾不同时，替换为原文的标点；原文无结尾标点时去掉译文的结尾标点
/// 3. 原文全小写/全大写时整体转换译文，否则只对齐首字母
pub fn normalize(source: &str, translated: &str) -> String {
    let source = source.trim();
    let translated = translated.trim();

    if source.is_empty() {
        return String::new();
    }
    if translated.is_empty() {
        return source.to_string();
    }

    let mut output = translated.to_string();
    let source_last = source.chars().last();
    let output_last = output.chars().last();

    match (source_last, output_last) {
        (Some(s), Some(t)) if is_terminal(s) && s != t => {
            if is_terminal(t) {
                output.pop();
            }
            output.push(s);
        }
        (Some(s), Some(t)) if !is_terminal(s) && is_terminal(t) => {
            output.pop();
        }
        _ => {}
    }

    // 译文只有一个标点时，去掉后没有内容可用
    if output.trim().is_empty() {
        return source.to_string();
    }

    if is_all_lowercase(source) {
        output.to_lowercase()
    } else if is_all_uppercase(source) {
        output.to_uppercase()
    } else {
        match source.chars().next() {
            Some(first) if first.is_lowercase() => map_first(&output, false),
            Some(first) if first.is_uppercase() => map_first(&output, true),
            _ => output,
        }
    }
}
