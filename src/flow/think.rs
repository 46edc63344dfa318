//! 推理段抽取：把模型输出开头 / 结尾的 <think>...</think>（或 <thinking>）移出正文

use std::sync::OnceLock;

use regex::Regex;

fn leading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*<(think|thinking)>(.*?)</(?:think|thinking)>")
            .expect("valid think regex")
    })
}

fn trailing_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^<(think|thinking)>(.*?)</(?:think|thinking)>\s*$")
            .expect("valid think regex")
    })
}

/// 返回 (去掉推理段后的正文, 推理内容)；没有推理段时正文原样返回、推理内容为 None
///
/// 开头与结尾同时有推理段时两段都移出，推理内容按出现顺序以换行拼接。
pub fn extract_think(text: &str) -> (String, Option<String>) {
    let mut rest = text;
    let mut thoughts = Vec::new();

    if let Some(caps) = leading_re().captures(rest) {
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        if let Some(m) = caps.get(2) {
            thoughts.push(m.as_str().trim().to_string());
        }
        rest = rest[end..].trim_start();
    }

    // 结尾段：从最后一个开标签起整体匹配
    let last_open = ["<think>", "<thinking>"]
        .iter()
        .filter_map(|tag| rest.rfind(tag))
        .max();
    if let Some(start) = last_open {
        if let Some(caps) = trailing_re().captures(&rest[start..]) {
            if let Some(m) = caps.get(2) {
                thoughts.push(m.as_str().trim().to_string());
            }
            rest = rest[..start].trim_end();
        }
    }

    if thoughts.is_empty() {
        return (text.to_string(), None);
    }
    (rest.to_string(), Some(thoughts.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_untouched() {
        let (text, think) = extract_think("plain answer");
        assert_eq!(text, "plain answer");
        assert!(think.is_none());
    }

    #[test]
    fn test_leading_block() {
        let (text, think) = extract_think("<think>\nstep by step\n</think>\n\nfinal");
        assert_eq!(text, "final");
        assert_eq!(think.as_deref(), Some("step by step"));
    }

    #[test]
    fn test_trailing_block() {
        let (text, think) = extract_think("answer <thinking>why</thinking>");
        assert_eq!(text, "answer");
        assert_eq!(think.as_deref(), Some("why"));
    }

    #[test]
    fn test_inline_block_is_left_alone() {
        let input = "a <think>x</think> b";
        let (text, think) = extract_think(input);
        assert_eq!(text, input);
        assert!(think.is_none());
    }

    #[test]
    fn test_leading_and_trailing_blocks() {
        let (text, think) = extract_think("<think>a</think> answer <think>b</think>");
        assert_eq!(text, "answer");
        assert_eq!(think.as_deref(), Some("a\nb"));
    }
}
