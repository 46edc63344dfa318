//! 简单模板渲染：`{{text}}`、`{{think}}`、`{{memory}}`、`{{memory.key}}` 与 `{{变量名}}`
//!
//! 找不到的占位符原样保留，不报错。

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::flow::Context;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("valid placeholder regex")
    })
}

/// JSON 值转模板文本：字符串去引号，null 为空串，其余序列化
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lookup(ctx: &Context, key: &str) -> Option<String> {
    match key {
        "text" => Some(ctx.text.clone()),
        "think" => Some(ctx.think.clone()),
        "memory" => Some(value_to_text(&ctx.memory)),
        _ => {
            if let Some(path) = key.strip_prefix("memory.") {
                let pointer = format!("/{}", path.replace('.', "/"));
                return ctx.memory.pointer(&pointer).map(value_to_text);
            }
            ctx.variables.get(key).map(value_to_text)
        }
    }
}

/// 用上下文渲染模板
pub fn render(template: &str, ctx: &Context) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| {
            lookup(ctx, &caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_fields_and_variables() {
        let ctx = Context::new("input")
            .with_memory(json!({"user": {"name": "Ada"}}))
            .with_variable("lang", "rust")
            .with_variable("n", 2);

        let out = render(
            "{{ text }} in {{lang}} x{{n}} for {{memory.user.name}}",
            &ctx,
        );
        assert_eq!(out, "input in rust x2 for Ada");
    }

    #[test]
    fn test_unknown_placeholder_is_kept() {
        let ctx = Context::new("t");
        assert_eq!(render("{{missing}} {{text}}", &ctx), "{{missing}} t");
    }
}
